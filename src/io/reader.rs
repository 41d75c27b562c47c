//! Image decoding into `ndarray` grids.
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use image::DynamicImage;
use ndarray::{Array2, ArrayD, IxDyn};
use tiff::decoder::{Decoder, DecodingResult};
use tracing::debug;

use crate::error::{Error, Result};
use crate::types::ImageSize;

/// A decoded single-channel image together with the size it was read at.
#[derive(Debug, Clone)]
pub struct LoadedImage {
    pub data: Array2<f32>,
    pub original_size: ImageSize,
}

fn is_tiff(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("tif") || e.eq_ignore_ascii_case("tiff"))
        .unwrap_or(false)
}

/// Decode `path` as grayscale intensities in `[0, 1]`. Colour images are converted
/// to luma.
pub fn read_intensity_image(path: &Path) -> Result<LoadedImage> {
    let img = image::open(path)?;
    let luma = img.to_luma32f();
    let (width, height) = luma.dimensions();
    let data = Array2::from_shape_vec((height as usize, width as usize), luma.into_raw())
        .map_err(|e| Error::InvalidShape(e.to_string()))?;
    let original_size = ImageSize::from_dim(data.dim());
    debug!("Loaded {:?} ({})", path, original_size);
    Ok(LoadedImage {
        data,
        original_size,
    })
}

/// Size of an image on disk without decoding its pixels.
pub fn read_image_size(path: &Path) -> Result<ImageSize> {
    let (width, height) = image::image_dimensions(path)?;
    Ok(ImageSize::new(height as usize, width as usize))
}

fn grid_from<T: Copy + Into<i64>>(values: Vec<T>, size: ImageSize) -> Result<ArrayD<i64>> {
    let values: Vec<i64> = values.into_iter().map(Into::into).collect();
    ArrayD::from_shape_vec(IxDyn(&[size.height, size.width]), values)
        .map_err(|e| Error::InvalidShape(e.to_string()))
}

fn read_tiff_labels(path: &Path) -> Result<ArrayD<i64>> {
    let mut decoder = Decoder::new(BufReader::new(File::open(path)?))?;
    let (width, height) = decoder.dimensions()?;
    let size = ImageSize::new(height as usize, width as usize);
    let colortype = decoder.colortype()?;
    if !matches!(colortype, tiff::ColorType::Gray(_)) {
        return Err(Error::InvalidShape(format!(
            "label mask must be single-channel, got {:?}",
            colortype
        )));
    }

    match decoder.read_image()? {
        DecodingResult::U8(v) => grid_from(v, size),
        DecodingResult::U16(v) => grid_from(v, size),
        DecodingResult::U32(v) => grid_from(v, size),
        DecodingResult::I8(v) => grid_from(v, size),
        DecodingResult::I16(v) => grid_from(v, size),
        DecodingResult::I32(v) => grid_from(v, size),
        DecodingResult::I64(v) => grid_from(v, size),
        DecodingResult::U64(v) => {
            let values = v
                .into_iter()
                .map(|x| i64::try_from(x).unwrap_or(i64::MAX))
                .collect::<Vec<i64>>();
            grid_from(values, size)
        }
        _ => Err(Error::InvalidShape(
            "floating point label masks are not supported".to_string(),
        )),
    }
}

/// Read a label mask without interpreting its values. TIFF files keep their full
/// integer range (including signed types, so negative labels can be reported);
/// other formats must be 8- or 16-bit grayscale.
pub fn read_label_mask_raw(path: &Path) -> Result<ArrayD<i64>> {
    if is_tiff(path) {
        return read_tiff_labels(path);
    }

    match image::open(path)? {
        DynamicImage::ImageLuma8(buf) => {
            let size = ImageSize::new(buf.height() as usize, buf.width() as usize);
            grid_from(buf.into_raw(), size)
        }
        DynamicImage::ImageLuma16(buf) => {
            let size = ImageSize::new(buf.height() as usize, buf.width() as usize);
            grid_from(buf.into_raw(), size)
        }
        other => Err(Error::InvalidShape(format!(
            "label mask must be 8- or 16-bit grayscale, got {:?}",
            other.color()
        ))),
    }
}
