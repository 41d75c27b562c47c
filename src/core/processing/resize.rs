use fast_image_resize::{FilterType, PixelType, ResizeAlg, ResizeOptions, Resizer, images::Image};
use ndarray::Array2;
use tracing::{info, warn};

use crate::core::params::WorkingSize;
use crate::error::{Error, Result};
use crate::types::ImageSize;

pub fn calculate_resize_dimensions(original: ImageSize, target_long_side: usize) -> ImageSize {
    let short_side = original.height.min(original.width);
    let long_side = original.height.max(original.width);

    if target_long_side > long_side {
        warn!(
            "Target size {} is larger than original long side {}. Keeping original dimensions {}",
            target_long_side, long_side, original
        );
        return original;
    }

    let scale_factor = target_long_side as f64 / long_side as f64;
    let new_short_side = ((short_side as f64 * scale_factor).round() as usize).max(1);

    if original.width > original.height {
        ImageSize::new(new_short_side, target_long_side)
    } else {
        ImageSize::new(target_long_side, new_short_side)
    }
}

/// Dimensions the model will see for an image of `original` size.
pub fn working_dimensions(original: ImageSize, working: WorkingSize) -> ImageSize {
    match working {
        WorkingSize::Original => original,
        WorkingSize::Exact(size) => size,
        WorkingSize::LongSide(n) => calculate_resize_dimensions(original, n),
    }
}

/// Bilinear resize of a single-channel `f32` plane.
pub fn resize_f32_image(data: &Array2<f32>, target: ImageSize) -> Result<Array2<f32>> {
    let (rows, cols) = data.dim();
    if rows == 0 || cols == 0 || target.is_empty() {
        return Err(Error::InvalidShape(format!(
            "cannot resize {}x{} to {}",
            rows, cols, target
        )));
    }

    let resize_options =
        ResizeOptions::new().resize_alg(ResizeAlg::Convolution(FilterType::Bilinear));
    let mut resizer = Resizer::new();

    // fast_image_resize takes raw little-endian bytes for F32 planes
    let mut src_bytes = Vec::with_capacity(rows * cols * 4);
    for &v in data.iter() {
        src_bytes.extend_from_slice(&v.to_le_bytes());
    }

    let src_image = Image::from_vec_u8(cols as u32, rows as u32, src_bytes, PixelType::F32)
        .map_err(Error::resize)?;
    let mut dst_image = Image::new(target.width as u32, target.height as u32, PixelType::F32);
    resizer
        .resize(&src_image, &mut dst_image, &resize_options)
        .map_err(Error::resize)?;

    let dst_bytes = dst_image.into_vec();
    let out: Vec<f32> = dst_bytes
        .chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect();
    Array2::from_shape_vec(target.dim(), out).map_err(|e| Error::InvalidShape(e.to_string()))
}

/// Bring `data` to the working resolution. Returns the plane and whether it was resized.
pub fn resize_to_working_size(
    data: Array2<f32>,
    working: WorkingSize,
) -> Result<(Array2<f32>, bool)> {
    let original = ImageSize::from_dim(data.dim());
    let target = working_dimensions(original, working);
    if target == original {
        return Ok((data, false));
    }

    info!("Original size: {}, working size: {}", original, target);
    let resized = resize_f32_image(&data, target)?;
    Ok((resized, true))
}
