use std::path::{Path, PathBuf};

use ndarray::{Array2, Array3};
use serde::Serialize;
use tracing::info;

use crate::core::processing::overview::{flow_to_rgb, render_overview};
use crate::core::processing::rescale::rescale_mask;
use crate::error::{Error, Result};
use crate::io::writers::png::{write_png_u16, write_rgb_png};
use crate::io::writers::tiff::write_tiff_u16;
use crate::model::Prediction;
use crate::types::{ImageSize, MaskFormat, ObjectCategory, OutputRole};

/// `{role}__{category}__{stem}.{extension}`
pub fn output_file_name(
    role: OutputRole,
    category: ObjectCategory,
    stem: &str,
    extension: &str,
) -> String {
    format!("{}__{}__{}.{}", role, category, stem, extension)
}

/// File stem used in output names; falls back to `image` for paths without one.
pub fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "image".to_string())
}

/// Files written for one image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SavedOutputs {
    pub mask: PathBuf,
    pub mask_resize: Option<PathBuf>,
    pub flow: PathBuf,
    pub overview: Option<PathBuf>,
}

impl SavedOutputs {
    pub fn paths(&self) -> Vec<PathBuf> {
        let mut out = vec![self.mask.clone()];
        out.extend(self.mask_resize.iter().cloned());
        out.push(self.flow.clone());
        out.extend(self.overview.iter().cloned());
        out
    }
}

/// Narrow a label mask to 16 bits, failing on the first label that does not fit.
pub fn mask_to_u16(mask: &Array2<u32>) -> Result<Vec<u16>> {
    mask.iter()
        .map(|&label| u16::try_from(label).map_err(|_| Error::LabelOverflow { label }))
        .collect()
}

/// Fail with [`Error::LabelOverflow`] if any predicted label needs more than 16 bits.
///
/// Rescaling never introduces labels, so checking the working-resolution masks covers
/// the full-resolution ones too.
pub fn check_label_range(predictions: &[Prediction]) -> Result<()> {
    let max = u16::MAX as u32;
    match predictions
        .iter()
        .flat_map(|p| p.mask.iter())
        .find(|&&label| label > max)
    {
        Some(&label) => Err(Error::LabelOverflow { label }),
        None => Ok(()),
    }
}

fn write_label_data(
    data: &[u16],
    rows: usize,
    cols: usize,
    output: &Path,
    format: MaskFormat,
) -> Result<()> {
    match format {
        MaskFormat::Png => write_png_u16(output, cols, rows, data),
        MaskFormat::Tiff => write_tiff_u16(output, cols, rows, data),
    }
}

pub fn save_label_mask(mask: &Array2<u32>, output: &Path, format: MaskFormat) -> Result<()> {
    let (rows, cols) = mask.dim();
    let data = mask_to_u16(mask)?;
    write_label_data(&data, rows, cols, output, format)
}

/// Options shared by every image of a run.
#[derive(Debug, Clone, Copy)]
pub struct SaveOptions {
    pub mask_format: MaskFormat,
    pub overview: bool,
}

/// Write mask, flow and overview files for one prediction.
///
/// When the image was resized before inference, the mask is rescaled to
/// `original_size` and written as `mask`, and the working-resolution mask is kept
/// as `mask_resize`.
#[allow(clippy::too_many_arguments)]
pub fn save_prediction(
    output_dir: &Path,
    category: ObjectCategory,
    source: &Path,
    image: &Array3<f32>,
    prediction: &Prediction,
    original_size: ImageSize,
    resized: bool,
    options: SaveOptions,
) -> Result<SavedOutputs> {
    let stem = file_stem(source);
    let mask_ext = options.mask_format.extension();
    let name = |role: OutputRole, ext: &str| output_file_name(role, category, &stem, ext);

    // Everything that can fail on the data is computed before the first file is written.
    let working = mask_to_u16(&prediction.mask)?;
    let full = if resized {
        let full = rescale_mask(prediction.mask.view(), original_size)?;
        Some((mask_to_u16(&full)?, full.dim()))
    } else {
        None
    };
    let raster = if options.overview {
        Some(render_overview(image, &prediction.mask, &prediction.flow)?)
    } else {
        None
    };
    let flow = flow_to_rgb(&prediction.flow)?;

    let (rows, cols) = prediction.mask.dim();
    let mask_path = output_dir.join(name(OutputRole::Mask, mask_ext));
    let mask_resize = match full {
        Some((full_data, (full_rows, full_cols))) => {
            write_label_data(&full_data, full_rows, full_cols, &mask_path, options.mask_format)?;
            let small_path = output_dir.join(name(OutputRole::MaskResize, mask_ext));
            write_label_data(&working, rows, cols, &small_path, options.mask_format)?;
            Some(small_path)
        }
        None => {
            write_label_data(&working, rows, cols, &mask_path, options.mask_format)?;
            None
        }
    };

    let flow_path = output_dir.join(name(OutputRole::Flow, "png"));
    write_rgb_png(&flow_path, flow.width, flow.height, &flow.data)?;

    let overview = match raster {
        Some(raster) => {
            let path = output_dir.join(name(OutputRole::Segmentation, "png"));
            write_rgb_png(&path, raster.width, raster.height, &raster.data)?;
            Some(path)
        }
        None => None,
    };

    info!("Saved {} outputs for {:?} to {:?}", category, source, output_dir);

    Ok(SavedOutputs {
        mask: mask_path,
        mask_resize,
        flow: flow_path,
        overview,
    })
}
