use std::path::{Path, PathBuf};
use std::time::Instant;

use ndarray::Array3;
use tracing::{debug, info};

use crate::core::params::ModelConfig;
use crate::core::processing::save::{
    SaveOptions, SavedOutputs, check_label_range, save_prediction,
};
use crate::error::{Error, Result};
use crate::model::{EvalRequest, FLOW_THRESHOLD, Prediction, SegmentationModel};
use crate::observer::ProgressObserver;
use crate::types::{ChannelAssignment, ImageSize, ObjectCategory};

/// Images ready for inference together with what is needed to write their outputs.
#[derive(Debug, Clone)]
pub struct ImageBatch {
    /// HWC, three channels, at working resolution
    pub images: Vec<Array3<f32>>,
    pub file_paths: Vec<PathBuf>,
    pub original_sizes: Vec<ImageSize>,
    pub channels: ChannelAssignment,
    /// Whether the images were resized away from their original size
    pub resized: bool,
    pub category: ObjectCategory,
}

impl ImageBatch {
    pub fn new(
        images: Vec<Array3<f32>>,
        file_paths: Vec<PathBuf>,
        original_sizes: Vec<ImageSize>,
        channels: ChannelAssignment,
        resized: bool,
        category: ObjectCategory,
    ) -> Result<Self> {
        if images.len() != file_paths.len() || images.len() != original_sizes.len() {
            return Err(Error::InvalidShape(format!(
                "batch has {} images, {} paths and {} original sizes",
                images.len(),
                file_paths.len(),
                original_sizes.len()
            )));
        }
        for (image, path) in images.iter().zip(&file_paths) {
            if image.ndim() != 3 || image.dim().2 != 3 {
                return Err(Error::InvalidShape(format!(
                    "{:?}: expected an HxWx3 image, got {:?}",
                    path,
                    image.shape()
                )));
            }
        }
        Ok(Self {
            images,
            file_paths,
            original_sizes,
            channels,
            resized,
            category,
        })
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }
}

fn check_predictions(batch: &ImageBatch, predictions: &[Prediction]) -> Result<()> {
    if predictions.len() != batch.len() {
        return Err(Error::model(format!(
            "expected {} predictions, got {}",
            batch.len(),
            predictions.len()
        )));
    }
    for ((image, prediction), path) in batch
        .images
        .iter()
        .zip(predictions)
        .zip(&batch.file_paths)
    {
        let (h, w, _) = image.dim();
        if prediction.mask.dim() != (h, w) {
            return Err(Error::model(format!(
                "{:?}: mask is {:?}, image is {}x{}",
                path,
                prediction.mask.dim(),
                h,
                w
            )));
        }
        let (fh, fw, fc) = prediction.flow.dim();
        if (fh, fw) != (h, w) || fc != 3 {
            return Err(Error::model(format!(
                "{:?}: flow is {}x{}x{}, image is {}x{}x3",
                path, fh, fw, fc, h, w
            )));
        }
    }
    Ok(())
}

/// Run the model on `batch` and check that its predictions match the images.
pub fn predict(
    batch: &ImageBatch,
    config: &ModelConfig,
    model: &dyn SegmentationModel,
    observer: &dyn ProgressObserver,
) -> Result<Vec<Prediction>> {
    if batch.is_empty() {
        return Ok(Vec::new());
    }

    let request = EvalRequest {
        model_type: &config.model_type,
        images: &batch.images,
        channels: batch.channels,
        rescale: config.rescale_factor(),
        flow_threshold: FLOW_THRESHOLD,
        average_networks: false,
        device: model.resolve_device(config.device),
    };
    debug!(
        "Evaluating {} {} image(s) with model '{}' (channels {}, rescale {:.3})",
        batch.len(),
        batch.category,
        config.model_type,
        batch.channels,
        request.rescale
    );

    let message = format!("Performing segmentation of {}", batch.category);
    info!("{}", message);
    observer.on_log(&message);

    let started = Instant::now();
    let predictions = model.eval(&request)?;
    check_predictions(batch, &predictions)?;

    let message = format!(
        "Segmentation of {} finished ({:.2}s)",
        batch.category,
        started.elapsed().as_secs_f64()
    );
    info!("{}", message);
    observer.on_log(&message);
    Ok(predictions)
}

/// Write `predictions` for `batch` into `output_dir`.
///
/// Every mask is checked against the 16-bit label range first, so a batch that
/// cannot be stored leaves no files behind.
pub fn save_predictions(
    batch: &ImageBatch,
    predictions: &[Prediction],
    output_dir: &Path,
    options: SaveOptions,
) -> Result<Vec<SavedOutputs>> {
    check_label_range(predictions)?;
    if predictions.is_empty() {
        return Ok(Vec::new());
    }
    std::fs::create_dir_all(output_dir)?;

    let mut saved = Vec::with_capacity(predictions.len());
    for (idx, prediction) in predictions.iter().enumerate() {
        saved.push(save_prediction(
            output_dir,
            batch.category,
            &batch.file_paths[idx],
            &batch.images[idx],
            prediction,
            batch.original_sizes[idx],
            batch.resized,
            options,
        )?);
    }
    Ok(saved)
}

/// Run the model on `batch` and write every prediction into `output_dir`.
pub fn predict_and_save(
    batch: &ImageBatch,
    config: &ModelConfig,
    model: &dyn SegmentationModel,
    output_dir: &Path,
    options: SaveOptions,
    observer: &dyn ProgressObserver,
) -> Result<Vec<SavedOutputs>> {
    let predictions = predict(batch, config, model, observer)?;
    save_predictions(batch, &predictions, output_dir, options)
}
