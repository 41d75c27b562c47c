//! High-level library API: batch segmentation over a folder of images, paired
//! cytoplasm/nucleus runs, single-file mask rescaling and JSON run reports. Prefer
//! these entrypoints over the low-level processing modules when integrating cellseg.
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use ndarray::Array2;
use serde::Serialize;
use tracing::{info, warn};

use crate::core::params::{ErrorPolicy, ModelConfig, SegmentationParams};
use crate::core::processing::pipeline::{ImageBatch, predict, predict_and_save, save_predictions};
use crate::core::processing::rescale::rescale_mask_dyn;
use crate::core::processing::resize::resize_to_working_size;
use crate::core::processing::save::{SaveOptions, check_label_range, save_label_mask};
use crate::core::processing::stack::{stack_cells, stack_nuclei};
use crate::error::{Error, Result};
use crate::io::discovery::{discover_images, resolve_pair};
use crate::io::reader::{read_intensity_image, read_label_mask_raw};
use crate::model::SegmentationModel;
use crate::observer::ProgressObserver;
use crate::types::{ImageSize, MaskFormat, ObjectCategory};

/// How one input ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ItemStatus {
    Processed,
    Skipped { reason: String },
    Failed { error: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItemOutcome {
    pub input: PathBuf,
    #[serde(flatten)]
    pub status: ItemStatus,
    /// Every file written for this input
    pub outputs: Vec<PathBuf>,
}

/// Summary of a batch run
#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub processed: usize,
    pub skipped: usize,
    pub errors: usize,
    pub items: Vec<ItemOutcome>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl BatchReport {
    fn start() -> Self {
        Self {
            processed: 0,
            skipped: 0,
            errors: 0,
            items: Vec::new(),
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    fn record(&mut self, outcome: ItemOutcome) {
        match outcome.status {
            ItemStatus::Processed => self.processed += 1,
            ItemStatus::Skipped { .. } => self.skipped += 1,
            ItemStatus::Failed { .. } => self.errors += 1,
        }
        self.items.push(outcome);
    }

    fn finish(mut self) -> Self {
        self.finished_at = Some(Utc::now());
        self
    }
}

/// Write `report` as pretty-printed JSON.
pub fn write_report_json(report: &BatchReport, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let text = serde_json::to_string_pretty(report)?;
    std::fs::write(path, text)?;
    Ok(())
}

fn log_line(observer: &dyn ProgressObserver, message: &str) {
    info!("{}", message);
    observer.on_log(message);
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Status, log line and progress for the item about to be processed.
fn announce(observer: &dyn ProgressObserver, path: &Path, idx: usize, total: usize) {
    let message = format!("Segmenting image : {}", display_name(path));
    observer.on_status(&message);
    log_line(observer, &message);
    observer.on_progress((idx + 1) as f32 / total as f32);
}

fn discover(params: &SegmentationParams, observer: &dyn ProgressObserver) -> Result<Vec<PathBuf>> {
    params.validate()?;
    match discover_images(&params.discovery) {
        Ok(files) => {
            log_line(observer, &format!("Found {} images", files.len()));
            Ok(files)
        }
        Err(e) => {
            warn!("{}", e);
            observer.on_log(&e.to_string());
            Err(e)
        }
    }
}

fn log_device(config: &ModelConfig, model: &dyn SegmentationModel, observer: &dyn ProgressObserver) {
    let device = model.resolve_device(config.device);
    if device != config.device {
        warn!("{} requested but {} will use {}", config.device, model.name(), device);
    }
    log_line(
        observer,
        &format!("Running {} model '{}' on {}", model.name(), config.model_type, device),
    );
}

fn save_options(params: &SegmentationParams) -> SaveOptions {
    SaveOptions {
        mask_format: params.mask_format,
        overview: params.overview,
    }
}

/// Handle one item result under `policy`. Returns the error when the run must stop.
fn settle(
    report: &mut BatchReport,
    input: &Path,
    result: Result<Vec<PathBuf>>,
    policy: ErrorPolicy,
    observer: &dyn ProgressObserver,
) -> Result<()> {
    match result {
        Ok(outputs) => {
            report.record(ItemOutcome {
                input: input.to_path_buf(),
                status: ItemStatus::Processed,
                outputs,
            });
            Ok(())
        }
        Err(Error::MissingPairedFile { path }) => {
            let reason = format!("Nucleus image not found : {}", path.display());
            warn!("{}", reason);
            observer.on_log(&reason);
            report.record(ItemOutcome {
                input: input.to_path_buf(),
                status: ItemStatus::Skipped { reason },
                outputs: Vec::new(),
            });
            Ok(())
        }
        Err(e) => {
            warn!("Failed to segment {:?}: {}", input, e);
            observer.on_log(&format!("Error : {}", e));
            report.record(ItemOutcome {
                input: input.to_path_buf(),
                status: ItemStatus::Failed {
                    error: e.to_string(),
                },
                outputs: Vec::new(),
            });
            match policy {
                ErrorPolicy::FailFast => Err(e),
                ErrorPolicy::Continue => Ok(()),
            }
        }
    }
}

fn segment_single(
    path: &Path,
    category: ObjectCategory,
    params: &SegmentationParams,
    config: &ModelConfig,
    model: &dyn SegmentationModel,
    observer: &dyn ProgressObserver,
) -> Result<Vec<PathBuf>> {
    let output_dir = params.output.resolve(path)?;
    let loaded = read_intensity_image(path)?;
    let (plane, resized) = resize_to_working_size(loaded.data, params.working_size)?;
    let (image, channels) = stack_nuclei(&plane)?;

    let batch = ImageBatch::new(
        vec![image],
        vec![path.to_path_buf()],
        vec![loaded.original_size],
        channels,
        resized,
        category,
    )?;
    let saved = predict_and_save(
        &batch,
        config,
        model,
        &output_dir,
        save_options(params),
        observer,
    )?;
    Ok(saved.iter().flat_map(|s| s.paths()).collect())
}

/// Segment every discovered image as a single-channel input of `category`.
///
/// Each image is stacked as `[0, 0, image]` and evaluated with the grayscale/red
/// channel assignment.
pub fn segment_objects(
    params: &SegmentationParams,
    category: ObjectCategory,
    config: &ModelConfig,
    model: &dyn SegmentationModel,
    observer: &dyn ProgressObserver,
) -> Result<BatchReport> {
    config.validate()?;
    let files = discover(params, observer)?;
    log_device(config, model, observer);

    let mut report = BatchReport::start();
    let total = files.len();
    for (idx, path) in files.iter().enumerate() {
        announce(observer, path, idx, total);
        let result = segment_single(path, category, params, config, model, observer);
        settle(&mut report, path, result, params.error_policy, observer)?;
    }

    let report = report.finish();
    log_line(
        observer,
        &format!(
            "Done: {} processed, {} skipped, {} errors",
            report.processed, report.skipped, report.errors
        ),
    );
    Ok(report)
}

fn segment_pair(
    cytoplasm_path: &Path,
    nucleus_path: &Path,
    params: &SegmentationParams,
    cells_config: &ModelConfig,
    nuclei_config: &ModelConfig,
    model: &dyn SegmentationModel,
    observer: &dyn ProgressObserver,
) -> Result<Vec<PathBuf>> {
    let output_dir = params.output.resolve(cytoplasm_path)?;
    let cytoplasm = read_intensity_image(cytoplasm_path)?;
    let nucleus = read_intensity_image(nucleus_path)?;
    if cytoplasm.original_size != nucleus.original_size {
        return Err(Error::InvalidShape(format!(
            "{:?} is {} but {:?} is {}",
            cytoplasm_path, cytoplasm.original_size, nucleus_path, nucleus.original_size
        )));
    }
    let original_size = cytoplasm.original_size;

    let (cytoplasm_plane, resized) = resize_to_working_size(cytoplasm.data, params.working_size)?;
    let (nucleus_plane, _) = resize_to_working_size(nucleus.data, params.working_size)?;
    let options = save_options(params);

    let (cells_image, cells_channels) = stack_cells(&cytoplasm_plane, &nucleus_plane)?;
    let cells = ImageBatch::new(
        vec![cells_image],
        vec![cytoplasm_path.to_path_buf()],
        vec![original_size],
        cells_channels,
        resized,
        ObjectCategory::Cells,
    )?;
    let (nuclei_image, nuclei_channels) = stack_nuclei(&nucleus_plane)?;
    let nuclei = ImageBatch::new(
        vec![nuclei_image],
        vec![nucleus_path.to_path_buf()],
        vec![original_size],
        nuclei_channels,
        resized,
        ObjectCategory::Nuclei,
    )?;

    // Both rounds are evaluated and range-checked before anything is written.
    let cells_predictions = predict(&cells, cells_config, model, observer)?;
    let nuclei_predictions = predict(&nuclei, nuclei_config, model, observer)?;
    check_label_range(&cells_predictions)?;
    check_label_range(&nuclei_predictions)?;

    let mut outputs = Vec::new();
    for saved in save_predictions(&cells, &cells_predictions, &output_dir, options)?
        .into_iter()
        .chain(save_predictions(&nuclei, &nuclei_predictions, &output_dir, options)?)
    {
        outputs.extend(saved.paths());
    }
    Ok(outputs)
}

/// Segment cells and nuclei from paired cytoplasm/nucleus images.
///
/// Every discovered file is a cytoplasm image; its nucleus counterpart is found by
/// replacing `discovery.pattern` with `discovery.pair_pattern` in the file name.
/// Inputs without a counterpart are skipped.
pub fn segment_cells_and_nuclei(
    params: &SegmentationParams,
    cells_config: &ModelConfig,
    nuclei_config: &ModelConfig,
    model: &dyn SegmentationModel,
    observer: &dyn ProgressObserver,
) -> Result<BatchReport> {
    let pair_pattern = params
        .discovery
        .pair_pattern
        .as_deref()
        .ok_or_else(|| Error::InvalidArgument {
            arg: "pair_pattern",
            value: String::new(),
        })?;
    cells_config.validate()?;
    nuclei_config.validate()?;
    let files = discover(params, observer)?;
    log_device(cells_config, model, observer);

    let mut report = BatchReport::start();
    let total = files.len();
    for (idx, path) in files.iter().enumerate() {
        announce(observer, path, idx, total);
        let result = resolve_pair(path, &params.discovery.pattern, pair_pattern).and_then(|nucleus| {
            segment_pair(path, &nucleus, params, cells_config, nuclei_config, model, observer)
        });
        settle(&mut report, path, result, params.error_policy, observer)?;
    }

    let report = report.finish();
    log_line(
        observer,
        &format!(
            "Done: {} processed, {} skipped, {} errors",
            report.processed, report.skipped, report.errors
        ),
    );
    Ok(report)
}

/// Rescale the label mask stored at `input` to `target` and write it to `output`.
pub fn rescale_mask_file(
    input: &Path,
    output: &Path,
    target: ImageSize,
    format: MaskFormat,
) -> Result<Array2<u32>> {
    let raw = read_label_mask_raw(input)?;
    let full = rescale_mask_dyn(&raw, &[target.height, target.width])?;
    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    save_label_mask(&full, output, format)?;
    info!("Rescaled {:?} to {} -> {:?}", input, target, output);
    Ok(full)
}
