use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::info;
use tracing_subscriber::EnvFilter;

use cellseg::core::params::{DiscoveryParams, SegmentationParams};
use cellseg::io::reader::read_image_size;
use cellseg::io::{WorkItem, plan_work};
use cellseg::rescale_mask_file;
use cellseg::types::{ImageSize, MaskFormat};

use super::args::{CliArgs, Command};
use super::errors::AppError;

fn init_logging(debug: bool) {
    let filter = if debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn format_from_extension(path: &Path) -> MaskFormat {
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("tif") || ext.eq_ignore_ascii_case("tiff") => {
            MaskFormat::Tiff
        }
        _ => MaskFormat::Png,
    }
}

fn run_rescale(
    mask: &Path,
    size: Option<ImageSize>,
    reference: Option<&Path>,
    output: &Path,
    format: Option<MaskFormat>,
) -> Result<(), AppError> {
    let target = match (size, reference) {
        (Some(size), _) => size,
        (None, Some(reference)) => read_image_size(reference)?,
        (None, None) => {
            return Err(AppError::MissingArgument {
                arg: "--size or --reference".to_string(),
            });
        }
    };
    let format = format.unwrap_or_else(|| format_from_extension(output));
    let full = rescale_mask_file(mask, output, target, format)?;
    let objects = cellseg::core::processing::rescale::unique_labels(&full.view()).len();
    info!("Wrote {:?} ({}, {} objects)", output, target, objects);
    Ok(())
}

fn print_plan(items: &[WorkItem], json: bool) -> Result<(), AppError> {
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    if json {
        let text = serde_json::to_string_pretty(items).map_err(cellseg::Error::from)?;
        writeln!(out, "{}", text)?;
        return Ok(());
    }
    for item in items {
        match (&item.paired, &item.missing_pair) {
            (Some(paired), _) => writeln!(out, "{}\t{}", item.primary.display(), paired.display())?,
            (None, Some(missing)) => writeln!(
                out,
                "{}\tmissing: {}",
                item.primary.display(),
                missing.display()
            )?,
            (None, None) => writeln!(out, "{}", item.primary.display())?,
        }
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn run_scan(
    input_dir: Option<PathBuf>,
    pattern: Option<String>,
    pair: Option<String>,
    ext: String,
    subfolder: Option<String>,
    flat: bool,
    json: bool,
    config: Option<PathBuf>,
) -> Result<(), AppError> {
    let discovery = match config {
        Some(path) => SegmentationParams::from_json_file(&path)?.discovery,
        None => {
            let root = input_dir.ok_or(AppError::MissingArgument {
                arg: "--input-dir".to_string(),
            })?;
            let pattern = pattern.ok_or(AppError::MissingArgument {
                arg: "--channel".to_string(),
            })?;
            DiscoveryParams {
                root,
                pattern,
                pair_pattern: pair,
                extension: ext,
                subfolder,
                recursive: !flat,
            }
        }
    };

    let items = plan_work(&discovery)?;
    let missing = items.iter().filter(|i| i.missing_pair.is_some()).count();
    if missing > 0 {
        info!("{} of {} images have no paired image", missing, items.len());
    }
    print_plan(&items, json)
}

pub fn run(args: CliArgs) -> Result<(), AppError> {
    init_logging(args.log);

    match args.command {
        Command::Rescale {
            mask,
            size,
            reference,
            output,
            format,
        } => run_rescale(&mask, size, reference.as_deref(), &output, format),
        Command::Scan {
            input_dir,
            pattern,
            pair,
            ext,
            subfolder,
            flat,
            json,
            config,
        } => run_scan(input_dir, pattern, pair, ext, subfolder, flat, json, config),
    }
}
