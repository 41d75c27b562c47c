use std::cell::RefCell;
use std::path::{Path, PathBuf};

use image::{GrayImage, Luma};
use ndarray::{Array2, Array3};
use tempfile::TempDir;

use cellseg::io::read_label_mask_raw;
use cellseg::{
    ChannelAssignment, Device, DiscoveryParams, Error, ErrorPolicy, EvalRequest, ItemStatus,
    ModelConfig, NoopObserver, ObjectCategory, OutputTarget, PathRule, Prediction,
    ProgressObserver, SegmentationModel, SegmentationParams, WorkingSize, segment_cells_and_nuclei,
    segment_objects, write_report_json,
};

#[derive(Debug, Clone)]
struct Call {
    model_type: String,
    channels: ChannelAssignment,
    rescale: f32,
    flow_threshold: f32,
    average_networks: bool,
    shape: (usize, usize, usize),
    green_is_empty: bool,
}

/// Labels the top-left quadrant of every image with `label`.
struct QuadrantModel {
    label: u32,
    calls: RefCell<Vec<Call>>,
}

impl QuadrantModel {
    fn new(label: u32) -> Self {
        Self {
            label,
            calls: RefCell::new(Vec::new()),
        }
    }
}

impl SegmentationModel for QuadrantModel {
    fn name(&self) -> &str {
        "quadrant"
    }

    fn eval(&self, request: &EvalRequest<'_>) -> cellseg::Result<Vec<Prediction>> {
        let mut out = Vec::new();
        for image in request.images {
            let (h, w, c) = image.dim();
            self.calls.borrow_mut().push(Call {
                model_type: request.model_type.to_string(),
                channels: request.channels,
                rescale: request.rescale,
                flow_threshold: request.flow_threshold,
                average_networks: request.average_networks,
                shape: (h, w, c),
                green_is_empty: image.index_axis(ndarray::Axis(2), 1).iter().all(|&v| v == 0.0),
            });
            let mask = Array2::from_shape_fn((h, w), |(r, c)| {
                if r < h / 2 && c < w / 2 { self.label } else { 0 }
            });
            let flow = Array3::from_elem((h, w, 3), 128_u8);
            out.push(Prediction { mask, flow });
        }
        Ok(out)
    }
}

/// Returns nothing at all.
struct SilentModel;

impl SegmentationModel for SilentModel {
    fn name(&self) -> &str {
        "silent"
    }

    fn eval(&self, _request: &EvalRequest<'_>) -> cellseg::Result<Vec<Prediction>> {
        Ok(Vec::new())
    }
}

#[derive(Default)]
struct RecordingObserver {
    logs: RefCell<Vec<String>>,
    statuses: RefCell<Vec<String>>,
    progress: RefCell<Vec<f32>>,
}

impl ProgressObserver for RecordingObserver {
    fn on_log(&self, message: &str) {
        self.logs.borrow_mut().push(message.to_string());
    }

    fn on_status(&self, status: &str) {
        self.statuses.borrow_mut().push(status.to_string());
    }

    fn on_progress(&self, fraction: f32) {
        self.progress.borrow_mut().push(fraction);
    }
}

fn write_gray(path: &Path, width: u32, height: u32) {
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    let img = GrayImage::from_fn(width, height, |x, y| Luma([((x * 7 + y * 3) % 256) as u8]));
    img.save(path).unwrap();
}

fn discovery(root: &Path, pattern: &str, pair: Option<&str>) -> DiscoveryParams {
    DiscoveryParams {
        root: root.to_path_buf(),
        pattern: pattern.to_string(),
        pair_pattern: pair.map(str::to_string),
        extension: ".png".to_string(),
        subfolder: None,
        recursive: true,
    }
}

fn mask_dim(path: &Path) -> (usize, usize) {
    let raw = read_label_mask_raw(path).unwrap();
    (raw.shape()[0], raw.shape()[1])
}

#[test]
fn single_channel_run_writes_outputs_at_original_size() {
    let tmp = TempDir::new().unwrap();
    let input = tmp.path().join("input");
    let out = tmp.path().join("out");
    write_gray(&input.join("img_dapi_01.png"), 12, 10);

    let params = SegmentationParams::new(
        discovery(&input, "dapi", None),
        OutputTarget::Fixed(out.clone()),
    );
    let config = ModelConfig::new("nuclei", 15.0, Device::Cpu).unwrap();
    let model = QuadrantModel::new(3);

    let report =
        segment_objects(&params, ObjectCategory::Nuclei, &config, &model, &NoopObserver).unwrap();

    assert_eq!(report.processed, 1);
    assert_eq!(report.skipped, 0);
    assert_eq!(report.errors, 0);
    assert!(report.finished_at.is_some());

    let mask = out.join("mask__nuclei__img_dapi_01.png");
    assert!(mask.is_file());
    assert!(out.join("flow__nuclei__img_dapi_01.png").is_file());
    assert!(out.join("segmentation__nuclei__img_dapi_01.png").is_file());
    assert!(!out.join("mask_resize__nuclei__img_dapi_01.png").exists());
    assert_eq!(mask_dim(&mask), (10, 12));
    assert_eq!(report.items[0].outputs.len(), 3);

    let calls = model.calls.borrow();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].model_type, "nuclei");
    assert_eq!(calls[0].channels, ChannelAssignment::NUCLEI);
    assert!((calls[0].rescale - 2.0).abs() < 1e-6);
    assert!((calls[0].flow_threshold - 0.4).abs() < 1e-6);
    assert!(!calls[0].average_networks);
    assert_eq!(calls[0].shape, (10, 12, 3));
}

#[test]
fn resized_run_keeps_working_mask_and_restores_original_size() {
    let tmp = TempDir::new().unwrap();
    let input = tmp.path().join("input");
    let out = tmp.path().join("out");
    write_gray(&input.join("img_dapi_01.png"), 16, 16);

    let mut params = SegmentationParams::new(
        discovery(&input, "dapi", None),
        OutputTarget::Fixed(out.clone()),
    );
    params.working_size = WorkingSize::LongSide(8);
    params.overview = false;
    let config = ModelConfig::new("nuclei", 30.0, Device::Cpu).unwrap();
    let model = QuadrantModel::new(9);

    let report =
        segment_objects(&params, ObjectCategory::Nuclei, &config, &model, &NoopObserver).unwrap();
    assert_eq!(report.processed, 1);
    assert_eq!(model.calls.borrow()[0].shape, (8, 8, 3));

    let small = out.join("mask_resize__nuclei__img_dapi_01.png");
    let full = out.join("mask__nuclei__img_dapi_01.png");
    assert!(!out.join("segmentation__nuclei__img_dapi_01.png").exists());
    assert_eq!(mask_dim(&small), (8, 8));

    let full = read_label_mask_raw(&full).unwrap();
    assert_eq!(full.shape(), &[16, 16]);
    let at = |r: usize, c: usize| -> i64 {
        let idx: &[usize] = &[r, c];
        full[idx]
    };
    assert_eq!(at(0, 0), 9);
    assert_eq!(at(7, 7), 9);
    // half-pixel alignment lets the boundary row of the quadrant reach one row further
    assert_eq!(at(8, 8), 9);
    assert_eq!(at(9, 9), 0);
    assert_eq!(at(15, 15), 0);
    assert!(full.iter().all(|&v| v == 0 || v == 9));
}

#[test]
fn paired_run_segments_cells_and_nuclei_and_skips_missing_pairs() {
    let tmp = TempDir::new().unwrap();
    let well = tmp.path().join("plate").join("well_A1");
    write_gray(&well.join("img_cy3_01.png"), 8, 6);
    write_gray(&well.join("img_dapi_01.png"), 8, 6);
    write_gray(&well.join("img_cy3_02.png"), 8, 6);

    let params = SegmentationParams::new(
        discovery(&tmp.path().join("plate"), "cy3", Some("dapi")),
        OutputTarget::DerivedFromInput(PathRule::Subfolder("seg".to_string())),
    );
    let cells = ModelConfig::new("cyto", 60.0, Device::Gpu(0)).unwrap();
    let nuclei = ModelConfig::new("nuclei", 30.0, Device::Gpu(0)).unwrap();
    let model = QuadrantModel::new(1);
    let observer = RecordingObserver::default();

    let report = segment_cells_and_nuclei(&params, &cells, &nuclei, &model, &observer).unwrap();
    assert_eq!(report.processed, 1);
    assert_eq!(report.skipped, 1);
    assert_eq!(report.errors, 0);

    let seg = well.join("seg");
    for name in [
        "mask__cells__img_cy3_01.png",
        "flow__cells__img_cy3_01.png",
        "segmentation__cells__img_cy3_01.png",
        "mask__nuclei__img_dapi_01.png",
        "flow__nuclei__img_dapi_01.png",
        "segmentation__nuclei__img_dapi_01.png",
    ] {
        assert!(seg.join(name).is_file(), "missing {}", name);
    }
    assert!(!seg.join("mask__cells__img_cy3_02.png").exists());
    assert_eq!(report.items[0].outputs.len(), 6);
    assert!(matches!(report.items[1].status, ItemStatus::Skipped { .. }));

    let calls = model.calls.borrow();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[0].channels, ChannelAssignment::CELLS);
    assert_eq!(calls[0].model_type, "cyto");
    assert!((calls[0].rescale - 0.5).abs() < 1e-6);
    assert!(calls[0].green_is_empty);
    assert_eq!(calls[1].channels, ChannelAssignment::NUCLEI);
    assert_eq!(calls[1].model_type, "nuclei");

    assert_eq!(
        *observer.statuses.borrow(),
        vec![
            "Segmenting image : img_cy3_01.png".to_string(),
            "Segmenting image : img_cy3_02.png".to_string(),
        ]
    );
    assert_eq!(*observer.progress.borrow(), vec![0.5, 1.0]);

    let logs = observer.logs.borrow();
    let position = |needle: &str| logs.iter().position(|l| l.starts_with(needle));
    let first = position("Segmenting image : img_cy3_01.png").unwrap();
    let cells_start = position("Performing segmentation of cells").unwrap();
    let cells_done = position("Segmentation of cells finished (").unwrap();
    let nuclei_start = position("Performing segmentation of nuclei").unwrap();
    let nuclei_done = position("Segmentation of nuclei finished (").unwrap();
    let second = position("Segmenting image : img_cy3_02.png").unwrap();
    let missing = position("Nucleus image not found : ").unwrap();
    assert!(first < cells_start);
    assert!(cells_start < cells_done);
    assert!(cells_done < nuclei_start);
    assert!(nuclei_start < nuclei_done);
    assert!(nuclei_done < second);
    assert!(second < missing);
}

/// Valid cell labels, but nucleus labels that do not fit into 16 bits.
struct WideNucleiModel;

impl SegmentationModel for WideNucleiModel {
    fn name(&self) -> &str {
        "wide-nuclei"
    }

    fn eval(&self, request: &EvalRequest<'_>) -> cellseg::Result<Vec<Prediction>> {
        let label = if request.model_type == "nuclei" { 70_000 } else { 1 };
        Ok(request
            .images
            .iter()
            .map(|image| {
                let (h, w, _) = image.dim();
                Prediction {
                    mask: Array2::from_elem((h, w), label),
                    flow: Array3::zeros((h, w, 3)),
                }
            })
            .collect())
    }
}

#[test]
fn paired_run_writes_nothing_when_the_nuclei_round_overflows() {
    let tmp = TempDir::new().unwrap();
    let input = tmp.path().join("input");
    let out = tmp.path().join("out");
    write_gray(&input.join("img_cy3_01.png"), 6, 6);
    write_gray(&input.join("img_dapi_01.png"), 6, 6);

    let mut params = SegmentationParams::new(
        discovery(&input, "cy3", Some("dapi")),
        OutputTarget::Fixed(out.clone()),
    );
    params.error_policy = ErrorPolicy::Continue;
    let cells = ModelConfig::new("cyto", 30.0, Device::Cpu).unwrap();
    let nuclei = ModelConfig::new("nuclei", 30.0, Device::Cpu).unwrap();

    let report =
        segment_cells_and_nuclei(&params, &cells, &nuclei, &WideNucleiModel, &NoopObserver)
            .unwrap();
    assert_eq!(report.errors, 1);
    assert!(report.items[0].outputs.is_empty());
    assert!(!out.exists() || std::fs::read_dir(&out).unwrap().count() == 0);
}

#[test]
fn paired_run_requires_a_pair_pattern() {
    let tmp = TempDir::new().unwrap();
    let params = SegmentationParams::new(
        discovery(tmp.path(), "cy3", None),
        OutputTarget::Fixed(tmp.path().join("out")),
    );
    let config = ModelConfig::new("cyto", 30.0, Device::Cpu).unwrap();
    let result =
        segment_cells_and_nuclei(&params, &config, &config, &QuadrantModel::new(1), &NoopObserver);
    assert!(matches!(
        result,
        Err(Error::InvalidArgument {
            arg: "pair_pattern",
            ..
        })
    ));
}

#[test]
fn empty_input_set_and_missing_root_abort() {
    let tmp = TempDir::new().unwrap();
    write_gray(&tmp.path().join("img_gfp_01.png"), 4, 4);
    let config = ModelConfig::new("nuclei", 30.0, Device::Cpu).unwrap();
    let observer = RecordingObserver::default();

    let params = SegmentationParams::new(
        discovery(tmp.path(), "dapi", None),
        OutputTarget::Fixed(tmp.path().join("out")),
    );
    let result = segment_objects(
        &params,
        ObjectCategory::Nuclei,
        &config,
        &QuadrantModel::new(1),
        &observer,
    );
    assert!(matches!(result, Err(Error::EmptyInputSet { .. })));
    assert_eq!(observer.logs.borrow().len(), 1);
    assert!(!tmp.path().join("out").exists());

    let params = SegmentationParams::new(
        discovery(&tmp.path().join("nope"), "dapi", None),
        OutputTarget::Fixed(tmp.path().join("out")),
    );
    let result = segment_objects(
        &params,
        ObjectCategory::Nuclei,
        &config,
        &QuadrantModel::new(1),
        &NoopObserver,
    );
    assert!(matches!(result, Err(Error::InputPathNotFound { .. })));
}

#[test]
fn oversized_labels_fail_the_item() {
    let tmp = TempDir::new().unwrap();
    let input = tmp.path().join("input");
    write_gray(&input.join("a_dapi.png"), 4, 4);
    write_gray(&input.join("b_dapi.png"), 4, 4);
    let config = ModelConfig::new("nuclei", 30.0, Device::Cpu).unwrap();
    let model = QuadrantModel::new(70_000);

    let mut params = SegmentationParams::new(
        discovery(&input, "dapi", None),
        OutputTarget::Fixed(tmp.path().join("out")),
    );
    let observer = RecordingObserver::default();
    let result = segment_objects(&params, ObjectCategory::Nuclei, &config, &model, &observer);
    assert!(matches!(result, Err(Error::LabelOverflow { label: 70_000 })));
    assert_eq!(model.calls.borrow().len(), 1);
    // the failing item still reported its progress before the run stopped
    assert_eq!(*observer.progress.borrow(), vec![0.5]);

    params.error_policy = ErrorPolicy::Continue;
    let report =
        segment_objects(&params, ObjectCategory::Nuclei, &config, &model, &NoopObserver).unwrap();
    assert_eq!(report.errors, 2);
    assert_eq!(report.processed, 0);
    assert!(matches!(report.items[0].status, ItemStatus::Failed { .. }));
    assert!(report.items.iter().all(|item| item.outputs.is_empty()));

    let out = tmp.path().join("out");
    let written: Vec<_> = match std::fs::read_dir(&out) {
        Ok(entries) => entries.map(|e| e.unwrap().file_name()).collect(),
        Err(_) => Vec::new(),
    };
    assert!(written.is_empty(), "unexpected outputs: {:?}", written);
}

#[test]
fn every_item_is_logged_before_it_is_processed() {
    let tmp = TempDir::new().unwrap();
    let input = tmp.path().join("input");
    write_gray(&input.join("a_dapi.png"), 4, 4);
    let params = SegmentationParams::new(
        discovery(&input, "dapi", None),
        OutputTarget::Fixed(tmp.path().join("out")),
    );
    let config = ModelConfig::new("nuclei", 30.0, Device::Cpu).unwrap();
    let observer = RecordingObserver::default();

    segment_objects(
        &params,
        ObjectCategory::Nuclei,
        &config,
        &QuadrantModel::new(1),
        &observer,
    )
    .unwrap();

    let logs = observer.logs.borrow();
    assert_eq!(logs[0], "Found 1 images");
    assert_eq!(logs[1], "Running quadrant model 'nuclei' on CPU");
    assert_eq!(logs[2], "Segmenting image : a_dapi.png");
    assert_eq!(logs[3], "Performing segmentation of nuclei");
    assert!(logs[4].starts_with("Segmentation of nuclei finished ("));
    assert!(logs[4].ends_with("s)"));
    assert_eq!(logs[5], "Done: 1 processed, 0 skipped, 0 errors");
    assert_eq!(*observer.statuses.borrow(), vec!["Segmenting image : a_dapi.png"]);
    assert_eq!(*observer.progress.borrow(), vec![1.0]);
}

#[test]
fn missing_predictions_are_a_model_error() {
    let tmp = TempDir::new().unwrap();
    let input = tmp.path().join("input");
    write_gray(&input.join("a_dapi.png"), 4, 4);
    let params = SegmentationParams::new(
        discovery(&input, "dapi", None),
        OutputTarget::Fixed(tmp.path().join("out")),
    );
    let config = ModelConfig::new("nuclei", 30.0, Device::Cpu).unwrap();
    let result = segment_objects(&params, ObjectCategory::Nuclei, &config, &SilentModel, &NoopObserver);
    assert!(matches!(result, Err(Error::Model(_))));
}

#[test]
fn output_directory_can_be_derived_by_replacement() {
    let tmp = TempDir::new().unwrap();
    let raw = tmp.path().join("raw_images").join("well_B2");
    write_gray(&raw.join("img_dapi.png"), 6, 6);

    let params = SegmentationParams::new(
        discovery(&tmp.path().join("raw_images"), "dapi", None),
        OutputTarget::DerivedFromInput(PathRule::Replace {
            from: "raw_images".to_string(),
            to: "analysis".to_string(),
        }),
    );
    let config = ModelConfig::new("nuclei", 30.0, Device::Cpu).unwrap();
    let report = segment_objects(
        &params,
        ObjectCategory::Nuclei,
        &config,
        &QuadrantModel::new(2),
        &NoopObserver,
    )
    .unwrap();
    assert_eq!(report.processed, 1);

    let expected: PathBuf = tmp
        .path()
        .join("analysis")
        .join("well_B2")
        .join("mask__nuclei__img_dapi.png");
    assert!(expected.is_file());
}

#[test]
fn report_is_written_as_json() {
    let tmp = TempDir::new().unwrap();
    let input = tmp.path().join("input");
    write_gray(&input.join("a_dapi.png"), 4, 4);
    let params = SegmentationParams::new(
        discovery(&input, "dapi", None),
        OutputTarget::Fixed(tmp.path().join("out")),
    );
    let config = ModelConfig::new("nuclei", 30.0, Device::Cpu).unwrap();
    let report = segment_objects(
        &params,
        ObjectCategory::Nuclei,
        &config,
        &QuadrantModel::new(1),
        &NoopObserver,
    )
    .unwrap();

    let path = tmp.path().join("reports").join("run.json");
    write_report_json(&report, &path).unwrap();
    let value: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(value["processed"], 1);
    assert_eq!(value["items"][0]["status"], "processed");
    assert_eq!(value["items"][0]["outputs"].as_array().unwrap().len(), 3);
}
