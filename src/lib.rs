#![doc = r#"
cellseg — batch cell and nucleus segmentation driver.

This crate scans folders of fluorescence microscopy images, stacks them into the
3-channel layout a pretrained cell/nucleus segmentation model expects, invokes that
model through the [`SegmentationModel`] trait, rescales the returned label masks back
to the original image resolution and writes mask, flow and overview images to disk.

The segmentation network itself is not part of this crate. Plug in any backend by
implementing [`SegmentationModel`].

Stability
---------
The public library API is experimental in initial releases and may evolve.

Add dependency
--------------
```toml
[dependencies]
cellseg = "0.1"
```

Rescale a label mask
--------------------
Every object is upsampled on its own with linear interpolation and thresholded, so
object shapes stay smooth and no new labels appear.

```rust
use ndarray::array;
use cellseg::{rescale_mask, ImageSize};

fn main() -> cellseg::Result<()> {
    let small = array![[0_u32, 0], [0, 7]];
    let full = rescale_mask(small.view(), ImageSize::new(4, 4))?;
    assert_eq!(full[[3, 3]], 7);
    assert_eq!(full[[0, 0]], 0);
    Ok(())
}
```

Paired cytoplasm / nucleus run
------------------------------
```rust,no_run
use std::path::PathBuf;
use cellseg::{
    segment_cells_and_nuclei, Device, DiscoveryParams, ModelConfig, OutputTarget, PathRule,
    SegmentationModel, SegmentationParams, TracingObserver, WorkingSize,
};

fn run(model: &dyn SegmentationModel) -> cellseg::Result<()> {
    let mut params = SegmentationParams::new(
        DiscoveryParams {
            root: PathBuf::from("/data/plate_01"),
            pattern: "cy3".to_string(),
            pair_pattern: Some("dapi".to_string()),
            extension: ".png".to_string(),
            subfolder: None,
            recursive: true,
        },
        OutputTarget::DerivedFromInput(PathRule::Subfolder("segmentation".to_string())),
    );
    params.working_size = WorkingSize::LongSide(1024);

    let cells = ModelConfig::new("cyto", 60.0, Device::Gpu(0))?;
    let nuclei = ModelConfig::new("nuclei", 25.0, Device::Gpu(0))?;
    let report = segment_cells_and_nuclei(&params, &cells, &nuclei, model, &TracingObserver)?;

    println!("processed={} skipped={} errors={}", report.processed, report.skipped, report.errors);
    Ok(())
}
```

Error handling
--------------
All public functions return `cellseg::Result<T>`; match on `cellseg::Error` to handle
specific cases.

```rust,no_run
use std::path::Path;
use cellseg::{rescale_mask_file, Error, ImageSize, MaskFormat};

fn main() {
    match rescale_mask_file(
        Path::new("/data/mask_small.tif"),
        Path::new("/out/mask.png"),
        ImageSize::new(1024, 1360),
        MaskFormat::Png,
    ) {
        Ok(_) => {}
        Err(Error::InvalidLabel { value, row, col }) => {
            eprintln!("bad label {value} at ({row}, {col})")
        }
        Err(Error::LabelOverflow { label }) => eprintln!("label {label} needs more than 16 bits"),
        Err(other) => eprintln!("Other error: {other}"),
    }
}
```

Useful modules
--------------
- [`api`] — high-level batch entry points and run reports.
- [`core`] — mask rescaler, resize, channel stacking, overview rendering, save helpers.
- [`io`] — input discovery and pairing, image readers, mask writers.
- [`model`] — the segmentation model boundary.
- [`types`] — shared enums and small value types.
- [`error`] — crate-level `Error` and `Result`.
"#]

// Core modules (public)
pub mod api;
pub mod core;
pub mod error;
pub mod io;
pub mod model;
pub mod observer;
pub mod types;

// Curated public API surface
// Types
pub use core::params::{
    DiscoveryParams, ErrorPolicy, ModelConfig, OutputTarget, PathRule, SegmentationParams,
    WorkingSize,
};
pub use error::{Error, Result};
pub use model::{Device, EvalRequest, Prediction, SegmentationModel};
pub use observer::{NoopObserver, ProgressObserver, TracingObserver};
pub use types::{Channel, ChannelAssignment, ImageSize, MaskFormat, ObjectCategory};

// Core algorithm
pub use core::processing::rescale::rescale_mask;

// High-level API re-exports
pub use api::{
    BatchReport, ItemOutcome, ItemStatus, rescale_mask_file, segment_cells_and_nuclei,
    segment_objects, write_report_json,
};
