//! Boundary to the pretrained segmentation model.
//!
//! The crate never segments anything itself. A [`SegmentationModel`] receives a batch
//! of stacked 3-channel images plus inference hints and returns one integer label mask
//! and one flow rendering per image.
use ndarray::{Array2, Array3};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::types::ChannelAssignment;

/// Mean object diameter (pixels) the pretrained models were trained at.
pub const REFERENCE_DIAMETER: f32 = 30.0;

/// Flow error threshold forwarded to the model.
pub const FLOW_THRESHOLD: f32 = 0.4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Device {
    #[default]
    Cpu,
    Gpu(usize),
}

impl std::fmt::Display for Device {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Device::Cpu => write!(f, "CPU"),
            Device::Gpu(index) => write!(f, "GPU {}", index),
        }
    }
}

/// One inference call.
#[derive(Debug, Clone)]
pub struct EvalRequest<'a> {
    pub model_type: &'a str,
    /// HWC images with exactly three channels
    pub images: &'a [Array3<f32>],
    pub channels: ChannelAssignment,
    /// Factor by which the model should scale images before inference
    pub rescale: f32,
    pub flow_threshold: f32,
    /// Average the ensemble of networks instead of running a single one
    pub average_networks: bool,
    pub device: Device,
}

/// Model output for one image, at the image's working resolution.
#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    /// 0 = background, every positive value one object
    pub mask: Array2<u32>,
    /// HWC RGB rendering of the predicted flow field
    pub flow: Array3<u8>,
}

pub trait SegmentationModel {
    /// Human-readable backend name used in logs.
    fn name(&self) -> &str;

    /// Device the backend will actually use for `requested`. Backends without GPU
    /// support fall back to the CPU here.
    fn resolve_device(&self, requested: Device) -> Device {
        requested
    }

    /// Segment every image of the request; must return exactly one prediction per image.
    fn eval(&self, request: &EvalRequest<'_>) -> Result<Vec<Prediction>>;
}
