//! Shared types and enums used across cellseg.
//! Includes `ObjectCategory`, the model-facing `Channel` / `ChannelAssignment`,
//! `ImageSize`, `MaskFormat` and the `OutputRole` tags used in output file names.
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, ValueEnum, Debug, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObjectCategory {
    Cells,
    Nuclei,
}

impl std::fmt::Display for ObjectCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ObjectCategory::Cells => "cells",
            ObjectCategory::Nuclei => "nuclei",
        };
        write!(f, "{}", s)
    }
}

/// Channel index as understood by the segmentation model. 0 means "average all
/// channels", 1..=3 select red, green and blue.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Debug, Serialize, Deserialize)]
pub enum Channel {
    Grayscale = 0,
    Red = 1,
    Green = 2,
    Blue = 3,
}

impl Channel {
    pub fn index(self) -> u8 {
        self as u8
    }
}

/// Which stacked channel carries the segmentation signal and which one the
/// optional nuclear signal.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct ChannelAssignment {
    pub primary: Channel,
    pub nuclear: Channel,
}

impl ChannelAssignment {
    /// Cytoplasm in red, nuclei in blue.
    pub const CELLS: ChannelAssignment = ChannelAssignment {
        primary: Channel::Red,
        nuclear: Channel::Blue,
    };

    /// Grayscale signal with red as nuclear channel.
    pub const NUCLEI: ChannelAssignment = ChannelAssignment {
        primary: Channel::Grayscale,
        nuclear: Channel::Red,
    };

    pub fn as_indices(&self) -> [u8; 2] {
        [self.primary.index(), self.nuclear.index()]
    }
}

impl std::fmt::Display for ChannelAssignment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let [a, b] = self.as_indices();
        write!(f, "[{}, {}]", a, b)
    }
}

/// Raster dimensions in rows (height) and columns (width).
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub struct ImageSize {
    pub height: usize,
    pub width: usize,
}

impl ImageSize {
    pub fn new(height: usize, width: usize) -> Self {
        Self { height, width }
    }

    pub fn from_dim((height, width): (usize, usize)) -> Self {
        Self { height, width }
    }

    pub fn dim(&self) -> (usize, usize) {
        (self.height, self.width)
    }

    pub fn is_empty(&self) -> bool {
        self.height == 0 || self.width == 0
    }
}

impl std::fmt::Display for ImageSize {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.height, self.width)
    }
}

impl std::str::FromStr for ImageSize {
    type Err = String;

    /// Parses `HxW`, e.g. `512x768`.
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let (h, w) = s
            .split_once(['x', 'X'])
            .ok_or_else(|| format!("expected HxW, got '{}'", s))?;
        let height = h
            .trim()
            .parse::<usize>()
            .map_err(|_| format!("invalid height in '{}'", s))?;
        let width = w
            .trim()
            .parse::<usize>()
            .map_err(|_| format!("invalid width in '{}'", s))?;
        if height == 0 || width == 0 {
            return Err(format!("dimensions must be positive, got '{}'", s));
        }
        Ok(Self { height, width })
    }
}

#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MaskFormat {
    #[default]
    Png,
    Tiff,
}

impl MaskFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            MaskFormat::Png => "png",
            MaskFormat::Tiff => "tif",
        }
    }
}

/// Tag embedded in every output file name.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum OutputRole {
    Mask,
    MaskResize,
    Flow,
    Segmentation,
}

impl std::fmt::Display for OutputRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputRole::Mask => write!(f, "mask"),
            OutputRole::MaskResize => write!(f, "mask_resize"),
            OutputRole::Flow => write!(f, "flow"),
            OutputRole::Segmentation => write!(f, "segmentation"),
        }
    }
}
