use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::Device;
use crate::types::{ImageSize, MaskFormat};

/// Resolution at which the model runs inference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkingSize {
    /// Feed images at their original resolution
    #[default]
    Original,
    /// Resize every image to exactly this size
    Exact(ImageSize),
    /// Resize so the long side has this many pixels, keeping aspect ratio
    LongSide(usize),
}

impl WorkingSize {
    pub fn validate(&self) -> Result<()> {
        match self {
            WorkingSize::Original => Ok(()),
            WorkingSize::Exact(size) if size.is_empty() => Err(Error::InvalidArgument {
                arg: "working_size",
                value: size.to_string(),
            }),
            WorkingSize::LongSide(0) => Err(Error::InvalidArgument {
                arg: "working_size",
                value: "0".to_string(),
            }),
            _ => Ok(()),
        }
    }
}

impl std::str::FromStr for WorkingSize {
    type Err = String;

    /// Accepts `original`, `HxW` or a long-side pixel count.
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("original") {
            return Ok(WorkingSize::Original);
        }
        if s.contains(['x', 'X']) {
            return s.parse::<ImageSize>().map(WorkingSize::Exact);
        }
        match s.parse::<usize>() {
            Ok(0) => Err("size must be greater than 0".to_string()),
            Ok(n) => Ok(WorkingSize::LongSide(n)),
            Err(_) => Err(format!(
                "invalid size '{}': expected 'original', HxW or a positive integer",
                s
            )),
        }
    }
}

/// How the per-input output directory is derived from the input file's directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PathRule {
    /// Replace every occurrence of `from` with `to` in the directory path
    Replace { from: String, to: String },
    /// Append a subfolder to the directory
    Subfolder(String),
}

impl PathRule {
    fn apply(&self, dir: &Path) -> Result<PathBuf> {
        match self {
            PathRule::Replace { from, to } => {
                let text = dir.to_string_lossy();
                if from.is_empty() || !text.contains(from.as_str()) {
                    return Err(Error::OutputPath {
                        path: dir.to_path_buf(),
                        reason: format!("'{}' does not occur in the path", from),
                    });
                }
                Ok(PathBuf::from(text.replace(from.as_str(), to)))
            }
            PathRule::Subfolder(name) => {
                if name.is_empty() {
                    return Err(Error::OutputPath {
                        path: dir.to_path_buf(),
                        reason: "empty subfolder name".to_string(),
                    });
                }
                Ok(dir.join(name))
            }
        }
    }
}

impl std::str::FromStr for PathRule {
    type Err = String;

    /// `from>>to` is a replacement, anything else a subfolder name.
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.split_once(">>") {
            Some((from, _)) if from.is_empty() => {
                Err(format!("replacement rule '{}' has an empty search string", s))
            }
            Some((from, to)) => Ok(PathRule::Replace {
                from: from.to_string(),
                to: to.to_string(),
            }),
            None if s.is_empty() => Err("empty output rule".to_string()),
            None => Ok(PathRule::Subfolder(s.to_string())),
        }
    }
}

/// Where results are written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputTarget {
    /// All results go to this directory
    Fixed(PathBuf),
    /// One directory per input, derived from the input's parent directory
    DerivedFromInput(PathRule),
}

impl OutputTarget {
    /// Output directory for results computed from `input_file`.
    pub fn resolve(&self, input_file: &Path) -> Result<PathBuf> {
        match self {
            OutputTarget::Fixed(dir) => Ok(dir.clone()),
            OutputTarget::DerivedFromInput(rule) => {
                let parent = input_file.parent().unwrap_or_else(|| Path::new("."));
                rule.apply(parent)
            }
        }
    }
}

/// What happens when one image of a batch fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorPolicy {
    /// Stop the batch and return the error
    #[default]
    FailFast,
    /// Record the failure and move on to the next image
    Continue,
}

/// Model selection and inference hints for one object category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Pretrained model identifier, e.g. `cyto` or `nuclei`
    pub model_type: String,
    /// Typical object diameter in pixels at working resolution
    pub object_size: f32,
    #[serde(default)]
    pub device: Device,
}

impl ModelConfig {
    pub fn new(model_type: impl Into<String>, object_size: f32, device: Device) -> Result<Self> {
        let config = Self {
            model_type: model_type.into(),
            object_size,
            device,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.model_type.trim().is_empty() {
            return Err(Error::InvalidArgument {
                arg: "model_type",
                value: self.model_type.clone(),
            });
        }
        if !(self.object_size.is_finite() && self.object_size > 0.0) {
            return Err(Error::InvalidArgument {
                arg: "object_size",
                value: self.object_size.to_string(),
            });
        }
        Ok(())
    }

    /// Scale factor handed to the model so objects appear at its training diameter.
    pub fn rescale_factor(&self) -> f32 {
        crate::model::REFERENCE_DIAMETER / self.object_size
    }
}

/// Input discovery settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveryParams {
    /// Root folder to scan
    pub root: PathBuf,
    /// Substring a file name must contain (e.g. the cytoplasm channel tag)
    pub pattern: String,
    /// Substring replacing `pattern` to find the paired nucleus image
    #[serde(default)]
    pub pair_pattern: Option<String>,
    /// File name suffix, e.g. `.png`
    pub extension: String,
    /// Only keep files whose parent directory has this name
    #[serde(default)]
    pub subfolder: Option<String>,
    #[serde(default = "default_recursive")]
    pub recursive: bool,
}

fn default_recursive() -> bool {
    true
}

/// Segmentation run parameters suitable for config files
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentationParams {
    pub discovery: DiscoveryParams,
    #[serde(default)]
    pub working_size: WorkingSize,
    pub output: OutputTarget,
    #[serde(default)]
    pub mask_format: MaskFormat,
    #[serde(default)]
    pub error_policy: ErrorPolicy,
    /// Also write the multi-panel segmentation overview
    #[serde(default = "default_overview")]
    pub overview: bool,
}

fn default_overview() -> bool {
    true
}

impl SegmentationParams {
    pub fn new(discovery: DiscoveryParams, output: OutputTarget) -> Self {
        Self {
            discovery,
            working_size: WorkingSize::Original,
            output,
            mask_format: MaskFormat::Png,
            error_policy: ErrorPolicy::FailFast,
            overview: true,
        }
    }

    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let params: SegmentationParams = serde_json::from_str(&text)?;
        params.validate()?;
        Ok(params)
    }

    pub fn validate(&self) -> Result<()> {
        if self.discovery.pattern.is_empty() {
            return Err(Error::InvalidArgument {
                arg: "pattern",
                value: String::new(),
            });
        }
        if let Some(pair) = &self.discovery.pair_pattern {
            if pair.is_empty() || *pair == self.discovery.pattern {
                return Err(Error::InvalidArgument {
                    arg: "pair_pattern",
                    value: pair.clone(),
                });
            }
        }
        self.working_size.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_working_size() {
        assert_eq!("original".parse::<WorkingSize>(), Ok(WorkingSize::Original));
        assert_eq!("1024".parse::<WorkingSize>(), Ok(WorkingSize::LongSide(1024)));
        assert_eq!(
            "256x512".parse::<WorkingSize>(),
            Ok(WorkingSize::Exact(ImageSize::new(256, 512)))
        );
        assert!("0".parse::<WorkingSize>().is_err());
        assert!("big".parse::<WorkingSize>().is_err());
    }

    #[test]
    fn parses_path_rules() {
        assert_eq!(
            "acquisition>>analysis".parse::<PathRule>(),
            Ok(PathRule::Replace {
                from: "acquisition".to_string(),
                to: "analysis".to_string()
            })
        );
        assert_eq!(
            "segmentation".parse::<PathRule>(),
            Ok(PathRule::Subfolder("segmentation".to_string()))
        );
        assert!(">>x".parse::<PathRule>().is_err());
    }

    #[test]
    fn resolves_output_targets() {
        let input = Path::new("/data/acquisition/well_A1/img_cy3.png");

        let fixed = OutputTarget::Fixed(PathBuf::from("/out"));
        assert_eq!(fixed.resolve(input).unwrap(), PathBuf::from("/out"));

        let replace = OutputTarget::DerivedFromInput(PathRule::Replace {
            from: "acquisition".to_string(),
            to: "analysis".to_string(),
        });
        assert_eq!(
            replace.resolve(input).unwrap(),
            PathBuf::from("/data/analysis/well_A1")
        );

        let sub = OutputTarget::DerivedFromInput(PathRule::Subfolder("seg".to_string()));
        assert_eq!(
            sub.resolve(input).unwrap(),
            PathBuf::from("/data/acquisition/well_A1/seg")
        );

        let missing = OutputTarget::DerivedFromInput(PathRule::Replace {
            from: "raw".to_string(),
            to: "analysis".to_string(),
        });
        assert!(matches!(missing.resolve(input), Err(Error::OutputPath { .. })));
    }

    #[test]
    fn model_config_is_validated() {
        let config = ModelConfig::new("cyto", 60.0, Device::Cpu).unwrap();
        assert!((config.rescale_factor() - 0.5).abs() < 1e-6);
        assert!(ModelConfig::new("", 30.0, Device::Cpu).is_err());
        assert!(ModelConfig::new("nuclei", 0.0, Device::Cpu).is_err());
        assert!(ModelConfig::new("nuclei", f32::NAN, Device::Gpu(0)).is_err());
    }

    #[test]
    fn params_round_trip_through_json() {
        let mut params = SegmentationParams::new(
            DiscoveryParams {
                root: PathBuf::from("/data"),
                pattern: "cy3".to_string(),
                pair_pattern: Some("dapi".to_string()),
                extension: ".png".to_string(),
                subfolder: None,
                recursive: true,
            },
            OutputTarget::DerivedFromInput(PathRule::Subfolder("seg".to_string())),
        );
        params.working_size = WorkingSize::LongSide(512);
        let json = serde_json::to_string(&params).unwrap();
        let back: SegmentationParams = serde_json::from_str(&json).unwrap();
        assert_eq!(back, params);
        assert!(back.validate().is_ok());
    }

    #[test]
    fn pair_pattern_must_differ() {
        let params = SegmentationParams::new(
            DiscoveryParams {
                root: PathBuf::from("/data"),
                pattern: "dapi".to_string(),
                pair_pattern: Some("dapi".to_string()),
                extension: ".tif".to_string(),
                subfolder: None,
                recursive: false,
            },
            OutputTarget::Fixed(PathBuf::from("/out")),
        );
        assert!(params.validate().is_err());
    }
}
