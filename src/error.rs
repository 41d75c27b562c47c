//! Crate-level error type and `Result` alias for stable, structured error handling.
//! Converts underlying I/O, image codec, TIFF, directory-walk and resize errors, and
//! provides semantic variants for mask validation and batch-level failures.
use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid shape: {0}")]
    InvalidShape(String),

    #[error("Invalid label value {value} at ({row}, {col}); labels must be non-negative 32-bit integers")]
    InvalidLabel { value: i64, row: usize, col: usize },

    #[error("Label {label} does not fit into a 16-bit mask")]
    LabelOverflow { label: u32 },

    #[error("Paired image not found: {}", .path.display())]
    MissingPairedFile { path: PathBuf },

    #[error("No images found in {} matching *{pattern}*{extension}", .root.display())]
    EmptyInputSet {
        root: PathBuf,
        pattern: String,
        extension: String,
    },

    #[error("Input path does not exist: {}", .path.display())]
    InputPathNotFound { path: PathBuf },

    #[error("Cannot derive output path for {}: {reason}", .path.display())]
    OutputPath { path: PathBuf, reason: String },

    #[error("Model error: {0}")]
    Model(String),

    #[error("Invalid argument: {arg}={value}")]
    InvalidArgument { arg: &'static str, value: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image codec error: {0}")]
    Image(#[from] image::ImageError),

    #[error("TIFF error: {0}")]
    Tiff(#[from] tiff::TiffError),

    #[error("Directory scan error: {0}")]
    Walk(#[from] walkdir::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Resize error: {0}")]
    Resize(String),
}

impl Error {
    pub fn model<E: std::fmt::Display>(e: E) -> Self {
        Error::Model(e.to_string())
    }

    pub fn resize<E: std::fmt::Display>(e: E) -> Self {
        Error::Resize(e.to_string())
    }

    /// Process exit code for this error kind. Each taxonomy entry maps to its own code.
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::InvalidArgument { .. } => 2,
            Error::InvalidShape(_) => 3,
            Error::InvalidLabel { .. } => 4,
            Error::MissingPairedFile { .. } => 5,
            Error::EmptyInputSet { .. } => 6,
            Error::InputPathNotFound { .. } => 7,
            Error::LabelOverflow { .. } => 8,
            Error::Model(_) => 9,
            Error::OutputPath { .. } => 10,
            Error::Io(_)
            | Error::Image(_)
            | Error::Tiff(_)
            | Error::Walk(_)
            | Error::Json(_)
            | Error::Resize(_) => 11,
        }
    }
}
