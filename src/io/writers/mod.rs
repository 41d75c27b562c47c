pub mod png;
pub mod tiff;
