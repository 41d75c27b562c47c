//! I/O layer: input discovery and pairing (`discovery`), image and label mask
//! decoding (`reader`), and `writers` for 16-bit masks and RGB rasters.
pub mod discovery;
pub use discovery::{WorkItem, discover_images, plan_work, resolve_pair};

pub mod reader;
pub use reader::{LoadedImage, read_image_size, read_intensity_image, read_label_mask_raw};

pub mod writers;
