pub mod overview;
pub mod pipeline;
pub mod rescale;
pub mod resize;
pub mod save;
pub mod stack;
