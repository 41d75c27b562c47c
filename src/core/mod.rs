//! Core processing building blocks: the label mask rescaler, working-size resize,
//! channel stacking, overview rendering, prediction rounds and save helpers. These
//! are internal primitives consumed by the high-level `api` module.
pub mod params;
pub mod processing;
