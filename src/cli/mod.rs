//! Command Line Interface (CLI) layer for cellseg.
//!
//! This module defines argument parsing (`args`), error types (`errors`),
//! and the orchestration logic (`runner`) for the `rescale` and `scan`
//! subcommands. It wires user-provided options to the library functionality
//! exposed via `cellseg::api` and `cellseg::io`.
//!
//! Segmentation runs need a model backend and are driven through the library
//! API (`cellseg::api::segment_objects`, `cellseg::api::segment_cells_and_nuclei`).
pub mod args;
pub mod errors;
pub mod runner;

pub use args::CliArgs;
pub use runner::run;
