use clap::{Parser, Subcommand};
use std::path::PathBuf;

use cellseg::types::{ImageSize, MaskFormat};

#[derive(Parser)]
#[command(name = "cellseg", version, about = "Cell and nucleus segmentation batch driver")]
pub struct CliArgs {
    /// Enable debug logging
    #[arg(long, global = true, default_value_t = false)]
    pub log: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Upsample a label mask to a new size, one object at a time
    Rescale {
        /// Input label mask (16-bit PNG or integer TIFF)
        #[arg(short, long)]
        mask: PathBuf,

        /// Target size as HxW, e.g. 1024x1360
        #[arg(long, conflicts_with = "reference")]
        size: Option<ImageSize>,

        /// Take the target size from this image
        #[arg(long)]
        reference: Option<PathBuf>,

        /// Output mask file
        #[arg(short, long)]
        output: PathBuf,

        /// Output mask format. Defaults to the output file extension, else png
        #[arg(short = 'f', long, value_enum)]
        format: Option<MaskFormat>,
    },

    /// List the images (and paired images) a segmentation run would process
    Scan {
        /// Root folder to scan
        #[arg(long)]
        input_dir: Option<PathBuf>,

        /// Substring the file name must contain, e.g. the cytoplasm channel tag
        #[arg(long = "channel", alias = "pattern")]
        pattern: Option<String>,

        /// Substring replacing --channel to locate the paired nucleus image
        #[arg(long)]
        pair: Option<String>,

        /// File extension including the dot
        #[arg(long, default_value = ".png")]
        ext: String,

        /// Only keep files whose parent directory has this name
        #[arg(long)]
        subfolder: Option<String>,

        /// Do not descend into subdirectories
        #[arg(long, default_value_t = false)]
        flat: bool,

        /// Print the work list as JSON
        #[arg(long, default_value_t = false)]
        json: bool,

        /// Load discovery settings from a JSON segmentation config instead
        #[arg(long, conflicts_with_all = ["input_dir", "pattern", "pair", "subfolder", "flat"])]
        config: Option<PathBuf>,
    },
}
