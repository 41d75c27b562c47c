use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use ::tiff::encoder::{TiffEncoder, colortype};

use crate::error::Result;

pub fn write_tiff_u16(output: &Path, cols: usize, rows: usize, data: &[u16]) -> Result<()> {
    let file = File::create(output)?;
    let mut encoder = TiffEncoder::new(BufWriter::new(file))?;
    encoder.write_image::<colortype::Gray16>(cols as u32, rows as u32, data)?;
    Ok(())
}
