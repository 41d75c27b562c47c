use std::path::Path;

use image::{ImageBuffer, ImageFormat, Luma, Rgb};

use crate::error::{Error, Result};

pub fn write_png_u16(output: &Path, cols: usize, rows: usize, data: &[u16]) -> Result<()> {
    let buf = ImageBuffer::<Luma<u16>, Vec<u16>>::from_raw(cols as u32, rows as u32, data.to_vec())
        .ok_or_else(|| {
            Error::InvalidShape(format!("{} values do not fill {}x{}", data.len(), rows, cols))
        })?;
    buf.save_with_format(output, ImageFormat::Png)?;
    Ok(())
}

pub fn write_rgb_png(output: &Path, cols: usize, rows: usize, rgb_data: &[u8]) -> Result<()> {
    let buf = ImageBuffer::<Rgb<u8>, Vec<u8>>::from_raw(cols as u32, rows as u32, rgb_data.to_vec())
        .ok_or_else(|| {
            Error::InvalidShape(format!(
                "{} bytes do not fill an RGB {}x{}",
                rgb_data.len(),
                rows,
                cols
            ))
        })?;
    buf.save_with_format(output, ImageFormat::Png)?;
    Ok(())
}
