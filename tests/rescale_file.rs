use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use image::{ImageBuffer, Luma};
use tempfile::TempDir;
use tiff::encoder::{TiffEncoder, colortype};

use cellseg::io::read_label_mask_raw;
use cellseg::{Error, ImageSize, MaskFormat, rescale_mask_file};

fn write_png_mask(path: &Path, width: u32, height: u32, labels: &[u16]) {
    let buf: ImageBuffer<Luma<u16>, Vec<u16>> =
        ImageBuffer::from_raw(width, height, labels.to_vec()).unwrap();
    buf.save(path).unwrap();
}

fn write_i32_tiff(path: &Path, width: u32, height: u32, labels: &[i32]) {
    let mut encoder = TiffEncoder::new(BufWriter::new(File::create(path).unwrap())).unwrap();
    encoder
        .write_image::<colortype::GrayI32>(width, height, labels)
        .unwrap();
}

#[test]
fn png_mask_is_upsampled_per_object() {
    let tmp = TempDir::new().unwrap();
    let input = tmp.path().join("small.png");
    #[rustfmt::skip]
    let labels = [
        1, 1, 0, 0,
        1, 1, 0, 0,
        0, 0, 0, 0,
        0, 0, 0, 0,
    ];
    write_png_mask(&input, 4, 4, &labels);

    let output = tmp.path().join("nested").join("full.png");
    let full = rescale_mask_file(&input, &output, ImageSize::new(8, 8), MaskFormat::Png).unwrap();
    assert!(output.is_file());

    for ((r, c), &v) in full.indexed_iter() {
        let expected = if r <= 4 && c <= 4 { 1 } else { 0 };
        assert_eq!(v, expected, "at ({}, {})", r, c);
    }

    let back = read_label_mask_raw(&output).unwrap();
    assert_eq!(back.shape(), &[8, 8]);
    assert_eq!(back.iter().filter(|&&v| v == 1).count(), 25);
}

#[test]
fn tiff_labels_keep_their_identity() {
    let tmp = TempDir::new().unwrap();
    let input = tmp.path().join("small.tif");
    #[rustfmt::skip]
    let labels = [
        0, 0, 0, 0, 0,
        0, 3, 0, 0, 0,
        0, 0, 0, 0, 0,
        0, 0, 0, 7, 0,
        0, 0, 0, 0, 0,
    ];
    write_i32_tiff(&input, 5, 5, &labels);

    let output = tmp.path().join("full.tif");
    let full = rescale_mask_file(&input, &output, ImageSize::new(50, 50), MaskFormat::Tiff).unwrap();
    assert_eq!(full.iter().filter(|&&v| v == 3).count(), 400);
    assert_eq!(full.iter().filter(|&&v| v == 7).count(), 400);
    assert!(full.iter().all(|&v| v == 0 || v == 3 || v == 7));

    let back = read_label_mask_raw(&output).unwrap();
    assert_eq!(back.shape(), &[50, 50]);
}

#[test]
fn negative_tiff_labels_are_rejected() {
    let tmp = TempDir::new().unwrap();
    let input = tmp.path().join("bad.tif");
    write_i32_tiff(&input, 2, 2, &[0, 1, -4, 0]);

    let output = tmp.path().join("out.png");
    let result = rescale_mask_file(&input, &output, ImageSize::new(4, 4), MaskFormat::Png);
    assert!(matches!(
        result,
        Err(Error::InvalidLabel {
            value: -4,
            row: 1,
            col: 0
        })
    ));
    assert!(!output.exists());
}

#[test]
fn labels_beyond_16_bits_cannot_be_saved() {
    let tmp = TempDir::new().unwrap();
    let input = tmp.path().join("big.tif");
    write_i32_tiff(&input, 2, 1, &[70_000, 0]);

    let output = tmp.path().join("out.png");
    let result = rescale_mask_file(&input, &output, ImageSize::new(2, 4), MaskFormat::Png);
    assert!(matches!(result, Err(Error::LabelOverflow { label: 70_000 })));
}

#[test]
fn missing_input_is_an_io_error() {
    let tmp = TempDir::new().unwrap();
    let result = rescale_mask_file(
        &tmp.path().join("nope.png"),
        &tmp.path().join("out.png"),
        ImageSize::new(4, 4),
        MaskFormat::Png,
    );
    assert!(result.is_err());
}
