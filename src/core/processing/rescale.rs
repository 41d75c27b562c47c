//! Per-object label mask rescaling.
//!
//! A label mask predicted at working resolution is brought back to the resolution of
//! the source image one object at a time: each label's binary footprint is upsampled
//! with linear interpolation, every target pixel with a positive interpolated value is
//! foreground, and the label is written there. Labels are visited in ascending order,
//! so where two upsampled footprints overlap the higher label wins.
use std::collections::BTreeMap;

use ndarray::{Array2, ArrayD, ArrayView2, Ix2};
use tracing::debug;

use crate::error::{Error, Result};
use crate::types::ImageSize;

/// Two-tap linear sample along one axis: `(1 - frac) * src[lo] + frac * src[hi]`.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Tap {
    lo: usize,
    hi: usize,
    frac: f32,
}

impl Tap {
    /// True if this tap reads any source index in `[first, last]` with non-zero weight.
    #[inline]
    fn touches(&self, first: usize, last: usize) -> bool {
        (first..=last).contains(&self.lo) || (self.frac > 0.0 && (first..=last).contains(&self.hi))
    }
}

/// Sampling taps for resizing an axis of `src` samples to `dst` samples.
///
/// Pixel centres are aligned: target index `t` reads source coordinate
/// `(t + 0.5) * src / dst - 0.5`, clamped to `[0, src - 1]` (edge replication).
/// The coordinate is evaluated as the exact rational `((2t + 1) * src - dst) / (2 * dst)`
/// so zero weights stay exactly zero.
fn axis_taps(src: usize, dst: usize) -> Vec<Tap> {
    let den = 2 * dst as i64;
    let last = src - 1;
    (0..dst)
        .map(|t| {
            let num = (2 * t as i64 + 1) * src as i64 - dst as i64;
            if num <= 0 {
                return Tap { lo: 0, hi: 0, frac: 0.0 };
            }
            let lo = (num / den) as usize;
            if lo >= last {
                return Tap { lo: last, hi: last, frac: 0.0 };
            }
            let rem = num % den;
            Tap {
                lo,
                hi: lo + 1,
                frac: rem as f32 / den as f32,
            }
        })
        .collect()
}

/// Inclusive bounding box of one label in the small mask.
#[derive(Debug, Clone, Copy)]
struct BoundingBox {
    row_min: usize,
    row_max: usize,
    col_min: usize,
    col_max: usize,
}

impl BoundingBox {
    fn new(row: usize, col: usize) -> Self {
        Self {
            row_min: row,
            row_max: row,
            col_min: col,
            col_max: col,
        }
    }

    fn include(&mut self, row: usize, col: usize) {
        self.row_min = self.row_min.min(row);
        self.row_max = self.row_max.max(row);
        self.col_min = self.col_min.min(col);
        self.col_max = self.col_max.max(col);
    }
}

/// Distinct positive labels with their bounding boxes, in ascending label order.
fn collect_objects(mask: &ArrayView2<'_, u32>) -> BTreeMap<u32, BoundingBox> {
    let mut objects: BTreeMap<u32, BoundingBox> = BTreeMap::new();
    for ((row, col), &label) in mask.indexed_iter() {
        if label == 0 {
            continue;
        }
        objects
            .entry(label)
            .and_modify(|bbox| bbox.include(row, col))
            .or_insert_with(|| BoundingBox::new(row, col));
    }
    objects
}

/// Distinct positive labels present in `mask`, ascending.
pub fn unique_labels(mask: &ArrayView2<'_, u32>) -> Vec<u32> {
    collect_objects(mask).into_keys().collect()
}

/// Linearly upsample a binary footprint onto the target window spanned by
/// `rows` x `cols`. The footprint covers the object's bounding box and reads as 0
/// outside it.
fn upsample_footprint(
    footprint: &Array2<f32>,
    bbox: &BoundingBox,
    rows: &[(usize, Tap)],
    cols: &[(usize, Tap)],
) -> Array2<f32> {
    let sample = |r: usize, c: usize| -> f32 {
        if r < bbox.row_min || r > bbox.row_max || c < bbox.col_min || c > bbox.col_max {
            0.0
        } else {
            footprint[[r - bbox.row_min, c - bbox.col_min]]
        }
    };

    let mut field = Array2::<f32>::zeros((rows.len(), cols.len()));
    for (i, (_, ty)) in rows.iter().enumerate() {
        for (j, (_, tx)) in cols.iter().enumerate() {
            let top = (1.0 - tx.frac) * sample(ty.lo, tx.lo) + tx.frac * sample(ty.lo, tx.hi);
            let bottom = (1.0 - tx.frac) * sample(ty.hi, tx.lo) + tx.frac * sample(ty.hi, tx.hi);
            field[[i, j]] = (1.0 - ty.frac) * top + ty.frac * bottom;
        }
    }
    field
}

/// Rescale a label mask to `target`, preserving object identity.
///
/// Returns an all-zero mask when `small` holds no objects. Fails with
/// [`Error::InvalidShape`] if either shape has a zero dimension.
pub fn rescale_mask(small: ArrayView2<'_, u32>, target: ImageSize) -> Result<Array2<u32>> {
    let (src_rows, src_cols) = small.dim();
    if src_rows == 0 || src_cols == 0 {
        return Err(Error::InvalidShape(format!(
            "label mask must have positive dimensions, got {}x{}",
            src_rows, src_cols
        )));
    }
    if target.is_empty() {
        return Err(Error::InvalidShape(format!(
            "target size must have positive dimensions, got {}",
            target
        )));
    }

    let mut full = Array2::<u32>::zeros(target.dim());
    let objects = collect_objects(&small);
    if objects.is_empty() {
        return Ok(full);
    }

    debug!(
        "Rescaling {} objects from {}x{} to {}",
        objects.len(),
        src_rows,
        src_cols,
        target
    );

    let row_taps = axis_taps(src_rows, target.height);
    let col_taps = axis_taps(src_cols, target.width);

    for (&label, bbox) in &objects {
        let footprint = small
            .slice(ndarray::s![
                bbox.row_min..=bbox.row_max,
                bbox.col_min..=bbox.col_max
            ])
            .mapv(|v| if v == label { 1.0_f32 } else { 0.0 });

        let rows: Vec<(usize, Tap)> = row_taps
            .iter()
            .copied()
            .enumerate()
            .filter(|(_, tap)| tap.touches(bbox.row_min, bbox.row_max))
            .collect();
        let cols: Vec<(usize, Tap)> = col_taps
            .iter()
            .copied()
            .enumerate()
            .filter(|(_, tap)| tap.touches(bbox.col_min, bbox.col_max))
            .collect();

        let field = upsample_footprint(&footprint, bbox, &rows, &cols);
        for ((i, j), &value) in field.indexed_iter() {
            if value > 0.0 {
                full[[rows[i].0, cols[j].0]] = label;
            }
        }
    }

    Ok(full)
}

/// Validating entry point for masks of unknown rank and signedness.
///
/// Fails with [`Error::InvalidShape`] unless `small` is 2-D and `target` names two
/// positive dimensions, and with [`Error::InvalidLabel`] on the first value outside
/// `0..=u32::MAX`.
pub fn rescale_mask_dyn(small: &ArrayD<i64>, target: &[usize]) -> Result<Array2<u32>> {
    let labels = validate_label_mask(small)?;
    let target = match target {
        [height, width] => ImageSize::new(*height, *width),
        other => {
            return Err(Error::InvalidShape(format!(
                "target size must be 2-D to match the mask, got {}-D",
                other.len()
            )));
        }
    };
    rescale_mask(labels.view(), target)
}

/// Check that `mask` is a 2-D grid of non-negative 32-bit labels and convert it.
pub fn validate_label_mask(mask: &ArrayD<i64>) -> Result<Array2<u32>> {
    let mask = mask.view().into_dimensionality::<Ix2>().map_err(|_| {
        Error::InvalidShape(format!("label mask must be 2-D, got {}-D", mask.ndim()))
    })?;

    if let Some(((row, col), &value)) = mask
        .indexed_iter()
        .find(|(_, v)| **v < 0 || **v > u32::MAX as i64)
    {
        return Err(Error::InvalidLabel { value, row, col });
    }

    Ok(mask.mapv(|v| v as u32))
}
