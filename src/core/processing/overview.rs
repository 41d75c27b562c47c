//! Flow and segmentation overview rasters.
//!
//! The overview places four panels side by side: the stacked input, the input with
//! object outlines in red, the input blended with per-label colours, and the flow
//! rendering returned by the model. All rasters are interleaved RGB bytes.
use ndarray::{Array2, Array3, ArrayView2, Axis};

use crate::error::{Error, Result};

const OUTLINE_COLOR: [u8; 3] = [255, 0, 0];
const OVERLAY_ALPHA: f32 = 0.5;
const PANELS: usize = 4;

/// Interleaved 8-bit RGB image.
#[derive(Debug, Clone, PartialEq)]
pub struct RgbRaster {
    pub width: usize,
    pub height: usize,
    pub data: Vec<u8>,
}

/// Value at fraction `q` of the sorted finite values.
fn percentile(sorted: &[f32], q: f32) -> f32 {
    let idx = ((sorted.len() - 1) as f32 * q).round() as usize;
    sorted[idx.min(sorted.len() - 1)]
}

/// Stretch the 1st..99th percentile range of `plane` to 0..255.
pub fn normalize_to_u8(plane: ArrayView2<'_, f32>) -> Vec<u8> {
    let mut values: Vec<f32> = plane.iter().copied().filter(|v| v.is_finite()).collect();
    if values.is_empty() {
        return vec![0; plane.len()];
    }
    values.sort_by(|a, b| a.total_cmp(b));
    let lo = percentile(&values, 0.01);
    let hi = percentile(&values, 0.99);
    let span = hi - lo;
    if span <= f32::EPSILON {
        return vec![0; plane.len()];
    }

    plane
        .iter()
        .map(|&v| {
            if v.is_finite() {
                (((v - lo) / span) * 255.0).round().clamp(0.0, 255.0) as u8
            } else {
                0
            }
        })
        .collect()
}

/// Interleaved RGB view of a stacked HWC image, each channel stretched independently.
pub fn stacked_to_rgb(image: &Array3<f32>) -> Result<RgbRaster> {
    let (height, width, channels) = image.dim();
    if channels != 3 {
        return Err(Error::InvalidShape(format!(
            "expected 3 channels, got {}",
            channels
        )));
    }
    let planes: Vec<Vec<u8>> = image
        .axis_iter(Axis(2))
        .map(normalize_to_u8)
        .collect();

    let mut data = Vec::with_capacity(height * width * 3);
    for i in 0..height * width {
        data.push(planes[0][i]);
        data.push(planes[1][i]);
        data.push(planes[2][i]);
    }
    Ok(RgbRaster {
        width,
        height,
        data,
    })
}

/// Flow rendering as returned by the model.
pub fn flow_to_rgb(flow: &Array3<u8>) -> Result<RgbRaster> {
    let (height, width, channels) = flow.dim();
    if channels != 3 {
        return Err(Error::InvalidShape(format!(
            "flow must have 3 channels, got {}",
            channels
        )));
    }
    Ok(RgbRaster {
        width,
        height,
        data: flow.iter().copied().collect(),
    })
}

/// Stable, well-separated colour for a label (golden-ratio hue walk).
pub fn label_color(label: u32) -> [u8; 3] {
    const GOLDEN: f32 = 0.618_034;
    let hue = (label as f32 * GOLDEN).fract() * 6.0;
    let (s, v) = (0.75_f32, 0.95_f32);
    let c = v * s;
    let x = c * (1.0 - ((hue % 2.0) - 1.0).abs());
    let m = v - c;
    let (r, g, b) = match hue as u32 {
        0 => (c, x, 0.0),
        1 => (x, c, 0.0),
        2 => (0.0, c, x),
        3 => (0.0, x, c),
        4 => (x, 0.0, c),
        _ => (c, 0.0, x),
    };
    [
        ((r + m) * 255.0).round() as u8,
        ((g + m) * 255.0).round() as u8,
        ((b + m) * 255.0).round() as u8,
    ]
}

/// Object pixels with at least one 4-neighbour carrying a different value.
/// Pixels on the image border count as outline.
pub fn mask_outlines(mask: &Array2<u32>) -> Array2<bool> {
    let (rows, cols) = mask.dim();
    Array2::from_shape_fn((rows, cols), |(r, c)| {
        let label = mask[[r, c]];
        if label == 0 {
            return false;
        }
        if r == 0 || c == 0 || r + 1 == rows || c + 1 == cols {
            return true;
        }
        mask[[r - 1, c]] != label
            || mask[[r + 1, c]] != label
            || mask[[r, c - 1]] != label
            || mask[[r, c + 1]] != label
    })
}

fn outline_panel(base: &RgbRaster, outlines: &Array2<bool>) -> Vec<u8> {
    let mut data = base.data.clone();
    for (i, &edge) in outlines.iter().enumerate() {
        if edge {
            data[i * 3..i * 3 + 3].copy_from_slice(&OUTLINE_COLOR);
        }
    }
    data
}

fn overlay_panel(base: &RgbRaster, mask: &Array2<u32>) -> Vec<u8> {
    let mut data = base.data.clone();
    for (i, &label) in mask.iter().enumerate() {
        if label == 0 {
            continue;
        }
        let color = label_color(label);
        for ch in 0..3 {
            let px = data[i * 3 + ch] as f32;
            data[i * 3 + ch] =
                (px * (1.0 - OVERLAY_ALPHA) + color[ch] as f32 * OVERLAY_ALPHA).round() as u8;
        }
    }
    data
}

/// Four-panel overview of one prediction at working resolution.
pub fn render_overview(
    image: &Array3<f32>,
    mask: &Array2<u32>,
    flow: &Array3<u8>,
) -> Result<RgbRaster> {
    let base = stacked_to_rgb(image)?;
    let flow = flow_to_rgb(flow)?;
    let dims = (base.height, base.width);
    if mask.dim() != dims || (flow.height, flow.width) != dims {
        return Err(Error::InvalidShape(format!(
            "overview panels disagree: image {:?}, mask {:?}, flow {:?}",
            dims,
            mask.dim(),
            (flow.height, flow.width)
        )));
    }

    let outlines = mask_outlines(mask);
    let panels = [
        base.data.clone(),
        outline_panel(&base, &outlines),
        overlay_panel(&base, mask),
        flow.data,
    ];

    let (height, width) = dims;
    let out_width = width * PANELS;
    let mut data = Vec::with_capacity(out_width * height * 3);
    for row in 0..height {
        for panel in &panels {
            let start = row * width * 3;
            data.extend_from_slice(&panel[start..start + width * 3]);
        }
    }

    Ok(RgbRaster {
        width: out_width,
        height,
        data,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn outlines_mark_object_borders() {
        let mut mask = Array2::<u32>::zeros((5, 5));
        mask.slice_mut(ndarray::s![1..4, 1..4]).fill(3);
        let edges = mask_outlines(&mask);
        assert!(edges[[1, 1]]);
        assert!(edges[[1, 2]]);
        assert!(!edges[[2, 2]]);
        assert!(!edges[[0, 0]]);
    }

    #[test]
    fn label_colors_are_stable_and_distinct() {
        assert_eq!(label_color(7), label_color(7));
        assert_ne!(label_color(1), label_color(2));
    }

    #[test]
    fn normalize_flat_plane_is_black() {
        let plane = Array2::<f32>::from_elem((3, 3), 2.0);
        assert!(normalize_to_u8(plane.view()).iter().all(|&v| v == 0));
    }

    #[test]
    fn normalize_spans_full_range() {
        let plane = array![[0.0_f32, 0.5], [1.0, 1.0]];
        let out = normalize_to_u8(plane.view());
        assert_eq!(out[0], 0);
        assert_eq!(out[3], 255);
    }

    #[test]
    fn overview_has_four_panels() {
        let image = Array3::<f32>::from_shape_fn((4, 6, 3), |(r, c, ch)| (r * c + ch) as f32);
        let mut mask = Array2::<u32>::zeros((4, 6));
        mask[[1, 1]] = 1;
        let flow = Array3::<u8>::from_elem((4, 6, 3), 9);

        let overview = render_overview(&image, &mask, &flow).unwrap();
        assert_eq!(overview.width, 24);
        assert_eq!(overview.height, 4);
        assert_eq!(overview.data.len(), 24 * 4 * 3);
        // first pixel of the flow panel in row 0
        let idx = 18 * 3;
        assert_eq!(&overview.data[idx..idx + 3], &[9, 9, 9]);
        // outline panel paints the single-pixel object red (row 1, column 1)
        let idx = (24 + 6 + 1) * 3;
        assert_eq!(&overview.data[idx..idx + 3], &OUTLINE_COLOR);
    }

    #[test]
    fn overview_rejects_mismatched_flow() {
        let image = Array3::<f32>::zeros((4, 6, 3));
        let mask = Array2::<u32>::zeros((4, 6));
        let flow = Array3::<u8>::zeros((2, 3, 3));
        assert!(render_overview(&image, &mask, &flow).is_err());
    }
}
