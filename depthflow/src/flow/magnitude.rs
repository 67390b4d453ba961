//! # Motion magnitude conditioning
//!
//! Reduces a displacement field to the 8-bit motion field the aggregator
//! consumes: per-pixel magnitude (direction is dropped), Gaussian smoothing
//! against per-pixel noise, clamping to the band of interesting speeds, and
//! a per-frame min-max rescale onto [0,255].

use super::farneback::FlowField;
use crate::filter;
use crate::frame::{FloatImage, GrayFrame};

/// Smoothing kernel applied to the raw magnitude field.
const SMOOTH_KSIZE: usize = 5;

/// Condition a flow field into an 8-bit motion magnitude field.
///
/// `band` is the `(min_speed, max_speed)` clamp applied before rescaling.
/// A field with no motion at all clamps uniformly to `min_speed` and the
/// degenerate rescale renders it as uniform zero.
pub fn condition(flow: &FlowField, band: (f32, f32)) -> GrayFrame {
    let (w, h) = flow.dim();
    let (min_speed, max_speed) = band;

    let mut mag = FloatImage::zeros(w, h);
    for y in 0..h {
        for x in 0..w {
            mag.set(x, y, flow.get(x, y).norm());
        }
    }

    let smoothed = filter::gaussian_blur(&mag, SMOOTH_KSIZE, 0.0);

    let mut clipped = smoothed;
    clipped
        .as_mut_slice()
        .iter_mut()
        .for_each(|v| *v = v.clamp(min_speed, max_speed));

    clipped.minmax_to_gray()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn still_field_renders_as_uniform_zero() {
        let flow = FlowField::zeros(32, 32);
        let field = condition(&flow, (4.0, 32.0));
        assert_eq!(field.dim(), (32, 32));
        assert!(field.as_slice().iter().all(|&v| v == 0));
    }

    #[test]
    fn output_dimensions_match_input() {
        let flow = FlowField::zeros(20, 12);
        let field = condition(&flow, (4.0, 32.0));
        assert_eq!(field.dim(), (20, 12));
    }
}
