//! # Depth frame normalization
//!
//! Converts a raw depth sample into the reduced 8-bit frame the flow stage
//! consumes: bilinear downsample, then a per-frame min-max rescale onto the
//! full 8-bit range. Absolute depth is deliberately discarded - only
//! per-frame contrast survives.

use crate::frame::{DepthFrame, FloatImage, GrayFrame};

/// Stateless depth frame normalizer.
#[derive(Clone, Debug)]
pub struct FrameNormalizer {
    target_width: usize,
    target_height: usize,
}

impl FrameNormalizer {
    /// Create a normalizer producing frames of the given reduced size.
    pub fn new(target_width: usize, target_height: usize) -> Self {
        Self {
            target_width,
            target_height,
        }
    }

    /// Normalize one raw depth sample.
    ///
    /// Pure function of its input: downsample with bilinear interpolation,
    /// then rescale the frame's own min/max onto [0,255]. A flat frame
    /// (min == max) comes out uniformly zero.
    pub fn normalize(&self, raw: &DepthFrame) -> GrayFrame {
        FloatImage::from(raw)
            .resize_bilinear(self.target_width, self.target_height)
            .minmax_to_gray()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gradient_frame(w: usize, h: usize) -> DepthFrame {
        let data = (0..w * h).map(|i| (i % w) as u16 * 10).collect();
        DepthFrame::from_vec(data, w)
    }

    #[test]
    fn output_has_target_dimensions() {
        let norm = FrameNormalizer::new(320, 240);
        let out = norm.normalize(&gradient_frame(640, 480));
        assert_eq!(out.dim(), (320, 240));
    }

    #[test]
    fn output_spans_full_8bit_range() {
        let norm = FrameNormalizer::new(32, 24);
        let out = norm.normalize(&gradient_frame(64, 48));
        let min = *out.as_slice().iter().min().unwrap();
        let max = *out.as_slice().iter().max().unwrap();
        assert_eq!(min, 0);
        assert_eq!(max, 255);
    }

    #[test]
    fn uniform_frame_collapses_to_zero() {
        let norm = FrameNormalizer::new(16, 16);
        let raw = DepthFrame::from_vec(vec![1234u16; 32 * 32], 32);
        let out = norm.normalize(&raw);
        assert!(out.as_slice().iter().all(|&v| v == 0));
    }
}
