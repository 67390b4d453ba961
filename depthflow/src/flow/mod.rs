//! # Dense motion field extraction
//!
//! Turns a pair of consecutive normalized frames into a conditioned 8-bit
//! motion magnitude field.

pub mod farneback;
pub mod magnitude;
pub mod poly;

use crate::config::FlowParams;
use crate::frame::GrayFrame;

pub use farneback::FlowField;

/// Dense motion field extractor.
///
/// Wraps the flow estimator and the magnitude conditioning stage behind one
/// call per frame pair.
pub struct MotionExtractor {
    params: FlowParams,
    band: (f32, f32),
}

impl MotionExtractor {
    /// Create an extractor.
    ///
    /// # Arguments
    ///
    /// * `params` - dense flow estimator parameters.
    /// * `band` - `(min_speed, max_speed)` magnitude clamp.
    pub fn new(params: FlowParams, band: (f32, f32)) -> Self {
        Self { params, band }
    }

    /// Extract the motion field between two consecutive frames.
    ///
    /// Both frames must share dimensions; the output has the same
    /// dimensions. Direction information is discarded - only per-pixel
    /// motion magnitude survives.
    pub fn extract(&self, prev: &GrayFrame, curr: &GrayFrame) -> GrayFrame {
        let flow = farneback::calc_flow(&prev.to_float(), &curr.to_float(), &self.params);
        magnitude::condition(&flow, self.band)
    }
}
