//! # Motion grid sink
//!
//! The pipeline publishes one grid per processed frame pair, fire and
//! forget: no acknowledgement, no backpressure. Transport implementations
//! live in their own crates.

use crate::error::Result;
use crate::grid::MotionGrid;

/// Consumer of aggregated motion grids.
pub trait MotionSink {
    /// Publish one grid.
    ///
    /// Errors are reported for logging only; the driver never retries or
    /// buffers a failed publish.
    fn publish(&mut self, grid: &MotionGrid) -> Result<()>;
}
