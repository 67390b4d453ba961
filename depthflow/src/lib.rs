//! # Depth-camera motion grid pipeline
//!
//! This library turns a stream of depth-camera frames into a compact motion
//! signal. Each capture cycle normalizes the raw depth sample into a reduced
//! 8-bit frame, computes a dense optical flow field against the previous
//! frame, conditions the flow magnitude into a bounded 8-bit motion field,
//! and reduces that field to a small grid of per-cell mean intensities ready
//! for publishing.
//!
//! The easiest way to use the library is to import its prelude:
//!
//! ```
//! use depthflow::prelude::v1::*;
//! ```

pub mod capture;
pub mod config;
pub mod error;
pub mod filter;
pub mod flow;
pub mod frame;
pub mod grid;
pub mod normalize;
pub mod pipeline;
pub mod sink;

pub mod prelude {
    pub mod v1 {
        pub use crate::{
            capture::DepthCapture,
            config::{FlowParams, PipelineConfig},
            error::{Error, Result},
            flow::MotionExtractor,
            frame::{DepthFrame, FloatImage, GrayFrame},
            grid::{GridAggregator, MotionGrid},
            pipeline::{CancelToken, PipelineDriver, PipelineState},
            sink::MotionSink,
        };
        pub use anyhow::anyhow;
    }
}
