//! # Pipeline error taxonomy
//!
//! Three failure kinds with distinct propagation policies: configuration
//! errors abort before streaming starts, capture faults abort a running
//! pipeline, sink errors are logged and the cycle continues. "No frame ready
//! this cycle" is not an error at all - captures report it as `Ok(None)`.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// An invariant was violated before streaming started. Fatal: the
    /// pipeline never enters its loop.
    #[error("configuration error: {0}")]
    Config(String),

    /// The capture collaborator reported an unrecoverable fault (device
    /// disconnect, stream end, driver failure). Fatal to the pipeline
    /// instance; retry policy belongs to an outer supervisor.
    #[error("capture fault: {0}")]
    Capture(String),

    /// Publishing a grid failed. Non-fatal: the sink is fire-and-forget.
    #[error("sink error: {0}")]
    Sink(String),
}

pub type Result<T> = std::result::Result<T, Error>;
