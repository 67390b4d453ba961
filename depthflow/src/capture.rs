//! # Depth capture sources
//!
//! The pipeline only sees depth hardware through the `DepthCapture` trait:
//! one raw sample per call, `Ok(None)` when nothing is ready this cycle, and
//! `Err` for unrecoverable faults. Replay and synthetic sources are provided
//! for offline runs and tests; real sensor bring-up lives behind the same
//! trait in its own crate.

use crate::error::{Error, Result};
use crate::frame::DepthFrame;
use std::io::Read;

/// Depth sample source.
pub trait DepthCapture {
    /// Native sensor dimensions of the frames this source produces.
    fn dimensions(&self) -> (usize, usize);

    /// Fetch the next raw depth sample.
    ///
    /// Returns `Ok(Some(frame))` when a sample is ready, `Ok(None)` when
    /// nothing is available this cycle (normal under sensor jitter), and
    /// `Err` on an unrecoverable fault. After an `Err` the source must not
    /// be polled again.
    fn next_frame(&mut self) -> Result<Option<DepthFrame>>;

    /// Release the underlying resource.
    ///
    /// Must be safe to call more than once; the driver guarantees it runs
    /// exactly once per pipeline lifetime on every exit path.
    fn stop(&mut self);
}

impl DepthCapture for Box<dyn DepthCapture> {
    fn dimensions(&self) -> (usize, usize) {
        (**self).dimensions()
    }

    fn next_frame(&mut self) -> Result<Option<DepthFrame>> {
        (**self).next_frame()
    }

    fn stop(&mut self) {
        (**self).stop()
    }
}

/// Replay capture reading raw little-endian z16 frames from a stream.
///
/// The stream is a bare concatenation of `width * height` 16-bit samples per
/// frame with no per-frame header. Exhausting the stream surfaces as a
/// capture fault, ending the pipeline the same way a disconnect would.
pub struct ReplayCapture<T> {
    reader: T,
    width: usize,
    height: usize,
}

impl<T: Read> ReplayCapture<T> {
    pub fn new(reader: T, width: usize, height: usize) -> Self {
        Self {
            reader,
            width,
            height,
        }
    }
}

impl<T: Read> DepthCapture for ReplayCapture<T> {
    fn dimensions(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    fn next_frame(&mut self) -> Result<Option<DepthFrame>> {
        let mut buf = vec![0u8; self.width * self.height * 2];
        let mut filled = 0;

        while filled < buf.len() {
            match self.reader.read(&mut buf[filled..]) {
                Ok(0) if filled == 0 => {
                    return Err(Error::Capture("depth stream ended".into()));
                }
                Ok(0) => {
                    return Err(Error::Capture("truncated depth frame".into()));
                }
                Ok(n) => filled += n,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => {}
                Err(e) => return Err(Error::Capture(e.to_string())),
            }
        }

        let data = buf
            .chunks_exact(2)
            .map(|b| u16::from_le_bytes([b[0], b[1]]))
            .collect();

        Ok(Some(DepthFrame::from_vec(data, self.width)))
    }

    fn stop(&mut self) {}
}

/// Synthetic capture producing a rectangular near object drifting across a
/// flat far background.
///
/// Runs indefinitely; stop it through the driver's cancel token.
pub struct SyntheticCapture {
    width: usize,
    height: usize,
    block_size: usize,
    /// Horizontal drift per frame, in native pixels.
    step: usize,
    frame_index: usize,
}

impl SyntheticCapture {
    /// Background (far) depth reading.
    const FAR: u16 = 2000;
    /// Block (near) depth reading.
    const NEAR: u16 = 600;

    pub fn new(width: usize, height: usize, block_size: usize, step: usize) -> Self {
        Self {
            width,
            height,
            block_size,
            step,
            frame_index: 0,
        }
    }
}

impl DepthCapture for SyntheticCapture {
    fn dimensions(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    fn next_frame(&mut self) -> Result<Option<DepthFrame>> {
        let mut data = vec![Self::FAR; self.width * self.height];

        // Drift the block horizontally, wrapping before it touches the
        // right border.
        let range = self.width.saturating_sub(2 * self.block_size).max(1);
        let bx = self.block_size / 2 + (self.frame_index * self.step) % range;
        let by = (self.height - self.block_size) / 2;

        for y in by..by + self.block_size {
            for x in bx..bx + self.block_size {
                data[y * self.width + x] = Self::NEAR;
            }
        }

        self.frame_index += 1;
        Ok(Some(DepthFrame::from_vec(data, self.width)))
    }

    fn stop(&mut self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replay_reads_frames_then_faults() {
        // Two 2x2 frames of known samples.
        let mut bytes = vec![];
        for v in [1u16, 2, 3, 4, 5, 6, 7, 8] {
            bytes.extend_from_slice(&v.to_le_bytes());
        }

        let mut capture = ReplayCapture::new(&bytes[..], 2, 2);
        let a = capture.next_frame().unwrap().unwrap();
        assert_eq!(a.as_slice(), &[1, 2, 3, 4]);
        let b = capture.next_frame().unwrap().unwrap();
        assert_eq!(b.as_slice(), &[5, 6, 7, 8]);
        assert!(matches!(capture.next_frame(), Err(Error::Capture(_))));
    }

    #[test]
    fn replay_faults_on_truncated_frame() {
        let bytes = [1u8, 0, 2]; // one and a half samples
        let mut capture = ReplayCapture::new(&bytes[..], 2, 2);
        assert!(matches!(capture.next_frame(), Err(Error::Capture(_))));
    }

    #[test]
    fn synthetic_frames_move_between_captures() {
        let mut capture = SyntheticCapture::new(64, 64, 16, 4);
        let a = capture.next_frame().unwrap().unwrap();
        let b = capture.next_frame().unwrap().unwrap();
        assert_eq!(a.dim(), (64, 64));
        assert_ne!(a.as_slice(), b.as_slice());
    }
}
