//! # Pipeline driver
//!
//! Owns the two-slot frame state and sequences normalization, flow
//! extraction and grid aggregation once per capture event. One synchronous
//! loop, one cycle per capture, no overlapping cycles. The capture source is
//! released exactly once on every exit path, including panics, via the
//! driver's `Drop`.

use crate::capture::DepthCapture;
use crate::config::PipelineConfig;
use crate::error::{Error, Result};
use crate::flow::MotionExtractor;
use crate::frame::GrayFrame;
use crate::grid::{GridAggregator, MotionGrid};
use crate::normalize::FrameNormalizer;
use crate::sink::MotionSink;
use log::*;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Driver lifecycle state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PipelineState {
    /// No frame pair yet; the flow stages do not run.
    AwaitingFirstFrame,
    /// Both slots populated, grids are being emitted.
    Streaming,
    /// Terminal. The capture source has been released.
    Stopped,
}

/// Cooperative cancellation flag, checked once per cycle boundary.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request the pipeline stop at the next cycle boundary.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// The previous/current normalized frame slots.
#[derive(Default)]
struct FramePair {
    previous: Option<GrayFrame>,
    current: Option<GrayFrame>,
}

impl FramePair {
    /// Shift current to previous and store a new current frame.
    fn push(&mut self, frame: GrayFrame) {
        self.previous = self.current.take();
        self.current = Some(frame);
    }

    /// Both slots, once populated.
    fn both(&self) -> Option<(&GrayFrame, &GrayFrame)> {
        match (&self.previous, &self.current) {
            (Some(prev), Some(curr)) => Some((prev, curr)),
            _ => None,
        }
    }
}

/// Per-cycle observer of the conditioned motion field and emitted grid.
///
/// Purely observational - visualization hooks go here, nothing feeds back
/// into the pipeline.
pub type CycleObserver = Box<dyn FnMut(&GrayFrame, &MotionGrid)>;

/// Synchronous frame-processing pipeline.
pub struct PipelineDriver<C: DepthCapture, S> {
    capture: C,
    sink: S,
    normalizer: FrameNormalizer,
    extractor: MotionExtractor,
    aggregator: GridAggregator,
    pair: FramePair,
    state: PipelineState,
    released: bool,
    observer: Option<CycleObserver>,
}

impl<C: DepthCapture, S: MotionSink> PipelineDriver<C, S> {
    /// Build a driver, validating every configuration invariant up front.
    ///
    /// On failure the capture source is released before returning, so a
    /// misconfigured pipeline never leaks the device.
    pub fn new(config: &PipelineConfig, mut capture: C, sink: S) -> Result<Self> {
        match Self::build_stages(config, &capture) {
            Ok((normalizer, extractor, aggregator)) => Ok(Self {
                capture,
                sink,
                normalizer,
                extractor,
                aggregator,
                pair: FramePair::default(),
                state: PipelineState::AwaitingFirstFrame,
                released: false,
                observer: None,
            }),
            Err(e) => {
                capture.stop();
                Err(e)
            }
        }
    }

    fn build_stages(
        config: &PipelineConfig,
        capture: &C,
    ) -> Result<(FrameNormalizer, MotionExtractor, GridAggregator)> {
        config.validate()?;

        let dims = capture.dimensions();
        if dims != (config.raw_width, config.raw_height) {
            return Err(Error::Config(format!(
                "capture source delivers {}x{}, configured for {}x{}",
                dims.0, dims.1, config.raw_width, config.raw_height
            )));
        }

        let (rw, rh) = config.reduced_dim();
        Ok((
            FrameNormalizer::new(rw, rh),
            MotionExtractor::new(config.flow.clone(), config.speed_band()),
            GridAggregator::new(rw, rh, config.cell_size)?,
        ))
    }

    /// Attach a per-cycle observer.
    pub fn set_observer(&mut self, observer: CycleObserver) {
        self.observer = Some(observer);
    }

    /// Current lifecycle state.
    pub fn state(&self) -> PipelineState {
        self.state
    }

    /// Run the capture loop until cancellation or a capture fault.
    ///
    /// Returns `Ok(())` on cancellation and the fault otherwise. Either way
    /// the driver ends in `Stopped` with the capture source released.
    pub fn run(&mut self, cancel: &CancelToken) -> Result<()> {
        if self.state == PipelineState::Stopped {
            warn!("run called on a stopped pipeline");
            return Ok(());
        }

        let result = self.run_loop(cancel);

        self.state = PipelineState::Stopped;
        self.release();

        if let Err(e) = &result {
            error!("pipeline stopped: {}", e);
        } else {
            info!("pipeline stopped");
        }

        result
    }

    fn run_loop(&mut self, cancel: &CancelToken) -> Result<()> {
        loop {
            if cancel.is_cancelled() {
                info!("cancellation requested");
                return Ok(());
            }

            let raw = match self.capture.next_frame()? {
                Some(raw) => raw,
                None => {
                    // Normal under sensor jitter - skip the cycle.
                    trace!("no frame available, skipping cycle");
                    continue;
                }
            };

            self.pair.push(self.normalizer.normalize(&raw));

            let (prev, curr) = match self.pair.both() {
                Some(pair) => pair,
                None => {
                    debug!("first frame seeded, awaiting second");
                    continue;
                }
            };

            let field = self.extractor.extract(prev, curr);
            let grid = self.aggregator.aggregate(&field);

            if let Some(observer) = &mut self.observer {
                observer(&field, &grid);
            }

            if let Err(e) = self.sink.publish(&grid) {
                // Fire and forget - a failed publish does not stop the run.
                warn!("publish failed: {}", e);
            }

            if self.state != PipelineState::Streaming {
                self.state = PipelineState::Streaming;
                info!("streaming");
            }
        }
    }

    fn release(&mut self) {
        if !self.released {
            self.released = true;
            self.capture.stop();
            debug!("capture source released");
        }
    }
}

impl<C: DepthCapture, S> Drop for PipelineDriver<C, S> {
    fn drop(&mut self) {
        // Covers exits that never reached run(), including panics.
        if !self.released {
            self.released = true;
            self.capture.stop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::SyntheticCapture;
    use crate::config::PipelineConfig;
    use crate::frame::DepthFrame;
    use std::collections::VecDeque;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex;

    enum Event {
        Frame(DepthFrame),
        Absent,
        Fault,
    }

    /// Capture double driven by a fixed event script; faults when the
    /// script runs out.
    struct ScriptedCapture {
        events: VecDeque<Event>,
        dims: (usize, usize),
        stops: Arc<AtomicUsize>,
    }

    impl ScriptedCapture {
        fn new(events: Vec<Event>, dims: (usize, usize)) -> (Self, Arc<AtomicUsize>) {
            let stops = Arc::new(AtomicUsize::new(0));
            (
                Self {
                    events: events.into(),
                    dims,
                    stops: stops.clone(),
                },
                stops,
            )
        }
    }

    impl DepthCapture for ScriptedCapture {
        fn dimensions(&self) -> (usize, usize) {
            self.dims
        }

        fn next_frame(&mut self) -> Result<Option<DepthFrame>> {
            match self.events.pop_front() {
                Some(Event::Frame(f)) => Ok(Some(f)),
                Some(Event::Absent) => Ok(None),
                Some(Event::Fault) => Err(Error::Capture("simulated device fault".into())),
                None => Err(Error::Capture("script exhausted".into())),
            }
        }

        fn stop(&mut self) {
            self.stops.fetch_add(1, Ordering::SeqCst);
        }
    }

    /// Sink double collecting every published grid.
    #[derive(Clone, Default)]
    struct VecSink(Arc<Mutex<Vec<MotionGrid>>>);

    impl VecSink {
        fn grids(&self) -> Vec<MotionGrid> {
            self.0.lock().unwrap().clone()
        }
    }

    impl MotionSink for VecSink {
        fn publish(&mut self, grid: &MotionGrid) -> Result<()> {
            self.0.lock().unwrap().push(grid.clone());
            Ok(())
        }
    }

    fn small_config() -> PipelineConfig {
        PipelineConfig {
            raw_width: 64,
            raw_height: 48,
            downsample: 2,
            cell_size: 8,
            ..Default::default()
        }
    }

    fn block_depth_frame(w: usize, h: usize, bx: usize) -> DepthFrame {
        let mut data = vec![2000u16; w * h];
        for y in h / 4..h / 2 {
            for x in bx..bx + w / 4 {
                data[y * w + x] = 600;
            }
        }
        DepthFrame::from_vec(data, w)
    }

    #[test]
    fn single_capture_emits_nothing() {
        let (capture, _) = ScriptedCapture::new(
            vec![Event::Frame(block_depth_frame(64, 48, 8))],
            (64, 48),
        );
        let sink = VecSink::default();
        let mut driver = PipelineDriver::new(&small_config(), capture, sink.clone()).unwrap();

        let result = driver.run(&CancelToken::new());
        assert!(matches!(result, Err(Error::Capture(_))));
        assert!(sink.grids().is_empty());
        assert_eq!(driver.state(), PipelineState::Stopped);
    }

    #[test]
    fn second_capture_emits_exactly_once() {
        let (capture, _) = ScriptedCapture::new(
            vec![
                Event::Frame(block_depth_frame(64, 48, 8)),
                Event::Frame(block_depth_frame(64, 48, 12)),
            ],
            (64, 48),
        );
        let sink = VecSink::default();
        let mut driver = PipelineDriver::new(&small_config(), capture, sink.clone()).unwrap();

        let _ = driver.run(&CancelToken::new());
        let grids = sink.grids();
        assert_eq!(grids.len(), 1);
        assert_eq!(grids[0].dim(), (4, 3));
    }

    #[test]
    fn absent_frames_skip_the_cycle() {
        let (capture, _) = ScriptedCapture::new(
            vec![
                Event::Absent,
                Event::Frame(block_depth_frame(64, 48, 8)),
                Event::Absent,
                Event::Absent,
                Event::Frame(block_depth_frame(64, 48, 12)),
                Event::Absent,
            ],
            (64, 48),
        );
        let sink = VecSink::default();
        let mut driver = PipelineDriver::new(&small_config(), capture, sink.clone()).unwrap();

        let _ = driver.run(&CancelToken::new());
        assert_eq!(sink.grids().len(), 1);
    }

    #[test]
    fn identical_frames_emit_uniform_zero_grid() {
        let frame = block_depth_frame(64, 48, 8);
        let (capture, _) = ScriptedCapture::new(
            vec![Event::Frame(frame.clone()), Event::Frame(frame)],
            (64, 48),
        );
        let sink = VecSink::default();
        let mut driver = PipelineDriver::new(&small_config(), capture, sink.clone()).unwrap();

        let _ = driver.run(&CancelToken::new());
        let grids = sink.grids();
        assert_eq!(grids.len(), 1);
        assert!(grids[0].as_slice().iter().all(|&v| v == 0.0));
    }

    #[test]
    fn fault_releases_capture_exactly_once() {
        let (capture, stops) = ScriptedCapture::new(vec![Event::Fault], (64, 48));
        let sink = VecSink::default();
        let mut driver = PipelineDriver::new(&small_config(), capture, sink).unwrap();

        let result = driver.run(&CancelToken::new());
        assert!(matches!(result, Err(Error::Capture(_))));
        assert_eq!(stops.load(Ordering::SeqCst), 1);

        drop(driver);
        assert_eq!(stops.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn cancellation_stops_cleanly() {
        let (capture, stops) = ScriptedCapture::new(vec![], (64, 48));
        let sink = VecSink::default();
        let mut driver = PipelineDriver::new(&small_config(), capture, sink.clone()).unwrap();

        let cancel = CancelToken::new();
        cancel.cancel();
        driver.run(&cancel).unwrap();

        assert_eq!(driver.state(), PipelineState::Stopped);
        assert_eq!(stops.load(Ordering::SeqCst), 1);
        assert!(sink.grids().is_empty());
    }

    #[test]
    fn mismatched_capture_resolution_rejected() {
        let (capture, stops) = ScriptedCapture::new(vec![], (32, 32));
        let result = PipelineDriver::new(&small_config(), capture, VecSink::default());
        assert!(matches!(result, Err(Error::Config(_))));
        // Failed construction still releases the source.
        assert_eq!(stops.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn moving_block_elevates_only_nearby_cells() {
        // Reduced 160x120, cell 8: the spec-sized 20x15 grid of 300 cells.
        let config = PipelineConfig {
            raw_width: 320,
            raw_height: 240,
            downsample: 2,
            cell_size: 8,
            ..Default::default()
        };

        let capture = SyntheticCapture::new(320, 240, 64, 16);
        let sink = VecSink::default();
        let mut driver = PipelineDriver::new(&config, capture, sink.clone()).unwrap();

        let cancel = CancelToken::new();
        let emitted = Arc::new(AtomicUsize::new(0));
        {
            let cancel = cancel.clone();
            let emitted = emitted.clone();
            driver.set_observer(Box::new(move |_, _| {
                if emitted.fetch_add(1, Ordering::SeqCst) + 1 >= 2 {
                    cancel.cancel();
                }
            }));
        }

        driver.run(&cancel).unwrap();

        let grids = sink.grids();
        assert_eq!(grids.len(), 2);
        let grid = &grids[1];
        assert_eq!(grid.dim(), (20, 15));

        // The block drifts around x 24..64, y 44..76 in reduced pixels;
        // activity must stay inside that neighbourhood.
        let active: Vec<_> = (0..15)
            .flat_map(|y| (0..20).map(move |x| (x, y)))
            .filter(|&(x, y)| grid.get(x, y) > 0.0)
            .collect();

        assert!(!active.is_empty(), "no cells elevated");
        for (x, y) in active {
            assert!(
                (1..10).contains(&x) && (3..12).contains(&y),
                "unexpected activity at cell ({x}, {y})"
            );
        }
    }
}
