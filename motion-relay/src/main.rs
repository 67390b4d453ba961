//! Relay depth-camera motion grids to an OSC endpoint.

use anyhow::{anyhow, Context, Result};
use clap::*;
use depthflow::capture::{DepthCapture, ReplayCapture, SyntheticCapture};
use depthflow::pipeline::{CancelToken, PipelineDriver};
use depthflow::prelude::v1::{Error, PipelineConfig};
use depthflow_osc::OscSink;
use log::*;
use std::fs::File;
use std::io::BufReader;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

fn main() -> Result<()> {
    env_logger::init();

    let matches = Command::new("motion-relay")
        .version(crate_version!())
        .arg(
            Arg::new("input")
                .long("input")
                .short('i')
                .takes_value(true)
                .default_value("synthetic")
                .help("Depth source: 'synthetic' or a raw .z16 replay file"),
        )
        .arg(
            Arg::new("config")
                .long("config")
                .short('c')
                .takes_value(true)
                .help("TOML pipeline configuration file"),
        )
        .arg(
            Arg::new("dest")
                .long("dest")
                .short('d')
                .takes_value(true)
                .default_value(depthflow_osc::DEFAULT_ENDPOINT)
                .help("OSC consumer endpoint"),
        )
        .arg(
            Arg::new("channel")
                .long("channel")
                .takes_value(true)
                .default_value(depthflow_osc::DEFAULT_ADDRESS)
                .help("OSC address pattern"),
        )
        .arg(
            Arg::new("frames")
                .long("frames")
                .short('n')
                .takes_value(true)
                .help("Stop after this many emitted grids"),
        )
        .get_matches();

    let config = match matches.value_of("config") {
        Some(path) => {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("reading config {path}"))?;
            toml::from_str(&raw).with_context(|| format!("parsing config {path}"))?
        }
        None => PipelineConfig::default(),
    };

    let input = matches.value_of("input").unwrap();
    let capture = create_capture(input, &config)?;

    let sink = OscSink::new(
        matches.value_of("dest").unwrap(),
        matches.value_of("channel").unwrap(),
    )?;

    let frame_limit: Option<usize> = matches
        .value_of("frames")
        .map(str::parse)
        .transpose()
        .context("parsing --frames")?;

    let cancel = CancelToken::new();
    {
        let cancel = cancel.clone();
        ctrlc::set_handler(move || cancel.cancel()).context("installing signal handler")?;
    }

    let mut driver = PipelineDriver::new(&config, capture, sink)?;

    let emitted = Arc::new(AtomicUsize::new(0));
    {
        let emitted = emitted.clone();
        let cancel = cancel.clone();
        driver.set_observer(Box::new(move |_, grid| {
            let n = emitted.fetch_add(1, Ordering::Relaxed) + 1;
            let peak = grid.as_slice().iter().cloned().fold(0.0f32, f32::max);
            debug!("grid {}: peak cell {:.1}", n, peak);
            if matches!(frame_limit, Some(limit) if n >= limit) {
                cancel.cancel();
            }
        }));
    }

    let (gw, gh) = config.grid_dim();
    info!(
        "relaying {}x{} grids ({} cells per frame)",
        gw,
        gh,
        gw * gh
    );

    let result = driver.run(&cancel);
    info!("emitted {} grids", emitted.load(Ordering::Relaxed));

    // End-of-replay surfaces as a capture fault; report it as a normal end.
    match result {
        Err(Error::Capture(msg)) if msg.contains("stream ended") => {
            info!("replay complete");
            Ok(())
        }
        other => other.map_err(Into::into),
    }
}

/// Pick a capture source from the input argument.
fn create_capture(input: &str, config: &PipelineConfig) -> Result<Box<dyn DepthCapture>> {
    let (w, h) = (config.raw_width, config.raw_height);

    if input == "synthetic" {
        // Near object a quarter of the frame wide, drifting one cell of
        // native pixels per frame.
        let block = w / 4;
        let step = config.cell_size * config.downsample;
        return Ok(Box::new(SyntheticCapture::new(w, h, block, step)));
    }

    if input.ends_with(".z16") {
        let file = File::open(input).with_context(|| format!("opening {input}"))?;
        return Ok(Box::new(ReplayCapture::new(BufReader::new(file), w, h)));
    }

    Err(anyhow!(
        "unrecognised input {input:?}: expected 'synthetic' or a .z16 file"
    ))
}
