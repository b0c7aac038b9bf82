//! Follow an object with the camera rover.
//!
//! Reads the vehicle's MJPEG stream, steers towards the target class and
//! accepts operator commands on stdin:
//!
//! ```text
//! w/s/a/d/x          forward, backward, left, right, stop
//! speed N, light N   drive speed / LED intensity (0-255)
//! servo-x N, servo-y N
//! auto [on|off]      toggle automatic centering
//! q                  quit
//! ```

use std::fs;
use std::io::{self, BufRead};
use std::path::{Path, PathBuf};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use clap::{Parser, ValueEnum};
use image::ImageFormat;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

use rover_track::control::TieBreak;
use rover_track::dispatch::{
    CommandDispatcher, CommandSender, ControlMode, HttpTransport, Intent, command_bus,
    spawn_dispatcher,
};
use rover_track::presentation::{Annotator, ClassNames, Presentation, SlotReceiver, latest_slot};
use rover_track::{
    ActuationCommand, ByteAssociator, HttpDetector, MjpegSource, Pipeline, PipelineExit,
    RoverConfig, StopSignal,
};

#[derive(Clone, Copy, Debug, ValueEnum)]
enum TieBreakArg {
    /// Track closest to the frame centre
    Nearest,
    /// Oldest track
    LowestId,
}

impl From<TieBreakArg> for TieBreak {
    fn from(arg: TieBreakArg) -> Self {
        match arg {
            TieBreakArg::Nearest => TieBreak::NearestCenter,
            TieBreakArg::LowestId => TieBreak::LowestId,
        }
    }
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Camera rover object follower")]
struct Args {
    /// Vehicle address, used for the video stream and commands
    #[arg(long, default_value = "192.168.1.1")]
    device: String,

    /// Override the video stream URL
    #[arg(long)]
    stream_url: Option<String>,

    /// Inference server endpoint
    #[arg(long, default_value = "http://127.0.0.1:8000/detect")]
    detector_url: String,

    /// Minimum detection confidence
    #[arg(long, default_value_t = 0.5)]
    conf: f32,

    /// Only track this class id
    #[arg(long)]
    class_filter: Option<u32>,

    /// Class id the rover steers towards
    #[arg(long, default_value_t = 39)]
    target_class: u32,

    /// Centred band half-width in pixels
    #[arg(long, default_value_t = 10.0)]
    dead_zone: f32,

    /// Hold-off after each movement, in milliseconds
    #[arg(long, default_value_t = 50)]
    settle_ms: u64,

    /// Consecutive hits before a track is confirmed
    #[arg(long, default_value_t = 3)]
    n_init: u32,

    /// Consecutive misses before a track is deleted
    #[arg(long, default_value_t = 5)]
    max_age: u32,

    #[arg(long, value_enum, default_value_t = TieBreakArg::Nearest)]
    tie_break: TieBreakArg,

    /// Start with automatic centering disabled
    #[arg(long)]
    manual: bool,

    /// Process every buffered frame instead of skipping to the newest
    #[arg(long)]
    keep_stale: bool,

    /// Class names file, one name per line
    #[arg(long)]
    names: Option<PathBuf>,

    /// Write the latest annotated frame to this JPEG file
    #[arg(long)]
    preview: Option<PathBuf>,
}

impl TryFrom<&Args> for RoverConfig {
    type Error = anyhow::Error;

    fn try_from(args: &Args) -> Result<Self> {
        let mut config = RoverConfig::for_device(&args.device);
        if let Some(url) = &args.stream_url {
            config.stream.url = url.clone();
        }
        config.stream.drop_stale = !args.keep_stale;
        config.detector.endpoint = args.detector_url.clone();
        config.filter.confidence_threshold = args.conf;
        config.filter.class_of_interest = args.class_filter;
        config.tracking.n_init = args.n_init;
        config.tracking.max_age = args.max_age;
        config.control.target_class = args.target_class;
        config.control.dead_zone_px = args.dead_zone;
        config.control.settle_delay = Duration::from_millis(args.settle_ms);
        config.control.tie_break = args.tie_break.into();
        config.auto_control = !args.manual;

        config.validate().context("invalid configuration")?;
        Ok(config)
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let config = RoverConfig::try_from(&args)?;

    let stop = StopSignal::new();
    {
        let stop = stop.clone();
        ctrlc::set_handler(move || stop.raise()).context("failed to install Ctrl+C handler")?;
    }

    let annotator = match &args.names {
        Some(path) => Annotator::new(
            ClassNames::load(path).with_context(|| format!("failed to read {}", path.display()))?,
        ),
        None => Annotator::default(),
    };

    let (commands, bus) = command_bus(config.bus_capacity);
    let dispatcher = spawn_dispatcher(bus, CommandDispatcher::new(HttpTransport::new(&config.device)))
        .context("failed to start dispatcher")?;
    let shutdown = commands.clone();

    let mode = ControlMode::new(config.auto_control);
    spawn_console(commands.clone(), mode.clone(), stop.clone()).context("failed to start console")?;

    let (frames, latest) = latest_slot();
    let preview = args.preview.clone();
    let presenter = thread::Builder::new()
        .name("preview".into())
        .spawn(move || present(latest, preview.as_deref()))
        .context("failed to start preview")?;

    let source = MjpegSource::connect(&config.stream)?;
    let pipeline = Pipeline::new(
        &config,
        source,
        HttpDetector::new(config.detector.clone()),
        ByteAssociator::new(config.association.clone()),
        commands,
        frames,
    )
    .with_annotator(annotator)
    .with_mode(mode)
    .with_stop(stop);

    let exit = pipeline
        .spawn()
        .context("failed to start capture thread")?
        .join()
        .map_err(|_| anyhow!("capture thread panicked"))?;
    if presenter.join().is_err() {
        warn!("preview thread panicked");
    }

    // Stop goes last on the bus so no queued motion can overtake it
    if !shutdown.close(Intent::manual(ActuationCommand::Stop)) {
        warn!("command bus already closed, final stop not queued");
    }
    match dispatcher.join() {
        Ok(stats) => debug!(sent = stats.sent, failed = stats.failed, "dispatcher joined"),
        Err(_) => warn!("dispatch thread panicked"),
    }

    match exit {
        PipelineExit::Stopped { stats } => {
            info!(frames = stats.frames, commands = stats.commands, "stopped");
            Ok(())
        }
        PipelineExit::CaptureFailed { stats, error } => {
            error!(frames = stats.frames, "capture ended: {error}");
            Err(error).context("video stream failed")
        }
    }
}

/// Consume annotated frames until the pipeline ends.
fn present(latest: SlotReceiver<Presentation>, path: Option<&Path>) {
    while let Some(item) = latest.recv() {
        match item {
            Presentation::Frame(frame) => {
                debug!(
                    seq = frame.seq,
                    tracks = frame.overlays.len(),
                    command = ?frame.command,
                    "frame ready"
                );
                if let Some(path) = path {
                    if let Err(err) = write_preview(&frame.image, path) {
                        warn!("failed to write preview {}: {err}", path.display());
                    }
                }
            }
            Presentation::Ended { frames, reason } => {
                info!(frames, "video ended: {reason}");
                break;
            }
        }
    }
}

fn write_preview(image: &image::RgbImage, path: &Path) -> Result<()> {
    // write then rename so readers never see a partial file
    let tmp = path.with_extension("tmp");
    image.save_with_format(&tmp, ImageFormat::Jpeg)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

fn spawn_console(
    commands: CommandSender,
    mode: ControlMode,
    stop: StopSignal,
) -> io::Result<JoinHandle<()>> {
    thread::Builder::new().name("console".into()).spawn(move || {
        for line in io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            if handle_line(line.trim(), &commands, &mode) == Console::Quit {
                stop.raise();
                break;
            }
            if commands.is_closed() {
                break;
            }
        }
    })
}

#[derive(Debug, PartialEq, Eq)]
enum Console {
    Continue,
    Quit,
}

fn handle_line(line: &str, commands: &CommandSender, mode: &ControlMode) -> Console {
    match line {
        "" => {}
        "q" | "quit" => return Console::Quit,
        "auto" | "track" => {
            let auto = mode.toggle();
            info!(auto, "auto centering toggled");
            if !auto {
                halt(commands);
            }
        }
        "auto on" => mode.set_auto(true),
        "auto off" => {
            mode.set_auto(false);
            halt(commands);
        }
        _ => match line.parse::<ActuationCommand>() {
            Ok(command) => {
                commands.submit(Intent::manual(command));
            }
            Err(err) => warn!("{err}"),
        },
    }
    Console::Continue
}

/// Leaving automatic mode must not leave the last automatic movement running.
fn halt(commands: &CommandSender) {
    commands.submit(Intent::manual(ActuationCommand::Stop));
}
