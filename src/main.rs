//! CLI entry point for rust_cam.
//!
//! A thin demonstration harness over [`ControllerFacade`]: every subcommand
//! drives the same command-submission API a GUI front end would use.
//!
//! # Usage
//!
//! List the registered camera backends:
//! ```bash
//! rust_cam devices
//! ```
//!
//! Capture one frame to a portable pixmap:
//! ```bash
//! rust_cam snap --output frame.ppm
//! ```
//!
//! Run a live stream for ten seconds:
//! ```bash
//! rust_cam --camera simulated stream --seconds 10
//! ```
//!
//! Record a five-second clip into the configured output directory:
//! ```bash
//! rust_cam record --seconds 5
//! ```

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use rust_cam::config::Settings;
use rust_cam::controller::{ControllerFacade, StreamScheduler};
use rust_cam::hardware::{registry, Frame};
use rust_cam::logging;
use rust_cam::protocol::{Command, Response};
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "rust_cam")]
#[command(about = "Camera acquisition and recording over an isolated worker", long_about = None)]
struct Cli {
    /// Configuration name under config/ (without extension)
    #[arg(long, global = true)]
    config: Option<String>,

    /// Device kind, overriding the configured default
    #[arg(long, global = true)]
    camera: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List registered device kinds
    Devices,

    /// Capture a single frame and write it as a portable pixmap
    Snap {
        /// Output image path (.ppm for color, .pgm written for grayscale)
        #[arg(long, default_value = "snap.ppm")]
        output: PathBuf,
    },

    /// Run a live stream for a fixed duration
    Stream {
        /// Stream length in seconds
        #[arg(long, default_value_t = 5)]
        seconds: u64,

        /// Pause between snaps in milliseconds
        #[arg(long, default_value_t = 0)]
        delay_ms: u64,
    },

    /// Record a clip into the configured output directory
    Record {
        /// Recording length in seconds
        #[arg(long, default_value_t = 5)]
        seconds: u64,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut settings = Settings::load(cli.config.as_deref()).context("loading configuration")?;
    logging::init_from_settings(&settings.logging).map_err(anyhow::Error::msg)?;
    if let Some(camera) = cli.camera {
        settings.camera.default_kind = camera;
    }

    match cli.command {
        Commands::Devices => cmd_devices(),
        Commands::Snap { output } => cmd_snap(settings, &output),
        Commands::Stream { seconds, delay_ms } => cmd_stream(settings, seconds, delay_ms),
        Commands::Record { seconds } => cmd_record(settings, seconds),
    }
}

fn cmd_devices() -> Result<()> {
    for kind in registry::available_kinds() {
        println!("{kind}");
    }
    Ok(())
}

fn cmd_snap(settings: Settings, output: &Path) -> Result<()> {
    let mut facade = ControllerFacade::new(settings);
    facade.start().context("starting camera worker")?;

    let timeout = facade.command_timeout(&Command::Snap);
    let response = facade
        .submit(Command::Snap, timeout)
        .context("submitting snap")?;
    match response {
        Response::Frame(frame) => {
            write_pixmap(&frame, output)?;
            println!(
                "wrote {}x{} frame ({} channel{}) to {}",
                frame.width,
                frame.height,
                frame.channels,
                if frame.channels == 1 { "" } else { "s" },
                output.display()
            );
        }
        other => bail!("snap failed: {}", response_detail(&other)),
    }

    facade.stop().context("stopping camera worker")?;
    Ok(())
}

fn cmd_stream(settings: Settings, seconds: u64, delay_ms: u64) -> Result<()> {
    let mut facade = ControllerFacade::new(settings);
    facade.start().context("starting camera worker")?;

    let stop = Arc::new(AtomicBool::new(false));
    let timer = {
        let stop = Arc::clone(&stop);
        thread::spawn(move || {
            thread::sleep(Duration::from_secs(seconds));
            stop.store(true, Ordering::Release);
        })
    };

    let mut scheduler = StreamScheduler::new(Duration::from_millis(delay_ms));
    let stats = scheduler
        .run(&mut facade, &stop, |_frame| {})
        .context("streaming")?;
    let _ = timer.join();

    println!(
        "streamed {} frames in {}s, estimated {} fps",
        stats.frames, seconds, stats.fps
    );
    facade.stop().context("stopping camera worker")?;
    Ok(())
}

fn cmd_record(settings: Settings, seconds: u64) -> Result<()> {
    let output_dir = settings.recording.output_dir.clone();
    let mut facade = ControllerFacade::new(settings);
    facade.start().context("starting camera worker")?;

    let timeout = facade.command_timeout(&Command::StartRecording);
    match facade
        .submit(Command::StartRecording, timeout)
        .context("starting recording")?
    {
        Response::Ready => {}
        other => bail!("recording did not start: {}", response_detail(&other)),
    }

    let stop = Arc::new(AtomicBool::new(false));
    let timer = {
        let stop = Arc::clone(&stop);
        thread::spawn(move || {
            thread::sleep(Duration::from_secs(seconds));
            stop.store(true, Ordering::Release);
        })
    };

    let mut scheduler = StreamScheduler::new(Duration::ZERO);
    let stats = scheduler
        .run(&mut facade, &stop, |_frame| {})
        .context("streaming while recording")?;
    let _ = timer.join();

    let timeout = facade.command_timeout(&Command::StopRecording);
    match facade
        .submit(Command::StopRecording, timeout)
        .context("stopping recording")?
    {
        Response::Stopped => {}
        other => bail!("recording did not stop: {}", response_detail(&other)),
    }

    println!(
        "recorded {} frames at ~{} fps under {}",
        stats.frames,
        stats.fps,
        output_dir.display()
    );
    facade.stop().context("stopping camera worker")?;
    Ok(())
}

/// Write a frame as binary PGM (grayscale) or PPM (RGB).
fn write_pixmap(frame: &Frame, path: &Path) -> Result<()> {
    let mut file =
        File::create(path).with_context(|| format!("creating {}", path.display()))?;
    let magic = if frame.is_gray() { "P5" } else { "P6" };
    write!(file, "{magic}\n{} {}\n255\n", frame.width, frame.height)?;
    file.write_all(&frame.pixels)?;
    Ok(())
}

fn response_detail(response: &Response) -> String {
    match response {
        Response::NotReady(reason) => format!("not ready ({reason})"),
        Response::Fault(message) => format!("worker fault ({message})"),
        other => other.label().to_string(),
    }
}
