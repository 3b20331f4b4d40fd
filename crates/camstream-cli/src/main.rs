//! Headless camera-to-RTMP streamer.

mod config;
mod console;

use std::io::{self, BufRead};
use std::path::PathBuf;
use std::thread;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use crossbeam_channel::select;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use camstream_capture::SyntheticCapture;
use camstream_engine::{create_dispatcher, Signal, StreamManager};
use camstream_ipc::{StreamCommand, StreamState, SurfaceEvent, SurfaceHandle};
use camstream_transport::RtmpPublisher;

use crate::console::{Destination, Input, HELP};

/// Identifier of the single headless surface.
const HEADLESS_SURFACE_ID: u64 = 1;

#[derive(Parser, Debug)]
#[command(name = "camstream")]
#[command(about = "Camera preview and RTMP live streaming", long_about = None)]
struct Args {
    /// RTMP server address, e.g. rtmp://192.168.1.100:1935/live
    #[arg(long, env = "CAMSTREAM_RTMP_URL")]
    rtmp_url: Option<String>,

    /// Stream key appended to the address
    #[arg(long, env = "CAMSTREAM_STREAM_KEY")]
    stream_key: Option<String>,

    /// Quality preset (low, medium)
    #[arg(long, env = "CAMSTREAM_QUALITY", default_value = "medium")]
    quality: String,

    /// JSON configuration file; replaces the quality preset
    #[arg(long, env = "CAMSTREAM_CONFIG")]
    config: Option<PathBuf>,

    /// Start publishing as soon as the preview is up
    #[arg(long, env = "CAMSTREAM_AUTOSTART")]
    autostart: bool,

    /// Statistics refresh interval in seconds
    #[arg(long, env = "CAMSTREAM_STATS_INTERVAL", default_value = "1")]
    stats_interval_secs: u64,
}

/// Initialize logging.
fn init_logging() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            "camstream=info,camstream_engine=debug,camstream_capture=info,camstream_transport=debug".into()
        }))
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();
}

fn main() -> Result<()> {
    init_logging();
    let args = Args::parse();

    let config = config::initial_config(
        &args.quality,
        args.config.as_deref(),
        args.rtmp_url.as_deref(),
        args.stream_key.as_deref(),
    )?;
    info!(
        width = config.video.width,
        height = config.video.height,
        fps = config.video.fps,
        "camstream starting"
    );

    let destination = Destination {
        rtmp_url: config.rtmp_url.clone(),
        stream_key: config.stream_key.clone(),
    };
    let surface = SurfaceHandle::new(HEADLESS_SURFACE_ID, config.video.width, config.video.height);

    let manager = StreamManager::new(
        Box::new(SyntheticCapture::new()),
        Box::new(RtmpPublisher::new()),
    )
    .with_config(config);

    let stats = manager.stats_signal();
    spawn_status_printer(manager.state_signal(), manager.error_signal())?;

    let (commands, dispatcher) = create_dispatcher(manager);
    let dispatcher =
        dispatcher.with_stats_interval(Duration::from_secs(args.stats_interval_secs.max(1)));

    let engine = thread::Builder::new()
        .name("camstream-engine".to_string())
        .spawn(move || dispatcher.run())
        .context("Failed to spawn engine thread")?;

    commands
        .send(StreamCommand::Surface(SurfaceEvent::Created(surface)))
        .context("Engine stopped unexpectedly")?;

    if args.autostart {
        commands
            .send(StreamCommand::StartStreaming {
                rtmp_url: destination.rtmp_url.clone(),
                stream_key: destination.stream_key.clone(),
            })
            .context("Engine stopped unexpectedly")?;
    }

    println!("{}", HELP);

    for line in io::stdin().lock().lines() {
        let line = line.context("Failed to read from stdin")?;

        match console::parse_line(&line, &destination) {
            Ok(Input::Command(command)) => {
                if commands.send(command).is_err() {
                    break;
                }
            }
            Ok(Input::Stats) => match stats.get() {
                Some(stats) => println!(
                    "fps {:.1}, bitrate {} kbps, dropped {}, duration {}s",
                    stats.fps,
                    stats.bitrate_bps / 1000,
                    stats.dropped_frames,
                    stats.duration_ms / 1000
                ),
                None => println!("not streaming"),
            },
            Ok(Input::Help) => println!("{}", HELP),
            Ok(Input::Quit) => break,
            Ok(Input::Empty) => {}
            Err(message) => eprintln!("{}", message),
        }
    }

    let _ = commands.send(StreamCommand::Shutdown);
    engine
        .join()
        .map_err(|_| anyhow!("Engine thread panicked"))?;

    info!("camstream stopped");
    Ok(())
}

/// Print state and error changes until the manager goes away.
fn spawn_status_printer(
    state: Signal<StreamState>,
    error: Signal<Option<String>>,
) -> Result<()> {
    let states = state.subscribe();
    let errors = error.subscribe();

    thread::Builder::new()
        .name("camstream-status".to_string())
        .spawn(move || loop {
            select! {
                recv(states.receiver()) -> state => match state {
                    Ok(state) => println!("[{}] {}", state.name(), state.status_message()),
                    Err(_) => break,
                },
                recv(errors.receiver()) -> error => match error {
                    Ok(Some(error)) => println!("[error] {}", error),
                    Ok(None) => {}
                    Err(_) => break,
                },
            }
        })
        .context("Failed to spawn status thread")?;

    Ok(())
}
