mod config;
mod controller;
mod detect;
mod error;
mod frame;
mod interpret;
mod speech;

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, info};

use config::Config;
use controller::CaptureController;
use detect::DetectionClient;
use frame::MjpegFrameGrabber;
use speech::{HostSpeaker, NullSpeaker, Speak};

/// Headless CLI client for remote emotion detection with spoken feedback
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Base address of the detection service
    #[arg(short, long)]
    server: Option<String>,

    /// MJPEG video feed URL (defaults to {server}/video_feed)
    #[arg(long)]
    feed_url: Option<String>,

    /// Request timeout in seconds for feed and detection calls
    #[arg(long)]
    timeout_secs: Option<u64>,

    /// Capture once and exit
    #[arg(long)]
    once: bool,

    /// Disable spoken feedback
    #[arg(long)]
    mute: bool,

    /// Path to the config file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let log_level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .init();

    // Load config, then apply CLI overrides
    let config_path = match &args.config {
        Some(path) => path.clone(),
        None => Config::default_config_path()?,
    };
    let mut config = Config::load(&config_path)?;
    if let Some(server) = args.server {
        config.server_url = server;
    }
    if let Some(feed_url) = args.feed_url {
        config.video_feed_url = Some(feed_url);
    }
    if let Some(timeout_secs) = args.timeout_secs {
        config.timeout_secs = timeout_secs;
    }
    if args.mute {
        config.mute = true;
    }

    url::Url::parse(&config.server_url)
        .with_context(|| format!("Invalid server URL: {}", config.server_url))?;

    info!("Emotion detection CLI starting...");
    info!("Server: {}", config.server_url);
    info!("Video feed: {}", config.feed_url());
    debug!("Config file: {:?}", config_path);

    // One shared client; the bounded timeout keeps a hanging endpoint from
    // wedging the capture state
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs))
        .build()
        .context("Failed to create HTTP client")?;

    let grabber = MjpegFrameGrabber::new(client.clone(), config.feed_url());
    let detector = DetectionClient::new(client, &config.server_url);
    let speaker: Box<dyn Speak> = if config.mute {
        Box::new(NullSpeaker)
    } else {
        Box::new(HostSpeaker)
    };

    let controller = CaptureController::new(Box::new(grabber), Box::new(detector), speaker);

    if args.once {
        let session = controller.capture().await;
        println!("{}", session.message);
        return Ok(());
    }

    println!("\nLive feed: {}", config.feed_url());
    println!("Press Enter to capture, q to quit.\n");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Received Ctrl+C, stopping...");
                break;
            }
            line = lines.next_line() => {
                let Some(line) = line.context("Failed to read stdin")? else {
                    break;
                };
                match line.trim() {
                    "" | "c" | "capture" => {
                        let session = controller.capture().await;
                        println!("{}", session.message);
                    }
                    "q" | "quit" => break,
                    // Camera switching is an affordance only; there is no
                    // device negotiation behind it
                    "switch" => println!("Camera switching is not available in this build."),
                    "settings" => {
                        if let Some(dir) = config_path.parent() {
                            std::fs::create_dir_all(dir)
                                .context("Failed to create config directory")?;
                        }
                        config.save(&config_path)?;
                        println!("Saved current settings to {:?}", config_path);
                    }
                    other => {
                        println!("Unknown command: {:?} (Enter to capture, q to quit)", other);
                    }
                }
            }
        }
    }

    info!("Session complete");
    Ok(())
}
