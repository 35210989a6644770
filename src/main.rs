//! Head tracking application printing tracking events as JSON lines.

use anyhow::{Context, Result};
use clap::Parser;
use headtrack::app::{HeadTracker, TrackingEvent};
use headtrack::cascade::CascadeModel;
use headtrack::config::{Config, EXAMPLE_CONFIG};
use headtrack::utils::image_conversion::ImageSequenceSource;
use log::info;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Directory of PNG/JPEG frames, processed in file name order
    #[arg(short, long)]
    frames: Option<PathBuf>,

    /// Cascade model (JSON), overrides the configured path
    #[arg(long)]
    cascade: Option<PathBuf>,

    /// Path to configuration file (YAML format)
    #[arg(short = 'C', long)]
    config: Option<String>,

    /// Camera horizontal field of view in degrees (skips calibration)
    #[arg(long)]
    fov: Option<f64>,

    /// Disable smoothing of the tracked face
    #[arg(long)]
    no_smoothing: bool,

    /// Enable debug output
    #[arg(short, long)]
    debug: bool,

    /// Print the configuration and exit
    #[arg(long)]
    print_config: bool,
}

fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Initialize logger
    if args.debug {
        env_logger::init_from_env(env_logger::Env::new().default_filter_or("debug"));
    } else {
        env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));
    }

    // Load configuration if provided
    let mut config = if let Some(config_path) = &args.config {
        info!("Loading configuration from: {}", config_path);
        match Config::from_file(config_path) {
            Ok(cfg) => cfg,
            Err(e) => {
                log::warn!("Failed to load config file: {}. Using defaults.", e);
                Config::default()
            }
        }
    } else {
        Config::default()
    };

    // Command line overrides
    if let Some(cascade) = args.cascade {
        config.detection.cascade_path = cascade;
    }
    if let Some(fov) = args.fov {
        config.head_position.fov_degrees = Some(fov);
    }
    if args.no_smoothing {
        config.smoothing.enabled = false;
    }

    if args.print_config {
        if args.config.is_none() && config == Config::default() {
            print!("{EXAMPLE_CONFIG}");
        } else {
            print!("{}", serde_yaml::to_string(&config)?);
        }
        return Ok(());
    }

    config.validate()?;

    let frames = args
        .frames
        .context("--frames <DIR> is required unless --print-config is given")?;

    info!("Head Tracker");
    let cascade = CascadeModel::from_file(&config.detection.cascade_path)
        .with_context(|| {
            format!(
                "Failed to load cascade {} (set --cascade or detection.cascade_path)",
                config.detection.cascade_path.display()
            )
        })?;
    let mut source = ImageSequenceSource::from_dir(&frames)?;

    let sink = |event: TrackingEvent| match serde_json::to_string(&event) {
        Ok(line) => println!("{line}"),
        Err(e) => log::error!("Failed to serialize event: {e}"),
    };
    let mut tracker = HeadTracker::new(Arc::new(cascade), &config, sink)?;
    let processed = tracker.run(&mut source)?;
    info!("Processed {processed} frames");

    Ok(())
}
