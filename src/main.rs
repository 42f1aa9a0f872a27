//! GeoVPS - Headless driver for geospatial tracking sessions
//!
//! This is the binary entry point. All logic lives in the library crates.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use color_eyre::eyre::eyre;
use geovps::{report_availability, run_session, setup_with_retry, HeadlessEvent, RunOptions};
use geovps_app::config::{init_config_dir, load_settings};
use geovps_app::{SessionController, Settings};
use geovps_core::prelude::info;
use geovps_engine::SimulatedEngine;

/// GeoVPS - Drive a geospatial tracking session and report it as NDJSON
#[derive(Parser, Debug)]
#[command(name = "geovps")]
#[command(about = "Drive a geospatial tracking session and report it as NDJSON", long_about = None)]
struct Args {
    /// Directory containing `.geovps/config.toml`
    #[arg(long, value_name = "PATH", global = true)]
    base: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Set up a session, track for a while, then close it
    Run {
        /// Seconds to keep tracking
        #[arg(long, default_value_t = 10)]
        duration_secs: u64,

        /// Milliseconds between pose samples
        #[arg(long, default_value_t = 1000, value_parser = clap::value_parser!(u64).range(1..))]
        pose_interval_ms: u64,

        /// Latitude to check VPS coverage at once tracking starts
        #[arg(long, allow_negative_numbers = true, requires = "lon")]
        lat: Option<f64>,

        /// Longitude to check VPS coverage at once tracking starts
        #[arg(long, allow_negative_numbers = true, requires = "lat")]
        lon: Option<f64>,
    },

    /// Check VPS coverage at a coordinate
    Check {
        #[arg(long, allow_negative_numbers = true)]
        lat: f64,
        #[arg(long, allow_negative_numbers = true)]
        lon: f64,
    },

    /// Write a default `.geovps/config.toml`
    Init,
}

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;
    let args = Args::parse();
    geovps_core::logging::init()?;

    // Get base path from args or use current directory
    let base_path = args
        .base
        .unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));

    match args.command {
        Command::Init => {
            let path = init_config_dir(&base_path)?;
            eprintln!("Wrote {}", path.display());
            Ok(())
        }
        Command::Run {
            duration_secs,
            pose_interval_ms,
            lat,
            lon,
        } => {
            let controller = build_controller(&load_settings(&base_path));
            let options = RunOptions {
                duration: Duration::from_secs(duration_secs),
                pose_interval: Duration::from_millis(pose_interval_ms),
                check_at: lat.zip(lon),
            };
            run_session(&controller, &options).await?;
            Ok(())
        }
        Command::Check { lat, lon } => {
            let controller = build_controller(&load_settings(&base_path));
            let setup = setup_with_retry(&controller).await;
            let answered = match setup {
                Ok(()) => report_availability(&controller, lat, lon).await,
                Err(_) => false,
            };
            controller.close_ar().await?;
            HeadlessEvent::completed(controller.state()).emit();

            setup?;
            if answered {
                Ok(())
            } else {
                Err(eyre!("VPS availability query at ({}, {}) failed", lat, lon))
            }
        }
    }
}

fn build_controller(settings: &Settings) -> SessionController<SimulatedEngine> {
    info!("Using simulated engine: {:?}", settings.simulation);
    let engine = Arc::new(SimulatedEngine::new(settings.simulation.clone()));
    SessionController::new(engine, settings)
}
