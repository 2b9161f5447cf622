//! greenhouse-logger: sensor sampling for a Raspberry Pi greenhouse
//!
//! Two stations, one per host:
//! - air: SHT35, LPS25HB, SCD30 and a pyranometer, plus optional still images
//! - soil: SHT35 and two soil-moisture probes
//!
//! Each station appends one CSV row per sample to a per-day file, alongside
//! a row of host telemetry, until it receives Ctrl-C or SIGTERM.

use anyhow::Context;
use clap::{builder::BoolishValueParser, ArgAction, Parser, Subcommand};
use std::future::Future;
use std::path::PathBuf;
use std::time::Instant;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

// === Modules ===

mod actuators;
mod config;
mod datalog;
mod sampler;
mod sensors;
mod shared;
mod stations;

use config::Config;
use sampler::Recorder;
use stations::{AirStation, SoilStation, Station};

// === CLI ===

#[derive(Parser)]
#[command(name = "greenhouse-logger")]
#[command(about = "Log greenhouse air and soil sensors to daily CSV files")]
struct Cli {
    /// Config file to use instead of the default location
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sample the air station; CAMERA enables still capture (true/false, 1/0, yes/no)
    Air {
        #[arg(required = true, action = ArgAction::Set, value_parser = BoolishValueParser::new())]
        camera: bool,
    },
    /// Sample the soil station
    Soil,
    /// Open the config file in your editor
    Config,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Config => {
            run_config_command(cli.config)?;
        }
        Commands::Air { camera } => {
            init_tracing();
            let config = Config::load(cli.config.as_deref())?;
            let shutdown = shutdown_handlers()?;
            let station = AirStation::open(&config)?;
            run_station(station, &config, camera, shutdown).await?;
        }
        Commands::Soil => {
            init_tracing();
            let config = Config::load(cli.config.as_deref())?;
            let shutdown = shutdown_handlers()?;
            let station = SoilStation::open(&config)?;
            run_station(station, &config, false, shutdown).await?;
        }
    }

    Ok(())
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

/// Signals are caught before any sensor is opened, so an interrupt during
/// start-up or the first sample still ends in a clean release.
fn shutdown_handlers() -> anyhow::Result<impl Future<Output = ()>> {
    sampler::shutdown_signal().context("Failed to install signal handlers")
}

/// Sample until shutdown, then report how long we ran
async fn run_station<S: Station>(
    mut station: S,
    config: &Config,
    camera: bool,
    shutdown: impl Future<Output = ()>,
) -> anyhow::Result<()> {
    datalog::ensure_dir(&config.storage.data_dir)?;

    tracing::info!(
        "Starting {} station, logging to {:?}{}",
        S::NAME,
        config.storage.data_dir,
        if camera { ", camera on" } else { "" }
    );

    let mut recorder = Recorder::for_station::<S>(config, camera);
    let started = Instant::now();
    let count = sampler::run(
        &mut station,
        &mut recorder,
        config.interval(),
        shutdown,
    )
    .await?;

    tracing::info!(
        "{} station stopped after {} samples in {}",
        S::NAME,
        count,
        shared::format_duration(started.elapsed().as_secs())
    );
    Ok(())
}

/// Open config file in user's editor
fn run_config_command(explicit: Option<PathBuf>) -> anyhow::Result<()> {
    let config_path = match explicit {
        Some(path) => path,
        None => Config::path()
            .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?,
    };

    // Create config dir if needed
    if let Some(parent) = config_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    // Create config file from template if it doesn't exist
    if !config_path.exists() {
        let template = include_str!("../config.toml.example");
        std::fs::write(&config_path, template)?;
        println!("Created config file: {}", config_path.display());
    }

    let editor = std::env::var("EDITOR")
        .or_else(|_| std::env::var("VISUAL"))
        .unwrap_or_else(|_| "nano".to_string());

    println!("Opening {} with {}", config_path.display(), editor);

    std::process::Command::new(&editor)
        .arg(&config_path)
        .status()?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::error::ErrorKind;

    #[test]
    fn test_air_requires_camera_flag() {
        let err = Cli::try_parse_from(["greenhouse-logger", "air"]).err().unwrap();
        assert_eq!(err.kind(), ErrorKind::MissingRequiredArgument);
    }

    #[test]
    fn test_air_camera_flag_values() {
        let cases = [
            ("true", true),
            ("1", true),
            ("yes", true),
            ("false", false),
            ("0", false),
        ];
        for (arg, expected) in cases {
            let cli = Cli::try_parse_from(["greenhouse-logger", "air", arg]).unwrap();
            match cli.command {
                Commands::Air { camera } => assert_eq!(camera, expected, "{}", arg),
                _ => panic!("expected air"),
            }
        }
        assert!(Cli::try_parse_from(["greenhouse-logger", "air", "maybe"]).is_err());
    }

    #[test]
    fn test_global_config_flag() {
        let cli =
            Cli::try_parse_from(["greenhouse-logger", "soil", "--config", "/tmp/gh.toml"]).unwrap();
        assert!(matches!(cli.command, Commands::Soil));
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/gh.toml")));
    }
}
