//! Configuration for both stations
//!
//! Reads ~/.config/greenhouse-logger/config.toml unless a path is given.
//! Every key has a default matching the stock Pi install, so an absent
//! file is a valid configuration.

use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::sensors::{lps25hb, scd30, sht35, CrcCheck};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// CRC policy for Sensirion sensors: "ignore", "warn" or "reject"
    pub crc: CrcCheck,
    pub storage: StorageConfig,
    pub sampling: SamplingConfig,
    pub bus: BusConfig,
    pub air: AirConfig,
    pub soil: SoilConfig,
    pub camera: CameraConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub data_dir: PathBuf,
    pub image_dir: PathBuf,
    /// Append a host telemetry row per sample
    pub telemetry: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplingConfig {
    pub interval_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BusConfig {
    pub i2c: PathBuf,
    pub spi: PathBuf,
    pub spi_speed_hz: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AirConfig {
    pub sht35_addr: u8,
    pub lps25hb_addr: u8,
    pub scd30_addr: u8,
    pub scd30_interval_secs: u16,
    pub adc_ref_volts: f64,
    pub solar_channel: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SoilConfig {
    pub sht35_addr: u8,
    pub adc_ref_volts: f64,
    pub sen0114_channel: u8,
    pub sen0193_channel: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    /// Capture on the first sample, then once every this many samples
    pub every_samples: u32,
    pub command: String,
    /// Argument template; `{path}`, `{width}` and `{height}` are substituted
    pub args: Vec<String>,
    pub width: u32,
    pub height: u32,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("/home/pi/PepperHouse/data"),
            image_dir: PathBuf::from("/home/pi/PepperHouse/img"),
            telemetry: true,
        }
    }
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self { interval_secs: 10 }
    }
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            i2c: PathBuf::from("/dev/i2c-1"),
            spi: PathBuf::from("/dev/spidev0.0"),
            spi_speed_hz: 1_000_000,
        }
    }
}

impl Default for AirConfig {
    fn default() -> Self {
        Self {
            sht35_addr: sht35::ADDR_HIGH,
            lps25hb_addr: lps25hb::ADDR,
            scd30_addr: scd30::ADDR,
            scd30_interval_secs: 2,
            adc_ref_volts: 5.0,
            solar_channel: 0,
        }
    }
}

impl Default for SoilConfig {
    fn default() -> Self {
        Self {
            sht35_addr: sht35::ADDR_LOW,
            adc_ref_volts: 3.3,
            sen0114_channel: 0,
            sen0193_channel: 1,
        }
    }
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            every_samples: 60,
            command: "libcamera-still".to_string(),
            args: [
                "--nopreview",
                "--immediate",
                "--width",
                "{width}",
                "--height",
                "{height}",
                "-o",
                "{path}",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            width: 1920,
            height: 1080,
        }
    }
}

impl Config {
    /// Get the default config file path
    pub fn path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("greenhouse-logger").join("config.toml"))
    }

    /// Load an explicit file, or the default file if it exists, or defaults
    pub fn load(explicit: Option<&Path>) -> anyhow::Result<Self> {
        if let Some(path) = explicit {
            return Self::load_file(path);
        }

        let Some(path) = Self::path() else {
            tracing::warn!("Could not determine config directory, using defaults");
            return Ok(Self::default());
        };

        if !path.exists() {
            tracing::info!("No config file found at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        Self::load_file(&path)
    }

    fn load_file(path: &Path) -> anyhow::Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {:?}", path))?;
        let config = Self::parse(&contents)
            .with_context(|| format!("Failed to parse config file {:?}", path))?;
        tracing::info!("Loaded config from {:?}", path);
        Ok(config)
    }

    pub fn parse(contents: &str) -> anyhow::Result<Self> {
        let config: Config = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(
            self.sampling.interval_secs > 0,
            "sampling.interval_secs must be at least 1"
        );
        anyhow::ensure!(
            (2..=1800).contains(&self.air.scd30_interval_secs),
            "air.scd30_interval_secs must be within 2..=1800"
        );
        anyhow::ensure!(
            self.camera.every_samples > 0,
            "camera.every_samples must be at least 1"
        );
        for (name, channel) in [
            ("air.solar_channel", self.air.solar_channel),
            ("soil.sen0114_channel", self.soil.sen0114_channel),
            ("soil.sen0193_channel", self.soil.sen0193_channel),
        ] {
            anyhow::ensure!(
                channel < crate::sensors::mcp3208::CHANNELS,
                "{} must be within 0..=7",
                name
            );
        }
        Ok(())
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.sampling.interval_secs)
    }
}
