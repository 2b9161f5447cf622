//! Stations - one sensor group per host, sampled as a unit

pub mod air;
pub mod soil;

use anyhow::Context;
use chrono::{DateTime, Local};
use linux_embedded_hal::spidev::{SpiModeFlags, SpidevOptions};
use linux_embedded_hal::SpidevDevice;
use std::fmt;

use crate::config::BusConfig;
use crate::datalog::Record;

pub use air::AirStation;
pub use soil::SoilStation;

/// A set of sensors owned for the lifetime of a sampling loop
pub trait Station {
    type Sample: Record + fmt::Display;

    /// Station name used in logs
    const NAME: &'static str;

    /// Day-file prefix for this station's rows
    const LOG_PREFIX: &'static str;

    /// Read every sensor once
    fn measure(&mut self, at: DateTime<Local>) -> anyhow::Result<Self::Sample>;

    /// Put the sensors back in an idle state before the handles drop
    fn release(&mut self) -> anyhow::Result<()>;
}

/// Open the MCP3208 SPI device: 8-bit words, mode 0
pub fn open_spi(bus: &BusConfig) -> anyhow::Result<SpidevDevice> {
    let mut spi = SpidevDevice::open(&bus.spi)
        .with_context(|| format!("Failed to open SPI device {:?}", bus.spi))?;
    let options = SpidevOptions::new()
        .bits_per_word(8)
        .max_speed_hz(bus.spi_speed_hz)
        .mode(SpiModeFlags::SPI_MODE_0)
        .build();
    spi.configure(&options)
        .with_context(|| format!("Failed to configure SPI device {:?}", bus.spi))?;
    Ok(spi)
}
