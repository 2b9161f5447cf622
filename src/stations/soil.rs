//! Soil station: SHT35 plus SEN0114 and SEN0193 probes on the MCP3208
//!
//! Probe values are not calibrated; they are logged as percent of ADC full
//! scale. Rough datasheet ranges for reference:
//!
//! | Probe   | Dry     | Moist   | In water |
//! |---------|---------|---------|----------|
//! | SEN0114 | 0-300   | 300-700 | 700-950  |
//! | SEN0193 | 520-430 | 430-350 | 350-260  |

use anyhow::Context;
use chrono::{DateTime, Local};
use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::I2c;
use embedded_hal::spi::SpiDevice;
use linux_embedded_hal::{Delay, I2cdev, SpidevDevice};
use std::fmt;

use super::{open_spi, Station};
use crate::config::Config;
use crate::datalog::{Record, SOIL_PREFIX};
use crate::sensors::convert;
use crate::sensors::mcp3208::Mcp3208;
use crate::sensors::sht35::{self, Sht35};
use crate::shared::{format_reading, round_to, ROW_TIMESTAMP};

/// The SHT35 answers with a remote I/O error if read right after start
const SETTLE_MS: u32 = 500;

#[derive(Debug, Clone, PartialEq)]
pub struct SoilSample {
    pub taken_at: DateTime<Local>,
    pub sht: sht35::Reading,
    /// Percent of ADC full scale
    pub sen0114: f64,
    /// Percent of ADC full scale
    pub sen0193: f64,
}

impl Record for SoilSample {
    fn taken_at(&self) -> DateTime<Local> {
        self.taken_at
    }

    fn fields(&self) -> Vec<String> {
        vec![
            format_reading(self.sht.temperature, 2),
            format_reading(self.sht.humidity, 2),
            format_reading(self.sen0114, 5),
            format_reading(self.sen0193, 5),
        ]
    }
}

impl fmt::Display for SoilSample {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.taken_at.format(ROW_TIMESTAMP))?;
        writeln!(f, "  SHT35(temp): {:.2} [°C]", self.sht.temperature)?;
        writeln!(f, "  SHT35(hum) : {:.2} [%]", self.sht.humidity)?;
        writeln!(f, "  SEN0114    : {:.5}", self.sen0114)?;
        write!(f, "  SEN0193    : {:.5}", self.sen0193)
    }
}

pub struct SoilStation<I, S> {
    sht: Sht35<I>,
    adc: Mcp3208<S>,
    adc_ref_volts: f64,
    sen0114_channel: u8,
    sen0193_channel: u8,
}

impl SoilStation<I2cdev, SpidevDevice> {
    pub fn open(config: &Config) -> anyhow::Result<Self> {
        let i2c = I2cdev::new(&config.bus.i2c)
            .with_context(|| format!("Failed to open I2C bus {:?}", config.bus.i2c))?;
        let soil = &config.soil;

        let mut station = Self::new(
            Sht35::new(i2c, soil.sht35_addr, config.crc),
            Mcp3208::new(open_spi(&config.bus)?),
            soil.adc_ref_volts,
            soil.sen0114_channel,
            soil.sen0193_channel,
        );
        station.start(&mut Delay)?;
        Ok(station)
    }
}

impl<I, S> SoilStation<I, S>
where
    I: I2c,
    I::Error: Send + Sync + 'static,
    S: SpiDevice,
    S::Error: Send + Sync + 'static,
{
    pub fn new(
        sht: Sht35<I>,
        adc: Mcp3208<S>,
        adc_ref_volts: f64,
        sen0114_channel: u8,
        sen0193_channel: u8,
    ) -> Self {
        Self {
            sht,
            adc,
            adc_ref_volts,
            sen0114_channel,
            sen0193_channel,
        }
    }

    /// SHT35 periodic mode, then let it settle
    pub fn start(&mut self, delay: &mut impl DelayNs) -> anyhow::Result<()> {
        self.sht.start().context("SHT35 init failed")?;
        delay.delay_ms(SETTLE_MS);
        tracing::debug!("Soil sensors initialised");
        Ok(())
    }

    fn probe_percent(&mut self, channel: u8, name: &str) -> anyhow::Result<f64> {
        let raw = self
            .adc
            .read_raw(channel)
            .with_context(|| format!("MCP3208 read of {} failed", name))?;
        tracing::trace!(
            "{}: raw {} ({:.3} V)",
            name,
            raw,
            convert::adc_volts(raw, self.adc_ref_volts)
        );
        Ok(round_to(convert::adc_fraction(raw) * 100.0, 5))
    }

    #[cfg(test)]
    pub fn into_parts(self) -> (Sht35<I>, Mcp3208<S>) {
        (self.sht, self.adc)
    }
}

impl<I, S> Station for SoilStation<I, S>
where
    I: I2c,
    I::Error: Send + Sync + 'static,
    S: SpiDevice,
    S::Error: Send + Sync + 'static,
{
    type Sample = SoilSample;

    const NAME: &'static str = "inSoil";
    const LOG_PREFIX: &'static str = SOIL_PREFIX;

    fn measure(&mut self, at: DateTime<Local>) -> anyhow::Result<SoilSample> {
        let sht = self.sht.read().context("SHT35 read failed")?;
        let sen0114 = self.probe_percent(self.sen0114_channel, "SEN0114")?;
        let sen0193 = self.probe_percent(self.sen0193_channel, "SEN0193")?;

        Ok(SoilSample {
            taken_at: at,
            sht,
            sen0114,
            sen0193,
        })
    }

    fn release(&mut self) -> anyhow::Result<()> {
        // Nothing to stop; the handles close when the station drops.
        Ok(())
    }
}
