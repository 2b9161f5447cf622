//! Air station: SHT35, LPS25HB, SCD30 and a pyranometer on the MCP3208

use anyhow::Context;
use chrono::{DateTime, Local};
use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::I2c;
use embedded_hal::spi::SpiDevice;
use linux_embedded_hal::{Delay, I2cdev, SpidevDevice};
use std::fmt;

use super::{open_spi, Station};
use crate::config::Config;
use crate::datalog::{Record, AIR_PREFIX};
use crate::sensors::convert;
use crate::sensors::lps25hb::Lps25hb;
use crate::sensors::mcp3208::Mcp3208;
use crate::sensors::scd30::{self, Scd30};
use crate::sensors::sht35::{self, Sht35};
use crate::shared::{format_optional, format_reading, round_to, ROW_TIMESTAMP};

const SCD30_READY_ATTEMPTS: u32 = 5;
const SCD30_READY_WAIT_MS: u32 = 100;

#[derive(Debug, Clone, PartialEq)]
pub struct AirSample {
    pub taken_at: DateTime<Local>,
    pub sht: sht35::Reading,
    pub pressure_hpa: f64,
    /// `None` when the SCD30 had nothing ready
    pub scd30: Option<scd30::Measurement>,
    pub irradiance_w_m2: f64,
}

impl Record for AirSample {
    fn taken_at(&self) -> DateTime<Local> {
        self.taken_at
    }

    fn fields(&self) -> Vec<String> {
        let scd = |f: fn(&scd30::Measurement) -> f32| {
            format_optional(self.scd30.as_ref().map(|m| f64::from(f(m))), 2)
        };
        vec![
            format_reading(self.sht.temperature, 2),
            format_reading(self.sht.humidity, 2),
            format_reading(self.pressure_hpa, 2),
            scd(|m| m.co2_ppm),
            scd(|m| m.temperature),
            scd(|m| m.humidity),
            format_reading(self.irradiance_w_m2, 2),
        ]
    }
}

impl fmt::Display for AirSample {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.taken_at.format(ROW_TIMESTAMP))?;
        writeln!(f, "  Temperature (SHT35)  : {:.2} °C", self.sht.temperature)?;
        writeln!(f, "  Humidity (SHT35)     : {:.2} %", self.sht.humidity)?;
        writeln!(f, "  Pressure (LPS25HB)   : {:.2} hPa", self.pressure_hpa)?;
        match &self.scd30 {
            Some(m) => {
                writeln!(f, "  CO2 (SCD30)          : {:.2} ppm", m.co2_ppm)?;
                writeln!(f, "  Temperature (SCD30)  : {:.2} °C", m.temperature)?;
                writeln!(f, "  Humidity (SCD30)     : {:.2} %", m.humidity)?;
            }
            None => writeln!(f, "  SCD30                : no data")?,
        }
        write!(f, "  Solar irradiance     : {:.2} W/m2", self.irradiance_w_m2)
    }
}

pub struct AirStation<I, S, D> {
    sht: Sht35<I>,
    lps: Lps25hb<I>,
    scd: Scd30<I, D>,
    adc: Mcp3208<S>,
    adc_ref_volts: f64,
    solar_channel: u8,
}

impl AirStation<I2cdev, SpidevDevice, Delay> {
    /// Open the Linux bus devices and run every init sequence
    pub fn open(config: &Config) -> anyhow::Result<Self> {
        let i2c = || {
            I2cdev::new(&config.bus.i2c)
                .with_context(|| format!("Failed to open I2C bus {:?}", config.bus.i2c))
        };
        let air = &config.air;

        let mut station = Self::new(
            Sht35::new(i2c()?, air.sht35_addr, config.crc),
            Lps25hb::new(i2c()?, air.lps25hb_addr),
            Scd30::new(i2c()?, Delay, air.scd30_addr, config.crc),
            Mcp3208::new(open_spi(&config.bus)?),
            air.adc_ref_volts,
            air.solar_channel,
        );
        station.start(air.scd30_interval_secs)?;
        Ok(station)
    }
}

impl<I, S, D> AirStation<I, S, D>
where
    I: I2c,
    I::Error: Send + Sync + 'static,
    S: SpiDevice,
    S::Error: Send + Sync + 'static,
    D: DelayNs,
{
    pub fn new(
        sht: Sht35<I>,
        lps: Lps25hb<I>,
        scd: Scd30<I, D>,
        adc: Mcp3208<S>,
        adc_ref_volts: f64,
        solar_channel: u8,
    ) -> Self {
        Self {
            sht,
            lps,
            scd,
            adc,
            adc_ref_volts,
            solar_channel,
        }
    }

    /// SHT35 periodic mode, LPS25HB power-up, SCD30 continuous measurement
    pub fn start(&mut self, scd30_interval_secs: u16) -> anyhow::Result<()> {
        self.sht.start().context("SHT35 init failed")?;
        self.lps.start().context("LPS25HB init failed")?;
        self.scd
            .set_measurement_interval(scd30_interval_secs)
            .context("SCD30 interval setup failed")?;
        self.scd
            .start_continuous(0)
            .context("SCD30 start failed")?;
        tracing::debug!("Air sensors initialised");
        Ok(())
    }

    fn irradiance(&mut self) -> anyhow::Result<f64> {
        let raw = self
            .adc
            .read_raw(self.solar_channel)
            .context("MCP3208 read failed")?;
        let volts = round_to(convert::adc_volts(raw, self.adc_ref_volts), 4);
        Ok(convert::irradiance_w_m2(volts))
    }

    #[cfg(test)]
    pub fn into_parts(self) -> (Sht35<I>, Lps25hb<I>, Scd30<I, D>, Mcp3208<S>) {
        (self.sht, self.lps, self.scd, self.adc)
    }
}

impl<I, S, D> Station for AirStation<I, S, D>
where
    I: I2c,
    I::Error: Send + Sync + 'static,
    S: SpiDevice,
    S::Error: Send + Sync + 'static,
    D: DelayNs,
{
    type Sample = AirSample;

    const NAME: &'static str = "inAir";
    const LOG_PREFIX: &'static str = AIR_PREFIX;

    fn measure(&mut self, at: DateTime<Local>) -> anyhow::Result<AirSample> {
        let sht = self.sht.read().context("SHT35 read failed")?;
        let pressure_hpa = self
            .lps
            .read_pressure()
            .context("LPS25HB read failed")?;
        let scd30 = self
            .scd
            .poll_measurement(SCD30_READY_ATTEMPTS, SCD30_READY_WAIT_MS)
            .context("SCD30 read failed")?;
        if scd30.is_none() {
            tracing::warn!("SCD30 had no measurement ready, leaving its columns empty");
        }
        let irradiance_w_m2 = self.irradiance()?;

        Ok(AirSample {
            taken_at: at,
            sht,
            pressure_hpa,
            scd30,
            irradiance_w_m2,
        })
    }

    fn release(&mut self) -> anyhow::Result<()> {
        self.scd
            .stop_continuous()
            .context("SCD30 stop failed")?;
        tracing::debug!("Air sensors released");
        Ok(())
    }
}
