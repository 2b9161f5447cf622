//! SCD30 CO2 / temperature / humidity module (I2C)
//!
//! Commands are 16-bit big endian. Arguments and every returned word carry
//! a Sensirion CRC-8 byte. A read is a command write, a pause of at least
//! 3 ms, then a plain read.

use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::I2c;

use super::{convert, CrcCheck, Error};

pub const ADDR: u8 = 0x61;

const CMD_START_CONTINUOUS: u16 = 0x0010;
const CMD_STOP_CONTINUOUS: u16 = 0x0104;
const CMD_SET_INTERVAL: u16 = 0x4600;
const CMD_DATA_READY: u16 = 0x0202;
const CMD_READ_MEASUREMENT: u16 = 0x0300;

const READ_DELAY_MS: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Measurement {
    pub co2_ppm: f32,
    pub temperature: f32,
    pub humidity: f32,
}

pub struct Scd30<I, D> {
    i2c: I,
    delay: D,
    address: u8,
    crc: CrcCheck,
}

impl<I: I2c, D: DelayNs> Scd30<I, D> {
    pub fn new(i2c: I, delay: D, address: u8, crc: CrcCheck) -> Self {
        Self {
            i2c,
            delay,
            address,
            crc,
        }
    }

    fn command(&mut self, cmd: u16) -> Result<(), Error<I::Error>> {
        self.i2c.write(self.address, &cmd.to_be_bytes())?;
        Ok(())
    }

    fn command_with_arg(&mut self, cmd: u16, arg: u16) -> Result<(), Error<I::Error>> {
        let [c0, c1] = cmd.to_be_bytes();
        let [a0, a1] = arg.to_be_bytes();
        let crc = convert::crc8(&[a0, a1]);
        self.i2c.write(self.address, &[c0, c1, a0, a1, crc])?;
        Ok(())
    }

    fn read_response(&mut self, cmd: u16, buf: &mut [u8]) -> Result<(), Error<I::Error>> {
        self.command(cmd)?;
        self.delay.delay_ms(READ_DELAY_MS);
        self.i2c.read(self.address, buf)?;
        Ok(())
    }

    /// Interval between internal measurements, 2..=1800 s
    pub fn set_measurement_interval(&mut self, seconds: u16) -> Result<(), Error<I::Error>> {
        self.command_with_arg(CMD_SET_INTERVAL, seconds)
    }

    /// Start continuous measurement; 0 disables pressure compensation
    pub fn start_continuous(&mut self, ambient_pressure_mbar: u16) -> Result<(), Error<I::Error>> {
        self.command_with_arg(CMD_START_CONTINUOUS, ambient_pressure_mbar)
    }

    pub fn stop_continuous(&mut self) -> Result<(), Error<I::Error>> {
        self.command(CMD_STOP_CONTINUOUS)
    }

    pub fn data_ready(&mut self) -> Result<bool, Error<I::Error>> {
        let mut buf = [0u8; 3];
        self.read_response(CMD_DATA_READY, &mut buf)?;
        self.crc.verify("SCD30 data ready", &buf)?;
        Ok(convert::sensirion_word(&buf) == 1)
    }

    pub fn read_measurement(&mut self) -> Result<Measurement, Error<I::Error>> {
        let mut buf = [0u8; 18];
        self.read_response(CMD_READ_MEASUREMENT, &mut buf)?;

        const NAMES: [&str; 6] = [
            "SCD30 CO2 high",
            "SCD30 CO2 low",
            "SCD30 temperature high",
            "SCD30 temperature low",
            "SCD30 humidity high",
            "SCD30 humidity low",
        ];
        let mut words = [0u16; 6];
        for (i, triplet) in buf.chunks_exact(3).enumerate() {
            self.crc.verify(NAMES[i], triplet)?;
            words[i] = convert::sensirion_word(triplet);
        }

        Ok(Measurement {
            co2_ppm: convert::sensirion_f32(words[0], words[1]),
            temperature: convert::sensirion_f32(words[2], words[3]),
            humidity: convert::sensirion_f32(words[4], words[5]),
        })
    }

    /// Poll data-ready up to `attempts` times, `wait_ms` apart, then read.
    /// `None` when the sensor never reported ready.
    pub fn poll_measurement(
        &mut self,
        attempts: u32,
        wait_ms: u32,
    ) -> Result<Option<Measurement>, Error<I::Error>> {
        for attempt in 0..attempts {
            if self.data_ready()? {
                return self.read_measurement().map(Some);
            }
            if attempt + 1 < attempts {
                self.delay.delay_ms(wait_ms);
            }
        }
        Ok(None)
    }

    #[cfg(test)]
    pub fn release(self) -> (I, D) {
        (self.i2c, self.delay)
    }
}
