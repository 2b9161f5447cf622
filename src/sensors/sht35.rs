//! SHT35 temperature/humidity sensor (I2C)

use embedded_hal::i2c::I2c;

use super::{convert, CrcCheck, Error};

/// Address with ADDR pin low
pub const ADDR_LOW: u8 = 0x44;
/// Address with ADDR pin high
pub const ADDR_HIGH: u8 = 0x45;

/// Periodic mode, 1 measurement per second, high repeatability
const CMD_PERIODIC_1MPS_HIGH: [u8; 2] = [0x21, 0x30];
/// Fetch the latest periodic measurement
const CMD_FETCH_DATA: [u8; 2] = [0xE0, 0x00];

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Reading {
    pub temperature: f64,
    pub humidity: f64,
}

pub struct Sht35<I> {
    i2c: I,
    address: u8,
    crc: CrcCheck,
}

impl<I: I2c> Sht35<I> {
    pub fn new(i2c: I, address: u8, crc: CrcCheck) -> Self {
        Self { i2c, address, crc }
    }

    /// Start periodic acquisition
    pub fn start(&mut self) -> Result<(), Error<I::Error>> {
        self.i2c.write(self.address, &CMD_PERIODIC_1MPS_HIGH)?;
        Ok(())
    }

    /// Fetch the latest measurement: `T_msb T_lsb T_crc RH_msb RH_lsb RH_crc`
    pub fn read_raw(&mut self) -> Result<[u8; 6], Error<I::Error>> {
        let mut buf = [0u8; 6];
        self.i2c.write(self.address, &CMD_FETCH_DATA)?;
        self.i2c.write_read(self.address, &[0x00], &mut buf)?;
        Ok(buf)
    }

    pub fn read(&mut self) -> Result<Reading, Error<I::Error>> {
        let raw = self.read_raw()?;
        self.crc.verify("SHT35 temperature", &raw[0..3])?;
        self.crc.verify("SHT35 humidity", &raw[3..6])?;
        Ok(Reading {
            temperature: convert::temperature_celsius(convert::sensirion_word(&raw[0..3])),
            humidity: convert::humidity_percent(convert::sensirion_word(&raw[3..6])),
        })
    }

    /// Give the bus handle back
    #[cfg(test)]
    pub fn release(self) -> I {
        self.i2c
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embedded_hal::i2c::ErrorKind;
    use embedded_hal_mock::eh1::i2c::{Mock as I2cMock, Transaction};

    #[test]
    fn test_start_sends_periodic_command() {
        let expectations = [Transaction::write(ADDR_HIGH, vec![0x21, 0x30])];
        let mut sht = Sht35::new(I2cMock::new(&expectations), ADDR_HIGH, CrcCheck::Warn);
        sht.start().unwrap();
        sht.release().done();
    }

    #[test]
    fn test_read_converts_both_words() {
        let expectations = [
            Transaction::write(ADDR_LOW, vec![0xE0, 0x00]),
            Transaction::write_read(
                ADDR_LOW,
                vec![0x00],
                vec![0x66, 0x66, 0x93, 0x80, 0x00, 0xA2],
            ),
        ];
        let mut sht = Sht35::new(I2cMock::new(&expectations), ADDR_LOW, CrcCheck::Reject);
        let reading = sht.read().unwrap();
        assert!((reading.temperature - 25.0).abs() < 1e-9);
        assert!((reading.humidity - 50.0).abs() < 0.001);
        sht.release().done();
    }

    #[test]
    fn test_bad_crc_rejected_when_strict() {
        let expectations = [
            Transaction::write(ADDR_LOW, vec![0xE0, 0x00]),
            Transaction::write_read(
                ADDR_LOW,
                vec![0x00],
                vec![0x66, 0x66, 0x00, 0x80, 0x00, 0xA2],
            ),
        ];
        let mut sht = Sht35::new(I2cMock::new(&expectations), ADDR_LOW, CrcCheck::Reject);
        assert!(matches!(sht.read(), Err(Error::Crc { .. })));
        sht.release().done();
    }

    #[test]
    fn test_bad_crc_kept_when_warning() {
        let expectations = [
            Transaction::write(ADDR_LOW, vec![0xE0, 0x00]),
            Transaction::write_read(
                ADDR_LOW,
                vec![0x00],
                vec![0x66, 0x66, 0x00, 0x80, 0x00, 0x00],
            ),
        ];
        let mut sht = Sht35::new(I2cMock::new(&expectations), ADDR_LOW, CrcCheck::Warn);
        assert!(sht.read().is_ok());
        sht.release().done();
    }

    #[test]
    fn test_bus_error_propagates() {
        let expectations =
            [Transaction::write(ADDR_LOW, vec![0xE0, 0x00]).with_error(ErrorKind::Other)];
        let mut sht = Sht35::new(I2cMock::new(&expectations), ADDR_LOW, CrcCheck::Warn);
        assert!(matches!(sht.read(), Err(Error::Bus(ErrorKind::Other))));
        sht.release().done();
    }
}
