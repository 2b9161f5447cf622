//! LPS25HB barometer (I2C)

use embedded_hal::i2c::I2c;

use super::{convert, Error};

/// Address with SA0 high
pub const ADDR: u8 = 0x5C;

const CTRL_REG1: u8 = 0x20;
/// PD = 1 (active), ODR = 001 (1 Hz)
const CTRL_REG1_ACTIVE_1HZ: u8 = 0x90;
const PRESS_OUT_XL: u8 = 0x28;
/// Register auto-increment on multi-byte reads
const AUTO_INCREMENT: u8 = 0x80;

pub struct Lps25hb<I> {
    i2c: I,
    address: u8,
}

impl<I: I2c> Lps25hb<I> {
    pub fn new(i2c: I, address: u8) -> Self {
        Self { i2c, address }
    }

    /// Power up with a 1 Hz output data rate
    pub fn start(&mut self) -> Result<(), Error<I::Error>> {
        self.i2c
            .write(self.address, &[CTRL_REG1, CTRL_REG1_ACTIVE_1HZ])?;
        Ok(())
    }

    /// PRESS_OUT_XL, PRESS_OUT_L, PRESS_OUT_H
    pub fn read_raw(&mut self) -> Result<[u8; 3], Error<I::Error>> {
        let mut buf = [0u8; 3];
        self.i2c
            .write_read(self.address, &[PRESS_OUT_XL | AUTO_INCREMENT], &mut buf)?;
        Ok(buf)
    }

    /// Pressure in hPa
    pub fn read_pressure(&mut self) -> Result<f64, Error<I::Error>> {
        Ok(convert::pressure_hpa(self.read_raw()?))
    }

    #[cfg(test)]
    pub fn release(self) -> I {
        self.i2c
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embedded_hal_mock::eh1::i2c::{Mock as I2cMock, Transaction};

    #[test]
    fn test_start_and_read() {
        let expectations = [
            Transaction::write(ADDR, vec![0x20, 0x90]),
            Transaction::write_read(ADDR, vec![0xA8], vec![0x8D, 0xF5, 0x3F]),
        ];
        let mut lps = Lps25hb::new(I2cMock::new(&expectations), ADDR);
        lps.start().unwrap();
        let hpa = lps.read_pressure().unwrap();
        assert!((hpa - 1023.346923828125).abs() < 1e-9);
        lps.release().done();
    }

    #[test]
    fn test_zero_count() {
        let expectations = [Transaction::write_read(ADDR, vec![0xA8], vec![0, 0, 0])];
        let mut lps = Lps25hb::new(I2cMock::new(&expectations), ADDR);
        assert_eq!(lps.read_pressure().unwrap(), 0.0);
        lps.release().done();
    }
}
