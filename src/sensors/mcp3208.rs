//! MCP3208 12-bit, 8-channel ADC (SPI)

use embedded_hal::spi::SpiDevice;

use super::Error;

pub const CHANNELS: u8 = 8;

/// Single-ended conversion frame for `channel`.
///
/// Byte 0 holds the start bit, SGL/DIFF = 1 and D2; byte 1 holds D1 D0 in
/// its top bits. The result comes back as the low nibble of byte 1 and all
/// of byte 2.
pub fn request_frame(channel: u8) -> [u8; 3] {
    let ch = channel & 0x07;
    [0b0000_0110 | (ch >> 2), (ch & 0b11) << 6, 0]
}

pub fn decode_frame(frame: &[u8; 3]) -> u16 {
    (u16::from(frame[1] & 0x0F) << 8) | u16::from(frame[2])
}

pub struct Mcp3208<S> {
    spi: S,
}

impl<S: SpiDevice> Mcp3208<S> {
    pub fn new(spi: S) -> Self {
        Self { spi }
    }

    /// Raw 12-bit conversion of a single-ended channel
    pub fn read_raw(&mut self, channel: u8) -> Result<u16, Error<S::Error>> {
        let mut frame = request_frame(channel);
        self.spi.transfer_in_place(&mut frame)?;
        Ok(decode_frame(&frame))
    }

    #[cfg(test)]
    pub fn release(self) -> S {
        self.spi
    }
}
