//! Raw count to physical unit conversions
//!
//! All functions are pure. Out-of-range input still maps to a number; no
//! validation happens here.

/// Full scale of a 16-bit Sensirion count
const SHT_FULL_SCALE: f64 = 65535.0;

/// LPS25HB: 4096 LSB per hPa
const LPS_LSB_PER_HPA: f64 = 4096.0;

/// Full scale of a 12-bit MCP3208 conversion
const ADC_FULL_SCALE: f64 = 4095.0;

/// SHT3x temperature in °C from the 16-bit raw count
pub fn temperature_celsius(raw: u16) -> f64 {
    -45.0 + 175.0 * f64::from(raw) / SHT_FULL_SCALE
}

/// SHT3x relative humidity in % from the 16-bit raw count
pub fn humidity_percent(raw: u16) -> f64 {
    100.0 * f64::from(raw) / SHT_FULL_SCALE
}

/// LPS25HB pressure in hPa from PRESS_OUT_XL, PRESS_OUT_L, PRESS_OUT_H
pub fn pressure_hpa(bytes: [u8; 3]) -> f64 {
    let count = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], 0]);
    f64::from(count) / LPS_LSB_PER_HPA
}

/// MCP3208 result as a fraction of full scale
pub fn adc_fraction(raw: u16) -> f64 {
    f64::from(raw) / ADC_FULL_SCALE
}

/// MCP3208 result in volts against `ref_volts`
pub fn adc_volts(raw: u16, ref_volts: f64) -> f64 {
    f64::from(raw) * ref_volts / ADC_FULL_SCALE
}

/// Pyranometer output: 1 mV per W/m²
pub fn irradiance_w_m2(volts: f64) -> f64 {
    volts * 1000.0
}

/// Big-endian 16-bit word from the first two bytes of a Sensirion triplet
pub fn sensirion_word(triplet: &[u8]) -> u16 {
    u16::from_be_bytes([triplet[0], triplet[1]])
}

/// SCD30 float: IEEE-754 big endian split over two words
pub fn sensirion_f32(high: u16, low: u16) -> f32 {
    f32::from_bits((u32::from(high) << 16) | u32::from(low))
}

/// Sensirion CRC-8: polynomial 0x31, init 0xFF, no final xor
pub fn crc8(data: &[u8]) -> u8 {
    let mut crc: u8 = 0xFF;
    for byte in data {
        crc ^= byte;
        for _ in 0..8 {
            crc = if crc & 0x80 != 0 {
                (crc << 1) ^ 0x31
            } else {
                crc << 1
            };
        }
    }
    crc
}
