//! Sensors module - bus drivers, unit conversion and host telemetry

pub mod convert;
pub mod lps25hb;
pub mod mcp3208;
pub mod scd30;
pub mod sht35;
pub mod sysinfo;

use serde::{Deserialize, Serialize};

/// Driver error, generic over the bus error type
#[derive(Debug, thiserror::Error)]
pub enum Error<E> {
    #[error("bus transfer failed: {0:?}")]
    Bus(E),
    #[error("CRC mismatch on {word}: expected {expected:#04x}, got {actual:#04x}")]
    Crc {
        word: &'static str,
        expected: u8,
        actual: u8,
    },
}

impl<E> From<E> for Error<E> {
    fn from(e: E) -> Self {
        Error::Bus(e)
    }
}

/// What to do with a Sensirion word whose CRC byte does not match
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CrcCheck {
    /// Never look at the CRC byte
    Ignore,
    /// Log the mismatch and keep the value
    #[default]
    Warn,
    /// Fail the read
    Reject,
}

impl CrcCheck {
    /// Check one `[msb, lsb, crc]` triplet under this policy
    pub fn verify<E>(self, word: &'static str, triplet: &[u8]) -> Result<(), Error<E>> {
        if self == CrcCheck::Ignore {
            return Ok(());
        }
        let expected = convert::crc8(&triplet[..2]);
        let actual = triplet[2];
        if expected == actual {
            return Ok(());
        }
        match self {
            CrcCheck::Reject => Err(Error::Crc {
                word,
                expected,
                actual,
            }),
            _ => {
                tracing::warn!(
                    "CRC mismatch on {}: expected {:#04x}, got {:#04x}",
                    word,
                    expected,
                    actual
                );
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    type TestError = Error<()>;

    #[test]
    fn test_crc_policy() {
        let good = [0xBE, 0xEF, 0x92];
        let bad = [0xBE, 0xEF, 0x00];

        assert!(CrcCheck::Reject.verify::<()>("t", &good).is_ok());
        assert!(CrcCheck::Ignore.verify::<()>("t", &bad).is_ok());
        assert!(CrcCheck::Warn.verify::<()>("t", &bad).is_ok());

        let err: TestError = CrcCheck::Reject.verify("humidity", &bad).unwrap_err();
        match err {
            Error::Crc {
                word,
                expected,
                actual,
            } => {
                assert_eq!(word, "humidity");
                assert_eq!(expected, 0x92);
                assert_eq!(actual, 0x00);
            }
            Error::Bus(_) => panic!("expected CRC error"),
        }
    }
}
