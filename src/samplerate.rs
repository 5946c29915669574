//! Samplerate support and the clock-divider encoding.
//!
//! The device derives its sample clock from a 48 MHz reference and a
//! one-byte divider.  The original firmware takes a plain `48 / rate - 1`
//! divider; the newer firmware uses an opaque per-rate table.

use crate::device::FirmwareGeneration;
use crate::{Error, Result};

/// Samplerates the device supports, slowest first.
pub static SUPPORTED_SAMPLERATES: &[u64] = &[
    200_000,
    250_000,
    500_000,
    1_000_000,
    2_000_000,
    4_000_000,
    8_000_000,
    12_000_000,
    16_000_000,
    24_000_000,
];

pub fn is_supported(rate: u64) -> bool {
    SUPPORTED_SAMPLERATES.contains(&rate)
}

/// Encodes a samplerate as the one-byte clock divider the firmware expects.
///
/// # Args:
/// * `rate` - samplerate in Hz; must be one of [`SUPPORTED_SAMPLERATES`]
/// * `generation` - which firmware encoding to use
///
/// # Returns
/// * `Ok(u8)` - the divider byte
/// * `Err(Error::Samplerate)` - if the rate is not supported
pub fn divider(rate: u64, generation: FirmwareGeneration) -> Result<u8> {
    if !is_supported(rate) {
        return Err(Error::Samplerate { rate });
    }

    let divider = match generation {
        FirmwareGeneration::New => new_firmware_divider(rate),
        FirmwareGeneration::Legacy => (48_000_000 / rate - 1) as u8,
    };

    Ok(divider)
}

fn new_firmware_divider(rate: u64) -> u8 {
    match rate {
        24_000_000 => 0xe0,
        16_000_000 => 0xd5,
        12_000_000 => 0xe2,
        8_000_000 => 0xd4,
        4_000_000 => 0xda,
        2_000_000 => 0xe6,
        1_000_000 => 0x8e,
        500_000 => 0xfe,
        250_000 => 0x9e,
        200_000 => 0x4e,
        // Guarded by is_supported()
        _ => unreachable!(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_legacy_dividers() {
        let expected = [
            (200_000, 0xef),
            (250_000, 0xbf),
            (500_000, 0x5f),
            (1_000_000, 0x2f),
            (2_000_000, 0x17),
            (4_000_000, 0x0b),
            (8_000_000, 0x05),
            (12_000_000, 0x03),
            (16_000_000, 0x02),
            (24_000_000, 0x01),
        ];
        for (rate, byte) in expected {
            assert_eq!(
                divider(rate, FirmwareGeneration::Legacy).unwrap(),
                byte,
                "legacy divider for {rate} Hz"
            );
        }
    }

    #[test]
    fn test_new_firmware_dividers() {
        let expected = [
            (200_000, 0x4e),
            (250_000, 0x9e),
            (500_000, 0xfe),
            (1_000_000, 0x8e),
            (2_000_000, 0xe6),
            (4_000_000, 0xda),
            (8_000_000, 0xd4),
            (12_000_000, 0xe2),
            (16_000_000, 0xd5),
            (24_000_000, 0xe0),
        ];
        for (rate, byte) in expected {
            assert_eq!(
                divider(rate, FirmwareGeneration::New).unwrap(),
                byte,
                "new-firmware divider for {rate} Hz"
            );
        }
    }

    #[test]
    fn test_unsupported_rate_rejected() {
        for generation in [FirmwareGeneration::Legacy, FirmwareGeneration::New] {
            assert!(matches!(
                divider(3_000_000, generation),
                Err(Error::Samplerate { rate: 3_000_000 })
            ));
            assert!(matches!(divider(0, generation), Err(Error::Samplerate { .. })));
        }
    }
}
