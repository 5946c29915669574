//! FX2 firmware upload over vendor control transfers.
//!
//! An unprogrammed FX2 boots with nothing but the Cypress USB loader, which
//! accepts RAM writes through vendor request 0xA0.  Uploading means holding
//! the 8051 core in reset via its control register, writing every record of
//! the Intel-HEX image to its target address, and releasing reset so the
//! device renumerates with the new firmware's IDs.

use crate::constants::COMMAND_TIMEOUT;
use crate::{Error, Result};

#[allow(unused_imports)]
use log::{debug, error, info, trace, warn};
use rusb::{constants, Context, Device as RusbDevice, DeviceHandle};
use std::fs;
use std::path::Path;

/// Vendor request for reading and writing FX2 RAM
const REQUEST_FIRMWARE_LOAD: u8 = 0xa0;
/// CPU control/status register; bit 0 holds the core in reset
const CPUCS_ADDRESS: u16 = 0xe600;

const REQUEST_TYPE_OUT: u8 = constants::LIBUSB_REQUEST_TYPE_VENDOR
    | constants::LIBUSB_RECIPIENT_DEVICE
    | constants::LIBUSB_ENDPOINT_OUT;

/// Writes a firmware image into a device.  Pluggable so tests and
/// alternative loaders can substitute the standard one.
pub trait FirmwareUploader {
    /// Uploads the image at `firmware` into `device`.
    ///
    /// # Args:
    /// * `device` - the unprogrammed device, not yet open
    /// * `configuration` - USB configuration to select before uploading
    /// * `firmware` - path to an Intel-HEX image
    ///
    /// # Returns
    /// * `Ok(())` - upload complete; the device will now renumerate
    /// * `Err(Error)` - the image could not be read, parsed or written
    fn upload(&self, device: &RusbDevice<Context>, configuration: u8, firmware: &Path)
        -> Result<()>;
}

/// The standard Cypress EZ-USB loader.
#[derive(Debug, Default)]
pub struct EzUsb;

impl FirmwareUploader for EzUsb {
    fn upload(
        &self,
        device: &RusbDevice<Context>,
        configuration: u8,
        firmware: &Path,
    ) -> Result<()> {
        trace!("EzUsb::upload {}", firmware.display());

        let image = fs::read(firmware).map_err(|e| Error::Firmware {
            message: format!("cannot read {}: {}", firmware.display(), e),
        })?;
        let records = parse_ihex(&image)?;

        let mut handle = device.open()?;
        handle.set_active_configuration(configuration)?;

        info!(
            "uploading {} ({} records) to {:03}.{:03}",
            firmware.display(),
            records.len(),
            device.bus_number(),
            device.address()
        );

        set_cpu_reset(&handle, true)?;
        for record in &records {
            handle.write_control(
                REQUEST_TYPE_OUT,
                REQUEST_FIRMWARE_LOAD,
                record.address,
                0,
                &record.data,
                COMMAND_TIMEOUT,
            )?;
        }
        set_cpu_reset(&handle, false)?;

        Ok(())
    }
}

fn set_cpu_reset(handle: &DeviceHandle<Context>, hold: bool) -> Result<()> {
    debug!("{} CPU reset", if hold { "holding" } else { "releasing" });
    handle.write_control(
        REQUEST_TYPE_OUT,
        REQUEST_FIRMWARE_LOAD,
        CPUCS_ADDRESS,
        0,
        &[hold as u8],
        COMMAND_TIMEOUT,
    )?;
    Ok(())
}

struct IhexRecord {
    address: u16,
    data: Vec<u8>,
}

/// Parses the data records of an Intel-HEX image.
fn parse_ihex(image: &[u8]) -> Result<Vec<IhexRecord>> {
    let text = std::str::from_utf8(image).map_err(|_| Error::Firmware {
        message: "image is not valid Intel-HEX text".to_string(),
    })?;

    let mut records = Vec::new();
    for (lineno, line) in text.lines().enumerate() {
        let line = line.trim_end();
        if line.is_empty() {
            continue;
        }
        let body = line.strip_prefix(':').ok_or_else(|| Error::Firmware {
            message: format!("line {}: missing ':' record mark", lineno + 1),
        })?;

        let bytes = decode_hex(body).map_err(|message| Error::Firmware {
            message: format!("line {}: {}", lineno + 1, message),
        })?;
        if bytes.len() < 5 {
            return Err(Error::Firmware {
                message: format!("line {}: record too short", lineno + 1),
            });
        }

        let sum: u8 = bytes.iter().fold(0u8, |acc, b| acc.wrapping_add(*b));
        if sum != 0 {
            return Err(Error::Firmware {
                message: format!("line {}: checksum mismatch", lineno + 1),
            });
        }

        let length = bytes[0] as usize;
        let address = u16::from(bytes[1]) << 8 | u16::from(bytes[2]);
        let record_type = bytes[3];
        if bytes.len() != length + 5 {
            return Err(Error::Firmware {
                message: format!("line {}: length field disagrees with record", lineno + 1),
            });
        }

        match record_type {
            0x00 => records.push(IhexRecord {
                address,
                data: bytes[4..4 + length].to_vec(),
            }),
            0x01 => break,
            other => {
                // The FX2's 16-bit address space never needs extended records
                return Err(Error::Firmware {
                    message: format!("line {}: unsupported record type {:#04x}", lineno + 1, other),
                });
            }
        }
    }

    if records.is_empty() {
        return Err(Error::Firmware {
            message: "image contains no data records".to_string(),
        });
    }

    Ok(records)
}

fn decode_hex(body: &str) -> std::result::Result<Vec<u8>, String> {
    if body.len() % 2 != 0 {
        return Err("odd number of hex digits".to_string());
    }
    (0..body.len())
        .step_by(2)
        .map(|i| {
            u8::from_str_radix(&body[i..i + 2], 16).map_err(|_| "invalid hex digit".to_string())
        })
        .collect()
}
