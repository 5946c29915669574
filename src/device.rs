//! Per-device state: discovery records, USB attachment, and the firmware
//! presence check.

use crate::acquisition::Engine;
use crate::profile::Profile;
use crate::session::Sink;
use crate::trigger::TriggerMatcher;

#[allow(unused_imports)]
use log::{debug, error, info, trace, warn};
use rusb::constants::{LIBUSB_ENDPOINT_IN, LIBUSB_ENDPOINT_OUT};
use rusb::{Context, Device as RusbDevice, DeviceHandle, UsbContext};
use std::time::Instant;

/// Device address recorded for an instance that has just received firmware
/// and has not yet been re-located on the bus.
pub(crate) const ADDRESS_UNKNOWN: u8 = 0xff;

/// Lifecycle state of a discovered device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceStatus {
    /// Registered at scan time; firmware was uploaded and the device has not
    /// renumerated yet
    Initializing,
    /// Fully enumerated and located, but not open
    Inactive,
    /// Open with the interface claimed
    Active,
    /// No device is registered at the queried index
    NotFound,
}

/// Which firmware image the device runs.  The two generations differ in
/// endpoint count and in how the samplerate divider is encoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FirmwareGeneration {
    /// Original two-endpoint firmware
    Legacy,
    /// Four-endpoint firmware with the table-driven divider encoding
    New,
}

/// Where the device sits on the bus, and the open handle once there is one.
#[derive(Debug)]
pub(crate) struct UsbPort {
    pub bus: u8,
    pub address: u8,
    pub handle: Option<DeviceHandle<Context>>,
}

/// One discovered candidate device.
///
/// Created by the driver's scan, freed at cleanup.  All acquisition state
/// (transfer pool, sample counter, the armed trigger) lives here so multiple
/// devices can stream independently.
pub struct DeviceInstance {
    pub(crate) index: usize,
    pub(crate) status: DeviceStatus,
    pub(crate) profile: &'static Profile,
    pub(crate) usb: UsbPort,
    pub(crate) generation: FirmwareGeneration,
    /// When firmware was last uploaded; `None` if the device already had it
    pub(crate) fw_upload_time: Option<Instant>,
    /// Zero until a samplerate has been configured
    pub(crate) cur_samplerate: u64,
    /// Zero means unbounded
    pub(crate) limit_samples: u64,
    /// Bit `i` set means probe `i + 1` is enabled
    pub(crate) probe_mask: u16,
    /// Armed trigger template; each acquisition starts from a fresh copy
    pub(crate) trigger: TriggerMatcher,
    pub(crate) engine: Option<Engine>,
    pub(crate) session: Option<Box<dyn Sink>>,
}

impl DeviceInstance {
    pub(crate) fn new(index: usize, profile: &'static Profile) -> Self {
        DeviceInstance {
            index,
            status: DeviceStatus::Initializing,
            profile,
            usb: UsbPort {
                bus: 0,
                address: ADDRESS_UNKNOWN,
                handle: None,
            },
            generation: FirmwareGeneration::Legacy,
            fw_upload_time: None,
            cur_samplerate: 0,
            limit_samples: 0,
            probe_mask: 0,
            trigger: TriggerMatcher::pass_through(),
            engine: None,
            session: None,
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn status(&self) -> DeviceStatus {
        self.status
    }

    pub fn profile(&self) -> &'static Profile {
        self.profile
    }

    pub fn generation(&self) -> FirmwareGeneration {
        self.generation
    }

    /// Samplerate in Hz, or zero if not configured yet.
    pub fn samplerate(&self) -> u64 {
        self.cur_samplerate
    }

    pub fn limit_samples(&self) -> u64 {
        self.limit_samples
    }

    pub fn probe_mask(&self) -> u16 {
        self.probe_mask
    }

    /// Bus number and device address.  The address is 0xff for a device that
    /// received firmware and has not been re-located yet.
    pub fn location(&self) -> (u8, u8) {
        (self.usb.bus, self.usb.address)
    }
}

impl std::fmt::Debug for DeviceInstance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceInstance")
            .field("index", &self.index)
            .field("status", &self.status)
            .field("profile", &self.profile.model)
            .field("bus", &self.usb.bus)
            .field("address", &self.usb.address)
            .field("samplerate", &self.cur_samplerate)
            .finish()
    }
}

/// Checks whether a device's USB configuration matches the Logic firmware.
///
/// The firmware presents exactly one configuration with one interface and
/// one altsetting, endpoint 1 OUT followed by endpoint 2 IN.  The endpoint
/// count tells the generations apart: two for the original firmware, four
/// for the new one.
///
/// # Returns
/// * `Some(FirmwareGeneration)` - the device already runs the firmware
/// * `None` - bare FX2, or some unrelated device
pub(crate) fn detect_firmware<T: UsbContext>(device: &RusbDevice<T>) -> Option<FirmwareGeneration> {
    let descriptor = device.device_descriptor().ok()?;
    if descriptor.num_configurations() != 1 {
        return None;
    }

    let config = device.config_descriptor(0).ok()?;
    if config.num_interfaces() != 1 {
        return None;
    }

    let interface = config.interfaces().next()?;
    let mut altsettings = interface.descriptors();
    let setting = altsettings.next()?;
    if altsettings.next().is_some() {
        return None;
    }

    let generation = match setting.num_endpoints() {
        2 => FirmwareGeneration::Legacy,
        4 => FirmwareGeneration::New,
        _ => return None,
    };

    // TODO: the new firmware's two extra endpoints have unknown roles; only
    // the first two are checked here
    let mut endpoints = setting.endpoint_descriptors();
    let first = endpoints.next()?;
    let second = endpoints.next()?;
    if first.address() & 0x8f != 1 | LIBUSB_ENDPOINT_OUT {
        return None;
    }
    if second.address() & 0x8f != 2 | LIBUSB_ENDPOINT_IN {
        return None;
    }

    Some(generation)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::SUPPORTED_FX2;

    #[test]
    fn test_new_instance_defaults() {
        let inst = DeviceInstance::new(3, &SUPPORTED_FX2[0]);
        assert_eq!(inst.index(), 3);
        assert_eq!(inst.status(), DeviceStatus::Initializing);
        assert_eq!(inst.samplerate(), 0);
        assert_eq!(inst.limit_samples(), 0);
        assert_eq!(inst.location().1, ADDRESS_UNKNOWN);
        assert!(inst.trigger.fired());
    }
}
