//! [`Driver`] is the main interface to the analyzer hardware: it owns the
//! USB context and the registry of discovered devices, and exposes the
//! scan/open/configure/stream lifecycle to the host application.
use crate::acquisition::{Action, Engine};
use crate::constants::{
    CMD_SET_DIVIDER, CMD_SET_DIVIDER_NEW, COMMAND_ENDPOINT, COMMAND_TIMEOUT, NUM_TRIGGER_STAGES,
    RENUM_POLL_INTERVAL, RENUM_SETTLE_DELAY, SAMPLE_ENDPOINT, TRANSFER_TIMEOUT,
};
use crate::device::{
    detect_firmware, DeviceInstance, DeviceStatus, FirmwareGeneration, ADDRESS_UNKNOWN,
};
use crate::firmware::FirmwareUploader;
use crate::profile;
use crate::samplerate::{self, SUPPORTED_SAMPLERATES};
use crate::session::{Header, Packet, Sink, FEED_VERSION};
use crate::trigger::TriggerMatcher;
use crate::{Error, Result};

#[allow(unused_imports)]
use log::{debug, error, info, trace, warn};
use rusb::{Context, UsbContext};
use std::path::PathBuf;
use std::thread::sleep;
use std::time::{Duration, Instant, SystemTime};

pub mod builder;

pub use builder::DriverBuilder;

/// Hardware capabilities advertised to the host.  Sample limiting and
/// continuous capture are implemented in the driver, not the hardware.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    LogicAnalyzer,
    Samplerate,
    LimitSamples,
    Continuous,
}

static HWCAPS: &[Capability] = &[
    Capability::LogicAnalyzer,
    Capability::Samplerate,
    Capability::LimitSamples,
    Capability::Continuous,
];

/// Display names for the probes.  Only the first eight are sampled by the
/// Saleae firmware even on sixteen-pin FX2 boards.
static PROBE_NAMES: &[&str] = &[
    "0", "1", "2", "3", "4", "5", "6", "7", "8", "9", "10", "11", "12", "13", "14", "15",
];

/// Trigger characters accepted in a probe's trigger pattern
static TRIGGER_TYPES: &str = "01";

/// One probe's configuration, as supplied by the host.
#[derive(Debug, Clone, PartialEq)]
pub struct Probe {
    /// Probe number, 1-based
    pub index: usize,
    pub enabled: bool,
    /// Per-stage trigger pattern over `{'0', '1', '.'}`, or `None` for no
    /// trigger on this probe
    pub trigger: Option<String>,
}

/// A configurable item on a device.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigOption<'a> {
    /// Samplerate in Hz
    Samplerate(u64),
    /// Enabled probes and their trigger patterns
    Probes(&'a [Probe]),
    /// Maximum number of samples to capture; zero means unbounded
    LimitSamples(u64),
}

/// Keys accepted by [`Driver::info`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InfoKey {
    NumProbes,
    ProbeNames,
    Samplerates,
    TriggerTypes,
    CurSamplerate,
}

/// Values returned by [`Driver::info`].
#[derive(Debug, Clone, PartialEq)]
pub enum InfoItem {
    NumProbes(u16),
    ProbeNames(&'static [&'static str]),
    Samplerates(&'static [u64]),
    TriggerTypes(&'static str),
    CurSamplerate(u64),
}

/// The acquisition driver.
///
/// Use [`DriverBuilder`] to create one, then:
/// * [`Driver::init`] - scan the bus and upload firmware where needed
/// * [`Driver::open`] - open and claim one of the discovered devices
/// * [`Driver::config_set`] - samplerate, probes/trigger, sample limit
/// * [`Driver::acquisition_start`] - begin streaming into a [`Sink`]
/// * [`Driver::acquisition_poll`] - service transfer completions
/// * [`Driver::acquisition_stop`] - drain and end the stream
/// * [`Driver::cleanup`] - close everything
pub struct Driver {
    pub(crate) context: Context,
    pub(crate) devices: Vec<DeviceInstance>,
    pub(crate) firmware: PathBuf,
    pub(crate) uploader: Box<dyn FirmwareUploader>,
    pub(crate) num_transfers: usize,
    pub(crate) max_empty_transfers: usize,
    pub(crate) renum_delay: Duration,
    pub(crate) usb_configuration: u8,
    pub(crate) usb_interface: u8,
    /// Percentage of the sample limit retained as a pre-trigger window
    pub(crate) capture_ratio: u8,
}

impl Driver {
    /// Scans the bus for supported devices and registers an instance for
    /// each.  Devices that already run the firmware are recorded at their
    /// bus address; bare ones get the firmware uploaded and are re-located
    /// at [`Driver::open`] time once they have renumerated.
    ///
    /// Per-device failures are logged and skipped, never fatal.
    ///
    /// # Returns
    /// * `Ok(usize)` - number of candidate devices registered
    /// * `Err(Error)` - if the bus itself could not be enumerated
    pub fn init(&mut self) -> Result<usize> {
        trace!("Driver::init");
        if !self.devices.is_empty() {
            return Err(Error::InvalidState {
                message: "driver is already initialized".to_string(),
            });
        }

        let devices = self.context.devices()?;
        for device in devices.iter() {
            let descriptor = match device.device_descriptor() {
                Ok(descriptor) => descriptor,
                Err(e) => {
                    error!("failed to get device descriptor: {}", e);
                    continue;
                }
            };
            let Some(profile) =
                profile::by_orig_ids(descriptor.vendor_id(), descriptor.product_id())
            else {
                continue;
            };

            let index = self.devices.len();
            let mut inst = DeviceInstance::new(index, profile);
            inst.usb.bus = device.bus_number();

            if let Some(generation) = detect_firmware(&device) {
                // Already has the firmware, so the address is final
                debug!(
                    "found a {} {} with {:?} firmware",
                    profile.vendor, profile.model, generation
                );
                inst.status = DeviceStatus::Inactive;
                inst.generation = generation;
                inst.usb.address = device.address();
            } else {
                match self
                    .uploader
                    .upload(&device, self.usb_configuration, &self.firmware)
                {
                    // Remember when the firmware on this device was updated
                    Ok(()) => inst.fw_upload_time = Some(Instant::now()),
                    Err(e) => error!("firmware upload failed for device {}: {}", index, e),
                }
            }
            self.devices.push(inst);
        }

        info!("found {} candidate device(s)", self.devices.len());
        Ok(self.devices.len())
    }

    /// Opens a registered device and claims its interface.
    ///
    /// A device that just received firmware is given up to the configured
    /// renumeration delay to reappear at its post-firmware IDs.  If no
    /// samplerate has been configured yet the slowest supported one is set.
    pub fn open(&mut self, index: usize) -> Result<()> {
        trace!("Driver::open {}", index);
        let uploaded_at = self.device_ref(index)?.fw_upload_time;

        if let Some(uploaded_at) = uploaded_at {
            info!("waiting for device to reset");
            // Takes at least 300ms for the FX2 to be gone from the USB bus
            sleep(RENUM_SETTLE_DELAY);
            loop {
                match self.locate_and_open(index) {
                    Ok(()) => break,
                    Err(e) => {
                        if uploaded_at.elapsed() >= self.renum_delay {
                            return Err(e);
                        }
                        sleep(RENUM_POLL_INTERVAL);
                    }
                }
            }
            info!(
                "device came back after {} ms",
                uploaded_at.elapsed().as_millis()
            );
        } else {
            self.locate_and_open(index)?;
        }

        let usb_interface = self.usb_interface;
        let inst = self.device_mut(index)?;
        let handle = inst.usb.handle.as_mut().ok_or_else(|| Error::Bug {
            message: "open device lost its handle".to_string(),
        })?;
        handle.claim_interface(usb_interface)?;

        if inst.cur_samplerate == 0 {
            // Samplerate hasn't been set; default to the slowest one
            set_samplerate(inst, SUPPORTED_SAMPLERATES[0])?;
        }

        Ok(())
    }

    /// Releases the interface and closes the USB handle.  Stops a running
    /// acquisition first.
    pub fn close(&mut self, index: usize) -> Result<()> {
        trace!("Driver::close {}", index);
        if self.device_ref(index)?.engine.is_some() {
            self.acquisition_stop(index)?;
        }

        let usb_interface = self.usb_interface;
        let inst = self.device_mut(index)?;
        let Some(mut handle) = inst.usb.handle.take() else {
            return Ok(());
        };
        info!(
            "closing device {} on {}.{} interface {}",
            index, inst.usb.bus, inst.usb.address, usb_interface
        );
        if let Err(e) = handle.release_interface(usb_interface) {
            warn!("failed to release interface: {}", e);
        }
        inst.status = DeviceStatus::Inactive;
        Ok(())
    }

    /// Closes every device and empties the registry.
    pub fn cleanup(&mut self) -> Result<()> {
        trace!("Driver::cleanup");
        for index in 0..self.devices.len() {
            if let Err(e) = self.close(index) {
                // Log error, but continue cleaning up the rest
                error!("failed to close device {}: {}", index, e);
            }
        }
        self.devices.clear();
        Ok(())
    }

    /// Lifecycle state of the device at `index`, or
    /// [`DeviceStatus::NotFound`] if no such device is registered.
    pub fn status(&self, index: usize) -> DeviceStatus {
        self.devices
            .get(index)
            .map_or(DeviceStatus::NotFound, |inst| inst.status)
    }

    pub fn device(&self, index: usize) -> Option<&DeviceInstance> {
        self.devices.get(index)
    }

    pub fn device_count(&self) -> usize {
        self.devices.len()
    }

    /// Static and per-device information.
    pub fn info(&self, index: usize, key: InfoKey) -> Result<InfoItem> {
        let inst = self.device_ref(index)?;
        let item = match key {
            InfoKey::NumProbes => InfoItem::NumProbes(inst.profile.num_probes),
            InfoKey::ProbeNames => InfoItem::ProbeNames(PROBE_NAMES),
            InfoKey::Samplerates => InfoItem::Samplerates(SUPPORTED_SAMPLERATES),
            InfoKey::TriggerTypes => InfoItem::TriggerTypes(TRIGGER_TYPES),
            InfoKey::CurSamplerate => InfoItem::CurSamplerate(inst.cur_samplerate),
        };
        Ok(item)
    }

    pub fn capabilities(&self) -> &'static [Capability] {
        HWCAPS
    }

    /// Applies a configuration item to a device.  A rejected value leaves
    /// the device state untouched.
    pub fn config_set(&mut self, index: usize, option: ConfigOption<'_>) -> Result<()> {
        trace!("Driver::config_set {} {:?}", index, option);
        let inst = self.device_mut(index)?;
        match option {
            ConfigOption::Samplerate(rate) => set_samplerate(inst, rate),
            ConfigOption::Probes(probes) => {
                let (probe_mask, matcher) = configure_probes(probes, inst.profile.num_probes)?;
                inst.probe_mask = probe_mask;
                inst.trigger = matcher;
                Ok(())
            }
            ConfigOption::LimitSamples(limit) => {
                inst.limit_samples = limit;
                Ok(())
            }
        }
    }

    /// Begins an acquisition on an open device.
    ///
    /// The header packet is sent to `sink` before this returns; sample data
    /// follows from [`Driver::acquisition_poll`] calls.
    pub fn acquisition_start(&mut self, index: usize, mut sink: Box<dyn Sink>) -> Result<()> {
        trace!("Driver::acquisition_start {}", index);
        let num_transfers = self.num_transfers;
        let max_empty_transfers = self.max_empty_transfers;
        let capture_ratio = self.capture_ratio;

        let inst = self.device_mut(index)?;
        if inst.status != DeviceStatus::Active {
            return Err(Error::InvalidState {
                message: format!("device {} is not open", index),
            });
        }
        if inst.engine.is_some() {
            return Err(Error::InvalidState {
                message: format!("device {} is already acquiring", index),
            });
        }

        sink.send(Packet::Header(Header {
            feed_version: FEED_VERSION,
            start_time: SystemTime::now(),
            samplerate: inst.cur_samplerate,
            num_probes: inst.profile.num_probes,
        }));

        let pretrigger_capacity =
            inst.limit_samples as usize * capture_ratio as usize / 100;
        inst.engine = Some(Engine::new(
            inst.trigger.clone(),
            inst.limit_samples,
            num_transfers,
            max_empty_transfers,
            pretrigger_capacity,
        ));
        inst.session = Some(sink);
        Ok(())
    }

    /// Services one transfer completion: reads the oldest in-flight transfer
    /// from the device, recycles its slot and feeds the data through the
    /// trigger matcher to the sink.  Call whenever the host event loop wants
    /// acquisition work done.
    ///
    /// # Returns
    /// * `Ok(true)` - the acquisition is still running
    /// * `Ok(false)` - the acquisition has ended (limit, watchdog or a
    ///   previous stop); the end packet has been emitted
    /// * `Err(Error)` - invariant violation
    pub fn acquisition_poll(&mut self, index: usize) -> Result<bool> {
        let inst = self
            .devices
            .get_mut(index)
            .ok_or(Error::NoSuchDevice { index })?;
        let DeviceInstance {
            usb,
            engine,
            session,
            ..
        } = inst;
        let Some(engine) = engine.as_mut() else {
            return Ok(false);
        };
        let sink = session.as_mut().ok_or_else(|| Error::Bug {
            message: "acquisition is missing its session sink".to_string(),
        })?;
        let handle = usb.handle.as_ref().ok_or_else(|| Error::Bug {
            message: "acquisition is missing its USB handle".to_string(),
        })?;

        let mut buffer = engine.next_transfer().ok_or_else(|| Error::Bug {
            message: "transfer pool is empty".to_string(),
        })?;

        let length = match handle.read_bulk(SAMPLE_ENDPOINT, &mut buffer, TRANSFER_TIMEOUT) {
            Ok(length) => length,
            // The device had nothing for us within the transfer deadline
            Err(rusb::Error::Timeout) => 0,
            Err(e) => {
                // Keep the acquisition going on the remaining pool
                warn!("bulk read failed, requeueing transfer: {}", e);
                engine.requeue(buffer);
                return Ok(true);
            }
        };

        match engine.on_complete(buffer, length, sink.as_mut()) {
            Action::Continue => Ok(true),
            Action::Stop => {
                self.acquisition_stop(index)?;
                Ok(false)
            }
        }
    }

    /// Ends a device's acquisition: cancels and drains the transfer pool,
    /// then emits the end packet.  Idempotent; nothing reaches the sink
    /// after this begins.
    pub fn acquisition_stop(&mut self, index: usize) -> Result<()> {
        trace!("Driver::acquisition_stop {}", index);
        let inst = self
            .devices
            .get_mut(index)
            .ok_or(Error::NoSuchDevice { index })?;
        let Some(mut engine) = inst.engine.take() else {
            return Ok(());
        };
        engine.shutdown();
        info!("acquisition stopped after {} samples", engine.num_samples());
        drop(engine);

        if let Some(mut sink) = inst.session.take() {
            sink.send(Packet::End);
        }
        Ok(())
    }

    fn device_ref(&self, index: usize) -> Result<&DeviceInstance> {
        self.devices.get(index).ok_or(Error::NoSuchDevice { index })
    }

    fn device_mut(&mut self, index: usize) -> Result<&mut DeviceInstance> {
        self.devices
            .get_mut(index)
            .ok_or(Error::NoSuchDevice { index })
    }

    /// Finds the registered device on the bus at its post-firmware IDs and
    /// opens it.
    ///
    /// An instance still initializing is matched by position among devices
    /// of its type (its address is not known yet); a fully enumerated one is
    /// matched by bus and address.
    fn locate_and_open(&mut self, index: usize) -> Result<()> {
        let (status, profile, want_bus, want_address) = {
            let inst = &self.devices[index];
            (inst.status, inst.profile, inst.usb.bus, inst.usb.address)
        };
        if status == DeviceStatus::Active {
            return Err(Error::InvalidState {
                message: format!("device {} is already in use", index),
            });
        }

        let devices = self.context.devices()?;
        let mut skip = 0;
        for device in devices.iter() {
            let descriptor = match device.device_descriptor() {
                Ok(descriptor) => descriptor,
                Err(e) => {
                    error!("failed to get device descriptor: {}", e);
                    continue;
                }
            };
            if descriptor.vendor_id() != profile.fw_vid
                || descriptor.product_id() != profile.fw_pid
            {
                continue;
            }

            if status == DeviceStatus::Initializing {
                // Skip devices of this type that aren't the one we want
                if skip != index {
                    skip += 1;
                    continue;
                }
            } else if device.bus_number() != want_bus || device.address() != want_address {
                // This is not the one
                continue;
            }

            // One way or another this is the device we were looking for
            let inst = &mut self.devices[index];
            match device.open() {
                Ok(handle) => {
                    if inst.usb.address == ADDRESS_UNKNOWN {
                        // First contact since the firmware upload, so the
                        // address wasn't known until now
                        inst.usb.address = device.address();
                    }
                    // The uploaded image decides the divider encoding
                    if let Some(generation) = detect_firmware(&device) {
                        inst.generation = generation;
                    }
                    inst.usb.handle = Some(handle);
                    inst.status = DeviceStatus::Active;
                    info!(
                        "opened device {} on {}.{}",
                        index, inst.usb.bus, inst.usb.address
                    );
                }
                Err(e) => error!("failed to open device: {}", e),
            }
            break;
        }

        if self.devices[index].status != DeviceStatus::Active {
            return Err(Error::NotFound {
                vid: profile.fw_vid,
                pid: profile.fw_pid,
            });
        }
        Ok(())
    }
}

impl std::fmt::Debug for Driver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Driver")
            .field("devices", &self.devices)
            .field("firmware", &self.firmware)
            .finish()
    }
}

/// Validates a samplerate, writes the divider command to the device and
/// records the new rate.  Rejected rates leave the device untouched.
fn set_samplerate(inst: &mut DeviceInstance, rate: u64) -> Result<()> {
    let divider = samplerate::divider(rate, inst.generation)?;

    let handle = inst.usb.handle.as_ref().ok_or_else(|| Error::InvalidState {
        message: "samplerate can only be set on an open device".to_string(),
    })?;

    info!("setting samplerate to {} Hz (divider {:#04x})", rate, divider);
    let cmd = match inst.generation {
        FirmwareGeneration::New => CMD_SET_DIVIDER_NEW,
        FirmwareGeneration::Legacy => CMD_SET_DIVIDER,
    };
    handle.write_bulk(COMMAND_ENDPOINT, &[cmd, divider], COMMAND_TIMEOUT)?;
    inst.cur_samplerate = rate;
    Ok(())
}

/// Builds the enabled-probe mask and the trigger stage tables from the
/// host's probe list.
fn configure_probes(probes: &[Probe], num_probes: u16) -> Result<(u16, TriggerMatcher)> {
    let mut probe_mask = 0u16;
    let mut mask = [0u8; NUM_TRIGGER_STAGES];
    let mut value = [0u8; NUM_TRIGGER_STAGES];

    for probe in probes {
        if !probe.enabled {
            continue;
        }
        if probe.index < 1 || probe.index > num_probes as usize {
            return Err(Error::Args {
                message: format!(
                    "probe index {} out of range 1..={}",
                    probe.index, num_probes
                ),
            });
        }
        probe_mask |= 1 << (probe.index - 1);

        let Some(trigger) = probe.trigger.as_deref() else {
            continue;
        };
        if trigger.is_empty() {
            continue;
        }
        if trigger.len() > NUM_TRIGGER_STAGES {
            return Err(Error::Args {
                message: format!(
                    "trigger pattern {:?} exceeds {} stages",
                    trigger, NUM_TRIGGER_STAGES
                ),
            });
        }
        if probe.index > 8 {
            // Samples are one byte wide, so only the low eight probes can
            // take part in a trigger
            return Err(Error::Args {
                message: format!("probe {} cannot carry a trigger", probe.index),
            });
        }

        let probe_bit = 1u8 << (probe.index - 1);
        for (stage, tc) in trigger.chars().enumerate() {
            match tc {
                '0' | '.' => mask[stage] |= probe_bit,
                '1' => {
                    mask[stage] |= probe_bit;
                    value[stage] |= probe_bit;
                }
                other => {
                    return Err(Error::Args {
                        message: format!("invalid trigger character {:?}", other),
                    });
                }
            }
        }
    }

    Ok((probe_mask, TriggerMatcher::new(mask, value)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn probe(index: usize, trigger: Option<&str>) -> Probe {
        Probe {
            index,
            enabled: true,
            trigger: trigger.map(str::to_string),
        }
    }

    #[test]
    fn test_probe_mask_without_triggers() {
        let probes: Vec<Probe> = (1..=8).map(|i| probe(i, None)).collect();
        let (probe_mask, matcher) = configure_probes(&probes, 8).unwrap();
        assert_eq!(probe_mask, 0xff);
        // No trigger configured: acquisition must not wait for one
        assert!(matcher.fired());
    }

    #[test]
    fn test_disabled_probes_are_skipped() {
        let mut probes = vec![probe(1, None), probe(2, Some("01"))];
        probes[1].enabled = false;
        let (probe_mask, matcher) = configure_probes(&probes, 8).unwrap();
        assert_eq!(probe_mask, 0x01);
        assert!(matcher.fired());
    }

    #[test]
    fn test_trigger_stage_tables() {
        let probes = [probe(1, Some("01")), probe(3, Some("1"))];
        let (probe_mask, matcher) = configure_probes(&probes, 8).unwrap();
        assert_eq!(probe_mask, 0b101);
        assert!(!matcher.fired());

        // Stage 0 wants probe 1 low and probe 3 high; stage 1 wants probe 1
        // high.  0xfc matches stage 0, 0x01 matches stage 1.
        let mut matcher = matcher;
        let scan = matcher.scan(&[0xfc, 0x01]);
        assert_eq!(scan, crate::trigger::Scan::Fired { offset: 2 });
    }

    #[test]
    fn test_trigger_too_deep_rejected() {
        let probes = [probe(1, Some("01010"))];
        assert!(matches!(
            configure_probes(&probes, 8),
            Err(Error::Args { .. })
        ));
    }

    #[test]
    fn test_probe_index_validated() {
        assert!(matches!(
            configure_probes(&[probe(0, None)], 8),
            Err(Error::Args { .. })
        ));
        assert!(matches!(
            configure_probes(&[probe(9, None)], 8),
            Err(Error::Args { .. })
        ));
        // A sixteen-probe profile accepts the higher indexes
        assert!(configure_probes(&[probe(9, None)], 16).is_ok());
    }

    #[test]
    fn test_trigger_limited_to_byte_wide_probes() {
        assert!(matches!(
            configure_probes(&[probe(9, Some("1"))], 16),
            Err(Error::Args { .. })
        ));
    }

    #[test]
    fn test_invalid_trigger_character_rejected() {
        assert!(matches!(
            configure_probes(&[probe(1, Some("0x1"))], 8),
            Err(Error::Args { .. })
        ));
    }

    #[test]
    fn test_dont_care_sets_mask_only() {
        let (_, matcher) = configure_probes(&[probe(1, Some(".1"))], 8).unwrap();
        let mut matcher = matcher;
        // '.' behaves like '0' on the triggering probe
        assert_eq!(
            matcher.scan(&[0x00, 0x01]),
            crate::trigger::Scan::Fired { offset: 2 }
        );
    }

    #[test]
    fn test_capabilities() {
        let caps = HWCAPS;
        assert!(caps.contains(&Capability::LogicAnalyzer));
        assert!(caps.contains(&Capability::LimitSamples));
        assert_eq!(caps.len(), 4);
    }

    #[test]
    fn test_config_on_unopened_device() {
        // Skip when no USB stack is available in the environment
        let Ok(mut driver) = DriverBuilder::new().build() else {
            return;
        };
        driver
            .devices
            .push(DeviceInstance::new(0, &crate::profile::SUPPORTED_FX2[0]));
        assert_eq!(driver.status(0), DeviceStatus::Initializing);

        // An unsupported rate is rejected before any device state changes
        assert!(matches!(
            driver.config_set(0, ConfigOption::Samplerate(3_000_000)),
            Err(Error::Samplerate { rate: 3_000_000 })
        ));
        assert_eq!(driver.device(0).unwrap().samplerate(), 0);

        // A supported rate still needs an open handle to be written
        assert!(matches!(
            driver.config_set(0, ConfigOption::Samplerate(1_000_000)),
            Err(Error::InvalidState { .. })
        ));
        assert_eq!(driver.device(0).unwrap().samplerate(), 0);

        // Probe and limit configuration work without a handle
        let probes = [probe(1, None), probe(2, None)];
        driver.config_set(0, ConfigOption::Probes(&probes)).unwrap();
        assert_eq!(driver.device(0).unwrap().probe_mask(), 0b11);
        driver.config_set(0, ConfigOption::LimitSamples(4096)).unwrap();
        assert_eq!(driver.device(0).unwrap().limit_samples(), 4096);

        assert_eq!(
            driver.info(0, InfoKey::CurSamplerate).unwrap(),
            InfoItem::CurSamplerate(0)
        );
        assert_eq!(
            driver.info(0, InfoKey::NumProbes).unwrap(),
            InfoItem::NumProbes(8)
        );

        driver.cleanup().unwrap();
        assert_eq!(driver.device_count(), 0);
        assert_eq!(driver.status(0), DeviceStatus::NotFound);
    }

    #[test]
    fn test_unregistered_index() {
        // Skip when no USB stack is available in the environment
        let Ok(mut driver) = DriverBuilder::new().build() else {
            return;
        };
        assert_eq!(driver.status(0), DeviceStatus::NotFound);
        assert!(driver.device(0).is_none());
        assert!(matches!(
            driver.info(0, InfoKey::NumProbes),
            Err(Error::NoSuchDevice { index: 0 })
        ));
        assert!(matches!(
            driver.config_set(0, ConfigOption::LimitSamples(1)),
            Err(Error::NoSuchDevice { .. })
        ));
        assert!(matches!(
            driver.acquisition_poll(0),
            Err(Error::NoSuchDevice { .. })
        ));
        assert!(driver.cleanup().is_ok());
    }
}
