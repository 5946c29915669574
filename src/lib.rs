//! Acquisition driver for the Saleae Logic and compatible Cypress FX2-based
//! logic analyzers: device discovery, firmware upload, samplerate and
//! trigger configuration, and streaming capture into a session [`Sink`].

mod acquisition;
pub mod constants;
pub mod device;
pub mod driver;
pub mod error;
pub mod firmware;
pub mod profile;
pub mod samplerate;
pub mod session;
mod trigger;

pub use crate::device::{DeviceInstance, DeviceStatus, FirmwareGeneration};
pub use crate::driver::{
    Capability, ConfigOption, Driver, DriverBuilder, InfoItem, InfoKey, Probe,
};
pub use crate::error::{Error, Result};
pub use crate::firmware::{EzUsb, FirmwareUploader};
pub use crate::profile::Profile;
pub use crate::session::{Header, Logic, Packet, Sink};
