use crate::constants::{
    DEFAULT_FIRMWARE, MAX_EMPTY_TRANSFERS, MAX_RENUM_DELAY, NUM_SIMUL_TRANSFERS,
    USB_CONFIGURATION, USB_INTERFACE,
};
use crate::firmware::{EzUsb, FirmwareUploader};
use crate::{Driver, Error, Result};

#[allow(unused_imports)]
use log::{debug, error, info, trace, warn};
use rusb::Context;
use std::path::PathBuf;
use std::time::Duration;

/// A builder pattern for creating [`Driver`] instances with custom
/// configuration.
///
/// All tunables are optional and fall back to the defaults in
/// [`crate::constants`].
///
/// # Examples
///
/// ## A simple example
///
/// ```no_run
/// use fx2logic::DriverBuilder;
///
/// let mut driver = DriverBuilder::new().build().unwrap();
/// let count = driver.init().unwrap();
/// println!("{count} device(s) found");
/// ```
///
/// ## A more complex example
///
/// ```no_run
/// use fx2logic::DriverBuilder;
/// use std::time::Duration;
///
/// let driver = DriverBuilder::new()
///     .firmware("/usr/share/sigrok-firmware/saleae-logic.fw")
///     .renum_delay(Duration::from_secs(5))
///     .capture_ratio(10)
///     .build()
///     .unwrap();
/// ```
pub struct DriverBuilder {
    context: Option<Context>,
    firmware: Option<PathBuf>,
    uploader: Option<Box<dyn FirmwareUploader>>,
    num_transfers: Option<usize>,
    max_empty_transfers: Option<usize>,
    renum_delay: Option<Duration>,
    usb_configuration: Option<u8>,
    usb_interface: Option<u8>,
    capture_ratio: Option<u8>,
}

impl Default for DriverBuilder {
    fn default() -> Self {
        DriverBuilder {
            context: None,
            firmware: None,
            uploader: None,
            num_transfers: None,
            max_empty_transfers: None,
            renum_delay: None,
            usb_configuration: None,
            usb_interface: None,
            capture_ratio: None,
        }
    }
}

impl DriverBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds and returns a new [`Driver`] instance using the configured
    /// parameters.
    ///
    /// # Returns
    /// * `Ok(Driver)` - the constructed driver if successful
    /// * `Err(Error)` - on invalid parameters, or if no USB context could be
    ///   created
    pub fn build(&mut self) -> Result<Driver> {
        let capture_ratio = self.capture_ratio.unwrap_or(0);
        if capture_ratio > 100 {
            return Err(Error::Args {
                message: format!("capture ratio {}% is over 100%", capture_ratio),
            });
        }
        let num_transfers = self.num_transfers.unwrap_or(NUM_SIMUL_TRANSFERS);
        if num_transfers == 0 {
            return Err(Error::Args {
                message: "transfer pool cannot be empty".to_string(),
            });
        }

        let context = match self.context.take() {
            Some(context) => context,
            None => Context::new()?,
        };

        Ok(Driver {
            context,
            devices: Vec::new(),
            firmware: self
                .firmware
                .take()
                .unwrap_or_else(|| PathBuf::from(DEFAULT_FIRMWARE)),
            uploader: self.uploader.take().unwrap_or_else(|| Box::new(EzUsb)),
            num_transfers,
            max_empty_transfers: self.max_empty_transfers.unwrap_or(MAX_EMPTY_TRANSFERS),
            renum_delay: self.renum_delay.unwrap_or(MAX_RENUM_DELAY),
            usb_configuration: self.usb_configuration.unwrap_or(USB_CONFIGURATION),
            usb_interface: self.usb_interface.unwrap_or(USB_INTERFACE),
            capture_ratio,
        })
    }

    /// Sets a custom USB context.
    ///
    /// This allows setting the USB debug log level via
    /// `context.set_log_level()` using [`rusb::LogLevel`].
    ///
    /// # Note:
    /// If not set, a new default [`rusb::Context`] is created when building
    pub fn context(&mut self, context: Context) -> &mut Self {
        self.context = Some(context);
        self
    }

    /// Sets the firmware image uploaded to bare FX2 devices.
    pub fn firmware(&mut self, path: impl Into<PathBuf>) -> &mut Self {
        self.firmware = Some(path.into());
        self
    }

    /// Replaces the firmware uploader, e.g. with a mock for tests.
    pub fn uploader(&mut self, uploader: Box<dyn FirmwareUploader>) -> &mut Self {
        self.uploader = Some(uploader);
        self
    }

    /// Sets the number of bulk transfers kept in flight per acquisition.
    ///
    /// # Note:
    /// More transfers lower the risk of dropped samples at high samplerates
    /// at the cost of memory
    pub fn num_transfers(&mut self, count: usize) -> &mut Self {
        self.num_transfers = Some(count);
        self
    }

    /// Sets how many consecutive empty transfers are tolerated before an
    /// acquisition is ended.
    pub fn max_empty_transfers(&mut self, count: usize) -> &mut Self {
        self.max_empty_transfers = Some(count);
        self
    }

    /// Sets the upper bound on waiting for a device to renumerate after a
    /// firmware upload.
    pub fn renum_delay(&mut self, delay: Duration) -> &mut Self {
        self.renum_delay = Some(delay);
        self
    }

    /// Sets the USB configuration selected before firmware upload.
    pub fn usb_configuration(&mut self, configuration: u8) -> &mut Self {
        self.usb_configuration = Some(configuration);
        self
    }

    /// Sets the USB interface claimed on open.
    pub fn usb_interface(&mut self, interface: u8) -> &mut Self {
        self.usb_interface = Some(interface);
        self
    }

    /// Sets the percentage of the sample limit retained as a pre-trigger
    /// window.  Zero (the default) drops all pre-trigger data, matching the
    /// hardware's original behaviour.
    pub fn capture_ratio(&mut self, percent: u8) -> &mut Self {
        self.capture_ratio = Some(percent);
        self
    }
}
