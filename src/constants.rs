//! Constants used throughout the FX2 driver
use rusb::constants::{LIBUSB_ENDPOINT_IN, LIBUSB_ENDPOINT_OUT};
use std::time::Duration;

/// Trigger matching

/// Maximum depth of a trigger pattern.  Stages are matched sequentially on
/// consecutive samples; a longer pattern is rejected at configuration time.
pub const NUM_TRIGGER_STAGES: usize = 4;

/// Transfer pool sizing

/// Number of bulk transfers kept in flight during an acquisition.  More
/// transfers lower the risk of dropped samples at high samplerates at the
/// cost of memory.
pub const NUM_SIMUL_TRANSFERS: usize = 10;
/// Consecutive zero-length completions tolerated before the engine assumes
/// the device has given up and ends the acquisition
pub const MAX_EMPTY_TRANSFERS: usize = NUM_SIMUL_TRANSFERS * 2;
/// Size of the first transfer buffer submitted at acquisition start
pub const FIRST_TRANSFER_SIZE: usize = 2048;
/// Size of every subsequent transfer buffer
pub const TRANSFER_SIZE: usize = 4096;

/// Timeouts

/// Upper bound on waiting for the FX2 to renumerate after a firmware upload
pub const MAX_RENUM_DELAY: Duration = Duration::from_millis(3000);
/// The FX2 takes at least this long to drop off the bus after an upload
pub const RENUM_SETTLE_DELAY: Duration = Duration::from_millis(300);
/// Poll interval while waiting for the renumerated device to reappear
pub const RENUM_POLL_INTERVAL: Duration = Duration::from_millis(100);
/// Deadline for the two-byte samplerate command write
pub const COMMAND_TIMEOUT: Duration = Duration::from_millis(500);
/// Per-transfer deadline on the sample stream.  A timeout is treated as a
/// zero-length completion, which feeds the empty-transfer watchdog.
pub const TRANSFER_TIMEOUT: Duration = Duration::from_millis(40);

/// USB topology

/// USB configuration selected before firmware upload
pub const USB_CONFIGURATION: u8 = 1;
/// USB interface claimed on the device
pub const USB_INTERFACE: u8 = 0;
/// Bulk OUT endpoint carrying the samplerate command
pub const COMMAND_ENDPOINT: u8 = 1 | LIBUSB_ENDPOINT_OUT;
/// Bulk IN endpoint carrying the sample stream, one byte per sample
pub const SAMPLE_ENDPOINT: u8 = 2 | LIBUSB_ENDPOINT_IN;

/// Device protocol commands

/// Samplerate-divider command byte understood by the original firmware
pub const CMD_SET_DIVIDER: u8 = 0x01;
/// Samplerate-divider command byte understood by the new firmware
pub const CMD_SET_DIVIDER_NEW: u8 = 0xd5;

/// Firmware image handed to the uploader when none is configured
pub const DEFAULT_FIRMWARE: &str = "saleae-logic.fw";
