use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("USB error while communicating with the device: {error}")]
    Usb { error: rusb::Error },

    #[error("USB permissions error while accessing the device.  Are you sure you have permissions to access it?  You may need to reconfigure udev rules in /etc/udev/rules.d/.")]
    Permission,

    #[error("No device registered at index {index}")]
    NoSuchDevice { index: usize },

    #[error("No device found matching {vid:04x}:{pid:04x} - did it renumerate?")]
    NotFound { vid: u16, pid: u16 },

    #[error("Unsupported samplerate {rate} Hz")]
    Samplerate { rate: u64 },

    #[error("Invalid argument: {message}")]
    Args { message: String },

    #[error("Device is in the wrong state: {message}")]
    InvalidState { message: String },

    #[error("Firmware upload failed: {message}")]
    Firmware { message: String },

    #[error("Internal driver error: {message}")]
    Bug { message: String },
}

impl From<rusb::Error> for Error {
    fn from(error: rusb::Error) -> Self {
        match error {
            rusb::Error::Access => Error::Permission,
            other => Error::Usb { error: other },
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
