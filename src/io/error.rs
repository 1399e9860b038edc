// src/io/error.rs
//
// Typed IO errors for the serial device and the bridge.
// Constructor helpers keep call sites short; Display produces the
// user-facing message logged before a connection is torn down.

use std::fmt;

/// Error type for device and protocol failures.
#[derive(Debug, Clone, PartialEq)]
pub enum IoError {
    /// Failed to open or connect to a device
    Connection { device: String, message: String },
    /// Invalid configuration (bad rate, bad address, ...)
    Configuration(String),
    /// Protocol-level failure (frame cannot be encoded)
    Protocol { device: String, message: String },
    /// Read failure on an open device
    Read { device: String, message: String },
    /// Write failure on an open device
    Write { device: String, message: String },
    /// Received bytes could not be decoded as ASCII text
    Decode { device: String, message: String },
}

impl IoError {
    pub fn connection(device: &str, message: impl Into<String>) -> Self {
        IoError::Connection {
            device: device.to_string(),
            message: message.into(),
        }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        IoError::Configuration(message.into())
    }

    pub fn protocol(device: &str, message: impl Into<String>) -> Self {
        IoError::Protocol {
            device: device.to_string(),
            message: message.into(),
        }
    }

    pub fn read(device: &str, message: impl Into<String>) -> Self {
        IoError::Read {
            device: device.to_string(),
            message: message.into(),
        }
    }

    pub fn write(device: &str, message: impl Into<String>) -> Self {
        IoError::Write {
            device: device.to_string(),
            message: message.into(),
        }
    }

    pub fn decode(device: &str, message: impl Into<String>) -> Self {
        IoError::Decode {
            device: device.to_string(),
            message: message.into(),
        }
    }

    /// Whether this error should terminate the connection.
    /// Protocol errors drop a single frame; everything touching the
    /// device itself is fatal since the byte stream has no resync marker.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, IoError::Protocol { .. } | IoError::Configuration(_))
    }
}

impl fmt::Display for IoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IoError::Connection { device, message } => {
                write!(f, "Failed to connect to {}: {}", device, message)
            }
            IoError::Configuration(message) => write!(f, "Configuration error: {}", message),
            IoError::Protocol { device, message } => {
                write!(f, "Protocol error on {}: {}", device, message)
            }
            IoError::Read { device, message } => {
                write!(f, "Read error on {}: {}", device, message)
            }
            IoError::Write { device, message } => {
                write!(f, "Write error on {}: {}", device, message)
            }
            IoError::Decode { device, message } => {
                write!(f, "Decode error on {}: {}", device, message)
            }
        }
    }
}

impl std::error::Error for IoError {}

impl From<IoError> for String {
    fn from(err: IoError) -> Self {
        err.to_string()
    }
}
