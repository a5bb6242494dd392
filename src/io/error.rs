// src/io/error.rs
//
// Error types for the io layer: transport, wire-protocol, storage, and
// configuration failures. Constructors carry the device/port name so the
// status surface can say which link failed.

use std::fmt;

/// Unified io error for transport, codec, and storage boundaries.
#[derive(Clone, Debug, PartialEq)]
pub enum IoError {
    /// Transport-level failure: port unavailable, device disconnected.
    Connection { device: String, message: String },
    /// Malformed data on the wire, or an encode input that would corrupt it.
    Protocol { device: String, message: String },
    /// Persistence failure from the storage layer.
    Storage { message: String },
    /// Invalid configuration value.
    Configuration { message: String },
}

impl IoError {
    pub fn connection(device: impl Into<String>, message: impl Into<String>) -> Self {
        IoError::Connection {
            device: device.into(),
            message: message.into(),
        }
    }

    pub fn protocol(device: impl Into<String>, message: impl Into<String>) -> Self {
        IoError::Protocol {
            device: device.into(),
            message: message.into(),
        }
    }

    pub fn storage(message: impl Into<String>) -> Self {
        IoError::Storage {
            message: message.into(),
        }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        IoError::Configuration {
            message: message.into(),
        }
    }
}

impl fmt::Display for IoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IoError::Connection { device, message } => {
                write!(f, "Connection error ({}): {}", device, message)
            }
            IoError::Protocol { device, message } => {
                write!(f, "Protocol error ({}): {}", device, message)
            }
            IoError::Storage { message } => write!(f, "Storage error: {}", message),
            IoError::Configuration { message } => {
                write!(f, "Configuration error: {}", message)
            }
        }
    }
}

impl std::error::Error for IoError {}
