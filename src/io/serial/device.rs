// src/io/serial/device.rs
//
// Non-blocking byte device trait and the serialport-backed implementation.
//
// The bridge loop and the line reader only need three operations: a cheap
// probe for pending bytes, a non-blocking single-byte read, and a blocking
// write. Keeping them behind a trait lets the tests script a device without
// touching real hardware.

use std::io::{Read, Write};
use std::time::Duration;

use crate::io::error::IoError;

/// Read timeout used to approximate non-blocking reads. A 1ms timeout keeps
/// the poll loop responsive without busy-spinning the port.
const READ_TIMEOUT: Duration = Duration::from_millis(1);

// ============================================================================
// Byte Device Trait
// ============================================================================

/// A non-blocking byte stream device (the serial link to the controller).
pub trait ByteDevice: Send {
    /// Number of bytes currently waiting to be read. Cheap probe.
    fn bytes_available(&mut self) -> Result<usize, IoError>;

    /// Read one byte if available. `Ok(None)` means no byte right now.
    fn read_byte(&mut self) -> Result<Option<u8>, IoError>;

    /// Write all bytes to the device.
    fn write_all(&mut self, bytes: &[u8]) -> Result<(), IoError>;

    /// Identifier used in error messages and logs.
    fn name(&self) -> &str;
}

// ============================================================================
// Serialport Implementation
// ============================================================================

/// `ByteDevice` backed by a real serial port.
pub struct SerialByteDevice {
    port: Box<dyn serialport::SerialPort>,
    name: String,
}

/// Open a serial port for the bridge.
///
/// The short read timeout means `read_byte` returns promptly when nothing
/// is pending, matching the non-blocking model the bridge loop expects.
pub fn open_port(path: &str, baud_rate: u32) -> Result<SerialByteDevice, IoError> {
    let port = serialport::new(path, baud_rate)
        .timeout(READ_TIMEOUT)
        .open()
        .map_err(|e| IoError::connection(path, e.to_string()))?;

    Ok(SerialByteDevice {
        port,
        name: path.to_string(),
    })
}

impl ByteDevice for SerialByteDevice {
    fn bytes_available(&mut self) -> Result<usize, IoError> {
        self.port
            .bytes_to_read()
            .map(|n| n as usize)
            .map_err(|e| IoError::read(&self.name, e.to_string()))
    }

    fn read_byte(&mut self) -> Result<Option<u8>, IoError> {
        let mut buf = [0u8; 1];
        match self.port.read(&mut buf) {
            Ok(1) => Ok(Some(buf[0])),
            // EOF - port closed/disconnected
            Ok(_) => Err(IoError::read(&self.name, "device disconnected")),
            Err(ref e) if e.kind() == std::io::ErrorKind::TimedOut => Ok(None),
            Err(e) => Err(IoError::read(&self.name, e.to_string())),
        }
    }

    fn write_all(&mut self, bytes: &[u8]) -> Result<(), IoError> {
        self.port
            .write_all(bytes)
            .and_then(|_| self.port.flush())
            .map_err(|e| IoError::write(&self.name, e.to_string()))
    }

    fn name(&self) -> &str {
        &self.name
    }
}

// ============================================================================
// Test Support
// ============================================================================

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    /// Scripted `ByteDevice` for tests. Each poll entry either delivers a
    /// byte (`Some`) or simulates a poll with nothing pending (`None`); an
    /// exhausted script stays silent forever.
    pub struct ScriptedDevice {
        polls: VecDeque<Option<u8>>,
        written: Arc<Mutex<Vec<u8>>>,
        pub fail_writes: bool,
    }

    impl ScriptedDevice {
        pub fn new(polls: Vec<Option<u8>>) -> Self {
            ScriptedDevice {
                polls: polls.into(),
                written: Arc::new(Mutex::new(Vec::new())),
                fail_writes: false,
            }
        }

        /// Device with no pending bytes
        pub fn quiet() -> Self {
            Self::new(Vec::new())
        }

        /// Device with these bytes immediately available
        pub fn emitting(bytes: &[u8]) -> Self {
            Self::new(bytes.iter().map(|&b| Some(b)).collect())
        }

        /// Bytes written to the device so far
        pub fn written(&self) -> Vec<u8> {
            self.written.lock().unwrap().clone()
        }

        /// Shared handle to the write sink, for tests that move the device
        pub fn written_handle(&self) -> Arc<Mutex<Vec<u8>>> {
            self.written.clone()
        }
    }

    impl ByteDevice for ScriptedDevice {
        fn bytes_available(&mut self) -> Result<usize, IoError> {
            Ok(self.polls.iter().flatten().count())
        }

        fn read_byte(&mut self) -> Result<Option<u8>, IoError> {
            Ok(self.polls.pop_front().flatten())
        }

        fn write_all(&mut self, bytes: &[u8]) -> Result<(), IoError> {
            if self.fail_writes {
                return Err(IoError::write("mock", "device disconnected"));
            }
            self.written.lock().unwrap().extend_from_slice(bytes);
            Ok(())
        }

        fn name(&self) -> &str {
            "mock"
        }
    }
}
