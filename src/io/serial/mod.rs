// src/io/serial/mod.rs
//
// Serial device abstraction and line-oriented reading.
//
// The Arduino side of the link is byte-oriented and non-blocking:
// outbound traffic is binary frames (io::codec), inbound traffic is
// plain ASCII diagnostic lines terminated by '\n'.

pub mod device;
pub mod line_reader;

// Re-export device types used by other modules
pub use device::{open_port, ByteDevice, SerialByteDevice};

// Re-export line reader entry points
pub use line_reader::{read_line, LINE_IDLE_TIMEOUT};
