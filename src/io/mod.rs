// src/io/mod.rs
//
// IO layer: error taxonomy, the binary frame codec, and the serial device.

pub mod codec;
mod error;
pub mod serial;

pub use error::IoError;
