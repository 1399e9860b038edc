// src/io/serial/line_reader.rs
//
// Timeout-delimited ASCII line reader for the non-blocking serial device.
//
// The controller emits diagnostic lines terminated by '\n' with no framing,
// length, or checksum. One invocation produces at most one line; a partial
// line abandoned by the idle timeout is dropped, not carried over.

use std::time::Duration;

use tokio::time::Instant;

use crate::io::error::IoError;
use crate::io::serial::device::ByteDevice;

/// Stop reading after this long without a new byte. A partial line older
/// than this is assumed to be noise or a stalled device and is discarded.
pub const LINE_IDLE_TIMEOUT: Duration = Duration::from_secs(1);

/// Gap between polls while waiting for the next byte of an in-progress line.
const POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Read at most one line from the device.
///
/// Returns immediately with `Ok(None)` when no bytes are pending - invoking
/// the reader on a quiet device is a no-op, which is what lets the bridge
/// loop call it on every iteration.
///
/// Once triggered, reads one byte at a time. Each received byte resets the
/// idle clock; '\n' completes the line (terminator stripped). If the gap
/// since the last byte exceeds `idle_timeout` the partial line is dropped
/// silently. An empty line is valid and returned as an empty string.
///
/// A non-ASCII byte is a decode error. The stream has no resync marker, so
/// the caller must treat it as fatal to the connection.
pub async fn read_line<D: ByteDevice>(
    device: &mut D,
    idle_timeout: Duration,
) -> Result<Option<String>, IoError> {
    if device.bytes_available()? == 0 {
        return Ok(None);
    }

    let mut line = String::new();
    let mut last_byte_at = Instant::now();

    loop {
        match device.read_byte()? {
            Some(b'\n') => return Ok(Some(line)),
            Some(byte) if byte.is_ascii() => {
                last_byte_at = Instant::now();
                line.push(byte as char);
            }
            Some(byte) => {
                return Err(IoError::decode(
                    device.name(),
                    format!("non-ASCII byte 0x{:02X} in line", byte),
                ));
            }
            None => {
                if last_byte_at.elapsed() > idle_timeout {
                    // Device went quiet mid-line; drop the partial line.
                    return Ok(None);
                }
                tokio::time::sleep(POLL_INTERVAL).await;
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
