// src/bridge.rs
//
// Per-connection bridge loop.
//
// Translates browser JSON command messages into binary frames on the serial
// device and forwards device diagnostic lines back to the browser. One bridge
// owns the device for the lifetime of one peer connection; outbound frames
// are rate-limited by real elapsed time while inbound data is drained on
// every loop iteration so a burst of commands can never starve it.

use std::time::Duration;

use serde::Deserialize;
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;

use crate::io::codec::{encode_frame, payload_from_values, SERVO_START_FLAG};
use crate::io::IoError;
use crate::io::serial::{read_line, ByteDevice, LINE_IDLE_TIMEOUT};

// ============================================================================
// Types and Configuration
// ============================================================================

/// Bridge loop configuration
#[derive(Clone, Debug)]
pub struct BridgeConfig {
    /// Upper bound on outbound frame rate. The browser emits one message per
    /// rendered frame (roughly the monitor refresh rate); messages arriving
    /// faster than this are skipped, not queued.
    pub messages_per_second: u32,
    /// Abandon an in-progress device line after this long without a byte
    pub idle_timeout: Duration,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        BridgeConfig {
            messages_per_second: 50,
            idle_timeout: LINE_IDLE_TIMEOUT,
        }
    }
}

impl BridgeConfig {
    /// Minimum interval between two outbound frames. A zero rate is
    /// clamped to one message per second rather than dividing by zero.
    pub fn min_frame_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.messages_per_second.max(1) as f64)
    }
}

/// Decoded peer command message. Extra top-level fields (e.g. a future
/// "motors" mapping) are ignored.
#[derive(Deserialize)]
struct CommandMessage {
    /// Servo channel id -> PWM value, in document order
    servos: serde_json::Map<String, serde_json::Value>,
}

/// Why the bridge loop ended
#[derive(Debug, PartialEq)]
pub enum BridgeEnd {
    /// Peer channel closed (normal)
    PeerClosed,
    /// Shutdown signal received (normal)
    Shutdown,
}

// ============================================================================
// Command Decoding
// ============================================================================

/// Extract the servo payload from a peer message.
///
/// `Ok(None)` is the tolerated no-op: bad JSON, missing `servos`, a value
/// that is not an integer, or an empty mapping. `Err` is the recoverable
/// encoder precondition failure (value outside 0-255) which drops this one
/// frame without ending the connection.
fn servo_payload(message: &str) -> Result<Option<Vec<u8>>, IoError> {
    let command: CommandMessage = match serde_json::from_str(message) {
        Ok(c) => c,
        Err(_) => return Ok(None),
    };

    let mut values = Vec::with_capacity(command.servos.len());
    for value in command.servos.values() {
        match value.as_i64() {
            Some(v) => values.push(v),
            None => return Ok(None),
        }
    }

    if values.is_empty() {
        return Ok(None);
    }

    payload_from_values(&values).map(Some)
}

// ============================================================================
// Bridge Loop
// ============================================================================

/// Run the bridge for one peer connection.
///
/// Suspends only while awaiting the next peer message or the shutdown
/// signal. Returns `Ok` on normal termination (peer gone or shutdown) and
/// `Err` on a device-level fault, which the caller must treat as fatal -
/// the byte stream has no mid-stream resynchronization mechanism.
pub async fn run_bridge<D: ByteDevice>(
    device: &mut D,
    mut inbound: mpsc::Receiver<String>,
    outbound: mpsc::Sender<String>,
    config: &BridgeConfig,
    mut shutdown: watch::Receiver<bool>,
) -> Result<BridgeEnd, IoError> {
    let min_interval = config.min_frame_interval();
    // Timestamp of the last frame actually sent. None until the first send,
    // so the first command is never rate-skipped. Skipped and malformed
    // messages do not advance it.
    let mut last_sent: Option<Instant> = None;

    loop {
        let message = tokio::select! {
            msg = inbound.recv() => match msg {
                Some(msg) => msg,
                None => return Ok(BridgeEnd::PeerClosed),
            },
            changed = shutdown.changed() => {
                // A dropped sender means the owner is gone; stop either way.
                if changed.is_err() || *shutdown.borrow() {
                    return Ok(BridgeEnd::Shutdown);
                }
                continue;
            }
        };

        let within_window = last_sent
            .map(|at| at.elapsed() < min_interval)
            .unwrap_or(false);

        if !within_window {
            // Encoder failures (out-of-range value, oversized payload) are
            // frame-local and recoverable; only device faults end the
            // connection.
            let frame = servo_payload(&message).and_then(|payload| match payload {
                Some(payload) => encode_frame(SERVO_START_FLAG, &payload).map(Some),
                None => Ok(None),
            });
            match frame {
                Ok(Some(frame)) => {
                    device.write_all(&frame)?;
                    last_sent = Some(Instant::now());
                }
                Ok(None) => {
                    // Tolerated no-op: nothing to send for this message.
                }
                Err(e) if !e.is_fatal() => {
                    tlog!("[bridge] Dropping frame: {}", e);
                }
                Err(e) => return Err(e),
            }
        }

        // Drain pass runs on every iteration, sent or skipped, so inbound
        // diagnostics are never queued behind a burst of outbound traffic.
        if let Some(line) = read_line(device, config.idle_timeout).await? {
            if outbound.send(line).await.is_err() {
                return Ok(BridgeEnd::PeerClosed);
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
