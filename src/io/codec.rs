// src/io/codec.rs
//
// Binary frame codec for the Arduino servo controller.
//
// Transmit frame format:
//   [StartFlag-1byte][Length-1byte][Payload...][Checksum-1byte]
//
// The checksum is the sum of the payload bytes modulo 256 and is
// validated by the receiving firmware, so the wrap-around arithmetic
// here must match it exactly.

use crate::io::error::IoError;

// ============================================================================
// Protocol Constants
// ============================================================================

/// Start flag for the servo channel
pub const SERVO_START_FLAG: u8 = 0x02;

/// Start flag for the motor channel. Reserved by the firmware protocol;
/// the UI does not emit motor commands yet.
#[allow(dead_code)]
pub const MOTOR_START_FLAG: u8 = 0x04;

/// Largest payload that fits the single length byte
pub const MAX_PAYLOAD_LEN: usize = 255;

// ============================================================================
// Encoding
// ============================================================================

/// Sum of the payload bytes modulo 256.
pub fn payload_checksum(payload: &[u8]) -> u8 {
    payload.iter().fold(0u8, |acc, &b| acc.wrapping_add(b))
}

/// Encode a frame for transmission.
///
/// Returns `len(payload) + 3` bytes: start flag, payload length, payload,
/// checksum. Fails if the payload length does not fit the length byte.
/// Writing the bytes to the device is the caller's responsibility.
pub fn encode_frame(start_flag: u8, payload: &[u8]) -> Result<Vec<u8>, IoError> {
    if payload.len() > MAX_PAYLOAD_LEN {
        return Err(IoError::protocol(
            "serial",
            format!(
                "payload too long: {} bytes (max {})",
                payload.len(),
                MAX_PAYLOAD_LEN
            ),
        ));
    }

    let mut buf = Vec::with_capacity(payload.len() + 3);
    buf.push(start_flag);
    buf.push(payload.len() as u8);
    buf.extend_from_slice(payload);
    buf.push(payload_checksum(payload));

    Ok(buf)
}

/// Convert decoded JSON integers to payload bytes.
///
/// Rejects any value outside the inclusive range 0-255. Used by the bridge
/// when translating a command message's servo values into a frame payload.
pub fn payload_from_values(values: &[i64]) -> Result<Vec<u8>, IoError> {
    let mut payload = Vec::with_capacity(values.len());
    for &value in values {
        if !(0..=255).contains(&value) {
            return Err(IoError::protocol(
                "serial",
                format!("payload value {} is not in the range 0-255", value),
            ));
        }
        payload.push(value as u8);
    }
    Ok(payload)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_frame_layout() {
        let encoded = encode_frame(SERVO_START_FLAG, &[10, 20, 30]).unwrap();

        assert_eq!(encoded.len(), 6);
        assert_eq!(encoded[0], 0x02); // Start flag
        assert_eq!(encoded[1], 3); // Payload length
        assert_eq!(&encoded[2..5], &[10, 20, 30]);
        assert_eq!(encoded[5], 60); // Checksum
    }

    #[test]
    fn test_encode_empty_payload() {
        let encoded = encode_frame(SERVO_START_FLAG, &[]).unwrap();
        assert_eq!(encoded, vec![0x02, 0x00, 0x00]);
    }

    #[test]
    fn test_encode_single_max_value() {
        // {"servos":{"0":255}} end-to-end expectation
        let encoded = encode_frame(SERVO_START_FLAG, &[0xFF]).unwrap();
        assert_eq!(encoded, vec![0x02, 0x01, 0xFF, 0xFF]);
    }

    #[test]
    fn test_checksum_wraps_modulo_256() {
        assert_eq!(payload_checksum(&[0x80, 0x81]), 0x01);
        assert_eq!(payload_checksum(&[0xFF, 0x01]), 0x00);
        assert_eq!(payload_checksum(&[0xFF; 255]), 0x01); // 255 * 255 = 65025 = 254*256 + 1
    }

    #[test]
    fn test_encode_max_payload() {
        let payload = [0xABu8; 255];
        let encoded = encode_frame(SERVO_START_FLAG, &payload).unwrap();
        assert_eq!(encoded.len(), 258);
        assert_eq!(encoded[1], 255);
        assert_eq!(*encoded.last().unwrap(), payload_checksum(&payload));
    }

    #[test]
    fn test_encode_oversized_payload_rejected() {
        let payload = vec![0u8; 256];
        assert!(encode_frame(SERVO_START_FLAG, &payload).is_err());
    }

    #[test]
    fn test_motor_flag_distinct() {
        let encoded = encode_frame(MOTOR_START_FLAG, &[1]).unwrap();
        assert_eq!(encoded[0], 0x04);
    }

    #[test]
    fn test_payload_from_values() {
        assert_eq!(payload_from_values(&[0, 128, 255]).unwrap(), vec![0, 128, 255]);
        assert!(payload_from_values(&[256]).is_err());
        assert!(payload_from_values(&[-1]).is_err());
        assert!(payload_from_values(&[]).unwrap().is_empty());
    }
}
