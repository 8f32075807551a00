// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! The closed set of OTA error codes, shared by the wire protocol (NACK
//! bodies) and by every fallible operation in this crate.

use core::fmt;

/// Error codes carried on the wire in a NACK packet's `error_code` field.
///
/// The discriminants are load-bearing: they are the exact byte values
/// transmitted in `ota_response_packet_t::error_code` on the wire, so this
/// enum must never be reordered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum OtaError {
    /// No error. Only appears in an ACK's error_code slot.
    None = 0,
    /// A CRC check failed: a chunk's CRC, or the whole-image CRC at END.
    Crc = 1,
    /// A size field was invalid (firmware_size, chunk_size, or bytes_written mismatch).
    Size = 2,
    /// A flash erase or program operation failed.
    Flash = 3,
    /// A packet arrived out of the expected sequence for the current state.
    Sequence = 4,
    /// A transport read timed out waiting for a packet body.
    Timeout = 5,
}

impl OtaError {
    /// Decode a wire byte into an `OtaError`. Unknown values map to `Sequence`
    /// since an error code that doesn't parse is itself a protocol violation.
    pub fn from_wire(byte: u8) -> Self {
        match byte {
            0 => OtaError::None,
            1 => OtaError::Crc,
            2 => OtaError::Size,
            3 => OtaError::Flash,
            5 => OtaError::Timeout,
            _ => OtaError::Sequence,
        }
    }

    pub fn to_wire(self) -> u8 {
        self as u8
    }
}

impl fmt::Display for OtaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            OtaError::None => "no error",
            OtaError::Crc => "CRC mismatch",
            OtaError::Size => "invalid size",
            OtaError::Flash => "flash operation failed",
            OtaError::Sequence => "packet out of sequence",
            OtaError::Timeout => "timed out waiting for data",
        };
        f.write_str(msg)
    }
}

impl core::error::Error for OtaError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_roundtrip_for_known_codes() {
        for code in [
            OtaError::None,
            OtaError::Crc,
            OtaError::Size,
            OtaError::Flash,
            OtaError::Sequence,
            OtaError::Timeout,
        ] {
            assert_eq!(OtaError::from_wire(code.to_wire()), code);
        }
    }

    #[test]
    fn unknown_wire_byte_maps_to_sequence() {
        assert_eq!(OtaError::from_wire(0xAA), OtaError::Sequence);
    }
}
