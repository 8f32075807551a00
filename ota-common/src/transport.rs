// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Byte-stream transport abstraction for the OTA UART. The session state
//! machine reads headers and bodies through this trait so it never touches
//! a UART peripheral directly, the same separation the teacher draws
//! between its board-specific transport and its hardware-free boot FSM.

use crate::error::OtaError;

/// A duration in milliseconds. Kept as a plain integer rather than a
/// `core::time::Duration` so `no_std` implementations don't need to carry
/// a timekeeping dependency just to satisfy the trait signature.
pub type TimeoutMs = u32;

/// A byte-oriented, blocking-with-timeout transport.
///
/// # Contract
/// `read_exact` either fills `buf` completely before `timeout_ms` elapses,
/// or returns `Err(OtaError::Timeout)` having consumed an unspecified
/// number of bytes — callers that need to resynchronize framing after a
/// timeout must not assume the stream position is recoverable.
pub trait Transport {
    /// Read a single byte, waiting up to `timeout_ms`. Returns `None` on
    /// timeout. Used to poll for the next packet's first header byte
    /// without committing to a longer read.
    fn read_byte(&mut self, timeout_ms: TimeoutMs) -> Option<u8>;

    /// Read exactly `buf.len()` bytes, waiting up to `timeout_ms` for the
    /// whole operation.
    fn read_exact(&mut self, buf: &mut [u8], timeout_ms: TimeoutMs) -> Result<(), OtaError>;

    /// Write the full contents of `bytes`, blocking until accepted by the
    /// underlying link.
    fn write_all(&mut self, bytes: &[u8]);
}

#[cfg(feature = "std")]
pub mod testing {
    use super::*;
    use std::collections::VecDeque;
    use std::vec::Vec;

    /// An in-memory [`Transport`] double: reads drain a preloaded queue,
    /// writes accumulate into a buffer the test can inspect.
    #[derive(Default)]
    pub struct LoopbackTransport {
        inbound: VecDeque<u8>,
        pub outbound: Vec<u8>,
    }

    impl LoopbackTransport {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn feed(&mut self, bytes: &[u8]) {
            self.inbound.extend(bytes);
        }

        pub fn take_outbound(&mut self) -> Vec<u8> {
            core::mem::take(&mut self.outbound)
        }
    }

    impl Transport for LoopbackTransport {
        fn read_byte(&mut self, _timeout_ms: TimeoutMs) -> Option<u8> {
            self.inbound.pop_front()
        }

        fn read_exact(&mut self, buf: &mut [u8], _timeout_ms: TimeoutMs) -> Result<(), OtaError> {
            if self.inbound.len() < buf.len() {
                return Err(OtaError::Timeout);
            }
            for slot in buf.iter_mut() {
                *slot = self.inbound.pop_front().unwrap();
            }
            Ok(())
        }

        fn write_all(&mut self, bytes: &[u8]) {
            self.outbound.extend_from_slice(bytes);
        }
    }

}
