// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! The dedicated OTA UART as an [`ota_common::transport::Transport`].
//! Responses go out on this same UART — never on the debug channel, the
//! wrong-UART bug the engine is built to not repeat.

use embedded_hal_nb::serial::{Read, Write};
use ota_common::error::OtaError;
use ota_common::transport::{TimeoutMs, Transport};
use rp2040_hal as hal;

use crate::peripherals::OtaUart;

pub struct UartTransport {
    uart: OtaUart,
    timer: hal::Timer,
}

impl UartTransport {
    pub fn new(uart: OtaUart, timer: hal::Timer) -> Self {
        Self { uart, timer }
    }

    fn elapsed_ms(&self, start_us: u64) -> u64 {
        (self.timer.get_counter().ticks() - start_us) / 1000
    }
}

impl Transport for UartTransport {
    fn read_byte(&mut self, timeout_ms: TimeoutMs) -> Option<u8> {
        let start = self.timer.get_counter().ticks();
        loop {
            match self.uart.read() {
                Ok(byte) => return Some(byte),
                Err(nb::Error::WouldBlock) => {
                    if self.elapsed_ms(start) >= timeout_ms as u64 {
                        return None;
                    }
                }
                Err(nb::Error::Other(_)) => return None,
            }
        }
    }

    fn read_exact(&mut self, buf: &mut [u8], timeout_ms: TimeoutMs) -> Result<(), OtaError> {
        let start = self.timer.get_counter().ticks();
        for slot in buf.iter_mut() {
            loop {
                match self.uart.read() {
                    Ok(byte) => {
                        *slot = byte;
                        break;
                    }
                    Err(nb::Error::WouldBlock) => {
                        if self.elapsed_ms(start) >= timeout_ms as u64 {
                            return Err(OtaError::Timeout);
                        }
                    }
                    Err(nb::Error::Other(_)) => return Err(OtaError::Timeout),
                }
            }
        }
        Ok(())
    }

    fn write_all(&mut self, bytes: &[u8]) {
        for &byte in bytes {
            nb::block!(self.uart.write(byte)).ok();
        }
        nb::block!(self.uart.flush()).ok();
    }
}
