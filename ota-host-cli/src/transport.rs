// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Serial transport for the OTA channel. Implements [`ota_common::Transport`]
//! over a [`serialport::SerialPort`] so the same framing rules the
//! bootloader's UART transport applies on the device side also drive the
//! wire from the host.

use std::io::{Read, Write};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use ota_common::{OtaError, Transport as OtaTransport};
use serialport::SerialPort;

/// Baud rate of the dedicated OTA channel, fixed on both ends.
pub const OTA_BAUD: u32 = 115_200;

/// USB-to-UART serial transport for communicating with the bootloader.
pub struct SerialTransport {
    port: Box<dyn SerialPort>,
}

impl SerialTransport {
    /// Open the named serial port at the fixed OTA baud rate.
    pub fn open(port_name: &str) -> Result<Self> {
        let port = serialport::new(port_name, OTA_BAUD)
            .timeout(Duration::from_millis(50))
            .open()
            .with_context(|| format!("Failed to open serial port {}", port_name))?;
        Ok(Self { port })
    }

    pub fn port_name(&self) -> String {
        self.port.name().unwrap_or_else(|| "?".to_string())
    }
}

impl OtaTransport for SerialTransport {
    fn read_byte(&mut self, timeout_ms: u32) -> Option<u8> {
        let start = Instant::now();
        let mut byte = [0u8; 1];
        loop {
            match self.port.read(&mut byte) {
                Ok(1) => return Some(byte[0]),
                Ok(_) => {}
                Err(e) if e.kind() == std::io::ErrorKind::TimedOut => {}
                Err(_) => return None,
            }
            if start.elapsed() >= Duration::from_millis(timeout_ms as u64) {
                return None;
            }
        }
    }

    fn read_exact(&mut self, buf: &mut [u8], timeout_ms: u32) -> Result<(), OtaError> {
        let start = Instant::now();
        for slot in buf.iter_mut() {
            loop {
                let mut byte = [0u8; 1];
                match self.port.read(&mut byte) {
                    Ok(1) => {
                        *slot = byte[0];
                        break;
                    }
                    Ok(_) => {}
                    Err(e) if e.kind() == std::io::ErrorKind::TimedOut => {}
                    Err(_) => return Err(OtaError::Timeout),
                }
                if start.elapsed() >= Duration::from_millis(timeout_ms as u64) {
                    return Err(OtaError::Timeout);
                }
            }
        }
        Ok(())
    }

    fn write_all(&mut self, bytes: &[u8]) {
        let _ = self.port.write_all(bytes);
        let _ = self.port.flush();
    }
}
