// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Update mode: hand the OTA UART to an [`OtaSession`] and keep feeding it
//! packets until a session completes, fails, or a configurable idle window
//! passes with no START, at which point the device resets and lets the
//! normal boot path try again.

use embedded_hal::digital::OutputPin;
use ota_common::config::{BOOT_RECORD_ADDR, FLASH_SECTOR_SIZE};
use ota_common::crc::SoftwareCrc32;
use ota_common::flash::rp2040::Rp2040Flash;
use ota_common::session::{OtaSession, SessionState};

use crate::peripherals::Peripherals;
use crate::uart_transport::UartTransport;

/// How long the header read blocks before `run_once` loops back to poll
/// again — also the granularity of the idle-wait check below.
const HEADER_TIMEOUT_MS: u32 = 2_000;
/// DATA body read timeout: generous relative to a 1 kB chunk at 115200 baud.
const DATA_TIMEOUT_MS: u32 = 5_000;
/// How long the machine waits in IDLE for a first START before giving up
/// and resetting back to the normal boot path.
const IDLE_WAIT_TIMEOUT_MS: u32 = 60_000;

/// Enter update mode: bring up the OTA UART and run the session loop.
pub fn enter_update_mode(p: &mut Peripherals) -> ! {
    defmt::println!("Update mode requested");

    let ota_uart = p.ota_uart.take().expect("OTA UART already taken");
    let mut transport = UartTransport::new(ota_uart, p.timer);

    p.led_pin.set_high().ok();

    let flash = Rp2040Flash::new();
    let crc = SoftwareCrc32::new();
    let mut session = OtaSession::new(flash, crc, BOOT_RECORD_ADDR, FLASH_SECTOR_SIZE);

    let mut idle_elapsed_ms: u32 = 0;
    loop {
        let state_before = session.state();
        let state_after = session.run_once(&mut transport, HEADER_TIMEOUT_MS, DATA_TIMEOUT_MS);

        match state_after {
            SessionState::Complete => {
                defmt::println!("Update complete, rebooting");
                reboot();
            }
            SessionState::Error => {
                let code = session.context().error_code.map(|e| e.to_wire()).unwrap_or(0);
                defmt::println!("Session failed, error code {=u8}", code);
                // Stay in ERROR until external reset, per the state machine's
                // terminal-until-reset contract; keep draining the UART so a
                // confused sender's retries don't wedge the link.
            }
            SessionState::Idle if state_before == SessionState::Idle => {
                idle_elapsed_ms += HEADER_TIMEOUT_MS;
                if idle_elapsed_ms >= IDLE_WAIT_TIMEOUT_MS {
                    defmt::println!("No START received, resetting");
                    reboot();
                }
                continue;
            }
            _ => {}
        }
        idle_elapsed_ms = 0;
    }
}

fn reboot() -> ! {
    cortex_m::asm::delay(12_000_000);
    cortex_m::peripheral::SCB::sys_reset();
}
