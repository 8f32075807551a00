// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Firmware upload tool for ota-bootloader over a dedicated OTA UART.
//!
//! Usage:
//!   ota-upload --port /dev/ttyACM0 status
//!   ota-upload --port /dev/ttyACM0 upload firmware.bin --bank 0 --version 1
//!   ota-upload --port /dev/ttyACM0 abort

mod cli;
mod commands;
mod transport;

use anyhow::Result;
use clap::Parser;

fn main() -> Result<()> {
    let args = cli::Cli::parse();
    cli::run(args)
}
