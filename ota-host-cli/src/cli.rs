// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Command-line interface definitions.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

use crate::commands;
use crate::transport::SerialTransport;

/// Command-line arguments.
#[derive(Parser)]
#[command(name = "ota-upload")]
#[command(about = "Firmware upload tool for ota-bootloader")]
pub struct Cli {
    /// Serial port (e.g., /dev/ttyACM0)
    #[arg(short, long)]
    pub port: String,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands.
#[derive(Subcommand)]
pub enum Commands {
    /// Check that the OTA port can be opened
    Status,

    /// Upload firmware to a bank
    Upload {
        /// Firmware binary file
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Target bank (0 = A, 1 = B)
        #[arg(short, long, default_value = "0")]
        bank: u8,

        /// Firmware version number
        #[arg(short, long, default_value = "1")]
        version: u32,
    },

    /// Abort an in-progress update session
    Abort,
}

/// Execute the parsed CLI command.
pub fn run(cli: Cli) -> Result<()> {
    if matches!(cli.command, Commands::Status) {
        return commands::status(&cli.port);
    }

    let mut transport = SerialTransport::open(&cli.port)?;
    match cli.command {
        Commands::Status => unreachable!(),
        Commands::Upload {
            file,
            bank,
            version,
        } => commands::upload(&mut transport, &file, bank, version),
        Commands::Abort => commands::abort(&mut transport),
    }
}
