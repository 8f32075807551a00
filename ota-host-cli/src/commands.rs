// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Command implementations for the OTA upload session.

use std::fs;
use std::io::Write;
use std::path::Path;

use anyhow::{bail, Context, Result};
use indicatif::{ProgressBar, ProgressStyle};

use ota_common::config::CHUNK_SIZE;
use ota_common::protocol::{HEADER_LEN, RESPONSE_BODY_LEN};
use ota_common::{crc32, BankId, Packet, Response, Transport as OtaTransport};

use crate::transport::SerialTransport;

const RESPONSE_LEN: usize = HEADER_LEN + RESPONSE_BODY_LEN;
/// Generous timeout for ordinary ACK/NACK round-trips.
const RESPONSE_TIMEOUT_MS: u32 = 5_000;
/// START's response can lag behind a full sector erase of the target bank.
const START_TIMEOUT_MS: u32 = 30_000;
/// How many times a single DATA chunk is retried after a recoverable NACK.
const MAX_CHUNK_RETRIES: u32 = 3;

fn recv_response(transport: &mut SerialTransport, timeout_ms: u32) -> Result<Response> {
    let mut frame = [0u8; RESPONSE_LEN];
    transport
        .read_exact(&mut frame, timeout_ms)
        .map_err(|e| anyhow::anyhow!("waiting for response: {e}"))?;
    Response::decode(&frame).map_err(|e| anyhow::anyhow!("malformed response: {e}"))
}

/// Check connectivity to the device. The wire protocol has no query
/// packet, so this only confirms the port opens at the OTA baud rate —
/// it does not report live device state.
pub fn status(port_name: &str) -> Result<()> {
    let transport = SerialTransport::open(port_name)?;
    println!("Port {} opened at the OTA baud rate.", transport.port_name());
    println!("No live status query exists on the wire; run 'upload' to exercise a session.");
    Ok(())
}

/// Upload firmware to the specified bank.
pub fn upload(transport: &mut SerialTransport, file: &Path, bank: u8, version: u32) -> Result<()> {
    let firmware = fs::read(file).with_context(|| format!("Failed to read {}", file.display()))?;
    let size = firmware.len() as u32;
    let whole_crc = crc32(&firmware);
    let total_chunks = firmware.chunks(CHUNK_SIZE).count() as u32;
    let target_bank = BankId::from_wire(bank).context("bank must be 0 (A) or 1 (B)")?;

    println!(
        "Firmware: {} ({} bytes, CRC32: 0x{:08x})",
        file.display(),
        size,
        whole_crc
    );
    println!("Target:   Bank {} ({:?})", bank, target_bank);
    println!("Version:  {}", version);
    println!();

    print!("Starting update (erasing bank)... ");
    std::io::stdout().flush()?;
    let wire = Packet::encode_start(size, version, whole_crc, total_chunks, target_bank);
    transport.write_all(&wire);
    match recv_response(transport, START_TIMEOUT_MS)? {
        Response::Ack { .. } => println!("OK"),
        Response::Nack { error, .. } => bail!("START rejected: {error}"),
    }

    let pb = ProgressBar::new(size as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template(
                "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({eta})",
            )?
            .progress_chars("#>-"),
    );

    for (chunk_number, chunk) in firmware.chunks(CHUNK_SIZE).enumerate() {
        let chunk_number = chunk_number as u32;
        let chunk_crc = crc32(chunk);
        let wire = Packet::encode_data(chunk_number, chunk.len() as u16, chunk_crc, chunk);

        let mut attempt = 0;
        loop {
            transport.write_all(&wire);
            match recv_response(transport, RESPONSE_TIMEOUT_MS)? {
                Response::Ack { .. } => break,
                Response::Nack { error, .. } if attempt < MAX_CHUNK_RETRIES => {
                    attempt += 1;
                    eprintln!(
                        "chunk {chunk_number} rejected ({error}), retry {attempt}/{MAX_CHUNK_RETRIES}"
                    );
                }
                Response::Nack { error, .. } => {
                    pb.abandon();
                    bail!("chunk {chunk_number} failed after {MAX_CHUNK_RETRIES} retries: {error}");
                }
            }
        }

        pb.set_position(((chunk_number + 1) as u64 * CHUNK_SIZE as u64).min(size as u64));
    }

    pb.finish_with_message("Upload complete");
    println!();

    print!("Finalizing... ");
    std::io::stdout().flush()?;
    transport.write_all(&Packet::encode_end());
    match recv_response(transport, RESPONSE_TIMEOUT_MS)? {
        Response::Ack { .. } => println!("OK"),
        Response::Nack { error, .. } => bail!("END rejected: {error}"),
    }

    println!();
    println!("Firmware uploaded successfully; the device will reboot into the new image.");
    Ok(())
}

/// Abort an in-progress session. The bootloader resets to IDLE silently,
/// so this just confirms the packet went out.
pub fn abort(transport: &mut SerialTransport) -> Result<()> {
    transport.write_all(&Packet::encode_abort());
    println!("ABORT sent.");
    Ok(())
}
