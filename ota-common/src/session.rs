// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! The session state machine: the heart of the OTA engine. Owns the
//! session context, drives the flash driver, CRC engine, and boot record
//! store, and turns decoded packets into ACK/NACK responses.
//!
//! Framing and transport timeouts live one layer up (see [`crate::transport`]);
//! by the time a [`Packet`] reaches [`OtaSession::handle_packet`] its body has
//! already been read in full, so this module only ever reasons about
//! protocol state, never about byte-level framing.

use crate::boot_record::{BankId, BootRecord, BootRecordStore};
use crate::config::CHUNK_SIZE;
use crate::crc::CrcEngine;
use crate::error::OtaError;
use crate::flash::FlashDevice;
use crate::protocol::{Packet, PacketType, Response, DATA_BODY_LEN, HEADER_LEN};
use crate::transport::{TimeoutMs, Transport};

/// Current phase of an OTA session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    ReceivingData,
    Verifying,
    Finalizing,
    Complete,
    Error,
}

/// All state belonging to one START-through-COMPLETE (or ERROR/ABORT) run.
#[derive(Debug, Clone, Copy)]
pub struct SessionContext {
    pub state: SessionState,
    pub target_bank: Option<BankId>,
    pub target_bank_address: u32,
    pub firmware_size: u32,
    pub firmware_version: u32,
    pub firmware_crc32: u32,
    pub total_chunks: u32,
    pub expected_chunk_number: u32,
    pub chunks_received: u32,
    pub bytes_written: u32,
    pub error_code: Option<OtaError>,
}

impl SessionContext {
    fn idle() -> Self {
        Self {
            state: SessionState::Idle,
            target_bank: None,
            target_bank_address: 0,
            firmware_size: 0,
            firmware_version: 0,
            firmware_crc32: 0,
            total_chunks: 0,
            expected_chunk_number: 0,
            chunks_received: 0,
            bytes_written: 0,
            error_code: None,
        }
    }
}

/// Size of the read buffer used to stream flash back through the CRC
/// engine at END. Must be a multiple of the flash word size so only the
/// final, possibly-short segment exercises zero-padded trailing feed.
const VERIFY_BUF_LEN: usize = 256;

/// Drives one OTA session against a flash device, a CRC engine, and a
/// dedicated boot record sector.
pub struct OtaSession<F: FlashDevice, C: CrcEngine> {
    flash: F,
    crc: C,
    boot_sector_address: u32,
    boot_sector_size: u32,
    context: SessionContext,
}

impl<F: FlashDevice, C: CrcEngine> OtaSession<F, C> {
    pub fn new(flash: F, crc: C, boot_sector_address: u32, boot_sector_size: u32) -> Self {
        Self {
            flash,
            crc,
            boot_sector_address,
            boot_sector_size,
            context: SessionContext::idle(),
        }
    }

    pub fn state(&self) -> SessionState {
        self.context.state
    }

    pub fn context(&self) -> &SessionContext {
        &self.context
    }

    pub fn flash(&self) -> &F {
        &self.flash
    }

    /// Dispatch one decoded packet, returning the response to send (if
    /// any — ABORT produces none).
    pub fn handle_packet(&mut self, packet: Packet) -> Option<Response> {
        match packet {
            Packet::Abort => {
                self.context = SessionContext::idle();
                None
            }
            Packet::Start {
                firmware_size,
                firmware_version,
                firmware_crc32,
                total_chunks,
                target_bank,
            } => Some(self.handle_start(
                firmware_size,
                firmware_version,
                firmware_crc32,
                total_chunks,
                target_bank,
            )),
            Packet::Data {
                chunk_number,
                chunk_size,
                chunk_crc32,
                data,
            } => Some(self.handle_data(chunk_number, chunk_size, chunk_crc32, &data)),
            Packet::End => Some(self.handle_end()),
        }
    }

    fn last_chunk_received(&self) -> u32 {
        self.context.chunks_received.saturating_sub(1)
    }

    /// Non-fatal rejection: emits NACK, state is unchanged.
    fn nack(&self, error: OtaError) -> Response {
        Response::Nack {
            error,
            last_chunk_received: self.last_chunk_received(),
        }
    }

    /// Fatal rejection: records the error, moves to ERROR, emits NACK.
    fn fail(&mut self, error: OtaError) -> Response {
        self.context.state = SessionState::Error;
        self.context.error_code = Some(error);
        Response::Nack {
            error,
            last_chunk_received: self.last_chunk_received(),
        }
    }

    fn active_bank(&mut self) -> Option<BankId> {
        let boot_sector_address = self.boot_sector_address;
        let boot_sector_size = self.boot_sector_size;
        let store = BootRecordStore::new(&mut self.flash, boot_sector_address, boot_sector_size);
        store.read(&mut self.crc).ok().and_then(|r| r.active_bank_id())
    }

    fn handle_start(
        &mut self,
        firmware_size: u32,
        firmware_version: u32,
        firmware_crc32: u32,
        total_chunks: u32,
        target_bank: u8,
    ) -> Response {
        if self.context.state != SessionState::Idle {
            return self.fail(OtaError::Sequence);
        }

        if firmware_size == 0 || firmware_size > crate::config::BANK_SIZE {
            return self.fail(OtaError::Size);
        }
        let expected_total_chunks = (firmware_size as u64).div_ceil(CHUNK_SIZE as u64) as u32;
        if total_chunks != expected_total_chunks {
            return self.fail(OtaError::Size);
        }
        let Some(target) = BankId::from_wire(target_bank) else {
            return self.fail(OtaError::Size);
        };
        if self.active_bank() == Some(target) {
            return self.fail(OtaError::Sequence);
        }

        let target_address = BootRecordStore::<F>::bank_address(target);
        if self
            .flash
            .erase_sectors(target_address, crate::config::BANK_SIZE)
            .is_err()
        {
            return self.fail(OtaError::Flash);
        }

        self.context = SessionContext {
            state: SessionState::ReceivingData,
            target_bank: Some(target),
            target_bank_address: target_address,
            firmware_size,
            firmware_version,
            firmware_crc32,
            total_chunks,
            expected_chunk_number: 0,
            chunks_received: 0,
            bytes_written: 0,
            error_code: None,
        };
        Response::Ack {
            last_chunk_received: 0,
        }
    }

    fn handle_data(
        &mut self,
        chunk_number: u32,
        chunk_size: u16,
        chunk_crc32: u32,
        data: &[u8; CHUNK_SIZE],
    ) -> Response {
        if self.context.state != SessionState::ReceivingData {
            return self.nack(OtaError::Sequence);
        }
        if chunk_number != self.context.expected_chunk_number {
            // Either a retransmit of an already-ACKed chunk, or a skip
            // ahead; both are retried by the sender, not fatal.
            return self.nack(OtaError::Sequence);
        }

        let chunk_len = chunk_size as usize;
        if chunk_len == 0 || chunk_len > CHUNK_SIZE {
            return self.fail(OtaError::Size);
        }
        let is_last_chunk = self.context.expected_chunk_number + 1 == self.context.total_chunks;
        if !is_last_chunk && chunk_len != CHUNK_SIZE {
            return self.fail(OtaError::Size);
        }

        self.crc.reset();
        self.crc.feed(&data[..chunk_len]);
        if self.crc.read() != chunk_crc32 {
            return self.nack(OtaError::Crc);
        }

        let offset =
            self.context.target_bank_address + self.context.expected_chunk_number * CHUNK_SIZE as u32;
        if self.flash.program(offset, &data[..chunk_len]).is_err() {
            return self.fail(OtaError::Flash);
        }

        self.context.chunks_received += 1;
        self.context.expected_chunk_number += 1;
        self.context.bytes_written += chunk_len as u32;
        if self.context.chunks_received == self.context.total_chunks {
            self.context.state = SessionState::Verifying;
        }
        Response::Ack {
            last_chunk_received: self.context.chunks_received - 1,
        }
    }

    fn handle_end(&mut self) -> Response {
        if self.context.state != SessionState::Verifying {
            return self.fail(OtaError::Sequence);
        }
        if self.context.bytes_written != self.context.firmware_size {
            return self.fail(OtaError::Size);
        }
        if self.whole_image_crc() != self.context.firmware_crc32 {
            return self.fail(OtaError::Crc);
        }

        self.context.state = SessionState::Finalizing;
        let target = self
            .context
            .target_bank
            .expect("VERIFYING implies a target bank was recorded at START");
        let record = BootRecord::committing(target);
        let committed = {
            let boot_sector_address = self.boot_sector_address;
            let boot_sector_size = self.boot_sector_size;
            let mut store =
                BootRecordStore::new(&mut self.flash, boot_sector_address, boot_sector_size);
            store.commit(record, &mut self.crc)
        };
        if committed.is_err() {
            return self.fail(OtaError::Flash);
        }

        self.context.state = SessionState::Complete;
        Response::Ack {
            last_chunk_received: self.last_chunk_received(),
        }
    }

    /// Read one packet off `transport` and dispatch it, writing back
    /// whatever response results. A header-read timeout is silent — the
    /// caller just loops back and waits for the next header, per the
    /// outer receive loop's timeout policy. Any other framing failure
    /// (bad magic, unknown type byte, a DATA body that never completes)
    /// is fatal, the same as a protocol-level validation failure would be.
    ///
    /// Owns the one static body buffer sized for the largest packet (DATA)
    /// so the receive loop never allocates per packet.
    pub fn run_once<T: Transport>(
        &mut self,
        transport: &mut T,
        header_timeout_ms: TimeoutMs,
        data_timeout_ms: TimeoutMs,
    ) -> SessionState {
        let mut header = [0u8; HEADER_LEN];
        if transport.read_exact(&mut header, header_timeout_ms).is_err() {
            return self.context.state;
        }

        let magic = u32::from_le_bytes(header[0..4].try_into().unwrap());
        let packet_type = match PacketType::from_byte(header[4]) {
            Ok(t) => t,
            Err(_) => return self.fail_and_send(transport, OtaError::Sequence),
        };
        if magic != packet_type.magic() {
            return self.fail_and_send(transport, OtaError::Sequence);
        }

        let body_len = packet_type.body_len();
        let mut body = [0u8; DATA_BODY_LEN];
        let body_timeout_ms = if packet_type == PacketType::Data {
            data_timeout_ms
        } else {
            header_timeout_ms
        };
        if body_len > 0 && transport.read_exact(&mut body[..body_len], body_timeout_ms).is_err() {
            return self.fail_and_send(transport, OtaError::Timeout);
        }

        let packet = match Packet::decode_body(packet_type, &body[..body_len]) {
            Ok(p) => p,
            Err(err) => return self.fail_and_send(transport, err),
        };

        if let Some(response) = self.handle_packet(packet) {
            transport.write_all(&response.encode());
        }
        self.context.state
    }

    fn fail_and_send<T: Transport>(&mut self, transport: &mut T, error: OtaError) -> SessionState {
        let response = self.fail(error);
        transport.write_all(&response.encode());
        self.context.state
    }

    /// Recompute the whole-image CRC by streaming `firmware_size` bytes
    /// back from the target bank, in fixed-size segments, letting the
    /// final (possibly short) segment carry any zero-padded trailing bytes.
    fn whole_image_crc(&mut self) -> u32 {
        self.crc.reset();
        let mut buf = [0u8; VERIFY_BUF_LEN];
        let mut remaining = self.context.firmware_size;
        let mut addr = self.context.target_bank_address;
        while remaining > 0 {
            let take = core::cmp::min(VERIFY_BUF_LEN as u32, remaining) as usize;
            self.flash.read(addr, &mut buf[..take]);
            self.crc.feed(&buf[..take]);
            addr += take as u32;
            remaining -= take as u32;
        }
        self.crc.read()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crc::{crc32, SoftwareCrc32};
    use crate::flash::testing::MockFlash;

    const FLASH_BASE: u32 = crate::config::FLASH_BASE;
    const SECTOR: u32 = crate::config::FLASH_SECTOR_SIZE;
    const BOOT_ADDR: u32 = crate::config::BOOT_RECORD_ADDR;
    const FLASH_LEN: u32 = BOOT_ADDR - FLASH_BASE + SECTOR;

    fn new_session() -> OtaSession<MockFlash, SoftwareCrc32> {
        let flash = MockFlash::new(FLASH_BASE, FLASH_LEN, SECTOR, 4);
        OtaSession::new(flash, SoftwareCrc32::new(), BOOT_ADDR, SECTOR)
    }

    fn start(size: u32, total_chunks: u32, target_bank: u8, crc: u32) -> Packet {
        Packet::Start {
            firmware_size: size,
            firmware_version: 1,
            firmware_crc32: crc,
            total_chunks,
            target_bank,
        }
    }

    fn data_chunk(chunk_number: u32, payload: &[u8]) -> Packet {
        let mut buf = [0u8; CHUNK_SIZE];
        buf[..payload.len()].copy_from_slice(payload);
        Packet::Data {
            chunk_number,
            chunk_size: payload.len() as u16,
            chunk_crc32: crc32(payload),
            data: buf,
        }
    }

    fn image(total_len: usize) -> Vec<u8> {
        (0..total_len).map(|i| (i % 256) as u8).collect()
    }

    // S1 — happy path, 5 KiB image, target bank B.
    #[test]
    fn s1_happy_path_5kib_to_bank_b() {
        let mut session = new_session();
        let img = image(5120);
        let whole_crc = crc32(&img);

        let resp = session
            .handle_packet(start(5120, 5, 1, whole_crc))
            .unwrap();
        assert_eq!(resp, Response::Ack { last_chunk_received: 0 });
        assert_eq!(session.state(), SessionState::ReceivingData);

        for (i, chunk) in img.chunks(CHUNK_SIZE).enumerate() {
            let resp = session.handle_packet(data_chunk(i as u32, chunk)).unwrap();
            assert_eq!(
                resp,
                Response::Ack {
                    last_chunk_received: i as u32
                }
            );
        }
        assert_eq!(session.state(), SessionState::Verifying);

        let resp = session.handle_packet(Packet::End).unwrap();
        assert_eq!(
            resp,
            Response::Ack {
                last_chunk_received: 4
            }
        );
        assert_eq!(session.state(), SessionState::Complete);

        let (flash, crc) = session.flash_crc_mut_for_test();
        let store = BootRecordStore::new(flash, BOOT_ADDR, SECTOR);
        let record = store.read(crc).unwrap();
        assert_eq!(record.active_bank_id(), Some(BankId::B));
        assert_eq!(
            record.status_of(BankId::A),
            crate::boot_record::BankStatus::Invalid
        );
        assert_eq!(
            record.status_of(BankId::B),
            crate::boot_record::BankStatus::Valid
        );
    }

    // S2 — last chunk short.
    #[test]
    fn s2_last_chunk_short() {
        let mut session = new_session();
        let img = image(5000);
        let whole_crc = crc32(&img);

        session.handle_packet(start(5000, 5, 1, whole_crc)).unwrap();
        for (i, chunk) in img.chunks(CHUNK_SIZE).enumerate() {
            assert_eq!(chunk.len(), if i < 4 { 1024 } else { 904 });
            let resp = session.handle_packet(data_chunk(i as u32, chunk)).unwrap();
            assert!(matches!(resp, Response::Ack { .. }));
        }
        let resp = session.handle_packet(Packet::End).unwrap();
        assert!(matches!(resp, Response::Ack { .. }));
        assert_eq!(session.state(), SessionState::Complete);
        assert_eq!(session.context().bytes_written, 5000);
    }

    // S3 — chunk CRC mismatch, retry succeeds.
    #[test]
    fn s3_chunk_crc_mismatch_then_retry() {
        let mut session = new_session();
        let img = image(5120);
        let whole_crc = crc32(&img);
        session.handle_packet(start(5120, 5, 1, whole_crc)).unwrap();

        session.handle_packet(data_chunk(0, &img[0..1024])).unwrap();
        session.handle_packet(data_chunk(1, &img[1024..2048])).unwrap();

        let mut bad_chunk2 = data_chunk(2, &img[2048..3072]);
        if let Packet::Data { chunk_crc32, .. } = &mut bad_chunk2 {
            *chunk_crc32 ^= 0xFFFF_FFFF;
        }
        let resp = session.handle_packet(bad_chunk2).unwrap();
        assert_eq!(
            resp,
            Response::Nack {
                error: OtaError::Crc,
                last_chunk_received: 1
            }
        );
        assert_eq!(session.state(), SessionState::ReceivingData);
        assert_eq!(session.context().expected_chunk_number, 2);

        // Retransmission of chunk 2 succeeds.
        let resp = session
            .handle_packet(data_chunk(2, &img[2048..3072]))
            .unwrap();
        assert_eq!(resp, Response::Ack { last_chunk_received: 2 });

        session.handle_packet(data_chunk(3, &img[3072..4096])).unwrap();
        session.handle_packet(data_chunk(4, &img[4096..5120])).unwrap();
        let resp = session.handle_packet(Packet::End).unwrap();
        assert!(matches!(resp, Response::Ack { .. }));
        assert_eq!(session.state(), SessionState::Complete);
    }

    // S4 — wrong target bank (active bank already named, START repeats it).
    #[test]
    fn s4_wrong_target_bank() {
        let mut session = new_session();
        // Device currently active on A.
        {
            let boot_sector_address = BOOT_ADDR;
            let (flash, crc) = session.flash_crc_mut_for_test();
            let mut store = BootRecordStore::new(flash, boot_sector_address, SECTOR);
            store
                .commit(BootRecord::committing(BankId::A), crc)
                .unwrap();
        }

        let resp = session.handle_packet(start(1024, 1, 0, 0)).unwrap();
        assert_eq!(
            resp,
            Response::Nack {
                error: OtaError::Sequence,
                last_chunk_received: 0
            }
        );
        assert_eq!(session.state(), SessionState::Error);

        let (flash, crc) = session.flash_crc_mut_for_test();
        let store = BootRecordStore::new(flash, BOOT_ADDR, SECTOR);
        let record = store.read(crc).unwrap();
        assert_eq!(record.active_bank_id(), Some(BankId::A));
    }

    // S5 — whole-image CRC mismatch.
    #[test]
    fn s5_whole_image_crc_mismatch() {
        let mut session = new_session();
        let img = image(2048);

        session.handle_packet(start(2048, 2, 1, 0xBAD_0001)).unwrap();
        session.handle_packet(data_chunk(0, &img[0..1024])).unwrap();
        session.handle_packet(data_chunk(1, &img[1024..2048])).unwrap();
        assert_eq!(session.state(), SessionState::Verifying);

        let resp = session.handle_packet(Packet::End).unwrap();
        assert_eq!(
            resp,
            Response::Nack {
                error: OtaError::Crc,
                last_chunk_received: 1
            }
        );
        assert_eq!(session.state(), SessionState::Error);

        // Boot record was never committed: unreadable (no magic written yet).
        let (flash, crc) = session.flash_crc_mut_for_test();
        let store = BootRecordStore::new(flash, BOOT_ADDR, SECTOR);
        assert!(store.read(crc).is_err());
    }

    // S6 — ABORT mid-transfer.
    #[test]
    fn s6_abort_mid_transfer() {
        let mut session = new_session();
        let img = image(5120);
        let whole_crc = crc32(&img);
        session.handle_packet(start(5120, 5, 1, whole_crc)).unwrap();
        session.handle_packet(data_chunk(0, &img[0..1024])).unwrap();
        session.handle_packet(data_chunk(1, &img[1024..2048])).unwrap();

        let resp = session.handle_packet(Packet::Abort);
        assert_eq!(resp, None);
        assert_eq!(session.state(), SessionState::Idle);

        let (flash, crc) = session.flash_crc_mut_for_test();
        let store = BootRecordStore::new(flash, BOOT_ADDR, SECTOR);
        assert!(store.read(crc).is_err());
    }

    #[test]
    fn repeated_aborts_are_idempotent() {
        let mut session = new_session();
        for _ in 0..5 {
            assert_eq!(session.handle_packet(Packet::Abort), None);
            assert_eq!(session.state(), SessionState::Idle);
        }
    }

    #[test]
    fn out_of_sequence_data_with_lower_chunk_number_is_rejected_without_reprogramming() {
        let mut session = new_session();
        let img = image(3072);
        let whole_crc = crc32(&img);
        session.handle_packet(start(3072, 3, 1, whole_crc)).unwrap();
        session.handle_packet(data_chunk(0, &img[0..1024])).unwrap();

        // Replay chunk 0 again.
        let resp = session.handle_packet(data_chunk(0, &img[0..1024])).unwrap();
        assert_eq!(
            resp,
            Response::Nack {
                error: OtaError::Sequence,
                last_chunk_received: 0
            }
        );
        assert_eq!(session.state(), SessionState::ReceivingData);
        assert_eq!(session.context().expected_chunk_number, 1);
    }

    #[test]
    fn data_after_verifying_is_nacked_without_becoming_fatal() {
        let mut session = new_session();
        let img = image(1024);
        let whole_crc = crc32(&img);
        session.handle_packet(start(1024, 1, 1, whole_crc)).unwrap();
        session.handle_packet(data_chunk(0, &img)).unwrap();
        assert_eq!(session.state(), SessionState::Verifying);

        let resp = session.handle_packet(data_chunk(1, &img)).unwrap();
        assert_eq!(
            resp,
            Response::Nack {
                error: OtaError::Sequence,
                last_chunk_received: 0
            }
        );
        assert_eq!(session.state(), SessionState::Verifying);
    }

    #[test]
    fn start_during_receiving_data_is_fatal() {
        let mut session = new_session();
        session.handle_packet(start(2048, 2, 1, 0)).unwrap();
        let resp = session.handle_packet(start(2048, 2, 1, 0)).unwrap();
        assert_eq!(
            resp,
            Response::Nack {
                error: OtaError::Sequence,
                last_chunk_received: 0
            }
        );
        assert_eq!(session.state(), SessionState::Error);
    }

    #[test]
    fn run_once_header_timeout_is_silent_and_keeps_state() {
        use crate::transport::testing::LoopbackTransport;
        let mut session = new_session();
        let mut transport = LoopbackTransport::new();
        let state = session.run_once(&mut transport, 0, 0);
        assert_eq!(state, SessionState::Idle);
        assert!(transport.take_outbound().is_empty());
    }

    #[test]
    fn run_once_drives_a_full_session_over_a_transport() {
        use crate::transport::testing::LoopbackTransport;
        let mut session = new_session();
        let mut transport = LoopbackTransport::new();
        let img = image(2048);
        let whole_crc = crc32(&img);

        transport.feed(&Packet::encode_start(2048, 1, whole_crc, 2, BankId::B));
        assert_eq!(
            session.run_once(&mut transport, 0, 0),
            SessionState::ReceivingData
        );
        assert_eq!(
            Response::decode(&transport.take_outbound().try_into().unwrap()),
            Ok(Response::Ack { last_chunk_received: 0 })
        );

        for (i, chunk) in img.chunks(CHUNK_SIZE).enumerate() {
            transport.feed(&Packet::encode_data(i as u32, chunk.len() as u16, crc32(chunk), chunk));
            session.run_once(&mut transport, 0, 0);
            transport.take_outbound();
        }
        assert_eq!(session.state(), SessionState::Verifying);

        transport.feed(&Packet::encode_end());
        assert_eq!(
            session.run_once(&mut transport, 0, 0),
            SessionState::Complete
        );
        assert_eq!(
            Response::decode(&transport.take_outbound().try_into().unwrap()),
            Ok(Response::Ack { last_chunk_received: 1 })
        );
    }

    #[test]
    fn run_once_rejects_a_header_with_mismatched_magic() {
        use crate::transport::testing::LoopbackTransport;
        let mut session = new_session();
        let mut transport = LoopbackTransport::new();
        let mut wire = Packet::encode_end().to_vec();
        wire[0] ^= 0xFF;
        transport.feed(&wire);
        let state = session.run_once(&mut transport, 0, 0);
        assert_eq!(state, SessionState::Error);
        assert_eq!(
            Response::decode(&transport.take_outbound().try_into().unwrap()),
            Ok(Response::Nack {
                error: OtaError::Sequence,
                last_chunk_received: 0
            })
        );
    }
}

#[cfg(test)]
impl<F: FlashDevice, C: CrcEngine> OtaSession<F, C> {
    fn flash_mut_for_test(&mut self) -> &mut F {
        &mut self.flash
    }

    fn crc_mut_for_test(&mut self) -> &mut C {
        &mut self.crc
    }

    fn flash_crc_mut_for_test(&mut self) -> (&mut F, &mut C) {
        (&mut self.flash, &mut self.crc)
    }
}
