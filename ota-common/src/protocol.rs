// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Fixed-layout, little-endian, byte-packed wire codec for the OTA
//! channel. Hand-rolled rather than serde/postcard, following this crate's
//! own `#[repr(C)]` raw (de)serialization precedent for on-flash structs:
//! the wire needs a frozen byte layout independent of any derive's output,
//! since the two sides of the link are built from different source trees.

use crate::boot_record::BankId;
use crate::config::{CHUNK_SIZE, OTA_MAGIC_DATA, OTA_MAGIC_START};
use crate::error::OtaError;

/// Every packet shares this 5-byte header: magic word, then type byte.
pub const HEADER_LEN: usize = 5;

pub const START_BODY_LEN: usize = 17;
pub const DATA_BODY_LEN: usize = 4 + 2 + 4 + CHUNK_SIZE;
pub const RESPONSE_BODY_LEN: usize = 5;

/// Wire size of a full DATA packet (header + body), fixed regardless of
/// the chunk's actual payload length.
pub const DATA_PACKET_LEN: usize = HEADER_LEN + DATA_BODY_LEN;

/// Packet type byte, the second byte of every header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PacketType {
    Start = 0x01,
    Data = 0x02,
    End = 0x03,
    Ack = 0x04,
    Nack = 0x05,
    Abort = 0x06,
}

impl PacketType {
    pub fn from_byte(byte: u8) -> Result<Self, OtaError> {
        match byte {
            0x01 => Ok(PacketType::Start),
            0x02 => Ok(PacketType::Data),
            0x03 => Ok(PacketType::End),
            0x04 => Ok(PacketType::Ack),
            0x05 => Ok(PacketType::Nack),
            0x06 => Ok(PacketType::Abort),
            _ => Err(OtaError::Sequence),
        }
    }

    /// The magic word expected at the head of a packet of this type.
    pub fn magic(self) -> u32 {
        match self {
            PacketType::Data => OTA_MAGIC_DATA,
            _ => OTA_MAGIC_START,
        }
    }

    /// Length of the kind-specific body following the 5-byte header, where
    /// fixed (`Data` and `Start` are; the codec reads `Data`'s body length
    /// directly since it never varies with the actual chunk size).
    pub fn body_len(self) -> usize {
        match self {
            PacketType::Start => START_BODY_LEN,
            PacketType::Data => DATA_BODY_LEN,
            PacketType::End => 0,
            PacketType::Ack | PacketType::Nack => RESPONSE_BODY_LEN,
            PacketType::Abort => 0,
        }
    }
}

/// A decoded host-to-bootloader packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Packet {
    Start {
        firmware_size: u32,
        firmware_version: u32,
        firmware_crc32: u32,
        total_chunks: u32,
        target_bank: u8,
    },
    Data {
        chunk_number: u32,
        chunk_size: u16,
        chunk_crc32: u32,
        data: [u8; CHUNK_SIZE],
    },
    End,
    Abort,
}

impl Packet {
    pub fn packet_type(&self) -> PacketType {
        match self {
            Packet::Start { .. } => PacketType::Start,
            Packet::Data { .. } => PacketType::Data,
            Packet::End => PacketType::End,
            Packet::Abort => PacketType::Abort,
        }
    }

    /// Encode the header. Callers append the body with the matching
    /// `encode_*_body` (or nothing, for END/ABORT).
    fn encode_header(packet_type: PacketType, out: &mut [u8]) {
        out[0..4].copy_from_slice(&packet_type.magic().to_le_bytes());
        out[4] = packet_type as u8;
    }

    pub fn encode_start(
        firmware_size: u32,
        firmware_version: u32,
        firmware_crc32: u32,
        total_chunks: u32,
        target_bank: BankId,
    ) -> [u8; HEADER_LEN + START_BODY_LEN] {
        let mut out = [0u8; HEADER_LEN + START_BODY_LEN];
        Self::encode_header(PacketType::Start, &mut out);
        out[5..9].copy_from_slice(&firmware_size.to_le_bytes());
        out[9..13].copy_from_slice(&firmware_version.to_le_bytes());
        out[13..17].copy_from_slice(&firmware_crc32.to_le_bytes());
        out[17..21].copy_from_slice(&total_chunks.to_le_bytes());
        out[21] = target_bank.to_wire();
        out
    }

    /// Encode a DATA packet. `data` shorter than [`CHUNK_SIZE`] occupies
    /// only the first `data.len()` bytes of the fixed 1024-byte data
    /// region; the remainder is zero-filled, matching the on-wire contract.
    pub fn encode_data(
        chunk_number: u32,
        chunk_size: u16,
        chunk_crc32: u32,
        data: &[u8],
    ) -> [u8; DATA_PACKET_LEN] {
        let mut out = [0u8; DATA_PACKET_LEN];
        Self::encode_header(PacketType::Data, &mut out);
        out[5..9].copy_from_slice(&chunk_number.to_le_bytes());
        out[9..11].copy_from_slice(&chunk_size.to_le_bytes());
        out[11..15].copy_from_slice(&chunk_crc32.to_le_bytes());
        out[15..15 + data.len()].copy_from_slice(data);
        out
    }

    pub fn encode_end() -> [u8; HEADER_LEN] {
        let mut out = [0u8; HEADER_LEN];
        Self::encode_header(PacketType::End, &mut out);
        out
    }

    pub fn encode_abort() -> [u8; HEADER_LEN] {
        let mut out = [0u8; HEADER_LEN];
        Self::encode_header(PacketType::Abort, &mut out);
        out
    }

    /// Decode a packet body given its already-identified type. `body` must
    /// be exactly `packet_type.body_len()` bytes.
    pub fn decode_body(packet_type: PacketType, body: &[u8]) -> Result<Packet, OtaError> {
        if body.len() != packet_type.body_len() {
            return Err(OtaError::Size);
        }
        Ok(match packet_type {
            PacketType::Start => Packet::Start {
                firmware_size: u32::from_le_bytes(body[0..4].try_into().unwrap()),
                firmware_version: u32::from_le_bytes(body[4..8].try_into().unwrap()),
                firmware_crc32: u32::from_le_bytes(body[8..12].try_into().unwrap()),
                total_chunks: u32::from_le_bytes(body[12..16].try_into().unwrap()),
                target_bank: body[16],
            },
            PacketType::Data => {
                let mut data = [0u8; CHUNK_SIZE];
                data.copy_from_slice(&body[10..10 + CHUNK_SIZE]);
                Packet::Data {
                    chunk_number: u32::from_le_bytes(body[0..4].try_into().unwrap()),
                    chunk_size: u16::from_le_bytes(body[4..6].try_into().unwrap()),
                    chunk_crc32: u32::from_le_bytes(body[6..10].try_into().unwrap()),
                    data,
                }
            }
            PacketType::End => Packet::End,
            PacketType::Abort => Packet::Abort,
            PacketType::Ack | PacketType::Nack => return Err(OtaError::Sequence),
        })
    }
}

/// A bootloader-to-host response: ACK or NACK, both carrying an error code
/// (always `None` on ACK) and the last successfully received chunk number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Response {
    Ack { last_chunk_received: u32 },
    Nack {
        error: OtaError,
        last_chunk_received: u32,
    },
}

impl Response {
    pub fn encode(self) -> [u8; HEADER_LEN + RESPONSE_BODY_LEN] {
        let mut out = [0u8; HEADER_LEN + RESPONSE_BODY_LEN];
        let (packet_type, error, last_chunk_received) = match self {
            Response::Ack {
                last_chunk_received,
            } => (PacketType::Ack, OtaError::None, last_chunk_received),
            Response::Nack {
                error,
                last_chunk_received,
            } => (PacketType::Nack, error, last_chunk_received),
        };
        Packet::encode_header(packet_type, &mut out);
        out[5] = error.to_wire();
        out[6..10].copy_from_slice(&last_chunk_received.to_le_bytes());
        out
    }

    pub fn decode(frame: &[u8; HEADER_LEN + RESPONSE_BODY_LEN]) -> Result<Response, OtaError> {
        let magic = u32::from_le_bytes(frame[0..4].try_into().unwrap());
        if magic != OTA_MAGIC_START {
            return Err(OtaError::Sequence);
        }
        let error = OtaError::from_wire(frame[5]);
        let last_chunk_received = u32::from_le_bytes(frame[6..10].try_into().unwrap());
        match PacketType::from_byte(frame[4])? {
            PacketType::Ack => Ok(Response::Ack {
                last_chunk_received,
            }),
            PacketType::Nack => Ok(Response::Nack {
                error,
                last_chunk_received,
            }),
            _ => Err(OtaError::Sequence),
        }
    }
}
