// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Shared OTA engine: flash driver, CRC engine, boot record store, wire
//! protocol codec, transport abstraction, and the session state machine
//! that ties them together.
//!
//! This crate supports both `no_std` (embedded) and `std` (host) builds:
//! - Default: `no_std`, for the bootloader target.
//! - `std` feature: enables the in-memory [`flash::testing::MockFlash`] and
//!   [`transport::testing::LoopbackTransport`] doubles used by this crate's
//!   own test suite and available to `ota-host-cli`.
//! - `embedded` feature: pulls in `rp2040-hal` for the real flash/CRC
//!   hardware backends used by `ota-bootloader`.

#![cfg_attr(not(any(test, feature = "std")), no_std)]

pub mod boot_record;
pub mod config;
pub mod crc;
pub mod error;
pub mod flash;
pub mod protocol;
pub mod session;
pub mod transport;

pub use boot_record::{BankId, BankStatus, BootRecord, BootRecordError, BootRecordStore};
pub use crc::{crc32, CrcEngine, SoftwareCrc32};
pub use error::OtaError;
pub use flash::FlashDevice;
pub use protocol::{Packet, PacketType, Response};
pub use session::{OtaSession, SessionContext, SessionState};
pub use transport::{Transport, TimeoutMs};
