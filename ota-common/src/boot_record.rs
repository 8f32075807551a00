// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! The persistent dual-bank boot record: five 32-bit words naming the
//! active bank and each bank's validity, protected by a magic number and a
//! CRC-32 computed with the CRC field itself zeroed.

use crate::config::{BOOT_STATE_MAGIC, FW_A_ADDR, FW_B_ADDR};
use crate::crc::CrcEngine;
use crate::error::OtaError;
use crate::flash::FlashDevice;

/// One of the two firmware banks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BankId {
    A,
    B,
}

impl BankId {
    pub fn other(self) -> BankId {
        match self {
            BankId::A => BankId::B,
            BankId::B => BankId::A,
        }
    }

    pub fn to_wire(self) -> u8 {
        match self {
            BankId::A => 0,
            BankId::B => 1,
        }
    }

    pub fn from_wire(byte: u8) -> Option<BankId> {
        match byte {
            0 => Some(BankId::A),
            1 => Some(BankId::B),
            _ => None,
        }
    }
}

/// Validity of a single bank as recorded in the boot record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum BankStatus {
    Invalid = 0,
    Valid = 1,
}

impl BankStatus {
    fn from_word(word: u32) -> BankStatus {
        if word == BankStatus::Valid as u32 {
            BankStatus::Valid
        } else {
            BankStatus::Invalid
        }
    }
}

/// The on-flash boot record layout: magic, per-bank status, active bank,
/// and a CRC-32 computed over the other four words with this field zeroed.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BootRecord {
    pub magic: u32,
    pub bank_a_status: u32,
    pub bank_b_status: u32,
    pub active_bank: u32,
    pub crc32: u32,
}

const _: () = assert!(core::mem::size_of::<BootRecord>() == 20);

impl BootRecord {
    /// A fresh record naming bank A active, with both banks invalid. Used
    /// when the boot record sector has never been committed.
    pub fn blank() -> Self {
        Self {
            magic: BOOT_STATE_MAGIC,
            bank_a_status: BankStatus::Invalid as u32,
            bank_b_status: BankStatus::Invalid as u32,
            active_bank: BankId::A.to_wire() as u32,
            crc32: 0,
        }
    }

    /// Build the record that results from committing `target` as the new
    /// active bank: `target` becomes VALID, the other bank becomes INVALID.
    pub fn committing(target: BankId) -> Self {
        let mut record = Self::blank();
        record.active_bank = target.to_wire() as u32;
        match target {
            BankId::A => {
                record.bank_a_status = BankStatus::Valid as u32;
                record.bank_b_status = BankStatus::Invalid as u32;
            }
            BankId::B => {
                record.bank_a_status = BankStatus::Invalid as u32;
                record.bank_b_status = BankStatus::Valid as u32;
            }
        }
        record
    }

    pub fn active_bank_id(&self) -> Option<BankId> {
        BankId::from_wire(self.active_bank as u8)
    }

    pub fn status_of(&self, bank: BankId) -> BankStatus {
        match bank {
            BankId::A => BankStatus::from_word(self.bank_a_status),
            BankId::B => BankStatus::from_word(self.bank_b_status),
        }
    }

    pub fn has_valid_magic(&self) -> bool {
        self.magic == BOOT_STATE_MAGIC
    }

    /// The record is fully readable: magic matches and the active bank
    /// names itself VALID.
    pub fn is_consistent(&self) -> bool {
        self.has_valid_magic()
            && self
                .active_bank_id()
                .is_some_and(|b| self.status_of(b) == BankStatus::Valid)
    }

    fn words(&self) -> [u32; 5] {
        [
            self.magic,
            self.bank_a_status,
            self.bank_b_status,
            self.active_bank,
            self.crc32,
        ]
    }

    fn from_words(words: [u32; 5]) -> Self {
        Self {
            magic: words[0],
            bank_a_status: words[1],
            bank_b_status: words[2],
            active_bank: words[3],
            crc32: words[4],
        }
    }

    fn to_bytes(self) -> [u8; 20] {
        let mut out = [0u8; 20];
        for (i, word) in self.words().iter().enumerate() {
            out[i * 4..i * 4 + 4].copy_from_slice(&word.to_le_bytes());
        }
        out
    }

    fn from_bytes(bytes: &[u8; 20]) -> Self {
        let mut words = [0u32; 5];
        for (i, word) in words.iter_mut().enumerate() {
            *word = u32::from_le_bytes(bytes[i * 4..i * 4 + 4].try_into().unwrap());
        }
        Self::from_words(words)
    }

    /// CRC-32 over the record with the CRC field itself treated as zero.
    fn compute_crc(self, crc_engine: &mut dyn CrcEngine) -> u32 {
        let mut zeroed = self;
        zeroed.crc32 = 0;
        crc_engine.reset();
        crc_engine.feed_words(&zeroed.to_bytes());
        crc_engine.read()
    }
}

/// Errors distinguishing *why* a stored boot record failed to validate, as
/// distinct from the wire-protocol [`OtaError`] set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootRecordError {
    InvalidMagic,
    CrcMismatch,
    Flash,
}

impl From<OtaError> for BootRecordError {
    fn from(_: OtaError) -> Self {
        BootRecordError::Flash
    }
}

/// Owns the dedicated boot record flash sector: read, write, erase, and the
/// bank-address lookup helper.
pub struct BootRecordStore<'a, F: FlashDevice> {
    flash: &'a mut F,
    address: u32,
    sector_size: u32,
}

impl<'a, F: FlashDevice> BootRecordStore<'a, F> {
    pub fn new(flash: &'a mut F, address: u32, sector_size: u32) -> Self {
        Self {
            flash,
            address,
            sector_size,
        }
    }

    pub fn bank_address(bank: BankId) -> u32 {
        match bank {
            BankId::A => FW_A_ADDR,
            BankId::B => FW_B_ADDR,
        }
    }

    /// Read and validate the stored record: checks magic, then verifies the
    /// CRC by recomputing it over a copy with the CRC field zeroed.
    pub fn read(&self, crc_engine: &mut dyn CrcEngine) -> Result<BootRecord, BootRecordError> {
        let mut raw = [0u8; 20];
        self.flash.read(self.address, &mut raw);
        let record = BootRecord::from_bytes(&raw);

        if !record.has_valid_magic() {
            return Err(BootRecordError::InvalidMagic);
        }
        if record.compute_crc(crc_engine) != record.crc32 {
            return Err(BootRecordError::CrcMismatch);
        }
        Ok(record)
    }

    /// Compute the record's CRC and program it. Caller must have erased the
    /// sector first — see [`BootRecordStore::commit`] for the safe sequence.
    pub fn write(
        &mut self,
        mut record: BootRecord,
        crc_engine: &mut dyn CrcEngine,
    ) -> Result<(), OtaError> {
        record.crc32 = record.compute_crc(crc_engine);
        self.flash.program(self.address, &record.to_bytes())
    }

    /// Erase the dedicated boot record sector.
    pub fn erase(&mut self) -> Result<(), OtaError> {
        self.flash.erase_sectors(self.address, self.sector_size)
    }

    /// The atomic-at-the-sector-level bank swap commit sequence: erase,
    /// then write the new record. A crash between the two steps leaves an
    /// unreadable record (policy for recovering from that is the
    /// bootloader's, not this store's).
    pub fn commit(
        &mut self,
        record: BootRecord,
        crc_engine: &mut dyn CrcEngine,
    ) -> Result<(), OtaError> {
        self.erase()?;
        self.write(record, crc_engine)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crc::SoftwareCrc32;
    use crate::flash::testing::MockFlash;

    const SECTOR: u32 = 4096;
    const ADDR: u32 = 0x1000_0000;

    fn store() -> (MockFlash, SoftwareCrc32) {
        (MockFlash::new(ADDR, SECTOR, SECTOR, 4), SoftwareCrc32::new())
    }

    #[test]
    fn fresh_sector_has_invalid_magic() {
        let (mut flash, mut crc) = store();
        let store = BootRecordStore::new(&mut flash, ADDR, SECTOR);
        assert_eq!(store.read(&mut crc), Err(BootRecordError::InvalidMagic));
    }

    #[test]
    fn write_then_read_roundtrips() {
        let (mut flash, mut crc) = store();
        let mut store = BootRecordStore::new(&mut flash, ADDR, SECTOR);
        store.erase().unwrap();
        let record = BootRecord::committing(BankId::B);
        store.write(record, &mut crc).unwrap();

        let read_back = store.read(&mut crc).unwrap();
        assert_eq!(read_back.active_bank_id(), Some(BankId::B));
        assert_eq!(read_back.status_of(BankId::B), BankStatus::Valid);
        assert_eq!(read_back.status_of(BankId::A), BankStatus::Invalid);
        assert!(read_back.is_consistent());
    }

    #[test]
    fn corrupted_record_fails_crc_check() {
        let (mut flash, mut crc) = store();
        {
            let mut store = BootRecordStore::new(&mut flash, ADDR, SECTOR);
            store.erase().unwrap();
            store.write(BootRecord::committing(BankId::A), &mut crc).unwrap();
        }
        // Flip a bit in the active_bank word without recomputing the CRC.
        let mut raw = [0u8; 20];
        flash.read(ADDR, &mut raw);
        raw[12] ^= 0x01;
        flash.erase_sectors(ADDR, SECTOR).unwrap();
        flash.program(ADDR, &raw).unwrap();

        let store = BootRecordStore::new(&mut flash, ADDR, SECTOR);
        assert_eq!(store.read(&mut crc), Err(BootRecordError::CrcMismatch));
    }

    #[test]
    fn commit_erases_then_writes() {
        let (mut flash, mut crc) = store();
        let mut store = BootRecordStore::new(&mut flash, ADDR, SECTOR);
        store.commit(BootRecord::committing(BankId::A), &mut crc).unwrap();
        let record = store.read(&mut crc).unwrap();
        assert_eq!(record.active_bank_id(), Some(BankId::A));
    }

    #[test]
    fn bank_address_maps_correctly() {
        assert_eq!(BootRecordStore::<MockFlash>::bank_address(BankId::A), FW_A_ADDR);
        assert_eq!(BootRecordStore::<MockFlash>::bank_address(BankId::B), FW_B_ADDR);
    }

    #[test]
    fn other_toggles_bank() {
        assert_eq!(BankId::A.other(), BankId::B);
        assert_eq!(BankId::B.other(), BankId::A);
    }
}
