// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Protocol and flash-layout constants. Sender and receiver must agree on
//! every value here; none of it is negotiated on the wire.

/// Firmware data chunk size, in bytes. The final chunk of an image may be
/// shorter; every other chunk must be exactly this size.
pub const CHUNK_SIZE: usize = 1024;

/// Size of each of the two firmware banks, in bytes.
pub const BANK_SIZE: u32 = 262_144;

/// Magic value at the head of START/END/ACK/NACK/ABORT packets.
pub const OTA_MAGIC_START: u32 = 0xAA55_AA55;

/// Magic value at the head of DATA packets.
pub const OTA_MAGIC_DATA: u32 = 0x55AA_55AA;

/// Magic value identifying a valid boot record.
pub const BOOT_STATE_MAGIC: u32 = 0xDEAD_BEEF;

/// Flash region base address (RP2040 XIP-mapped flash).
pub const FLASH_BASE: u32 = 0x1000_0000;

/// Base address of firmware bank A.
pub const FW_A_ADDR: u32 = 0x1002_0000;

/// Base address of firmware bank B.
pub const FW_B_ADDR: u32 = FW_A_ADDR + BANK_SIZE;

/// Base address of the dedicated boot record sector.
pub const BOOT_RECORD_ADDR: u32 = FW_B_ADDR + BANK_SIZE;

/// Flash erase granularity, in bytes.
pub const FLASH_SECTOR_SIZE: u32 = 4096;

/// Flash program granularity, in bytes (one machine word).
pub const FLASH_WORD_SIZE: u32 = 4;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn banks_do_not_overlap() {
        assert!(FW_B_ADDR >= FW_A_ADDR + BANK_SIZE);
        assert!(BOOT_RECORD_ADDR >= FW_B_ADDR + BANK_SIZE);
    }

    #[test]
    fn bank_size_is_sector_aligned() {
        assert_eq!(BANK_SIZE % FLASH_SECTOR_SIZE, 0);
    }

    #[test]
    fn chunk_size_fits_a_bank() {
        assert!(CHUNK_SIZE as u32 <= BANK_SIZE);
    }
}
