// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Flash driver abstraction.
//!
//! Hides word-alignment and tail-padding behind a small trait so the boot
//! record store and session state machine can be exercised without real
//! hardware, the way the teacher keeps its boot-selection FSM hardware-free.

use crate::error::OtaError;

/// Value of an erased flash word/byte on this target.
pub const ERASED_BYTE: u8 = 0xFF;

/// A flash device exposing sector erase and word program, with the
/// erase-before-write / word-alignment / tail-padding contract from the
/// flash driver component.
///
/// # Contract
/// The target range of a `program` call must have been erased since the
/// last program to each touched word; violating this is undefined on real
/// hardware and is reported here as [`OtaError::Flash`] by conforming
/// implementations that can detect it (the in-memory test double does).
/// Implementations must bracket every operation with their hardware's
/// unlock/lock sequence and release the lock on every exit path, including
/// on error.
pub trait FlashDevice {
    /// Erase every sector touched by `[address, address + len)`.
    fn erase_sectors(&mut self, address: u32, len: u32) -> Result<(), OtaError>;

    /// Program `bytes` starting at `address`, which must be word-aligned.
    /// If `bytes.len()` is not a multiple of the flash word size, the final
    /// word is assembled by copying the trailing bytes into a word
    /// initialized to the erased value, so a later program into the same
    /// word remains legal.
    fn program(&mut self, address: u32, bytes: &[u8]) -> Result<(), OtaError>;

    /// Read `buf.len()` bytes starting at `address`.
    fn read(&self, address: u32, buf: &mut [u8]);
}

/// RP2040 XIP flash backed [`FlashDevice`], unlocking/relocking XIP around
/// every erase and program the way the bootloader's hardware flash access
/// always has: disable interrupts, connect the flash controller and leave
/// XIP, issue the ROM call, flush the cache and re-enter XIP, re-enable
/// interrupts — on every exit path, including the early return on a
/// misaligned address.
#[cfg(feature = "embedded")]
pub mod rp2040 {
    use super::*;
    use crate::config::FLASH_BASE;

    /// SECTOR_ERASE command byte passed to the ROM's `flash_range_erase`.
    const SECTOR_ERASE_CMD: u8 = 0x20;

    pub struct Rp2040Flash;

    impl Rp2040Flash {
        pub fn new() -> Self {
            Self
        }
    }

    impl Default for Rp2040Flash {
        fn default() -> Self {
            Self::new()
        }
    }

    impl FlashDevice for Rp2040Flash {
        fn erase_sectors(&mut self, address: u32, len: u32) -> Result<(), OtaError> {
            let offset = address.checked_sub(FLASH_BASE).ok_or(OtaError::Flash)?;
            cortex_m::interrupt::free(|_| unsafe {
                rp2040_hal::rom_data::connect_internal_flash();
                rp2040_hal::rom_data::flash_exit_xip();
                rp2040_hal::rom_data::flash_range_erase(
                    offset,
                    len as usize,
                    crate::config::FLASH_SECTOR_SIZE,
                    SECTOR_ERASE_CMD,
                );
                rp2040_hal::rom_data::flash_flush_cache();
                rp2040_hal::rom_data::flash_enter_cmd_xip();
            });
            Ok(())
        }

        fn program(&mut self, address: u32, bytes: &[u8]) -> Result<(), OtaError> {
            let offset = address.checked_sub(FLASH_BASE).ok_or(OtaError::Flash)?;
            if offset % crate::config::FLASH_WORD_SIZE != 0 {
                return Err(OtaError::Flash);
            }

            let word = crate::config::FLASH_WORD_SIZE as usize;
            let word_len = bytes.len() - (bytes.len() % word);
            let mut tail = [ERASED_BYTE; 4];
            let has_tail = word_len < bytes.len();
            if has_tail {
                tail[..bytes.len() - word_len].copy_from_slice(&bytes[word_len..]);
            }

            cortex_m::interrupt::free(|_| unsafe {
                rp2040_hal::rom_data::connect_internal_flash();
                rp2040_hal::rom_data::flash_exit_xip();
                rp2040_hal::rom_data::flash_range_program(offset, bytes.as_ptr(), word_len);
                if has_tail {
                    rp2040_hal::rom_data::flash_range_program(
                        offset + word_len as u32,
                        tail.as_ptr(),
                        word,
                    );
                }
                rp2040_hal::rom_data::flash_flush_cache();
                rp2040_hal::rom_data::flash_enter_cmd_xip();
            });
            Ok(())
        }

        fn read(&self, address: u32, buf: &mut [u8]) {
            let src = unsafe { core::slice::from_raw_parts(address as *const u8, buf.len()) };
            buf.copy_from_slice(src);
        }
    }
}

/// In-memory [`FlashDevice`] test double used by `ota-common`'s own test
/// suite and available to downstream crates under the `std` feature for
/// host-side simulation. Tracks per-word erased state so a program into a
/// non-erased word surfaces as [`OtaError::Flash`], matching the real
/// hardware's undefined-behavior-on-violation contract with a detectable
/// error instead.
#[cfg(feature = "std")]
pub mod testing {
    use super::*;
    use std::vec;
    use std::vec::Vec;

    pub struct MockFlash {
        base: u32,
        sector_size: u32,
        word_size: u32,
        data: Vec<u8>,
        erased: Vec<bool>,
    }

    impl MockFlash {
        pub fn new(base: u32, size: u32, sector_size: u32, word_size: u32) -> Self {
            Self {
                base,
                sector_size,
                word_size,
                data: vec![ERASED_BYTE; size as usize],
                erased: vec![true; (size / word_size) as usize],
            }
        }

        fn offset(&self, address: u32) -> usize {
            (address - self.base) as usize
        }

        pub fn read_slice(&self, address: u32, len: u32) -> &[u8] {
            let off = self.offset(address);
            &self.data[off..off + len as usize]
        }
    }

    impl FlashDevice for MockFlash {
        fn erase_sectors(&mut self, address: u32, len: u32) -> Result<(), OtaError> {
            let start = self.offset(address);
            let sector = self.sector_size as usize;
            let end = start + len.div_ceil(self.sector_size) as usize * sector;
            for b in &mut self.data[start..end] {
                *b = ERASED_BYTE;
            }
            let word = self.word_size as usize;
            for w in &mut self.erased[start / word..end / word] {
                *w = true;
            }
            Ok(())
        }

        fn program(&mut self, address: u32, bytes: &[u8]) -> Result<(), OtaError> {
            let word = self.word_size as usize;
            let start = self.offset(address);
            if start % word != 0 {
                return Err(OtaError::Flash);
            }

            let word_len = bytes.len() - (bytes.len() % word);
            for (i, chunk) in bytes[..word_len].chunks(word).enumerate() {
                let widx = start / word + i;
                if !self.erased[widx] {
                    return Err(OtaError::Flash);
                }
                self.data[start + i * word..start + i * word + word].copy_from_slice(chunk);
                self.erased[widx] = false;
            }

            if word_len < bytes.len() {
                let tail = &bytes[word_len..];
                let mut padded = vec![ERASED_BYTE; word];
                padded[..tail.len()].copy_from_slice(tail);
                let widx = start / word + word_len / word;
                if !self.erased[widx] {
                    return Err(OtaError::Flash);
                }
                let off = start + word_len;
                self.data[off..off + word].copy_from_slice(&padded);
                self.erased[widx] = false;
            }

            Ok(())
        }

        fn read(&self, address: u32, buf: &mut [u8]) {
            let off = self.offset(address);
            buf.copy_from_slice(&self.data[off..off + buf.len()]);
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn fresh_flash_reads_as_erased() {
            let flash = MockFlash::new(0x1000_0000, 4096, 4096, 4);
            let mut buf = [0u8; 16];
            flash.read(0x1000_0000, &mut buf);
            assert!(buf.iter().all(|&b| b == ERASED_BYTE));
        }

        #[test]
        fn program_then_read_roundtrips() {
            let mut flash = MockFlash::new(0x1000_0000, 4096, 4096, 4);
            flash.erase_sectors(0x1000_0000, 4096).unwrap();
            flash.program(0x1000_0000, &[1, 2, 3, 4]).unwrap();
            let mut buf = [0u8; 4];
            flash.read(0x1000_0000, &mut buf);
            assert_eq!(buf, [1, 2, 3, 4]);
        }

        #[test]
        fn program_without_erase_fails() {
            let mut flash = MockFlash::new(0x1000_0000, 4096, 4096, 4);
            flash.program(0x1000_0000, &[1, 2, 3, 4]).unwrap();
            assert_eq!(
                flash.program(0x1000_0000, &[5, 6, 7, 8]),
                Err(OtaError::Flash)
            );
        }

        #[test]
        fn tail_padding_preserves_erased_value() {
            let mut flash = MockFlash::new(0x1000_0000, 4096, 4096, 4);
            flash.erase_sectors(0x1000_0000, 4096).unwrap();
            flash.program(0x1000_0000, &[1, 2, 3]).unwrap();
            let mut buf = [0u8; 4];
            flash.read(0x1000_0000, &mut buf);
            assert_eq!(buf, [1, 2, 3, ERASED_BYTE]);
        }

        #[test]
        fn erase_resets_erased_tracking() {
            let mut flash = MockFlash::new(0x1000_0000, 4096, 4096, 4);
            flash.erase_sectors(0x1000_0000, 4096).unwrap();
            flash.program(0x1000_0000, &[1, 2, 3, 4]).unwrap();
            flash.erase_sectors(0x1000_0000, 4096).unwrap();
            flash.program(0x1000_0000, &[9, 9, 9, 9]).unwrap();
            let mut buf = [0u8; 4];
            flash.read(0x1000_0000, &mut buf);
            assert_eq!(buf, [9, 9, 9, 9]);
        }
    }
}
