// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Streaming CRC-32 engine.
//!
//! The target's hardware CRC unit only accepts whole 32-bit words; a
//! trailing partial word is fed with its missing bytes zero-padded. This
//! module defines that contract as a trait (`CrcEngine`) plus a portable
//! software implementation (`SoftwareCrc32`) so the sender (host CLI) and
//! receiver (bootloader) compute byte-identical results without either one
//! touching real hardware. `ota-bootloader` additionally wires a
//! hardware-CRC-unit-backed impl behind the `embedded` feature.

const POLY: u32 = 0xEDB8_8320;

/// A streaming CRC-32 accumulator, mirroring the target's hardware CRC
/// peripheral: reset, feed whole words, feed a zero-padded trailing partial
/// word, read the accumulated result.
pub trait CrcEngine {
    /// Reset the accumulator to its initial seed. Must be called before each
    /// independent CRC computation (chunk CRC, whole-image CRC, boot-record
    /// CRC all share one engine instance across a session).
    fn reset(&mut self);

    /// Feed `n` word-aligned little-endian 32-bit words read from `data`.
    /// `data.len()` must be a multiple of 4.
    fn feed_words(&mut self, data: &[u8]);

    /// Feed 0–3 trailing bytes, zero-padded to a full word before being fed
    /// through the same per-word update as `feed_words`.
    fn feed_trailing(&mut self, bytes: &[u8]);

    /// Feed an arbitrary-length byte slice, automatically splitting it into
    /// whole words plus a zero-padded trailing remainder.
    fn feed(&mut self, data: &[u8]) {
        let word_len = data.len() - (data.len() % 4);
        self.feed_words(&data[..word_len]);
        if word_len < data.len() {
            self.feed_trailing(&data[word_len..]);
        }
    }

    /// Read the accumulated CRC-32 value.
    fn read(&self) -> u32;
}

/// Portable, `no_std` CRC-32/ISO-HDLC-style streaming implementation: seed
/// 0xFFFF_FFFF, reflected polynomial 0xEDB8_8320, final complement. Word
/// feeding processes each word as its four constituent little-endian bytes,
/// in order — mathematically identical to feeding the raw byte stream, so
/// this is also the reference other engines (and tests) must match.
#[derive(Debug, Clone, Copy)]
pub struct SoftwareCrc32 {
    state: u32,
}

impl SoftwareCrc32 {
    pub const fn new() -> Self {
        Self { state: 0xFFFF_FFFF }
    }

    fn update_byte(&mut self, byte: u8) {
        let mut crc = self.state ^ byte as u32;
        for _ in 0..8 {
            let mask = (crc & 1).wrapping_neg();
            crc = (crc >> 1) ^ (POLY & mask);
        }
        self.state = crc;
    }
}

impl Default for SoftwareCrc32 {
    fn default() -> Self {
        Self::new()
    }
}

impl CrcEngine for SoftwareCrc32 {
    fn reset(&mut self) {
        self.state = 0xFFFF_FFFF;
    }

    fn feed_words(&mut self, data: &[u8]) {
        debug_assert_eq!(data.len() % 4, 0);
        for &byte in data {
            self.update_byte(byte);
        }
    }

    fn feed_trailing(&mut self, bytes: &[u8]) {
        debug_assert!(bytes.len() < 4);
        let mut word = [0u8; 4];
        word[..bytes.len()].copy_from_slice(bytes);
        for &byte in &word {
            self.update_byte(byte);
        }
    }

    fn read(&self) -> u32 {
        !self.state
    }
}

/// Compute the CRC-32 of a byte slice in one shot, using the same streaming
/// contract (word feed + zero-padded trailing remainder) every caller in
/// this codebase must use.
pub fn crc32(data: &[u8]) -> u32 {
    let mut engine = SoftwareCrc32::new();
    engine.feed(data);
    engine.read()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input() {
        assert_eq!(crc32(&[]), 0);
    }

    #[test]
    fn known_ascii_vector_word_aligned() {
        // "1234" is 4 bytes, word-aligned; CRC-32/ISO-HDLC("1234") = 0x9BE3E0A3.
        assert_eq!(crc32(b"1234"), 0x9BE3_E0A3);
    }

    #[test]
    fn reset_allows_reuse_of_one_engine() {
        let mut engine = SoftwareCrc32::new();
        engine.feed(b"1234");
        let first = engine.read();
        engine.reset();
        engine.feed(b"1234");
        assert_eq!(engine.read(), first);
    }

    #[test]
    fn trailing_bytes_change_result_vs_word_aligned_prefix() {
        let full = crc32(b"1234");
        let partial = crc32(b"123");
        assert_ne!(full, partial);
    }

    #[test]
    fn streaming_in_pieces_matches_one_shot() {
        let mut engine = SoftwareCrc32::new();
        engine.feed(b"12");
        engine.feed(b"34");
        let streamed = engine.read();
        assert_eq!(streamed, crc32(b"1234"));
    }

    #[test]
    fn feed_words_then_trailing_matches_feed() {
        let data = b"hello world!"; // 12 bytes: 3 words exactly
        let mut a = SoftwareCrc32::new();
        a.feed(data);

        let mut b = SoftwareCrc32::new();
        b.feed_words(&data[..12]);
        assert_eq!(a.read(), b.read());
    }

    #[test]
    fn odd_length_uses_feed_trailing() {
        let data = b"hello!"; // 6 bytes: 1 word + 2 trailing
        let mut a = SoftwareCrc32::new();
        a.feed_words(&data[..4]);
        a.feed_trailing(&data[4..]);

        let mut b = SoftwareCrc32::new();
        b.feed(data);

        assert_eq!(a.read(), b.read());
    }
}
