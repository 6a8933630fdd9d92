// Copyright 2025-2026 The html5lex Project Developers. See the
// COPYRIGHT file at the top-level directory of this distribution.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! The seekable byte source feeding the decoder.

use encoding_rs::Encoding;
use tendril::{fmt, Tendril};

use crate::encoding::sniffer;

pub type ByteTendril = Tendril<fmt::Bytes>;

/// A seekable byte sequence with BOM handling.
///
/// BOM detection happens once, at construction: a three-byte peek that,
/// on a match, permanently consumes the BOM and pins the encoding over
/// every other resolution step.  On no match nothing is consumed.  The
/// position just after the BOM is the *revert token*: a restarted parse
/// seeks back to it no matter how far reading has progressed.
pub struct ByteSource {
    bytes: ByteTendril,
    pos: usize,
    bom: Option<&'static Encoding>,
    body_start: usize,
}

impl ByteSource {
    pub fn new(bytes: ByteTendril) -> ByteSource {
        let (bom, body_start) = match sniffer::detect_bom(&bytes) {
            Some((encoding, len)) => (Some(encoding), len),
            None => (None, 0),
        };
        ByteSource {
            bytes,
            pos: body_start,
            bom,
            body_start,
        }
    }

    pub fn from_slice(bytes: &[u8]) -> ByteSource {
        ByteSource::new(Tendril::from_slice(bytes))
    }

    /// The encoding pinned by a byte order mark, if one was found.
    pub fn bom_encoding(&self) -> Option<&'static Encoding> {
        self.bom
    }

    /// The position immediately after BOM handling.  Seeking here rewinds
    /// the source to the state the pre-scan saw, regardless of how many
    /// bytes have been read since.
    pub fn revert_token(&self) -> usize {
        self.body_start
    }

    pub fn pos(&self) -> usize {
        self.pos
    }

    pub fn seek(&mut self, pos: usize) {
        debug_assert!(pos >= self.body_start && pos <= self.bytes.len());
        self.pos = pos;
    }

    /// Look at up to `max` bytes from the current position without
    /// consuming them.  The pre-scan samples its window through this.
    pub fn peek_prefix(&self, max: usize) -> &[u8] {
        let end = (self.pos + max).min(self.bytes.len());
        &self.bytes[self.pos..end]
    }

    /// Consume and return up to `max` bytes.
    pub fn read(&mut self, max: usize) -> &[u8] {
        let start = self.pos;
        let end = (start + max).min(self.bytes.len());
        self.pos = end;
        &self.bytes[start..end]
    }

    pub fn is_exhausted(&self) -> bool {
        self.pos >= self.bytes.len()
    }
}

#[cfg(test)]
mod tests {
    use super::ByteSource;
    use encoding_rs::{UTF_16LE, UTF_8};

    #[test]
    fn bom_is_consumed_and_pins_the_encoding() {
        let mut source = ByteSource::from_slice(b"\xEF\xBB\xBFhello");
        assert_eq!(source.bom_encoding(), Some(UTF_8));
        assert_eq!(source.revert_token(), 3);
        assert_eq!(source.read(5), b"hello");
    }

    #[test]
    fn no_bom_leaves_bytes_unread() {
        let mut source = ByteSource::from_slice(b"hello");
        assert_eq!(source.bom_encoding(), None);
        assert_eq!(source.revert_token(), 0);
        assert_eq!(source.read(5), b"hello");
    }

    #[test]
    fn utf16le_bom() {
        let source = ByteSource::from_slice(b"\xFF\xFEh\x00");
        assert_eq!(source.bom_encoding(), Some(UTF_16LE));
        assert_eq!(source.peek_prefix(2), b"h\x00");
    }

    #[test]
    fn revert_token_survives_reads() {
        let mut source = ByteSource::from_slice(b"\xEF\xBB\xBFabcdef");
        source.read(4);
        assert_eq!(source.pos(), 7);
        let token = source.revert_token();
        source.seek(token);
        assert_eq!(source.read(6), b"abcdef");
    }

    #[test]
    fn peek_does_not_consume() {
        let mut source = ByteSource::from_slice(b"abc");
        assert_eq!(source.peek_prefix(1024), b"abc");
        assert_eq!(source.read(3), b"abc");
        assert!(source.is_exhausted());
    }
}
