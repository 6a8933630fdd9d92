// Copyright 2025-2026 The html5lex Project Developers. See the
// COPYRIGHT file at the top-level directory of this distribution.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! The incremental character stream between the byte source and the
//! tokenizer.

use encoding_rs::Encoding;

use crate::buffer_queue::BufferQueue;
use crate::encoding::{Confidence, DecodeSummary, Decoder, EncodingChange};
use crate::input::ByteSource;

/// How many bytes to pull per refill.  Deliberately small: the decoder
/// must not run far ahead of the tokenizer, or a late `<meta>` charset
/// would see non-ASCII output the tokenizer never consumed and force a
/// needless restart.
const READ_CHUNK: usize = 512;

/// Decodes the byte source into the character queue on demand.
///
/// Owns every piece of decode state: the byte cursor (inside the
/// source), the incremental decoder, the running byte/output accounting
/// and the non-ASCII latch.  All of it resets together whenever the
/// encoding changes or the stream rewinds.
pub struct CharStream {
    source: ByteSource,
    decoder: Decoder,

    /// Bytes handed to the decoder since the current encoding took effect.
    bytes_fed: u64,

    /// UTF-8 length of everything the decoder has produced since then.
    utf8_emitted: u64,

    /// The decoder produced at least one non-ASCII character.  Never
    /// cleared within one encoding's lifetime.
    seen_non_ascii: bool,

    /// End-of-input flush already performed.
    flushed: bool,
}

impl CharStream {
    pub fn new(source: ByteSource, encoding: &'static Encoding, confidence: Confidence) -> Self {
        Self {
            source,
            decoder: Decoder::new(encoding, confidence),
            bytes_fed: 0,
            utf8_emitted: 0,
            seen_non_ascii: false,
            flushed: false,
        }
    }

    pub fn encoding(&self) -> &'static Encoding {
        self.decoder.encoding()
    }

    pub fn confidence(&self) -> Confidence {
        self.decoder.confidence()
    }

    /// Decode one more chunk of input into `output`.
    ///
    /// Returns false once the source is exhausted and the final flush has
    /// happened; the caller then signals end-of-input to the tokenizer.
    pub fn fill(&mut self, output: &BufferQueue) -> bool {
        if self.source.is_exhausted() {
            if self.flushed {
                return false;
            }
            self.flushed = true;
            let summary = self.decoder.decode(&[], true, output);
            self.note(summary);
            return summary.utf8_len > 0;
        }

        let chunk = self.source.read(READ_CHUNK);
        let fed = chunk.len() as u64;
        let summary = self.decoder.decode(chunk, false, output);
        self.bytes_fed += fed;
        self.note(summary);
        true
    }

    fn note(&mut self, summary: DecodeSummary) {
        self.utf8_emitted += summary.utf8_len as u64;
        if summary.saw_non_ascii {
            self.seen_non_ascii = true;
        }
    }

    /// The change-the-encoding algorithm, continued from
    /// [`Decoder::change_the_encoding_to`] with the stream-level state.
    ///
    /// `queue` must hold every decoded-but-unconsumed character,
    /// including anything the tokenizer replayed into it.
    pub fn change_encoding(
        &mut self,
        new_encoding: &'static Encoding,
        queue: &BufferQueue,
    ) -> EncodingChange {
        if self.decoder.confidence() != Confidence::Tentative {
            return EncodingChange::Ignored;
        }

        match self.decoder.change_the_encoding_to(new_encoding) {
            None => EncodingChange::Ignored,
            Some(new_encoding) => {
                if !self.seen_non_ascii {
                    // Everything decoded under the old encoding was ASCII
                    // and reads identically under the new one, so only the
                    // not-yet-consumed tail needs re-decoding.  Its byte
                    // offset is exact: one byte per unread character, plus
                    // whatever the decoder still holds internally.
                    let pending = self.bytes_fed - self.utf8_emitted;
                    let unread = queue.utf8_len() as u64;
                    let resume = self.source.pos() as u64 - pending - unread;
                    queue.clear();
                    self.reset_to(resume as usize, new_encoding, Confidence::Certain);
                    EncodingChange::Swapped(new_encoding)
                } else {
                    EncodingChange::RestartRequired(new_encoding)
                }
            },
        }
    }

    /// Rebuild the stream from the first post-BOM byte with `encoding`
    /// pinned; part of servicing a restart-required signal.
    pub fn restart(&mut self, encoding: &'static Encoding) {
        let pos = self.source.revert_token();
        self.reset_to(pos, encoding, Confidence::Certain);
    }

    fn reset_to(&mut self, pos: usize, encoding: &'static Encoding, confidence: Confidence) {
        self.source.seek(pos);
        self.decoder = Decoder::new(encoding, confidence);
        self.bytes_fed = 0;
        self.utf8_emitted = 0;
        self.seen_non_ascii = false;
        self.flushed = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::ByteSource;
    use encoding_rs::{SHIFT_JIS, UTF_8, WINDOWS_1252};

    fn drain(queue: &BufferQueue) -> String {
        let mut out = String::new();
        while let Some(c) = queue.next() {
            out.push(c);
        }
        out
    }

    fn read_all(stream: &mut CharStream, queue: &BufferQueue) -> String {
        while stream.fill(queue) {}
        drain(queue)
    }

    #[test]
    fn decodes_a_legacy_encoding() {
        // "カ" in Shift_JIS.
        let source = ByteSource::from_slice(b"a\x83\x4Bb");
        let mut stream = CharStream::new(source, SHIFT_JIS, Confidence::Tentative);
        let queue = BufferQueue::new();
        assert_eq!(read_all(&mut stream, &queue), "aカb");
        assert!(stream.seen_non_ascii);
    }

    #[test]
    fn ascii_does_not_set_the_latch() {
        let source = ByteSource::from_slice(b"plain text only");
        let mut stream = CharStream::new(source, WINDOWS_1252, Confidence::Tentative);
        let queue = BufferQueue::new();
        read_all(&mut stream, &queue);
        assert!(!stream.seen_non_ascii);
    }

    #[test]
    fn swap_in_place_re_decodes_the_unconsumed_tail() {
        // 600 ASCII bytes, then UTF-8 "é".  Consume only the first 10
        // chars before the declaration arrives.
        let mut bytes = vec![b'x'; 600];
        bytes.extend_from_slice("é".as_bytes());
        let source = ByteSource::from_slice(&bytes);
        let mut stream = CharStream::new(source, WINDOWS_1252, Confidence::Tentative);
        let queue = BufferQueue::new();
        assert!(stream.fill(&queue));
        for _ in 0..10 {
            queue.next();
        }

        let change = stream.change_encoding(UTF_8, &queue);
        assert_eq!(change, EncodingChange::Swapped(UTF_8));
        assert_eq!(stream.confidence(), Confidence::Certain);

        // Everything after the 10 consumed chars decodes again, now as
        // UTF-8, and the é survives.
        let rest = read_all(&mut stream, &queue);
        assert_eq!(rest.len(), 590 + "é".len());
        assert!(rest.ends_with('é'));
    }

    #[test]
    fn restart_required_after_non_ascii() {
        // The Ã© mojibake has already been produced under windows-1252.
        let mut bytes = "early: é then ".as_bytes().to_vec();
        bytes.extend_from_slice(b"<meta charset=utf-8>");
        let source = ByteSource::from_slice(&bytes);
        let mut stream = CharStream::new(source, WINDOWS_1252, Confidence::Tentative);
        let queue = BufferQueue::new();
        while stream.fill(&queue) {}

        let change = stream.change_encoding(UTF_8, &queue);
        assert_eq!(change, EncodingChange::RestartRequired(UTF_8));

        // Servicing the restart rebuilds from byte zero, pinned Certain.
        queue.clear();
        stream.restart(UTF_8);
        assert_eq!(stream.confidence(), Confidence::Certain);
        assert_eq!(stream.encoding(), UTF_8);
        let text = read_all(&mut stream, &queue);
        assert!(text.starts_with("early: é"));
    }

    #[test]
    fn same_label_escalates_without_restart() {
        let source = ByteSource::from_slice(b"caf\xE9 windows");
        let mut stream = CharStream::new(source, WINDOWS_1252, Confidence::Tentative);
        let queue = BufferQueue::new();
        while stream.fill(&queue) {}
        // Non-ASCII was produced, but the label matches: no restart.
        let change = stream.change_encoding(WINDOWS_1252, &queue);
        assert_eq!(change, EncodingChange::Ignored);
        assert_eq!(stream.confidence(), Confidence::Certain);
    }

    #[test]
    fn certain_stream_ignores_declarations() {
        let source = ByteSource::from_slice(b"abc");
        let mut stream = CharStream::new(source, WINDOWS_1252, Confidence::Certain);
        let queue = BufferQueue::new();
        assert_eq!(
            stream.change_encoding(UTF_8, &queue),
            EncodingChange::Ignored
        );
    }
}
