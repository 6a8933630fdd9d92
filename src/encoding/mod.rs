// Copyright 2025-2026 The html5lex Project Developers. See the
// COPYRIGHT file at the top-level directory of this distribution.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Incremental decoding and the change-the-encoding algorithm.

pub mod sniffer;

use encoding_rs::{DecoderResult, Encoding, UTF_16BE, UTF_16LE, UTF_8, WINDOWS_1252, X_USER_DEFINED};
use tendril::StrTendril;

use crate::buffer_queue::BufferQueue;

/// <https://html.spec.whatwg.org/#concept-encoding-confidence>
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Confidence {
    Tentative,
    Certain,
    Irrelevant,
}

/// Outcome of a consumer-driven encoding declaration, e.g. a late
/// `<meta charset>`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EncodingChange {
    /// The declaration changed nothing; confidence is now Certain.
    Ignored,
    /// The decoder was swapped in place.  Every byte consumed so far is
    /// ASCII and reads the same under the new encoding; tokenization
    /// continues undisturbed.
    Swapped(&'static Encoding),
    /// Bytes already interpreted cannot be trusted under the new
    /// encoding.  Everything tokenized so far is invalid and the owning
    /// pipeline must rebuild itself from the first byte, with sniffing
    /// skipped and the new encoding pinned at Certain.
    RestartRequired(&'static Encoding),
}

/// What one decode call produced, for the caller's bookkeeping.
#[derive(Clone, Copy, Debug, Default)]
pub struct DecodeSummary {
    /// UTF-8 length of the output pushed to the stream.
    pub utf8_len: usize,
    /// The output contained at least one non-ASCII character.
    pub saw_non_ascii: bool,
}

pub struct Decoder {
    inner: encoding_rs::Decoder,
    confidence: Confidence,
}

impl Decoder {
    pub fn new(encoding: &'static Encoding, confidence: Confidence) -> Self {
        Self {
            // The byte source strips any BOM before the decoder exists.
            inner: encoding.new_decoder_without_bom_handling(),
            confidence,
        }
    }

    pub fn encoding(&self) -> &'static Encoding {
        self.inner.encoding()
    }

    pub fn confidence(&self) -> Confidence {
        self.confidence
    }

    pub fn set_certain(&mut self) {
        self.confidence = Confidence::Certain;
    }

    /// Returns `None` if the encoding should not be changed and `Some(encoding)` if the current
    /// encoding should be changed to `encoding`.
    ///
    /// <https://html.spec.whatwg.org/#changing-the-encoding-while-parsing>
    pub fn change_the_encoding_to(
        &mut self,
        mut new_encoding: &'static Encoding,
    ) -> Option<&'static Encoding> {
        let current_encoding = self.inner.encoding();
        // Step 1. If the encoding that is already being used to interpret the input stream is
        // UTF-16BE/LE, then set the confidence to certain and return. The new encoding is ignored;
        // if it was anything but the same encoding, then it would be clearly incorrect.
        if current_encoding == UTF_16BE || current_encoding == UTF_16LE {
            self.confidence = Confidence::Certain;
            return None;
        }

        // Step 2. If the new encoding is UTF-16BE/LE, then change it to UTF-8.
        if new_encoding == UTF_16BE || new_encoding == UTF_16LE {
            new_encoding = UTF_8;
        }

        // Step 3. If the new encoding is x-user-defined, then change it to windows-1252.
        if new_encoding == X_USER_DEFINED {
            new_encoding = WINDOWS_1252;
        }

        // Step 4. If the new encoding is identical or equivalent to the encoding that is already
        // being used to interpret the input stream, then set the confidence to certain and return.
        if current_encoding == new_encoding {
            self.confidence = Confidence::Certain;
            return None;
        }

        // Steps 5 and 6 (swap the converter on the fly, or restart) need the
        // stream's non-ASCII latch and byte accounting; the caller decides.
        Some(new_encoding)
    }

    /// Decode the given chunk with the current encoding. The result is pushed to the end
    /// of the character stream.
    ///
    /// Malformed sequences become U+FFFD; nothing here is fatal.
    pub fn decode(&mut self, chunk: &[u8], last: bool, output: &BufferQueue) -> DecodeSummary {
        let mut summary = DecodeSummary::default();
        let mut remaining = chunk;
        loop {
            let mut out = String::new();
            let capacity = self
                .inner
                .max_utf8_buffer_length_without_replacement(remaining.len())
                .unwrap_or(8192)
                .clamp(16, 8192);
            out.reserve(capacity);

            let (result, bytes_read) =
                self.inner
                    .decode_to_string_without_replacement(remaining, &mut out, last);

            if !out.is_empty() {
                summary.utf8_len += out.len();
                if !out.is_ascii() {
                    summary.saw_non_ascii = true;
                }
                output.push_back(StrTendril::from_slice(&out));
            }

            if matches!(result, DecoderResult::Malformed(_, _)) {
                output.push_back(StrTendril::from_slice("\u{FFFD}"));
                summary.utf8_len += '\u{FFFD}'.len_utf8();
                summary.saw_non_ascii = true;
            }

            remaining = &remaining[bytes_read..];
            if remaining.is_empty() && !matches!(result, DecoderResult::OutputFull) {
                return summary;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drain(queue: &BufferQueue) -> String {
        let mut out = String::new();
        while let Some(c) = queue.next() {
            out.push(c);
        }
        out
    }

    #[test]
    fn decodes_utf8_across_chunk_boundaries() {
        let queue = BufferQueue::new();
        let mut decoder = Decoder::new(UTF_8, Confidence::Tentative);
        let bytes = "aé€b".as_bytes();
        // Split inside the two multi-byte sequences.
        decoder.decode(&bytes[..2], false, &queue);
        decoder.decode(&bytes[2..5], false, &queue);
        decoder.decode(&bytes[5..], true, &queue);
        assert_eq!(drain(&queue), "aé€b");
    }

    #[test]
    fn malformed_input_becomes_replacement_character() {
        let queue = BufferQueue::new();
        let mut decoder = Decoder::new(UTF_8, Confidence::Tentative);
        let summary = decoder.decode(b"a\xFFb", true, &queue);
        assert_eq!(drain(&queue), "a\u{FFFD}b");
        assert!(summary.saw_non_ascii);
    }

    #[test]
    fn ascii_summary_has_no_latch() {
        let queue = BufferQueue::new();
        let mut decoder = Decoder::new(WINDOWS_1252, Confidence::Tentative);
        let summary = decoder.decode(b"plain ascii", true, &queue);
        assert!(!summary.saw_non_ascii);
        assert_eq!(summary.utf8_len, "plain ascii".len());
    }

    #[test]
    fn utf16_declaration_is_never_trusted() {
        let mut decoder = Decoder::new(UTF_16BE, Confidence::Tentative);
        assert_eq!(decoder.change_the_encoding_to(UTF_8), None);
        assert_eq!(decoder.confidence(), Confidence::Certain);
    }

    #[test]
    fn utf16_target_is_coerced_to_utf8() {
        let mut decoder = Decoder::new(WINDOWS_1252, Confidence::Tentative);
        assert_eq!(decoder.change_the_encoding_to(UTF_16LE), Some(UTF_8));
    }

    #[test]
    fn same_encoding_escalates_confidence() {
        let mut decoder = Decoder::new(WINDOWS_1252, Confidence::Tentative);
        assert_eq!(decoder.change_the_encoding_to(WINDOWS_1252), None);
        assert_eq!(decoder.confidence(), Confidence::Certain);
    }

    #[test]
    fn x_user_defined_is_coerced_to_windows_1252() {
        let mut decoder = Decoder::new(WINDOWS_1252, Confidence::Tentative);
        assert_eq!(decoder.change_the_encoding_to(X_USER_DEFINED), None);
        assert_eq!(decoder.confidence(), Confidence::Certain);
    }
}
