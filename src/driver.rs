// Copyright 2025-2026 The html5lex Project Developers. See the
// COPYRIGHT file at the top-level directory of this distribution.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! High-level interface to the lexer: the pipeline owner.
//!
//! A [`Parser`] wires byte source → encoding resolution → character
//! stream → tokenizer, and owns the one feedback edge: the consumer
//! reports `<meta>` charset declarations through
//! [`Parser::change_encoding`]; a [`RestartRequired`] answer means every
//! token seen so far is invalid, and [`Parser::restart`] rebuilds the
//! pipeline from the first byte with sniffing skipped.
//!
//! [`RestartRequired`]: EncodingChange::RestartRequired

use encoding_rs::Encoding;
use tendril::StrTendril;

use crate::buffer_queue::BufferQueue;
use crate::encoding::sniffer::{self, PRESCAN_BYTES};
use crate::encoding::{Confidence, EncodingChange};
use crate::input::ByteSource;
use crate::stream::CharStream;
use crate::tokenizer::states::RawKind;
use crate::tokenizer::{ParseError, StartTag, TagToken, Token, Tokenizer, TokenizerOpts};

/// All-encompassing options struct for the parser.
#[derive(Clone, Default)]
pub struct ParseOpts {
    /// Tokenizer options.
    pub tokenizer: TokenizerOpts,

    /// An out-of-band (transport layer) character set label, e.g. from a
    /// Content-Type header.
    pub transport_charset: Option<String>,

    /// Treat the transport charset as authoritative: Certain confidence,
    /// sniffing skipped entirely.
    pub enforce_charset: bool,

    /// BCP 47-ish language tag for the legacy-encoding fallback table.
    pub locale: Option<String>,
}

/// One pull from the pipeline.
#[derive(Debug, PartialEq, Eq)]
pub enum ParserStep {
    Token(Token),
    /// The final `EndOfFile` token has already been delivered.
    Done,
}

pub struct Parser {
    stream: Option<CharStream>,
    queue: BufferQueue,
    tokenizer: Tokenizer,
    tokenizer_opts: TokenizerOpts,
}

impl Parser {
    /// Parse from raw bytes, resolving the encoding first: BOM, then
    /// transport label, then the byte-level pre-scan, then the locale
    /// fallback.
    pub fn from_bytes(bytes: &[u8], opts: ParseOpts) -> Parser {
        let source = ByteSource::from_slice(bytes);

        let (encoding, confidence) = match source.bom_encoding() {
            // The BOM overrides every other step.
            Some(encoding) => (encoding, Confidence::Certain),
            None => {
                let transport = opts.transport_charset.as_deref();
                let locale = opts.locale.as_deref();
                if opts.enforce_charset {
                    let encoding = transport
                        .and_then(|label| Encoding::for_label(label.as_bytes()))
                        .unwrap_or_else(|| sniffer::locale_default(locale));
                    (encoding, Confidence::Certain)
                } else {
                    sniffer::determine_encoding(source.peek_prefix(PRESCAN_BYTES), transport, locale)
                }
            },
        };

        Parser {
            stream: Some(CharStream::new(source, encoding, confidence)),
            queue: BufferQueue::new(),
            tokenizer: Tokenizer::new(opts.tokenizer.clone()),
            tokenizer_opts: opts.tokenizer,
        }
    }

    /// Parse a pre-decoded string.  No byte-level sniffing applies and
    /// the encoding confidence is fixed at Irrelevant; calling
    /// [`change_encoding`] on such a parser is a programming error.
    ///
    /// [`change_encoding`]: Parser::change_encoding
    pub fn from_string(input: StrTendril, opts: TokenizerOpts) -> Parser {
        let queue = BufferQueue::new();
        queue.push_back(input);
        Parser {
            stream: None,
            queue,
            tokenizer: Tokenizer::new(opts.clone()),
            tokenizer_opts: opts,
        }
    }

    /// Pull the next token.  Blocks only on the underlying source's own
    /// synchronous reads.
    pub fn next(&mut self) -> ParserStep {
        loop {
            if let Some(token) = self.tokenizer.next_token(&self.queue) {
                return ParserStep::Token(token);
            }
            if let Some(stream) = self.stream.as_mut() {
                if stream.fill(&self.queue) {
                    continue;
                }
            }
            if !self.tokenizer.is_ended() {
                self.tokenizer.end(&self.queue);
                continue;
            }
            return ParserStep::Done;
        }
    }

    /// The consumer saw an in-document encoding declaration (the
    /// feedback edge from the tree-construction stage).
    ///
    /// An unknown label is ignored.  [`EncodingChange::RestartRequired`]
    /// must be serviced with [`Parser::restart`] before pulling again.
    pub fn change_encoding(&mut self, label: &str) -> EncodingChange {
        let stream = self
            .stream
            .as_mut()
            .expect("cannot change the encoding of a pre-decoded string input");
        let Some(encoding) = Encoding::for_label(label.as_bytes()) else {
            return EncodingChange::Ignored;
        };
        // Everything replayable has to sit in the queue for the byte
        // accounting to be exact.
        self.tokenizer.flush_pushback(&self.queue);
        stream.change_encoding(encoding, &self.queue)
    }

    /// Rebuild the whole pipeline from the first post-BOM byte with
    /// `encoding` pinned at Certain, sniffing skipped.  Tokens and errors
    /// delivered before this call are void.
    pub fn restart(&mut self, encoding: &'static Encoding) {
        let stream = self
            .stream
            .as_mut()
            .expect("cannot restart a pre-decoded string input");
        stream.restart(encoding);
        self.queue.clear();
        self.tokenizer = Tokenizer::new(self.tokenizer_opts.clone());
    }

    pub fn acknowledge_self_closing_tag(&self) {
        self.tokenizer.acknowledge_self_closing_tag();
    }

    /// Content-model seam for the tree-construction stage.
    pub fn switch_raw_data(&self, kind: RawKind) {
        self.tokenizer.switch_raw_data(kind);
    }

    /// Content-model seam for the tree-construction stage.
    pub fn set_plaintext_state(&self) {
        self.tokenizer.set_plaintext_state();
    }

    /// Drain the parse-error side channel.
    pub fn take_errors(&self) -> Vec<ParseError> {
        self.tokenizer.take_errors()
    }

    pub fn encoding(&self) -> Option<&'static Encoding> {
        self.stream.as_ref().map(CharStream::encoding)
    }

    pub fn confidence(&self) -> Confidence {
        self.stream
            .as_ref()
            .map_or(Confidence::Irrelevant, CharStream::confidence)
    }
}

fn collect(parser: &mut Parser) -> (Vec<Token>, Vec<ParseError>) {
    let mut tokens = vec![];
    loop {
        match parser.next() {
            ParserStep::Token(token) => {
                if let TagToken(ref tag) = token {
                    // Stand in for the tree builder's acknowledgement.
                    if tag.kind == StartTag && tag.self_closing {
                        parser.acknowledge_self_closing_tag();
                    }
                }
                tokens.push(token);
            },
            ParserStep::Done => break,
        }
    }
    (tokens, parser.take_errors())
}

/// Convenience: tokenize a byte buffer to completion.
///
/// This runs without a tree-construction stage, so no in-document
/// encoding declarations are acted on; use [`Parser`] directly for the
/// full feedback loop.
pub fn tokenize_bytes(bytes: &[u8], opts: ParseOpts) -> (Vec<Token>, Vec<ParseError>) {
    let mut parser = Parser::from_bytes(bytes, opts);
    collect(&mut parser)
}

/// Convenience: tokenize a pre-decoded string to completion.
pub fn tokenize_string(input: StrTendril, opts: TokenizerOpts) -> (Vec<Token>, Vec<ParseError>) {
    let mut parser = Parser::from_string(input, opts);
    collect(&mut parser)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tokenizer::{CharacterToken, EOFToken};
    use encoding_rs::{SHIFT_JIS, UTF_8, WINDOWS_1252};

    #[test]
    fn bom_yields_certain_and_is_excluded() {
        let mut parser = Parser::from_bytes(b"\xEF\xBB\xBFhi", ParseOpts::default());
        assert_eq!(parser.confidence(), Confidence::Certain);
        assert_eq!(parser.encoding(), Some(UTF_8));
        assert_eq!(parser.next(), ParserStep::Token(CharacterToken('h')));
    }

    #[test]
    fn meta_prescan_resolves_tentatively() {
        let parser = Parser::from_bytes(b"<meta charset=\"shift_jis\">x", ParseOpts::default());
        assert_eq!(parser.encoding(), Some(SHIFT_JIS));
        assert_eq!(parser.confidence(), Confidence::Tentative);
    }

    #[test]
    fn transport_charset_is_certain() {
        let opts = ParseOpts {
            transport_charset: Some("iso-8859-1".to_string()),
            ..Default::default()
        };
        let parser = Parser::from_bytes(b"<meta charset=utf-8>", opts);
        assert_eq!(parser.encoding(), Some(WINDOWS_1252));
        assert_eq!(parser.confidence(), Confidence::Certain);
    }

    #[test]
    fn fallback_is_windows_1252() {
        let parser = Parser::from_bytes(b"<p>hi</p>", ParseOpts::default());
        assert_eq!(parser.encoding(), Some(WINDOWS_1252));
        assert_eq!(parser.confidence(), Confidence::Tentative);
    }

    #[test]
    fn string_input_is_irrelevant() {
        let mut parser = Parser::from_string(StrTendril::from("hi"), TokenizerOpts::default());
        assert_eq!(parser.confidence(), Confidence::Irrelevant);
        assert_eq!(parser.encoding(), None);
        assert_eq!(parser.next(), ParserStep::Token(CharacterToken('h')));
    }

    #[test]
    #[should_panic(expected = "pre-decoded string input")]
    fn changing_encoding_of_string_input_panics() {
        let mut parser = Parser::from_string(StrTendril::from("hi"), TokenizerOpts::default());
        parser.change_encoding("utf-8");
    }

    #[test]
    fn done_after_eof_and_never_another_eof() {
        let (tokens, _) = tokenize_bytes(b"x", ParseOpts::default());
        assert_eq!(tokens, vec![CharacterToken('x'), EOFToken]);

        let mut parser = Parser::from_bytes(b"x", ParseOpts::default());
        while parser.next() != ParserStep::Done {}
        assert_eq!(parser.next(), ParserStep::Done);
        assert_eq!(parser.next(), ParserStep::Done);
    }

    #[test]
    fn string_input_skips_a_leading_bom_character() {
        let (tokens, _) =
            tokenize_string(StrTendril::from("\u{feff}x"), TokenizerOpts::default());
        assert_eq!(tokens, vec![CharacterToken('x'), EOFToken]);
    }
}
