// Copyright 2025-2026 The html5lex Project Developers. See the
// COPYRIGHT file at the top-level directory of this distribution.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! End-to-end tests of the encoding pipeline: sniffing, the `<meta>`
//! feedback edge, in-place swaps and full restarts.

use encoding_rs::{Encoding, SHIFT_JIS, UTF_8, UTF_16LE, WINDOWS_1252};
use html5lex::driver::{ParseOpts, Parser, ParserStep};
use html5lex::{Confidence, EncodingChange, StartTag, TagToken, Token};

/// Drive the parser the way a tree builder would: collect character
/// data, act on `<meta charset>` declarations, service restarts.
/// Returns the text plus how many restarts happened.
fn parse_document(bytes: &[u8], opts: ParseOpts) -> (Parser, String, u32) {
    let mut parser = Parser::from_bytes(bytes, opts);
    let mut restarts = 0;
    'attempt: loop {
        let mut text = String::new();
        loop {
            match parser.next() {
                ParserStep::Token(TagToken(tag)) => {
                    if tag.kind == StartTag && &*tag.name == "meta" {
                        if let Some(charset) = tag.attribute("charset") {
                            let charset = charset.to_string();
                            if let EncodingChange::RestartRequired(encoding) =
                                parser.change_encoding(&charset)
                            {
                                parser.restart(encoding);
                                restarts += 1;
                                continue 'attempt;
                            }
                        }
                    }
                },
                ParserStep::Token(Token::CharacterToken(c)) => text.push(c),
                ParserStep::Token(_) => {},
                ParserStep::Done => return (parser, text, restarts),
            }
        }
    }
}

#[test]
fn meta_prescan_decodes_shift_jis() {
    // "カ" (0x83 0x4B) after a sniffable meta within the first KiB.
    let mut bytes = b"<meta charset=shift_jis><p>".to_vec();
    bytes.extend_from_slice(b"\x83\x4B");
    bytes.extend_from_slice(b"</p>");
    let (parser, text, restarts) = parse_document(&bytes, ParseOpts::default());
    assert_eq!(text, "\u{30ab}");
    assert_eq!(restarts, 0);
    assert_eq!(parser.encoding(), Some(SHIFT_JIS));
    // The in-document declaration matched what sniffing found.
    assert_eq!(parser.confidence(), Confidence::Certain);
}

#[test]
fn late_meta_swaps_in_place_while_ascii() {
    // The é sits far enough in that the decoder has not reached it when
    // the meta tag is tokenized; everything decoded so far is ASCII, so
    // the declaration swaps the decoder with no restart.
    let mut bytes = b"<meta charset=utf-8>".to_vec();
    bytes.extend_from_slice(&vec![b'x'; 900]);
    bytes.extend_from_slice("é".as_bytes());
    let opts = ParseOpts {
        transport_charset: Some("iso-8859-1".to_string()),
        ..Default::default()
    };
    // A transport charset is Certain, which would pin the encoding; test
    // the tentative path by sniffing nothing and falling back instead.
    assert_eq!(
        Parser::from_bytes(&bytes, opts).confidence(),
        Confidence::Certain
    );

    let parser = Parser::from_bytes(&bytes, ParseOpts::default());
    // Prescan already saw the meta, so this run starts as UTF-8; force
    // the interesting case with a pre-scan-invisible declaration.
    assert_eq!(parser.encoding(), Some(UTF_8));
    drop(parser);

    // Hide the meta from the prescan by pushing it past the 1 KiB
    // window; the tokenizer still sees it.
    let mut bytes = vec![b' '; 1100];
    bytes.extend_from_slice(b"<meta charset=utf-8>");
    bytes.extend_from_slice(&vec![b'x'; 900]);
    bytes.extend_from_slice("é".as_bytes());
    let (parser, text, restarts) = parse_document(&bytes, ParseOpts::default());
    assert_eq!(restarts, 0, "ASCII-only prefix must not force a restart");
    assert_eq!(parser.encoding(), Some(UTF_8));
    assert_eq!(parser.confidence(), Confidence::Certain);
    assert!(text.ends_with('é'), "tail must be re-decoded as UTF-8");
}

#[test]
fn late_meta_after_non_ascii_forces_restart() {
    // Mojibake was already produced under windows-1252 by the time the
    // declaration shows up: the whole parse runs again from byte zero.
    let mut bytes = vec![b' '; 1100]; // hide the meta from the prescan
    bytes.extend_from_slice("<p>é</p>".as_bytes());
    bytes.extend_from_slice(b"<meta charset=utf-8><p>done</p>");
    let (parser, text, restarts) = parse_document(&bytes, ParseOpts::default());
    assert_eq!(restarts, 1);
    assert_eq!(parser.encoding(), Some(UTF_8));
    assert_eq!(parser.confidence(), Confidence::Certain);
    assert!(text.contains('é'), "second pass decodes the é correctly");
    assert!(text.contains("done"));
    assert!(!text.contains('\u{c3}'), "no mojibake survives the restart");
}

#[test]
fn second_pass_declaration_is_ignored_at_certain() {
    let mut bytes = "é ".as_bytes().to_vec();
    bytes.extend_from_slice(&vec![b' '; 1100]);
    bytes.extend_from_slice(b"<meta charset=utf-8>x");
    // One restart; the second encounter with the meta happens at
    // Certain confidence and is ignored rather than looping forever.
    let (_, text, restarts) = parse_document(&bytes, ParseOpts::default());
    assert_eq!(restarts, 1);
    assert!(text.starts_with('é'));
}

#[test]
fn utf16le_bom_overrides_transport() {
    // "hi" in UTF-16LE behind its BOM; the transport label loses.
    let bytes = b"\xFF\xFEh\x00i\x00";
    let opts = ParseOpts {
        transport_charset: Some("shift_jis".to_string()),
        ..Default::default()
    };
    let (parser, text, restarts) = parse_document(bytes, opts);
    assert_eq!(text, "hi");
    assert_eq!(restarts, 0);
    assert_eq!(parser.encoding(), Some(UTF_16LE));
    assert_eq!(parser.confidence(), Confidence::Certain);
}

#[test]
fn utf16_stream_never_trusts_declarations() {
    // A meta inside a BOM-detected UTF-16 stream is ignored outright.
    let text_utf16: Vec<u8> = {
        let mut v = vec![0xFF, 0xFE];
        for unit in str::encode_utf16("<meta charset=shift_jis>ok") {
            v.extend_from_slice(&unit.to_le_bytes());
        }
        v
    };
    let (parser, text, restarts) = parse_document(&text_utf16, ParseOpts::default());
    assert_eq!(text, "ok");
    assert_eq!(restarts, 0);
    assert_eq!(parser.encoding(), Some(UTF_16LE));
}

#[test]
fn enforced_charset_skips_sniffing() {
    let opts = ParseOpts {
        transport_charset: Some("windows-1252".to_string()),
        enforce_charset: true,
        ..Default::default()
    };
    let parser = Parser::from_bytes(b"<meta charset=shift_jis>", opts);
    assert_eq!(parser.encoding(), Some(WINDOWS_1252));
    assert_eq!(parser.confidence(), Confidence::Certain);
}

#[test]
fn locale_fallback_applies_without_any_declaration() {
    let opts = ParseOpts {
        locale: Some("ja".to_string()),
        ..Default::default()
    };
    let parser = Parser::from_bytes(b"<p>plain</p>", opts);
    assert_eq!(parser.encoding(), Encoding::for_label(b"shift_jis"));
    assert_eq!(parser.confidence(), Confidence::Tentative);
}
