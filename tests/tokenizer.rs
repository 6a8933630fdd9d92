// Copyright 2025-2026 The html5lex Project Developers. See the
// COPYRIGHT file at the top-level directory of this distribution.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! End-to-end tokenizer tests over the public driver interface.

use html5lex::driver::{tokenize_bytes, tokenize_string, ParseOpts, Parser, ParserStep};
use html5lex::tendril::StrTendril;
use html5lex::tokenizer::states::RawKind;
use html5lex::{
    Attribute, CharacterToken, CommentToken, DoctypeToken, EOFToken, ErrorKind, StartTag, Tag,
    TagKind, TagToken, Token, TokenizerOpts,
};

fn chars(s: &str) -> Vec<Token> {
    s.chars().map(CharacterToken).collect()
}

fn start_tag(name: &str, attrs: Vec<(&str, &str)>, self_closing: bool) -> Token {
    TagToken(Tag {
        kind: TagKind::StartTag,
        name: StrTendril::from(name),
        self_closing,
        attrs: attrs
            .into_iter()
            .map(|(name, value)| Attribute {
                name: StrTendril::from(name),
                value: StrTendril::from(value),
            })
            .collect(),
    })
}

fn end_tag(name: &str) -> Token {
    TagToken(Tag {
        kind: TagKind::EndTag,
        name: StrTendril::from(name),
        self_closing: false,
        attrs: vec![],
    })
}

#[test]
fn whole_document() {
    let (tokens, errors) = tokenize_bytes(
        b"<!DOCTYPE html><!-- banner --><p class=\"a\" id=x>T&amp;C</p><br/>",
        ParseOpts::default(),
    );

    let mut expected = vec![];
    match &tokens[0] {
        DoctypeToken(d) => {
            assert_eq!(d.name.as_deref(), Some("html"));
            assert!(!d.force_quirks);
        },
        other => panic!("expected a doctype, got {other:?}"),
    }
    expected.push(tokens[0].clone());
    expected.push(CommentToken(StrTendril::from(" banner ")));
    expected.push(start_tag("p", vec![("class", "a"), ("id", "x")], false));
    expected.extend(chars("T&C"));
    expected.push(end_tag("p"));
    expected.push(start_tag("br", vec![], true));
    expected.push(EOFToken);

    assert_eq!(tokens, expected);
    assert!(errors.is_empty(), "unexpected errors: {errors:?}");
}

#[test]
fn token_stream_is_identical_for_any_byte_split() {
    let input: &[u8] = b"<a href='x'>&notit;<!--c--><b>\r\n</b></a>";
    let (reference, _) = tokenize_bytes(input, ParseOpts::default());

    for split in 1..input.len() {
        let tok = html5lex::Tokenizer::new(TokenizerOpts::default());
        let queue = html5lex::BufferQueue::new();
        let mut tokens = vec![];
        for chunk in [&input[..split], &input[split..]] {
            queue.push_back(StrTendril::from(std::str::from_utf8(chunk).unwrap()));
            while let Some(t) = tok.next_token(&queue) {
                tokens.push(t);
            }
        }
        tok.end(&queue);
        while let Some(t) = tok.next_token(&queue) {
            tokens.push(t);
        }
        assert_eq!(tokens, reference, "split at byte {split}");
    }
}

#[test]
fn script_data_escaping() {
    // A commented-out script end tag must not close the element.
    let mut parser = Parser::from_bytes(
        b"<script><!--<script>alert(1)</script>--></script>x",
        ParseOpts::default(),
    );
    let mut text = String::new();
    let mut saw_end = false;
    loop {
        match parser.next() {
            ParserStep::Token(TagToken(tag)) => match tag.kind {
                TagKind::StartTag if &*tag.name == "script" && !saw_end => {
                    parser.switch_raw_data(RawKind::ScriptData);
                },
                TagKind::EndTag if &*tag.name == "script" => saw_end = true,
                _ => {},
            },
            ParserStep::Token(CharacterToken(c)) if !saw_end => text.push(c),
            ParserStep::Token(_) => {},
            ParserStep::Done => break,
        }
    }
    assert_eq!(text, "<!--<script>alert(1)</script>-->");
}

#[test]
fn rcdata_entities_are_resolved() {
    let mut parser = Parser::from_bytes(b"<title>a &amp; b</title>", ParseOpts::default());
    let mut text = String::new();
    loop {
        match parser.next() {
            ParserStep::Token(TagToken(tag)) => {
                if tag.kind == TagKind::StartTag && &*tag.name == "title" {
                    parser.switch_raw_data(RawKind::Rcdata);
                }
            },
            ParserStep::Token(CharacterToken(c)) => text.push(c),
            ParserStep::Token(_) => {},
            ParserStep::Done => break,
        }
    }
    assert_eq!(text, "a & b");
}

#[test]
fn string_and_byte_inputs_agree() {
    let text = "<p a=1 a=2>&copy;&#169;</p>";
    let (from_bytes, byte_errors) = tokenize_bytes(text.as_bytes(), ParseOpts::default());
    let (from_string, string_errors) =
        tokenize_string(StrTendril::from(text), TokenizerOpts::default());
    assert_eq!(from_bytes, from_string);
    assert_eq!(byte_errors.len(), string_errors.len());

    assert_eq!(
        from_bytes,
        vec![
            start_tag("p", vec![("a", "1")], false),
            CharacterToken('\u{a9}'),
            CharacterToken('\u{a9}'),
            end_tag("p"),
            EOFToken,
        ]
    );
    // One duplicate-attribute error, nothing else.
    assert_eq!(byte_errors.len(), 1);
    assert_eq!(byte_errors[0].kind, ErrorKind::InvalidAttribute);
}

#[test]
fn errors_carry_positions() {
    let (_, errors) = tokenize_bytes(b"line one\nline two &# oops", ParseOpts::default());
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].kind, ErrorKind::InvalidCharRef);
    assert_eq!(errors[0].line, 2);
}

#[test]
fn error_channel_is_ordered() {
    let (_, errors) = tokenize_bytes(b"<a x=1 x=2>&#0;\0", ParseOpts::default());
    let kinds: Vec<ErrorKind> = errors.iter().map(|e| e.kind).collect();
    assert_eq!(
        kinds,
        vec![
            ErrorKind::InvalidAttribute,
            ErrorKind::InvalidCharRef,
            ErrorKind::NullCharacter,
        ]
    );
}

#[test]
fn bare_ampersands_pass_through() {
    let (tokens, errors) = tokenize_bytes(b"fish & chips &! &;", ParseOpts::default());
    let mut expected = chars("fish & chips &! &;");
    expected.push(EOFToken);
    assert_eq!(tokens, expected);
    assert!(errors.is_empty());
}

#[test]
fn unfinished_markup_at_eof() {
    let (tokens, errors) = tokenize_bytes(b"<a href=", ParseOpts::default());
    // The tag is abandoned; EOF in a tag is a premature-EOF error.
    assert_eq!(*tokens.last().unwrap(), EOFToken);
    assert!(errors.iter().any(|e| e.kind == ErrorKind::PrematureEof));
}
