// Copyright 2025-2026 The html5lex Project Developers. See the
// COPYRIGHT file at the top-level directory of this distribution.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

pub(crate) mod data;

use super::{ErrorKind, Tokenizer};
use crate::buffer_queue::BufferQueue;

use log::debug;
use std::borrow::Cow::{self, Borrowed};
use std::char::from_u32;
use std::mem;

use tendril::StrTendril;

//§ tokenizing-character-references
#[derive(Clone, Copy, Debug)]
pub(super) struct CharRef {
    /// The resulting character(s)
    pub(super) chars: [char; 2],

    /// How many slots in `chars` are valid?
    pub(super) num_chars: u8,
}

impl CharRef {
    const EMPTY: CharRef = CharRef {
        chars: ['\0', '\0'],
        num_chars: 0,
    };
}

pub(super) enum Status {
    Stuck,
    Progress,
    Done(CharRef),
}

#[derive(PartialEq, Eq, Copy, Clone, Debug)]
enum NumericKind {
    Decimal,
    Hex,
}

#[derive(Clone, Copy, Debug)]
enum State {
    Begin,
    Octothorpe,
    Numeric(NumericKind),
    NumericSemicolon,
    Named,
    BogusName,
}

/// A full match recorded during the named-reference walk.
///
/// The walk keeps extending past a match as long as the table reports a
/// longer candidate; the most recent full match survives and anything
/// consumed beyond it is unconsumed when the walk stops.
#[derive(Clone, Copy, Debug)]
struct NamedMatch {
    /// Length in bytes of the matched name within `name_buf`.
    len: u32,
    chars: [char; 2],
    num_chars: u8,
}

pub(super) struct CharRefTokenizer {
    state: State,
    is_consumed_in_attribute: bool,

    num: u32,
    num_too_big: bool,
    seen_digit: bool,
    hex_marker: Option<char>,

    name_buf: StrTendril,
    name_match: Option<NamedMatch>,
}

impl CharRefTokenizer {
    // NB: We assume that we have an additional allowed character iff we're
    // tokenizing in an attribute value.
    pub(super) fn new(is_consumed_in_attribute: bool) -> CharRefTokenizer {
        CharRefTokenizer {
            state: State::Begin,
            is_consumed_in_attribute,
            num: 0,
            num_too_big: false,
            seen_digit: false,
            hex_marker: None,
            name_buf: StrTendril::new(),
            name_match: None,
        }
    }

    fn finish_none(&mut self) -> Status {
        Status::Done(CharRef::EMPTY)
    }

    fn finish_one(&mut self, c: char) -> Status {
        Status::Done(CharRef {
            chars: [c, '\0'],
            num_chars: 1,
        })
    }
}

fn digit_value(c: char, kind: NumericKind) -> Option<u32> {
    // ASCII digits are tested ahead of the hex letter ranges; the two
    // overlap nowhere, but the probe order is part of the contract.
    match c {
        '0'..='9' => Some(c as u32 - '0' as u32),
        'a'..='f' if kind == NumericKind::Hex => Some(c as u32 - 'a' as u32 + 10),
        'A'..='F' if kind == NumericKind::Hex => Some(c as u32 - 'A' as u32 + 10),
        _ => None,
    }
}

impl CharRefTokenizer {
    pub(super) fn step(&mut self, tokenizer: &Tokenizer, input: &BufferQueue) -> Status {
        debug!("char ref tokenizer stepping in state {:?}", self.state);
        match self.state {
            State::Begin => self.do_begin(tokenizer, input),
            State::Octothorpe => self.do_octothorpe(tokenizer, input),
            State::Numeric(kind) => self.do_numeric(tokenizer, input, kind),
            State::NumericSemicolon => self.do_numeric_semicolon(tokenizer, input),
            State::Named => self.do_named(tokenizer, input),
            State::BogusName => self.do_bogus_name(tokenizer, input),
        }
    }

    fn do_begin(&mut self, tokenizer: &Tokenizer, input: &BufferQueue) -> Status {
        match tokenizer.peek(input) {
            Some('a'..='z' | 'A'..='Z' | '0'..='9') => {
                self.state = State::Named;
                Status::Progress
            },
            Some('#') => {
                tokenizer.discard_char(input);
                self.state = State::Octothorpe;
                Status::Progress
            },
            Some(_) => Status::Done(CharRef::EMPTY),
            None => Status::Stuck,
        }
    }

    fn do_octothorpe(&mut self, tokenizer: &Tokenizer, input: &BufferQueue) -> Status {
        match tokenizer.peek(input) {
            Some(c @ ('x' | 'X')) => {
                tokenizer.discard_char(input);
                self.hex_marker = Some(c);
                self.state = State::Numeric(NumericKind::Hex);
            },
            Some(_) => {
                self.hex_marker = None;
                self.state = State::Numeric(NumericKind::Decimal);
            },
            None => return Status::Stuck,
        }
        Status::Progress
    }

    fn do_numeric(
        &mut self,
        tokenizer: &Tokenizer,
        input: &BufferQueue,
        kind: NumericKind,
    ) -> Status {
        let Some(c) = tokenizer.peek(input) else {
            return Status::Stuck;
        };
        match digit_value(c, kind) {
            Some(n) => {
                tokenizer.discard_char(input);
                // The decimal accumulator scales by ten and the hex one
                // by sixteen; the two states never share a multiplier.
                self.num = match kind {
                    NumericKind::Decimal => self.num.wrapping_mul(10),
                    NumericKind::Hex => self.num.wrapping_mul(16),
                };
                if self.num > 0x10FFFF {
                    // We might overflow, and the character is definitely invalid.
                    // We still parse digits and semicolon, but don't use the result.
                    self.num_too_big = true;
                }
                self.num = self.num.wrapping_add(n);
                self.seen_digit = true;
                Status::Progress
            },

            None if !self.seen_digit => self.unconsume_numeric(tokenizer, input),

            None => {
                self.state = State::NumericSemicolon;
                Status::Progress
            },
        }
    }

    fn do_numeric_semicolon(&mut self, tokenizer: &Tokenizer, input: &BufferQueue) -> Status {
        match tokenizer.peek(input) {
            Some(';') => tokenizer.discard_char(input),
            Some(_) => tokenizer.emit_error(
                ErrorKind::InvalidCharRef,
                Borrowed("Semicolon missing after numeric character reference"),
            ),
            None => return Status::Stuck,
        };
        self.finish_numeric(tokenizer)
    }

    fn unconsume_numeric(&mut self, tokenizer: &Tokenizer, input: &BufferQueue) -> Status {
        let mut unconsume = StrTendril::from_char('#');
        if let Some(c) = self.hex_marker {
            unconsume.push_char(c)
        }

        input.push_front(unconsume);
        tokenizer.emit_error(
            ErrorKind::InvalidCharRef,
            Borrowed("Numeric character reference without digits"),
        );
        self.finish_none()
    }

    fn finish_numeric(&mut self, tokenizer: &Tokenizer) -> Status {
        fn conv(n: u32) -> char {
            from_u32(n).expect("invalid char missed by error handling cases")
        }

        let (c, error) = match self.num {
            n if (n > 0x10FFFF) || self.num_too_big => ('\u{fffd}', true),
            0x00 | 0xD800..=0xDFFF => ('\u{fffd}', true),

            0x80..=0x9F => match data::C1_REPLACEMENTS[(self.num - 0x80) as usize] {
                Some(c) => (c, true),
                None => (conv(self.num), true),
            },

            0x01..=0x08 | 0x0B | 0x0D..=0x1F | 0x7F | 0xFDD0..=0xFDEF => (conv(self.num), true),

            n if (n & 0xFFFE) == 0xFFFE => (conv(n), true),

            n => (conv(n), false),
        };

        if error {
            let msg = if tokenizer.opts.exact_errors {
                Cow::from(format!(
                    "Invalid numeric character reference value 0x{:06X}",
                    self.num
                ))
            } else {
                Cow::from("Invalid numeric character reference")
            };
            tokenizer.emit_error(ErrorKind::InvalidCharRef, msg);
        }

        self.finish_one(c)
    }

    fn do_named(&mut self, tokenizer: &Tokenizer, input: &BufferQueue) -> Status {
        let Some(c) = tokenizer.get_char(input) else {
            return Status::Stuck;
        };
        self.name_buf.push_char(c);

        match data::lookup(&self.name_buf) {
            // We have either a full match or a prefix of one.
            Some(found) => {
                if let Some(chars) = found.exact {
                    // A full match, but there might be a longer one to come.
                    self.name_match = Some(NamedMatch {
                        len: self.name_buf.len32(),
                        chars: [
                            from_u32(chars[0]).expect("invalid entity table entry"),
                            from_u32(chars[1]).unwrap_or('\0'),
                        ],
                        num_chars: if chars[1] == 0 { 1 } else { 2 },
                    });
                }
                // Otherwise, we just have a prefix match.
                Status::Progress
            },
            // Can't continue the match.
            None => self.finish_named(tokenizer, input, Some(c)),
        }
    }

    fn emit_name_error(&mut self, tokenizer: &Tokenizer) {
        let msg = if tokenizer.opts.exact_errors {
            Cow::from(format!("Invalid character reference &{}", &*self.name_buf))
        } else {
            Cow::from("Invalid character reference")
        };
        tokenizer.emit_error(ErrorKind::InvalidCharRef, msg);
    }

    fn unconsume_name(&mut self, input: &BufferQueue) {
        input.push_front(mem::take(&mut self.name_buf));
    }

    fn finish_named(
        &mut self,
        tokenizer: &Tokenizer,
        input: &BufferQueue,
        end_char: Option<char>,
    ) -> Status {
        match self.name_match {
            None => {
                match end_char {
                    Some(c) if c.is_ascii_alphanumeric() => {
                        // Keep looking for a semicolon, to determine whether
                        // we emit a parse error.
                        self.state = State::BogusName;
                        return Status::Progress;
                    },

                    // Check length because &; is not a parse error.
                    Some(';') if self.name_buf.len32() > 1 => self.emit_name_error(tokenizer),

                    _ => (),
                }
                self.unconsume_name(input);
                self.finish_none()
            },

            Some(m) => {
                // We have a complete match, but we may have consumed
                // additional characters into self.name_buf.  Usually
                // at least one, but several in cases like
                //
                //     &not    => match for U+00AC
                //     &noti   => valid prefix for &notin
                //     &notit  => can't continue match
                let last_matched = self.name_buf.as_bytes()[(m.len - 1) as usize];
                let next_after = self.name_buf.as_bytes().get(m.len as usize).copied();

                // "If the character reference is being consumed as part of an
                // attribute, and the last character matched is not a U+003B
                // SEMICOLON character (;), and the next character is either a
                // U+003D EQUALS SIGN character (=) or an alphanumeric ASCII
                // character, then, for historical reasons, all the characters
                // that were matched after the U+0026 AMPERSAND character (&)
                // must be unconsumed, and nothing is returned. However, if
                // this next character is in fact a U+003D EQUALS SIGN
                // character (=), then this is a parse error"
                let unconsume_all = match (self.is_consumed_in_attribute, last_matched, next_after)
                {
                    (_, b';', _) => false,
                    (true, _, Some(b'=')) => {
                        tokenizer.emit_error(
                            ErrorKind::InvalidCharRef,
                            Borrowed("Equals sign after character reference in attribute"),
                        );
                        true
                    },
                    (true, _, Some(c)) if c.is_ascii_alphanumeric() => true,
                    _ => {
                        tokenizer.emit_error(
                            ErrorKind::InvalidCharRef,
                            Borrowed("Character reference does not end with semicolon"),
                        );
                        false
                    },
                };

                if unconsume_all {
                    self.unconsume_name(input);
                    self.finish_none()
                } else {
                    let tail = self
                        .name_buf
                        .subtendril(m.len, self.name_buf.len32() - m.len);
                    input.push_front(tail);
                    Status::Done(CharRef {
                        chars: m.chars,
                        num_chars: m.num_chars,
                    })
                }
            },
        }
    }

    fn do_bogus_name(&mut self, tokenizer: &Tokenizer, input: &BufferQueue) -> Status {
        let Some(c) = tokenizer.get_char(input) else {
            return Status::Stuck;
        };
        self.name_buf.push_char(c);
        match c {
            _ if c.is_ascii_alphanumeric() => return Status::Progress,
            ';' => self.emit_name_error(tokenizer),
            _ => (),
        }
        self.unconsume_name(input);
        self.finish_none()
    }

    pub(super) fn end_of_file(&mut self, tokenizer: &Tokenizer, input: &BufferQueue) -> CharRef {
        loop {
            let status = match self.state {
                State::Begin => Status::Done(CharRef::EMPTY),

                State::Numeric(_) if !self.seen_digit => self.unconsume_numeric(tokenizer, input),

                State::Numeric(_) | State::NumericSemicolon => {
                    tokenizer.emit_error(
                        ErrorKind::InvalidCharRef,
                        Borrowed("EOF in numeric character reference"),
                    );
                    self.finish_numeric(tokenizer)
                },

                State::Named => self.finish_named(tokenizer, input, None),

                State::BogusName => {
                    if self.name_buf.ends_with(';') {
                        self.emit_name_error(tokenizer);
                    }
                    self.unconsume_name(input);
                    Status::Done(CharRef::EMPTY)
                },

                State::Octothorpe => {
                    input.push_front(StrTendril::from_slice("#"));
                    tokenizer.emit_error(
                        ErrorKind::InvalidCharRef,
                        Borrowed("EOF after '#' in character reference"),
                    );
                    Status::Done(CharRef::EMPTY)
                },
            };

            match status {
                Status::Done(char_ref) => return char_ref,
                Status::Stuck => return CharRef::EMPTY,
                Status::Progress => {},
            }
        }
    }
}
