// Copyright 2025-2026 The html5lex Project Developers. See the
// COPYRIGHT file at the top-level directory of this distribution.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Encoding sniffing: BOM detection, the byte-level pre-scan and the
//! locale fallback table.
//!
//! Everything in this module works on raw, undecoded bytes — it runs
//! before any decoder exists.  Running off the end of the sampled window
//! anywhere is never an error; it means "no match" and the caller falls
//! through to the next resolution step.

use encoding_rs::{Encoding, UTF_16BE, UTF_16LE, UTF_8, WINDOWS_1252, X_USER_DEFINED};
use phf::phf_map;

use super::Confidence;

/// How many bytes the pre-scan is allowed to look at.
pub const PRESCAN_BYTES: usize = 1024;

/// Byte-order-mark detection: a three-byte peek.  On a match the BOM
/// bytes are consumed for good and the result overrides every other
/// resolution step.
pub fn detect_bom(bytes: &[u8]) -> Option<(&'static Encoding, usize)> {
    if bytes.starts_with(&[0xEF, 0xBB, 0xBF]) {
        Some((UTF_8, 3))
    } else if bytes.starts_with(&[0xFE, 0xFF]) {
        Some((UTF_16BE, 2))
    } else if bytes.starts_with(&[0xFF, 0xFE]) {
        Some((UTF_16LE, 2))
    } else {
        None
    }
}

/// Resolve the encoding to start parsing with, given everything known
/// before the first byte is decoded.  BOM detection happens earlier, in
/// the byte source; `prefix` starts just after any BOM.
///
/// <https://html.spec.whatwg.org/#determining-the-character-encoding>
pub fn determine_encoding(
    prefix: &[u8],
    transport: Option<&str>,
    locale: Option<&str>,
) -> (&'static Encoding, Confidence) {
    if let Some(label) = transport {
        if let Some(encoding) = Encoding::for_label(label.as_bytes()) {
            return (encoding, Confidence::Certain);
        }
    }

    if let Some(encoding) = prescan(prefix) {
        return (encoding, Confidence::Tentative);
    }

    (locale_default(locale), Confidence::Tentative)
}

/// One raw attribute from [`scan_attribute`], name and value both with
/// A-Z lowercased.
enum AttrScan {
    Attr(Vec<u8>, Vec<u8>),
    /// No further attributes in this tag.
    Done,
    /// The sampled window ended mid-tag; abort the whole pre-scan.
    OutOfInput,
}

fn is_whitespace(b: u8) -> bool {
    matches!(b, 0x09 | 0x0A | 0x0C | 0x0D | 0x20)
}

/// The pre-scan: look for a `<meta>`-declared charset in the first
/// [`PRESCAN_BYTES`] bytes, by raw byte comparison only.
///
/// <https://html.spec.whatwg.org/#prescan-a-byte-stream-to-determine-its-encoding>
pub fn prescan(bytes: &[u8]) -> Option<&'static Encoding> {
    let bytes = &bytes[..bytes.len().min(PRESCAN_BYTES)];
    let mut pos = 0;

    loop {
        if starts_with(bytes, pos, b"<!--") {
            // Skip the comment: everything up to the first byte-exact
            // "-->".  The terminator may overlap the opening dashes, so
            // `<!-->` closes immediately.  An isolated "-- >" does not
            // terminate anything.
            pos = find(bytes, pos + 2, b"-->")? + 3;
            continue;
        }

        if starts_with_ignore_case(bytes, pos, b"<meta")
            && matches!(bytes.get(pos + 5), Some(&b) if is_whitespace(b) || b == b'/')
        {
            pos += 5;
            if let Some(encoding) = prescan_meta(bytes, &mut pos)? {
                return Some(encoding);
            }
            continue;
        }

        match (bytes.get(pos), bytes.get(pos + 1)) {
            // A start or end tag: skip the name, then consume (and
            // discard) its raw attributes so their contents cannot be
            // mistaken for markup.
            (Some(b'<'), Some(c)) if c.is_ascii_alphabetic() => {
                pos += 1;
                skip_tag_like(bytes, &mut pos)?;
            },
            (Some(b'<'), Some(b'/')) if matches!(bytes.get(pos + 2), Some(c) if c.is_ascii_alphabetic()) => {
                pos += 2;
                skip_tag_like(bytes, &mut pos)?;
            },
            // `<!`, `</`, `<?` in any other form: skip to the next '>'.
            (Some(b'<'), Some(b'!' | b'/' | b'?')) => {
                pos = memchr_byte(bytes, pos + 2, b'>')? + 1;
            },
            (Some(_), _) => pos += 1,
            (None, _) => return None,
        }
    }
}

/// Process one `<meta ...>` during the pre-scan.  `Ok(Some(_))` is a
/// resolved charset; `Ok(None)` means keep scanning; `None` (from `?`)
/// means the window ended and the pre-scan gives up.
#[allow(clippy::option_option)]
fn prescan_meta(bytes: &[u8], pos: &mut usize) -> Option<Option<&'static Encoding>> {
    let mut attribute_names: Vec<Vec<u8>> = vec![];
    let mut got_pragma = false;
    let mut need_pragma: Option<bool> = None;
    let mut charset: Option<Vec<u8>> = None;

    loop {
        let (name, value) = match scan_attribute(bytes, pos) {
            AttrScan::Attr(name, value) => (name, value),
            AttrScan::Done => break,
            AttrScan::OutOfInput => return None,
        };

        // A name seen before on this tag is dropped; its syntax was
        // still consumed above.
        if attribute_names.contains(&name) {
            continue;
        }
        attribute_names.push(name.clone());

        match name.as_slice() {
            b"http-equiv" => {
                if value == b"content-type" {
                    got_pragma = true;
                }
            },
            b"content" => {
                if charset.is_none() {
                    if let Some(extracted) = extract_charset_from_content(&value) {
                        charset = Some(extracted.to_vec());
                        need_pragma = Some(true);
                    }
                }
            },
            b"charset" => {
                charset = Some(value);
                need_pragma = Some(false);
            },
            _ => {},
        }
    }

    let Some(need_pragma) = need_pragma else {
        return Some(None);
    };
    if need_pragma && !got_pragma {
        return Some(None);
    }
    let Some(label) = charset else {
        return Some(None);
    };
    let Some(mut encoding) = Encoding::for_label(&label) else {
        return Some(None);
    };

    if encoding == UTF_16BE || encoding == UTF_16LE {
        encoding = UTF_8;
    }
    if encoding == X_USER_DEFINED {
        encoding = WINDOWS_1252;
    }
    Some(Some(encoding))
}

/// Skip over a start or end tag: advance past the tag name, then
/// consume raw attributes without interpreting them.
fn skip_tag_like(bytes: &[u8], pos: &mut usize) -> Option<()> {
    loop {
        let b = *bytes.get(*pos)?;
        if is_whitespace(b) || b == b'>' {
            break;
        }
        *pos += 1;
    }
    loop {
        match scan_attribute(bytes, pos) {
            AttrScan::Attr(..) => {},
            AttrScan::Done => return Some(()),
            AttrScan::OutOfInput => return None,
        }
    }
}

/// The byte-oriented attribute scanner used by the pre-scan.
///
/// <https://html.spec.whatwg.org/#concept-get-attributes-when-sniffing>
fn scan_attribute(bytes: &[u8], pos: &mut usize) -> AttrScan {
    macro_rules! cur (
        () => {
            match bytes.get(*pos) {
                Some(&b) => b,
                None => return AttrScan::OutOfInput,
            }
        }
    );

    while is_whitespace(cur!()) || cur!() == b'/' {
        *pos += 1;
    }
    if cur!() == b'>' {
        return AttrScan::Done;
    }

    let mut name = vec![];
    let mut value = vec![];

    // Attribute name.
    loop {
        let b = cur!();
        if b == b'=' && !name.is_empty() {
            *pos += 1;
            return scan_attribute_value(bytes, pos, name, value);
        } else if is_whitespace(b) {
            break;
        } else if b == b'/' || b == b'>' {
            return AttrScan::Attr(name, value);
        } else {
            name.push(b.to_ascii_lowercase());
            *pos += 1;
        }
    }

    // Whitespace after the name: an attribute only has a value if the
    // next non-space byte is '='.
    while is_whitespace(cur!()) {
        *pos += 1;
    }
    if cur!() != b'=' {
        return AttrScan::Attr(name, value);
    }
    *pos += 1;
    scan_attribute_value(bytes, pos, name, value)
}

fn scan_attribute_value(
    bytes: &[u8],
    pos: &mut usize,
    name: Vec<u8>,
    mut value: Vec<u8>,
) -> AttrScan {
    macro_rules! cur (
        () => {
            match bytes.get(*pos) {
                Some(&b) => b,
                None => return AttrScan::OutOfInput,
            }
        }
    );

    while is_whitespace(cur!()) {
        *pos += 1;
    }

    let b = cur!();
    if b == b'"' || b == b'\'' {
        let quote = b;
        *pos += 1;
        loop {
            let b = cur!();
            *pos += 1;
            if b == quote {
                return AttrScan::Attr(name, value);
            }
            value.push(b.to_ascii_lowercase());
        }
    }
    if b == b'>' {
        return AttrScan::Attr(name, value);
    }
    value.push(b.to_ascii_lowercase());
    *pos += 1;

    loop {
        let b = cur!();
        if is_whitespace(b) || b == b'>' {
            return AttrScan::Attr(name, value);
        }
        value.push(b.to_ascii_lowercase());
        *pos += 1;
    }
}

/// <https://html.spec.whatwg.org/multipage/#algorithm-for-extracting-a-character-encoding-from-a-meta-element>
pub(crate) fn extract_charset_from_content(input: &[u8]) -> Option<&[u8]> {
    // Step 1. Let position be a pointer into s, initially pointing at the start of the string.
    let mut position = 0;
    loop {
        // Step 2. Loop: Find the first seven characters in s after position that are an ASCII
        // case-insensitive match for the word "charset". If no such match is found, return nothing.
        loop {
            let candidate = input.get(position..position + "charset".len())?;
            if candidate.eq_ignore_ascii_case(b"charset") {
                break;
            }

            position += 1;
        }
        position += "charset".len();

        // Step 3. Skip any ASCII whitespace that immediately follow the word "charset" (there might not be any).
        position += input[position..]
            .iter()
            .take_while(|byte| byte.is_ascii_whitespace())
            .count();

        // Step 4. If the next character is not a U+003D EQUALS SIGN (=), then move position to point just before
        // that next character, and jump back to the step labeled loop.
        if *input.get(position)? == b'=' {
            break;
        }
    }
    // Skip the "="
    position += 1;

    // Step 5. Skip any ASCII whitespace that immediately follow the equals sign (there might not be any).
    position += input[position..]
        .iter()
        .take_while(|byte| byte.is_ascii_whitespace())
        .count();

    // Step 6. Process the next character as follows:
    match input.get(position)? {
        quote @ (b'"' | b'\'') => {
            // Return the result of getting an encoding from the substring that is between this character
            // and the next earliest occurrence of this character.
            let length = input[position + 1..]
                .iter()
                .position(|byte| byte == quote)?;
            Some(&input[position + 1..position + 1 + length])
        },
        _ => {
            // Return the result of getting an encoding from the substring that consists of this character
            // up to but not including the first ASCII whitespace or U+003B SEMICOLON character (;),
            // or the end of s, whichever comes first.
            let rest = &input[position..];
            let length = rest
                .iter()
                .position(|byte| byte.is_ascii_whitespace() || *byte == b';')
                .unwrap_or(rest.len());
            Some(&rest[..length])
        },
    }
}

/// The fallback table keyed by the user's language, per the suggested
/// defaults in the HTML standard.  windows-1252 covers everything else.
static LOCALE_DEFAULTS: phf::Map<&'static str, &'static str> = phf_map! {
    "ar" => "windows-1256",
    "bg" => "windows-1251",
    "cs" => "windows-1250",
    "el" => "iso-8859-7",
    "et" => "windows-1257",
    "fa" => "windows-1256",
    "he" => "windows-1255",
    "hu" => "iso-8859-2",
    "ja" => "shift_jis",
    "ko" => "euc-kr",
    "ku" => "windows-1254",
    "lt" => "windows-1257",
    "lv" => "windows-1257",
    "pl" => "iso-8859-2",
    "ru" => "windows-1251",
    "sk" => "windows-1250",
    "sl" => "iso-8859-2",
    "th" => "windows-874",
    "tr" => "windows-1254",
    "uk" => "windows-1251",
    "vi" => "windows-1258",
    "zh-cn" => "gbk",
    "zh-tw" => "big5",
};

pub fn locale_default(locale: Option<&str>) -> &'static Encoding {
    let Some(locale) = locale else {
        return WINDOWS_1252;
    };
    let locale = locale.to_ascii_lowercase();
    let label = LOCALE_DEFAULTS
        .get(locale.as_str())
        .or_else(|| {
            let primary = locale.split(['-', '_']).next().unwrap_or(&locale);
            LOCALE_DEFAULTS.get(primary)
        })
        .copied();
    match label {
        Some(label) => Encoding::for_label(label.as_bytes()).unwrap_or(WINDOWS_1252),
        None => WINDOWS_1252,
    }
}

fn starts_with(bytes: &[u8], pos: usize, pat: &[u8]) -> bool {
    bytes.get(pos..pos + pat.len()).is_some_and(|s| s == pat)
}

fn starts_with_ignore_case(bytes: &[u8], pos: usize, pat: &[u8]) -> bool {
    bytes
        .get(pos..pos + pat.len())
        .is_some_and(|s| s.eq_ignore_ascii_case(pat))
}

fn find(bytes: &[u8], from: usize, pat: &[u8]) -> Option<usize> {
    if from >= bytes.len() {
        return None;
    }
    bytes[from..]
        .windows(pat.len())
        .position(|w| w == pat)
        .map(|i| from + i)
}

fn memchr_byte(bytes: &[u8], from: usize, needle: u8) -> Option<usize> {
    if from >= bytes.len() {
        return None;
    }
    bytes[from..]
        .iter()
        .position(|&b| b == needle)
        .map(|i| from + i)
}

#[cfg(test)]
mod tests {
    use super::*;
    use encoding_rs::SHIFT_JIS;

    #[test]
    fn bom_detection() {
        assert_eq!(detect_bom(b"\xEF\xBB\xBFx"), Some((UTF_8, 3)));
        assert_eq!(detect_bom(b"\xFE\xFF\x00x"), Some((UTF_16BE, 2)));
        assert_eq!(detect_bom(b"\xFF\xFEx\x00"), Some((UTF_16LE, 2)));
        assert_eq!(detect_bom(b"<html>"), None);
        assert_eq!(detect_bom(b"\xEF\xBB"), None);
    }

    #[test]
    fn meta_charset_is_found() {
        assert_eq!(
            prescan(b"<html><head><meta charset=\"shift_jis\"></head>"),
            Some(SHIFT_JIS)
        );
    }

    #[test]
    fn meta_charset_is_case_insensitive() {
        assert_eq!(
            prescan(b"<META CHARSET='Shift_JIS'>"),
            Some(SHIFT_JIS)
        );
    }

    #[test]
    fn meta_content_needs_pragma() {
        // content= alone is not enough...
        assert_eq!(
            prescan(b"<meta content=\"text/html; charset=shift_jis\">"),
            None
        );
        // ...unless http-equiv says content-type.
        assert_eq!(
            prescan(
                b"<meta http-equiv=\"Content-Type\" content=\"text/html; charset=shift_jis\">"
            ),
            Some(SHIFT_JIS)
        );
    }

    #[test]
    fn charset_inside_comment_is_skipped() {
        assert_eq!(prescan(b"<!-- <meta charset=utf-8> --><p>"), None);
    }

    #[test]
    fn comment_only_ends_at_exact_terminator() {
        // An isolated "-- >" does not close the comment.
        assert_eq!(
            prescan(b"<!-- a -- > still a comment --><meta charset=shift_jis>"),
            Some(SHIFT_JIS)
        );
    }

    #[test]
    fn charset_in_other_tag_attribute_is_not_markup() {
        assert_eq!(
            prescan(b"<p data-x=\"<meta charset=utf-8>\"></p>"),
            None
        );
    }

    #[test]
    fn duplicate_meta_attribute_is_dropped() {
        // The first charset wins; the duplicate is consumed but ignored.
        assert_eq!(
            prescan(b"<meta charset=shift_jis charset=utf-8>"),
            Some(SHIFT_JIS)
        );
    }

    #[test]
    fn utf16_meta_declaration_becomes_utf8() {
        assert_eq!(prescan(b"<meta charset=utf-16be>"), Some(UTF_8));
        assert_eq!(prescan(b"<meta charset=x-user-defined>"), Some(WINDOWS_1252));
    }

    #[test]
    fn truncated_meta_is_not_an_error() {
        assert_eq!(prescan(b"<meta charset=\"utf-8"), None);
        assert_eq!(prescan(b"<met"), None);
        assert_eq!(prescan(b"<!-- unterminated"), None);
    }

    #[test]
    fn prescan_window_is_bounded() {
        let mut page = vec![b' '; PRESCAN_BYTES];
        page.extend_from_slice(b"<meta charset=shift_jis>");
        assert_eq!(prescan(&page), None);
    }

    #[test]
    fn extract_from_content_variants() {
        assert_eq!(
            extract_charset_from_content(b"text/html; charset=utf8"),
            Some(&b"utf8"[..])
        );
        assert_eq!(
            extract_charset_from_content(b"cHarSet \t=\t'utf8'"),
            Some(&b"utf8"[..])
        );
        assert_eq!(
            extract_charset_from_content(b"charset=utf8;foo"),
            Some(&b"utf8"[..])
        );
        assert_eq!(extract_charset_from_content(b"charset utf8"), None);
        assert_eq!(extract_charset_from_content(b"charset='utf8"), None);
        assert_eq!(extract_charset_from_content(b"foobar"), None);
    }

    #[test]
    fn transport_label_wins_over_prescan() {
        let (encoding, confidence) = determine_encoding(
            b"<meta charset=shift_jis>",
            Some("iso-8859-1"),
            None,
        );
        assert_eq!(encoding, WINDOWS_1252); // iso-8859-1 aliases windows-1252
        assert_eq!(confidence, Confidence::Certain);
    }

    #[test]
    fn prescan_result_is_tentative() {
        let (encoding, confidence) = determine_encoding(b"<meta charset=shift_jis>", None, None);
        assert_eq!(encoding, SHIFT_JIS);
        assert_eq!(confidence, Confidence::Tentative);
    }

    #[test]
    fn locale_fallbacks() {
        assert_eq!(locale_default(Some("ja")), Encoding::for_label(b"shift_jis").unwrap());
        assert_eq!(locale_default(Some("ja-JP")), Encoding::for_label(b"shift_jis").unwrap());
        assert_eq!(locale_default(Some("zh-CN")), Encoding::for_label(b"gbk").unwrap());
        assert_eq!(locale_default(Some("en-US")), WINDOWS_1252);
        assert_eq!(locale_default(None), WINDOWS_1252);
    }

    #[test]
    fn locale_fallback_is_tentative() {
        let (encoding, confidence) = determine_encoding(b"<p>hi</p>", None, Some("ru"));
        assert_eq!(encoding, Encoding::for_label(b"windows-1251").unwrap());
        assert_eq!(confidence, Confidence::Tentative);
    }
}
