// Copyright 2025-2026 The html5lex Project Developers. See the
// COPYRIGHT file at the top-level directory of this distribution.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

/// The spec replaces most characters in the ISO-2022 C1 control code range
/// (U+0080 through U+009F) with these characters, based on Windows 8-bit
/// codepages.
pub static C1_REPLACEMENTS: [Option<char>; 32] = [
    Some('\u{20ac}'),
    None,
    Some('\u{201a}'),
    Some('\u{0192}'),
    Some('\u{201e}'),
    Some('\u{2026}'),
    Some('\u{2020}'),
    Some('\u{2021}'),
    Some('\u{02c6}'),
    Some('\u{2030}'),
    Some('\u{0160}'),
    Some('\u{2039}'),
    Some('\u{0152}'),
    None,
    Some('\u{017d}'),
    None,
    None,
    Some('\u{2018}'),
    Some('\u{2019}'),
    Some('\u{201c}'),
    Some('\u{201d}'),
    Some('\u{2022}'),
    Some('\u{2013}'),
    Some('\u{2014}'),
    Some('\u{02dc}'),
    Some('\u{2122}'),
    Some('\u{0161}'),
    Some('\u{203a}'),
    Some('\u{0153}'),
    None,
    Some('\u{017e}'),
    Some('\u{0178}'),
];

/// Result of a named-entity probe: `exact` is the replacement when the
/// probed name is itself an entity; a `Lookup` with `exact: None` means
/// the name is a proper prefix of at least one entity.
#[derive(Clone, Copy, Debug)]
pub struct Lookup {
    pub exact: Option<[u32; 2]>,
}

/// Look up `name` in the entity table.
///
/// `None` means no entity starts with `name` and the caller's walk must
/// stop. One binary probe answers both the exact and the prefix
/// question: the first table entry that sorts at or after `name` either
/// is `name` or (when it merely starts with it) proves a longer entity
/// exists.
pub fn lookup(name: &str) -> Option<Lookup> {
    let i = NAMED_ENTITIES.partition_point(|&(key, _)| key < name);
    let (key, value) = NAMED_ENTITIES.get(i)?;
    if *key == name {
        Some(Lookup {
            exact: Some(*value),
        })
    } else if key.starts_with(name) {
        Some(Lookup { exact: None })
    } else {
        None
    }
}

/// Named character references, sorted by name (byte order — the
/// `lookup` binary search depends on it).
///
/// This is a curated subset of the WHATWG list: the complete set of
/// legacy names that are recognized without a trailing semicolon (in
/// both spellings), plus the Latin-1, Greek, punctuation, arrow and
/// math names in common use. Two-slot replacements are representable
/// but no entry in the subset needs one.
static NAMED_ENTITIES: &[(&str, [u32; 2])] = &[
    ("AElig", [0xC6, 0]),
    ("AElig;", [0xC6, 0]),
    ("AMP", [0x26, 0]),
    ("AMP;", [0x26, 0]),
    ("Aacute", [0xC1, 0]),
    ("Aacute;", [0xC1, 0]),
    ("Acirc", [0xC2, 0]),
    ("Acirc;", [0xC2, 0]),
    ("Agrave", [0xC0, 0]),
    ("Agrave;", [0xC0, 0]),
    ("Alpha;", [0x391, 0]),
    ("Aring", [0xC5, 0]),
    ("Aring;", [0xC5, 0]),
    ("Atilde", [0xC3, 0]),
    ("Atilde;", [0xC3, 0]),
    ("Auml", [0xC4, 0]),
    ("Auml;", [0xC4, 0]),
    ("Beta;", [0x392, 0]),
    ("COPY", [0xA9, 0]),
    ("COPY;", [0xA9, 0]),
    ("Ccedil", [0xC7, 0]),
    ("Ccedil;", [0xC7, 0]),
    ("Chi;", [0x3A7, 0]),
    ("Dagger;", [0x2021, 0]),
    ("Delta;", [0x394, 0]),
    ("ETH", [0xD0, 0]),
    ("ETH;", [0xD0, 0]),
    ("Eacute", [0xC9, 0]),
    ("Eacute;", [0xC9, 0]),
    ("Ecirc", [0xCA, 0]),
    ("Ecirc;", [0xCA, 0]),
    ("Egrave", [0xC8, 0]),
    ("Egrave;", [0xC8, 0]),
    ("Epsilon;", [0x395, 0]),
    ("Eta;", [0x397, 0]),
    ("Euml", [0xCB, 0]),
    ("Euml;", [0xCB, 0]),
    ("GT", [0x3E, 0]),
    ("GT;", [0x3E, 0]),
    ("Gamma;", [0x393, 0]),
    ("Iacute", [0xCD, 0]),
    ("Iacute;", [0xCD, 0]),
    ("Icirc", [0xCE, 0]),
    ("Icirc;", [0xCE, 0]),
    ("Igrave", [0xCC, 0]),
    ("Igrave;", [0xCC, 0]),
    ("Iota;", [0x399, 0]),
    ("Iuml", [0xCF, 0]),
    ("Iuml;", [0xCF, 0]),
    ("Kappa;", [0x39A, 0]),
    ("LT", [0x3C, 0]),
    ("LT;", [0x3C, 0]),
    ("Lambda;", [0x39B, 0]),
    ("Mu;", [0x39C, 0]),
    ("Ntilde", [0xD1, 0]),
    ("Ntilde;", [0xD1, 0]),
    ("Nu;", [0x39D, 0]),
    ("OElig;", [0x152, 0]),
    ("Oacute", [0xD3, 0]),
    ("Oacute;", [0xD3, 0]),
    ("Ocirc", [0xD4, 0]),
    ("Ocirc;", [0xD4, 0]),
    ("Ograve", [0xD2, 0]),
    ("Ograve;", [0xD2, 0]),
    ("Omega;", [0x3A9, 0]),
    ("Omicron;", [0x39F, 0]),
    ("Oslash", [0xD8, 0]),
    ("Oslash;", [0xD8, 0]),
    ("Otilde", [0xD5, 0]),
    ("Otilde;", [0xD5, 0]),
    ("Ouml", [0xD6, 0]),
    ("Ouml;", [0xD6, 0]),
    ("Phi;", [0x3A6, 0]),
    ("Pi;", [0x3A0, 0]),
    ("Prime;", [0x2033, 0]),
    ("Psi;", [0x3A8, 0]),
    ("QUOT", [0x22, 0]),
    ("QUOT;", [0x22, 0]),
    ("REG", [0xAE, 0]),
    ("REG;", [0xAE, 0]),
    ("Rho;", [0x3A1, 0]),
    ("Scaron;", [0x160, 0]),
    ("Sigma;", [0x3A3, 0]),
    ("THORN", [0xDE, 0]),
    ("THORN;", [0xDE, 0]),
    ("Tau;", [0x3A4, 0]),
    ("Theta;", [0x398, 0]),
    ("Uacute", [0xDA, 0]),
    ("Uacute;", [0xDA, 0]),
    ("Ucirc", [0xDB, 0]),
    ("Ucirc;", [0xDB, 0]),
    ("Ugrave", [0xD9, 0]),
    ("Ugrave;", [0xD9, 0]),
    ("Upsilon;", [0x3A5, 0]),
    ("Uuml", [0xDC, 0]),
    ("Uuml;", [0xDC, 0]),
    ("Xi;", [0x39E, 0]),
    ("Yacute", [0xDD, 0]),
    ("Yacute;", [0xDD, 0]),
    ("Yuml;", [0x178, 0]),
    ("Zeta;", [0x396, 0]),
    ("aacute", [0xE1, 0]),
    ("aacute;", [0xE1, 0]),
    ("acirc", [0xE2, 0]),
    ("acirc;", [0xE2, 0]),
    ("acute", [0xB4, 0]),
    ("acute;", [0xB4, 0]),
    ("aelig", [0xE6, 0]),
    ("aelig;", [0xE6, 0]),
    ("agrave", [0xE0, 0]),
    ("agrave;", [0xE0, 0]),
    ("alefsym;", [0x2135, 0]),
    ("alpha;", [0x3B1, 0]),
    ("amp", [0x26, 0]),
    ("amp;", [0x26, 0]),
    ("and;", [0x2227, 0]),
    ("ang;", [0x2220, 0]),
    ("apos;", [0x27, 0]),
    ("aring", [0xE5, 0]),
    ("aring;", [0xE5, 0]),
    ("asymp;", [0x2248, 0]),
    ("atilde", [0xE3, 0]),
    ("atilde;", [0xE3, 0]),
    ("auml", [0xE4, 0]),
    ("auml;", [0xE4, 0]),
    ("bdquo;", [0x201E, 0]),
    ("beta;", [0x3B2, 0]),
    ("brvbar", [0xA6, 0]),
    ("brvbar;", [0xA6, 0]),
    ("bull;", [0x2022, 0]),
    ("cap;", [0x2229, 0]),
    ("ccedil", [0xE7, 0]),
    ("ccedil;", [0xE7, 0]),
    ("cedil", [0xB8, 0]),
    ("cedil;", [0xB8, 0]),
    ("cent", [0xA2, 0]),
    ("cent;", [0xA2, 0]),
    ("chi;", [0x3C7, 0]),
    ("circ;", [0x2C6, 0]),
    ("clubs;", [0x2663, 0]),
    ("cong;", [0x2245, 0]),
    ("copy", [0xA9, 0]),
    ("copy;", [0xA9, 0]),
    ("crarr;", [0x21B5, 0]),
    ("cup;", [0x222A, 0]),
    ("curren", [0xA4, 0]),
    ("curren;", [0xA4, 0]),
    ("dArr;", [0x21D3, 0]),
    ("dagger;", [0x2020, 0]),
    ("darr;", [0x2193, 0]),
    ("deg", [0xB0, 0]),
    ("deg;", [0xB0, 0]),
    ("delta;", [0x3B4, 0]),
    ("diams;", [0x2666, 0]),
    ("divide", [0xF7, 0]),
    ("divide;", [0xF7, 0]),
    ("eacute", [0xE9, 0]),
    ("eacute;", [0xE9, 0]),
    ("ecirc", [0xEA, 0]),
    ("ecirc;", [0xEA, 0]),
    ("egrave", [0xE8, 0]),
    ("egrave;", [0xE8, 0]),
    ("empty;", [0x2205, 0]),
    ("emsp;", [0x2003, 0]),
    ("ensp;", [0x2002, 0]),
    ("epsilon;", [0x3B5, 0]),
    ("equiv;", [0x2261, 0]),
    ("eta;", [0x3B7, 0]),
    ("eth", [0xF0, 0]),
    ("eth;", [0xF0, 0]),
    ("euml", [0xEB, 0]),
    ("euml;", [0xEB, 0]),
    ("euro;", [0x20AC, 0]),
    ("exist;", [0x2203, 0]),
    ("fnof;", [0x192, 0]),
    ("forall;", [0x2200, 0]),
    ("frac12", [0xBD, 0]),
    ("frac12;", [0xBD, 0]),
    ("frac14", [0xBC, 0]),
    ("frac14;", [0xBC, 0]),
    ("frac34", [0xBE, 0]),
    ("frac34;", [0xBE, 0]),
    ("frasl;", [0x2044, 0]),
    ("gamma;", [0x3B3, 0]),
    ("ge;", [0x2265, 0]),
    ("gt", [0x3E, 0]),
    ("gt;", [0x3E, 0]),
    ("hArr;", [0x21D4, 0]),
    ("harr;", [0x2194, 0]),
    ("hearts;", [0x2665, 0]),
    ("hellip;", [0x2026, 0]),
    ("iacute", [0xED, 0]),
    ("iacute;", [0xED, 0]),
    ("icirc", [0xEE, 0]),
    ("icirc;", [0xEE, 0]),
    ("iexcl", [0xA1, 0]),
    ("iexcl;", [0xA1, 0]),
    ("igrave", [0xEC, 0]),
    ("igrave;", [0xEC, 0]),
    ("infin;", [0x221E, 0]),
    ("int;", [0x222B, 0]),
    ("iota;", [0x3B9, 0]),
    ("iquest", [0xBF, 0]),
    ("iquest;", [0xBF, 0]),
    ("isin;", [0x2208, 0]),
    ("iuml", [0xEF, 0]),
    ("iuml;", [0xEF, 0]),
    ("kappa;", [0x3BA, 0]),
    ("lArr;", [0x21D0, 0]),
    ("lambda;", [0x3BB, 0]),
    ("lang;", [0x27E8, 0]),
    ("laquo", [0xAB, 0]),
    ("laquo;", [0xAB, 0]),
    ("larr;", [0x2190, 0]),
    ("lceil;", [0x2308, 0]),
    ("ldquo;", [0x201C, 0]),
    ("le;", [0x2264, 0]),
    ("lfloor;", [0x230A, 0]),
    ("lowast;", [0x2217, 0]),
    ("loz;", [0x25CA, 0]),
    ("lrm;", [0x200E, 0]),
    ("lsaquo;", [0x2039, 0]),
    ("lsquo;", [0x2018, 0]),
    ("lt", [0x3C, 0]),
    ("lt;", [0x3C, 0]),
    ("macr", [0xAF, 0]),
    ("macr;", [0xAF, 0]),
    ("mdash;", [0x2014, 0]),
    ("micro", [0xB5, 0]),
    ("micro;", [0xB5, 0]),
    ("middot", [0xB7, 0]),
    ("middot;", [0xB7, 0]),
    ("minus;", [0x2212, 0]),
    ("mu;", [0x3BC, 0]),
    ("nabla;", [0x2207, 0]),
    ("nbsp", [0xA0, 0]),
    ("nbsp;", [0xA0, 0]),
    ("ndash;", [0x2013, 0]),
    ("ne;", [0x2260, 0]),
    ("ni;", [0x220B, 0]),
    ("not", [0xAC, 0]),
    ("not;", [0xAC, 0]),
    ("notin;", [0x2209, 0]),
    ("nsub;", [0x2284, 0]),
    ("ntilde", [0xF1, 0]),
    ("ntilde;", [0xF1, 0]),
    ("nu;", [0x3BD, 0]),
    ("oacute", [0xF3, 0]),
    ("oacute;", [0xF3, 0]),
    ("ocirc", [0xF4, 0]),
    ("ocirc;", [0xF4, 0]),
    ("oelig;", [0x153, 0]),
    ("ograve", [0xF2, 0]),
    ("ograve;", [0xF2, 0]),
    ("oline;", [0x203E, 0]),
    ("omega;", [0x3C9, 0]),
    ("omicron;", [0x3BF, 0]),
    ("oplus;", [0x2295, 0]),
    ("or;", [0x2228, 0]),
    ("ordf", [0xAA, 0]),
    ("ordf;", [0xAA, 0]),
    ("ordm", [0xBA, 0]),
    ("ordm;", [0xBA, 0]),
    ("oslash", [0xF8, 0]),
    ("oslash;", [0xF8, 0]),
    ("otilde", [0xF5, 0]),
    ("otilde;", [0xF5, 0]),
    ("otimes;", [0x2297, 0]),
    ("ouml", [0xF6, 0]),
    ("ouml;", [0xF6, 0]),
    ("para", [0xB6, 0]),
    ("para;", [0xB6, 0]),
    ("part;", [0x2202, 0]),
    ("permil;", [0x2030, 0]),
    ("perp;", [0x22A5, 0]),
    ("phi;", [0x3C6, 0]),
    ("pi;", [0x3C0, 0]),
    ("piv;", [0x3D6, 0]),
    ("plusmn", [0xB1, 0]),
    ("plusmn;", [0xB1, 0]),
    ("pound", [0xA3, 0]),
    ("pound;", [0xA3, 0]),
    ("prime;", [0x2032, 0]),
    ("prod;", [0x220F, 0]),
    ("prop;", [0x221D, 0]),
    ("psi;", [0x3C8, 0]),
    ("quot", [0x22, 0]),
    ("quot;", [0x22, 0]),
    ("rArr;", [0x21D2, 0]),
    ("radic;", [0x221A, 0]),
    ("rang;", [0x27E9, 0]),
    ("raquo", [0xBB, 0]),
    ("raquo;", [0xBB, 0]),
    ("rarr;", [0x2192, 0]),
    ("rceil;", [0x2309, 0]),
    ("rdquo;", [0x201D, 0]),
    ("reg", [0xAE, 0]),
    ("reg;", [0xAE, 0]),
    ("rfloor;", [0x230B, 0]),
    ("rho;", [0x3C1, 0]),
    ("rlm;", [0x200F, 0]),
    ("rsaquo;", [0x203A, 0]),
    ("rsquo;", [0x2019, 0]),
    ("sbquo;", [0x201A, 0]),
    ("scaron;", [0x161, 0]),
    ("sdot;", [0x22C5, 0]),
    ("sect", [0xA7, 0]),
    ("sect;", [0xA7, 0]),
    ("shy", [0xAD, 0]),
    ("shy;", [0xAD, 0]),
    ("sigma;", [0x3C3, 0]),
    ("sigmaf;", [0x3C2, 0]),
    ("sim;", [0x223C, 0]),
    ("spades;", [0x2660, 0]),
    ("sub;", [0x2282, 0]),
    ("sube;", [0x2286, 0]),
    ("sum;", [0x2211, 0]),
    ("sup1", [0xB9, 0]),
    ("sup1;", [0xB9, 0]),
    ("sup2", [0xB2, 0]),
    ("sup2;", [0xB2, 0]),
    ("sup3", [0xB3, 0]),
    ("sup3;", [0xB3, 0]),
    ("sup;", [0x2283, 0]),
    ("supe;", [0x2287, 0]),
    ("szlig", [0xDF, 0]),
    ("szlig;", [0xDF, 0]),
    ("tau;", [0x3C4, 0]),
    ("there4;", [0x2234, 0]),
    ("theta;", [0x3B8, 0]),
    ("thetasym;", [0x3D1, 0]),
    ("thinsp;", [0x2009, 0]),
    ("thorn", [0xFE, 0]),
    ("thorn;", [0xFE, 0]),
    ("tilde;", [0x2DC, 0]),
    ("times", [0xD7, 0]),
    ("times;", [0xD7, 0]),
    ("trade;", [0x2122, 0]),
    ("uArr;", [0x21D1, 0]),
    ("uacute", [0xFA, 0]),
    ("uacute;", [0xFA, 0]),
    ("uarr;", [0x2191, 0]),
    ("ucirc", [0xFB, 0]),
    ("ucirc;", [0xFB, 0]),
    ("ugrave", [0xF9, 0]),
    ("ugrave;", [0xF9, 0]),
    ("uml", [0xA8, 0]),
    ("uml;", [0xA8, 0]),
    ("upsih;", [0x3D2, 0]),
    ("upsilon;", [0x3C5, 0]),
    ("uuml", [0xFC, 0]),
    ("uuml;", [0xFC, 0]),
    ("weierp;", [0x2118, 0]),
    ("xi;", [0x3BE, 0]),
    ("yacute", [0xFD, 0]),
    ("yacute;", [0xFD, 0]),
    ("yen", [0xA5, 0]),
    ("yen;", [0xA5, 0]),
    ("yuml", [0xFF, 0]),
    ("yuml;", [0xFF, 0]),
    ("zeta;", [0x3B6, 0]),
    ("zwj;", [0x200D, 0]),
    ("zwnj;", [0x200C, 0]),
];

#[cfg(test)]
mod test {
    use super::{lookup, NAMED_ENTITIES};

    #[test]
    fn table_is_sorted() {
        for window in NAMED_ENTITIES.windows(2) {
            assert!(
                window[0].0 < window[1].0,
                "out of order: {} >= {}",
                window[0].0,
                window[1].0
            );
        }
    }

    #[test]
    fn exact_match() {
        assert_eq!(lookup("amp;").unwrap().exact, Some([0x26, 0]));
        assert_eq!(lookup("amp").unwrap().exact, Some([0x26, 0]));
        assert_eq!(lookup("not").unwrap().exact, Some([0xAC, 0]));
        assert_eq!(lookup("notin;").unwrap().exact, Some([0x2209, 0]));
    }

    #[test]
    fn prefix_match() {
        assert!(lookup("am").unwrap().exact.is_none());
        assert!(lookup("noti").unwrap().exact.is_none());
        assert!(lookup("q").unwrap().exact.is_none());
    }

    #[test]
    fn no_match() {
        assert!(lookup("notit").is_none());
        assert!(lookup("zz").is_none());
        assert!(lookup("ampx").is_none());
    }
}
