// Copyright 2025-2026 The html5lex Project Developers. See the
// COPYRIGHT file at the top-level directory of this distribution.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

macro_rules! unwrap_or_return {
    ($opt:expr) => {{
        let Some(x) = $opt else {
            return;
        };
        x
    }};
    ($opt:expr, $retval:expr) => {{
        let Some(x) = $opt else {
            return $retval;
        };
        x
    }};
}
pub(crate) use unwrap_or_return;

/// Create a [`SmallCharSet`], with each space-separated character stored
/// in the set.
///
/// [`SmallCharSet`]: crate::SmallCharSet
macro_rules! small_char_set ( ($($e:expr)+) => (
    $crate::util::smallcharset::SmallCharSet {
        bits: $( (1 << ($e as usize)) )|+
    }
));
pub(crate) use small_char_set;
