//! Pattern option suffixes.
//!
//! A search or replace pattern may end with `:flags` where flags draw from
//! `i` (ignore case), `e` (exact case), `r` (regex), `p` (plain), `m`
//! (multiline). The rule: if a pattern ends with a colon followed by one or
//! more valid option letters, and the colon is not the first character,
//! everything before the colon is the pattern. In all other cases (including
//! duplicate or conflicting letters) the entire string is the pattern.

use crate::SearchFlags;

/// Split a raw pattern into its text and option flags.
pub fn parse_options(raw: &str) -> (&str, SearchFlags) {
    let Some(colon) = raw.rfind(':') else {
        return (raw, SearchFlags::empty());
    };
    if colon == 0 {
        return (raw, SearchFlags::empty());
    }
    let opts = &raw[colon + 1..];
    if opts.is_empty() || !opts.bytes().all(|c| c.is_ascii_lowercase()) {
        return (raw, SearchFlags::empty());
    }
    let mut flags = SearchFlags::empty();
    for c in opts.bytes() {
        let (flag, conflict) = match c {
            b'i' => (SearchFlags::IGNORE, SearchFlags::IGNORE | SearchFlags::EXACT),
            b'e' => (SearchFlags::EXACT, SearchFlags::IGNORE | SearchFlags::EXACT),
            b'r' => (SearchFlags::REGEX, SearchFlags::REGEX | SearchFlags::PLAIN),
            b'p' => (SearchFlags::PLAIN, SearchFlags::REGEX | SearchFlags::PLAIN),
            b'm' => (SearchFlags::MULTI, SearchFlags::MULTI),
            _ => return (raw, SearchFlags::empty()),
        };
        if flags.intersects(conflict) {
            return (raw, SearchFlags::empty());
        }
        flags.insert(flag);
    }
    (&raw[..colon], flags)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_pattern_untouched() {
        assert_eq!(parse_options("abc"), ("abc", SearchFlags::empty()));
    }

    #[test]
    fn single_options() {
        assert_eq!(parse_options("abc:i"), ("abc", SearchFlags::IGNORE));
        assert_eq!(parse_options("abc:r"), ("abc", SearchFlags::REGEX));
        assert_eq!(parse_options("abc:m"), ("abc", SearchFlags::MULTI));
    }

    #[test]
    fn combined_options() {
        let (pat, flags) = parse_options("foo:ri");
        assert_eq!(pat, "foo");
        assert_eq!(flags, SearchFlags::REGEX | SearchFlags::IGNORE);
    }

    #[test]
    fn conflicts_leave_pattern_intact() {
        assert_eq!(parse_options("abc:ie"), ("abc:ie", SearchFlags::empty()));
        assert_eq!(parse_options("abc:rp"), ("abc:rp", SearchFlags::empty()));
        assert_eq!(parse_options("abc:ii"), ("abc:ii", SearchFlags::empty()));
    }

    #[test]
    fn leading_colon_is_pattern() {
        assert_eq!(parse_options(":i"), (":i", SearchFlags::empty()));
    }

    #[test]
    fn invalid_letters_are_pattern() {
        assert_eq!(parse_options("abc:x"), ("abc:x", SearchFlags::empty()));
        assert_eq!(parse_options("abc:I"), ("abc:I", SearchFlags::empty()));
        assert_eq!(parse_options("ab:i:"), ("ab:i:", SearchFlags::empty()));
    }

    #[test]
    fn inner_colons_belong_to_pattern() {
        assert_eq!(parse_options("a:b:i"), ("a:b", SearchFlags::IGNORE));
    }
}
