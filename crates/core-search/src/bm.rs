//! Plain-text Boyer–Moore scanning.
//!
//! Forward search scans right-to-left within the pattern using the reversed
//! pattern text and delta tables built from the forward pattern; backward
//! search mirrors the arrangement. Under case-insensitive matching the
//! good-suffix table degenerates to `patlen - i` (good-suffix reasoning is
//! unsound once characters fold), and the last-character table is populated
//! for both cases of every letter.

use crate::source::{Dir, Source, Spot};
use tracing::trace;

/// Delta tables for one scan orientation of one pattern.
#[derive(Debug, Clone)]
pub struct Deltas {
    delta1: Vec<usize>,
    delta2: Vec<usize>,
}

fn flip_case(c: u8) -> u8 {
    if c.is_ascii_lowercase() {
        c.to_ascii_uppercase()
    } else if c.is_ascii_uppercase() {
        c.to_ascii_lowercase()
    } else {
        c
    }
}

fn mk_delta1(pat: &[u8], exact: bool) -> Vec<usize> {
    let len = pat.len();
    let mut delta1 = vec![len; 256];
    for (i, &c) in pat.iter().take(len - 1).enumerate() {
        delta1[c as usize] = len - 1 - i;
        if !exact {
            delta1[flip_case(c) as usize] = len - 1 - i;
        }
    }
    delta1
}

// True if the suffix of pat starting at pos is also a prefix of pat.
fn is_prefix(pat: &[u8], pos: usize) -> bool {
    let suffix_len = pat.len() - pos;
    pat[..suffix_len] == pat[pos..]
}

// Length of the longest suffix of pat ending at pos (inclusive).
fn suffix_length(pat: &[u8], pos: usize) -> usize {
    let len = pat.len();
    let mut i = 0;
    while pat[pos - i] == pat[len - 1 - i] && i < pos {
        i += 1;
    }
    i
}

fn mk_delta2(pat: &[u8], exact: bool) -> Vec<usize> {
    let len = pat.len();
    let mut delta2 = vec![0; len];
    if !exact {
        // Degenerate table: each mismatch advances the window by one.
        for (i, slot) in delta2.iter_mut().enumerate() {
            *slot = len - i;
        }
        return delta2;
    }
    let last = len - 1;
    let mut last_prefix = last;
    let mut i = len;
    while i > 0 {
        if is_prefix(pat, i) {
            last_prefix = i;
        }
        i -= 1;
        delta2[i] = last_prefix + (last - i);
    }
    for i in 0..last {
        let slen = suffix_length(pat, i);
        if pat[i - slen] != pat[last - slen] {
            delta2[last - slen] = last - i + slen;
        }
    }
    delta2
}

/// Both scan orientations, compiled for one case-sensitivity setting.
#[derive(Debug, Clone)]
pub struct BmTables {
    pat: Vec<u8>,
    rev_pat: Vec<u8>,
    fwd: Deltas,
    rev: Deltas,
    pub exact: bool,
}

impl BmTables {
    pub fn compile(pat: &[u8], exact: bool) -> BmTables {
        debug_assert!(!pat.is_empty());
        let rev_pat: Vec<u8> = pat.iter().rev().copied().collect();
        BmTables {
            fwd: Deltas { delta1: mk_delta1(pat, exact), delta2: mk_delta2(pat, exact) },
            rev: Deltas { delta1: mk_delta1(&rev_pat, exact), delta2: mk_delta2(&rev_pat, exact) },
            pat: pat.to_vec(),
            rev_pat,
            exact,
        }
    }
}

/// A successful scan: `start` is the leftmost edge of the match, `end` the
/// rightmost.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub start: Spot,
    pub end: Spot,
    pub len: u64,
}

fn chars_eq(bc: u8, pc: u8, exact: bool) -> bool {
    if exact { bc == pc } else { bc.to_ascii_lowercase() == pc.to_ascii_lowercase() }
}

/// Scan for the `n`th occurrence of the compiled pattern from `from`.
/// The caller's progress hook runs once if the scan outlives the threshold.
pub fn scan(
    src: &Source<'_>,
    from: Spot,
    dir: Dir,
    n: usize,
    tables: &BmTables,
    progress_after: u32,
    mut progress: Option<&mut dyn FnMut()>,
) -> Option<Span> {
    // Comparisons always run opposite to the search direction so the
    // pattern is examined right-to-left relative to the window.
    let sdir = dir.flip();
    let (pattern, deltas) = match dir {
        Dir::Forward => (&tables.rev_pat, &tables.fwd),
        Dir::Backward => (&tables.pat, &tables.rev),
    };
    let patlen = pattern.len();
    let mut spot = from;
    let mut jump = patlen;
    let mut left = n;
    let mut loops: u32 = 0;

    while src.jump(&mut spot, jump, dir) {
        // Window edge; a full compare walks back to the other edge. The
        // compare leaves `spot` wherever it stopped, which is exactly where
        // the next delta jump must be applied from.
        let window = spot;
        let mut ok = true;
        for (i, &pc) in pattern.iter().enumerate() {
            let pati = patlen - 1 - i;
            match src.next_ch(&mut spot, sdir) {
                Some(bc) if chars_eq(bc, pc, tables.exact) => {}
                Some(bc) => {
                    jump = deltas.delta1[bc as usize].max(deltas.delta2[pati]) + 1;
                    ok = false;
                    break;
                }
                None => return None,
            }
        }
        if ok {
            let span = match dir {
                Dir::Forward => Span { start: spot, end: window, len: patlen as u64 },
                Dir::Backward => Span { start: window, end: spot, len: patlen as u64 },
            };
            trace!(target: "search.bm", len = patlen, "match");
            left -= 1;
            if left == 0 {
                return Some(span);
            }
            // Skip past this match before looking for the next.
            jump = patlen * 2;
        }
        if loops <= progress_after {
            let tick = loops;
            loops += 1;
            if tick == progress_after
                && let Some(hook) = progress.as_deref_mut()
            {
                hook();
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_text::TextCore;

    fn find_all(text: &str, pat: &str, exact: bool) -> Vec<u64> {
        let core = TextCore::from_bytes(text.as_bytes());
        let src = Source::Buf(&core);
        let tables = BmTables::compile(pat.as_bytes(), exact);
        let mut out = Vec::new();
        let mut from = src.start();
        while let Some(span) = scan(&src, from, Dir::Forward, 1, &tables, u32::MAX, None) {
            out.push(core.point_offset(span.start.to_point()));
            from = span.end;
        }
        out
    }

    #[test]
    fn forward_scan_finds_in_order() {
        assert_eq!(find_all("abc XYZ abc", "abc", true), vec![0, 8]);
    }

    #[test]
    fn no_match_returns_none() {
        assert_eq!(find_all("abc XYZ abc", "abq", true), Vec::<u64>::new());
    }

    #[test]
    fn case_insensitive_scan() {
        assert_eq!(find_all("Hello, HELLO", "hello", false), vec![0, 7]);
        assert_eq!(find_all("Hello, HELLO", "hello", true), Vec::<u64>::new());
    }

    #[test]
    fn matches_across_lines() {
        assert_eq!(find_all("ab\ncd", "b\nc", true), vec![1]);
    }

    #[test]
    fn backward_scan_finds_previous() {
        let core = TextCore::from_bytes(b"abc XYZ abc");
        let src = Source::Buf(&core);
        let tables = BmTables::compile(b"abc", true);
        let span = scan(&src, src.end(), Dir::Backward, 1, &tables, u32::MAX, None).unwrap();
        assert_eq!(core.point_offset(span.start.to_point()), 8);
        let again = scan(&src, span.start, Dir::Backward, 1, &tables, u32::MAX, None).unwrap();
        assert_eq!(core.point_offset(again.start.to_point()), 0);
        assert!(scan(&src, again.start, Dir::Backward, 1, &tables, u32::MAX, None).is_none());
    }

    #[test]
    fn nth_match_counting() {
        let core = TextCore::from_bytes(b"x.x.x.x");
        let src = Source::Buf(&core);
        let tables = BmTables::compile(b"x", true);
        let span = scan(&src, src.start(), Dir::Forward, 3, &tables, u32::MAX, None).unwrap();
        assert_eq!(core.point_offset(span.start.to_point()), 4);
        assert!(scan(&src, src.start(), Dir::Forward, 5, &tables, u32::MAX, None).is_none());
    }

    #[test]
    fn delta_tables_shape() {
        let t = BmTables::compile(b"abcab", true);
        // delta1: distance from last char; 'a' occurs at 3 -> 1, 'b' at 4? no,
        // only indices 0..len-1 participate: a@3 -> 1, b@1 -> 3, c@2 -> 2.
        assert_eq!(t.fwd.delta1[b'a' as usize], 1);
        assert_eq!(t.fwd.delta1[b'b' as usize], 3);
        assert_eq!(t.fwd.delta1[b'c' as usize], 2);
        assert_eq!(t.fwd.delta1[b'z' as usize], 5);
        let loose = BmTables::compile(b"ab", false);
        assert_eq!(loose.fwd.delta1[b'A' as usize], 1);
        assert_eq!(loose.fwd.delta2, vec![2, 1]);
    }

    #[test]
    fn overlapping_matches_are_skipped() {
        // After a match the scan resumes past it.
        assert_eq!(find_all("aaaa", "aa", true), vec![0, 2]);
    }

    #[test]
    fn string_source_scan() {
        let src = Source::Str(b"one two one");
        let tables = BmTables::compile(b"one", true);
        let span = scan(&src, src.start(), Dir::Forward, 2, &tables, u32::MAX, None).unwrap();
        assert_eq!(span.start.str_offset(), 8);
    }
}
