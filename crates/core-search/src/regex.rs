//! Regex compiler and backtracking matcher.
//!
//! The pattern language is deliberately small: literals, `.`, `^`/`$`,
//! `\A`/`\z`/`\Z`, `\b`/`\B`, class escapes, `[...]` classes, groups `(…)`
//! up to 9, and closures `*` `+` `?` `{m}` `{m,n}` `{m,}` with a trailing
//! `?` for lazy matching. No alternation.
//!
//! Compilation produces a linear array of metacharacter nodes; a reverse
//! program is the same array reversed, valid for right-to-left scanning
//! because anchors and group markers are position-symmetric. Matching is an
//! anchored recursive walk at one scan position; the outer driver advances
//! one character per failure and stops after the source boundary has been
//! seen twice, so zero-width anchors can match at the very edge.

use crate::source::{Dir, Source, Spot};
use crate::SearchError;
use tracing::trace;

pub const MAX_GROUPS: usize = 9;

/// 256-bit character membership map.
#[derive(Clone, PartialEq, Eq)]
pub struct ClassMap([u8; 32]);

impl std::fmt::Debug for ClassMap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ClassMap(..)")
    }
}

impl ClassMap {
    fn new() -> Self {
        ClassMap([0; 32])
    }

    fn set(&mut self, c: u8) {
        self.0[(c >> 3) as usize] |= 1 << (c & 7);
    }

    fn set_range(&mut self, from: u8, to: u8) {
        for c in from..=to {
            self.set(c);
        }
    }

    pub fn test(&self, c: u8) -> bool {
        self.0[(c >> 3) as usize] & (1 << (c & 7)) != 0
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    Lit(u8),
    Any,
    Class(ClassMap),
    NClass(ClassMap),
    Bol,
    Eol,
    Bos,
    Eos,
    EosAlt,
    WordBound { negate: bool },
    GroupBegin(usize),
    GroupEnd(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Closure {
    pub min: u32,
    pub max: Option<u32>,
    pub lazy: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetaNode {
    pub kind: NodeKind,
    pub closure: Option<Closure>,
}

/// A compiled pattern: forward and reverse programs plus group count.
/// `regical` is false when no metacharacter survived compilation, in which
/// case the plain scanner is the right engine.
#[derive(Debug, Clone)]
pub struct ReProgram {
    pub fwd: Vec<MetaNode>,
    pub rev: Vec<MetaNode>,
    pub group_count: usize,
    pub regical: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct MatchFlags {
    pub exact: bool,
    pub multi: bool,
}

// -------------------------------------------------------------------------
// Compilation
// -------------------------------------------------------------------------

fn class_escape(map: &mut ClassMap, c: u8, words: &[bool; 256]) -> bool {
    match c {
        b'd' => map.set_range(b'0', b'9'),
        b'l' => {
            map.set_range(b'a', b'z');
            map.set_range(b'A', b'Z');
        }
        b's' => {
            for w in [b' ', b'\t', b'\r', b'\n', b'\x0C'] {
                map.set(w);
            }
        }
        b'w' => {
            for (i, &is_word) in words.iter().enumerate() {
                if is_word {
                    map.set(i as u8);
                }
            }
        }
        _ => return false,
    }
    true
}

/// Parse a `[...]` class starting after the opening bracket; returns the
/// node kind and the number of pattern bytes consumed (excluding `[`).
fn parse_class(
    pat: &[u8],
    words: &[bool; 256],
) -> Result<(NodeKind, usize), SearchError> {
    let mut map = ClassMap::new();
    let mut i = 0;
    let negate = pat.first() == Some(&b'^');
    if negate {
        i += 1;
    }
    if pat.get(i) == Some(&b']') || pat.get(i).is_none() {
        return Err(SearchError::EmptyClass);
    }
    // Pending start of a range; ranges resolve when the atom after '-' is
    // read.
    let mut range_start: Option<u8> = None;
    while let Some(&c) = pat.get(i) {
        if c == b']' {
            if let Some(start) = range_start {
                // Class ended right after '-': both are plain.
                map.set(start);
                map.set(b'-');
            }
            let kind = if negate { NodeKind::NClass(map) } else { NodeKind::Class(map) };
            return Ok((kind, i + 1));
        }
        match c {
            b'-' if pat.get(i + 1).is_some_and(|&n| n != b']') => {
                if range_start.is_some() {
                    // "a--": treat the pending pieces as plain characters.
                    map.set(range_start.take().expect("checked"));
                    map.set(b'-');
                    i += 1;
                    continue;
                }
                // '-' with no preceding atom is plain.
                map.set(b'-');
                i += 1;
            }
            b'\\' => {
                let Some(&esc) = pat.get(i + 1) else {
                    return Err(SearchError::UnendedClass);
                };
                let plain = match esc {
                    b't' => Some(b'\t'),
                    b'r' => Some(b'\r'),
                    b'n' => Some(b'\n'),
                    b'f' => Some(b'\x0C'),
                    _ => None,
                };
                if let Some(ch) = plain {
                    i += 2;
                    resolve_atom(&mut map, &mut range_start, ch, pat.get(i));
                } else if class_escape(&mut map, esc, words) {
                    // Multi-character escapes cannot end a range.
                    if let Some(start) = range_start.take() {
                        map.set(start);
                        map.set(b'-');
                    }
                    i += 2;
                } else {
                    i += 2;
                    resolve_atom(&mut map, &mut range_start, esc, pat.get(i));
                }
            }
            _ => {
                i += 1;
                resolve_atom(&mut map, &mut range_start, c, pat.get(i));
            }
        }
    }
    Err(SearchError::UnendedClass)
}

// Feed one literal atom into the class: either it closes a pending range,
// opens one (when a '-' follows), or is a singleton.
fn resolve_atom(map: &mut ClassMap, range_start: &mut Option<u8>, c: u8, next: Option<&u8>) {
    if let Some(start) = range_start.take() {
        if c < start {
            // Wrong order: everything is plain.
            map.set(start);
            map.set(b'-');
            map.set(c);
        } else {
            map.set_range(start, c);
        }
    } else if next == Some(&b'-') {
        *range_start = Some(c);
    } else {
        map.set(c);
    }
}

/// Compile a pattern into forward and reverse programs.
pub fn compile(pat: &[u8], words: &[bool; 256]) -> Result<ReProgram, SearchError> {
    let shown = || String::from_utf8_lossy(pat).into_owned();
    let mut nodes: Vec<MetaNode> = Vec::new();
    let mut regical = false;
    let mut group_count = 0usize;
    let mut group_stack: Vec<usize> = Vec::new();
    // Whether the node just emitted may take a closure.
    let mut closable = false;
    let mut i = 0;

    while i < pat.len() {
        let c = pat[i];
        match c {
            b'[' => {
                let (kind, used) = parse_class(&pat[i + 1..], words)?;
                nodes.push(MetaNode { kind, closure: None });
                regical = true;
                closable = true;
                i += 1 + used;
                continue;
            }
            b'^' => {
                nodes.push(MetaNode { kind: NodeKind::Bol, closure: None });
                regical = true;
                closable = false;
            }
            b'$' => {
                nodes.push(MetaNode { kind: NodeKind::Eol, closure: None });
                regical = true;
                closable = false;
            }
            b'.' => {
                nodes.push(MetaNode { kind: NodeKind::Any, closure: None });
                regical = true;
                closable = true;
            }
            b'*' | b'+' => {
                if !closable {
                    return Err(SearchError::BadRepetition(shown()));
                }
                attach_closure(
                    &mut nodes,
                    Closure { min: u32::from(c == b'+'), max: None, lazy: false },
                    &shown,
                )?;
                regical = true;
                closable = false;
            }
            b'?' => {
                if closable {
                    attach_closure(
                        &mut nodes,
                        Closure { min: 0, max: Some(1), lazy: false },
                        &shown,
                    )?;
                    closable = false;
                } else {
                    // Closure modifier: make the previous closure lazy.
                    match nodes.last_mut() {
                        Some(node) if node.closure.is_some() => {
                            node.closure.as_mut().expect("checked").lazy = true;
                        }
                        _ => return Err(SearchError::BadRepetition(shown())),
                    }
                }
                regical = true;
            }
            b'{' => {
                if !closable {
                    if pat.get(i + 1).is_some_and(u8::is_ascii_digit) {
                        return Err(SearchError::BadRepetition(shown()));
                    }
                    nodes.push(MetaNode { kind: NodeKind::Lit(b'{'), closure: None });
                    closable = true;
                    i += 1;
                    continue;
                }
                let (closure, used) = parse_counts(&pat[i + 1..]).ok_or_else(|| {
                    SearchError::BadRepetition(shown())
                })?;
                attach_closure(&mut nodes, closure, &shown)?;
                regical = true;
                closable = false;
                i += 1 + used;
                continue;
            }
            b'(' => {
                if group_count >= MAX_GROUPS {
                    return Err(SearchError::TooManyGroups(shown()));
                }
                group_count += 1;
                group_stack.push(group_count);
                nodes.push(MetaNode { kind: NodeKind::GroupBegin(group_count), closure: None });
                regical = true;
                closable = false;
            }
            b')' => {
                let Some(group) = group_stack.pop() else {
                    return Err(SearchError::UnmatchedParen(shown()));
                };
                nodes.push(MetaNode { kind: NodeKind::GroupEnd(group), closure: None });
                regical = true;
                closable = false;
            }
            b'\\' => {
                i += 1;
                let esc = pat.get(i).copied().unwrap_or(b'\\');
                regical = true;
                let lit = match esc {
                    b't' => Some(b'\t'),
                    b'r' => Some(b'\r'),
                    b'n' => Some(b'\n'),
                    b'f' => Some(b'\x0C'),
                    b'd' | b'D' | b'l' | b'L' | b's' | b'S' | b'w' | b'W' => {
                        let mut map = ClassMap::new();
                        class_escape(&mut map, esc.to_ascii_lowercase(), words);
                        let kind = if esc.is_ascii_uppercase() {
                            NodeKind::NClass(map)
                        } else {
                            NodeKind::Class(map)
                        };
                        nodes.push(MetaNode { kind, closure: None });
                        closable = true;
                        i += 1;
                        continue;
                    }
                    b'b' => {
                        nodes.push(MetaNode {
                            kind: NodeKind::WordBound { negate: false },
                            closure: None,
                        });
                        closable = false;
                        i += 1;
                        continue;
                    }
                    b'B' => {
                        nodes.push(MetaNode {
                            kind: NodeKind::WordBound { negate: true },
                            closure: None,
                        });
                        closable = false;
                        i += 1;
                        continue;
                    }
                    b'A' => {
                        nodes.push(MetaNode { kind: NodeKind::Bos, closure: None });
                        closable = false;
                        i += 1;
                        continue;
                    }
                    b'z' => {
                        nodes.push(MetaNode { kind: NodeKind::Eos, closure: None });
                        closable = false;
                        i += 1;
                        continue;
                    }
                    b'Z' => {
                        nodes.push(MetaNode { kind: NodeKind::EosAlt, closure: None });
                        closable = false;
                        i += 1;
                        continue;
                    }
                    other => Some(other),
                };
                if let Some(lit) = lit {
                    nodes.push(MetaNode { kind: NodeKind::Lit(lit), closure: None });
                    closable = true;
                }
            }
            _ => {
                nodes.push(MetaNode { kind: NodeKind::Lit(c), closure: None });
                closable = true;
            }
        }
        i += 1;
    }

    if !group_stack.is_empty() {
        return Err(SearchError::UnendedGroup(shown()));
    }
    let rev: Vec<MetaNode> = nodes.iter().rev().cloned().collect();
    trace!(target: "search.re", nodes = nodes.len(), groups = group_count, "compiled");
    Ok(ReProgram { fwd: nodes, rev, group_count, regical })
}

fn attach_closure(
    nodes: &mut [MetaNode],
    closure: Closure,
    shown: &dyn Fn() -> String,
) -> Result<(), SearchError> {
    match nodes.last_mut() {
        Some(node) => {
            if matches!(node.kind, NodeKind::GroupEnd(_)) {
                return Err(SearchError::ClosureOnGroup(shown()));
            }
            node.closure = Some(closure);
            Ok(())
        }
        None => Err(SearchError::BadRepetition(shown())),
    }
}

/// Parse `{m}`, `{m,}`, or `{m,n}` after the opening brace; returns the
/// closure and bytes consumed (including the closing brace).
fn parse_counts(pat: &[u8]) -> Option<(Closure, usize)> {
    let mut i = 0;
    let mut read_int = |i: &mut usize| -> Option<u32> {
        let start = *i;
        while pat.get(*i).is_some_and(u8::is_ascii_digit) {
            *i += 1;
        }
        if *i == start {
            return None;
        }
        std::str::from_utf8(&pat[start..*i]).ok()?.parse().ok()
    };
    let min = read_int(&mut i)?;
    let max = match pat.get(i) {
        Some(b'}') => Some(min),
        Some(b',') => {
            i += 1;
            if pat.get(i) == Some(&b'}') {
                None
            } else {
                let max = read_int(&mut i)?;
                if max == 0 || max < min {
                    return None;
                }
                Some(max)
            }
        }
        _ => return None,
    };
    if pat.get(i) != Some(&b'}') {
        return None;
    }
    Some((Closure { min, max, lazy: false }, i + 1))
}

// -------------------------------------------------------------------------
// Matching
// -------------------------------------------------------------------------

/// Per-group capture bookkeeping during a match attempt.
#[derive(Debug, Clone, Copy, Default)]
pub struct GroupSlot {
    pub start: Option<Spot>,
    pub base: i64,
    pub end_len: Option<i64>,
}

impl GroupSlot {
    /// Signed capture length once both markers have run.
    pub fn signed_len(&self) -> Option<i64> {
        self.end_len.map(|e| self.base + e)
    }
}

fn node_eq(
    c: Option<u8>,
    node: &MetaNode,
    flags: MatchFlags,
) -> bool {
    let Some(c) = c else {
        return false;
    };
    match &node.kind {
        NodeKind::Lit(p) => {
            if flags.exact {
                c == *p
            } else {
                c.to_ascii_lowercase() == p.to_ascii_lowercase()
            }
        }
        NodeKind::Any => c != b'\n' || flags.multi,
        NodeKind::Class(map) => {
            map.test(c) || (!flags.exact && map.test(flip(c)))
        }
        NodeKind::NClass(map) => {
            (c != b'\n' || flags.multi)
                && !map.test(c)
                && (flags.exact || !map.test(flip(c)))
        }
        _ => false,
    }
}

fn flip(c: u8) -> u8 {
    if c.is_ascii_lowercase() {
        c.to_ascii_uppercase()
    } else if c.is_ascii_uppercase() {
        c.to_ascii_lowercase()
    } else {
        c
    }
}

// True when none of the remaining nodes would consume a character, so a
// match can complete at a source boundary.
fn still(nodes: &[MetaNode]) -> bool {
    nodes.iter().all(|n| {
        matches!(
            n.kind,
            NodeKind::Bol
                | NodeKind::Eol
                | NodeKind::Bos
                | NodeKind::Eos
                | NodeKind::EosAlt
                | NodeKind::WordBound { .. }
                | NodeKind::GroupBegin(_)
                | NodeKind::GroupEnd(_)
        )
    })
}

fn anchor_holds(src: &Source<'_>, spot: Spot, kind: &NodeKind, flags: MatchFlags) -> bool {
    // An empty source always satisfies anchors.
    if src.is_empty() {
        return true;
    }
    match kind {
        NodeKind::Bol => src.at_bol(spot),
        NodeKind::Eol => src.at_eol(spot),
        NodeKind::Bos => {
            if flags.multi {
                src.at_start(spot)
            } else {
                src.at_bol(spot)
            }
        }
        NodeKind::Eos => {
            if flags.multi {
                src.at_end(spot)
            } else {
                src.at_eol(spot)
            }
        }
        NodeKind::EosAlt => {
            if flags.multi {
                src.at_end_alt(spot)
            } else {
                src.at_eol(spot)
            }
        }
        _ => unreachable!("not an anchor"),
    }
}

/// Anchored match at `*spot` walking `dir`. On success updates `*spot` past
/// the match and adds the consumed character count to `*len`.
#[allow(clippy::too_many_arguments)]
fn amatch(
    nodes: &[MetaNode],
    src: &Source<'_>,
    dir: Dir,
    flags: MatchFlags,
    words: &[bool; 256],
    len: &mut i64,
    spot: &mut Spot,
    groups: &mut [GroupSlot],
) -> bool {
    let mut scan = *spot;
    let mut i = 0;
    while i < nodes.len() {
        let node = &nodes[i];
        if let Some(cl) = node.closure {
            if cl.lazy {
                // Lazy: match the minimum, then grow one at a time while the
                // rest of the pattern refuses to match.
                for _ in 0..cl.min {
                    if !node_eq(src.next_ch(&mut scan, dir), node, flags) {
                        return false;
                    }
                    *len += 1;
                }
                if cl.max == Some(cl.min) {
                    i += 1;
                    continue;
                }
                let mut budget = cl.max.map_or(i64::MAX, |m| i64::from(m - cl.min));
                loop {
                    let pre = *len;
                    if amatch(&nodes[i + 1..], src, dir, flags, words, len, &mut scan, groups) {
                        *spot = scan;
                        return true;
                    }
                    *len = pre;
                    budget -= 1;
                    if budget < 0 || !node_eq(src.next_ch(&mut scan, dir), node, flags) {
                        return false;
                    }
                    *len += 1;
                }
            }
            // Greedy: munch as many as possible, then shrink per failure of
            // the rest of the pattern.
            let min = i64::from(cl.min);
            let mut budget = cl.max.map_or(i64::MAX, i64::from);
            let mut matched: i64 = 0;
            let mut at_edge;
            loop {
                if budget == 0 {
                    at_edge = src.next_ch(&mut scan, dir).is_none();
                    break;
                }
                let c = src.next_ch(&mut scan, dir);
                if !node_eq(c, node, flags) {
                    at_edge = c.is_none();
                    break;
                }
                matched += 1;
                budget -= 1;
            }
            let rest = &nodes[i + 1..];
            *len += matched;
            loop {
                if matched < min {
                    *len -= matched;
                    return false;
                }
                if at_edge {
                    if still(rest) {
                        // Check the remaining zero-width nodes here at the
                        // boundary.
                        break;
                    }
                    at_edge = false;
                    *len -= 1;
                } else if src.next_ch(&mut scan, dir.flip()).is_none() {
                    *len -= 1;
                } else {
                    let pre = *len;
                    if amatch(rest, src, dir, flags, words, len, &mut scan, groups) {
                        *spot = scan;
                        return true;
                    }
                    *len = pre - 1;
                }
                matched -= 1;
            }
            i += 1;
            continue;
        }
        match &node.kind {
            NodeKind::GroupBegin(k) => {
                let slot = &mut groups[*k];
                slot.start = Some(scan);
                slot.base = if dir == Dir::Forward { -*len } else { *len };
                slot.end_len = None;
            }
            NodeKind::GroupEnd(k) => {
                groups[*k].end_len = Some(if dir == Dir::Forward { *len } else { -*len });
            }
            NodeKind::Bol | NodeKind::Eol | NodeKind::Bos | NodeKind::Eos | NodeKind::EosAlt => {
                if !anchor_holds(src, scan, &node.kind, flags) {
                    return false;
                }
            }
            NodeKind::WordBound { negate } => {
                let before = src.is_word_at(scan, -1, words);
                let at = src.is_word_at(scan, 0, words);
                if (before == at) == !negate {
                    return false;
                }
            }
            _ => {
                if !node_eq(src.next_ch(&mut scan, dir), node, flags) {
                    return false;
                }
                *len += 1;
            }
        }
        i += 1;
    }
    *spot = scan;
    true
}

/// One successful regex match, in source coordinates.
#[derive(Debug, Clone)]
pub struct ReFound {
    pub start: Spot,
    pub end: Spot,
    pub len: u64,
    /// Captured text per group; index 0 is the whole match.
    pub groups: Vec<Vec<u8>>,
}

/// Scan for the `n`th regex match from `from` in the given direction. The
/// reverse program drives backward scans. Stops after crossing the source
/// boundary twice so zero-width anchors can match at the edge.
#[allow(clippy::too_many_arguments)]
pub fn scan(
    src: &Source<'_>,
    from: Spot,
    dir: Dir,
    n: usize,
    prog: &ReProgram,
    flags: MatchFlags,
    words: &[bool; 256],
    progress_after: u32,
    mut progress: Option<&mut dyn FnMut()>,
) -> Option<ReFound> {
    let nodes = match dir {
        Dir::Forward => &prog.fwd,
        Dir::Backward => &prog.rev,
    };
    let mut spot = from;
    let mut hit_boundary = false;
    let mut left = n;
    let mut loops: u32 = 0;

    loop {
        let origin = spot;
        let mut len: i64 = 0;
        let mut slots = [GroupSlot::default(); MAX_GROUPS + 1];
        let mut scan_spot = spot;
        if amatch(nodes, src, dir, flags, words, &mut len, &mut scan_spot, &mut slots) {
            let (start, end) = match dir {
                Dir::Forward => (origin, scan_spot),
                Dir::Backward => (scan_spot, origin),
            };
            left -= 1;
            if left == 0 {
                let mut groups = Vec::with_capacity(prog.group_count + 1);
                groups.push(src.extract(start, len));
                for slot in slots.iter().take(prog.group_count + 1).skip(1) {
                    match (slot.start, slot.signed_len()) {
                        (Some(at), Some(signed)) => groups.push(src.extract(at, signed)),
                        _ => groups.push(Vec::new()),
                    }
                }
                trace!(target: "search.re", len, "match");
                return Some(ReFound { start, end, len: len.unsigned_abs(), groups });
            }
            spot = scan_spot;
        } else {
            let _ = src.next_ch(&mut spot, dir);
        }
        if src.at_boundary(spot, dir) {
            if hit_boundary {
                return None;
            }
            hit_boundary = true;
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
}

/// Match the compiled pattern against a byte string: forward from
/// `scan_off`, or backward from the end when `scan_off` is negative.
/// Returns the match offset and captures.
pub fn match_str(
    text: &[u8],
    scan_off: i64,
    prog: &ReProgram,
    flags: MatchFlags,
    words: &[bool; 256],
) -> Option<ReFound> {
    let src = Source::Str(text);
    let (from, dir) = if scan_off < 0 {
        (Spot::Str(text.len()), Dir::Backward)
    } else {
        (Spot::Str(scan_off as usize), Dir::Forward)
    };
    scan(&src, from, dir, 1, prog, flags, words, u32::MAX, None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_text::TextCore;

    fn words() -> [bool; 256] {
        let mut table = [false; 256];
        for c in 0..=255u8 {
            if c.is_ascii_alphanumeric() || c == b'_' {
                table[c as usize] = true;
            }
        }
        table
    }

    fn flags() -> MatchFlags {
        MatchFlags { exact: true, multi: false }
    }

    fn first_match(text: &str, pat: &str) -> Option<(u64, String, Vec<String>)> {
        let core = TextCore::from_bytes(text.as_bytes());
        let src = Source::Buf(&core);
        let prog = compile(pat.as_bytes(), &words()).unwrap();
        let found = scan(&src, src.start(), Dir::Forward, 1, &prog, flags(), &words(), u32::MAX, None)?;
        let offset = core.point_offset(found.start.to_point());
        let whole = String::from_utf8_lossy(&found.groups[0]).into_owned();
        let rest = found.groups[1..]
            .iter()
            .map(|g| String::from_utf8_lossy(g).into_owned())
            .collect();
        Some((offset, whole, rest))
    }

    #[test]
    fn literal_match() {
        assert_eq!(first_match("abc", "b").unwrap(), (1, "b".into(), vec![]));
    }

    #[test]
    fn groups_capture() {
        let (off, whole, groups) = first_match("x=42; y=7", "([a-z])=([0-9]+)").unwrap();
        assert_eq!(off, 0);
        assert_eq!(whole, "x=42");
        assert_eq!(groups, vec!["x".to_string(), "42".to_string()]);
    }

    #[test]
    fn greedy_and_lazy_closures() {
        let (_, whole, _) = first_match("aaab", "a+").unwrap();
        assert_eq!(whole, "aaa");
        let (_, whole, _) = first_match("aaab", "a+?").unwrap();
        assert_eq!(whole, "a");
        let (_, whole, _) = first_match("aaab", "a*b").unwrap();
        assert_eq!(whole, "aaab");
        let (_, whole, _) = first_match("abab", "a.?b").unwrap();
        assert_eq!(whole, "ab"); // greedy '.?' takes 'b', then shrinks
    }

    #[test]
    fn counted_closures() {
        let (_, whole, _) = first_match("aaaa", "a{2}").unwrap();
        assert_eq!(whole, "aa");
        let (_, whole, _) = first_match("aaaa", "a{2,3}").unwrap();
        assert_eq!(whole, "aaa");
        let (_, whole, _) = first_match("aaaa", "a{2,}").unwrap();
        assert_eq!(whole, "aaaa");
        let (_, whole, _) = first_match("aaaa", "a{2,3}?").unwrap();
        assert_eq!(whole, "aa");
        assert!(first_match("a", "a{2}").is_none());
    }

    #[test]
    fn anchors() {
        assert_eq!(first_match("ab\ncd", "^cd").unwrap().0, 3);
        assert_eq!(first_match("ab\ncd", "ab$").unwrap().0, 0);
        assert!(first_match("ab\ncd", "^b").is_none());
    }

    #[test]
    fn dot_excludes_newline_unless_multi() {
        assert!(first_match("a\nb", "a.b").is_none());
        let core = TextCore::from_bytes(b"a\nb");
        let src = Source::Buf(&core);
        let prog = compile(b"a.b", &words()).unwrap();
        let multi = MatchFlags { exact: true, multi: true };
        assert!(scan(&src, src.start(), Dir::Forward, 1, &prog, multi, &words(), u32::MAX, None).is_some());
    }

    #[test]
    fn classes_and_escapes() {
        assert_eq!(first_match("ab12", "\\d+").unwrap().1, "12");
        assert_eq!(first_match("ab 12", "\\s").unwrap().0, 2);
        assert_eq!(first_match("ab12", "[^a-z]+").unwrap().1, "12");
        assert_eq!(first_match("a-b", "[a-]+").unwrap().1, "a-");
        assert_eq!(first_match("x\ty", "\\t").unwrap().0, 1);
    }

    #[test]
    fn word_boundaries() {
        assert_eq!(first_match("foo bar", "\\bbar").unwrap().0, 4);
        assert_eq!(first_match("foobar", "\\Bbar").unwrap().0, 3);
        assert!(first_match("foo bar", "\\Bbar").is_none());
    }

    #[test]
    fn string_anchors() {
        // Non-multi: \A and \z behave like line anchors.
        assert_eq!(first_match("ab\ncd", "\\Acd").unwrap().0, 3);
        let core = TextCore::from_bytes(b"ab\ncd");
        let src = Source::Buf(&core);
        let multi = MatchFlags { exact: true, multi: true };
        let prog = compile(b"\\Aab", &words()).unwrap();
        assert!(scan(&src, src.start(), Dir::Forward, 1, &prog, multi, &words(), u32::MAX, None).is_some());
        let prog = compile(b"\\Acd", &words()).unwrap();
        assert!(scan(&src, src.start(), Dir::Forward, 1, &prog, multi, &words(), u32::MAX, None).is_none());
        let prog = compile(b"cd\\z", &words()).unwrap();
        assert!(scan(&src, src.start(), Dir::Forward, 1, &prog, multi, &words(), u32::MAX, None).is_some());
    }

    #[test]
    fn zero_width_match_at_buffer_end() {
        // "$" alone matches at every line end, including the final edge.
        let core = TextCore::from_bytes(b"ab");
        let src = Source::Buf(&core);
        let prog = compile(b"$", &words()).unwrap();
        let found = scan(&src, src.start(), Dir::Forward, 1, &prog, flags(), &words(), u32::MAX, None).unwrap();
        assert_eq!(found.len, 0);
        assert_eq!(core.point_offset(found.start.to_point()), 2);
    }

    #[test]
    fn reverse_program_scans_backward() {
        let core = TextCore::from_bytes(b"x=1 y=22 z=333");
        let src = Source::Buf(&core);
        let prog = compile(b"[a-z]=[0-9]+", &words()).unwrap();
        let found = scan(&src, src.end(), Dir::Backward, 1, &prog, flags(), &words(), u32::MAX, None).unwrap();
        assert_eq!(core.point_offset(found.start.to_point()), 9);
        assert_eq!(found.groups[0], b"z=333");
        let again = scan(&src, found.start, Dir::Backward, 1, &prog, flags(), &words(), u32::MAX, None).unwrap();
        assert_eq!(again.groups[0], b"y=22");
    }

    #[test]
    fn backward_group_capture() {
        let core = TextCore::from_bytes(b"ab=12");
        let src = Source::Buf(&core);
        let prog = compile(b"([a-z]+)=([0-9]+)", &words()).unwrap();
        let found = scan(&src, src.end(), Dir::Backward, 1, &prog, flags(), &words(), u32::MAX, None).unwrap();
        assert_eq!(found.groups[0], b"ab=12");
        assert_eq!(found.groups[1], b"ab");
        assert_eq!(found.groups[2], b"12");
    }

    #[test]
    fn forward_and_reverse_agree() {
        // search(p, S, fwd) and search(reverse-program, reverse walk) find
        // the same spans.
        let text = b"foo1 bar22 foo33";
        let core = TextCore::from_bytes(text);
        let src = Source::Buf(&core);
        let prog = compile(b"[a-z]+[0-9]+", &words()).unwrap();
        let mut fwd_spans = Vec::new();
        let mut from = src.start();
        while let Some(f) =
            scan(&src, from, Dir::Forward, 1, &prog, flags(), &words(), u32::MAX, None)
        {
            fwd_spans.push((core.point_offset(f.start.to_point()), f.len));
            if f.len == 0 {
                break;
            }
            from = f.end;
        }
        let mut back_spans = Vec::new();
        let mut from = src.end();
        while let Some(f) =
            scan(&src, from, Dir::Backward, 1, &prog, flags(), &words(), u32::MAX, None)
        {
            back_spans.push((core.point_offset(f.start.to_point()), f.len));
            if f.len == 0 {
                break;
            }
            from = f.start;
        }
        back_spans.reverse();
        assert_eq!(fwd_spans, back_spans);
        assert_eq!(fwd_spans.len(), 3);
    }

    #[test]
    fn case_folding() {
        let core = TextCore::from_bytes(b"FOO");
        let src = Source::Buf(&core);
        let prog = compile(b"foo", &words()).unwrap();
        let loose = MatchFlags { exact: false, multi: false };
        assert!(scan(&src, src.start(), Dir::Forward, 1, &prog, loose, &words(), u32::MAX, None).is_some());
        assert!(scan(&src, src.start(), Dir::Forward, 1, &prog, flags(), &words(), u32::MAX, None).is_none());
    }

    #[test]
    fn compile_errors() {
        let w = words();
        assert!(matches!(compile(b"a**", &w), Err(SearchError::BadRepetition(_))));
        assert!(matches!(compile(b"*a", &w), Err(SearchError::BadRepetition(_))));
        assert!(matches!(compile(b"(ab)*", &w), Err(SearchError::ClosureOnGroup(_))));
        assert!(matches!(compile(b"(ab", &w), Err(SearchError::UnendedGroup(_))));
        assert!(matches!(compile(b"ab)", &w), Err(SearchError::UnmatchedParen(_))));
        assert!(matches!(compile(b"[]", &w), Err(SearchError::EmptyClass)));
        assert!(matches!(compile(b"[ab", &w), Err(SearchError::UnendedClass)));
        assert!(matches!(compile(b"a{3", &w), Err(SearchError::BadRepetition(_))));
        assert!(matches!(compile(b"a{3,2}", &w), Err(SearchError::BadRepetition(_))));
        assert!(compile(b"ab{", &w).is_ok()); // literal brace
    }

    #[test]
    fn plain_text_is_not_regical() {
        let prog = compile(b"hello", &words()).unwrap();
        assert!(!prog.regical);
        let prog = compile(b"hel+o", &words()).unwrap();
        assert!(prog.regical);
    }

    #[test]
    fn match_str_directions() {
        let prog = compile(b"[0-9]+", &words()).unwrap();
        let found = match_str(b"a1 b22", 0, &prog, flags(), &words()).unwrap();
        assert_eq!(found.start.str_offset(), 1);
        let found = match_str(b"a1 b22", -1, &prog, flags(), &words()).unwrap();
        assert_eq!(found.start.str_offset(), 4);
        assert_eq!(found.groups[0], b"22");
    }

    #[test]
    fn group_zero_concatenation_property() {
        // Group 0 equals literal prefix + group 1 + infix + group 2 + suffix.
        let (_, whole, groups) = first_match("key: value9", "([a-z]+): ([a-z]+)").unwrap();
        assert_eq!(whole, format!("{}: {}", groups[0], groups[1]));
    }
}
