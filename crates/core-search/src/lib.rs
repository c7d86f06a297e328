//! core-search: the search and replace engine.
//!
//! One [`Match`] object is the state container for a search context: the
//! pattern and its options, the lazily compiled Boyer–Moore tables and
//! regex programs, the replacement pattern and its compiled node list, and
//! the captured groups of the last successful search.
//!
//! Compiled artifacts invalidate precisely: a pattern change drops
//! everything; a case-sensitivity flip drops only the Boyer–Moore tables
//! (their deltas bake exactness in); a replacement change drops only the
//! replacement nodes.

use core_status::{Outcome, Status};
use core_text::{Point, TextCore};

pub mod bm;
pub mod pattern;
pub mod regex;
pub mod replace;
pub mod source;

pub use replace::{QueryDecision, QueryResponse, ReplaceUndo};
pub use source::{Dir, Source, Spot};

bitflags::bitflags! {
    /// Pattern options parsed from a `:flags` suffix.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct SearchFlags: u8 {
        const IGNORE = 1 << 0;
        const EXACT  = 1 << 1;
        const REGEX  = 1 << 2;
        const PLAIN  = 1 << 3;
        const MULTI  = 1 << 4;
    }
}

/// Compile-time pattern failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SearchError {
    #[error("Empty character class")]
    EmptyClass,
    #[error("Character class not ended")]
    UnendedClass,
    #[error("Invalid repetition operand in RE pattern '{0}'")]
    BadRepetition(String),
    #[error("Closure on group not supported in RE pattern '{0}'")]
    ClosureOnGroup(String),
    #[error("Too many groups in RE pattern '{0}' (maximum is 9)")]
    TooManyGroups(String),
    #[error("Unmatched right paren in RE pattern '{0}'")]
    UnmatchedParen(String),
    #[error("RE group not ended in pattern '{0}'")]
    UnendedGroup(String),
    #[error("No such group (ref: {group}, have: {have}) in replacement pattern '{pattern}'")]
    BadGroupRef { pattern: String, group: usize, have: usize },
}

impl From<SearchError> for Status {
    fn from(err: SearchError) -> Status {
        Status::failure(err.to_string())
    }
}

/// Session defaults the engine folds with per-pattern options: the `Exact`
/// and `Regexp` global modes, the word-character table, and the progress
/// threshold for long scans.
#[derive(Debug, Clone, Copy)]
pub struct ScanEnv<'a> {
    pub exact_default: bool,
    pub regex_default: bool,
    pub words: &'a [bool; 256],
    pub progress_after: u32,
}

/// A successful search, in buffer coordinates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Found {
    pub start: Point,
    pub end: Point,
    pub len: u64,
}

/// The search context: pattern, options, compiled programs, and the capture
/// state of the last match.
#[derive(Debug, Default)]
pub struct Match {
    pat: Vec<u8>,
    flags: SearchFlags,
    repl: Vec<u8>,
    bm: Option<bm::BmTables>,
    re: Option<regex::ReProgram>,
    repl_nodes: Option<replace::ReplProgram>,
    /// Captured strings of the last successful search; index 0 is the whole
    /// match.
    pub groups: Vec<Vec<u8>>,
    /// The last matched string, surviving pattern changes.
    pub last_match: Option<Vec<u8>>,
}

impl Match {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install a new search pattern, parsing any option suffix. Compiled
    /// programs are dropped; captured groups are cleared.
    pub fn set_pattern(&mut self, raw: &str) -> Outcome<()> {
        let (pat, flags) = pattern::parse_options(raw);
        if pat.is_empty() {
            return Err(Status::failure("Empty pattern"));
        }
        self.pat = pat.as_bytes().to_vec();
        self.flags = flags;
        self.bm = None;
        self.re = None;
        self.groups.clear();
        Ok(())
    }

    pub fn pattern(&self) -> &[u8] {
        &self.pat
    }

    pub fn has_pattern(&self) -> bool {
        !self.pat.is_empty()
    }

    pub fn flags(&self) -> SearchFlags {
        self.flags
    }

    /// Install a new replacement pattern; its compiled form is dropped.
    pub fn set_replacement(&mut self, raw: &str) {
        self.repl = raw.as_bytes().to_vec();
        self.repl_nodes = None;
    }

    pub fn replacement(&self) -> &[u8] {
        &self.repl
    }

    /// Case-sensitive matching in effect: the `:e`/`:i` suffix wins,
    /// otherwise the session default.
    pub fn exact_mode(&self, env: &ScanEnv<'_>) -> bool {
        self.flags.contains(SearchFlags::EXACT)
            || (env.exact_default && !self.flags.contains(SearchFlags::IGNORE))
    }

    /// Regex matching requested: the `:r`/`:p` suffix wins, otherwise the
    /// session default.
    pub fn regex_mode(&self, env: &ScanEnv<'_>) -> bool {
        self.flags.contains(SearchFlags::REGEX)
            || (env.regex_default && !self.flags.contains(SearchFlags::PLAIN))
    }

    /// Whether the plain scanner is the right engine: regex not requested,
    /// or the compiled pattern turned out to hold no metacharacters.
    pub fn plain_search(&self, env: &ScanEnv<'_>) -> bool {
        !self.regex_mode(env) || self.re.as_ref().is_some_and(|p| !p.regical)
    }

    fn ensure_bm(&mut self, exact: bool) {
        let stale = self.bm.as_ref().is_none_or(|t| t.exact != exact);
        if stale {
            self.bm = Some(bm::BmTables::compile(&self.pat, exact));
        }
    }

    fn ensure_re(&mut self, env: &ScanEnv<'_>) -> Outcome<()> {
        if self.re.is_none() {
            self.re = Some(regex::compile(&self.pat, env.words)?);
        }
        Ok(())
    }

    /// Compiled group count of the regex program (0 when plain).
    pub fn group_count(&self) -> usize {
        self.re.as_ref().map_or(0, |p| p.group_count)
    }

    /// Scan the buffer for the `n`th match from `from`. The point is not
    /// touched; the caller decides where to land. `NotFound` when the
    /// pattern does not occur `n` times.
    pub fn scan_buffer(
        &mut self,
        core: &TextCore,
        from: Point,
        dir: Dir,
        n: usize,
        env: &ScanEnv<'_>,
        mut progress: Option<&mut dyn FnMut()>,
    ) -> Outcome<Found> {
        debug_assert!(n > 0);
        if !self.has_pattern() {
            return Err(Status::failure("No pattern set"));
        }
        let exact = self.exact_mode(env);
        if self.regex_mode(env) {
            self.ensure_re(env)?;
        }
        let src = Source::Buf(core);
        let spot = Spot::from_point(from);
        if self.plain_search(env) {
            self.ensure_bm(exact);
            let tables = self.bm.as_ref().expect("compiled above");
            match bm::scan(&src, spot, dir, n, tables, env.progress_after, progress.take()) {
                Some(span) => {
                    let text = src.extract(span.start, span.len as i64);
                    self.groups = vec![text.clone()];
                    self.last_match = Some(text);
                    Ok(Found {
                        start: span.start.to_point(),
                        end: span.end.to_point(),
                        len: span.len,
                    })
                }
                None => Err(Status::not_found()),
            }
        } else {
            let flags =
                regex::MatchFlags { exact, multi: self.flags.contains(SearchFlags::MULTI) };
            let prog = self.re.as_ref().expect("compiled above");
            match regex::scan(
                &src,
                spot,
                dir,
                n,
                prog,
                flags,
                env.words,
                env.progress_after,
                progress.take(),
            ) {
                Some(found) => {
                    self.last_match = Some(found.groups[0].clone());
                    let out = Found {
                        start: found.start.to_point(),
                        end: found.end.to_point(),
                        len: found.len,
                    };
                    self.groups = found.groups;
                    Ok(out)
                }
                None => Err(Status::not_found()),
            }
        }
    }

    /// Match this pattern against a byte string; forward from `scan_off`,
    /// or backward from the end when negative. Returns the match offset.
    /// Always uses the regex engine (compiling on demand) so `=~` capture
    /// semantics hold even for plain text.
    pub fn match_str(
        &mut self,
        text: &[u8],
        scan_off: i64,
        env: &ScanEnv<'_>,
    ) -> Outcome<Option<usize>> {
        if !self.has_pattern() {
            return Err(Status::failure("No pattern set"));
        }
        self.ensure_re(env)?;
        let flags = regex::MatchFlags {
            exact: self.exact_mode(env),
            multi: self.flags.contains(SearchFlags::MULTI),
        };
        let prog = self.re.as_ref().expect("compiled above");
        match regex::match_str(text, scan_off, prog, flags, env.words) {
            Some(found) => {
                let offset = found.start.str_offset();
                self.last_match = Some(found.groups[0].clone());
                self.groups = found.groups;
                Ok(Some(offset))
            }
            None => Ok(None),
        }
    }

    /// Compile the replacement pattern if needed and render the text to
    /// substitute for the current match.
    pub fn build_replacement(&mut self) -> Outcome<Vec<u8>> {
        if self.repl_nodes.is_none() {
            self.repl_nodes = Some(replace::compile(&self.repl, self.group_count())?);
        }
        let prog = self.repl_nodes.as_ref().expect("compiled above");
        Ok(prog.render(&self.repl, &self.groups))
    }

    /// Whether the replacement is a constant string (no group references),
    /// so prompts can show it verbatim.
    pub fn replacement_is_literal(&mut self) -> Outcome<bool> {
        if self.repl_nodes.is_none() {
            self.repl_nodes = Some(replace::compile(&self.repl, self.group_count())?);
        }
        Ok(!self.repl_nodes.as_ref().expect("compiled above").regical)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words() -> [bool; 256] {
        let mut table = [false; 256];
        for c in 0..=255u8 {
            if c.is_ascii_alphanumeric() || c == b'_' {
                table[c as usize] = true;
            }
        }
        table
    }

    fn env(words: &[bool; 256]) -> ScanEnv<'_> {
        ScanEnv { exact_default: true, regex_default: false, words, progress_after: u32::MAX }
    }

    #[test]
    fn plain_search_scenario() {
        // Buffer "abc XYZ abc": matches at 0 and 8, then NotFound.
        let core = TextCore::from_bytes(b"abc XYZ abc");
        let words = words();
        let env = env(&words);
        let mut m = Match::new();
        m.set_pattern("abc").unwrap();
        let hit = m.scan_buffer(&core, core.point(), Dir::Forward, 1, &env, None).unwrap();
        assert_eq!((core.point_offset(hit.start), hit.len), (0, 3));
        let hit2 = m.scan_buffer(&core, hit.end, Dir::Forward, 1, &env, None).unwrap();
        assert_eq!(core.point_offset(hit2.start), 8);
        let miss = m.scan_buffer(&core, hit2.end, Dir::Forward, 1, &env, None);
        assert!(miss.unwrap_err().is_not_found());
    }

    #[test]
    fn case_insensitive_suffix() {
        // "hello:i" matches both cases even with Exact default on.
        let core = TextCore::from_bytes(b"Hello, HELLO");
        let words = words();
        let env = env(&words);
        let mut m = Match::new();
        m.set_pattern("hello:i").unwrap();
        let hit = m.scan_buffer(&core, core.point(), Dir::Forward, 1, &env, None).unwrap();
        assert_eq!(core.point_offset(hit.start), 0);
        let hit2 = m.scan_buffer(&core, hit.end, Dir::Forward, 1, &env, None).unwrap();
        assert_eq!(core.point_offset(hit2.start), 7);
    }

    #[test]
    fn regex_group_scenario() {
        let core = TextCore::from_bytes(b"x=42; y=7");
        let words = words();
        let env = env(&words);
        let mut m = Match::new();
        m.set_pattern("([a-z])=([0-9]+):r").unwrap();
        let hit = m.scan_buffer(&core, core.point(), Dir::Forward, 1, &env, None).unwrap();
        assert_eq!(core.point_offset(hit.start), 0);
        assert_eq!(m.groups[0], b"x=42");
        assert_eq!(m.groups[1], b"x");
        assert_eq!(m.groups[2], b"42");
        assert_eq!(m.last_match.as_deref(), Some(&b"x=42"[..]));
    }

    #[test]
    fn bm_and_regex_agree_on_plain_patterns() {
        let text = b"one two one two one";
        let core = TextCore::from_bytes(text);
        let words = words();
        let plain_env = env(&words);
        let re_env = ScanEnv { regex_default: true, ..plain_env };

        let mut plain = Match::new();
        plain.set_pattern("one").unwrap();
        let mut re = Match::new();
        re.set_pattern("one:r").unwrap();

        let mut at = core.point();
        let mut plain_hits = Vec::new();
        while let Ok(hit) = plain.scan_buffer(&core, at, Dir::Forward, 1, &plain_env, None) {
            plain_hits.push(core.point_offset(hit.start));
            at = hit.end;
        }
        let mut at = core.point();
        let mut re_hits = Vec::new();
        while let Ok(hit) = re.scan_buffer(&core, at, Dir::Forward, 1, &re_env, None) {
            re_hits.push(core.point_offset(hit.start));
            at = hit.end;
        }
        assert_eq!(plain_hits, re_hits);
        assert_eq!(plain_hits, vec![0, 8, 16]);
    }

    #[test]
    fn regex_suffix_with_no_metachars_uses_plain_engine() {
        let words = words();
        let e = env(&words);
        let mut m = Match::new();
        m.set_pattern("hello:r").unwrap();
        let core = TextCore::from_bytes(b"say hello");
        m.scan_buffer(&core, core.point(), Dir::Forward, 1, &e, None).unwrap();
        assert!(m.plain_search(&e));
    }

    #[test]
    fn case_flip_recompiles_bm() {
        let core = TextCore::from_bytes(b"Hello");
        let words = words();
        let mut m = Match::new();
        m.set_pattern("hello").unwrap();
        let strict = env(&words);
        assert!(m.scan_buffer(&core, core.point(), Dir::Forward, 1, &strict, None).is_err());
        let loose = ScanEnv { exact_default: false, ..strict };
        assert!(m.scan_buffer(&core, core.point(), Dir::Forward, 1, &loose, None).is_ok());
    }

    #[test]
    fn match_str_for_expressions() {
        let words = words();
        let e = env(&words);
        let mut m = Match::new();
        m.set_pattern("[0-9]+:r").unwrap();
        assert_eq!(m.match_str(b"abc 123", 0, &e).unwrap(), Some(4));
        assert_eq!(m.groups[0], b"123");
        assert_eq!(m.match_str(b"abc", 0, &e).unwrap(), None);
    }

    #[test]
    fn replacement_with_groups() {
        let core = TextCore::from_bytes(b"x=42");
        let words = words();
        let e = env(&words);
        let mut m = Match::new();
        m.set_pattern("([a-z])=([0-9]+):r").unwrap();
        m.set_replacement("\\2:=\\1");
        m.scan_buffer(&core, core.point(), Dir::Forward, 1, &e, None).unwrap();
        assert_eq!(m.build_replacement().unwrap(), b"42:=x");
        assert!(!m.replacement_is_literal().unwrap());
    }

    #[test]
    fn empty_pattern_rejected() {
        let mut m = Match::new();
        assert!(m.set_pattern("").is_err());
        assert!(m.set_pattern(":i").is_ok()); // ":i" is a literal pattern
        assert_eq!(m.pattern(), b":i");
    }
}
