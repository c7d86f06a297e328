//! Replacement patterns and the query-replace state machine.
//!
//! A replacement pattern compiles once into a list of literal and
//! group-reference nodes. `\0`–`\9` are back-references, `\t \r \n \f \e
//! \v` decode as usual, and any other escaped character is itself. When no
//! escape appears at all the compiled list is bypassed and the raw pattern
//! substitutes verbatim.
//!
//! The interactive query loop lives with the commands; this module owns the
//! pure pieces: response classification, the per-response decision, and the
//! single-slot undo record.

use crate::SearchError;
use core_text::Point;

#[derive(Debug, Clone, PartialEq, Eq)]
enum ReplNode {
    Literal(Vec<u8>),
    Group(usize),
}

/// Compiled replacement pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplProgram {
    nodes: Vec<ReplNode>,
    /// False when the pattern contained no escapes; rendering then returns
    /// the raw pattern unchanged.
    pub regical: bool,
}

/// Compile a replacement pattern against a search pattern with
/// `group_count` capture groups.
pub fn compile(repl: &[u8], group_count: usize) -> Result<ReplProgram, SearchError> {
    let mut nodes = Vec::new();
    let mut lit: Vec<u8> = Vec::new();
    let mut regical = false;
    let mut i = 0;
    while i < repl.len() {
        let c = repl[i];
        if c != b'\\' {
            lit.push(c);
            i += 1;
            continue;
        }
        regical = true;
        match repl.get(i + 1) {
            Some(&d) if d.is_ascii_digit() => {
                let group = (d - b'0') as usize;
                if group > group_count {
                    return Err(SearchError::BadGroupRef {
                        pattern: String::from_utf8_lossy(repl).into_owned(),
                        group,
                        have: group_count,
                    });
                }
                if !lit.is_empty() {
                    nodes.push(ReplNode::Literal(std::mem::take(&mut lit)));
                }
                nodes.push(ReplNode::Group(group));
                i += 2;
            }
            Some(&e) => {
                lit.push(match e {
                    b't' => b'\t',
                    b'r' => b'\r',
                    b'n' => b'\n',
                    b'f' => b'\x0C',
                    b'e' => 0x1B,
                    b'v' => 0x0B,
                    other => other,
                });
                i += 2;
            }
            None => {
                lit.push(b'\\');
                i += 1;
            }
        }
    }
    if !lit.is_empty() {
        nodes.push(ReplNode::Literal(lit));
    }
    Ok(ReplProgram { nodes, regical })
}

impl ReplProgram {
    /// Render the replacement for the given captures (`groups[0]` is the
    /// whole match).
    pub fn render(&self, raw: &[u8], groups: &[Vec<u8>]) -> Vec<u8> {
        if !self.regical {
            return raw.to_vec();
        }
        let mut out = Vec::new();
        for node in &self.nodes {
            match node {
                ReplNode::Literal(text) => out.extend_from_slice(text),
                ReplNode::Group(k) => {
                    if let Some(text) = groups.get(*k) {
                        out.extend_from_slice(text);
                    }
                }
            }
        }
        out
    }
}

// -------------------------------------------------------------------------
// Query-replace state machine
// -------------------------------------------------------------------------

/// A classified keystroke at the query prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryResponse {
    Yes,
    No,
    YesStop,
    DoRest,
    Undo,
    Restart,
    StopGoBack,
    StopHere,
    Help,
    Other,
}

impl QueryResponse {
    /// Map a raw response byte; ESC arrives as 0x1B.
    pub fn from_byte(c: u8) -> QueryResponse {
        match c {
            b'y' | b' ' => QueryResponse::Yes,
            b'n' => QueryResponse::No,
            b'Y' => QueryResponse::YesStop,
            b'!' => QueryResponse::DoRest,
            b'u' => QueryResponse::Undo,
            b'r' => QueryResponse::Restart,
            b'.' => QueryResponse::StopGoBack,
            b'q' | 0x1B => QueryResponse::StopHere,
            b'?' => QueryResponse::Help,
            _ => QueryResponse::Other,
        }
    }
}

/// What the driver does with a response at one match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryDecision {
    /// Substitute this match, then: keep going, stop entirely, or stop
    /// asking and do the rest unattended.
    Substitute { last: bool, rest_unattended: bool },
    /// Leave this match alone and move past it.
    Skip,
    /// Revert the previous substitution and reprompt there.
    Undo,
    /// Return to the original point and start over.
    Restart,
    /// Stop, returning to the original point.
    StopGoBack,
    /// Stop at the current position.
    StopHere,
    /// Show the help line and reprompt.
    Help,
    /// Unrecognized: beep and reprompt.
    Beep,
}

/// The per-match transition of the query state machine.
pub fn decide(response: QueryResponse, have_undo: bool) -> QueryDecision {
    match response {
        QueryResponse::Yes => QueryDecision::Substitute { last: false, rest_unattended: false },
        QueryResponse::YesStop => QueryDecision::Substitute { last: true, rest_unattended: true },
        QueryResponse::DoRest => QueryDecision::Substitute { last: false, rest_unattended: true },
        QueryResponse::No => QueryDecision::Skip,
        QueryResponse::Undo if have_undo => QueryDecision::Undo,
        QueryResponse::Undo => QueryDecision::Beep,
        QueryResponse::Restart => QueryDecision::Restart,
        QueryResponse::StopGoBack => QueryDecision::StopGoBack,
        QueryResponse::StopHere => QueryDecision::StopHere,
        QueryResponse::Help => QueryDecision::Help,
        QueryResponse::Other => QueryDecision::Beep,
    }
}

/// Help line shown on `?`.
pub const QUERY_HELP: &str = "SPC|y Yes, n No, Y Yes and stop, ! Do rest, u Undo last, r Restart, \
                              ESC|q Stop here, . Stop and go back, ? Help";

/// The single undo slot: enough to restore the text and position of the
/// last substitution exactly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplaceUndo {
    /// The string the match replaced.
    pub matched: Vec<u8>,
    /// Its length in characters.
    pub match_len: u64,
    /// Point just after the inserted replacement.
    pub repl_point: Point,
    /// Length of the inserted replacement.
    pub repl_len: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn groups() -> Vec<Vec<u8>> {
        vec![b"whole".to_vec(), b"one".to_vec(), b"two".to_vec()]
    }

    #[test]
    fn literal_replacement_bypasses_nodes() {
        let prog = compile(b"plain text", 2).unwrap();
        assert!(!prog.regical);
        assert_eq!(prog.render(b"plain text", &groups()), b"plain text");
    }

    #[test]
    fn group_references() {
        let prog = compile(b"<\\1|\\2|\\0>", 2).unwrap();
        assert!(prog.regical);
        assert_eq!(prog.render(b"", &groups()), b"<one|two|whole>");
    }

    #[test]
    fn escapes_decode() {
        let prog = compile(b"a\\tb\\nc\\\\d\\q", 0).unwrap();
        assert_eq!(prog.render(b"", &groups()), b"a\tb\nc\\dq");
    }

    #[test]
    fn trailing_backslash_is_literal() {
        let prog = compile(b"x\\", 0).unwrap();
        assert_eq!(prog.render(b"", &groups()), b"x\\");
    }

    #[test]
    fn group_out_of_range_fails() {
        assert!(matches!(
            compile(b"\\3", 2),
            Err(SearchError::BadGroupRef { group: 3, have: 2, .. })
        ));
        // \0 is always available.
        assert!(compile(b"\\0", 0).is_ok());
    }

    #[test]
    fn responses_classify() {
        assert_eq!(QueryResponse::from_byte(b' '), QueryResponse::Yes);
        assert_eq!(QueryResponse::from_byte(0x1B), QueryResponse::StopHere);
        assert_eq!(QueryResponse::from_byte(b'x'), QueryResponse::Other);
    }

    #[test]
    fn decisions_follow_table() {
        assert_eq!(
            decide(QueryResponse::Yes, false),
            QueryDecision::Substitute { last: false, rest_unattended: false }
        );
        assert_eq!(
            decide(QueryResponse::YesStop, false),
            QueryDecision::Substitute { last: true, rest_unattended: true }
        );
        assert_eq!(
            decide(QueryResponse::DoRest, true),
            QueryDecision::Substitute { last: false, rest_unattended: true }
        );
        assert_eq!(decide(QueryResponse::Undo, true), QueryDecision::Undo);
        // Undo with nothing recorded beeps instead.
        assert_eq!(decide(QueryResponse::Undo, false), QueryDecision::Beep);
        assert_eq!(decide(QueryResponse::StopGoBack, false), QueryDecision::StopGoBack);
    }
}
