//! core-input: the terminal input line.
//!
//! A single-line editor rendered on the terminal's bottom row: byte cells
//! with per-byte visible widths, a logical cursor, and a horizontal shift
//! that keeps the cursor inside `screen width - prompt width`, jumping by a
//! configurable percentage and marking truncation with a `$` at the left
//! edge. History comes from a ring; completion from a host-supplied source.
//!
//! Termination: Return accepts, ESC or the caller's delimiter accepts,
//! Ctrl-SPC yields an explicit null, and the abort key unwinds with
//! `UserAbort`.

use core_keymap::{KeyCode, ABORT_KEY, CTRL, DEL_KEY, ESC_KEY, RTN_KEY, TAB_KEY};
use core_state::Ring;
use core_status::{Outcome, Status};
use core_terminal::Term;
use tracing::trace;

/// What a completion request draws from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompKind {
    Buffer,
    Filename,
    Command,
    Mode,
    GlobalMode,
    Variable,
    MutableVariable,
}

/// Host-supplied completion service.
pub trait Completer {
    /// All candidates for the kind; the editor filters by prefix.
    fn candidates(&mut self, kind: CompKind) -> Vec<String>;

    /// Pop up a listing of the matches (the `?` key).
    fn show_list(&mut self, kind: CompKind, matches: &[String]);
}

/// A completer with nothing to offer.
pub struct NullCompleter;

impl Completer for NullCompleter {
    fn candidates(&mut self, _kind: CompKind) -> Vec<String> {
        Vec::new()
    }

    fn show_list(&mut self, _kind: CompKind, _matches: &[String]) {}
}

/// One input-line request.
#[derive(Debug, Clone)]
pub struct InputSpec {
    pub prompt: String,
    pub default: Option<String>,
    pub max_len: usize,
    /// Extra accept key beside Return and ESC.
    pub delim: KeyCode,
    pub completion: Option<CompKind>,
    /// Percentage of the visible window to shift on horizontal overflow.
    pub jump_pct: u16,
}

impl InputSpec {
    pub fn new(prompt: impl Into<String>) -> Self {
        InputSpec {
            prompt: prompt.into(),
            default: None,
            max_len: 512,
            delim: RTN_KEY,
            completion: None,
            jump_pct: 25,
        }
    }

    pub fn with_default(mut self, default: impl Into<String>) -> Self {
        self.default = Some(default.into());
        self
    }

    pub fn with_completion(mut self, kind: CompKind) -> Self {
        self.completion = Some(kind);
        self
    }
}

/// Outcome of an input request: text, or the explicit null reply.
pub type Reply = Option<String>;

// Visible width of one byte on the input line.
fn byte_width(c: u8) -> usize {
    match c {
        0..0x20 | 0x7F => 2,
        0x80.. => 4,
        _ => 1,
    }
}

fn render_byte(out: &mut Vec<u8>, c: u8) {
    match c {
        0..0x20 | 0x7F => {
            out.push(b'^');
            out.push(c ^ 0x40);
        }
        0x80.. => {
            out.extend_from_slice(format!("<{c:02X}>").as_bytes());
        }
        _ => out.push(c),
    }
}

struct LineState {
    bytes: Vec<u8>,
    cursor: usize,
    /// Left shift, in columns.
    shift: usize,
}

impl LineState {
    fn col_of(&self, index: usize) -> usize {
        self.bytes[..index].iter().map(|&c| byte_width(c)).sum()
    }
}

/// Run one input-line interaction.
pub fn get_input(
    term: &mut dyn Term,
    spec: &InputSpec,
    ring: Option<&Ring>,
    completer: &mut dyn Completer,
) -> Outcome<Reply> {
    let mut state = LineState { bytes: Vec::new(), cursor: 0, shift: 0 };
    if let Some(default) = &spec.default {
        debug_assert!(default.len() <= spec.max_len, "default longer than max length");
        state.bytes = default.as_bytes().to_vec();
        state.bytes.truncate(spec.max_len);
        state.cursor = state.bytes.len();
    }
    let mut ring_at: Option<usize> = None;

    loop {
        render(term, spec, &mut state);
        let key = term
            .get_key(None)
            .map_err(|err| Status::os_error(err.to_string()))?
            .expect("blocking read");
        if key == ABORT_KEY {
            return Err(Status::user_abort());
        }
        if key == RTN_KEY || key == ESC_KEY || key == spec.delim {
            return Ok(Some(String::from_utf8_lossy(&state.bytes).into_owned()));
        }
        if key == KeyCode(CTRL | b' ' as u16) {
            return Ok(None);
        }
        match key {
            k if k == KeyCode::ctrl(b'B') || k == KeyCode::fkey(b'B') => {
                if state.cursor > 0 {
                    state.cursor -= 1;
                } else {
                    term.beep();
                }
            }
            k if k == KeyCode::ctrl(b'F') || k == KeyCode::fkey(b'F') => {
                if state.cursor < state.bytes.len() {
                    state.cursor += 1;
                } else {
                    term.beep();
                }
            }
            k if k == KeyCode::ctrl(b'A') => state.cursor = 0,
            k if k == KeyCode::ctrl(b'E') => state.cursor = state.bytes.len(),
            k if k == KeyCode::ctrl(b'D') || k == KeyCode::fkey(b'X') => {
                if state.cursor < state.bytes.len() {
                    state.bytes.remove(state.cursor);
                } else {
                    term.beep();
                }
            }
            k if k == DEL_KEY => {
                if state.cursor > 0 {
                    state.cursor -= 1;
                    state.bytes.remove(state.cursor);
                } else {
                    term.beep();
                }
            }
            k if k == KeyCode::ctrl(b'K') => state.bytes.truncate(state.cursor),
            k if k == KeyCode::ctrl(b'U') => {
                state.bytes.clear();
                state.cursor = 0;
            }
            k if k == KeyCode::ctrl(b'P') || k == KeyCode::fkey(b'P') => {
                cycle_ring(term, ring, &mut ring_at, &mut state, spec, 1);
            }
            k if k == KeyCode::ctrl(b'N') || k == KeyCode::fkey(b'N') => {
                cycle_ring(term, ring, &mut ring_at, &mut state, spec, -1);
            }
            k if k == KeyCode::ctrl(b'Q') => {
                // Quote the next key: insert its raw byte.
                let next = term
                    .get_key(None)
                    .map_err(|err| Status::os_error(err.to_string()))?
                    .expect("blocking read");
                let raw = if next.has(CTRL) { next.char7() ^ 0x40 } else { next.char7() };
                insert_byte(term, spec, &mut state, raw);
            }
            k if k == TAB_KEY => {
                if let Some(kind) = spec.completion {
                    if complete(term, spec, &mut state, kind, completer)? {
                        return Ok(Some(String::from_utf8_lossy(&state.bytes).into_owned()));
                    }
                } else {
                    insert_byte(term, spec, &mut state, b'\t');
                }
            }
            k if k.literal_char() == Some(b'?') && spec.completion.is_some() => {
                let kind = spec.completion.expect("checked");
                let prefix = String::from_utf8_lossy(&state.bytes).into_owned();
                let matches: Vec<String> = completer
                    .candidates(kind)
                    .into_iter()
                    .filter(|c| c.starts_with(&prefix))
                    .collect();
                completer.show_list(kind, &matches);
            }
            k => match k.literal_char() {
                Some(c) => {
                    insert_byte(term, spec, &mut state, c);
                    if c == b'/' && spec.completion == Some(CompKind::Filename) {
                        expand_leading(&mut state, spec);
                    }
                }
                None => term.beep(),
            },
        }
    }
}

fn insert_byte(term: &mut dyn Term, spec: &InputSpec, state: &mut LineState, c: u8) {
    if state.bytes.len() >= spec.max_len {
        term.beep();
        return;
    }
    state.bytes.insert(state.cursor, c);
    state.cursor += 1;
}

fn cycle_ring(
    term: &mut dyn Term,
    ring: Option<&Ring>,
    at: &mut Option<usize>,
    state: &mut LineState,
    spec: &InputSpec,
    step: i64,
) {
    let Some(ring) = ring.filter(|r| !r.is_empty()) else {
        term.beep();
        return;
    };
    let len = ring.len() as i64;
    let next = match *at {
        Some(index) => (index as i64 + step).rem_euclid(len) as usize,
        None if step > 0 => 0,
        None => (len - 1) as usize,
    };
    *at = Some(next);
    if let Some(entry) = ring.nth_back(next) {
        state.bytes = entry.to_vec();
        state.bytes.truncate(spec.max_len);
        state.cursor = state.bytes.len();
    }
}

/// Leading `~/` and `$VAR/` expansion in filename mode, applied when the
/// slash that closes the token is typed at the front of the line.
fn expand_leading(state: &mut LineState, spec: &InputSpec) {
    if state.cursor != state.bytes.len() {
        return;
    }
    let text = String::from_utf8_lossy(&state.bytes).into_owned();
    let expanded = if text == "~/" {
        std::env::var("HOME").ok().map(|home| format!("{home}/"))
    } else if text.len() > 2 && text.starts_with('$') && text.ends_with('/') {
        std::env::var(&text[1..text.len() - 1]).ok().map(|value| format!("{value}/"))
    } else {
        None
    };
    if let Some(expanded) = expanded {
        trace!(target: "input.line", from = %text, to = %expanded, "expand");
        state.bytes = expanded.into_bytes();
        state.bytes.truncate(spec.max_len);
        state.cursor = state.bytes.len();
    }
}

/// Tab completion: extend by the longest common prefix of all matches.
/// Returns true when the completion was unique (the input auto-accepts).
fn complete(
    term: &mut dyn Term,
    spec: &InputSpec,
    state: &mut LineState,
    kind: CompKind,
    completer: &mut dyn Completer,
) -> Outcome<bool> {
    let prefix = String::from_utf8_lossy(&state.bytes).into_owned();
    let matches: Vec<String> =
        completer.candidates(kind).into_iter().filter(|c| c.starts_with(&prefix)).collect();
    if matches.is_empty() {
        term.beep();
        return Ok(false);
    }
    let mut common = matches[0].clone();
    for candidate in &matches[1..] {
        let shared = common
            .bytes()
            .zip(candidate.bytes())
            .take_while(|(a, b)| a == b)
            .count();
        common.truncate(shared);
    }
    if common.len() > state.bytes.len() {
        state.bytes = common.as_bytes().to_vec();
        state.bytes.truncate(spec.max_len);
        state.cursor = state.bytes.len();
    }
    if matches.len() == 1 {
        return Ok(true);
    }
    term.beep();
    Ok(false)
}

/// Repaint the input line on the bottom row, keeping the cursor inside the
/// visible window and advancing the shift by `jump_pct` of the window when
/// it would cross an edge.
fn render(term: &mut dyn Term, spec: &InputSpec, state: &mut LineState) {
    let (cols, rows) = term.size();
    let prompt_width = spec.prompt.len();
    let avail = (cols as usize).saturating_sub(prompt_width + 1).max(4);
    let jump = (avail * spec.jump_pct.clamp(1, 90) as usize / 100).max(1);

    let cursor_col = state.col_of(state.cursor);
    while cursor_col >= state.shift + avail {
        state.shift += jump;
    }
    while cursor_col < state.shift {
        state.shift = state.shift.saturating_sub(jump);
    }

    let mut visible: Vec<u8> = Vec::new();
    let mut col = 0;
    for &c in &state.bytes {
        let width = byte_width(c);
        if col + width > state.shift {
            // A cell straddling the shift edge renders from the edge on.
            if col >= state.shift {
                render_byte(&mut visible, c);
            } else {
                let mut whole = Vec::new();
                render_byte(&mut whole, c);
                visible.extend_from_slice(&whole[state.shift - col..]);
            }
        }
        col += width;
        if col >= state.shift + avail {
            break;
        }
    }
    visible.truncate(avail);

    term.move_to(rows - 1, 0);
    term.put_str(spec.prompt.as_bytes());
    if state.shift > 0 {
        term.put_char(b'$');
    }
    term.put_str(&visible);
    term.erase_eol();
    let screen_col = prompt_width
        + usize::from(state.shift > 0)
        + cursor_col.saturating_sub(state.shift);
    term.move_to(rows - 1, screen_col.min(cols as usize - 1) as u16);
    term.flush();
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_terminal::ScriptedTerm;

    fn keys(text: &str) -> Vec<KeyCode> {
        text.bytes().map(KeyCode::plain).collect()
    }

    fn accept() -> KeyCode {
        RTN_KEY
    }

    struct FixedCompleter {
        items: Vec<&'static str>,
        listed: Vec<String>,
    }

    impl Completer for FixedCompleter {
        fn candidates(&mut self, _kind: CompKind) -> Vec<String> {
            self.items.iter().map(|s| (*s).to_string()).collect()
        }

        fn show_list(&mut self, _kind: CompKind, matches: &[String]) {
            self.listed = matches.to_vec();
        }
    }

    #[test]
    fn types_and_accepts() {
        let mut term = ScriptedTerm::new(keys("hello").into_iter().chain([accept()]));
        let spec = InputSpec::new("Name: ");
        let reply = get_input(&mut term, &spec, None, &mut NullCompleter).unwrap();
        assert_eq!(reply.as_deref(), Some("hello"));
    }

    #[test]
    fn editing_keys() {
        // "abXc" with cursor gymnastics: type abc, back twice, insert X,
        // ^E, backspace.
        let mut script = keys("abc");
        script.push(KeyCode::ctrl(b'B'));
        script.push(KeyCode::ctrl(b'B'));
        script.push(KeyCode::plain(b'X'));
        script.push(KeyCode::ctrl(b'E'));
        script.push(DEL_KEY);
        script.push(accept());
        let mut term = ScriptedTerm::new(script);
        let reply = get_input(&mut term, &InputSpec::new(": "), None, &mut NullCompleter).unwrap();
        assert_eq!(reply.as_deref(), Some("aXb"));
    }

    #[test]
    fn kill_and_erase() {
        let mut script = keys("abcdef");
        script.push(KeyCode::ctrl(b'A'));
        script.push(KeyCode::ctrl(b'F'));
        script.push(KeyCode::ctrl(b'F'));
        script.push(KeyCode::ctrl(b'K'));
        script.push(accept());
        let mut term = ScriptedTerm::new(script);
        let reply = get_input(&mut term, &InputSpec::new(": "), None, &mut NullCompleter).unwrap();
        assert_eq!(reply.as_deref(), Some("ab"));

        let mut script = keys("abc");
        script.push(KeyCode::ctrl(b'U'));
        script.push(accept());
        let mut term = ScriptedTerm::new(script);
        let reply = get_input(&mut term, &InputSpec::new(": "), None, &mut NullCompleter).unwrap();
        assert_eq!(reply.as_deref(), Some(""));
    }

    #[test]
    fn abort_unwinds() {
        let mut term = ScriptedTerm::new([ABORT_KEY]);
        let err =
            get_input(&mut term, &InputSpec::new(": "), None, &mut NullCompleter).unwrap_err();
        assert!(err.is_abort());
    }

    #[test]
    fn ctrl_space_returns_null() {
        let mut term = ScriptedTerm::new([KeyCode(CTRL | b' ' as u16)]);
        let reply = get_input(&mut term, &InputSpec::new(": "), None, &mut NullCompleter).unwrap();
        assert!(reply.is_none());
    }

    #[test]
    fn default_value_prefills() {
        let mut term = ScriptedTerm::new([accept()]);
        let spec = InputSpec::new(": ").with_default("preset");
        let reply = get_input(&mut term, &spec, None, &mut NullCompleter).unwrap();
        assert_eq!(reply.as_deref(), Some("preset"));
    }

    #[test]
    fn quote_inserts_control() {
        let mut term = ScriptedTerm::new([KeyCode::ctrl(b'Q'), KeyCode::ctrl(b'G'), accept()]);
        let reply = get_input(&mut term, &InputSpec::new(": "), None, &mut NullCompleter).unwrap();
        assert_eq!(reply.as_deref(), Some("\u{7}"));
    }

    #[test]
    fn ring_history_cycles() {
        let mut ring = Ring::new("search", 8);
        ring.push(b"older".to_vec());
        ring.push(b"newest".to_vec());
        let mut term = ScriptedTerm::new([
            KeyCode::ctrl(b'P'),
            KeyCode::ctrl(b'P'),
            KeyCode::ctrl(b'N'),
            accept(),
        ]);
        let reply =
            get_input(&mut term, &InputSpec::new("/"), Some(&ring), &mut NullCompleter).unwrap();
        // P -> newest, P -> older, N -> newest again.
        assert_eq!(reply.as_deref(), Some("newest"));
    }

    #[test]
    fn empty_ring_beeps() {
        let mut term = ScriptedTerm::new([KeyCode::ctrl(b'P'), accept()]);
        get_input(&mut term, &InputSpec::new("/"), None, &mut NullCompleter).unwrap();
        assert!(term.beeped());
    }

    #[test]
    fn unique_completion_accepts() {
        let mut completer = FixedCompleter { items: vec!["scratch", "notes"], listed: vec![] };
        let mut term = ScriptedTerm::new(keys("no").into_iter().chain([TAB_KEY]));
        let spec = InputSpec::new("Buffer: ").with_completion(CompKind::Buffer);
        let reply = get_input(&mut term, &spec, None, &mut completer).unwrap();
        assert_eq!(reply.as_deref(), Some("notes"));
    }

    #[test]
    fn ambiguous_completion_extends_and_beeps() {
        let mut completer =
            FixedCompleter { items: vec!["alpha", "alpine", "beta"], listed: vec![] };
        let mut term = ScriptedTerm::new(keys("a").into_iter().chain([TAB_KEY, accept()]));
        let spec = InputSpec::new(": ").with_completion(CompKind::Buffer);
        let reply = get_input(&mut term, &spec, None, &mut completer).unwrap();
        assert_eq!(reply.as_deref(), Some("alp"));
        assert!(term.beeped());
    }

    #[test]
    fn question_mark_lists_matches() {
        let mut completer =
            FixedCompleter { items: vec!["alpha", "alpine", "beta"], listed: vec![] };
        let mut term = ScriptedTerm::new(keys("al?").into_iter().chain([accept()]));
        let spec = InputSpec::new(": ").with_completion(CompKind::Buffer);
        let reply = get_input(&mut term, &spec, None, &mut completer).unwrap();
        assert_eq!(completer.listed, vec!["alpha".to_string(), "alpine".to_string()]);
        // The '?' itself is not inserted.
        assert_eq!(reply.as_deref(), Some("al"));
    }

    #[test]
    fn no_match_completion_beeps() {
        let mut completer = FixedCompleter { items: vec!["alpha"], listed: vec![] };
        let mut term = ScriptedTerm::new(keys("zz").into_iter().chain([TAB_KEY, accept()]));
        let spec = InputSpec::new(": ").with_completion(CompKind::Buffer);
        let reply = get_input(&mut term, &spec, None, &mut completer).unwrap();
        assert_eq!(reply.as_deref(), Some("zz"));
        assert!(term.beeped());
    }

    #[test]
    fn max_length_enforced() {
        let mut spec = InputSpec::new(": ");
        spec.max_len = 3;
        let mut term = ScriptedTerm::new(keys("abcdef").into_iter().chain([accept()]));
        let reply = get_input(&mut term, &spec, None, &mut NullCompleter).unwrap();
        assert_eq!(reply.as_deref(), Some("abc"));
        assert!(term.beeped());
    }

    #[test]
    fn horizontal_scroll_marks_truncation() {
        let mut term = ScriptedTerm::new(
            keys(&"x".repeat(30)).into_iter().chain([accept()]),
        );
        term.cols = 20;
        let reply = get_input(&mut term, &InputSpec::new("> "), None, &mut NullCompleter).unwrap();
        assert_eq!(reply.unwrap().len(), 30);
        // The left-edge truncation marker appeared during rendering.
        let wrote_marker = term
            .ops
            .iter()
            .any(|op| matches!(op, core_terminal::TermOp::Put(bytes) if bytes == b"$"));
        assert!(wrote_marker);
    }

    #[test]
    fn control_bytes_render_visibly() {
        let mut out = Vec::new();
        render_byte(&mut out, 0x01);
        assert_eq!(out, b"^A");
        out.clear();
        render_byte(&mut out, 0x9C);
        assert_eq!(out, b"<9C>");
        assert_eq!(byte_width(b'a'), 1);
        assert_eq!(byte_width(0x01), 2);
        assert_eq!(byte_width(0x9C), 4);
    }
}
