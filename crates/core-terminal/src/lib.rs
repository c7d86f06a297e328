//! core-terminal: the terminal collaborator contract and its crossterm
//! adapter.
//!
//! Everything above this crate sees only the [`Term`] trait and 16-bit
//! extended key codes. The adapter owns raw-mode setup, translation of
//! crossterm events into key codes (Ctrl canonicalization, function-key
//! mapping), and the timed read used to separate a bare ESC from an escape
//! sequence (crossterm performs the in-sequence assembly; the timeout here
//! bounds how long a read waits for pending input).

use anyhow::Result;
use core_keymap::{KeyCode, CTRL, DEL_KEY, ESC_KEY, FKEY, META, RTN_KEY, SHIFT, TAB_KEY};
use std::time::Duration;

/// Minimum usable terminal geometry.
pub const MIN_COLS: u16 = 40;
pub const MIN_ROWS: u16 = 3;

/// How long a read waits to distinguish a lone ESC from a sequence.
pub const ESC_TIMEOUT: Duration = Duration::from_millis(200);

/// The services the editor core asks of a terminal.
pub trait Term {
    fn open(&mut self) -> Result<()>;
    fn close(&mut self) -> Result<()>;

    /// Current size, clamped to the enforced minimums.
    fn size(&self) -> (u16, u16);

    /// Read one extended key. `timeout` of `None` blocks; otherwise the
    /// read gives up after the duration and yields `None`.
    fn get_key(&mut self, timeout: Option<Duration>) -> Result<Option<KeyCode>>;

    /// True when input is already pending, so redisplay can be skipped.
    fn type_ahead(&mut self) -> bool;

    fn put_char(&mut self, c: u8);
    fn put_str(&mut self, s: &[u8]);
    fn move_to(&mut self, row: u16, col: u16);
    fn erase_eol(&mut self);
    fn erase_eod(&mut self);
    fn beep(&mut self);
    fn reverse_video(&mut self, on: bool);
    fn flush(&mut self);
}

// -------------------------------------------------------------------------
// Crossterm adapter
// -------------------------------------------------------------------------

pub struct CrosstermTerm {
    open: bool,
    out: std::io::Stdout,
}

impl Default for CrosstermTerm {
    fn default() -> Self {
        Self::new()
    }
}

impl CrosstermTerm {
    pub fn new() -> Self {
        CrosstermTerm { open: false, out: std::io::stdout() }
    }
}

/// Translate one crossterm key event into an extended key code. Events
/// that have no editor meaning (releases, focus churn) map to `None`.
pub fn translate(event: &crossterm::event::KeyEvent) -> Option<KeyCode> {
    use crossterm::event::{KeyCode as Ck, KeyEventKind, KeyModifiers};
    if event.kind == KeyEventKind::Release {
        return None;
    }
    let ctrl = event.modifiers.contains(KeyModifiers::CONTROL);
    let meta = event.modifiers.contains(KeyModifiers::ALT);
    let shift = event.modifiers.contains(KeyModifiers::SHIFT);

    let mut code = match event.code {
        Ck::Char(c) if c.is_ascii() => {
            let c = c as u8;
            if ctrl {
                // Ctrl-space arrives as Ctrl plus ' '.
                if c == b' ' { KeyCode(CTRL | b' ' as u16) } else { KeyCode::ctrl(c) }
            } else {
                KeyCode::plain(c)
            }
        }
        Ck::Enter => RTN_KEY,
        Ck::Tab | Ck::BackTab => TAB_KEY,
        Ck::Backspace => DEL_KEY,
        Ck::Esc => ESC_KEY,
        Ck::F(n) => {
            let index = match n {
                1..=9 => b'0' + n as u8,
                10 => b'0',
                11 => b'A',
                12 => b'B',
                _ => return None,
            };
            KeyCode::fkey(index)
        }
        Ck::Up => KeyCode::fkey(b'P'),
        Ck::Down => KeyCode::fkey(b'N'),
        Ck::Left => KeyCode::fkey(b'B'),
        Ck::Right => KeyCode::fkey(b'F'),
        Ck::Home => KeyCode::fkey(b'H'),
        Ck::End => KeyCode::fkey(b'E'),
        Ck::PageUp => KeyCode::fkey(b'U'),
        Ck::PageDown => KeyCode::fkey(b'D'),
        Ck::Insert => KeyCode::fkey(b'I'),
        Ck::Delete => KeyCode::fkey(b'X'),
        _ => return None,
    };
    if meta {
        code = code.with(META);
    }
    if shift && code.has(FKEY) {
        code = code.with(SHIFT);
    }
    Some(code)
}

impl Term for CrosstermTerm {
    fn open(&mut self) -> Result<()> {
        use crossterm::{cursor, execute, terminal};
        terminal::enable_raw_mode()?;
        execute!(self.out, terminal::EnterAlternateScreen, cursor::Show)?;
        self.open = true;
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        use crossterm::{execute, terminal};
        if self.open {
            execute!(self.out, terminal::LeaveAlternateScreen)?;
            terminal::disable_raw_mode()?;
            self.open = false;
        }
        Ok(())
    }

    fn size(&self) -> (u16, u16) {
        let (cols, rows) = crossterm::terminal::size().unwrap_or((80, 24));
        (cols.max(MIN_COLS), rows.max(MIN_ROWS))
    }

    fn get_key(&mut self, timeout: Option<Duration>) -> Result<Option<KeyCode>> {
        use crossterm::event;
        loop {
            if let Some(limit) = timeout {
                if !event::poll(limit)? {
                    return Ok(None);
                }
            }
            match event::read()? {
                event::Event::Key(key) => {
                    if let Some(code) = translate(&key) {
                        return Ok(Some(code));
                    }
                }
                // Resize and the rest surface on the next redisplay.
                _ => {}
            }
        }
    }

    fn type_ahead(&mut self) -> bool {
        crossterm::event::poll(Duration::from_millis(0)).unwrap_or(false)
    }

    fn put_char(&mut self, c: u8) {
        self.put_str(&[c]);
    }

    fn put_str(&mut self, s: &[u8]) {
        use std::io::Write;
        let _ = self.out.write_all(s);
    }

    fn move_to(&mut self, row: u16, col: u16) {
        let _ = crossterm::execute!(self.out, crossterm::cursor::MoveTo(col, row));
    }

    fn erase_eol(&mut self) {
        let _ = crossterm::execute!(
            self.out,
            crossterm::terminal::Clear(crossterm::terminal::ClearType::UntilNewLine)
        );
    }

    fn erase_eod(&mut self) {
        let _ = crossterm::execute!(
            self.out,
            crossterm::terminal::Clear(crossterm::terminal::ClearType::FromCursorDown)
        );
    }

    fn beep(&mut self) {
        self.put_char(0x07);
        self.flush();
    }

    fn reverse_video(&mut self, on: bool) {
        use crossterm::style::Attribute;
        let attr = if on { Attribute::Reverse } else { Attribute::NoReverse };
        let _ = crossterm::execute!(self.out, crossterm::style::SetAttribute(attr));
    }

    fn flush(&mut self) {
        use std::io::Write;
        let _ = self.out.flush();
    }
}

impl Drop for CrosstermTerm {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

// -------------------------------------------------------------------------
// Scripted double for tests
// -------------------------------------------------------------------------

/// Operations a [`ScriptedTerm`] records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TermOp {
    Put(Vec<u8>),
    MoveTo(u16, u16),
    EraseEol,
    EraseEod,
    Beep,
    Reverse(bool),
}

/// A terminal fed from a queue of key codes, capturing output for
/// assertions. Reads past the end of the script fail, which turns a hung
/// test into a loud one.
#[derive(Debug, Default)]
pub struct ScriptedTerm {
    keys: std::collections::VecDeque<KeyCode>,
    pub ops: Vec<TermOp>,
    pub cols: u16,
    pub rows: u16,
}

impl ScriptedTerm {
    pub fn new(keys: impl IntoIterator<Item = KeyCode>) -> Self {
        ScriptedTerm { keys: keys.into_iter().collect(), ops: Vec::new(), cols: 80, rows: 24 }
    }

    pub fn push_keys(&mut self, keys: impl IntoIterator<Item = KeyCode>) {
        self.keys.extend(keys);
    }

    /// All bytes written, for output assertions.
    pub fn written(&self) -> Vec<u8> {
        let mut out = Vec::new();
        for op in &self.ops {
            if let TermOp::Put(bytes) = op {
                out.extend_from_slice(bytes);
            }
        }
        out
    }

    pub fn beeped(&self) -> bool {
        self.ops.iter().any(|op| matches!(op, TermOp::Beep))
    }
}

impl Term for ScriptedTerm {
    fn open(&mut self) -> Result<()> {
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        Ok(())
    }

    fn size(&self) -> (u16, u16) {
        (self.cols, self.rows)
    }

    fn get_key(&mut self, _timeout: Option<Duration>) -> Result<Option<KeyCode>> {
        match self.keys.pop_front() {
            Some(code) => Ok(Some(code)),
            None => anyhow::bail!("scripted terminal ran out of keys"),
        }
    }

    fn type_ahead(&mut self) -> bool {
        !self.keys.is_empty()
    }

    fn put_char(&mut self, c: u8) {
        self.ops.push(TermOp::Put(vec![c]));
    }

    fn put_str(&mut self, s: &[u8]) {
        self.ops.push(TermOp::Put(s.to_vec()));
    }

    fn move_to(&mut self, row: u16, col: u16) {
        self.ops.push(TermOp::MoveTo(row, col));
    }

    fn erase_eol(&mut self) {
        self.ops.push(TermOp::EraseEol);
    }

    fn erase_eod(&mut self) {
        self.ops.push(TermOp::EraseEod);
    }

    fn beep(&mut self) {
        self.ops.push(TermOp::Beep);
    }

    fn reverse_video(&mut self, on: bool) {
        self.ops.push(TermOp::Reverse(on));
    }

    fn flush(&mut self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::{KeyCode as Ck, KeyEvent, KeyModifiers};

    fn ev(code: Ck, mods: KeyModifiers) -> KeyEvent {
        KeyEvent::new(code, mods)
    }

    #[test]
    fn plain_and_ctrl_translation() {
        assert_eq!(translate(&ev(Ck::Char('a'), KeyModifiers::NONE)), Some(KeyCode::plain(b'a')));
        assert_eq!(
            translate(&ev(Ck::Char('g'), KeyModifiers::CONTROL)),
            Some(core_keymap::ABORT_KEY)
        );
        assert_eq!(
            translate(&ev(Ck::Char(' '), KeyModifiers::CONTROL)),
            Some(KeyCode(CTRL | b' ' as u16))
        );
    }

    #[test]
    fn named_keys() {
        assert_eq!(translate(&ev(Ck::Enter, KeyModifiers::NONE)), Some(RTN_KEY));
        assert_eq!(translate(&ev(Ck::Esc, KeyModifiers::NONE)), Some(ESC_KEY));
        assert_eq!(translate(&ev(Ck::Backspace, KeyModifiers::NONE)), Some(DEL_KEY));
        assert_eq!(translate(&ev(Ck::Tab, KeyModifiers::NONE)), Some(TAB_KEY));
    }

    #[test]
    fn function_and_arrow_keys() {
        assert_eq!(translate(&ev(Ck::F(5), KeyModifiers::NONE)), Some(KeyCode::fkey(b'5')));
        assert_eq!(
            translate(&ev(Ck::F(5), KeyModifiers::SHIFT)),
            Some(KeyCode::fkey(b'5').with(SHIFT))
        );
        assert_eq!(translate(&ev(Ck::Up, KeyModifiers::NONE)), Some(KeyCode::fkey(b'P')));
    }

    #[test]
    fn meta_flag() {
        assert_eq!(
            translate(&ev(Ck::Char('x'), KeyModifiers::ALT)),
            Some(KeyCode::plain(b'x').with(META))
        );
    }

    #[test]
    fn scripted_term_replays_and_records() {
        let mut term = ScriptedTerm::new([KeyCode::plain(b'a')]);
        assert_eq!(term.get_key(None).unwrap(), Some(KeyCode::plain(b'a')));
        assert!(term.get_key(None).is_err());
        term.put_str(b"hi");
        term.beep();
        assert_eq!(term.written(), b"hi");
        assert!(term.beeped());
    }
}
