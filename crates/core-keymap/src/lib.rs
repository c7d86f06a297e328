//! core-keymap: extended key codes, key literals, and binding tables.
//!
//! A [`KeyCode`] packs one key event into 16 bits: the low byte is a 7-bit
//! character (or a function-key index), the high byte carries the flag bits
//! `CTRL`, `META`, `SHIFT`, `FKEY`, and the three non-meta prefix bits. A
//! key *sequence* is at most two codes; resolution merges a leading prefix
//! key into the second code as one of the `META`/`PREF1..3` flags, so the
//! binding tables only ever look up a single merged code.
//!
//! Resolution is pure and deterministic: it depends only on the table
//! contents, never on editor state. Logging is TRACE-level traversal
//! breadcrumbs only.

use core_status::{Outcome, Status};
use smallvec::SmallVec;
use std::fmt;
use tracing::trace;

/// Control-key flag.
pub const CTRL: u16 = 1 << 8;
/// Meta (ESC) prefix flag.
pub const META: u16 = 1 << 9;
/// Shift flag, meaningful with `FKEY` or alone on non-letters.
pub const SHIFT: u16 = 1 << 10;
/// Function-key flag; the low byte is the key's index character.
pub const FKEY: u16 = 1 << 11;
/// First non-meta prefix (conventionally `C-x`).
pub const PREF1: u16 = 1 << 12;
/// Second non-meta prefix (conventionally `C-c`).
pub const PREF2: u16 = 1 << 13;
/// Third non-meta prefix (conventionally `C-h`).
pub const PREF3: u16 = 1 << 14;

/// All prefix-class bits.
pub const PREFIX_MASK: u16 = META | PREF1 | PREF2 | PREF3;

/// One extended key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct KeyCode(pub u16);

/// A key sequence as read from the keyboard: one code, or prefix + code.
pub type KeySeq = SmallVec<[KeyCode; 2]>;

impl KeyCode {
    pub fn plain(c: u8) -> Self {
        KeyCode(c as u16)
    }

    /// Control character, canonicalized to the uppercase letter form.
    pub fn ctrl(c: u8) -> Self {
        KeyCode(CTRL | c.to_ascii_uppercase() as u16)
    }

    pub fn fkey(index: u8) -> Self {
        KeyCode(FKEY | index as u16)
    }

    pub fn char7(self) -> u8 {
        (self.0 & 0xFF) as u8
    }

    pub fn flags(self) -> u16 {
        self.0 & 0xFF00
    }

    pub fn has(self, flag: u16) -> bool {
        self.0 & flag != 0
    }

    pub fn with(self, flag: u16) -> Self {
        KeyCode(self.0 | flag)
    }

    /// True when the code is an unadorned printable byte (self-insert
    /// candidate).
    pub fn is_printable(self) -> bool {
        self.flags() == 0 && (0x20..0x7F).contains(&self.char7())
    }

    /// The raw character a plain code inserts.
    pub fn literal_char(self) -> Option<u8> {
        self.is_printable().then_some(self.char7())
    }
}

/// The abort key: Ctrl-G.
pub const ABORT_KEY: KeyCode = KeyCode(CTRL | b'G' as u16);
/// Return key.
pub const RTN_KEY: KeyCode = KeyCode(CTRL | b'M' as u16);
/// Escape key.
pub const ESC_KEY: KeyCode = KeyCode(CTRL | b'[' as u16);
/// Tab key.
pub const TAB_KEY: KeyCode = KeyCode(CTRL | b'I' as u16);
/// Delete/backspace key.
pub const DEL_KEY: KeyCode = KeyCode(CTRL | b'?' as u16);

/// The four prefix classes a first key can resolve to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrefixKind {
    Meta,
    Pref1,
    Pref2,
    Pref3,
}

impl PrefixKind {
    pub fn flag(self) -> u16 {
        match self {
            PrefixKind::Meta => META,
            PrefixKind::Pref1 => PREF1,
            PrefixKind::Pref2 => PREF2,
            PrefixKind::Pref3 => PREF3,
        }
    }
}

/// What a key resolves to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyTarget {
    /// Built-in command, by registry name.
    Command(String),
    /// Macro buffer, by buffer name (with sigil).
    Macro(String),
    /// Prefix pseudo-command.
    Prefix(PrefixKind),
}

/// Merge a leading prefix into the second code of a sequence. Plain letters
/// after a prefix canonicalize to uppercase, so `C-x f` and `C-x F` land on
/// the same binding.
pub fn merge_prefix(kind: PrefixKind, second: KeyCode) -> KeyCode {
    let mut code = second.0;
    if code & (FKEY | CTRL) == 0 {
        let c = (code & 0xFF) as u8;
        if c.is_ascii_lowercase() {
            code = (code & !0xFF) | c.to_ascii_uppercase() as u16;
        }
    }
    KeyCode(code | kind.flag())
}

// -------------------------------------------------------------------------
// Binding tables
// -------------------------------------------------------------------------

// Per-class slot index: 7-bit payload plus CTRL, FKEY, SHIFT selector bits.
const SLOTS: usize = 1 << 10;

fn class_of(code: KeyCode) -> usize {
    match code.0 & PREFIX_MASK {
        0 => 0,
        META => 1,
        PREF1 => 2,
        PREF2 => 3,
        PREF3 => 4,
        _ => usize::MAX, // multiple prefix bits never reach a table
    }
}

fn slot_of(code: KeyCode) -> usize {
    let mut slot = (code.char7() & 0x7F) as usize;
    if code.has(CTRL) {
        slot |= 1 << 7;
    }
    if code.has(FKEY) {
        slot |= 1 << 8;
    }
    if code.has(SHIFT) {
        slot |= 1 << 9;
    }
    slot
}

/// Flat binding store: five per-prefix-class vectors indexed by the low
/// selector bits of the code.
pub struct KeymapTable {
    classes: [Vec<Option<KeyTarget>>; 5],
}

impl fmt::Debug for KeymapTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeymapTable").field("bound", &self.iter().count()).finish()
    }
}

impl Default for KeymapTable {
    fn default() -> Self {
        Self::new()
    }
}

impl KeymapTable {
    pub fn new() -> Self {
        KeymapTable { classes: std::array::from_fn(|_| vec![None; SLOTS]) }
    }

    pub fn bind(&mut self, code: KeyCode, target: KeyTarget) -> Outcome<()> {
        let class = class_of(code);
        if class == usize::MAX {
            return Err(Status::failure("Invalid key binding: multiple prefixes"));
        }
        if matches!(target, KeyTarget::Prefix(_)) && code.has(PREFIX_MASK) {
            return Err(Status::failure("A prefix key cannot itself be prefixed"));
        }
        trace!(target: "keymap.table", code = code.0, ?target, "bind");
        self.classes[class][slot_of(code)] = Some(target);
        Ok(())
    }

    pub fn unbind(&mut self, code: KeyCode) -> Outcome<KeyTarget> {
        let class = class_of(code);
        if class == usize::MAX {
            return Err(Status::failure("Invalid key"));
        }
        match self.classes[class][slot_of(code)].take() {
            Some(target) => Ok(target),
            None => Err(Status::not_found()),
        }
    }

    pub fn get(&self, code: KeyCode) -> Option<&KeyTarget> {
        let class = class_of(code);
        if class == usize::MAX {
            return None;
        }
        self.classes[class][slot_of(code)].as_ref()
    }

    /// The prefix class a first key selects, if it is bound to one.
    pub fn prefix_of(&self, code: KeyCode) -> Option<PrefixKind> {
        match self.get(code) {
            Some(KeyTarget::Prefix(kind)) => Some(*kind),
            _ => None,
        }
    }

    /// First key bound to the given prefix class, preferring the
    /// conventional defaults so display stays stable when a prefix has
    /// several bindings.
    pub fn prefix_key(&self, kind: PrefixKind) -> Option<KeyCode> {
        let preferred = match kind {
            PrefixKind::Meta => ESC_KEY,
            PrefixKind::Pref1 => KeyCode::ctrl(b'X'),
            PrefixKind::Pref2 => KeyCode::ctrl(b'C'),
            PrefixKind::Pref3 => KeyCode::ctrl(b'H'),
        };
        if self.prefix_of(preferred) == Some(kind) {
            return Some(preferred);
        }
        self.iter()
            .find(|(_, t)| matches!(t, KeyTarget::Prefix(k) if *k == kind))
            .map(|(code, _)| code)
    }

    /// Every binding, ascending by code.
    pub fn iter(&self) -> impl Iterator<Item = (KeyCode, &KeyTarget)> {
        self.classes.iter().enumerate().flat_map(|(class, slots)| {
            let prefix = match class {
                0 => 0,
                1 => META,
                2 => PREF1,
                3 => PREF2,
                _ => PREF3,
            };
            slots.iter().enumerate().filter_map(move |(slot, target)| {
                let target = target.as_ref()?;
                let mut code = (slot & 0x7F) as u16 | prefix;
                if slot & (1 << 7) != 0 {
                    code |= CTRL;
                }
                if slot & (1 << 8) != 0 {
                    code |= FKEY;
                }
                if slot & (1 << 9) != 0 {
                    code |= SHIFT;
                }
                Some((KeyCode(code), target))
            })
        })
    }

    /// Keys bound to a command or macro by name.
    pub fn keys_of(&self, name: &str) -> Vec<KeyCode> {
        self.iter()
            .filter(|(_, t)| match t {
                KeyTarget::Command(n) | KeyTarget::Macro(n) => n == name,
                KeyTarget::Prefix(_) => false,
            })
            .map(|(code, _)| code)
            .collect()
    }
}

// -------------------------------------------------------------------------
// Key literals
// -------------------------------------------------------------------------

const LITERALS: [(&str, u16); 5] = [
    ("SPC", b' ' as u16),
    ("TAB", CTRL | b'I' as u16),
    ("ESC", CTRL | b'[' as u16),
    ("RTN", CTRL | b'M' as u16),
    ("DEL", CTRL | b'?' as u16),
];

fn bad_literal(lit: &str) -> Status {
    Status::failure(format!("Invalid key literal \"{lit}\""))
}

/// Decode one space-separated value of a key literal.
fn parse_value(value: &str, first: bool, lit: &str) -> Outcome<KeyCode> {
    let mut ek: u16 = 0;
    let mut rest = value;
    loop {
        let bytes = rest.as_bytes();
        if bytes.is_empty() {
            return Err(bad_literal(lit));
        }
        // Prefixes: M-, C-, S-, the ^ shorthand, and FN.
        if bytes.len() >= 2 && bytes[1] == b'-' && bytes.len() > 2 {
            match bytes[0].to_ascii_uppercase() {
                b'C' => {
                    if ek & CTRL != 0 {
                        return Err(bad_literal(lit));
                    }
                    ek |= CTRL;
                }
                b'M' => {
                    if !first || ek & META != 0 {
                        return Err(bad_literal(lit));
                    }
                    ek |= META;
                }
                b'S' => {
                    if !first || ek & SHIFT != 0 {
                        return Err(bad_literal(lit));
                    }
                    ek |= SHIFT;
                }
                _ => return Err(bad_literal(lit)),
            }
            rest = &rest[2..];
            continue;
        }
        if bytes[0] == b'^' && bytes.len() > 1 {
            if ek & CTRL != 0 {
                return Err(bad_literal(lit));
            }
            ek |= CTRL;
            rest = &rest[1..];
            continue;
        }
        if bytes.len() > 2 && rest[..2].eq_ignore_ascii_case("fn") {
            if !first || ek & FKEY != 0 {
                return Err(bad_literal(lit));
            }
            ek |= FKEY;
            rest = &rest[2..];
            continue;
        }
        // Named literal?
        if rest.len() == 3 {
            if let Some(&(_, code)) = LITERALS.iter().find(|(kw, _)| kw.eq_ignore_ascii_case(rest))
            {
                if ek & CTRL != 0 && code & CTRL != 0 {
                    return Err(bad_literal(lit));
                }
                return finish_value(ek | code, lit);
            }
        }
        // Single character payload.
        let mut chars = rest.chars();
        let c = chars.next().expect("non-empty");
        if chars.next().is_some() || !c.is_ascii() || c == ' ' {
            return Err(bad_literal(lit));
        }
        let mut c = c as u8;
        // Literal control characters decode as their visible Ctrl form.
        if c < 0x20 || c == 0x7F {
            if ek & CTRL != 0 {
                return Err(bad_literal(lit));
            }
            ek |= CTRL;
            c ^= 0x40;
        }
        return finish_value(ek | c as u16, lit);
    }
}

fn finish_value(mut ek: u16, lit: &str) -> Outcome<KeyCode> {
    let c = (ek & 0xFF) as u8;
    if ek & CTRL != 0 {
        // C-@ is Ctrl-space.
        let c = if c == b'@' { b' ' } else { c };
        if c != b' ' && (c < b'?' || c == b'`' || c > b'z') {
            return Err(bad_literal(lit));
        }
        ek = (ek & !0xFF) | c as u16;
    }
    if ek & (CTRL | META) != 0 && ek & SHIFT != 0 {
        return Err(bad_literal(lit));
    }
    // Solo S- on a letter folds into the uppercase letter.
    if ek & (FKEY | SHIFT) == SHIFT {
        let c = (ek & 0xFF) as u8;
        if c.is_ascii_alphabetic() {
            ek = (ek & !(SHIFT | 0xFF)) | c.to_ascii_uppercase() as u16;
        } else if (0x20..0x7F).contains(&c) {
            return Err(bad_literal(lit));
        }
    } else if ek & FKEY == 0 && ek & (PREFIX_MASK | CTRL) != 0 {
        let c = (ek & 0xFF) as u8;
        ek = (ek & !0xFF) | c.to_ascii_uppercase() as u16;
    }
    Ok(KeyCode(ek))
}

/// Parse a human-readable key literal ("C-x f", "M-a", "S-FN5", "ESC p")
/// into a single merged key code. The table supplies which keys are bound
/// to prefix pseudo-commands so a two-value literal can fold.
pub fn parse_key_lit(lit: &str, table: &KeymapTable) -> Outcome<KeyCode> {
    let lit = lit.trim();
    let mut values = lit.split(' ').filter(|v| !v.is_empty());
    let first = values.next().ok_or_else(|| bad_literal(lit))?;
    let first_code = parse_value(first, true, lit)?;
    match values.next() {
        None => {
            if values.next().is_some() {
                return Err(bad_literal(lit));
            }
            Ok(first_code)
        }
        Some(second) => {
            if values.next().is_some() {
                return Err(bad_literal(lit));
            }
            let kind = table
                .prefix_of(first_code)
                .ok_or_else(|| Status::failure(format!("\"{first}\" is not a prefix key")))?;
            if first_code.has(META) {
                return Err(bad_literal(lit));
            }
            let second_code = parse_value(second, false, lit)?;
            if second_code.has(PREFIX_MASK) {
                return Err(bad_literal(lit));
            }
            Ok(merge_prefix(kind, second_code))
        }
    }
}

fn format_value(code: KeyCode, after_prefix: bool, out: &mut String) {
    if code.has(SHIFT) {
        out.push_str("S-");
    }
    if code.has(FKEY) {
        out.push_str("FN");
        out.push(code.char7() as char);
        return;
    }
    // Named control literals first.
    let base = code.0 & (CTRL | 0xFF);
    for (kw, lit_code) in LITERALS {
        if base == lit_code {
            out.push_str(kw);
            return;
        }
    }
    if code.has(CTRL) {
        if code.char7() == b' ' {
            out.push_str("C-SPC");
            return;
        }
        out.push_str("C-");
    }
    let c = code.char7();
    if c & 0x80 != 0 {
        out.push_str(&format!("<{c:02X}>"));
    } else if after_prefix || code.has(CTRL | PREFIX_MASK) {
        out.push(c.to_ascii_lowercase() as char);
    } else {
        out.push(c as char);
    }
}

/// Render a key code in its human-readable form. The table supplies the
/// display key for prefix classes.
pub fn format_key(code: KeyCode, table: &KeymapTable) -> String {
    let mut out = String::new();
    if code.has(PREF1 | PREF2 | PREF3) {
        let kind = if code.has(PREF1) {
            PrefixKind::Pref1
        } else if code.has(PREF2) {
            PrefixKind::Pref2
        } else {
            PrefixKind::Pref3
        };
        if let Some(key) = table.prefix_key(kind) {
            format_value(key, false, &mut out);
            out.push(' ');
        }
        format_value(KeyCode(code.0 & !PREFIX_MASK), true, &mut out);
        return out;
    }
    if code.has(META) {
        out.push_str("M-");
        format_value(KeyCode(code.0 & !PREFIX_MASK), true, &mut out);
        return out;
    }
    format_value(code, false, &mut out);
    out
}
