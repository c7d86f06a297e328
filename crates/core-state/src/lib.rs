//! core-state: buffers, modes, and rings.
//!
//! A [`Buffer`] wraps a `core_text::TextCore` with the attributes the editor
//! tracks per buffer: flags, file binding, discovered input delimiter,
//! per-buffer mode set, macro metadata, and the executing guard. The
//! [`BufferTable`] owns every buffer and enforces the lifecycle rules: a
//! buffer refuses destruction while displayed or executing, and refuses
//! modification while read-only or executing.
//!
//! Mode machinery lives in [`modes`], bounded history rings in [`ring`].

use core_status::{Outcome, Status};
use core_text::TextCore;
use std::path::PathBuf;
use tracing::debug;

pub mod modes;
pub mod ring;

pub use modes::{ModeScope, ModeTable};
pub use ring::{Ring, RingSet};

bitflags::bitflags! {
    /// Buffer attribute flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct BufFlags: u16 {
        /// Modification commands are refused.
        const READ_ONLY   = 1 << 0;
        /// Excluded from user-facing buffer cycling and listings.
        const HIDDEN      = 1 << 1;
        /// Holds a script; name carries the macro sigil.
        const MACRO       = 1 << 2;
        /// Showing a sub-range of its text; counts as changed on read.
        const NARROWED    = 1 << 3;
        /// Script preprocessor has run over the contents.
        const PREPROC     = 1 << 4;
        /// Macro argument count declared via `constrain`.
        const CONSTRAINED = 1 << 5;
        /// `~` attribute specifications render instead of displaying.
        const TERM_ATTR   = 1 << 6;
        /// One-shot "already saved this session" marker; never persisted.
        const QSAVE       = 1 << 7;
    }
}

/// Declared calling convention of a macro buffer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MacroMeta {
    pub usage: Option<String>,
    pub desc: Option<String>,
    /// Declared argument count bounds; `None` max means unbounded.
    pub min_args: u16,
    pub max_args: Option<u16>,
}

/// Name prefix marking a macro buffer.
pub const MACRO_SIGIL: char = '@';

#[derive(Debug)]
pub struct Buffer {
    name: String,
    pub core: TextCore,
    flags: BufFlags,
    filename: Option<PathBuf>,
    /// Line delimiter discovered on read; empty until a file has been read.
    file_delim: Vec<u8>,
    /// Whether the file ended with its delimiter.
    final_delim: bool,
    /// Windows currently displaying this buffer.
    window_refs: u32,
    /// Enabled buffer-scope mode names.
    buffer_modes: Vec<String>,
    macro_meta: Option<MacroMeta>,
    /// Nonzero while a macro in this buffer is running.
    exec_count: u32,
}

impl Buffer {
    fn new(name: &str) -> Self {
        Buffer {
            name: name.to_string(),
            core: TextCore::new(),
            flags: BufFlags::empty(),
            filename: None,
            file_delim: Vec::new(),
            final_delim: true,
            window_refs: 0,
            buffer_modes: Vec::new(),
            macro_meta: None,
            exec_count: 0,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn flags(&self) -> BufFlags {
        self.flags
    }

    pub fn set_flag(&mut self, flag: BufFlags, on: bool) {
        self.flags.set(flag, on);
    }

    pub fn filename(&self) -> Option<&PathBuf> {
        self.filename.as_ref()
    }

    pub fn set_filename(&mut self, path: Option<PathBuf>) {
        self.filename = path;
    }

    /// Delimiter to write the file with: the one discovered on read, else LF.
    pub fn write_delim(&self) -> &[u8] {
        if self.file_delim.is_empty() { b"\n" } else { &self.file_delim }
    }

    pub fn set_file_delim(&mut self, delim: Vec<u8>, final_delim: bool) {
        self.file_delim = delim;
        self.final_delim = final_delim;
    }

    pub fn final_delim(&self) -> bool {
        self.final_delim
    }

    /// Changed for saving purposes; a narrowed buffer always reads changed.
    pub fn is_changed(&self) -> bool {
        self.core.changed() || self.flags.contains(BufFlags::NARROWED)
    }

    pub fn is_executing(&self) -> bool {
        self.exec_count > 0
    }

    pub fn exec_enter(&mut self) {
        self.exec_count += 1;
    }

    pub fn exec_leave(&mut self) {
        debug_assert!(self.exec_count > 0, "exec counter underflow");
        self.exec_count -= 1;
    }

    /// Check that the buffer may be edited.
    pub fn check_editable(&self) -> Outcome<()> {
        if self.flags.contains(BufFlags::READ_ONLY) {
            return Err(Status::failure(format!("Buffer \"{}\" is read-only", self.name)));
        }
        if self.is_executing() {
            return Err(Status::failure(format!("Buffer \"{}\" is being executed", self.name)));
        }
        Ok(())
    }

    pub fn window_refs(&self) -> u32 {
        self.window_refs
    }

    pub fn retain_window(&mut self) {
        self.window_refs += 1;
    }

    pub fn release_window(&mut self) {
        debug_assert!(self.window_refs > 0, "window refcount underflow");
        self.window_refs -= 1;
    }

    pub fn buffer_modes(&self) -> &[String] {
        &self.buffer_modes
    }

    pub fn has_mode(&self, name: &str) -> bool {
        self.buffer_modes.iter().any(|m| m.eq_ignore_ascii_case(name))
    }

    pub(crate) fn add_mode(&mut self, name: &str) {
        if !self.has_mode(name) {
            self.buffer_modes.push(name.to_string());
        }
    }

    pub(crate) fn remove_mode(&mut self, name: &str) -> bool {
        let before = self.buffer_modes.len();
        self.buffer_modes.retain(|m| !m.eq_ignore_ascii_case(name));
        self.buffer_modes.len() != before
    }

    pub(crate) fn clear_modes(&mut self) {
        self.buffer_modes.clear();
    }

    pub fn macro_meta(&self) -> Option<&MacroMeta> {
        self.macro_meta.as_ref()
    }

    pub fn set_macro_meta(&mut self, meta: MacroMeta) {
        self.flags.insert(BufFlags::MACRO);
        if meta.min_args != 0 || meta.max_args.is_some() {
            self.flags.insert(BufFlags::CONSTRAINED);
        }
        self.macro_meta = Some(meta);
    }

    pub fn is_macro(&self) -> bool {
        self.flags.contains(BufFlags::MACRO)
    }
}

/// Outcome of a lookup-or-create.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Found {
    pub index: usize,
    pub created: bool,
}

/// Owner of every buffer. Exactly one buffer is current.
#[derive(Debug)]
pub struct BufferTable {
    buffers: Vec<Buffer>,
    current: usize,
}

impl Default for BufferTable {
    fn default() -> Self {
        Self::new()
    }
}

impl BufferTable {
    /// Start with one visible scratch buffer.
    pub fn new() -> Self {
        BufferTable { buffers: vec![Buffer::new("unnamed")], current: 0 }
    }

    pub fn len(&self) -> usize {
        self.buffers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffers.is_empty()
    }

    pub fn current(&self) -> &Buffer {
        &self.buffers[self.current]
    }

    pub fn current_mut(&mut self) -> &mut Buffer {
        &mut self.buffers[self.current]
    }

    pub fn current_index(&self) -> usize {
        self.current
    }

    pub fn get(&self, index: usize) -> &Buffer {
        &self.buffers[index]
    }

    pub fn get_mut(&mut self, index: usize) -> &mut Buffer {
        &mut self.buffers[index]
    }

    pub fn iter(&self) -> impl Iterator<Item = &Buffer> {
        self.buffers.iter()
    }

    pub fn find(&self, name: &str) -> Option<usize> {
        self.buffers.iter().position(|b| b.name == name)
    }

    /// Look a buffer up by name, creating it when absent.
    pub fn find_or_create(&mut self, name: &str) -> Found {
        if let Some(index) = self.find(name) {
            return Found { index, created: false };
        }
        debug!(target: "state.buffer", name, "create");
        self.buffers.push(Buffer::new(name));
        Found { index: self.buffers.len() - 1, created: true }
    }

    /// Create a uniquely named scratch buffer and return its index.
    pub fn scratch(&mut self) -> usize {
        let mut n = 0u32;
        loop {
            let name = format!("scratch{n}");
            if self.find(&name).is_none() {
                return self.find_or_create(&name).index;
            }
            n += 1;
        }
    }

    /// Make a buffer current. The old buffer keeps its state; window
    /// reference counts are the display layer's business.
    pub fn select(&mut self, index: usize) -> Outcome<()> {
        if index >= self.buffers.len() {
            return Err(Status::failure("No such buffer"));
        }
        self.current = index;
        Ok(())
    }

    pub fn select_name(&mut self, name: &str) -> Outcome<()> {
        match self.find(name) {
            Some(index) => self.select(index),
            None => Err(Status::failure(format!("No such buffer \"{name}\""))),
        }
    }

    /// Next (or previous) visible buffer index after `from`, wrapping.
    /// `NotFound` when no other visible buffer exists.
    pub fn cycle_from(&self, from: usize, forward: bool) -> Outcome<usize> {
        let len = self.buffers.len();
        let mut index = from;
        for _ in 0..len {
            index = if forward { (index + 1) % len } else { (index + len - 1) % len };
            if index == from {
                break;
            }
            if !self.buffers[index].flags.contains(BufFlags::HIDDEN) {
                return Ok(index);
            }
        }
        Err(Status::not_found())
    }

    pub fn rename(&mut self, index: usize, new_name: &str) -> Outcome<()> {
        if self.find(new_name).is_some() {
            return Err(Status::failure(format!("Buffer \"{new_name}\" already exists")));
        }
        self.buffers[index].name = new_name.to_string();
        Ok(())
    }

    /// Destroy a buffer. Refused while displayed or executing, and for the
    /// last remaining buffer.
    pub fn delete(&mut self, index: usize) -> Outcome<()> {
        let buf = &self.buffers[index];
        if buf.window_refs > 0 {
            return Err(Status::failure(format!("Buffer \"{}\" is being displayed", buf.name)));
        }
        if buf.is_executing() {
            return Err(Status::failure(format!("Buffer \"{}\" is being executed", buf.name)));
        }
        if self.buffers.len() == 1 {
            return Err(Status::failure("Cannot delete last buffer"));
        }
        debug!(target: "state.buffer", name = %self.buffers[index].name, "delete");
        self.buffers.remove(index);
        if self.current >= index && self.current > 0 {
            self.current -= 1;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn find_or_create_is_idempotent() {
        let mut table = BufferTable::new();
        let a = table.find_or_create("notes");
        assert!(a.created);
        let b = table.find_or_create("notes");
        assert!(!b.created);
        assert_eq!(a.index, b.index);
    }

    #[test]
    fn scratch_names_are_unique() {
        let mut table = BufferTable::new();
        let a = table.scratch();
        let b = table.scratch();
        assert_ne!(table.get(a).name(), table.get(b).name());
    }

    #[test]
    fn delete_refuses_displayed_and_executing() {
        let mut table = BufferTable::new();
        let index = table.find_or_create("doomed").index;
        table.get_mut(index).retain_window();
        assert!(table.delete(index).is_err());
        table.get_mut(index).release_window();
        table.get_mut(index).exec_enter();
        assert!(table.delete(index).is_err());
        table.get_mut(index).exec_leave();
        assert!(table.delete(index).is_ok());
    }

    #[test]
    fn delete_last_buffer_refused() {
        let mut table = BufferTable::new();
        assert!(table.delete(0).is_err());
    }

    #[test]
    fn delete_adjusts_current_index() {
        let mut table = BufferTable::new();
        let a = table.find_or_create("a").index;
        let b = table.find_or_create("b").index;
        table.select(b).unwrap();
        table.delete(a).unwrap();
        assert_eq!(table.current().name(), "b");
    }

    #[test]
    fn cycle_skips_hidden() {
        let mut table = BufferTable::new();
        let hidden = table.find_or_create("shadow").index;
        table.get_mut(hidden).set_flag(BufFlags::HIDDEN, true);
        let visible = table.find_or_create("plain").index;
        assert_eq!(table.cycle_from(0, true).unwrap(), visible);
        assert_eq!(table.cycle_from(visible, true).unwrap(), 0);
    }

    #[test]
    fn cycle_with_no_other_visible_is_not_found() {
        let table = BufferTable::new();
        assert!(table.cycle_from(0, true).unwrap_err().is_not_found());
    }

    #[test]
    fn editable_checks() {
        let mut buf = Buffer::new("x");
        assert!(buf.check_editable().is_ok());
        buf.set_flag(BufFlags::READ_ONLY, true);
        assert!(buf.check_editable().is_err());
        buf.set_flag(BufFlags::READ_ONLY, false);
        buf.exec_enter();
        assert!(buf.check_editable().is_err());
        buf.exec_leave();
        assert!(buf.check_editable().is_ok());
    }

    #[test]
    fn narrowed_reads_changed() {
        let mut buf = Buffer::new("x");
        assert!(!buf.is_changed());
        buf.set_flag(BufFlags::NARROWED, true);
        assert!(buf.is_changed());
    }

    #[test]
    fn macro_meta_sets_flags() {
        let mut buf = Buffer::new("@inc");
        buf.set_macro_meta(MacroMeta {
            usage: Some("inc(x)".into()),
            desc: None,
            min_args: 1,
            max_args: Some(1),
        });
        assert!(buf.is_macro());
        assert!(buf.flags().contains(BufFlags::CONSTRAINED));
    }
}
