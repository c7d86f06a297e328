//! Named modes and mutually-exclusive mode groups.
//!
//! A mode is either global (one enabled flag on the table) or buffer-scoped
//! (membership in each buffer's mode set). Modes may belong to a group; at
//! most one member of a group is enabled at a time per scope instance, so
//! enabling a member silently disables its siblings. Group members must all
//! share one scope, which is why a scope change is refused while siblings
//! exist.

use crate::Buffer;
use core_status::{Outcome, Status};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeScope {
    Global,
    Buffer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeAction {
    Set,
    Clear,
    Toggle,
}

#[derive(Debug, Clone)]
pub struct ModeInfo {
    pub name: String,
    pub group: Option<String>,
    pub scope: ModeScope,
    pub hidden: bool,
    pub user_defined: bool,
    /// Enabled flag; meaningful for global modes only.
    pub global_enabled: bool,
}

#[derive(Debug, Default)]
pub struct ModeTable {
    modes: Vec<ModeInfo>,
}

impl ModeTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// The standard mode roster.
    pub fn with_defaults() -> Self {
        let mut table = ModeTable::new();
        for name in ["ASave", "Bak", "Exact", "Regexp", "Safe"] {
            table.register(name, ModeScope::Global, None, false, false).expect("default mode");
        }
        for (name, group) in
            [("Over", Some("TypeOver")), ("Repl", Some("TypeOver")), ("Wrap", None), ("Fence", None)]
        {
            table.register(name, ModeScope::Buffer, group, false, false).expect("default mode");
        }
        table
    }

    pub fn register(
        &mut self,
        name: &str,
        scope: ModeScope,
        group: Option<&str>,
        hidden: bool,
        user_defined: bool,
    ) -> Outcome<()> {
        if self.find(name).is_some() {
            return Err(Status::failure(format!("Mode \"{name}\" already exists")));
        }
        if let Some(group) = group {
            // Group scope must be uniform.
            if let Some(member) = self.modes.iter().find(|m| m.group.as_deref() == Some(group)) {
                if member.scope != scope {
                    return Err(Status::failure(format!(
                        "Scope of mode \"{name}\" conflicts with group \"{group}\""
                    )));
                }
            }
        }
        self.modes.push(ModeInfo {
            name: name.to_string(),
            group: group.map(str::to_string),
            scope,
            hidden,
            user_defined,
            global_enabled: false,
        });
        Ok(())
    }

    pub fn find(&self, name: &str) -> Option<&ModeInfo> {
        self.modes.iter().find(|m| m.name.eq_ignore_ascii_case(name))
    }

    fn find_mut(&mut self, name: &str) -> Option<&mut ModeInfo> {
        self.modes.iter_mut().find(|m| m.name.eq_ignore_ascii_case(name))
    }

    pub fn iter(&self) -> impl Iterator<Item = &ModeInfo> {
        self.modes.iter()
    }

    pub fn group_members(&self, group: &str) -> Vec<&ModeInfo> {
        self.modes.iter().filter(|m| m.group.as_deref() == Some(group)).collect()
    }

    pub fn is_global_enabled(&self, name: &str) -> bool {
        self.find(name).is_some_and(|m| m.scope == ModeScope::Global && m.global_enabled)
    }

    /// Change a mode's scope. Refused while the mode shares a group with
    /// other members.
    pub fn set_scope(&mut self, name: &str, scope: ModeScope) -> Outcome<()> {
        let Some(info) = self.find(name) else {
            return Err(Status::failure(format!("No such mode \"{name}\"")));
        };
        if let Some(group) = info.group.clone() {
            if self.group_members(&group).len() > 1 {
                return Err(Status::failure(format!(
                    "Cannot change scope of mode \"{name}\": group \"{group}\" has other members"
                )));
            }
        }
        let info = self.find_mut(name).expect("mode found above");
        info.scope = scope;
        info.global_enabled = false;
        Ok(())
    }

    pub fn remove(&mut self, name: &str) -> Outcome<()> {
        let Some(pos) = self.modes.iter().position(|m| m.name.eq_ignore_ascii_case(name)) else {
            return Err(Status::failure(format!("No such mode \"{name}\"")));
        };
        if !self.modes[pos].user_defined {
            return Err(Status::failure(format!("Cannot delete built-in mode \"{name}\"")));
        }
        self.modes.remove(pos);
        Ok(())
    }

    /// Disable every global mode (the `n > 1` "clear all, then set" form).
    pub fn clear_global(&mut self) {
        for mode in &mut self.modes {
            mode.global_enabled = false;
        }
    }

    /// Apply an action to a global mode. Returns whether anything changed
    /// (a set of an already-set mode is a no-op, so no hook should run).
    pub fn change_global(&mut self, name: &str, action: ModeAction) -> Outcome<bool> {
        let Some(info) = self.find(name) else {
            return Err(Status::failure(format!("No such mode \"{name}\"")));
        };
        if info.scope != ModeScope::Global {
            return Err(Status::failure(format!("Mode \"{name}\" is not a global mode")));
        }
        let was = info.global_enabled;
        let now = match action {
            ModeAction::Set => true,
            ModeAction::Clear => false,
            ModeAction::Toggle => !was,
        };
        if now == was {
            return Ok(false);
        }
        let group = info.group.clone();
        if now {
            if let Some(group) = &group {
                for mode in &mut self.modes {
                    if mode.group.as_deref() == Some(group) {
                        mode.global_enabled = false;
                    }
                }
            }
        }
        let canonical = self.find_mut(name).expect("mode found above");
        canonical.global_enabled = now;
        debug!(target: "state.mode", mode = %canonical.name, enabled = now, "global mode change");
        Ok(true)
    }

    /// Apply an action to a buffer-scope mode on one buffer. Group siblings
    /// enabled on that buffer are cleared when setting.
    pub fn change_buffer(
        &self,
        buffer: &mut Buffer,
        name: &str,
        action: ModeAction,
    ) -> Outcome<bool> {
        let Some(info) = self.find(name) else {
            return Err(Status::failure(format!("No such mode \"{name}\"")));
        };
        if info.scope != ModeScope::Buffer {
            return Err(Status::failure(format!("Mode \"{name}\" is not a buffer mode")));
        }
        let was = buffer.has_mode(&info.name);
        let now = match action {
            ModeAction::Set => true,
            ModeAction::Clear => false,
            ModeAction::Toggle => !was,
        };
        if now == was {
            return Ok(false);
        }
        if now {
            if let Some(group) = &info.group {
                for member in self.group_members(group) {
                    buffer.remove_mode(&member.name);
                }
            }
            let canonical = info.name.clone();
            buffer.add_mode(&canonical);
        } else {
            buffer.remove_mode(&info.name);
        }
        Ok(true)
    }

    /// Clear every buffer-scope mode on one buffer.
    pub fn clear_buffer(&self, buffer: &mut Buffer) {
        buffer.clear_modes();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::BufferTable;

    #[test]
    fn defaults_register() {
        let table = ModeTable::with_defaults();
        assert!(table.find("exact").is_some());
        assert_eq!(table.find("Over").unwrap().scope, ModeScope::Buffer);
        assert_eq!(table.group_members("TypeOver").len(), 2);
    }

    #[test]
    fn set_already_set_is_noop() {
        let mut table = ModeTable::with_defaults();
        assert!(table.change_global("Exact", ModeAction::Set).unwrap());
        assert!(!table.change_global("Exact", ModeAction::Set).unwrap());
        assert!(table.is_global_enabled("Exact"));
    }

    #[test]
    fn toggle_flips() {
        let mut table = ModeTable::with_defaults();
        assert!(table.change_global("Bak", ModeAction::Toggle).unwrap());
        assert!(table.is_global_enabled("Bak"));
        assert!(table.change_global("Bak", ModeAction::Toggle).unwrap());
        assert!(!table.is_global_enabled("Bak"));
    }

    #[test]
    fn group_member_excludes_siblings() {
        let table = ModeTable::with_defaults();
        let mut buffers = BufferTable::new();
        let buf = buffers.current_mut();
        table.change_buffer(buf, "Over", ModeAction::Set).unwrap();
        assert!(buf.has_mode("Over"));
        table.change_buffer(buf, "Repl", ModeAction::Set).unwrap();
        assert!(buf.has_mode("Repl"));
        assert!(!buf.has_mode("Over"));
    }

    #[test]
    fn scope_mismatch_refused() {
        let mut table = ModeTable::with_defaults();
        let mut buffers = BufferTable::new();
        assert!(table.change_global("Over", ModeAction::Set).is_err());
        assert!(table
            .change_buffer(buffers.current_mut(), "Exact", ModeAction::Set)
            .is_err());
    }

    #[test]
    fn scope_change_refused_for_grouped_mode() {
        let mut table = ModeTable::with_defaults();
        assert!(table.set_scope("Over", ModeScope::Global).is_err());
        assert!(table.set_scope("Wrap", ModeScope::Global).is_ok());
    }

    #[test]
    fn group_scope_must_be_uniform() {
        let mut table = ModeTable::with_defaults();
        let err = table.register("Shadow", ModeScope::Global, Some("TypeOver"), false, true);
        assert!(err.is_err());
    }

    #[test]
    fn only_user_modes_removable() {
        let mut table = ModeTable::with_defaults();
        assert!(table.remove("Exact").is_err());
        table.register("Mine", ModeScope::Global, None, false, true).unwrap();
        assert!(table.remove("Mine").is_ok());
    }

    #[test]
    fn clear_global_disables_everything() {
        let mut table = ModeTable::with_defaults();
        table.change_global("Exact", ModeAction::Set).unwrap();
        table.change_global("Safe", ModeAction::Set).unwrap();
        table.clear_global();
        assert!(!table.is_global_enabled("Exact"));
        assert!(!table.is_global_enabled("Safe"));
    }
}
