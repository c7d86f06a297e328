//! core-config: editor configuration.
//!
//! Settings load from `ember.toml` in the platform config directory (or an
//! explicit path), with serde defaults for every field so a partial file is
//! fine. Out-of-range values clamp with a logged warning rather than
//! failing startup.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Hard tab stop width.
    pub tab_width: usize,
    /// Horizontal jump, percent of the visible window.
    pub jump_pct: u16,
    /// Script recursion bound.
    pub max_macro_depth: u32,
    /// Script loop iteration bound.
    pub max_loop: u64,
    /// Extension appended by backup-mode saves.
    pub backup_ext: String,
    /// Scan iterations before the "Searching..." notice.
    pub search_progress: u32,
    /// Keystrokes between auto-saves when the mode is on.
    pub auto_save_count: u32,
    /// Word-character spec (characters and `a-z` ranges).
    pub word_chars: String,
    /// Ring capacities.
    pub kill_ring_size: usize,
    pub delete_ring_size: usize,
    pub search_ring_size: usize,
    pub replace_ring_size: usize,
    /// Keyboard-macro replay bound.
    pub max_kbd_macro_loop: u32,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            tab_width: 8,
            jump_pct: 25,
            max_macro_depth: 100,
            max_loop: 2500,
            backup_ext: ".bak".into(),
            search_progress: 1000,
            auto_save_count: 120,
            word_chars: "A-Za-z0-9_".into(),
            kill_ring_size: 40,
            delete_ring_size: 24,
            search_ring_size: 40,
            replace_ring_size: 40,
            max_kbd_macro_loop: 1000,
        }
    }
}

impl Config {
    /// Default config file location.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("ember").join("ember.toml"))
    }

    /// Load from an explicit path; a missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Config> {
        if !path.exists() {
            debug!(target: "config", path = %path.display(), "no config file, using defaults");
            return Ok(Config::default());
        }
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        let mut config: Config =
            toml::from_str(&text).with_context(|| format!("parsing {}", path.display()))?;
        config.clamp();
        Ok(config)
    }

    /// Load from the default location, falling back to defaults.
    pub fn load_default() -> Config {
        match Config::default_path() {
            Some(path) => Config::load(&path).unwrap_or_else(|err| {
                warn!(target: "config", error = %err, "config load failed, using defaults");
                Config::default()
            }),
            None => Config::default(),
        }
    }

    /// Pull out-of-range values back into their legal ranges.
    pub fn clamp(&mut self) {
        let defaults = Config::default();
        if self.tab_width == 0 || self.tab_width > 32 {
            warn!(target: "config", value = self.tab_width, "tab_width out of range, using default");
            self.tab_width = defaults.tab_width;
        }
        if self.jump_pct == 0 || self.jump_pct > 90 {
            warn!(target: "config", value = self.jump_pct, "jump_pct out of range, using default");
            self.jump_pct = defaults.jump_pct;
        }
        if self.max_macro_depth == 0 {
            self.max_macro_depth = defaults.max_macro_depth;
        }
        for (slot, default) in [
            (&mut self.kill_ring_size, defaults.kill_ring_size),
            (&mut self.delete_ring_size, defaults.delete_ring_size),
            (&mut self.search_ring_size, defaults.search_ring_size),
            (&mut self.replace_ring_size, defaults.replace_ring_size),
        ] {
            if *slot == 0 {
                warn!(target: "config", "ring size of zero, using default");
                *slot = default;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_are_sane() {
        let config = Config::default();
        assert_eq!(config.tab_width, 8);
        assert_eq!(config.jump_pct, 25);
        assert_eq!(config.backup_ext, ".bak");
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load(&dir.path().join("none.toml")).unwrap();
        assert_eq!(config.tab_width, Config::default().tab_width);
    }

    #[test]
    fn partial_file_merges_with_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ember.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "tab_width = 4\nbackup_ext = \"~\"").unwrap();
        let config = Config::load(&path).unwrap();
        assert_eq!(config.tab_width, 4);
        assert_eq!(config.backup_ext, "~");
        assert_eq!(config.jump_pct, 25);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ember.toml");
        std::fs::write(&path, "no_such_setting = 1\n").unwrap();
        assert!(Config::load(&path).is_err());
    }

    #[test]
    fn out_of_range_values_clamp() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ember.toml");
        std::fs::write(&path, "tab_width = 0\njump_pct = 99\nkill_ring_size = 0\n").unwrap();
        let config = Config::load(&path).unwrap();
        assert_eq!(config.tab_width, 8);
        assert_eq!(config.jump_pct, 25);
        assert_eq!(config.kill_ring_size, 40);
    }
}
