//! core-actions: the dispatcher and the built-in command set.
//!
//! [`Session`] aggregates every piece of editor state except the script
//! interpreter; [`Editor`] pairs the two so entry points can split-borrow
//! them (the interpreter's [`core_exec::Host`] is implemented over a
//! `Session` + terminal context, and hands the interpreter back through its
//! calls for re-entry).
//!
//! Commands are plain functions of `(session, term, interp, n, args)`
//! registered by name; keys resolve to command names through the keymap.
//! The dispatcher loop, the universal-argument automaton, keyboard macros,
//! and the file-I/O collaborator live in their own modules.

use core_config::Config;
use core_exec::{Datum, Interp};
use core_keymap::{KeyCode, KeymapTable};
use core_search::Match;
use core_state::{BufferTable, ModeTable, RingSet};
use core_status::{MessageCell, Outcome};
use core_terminal::Term;
use core_text::motion::WordChars;
use core_text::Point;
use std::collections::VecDeque;

pub mod commands;
pub mod dispatcher;
pub mod host_impl;
pub mod io_ops;
pub mod kbdmacro;
pub mod narg;
pub mod registry;

pub use host_impl::HostCtx;

bitflags::bitflags! {
    /// Inter-command state bits: `this_flags` is cleared before each
    /// command and becomes `last_flags` after it runs.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct CmdFlags: u8 {
        /// Vertical move; preserves the goal column.
        const VMOVE = 1 << 0;
        /// Kill command; adjacent kills coalesce.
        const KILL  = 1 << 1;
        /// Delete command (delete ring, no coalescing).
        const DEL   = 1 << 2;
        /// Yank; enables yankPop.
        const YANK  = 1 << 3;
        /// Line traversal; remembers direction.
        const TRAV  = 1 << 4;
    }
}

/// The `seti` insert counter.
#[derive(Debug, Clone)]
pub struct SetiCounter {
    pub value: i64,
    pub step: i64,
    pub format: String,
}

impl Default for SetiCounter {
    fn default() -> Self {
        SetiCounter { value: 1, step: 1, format: "%d".into() }
    }
}

/// Everything the editor tracks besides the interpreter.
pub struct Session {
    pub buffers: BufferTable,
    pub modes: ModeTable,
    pub rings: RingSet,
    pub keymap: KeymapTable,
    pub search: Match,
    pub config: Config,
    pub msg: MessageCell,
    pub words: WordChars,
    pub word_table: [bool; 256],
    pub this_flags: CmdFlags,
    pub last_flags: CmdFlags,
    /// Goal column for consecutive vertical moves.
    pub target_col: usize,
    /// Direction memory for traverseLine (+1 / -1).
    pub trav_dir: i64,
    pub kbd: kbdmacro::KbdMacro,
    /// Pushed-back keys, consumed before the keyboard.
    pub unget: VecDeque<KeyCode>,
    pub last_key: KeyCode,
    /// Visible form of the last key sequence (pre-key hook argument).
    pub last_key_seq: String,
    pub auto_save_left: u32,
    pub seti: SetiCounter,
    /// Start of the last yank, for yankPop.
    pub last_yank: Option<(Point, u64)>,
}

impl Session {
    pub fn new(config: Config) -> Session {
        let words = WordChars::from_spec(config.word_chars.as_bytes());
        let word_table = build_word_table(&words);
        let auto_save_left = config.auto_save_count;
        let mut session = Session {
            buffers: BufferTable::new(),
            modes: ModeTable::with_defaults(),
            rings: RingSet {
                kill: core_state::Ring::new("kill", config.kill_ring_size),
                delete: core_state::Ring::new("delete", config.delete_ring_size),
                search: core_state::Ring::new("search", config.search_ring_size),
                replace: core_state::Ring::new("replace", config.replace_ring_size),
            },
            keymap: KeymapTable::new(),
            search: Match::new(),
            config,
            msg: MessageCell::new(),
            words,
            word_table,
            this_flags: CmdFlags::empty(),
            last_flags: CmdFlags::empty(),
            target_col: 0,
            trav_dir: 1,
            kbd: kbdmacro::KbdMacro::default(),
            unget: VecDeque::new(),
            last_key: KeyCode::plain(b' '),
            last_key_seq: String::new(),
            auto_save_left,
            seti: SetiCounter::default(),
            last_yank: None,
        };
        registry::install_default_bindings(&mut session.keymap);
        // The initial buffer is on display.
        session.buffers.current_mut().retain_window();
        session
    }

    /// Scan environment for the search engine, folding the global `Exact`
    /// and `Regexp` modes with session tables.
    pub fn scan_env(&self) -> core_search::ScanEnv<'_> {
        core_search::ScanEnv {
            exact_default: self.modes.is_global_enabled("Exact"),
            regex_default: self.modes.is_global_enabled("Regexp"),
            words: &self.word_table,
            progress_after: self.config.search_progress,
        }
    }

    /// Rebuild the word table after `$wordChars` changes.
    pub fn set_word_chars(&mut self, spec: &str) {
        self.words = WordChars::from_spec(spec.as_bytes());
        self.word_table = build_word_table(&self.words);
        self.config.word_chars = spec.to_string();
    }

    /// Post an informational message for the message line.
    pub fn notify(&mut self, text: impl Into<String>) {
        self.msg.post(core_status::Severity::Success, text, false);
    }
}

fn build_word_table(words: &WordChars) -> [bool; 256] {
    let mut table = [false; 256];
    for (i, slot) in table.iter_mut().enumerate() {
        *slot = words.is_word(i as u8);
    }
    table
}

/// The whole editor: session state plus the script interpreter.
pub struct Editor {
    pub session: Session,
    pub interp: Interp,
}

impl Editor {
    pub fn new(config: Config) -> Editor {
        let mut interp = Interp::new();
        interp.max_macro_depth = config.max_macro_depth;
        interp.max_loop = config.max_loop;
        Editor { session: Session::new(config), interp }
    }

    /// Run a script (file contents, startup expression) to completion.
    pub fn run_script(&mut self, term: &mut dyn Term, src: &str) -> Outcome<Datum> {
        let Editor { session, interp } = self;
        let mut host = HostCtx { session, term };
        interp.run_script(&mut host, src)
    }

    /// Evaluate one expression.
    pub fn eval(&mut self, term: &mut dyn Term, src: &str) -> Outcome<Datum> {
        let Editor { session, interp } = self;
        let mut host = HostCtx { session, term };
        interp.eval_str(&mut host, src)
    }

    /// Invoke a command or macro by name with a numeric prefix.
    pub fn call_named(
        &mut self,
        term: &mut dyn Term,
        name: &str,
        n: Option<i64>,
        args: Vec<Datum>,
    ) -> Outcome<Datum> {
        let Editor { session, interp } = self;
        if interp.has_macro(name) {
            let mut host = HostCtx { session, term };
            return interp.call_macro(&mut host, name, n, args);
        }
        registry::dispatch(session, term, interp, name, n, args)
    }

    /// Run a hook macro if one is bound to the event.
    pub fn run_hook(
        &mut self,
        term: &mut dyn Term,
        hook: &str,
        args: Vec<Datum>,
    ) -> Outcome<Datum> {
        let Editor { session, interp } = self;
        let mut host = HostCtx { session, term };
        interp.run_hook(&mut host, hook, args)
    }
}
