//! Built-in commands.
//!
//! Every command is a plain function over `(session, term, interp, n,
//! args)`. Interactive commands take their inputs from `args` when a script
//! supplied them and prompt on the input line otherwise. Return values are
//! the script-visible results (booleans for motions, strings for listings).

use crate::{CmdFlags, Session};
use core_exec::{Datum, Interp};
use core_input::{CompKind, Completer, InputSpec};
use core_state::{BufFlags, Ring};
use core_status::{Outcome, Status};
use core_terminal::Term;
use core_text::Point;

pub mod edit;
pub mod file;
pub mod motion;
pub mod search;
pub mod control;

pub type CmdFn =
    fn(&mut Session, &mut dyn Term, &mut Interp, Option<i64>, Vec<Datum>) -> Outcome<Datum>;

/// Default a numeric prefix.
pub(crate) fn n_or(n: Option<i64>, default: i64) -> i64 {
    n.unwrap_or(default)
}

/// Positive repeat count or error.
pub(crate) fn repeat_count(n: Option<i64>) -> Outcome<u64> {
    let n = n_or(n, 1);
    if n < 1 {
        return Err(Status::failure("Repeat count must be positive"));
    }
    Ok(n as u64)
}

pub(crate) fn arg_text(args: &[Datum], index: usize) -> Option<String> {
    args.get(index).map(|d| String::from_utf8_lossy(&d.to_text()).into_owned())
}

/// Completion candidates snapshotted from session + interpreter state, so
/// the input line can borrow them without touching the session.
pub(crate) struct SnapshotCompleter {
    items: Vec<String>,
}

impl Completer for SnapshotCompleter {
    fn candidates(&mut self, _kind: CompKind) -> Vec<String> {
        self.items.clone()
    }

    fn show_list(&mut self, _kind: CompKind, _matches: &[String]) {}
}

pub(crate) fn completer(
    session: &Session,
    interp: &Interp,
    kind: CompKind,
) -> SnapshotCompleter {
    let items = match kind {
        CompKind::Buffer => session
            .buffers
            .iter()
            .filter(|b| !b.flags().contains(BufFlags::HIDDEN))
            .map(|b| b.name().to_string())
            .collect(),
        CompKind::Command => {
            let mut names: Vec<String> =
                crate::registry::command_names().iter().map(|s| (*s).to_string()).collect();
            names.extend(interp.macro_names().iter().map(|s| (*s).to_string()));
            names.sort_unstable();
            names
        }
        CompKind::Mode => session.modes.iter().map(|m| m.name.clone()).collect(),
        CompKind::GlobalMode => session
            .modes
            .iter()
            .filter(|m| m.scope == core_state::ModeScope::Global)
            .map(|m| m.name.clone())
            .collect(),
        CompKind::Variable | CompKind::MutableVariable => {
            let writable_only = kind == CompKind::MutableVariable;
            let mut names: Vec<String> = crate::host_impl::sysvar_names()
                .iter()
                .filter(|(_, writable)| *writable || !writable_only)
                .map(|(name, _)| format!("${name}"))
                .collect();
            names.extend(interp.global_names().iter().map(|n| format!("${n}")));
            names.sort_unstable();
            names
        }
        CompKind::Filename => std::fs::read_dir(".")
            .map(|dir| {
                dir.filter_map(|e| e.ok())
                    .map(|e| e.file_name().to_string_lossy().into_owned())
                    .collect()
            })
            .unwrap_or_default(),
    };
    SnapshotCompleter { items }
}

/// Fetch argument `index` or prompt for it. `None` means the user answered
/// with the explicit null.
pub(crate) fn arg_or_prompt(
    session: &mut Session,
    term: &mut dyn Term,
    interp: &Interp,
    args: &[Datum],
    index: usize,
    prompt: &str,
    kind: Option<CompKind>,
    ring: RingChoice,
) -> Outcome<Option<String>> {
    if let Some(text) = arg_text(args, index) {
        return Ok(Some(text));
    }
    let mut spec = InputSpec::new(format!("{prompt}: "));
    spec.jump_pct = session.config.jump_pct;
    if let Some(kind) = kind {
        spec = spec.with_completion(kind);
    }
    let mut completer = match kind {
        Some(kind) => completer(session, interp, kind),
        None => SnapshotCompleter { items: Vec::new() },
    };
    let ring = ring.pick(&session.rings);
    core_input::get_input(term, &spec, ring, &mut completer)
}

/// Which history ring feeds the prompt.
#[derive(Debug, Clone, Copy)]
pub(crate) enum RingChoice {
    None,
    Search,
    Replace,
}

impl RingChoice {
    fn pick(self, rings: &core_state::RingSet) -> Option<&Ring> {
        match self {
            RingChoice::None => None,
            RingChoice::Search => Some(&rings.search),
            RingChoice::Replace => Some(&rings.replace),
        }
    }
}

/// Like [`arg_or_prompt`] but an aborted-to-null reply is an error.
pub(crate) fn required_arg(
    session: &mut Session,
    term: &mut dyn Term,
    interp: &Interp,
    args: &[Datum],
    index: usize,
    prompt: &str,
    kind: Option<CompKind>,
    ring: RingChoice,
) -> Outcome<String> {
    match arg_or_prompt(session, term, interp, args, index, prompt, kind, ring)? {
        Some(text) if !text.is_empty() => Ok(text),
        _ => Err(Status::failure(format!("{prompt} required"))),
    }
}

/// Editability check on the current buffer.
pub(crate) fn check_edit(session: &Session) -> Outcome<()> {
    session.buffers.current().check_editable()
}

/// Push killed text onto the kill ring, coalescing adjacent kills.
/// Backward kills prepend so the entry reads in buffer order.
pub(crate) fn kill_capture(session: &mut Session, text: &[u8], forward: bool) {
    if !session.last_flags.contains(CmdFlags::KILL)
        && !session.this_flags.contains(CmdFlags::KILL)
    {
        session.rings.kill.open();
    }
    if forward {
        session.rings.kill.append_current(text);
    } else {
        session.rings.kill.prepend_current(text);
    }
    session.this_flags.insert(CmdFlags::KILL);
}

/// Push deleted text onto the delete ring; never coalesces.
pub(crate) fn delete_capture(session: &mut Session, text: Vec<u8>) {
    session.rings.delete.push(text);
    session.this_flags.insert(CmdFlags::DEL);
}

/// Record the work mark at `origin` when the point left its line.
pub(crate) fn set_wmark_if_moved(session: &mut Session, origin: Point) {
    let core = &mut session.buffers.current_mut().core;
    if core.point().line != origin.line {
        let now = core.point();
        core.set_point(origin);
        core.set_mark(core_text::WMARK, 0);
        core.set_point(now);
    }
}

/// Write a listing into a hidden pop-up buffer and return its text.
pub(crate) fn listing(session: &mut Session, name: &str, text: String) -> Datum {
    let index = session.buffers.find_or_create(name).index;
    let buffer = session.buffers.get_mut(index);
    buffer.set_flag(BufFlags::HIDDEN, true);
    buffer.core = core_text::TextCore::from_bytes(text.as_bytes());
    buffer.core.set_changed(false);
    Datum::str(text)
}
