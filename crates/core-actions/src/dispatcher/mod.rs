//! The dispatcher: the editor's main event loop.
//!
//! One cycle: read a key (unget slot, keyboard-macro playback, or the
//! keyboard), run the universal-argument automaton when it opens with `^U`
//! or `^_`, assemble the 1–2 code key sequence through the prefix table,
//! run the pre-key hook, execute the binding (or self-insert), run the
//! post-key hook, then the auto-save countdown. The abort key unwinds any
//! read with `UserAbort`, which cancels keyboard-macro activity and lands
//! back in the loop.
//!
//! Effects within a cycle are strictly ordered: pre-key hook → command →
//! post-key hook → auto-save → redisplay (the caller's render hook).

use crate::commands::file::save_all;
use crate::commands::motion::find_fence_match;
use crate::narg::{NargInput, NargMachine, NargStep};
use crate::{registry, CmdFlags, Editor, HostCtx, Session};
use core_exec::{Datum, Interp};
use core_keymap::{format_key, merge_prefix, KeyCode, KeyTarget, ABORT_KEY};
use core_status::{Outcome, Severity, Status};
use core_terminal::Term;
use tracing::{debug, trace};

/// Default universal-argument key.
pub const UNIVERSAL_KEY: KeyCode = KeyCode(core_keymap::CTRL | b'U' as u16);
/// Default negative-argument key.
pub const NEGATIVE_KEY: KeyCode = KeyCode(core_keymap::CTRL | b'_' as u16);

/// Read one raw key: the unget queue first, then keyboard-macro playback,
/// then the terminal. The abort key unwinds immediately. Keys read from
/// the keyboard are appended to an active recording; replayed and pushed-
/// back keys are not (they were recorded when first read).
pub fn read_key_raw(session: &mut Session, term: &mut dyn Term) -> Outcome<KeyCode> {
    if let Some(key) = session.unget.pop_front() {
        if key == ABORT_KEY {
            return Err(Status::user_abort());
        }
        session.last_key = key;
        return Ok(key);
    }
    if session.kbd.is_playing() {
        if let Some(key) = session.kbd.next_play_key(session.config.max_kbd_macro_loop)? {
            session.last_key = key;
            return Ok(key);
        }
    }
    let key = term
        .get_key(None)
        .map_err(|err| Status::os_error(err.to_string()))?
        .expect("blocking read");
    session.kbd.record(key);
    if key == ABORT_KEY {
        return Err(Status::user_abort());
    }
    session.last_key = key;
    Ok(key)
}

/// Resolve a full key sequence starting from `first`: when `first` is
/// bound to a prefix, read the second code and merge.
fn resolve_sequence(
    session: &mut Session,
    term: &mut dyn Term,
    first: KeyCode,
) -> Outcome<KeyCode> {
    let merged = match session.keymap.prefix_of(first) {
        Some(kind) => {
            let second = read_key_raw(session, term)?;
            merge_prefix(kind, second)
        }
        None => first,
    };
    session.last_key_seq = format_key(merged, &session.keymap);
    trace!(target: "dispatch.key", seq = %session.last_key_seq, "sequence");
    Ok(merged)
}

/// Run the numeric-argument automaton after its opening key, showing the
/// provisional value. Returns the finalized argument and the next key.
fn collect_narg(
    session: &mut Session,
    term: &mut dyn Term,
    opener: KeyCode,
) -> Outcome<(i64, KeyCode)> {
    let mut machine =
        if opener == NEGATIVE_KEY { NargMachine::negative() } else { NargMachine::universal() };
    let (_, rows) = term.size();
    loop {
        term.move_to(rows - 1, 0);
        term.put_str(format!("Arg: {}", machine.value()).as_bytes());
        term.erase_eol();
        term.flush();
        let key = read_key_raw(session, term)?;
        match machine.step(NargInput::classify(key, UNIVERSAL_KEY, NEGATIVE_KEY)) {
            NargStep::Pending(_) => {}
            NargStep::Done(n) => return Ok((n, key)),
        }
    }
}

/// Insert a printable key `n` times, honoring the overwrite modes and
/// showing the matching fence when enabled.
fn self_insert(
    session: &mut Session,
    _term: &mut dyn Term,
    n: i64,
    c: u8,
) -> Outcome<Datum> {
    if n < 0 {
        return Err(Status::failure("Repeat count must be positive"));
    }
    session.buffers.current().check_editable()?;
    let over = session.buffers.current().has_mode("Over");
    let repl = session.buffers.current().has_mode("Repl");
    let fence = session.buffers.current().has_mode("Fence");
    let core = &mut session.buffers.current_mut().core;
    for _ in 0..n {
        if over || repl {
            // Replace the character under the point; overwrite mode spares
            // tabs so columns stay aligned.
            let at = core.char_at(core.point());
            let replace = match at {
                Some(b'\n') | None => false,
                Some(b'\t') if over => false,
                Some(_) => true,
            };
            if replace {
                core.delete(1, false)?;
            }
        }
        core.insert_char(1, c)?;
    }
    if fence && matches!(c, b')' | b']' | b'}') {
        let mut at = core.point();
        at.offset -= 1;
        if let Some(open) = find_fence_match(core, at) {
            trace!(target: "dispatch.key", line = ?open, "fence match");
        }
    }
    Ok(Datum::Bool(true))
}

/// Execute a resolved key with a numeric argument.
fn execute_key(
    session: &mut Session,
    term: &mut dyn Term,
    interp: &mut Interp,
    key: KeyCode,
    n: Option<i64>,
) -> Outcome<Datum> {
    match session.keymap.get(key).cloned() {
        Some(KeyTarget::Command(name)) => {
            debug!(target: "dispatch.key", cmd = %name, "execute");
            registry::dispatch(session, term, interp, &name, n, Vec::new())
        }
        Some(KeyTarget::Macro(name)) => {
            debug!(target: "dispatch.key", name = %name, "execute macro");
            let mut host = HostCtx { session, term };
            interp.call_macro(&mut host, &name, n, Vec::new())
        }
        Some(KeyTarget::Prefix(_)) => {
            // A bare prefix at dispatch time is a stray; treat as unbound.
            term.beep();
            Err(Status::failure("Key not bound"))
        }
        None => match key.literal_char() {
            Some(c) => self_insert(session, term, n.unwrap_or(1), c),
            None => {
                term.beep();
                Err(Status::failure(format!(
                    "Key {} not bound",
                    format_key(key, &session.keymap)
                )))
            }
        },
    }
}

/// One full dispatcher cycle. Non-exit failures land on the message line
/// and the loop continues; exit-class statuses propagate to the caller.
pub fn process_cycle(ed: &mut Editor, term: &mut dyn Term) -> Outcome<()> {
    let result = cycle_inner(ed, term);
    match result {
        Ok(()) => Ok(()),
        Err(st) if st.severity() == Severity::UserAbort => {
            // Abort cancels any keyboard macro in flight.
            ed.session.kbd.cancel();
            ed.session.msg.post_status(&st);
            Ok(())
        }
        Err(st) if st.is_not_found() => Ok(()),
        Err(st) if st.severity() == Severity::Failure || st.severity() == Severity::OsError => {
            ed.session.msg.post_status(&st);
            Ok(())
        }
        Err(st) => Err(st),
    }
}

fn cycle_inner(ed: &mut Editor, term: &mut dyn Term) -> Outcome<()> {
    let first = read_key_raw(&mut ed.session, term)?;

    // Numeric argument processing.
    let (n, first) = if first == UNIVERSAL_KEY || first == NEGATIVE_KEY {
        let (n, key) = collect_narg(&mut ed.session, term, first)?;
        (Some(n), key)
    } else {
        (None, first)
    };

    let key = resolve_sequence(&mut ed.session, term, first)?;
    ed.session.this_flags = CmdFlags::empty();

    // Pre-key hook; a truthy return skips execution.
    let seq = ed.session.last_key_seq.clone();
    let skip = ed.run_hook(term, "preKey", vec![Datum::str(&seq)])?.is_truthy();
    let result = if skip {
        Ok(Datum::Nil)
    } else {
        let Editor { session, interp } = ed;
        execute_key(session, term, interp, key, n)
    };
    ed.run_hook(term, "postKey", vec![Datum::str(&seq)])?;

    ed.session.last_flags = ed.session.this_flags;

    // Auto-save countdown.
    if ed.session.modes.is_global_enabled("ASave") && ed.session.config.auto_save_count > 0 {
        ed.session.auto_save_left = ed.session.auto_save_left.saturating_sub(1);
        if ed.session.auto_save_left == 0 {
            ed.session.auto_save_left = ed.session.config.auto_save_count;
            let Editor { session, interp } = ed;
            save_all(session, term, interp)?;
        }
    }

    result.map(|_| ())
}

/// The main loop: render, process, repeat until an exit-class status.
/// Redisplay is skipped when input is already pending.
pub fn run_loop(
    ed: &mut Editor,
    term: &mut dyn Term,
    render: &mut dyn FnMut(&mut Editor, &mut dyn Term),
) -> Status {
    loop {
        if !term.type_ahead() {
            render(ed, term);
        }
        match process_cycle(ed, term) {
            Ok(()) => {}
            Err(st) => return st,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_config::Config;
    use core_keymap::{KeyCode, CTRL};
    use core_terminal::ScriptedTerm;

    fn editor() -> Editor {
        Editor::new(Config::default())
    }

    fn keys(text: &str) -> Vec<KeyCode> {
        text.bytes().map(KeyCode::plain).collect()
    }

    fn drain(ed: &mut Editor, term: &mut ScriptedTerm) {
        while term.type_ahead() {
            if let Err(st) = process_cycle(ed, term) {
                panic!("cycle failed: {st}");
            }
        }
    }

    fn buffer_text(ed: &Editor) -> String {
        String::from_utf8(ed.session.buffers.current().core.to_bytes(b"\n", false)).unwrap()
    }

    #[test]
    fn self_insert_types_text() {
        let mut ed = editor();
        let mut term = ScriptedTerm::new(keys("hi"));
        drain(&mut ed, &mut term);
        assert_eq!(buffer_text(&ed), "hi");
        assert!(ed.session.buffers.current().is_changed());
    }

    #[test]
    fn universal_argument_repeats_insert() {
        let mut ed = editor();
        let mut term = ScriptedTerm::new([UNIVERSAL_KEY, KeyCode::plain(b'3'), KeyCode::plain(b'x')]);
        drain(&mut ed, &mut term);
        assert_eq!(buffer_text(&ed), "xxx");
    }

    #[test]
    fn universal_argument_default_is_two() {
        let mut ed = editor();
        let mut term = ScriptedTerm::new([UNIVERSAL_KEY, KeyCode::plain(b'y')]);
        drain(&mut ed, &mut term);
        assert_eq!(buffer_text(&ed), "yy");
    }

    #[test]
    fn bound_command_executes() {
        let mut ed = editor();
        let mut keys_in = keys("abc");
        keys_in.push(KeyCode::ctrl(b'B'));
        keys_in.push(KeyCode::plain(b'X'));
        let mut term = ScriptedTerm::new(keys_in);
        drain(&mut ed, &mut term);
        assert_eq!(buffer_text(&ed), "abXc");
    }

    #[test]
    fn prefix_sequences_resolve() {
        let mut ed = editor();
        // C-x ( then a then C-x ) records a macro; C-u 3 C-x e replays.
        let mut script = vec![KeyCode::ctrl(b'X'), KeyCode::plain(b'(')];
        script.push(KeyCode::plain(b'a'));
        script.extend([KeyCode::ctrl(b'X'), KeyCode::plain(b')')]);
        script.extend([UNIVERSAL_KEY, KeyCode::plain(b'3')]);
        script.extend([KeyCode::ctrl(b'X'), KeyCode::plain(b'e')]);
        let mut term = ScriptedTerm::new(script);
        drain(&mut ed, &mut term);
        // One 'a' typed while recording plus three replayed.
        assert_eq!(buffer_text(&ed), "aaaa");
    }

    #[test]
    fn unbound_key_beeps_and_reports() {
        let mut ed = editor();
        let mut term = ScriptedTerm::new([KeyCode(CTRL | b'^' as u16)]);
        drain(&mut ed, &mut term);
        assert!(term.beeped());
        assert!(ed.session.msg.peek().is_some_and(|m| m.contains("not bound")));
    }

    #[test]
    fn abort_cancels_recording() {
        let mut ed = editor();
        let mut term = ScriptedTerm::new([
            KeyCode::ctrl(b'X'),
            KeyCode::plain(b'('),
            KeyCode::plain(b'q'),
            ABORT_KEY,
        ]);
        drain(&mut ed, &mut term);
        assert!(!ed.session.kbd.is_recording());
        assert!(ed.session.kbd.is_empty());
    }

    #[test]
    fn overwrite_mode_replaces() {
        let mut ed = editor();
        let mut term = ScriptedTerm::new(keys("abc"));
        drain(&mut ed, &mut term);
        {
            let Editor { session, .. } = &mut ed;
            let modes = std::mem::take(&mut session.modes);
            modes
                .change_buffer(
                    session.buffers.current_mut(),
                    "Over",
                    core_state::modes::ModeAction::Set,
                )
                .unwrap();
            session.modes = modes;
            session.buffers.current_mut().core.to_buffer_start();
        }
        let mut term = ScriptedTerm::new(keys("XY"));
        drain(&mut ed, &mut term);
        assert_eq!(buffer_text(&ed), "XYc");
    }

    #[test]
    fn pre_key_hook_can_swallow_keys() {
        let mut ed = editor();
        let mut term = ScriptedTerm::new([]);
        ed.run_script(&mut term, "macro guard(k)\n constrain 0, 1\n return true\nendmacro")
            .unwrap();
        ed.interp.set_hook("preKey", "guard").unwrap();
        let mut term = ScriptedTerm::new(keys("zz"));
        drain(&mut ed, &mut term);
        assert_eq!(buffer_text(&ed), "");
    }

    #[test]
    fn exit_propagates() {
        let mut ed = editor();
        // C-x q runs exit; no changed file buffers, so it goes through.
        let mut term = ScriptedTerm::new([KeyCode::ctrl(b'X'), KeyCode::plain(b'q')]);
        let st = process_cycle(&mut ed, &mut term).unwrap_err();
        assert_eq!(st.severity(), Severity::UserExit);
    }
}
