//! Modes, key bindings, keyboard macros, and script-facing commands.

use super::{arg_or_prompt, arg_text, listing, n_or, required_arg, RingChoice};
use crate::commands::file::run_hook;
use crate::Session;
use core_exec::{Datum, Interp, HOOK_NAMES};
use core_input::CompKind;
use core_keymap::{format_key, parse_key_lit, KeyTarget, PrefixKind};
use core_state::modes::ModeAction;
use core_state::ModeScope;
use core_status::{Outcome, Status};
use core_terminal::Term;

// ---------------------------------------------------------------------
// Modes
// ---------------------------------------------------------------------

/// Change a mode: toggle by default, set with a positive prefix, clear
/// with a negative one; `n > 1` clears every mode of the scope first.
/// Runs the `mode` hook with the buffer name (or nil) and the prior modes.
pub fn chg_mode(
    session: &mut Session,
    term: &mut dyn Term,
    interp: &mut Interp,
    n: Option<i64>,
    args: Vec<Datum>,
) -> Outcome<Datum> {
    let name = required_arg(
        session,
        term,
        interp,
        &args,
        0,
        "Change mode",
        Some(CompKind::Mode),
        RingChoice::None,
    )?;
    let Some(info) = session.modes.find(&name) else {
        return Err(Status::failure(format!("No such mode \"{name}\"")));
    };
    let scope = info.scope;
    let action = match n {
        None | Some(0) => ModeAction::Toggle,
        Some(k) if k < 0 => ModeAction::Clear,
        Some(_) => ModeAction::Set,
    };
    let clear_first = matches!(n, Some(k) if k > 1);

    let (before, buf_name) = match scope {
        ModeScope::Global => {
            let before: Vec<Datum> = session
                .modes
                .iter()
                .filter(|m| m.global_enabled)
                .map(|m| Datum::str(&m.name))
                .collect();
            if clear_first {
                session.modes.clear_global();
            }
            let changed = session.modes.change_global(&name, action)?;
            if !changed && !clear_first {
                return Ok(Datum::Bool(false));
            }
            (before, Datum::Nil)
        }
        ModeScope::Buffer => {
            let buffer = session.buffers.current();
            let before: Vec<Datum> =
                buffer.buffer_modes().iter().map(Datum::str).collect();
            let buf_name = Datum::str(buffer.name());
            let modes = std::mem::take(&mut session.modes);
            let result = {
                let buffer = session.buffers.current_mut();
                if clear_first {
                    modes.clear_buffer(buffer);
                }
                modes.change_buffer(buffer, &name, action)
            };
            session.modes = modes;
            let changed = result?;
            if !changed && !clear_first {
                return Ok(Datum::Bool(false));
            }
            (before, buf_name)
        }
    };
    run_hook(session, term, interp, "mode", vec![buf_name, Datum::array(before)])?;
    Ok(Datum::Bool(true))
}

pub fn show_modes(
    session: &mut Session,
    _term: &mut dyn Term,
    _interp: &mut Interp,
    _n: Option<i64>,
    _args: Vec<Datum>,
) -> Outcome<Datum> {
    let mut text = String::from("Mode       Scope   Group      State\n");
    let current = session.buffers.current();
    for mode in session.modes.iter() {
        let (scope, state) = match mode.scope {
            ModeScope::Global => ("global", mode.global_enabled),
            ModeScope::Buffer => ("buffer", current.has_mode(&mode.name)),
        };
        text.push_str(&format!(
            "{:10} {:7} {:10} {}\n",
            mode.name,
            scope,
            mode.group.as_deref().unwrap_or("-"),
            if state { "on" } else { "off" },
        ));
    }
    Ok(listing(session, "(modes)", text))
}

// ---------------------------------------------------------------------
// Key bindings
// ---------------------------------------------------------------------

fn target_for(interp: &Interp, name: &str) -> Outcome<KeyTarget> {
    match name {
        "metaPrefix" => return Ok(KeyTarget::Prefix(PrefixKind::Meta)),
        "prefix1" => return Ok(KeyTarget::Prefix(PrefixKind::Pref1)),
        "prefix2" => return Ok(KeyTarget::Prefix(PrefixKind::Pref2)),
        "prefix3" => return Ok(KeyTarget::Prefix(PrefixKind::Pref3)),
        _ => {}
    }
    if interp.has_macro(name) {
        return Ok(KeyTarget::Macro(name.to_string()));
    }
    if crate::registry::lookup(name).is_some() {
        return Ok(KeyTarget::Command(name.to_string()));
    }
    Err(Status::failure(format!("No such command or macro '{name}'")))
}

pub fn bind_key(
    session: &mut Session,
    term: &mut dyn Term,
    interp: &mut Interp,
    _n: Option<i64>,
    args: Vec<Datum>,
) -> Outcome<Datum> {
    let lit = required_arg(session, term, interp, &args, 0, "Bind key", None, RingChoice::None)?;
    let name = required_arg(
        session,
        term,
        interp,
        &args,
        1,
        "to command",
        Some(CompKind::Command),
        RingChoice::None,
    )?;
    let code = parse_key_lit(&lit, &session.keymap)?;
    let target = target_for(interp, &name)?;
    session.keymap.bind(code, target)?;
    session.notify(format!("{} bound to {name}", format_key(code, &session.keymap)));
    Ok(Datum::Bool(true))
}

pub fn unbind_key(
    session: &mut Session,
    term: &mut dyn Term,
    interp: &mut Interp,
    _n: Option<i64>,
    args: Vec<Datum>,
) -> Outcome<Datum> {
    let lit =
        required_arg(session, term, interp, &args, 0, "Unbind key", None, RingChoice::None)?;
    let code = parse_key_lit(&lit, &session.keymap)?;
    match session.keymap.unbind(code) {
        Ok(_) => Ok(Datum::Bool(true)),
        Err(st) if st.is_not_found() => {
            Err(Status::failure(format!("Key {lit} is not bound")))
        }
        Err(st) => Err(st),
    }
}

pub fn show_bindings(
    session: &mut Session,
    _term: &mut dyn Term,
    _interp: &mut Interp,
    _n: Option<i64>,
    args: Vec<Datum>,
) -> Outcome<Datum> {
    let filter = arg_text(&args, 0);
    let mut rows: Vec<(String, String)> = session
        .keymap
        .iter()
        .map(|(code, target)| {
            let name = match target {
                KeyTarget::Command(name) | KeyTarget::Macro(name) => name.clone(),
                KeyTarget::Prefix(PrefixKind::Meta) => "metaPrefix".into(),
                KeyTarget::Prefix(PrefixKind::Pref1) => "prefix1".into(),
                KeyTarget::Prefix(PrefixKind::Pref2) => "prefix2".into(),
                KeyTarget::Prefix(PrefixKind::Pref3) => "prefix3".into(),
            };
            (format_key(code, &session.keymap), name)
        })
        .filter(|(_, name)| filter.as_deref().is_none_or(|f| name.contains(f)))
        .collect();
    rows.sort_by(|a, b| a.1.cmp(&b.1));
    let mut text = String::from("Key            Command\n");
    for (key, name) in rows {
        text.push_str(&format!("{key:14} {name}\n"));
    }
    Ok(listing(session, "(bindings)", text))
}

// ---------------------------------------------------------------------
// Keyboard macros
// ---------------------------------------------------------------------

pub fn begin_key_macro(
    session: &mut Session,
    _term: &mut dyn Term,
    _interp: &mut Interp,
    _n: Option<i64>,
    _args: Vec<Datum>,
) -> Outcome<Datum> {
    session.kbd.begin_record()?;
    session.notify("Begin macro");
    Ok(Datum::Bool(true))
}

pub fn end_key_macro(
    session: &mut Session,
    _term: &mut dyn Term,
    _interp: &mut Interp,
    _n: Option<i64>,
    _args: Vec<Datum>,
) -> Outcome<Datum> {
    // Drop the two keys of the invoking sequence from the recording.
    session.kbd.end_record(2)?;
    session.notify("End macro");
    Ok(Datum::Bool(true))
}

pub fn xeq_key_macro(
    session: &mut Session,
    _term: &mut dyn Term,
    _interp: &mut Interp,
    n: Option<i64>,
    _args: Vec<Datum>,
) -> Outcome<Datum> {
    session.kbd.begin_play(n_or(n, 1))?;
    Ok(Datum::Bool(true))
}

// ---------------------------------------------------------------------
// Script interface
// ---------------------------------------------------------------------

/// Prompt for a command or macro by name and run it (the `M-x` of this
/// editor).
pub fn run(
    session: &mut Session,
    term: &mut dyn Term,
    interp: &mut Interp,
    n: Option<i64>,
    args: Vec<Datum>,
) -> Outcome<Datum> {
    let name = required_arg(
        session,
        term,
        interp,
        &args,
        0,
        "Run",
        Some(CompKind::Command),
        RingChoice::None,
    )?;
    let rest: Vec<Datum> = args.into_iter().skip(1).collect();
    if interp.has_macro(&name) {
        let mut host = crate::HostCtx { session, term };
        return interp.call_macro(&mut host, &name, n, rest);
    }
    crate::registry::dispatch(session, term, interp, &name, n, rest)
}

/// Evaluate an expression string.
pub fn eval(
    session: &mut Session,
    term: &mut dyn Term,
    interp: &mut Interp,
    _n: Option<i64>,
    args: Vec<Datum>,
) -> Outcome<Datum> {
    let src =
        required_arg(session, term, interp, &args, 0, "Eval", None, RingChoice::None)?;
    let mut host = crate::HostCtx { session, term };
    interp.run_script(&mut host, &src)
}

pub fn set_hook(
    session: &mut Session,
    term: &mut dyn Term,
    interp: &mut Interp,
    _n: Option<i64>,
    args: Vec<Datum>,
) -> Outcome<Datum> {
    let hook = required_arg(session, term, interp, &args, 0, "Hook", None, RingChoice::None)?;
    let name = required_arg(
        session,
        term,
        interp,
        &args,
        1,
        "Macro",
        Some(CompKind::Command),
        RingChoice::None,
    )?;
    if !interp.has_macro(&name) {
        return Err(Status::failure(format!("No such macro '{name}'")));
    }
    interp.set_hook(&hook, &name)?;
    Ok(Datum::Bool(true))
}

pub fn show_hooks(
    session: &mut Session,
    _term: &mut dyn Term,
    interp: &mut Interp,
    _n: Option<i64>,
    _args: Vec<Datum>,
) -> Outcome<Datum> {
    let mut text = String::from("Hook      Macro\n");
    for hook in HOOK_NAMES {
        text.push_str(&format!(
            "{hook:9} {}\n",
            interp.hook_macro(hook).unwrap_or("-")
        ));
    }
    Ok(listing(session, "(hooks)", text))
}

/// Configure the insert counter: value, then optionally step and format.
pub fn seti(
    session: &mut Session,
    term: &mut dyn Term,
    interp: &mut Interp,
    n: Option<i64>,
    args: Vec<Datum>,
) -> Outcome<Datum> {
    if let Some(value) = n {
        session.seti.value = value;
    } else if let Some(text) =
        arg_or_prompt(session, term, interp, &args, 0, "Initial value", None, RingChoice::None)?
    {
        if !text.is_empty() {
            session.seti.value = text
                .trim()
                .parse()
                .map_err(|_| Status::failure(format!("Invalid number '{text}'")))?;
        }
    }
    if let Some(step) = arg_text(&args, 1) {
        session.seti.step = step
            .trim()
            .parse()
            .map_err(|_| Status::failure(format!("Invalid number '{step}'")))?;
    }
    if let Some(format) = arg_text(&args, 2) {
        super::edit::format_counter(&format, 0)?;
        session.seti.format = format;
    }
    Ok(Datum::Bool(true))
}

pub fn show_commands(
    session: &mut Session,
    _term: &mut dyn Term,
    interp: &mut Interp,
    _n: Option<i64>,
    args: Vec<Datum>,
) -> Outcome<Datum> {
    let filter = arg_text(&args, 0);
    let mut text = String::from("Commands:\n");
    for name in crate::registry::command_names() {
        if filter.as_deref().is_none_or(|f| name.contains(f)) {
            text.push_str(&format!("  {name}\n"));
        }
    }
    let macros = interp.macro_names();
    if !macros.is_empty() {
        text.push_str("Macros:\n");
        for name in macros {
            if filter.as_deref().is_none_or(|f| name.contains(f)) {
                text.push_str(&format!("  {name}\n"));
            }
        }
    }
    Ok(listing(session, "(commands)", text))
}

pub fn show_variables(
    session: &mut Session,
    _term: &mut dyn Term,
    interp: &mut Interp,
    _n: Option<i64>,
    args: Vec<Datum>,
) -> Outcome<Datum> {
    let filter = arg_text(&args, 0);
    let mut text = String::from("System variables:\n");
    for (name, writable) in crate::host_impl::sysvar_names() {
        if filter.as_deref().is_none_or(|f| name.contains(f)) {
            text.push_str(&format!(
                "  ${name}{}\n",
                if *writable { "" } else { " (read-only)" }
            ));
        }
    }
    let globals = interp.global_names();
    if !globals.is_empty() {
        text.push_str("Global variables:\n");
        for name in globals {
            if filter.as_deref().is_none_or(|f| name.contains(f)) {
                let value = interp
                    .global_get(name)
                    .map(core_exec::Datum::to_show)
                    .unwrap_or_default();
                text.push_str(&format!("  ${name} = {value}\n"));
            }
        }
    }
    Ok(listing(session, "(variables)", text))
}

/// List commands and macros whose names contain the pattern.
pub fn apropos(
    session: &mut Session,
    term: &mut dyn Term,
    interp: &mut Interp,
    n: Option<i64>,
    args: Vec<Datum>,
) -> Outcome<Datum> {
    let pattern =
        required_arg(session, term, interp, &args, 0, "Apropos", None, RingChoice::None)?;
    show_commands(session, term, interp, n, vec![Datum::str(pattern)])
}

pub fn beep(
    _session: &mut Session,
    term: &mut dyn Term,
    _interp: &mut Interp,
    n: Option<i64>,
    _args: Vec<Datum>,
) -> Outcome<Datum> {
    for _ in 0..n_or(n, 1).clamp(1, 10) {
        term.beep();
    }
    Ok(Datum::Bool(true))
}

/// Post a message on the message line.
pub fn message(
    session: &mut Session,
    _term: &mut dyn Term,
    _interp: &mut Interp,
    _n: Option<i64>,
    args: Vec<Datum>,
) -> Outcome<Datum> {
    let mut text = Vec::new();
    for arg in &args {
        text.extend_from_slice(&arg.to_text());
    }
    session.notify(String::from_utf8_lossy(&text).into_owned());
    Ok(Datum::Bool(true))
}

/// Read a reply on the input line (scripts' interactive prompt).
pub fn prompt(
    session: &mut Session,
    term: &mut dyn Term,
    _interp: &mut Interp,
    _n: Option<i64>,
    args: Vec<Datum>,
) -> Outcome<Datum> {
    let text = arg_text(&args, 0).unwrap_or_else(|| "?".into());
    let mut spec = core_input::InputSpec::new(format!("{text}: "));
    spec.jump_pct = session.config.jump_pct;
    if let Some(default) = arg_text(&args, 1) {
        spec = spec.with_default(default);
    }
    match core_input::get_input(term, &spec, None, &mut core_input::NullCompleter)? {
        Some(reply) => Ok(Datum::str(reply)),
        None => Ok(Datum::Nil),
    }
}
