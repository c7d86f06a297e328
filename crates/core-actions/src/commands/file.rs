//! Buffer management and file commands.

use super::{listing, required_arg, RingChoice};
use crate::{io_ops, Session};
use core_exec::{Datum, Interp};
use core_input::CompKind;
use core_state::BufFlags;
use core_status::{Outcome, Status};
use core_terminal::Term;
use core_text::TextCore;
use std::path::PathBuf;

/// Switch the display reference from the old current buffer to a new one
/// and run the buffer hooks.
fn switch_to(
    session: &mut Session,
    term: &mut dyn Term,
    interp: &mut Interp,
    index: usize,
) -> Outcome<()> {
    let old = session.buffers.current_index();
    if old == index {
        return Ok(());
    }
    let old_name = session.buffers.current().name().to_string();
    run_hook(session, term, interp, "exitBuf", vec![Datum::str(&old_name)])?;
    session.buffers.get_mut(old).release_window();
    session.buffers.select(index)?;
    session.buffers.get_mut(index).retain_window();
    let new_name = session.buffers.current().name().to_string();
    run_hook(session, term, interp, "enterBuf", vec![Datum::str(&new_name)])?;
    Ok(())
}

/// Hook plumbing available to command bodies.
pub(crate) fn run_hook(
    session: &mut Session,
    term: &mut dyn Term,
    interp: &mut Interp,
    hook: &str,
    args: Vec<Datum>,
) -> Outcome<Datum> {
    let mut host = crate::HostCtx { session, term };
    interp.run_hook(&mut host, hook, args)
}

pub fn select_buf(
    session: &mut Session,
    term: &mut dyn Term,
    interp: &mut Interp,
    _n: Option<i64>,
    args: Vec<Datum>,
) -> Outcome<Datum> {
    let name = required_arg(
        session,
        term,
        interp,
        &args,
        0,
        "Buffer",
        Some(CompKind::Buffer),
        RingChoice::None,
    )?;
    let found = session.buffers.find_or_create(&name);
    switch_to(session, term, interp, found.index)?;
    Ok(Datum::Bool(found.created))
}

pub fn next_buf(
    session: &mut Session,
    term: &mut dyn Term,
    interp: &mut Interp,
    _n: Option<i64>,
    _args: Vec<Datum>,
) -> Outcome<Datum> {
    cycle_buf(session, term, interp, true)
}

pub fn prev_buf(
    session: &mut Session,
    term: &mut dyn Term,
    interp: &mut Interp,
    _n: Option<i64>,
    _args: Vec<Datum>,
) -> Outcome<Datum> {
    cycle_buf(session, term, interp, false)
}

fn cycle_buf(
    session: &mut Session,
    term: &mut dyn Term,
    interp: &mut Interp,
    forward: bool,
) -> Outcome<Datum> {
    match session.buffers.cycle_from(session.buffers.current_index(), forward) {
        Ok(index) => {
            switch_to(session, term, interp, index)?;
            Ok(Datum::str(session.buffers.current().name()))
        }
        Err(st) if st.is_not_found() => Err(Status::failure("No other buffer")),
        Err(st) => Err(st),
    }
}

pub fn delete_buf(
    session: &mut Session,
    term: &mut dyn Term,
    interp: &mut Interp,
    _n: Option<i64>,
    args: Vec<Datum>,
) -> Outcome<Datum> {
    let name = required_arg(
        session,
        term,
        interp,
        &args,
        0,
        "Delete buffer",
        Some(CompKind::Buffer),
        RingChoice::None,
    )?;
    let Some(index) = session.buffers.find(&name) else {
        return Err(Status::failure(format!("No such buffer \"{name}\"")));
    };
    session.buffers.delete(index)?;
    session.notify(format!("Buffer \"{name}\" deleted"));
    Ok(Datum::Bool(true))
}

pub fn rename_buf(
    session: &mut Session,
    term: &mut dyn Term,
    interp: &mut Interp,
    _n: Option<i64>,
    args: Vec<Datum>,
) -> Outcome<Datum> {
    let name =
        required_arg(session, term, interp, &args, 0, "New name", None, RingChoice::None)?;
    let index = session.buffers.current_index();
    session.buffers.rename(index, &name)?;
    Ok(Datum::str(name))
}

pub fn scratch_buf(
    session: &mut Session,
    term: &mut dyn Term,
    interp: &mut Interp,
    _n: Option<i64>,
    _args: Vec<Datum>,
) -> Outcome<Datum> {
    let index = session.buffers.scratch();
    switch_to(session, term, interp, index)?;
    Ok(Datum::str(session.buffers.current().name()))
}

pub fn show_buffers(
    session: &mut Session,
    _term: &mut dyn Term,
    _interp: &mut Interp,
    _n: Option<i64>,
    _args: Vec<Datum>,
) -> Outcome<Datum> {
    let mut text = String::from("AHC    Size      Buffer          File\n");
    for buffer in session.buffers.iter() {
        if buffer.flags().contains(BufFlags::HIDDEN) {
            continue;
        }
        let flags = format!(
            "{}{}{}",
            if buffer.is_executing() { 'A' } else { ' ' },
            if buffer.flags().contains(BufFlags::HIDDEN) { 'H' } else { ' ' },
            if buffer.is_changed() { '*' } else { ' ' },
        );
        let file = buffer
            .filename()
            .map(|p| p.display().to_string())
            .unwrap_or_default();
        text.push_str(&format!(
            "{flags} {:9} {:15} {file}\n",
            buffer.core.length(),
            buffer.name()
        ));
    }
    Ok(listing(session, "(buffers)", text))
}

fn buffer_name_for(path: &std::path::Path) -> String {
    path.file_name().map_or_else(
        || path.display().to_string(),
        |name| name.to_string_lossy().into_owned(),
    )
}

/// Load a file into a buffer, replacing its contents.
pub(crate) fn load_into(
    session: &mut Session,
    term: &mut dyn Term,
    interp: &mut Interp,
    index: usize,
    path: PathBuf,
) -> Outcome<()> {
    let contents = io_ops::read_file(&path)?;
    let buffer = session.buffers.get_mut(index);
    let line_count = contents.lines.len();
    buffer.core = TextCore::from_lines(contents.lines);
    buffer.set_file_delim(contents.delim, contents.final_delim);
    buffer.set_filename(Some(path.clone()));
    buffer.core.set_changed(false);
    session.notify(format!("Read {line_count} lines"));
    run_hook(session, term, interp, "read", vec![Datum::str(path.display().to_string())])?;
    Ok(())
}

/// Read a file into the current buffer, replacing its contents.
pub fn read_file(
    session: &mut Session,
    term: &mut dyn Term,
    interp: &mut Interp,
    _n: Option<i64>,
    args: Vec<Datum>,
) -> Outcome<Datum> {
    let path = required_arg(
        session,
        term,
        interp,
        &args,
        0,
        "Read file",
        Some(CompKind::Filename),
        RingChoice::None,
    )?;
    session.buffers.current().check_editable()?;
    let index = session.buffers.current_index();
    load_into(session, term, interp, index, PathBuf::from(path))?;
    Ok(Datum::Bool(true))
}

/// Switch to (creating if needed) a buffer visiting the given file.
pub fn find_file(
    session: &mut Session,
    term: &mut dyn Term,
    interp: &mut Interp,
    _n: Option<i64>,
    args: Vec<Datum>,
) -> Outcome<Datum> {
    let path = PathBuf::from(required_arg(
        session,
        term,
        interp,
        &args,
        0,
        "Find file",
        Some(CompKind::Filename),
        RingChoice::None,
    )?);
    // Re-use a buffer already visiting this file.
    let existing = session
        .buffers
        .iter()
        .position(|b| b.filename().is_some_and(|f| *f == path));
    if let Some(index) = existing {
        switch_to(session, term, interp, index)?;
        return Ok(Datum::Bool(false));
    }
    let mut name = buffer_name_for(&path);
    while session.buffers.find(&name).is_some() {
        name.push('+');
    }
    let index = session.buffers.find_or_create(&name).index;
    if path.exists() {
        load_into(session, term, interp, index, path)?;
    } else {
        session.buffers.get_mut(index).set_filename(Some(path));
        session.notify("(New file)");
    }
    switch_to(session, term, interp, index)?;
    Ok(Datum::Bool(true))
}

/// Insert a file's contents at the point.
pub fn insert_file(
    session: &mut Session,
    term: &mut dyn Term,
    interp: &mut Interp,
    _n: Option<i64>,
    args: Vec<Datum>,
) -> Outcome<Datum> {
    let path = required_arg(
        session,
        term,
        interp,
        &args,
        0,
        "Insert file",
        Some(CompKind::Filename),
        RingChoice::None,
    )?;
    session.buffers.current().check_editable()?;
    let contents = io_ops::read_file(std::path::Path::new(&path))?;
    let mut bytes = Vec::new();
    for (i, line) in contents.lines.iter().enumerate() {
        if i > 0 {
            bytes.push(b'\n');
        }
        bytes.extend_from_slice(line);
    }
    if contents.final_delim {
        bytes.push(b'\n');
    }
    session.buffers.current_mut().core.insert_str(&bytes)?;
    Ok(Datum::Bool(true))
}

/// Write the current buffer to its file. Honors the global `Safe` and
/// `Bak` modes.
pub fn save_file(
    session: &mut Session,
    term: &mut dyn Term,
    interp: &mut Interp,
    _n: Option<i64>,
    _args: Vec<Datum>,
) -> Outcome<Datum> {
    save_buffer(session, term, interp, session.buffers.current_index())?;
    Ok(Datum::Bool(true))
}

pub(crate) fn save_buffer(
    session: &mut Session,
    term: &mut dyn Term,
    interp: &mut Interp,
    index: usize,
) -> Outcome<()> {
    let Some(path) = session.buffers.get(index).filename().cloned() else {
        return Err(Status::failure("No file name for buffer"));
    };
    run_hook(session, term, interp, "write", vec![Datum::str(path.display().to_string())])?;
    let buffer = session.buffers.get(index);
    let bytes = buffer.core.to_bytes(buffer.write_delim(), buffer.final_delim());
    if session.modes.is_global_enabled("Bak") {
        io_ops::backup_write(&path, &bytes, &session.config.backup_ext)?;
    } else if session.modes.is_global_enabled("Safe") {
        io_ops::safe_write(&path, &bytes)?;
    } else {
        io_ops::write_file(&path, &bytes, io_ops::WriteMode::Create)?;
    }
    let buffer = session.buffers.get_mut(index);
    buffer.core.set_changed(false);
    buffer.set_flag(BufFlags::QSAVE, true);
    session.notify(format!("Wrote {}", path.display()));
    Ok(())
}

/// Write the current buffer to a new file name.
pub fn write_file(
    session: &mut Session,
    term: &mut dyn Term,
    interp: &mut Interp,
    _n: Option<i64>,
    args: Vec<Datum>,
) -> Outcome<Datum> {
    let path = required_arg(
        session,
        term,
        interp,
        &args,
        0,
        "Write file",
        Some(CompKind::Filename),
        RingChoice::None,
    )?;
    session.buffers.current_mut().set_filename(Some(PathBuf::from(path)));
    save_file(session, term, interp, None, Vec::new())
}

/// Append the current buffer to a file.
pub fn append_file(
    session: &mut Session,
    term: &mut dyn Term,
    interp: &mut Interp,
    _n: Option<i64>,
    args: Vec<Datum>,
) -> Outcome<Datum> {
    let path = required_arg(
        session,
        term,
        interp,
        &args,
        0,
        "Append to file",
        Some(CompKind::Filename),
        RingChoice::None,
    )?;
    let buffer = session.buffers.current();
    let bytes = buffer.core.to_bytes(buffer.write_delim(), buffer.final_delim());
    io_ops::write_file(std::path::Path::new(&path), &bytes, io_ops::WriteMode::Append)?;
    Ok(Datum::Bool(true))
}

/// Insert a shell command's output at the point.
pub fn read_pipe(
    session: &mut Session,
    term: &mut dyn Term,
    interp: &mut Interp,
    _n: Option<i64>,
    args: Vec<Datum>,
) -> Outcome<Datum> {
    let command =
        required_arg(session, term, interp, &args, 0, "Command", None, RingChoice::None)?;
    session.buffers.current().check_editable()?;
    let output = io_ops::pipe(&command, None)?;
    session.buffers.current_mut().core.insert_str(&output)?;
    Ok(Datum::Bool(true))
}

/// Filter the whole buffer through a shell command.
pub fn pipe_buf(
    session: &mut Session,
    term: &mut dyn Term,
    interp: &mut Interp,
    _n: Option<i64>,
    args: Vec<Datum>,
) -> Outcome<Datum> {
    let command =
        required_arg(session, term, interp, &args, 0, "Filter command", None, RingChoice::None)?;
    session.buffers.current().check_editable()?;
    let buffer = session.buffers.current();
    let input = buffer.core.to_bytes(b"\n", buffer.final_delim());
    let output = io_ops::pipe(&command, Some(&input))?;
    let buffer = session.buffers.current_mut();
    buffer.core = TextCore::from_bytes(&output);
    buffer.core.set_changed(true);
    Ok(Datum::Bool(true))
}

/// Change the working directory and run the `chDir` hook.
pub fn chg_dir(
    session: &mut Session,
    term: &mut dyn Term,
    interp: &mut Interp,
    _n: Option<i64>,
    args: Vec<Datum>,
) -> Outcome<Datum> {
    let dir = required_arg(
        session,
        term,
        interp,
        &args,
        0,
        "Change directory",
        Some(CompKind::Filename),
        RingChoice::None,
    )?;
    std::env::set_current_dir(&dir)
        .map_err(|err| Status::os_error(format!("{dir}: {err}")))?;
    run_hook(session, term, interp, "chDir", vec![Datum::str(&dir)])?;
    Ok(Datum::str(dir))
}

/// Leave the editor. With changed buffers the exit is refused unless
/// forced with a numeric prefix. A script calling `exit` with a message
/// terminates the session with script-exit status.
pub fn exit_editor(
    session: &mut Session,
    _term: &mut dyn Term,
    _interp: &mut Interp,
    n: Option<i64>,
    args: Vec<Datum>,
) -> Outcome<Datum> {
    if let Some(message) = args.first() {
        return Err(Status::script_exit(
            String::from_utf8_lossy(&message.to_text()).into_owned(),
        ));
    }
    let forced = n.is_some();
    let changed = session
        .buffers
        .iter()
        .filter(|b| b.is_changed() && b.filename().is_some())
        .count();
    if changed > 0 && !forced {
        return Err(Status::failure(format!(
            "{changed} buffer(s) have unsaved changes; use a numeric prefix to exit anyway"
        )));
    }
    Err(Status::user_exit())
}

/// Save every changed file-bound buffer, then exit.
pub fn quick_exit(
    session: &mut Session,
    term: &mut dyn Term,
    interp: &mut Interp,
    _n: Option<i64>,
    _args: Vec<Datum>,
) -> Outcome<Datum> {
    save_all(session, term, interp)?;
    Err(Status::user_exit())
}

/// Save every changed buffer that has a file binding.
pub(crate) fn save_all(
    session: &mut Session,
    term: &mut dyn Term,
    interp: &mut Interp,
) -> Outcome<usize> {
    let targets: Vec<usize> = (0..session.buffers.len())
        .filter(|&i| {
            let b = session.buffers.get(i);
            b.is_changed() && b.filename().is_some()
        })
        .collect();
    for &index in &targets {
        save_buffer(session, term, interp, index)?;
    }
    Ok(targets.len())
}

/// Save all changed buffers (the auto-save action and the `saveAll`
/// command).
pub fn save_all_cmd(
    session: &mut Session,
    term: &mut dyn Term,
    interp: &mut Interp,
    _n: Option<i64>,
    _args: Vec<Datum>,
) -> Outcome<Datum> {
    let saved = save_all(session, term, interp)?;
    session.notify(format!("{saved} buffer(s) saved"));
    Ok(Datum::Int(saved as i64))
}

/// The `-e` style expression runner and the startup `@file` runner share
/// this: execute a script file with positional arguments.
pub fn xeq_file(
    session: &mut Session,
    term: &mut dyn Term,
    interp: &mut Interp,
    n: Option<i64>,
    args: Vec<Datum>,
) -> Outcome<Datum> {
    let path = required_arg(
        session,
        term,
        interp,
        &args,
        0,
        "Execute file",
        Some(CompKind::Filename),
        RingChoice::None,
    )?;
    let src = std::fs::read_to_string(&path)
        .map_err(|err| Status::os_error(format!("{path}: {err}")))?;
    let script_args: Vec<Datum> = args.into_iter().skip(1).collect();
    let mut host = crate::HostCtx { session, term };
    interp.run_script_with_args(&mut host, &src, n, script_args)
}
