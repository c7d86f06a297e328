//! Text mutation commands: insertion, deletion, kill/yank, case changes.

use super::{check_edit, delete_capture, kill_capture, n_or, repeat_count};
use crate::{CmdFlags, Session};
use core_exec::{Datum, Interp};
use core_status::{Outcome, Status};
use core_terminal::Term;
use core_text::{Point, RMARK};

pub fn insert(
    session: &mut Session,
    _term: &mut dyn Term,
    _interp: &mut Interp,
    n: Option<i64>,
    args: Vec<Datum>,
) -> Outcome<Datum> {
    check_edit(session)?;
    let reps = repeat_count(n)?;
    let core = &mut session.buffers.current_mut().core;
    for _ in 0..reps {
        for arg in &args {
            core.insert_str(&arg.to_text())?;
        }
    }
    Ok(Datum::Bool(true))
}

pub fn newline(
    session: &mut Session,
    _term: &mut dyn Term,
    _interp: &mut Interp,
    n: Option<i64>,
    _args: Vec<Datum>,
) -> Outcome<Datum> {
    check_edit(session)?;
    let reps = repeat_count(n)?;
    let core = &mut session.buffers.current_mut().core;
    for _ in 0..reps {
        core.insert_newline()?;
    }
    Ok(Datum::Bool(true))
}

pub fn tab(
    session: &mut Session,
    _term: &mut dyn Term,
    _interp: &mut Interp,
    n: Option<i64>,
    _args: Vec<Datum>,
) -> Outcome<Datum> {
    check_edit(session)?;
    let reps = repeat_count(n)?;
    session.buffers.current_mut().core.insert_char(reps as usize, b'\t')?;
    Ok(Datum::Bool(true))
}

/// Open `n` blank lines at the point; the point stays put.
pub fn open_line(
    session: &mut Session,
    _term: &mut dyn Term,
    _interp: &mut Interp,
    n: Option<i64>,
    _args: Vec<Datum>,
) -> Outcome<Datum> {
    check_edit(session)?;
    let reps = repeat_count(n)?;
    let core = &mut session.buffers.current_mut().core;
    for _ in 0..reps {
        core.insert_newline()?;
    }
    core.point_move(-(reps as i64))?;
    Ok(Datum::Bool(true))
}

pub fn delete_forw_char(
    session: &mut Session,
    _term: &mut dyn Term,
    _interp: &mut Interp,
    n: Option<i64>,
    _args: Vec<Datum>,
) -> Outcome<Datum> {
    check_edit(session)?;
    let n = n_or(n, 1);
    let out = session.buffers.current_mut().core.delete(n, false)?;
    Ok(Datum::Bool(out.complete))
}

pub fn delete_back_char(
    session: &mut Session,
    _term: &mut dyn Term,
    _interp: &mut Interp,
    n: Option<i64>,
    _args: Vec<Datum>,
) -> Outcome<Datum> {
    check_edit(session)?;
    let n = n_or(n, 1);
    let out = session.buffers.current_mut().core.delete(-n, false)?;
    Ok(Datum::Bool(out.complete))
}

/// Characters from the point to the start of the `n`th next word. A word
/// motion that hits the buffer edge still yields the partial span.
fn word_span(session: &mut Session, n: i64) -> Outcome<i64> {
    let words = session.words.clone();
    let core = &mut session.buffers.current_mut().core;
    let origin = core.point();
    let count = n.unsigned_abs();
    let motion = if n >= 0 {
        core.forw_word(count, &words)
    } else {
        core.back_word(count, &words)
    };
    if let Err(st) = motion {
        debug_assert!(st.is_not_found());
    }
    let end = core.point();
    let span = core.point_offset(end) as i64 - core.point_offset(origin) as i64;
    core.set_point(origin);
    Ok(span)
}

pub fn delete_word(
    session: &mut Session,
    _term: &mut dyn Term,
    _interp: &mut Interp,
    n: Option<i64>,
    _args: Vec<Datum>,
) -> Outcome<Datum> {
    check_edit(session)?;
    let span = word_span(session, n_or(n, 1))?;
    let out = session.buffers.current_mut().core.delete(span, true)?;
    if let Some(text) = out.text {
        if !text.is_empty() {
            delete_capture(session, text);
        }
    }
    Ok(Datum::Bool(true))
}

pub fn delete_back_word(
    session: &mut Session,
    _term: &mut dyn Term,
    _interp: &mut Interp,
    n: Option<i64>,
    _args: Vec<Datum>,
) -> Outcome<Datum> {
    check_edit(session)?;
    let span = word_span(session, -n_or(n, 1))?;
    let out = session.buffers.current_mut().core.delete(span, true)?;
    if let Some(text) = out.text {
        if !text.is_empty() {
            delete_capture(session, text);
        }
    }
    Ok(Datum::Bool(true))
}

/// Kill to end of line; with a count, kill whole lines. An empty remainder
/// kills the newline instead, so repeated `killLine` eats lines cleanly.
pub fn kill_line(
    session: &mut Session,
    _term: &mut dyn Term,
    _interp: &mut Interp,
    n: Option<i64>,
    _args: Vec<Datum>,
) -> Outcome<Datum> {
    check_edit(session)?;
    let span = match n {
        None => {
            let core = &session.buffers.current().core;
            let pt = core.point();
            let rest = core.line_used(pt.line) - pt.offset;
            if rest == 0 { 1 } else { rest as i64 }
        }
        Some(lines) => {
            let core = &mut session.buffers.current_mut().core;
            core.to_line_start();
            let region = core.region_lines(lines.max(1));
            region.size
        }
    };
    let out = session.buffers.current_mut().core.delete(span, true)?;
    if let Some(text) = out.text {
        kill_capture(session, &text, true);
    }
    Ok(Datum::Bool(true))
}

fn region_to_mark(session: &Session) -> Outcome<(core_text::Region, bool)> {
    let core = &session.buffers.current().core;
    let Some(mark) = core.find_mark(RMARK) else {
        return Err(Status::failure("No mark set in this buffer"));
    };
    let point = core.point();
    let region = core.region_between(point, mark.point);
    // Forward when the point is the region start.
    Ok((region, region.start == point))
}

pub fn kill_region(
    session: &mut Session,
    _term: &mut dyn Term,
    _interp: &mut Interp,
    _n: Option<i64>,
    _args: Vec<Datum>,
) -> Outcome<Datum> {
    check_edit(session)?;
    let (region, forward) = region_to_mark(session)?;
    let core = &mut session.buffers.current_mut().core;
    core.set_point(region.start);
    let out = core.delete(region.size, true)?;
    if let Some(text) = out.text {
        kill_capture(session, &text, forward);
    }
    Ok(Datum::Bool(true))
}

pub fn copy_region(
    session: &mut Session,
    _term: &mut dyn Term,
    _interp: &mut Interp,
    _n: Option<i64>,
    _args: Vec<Datum>,
) -> Outcome<Datum> {
    let (region, forward) = region_to_mark(session)?;
    let text = session.buffers.current().core.extract_region(&region);
    kill_capture(session, &text, forward);
    Ok(Datum::Bool(true))
}

pub fn delete_region(
    session: &mut Session,
    _term: &mut dyn Term,
    _interp: &mut Interp,
    _n: Option<i64>,
    _args: Vec<Datum>,
) -> Outcome<Datum> {
    check_edit(session)?;
    let (region, _) = region_to_mark(session)?;
    let core = &mut session.buffers.current_mut().core;
    core.set_point(region.start);
    let out = core.delete(region.size, true)?;
    if let Some(text) = out.text {
        delete_capture(session, text);
    }
    Ok(Datum::Bool(true))
}

/// Delete `n` whole lines into the delete ring.
pub fn delete_line(
    session: &mut Session,
    _term: &mut dyn Term,
    _interp: &mut Interp,
    n: Option<i64>,
    _args: Vec<Datum>,
) -> Outcome<Datum> {
    check_edit(session)?;
    let lines = n_or(n, 1);
    let core = &mut session.buffers.current_mut().core;
    core.to_line_start();
    let region = core.region_lines(lines);
    core.set_point(region.start);
    let out = core.delete(region.size, true)?;
    if let Some(text) = out.text {
        delete_capture(session, text);
    }
    Ok(Datum::Bool(true))
}

pub fn dup_line(
    session: &mut Session,
    _term: &mut dyn Term,
    _interp: &mut Interp,
    n: Option<i64>,
    _args: Vec<Datum>,
) -> Outcome<Datum> {
    check_edit(session)?;
    let reps = repeat_count(n)?;
    let core = &mut session.buffers.current_mut().core;
    let pt = core.point();
    let mut line = core.line_text(pt.line).to_vec();
    line.push(b'\n');
    core.to_line_start();
    for _ in 0..reps {
        core.insert_str(&line)?;
    }
    core.set_point(pt);
    Ok(Datum::Bool(true))
}

/// Collapse any run of blank lines around the point.
pub fn delete_blank_lines(
    session: &mut Session,
    _term: &mut dyn Term,
    _interp: &mut Interp,
    _n: Option<i64>,
    _args: Vec<Datum>,
) -> Outcome<Datum> {
    check_edit(session)?;
    let core = &mut session.buffers.current_mut().core;
    let mut first = core.point().line;
    if core.line_used(first) != 0 {
        return Ok(Datum::Bool(false));
    }
    while let Some(prev) = core.prev_line(first) {
        if core.line_used(prev) != 0 {
            break;
        }
        first = prev;
    }
    let mut count = 1i64;
    let mut cursor = first;
    while let Some(next) = core.next_line(cursor) {
        if core.line_used(next) != 0 {
            break;
        }
        count += 1;
        cursor = next;
    }
    core.set_point(Point::new(first, 0));
    let out = core.delete(count, true)?;
    if let Some(text) = out.text {
        delete_capture(session, text);
    }
    Ok(Datum::Bool(true))
}

pub fn yank(
    session: &mut Session,
    _term: &mut dyn Term,
    _interp: &mut Interp,
    n: Option<i64>,
    _args: Vec<Datum>,
) -> Outcome<Datum> {
    check_edit(session)?;
    let reps = repeat_count(n)?;
    let Some(text) = session.rings.kill.current().map(<[u8]>::to_vec) else {
        return Err(Status::failure("Kill ring is empty"));
    };
    let core = &mut session.buffers.current_mut().core;
    let start = core.point();
    let mut inserted = 0u64;
    for _ in 0..reps {
        core.insert_str(&text)?;
        inserted += count_chars(&text);
    }
    session.last_yank = Some((start, inserted));
    session.this_flags.insert(CmdFlags::YANK);
    Ok(Datum::Bool(true))
}

/// Replace the last yank with the next older kill ring entry. Only valid
/// immediately after a yank.
pub fn yank_pop(
    session: &mut Session,
    _term: &mut dyn Term,
    _interp: &mut Interp,
    _n: Option<i64>,
    _args: Vec<Datum>,
) -> Outcome<Datum> {
    check_edit(session)?;
    if !session.last_flags.contains(CmdFlags::YANK) {
        return Err(Status::failure("Previous command was not a yank"));
    }
    let Some((_, len)) = session.last_yank else {
        return Err(Status::failure("Previous command was not a yank"));
    };
    session.rings.kill.cycle(1);
    let text = session.rings.kill.current().map(<[u8]>::to_vec).unwrap_or_default();
    let core = &mut session.buffers.current_mut().core;
    core.delete(-(len as i64), false)?;
    let start = core.point();
    core.insert_str(&text)?;
    session.last_yank = Some((start, count_chars(&text)));
    session.this_flags.insert(CmdFlags::YANK);
    Ok(Datum::Bool(true))
}

/// Insert the current delete ring entry.
pub fn undelete(
    session: &mut Session,
    _term: &mut dyn Term,
    _interp: &mut Interp,
    _n: Option<i64>,
    _args: Vec<Datum>,
) -> Outcome<Datum> {
    check_edit(session)?;
    let Some(text) = session.rings.delete.current().map(<[u8]>::to_vec) else {
        return Err(Status::failure("Delete ring is empty"));
    };
    session.buffers.current_mut().core.insert_str(&text)?;
    Ok(Datum::Bool(true))
}

pub fn cycle_kill_ring(
    session: &mut Session,
    _term: &mut dyn Term,
    _interp: &mut Interp,
    n: Option<i64>,
    _args: Vec<Datum>,
) -> Outcome<Datum> {
    session.rings.kill.cycle(n_or(n, 1));
    Ok(Datum::Bool(true))
}

pub fn cycle_delete_ring(
    session: &mut Session,
    _term: &mut dyn Term,
    _interp: &mut Interp,
    n: Option<i64>,
    _args: Vec<Datum>,
) -> Outcome<Datum> {
    session.rings.delete.cycle(n_or(n, 1));
    Ok(Datum::Bool(true))
}

fn count_chars(text: &[u8]) -> u64 {
    text.len() as u64
}

// ---------------------------------------------------------------------
// Case conversion
// ---------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CaseMode {
    Upper,
    Lower,
    Title,
}

fn case_bytes(text: &mut [u8], mode: CaseMode, words: &core_text::motion::WordChars) {
    let mut in_word = false;
    for c in text.iter_mut() {
        let is_word = words.is_word(*c);
        *c = match mode {
            CaseMode::Upper => c.to_ascii_uppercase(),
            CaseMode::Lower => c.to_ascii_lowercase(),
            CaseMode::Title => {
                if is_word && !in_word {
                    c.to_ascii_uppercase()
                } else {
                    c.to_ascii_lowercase()
                }
            }
        };
        in_word = is_word;
    }
}

fn case_word(session: &mut Session, n: Option<i64>, mode: CaseMode) -> Outcome<Datum> {
    check_edit(session)?;
    let span = word_span(session, n_or(n, 1))?;
    if span <= 0 {
        return Ok(Datum::Bool(false));
    }
    let words = session.words.clone();
    let core = &mut session.buffers.current_mut().core;
    let origin = core.point();
    let out = core.delete(span, true)?;
    let mut text = out.text.unwrap_or_default();
    case_bytes(&mut text, mode, &words);
    core.insert_str(&text)?;
    // The point ends after the converted words, like the word motion.
    let _ = origin;
    Ok(Datum::Bool(true))
}

fn case_region(session: &mut Session, mode: CaseMode) -> Outcome<Datum> {
    check_edit(session)?;
    let (region, _) = region_to_mark(session)?;
    let words = session.words.clone();
    let core = &mut session.buffers.current_mut().core;
    let point_before = core.point();
    core.set_point(region.start);
    let out = core.delete(region.size, true)?;
    let mut text = out.text.unwrap_or_default();
    case_bytes(&mut text, mode, &words);
    core.insert_str(&text)?;
    core.set_point(point_before);
    Ok(Datum::Bool(true))
}

pub fn upper_case_word(
    session: &mut Session,
    _term: &mut dyn Term,
    _interp: &mut Interp,
    n: Option<i64>,
    _args: Vec<Datum>,
) -> Outcome<Datum> {
    case_word(session, n, CaseMode::Upper)
}

pub fn lower_case_word(
    session: &mut Session,
    _term: &mut dyn Term,
    _interp: &mut Interp,
    n: Option<i64>,
    _args: Vec<Datum>,
) -> Outcome<Datum> {
    case_word(session, n, CaseMode::Lower)
}

pub fn title_case_word(
    session: &mut Session,
    _term: &mut dyn Term,
    _interp: &mut Interp,
    n: Option<i64>,
    _args: Vec<Datum>,
) -> Outcome<Datum> {
    case_word(session, n, CaseMode::Title)
}

pub fn upper_case_region(
    session: &mut Session,
    _term: &mut dyn Term,
    _interp: &mut Interp,
    _n: Option<i64>,
    _args: Vec<Datum>,
) -> Outcome<Datum> {
    case_region(session, CaseMode::Upper)
}

pub fn lower_case_region(
    session: &mut Session,
    _term: &mut dyn Term,
    _interp: &mut Interp,
    _n: Option<i64>,
    _args: Vec<Datum>,
) -> Outcome<Datum> {
    case_region(session, CaseMode::Lower)
}

/// Insert the next key's raw character, bypassing its binding.
pub fn quote_char(
    session: &mut Session,
    term: &mut dyn Term,
    _interp: &mut Interp,
    n: Option<i64>,
    _args: Vec<Datum>,
) -> Outcome<Datum> {
    check_edit(session)?;
    let reps = repeat_count(n)?;
    let key = crate::dispatcher::read_key_raw(session, term)?;
    let raw = if key.has(core_keymap::CTRL) { key.char7() ^ 0x40 } else { key.char7() };
    session.buffers.current_mut().core.insert_char(reps as usize, raw)?;
    Ok(Datum::Bool(true))
}

/// Insert the formatted `seti` counter and step it.
pub fn insert_i(
    session: &mut Session,
    _term: &mut dyn Term,
    _interp: &mut Interp,
    n: Option<i64>,
    _args: Vec<Datum>,
) -> Outcome<Datum> {
    check_edit(session)?;
    let reps = repeat_count(n)?;
    for _ in 0..reps {
        let text = format_counter(&session.seti.format, session.seti.value)?;
        session.buffers.current_mut().core.insert_str(text.as_bytes())?;
        session.seti.value += session.seti.step;
    }
    Ok(Datum::Bool(true))
}

/// Minimal printf for the seti format: %d, %x, %o, %s, %%.
pub(crate) fn format_counter(format: &str, value: i64) -> Outcome<String> {
    let mut out = String::new();
    let mut chars = format.chars();
    while let Some(c) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('d') => out.push_str(&value.to_string()),
            Some('x') => out.push_str(&format!("{value:x}")),
            Some('o') => out.push_str(&format!("{value:o}")),
            Some('s') => out.push_str(&value.to_string()),
            Some('%') => out.push('%'),
            other => {
                return Err(Status::failure(format!(
                    "Invalid conversion '%{}' in seti format",
                    other.map_or(String::new(), |c| c.to_string())
                )))
            }
        }
    }
    Ok(out)
}
