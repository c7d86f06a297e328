//! Motion commands.
//!
//! Boundary hits answer false rather than raising: a motion that cannot
//! complete still moves as far as it can, and scripts branch on the
//! returned boolean.

use super::{arg_or_prompt, n_or, repeat_count, set_wmark_if_moved, RingChoice};
use crate::{CmdFlags, Session};
use core_exec::{Datum, Interp};
use core_status::{Outcome, Status};
use core_terminal::Term;
use core_text::{Point, RMARK};

fn moved(result: Outcome<()>) -> Outcome<Datum> {
    match result {
        Ok(()) => Ok(Datum::Bool(true)),
        Err(st) if st.is_not_found() => Ok(Datum::Bool(false)),
        Err(st) => Err(st),
    }
}

pub fn forw_char(
    session: &mut Session,
    _term: &mut dyn Term,
    _interp: &mut Interp,
    n: Option<i64>,
    _args: Vec<Datum>,
) -> Outcome<Datum> {
    let n = n_or(n, 1);
    moved(session.buffers.current_mut().core.point_move(n))
}

pub fn back_char(
    session: &mut Session,
    _term: &mut dyn Term,
    _interp: &mut Interp,
    n: Option<i64>,
    _args: Vec<Datum>,
) -> Outcome<Datum> {
    let n = n_or(n, 1);
    moved(session.buffers.current_mut().core.point_move(-n))
}

fn line_move(session: &mut Session, n: i64) -> Outcome<Datum> {
    let tab = session.config.tab_width;
    // Reset the goal column unless the previous command was vertical.
    if !session.last_flags.contains(CmdFlags::VMOVE) {
        session.target_col = session.buffers.current().core.point_col(tab);
    }
    session.this_flags.insert(CmdFlags::VMOVE);
    let target = session.target_col;
    moved(session.buffers.current_mut().core.line_move(n, target, tab))
}

pub fn forw_line(
    session: &mut Session,
    _term: &mut dyn Term,
    _interp: &mut Interp,
    n: Option<i64>,
    _args: Vec<Datum>,
) -> Outcome<Datum> {
    line_move(session, n_or(n, 1))
}

pub fn back_line(
    session: &mut Session,
    _term: &mut dyn Term,
    _interp: &mut Interp,
    n: Option<i64>,
    _args: Vec<Datum>,
) -> Outcome<Datum> {
    line_move(session, -n_or(n, 1))
}

pub fn begin_line(
    session: &mut Session,
    _term: &mut dyn Term,
    _interp: &mut Interp,
    _n: Option<i64>,
    _args: Vec<Datum>,
) -> Outcome<Datum> {
    session.buffers.current_mut().core.to_line_start();
    Ok(Datum::Bool(true))
}

pub fn end_line(
    session: &mut Session,
    _term: &mut dyn Term,
    _interp: &mut Interp,
    _n: Option<i64>,
    _args: Vec<Datum>,
) -> Outcome<Datum> {
    session.buffers.current_mut().core.to_line_end();
    Ok(Datum::Bool(true))
}

pub fn begin_buf(
    session: &mut Session,
    _term: &mut dyn Term,
    _interp: &mut Interp,
    _n: Option<i64>,
    _args: Vec<Datum>,
) -> Outcome<Datum> {
    let origin = session.buffers.current().core.point();
    session.buffers.current_mut().core.to_buffer_start();
    set_wmark_if_moved(session, origin);
    Ok(Datum::Bool(true))
}

pub fn end_buf(
    session: &mut Session,
    _term: &mut dyn Term,
    _interp: &mut Interp,
    _n: Option<i64>,
    _args: Vec<Datum>,
) -> Outcome<Datum> {
    let origin = session.buffers.current().core.point();
    session.buffers.current_mut().core.to_buffer_end();
    set_wmark_if_moved(session, origin);
    Ok(Datum::Bool(true))
}

pub fn forw_word(
    session: &mut Session,
    _term: &mut dyn Term,
    _interp: &mut Interp,
    n: Option<i64>,
    _args: Vec<Datum>,
) -> Outcome<Datum> {
    let count = repeat_count(n)?;
    let words = session.words.clone();
    moved(session.buffers.current_mut().core.forw_word(count, &words))
}

pub fn back_word(
    session: &mut Session,
    _term: &mut dyn Term,
    _interp: &mut Interp,
    n: Option<i64>,
    _args: Vec<Datum>,
) -> Outcome<Datum> {
    let count = repeat_count(n)?;
    let words = session.words.clone();
    moved(session.buffers.current_mut().core.back_word(count, &words))
}

pub fn end_word(
    session: &mut Session,
    _term: &mut dyn Term,
    _interp: &mut Interp,
    n: Option<i64>,
    _args: Vec<Datum>,
) -> Outcome<Datum> {
    let count = repeat_count(n)?;
    let words = session.words.clone();
    moved(session.buffers.current_mut().core.end_word(count, &words))
}

pub fn goto_line(
    session: &mut Session,
    term: &mut dyn Term,
    interp: &mut Interp,
    n: Option<i64>,
    args: Vec<Datum>,
) -> Outcome<Datum> {
    let target = match n {
        Some(line) => line,
        None => {
            match arg_or_prompt(session, term, interp, &args, 0, "Go to line", None, RingChoice::None)? {
                Some(text) => text
                    .trim()
                    .parse::<i64>()
                    .map_err(|_| Status::failure(format!("Invalid number '{text}'")))?,
                None => return Ok(Datum::Bool(false)),
            }
        }
    };
    if target < 1 {
        return Err(Status::failure("Line number must be positive"));
    }
    let origin = session.buffers.current().core.point();
    let core = &mut session.buffers.current_mut().core;
    let line = core.line_at(target as usize);
    core.set_point(Point::new(line, 0));
    set_wmark_if_moved(session, origin);
    Ok(Datum::Bool(true))
}

pub fn set_mark(
    session: &mut Session,
    _term: &mut dyn Term,
    _interp: &mut Interp,
    _n: Option<i64>,
    args: Vec<Datum>,
) -> Outcome<Datum> {
    let id = mark_id(&args)?;
    session.buffers.current_mut().core.set_mark(id, 0);
    session.notify(format!("Mark {} set", id as char));
    Ok(Datum::Bool(true))
}

pub fn goto_mark(
    session: &mut Session,
    _term: &mut dyn Term,
    _interp: &mut Interp,
    _n: Option<i64>,
    args: Vec<Datum>,
) -> Outcome<Datum> {
    let id = mark_id(&args)?;
    let origin = session.buffers.current().core.point();
    match session.buffers.current_mut().core.goto_mark(id) {
        Ok(_) => {
            set_wmark_if_moved(session, origin);
            Ok(Datum::Bool(true))
        }
        Err(st) if st.is_not_found() => {
            Err(Status::failure(format!("Mark {} not set", id as char)))
        }
        Err(st) => Err(st),
    }
}

pub fn delete_mark(
    session: &mut Session,
    _term: &mut dyn Term,
    _interp: &mut Interp,
    _n: Option<i64>,
    args: Vec<Datum>,
) -> Outcome<Datum> {
    let id = mark_id(&args)?;
    match session.buffers.current_mut().core.delete_mark(id) {
        Ok(()) => Ok(Datum::Bool(true)),
        Err(_) => Err(Status::failure(format!("Mark {} not set", id as char))),
    }
}

pub fn swap_mark(
    session: &mut Session,
    _term: &mut dyn Term,
    _interp: &mut Interp,
    _n: Option<i64>,
    args: Vec<Datum>,
) -> Outcome<Datum> {
    let id = mark_id(&args)?;
    match session.buffers.current_mut().core.swap_mark(id) {
        Ok(()) => Ok(Datum::Bool(true)),
        Err(st) if st.is_not_found() => {
            Err(Status::failure(format!("Mark {} not set", id as char)))
        }
        Err(st) => Err(st),
    }
}

fn mark_id(args: &[Datum]) -> Outcome<u8> {
    match args.first() {
        None => Ok(RMARK),
        Some(datum) => {
            let text = datum.to_text();
            match text.first() {
                Some(&c) if (b' '..0x7F).contains(&c) => Ok(c),
                _ => Err(Status::failure("Mark must be a printable character")),
            }
        }
    }
}

/// Alternating horizontal sweep across a long line; the direction is
/// remembered between consecutive invocations.
pub fn traverse_line(
    session: &mut Session,
    _term: &mut dyn Term,
    _interp: &mut Interp,
    n: Option<i64>,
    _args: Vec<Datum>,
) -> Outcome<Datum> {
    const JUMP: i64 = 16;
    if !session.last_flags.contains(CmdFlags::TRAV) {
        session.trav_dir = 1;
    }
    session.this_flags.insert(CmdFlags::TRAV);
    let steps = n_or(n, 1).max(1) * JUMP;
    let core = &mut session.buffers.current_mut().core;
    let pt = core.point();
    let used = core.line_used(pt.line);
    if pt.offset >= used {
        session.trav_dir = -1;
    } else if pt.offset == 0 {
        session.trav_dir = 1;
    }
    let target = if session.trav_dir > 0 {
        (pt.offset as i64 + steps).min(used as i64) as usize
    } else {
        (pt.offset as i64 - steps).max(0) as usize
    };
    core.set_point(Point::new(pt.line, target));
    Ok(Datum::Bool(true))
}

/// Jump to the fence matching the one at (or before) the point.
pub fn goto_fence(
    session: &mut Session,
    term: &mut dyn Term,
    _interp: &mut Interp,
    _n: Option<i64>,
    _args: Vec<Datum>,
) -> Outcome<Datum> {
    let core = &mut session.buffers.current_mut().core;
    let start = core.point();
    match find_fence_match(core, start) {
        Some(target) => {
            core.set_point(target);
            Ok(Datum::Bool(true))
        }
        None => {
            term.beep();
            Ok(Datum::Bool(false))
        }
    }
}

fn fence_partner(c: u8) -> Option<(u8, bool)> {
    match c {
        b'(' => Some((b')', true)),
        b'[' => Some((b']', true)),
        b'{' => Some((b'}', true)),
        b')' => Some((b'(', false)),
        b']' => Some((b'[', false)),
        b'}' => Some((b'{', false)),
        _ => None,
    }
}

/// Scan for the fence matching the character at `start`, honoring nesting.
pub(crate) fn find_fence_match(core: &core_text::TextCore, start: Point) -> Option<Point> {
    let fence = core.char_at(start)?;
    let (partner, forward) = fence_partner(fence)?;
    let mut depth = 1u32;
    let mut pt = start;
    loop {
        let stepped = if forward { step_fwd(core, &mut pt) } else { step_back(core, &mut pt) };
        if !stepped {
            return None;
        }
        match core.char_at(pt) {
            Some(c) if c == fence => depth += 1,
            Some(c) if c == partner => {
                depth -= 1;
                if depth == 0 {
                    return Some(pt);
                }
            }
            _ => {}
        }
    }
}

fn step_fwd(core: &core_text::TextCore, pt: &mut Point) -> bool {
    if pt.offset < core.line_used(pt.line) {
        pt.offset += 1;
        true
    } else if let Some(next) = core.next_line(pt.line) {
        *pt = Point::new(next, 0);
        true
    } else {
        false
    }
}

fn step_back(core: &core_text::TextCore, pt: &mut Point) -> bool {
    if pt.offset > 0 {
        pt.offset -= 1;
        true
    } else if let Some(prev) = core.prev_line(pt.line) {
        *pt = Point::new(prev, core.line_used(prev));
        true
    } else {
        false
    }
}
