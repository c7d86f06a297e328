//! Search and replace commands.
//!
//! The scanners live in core-search; these drivers own the interactive
//! pieces: pattern prompts fed from the pattern rings, point placement
//! (forward searches land after the match, backward ones at its start),
//! the work mark on long jumps, and the query-replace loop.

use super::{arg_or_prompt, check_edit, repeat_count, set_wmark_if_moved, RingChoice};
use crate::Session;
use core_exec::{Datum, Interp};
use core_keymap::ESC_KEY;
use core_search::replace::{decide, QueryDecision, QueryResponse, ReplaceUndo, QUERY_HELP};
use core_search::Dir;
use core_status::{Outcome, Status};
use core_terminal::Term;
use core_text::{Point, WMARK};
use tracing::debug;

/// Prompt for (or take) a search pattern and install it.
fn get_search_pattern(
    session: &mut Session,
    term: &mut dyn Term,
    interp: &Interp,
    args: &[Datum],
    index: usize,
    prompt: &str,
) -> Outcome<()> {
    let Some(pattern) = arg_or_prompt(
        session,
        term,
        interp,
        args,
        index,
        prompt,
        None,
        RingChoice::Search,
    )?
    else {
        return Err(Status::failure("Search pattern required"));
    };
    if pattern.is_empty() {
        return Err(Status::failure("Search pattern required"));
    }
    session.search.set_pattern(&pattern)?;
    session.rings.search.push(pattern.into_bytes());
    Ok(())
}

fn get_replace_pattern(
    session: &mut Session,
    term: &mut dyn Term,
    interp: &Interp,
    args: &[Datum],
    index: usize,
) -> Outcome<()> {
    let replacement = arg_or_prompt(
        session,
        term,
        interp,
        args,
        index,
        "with",
        None,
        RingChoice::Replace,
    )?
    .unwrap_or_default();
    session.search.set_replacement(&replacement);
    if !replacement.is_empty() {
        session.rings.replace.push(replacement.into_bytes());
    }
    Ok(())
}

/// Scan `count` matches in `dir`, leaving the point per direction and
/// answering the match string or false.
fn scan_and_land(
    session: &mut Session,
    term: &mut dyn Term,
    dir: Dir,
    count: u64,
) -> Outcome<Datum> {
    let words = session.word_table;
    let env = core_search::ScanEnv {
        exact_default: session.modes.is_global_enabled("Exact"),
        regex_default: session.modes.is_global_enabled("Regexp"),
        words: &words,
        progress_after: session.config.search_progress,
    };
    let origin = session.buffers.current().core.point();
    let (_, rows) = term.size();
    let result = {
        let core = &session.buffers.current().core;
        let mut progress = || {
            term.move_to(rows - 1, 0);
            term.put_str(b"Searching...");
            term.erase_eol();
            term.flush();
        };
        session.search.scan_buffer(core, origin, dir, count as usize, &env, Some(&mut progress))
    };
    match result {
        Ok(found) => {
            let landing = match dir {
                Dir::Forward => found.end,
                Dir::Backward => found.start,
            };
            session.buffers.current_mut().core.set_point(landing);
            set_wmark_if_moved(session, origin);
            let text = session.search.groups.first().cloned().unwrap_or_default();
            Ok(Datum::Str(text))
        }
        Err(st) if st.is_not_found() => {
            session.notify("Not found");
            Ok(Datum::Bool(false))
        }
        Err(st) => Err(st),
    }
}

pub fn search_forw(
    session: &mut Session,
    term: &mut dyn Term,
    interp: &mut Interp,
    n: Option<i64>,
    args: Vec<Datum>,
) -> Outcome<Datum> {
    let count = repeat_count(n)?;
    get_search_pattern(session, term, interp, &args, 0, "Search")?;
    scan_and_land(session, term, Dir::Forward, count)
}

pub fn search_back(
    session: &mut Session,
    term: &mut dyn Term,
    interp: &mut Interp,
    n: Option<i64>,
    args: Vec<Datum>,
) -> Outcome<Datum> {
    let count = repeat_count(n)?;
    get_search_pattern(session, term, interp, &args, 0, "Reverse search")?;
    scan_and_land(session, term, Dir::Backward, count)
}

pub fn hunt_forw(
    session: &mut Session,
    term: &mut dyn Term,
    _interp: &mut Interp,
    n: Option<i64>,
    _args: Vec<Datum>,
) -> Outcome<Datum> {
    let count = repeat_count(n)?;
    if !session.search.has_pattern() {
        return Err(Status::failure("No search pattern set"));
    }
    scan_and_land(session, term, Dir::Forward, count)
}

pub fn hunt_back(
    session: &mut Session,
    term: &mut dyn Term,
    _interp: &mut Interp,
    n: Option<i64>,
    _args: Vec<Datum>,
) -> Outcome<Datum> {
    let count = repeat_count(n)?;
    if !session.search.has_pattern() {
        return Err(Status::failure("No search pattern set"));
    }
    scan_and_land(session, term, Dir::Backward, count)
}

pub fn replace(
    session: &mut Session,
    term: &mut dyn Term,
    interp: &mut Interp,
    n: Option<i64>,
    args: Vec<Datum>,
) -> Outcome<Datum> {
    repl_str(session, term, interp, n, args, false)
}

pub fn query_replace(
    session: &mut Session,
    term: &mut dyn Term,
    interp: &mut Interp,
    n: Option<i64>,
    args: Vec<Datum>,
) -> Outcome<Datum> {
    repl_str(session, term, interp, n, args, true)
}

// Internal mark bounding a line-break-limited replace; adjusts with edits.
const LIMIT_MARK: u8 = 0x01;

fn show_query_prompt(session: &mut Session, term: &mut dyn Term) -> Outcome<()> {
    let matched = session.search.groups.first().cloned().unwrap_or_default();
    let replacement = session.search.build_replacement()?;
    let (_, rows) = term.size();
    term.move_to(rows - 1, 0);
    term.put_str(b"Replace \"");
    term.put_str(&matched);
    term.put_str(b"\" with \"");
    term.put_str(&replacement);
    term.put_str(b"\"? ");
    term.erase_eol();
    term.flush();
    Ok(())
}

fn read_response(term: &mut dyn Term) -> Outcome<QueryResponse> {
    let key = term
        .get_key(None)
        .map_err(|err| Status::os_error(err.to_string()))?
        .expect("blocking read");
    if key == core_keymap::ABORT_KEY {
        return Err(Status::user_abort());
    }
    let byte = if key == ESC_KEY { 0x1B } else { key.char7() };
    Ok(QueryResponse::from_byte(byte))
}

/// The replace loop shared by `replace` and `queryReplace`.
#[allow(clippy::too_many_lines)]
fn repl_str(
    session: &mut Session,
    term: &mut dyn Term,
    interp: &mut Interp,
    n: Option<i64>,
    args: Vec<Datum>,
    query: bool,
) -> Outcome<Datum> {
    check_edit(session)?;
    get_search_pattern(
        session,
        term,
        interp,
        &args,
        0,
        if query { "Query replace" } else { "Replace" },
    )?;
    get_replace_pattern(session, term, interp, &args, 1)?;

    // Count semantics: None replaces to end of buffer, 0 reports a no-op,
    // negative bounds the scan to that many line breaks.
    let mut limit: Option<i64> = None;
    let forever;
    let target;
    match n {
        None => {
            forever = true;
            target = 0;
        }
        Some(0) => {
            session.notify("0 substitutions");
            return Ok(Datum::Bool(true));
        }
        Some(k) if k < 0 => {
            forever = true;
            target = 0;
            limit = Some(-k);
        }
        Some(k) => {
            forever = false;
            target = k as u64;
        }
    }

    let origin = session.buffers.current().core.point();
    if let Some(breaks) = limit {
        // Plant the boundary mark `breaks` lines below the origin.
        let tab = session.config.tab_width;
        let core = &mut session.buffers.current_mut().core;
        let saved = core.point();
        let _ = core.line_move(breaks, 0, tab);
        core.to_line_end();
        core.set_mark(LIMIT_MARK, 0);
        core.set_point(saved);
    }

    let mut interactive = query;
    let mut subs: u64 = 0;
    let mut undo: Option<ReplaceUndo> = None;
    let mut last_spot: Option<Point> = None;
    let mut go_back = false;
    let words = session.word_table;

    'outer: loop {
        // Find the next match from the point.
        let env = core_search::ScanEnv {
            exact_default: session.modes.is_global_enabled("Exact"),
            regex_default: session.modes.is_global_enabled("Regexp"),
            words: &words,
            progress_after: session.config.search_progress,
        };
        let found = {
            let core = &session.buffers.current().core;
            let from = core.point();
            match session.search.scan_buffer(core, from, Dir::Forward, 1, &env, None) {
                Ok(found) => found,
                Err(st) if st.is_not_found() => break,
                Err(st) => return Err(st),
            }
        };
        if let Some(mark) = session.buffers.current().core.find_mark(LIMIT_MARK) {
            let core = &session.buffers.current().core;
            if core.cmp_points(found.start, mark.point) == std::cmp::Ordering::Greater {
                break;
            }
        }
        // Work at the start of the match.
        session.buffers.current_mut().core.set_point(found.start);

        if !interactive {
            // Zero-width matches that fail to advance would spin forever.
            if found.len == 0 && Some(found.start) == last_spot {
                return Err(Status::failure("Repeating match at same position detected"));
            }
            last_spot = Some(found.start);
        } else {
            loop {
                show_query_prompt(session, term)?;
                match decide(read_response(term)?, undo.is_some()) {
                    QueryDecision::Substitute { last, rest_unattended } => {
                        if rest_unattended {
                            interactive = false;
                        }
                        substitute(session, &found, &mut undo, &mut subs)?;
                        if last {
                            break 'outer;
                        }
                        continue 'outer;
                    }
                    QueryDecision::Skip => {
                        let core = &mut session.buffers.current_mut().core;
                        if core.point_move(1).is_err() {
                            break 'outer;
                        }
                        continue 'outer;
                    }
                    QueryDecision::Undo => {
                        let record = undo.take().expect("decide guards undo");
                        apply_undo(session, record, &mut subs)?;
                        continue 'outer;
                    }
                    QueryDecision::Restart => {
                        session.buffers.current_mut().core.set_point(origin);
                        undo = None;
                        subs = 0;
                        continue 'outer;
                    }
                    QueryDecision::StopGoBack => {
                        go_back = true;
                        break 'outer;
                    }
                    QueryDecision::StopHere => break 'outer,
                    QueryDecision::Help => {
                        session.notify(QUERY_HELP);
                        let (_, rows) = term.size();
                        term.move_to(rows - 1, 0);
                        term.put_str(QUERY_HELP.as_bytes());
                        term.erase_eol();
                        term.flush();
                        let _ = read_response(term)?;
                        continue;
                    }
                    QueryDecision::Beep => {
                        term.beep();
                        continue;
                    }
                }
            }
        }

        substitute(session, &found, &mut undo, &mut subs)?;
        if !forever && subs >= target {
            break;
        }
    }

    // Clean up the boundary mark.
    let _ = session.buffers.current_mut().core.delete_mark(LIMIT_MARK);

    if go_back {
        session.buffers.current_mut().core.set_point(origin);
    }
    let mut message = format!("{subs} substitution{}", if subs == 1 { "" } else { "s" });
    let moved = session.buffers.current().core.point() != origin;
    if moved {
        let core = &mut session.buffers.current_mut().core;
        let now = core.point();
        core.set_point(origin);
        core.set_mark(WMARK, 0);
        core.set_point(now);
        message.push_str(&format!(", mark {} set to previous position", WMARK as char));
    }
    session.notify(message);
    debug!(target: "search.replace", subs, "replace done");
    Ok(Datum::Bool(true))
}

/// Replace the matched text at the point with the rendered replacement,
/// recording the single-slot undo.
fn substitute(
    session: &mut Session,
    found: &core_search::Found,
    undo: &mut Option<ReplaceUndo>,
    subs: &mut u64,
) -> Outcome<()> {
    let replacement = session.search.build_replacement()?;
    let core = &mut session.buffers.current_mut().core;
    let out = core.delete(found.len as i64, true)?;
    core.insert_str(&replacement)?;
    *undo = Some(ReplaceUndo {
        matched: out.text.unwrap_or_default(),
        match_len: found.len,
        repl_point: core.point(),
        repl_len: replacement.len() as u64,
    });
    *subs += 1;
    Ok(())
}

/// Exact inverse of the last substitution: delete the replacement, restore
/// the matched string, reposition at its start.
fn apply_undo(session: &mut Session, record: ReplaceUndo, subs: &mut u64) -> Outcome<()> {
    let core = &mut session.buffers.current_mut().core;
    core.set_point(record.repl_point);
    core.delete(-(record.repl_len as i64), false)?;
    core.insert_str(&record.matched)?;
    core.point_move(-(record.match_len as i64))?;
    *subs = subs.saturating_sub(1);
    Ok(())
}
