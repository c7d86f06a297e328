//! End-to-end search and replace flows driven through a scripted terminal.

use core_actions::{registry, Editor};
use core_config::Config;
use core_exec::Datum;
use core_keymap::KeyCode;
use core_terminal::ScriptedTerm;
use core_text::{Point, WMARK};

fn editor_with(text: &str) -> Editor {
    let mut ed = Editor::new(Config::default());
    ed.session.buffers.current_mut().core = core_text::TextCore::from_bytes(text.as_bytes());
    ed.session.buffers.current_mut().core.set_changed(false);
    ed
}

fn text_of(ed: &Editor) -> String {
    String::from_utf8(ed.session.buffers.current().core.to_bytes(b"\n", false)).unwrap()
}

fn call(
    ed: &mut Editor,
    term: &mut ScriptedTerm,
    name: &str,
    n: Option<i64>,
    args: &[&str],
) -> core_status::Outcome<Datum> {
    let Editor { session, interp } = ed;
    let args = args.iter().map(|a| Datum::str(a)).collect();
    registry::dispatch(session, term, interp, name, n, args)
}

#[test]
fn query_replace_yes_then_no() {
    let mut ed = editor_with("foo bar foo");
    let mut term = ScriptedTerm::new([KeyCode::plain(b'y'), KeyCode::plain(b'n')]);
    call(&mut ed, &mut term, "queryReplace", None, &["foo", "qux"]).unwrap();
    assert_eq!(text_of(&ed), "qux bar foo");
    let msg = ed.session.msg.take().unwrap().1;
    assert!(msg.starts_with("1 substitution"), "message was {msg}");
    // The work mark returns to the original position.
    let core = &ed.session.buffers.current().core;
    let mark = core.find_mark(WMARK).expect("work mark set");
    assert_eq!(mark.point, Point::new(core.first_line(), 0));
}

#[test]
fn query_replace_bang_does_the_rest() {
    let mut ed = editor_with("a a a a");
    let mut term = ScriptedTerm::new([KeyCode::plain(b'y'), KeyCode::plain(b'!')]);
    call(&mut ed, &mut term, "queryReplace", None, &["a", "b"]).unwrap();
    assert_eq!(text_of(&ed), "b b b b");
}

#[test]
fn query_replace_undo_restores() {
    // Substitute twice, undo the second at the next prompt, then quit:
    // only the first substitution stands.
    let mut ed = editor_with("x x x");
    let mut term = ScriptedTerm::new([
        KeyCode::plain(b'y'),
        KeyCode::plain(b'y'),
        KeyCode::plain(b'u'),
        KeyCode::plain(b'q'),
    ]);
    call(&mut ed, &mut term, "queryReplace", None, &["x", "yes"]).unwrap();
    assert_eq!(text_of(&ed), "yes x x");
}

#[test]
fn query_replace_stop_and_go_back() {
    let mut ed = editor_with("m m m");
    let mut term = ScriptedTerm::new([KeyCode::plain(b'y'), KeyCode::plain(b'.')]);
    call(&mut ed, &mut term, "queryReplace", None, &["m", "w"]).unwrap();
    assert_eq!(text_of(&ed), "w m m");
    // '.' returns the point to the origin.
    let core = &ed.session.buffers.current().core;
    assert_eq!(core.point(), Point::new(core.first_line(), 0));
}

#[test]
fn replace_all_non_interactive() {
    let mut ed = editor_with("one two one\ntwo one two");
    let mut term = ScriptedTerm::new([]);
    call(&mut ed, &mut term, "replace", None, &["one", "1"]).unwrap();
    assert_eq!(text_of(&ed), "1 two 1\ntwo 1 two");
}

#[test]
fn replace_counted() {
    let mut ed = editor_with("q q q q");
    let mut term = ScriptedTerm::new([]);
    call(&mut ed, &mut term, "replace", Some(2), &["q", "z"]).unwrap();
    assert_eq!(text_of(&ed), "z z q q");
}

#[test]
fn replace_with_group_references() {
    let mut ed = editor_with("x=42; y=7");
    let mut term = ScriptedTerm::new([]);
    call(&mut ed, &mut term, "replace", None, &["([a-z])=([0-9]+):r", "\\2:=\\1"]).unwrap();
    assert_eq!(text_of(&ed), "42:=x; 7:=y");
}

#[test]
fn zero_count_reports_without_changing() {
    let mut ed = editor_with("k k");
    let mut term = ScriptedTerm::new([]);
    call(&mut ed, &mut term, "replace", Some(0), &["k", "x"]).unwrap();
    assert_eq!(text_of(&ed), "k k");
    assert!(ed.session.msg.take().unwrap().1.starts_with("0 substitutions"));
}

#[test]
fn search_then_hunt() {
    let mut ed = editor_with("abc XYZ abc");
    let mut term = ScriptedTerm::new([]);
    let found = call(&mut ed, &mut term, "searchForw", None, &["abc"]).unwrap();
    assert!(found.datum_eq(&Datum::str("abc")));
    // Forward search lands after the match.
    assert_eq!(ed.session.buffers.current().core.point().offset, 3);
    let found = call(&mut ed, &mut term, "huntForw", None, &[]).unwrap();
    assert!(found.datum_eq(&Datum::str("abc")));
    assert_eq!(ed.session.buffers.current().core.point().offset, 11);
    // Third search fails quietly.
    let found = call(&mut ed, &mut term, "huntForw", None, &[]).unwrap();
    assert!(found.datum_eq(&Datum::Bool(false)));
    assert_eq!(ed.session.msg.take().unwrap().1, "Not found");
}

#[test]
fn case_insensitive_suffix_search() {
    let mut ed = editor_with("Hello, HELLO");
    let mut term = ScriptedTerm::new([]);
    call(&mut ed, &mut term, "searchForw", None, &["hello:i"]).unwrap();
    assert_eq!(ed.session.buffers.current().core.point().offset, 5);
    call(&mut ed, &mut term, "huntForw", None, &[]).unwrap();
    assert_eq!(ed.session.buffers.current().core.point().offset, 12);
}

#[test]
fn backward_search_lands_at_start() {
    let mut ed = editor_with("abc XYZ abc");
    ed.session.buffers.current_mut().core.to_buffer_end();
    let mut term = ScriptedTerm::new([]);
    call(&mut ed, &mut term, "searchBack", None, &["abc"]).unwrap();
    assert_eq!(ed.session.buffers.current().core.point().offset, 8);
}

#[test]
fn patterns_feed_the_rings() {
    let mut ed = editor_with("hay needle hay");
    let mut term = ScriptedTerm::new([]);
    call(&mut ed, &mut term, "searchForw", None, &["needle"]).unwrap();
    assert_eq!(ed.session.rings.search.current(), Some(&b"needle"[..]));
    call(&mut ed, &mut term, "replace", Some(1), &["needle", "pin"]).unwrap();
    assert_eq!(ed.session.rings.replace.current(), Some(&b"pin"[..]));
}
