//! Scripts driving editor commands through the interpreter host.

use core_actions::Editor;
use core_config::Config;
use core_exec::Datum;
use core_terminal::ScriptedTerm;

fn editor() -> Editor {
    Editor::new(Config::default())
}

fn text_of(ed: &Editor) -> String {
    String::from_utf8(ed.session.buffers.current().core.to_bytes(b"\n", false)).unwrap()
}

#[test]
fn script_inserts_text() {
    let mut ed = editor();
    let mut term = ScriptedTerm::new([]);
    ed.run_script(&mut term, "insert \"hello\"\ninsert \", \", \"world\"").unwrap();
    assert_eq!(text_of(&ed), "hello, world");
}

#[test]
fn macro_argument_scenarios() {
    let mut ed = editor();
    let mut term = ScriptedTerm::new([]);
    let value = ed
        .run_script(&mut term, "macro inc(x) return x + 1 endmacro; return inc(41)")
        .unwrap();
    assert!(value.datum_eq(&Datum::Int(42)));
    let value = ed.run_script(&mut term, "return inc(\"41\")").unwrap();
    assert!(value.datum_eq(&Datum::Int(42)));
    let err = ed.run_script(&mut term, "inc()").unwrap_err();
    assert!(err.message().unwrap().contains("Wrong number of arguments"));
}

#[test]
fn macro_shadow_buffer_guards_execution() {
    let mut ed = editor();
    let mut term = ScriptedTerm::new([]);
    ed.run_script(&mut term, "macro probe() return $bufname endmacro").unwrap();
    // The shadow buffer exists, hidden, carrying the sigil.
    let index = ed.session.buffers.find("@probe").expect("shadow buffer");
    assert!(ed.session.buffers.get(index).is_macro());
    // Deleting it while it runs is refused: the macro deletes itself.
    let err = ed
        .run_script(&mut term, "macro doomed() return deleteBuf(\"@doomed\") endmacro; doomed()")
        .unwrap_err();
    assert!(err.message().unwrap().contains("being executed"));
}

#[test]
fn sysvars_reach_session_state() {
    let mut ed = editor();
    let mut term = ScriptedTerm::new([]);
    let tab = ed.run_script(&mut term, "return $hardTabSize").unwrap();
    assert!(tab.datum_eq(&Datum::Int(8)));
    ed.run_script(&mut term, "$hardTabSize = 4").unwrap();
    assert_eq!(ed.session.config.tab_width, 4);
    // Read-only variables refuse assignment.
    let err = ed.run_script(&mut term, "$Match = \"nope\"").unwrap_err();
    assert!(err.message().unwrap().contains("read-only"));
}

#[test]
fn search_pattern_sysvar_compiles_and_rings() {
    let mut ed = editor();
    ed.session.buffers.current_mut().core =
        core_text::TextCore::from_bytes(b"alpha beta alpha");
    let mut term = ScriptedTerm::new([]);
    ed.run_script(&mut term, "$searchPat = \"beta\"").unwrap();
    assert_eq!(ed.session.rings.search.current(), Some(&b"beta"[..]));
    let found = ed.run_script(&mut term, "return huntForw").unwrap();
    assert!(found.datum_eq(&Datum::str("beta")));
}

#[test]
fn match_variable_exposes_group_zero() {
    let mut ed = editor();
    ed.session.buffers.current_mut().core = core_text::TextCore::from_bytes(b"x=42; y=7");
    let mut term = ScriptedTerm::new([]);
    ed.run_script(&mut term, "searchForw \"([a-z])=([0-9]+):r\"").unwrap();
    let whole = ed.run_script(&mut term, "return $Match").unwrap();
    assert!(whole.datum_eq(&Datum::str("x=42")));
    assert_eq!(ed.session.search.groups[1], b"x");
    assert_eq!(ed.session.search.groups[2], b"42");
}

#[test]
fn regex_operator_through_host() {
    let mut ed = editor();
    let mut term = ScriptedTerm::new([]);
    let hit = ed.run_script(&mut term, "return \"x=42\" =~ \"[a-z]=[0-9]+\"").unwrap();
    assert!(hit.datum_eq(&Datum::Bool(true)));
    let miss = ed.run_script(&mut term, "return \"abc\" !~ \"[0-9]\"").unwrap();
    assert!(miss.datum_eq(&Datum::Bool(true)));
}

#[test]
fn numeric_prefix_reaches_commands() {
    let mut ed = editor();
    let mut term = ScriptedTerm::new([]);
    ed.run_script(&mut term, "3 => insert \"ab\"").unwrap();
    assert_eq!(text_of(&ed), "ababab");
}

#[test]
fn mode_command_runs_hook() {
    let mut ed = editor();
    let mut term = ScriptedTerm::new([]);
    ed.run_script(
        &mut term,
        "macro sawMode(buf, before)\n constrain 0, 2\n $sawIt = true\n return nil\nendmacro",
    )
    .unwrap();
    ed.run_script(&mut term, "setHook \"mode\", \"sawMode\"").unwrap();
    ed.run_script(&mut term, "1 => chgMode \"Exact\"").unwrap();
    assert!(ed.session.modes.is_global_enabled("Exact"));
    let saw = ed.run_script(&mut term, "return $sawIt").unwrap();
    assert!(saw.datum_eq(&Datum::Bool(true)));
    // Setting an already-set mode is a no-op and must not re-run the hook.
    ed.run_script(&mut term, "$sawIt = false").unwrap();
    ed.run_script(&mut term, "1 => chgMode \"Exact\"").unwrap();
    let saw = ed.run_script(&mut term, "return $sawIt").unwrap();
    assert!(saw.datum_eq(&Datum::Bool(false)));
}

#[test]
fn buffer_commands_from_scripts() {
    let mut ed = editor();
    let mut term = ScriptedTerm::new([]);
    ed.run_script(&mut term, "selectBuf \"notes\"\ninsert \"in notes\"").unwrap();
    assert_eq!(ed.session.buffers.current().name(), "notes");
    assert_eq!(text_of(&ed), "in notes");
    ed.run_script(&mut term, "selectBuf \"unnamed\"").unwrap();
    assert_eq!(ed.session.buffers.current().name(), "unnamed");
    // The displayed buffer refuses deletion; the other one goes quietly.
    let err = ed.run_script(&mut term, "deleteBuf \"unnamed\"").unwrap_err();
    assert!(err.message().unwrap().contains("being displayed"));
    ed.run_script(&mut term, "deleteBuf \"notes\"").unwrap();
    assert!(ed.session.buffers.find("notes").is_none());
}

#[test]
fn force_modifier_swallows_command_failures() {
    let mut ed = editor();
    let mut term = ScriptedTerm::new([]);
    let value = ed
        .run_script(&mut term, "force deleteBuf \"missing\"\nreturn \"survived\"")
        .unwrap();
    assert!(value.datum_eq(&Datum::str("survived")));
}

#[test]
fn kill_yank_round_trip_via_script() {
    let mut ed = editor();
    ed.session.buffers.current_mut().core = core_text::TextCore::from_bytes(b"take this line");
    let mut term = ScriptedTerm::new([]);
    ed.run_script(&mut term, "killLine").unwrap();
    assert_eq!(text_of(&ed), "");
    assert_eq!(ed.session.rings.kill.current(), Some(&b"take this line"[..]));
    ed.run_script(&mut term, "yank").unwrap();
    assert_eq!(text_of(&ed), "take this line");
}

#[test]
fn word_case_commands() {
    let mut ed = editor();
    ed.session.buffers.current_mut().core = core_text::TextCore::from_bytes(b"hello world");
    let mut term = ScriptedTerm::new([]);
    ed.run_script(&mut term, "upperCaseWord").unwrap();
    assert_eq!(text_of(&ed), "HELLO world");
    ed.run_script(&mut term, "titleCaseWord").unwrap();
    assert_eq!(text_of(&ed), "HELLO World");
}

#[test]
fn file_round_trip_via_commands() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("notes.txt");
    std::fs::write(&path, b"alpha\nbeta\n").unwrap();
    let mut ed = editor();
    let mut term = ScriptedTerm::new([]);
    let path_str = path.display().to_string();
    ed.run_script(&mut term, &format!("findFile \"{path_str}\"")).unwrap();
    assert_eq!(text_of(&ed), "alpha\nbeta");
    // Unchanged buffer writes back identical bytes.
    ed.run_script(&mut term, "saveFile").unwrap();
    assert_eq!(std::fs::read(&path).unwrap(), b"alpha\nbeta\n");
    // Edit, save, and verify.
    ed.run_script(&mut term, "endBuf\ninsert \"!\"").unwrap();
    ed.run_script(&mut term, "saveFile").unwrap();
    assert_eq!(std::fs::read(&path).unwrap(), b"alpha\nbeta!\n");
}

#[test]
fn seti_counter_inserts_and_steps() {
    let mut ed = editor();
    let mut term = ScriptedTerm::new([]);
    ed.run_script(&mut term, "seti 10, 10, \"%d. \"").unwrap();
    ed.run_script(&mut term, "insertI\ninsertI").unwrap();
    assert_eq!(text_of(&ed), "10. 20. ");
}

#[test]
fn xeq_file_runs_with_arguments() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("startup.ms");
    std::fs::write(&path, "insert $1\nreturn $2 + 1\n").unwrap();
    let mut ed = editor();
    let mut term = ScriptedTerm::new([]);
    let path_str = path.display().to_string();
    let value = ed
        .run_script(&mut term, &format!("return xeqFile(\"{path_str}\", \"from-args\", 9)"))
        .unwrap();
    assert!(value.datum_eq(&Datum::Int(10)));
    assert_eq!(text_of(&ed), "from-args");
}
