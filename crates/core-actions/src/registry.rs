//! The command registry and default key bindings.

use crate::commands::{control, edit, file, motion, search, CmdFn};
use crate::Session;
use core_exec::{Datum, Interp};
use core_keymap::{parse_key_lit, KeyTarget, KeymapTable, PrefixKind};
use core_status::{Outcome, Status};
use core_terminal::Term;

/// One registered built-in.
pub struct CmdEntry {
    pub name: &'static str,
    pub func: CmdFn,
}

macro_rules! cmd {
    ($name:literal, $func:path) => {
        CmdEntry { name: $name, func: $func }
    };
}

/// Every built-in, sorted by name.
static COMMANDS: &[CmdEntry] = &[
    cmd!("appendFile", file::append_file),
    cmd!("apropos", control::apropos),
    cmd!("backChar", motion::back_char),
    cmd!("backLine", motion::back_line),
    cmd!("backWord", motion::back_word),
    cmd!("beep", control::beep),
    cmd!("beginBuf", motion::begin_buf),
    cmd!("beginKeyMacro", control::begin_key_macro),
    cmd!("beginLine", motion::begin_line),
    cmd!("bindKey", control::bind_key),
    cmd!("chgDir", file::chg_dir),
    cmd!("chgMode", control::chg_mode),
    cmd!("copyRegion", edit::copy_region),
    cmd!("cycleDelRing", edit::cycle_delete_ring),
    cmd!("cycleKillRing", edit::cycle_kill_ring),
    cmd!("deleteBackChar", edit::delete_back_char),
    cmd!("deleteBackWord", edit::delete_back_word),
    cmd!("deleteBlankLines", edit::delete_blank_lines),
    cmd!("deleteBuf", file::delete_buf),
    cmd!("deleteForwChar", edit::delete_forw_char),
    cmd!("deleteLine", edit::delete_line),
    cmd!("deleteMark", motion::delete_mark),
    cmd!("deleteRegion", edit::delete_region),
    cmd!("deleteWord", edit::delete_word),
    cmd!("dupLine", edit::dup_line),
    cmd!("endBuf", motion::end_buf),
    cmd!("endKeyMacro", control::end_key_macro),
    cmd!("endLine", motion::end_line),
    cmd!("endWord", motion::end_word),
    cmd!("eval", control::eval),
    cmd!("exit", file::exit_editor),
    cmd!("findFile", file::find_file),
    cmd!("forwChar", motion::forw_char),
    cmd!("forwLine", motion::forw_line),
    cmd!("forwWord", motion::forw_word),
    cmd!("gotoFence", motion::goto_fence),
    cmd!("gotoLine", motion::goto_line),
    cmd!("gotoMark", motion::goto_mark),
    cmd!("huntBack", search::hunt_back),
    cmd!("huntForw", search::hunt_forw),
    cmd!("insert", edit::insert),
    cmd!("insertFile", file::insert_file),
    cmd!("insertI", edit::insert_i),
    cmd!("killLine", edit::kill_line),
    cmd!("killRegion", edit::kill_region),
    cmd!("lowerCaseRegion", edit::lower_case_region),
    cmd!("lowerCaseWord", edit::lower_case_word),
    cmd!("message", control::message),
    cmd!("newline", edit::newline),
    cmd!("nextBuf", file::next_buf),
    cmd!("openLine", edit::open_line),
    cmd!("pipeBuf", file::pipe_buf),
    cmd!("prevBuf", file::prev_buf),
    cmd!("prompt", control::prompt),
    cmd!("queryReplace", search::query_replace),
    cmd!("quickExit", file::quick_exit),
    cmd!("quoteChar", edit::quote_char),
    cmd!("readFile", file::read_file),
    cmd!("readPipe", file::read_pipe),
    cmd!("renameBuf", file::rename_buf),
    cmd!("replace", search::replace),
    cmd!("run", control::run),
    cmd!("saveAll", file::save_all_cmd),
    cmd!("saveFile", file::save_file),
    cmd!("scratchBuf", file::scratch_buf),
    cmd!("searchBack", search::search_back),
    cmd!("searchForw", search::search_forw),
    cmd!("selectBuf", file::select_buf),
    cmd!("setHook", control::set_hook),
    cmd!("setMark", motion::set_mark),
    cmd!("seti", control::seti),
    cmd!("showBindings", control::show_bindings),
    cmd!("showBuffers", file::show_buffers),
    cmd!("showCommands", control::show_commands),
    cmd!("showHooks", control::show_hooks),
    cmd!("showModes", control::show_modes),
    cmd!("showVariables", control::show_variables),
    cmd!("swapMark", motion::swap_mark),
    cmd!("tab", edit::tab),
    cmd!("titleCaseWord", edit::title_case_word),
    cmd!("traverseLine", motion::traverse_line),
    cmd!("unbindKey", control::unbind_key),
    cmd!("undelete", edit::undelete),
    cmd!("upperCaseRegion", edit::upper_case_region),
    cmd!("upperCaseWord", edit::upper_case_word),
    cmd!("writeFile", file::write_file),
    cmd!("xeqFile", file::xeq_file),
    cmd!("xeqKeyMacro", control::xeq_key_macro),
    cmd!("yank", edit::yank),
    cmd!("yankPop", edit::yank_pop),
];

pub fn lookup(name: &str) -> Option<&'static CmdEntry> {
    COMMANDS.iter().find(|entry| entry.name == name)
}

pub fn command_names() -> Vec<&'static str> {
    COMMANDS.iter().map(|entry| entry.name).collect()
}

/// Invoke a built-in by name.
pub fn dispatch(
    session: &mut Session,
    term: &mut dyn Term,
    interp: &mut Interp,
    name: &str,
    n: Option<i64>,
    args: Vec<Datum>,
) -> Outcome<Datum> {
    match lookup(name) {
        Some(entry) => (entry.func)(session, term, interp, n, args),
        None => Err(Status::failure(format!("No such command '{name}'"))),
    }
}

/// The default binding set.
pub fn install_default_bindings(keymap: &mut KeymapTable) {
    use core_keymap::{KeyCode, ESC_KEY};
    // Prefix keys first so sequence literals below can resolve.
    keymap.bind(KeyCode::ctrl(b'X'), KeyTarget::Prefix(PrefixKind::Pref1)).expect("bind");
    keymap.bind(KeyCode::ctrl(b'C'), KeyTarget::Prefix(PrefixKind::Pref2)).expect("bind");
    keymap.bind(KeyCode::ctrl(b'H'), KeyTarget::Prefix(PrefixKind::Pref3)).expect("bind");
    keymap.bind(ESC_KEY, KeyTarget::Prefix(PrefixKind::Meta)).expect("bind");

    let bindings: &[(&str, &str)] = &[
        ("C-f", "forwChar"),
        ("FNF", "forwChar"),
        ("C-b", "backChar"),
        ("FNB", "backChar"),
        ("C-n", "forwLine"),
        ("FNN", "forwLine"),
        ("C-p", "backLine"),
        ("FNP", "backLine"),
        ("C-a", "beginLine"),
        ("FNH", "beginLine"),
        ("C-e", "endLine"),
        ("FNE", "endLine"),
        ("M-<", "beginBuf"),
        ("M->", "endBuf"),
        ("M-f", "forwWord"),
        ("M-b", "backWord"),
        ("M-C-e", "endWord"),
        ("M-g", "gotoLine"),
        ("M-t", "traverseLine"),
        ("M-C-f", "gotoFence"),
        ("C-d", "deleteForwChar"),
        ("FNX", "deleteForwChar"),
        ("DEL", "deleteBackChar"),
        ("M-d", "deleteWord"),
        ("M-DEL", "deleteBackWord"),
        ("C-k", "killLine"),
        ("C-w", "killRegion"),
        ("M-w", "copyRegion"),
        ("C-y", "yank"),
        ("M-y", "yankPop"),
        ("C-x u", "undelete"),
        ("C-x C-o", "deleteBlankLines"),
        ("C-o", "openLine"),
        ("C-x d", "dupLine"),
        ("C-x C-d", "deleteLine"),
        ("RTN", "newline"),
        ("TAB", "tab"),
        ("C-q", "quoteChar"),
        ("C-SPC", "setMark"),
        ("C-x g", "gotoMark"),
        ("C-x C-x", "swapMark"),
        ("C-x a", "deleteMark"),
        ("M-u", "upperCaseWord"),
        ("M-l", "lowerCaseWord"),
        ("M-c", "titleCaseWord"),
        ("C-x C-u", "upperCaseRegion"),
        ("C-x C-l", "lowerCaseRegion"),
        ("C-s", "searchForw"),
        ("C-r", "searchBack"),
        ("C-x s", "huntForw"),
        ("C-x r", "huntBack"),
        ("M-r", "replace"),
        ("M-q", "queryReplace"),
        ("C-x b", "selectBuf"),
        ("C-x n", "nextBuf"),
        ("C-x p", "prevBuf"),
        ("C-x k", "deleteBuf"),
        ("C-x C-b", "showBuffers"),
        ("C-x C-f", "findFile"),
        ("C-x C-r", "readFile"),
        ("C-x C-s", "saveFile"),
        ("C-x C-w", "writeFile"),
        ("C-x C-i", "insertFile"),
        ("C-x C-a", "appendFile"),
        ("C-x (", "beginKeyMacro"),
        ("C-x )", "endKeyMacro"),
        ("C-x e", "xeqKeyMacro"),
        ("C-x i", "insertI"),
        ("C-x /", "xeqFile"),
        ("C-x m", "chgMode"),
        ("C-x C-k", "bindKey"),
        ("C-x C-n", "unbindKey"),
        ("M-x", "run"),
        ("M-e", "eval"),
        ("M-z", "quickExit"),
        ("C-x q", "exit"),
        ("C-h b", "showBindings"),
        ("C-h c", "showCommands"),
        ("C-h v", "showVariables"),
        ("C-h m", "showModes"),
        ("C-h h", "showHooks"),
        ("C-h a", "apropos"),
    ];
    for (lit, name) in bindings {
        let code = parse_key_lit(lit, keymap).expect("default binding literal");
        keymap.bind(code, KeyTarget::Command((*name).to_string())).expect("bind");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_table_is_sorted_and_unique() {
        let names = command_names();
        let mut sorted = names.clone();
        sorted.sort_unstable();
        sorted.dedup();
        assert_eq!(names, sorted);
    }

    #[test]
    fn default_bindings_resolve() {
        let mut keymap = KeymapTable::new();
        install_default_bindings(&mut keymap);
        for (_, target) in keymap.iter() {
            if let KeyTarget::Command(name) = target {
                assert!(lookup(name).is_some(), "unknown command {name}");
            }
        }
    }

    #[test]
    fn lookup_finds_commands() {
        assert!(lookup("forwChar").is_some());
        assert!(lookup("noSuchThing").is_none());
    }
}
