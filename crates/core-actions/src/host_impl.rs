//! The interpreter's view of the editor.
//!
//! `HostCtx` borrows the session and terminal; the interpreter hands
//! itself back through each call, so a command invoked from a script can
//! re-enter evaluation (hooks, `xeqFile`) with plain reborrows.
//!
//! System variables follow the capitalization convention: `$Name` is
//! read-only, `$name` is settable.

use crate::{registry, Session};
use core_exec::{Datum, Host, Interp, MacroDef};
use core_state::{BufFlags, MacroMeta, MACRO_SIGIL};
use core_status::{Outcome, Status};
use core_terminal::Term;
use core_text::width::line_col;

pub struct HostCtx<'a> {
    pub session: &'a mut Session,
    pub term: &'a mut dyn Term,
}

/// System variable roster: `(name, writable)`.
const SYSVARS: &[(&str, bool)] = &[
    ("BufInpDelim", false),
    ("BufModes", false),
    ("GlobalModes", false),
    ("LastKey", false),
    ("LineLen", false),
    ("Match", false),
    ("RegionText", false),
    ("TermSize", false),
    ("autoSave", true),
    ("bufFile", true),
    ("bufLineNum", true),
    ("bufname", false),
    ("hardTabSize", true),
    ("horzJump", true),
    ("lastKeySeq", false),
    ("lineChar", false),
    ("lineCol", false),
    ("lineOffset", true),
    ("lineText", false),
    ("maxLoop", true),
    ("maxMacroDepth", true),
    ("replacePat", true),
    ("searchPat", true),
    ("wordChars", true),
];

pub fn sysvar_names() -> &'static [(&'static str, bool)] {
    SYSVARS
}

fn read_only(name: &str) -> Status {
    Status::failure(format!("Variable '${name}' is read-only"))
}

impl HostCtx<'_> {
    fn get_sysvar(&mut self, interp: &mut Interp, name: &str) -> Outcome<Datum> {
        let session = &mut *self.session;
        let buffer = session.buffers.current();
        let core = &buffer.core;
        let value = match name {
            "BufInpDelim" => Datum::str(buffer.write_delim()),
            "BufModes" => {
                Datum::array(buffer.buffer_modes().iter().map(Datum::str).collect())
            }
            "GlobalModes" => Datum::array(
                session
                    .modes
                    .iter()
                    .filter(|m| m.global_enabled)
                    .map(|m| Datum::str(&m.name))
                    .collect(),
            ),
            "LastKey" => Datum::Int(i64::from(session.last_key.0)),
            "LineLen" => Datum::Int(core.line_used(core.point().line) as i64),
            "Match" => match &session.search.last_match {
                Some(text) => Datum::Str(text.clone()),
                None => Datum::Nil,
            },
            "RegionText" => {
                let Some(mark) = core.find_mark(core_text::RMARK) else {
                    return Err(Status::failure("No mark set in this buffer"));
                };
                let region = core.region_between(core.point(), mark.point);
                Datum::Str(core.extract_region(&region))
            }
            "TermSize" => {
                let (cols, rows) = self.term.size();
                Datum::array(vec![Datum::Int(i64::from(cols)), Datum::Int(i64::from(rows))])
            }
            "autoSave" => Datum::Int(i64::from(session.config.auto_save_count)),
            "bufFile" => match buffer.filename() {
                Some(path) => Datum::str(path.display().to_string()),
                None => Datum::Nil,
            },
            "bufLineNum" => Datum::Int(core.line_number(core.point().line) as i64),
            "bufname" => Datum::str(buffer.name()),
            "hardTabSize" => Datum::Int(session.config.tab_width as i64),
            "horzJump" => Datum::Int(i64::from(session.config.jump_pct)),
            "lastKeySeq" => Datum::str(&session.last_key_seq),
            "lineChar" => match core.char_at(core.point()) {
                Some(c) => Datum::Int(i64::from(c)),
                None => Datum::Nil,
            },
            "lineCol" => {
                let pt = core.point();
                Datum::Int(
                    line_col(core.line_text(pt.line), pt.offset, session.config.tab_width)
                        as i64,
                )
            }
            "lineOffset" => Datum::Int(core.point().offset as i64),
            "lineText" => Datum::Str(core.line_text(core.point().line).to_vec()),
            "maxLoop" => Datum::Int(interp.max_loop as i64),
            "maxMacroDepth" => Datum::Int(i64::from(interp.max_macro_depth)),
            "replacePat" => Datum::str(session.search.replacement()),
            "searchPat" => Datum::str(session.search.pattern()),
            "wordChars" => Datum::str(&session.config.word_chars),
            _ => return Err(Status::failure(format!("No such variable '${name}'"))),
        };
        Ok(value)
    }

    fn set_sysvar(&mut self, interp: &mut Interp, name: &str, value: Datum) -> Outcome<()> {
        let session = &mut *self.session;
        match name {
            "autoSave" => {
                session.config.auto_save_count = value.to_int()?.clamp(0, u32::MAX as i64) as u32;
                session.auto_save_left = session.config.auto_save_count;
            }
            "bufFile" => {
                let path = match &value {
                    Datum::Nil => None,
                    other => Some(std::path::PathBuf::from(
                        String::from_utf8_lossy(&other.to_text()).into_owned(),
                    )),
                };
                session.buffers.current_mut().set_filename(path);
            }
            "bufLineNum" => {
                let target = value.to_int()?.max(1) as usize;
                let core = &mut session.buffers.current_mut().core;
                let line = core.line_at(target);
                core.set_point(core_text::Point::new(line, 0));
            }
            "hardTabSize" => {
                let size = value.to_int()?;
                if !(1..=32).contains(&size) {
                    return Err(Status::failure("Tab size must be between 1 and 32"));
                }
                session.config.tab_width = size as usize;
            }
            "horzJump" => {
                let pct = value.to_int()?;
                if !(1..=90).contains(&pct) {
                    return Err(Status::failure("Jump percentage must be between 1 and 90"));
                }
                session.config.jump_pct = pct as u16;
            }
            "lineOffset" => {
                let core = &mut session.buffers.current_mut().core;
                let pt = core.point();
                let used = core.line_used(pt.line) as i64;
                let offset = value.to_int()?;
                let offset = if offset < 0 { used + offset + 1 } else { offset };
                if !(0..=used).contains(&offset) {
                    return Err(Status::failure("Offset out of range"));
                }
                core.set_point(core_text::Point::new(pt.line, offset as usize));
            }
            "maxLoop" => interp.max_loop = value.to_int()?.max(0) as u64,
            "maxMacroDepth" => {
                interp.max_macro_depth = value.to_int()?.clamp(1, u32::MAX as i64) as u32;
            }
            "replacePat" => {
                let text = String::from_utf8_lossy(&value.to_text()).into_owned();
                session.search.set_replacement(&text);
                if !text.is_empty() {
                    session.rings.replace.push(text.into_bytes());
                }
            }
            "searchPat" => {
                let text = String::from_utf8_lossy(&value.to_text()).into_owned();
                session.search.set_pattern(&text)?;
                session.rings.search.push(text.into_bytes());
            }
            "wordChars" => {
                let spec = String::from_utf8_lossy(&value.to_text()).into_owned();
                session.set_word_chars(&spec);
            }
            other if SYSVARS.iter().any(|(n, _)| *n == other) => {
                return Err(read_only(other));
            }
            other => return Err(Status::failure(format!("No such variable '${other}'"))),
        }
        Ok(())
    }
}

impl Host for HostCtx<'_> {
    fn call_command(
        &mut self,
        interp: &mut Interp,
        name: &str,
        n: Option<i64>,
        args: Vec<Datum>,
    ) -> Outcome<Datum> {
        registry::dispatch(self.session, self.term, interp, name, n, args)
    }

    fn knows_command(&self, name: &str) -> bool {
        registry::lookup(name).is_some()
    }

    fn sysvar_get(&mut self, interp: &mut Interp, name: &str) -> Outcome<Datum> {
        self.get_sysvar(interp, name)
    }

    fn sysvar_set(&mut self, interp: &mut Interp, name: &str, value: Datum) -> Outcome<()> {
        self.set_sysvar(interp, name, value)
    }

    fn knows_sysvar(&self, name: &str) -> bool {
        SYSVARS.iter().any(|(n, _)| *n == name)
    }

    fn regex_match(&mut self, subject: &[u8], pat: &str) -> Outcome<bool> {
        // `=~` uses an ad-hoc match object so the session search context
        // (pattern ring, compiled programs) is left untouched.
        let words = self.session.word_table;
        let env = core_search::ScanEnv {
            exact_default: self.session.modes.is_global_enabled("Exact"),
            regex_default: true,
            words: &words,
            progress_after: u32::MAX,
        };
        let mut matcher = core_search::Match::new();
        matcher.set_pattern(pat)?;
        Ok(matcher.match_str(subject, 0, &env)?.is_some())
    }

    fn macro_created(&mut self, def: &MacroDef) -> Outcome<()> {
        // Mirror the macro into a hidden buffer carrying the sigil name.
        let name = format!("{MACRO_SIGIL}{}", def.name);
        let index = self.session.buffers.find_or_create(&name).index;
        let buffer = self.session.buffers.get_mut(index);
        buffer.set_flag(BufFlags::HIDDEN, true);
        let header = format!("{MACRO_SIGIL}{}({})", def.name, def.params.join(", "));
        buffer.core = core_text::TextCore::from_bytes(header.as_bytes());
        buffer.core.set_changed(false);
        buffer.set_macro_meta(MacroMeta {
            usage: def.usage.clone(),
            desc: def.desc.clone(),
            min_args: def.min_args,
            max_args: def.max_args,
        });
        buffer.set_flag(BufFlags::PREPROC, true);
        Ok(())
    }

    fn macro_guard(&mut self, name: &str, enter: bool) {
        let shadow = format!("{MACRO_SIGIL}{name}");
        if let Some(index) = self.session.buffers.find(&shadow) {
            let buffer = self.session.buffers.get_mut(index);
            if enter {
                buffer.exec_enter();
            } else {
                buffer.exec_leave();
            }
        }
    }
}

