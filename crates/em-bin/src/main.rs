//! Ember entrypoint: CLI parsing, logging bootstrap, startup sequencing,
//! and the display collaborator (a single-window paint plus mode and
//! message lines) wrapped around the dispatcher loop.

use anyhow::Result;
use clap::Parser;
use core_actions::{dispatcher, Editor};
use core_config::Config;
use core_state::{BufFlags, ModeScope};
use core_status::Severity;
use core_terminal::{CrosstermTerm, Term};
use core_text::width::next_col;
use std::path::PathBuf;
use tracing::{error, info};
use tracing_appender::non_blocking::WorkerGuard;

/// CLI arguments.
#[derive(Parser, Debug)]
#[command(name = "ember", version, about = "Ember text editor", disable_version_flag = true)]
struct Args {
    /// Skip the startup script.
    #[arg(short = 'n')]
    no_startup: bool,
    /// Working directory to switch to first.
    #[arg(short = 'd', value_name = "DIR")]
    directory: Option<PathBuf>,
    /// Buffer modes to set on the first file, comma separated; a leading
    /// `^` clears instead.
    #[arg(short = 'D', value_name = "MODES")]
    buf_modes: Option<String>,
    /// Global modes to set, comma separated; a leading `^` clears.
    #[arg(short = 'G', value_name = "MODES")]
    global_modes: Option<String>,
    /// Go to line[:col] in the first file.
    #[arg(short = 'g', value_name = "LINE[:COL]")]
    goto: Option<String>,
    /// Evaluate an expression after startup.
    #[arg(short = 'e', value_name = "EXPR")]
    eval: Vec<String>,
    /// Open the first file read-only.
    #[arg(short = 'r')]
    read_only: bool,
    /// Open the first file read-write (overrides a read-only default).
    #[arg(short = 'R')]
    read_write: bool,
    /// Search forward for a pattern in the first file.
    #[arg(short = 's', value_name = "PAT")]
    search: Option<String>,
    /// Execute a script file after startup.
    #[arg(short = 'S', value_name = "SCRIPT")]
    script: Option<PathBuf>,
    /// Configuration file path override.
    #[arg(short = 'X', value_name = "PATH")]
    config_path: Option<PathBuf>,
    /// Write-delimiter override for files read at startup (e.g. "\r\n").
    #[arg(short = 'i', value_name = "DELIM")]
    input_delim: Option<String>,
    /// Print version and exit.
    #[arg(short = 'V', long = "version")]
    show_version: bool,
    /// Print license summary and exit.
    #[arg(short = 'C')]
    show_license: bool,
    /// Files to edit; `+LINE` applies to the following file, `@SCRIPT`
    /// runs a startup macro file, a bare `-` reads standard input.
    #[arg(value_name = "FILE", allow_hyphen_values = false)]
    files: Vec<String>,
}

fn init_logging() -> Option<WorkerGuard> {
    let dir = std::env::var_os("EMBER_LOG_DIR")
        .map(PathBuf::from)
        .or_else(|| dirs_fallback().map(|d| d.join("ember")))?;
    std::fs::create_dir_all(&dir).ok()?;
    let appender = tracing_appender::rolling::never(dir, "ember.log");
    let (writer, guard) = tracing_appender::non_blocking(appender);
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_env("EMBER_LOG")
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(writer)
        .with_ansi(false)
        .init();
    Some(guard)
}

fn dirs_fallback() -> Option<PathBuf> {
    std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".cache"))
}

// -------------------------------------------------------------------------
// Display collaborator: one window, a mode line, and the message line.
// -------------------------------------------------------------------------

#[derive(Default)]
struct View {
    top: usize,
}

impl View {
    /// Keep the point's line inside the window.
    fn frame(&mut self, line: usize, text_rows: usize) {
        if line < self.top {
            self.top = line;
        } else if line >= self.top + text_rows {
            self.top = line + 1 - text_rows;
        }
    }
}

fn render_line(out: &mut Vec<u8>, text: &[u8], cols: usize, tab: usize) {
    let mut col = 0;
    for &c in text {
        let next = next_col(c, col, tab);
        if next > cols {
            out.push(b'$');
            return;
        }
        match c {
            b'\t' => out.extend(std::iter::repeat_n(b' ', next - col)),
            0..0x20 | 0x7F => {
                out.push(b'^');
                out.push(c ^ 0x40);
            }
            0x80.. => out.extend_from_slice(format!("<{c:02X}>").as_bytes()),
            _ => out.push(c),
        }
        col = next;
    }
}

fn render(ed: &mut Editor, term: &mut dyn Term, view: &mut View) {
    let (cols, rows) = term.size();
    let text_rows = rows.saturating_sub(2) as usize;
    let tab = ed.session.config.tab_width;
    let buffer = ed.session.buffers.current();
    let core = &buffer.core;
    let point_line = core.line_number(core.point().line) - 1;
    view.frame(point_line, text_rows.max(1));

    // Text rows.
    let mut id = core.first_line();
    for _ in 0..view.top {
        match core.next_line(id) {
            Some(next) => id = next,
            None => break,
        }
    }
    let mut cursor_screen = (0u16, 0u16);
    for row in 0..text_rows {
        term.move_to(row as u16, 0);
        let line_no = view.top + row;
        if line_no < core.line_count() {
            let mut out = Vec::new();
            render_line(&mut out, core.line_text(id), cols as usize, tab);
            term.put_str(&out);
            if id == core.point().line {
                let col = core_text::width::line_col(
                    core.line_text(id),
                    core.point().offset,
                    tab,
                );
                cursor_screen = (row as u16, col.min(cols as usize - 1) as u16);
            }
            if let Some(next) = core.next_line(id) {
                id = next;
            }
        }
        term.erase_eol();
    }

    // Mode line.
    let modes: Vec<&str> = buffer.buffer_modes().iter().map(String::as_str).collect();
    let status = format!(
        "-- {}{} {} L{} --{}",
        if buffer.is_changed() { "*" } else { "" },
        buffer.name(),
        buffer.filename().map(|p| p.display().to_string()).unwrap_or_default(),
        point_line + 1,
        if modes.is_empty() { String::new() } else { format!(" ({})", modes.join(" ")) },
    );
    term.move_to(rows - 2, 0);
    term.reverse_video(true);
    term.put_str(status.as_bytes());
    term.erase_eol();
    term.reverse_video(false);

    // Message line: render and consume the pending message.
    term.move_to(rows - 1, 0);
    if let Some((_, text)) = ed.session.msg.take() {
        term.put_str(text.as_bytes());
    }
    term.erase_eol();
    term.move_to(cursor_screen.0, cursor_screen.1);
    term.flush();
}

// -------------------------------------------------------------------------
// Startup sequencing
// -------------------------------------------------------------------------

fn apply_mode_list(ed: &mut Editor, term: &mut dyn Term, list: &str, scope: ModeScope) {
    for raw in list.split(',') {
        let raw = raw.trim();
        if raw.is_empty() {
            continue;
        }
        let (name, n) = match raw.strip_prefix('^') {
            Some(rest) => (rest, -1),
            None => (raw, 1),
        };
        let wanted = ed.session.modes.find(name).map(|m| m.scope);
        if wanted != Some(scope) {
            ed.session.msg.post(Severity::Failure, format!("No such mode \"{name}\""), false);
            continue;
        }
        if let Err(st) = ed.call_named(term, "chgMode", Some(n), vec![core_exec::Datum::str(name)])
        {
            ed.session.msg.post_status(&st);
        }
    }
}

fn read_stdin_buffer(ed: &mut Editor) -> Result<()> {
    use std::io::Read;
    let mut bytes = Vec::new();
    std::io::stdin().read_to_end(&mut bytes)?;
    let contents = core_actions::io_ops::decode(&bytes);
    let index = ed.session.buffers.scratch();
    let buffer = ed.session.buffers.get_mut(index);
    buffer.core = core_text::TextCore::from_lines(contents.lines);
    buffer.set_file_delim(contents.delim, contents.final_delim);
    buffer.core.set_changed(false);
    let old = ed.session.buffers.current_index();
    if old != index && ed.session.buffers.select(index).is_ok() {
        ed.session.buffers.get_mut(old).release_window();
        ed.session.buffers.get_mut(index).retain_window();
    }
    Ok(())
}

fn startup(ed: &mut Editor, term: &mut dyn Term, args: &Args) {
    if let Some(dir) = &args.directory {
        if let Err(err) = std::env::set_current_dir(dir) {
            ed.session
                .msg
                .post(Severity::Failure, format!("{}: {err}", dir.display()), false);
        }
    }

    // Startup script, unless suppressed.
    if !args.no_startup {
        if let Some(path) = Config::default_path().map(|p| p.with_file_name("startup.ms")) {
            if path.exists() {
                run_script_file(ed, term, &path);
            }
        }
    }

    // File arguments: `+LINE` prefixes, `@script` runners, `-` for stdin.
    let mut pending_goto: Option<String> = None;
    for file in &args.files {
        if let Some(rest) = file.strip_prefix('+') {
            pending_goto = Some(rest.to_string());
            continue;
        }
        if let Some(script) = file.strip_prefix('@') {
            run_script_file(ed, term, std::path::Path::new(script));
            continue;
        }
        if file == "-" {
            if let Err(err) = read_stdin_buffer(ed) {
                ed.session.msg.post(Severity::OsError, err.to_string(), false);
            }
            continue;
        }
        let result =
            ed.call_named(term, "findFile", None, vec![core_exec::Datum::str(file)]);
        if let Err(st) = result {
            ed.session.msg.post_status(&st);
            continue;
        }
        if let Some(delim) = &args.input_delim {
            let delim = delim.replace("\\r", "\r").replace("\\n", "\n");
            let final_delim = ed.session.buffers.current().final_delim();
            ed.session
                .buffers
                .current_mut()
                .set_file_delim(delim.into_bytes(), final_delim);
        }
        if let Some(spec) = pending_goto.take() {
            goto_spec(ed, term, &spec);
        }
    }

    // Switches that act on the first (current) file.
    if args.read_only && !args.read_write {
        ed.session.buffers.current_mut().set_flag(BufFlags::READ_ONLY, true);
    }
    if let Some(list) = &args.buf_modes {
        apply_mode_list(ed, term, list, ModeScope::Buffer);
    }
    if let Some(list) = &args.global_modes {
        apply_mode_list(ed, term, list, ModeScope::Global);
    }
    if let Some(spec) = &args.goto {
        goto_spec(ed, term, spec);
    }
    if let Some(pattern) = &args.search {
        let result =
            ed.call_named(term, "searchForw", None, vec![core_exec::Datum::str(pattern)]);
        if let Err(st) = result {
            ed.session.msg.post_status(&st);
        }
    }
    if let Some(script) = &args.script {
        run_script_file(ed, term, script);
    }
    for expr in &args.eval {
        if let Err(st) = ed.run_script(term, expr) {
            ed.session.msg.post_status(&st);
        }
    }
}

fn goto_spec(ed: &mut Editor, term: &mut dyn Term, spec: &str) {
    let (line, col) = match spec.split_once(':') {
        Some((line, col)) => (line, col.parse::<usize>().unwrap_or(0)),
        None => (spec, 0),
    };
    let Ok(line) = line.parse::<i64>() else {
        ed.session.msg.post(Severity::Failure, format!("Invalid line spec '{spec}'"), false);
        return;
    };
    if let Err(st) = ed.call_named(term, "gotoLine", Some(line), Vec::new()) {
        ed.session.msg.post_status(&st);
        return;
    }
    if col > 0 {
        let _ = ed.session.buffers.current_mut().core.point_move(col as i64 - 1);
    }
}

fn run_script_file(ed: &mut Editor, term: &mut dyn Term, path: &std::path::Path) {
    match std::fs::read_to_string(path) {
        Ok(src) => {
            if let Err(st) = ed.run_script(term, &src) {
                ed.session.msg.post_status(&st);
            }
        }
        Err(err) => {
            ed.session
                .msg
                .post(Severity::OsError, format!("{}: {err}", path.display()), false);
        }
    }
}

fn main() {
    let args = Args::parse();
    if args.show_version {
        println!("ember {}", env!("CARGO_PKG_VERSION"));
        return;
    }
    if args.show_license {
        println!("ember {} - GPLv3", env!("CARGO_PKG_VERSION"));
        return;
    }
    let _log_guard = init_logging();
    let code = match run(&args) {
        Ok(code) => code,
        Err(err) => {
            error!(error = %err, "fatal");
            eprintln!("ember: {err}");
            255
        }
    };
    std::process::exit(code);
}

fn run(args: &Args) -> Result<i32> {
    let config = match &args.config_path {
        Some(path) => Config::load(path)?,
        None => Config::load_default(),
    };
    let mut ed = Editor::new(config);
    let mut term = CrosstermTerm::new();
    term.open()?;
    info!(target: "startup", "editor up");

    startup(&mut ed, &mut term, args);

    let mut view = View::default();
    let status = dispatcher::run_loop(&mut ed, &mut term, &mut |ed, term| {
        render(ed, term, &mut view);
    });
    term.close()?;

    let code = match status.severity() {
        Severity::UserExit | Severity::HelpExit => 0,
        Severity::ScriptExit => 255,
        other => {
            if let Some(msg) = status.message() {
                eprintln!("ember: {msg}");
            }
            info!(target: "startup", ?other, "abnormal exit");
            255
        }
    };
    Ok(code)
}
