//! File-I/O collaborator.
//!
//! Reading sniffs the line delimiter (whichever of `\r\n`, `\r`, `\n`
//! appears first) and reports whether the file ended with it, so an
//! unchanged buffer writes back byte-identical. Safe-save writes a
//! uniquely named temporary in the target directory and renames it over
//! the original; backup renames the original aside first.

use core_status::{Outcome, Status};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;

/// A decoded file.
#[derive(Debug, PartialEq, Eq)]
pub struct FileContents {
    pub lines: Vec<Vec<u8>>,
    /// Delimiter found on read; empty when the file had a single line
    /// fragment (writes then default to `\n`).
    pub delim: Vec<u8>,
    /// Whether the file ended with the delimiter.
    pub final_delim: bool,
}

fn os_err(err: std::io::Error, path: &Path) -> Status {
    Status::os_error(format!("{}: {err}", path.display()))
}

/// Read and decode a file.
pub fn read_file(path: &Path) -> Outcome<FileContents> {
    let bytes = std::fs::read(path).map_err(|err| os_err(err, path))?;
    Ok(decode(&bytes))
}

/// Split raw bytes on the first line delimiter style found.
pub fn decode(bytes: &[u8]) -> FileContents {
    let delim: &[u8] = match bytes.iter().position(|&c| c == b'\r' || c == b'\n') {
        Some(at) if bytes[at] == b'\n' => b"\n",
        Some(at) if bytes.get(at + 1) == Some(&b'\n') => b"\r\n",
        Some(_) => b"\r",
        None => {
            return FileContents {
                lines: vec![bytes.to_vec()],
                delim: Vec::new(),
                final_delim: false,
            };
        }
    };
    let mut lines: Vec<Vec<u8>> = Vec::new();
    let mut rest = bytes;
    while let Some(at) = find(rest, delim) {
        lines.push(rest[..at].to_vec());
        rest = &rest[at + delim.len()..];
    }
    let final_delim = rest.is_empty();
    if !final_delim {
        lines.push(rest.to_vec());
    }
    if lines.is_empty() {
        lines.push(Vec::new());
    }
    FileContents { lines, delim: delim.to_vec(), final_delim }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

/// Write modes for [`write_file`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    Create,
    Append,
}

pub fn write_file(path: &Path, bytes: &[u8], mode: WriteMode) -> Outcome<()> {
    let mut options = std::fs::OpenOptions::new();
    match mode {
        WriteMode::Create => options.write(true).create(true).truncate(true),
        WriteMode::Append => options.append(true).create(true),
    };
    let mut file = options.open(path).map_err(|err| os_err(err, path))?;
    file.write_all(bytes).map_err(|err| os_err(err, path))?;
    debug!(target: "io.file", path = %path.display(), bytes = bytes.len(), "write");
    Ok(())
}

fn temp_name(path: &Path) -> PathBuf {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map_or(0, |d| d.subsec_nanos());
    let pid = std::process::id();
    let name = format!(".em{pid:x}{nanos:x}");
    path.parent().unwrap_or_else(|| Path::new(".")).join(name)
}

/// Write through a temporary in the same directory, then rename over the
/// target.
pub fn safe_write(path: &Path, bytes: &[u8]) -> Outcome<()> {
    let temp = temp_name(path);
    write_file(&temp, bytes, WriteMode::Create)?;
    std::fs::rename(&temp, path).map_err(|err| {
        let _ = std::fs::remove_file(&temp);
        os_err(err, path)
    })
}

/// Rename the original aside (once; an existing backup is left alone),
/// then write the target.
pub fn backup_write(path: &Path, bytes: &[u8], backup_ext: &str) -> Outcome<()> {
    if path.exists() {
        let mut backup = path.as_os_str().to_owned();
        backup.push(backup_ext);
        let backup = PathBuf::from(backup);
        if !backup.exists() {
            std::fs::rename(path, &backup).map_err(|err| os_err(err, path))?;
            debug!(target: "io.file", backup = %backup.display(), "backup");
        }
    }
    write_file(path, bytes, WriteMode::Create)
}

/// Run a shell command, feeding `input` when given, and capture stdout.
pub fn pipe(command: &str, input: Option<&[u8]>) -> Outcome<Vec<u8>> {
    use std::process::{Command, Stdio};
    let mut child = Command::new("sh")
        .arg("-c")
        .arg(command)
        .stdin(if input.is_some() { Stdio::piped() } else { Stdio::null() })
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .map_err(|err| Status::os_error(format!("sh: {err}")))?;
    if let Some(input) = input {
        let mut stdin = child.stdin.take().expect("piped stdin");
        stdin.write_all(input).map_err(|err| Status::os_error(err.to_string()))?;
    }
    let output =
        child.wait_with_output().map_err(|err| Status::os_error(err.to_string()))?;
    if !output.status.success() {
        return Err(Status::failure(format!("Command failed: {command}")));
    }
    Ok(output.stdout)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_unix() {
        let fc = decode(b"one\ntwo\n");
        assert_eq!(fc.lines, vec![b"one".to_vec(), b"two".to_vec()]);
        assert_eq!(fc.delim, b"\n");
        assert!(fc.final_delim);
    }

    #[test]
    fn decode_without_final_delimiter() {
        let fc = decode(b"one\ntwo");
        assert_eq!(fc.lines.len(), 2);
        assert!(!fc.final_delim);
    }

    #[test]
    fn decode_dos_and_mac() {
        let fc = decode(b"a\r\nb\r\n");
        assert_eq!(fc.delim, b"\r\n");
        assert_eq!(fc.lines, vec![b"a".to_vec(), b"b".to_vec()]);
        let fc = decode(b"a\rb");
        assert_eq!(fc.delim, b"\r");
        assert_eq!(fc.lines.len(), 2);
    }

    #[test]
    fn decode_fragment() {
        let fc = decode(b"solo");
        assert_eq!(fc.lines, vec![b"solo".to_vec()]);
        assert!(fc.delim.is_empty());
        assert!(!fc.final_delim);
    }

    #[test]
    fn read_write_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t.txt");
        write_file(&path, b"alpha\nbeta\n", WriteMode::Create).unwrap();
        let fc = read_file(&path).unwrap();
        assert_eq!(fc.lines.len(), 2);
        assert!(fc.final_delim);
        write_file(&path, b"gamma\n", WriteMode::Append).unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"alpha\nbeta\ngamma\n");
    }

    #[test]
    fn safe_write_replaces_atomically() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t.txt");
        std::fs::write(&path, b"old").unwrap();
        safe_write(&path, b"new").unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"new");
        // No stray temporaries left behind.
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn backup_keeps_first_original() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t.txt");
        std::fs::write(&path, b"v1").unwrap();
        backup_write(&path, b"v2", ".bak").unwrap();
        backup_write(&path, b"v3", ".bak").unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"v3");
        assert_eq!(std::fs::read(dir.path().join("t.txt.bak")).unwrap(), b"v1");
    }

    #[test]
    fn pipe_round_trip() {
        let out = pipe("cat", Some(b"hello")).unwrap();
        assert_eq!(out, b"hello");
        let out = pipe("echo ok", None).unwrap();
        assert_eq!(out, b"ok\n");
        assert!(pipe("exit 3", None).is_err());
    }
}
