//! Line-oriented filesystem scripts.
//!
//! ```text
//! # comment
//! mkdirs /logs/2024
//! write  /logs/2024/boot.txt booted\n
//! append /logs/2024/boot.txt wifi up\n
//! cat    /logs/2024/boot.txt
//! ls     /logs
//! mv     /logs/2024 /logs/archive
//! df
//! ```
//!
//! Text arguments run to the end of the line; `\n`, `\t` and `\\` are
//! unescaped.

use std::io::Write;
use std::str::FromStr;

use anyhow::{Context, Result, bail};
use strum::{Display, EnumString};
use tracing::{info, warn};
use xramfs_kernel::{Engine, FileType, FsError, OpenMode, StatFs};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
enum Verb {
    Write,
    Append,
    Cat,
    Ls,
    Mkdir,
    Mkdirs,
    Rmdir,
    Rm,
    Mv,
    Stat,
    Df,
    Format,
}

/// One parsed script line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Write { path: String, data: Vec<u8> },
    Append { path: String, data: Vec<u8> },
    Cat(String),
    Ls(String),
    Mkdir(String),
    Mkdirs(String),
    Rmdir(String),
    Rm(String),
    Mv { from: String, to: String },
    Stat(String),
    Df,
    Format,
}

fn unescape(text: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            let mut buf = [0u8; 4];
            out.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
            continue;
        }
        match chars.next() {
            Some('n') => out.push(b'\n'),
            Some('t') => out.push(b'\t'),
            Some('\\') => out.push(b'\\'),
            Some(other) => {
                out.push(b'\\');
                let mut buf = [0u8; 4];
                out.extend_from_slice(other.encode_utf8(&mut buf).as_bytes());
            }
            None => out.push(b'\\'),
        }
    }
    out
}

/// Parse one line. Blank lines and comments yield `None`.
pub fn parse_line(line: &str) -> Result<Option<Command>> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }

    let (word, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
    let rest = rest.trim_start();
    let verb = Verb::from_str(word).with_context(|| format!("unknown command {word:?}"))?;

    let path_arg = |rest: &str| -> Result<String> {
        match rest.split_whitespace().collect::<Vec<_>>().as_slice() {
            [path] => Ok((*path).to_string()),
            _ => bail!("{verb} takes exactly one path"),
        }
    };
    let path_and_text = |rest: &str| -> Result<(String, Vec<u8>)> {
        let (path, text) = rest.split_once(char::is_whitespace).unwrap_or((rest, ""));
        if path.is_empty() {
            bail!("{verb} needs a path");
        }
        Ok((path.to_string(), unescape(text.trim_start())))
    };

    let command = match verb {
        Verb::Write => {
            let (path, data) = path_and_text(rest)?;
            Command::Write { path, data }
        }
        Verb::Append => {
            let (path, data) = path_and_text(rest)?;
            Command::Append { path, data }
        }
        Verb::Cat => Command::Cat(path_arg(rest)?),
        Verb::Ls if rest.is_empty() => Command::Ls("/".to_string()),
        Verb::Ls => Command::Ls(path_arg(rest)?),
        Verb::Mkdir => Command::Mkdir(path_arg(rest)?),
        Verb::Mkdirs => Command::Mkdirs(path_arg(rest)?),
        Verb::Rmdir => Command::Rmdir(path_arg(rest)?),
        Verb::Rm => Command::Rm(path_arg(rest)?),
        Verb::Mv => match rest.split_whitespace().collect::<Vec<_>>().as_slice() {
            [from, to] => Command::Mv {
                from: (*from).to_string(),
                to: (*to).to_string(),
            },
            _ => bail!("mv takes a source and a destination"),
        },
        Verb::Stat => Command::Stat(path_arg(rest)?),
        Verb::Df if rest.is_empty() => Command::Df,
        Verb::Format if rest.is_empty() => Command::Format,
        Verb::Df | Verb::Format => bail!("{verb} takes no arguments"),
    };
    Ok(Some(command))
}

/// Print filesystem usage.
pub fn print_statfs(out: &mut impl Write, st: &StatFs) -> Result<()> {
    let total = if st.total_bytes == 0 {
        "unlimited".to_string()
    } else {
        st.total_bytes.to_string()
    };
    writeln!(
        out,
        "total={total} used={} block={} files={} dirs={} max_items={}{}",
        st.used_bytes,
        st.block_size,
        st.files,
        st.dirs,
        st.max_items,
        if st.degraded { " DEGRADED" } else { "" }
    )?;
    Ok(())
}

fn append(fs: &mut Engine, path: &str, data: &[u8]) -> Result<(), FsError> {
    let handle = fs.open(path, OpenMode::WriteAppend)?;
    let written = fs.write(handle, data);
    fs.close(handle)?;
    written.map(|_| ())
}

/// Run one command, printing its output.
pub fn execute(fs: &mut Engine, command: &Command, out: &mut impl Write) -> Result<()> {
    match command {
        Command::Write { path, data } => fs.write_all(path, data)?,
        Command::Append { path, data } => append(fs, path, data)?,
        Command::Cat(path) => {
            let data = fs.read_all(path)?;
            out.write_all(&data)?;
        }
        Command::Ls(path) => {
            for entry in fs.list_dir(path)? {
                match entry.kind() {
                    FileType::Directory => writeln!(out, "{}/", entry.name)?,
                    FileType::File => writeln!(out, "{}", entry.name)?,
                }
            }
        }
        Command::Mkdir(path) => {
            fs.mkdir(path)?;
        }
        Command::Mkdirs(path) => {
            fs.mkdir_all(path)?;
        }
        Command::Rmdir(path) => fs.rmdir(path)?,
        Command::Rm(path) => fs.unlink(path)?,
        Command::Mv { from, to } => fs.rename(from, to)?,
        Command::Stat(path) => {
            let attr = fs.stat(path)?;
            writeln!(
                out,
                "{} {} size={} capacity={} blocks={}",
                attr.kind(),
                attr.path,
                attr.size,
                attr.capacity,
                attr.blocks
            )?;
        }
        Command::Df => print_statfs(out, &fs.statfs())?,
        Command::Format => fs.format()?,
    }
    Ok(())
}

/// Outcome of a script run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Summary {
    pub executed: usize,
    pub failed: usize,
}

/// Parse and run a whole script. Parse errors always abort; command
/// failures abort unless `keep_going` is set.
pub fn run(
    fs: &mut Engine,
    script: &str,
    keep_going: bool,
    out: &mut impl Write,
) -> Result<Summary> {
    let mut summary = Summary::default();
    for (idx, line) in script.lines().enumerate() {
        let lineno = idx + 1;
        let Some(command) = parse_line(line).with_context(|| format!("line {lineno}"))? else {
            continue;
        };
        summary.executed += 1;
        if let Err(e) = execute(fs, &command, out) {
            if !keep_going {
                return Err(e.context(format!("line {lineno}: {}", line.trim())));
            }
            warn!(lineno, error = %e, "command failed");
            writeln!(out, "error: line {lineno}: {e}")?;
            summary.failed += 1;
        }
    }
    info!(executed = summary.executed, failed = summary.failed, "script done");
    Ok(summary)
}
