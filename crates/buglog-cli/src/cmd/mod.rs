pub mod bug;
pub mod init;
pub mod pull;
pub mod user;

use anyhow::{Context as _, bail};
use buglog_core::store::FsRepo;
use chrono::{DateTime, Utc};
use std::io::{self, BufRead, Write};
use std::path::Path;

/// Open the repository that contains `cwd`.
pub fn open_repo(cwd: &Path) -> anyhow::Result<FsRepo> {
    Ok(FsRepo::open(cwd)?)
}

pub fn now() -> i64 {
    Utc::now().timestamp()
}

pub fn format_time(unix: i64) -> String {
    DateTime::<Utc>::from_timestamp(unix, 0)
        .map_or_else(|| unix.to_string(), |ts| ts.format("%Y-%m-%d %H:%M:%S UTC").to_string())
}

/// Ask for a value on stderr and read one line of stdin.
///
/// An empty answer (or end of input) yields `default`, or an empty string.
pub fn prompt(label: &str, default: Option<&str>) -> anyhow::Result<String> {
    let answer = ask(&mut io::stdin().lock(), &mut io::stderr().lock(), label, default)?;
    Ok(answer
        .filter(|a| !a.is_empty())
        .unwrap_or_else(|| default.unwrap_or_default().to_string()))
}

/// Like [`prompt`], but ask again until the answer is not empty.
///
/// A non-empty `default` is accepted as an answer. Fails at end of input.
pub fn prompt_required(label: &str, default: Option<&str>) -> anyhow::Result<String> {
    required_answer(&mut io::stdin().lock(), &mut io::stderr().lock(), label, default)
}

fn required_answer<R: BufRead, W: Write>(
    input: &mut R,
    out: &mut W,
    label: &str,
    default: Option<&str>,
) -> anyhow::Result<String> {
    let default = default.filter(|d| !d.trim().is_empty());
    loop {
        let Some(answer) = ask(input, out, label, default)? else {
            bail!("no value given for {label}");
        };
        if !answer.is_empty() {
            return Ok(answer);
        }
        if let Some(d) = default {
            return Ok(d.to_string());
        }
        writeln!(out, "{label} is required.")?;
    }
}

/// One question. `None` means the input is exhausted.
fn ask<R: BufRead, W: Write>(
    input: &mut R,
    out: &mut W,
    label: &str,
    default: Option<&str>,
) -> anyhow::Result<Option<String>> {
    match default {
        Some(d) => write!(out, "{label} [{d}]: ")?,
        None => write!(out, "{label}: ")?,
    }
    out.flush()?;

    let mut line = String::new();
    let read = input
        .read_line(&mut line)
        .with_context(|| format!("failed to read {label}"))?;
    if read == 0 {
        return Ok(None);
    }
    Ok(Some(line.trim().to_string()))
}
