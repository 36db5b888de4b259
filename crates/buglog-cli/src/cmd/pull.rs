//! `bl pull`: union another replica's bugs and identities into this one.

use crate::cmd::open_repo;
use crate::output::{OutputMode, pretty_kv, pretty_section, render};
use buglog_core::store::FsRepo;
use clap::Args;
use std::path::{Path, PathBuf};

#[derive(Args, Debug)]
pub struct PullArgs {
    /// Path inside the repository to pull from.
    pub remote: PathBuf,
}

pub fn run_pull(args: &PullArgs, output: OutputMode, cwd: &Path) -> anyhow::Result<()> {
    let mut repo = open_repo(cwd)?;
    let remote_path = if args.remote.is_absolute() {
        args.remote.clone()
    } else {
        cwd.join(&args.remote)
    };
    let remote = FsRepo::open(&remote_path)?;
    let report = repo.pull(&remote)?;

    render(output, &report, |r, w| {
        if output.is_pretty() {
            pretty_section(w, "Pull")?;
            pretty_kv(w, "New bugs", r.new_bugs.len().to_string())?;
            pretty_kv(w, "Updated", r.updated.len().to_string())?;
            pretty_kv(w, "Unchanged", r.unchanged.to_string())?;
            pretty_kv(w, "Identities", r.identities.to_string())?;
            if !r.skipped.is_empty() {
                pretty_kv(w, "Skipped", r.skipped.len().to_string())?;
            }
            if !r.broken.is_empty() {
                pretty_kv(w, "Unreadable locally", r.broken.len().to_string())?;
            }
            return Ok(());
        }
        for id in &r.new_bugs {
            writeln!(w, "new {}", id.human())?;
        }
        for (id, added) in &r.updated {
            writeln!(w, "updated {} (+{added})", id.human())?;
        }
        for id in &r.skipped {
            writeln!(w, "skipped {}", id.human())?;
        }
        for id in &r.broken {
            writeln!(w, "unreadable {}", id.human())?;
        }
        writeln!(
            w,
            "{} new, {} updated, {} unchanged, {} identities",
            r.new_bugs.len(),
            r.updated.len(),
            r.unchanged,
            r.identities
        )
    })
}
