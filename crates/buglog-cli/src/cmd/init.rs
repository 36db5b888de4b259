use crate::output::{OutputMode, render};
use buglog_core::store::FsRepo;
use serde::Serialize;
use std::path::Path;

#[derive(Debug, Serialize)]
struct InitOutput {
    ok: bool,
    root: String,
}

/// Execute `bl init`. Re-running it in an initialized directory is harmless.
pub fn run_init(output: OutputMode, cwd: &Path) -> anyhow::Result<()> {
    let repo = FsRepo::init(cwd)?;
    let result = InitOutput {
        ok: true,
        root: repo.root().display().to_string(),
    };
    render(output, &result, |r, w| {
        writeln!(w, "Initialized buglog repository in {}/.buglog", r.root)
    })
}
