//! `bl bug`: create, list, show and edit bugs.
//!
//! Every mutating subcommand resolves the bug by id prefix, then derives,
//! validates and commits its operation under the bug's write lock.

use crate::cmd::{format_time, now, open_repo};
use crate::output::{OutputMode, pretty_kv, pretty_rule, pretty_section, render};
use buglog_core::bug::ops;
use buglog_core::bug::{LabelChangeResult, OpsError};
use buglog_core::snapshot::{Snapshot, Status, TimelineItem};
use buglog_core::store::{FsRepo, StoreError};
use buglog_core::{Bug, Id, Identity};
use clap::{Args, Subcommand};
use serde::Serialize;
use std::io::{self, Write};
use std::path::Path;

#[derive(Args, Debug)]
pub struct BugArgs {
    #[command(subcommand)]
    pub command: BugCommand,
}

#[derive(Subcommand, Debug)]
pub enum BugCommand {
    #[command(about = "Open a new bug")]
    New(NewArgs),

    #[command(about = "List bugs")]
    Ls(LsArgs),

    #[command(about = "Show a bug with its full timeline")]
    Show(TargetArgs),

    #[command(about = "Rename a bug")]
    Title(TitleArgs),

    #[command(about = "Add a comment")]
    Comment(CommentArgs),

    #[command(
        about = "Replace the message of a comment",
        after_help = "EXAMPLES:\n    # Comment ids are shown by `bl bug show`\n    bl bug edit-comment 3f2a 3c81 \"Corrected reproduction steps\""
    )]
    EditComment(EditCommentArgs),

    #[command(about = "Reopen a closed bug")]
    Open(TargetArgs),

    #[command(about = "Close a bug")]
    Close(TargetArgs),

    #[command(
        about = "Add or remove labels",
        after_help = "EXAMPLES:\n    # Add two labels and drop one\n    bl bug label 3f2a ui crash --remove triage"
    )]
    Label(LabelArgs),
}

#[derive(Args, Debug)]
pub struct NewArgs {
    #[arg(long, short)]
    pub title: String,

    /// Opening message.
    #[arg(long, short, default_value = "")]
    pub message: String,
}

#[derive(Args, Debug)]
pub struct LsArgs {
    /// Only show bugs with this status (`open` or `closed`).
    #[arg(long)]
    pub status: Option<String>,

    /// Only show bugs carrying this label.
    #[arg(long)]
    pub label: Option<String>,
}

#[derive(Args, Debug)]
pub struct TargetArgs {
    /// Bug id or unique prefix.
    pub id: String,
}

#[derive(Args, Debug)]
pub struct TitleArgs {
    pub id: String,
    pub title: String,
}

#[derive(Args, Debug)]
pub struct CommentArgs {
    pub id: String,
    pub message: String,
}

#[derive(Args, Debug)]
pub struct EditCommentArgs {
    /// Bug id or unique prefix.
    pub id: String,
    /// Comment id prefix, as shown by `bl bug show`.
    pub comment: String,
    pub message: String,
}

#[derive(Args, Debug)]
pub struct LabelArgs {
    pub id: String,

    /// Labels to add.
    pub add: Vec<String>,

    /// Labels to remove.
    #[arg(long = "remove", short = 'r')]
    pub remove: Vec<String>,
}

#[derive(Debug, Serialize)]
struct BugRow {
    id: String,
    title: String,
    status: Status,
    labels: Vec<String>,
    author: String,
    comments: usize,
    created_at: i64,
    edited_at: i64,
}

impl From<&Snapshot> for BugRow {
    fn from(snap: &Snapshot) -> Self {
        Self {
            id: snap.id.to_string(),
            title: snap.title.clone(),
            status: snap.status,
            labels: snap.labels.iter().cloned().collect(),
            author: snap.author.display_name(),
            comments: snap.comments.len(),
            created_at: snap.created_at,
            edited_at: snap.edited_at,
        }
    }
}

#[derive(Debug, Serialize)]
struct BrokenBug {
    id: String,
    error: String,
}

#[derive(Debug, Serialize)]
struct BugList {
    bugs: Vec<BugRow>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    broken: Vec<BrokenBug>,
}

#[derive(Debug, Serialize)]
struct HistoryView {
    editor: Option<String>,
    message: String,
    unix_time: i64,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum TimelineView {
    Comment {
        id: String,
        author: String,
        message: String,
        created_at: i64,
        edited: bool,
        history: Vec<HistoryView>,
    },
    SetTitle {
        id: String,
        author: String,
        unix_time: i64,
        title: String,
        was: String,
    },
    SetStatus {
        id: String,
        author: String,
        unix_time: i64,
        status: Status,
    },
    LabelChange {
        id: String,
        author: String,
        unix_time: i64,
        added: Vec<String>,
        removed: Vec<String>,
    },
}

impl From<&TimelineItem> for TimelineView {
    fn from(item: &TimelineItem) -> Self {
        match item {
            TimelineItem::Create(c) | TimelineItem::AddComment(c) => Self::Comment {
                id: c.id().key(),
                author: c.author.display_name(),
                message: c.message.clone(),
                created_at: c.created_at,
                edited: c.edited(),
                history: c
                    .history
                    .iter()
                    .map(|step| HistoryView {
                        editor: step.editor.as_ref().map(Identity::display_name),
                        message: step.message.clone(),
                        unix_time: step.unix_time,
                    })
                    .collect(),
            },
            TimelineItem::SetTitle(t) => Self::SetTitle {
                id: t.id.key(),
                author: t.author.display_name(),
                unix_time: t.unix_time,
                title: t.title.clone(),
                was: t.was.clone(),
            },
            TimelineItem::SetStatus(s) => Self::SetStatus {
                id: s.id.key(),
                author: s.author.display_name(),
                unix_time: s.unix_time,
                status: s.status,
            },
            TimelineItem::LabelChange(l) => Self::LabelChange {
                id: l.id.key(),
                author: l.author.display_name(),
                unix_time: l.unix_time,
                added: l.added.clone(),
                removed: l.removed.clone(),
            },
        }
    }
}

#[derive(Debug, Serialize)]
struct BugView {
    #[serde(flatten)]
    row: BugRow,
    actors: Vec<String>,
    participants: Vec<String>,
    timeline: Vec<TimelineView>,
}

impl From<&Snapshot> for BugView {
    fn from(snap: &Snapshot) -> Self {
        Self {
            row: BugRow::from(snap),
            actors: snap.actors.iter().map(Identity::display_name).collect(),
            participants: snap.participants.iter().map(Identity::display_name).collect(),
            timeline: snap.timeline.iter().map(TimelineView::from).collect(),
        }
    }
}

#[derive(Debug, Serialize)]
struct MutationOutput {
    ok: bool,
    bug: String,
    op: String,
}

#[derive(Debug, Serialize)]
struct LabelOutput {
    bug: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    op: Option<String>,
    results: Vec<LabelChangeResult>,
}

pub fn run_bug(args: &BugArgs, output: OutputMode, cwd: &Path) -> anyhow::Result<()> {
    let repo = open_repo(cwd)?;
    match &args.command {
        BugCommand::New(a) => run_new(&repo, a, output),
        BugCommand::Ls(a) => run_ls(&repo, a, output),
        BugCommand::Show(a) => run_show(&repo, a, output),
        BugCommand::Title(a) => mutate(&repo, &a.id, output, |bug, me| {
            ops::set_title(bug, me, now(), &a.title)
        }),
        BugCommand::Comment(a) => mutate(&repo, &a.id, output, |bug, me| {
            ops::add_comment(bug, me, now(), &a.message, vec![])
        }),
        BugCommand::EditComment(a) => run_edit_comment(&repo, a, output),
        BugCommand::Open(a) => mutate(&repo, &a.id, output, |bug, me| ops::open(bug, me, now())),
        BugCommand::Close(a) => mutate(&repo, &a.id, output, |bug, me| ops::close(bug, me, now())),
        BugCommand::Label(a) => run_label(&repo, a, output),
    }
}

fn run_new(repo: &FsRepo, args: &NewArgs, output: OutputMode) -> anyhow::Result<()> {
    let me = repo.require_user()?;
    let (mut bug, create) = ops::create(&me, now(), &args.title, &args.message, vec![])?;
    repo.commit(&mut bug)?;
    tracing::info!(bug = %create.id().human(), "bug created");

    let result = MutationOutput {
        ok: true,
        bug: create.id().to_string(),
        op: create.id().to_string(),
    };
    render(output, &result, |r, w| {
        if output.is_pretty() {
            writeln!(w, "Created bug {}: {}", &r.bug[..8], args.title)
        } else {
            writeln!(w, "{}", r.bug)
        }
    })
}

fn run_ls(repo: &FsRepo, args: &LsArgs, output: OutputMode) -> anyhow::Result<()> {
    let status = args
        .status
        .as_deref()
        .map(str::parse::<Status>)
        .transpose()
        .map_err(|e| anyhow::anyhow!("unknown status '{}'", e.0))?;

    let mut list = BugList {
        bugs: Vec::new(),
        broken: Vec::new(),
    };
    for id in repo.list_bugs()? {
        let compiled = repo
            .load_bug(&id)
            .map_err(anyhow::Error::from)
            .and_then(|bug| Ok(bug.compile()?));
        match compiled {
            Ok(snap) => {
                if status.is_some_and(|s| s != snap.status) {
                    continue;
                }
                if args.label.as_deref().is_some_and(|l| !snap.has_label(l)) {
                    continue;
                }
                list.bugs.push(BugRow::from(&snap));
            }
            Err(e) => {
                tracing::warn!(bug = %id.human(), error = %e, "skipping unreadable bug");
                list.broken.push(BrokenBug {
                    id: id.to_string(),
                    error: format!("{e:#}"),
                });
            }
        }
    }
    list.bugs.sort_by(|a, b| b.edited_at.cmp(&a.edited_at).then_with(|| a.id.cmp(&b.id)));

    render(output, &list, |list, w| {
        for row in &list.bugs {
            let labels = if row.labels.is_empty() {
                String::new()
            } else {
                format!(" [{}]", row.labels.join(", "))
            };
            writeln!(w, "{}\t{}\t{}{labels}", &row.id[..8], row.status, row.title)?;
        }
        if output.is_pretty() && list.bugs.is_empty() {
            writeln!(w, "No bugs.")?;
        }
        for broken in &list.broken {
            let mut err = io::stderr().lock();
            writeln!(err, "warning: bug {} is unreadable: {}", &broken.id[..8], broken.error)?;
        }
        Ok(())
    })
}

fn load_snapshot(repo: &FsRepo, prefix: &str) -> anyhow::Result<(Id, Snapshot)> {
    let id = repo.resolve_bug_prefix(prefix)?;
    let snap = repo.load_bug(&id)?.compile()?;
    Ok((id, snap))
}

fn run_show(repo: &FsRepo, args: &TargetArgs, output: OutputMode) -> anyhow::Result<()> {
    let (_, snap) = load_snapshot(repo, &args.id)?;
    let view = BugView::from(&snap);

    render(output, &view, |view, w| {
        let row = &view.row;
        if output.is_pretty() {
            pretty_section(w, &format!("{} {}", &row.id[..8], row.title))?;
        } else {
            writeln!(w, "{} {}", row.id, row.title)?;
        }
        pretty_kv(w, "Status", row.status.as_str())?;
        pretty_kv(w, "Author", &row.author)?;
        pretty_kv(w, "Created", format_time(row.created_at))?;
        pretty_kv(w, "Edited", format_time(row.edited_at))?;
        if !row.labels.is_empty() {
            pretty_kv(w, "Labels", row.labels.join(", "))?;
        }
        pretty_kv(w, "Actors", view.actors.join(", "))?;
        writeln!(w)?;

        for item in &view.timeline {
            match item {
                TimelineView::Comment {
                    id,
                    author,
                    message,
                    created_at,
                    edited,
                    ..
                } => {
                    if output.is_pretty() {
                        pretty_rule(w)?;
                    }
                    let edited = if *edited { " (edited)" } else { "" };
                    writeln!(w, "#{} {author} at {}{edited}", &id[..8], format_time(*created_at))?;
                    if message.trim().is_empty() {
                        writeln!(w, "    (blank)")?;
                    }
                    for line in message.lines() {
                        writeln!(w, "    {line}")?;
                    }
                }
                TimelineView::SetTitle {
                    author, title, was, ..
                } => writeln!(w, "* {author} renamed \"{was}\" to \"{title}\"")?,
                TimelineView::SetStatus { author, status, .. } => {
                    let verb = match status {
                        Status::Open => "reopened",
                        Status::Closed => "closed",
                    };
                    writeln!(w, "* {author} {verb} the bug")?;
                }
                TimelineView::LabelChange {
                    author,
                    added,
                    removed,
                    ..
                } => {
                    if !added.is_empty() {
                        writeln!(w, "* {author} added labels {}", added.join(", "))?;
                    }
                    if !removed.is_empty() {
                        writeln!(w, "* {author} removed labels {}", removed.join(", "))?;
                    }
                }
            }
        }
        Ok(())
    })
}

/// Resolve the bug and the current user, then run `f` under the bug's
/// write lock and commit the operation it appends.
fn mutate(
    repo: &FsRepo,
    prefix: &str,
    output: OutputMode,
    f: impl FnOnce(&mut Bug, &Identity) -> Result<buglog_core::Operation, OpsError>,
) -> anyhow::Result<()> {
    let me = repo.require_user()?;
    let id = repo.resolve_bug_prefix(prefix)?;
    let op = repo.update_bug(&id, |bug| -> Result<_, StoreError> { Ok(f(bug, &me)?) })?;
    tracing::info!(
        bug = %id.human(),
        op = %op.id().human(),
        kind = %op.kind(),
        "operation committed"
    );

    let result = MutationOutput {
        ok: true,
        bug: id.to_string(),
        op: op.id().to_string(),
    };
    render(output, &result, |r, w| {
        if output.is_pretty() {
            writeln!(w, "Updated bug {} ({})", &r.bug[..8], op.kind())
        } else {
            writeln!(w, "{}", r.op)
        }
    })
}

fn run_edit_comment(
    repo: &FsRepo,
    args: &EditCommentArgs,
    output: OutputMode,
) -> anyhow::Result<()> {
    let (_, snap) = load_snapshot(repo, &args.id)?;
    let target = match snap.comments_with_prefix(&args.comment).as_slice() {
        [one] => one.id.op().clone(),
        [] => anyhow::bail!("no comment of bug {} matches '{}'", snap.human_id(), args.comment),
        many => anyhow::bail!(
            "comment prefix '{}' matches {} comments; use a longer prefix",
            args.comment,
            many.len()
        ),
    };
    mutate(repo, &args.id, output, |bug, me| {
        ops::edit_comment(bug, me, now(), &target, &args.message, vec![])
    })
}

fn run_label(repo: &FsRepo, args: &LabelArgs, output: OutputMode) -> anyhow::Result<()> {
    if args.add.is_empty() && args.remove.is_empty() {
        anyhow::bail!("nothing to do: name labels to add, or --remove labels");
    }
    let me = repo.require_user()?;
    let id = repo.resolve_bug_prefix(&args.id)?;
    let outcome = repo.update_bug(&id, |bug| -> Result<_, StoreError> {
        Ok(ops::change_labels(bug, &me, now(), args.add.as_slice(), args.remove.as_slice())?)
    })?;

    let result = LabelOutput {
        bug: id.to_string(),
        op: outcome.op.as_ref().map(|op| op.id().to_string()),
        results: outcome.results,
    };
    render(output, &result, |r, w| {
        for change in &r.results {
            writeln!(w, "{change}")?;
        }
        Ok(())
    })
}
