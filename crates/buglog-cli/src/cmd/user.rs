//! `bl user`: create and inspect identities.

use crate::cmd::{open_repo, prompt, prompt_required};
use crate::output::{OutputMode, pretty_kv, pretty_section, render};
use anyhow::{Context as _, bail};
use buglog_core::config;
use buglog_core::identity::Key;
use buglog_core::{Identity, IdentityHandle, IdentityStore};
use clap::{Args, Subcommand};
use serde::Serialize;
use std::io;
use std::path::{Path, PathBuf};

#[derive(Args, Debug)]
pub struct UserArgs {
    #[command(subcommand)]
    pub command: UserCommand,
}

#[derive(Subcommand, Debug)]
pub enum UserCommand {
    #[command(
        about = "Create a new identity",
        long_about = "Create a new identity. Missing fields are prompted for, with defaults from the [user] config section. The first identity created becomes the current user.",
        after_help = "EXAMPLES:\n    # Interactive\n    bl user create\n\n    # Non-interactive\n    bl user create --name \"Alice\" --email alice@example.com"
    )]
    Create(UserCreateArgs),

    #[command(about = "List identities")]
    Ls,

    #[command(about = "Show an identity (the current user by default)")]
    Show(UserShowArgs),
}

#[derive(Args, Debug)]
pub struct UserCreateArgs {
    #[arg(long)]
    pub name: Option<String>,

    #[arg(long)]
    pub email: Option<String>,

    /// Avatar URL (http or https).
    #[arg(long)]
    pub avatar: Option<String>,

    /// File holding an armored public key to attach, or `-` for stdin.
    #[arg(long)]
    pub key_file: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct UserShowArgs {
    /// Identity id prefix. Defaults to the current user.
    pub id: Option<String>,
}

#[derive(Debug, Serialize)]
struct UserRow {
    id: String,
    name: String,
    email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    login: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    avatar_url: Option<String>,
    keys: usize,
    current: bool,
}

impl UserRow {
    fn new(identity: &Identity, current: Option<&Identity>) -> Self {
        Self {
            id: identity.id().to_string(),
            name: identity.name().to_string(),
            email: identity.email().to_string(),
            login: identity.login().map(str::to_string),
            avatar_url: identity.avatar_url().map(str::to_string),
            keys: identity.keys().len(),
            current: current == Some(identity),
        }
    }
}

#[derive(Debug, Serialize)]
struct UserCreateOutput {
    id: String,
    name: String,
    current: bool,
    /// The armored key that was attached, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    key: Option<String>,
}

pub fn run_user(args: &UserArgs, output: OutputMode, cwd: &Path) -> anyhow::Result<()> {
    match &args.command {
        UserCommand::Create(create) => run_user_create(create, output, cwd),
        UserCommand::Ls => run_user_ls(output, cwd),
        UserCommand::Show(show) => run_user_show(show, output, cwd),
    }
}

fn run_user_create(args: &UserCreateArgs, output: OutputMode, cwd: &Path) -> anyhow::Result<()> {
    let mut repo = open_repo(cwd)?;
    let defaults = config::resolve_config(Some(repo.root()), None)?.identity_defaults();
    let interactive = args.name.is_none() || args.email.is_none();
    let key_from_stdin = args.key_file.as_deref() == Some(Path::new("-"));
    if interactive && key_from_stdin {
        bail!("--key-file - reads stdin, so --name and --email must be given");
    }

    let name = match &args.name {
        Some(name) => name.clone(),
        None => prompt_required("Name", defaults.name.as_deref())?,
    };
    let email = match &args.email {
        Some(email) => email.clone(),
        None => prompt_required("Email", defaults.email.as_deref())?,
    };
    let avatar = match &args.avatar {
        Some(url) => url.clone(),
        None if interactive => prompt("Avatar URL", None)?,
        None => String::new(),
    };

    let mut identity = Identity::new(name, email);
    if !avatar.is_empty() {
        identity = identity.with_avatar_url(avatar);
    }
    let key = args.key_file.as_deref().map(read_key).transpose()?;
    if let Some(armored) = &key {
        identity = identity.with_key(Key::new(armored.clone()));
    }

    let mut handle = IdentityHandle::new(identity);
    handle.commit_as_needed(&mut repo)?;
    let id = handle.identity().id();

    let became_current = !repo.is_user_set()?;
    if became_current {
        repo.set_current_user(&id)?;
    }
    tracing::info!(identity = %id.human(), current = became_current, "identity created");

    let result = UserCreateOutput {
        id: id.to_string(),
        name: handle.identity().name().to_string(),
        current: became_current,
        key,
    };
    render(output, &result, |r, w| {
        if output.is_pretty() {
            writeln!(w, "Created identity {} ({})", r.name, &r.id)?;
            if r.current {
                writeln!(w, "Set as current user.")?;
            }
            if let Some(key) = &r.key {
                writeln!(w, "Attached key:")?;
                writeln!(w, "{}", key.trim_end())?;
            }
            Ok(())
        } else {
            writeln!(w, "{}", r.id)
        }
    })
}

/// Armored key from `path`, or from stdin when `path` is `-`.
fn read_key(path: &Path) -> anyhow::Result<String> {
    if path == Path::new("-") {
        return io::read_to_string(io::stdin()).context("failed to read key from stdin");
    }
    std::fs::read_to_string(path)
        .with_context(|| format!("failed to read key file {}", path.display()))
}

fn run_user_ls(output: OutputMode, cwd: &Path) -> anyhow::Result<()> {
    let repo = open_repo(cwd)?;
    let current = repo.current_user()?;
    let rows: Vec<UserRow> = repo
        .list_identities()?
        .iter()
        .map(|identity| UserRow::new(identity, current.as_ref()))
        .collect();

    render(output, &rows, |rows, w| {
        for row in rows {
            let marker = if row.current { "*" } else { " " };
            writeln!(w, "{marker} {} {} <{}>", &row.id[..8], row.name, row.email)?;
        }
        Ok(())
    })
}

fn run_user_show(args: &UserShowArgs, output: OutputMode, cwd: &Path) -> anyhow::Result<()> {
    let repo = open_repo(cwd)?;
    let current = repo.current_user()?;
    let identity = match &args.id {
        Some(prefix) => repo.resolve_identity_prefix(prefix)?,
        None => repo.require_user()?,
    };
    let row = UserRow::new(&identity, current.as_ref());

    render(output, &row, |row, w| {
        if output.is_pretty() {
            pretty_section(w, &row.name)?;
        }
        pretty_kv(w, "Id", &row.id)?;
        pretty_kv(w, "Name", &row.name)?;
        pretty_kv(w, "Email", &row.email)?;
        if let Some(login) = &row.login {
            pretty_kv(w, "Login", login)?;
        }
        if let Some(url) = &row.avatar_url {
            pretty_kv(w, "Avatar", url)?;
        }
        pretty_kv(w, "Keys", row.keys.to_string())?;
        pretty_kv(w, "Current", if row.current { "yes" } else { "no" })
    })
}
