#![forbid(unsafe_code)]

mod cmd;
mod output;

use buglog_core::config;
use buglog_core::store::FsRepo;
use clap::{Parser, Subcommand};
use output::{CliError, OutputMode, render_error};
use std::env;
use std::path::Path;
use std::process::ExitCode;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "bl: distributed, offline-first bug tracker",
    long_about = None
)]
struct Cli {
    /// Output format (overrides FORMAT and config files).
    #[arg(long, global = true, value_enum)]
    format: Option<OutputMode>,

    /// Shorthand for `--format json`.
    #[arg(long, global = true, hide = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

impl Cli {
    fn format_flag(&self) -> Option<&'static str> {
        if self.json {
            return Some(OutputMode::Json.as_str());
        }
        self.format.map(OutputMode::as_str)
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(
        about = "Initialize a buglog repository",
        long_about = "Create the .buglog/ directory in the current directory.",
        after_help = "EXAMPLES:\n    # Initialize the current directory\n    bl init"
    )]
    Init,

    #[command(
        about = "Manage identities",
        after_help = "EXAMPLES:\n    # Create your identity interactively\n    bl user create\n\n    # List identities\n    bl user ls"
    )]
    User(cmd::user::UserArgs),

    #[command(
        about = "Create, inspect and edit bugs",
        after_help = "EXAMPLES:\n    # Open a bug\n    bl bug new --title \"Crash on start\" --message \"Segfault at launch\"\n\n    # Comment on it using an id prefix\n    bl bug comment 3f2a \"Same here\"\n\n    # Show it as JSON\n    bl bug show 3f2a --format json"
    )]
    Bug(cmd::bug::BugArgs),

    #[command(
        about = "Merge bugs and identities from another repository",
        after_help = "EXAMPLES:\n    # Pull from a peer's checkout\n    bl pull ../peer"
    )]
    Pull(cmd::pull::PullArgs),
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("BUGLOG_LOG").unwrap_or_else(|_| {
        EnvFilter::new(if env::var("DEBUG").is_ok() {
            "buglog=debug,info"
        } else {
            "buglog=info,warn"
        })
    });

    let format = env::var("BUGLOG_LOG_FORMAT").unwrap_or_else(|_| "compact".to_string());

    let registry = tracing_subscriber::registry().with(filter);

    match format.as_str() {
        "json" => {
            registry
                .with(fmt::layer().json().with_ansi(false).with_writer(std::io::stderr))
                .init();
        }
        _ => {
            registry
                .with(fmt::layer().compact().with_writer(std::io::stderr))
                .init();
        }
    }
}

fn resolve_output(cwd: &Path, flag: Option<&str>) -> anyhow::Result<OutputMode> {
    let root = FsRepo::open(cwd).ok().map(|repo| repo.root().to_path_buf());
    let effective = config::resolve_config(root.as_deref(), flag)?;
    Ok(OutputMode::from_resolved(&effective.resolved_output))
}

fn run(cli: &Cli, output: OutputMode, cwd: &Path) -> anyhow::Result<()> {
    match &cli.command {
        Commands::Init => cmd::init::run_init(output, cwd),
        Commands::User(args) => cmd::user::run_user(args, output, cwd),
        Commands::Bug(args) => cmd::bug::run_bug(args, output, cwd),
        Commands::Pull(args) => cmd::pull::run_pull(args, output, cwd),
    }
}

/// Resolves the output mode into `output` before running, so errors are
/// rendered in the mode the command would have used.
fn try_main(cli: &Cli, output: &mut OutputMode) -> anyhow::Result<()> {
    let cwd = env::current_dir()?;
    *output = resolve_output(&cwd, cli.format_flag())?;
    run(cli, *output, &cwd)
}

fn main() -> ExitCode {
    init_tracing();

    let cli = Cli::parse();
    let mut output = if cli.json {
        OutputMode::Json
    } else {
        cli.format.unwrap_or(OutputMode::Text)
    };

    match try_main(&cli, &mut output) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            let _ = render_error(output, &CliError::from_anyhow(&e));
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_flag_parses_after_subcommand() {
        let cli = Cli::parse_from(["bl", "bug", "ls", "--format", "json"]);
        assert_eq!(cli.format_flag(), Some("json"));
    }

    #[test]
    fn json_alias_wins() {
        let cli = Cli::parse_from(["bl", "--json", "--format", "text", "bug", "ls"]);
        assert_eq!(cli.format_flag(), Some("json"));
    }

    #[test]
    fn no_flag_defers_to_config() {
        let cli = Cli::parse_from(["bl", "user", "ls"]);
        assert_eq!(cli.format_flag(), None);
    }

    #[test]
    fn all_subcommands_parse() {
        let subcommands = [
            vec!["bl", "init"],
            vec!["bl", "user", "create", "--name", "Alice", "--email", "a@example.com"],
            vec!["bl", "user", "ls"],
            vec!["bl", "user", "show"],
            vec!["bl", "bug", "new", "--title", "t", "--message", "m"],
            vec!["bl", "bug", "ls"],
            vec!["bl", "bug", "show", "ab"],
            vec!["bl", "bug", "title", "ab", "New title"],
            vec!["bl", "bug", "comment", "ab", "hello"],
            vec!["bl", "bug", "edit-comment", "ab", "cd", "fixed"],
            vec!["bl", "bug", "open", "ab"],
            vec!["bl", "bug", "close", "ab"],
            vec!["bl", "bug", "label", "ab", "ui", "--remove", "p1"],
            vec!["bl", "pull", "../peer"],
        ];
        for args in &subcommands {
            let result = Cli::try_parse_from(args.iter());
            assert!(result.is_ok(), "failed to parse {args:?}: {:?}", result.err());
        }
    }
}
