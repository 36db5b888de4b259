//! End-to-end workflow tests for `bl`: identities, bug lifecycle and pull.

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

/// Build a `bl` command rooted at `dir`, isolated from the caller's config.
fn bl(dir: &Path, config_home: &Path) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("bl"));
    cmd.current_dir(dir)
        .env("XDG_CONFIG_HOME", config_home)
        .env("BUGLOG_LOG", "error")
        .env_remove("FORMAT");
    cmd
}

struct Sandbox {
    repo: TempDir,
    config: TempDir,
}

impl Sandbox {
    fn new() -> Self {
        let sandbox = Self {
            repo: TempDir::new().expect("repo dir"),
            config: TempDir::new().expect("config dir"),
        };
        sandbox.run(&["init"]);
        sandbox
    }

    fn cmd(&self) -> Command {
        bl(self.repo.path(), self.config.path())
    }

    /// Run a command that must succeed and return its trimmed stdout.
    fn run(&self, args: &[&str]) -> String {
        let out = self.cmd().args(args).output().expect("run bl");
        assert!(
            out.status.success(),
            "bl {args:?} failed: {}",
            String::from_utf8_lossy(&out.stderr)
        );
        String::from_utf8(out.stdout).expect("utf8").trim().to_string()
    }

    fn json(&self, args: &[&str]) -> Value {
        let mut full = args.to_vec();
        full.extend(["--format", "json"]);
        serde_json::from_str(&self.run(&full)).expect("json output")
    }

    fn with_user(self, name: &str) -> Self {
        let email = format!("{}@example.com", name.to_lowercase());
        self.run(&["user", "create", "--name", name, "--email", &email]);
        self
    }
}

#[test]
fn init_is_idempotent() {
    let sandbox = Sandbox::new();
    sandbox.run(&["init"]);
    assert!(sandbox.repo.path().join(".buglog/config.toml").is_file());
    assert!(sandbox.repo.path().join(".buglog/bugs").is_dir());
}

#[test]
fn commands_outside_a_repository_fail_with_code() {
    let dir = TempDir::new().expect("dir");
    let config = TempDir::new().expect("config");
    bl(dir.path(), config.path())
        .args(["bug", "ls"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("E1001"));
}

#[test]
fn user_create_sets_current_user_once() {
    let sandbox = Sandbox::new();
    let alice = sandbox.run(&["user", "create", "--name", "Alice", "--email", "a@example.com"]);
    assert_eq!(alice.len(), 64);
    sandbox.run(&["user", "create", "--name", "Bob", "--email", "b@example.com"]);

    let me = sandbox.json(&["user", "show"]);
    assert_eq!(me["id"], alice.as_str());
    assert_eq!(me["current"], true);

    let all = sandbox.json(&["user", "ls"]);
    assert_eq!(all.as_array().map(Vec::len), Some(2));
}

#[test]
fn user_create_prompts_with_config_defaults() {
    let sandbox = Sandbox::new();
    fs::write(
        sandbox.repo.path().join(".buglog/config.toml"),
        "[user]\nname = \"Config Name\"\nemail = \"config@example.com\"\n",
    )
    .expect("write config");

    sandbox
        .cmd()
        .args(["user", "create"])
        .write_stdin("\n\n\n")
        .assert()
        .success();

    let me = sandbox.json(&["user", "show"]);
    assert_eq!(me["name"], "Config Name");
    assert_eq!(me["email"], "config@example.com");
}

const KEY: &str = "-----BEGIN PGP PUBLIC KEY BLOCK-----\n\nmQENBGExampleKey\n=a1b2\n-----END PGP PUBLIC KEY BLOCK-----\n";

#[test]
fn user_create_reads_key_from_stdin() {
    let sandbox = Sandbox::new();
    let out = sandbox
        .cmd()
        .args(["user", "create", "--name", "Alice", "--email", "a@example.com"])
        .args(["--key-file", "-", "--format", "json"])
        .write_stdin(KEY)
        .output()
        .expect("run bl");
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));
    let created: Value = serde_json::from_slice(&out.stdout).expect("json output");
    assert_eq!(created["key"], KEY);

    let me = sandbox.json(&["user", "show"]);
    assert_eq!(me["keys"], 1);
}

#[test]
fn user_create_reads_key_from_file() {
    let sandbox = Sandbox::new();
    let key_path = sandbox.config.path().join("alice.asc");
    fs::write(&key_path, KEY).expect("write key");
    let key_arg = key_path.to_str().expect("utf8 path");

    let id = sandbox.run(&[
        "user", "create", "--name", "Alice", "--email", "a@example.com", "--key-file", key_arg,
    ]);
    assert_eq!(id.len(), 64);
    assert_eq!(sandbox.json(&["user", "show"])["keys"], 1);
}

#[test]
fn user_create_rejects_stdin_key_while_prompting() {
    let sandbox = Sandbox::new();
    sandbox
        .cmd()
        .args(["user", "create", "--key-file", "-"])
        .write_stdin(KEY)
        .assert()
        .failure()
        .stderr(predicate::str::contains("--name and --email"));
}

#[test]
fn user_create_prompts_again_for_blank_required_fields() {
    let sandbox = Sandbox::new();
    sandbox
        .cmd()
        .args(["user", "create"])
        .write_stdin("\nAlice\n\na@example.com\n\n")
        .assert()
        .success()
        .stderr(predicate::str::contains("Name is required."))
        .stderr(predicate::str::contains("Email is required."));

    let me = sandbox.json(&["user", "show"]);
    assert_eq!(me["name"], "Alice");
    assert_eq!(me["email"], "a@example.com");
}

#[test]
fn user_create_fails_when_input_ends_before_a_name() {
    let sandbox = Sandbox::new();
    sandbox
        .cmd()
        .args(["user", "create"])
        .write_stdin("\n")
        .assert()
        .failure()
        .stderr(predicate::str::contains("no value given for Name"));
    assert_eq!(sandbox.json(&["user", "ls"]).as_array().map(Vec::len), Some(0));
}

#[test]
fn bug_new_requires_a_user() {
    let sandbox = Sandbox::new();
    sandbox
        .cmd()
        .args(["bug", "new", "--title", "Crash"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("E4001"));
}

#[test]
fn bug_lifecycle() {
    let sandbox = Sandbox::new().with_user("Alice");
    let id = sandbox.run(&["bug", "new", "--title", "Crash on start", "-m", "Segfault"]);
    let prefix = &id[..6];

    sandbox.run(&["bug", "comment", prefix, "Happens on 1.2 too"]);
    sandbox.run(&["bug", "title", prefix, "Crash on startup"]);
    sandbox.run(&["bug", "label", prefix, "crash", "p1"]);
    sandbox.run(&["bug", "close", prefix]);
    sandbox
        .cmd()
        .args(["bug", "close", prefix])
        .assert()
        .failure()
        .stderr(predicate::str::contains("E2007"));

    let label = sandbox.run(&["bug", "label", prefix, "crash", "--remove", "p1"]);
    assert!(label.contains("crash: already set"));
    assert!(label.contains("p1: removed"));

    let bug = sandbox.json(&["bug", "show", prefix]);
    assert_eq!(bug["id"], id.as_str());
    assert_eq!(bug["title"], "Crash on startup");
    assert_eq!(bug["status"], "closed");
    assert_eq!(bug["labels"], serde_json::json!(["crash"]));
    assert_eq!(bug["comments"], 2);

    let timeline = bug["timeline"].as_array().expect("timeline");
    let kinds: Vec<&str> = timeline.iter().filter_map(|t| t["type"].as_str()).collect();
    assert_eq!(
        kinds,
        vec!["comment", "comment", "set_title", "label_change", "set_status", "label_change"]
    );
    assert_eq!(timeline[2]["was"], "Crash on start");

    let text = sandbox.run(&["bug", "show", prefix]);
    assert!(text.contains("Crash on startup"));
    assert!(text.contains("renamed \"Crash on start\" to \"Crash on startup\""));
}

#[test]
fn edit_comment_keeps_history() {
    let sandbox = Sandbox::new().with_user("Alice");
    let id = sandbox.run(&["bug", "new", "--title", "Typo", "-m", "Teh button"]);

    let before = sandbox.json(&["bug", "show", &id]);
    let comment = before["timeline"][0]["id"].as_str().expect("comment id").to_string();

    sandbox.run(&["bug", "edit-comment", &id, &comment[..10], "The button"]);

    let after = sandbox.json(&["bug", "show", &id]);
    let first = &after["timeline"][0];
    assert_eq!(first["message"], "The button");
    assert_eq!(first["edited"], true);
    assert_eq!(first["history"].as_array().map(Vec::len), Some(2));
    assert_eq!(first["history"][0]["message"], "Teh button");

    sandbox
        .cmd()
        .args(["bug", "edit-comment", &id, "zzzz", "nope"])
        .assert()
        .failure();
}

#[test]
fn ls_reports_broken_bugs_and_continues() {
    let sandbox = Sandbox::new().with_user("Alice");
    sandbox.run(&["bug", "new", "--title", "Healthy"]);
    let broken = sandbox.run(&["bug", "new", "--title", "Doomed"]);

    let pack = sandbox
        .repo
        .path()
        .join(".buglog/bugs")
        .join(format!("{broken}.ops"));
    let mut content = fs::read_to_string(&pack).expect("read pack");
    content.push_str("{\"type\":\"set_title\"\n");
    fs::write(&pack, content).expect("corrupt pack");

    sandbox
        .cmd()
        .args(["bug", "ls"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Healthy"))
        .stdout(predicate::str::contains("Doomed").not())
        .stderr(predicate::str::contains("unreadable"));

    let list = sandbox.json(&["bug", "ls"]);
    assert_eq!(list["bugs"].as_array().map(Vec::len), Some(1));
    assert_eq!(list["broken"][0]["id"], broken.as_str());
}

#[test]
fn ls_filters_by_status_and_label() {
    let sandbox = Sandbox::new().with_user("Alice");
    let a = sandbox.run(&["bug", "new", "--title", "Open one"]);
    let b = sandbox.run(&["bug", "new", "--title", "Closed one"]);
    sandbox.run(&["bug", "close", &b]);
    sandbox.run(&["bug", "label", &a, "ui"]);

    let open = sandbox.run(&["bug", "ls", "--status", "open"]);
    assert!(open.contains("Open one") && !open.contains("Closed one"));
    let labelled = sandbox.run(&["bug", "ls", "--label", "ui"]);
    assert!(labelled.contains("Open one") && !labelled.contains("Closed one"));

    sandbox
        .cmd()
        .args(["bug", "ls", "--status", "pending"])
        .assert()
        .failure();
}

#[test]
fn pull_merges_replicas() {
    let local = Sandbox::new().with_user("Alice");
    let remote = Sandbox::new().with_user("Bob");

    let shared = local.run(&["bug", "new", "--title", "Shared"]);
    remote.run(&["pull", local.repo.path().to_str().expect("utf8 path")]);
    remote.run(&["bug", "comment", &shared, "Bob was here"]);
    let remote_only = remote.run(&["bug", "new", "--title", "Remote only"]);

    let report = local.json(&["pull", remote.repo.path().to_str().expect("utf8 path")]);
    assert_eq!(report["new_bugs"], serde_json::json!([remote_only]));
    assert_eq!(report["updated"][0][0], shared.as_str());
    assert_eq!(report["updated"][0][1], 1);
    assert_eq!(report["identities"], 1);

    let bug = local.json(&["bug", "show", &shared]);
    assert_eq!(bug["comments"], 2);
    assert_eq!(bug["participants"], serde_json::json!(["Alice", "Bob"]));

    let again = local.json(&["pull", remote.repo.path().to_str().expect("utf8 path")]);
    assert_eq!(again["unchanged"], 2);
}
