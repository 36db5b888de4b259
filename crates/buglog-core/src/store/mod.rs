//! Filesystem repository.
//!
//! ```text
//! <root>/.buglog/
//!   config.toml
//!   user                 current identity id
//!   identities/<id>.json
//!   bugs/<id>.ops        one canonical JSON operation per line
//!   bugs/<id>.lock       advisory lock
//! ```
//!
//! Committing a bug appends its staged operations to its pack. Pulling from
//! another repository unions packs per bug; when the merge moves operations
//! that were already written, the pack is replaced atomically instead. No
//! operation is ever dropped from a pack.

pub mod lock;

pub use lock::{DEFAULT_LOCK_TIMEOUT, EntityLock, LockError};

use crate::bug::{Bug, Entity, MergeStatus, OpsError};
use crate::config;
use crate::entity::{Id, IdParseError, LookupError, resolve_prefix};
use crate::error::ErrorCode;
use crate::identity::{Identity, IdentityError, IdentityStore};
use crate::op::{DecodeError, Operation};
use serde::Serialize;
use std::fs::{self, OpenOptions};
use std::io::{self, Write as _};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

/// Name of the repository directory.
pub const REPO_DIR: &str = ".buglog";

const BUGS_DIR: &str = "bugs";
const IDENTITIES_DIR: &str = "identities";
const USER_FILE: &str = "user";
const PACK_EXT: &str = "ops";
const LOCK_EXT: &str = "lock";

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("no .buglog repository found at or above {}", .0.display())]
    NotInitialized(PathBuf),

    #[error("no bug matches '{0}'")]
    BugNotFound(String),

    #[error("no identity matches '{0}'")]
    IdentityNotFound(String),

    #[error("no current user is set")]
    UserNotSet,

    #[error("prefix '{prefix}' matches {} ids", .matches.len())]
    Ambiguous { prefix: String, matches: Vec<Id> },

    #[error(transparent)]
    InvalidId(#[from] IdParseError),

    #[error("{}:{line}: {source}", .path.display())]
    Decode {
        path: PathBuf,
        line: usize,
        #[source]
        source: DecodeError,
    },

    #[error("{} holds bug {}, not {}", .path.display(), .found.human(), .expected.human())]
    IdMismatch {
        path: PathBuf,
        expected: Id,
        found: Id,
    },

    #[error(transparent)]
    Identity(#[from] IdentityError),

    #[error(transparent)]
    Ops(#[from] OpsError),

    #[error(transparent)]
    Lock(#[from] LockError),

    #[error("failed to encode operation: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("{}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{0:#}")]
    Config(anyhow::Error),
}

impl StoreError {
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::NotInitialized(_) => ErrorCode::NotInitialized,
            Self::BugNotFound(_) => ErrorCode::EntityNotFound,
            Self::IdentityNotFound(_) => ErrorCode::IdentityNotFound,
            Self::UserNotSet => ErrorCode::IdentityNotSet,
            Self::Ambiguous { .. } => ErrorCode::AmbiguousId,
            Self::InvalidId(_) => ErrorCode::InvalidId,
            Self::Decode { .. } | Self::IdMismatch { .. } => ErrorCode::CorruptedEntity,
            Self::Identity(_) => ErrorCode::InvalidIdentity,
            Self::Ops(e) => e.code(),
            Self::Lock(e) => e.code(),
            Self::Encode(_) | Self::Io { .. } => ErrorCode::EntityWriteFailed,
            Self::Config(_) => ErrorCode::ConfigParseError,
        }
    }

    fn io(path: &Path) -> impl FnOnce(io::Error) -> Self + '_ {
        move |source| Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// What a [`FsRepo::pull`] changed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PullReport {
    /// Bugs that did not exist locally.
    pub new_bugs: Vec<Id>,
    /// Bugs that received operations, with how many.
    pub updated: Vec<(Id, usize)>,
    /// Bugs already up to date.
    pub unchanged: usize,
    /// Remote bugs that failed to load or replay and were skipped.
    pub skipped: Vec<Id>,
    /// Local bugs whose pack could not be read; they were left untouched.
    pub broken: Vec<Id>,
    /// Identities copied from the remote.
    pub identities: usize,
}

/// A repository rooted at a directory containing `.buglog/`.
#[derive(Debug, Clone)]
pub struct FsRepo {
    root: PathBuf,
    lock_timeout: Duration,
}

impl FsRepo {
    /// Create the repository layout under `root`. Safe to run twice.
    ///
    /// # Errors
    ///
    /// Fails if a directory or the default config cannot be written.
    pub fn init(root: &Path) -> Result<Self, StoreError> {
        let repo = Self {
            root: root.to_path_buf(),
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
        };
        for dir in [repo.bugs_dir(), repo.identities_dir()] {
            fs::create_dir_all(&dir).map_err(StoreError::io(&dir))?;
        }
        config::write_default_project_config(root).map_err(StoreError::Config)?;
        info!(root = %root.display(), "initialized repository");
        Ok(repo)
    }

    /// Find the repository containing `start`, walking up the tree.
    ///
    /// # Errors
    ///
    /// [`StoreError::NotInitialized`] if no ancestor holds `.buglog/`.
    pub fn open(start: &Path) -> Result<Self, StoreError> {
        start
            .ancestors()
            .find(|dir| dir.join(REPO_DIR).is_dir())
            .map(|root| Self {
                root: root.to_path_buf(),
                lock_timeout: DEFAULT_LOCK_TIMEOUT,
            })
            .ok_or_else(|| StoreError::NotInitialized(start.to_path_buf()))
    }

    #[must_use]
    pub const fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }

    /// The directory that contains `.buglog/`.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn repo_dir(&self) -> PathBuf {
        self.root.join(REPO_DIR)
    }

    fn bugs_dir(&self) -> PathBuf {
        self.repo_dir().join(BUGS_DIR)
    }

    fn identities_dir(&self) -> PathBuf {
        self.repo_dir().join(IDENTITIES_DIR)
    }

    fn pack_path(&self, id: &Id) -> PathBuf {
        self.bugs_dir().join(format!("{id}.{PACK_EXT}"))
    }

    fn lock_path(&self, id: &Id) -> PathBuf {
        self.bugs_dir().join(format!("{id}.{LOCK_EXT}"))
    }

    fn identity_path(&self, id: &Id) -> PathBuf {
        self.identities_dir().join(format!("{id}.json"))
    }

    // -- bugs ---------------------------------------------------------------

    /// Append the bug's staged operations to its pack and mark them durable.
    ///
    /// Returns how many operations were written.
    ///
    /// # Errors
    ///
    /// Fails if the lock cannot be taken or the write fails. Staged
    /// operations stay staged on failure.
    pub fn commit(&self, bug: &mut Bug) -> Result<usize, StoreError> {
        let Some(id) = bug.id().cloned() else {
            return Ok(0);
        };
        let _lock = EntityLock::exclusive(&self.lock_path(&id), self.lock_timeout)?;
        self.commit_locked(&id, bug)
    }

    fn commit_locked(&self, id: &Id, bug: &mut Bug) -> Result<usize, StoreError> {
        if bug.needs_rewrite() {
            return self.rewrite_locked(id, bug);
        }
        let staged = bug.staged();
        if staged.is_empty() {
            return Ok(0);
        }

        let buf = encode_lines(staged)?;
        let path = self.pack_path(id);
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(StoreError::io(&path))?;
        file.write_all(buf.as_bytes())
            .and_then(|()| file.sync_all())
            .map_err(StoreError::io(&path))?;

        let written = staged.len();
        bug.mark_durable();
        debug!(bug = %id.human(), written, "committed operations");
        Ok(written)
    }

    /// Replace the whole pack through a temporary file in the same directory.
    fn rewrite_locked(&self, id: &Id, bug: &mut Bug) -> Result<usize, StoreError> {
        let buf = encode_lines(bug.operations())?;
        let dir = self.bugs_dir();
        let path = self.pack_path(id);

        let mut temp = NamedTempFile::new_in(&dir).map_err(StoreError::io(&dir))?;
        temp.write_all(buf.as_bytes())
            .and_then(|()| temp.as_file().sync_all())
            .map_err(StoreError::io(temp.path()))?;
        temp.persist(&path).map_err(|e| StoreError::io(&path)(e.error))?;

        let written = bug.operations().len();
        bug.mark_durable();
        debug!(bug = %id.human(), written, "rewrote pack");
        Ok(written)
    }

    /// Read a bug's full pack.
    ///
    /// # Errors
    ///
    /// [`StoreError::BugNotFound`] if there is no pack, [`StoreError::Decode`]
    /// with the line number if a line is malformed, and
    /// [`StoreError::IdMismatch`] if the first operation does not hash to the
    /// file name.
    pub fn load_bug(&self, id: &Id) -> Result<Bug, StoreError> {
        let _lock = EntityLock::shared(&self.lock_path(id), self.lock_timeout)?;
        self.load_locked(id)
    }

    fn load_locked(&self, id: &Id) -> Result<Bug, StoreError> {
        let path = self.pack_path(id);
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(StoreError::BugNotFound(id.to_string()));
            }
            Err(e) => return Err(StoreError::io(&path)(e)),
        };

        let mut ops = Vec::new();
        for (index, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let op: Operation = line.parse().map_err(|source| StoreError::Decode {
                path: path.clone(),
                line: index + 1,
                source,
            })?;
            ops.push(op);
        }

        let bug = Bug::from_durable(ops);
        if let Some(found) = bug.id()
            && found != id
        {
            return Err(StoreError::IdMismatch {
                path,
                expected: id.clone(),
                found: found.clone(),
            });
        }
        Ok(bug)
    }

    /// Load a bug, let `f` append to it, then commit what it staged, all
    /// under the bug's exclusive lock.
    ///
    /// # Errors
    ///
    /// Propagates load, commit and `f`'s own errors. Nothing is written when
    /// `f` fails.
    pub fn update_bug<T, E, F>(&self, id: &Id, f: F) -> Result<T, E>
    where
        F: FnOnce(&mut Bug) -> Result<T, E>,
        E: From<StoreError>,
    {
        let _lock = EntityLock::exclusive(&self.lock_path(id), self.lock_timeout)
            .map_err(StoreError::from)?;
        let mut bug = self.load_locked(id)?;
        let out = f(&mut bug)?;
        self.commit_locked(id, &mut bug)?;
        Ok(out)
    }

    /// Ids of every bug in the repository, sorted.
    ///
    /// # Errors
    ///
    /// Fails if the bugs directory cannot be read.
    pub fn list_bugs(&self) -> Result<Vec<Id>, StoreError> {
        let dir = self.bugs_dir();
        let mut ids = Vec::new();
        for entry in fs::read_dir(&dir).map_err(StoreError::io(&dir))? {
            let path = entry.map_err(StoreError::io(&dir))?.path();
            if path.extension().and_then(|e| e.to_str()) != Some(PACK_EXT) {
                continue;
            }
            match path.file_stem().and_then(|s| s.to_str()).map(Id::parse) {
                Some(Ok(id)) => ids.push(id),
                _ => warn!(path = %path.display(), "ignoring pack with a malformed name"),
            }
        }
        ids.sort();
        Ok(ids)
    }

    /// Resolve a user-supplied id prefix to a bug id.
    ///
    /// # Errors
    ///
    /// [`StoreError::BugNotFound`] or [`StoreError::Ambiguous`].
    pub fn resolve_bug_prefix(&self, prefix: &str) -> Result<Id, StoreError> {
        let ids = self.list_bugs()?;
        resolve_prefix(prefix, &ids).map_err(|e| match e {
            LookupError::NotFound(p) => StoreError::BugNotFound(p),
            LookupError::Ambiguous { prefix, matches } => StoreError::Ambiguous { prefix, matches },
        })
    }

    /// Resolve a user-supplied id prefix to an identity.
    ///
    /// # Errors
    ///
    /// [`StoreError::IdentityNotFound`] or [`StoreError::Ambiguous`].
    pub fn resolve_identity_prefix(&self, prefix: &str) -> Result<Identity, StoreError> {
        let ids: Vec<Id> = self.list_identities()?.iter().map(Identity::id).collect();
        let id = resolve_prefix(prefix, &ids).map_err(|e| match e {
            LookupError::NotFound(p) => StoreError::IdentityNotFound(p),
            LookupError::Ambiguous { prefix, matches } => StoreError::Ambiguous { prefix, matches },
        })?;
        self.load_identity(&id)
    }

    /// The current user, or [`StoreError::UserNotSet`].
    ///
    /// # Errors
    ///
    /// Also fails if the pointer names a missing or corrupted identity.
    pub fn require_user(&self) -> Result<Identity, StoreError> {
        self.current_user()?.ok_or(StoreError::UserNotSet)
    }

    // -- replication --------------------------------------------------------

    /// Union every bug and identity of `remote` into this repository.
    ///
    /// Remote bugs that fail to load or replay are skipped and reported, and
    /// so are local bugs whose pack is corrupted. Neither stops the pull.
    ///
    /// # Errors
    ///
    /// Fails on local I/O or lock errors.
    pub fn pull(&mut self, remote: &Self) -> Result<PullReport, StoreError> {
        let mut report = PullReport::default();

        for identity in remote.list_identities()? {
            let path = self.identity_path(&identity.id());
            if !path.exists() {
                self.store_identity(&identity)?;
                report.identities += 1;
            }
        }

        for id in remote.list_bugs()? {
            let theirs = match remote.load_bug(&id) {
                Ok(bug) => bug,
                Err(e) => {
                    warn!(bug = %id.human(), error = %e, "skipping unreadable remote bug");
                    report.skipped.push(id);
                    continue;
                }
            };
            if let Err(e) = theirs.compile() {
                warn!(bug = %id.human(), error = %e, "skipping corrupted remote bug");
                report.skipped.push(id);
                continue;
            }

            let _lock = EntityLock::exclusive(&self.lock_path(&id), self.lock_timeout)?;
            let is_new = !self.pack_path(&id).exists();
            let mut ours = if is_new {
                Bug::new()
            } else {
                match self.load_locked(&id) {
                    Ok(bug) => bug,
                    Err(e @ (StoreError::Decode { .. } | StoreError::IdMismatch { .. })) => {
                        warn!(bug = %id.human(), error = %e, "skipping unreadable local bug");
                        report.broken.push(id);
                        continue;
                    }
                    Err(e) => return Err(e),
                }
            };

            match ours.merge(&theirs) {
                MergeStatus::Nothing => report.unchanged += 1,
                MergeStatus::Updated { added } => {
                    self.commit_locked(&id, &mut ours)?;
                    if is_new {
                        report.new_bugs.push(id);
                    } else {
                        report.updated.push((id, added));
                    }
                }
                MergeStatus::Invalid { local: ours_id, remote: theirs_id } => {
                    warn!(
                        local = %ours_id.human(),
                        remote = %theirs_id.human(),
                        "pack id mismatch"
                    );
                    report.skipped.push(id);
                }
            }
        }

        info!(
            new = report.new_bugs.len(),
            updated = report.updated.len(),
            skipped = report.skipped.len(),
            broken = report.broken.len(),
            "pull finished"
        );
        Ok(report)
    }
}

fn encode_lines(ops: &[Operation]) -> Result<String, StoreError> {
    let mut buf = String::new();
    for op in ops {
        buf.push_str(&op.to_canonical_line()?);
        buf.push('\n');
    }
    Ok(buf)
}

impl IdentityStore for FsRepo {
    type Error = StoreError;

    fn store_identity(&mut self, identity: &Identity) -> Result<(), Self::Error> {
        identity.validate()?;
        let dir = self.identities_dir();
        fs::create_dir_all(&dir).map_err(StoreError::io(&dir))?;
        let path = self.identity_path(&identity.id());
        let json = serde_json::to_string_pretty(identity)?;
        fs::write(&path, json).map_err(StoreError::io(&path))
    }

    fn load_identity(&self, id: &Id) -> Result<Identity, Self::Error> {
        let path = self.identity_path(id);
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(StoreError::IdentityNotFound(id.to_string()));
            }
            Err(e) => return Err(StoreError::io(&path)(e)),
        };
        let identity: Identity = serde_json::from_str(&content).map_err(|e| StoreError::Decode {
            path: path.clone(),
            line: e.line(),
            source: DecodeError::Json(e),
        })?;
        let found = identity.id();
        if &found != id {
            return Err(StoreError::IdMismatch {
                path,
                expected: id.clone(),
                found,
            });
        }
        Ok(identity)
    }

    fn list_identities(&self) -> Result<Vec<Identity>, Self::Error> {
        let dir = self.identities_dir();
        let mut identities = Vec::new();
        for entry in fs::read_dir(&dir).map_err(StoreError::io(&dir))? {
            let path = entry.map_err(StoreError::io(&dir))?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let Some(Ok(id)) = path.file_stem().and_then(|s| s.to_str()).map(Id::parse) else {
                warn!(path = %path.display(), "ignoring identity with a malformed name");
                continue;
            };
            identities.push(self.load_identity(&id)?);
        }
        identities.sort_by(|a, b| a.name().cmp(b.name()).then_with(|| a.id().cmp(&b.id())));
        Ok(identities)
    }

    fn current_user(&self) -> Result<Option<Identity>, Self::Error> {
        let path = self.repo_dir().join(USER_FILE);
        let raw = match fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(StoreError::io(&path)(e)),
        };
        let id = Id::parse(raw.trim())?;
        self.load_identity(&id).map(Some)
    }

    fn set_current_user(&mut self, id: &Id) -> Result<(), Self::Error> {
        self.load_identity(id)?;
        let path = self.repo_dir().join(USER_FILE);
        fs::write(&path, format!("{id}\n")).map_err(StoreError::io(&path))
    }

    fn is_user_set(&self) -> Result<bool, Self::Error> {
        Ok(self.repo_dir().join(USER_FILE).is_file())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bug::ops;
    use crate::identity::IdentityHandle;
    use crate::identity::tests::fixture;
    use std::io::Write as _;

    fn repo() -> (tempfile::TempDir, FsRepo) {
        let dir = tempfile::tempdir().expect("tempdir");
        let repo = FsRepo::init(dir.path()).expect("init");
        (dir, repo)
    }

    fn new_bug(repo: &FsRepo, title: &str) -> Id {
        let (mut bug, _) =
            ops::create(&fixture("Alice"), 1, title, "details", vec![]).expect("create");
        assert_eq!(repo.commit(&mut bug).expect("commit"), 1);
        bug.id().cloned().expect("id")
    }

    #[test]
    fn init_is_idempotent_and_open_walks_up() {
        let (dir, _) = repo();
        FsRepo::init(dir.path()).expect("second init");
        let nested = dir.path().join("src").join("deep");
        fs::create_dir_all(&nested).expect("mkdir");
        let found = FsRepo::open(&nested).expect("open");
        assert_eq!(found.root(), dir.path());
    }

    #[test]
    fn open_without_repo_fails() {
        let dir = tempfile::tempdir().expect("tempdir");
        let err = FsRepo::open(dir.path()).expect_err("no repo");
        assert_eq!(err.code(), ErrorCode::NotInitialized);
    }

    #[test]
    fn update_bug_appends_only_new_lines() {
        let (_dir, repo) = repo();
        let id = new_bug(&repo, "Crash");

        repo.update_bug(&id, |bug| -> Result<_, StoreError> {
            Ok(ops::add_comment(bug, &fixture("Bob"), 2, "me too", vec![])?)
        })
        .expect("update");

        let content = fs::read_to_string(repo.pack_path(&id)).expect("read pack");
        assert_eq!(content.lines().count(), 2);

        let bug = repo.load_bug(&id).expect("load");
        assert!(!bug.has_staged());
        let snap = bug.compile().expect("compile");
        assert_eq!(snap.title, "Crash");
        assert_eq!(snap.comments.len(), 2);
    }

    #[test]
    fn failed_update_writes_nothing() {
        let (_dir, repo) = repo();
        let id = new_bug(&repo, "Crash");

        let err = repo
            .update_bug(&id, |bug| -> Result<(), StoreError> {
                ops::add_comment(bug, &fixture("Bob"), 2, "staged then dropped", vec![])?;
                Err(OpsError::MissingCreate.into())
            })
            .expect_err("closure fails");
        assert!(matches!(err, StoreError::Ops(OpsError::MissingCreate)));

        let content = fs::read_to_string(repo.pack_path(&id)).expect("read pack");
        assert_eq!(content.lines().count(), 1);
    }

    #[test]
    fn corrupted_line_reports_line_number() {
        let (_dir, repo) = repo();
        let id = new_bug(&repo, "Crash");
        let mut file = OpenOptions::new()
            .append(true)
            .open(repo.pack_path(&id))
            .expect("open pack");
        writeln!(file, "{{\"type\":\"noop\"").expect("append garbage");

        let err = repo.load_bug(&id).expect_err("corrupted");
        assert!(matches!(err, StoreError::Decode { line: 2, .. }));
        assert_eq!(err.code(), ErrorCode::CorruptedEntity);
    }

    #[test]
    fn renamed_pack_is_detected() {
        let (_dir, repo) = repo();
        let id = new_bug(&repo, "Crash");
        let other = Id::of_bytes(b"other");
        fs::rename(repo.pack_path(&id), repo.pack_path(&other)).expect("rename");
        assert!(matches!(
            repo.load_bug(&other),
            Err(StoreError::IdMismatch { .. })
        ));
    }

    #[test]
    fn prefix_resolution() {
        let (_dir, repo) = repo();
        let a = new_bug(&repo, "First");
        let b = new_bug(&repo, "Second");
        assert_eq!(repo.resolve_bug_prefix(a.as_str()).expect("full id"), a);
        assert_eq!(repo.resolve_bug_prefix(b.human()).expect("short id"), b);
        assert!(matches!(
            repo.resolve_bug_prefix(""),
            Err(StoreError::Ambiguous { .. })
        ));
        assert!(matches!(
            repo.resolve_bug_prefix("zz"),
            Err(StoreError::BugNotFound(_))
        ));
        assert_eq!(repo.list_bugs().expect("list").len(), 2);
    }

    #[test]
    fn identities_and_user_pointer() {
        let (_dir, mut repo) = repo();
        assert!(!repo.is_user_set().expect("is set"));
        assert_eq!(repo.current_user().expect("user"), None);
        assert!(matches!(repo.require_user(), Err(StoreError::UserNotSet)));

        let alice = fixture("Alice");
        let mut handle = IdentityHandle::new(alice.clone());
        assert!(handle.commit_as_needed(&mut repo).expect("commit"));
        assert!(!handle.commit_as_needed(&mut repo).expect("recommit"));
        repo.set_current_user(&alice.id()).expect("set user");

        assert_eq!(repo.current_user().expect("user"), Some(alice.clone()));
        assert_eq!(repo.require_user().expect("required"), alice);
        assert_eq!(repo.list_identities().expect("list"), vec![alice.clone()]);
        assert_eq!(
            repo.resolve_identity_prefix(alice.id().human()).expect("resolve"),
            alice
        );
    }

    #[test]
    fn pull_unions_packs() {
        let (_a_dir, mut local) = repo();
        let (_b_dir, mut remote) = repo();

        let shared = new_bug(&local, "Shared");
        // The remote starts as a copy of the local pack.
        fs::copy(local.pack_path(&shared), remote.pack_path(&shared)).expect("copy pack");
        remote.store_identity(&fixture("Bob")).expect("identity");

        remote
            .update_bug(&shared, |bug| -> Result<_, StoreError> {
                Ok(ops::add_comment(bug, &fixture("Bob"), 3, "remote comment", vec![])?)
            })
            .expect("remote comment");
        local
            .update_bug(&shared, |bug| -> Result<_, StoreError> {
                Ok(ops::add_comment(bug, &fixture("Alice"), 2, "local comment", vec![])?)
            })
            .expect("local comment");
        let remote_only = new_bug(&remote, "Remote only");

        let report = local.pull(&remote).expect("pull");
        assert_eq!(report.new_bugs, vec![remote_only.clone()]);
        assert_eq!(report.updated, vec![(shared.clone(), 1)]);
        assert_eq!(report.identities, 1);

        let again = local.pull(&remote).expect("second pull");
        assert!(again.new_bugs.is_empty() && again.updated.is_empty());
        assert_eq!(again.unchanged, 2);

        let snap = local.load_bug(&shared).expect("load").compile().expect("compile");
        let messages: Vec<_> = snap.comments.iter().map(|c| c.message.as_str()).collect();
        assert_eq!(messages, vec!["details", "local comment", "remote comment"]);
        assert!(local.load_bug(&remote_only).is_ok());
    }

    fn rename(repo: &FsRepo, id: &Id, author: &str, title: &str) {
        repo.update_bug(id, |bug| -> Result<_, StoreError> {
            Ok(ops::set_title(bug, &fixture(author), 2, title)?)
        })
        .expect("rename");
    }

    #[test]
    fn pull_both_ways_converges() {
        let (_a_dir, mut a) = repo();
        let (_b_dir, mut b) = repo();
        let shared = new_bug(&a, "A");
        fs::copy(a.pack_path(&shared), b.pack_path(&shared)).expect("copy pack");

        rename(&a, &shared, "Alice", "B1");
        rename(&b, &shared, "Bob", "B2");

        a.pull(&b).expect("a pulls b");
        b.pull(&a).expect("b pulls a");

        let snap_a = a.load_bug(&shared).expect("load a").compile().expect("compile a");
        let snap_b = b.load_bug(&shared).expect("load b").compile().expect("compile b");
        assert_eq!(snap_a, snap_b);
        assert!(snap_a.title == "B1" || snap_a.title == "B2");

        let pack_a = fs::read_to_string(a.pack_path(&shared)).expect("read a");
        let pack_b = fs::read_to_string(b.pack_path(&shared)).expect("read b");
        assert_eq!(pack_a, pack_b);
        assert_eq!(pack_a.lines().count(), 3);

        let again = a.pull(&b).expect("third pull");
        assert!(again.updated.is_empty());
        assert_eq!(again.unchanged, 1);
    }

    #[test]
    fn pull_skips_corrupted_local_pack() {
        let (_a_dir, mut local) = repo();
        let (_b_dir, remote) = repo();
        let shared = new_bug(&local, "Shared");
        fs::copy(local.pack_path(&shared), remote.pack_path(&shared)).expect("copy pack");

        let mut pack = OpenOptions::new()
            .append(true)
            .open(local.pack_path(&shared))
            .expect("open pack");
        pack.write_all(b"{broken\n").expect("corrupt");
        drop(pack);
        let before = fs::read(local.pack_path(&shared)).expect("read");

        let fresh = new_bug(&remote, "Fresh");
        let report = local.pull(&remote).expect("pull");
        assert_eq!(report.broken, vec![shared.clone()]);
        assert_eq!(report.new_bugs, vec![fresh.clone()]);
        assert!(report.skipped.is_empty());
        assert!(local.load_bug(&fresh).is_ok());
        assert_eq!(fs::read(local.pack_path(&shared)).expect("read"), before);
    }
}
