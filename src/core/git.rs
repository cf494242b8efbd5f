//! Git plumbing behind a narrow command contract.
//!
//! Every git call is a child process bounded by a timeout. Reads that go
//! through the working tree (`checkout` materialization) are only
//! reachable from a [`RepoSession`], which holds the repository
//! exclusively for its whole lifetime: an in-process mutex keyed by the
//! canonical repository path plus an advisory `fd-lock` on
//! `<git-dir>/vszz.lock` for other processes.

use std::{
    cell::RefCell,
    collections::{BTreeSet, HashMap},
    fs::OpenOptions,
    io::Read,
    path::{Path, PathBuf},
    process::{Command, ExitStatus, Stdio},
    sync::{Arc, Mutex, OnceLock},
    thread,
    time::{Duration, Instant},
};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, trace, warn};

use crate::core::model::CommitRef;

/// Failure of a git invocation.
#[derive(Debug, Error)]
pub enum VcsError
{
    #[error("failed to spawn `git {command}`: {source}")]
    Spawn
    {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("`git {command}` timed out after {secs}s")]
    Timeout
    {
        command: String, secs: u64
    },

    #[error("`git {command}` exited with {status}: {stderr}")]
    Failed
    {
        command: String,
        status: ExitStatus,
        stderr: String,
    },

    #[error("not a git repository: {0}")]
    NotARepository(PathBuf),

    #[error("repository lock {path}: {source}")]
    Lock
    {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// The two history queries the tracing core needs.
pub trait Vcs
{
    /// Hashes of `older..newer` on the ancestry path (descendants of
    /// `older` that are ancestors of `newer`), newest first, optionally
    /// limited to commits touching `path`.
    fn log_range(
        &self,
        older: &CommitRef,
        newer: &CommitRef,
        path: Option<&str>,
    ) -> Result<Vec<CommitRef>, VcsError>;

    /// Content of `path` at `commit`; `Ok(None)` when the path is absent.
    fn file_at(
        &self,
        commit: &CommitRef,
        path: &str,
    ) -> Result<Option<Vec<u8>>, VcsError>;
}

/// How file content at a commit is obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MaterializeMode
{
    /// `git checkout <commit> -- <path>`, then read the working tree file
    #[default]
    Checkout,
    /// `git show <commit>:<path>`; leaves the working tree alone
    Show,
}

/// Git invocation settings.
#[derive(Debug, Clone)]
pub struct GitOptions
{
    pub timeout: Duration,
    pub materialize: MaterializeMode,
}

impl Default for GitOptions
{
    fn default() -> Self
    {
        Self { timeout: Duration::from_secs(120), materialize: MaterializeMode::Checkout }
    }
}

/// A git repository on disk.
#[derive(Debug)]
pub struct GitRepo
{
    root: PathBuf,
    lock_path: PathBuf,
    options: GitOptions,
}

impl GitRepo
{
    /// Open the repository rooted at `root`.
    pub fn open(
        root: &Path,
        options: GitOptions,
    ) -> Result<Self, VcsError>
    {
        let root = dunce::canonicalize(root)
            .map_err(|_| VcsError::NotARepository(root.to_path_buf()))?;

        let out = run_git(&root, &["rev-parse", "--absolute-git-dir"], options.timeout)
            .map_err(|_| VcsError::NotARepository(root.clone()))?;
        let git_dir = PathBuf::from(
            String::from_utf8_lossy(&out)
                .trim()
                .to_string(),
        );

        Ok(Self { lock_path: git_dir.join("vszz.lock"), root, options })
    }

    /// Clone `url` into `dest`.
    pub fn clone_from(
        url: &str,
        dest: &Path,
        timeout: Duration,
    ) -> Result<(), VcsError>
    {
        let parent = dest
            .parent()
            .filter(|p| {
                !p.as_os_str()
                    .is_empty()
            })
            .unwrap_or_else(|| Path::new("."));
        std::fs::create_dir_all(parent)?;

        let dest_str = dest
            .to_string_lossy()
            .to_string();
        run_git(parent, &["clone", "--quiet", url, &dest_str], timeout).map(|_| ())
    }

    pub fn root(&self) -> &Path
    {
        &self.root
    }

    fn git(
        &self,
        args: &[&str],
    ) -> Result<Vec<u8>, VcsError>
    {
        run_git(&self.root, args, self.options.timeout)
    }

    /// Full hash of `rev`.
    pub fn rev_parse(
        &self,
        rev: &str,
    ) -> Result<CommitRef, VcsError>
    {
        let spec = format!("{rev}^{{commit}}");
        let out = self.git(&["rev-parse", "--verify", "--quiet", &spec])?;
        Ok(CommitRef::new(String::from_utf8_lossy(&out)))
    }

    /// First parent of `commit`; `None` for a root commit.
    pub fn parent(
        &self,
        commit: &CommitRef,
    ) -> Result<Option<CommitRef>, VcsError>
    {
        let out = self.git(&["rev-list", "--parents", "-n", "1", commit.as_str()])?;
        let line = String::from_utf8_lossy(&out);

        Ok(line
            .split_whitespace()
            .nth(1)
            .map(CommitRef::new))
    }

    /// Zero-context diff between `parent` and `commit`.
    pub fn diff_unified0(
        &self,
        parent: &CommitRef,
        commit: &CommitRef,
    ) -> Result<String, VcsError>
    {
        let out = self.git(&[
            "diff",
            "--no-color",
            "--no-ext-diff",
            "--unified=0",
            "-M",
            parent.as_str(),
            commit.as_str(),
        ])?;
        Ok(String::from_utf8_lossy(&out).into_owned())
    }

    /// Porcelain blame of a single line, ignoring whitespace changes.
    pub fn blame_line(
        &self,
        commit: &CommitRef,
        path: &str,
        line: usize,
    ) -> Result<String, VcsError>
    {
        let range = format!("{line},{line}");
        let out = self.git(&["blame", "--porcelain", "-w", "-L", &range, commit.as_str(), "--", path])?;
        Ok(String::from_utf8_lossy(&out).into_owned())
    }

    /// Run `f` with exclusive use of this repository.
    ///
    /// Paths checked out during the session are restored to `HEAD` when
    /// the session drops, including while unwinding from a panic in `f`.
    pub fn with_session<T>(
        &self,
        f: impl FnOnce(&RepoSession<'_>) -> T,
    ) -> Result<T, VcsError>
    {
        let local = local_lock(&self.root);
        let _in_process = local
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&self.lock_path)
            .map_err(|source| VcsError::Lock { path: self.lock_path.clone(), source })?;
        let mut lock = fd_lock::RwLock::new(file);
        let _cross_process = lock
            .write()
            .map_err(|source| VcsError::Lock { path: self.lock_path.clone(), source })?;

        trace!(repo = %self.root.display(), "session acquired");

        let session = RepoSession { repo: self, touched: RefCell::new(BTreeSet::new()) };
        let out = f(&session);
        drop(session);

        Ok(out)
    }

    fn show_file(
        &self,
        commit: &CommitRef,
        path: &str,
    ) -> Result<Option<Vec<u8>>, VcsError>
    {
        let spec = format!("{}:{}", commit, path);

        match self.git(&["show", &spec])
        {
            Ok(bytes) => Ok(Some(bytes)),
            Err(VcsError::Failed { stderr, .. }) if is_missing_path(&stderr) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

/// Exclusive handle on a repository; see [`GitRepo::with_session`].
pub struct RepoSession<'a>
{
    repo: &'a GitRepo,
    touched: RefCell<BTreeSet<String>>,
}

impl RepoSession<'_>
{
    pub fn repo(&self) -> &GitRepo
    {
        self.repo
    }

    fn checkout_file(
        &self,
        commit: &CommitRef,
        path: &str,
    ) -> Result<Option<Vec<u8>>, VcsError>
    {
        match self
            .repo
            .git(&["checkout", "--quiet", commit.as_str(), "--", path])
        {
            Ok(_) =>
            {
                self.touched
                    .borrow_mut()
                    .insert(path.to_string());
                Ok(Some(std::fs::read(
                    self.repo
                        .root
                        .join(path),
                )?))
            }
            // Path absent at that commit; the working tree still holds
            // another version, so nothing may be read
            Err(VcsError::Failed { stderr, .. }) if is_missing_path(&stderr) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Put one checked-out path back to its `HEAD` state.
    fn restore_path(
        &self,
        path: &str,
    ) -> Result<(), VcsError>
    {
        let listed = self
            .repo
            .git(&["ls-tree", "--name-only", "HEAD", path])?;

        if !String::from_utf8_lossy(&listed)
            .trim()
            .is_empty()
        {
            self.repo
                .git(&["checkout", "--quiet", "HEAD", "--", path])?;
            return Ok(());
        }

        // Absent at HEAD: unstage and remove what the checkout created
        self.repo
            .git(&["rm", "--cached", "--quiet", "--ignore-unmatch", "--", path])?;

        match std::fs::remove_file(
            self.repo
                .root
                .join(path),
        )
        {
            Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(e.into()),
            _ => Ok(()),
        }
    }
}

impl Drop for RepoSession<'_>
{
    fn drop(&mut self)
    {
        for path in self
            .touched
            .borrow()
            .iter()
        {
            if let Err(e) = self.restore_path(path)
            {
                warn!(path = %path, error = %e, "could not restore working tree file");
            }
        }
    }
}

impl Vcs for RepoSession<'_>
{
    fn log_range(
        &self,
        older: &CommitRef,
        newer: &CommitRef,
        path: Option<&str>,
    ) -> Result<Vec<CommitRef>, VcsError>
    {
        let range = format!("{older}..{newer}");
        let mut args = vec!["log", "--format=%H", "--ancestry-path", range.as_str()];

        if let Some(p) = path
        {
            args.extend(["--", p]);
        }

        let out = self
            .repo
            .git(&args)?;

        Ok(String::from_utf8_lossy(&out)
            .lines()
            .filter(|l| {
                !l.trim()
                    .is_empty()
            })
            .map(CommitRef::new)
            .collect())
    }

    fn file_at(
        &self,
        commit: &CommitRef,
        path: &str,
    ) -> Result<Option<Vec<u8>>, VcsError>
    {
        match self
            .repo
            .options
            .materialize
        {
            MaterializeMode::Checkout => self.checkout_file(commit, path),
            MaterializeMode::Show => self
                .repo
                .show_file(commit, path),
        }
    }
}

fn is_missing_path(stderr: &str) -> bool
{
    stderr.contains("did not match any file")
        || stderr.contains("does not exist in")
        || stderr.contains("exists on disk, but not in")
}

/// One mutex per canonical repository path, shared by every thread.
fn local_lock(root: &Path) -> Arc<Mutex<()>>
{
    static LOCKS: OnceLock<Mutex<HashMap<PathBuf, Arc<Mutex<()>>>>> = OnceLock::new();

    let mut map = LOCKS
        .get_or_init(Default::default)
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner());

    map.entry(root.to_path_buf())
        .or_default()
        .clone()
}

/// Run git in `cwd`, killing it once `timeout` elapses.
fn run_git(
    cwd: &Path,
    args: &[&str],
    timeout: Duration,
) -> Result<Vec<u8>, VcsError>
{
    let command = args.join(" ");

    let mut child = Command::new("git")
        .args(args)
        .current_dir(cwd)
        .env("GIT_TERMINAL_PROMPT", "0")
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|source| VcsError::Spawn { command: command.clone(), source })?;

    // Drain pipes on helper threads so a chatty child never blocks
    let stdout = drain(
        child
            .stdout
            .take(),
    );
    let stderr = drain(
        child
            .stderr
            .take(),
    );

    let deadline = Instant::now() + timeout;
    let status = loop
    {
        if let Some(status) = child.try_wait()?
        {
            break status;
        }

        if Instant::now() >= deadline
        {
            let _ = child.kill();
            let _ = child.wait();
            return Err(VcsError::Timeout { command, secs: timeout.as_secs() });
        }

        thread::sleep(Duration::from_millis(5));
    };

    let stdout = stdout
        .join()
        .unwrap_or_default();
    let stderr = stderr
        .join()
        .unwrap_or_default();

    if !status.success()
    {
        let stderr = String::from_utf8_lossy(&stderr)
            .trim()
            .to_string();
        debug!(command = %command, %status, stderr = %stderr, "git failed");
        return Err(VcsError::Failed { command, status, stderr });
    }

    Ok(stdout)
}

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> thread::JoinHandle<Vec<u8>>
{
    thread::spawn(move || {
        let mut buf = Vec::new();

        if let Some(mut p) = pipe
        {
            let _ = p.read_to_end(&mut buf);
        }

        buf
    })
}
