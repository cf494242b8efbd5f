//! Commit ranges and file materialization over a [`Vcs`].
//!
//! VCS failures never escape this layer: a failed range query is an empty
//! range and a failed read is an absent file, so one broken commit cannot
//! stop sibling work.

use tracing::{debug, warn};

use crate::core::{
    git::Vcs,
    model::{CommitRef, FileSnapshot},
};

pub struct HistoryWalker<'a, V: Vcs + ?Sized>
{
    vcs: &'a V,
}

impl<'a, V: Vcs + ?Sized> HistoryWalker<'a, V>
{
    pub fn new(vcs: &'a V) -> Self
    {
        Self { vcs }
    }

    /// Commits strictly between `older` and `newer`, oldest first.
    pub fn ancestors_between(
        &self,
        older: &CommitRef,
        newer: &CommitRef,
    ) -> Vec<CommitRef>
    {
        self.range(older, newer, None)
    }

    /// Like [`Self::ancestors_between`], limited to commits touching `path`.
    pub fn ancestors_touching(
        &self,
        older: &CommitRef,
        newer: &CommitRef,
        path: &str,
    ) -> Vec<CommitRef>
    {
        self.range(older, newer, Some(path))
    }

    fn range(
        &self,
        older: &CommitRef,
        newer: &CommitRef,
        path: Option<&str>,
    ) -> Vec<CommitRef>
    {
        if older == newer
        {
            return Vec::new();
        }

        let mut commits = match self
            .vcs
            .log_range(older, newer, path)
        {
            Ok(c) => c,
            Err(e) =>
            {
                warn!(older = %older.short(), newer = %newer.short(), error = %e, "commit range unavailable");
                return Vec::new();
            }
        };

        // Log order is newest first; both endpoints are excluded
        commits.retain(|c| c != older && c != newer);
        commits.reverse();
        commits
    }

    /// Content of `path` at `commit`, or `None` if absent or unreadable.
    pub fn materialize(
        &self,
        path: &str,
        commit: &CommitRef,
    ) -> Option<FileSnapshot>
    {
        match self
            .vcs
            .file_at(commit, path)
        {
            Ok(Some(bytes)) => Some(FileSnapshot::new(path, commit.clone(), bytes)),
            Ok(None) =>
            {
                debug!(path, commit = %commit.short(), "path absent at commit");
                None
            }
            Err(e) =>
            {
                warn!(path, commit = %commit.short(), error = %e, "could not materialize file");
                None
            }
        }
    }
}
