//! Shared test utilities for integration tests
//!
//! An in-memory linear history implementing `Vcs`, and a small helper
//! that builds a real git repository commit by commit.

#![allow(dead_code)]

use std::{collections::HashMap, path::Path, process::Command};

use assert_fs::prelude::*;
use vszz::core::{CommitRef, Vcs, VcsError};

/// Linear history held in memory: commit i's parent is commit i - 1.
#[derive(Default)]
pub struct MemoryRepo
{
    order: Vec<String>,
    files: HashMap<(String, String), String>,
}

impl MemoryRepo
{
    pub fn new() -> Self
    {
        Self::default()
    }

    /// Append a commit whose tree is `files` (path, content).
    pub fn commit(
        &mut self,
        hash: &str,
        files: &[(&str, &str)],
    ) -> &mut Self
    {
        self.order
            .push(hash.to_string());
        for (path, content) in files
        {
            self.files
                .insert((hash.to_string(), path.to_string()), content.to_string());
        }
        self
    }

    fn position(
        &self,
        c: &CommitRef,
    ) -> Result<usize, VcsError>
    {
        self.order
            .iter()
            .position(|h| h == c.as_str())
            .ok_or_else(|| VcsError::NotARepository(format!("unknown commit {c}").into()))
    }
}

impl Vcs for MemoryRepo
{
    fn log_range(
        &self,
        older: &CommitRef,
        newer: &CommitRef,
        path: Option<&str>,
    ) -> Result<Vec<CommitRef>, VcsError>
    {
        let (lo, hi) = (self.position(older)?, self.position(newer)?);
        if lo >= hi
        {
            return Ok(Vec::new());
        }

        let touches = |i: usize| {
            let Some(p) = path
            else
            {
                return true;
            };
            let at = |j: usize| {
                self.files
                    .get(&(self.order[j].clone(), p.to_string()))
            };
            i == 0 || at(i) != at(i - 1)
        };

        Ok((lo + 1..=hi)
            .rev()
            .filter(|&i| touches(i))
            .map(|i| CommitRef::new(self.order[i].as_str()))
            .collect())
    }

    fn file_at(
        &self,
        commit: &CommitRef,
        path: &str,
    ) -> Result<Option<Vec<u8>>, VcsError>
    {
        self.position(commit)?;

        Ok(self
            .files
            .get(&(commit.to_string(), path.to_string()))
            .map(|s| {
                s.as_bytes()
                    .to_vec()
            }))
    }
}

pub fn git_available() -> bool
{
    Command::new("git")
        .arg("--version")
        .output()
        .is_ok_and(|o| {
            o.status
                .success()
        })
}

/// A throwaway git repository.
pub struct GitFixture
{
    pub dir: assert_fs::TempDir,
}

impl GitFixture
{
    pub fn new() -> Self
    {
        let dir = assert_fs::TempDir::new().expect("tempdir");
        let fx = Self { dir };

        fx.git(&["init", "--quiet"]);
        fx.git(&["config", "user.name", "Test User"]);
        fx.git(&["config", "user.email", "test@example.com"]);
        fx.git(&["config", "commit.gpgsign", "false"]);
        fx
    }

    pub fn path(&self) -> &Path
    {
        self.dir
            .path()
    }

    pub fn git(
        &self,
        args: &[&str],
    ) -> String
    {
        let out = Command::new("git")
            .args(args)
            .current_dir(self.path())
            .output()
            .expect("git runs");
        assert!(
            out.status
                .success(),
            "git {args:?} failed: {}",
            String::from_utf8_lossy(&out.stderr)
        );
        String::from_utf8_lossy(&out.stdout)
            .trim()
            .to_string()
    }

    /// Write `files`, commit everything, return the new hash.
    pub fn commit(
        &self,
        message: &str,
        files: &[(&str, &str)],
    ) -> String
    {
        for (path, content) in files
        {
            self.dir
                .child(path)
                .write_str(content)
                .expect("write");
        }

        self.git(&["add", "-A"]);
        self.git(&["commit", "--quiet", "-m", message]);
        self.git(&["rev-parse", "HEAD"])
    }
}
