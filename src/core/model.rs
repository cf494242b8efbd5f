//! Value types shared by the tracing pipeline.
//!
//! Commits and snapshots are query results, never stored entities. BIC
//! and latent records live for one tracing pass and are folded into
//! [`LabeledFunction`] rows by the deduplicator.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::infra::line_index::NewlineIndex;

/// Opaque commit identifier (full hash as printed by git).
///
/// Ordering between commits only exists through history queries; the
/// type deliberately implements no `Ord`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CommitRef(String);

impl CommitRef
{
    pub fn new(hash: impl Into<String>) -> Self
    {
        Self(
            hash.into()
                .trim()
                .to_string(),
        )
    }

    pub fn as_str(&self) -> &str
    {
        &self.0
    }

    /// Abbreviated form for log lines and progress messages.
    pub fn short(&self) -> &str
    {
        self.0
            .get(..10)
            .unwrap_or(&self.0)
    }
}

impl fmt::Display for CommitRef
{
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result
    {
        f.write_str(&self.0)
    }
}

impl From<&str> for CommitRef
{
    fn from(s: &str) -> Self
    {
        Self::new(s)
    }
}

/// Byte content of one file at one commit.
#[derive(Debug, Clone)]
pub struct FileSnapshot
{
    pub path: String,
    pub commit: CommitRef,
    bytes: Vec<u8>,
    index: NewlineIndex,
}

impl FileSnapshot
{
    pub fn new(
        path: impl Into<String>,
        commit: CommitRef,
        bytes: Vec<u8>,
    ) -> Self
    {
        let index = NewlineIndex::build(&bytes);
        Self { path: path.into(), commit, bytes, index }
    }

    pub fn bytes(&self) -> &[u8]
    {
        &self.bytes
    }

    /// Whole content as UTF-8, or `None` for undecodable content.
    pub fn text(&self) -> Option<&str>
    {
        std::str::from_utf8(&self.bytes).ok()
    }

    pub fn line_count(&self) -> usize
    {
        self.index
            .line_count()
    }

    /// Text of a 1-based line.
    pub fn line(
        &self,
        line1: usize,
    ) -> Option<&str>
    {
        self.index
            .line_text(line1, self.text()?)
    }
}

/// A line identified by path, 1-based number and exact text.
///
/// The number is a hint; the text is the match key. Text is stored
/// whitespace-trimmed, the way blame and diff records carry it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LineLocation
{
    pub path: String,
    pub line: usize,
    pub text: String,
}

impl LineLocation
{
    pub fn new(
        path: impl Into<String>,
        line: usize,
        text: impl AsRef<str>,
    ) -> Self
    {
        Self {
            path: path.into(),
            line,
            text: text
                .as_ref()
                .trim()
                .to_string(),
        }
    }

    /// Same path and text, different line number.
    pub fn moved_to(
        &self,
        line: usize,
    ) -> Self
    {
        Self { path: self.path.clone(), line, text: self.text.clone() }
    }

    /// True when the number indexes into the snapshot and the text there
    /// matches the stored text.
    pub fn is_valid_for(
        &self,
        snapshot: &FileSnapshot,
    ) -> bool
    {
        snapshot
            .line(self.line)
            .is_some_and(|l| l.trim() == self.text)
    }
}

/// The function enclosing a resolved line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionUnit
{
    /// Qualified name (`Ns::Class::method` or plain `name`)
    pub name: String,
    /// Exact source text of the definition
    pub source: String,
    pub start_line: usize,
    pub end_line: usize,
}

/// One hypothesis that `commit` introduced the deleted line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BicRecord
{
    pub commit: CommitRef,
    /// Location recomputed against the BIC's own content
    pub location: LineLocation,
    /// The line as deleted by the fixing commit
    pub origin: LineLocation,
    pub function: FunctionUnit,
}

/// The defect still present at an intermediate commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LatentRecord
{
    pub commit: CommitRef,
    pub location: LineLocation,
    pub function: FunctionUnit,
    /// Commit of the BIC this record expands
    pub bic_commit: CommitRef,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordType
{
    Bic,
    Latent,
}

impl fmt::Display for RecordType
{
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result
    {
        match self
        {
            RecordType::Bic => f.write_str("bic"),
            RecordType::Latent => f.write_str("latent"),
        }
    }
}

/// Input to the deduplicator: one function snapshot and where it came from.
#[derive(Debug, Clone)]
pub struct FunctionRecord
{
    pub commit: CommitRef,
    pub record_type: RecordType,
    pub function: FunctionUnit,
    pub file_path: String,
    pub fixing_commit: CommitRef,
}

impl FunctionRecord
{
    pub fn from_bic(
        bic: &BicRecord,
        bfc: &CommitRef,
    ) -> Self
    {
        Self {
            commit: bic
                .commit
                .clone(),
            record_type: RecordType::Bic,
            function: bic
                .function
                .clone(),
            file_path: bic
                .location
                .path
                .clone(),
            fixing_commit: bfc.clone(),
        }
    }

    pub fn from_latent(
        latent: &LatentRecord,
        bfc: &CommitRef,
    ) -> Self
    {
        Self {
            commit: latent
                .commit
                .clone(),
            record_type: RecordType::Latent,
            function: latent
                .function
                .clone(),
            file_path: latent
                .location
                .path
                .clone(),
            fixing_commit: bfc.clone(),
        }
    }
}

/// Output row of the labeled dataset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabeledFunction
{
    pub commit: CommitRef,
    #[serde(rename = "type")]
    pub record_type: RecordType,
    pub function_name: String,
    pub fingerprint: String,
    pub normalized_source: String,
    pub label: u8,
    pub file_path: String,
    pub fixing_commit: CommitRef,
}

/// One `previous_commits` entry: (commit hash, line number, line text).
pub type PreviousCommit = (String, usize, String);

/// Per-line record of the intermediate exchange format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlameRecord
{
    pub line_num: usize,
    pub line_str: String,
    pub file_path: String,
    pub previous_commits: Vec<PreviousCommit>,
}

impl BlameRecord
{
    /// The deleted line as seen by the fixing commit.
    pub fn deleted_line(&self) -> LineLocation
    {
        LineLocation::new(&self.file_path, self.line_num, &self.line_str)
    }
}
