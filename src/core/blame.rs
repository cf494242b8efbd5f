//! Bug-introducing commit tracing.
//!
//! For a line deleted by a fixing commit, each candidate ancestor from the
//! upstream blame step is checked structurally: the file is materialized
//! at the ancestor, the line is re-anchored against that content and must
//! resolve to an enclosing function that contains it verbatim. Every
//! ancestor that passes is kept; ranking is left to consumers.

use tracing::{debug, instrument};

use crate::core::{
    git::Vcs,
    history::HistoryWalker,
    locate::FunctionLocator,
    model::{BicRecord, CommitRef, LineLocation, PreviousCommit},
};

/// A candidate ancestor, optionally with the line as blame saw it there.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ancestor
{
    pub commit: CommitRef,
    /// Line number and text at `commit`; falls back to the deleted line
    pub line: Option<(usize, String)>,
}

impl Ancestor
{
    pub fn new(commit: CommitRef) -> Self
    {
        Self { commit, line: None }
    }

    /// Search key used at this ancestor.
    fn key(
        &self,
        deleted: &LineLocation,
    ) -> LineLocation
    {
        match &self.line
        {
            Some((n, text)) => LineLocation::new(&deleted.path, *n, text),
            None => deleted.clone(),
        }
    }
}

impl From<&PreviousCommit> for Ancestor
{
    fn from((hash, line, text): &PreviousCommit) -> Self
    {
        Self { commit: CommitRef::new(hash.as_str()), line: Some((*line, text.clone())) }
    }
}

/// Result of tracing one deleted line.
#[derive(Debug, Clone, Default)]
pub struct TraceOutcome
{
    pub bics: Vec<BicRecord>,
    /// Ancestors examined
    pub attempts: usize,
    /// Ancestors that resolved to a function
    pub resolved: usize,
}

pub struct BlameTracer<'a, V: Vcs + ?Sized>
{
    walker: &'a HistoryWalker<'a, V>,
    locator: &'a FunctionLocator,
}

impl<'a, V: Vcs + ?Sized> BlameTracer<'a, V>
{
    pub fn new(
        walker: &'a HistoryWalker<'a, V>,
        locator: &'a FunctionLocator,
    ) -> Self
    {
        Self { walker, locator }
    }

    /// Candidate BICs for `deleted`, in ancestor order, without duplicates.
    #[instrument(level = "debug", skip_all, fields(bfc = %bfc.short(), path = %deleted.path, line = deleted.line))]
    pub fn trace(
        &self,
        bfc: &CommitRef,
        deleted: &LineLocation,
        ancestors: &[Ancestor],
    ) -> TraceOutcome
    {
        let mut outcome = TraceOutcome::default();

        for ancestor in ancestors
        {
            if &ancestor.commit == bfc
            {
                continue;
            }

            outcome.attempts += 1;

            let Some(snapshot) = self
                .walker
                .materialize(&deleted.path, &ancestor.commit)
            else
            {
                continue;
            };

            let key = ancestor.key(deleted);
            let Some((location, function)) = self
                .locator
                .locate(&snapshot, &key)
            else
            {
                debug!(ancestor = %ancestor.commit.short(), "ancestor does not resolve");
                continue;
            };

            outcome.resolved += 1;

            let record = BicRecord {
                commit: ancestor
                    .commit
                    .clone(),
                location,
                origin: deleted.clone(),
                function,
            };

            if !outcome
                .bics
                .contains(&record)
            {
                outcome
                    .bics
                    .push(record);
            }
        }

        outcome
    }
}
