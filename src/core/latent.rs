//! Latent commit expansion: every commit between a BIC and its fix that
//! still carries the defective function.

use tracing::{debug, instrument};

use crate::core::{
    git::Vcs,
    history::HistoryWalker,
    locate::FunctionLocator,
    model::{BicRecord, CommitRef, LatentRecord},
};

/// Result of expanding one BIC.
#[derive(Debug, Clone, Default)]
pub struct ExpandOutcome
{
    pub latents: Vec<LatentRecord>,
    /// Intermediate commits examined
    pub attempts: usize,
}

pub struct LatentExpander<'a, V: Vcs + ?Sized>
{
    walker: &'a HistoryWalker<'a, V>,
    locator: &'a FunctionLocator,
    only_touching_path: bool,
}

impl<'a, V: Vcs + ?Sized> LatentExpander<'a, V>
{
    pub fn new(
        walker: &'a HistoryWalker<'a, V>,
        locator: &'a FunctionLocator,
    ) -> Self
    {
        Self { walker, locator, only_touching_path: false }
    }

    /// Skip intermediate commits that do not touch the BIC's file.
    pub fn only_touching_path(
        mut self,
        yes: bool,
    ) -> Self
    {
        self.only_touching_path = yes;
        self
    }

    /// Latent records for `bic`, oldest first, both endpoints excluded.
    ///
    /// The search key is the BIC's resolved location, not the fix-side
    /// one. Commits where the line no longer resolves are skipped.
    #[instrument(level = "debug", skip_all, fields(bic = %bic.commit.short(), bfc = %bfc.short()))]
    pub fn expand(
        &self,
        bic: &BicRecord,
        bfc: &CommitRef,
    ) -> ExpandOutcome
    {
        let path = &bic
            .location
            .path;

        let commits = if self.only_touching_path
        {
            self.walker
                .ancestors_touching(&bic.commit, bfc, path)
        }
        else
        {
            self.walker
                .ancestors_between(&bic.commit, bfc)
        };

        let mut outcome = ExpandOutcome { latents: Vec::new(), attempts: commits.len() };

        for commit in commits
        {
            let Some(snapshot) = self
                .walker
                .materialize(path, &commit)
            else
            {
                continue;
            };

            let Some((location, function)) = self
                .locator
                .locate(&snapshot, &bic.location)
            else
            {
                debug!(commit = %commit.short(), "line not resolvable at intermediate commit");
                continue;
            };

            outcome
                .latents
                .push(LatentRecord {
                    commit,
                    location,
                    function,
                    bic_commit: bic
                        .commit
                        .clone(),
                });
        }

        outcome
    }
}
