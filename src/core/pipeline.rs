//! Per-repository labeling pass.
//!
//! Runs every deleted-line record of a [`BlameReport`] through the BIC
//! tracer, expands each BIC into its latent commits, and folds the record
//! stream (all BICs first, then all latents) into labeled rows.

use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use tracing::{info, instrument};

use crate::core::{
    blame::{Ancestor, BlameTracer},
    dedupe::ResultDeduplicator,
    git::Vcs,
    history::HistoryWalker,
    latent::LatentExpander,
    locate::FunctionLocator,
    model::{BicRecord, CommitRef, FunctionRecord, LabeledFunction},
    output::BlameReport,
};

/// Counters of one labeling pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProjectStats
{
    pub fixing_commits: usize,
    pub deleted_lines: usize,
    /// Ancestors examined, plus one per line with no ancestor at all
    pub trace_attempts: usize,
    pub trace_resolved: usize,
    /// Deleted lines that yielded no BIC
    pub lines_unresolved: usize,
    pub latent_attempts: usize,
    pub latent_resolved: usize,
    pub bic_records: usize,
    pub latent_records: usize,
    pub duplicates: usize,
    pub labeled_rows: usize,
    /// Input records skipped as malformed before the pass
    pub malformed: usize,
}

impl ProjectStats
{
    pub fn resolved(&self) -> usize
    {
        self.trace_resolved + self.latent_resolved
    }

    pub fn unresolved(&self) -> usize
    {
        (self.trace_attempts - self.trace_resolved) + (self.latent_attempts - self.latent_resolved)
    }
}

#[derive(Debug, Clone, Default)]
pub struct PipelineOptions
{
    pub only_touching_path: bool,
}

#[derive(Debug, Default)]
pub struct PipelineOutput
{
    pub rows: Vec<LabeledFunction>,
    pub stats: ProjectStats,
}

/// Progress bar over fixing commits; hidden when `quiet`.
pub fn progress_bar(
    len: usize,
    quiet: bool,
) -> ProgressBar
{
    if quiet
    {
        return ProgressBar::hidden();
    }

    let pb = ProgressBar::new(len as u64);
    let style = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("#>-");
    pb.set_style(style);
    pb
}

/// Label every record of `report` against `vcs`.
///
/// Never fails: unresolvable lines and commits only show up in the
/// counters.
#[instrument(level = "info", skip_all, fields(bfcs = report.len()))]
pub fn label_report<V: Vcs + ?Sized>(
    vcs: &V,
    locator: &FunctionLocator,
    report: &BlameReport,
    options: &PipelineOptions,
    progress: &ProgressBar,
) -> PipelineOutput
{
    let walker = HistoryWalker::new(vcs);
    let tracer = BlameTracer::new(&walker, locator);
    let expander = LatentExpander::new(&walker, locator).only_touching_path(options.only_touching_path);

    let mut stats = ProjectStats { fixing_commits: report.len(), ..Default::default() };
    let mut bics: Vec<(&CommitRef, BicRecord)> = Vec::new();

    for (bfc, records) in report
    {
        progress.set_message(format!("tracing {}", bfc.short()));

        for record in records
        {
            stats.deleted_lines += 1;

            let ancestors: Vec<Ancestor> = record
                .previous_commits
                .iter()
                .map(Ancestor::from)
                .collect();

            if ancestors.is_empty()
            {
                stats.trace_attempts += 1;
                stats.lines_unresolved += 1;
                continue;
            }

            let outcome = tracer.trace(bfc, &record.deleted_line(), &ancestors);
            // A line whose only ancestor is the fix itself still counts once
            stats.trace_attempts += outcome
                .attempts
                .max(1);
            stats.trace_resolved += outcome.resolved;

            if outcome
                .bics
                .is_empty()
            {
                stats.lines_unresolved += 1;
            }

            bics.extend(
                outcome
                    .bics
                    .into_iter()
                    .map(|b| (bfc, b)),
            );
        }

        progress.inc(1);
    }

    let mut dedup = ResultDeduplicator::new();
    stats.bic_records = bics.len();

    for (bfc, bic) in &bics
    {
        dedup.push(FunctionRecord::from_bic(bic, bfc));
    }

    progress.set_message("expanding latent commits");

    for (bfc, bic) in &bics
    {
        let outcome = expander.expand(bic, bfc);
        stats.latent_attempts += outcome.attempts;
        stats.latent_resolved += outcome
            .latents
            .len();

        for latent in &outcome.latents
        {
            dedup.push(FunctionRecord::from_latent(latent, bfc));
        }
    }

    stats.latent_records = stats.latent_resolved;
    stats.duplicates = dedup.dropped();

    let rows = dedup.into_rows();
    stats.labeled_rows = rows.len();

    info!(
        bics = stats.bic_records,
        latents = stats.latent_records,
        rows = stats.labeled_rows,
        unresolved = stats.unresolved(),
        "labeling pass complete"
    );

    PipelineOutput { rows, stats }
}

#[cfg(test)]
mod tests
{
    use std::collections::HashMap;

    use super::*;
    use crate::core::{
        git::VcsError,
        model::{BlameRecord, RecordType},
    };

    /// History a -> b -> c -> d -> fix, one file `a.c`.
    struct Line
    {
        files: HashMap<&'static str, &'static str>,
    }

    const ORDER: [&str; 5] = ["a", "b", "c", "d", "fix"];

    impl Vcs for Line
    {
        fn log_range(
            &self,
            older: &CommitRef,
            newer: &CommitRef,
            _path: Option<&str>,
        ) -> Result<Vec<CommitRef>, VcsError>
        {
            let pos = |c: &CommitRef| {
                ORDER
                    .iter()
                    .position(|x| *x == c.as_str())
                    .ok_or_else(|| VcsError::NotARepository(c.as_str().into()))
            };
            let (lo, hi) = (pos(older)?, pos(newer)?);

            Ok(ORDER[lo + 1..=hi]
                .iter()
                .rev()
                .map(|s| CommitRef::new(*s))
                .collect())
        }

        fn file_at(
            &self,
            commit: &CommitRef,
            _path: &str,
        ) -> Result<Option<Vec<u8>>, VcsError>
        {
            Ok(self
                .files
                .get(commit.as_str())
                .map(|s| s.as_bytes().to_vec()))
        }
    }

    const V1: &str = "void bar(int x)\n{\n    foo(x);\n}\n";
    const V2: &str = "void bar(int x)\n{\n    log();\n    foo(x);\n}\n";

    fn report() -> BlameReport
    {
        let mut r = BlameReport::new();
        r.insert(
            CommitRef::new("fix"),
            vec![
                BlameRecord {
                    line_num: 4,
                    line_str: "foo(x);".into(),
                    file_path: "a.c".into(),
                    previous_commits: vec![("b".into(), 3, "foo(x);".into())],
                },
                BlameRecord {
                    line_num: 9,
                    line_str: "gone();".into(),
                    file_path: "a.c".into(),
                    previous_commits: vec![],
                },
            ],
        );
        r
    }

    #[test]
    fn bics_precede_latents_and_duplicates_collapse()
    {
        let vcs = Line { files: HashMap::from([("b", V1), ("c", V1), ("d", V2)]) };
        let locator = FunctionLocator::c_family(1 << 20);

        let out = label_report(
            &vcs,
            &locator,
            &report(),
            &PipelineOptions::default(),
            &ProgressBar::hidden(),
        );

        let got: Vec<(&str, RecordType)> = out
            .rows
            .iter()
            .map(|r| (r.commit.as_str(), r.record_type))
            .collect();

        // c has the same body as b; d adds a statement
        assert_eq!(got, vec![("b", RecordType::Bic), ("d", RecordType::Latent)]);
        assert_eq!(out.stats.bic_records, 1);
        assert_eq!(out.stats.latent_records, 2);
        assert_eq!(out.stats.duplicates, 1);
        assert_eq!(out.stats.lines_unresolved, 1);
        assert_eq!(out.stats.unresolved(), 1);
    }

    #[test]
    fn rerun_is_identical()
    {
        let vcs = Line { files: HashMap::from([("b", V1), ("c", V2), ("d", V2)]) };
        let locator = FunctionLocator::c_family(1 << 20);
        let run = || {
            label_report(
                &vcs,
                &locator,
                &report(),
                &PipelineOptions::default(),
                &ProgressBar::hidden(),
            )
        };

        let (a, b) = (run(), run());

        assert_eq!(a.rows, b.rows);
        assert_eq!(a.stats, b.stats);
    }
}
