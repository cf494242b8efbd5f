//! Multi-project runner.
//!
//! Each project is one unit of work on a bounded rayon pool. A unit owns
//! its repository for its whole run (see [`GitRepo::with_session`]);
//! units share nothing else. A failing or panicking unit is reported in
//! the summary and never stops its siblings.

use std::{
    panic::{AssertUnwindSafe, catch_unwind},
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use indicatif::ProgressBar;
use owo_colors::OwoColorize;
use rayon::prelude::*;
use serde::Deserialize;
use tabled::{Table, Tabled};
use tracing::{error, info, instrument, warn};

use crate::{
    core::{
        git::GitRepo,
        impacted::ImpactScanner,
        locate::FunctionLocator,
        model::CommitRef,
        output::{self, BlameReport, DatasetFormat, ProjectPaths},
        pipeline::{self, PipelineOptions, ProjectStats},
    },
    infra::config::Config,
};

/// `{"projects": [...]}` manifest of a batch run.
#[derive(Debug, Clone, Deserialize)]
pub struct Manifest
{
    pub projects: Vec<ProjectSpec>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProjectSpec
{
    pub name: String,
    /// Local checkout; defaults to `<repos_dir>/<name>`
    #[serde(default)]
    pub repo: Option<PathBuf>,
    /// Cloned into `repo` when the checkout is missing
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub fixing_commits: Vec<String>,
    /// Precomputed deleted-line records; skips the diff/blame pass
    #[serde(default)]
    pub records: Option<PathBuf>,
}

impl Manifest
{
    /// Read a manifest; relative `repo`/`records` paths resolve against
    /// the manifest's directory.
    pub fn load(path: &Path) -> Result<Self>
    {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read manifest {}", path.display()))?;
        let mut manifest: Manifest = serde_json::from_str(&text)
            .with_context(|| format!("Failed to parse manifest {}", path.display()))?;

        let base = path
            .parent()
            .unwrap_or_else(|| Path::new("."));

        for p in &mut manifest.projects
        {
            if let Some(repo) = &mut p.repo
                && repo.is_relative()
            {
                *repo = base.join(&*repo);
            }
            if let Some(records) = &mut p.records
                && records.is_relative()
            {
                *records = base.join(&*records);
            }
        }

        Ok(manifest)
    }
}

/// Per-invocation switches layered over [`Config`].
#[derive(Debug, Clone, Default)]
pub struct RunOptions
{
    pub force: bool,
    pub format: DatasetFormat,
    pub quiet: bool,
}

#[derive(Debug, Clone)]
pub enum ProjectStatus
{
    Done(ProjectStats),
    Skipped,
    Failed(String),
}

#[derive(Debug, Clone)]
pub struct ProjectOutcome
{
    pub name: String,
    pub status: ProjectStatus,
}

/// Open `spec`'s repository, cloning it first if needed.
pub fn open_repo(
    spec: &ProjectSpec,
    cfg: &Config,
) -> Result<GitRepo>
{
    let path = spec
        .repo
        .clone()
        .unwrap_or_else(|| {
            cfg.repos_dir()
                .join(&spec.name)
        });

    if !path.exists()
    {
        let url = spec
            .url
            .as_deref()
            .with_context(|| format!("repository {} is missing and no url is given", path.display()))?;

        info!(url, dest = %path.display(), "cloning");
        GitRepo::clone_from(url, &path, cfg.clone_timeout())
            .with_context(|| format!("Failed to clone {url}"))?;
    }

    GitRepo::open(&path, cfg.git_options()).with_context(|| format!("Failed to open {}", path.display()))
}

/// Deleted-line records of `fixing_commits`, straight from the repository.
///
/// Hashes that do not name a commit are logged and skipped.
pub fn scan_fixing_commits(
    repo: &GitRepo,
    fixing_commits: &[String],
    cfg: &Config,
) -> BlameReport
{
    let scanner = ImpactScanner::new(
        repo,
        &cfg.trace
            .extensions,
        cfg.trace
            .skip_comment_lines,
    );
    let mut report = BlameReport::new();

    for raw in fixing_commits
    {
        let bfc = match repo.rev_parse(raw.trim())
        {
            Ok(c) => c,
            Err(e) =>
            {
                warn!(commit = %raw, error = %e, "unknown fixing commit");
                continue;
            }
        };

        let records = scanner.scan(&bfc);
        report
            .entry(bfc)
            .or_default()
            .extend(records);
    }

    report
}

/// Full run of one project: records, labeling, dataset files.
#[instrument(level = "info", skip_all, fields(project = %spec.name))]
pub fn run_project(
    spec: &ProjectSpec,
    cfg: &Config,
    opts: &RunOptions,
    progress: &ProgressBar,
) -> Result<ProjectStats>
{
    let paths = ProjectPaths::new(&cfg.results_dir(), &spec.name);
    let repo = open_repo(spec, cfg)?;

    let (report, malformed) = match &spec.records
    {
        Some(path) =>
        {
            let loaded = output::read_report(path)?;
            (loaded.report, loaded.malformed)
        }
        None =>
        {
            let report = scan_fixing_commits(&repo, &spec.fixing_commits, cfg);
            output::write_report(&report, &paths.report)?;
            (report, 0)
        }
    };

    info!(bfcs = report.len(), "records ready");

    let locator = FunctionLocator::c_family(
        cfg.parser
            .max_source_bytes,
    );
    let options = PipelineOptions {
        only_touching_path: cfg
            .latent
            .only_touching_path,
    };

    let mut out = repo
        .with_session(|session| pipeline::label_report(session, &locator, &report, &options, progress))
        .with_context(|| format!("Failed to lock {}", repo.root().display()))?;
    out.stats
        .malformed = malformed;

    output::write_dataset(&out.rows, &paths, opts.format)?;

    Ok(out.stats)
}

fn run_unit(
    spec: &ProjectSpec,
    cfg: &Config,
    opts: &RunOptions,
) -> ProjectOutcome
{
    let name = spec
        .name
        .clone();
    let paths = ProjectPaths::new(&cfg.results_dir(), &spec.name);

    if !opts.force
        && paths
            .marker(opts.format)
            .exists()
    {
        info!(project = %name, "already labeled, skipping");
        return ProjectOutcome { name, status: ProjectStatus::Skipped };
    }

    let result = catch_unwind(AssertUnwindSafe(|| run_project(spec, cfg, opts, &ProgressBar::hidden())));

    let status = match result
    {
        Ok(Ok(stats)) => ProjectStatus::Done(stats),
        Ok(Err(e)) =>
        {
            let reason = format!("{e:#}");
            error!(project = %name, error = %reason, "project failed");
            ProjectStatus::Failed(reason)
        }
        Err(panic) =>
        {
            let msg = panic
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| {
                    panic
                        .downcast_ref::<String>()
                        .cloned()
                })
                .unwrap_or_else(|| "panic".to_string());
            error!(project = %name, panic = %msg, "project panicked");
            ProjectStatus::Failed(format!("panic: {msg}"))
        }
    };

    ProjectOutcome { name, status }
}

/// Run every project of `manifest` on `cfg.workers` threads.
///
/// Outcomes come back in manifest order.
pub fn run_batch(
    manifest: &Manifest,
    cfg: &Config,
    opts: &RunOptions,
) -> Result<Vec<ProjectOutcome>>
{
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(cfg.workers.max(1))
        .thread_name(|i| format!("vszz-worker-{i}"))
        .build()
        .context("Failed to build worker pool")?;

    let progress = pipeline::progress_bar(manifest.projects.len(), opts.quiet);

    let outcomes = pool.install(|| {
        manifest
            .projects
            .par_iter()
            .map(|spec| {
                let outcome = run_unit(spec, cfg, opts);
                progress.inc(1);
                progress.set_message(spec.name.clone());
                outcome
            })
            .collect()
    });

    progress.finish_with_message("done");
    Ok(outcomes)
}

#[derive(Tabled)]
struct SummaryRow
{
    #[tabled(rename = "project")]
    name: String,
    status: String,
    #[tabled(rename = "lines")]
    deleted_lines: String,
    #[tabled(rename = "bic")]
    bics: String,
    #[tabled(rename = "latent")]
    latents: String,
    rows: String,
    resolved: String,
    unresolved: String,
}

/// Resolved vs unresolved table, one row per project.
pub fn render_summary(
    outcomes: &[ProjectOutcome],
    no_color: bool,
) -> String
{
    let paint = |text: &str, ok: bool| -> String {
        match (no_color, ok)
        {
            (true, _) => text.to_string(),
            (false, true) => text
                .green()
                .to_string(),
            (false, false) => text
                .red()
                .to_string(),
        }
    };

    let rows: Vec<SummaryRow> = outcomes
        .iter()
        .map(|o| match &o.status
        {
            ProjectStatus::Done(s) => SummaryRow {
                name: o
                    .name
                    .clone(),
                status: paint("done", true),
                deleted_lines: s
                    .deleted_lines
                    .to_string(),
                bics: s
                    .bic_records
                    .to_string(),
                latents: s
                    .latent_records
                    .to_string(),
                rows: s
                    .labeled_rows
                    .to_string(),
                resolved: s
                    .resolved()
                    .to_string(),
                unresolved: s
                    .unresolved()
                    .to_string(),
            },
            ProjectStatus::Skipped => SummaryRow {
                name: o
                    .name
                    .clone(),
                status: "skipped".to_string(),
                deleted_lines: "-".into(),
                bics: "-".into(),
                latents: "-".into(),
                rows: "-".into(),
                resolved: "-".into(),
                unresolved: "-".into(),
            },
            ProjectStatus::Failed(reason) => SummaryRow {
                name: o
                    .name
                    .clone(),
                status: paint(&format!("failed: {reason}"), false),
                deleted_lines: "-".into(),
                bics: "-".into(),
                latents: "-".into(),
                rows: "-".into(),
                resolved: "-".into(),
                unresolved: "-".into(),
            },
        })
        .collect();

    Table::new(rows).to_string()
}

/// Commit list from a file: one hash per line, `#` comments allowed.
pub fn read_commit_list(path: &Path) -> Result<Vec<String>>
{
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    Ok(text
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .map(str::to_string)
        .collect())
}

/// Deduplicate fixing commits while keeping input order.
pub fn unique_commits(commits: impl IntoIterator<Item = String>) -> Vec<CommitRef>
{
    let mut seen = indexmap::IndexSet::new();

    for c in commits
    {
        seen.insert(CommitRef::new(c));
    }

    seen.into_iter()
        .collect()
}
