//! `run`, `trace` and `label`: dataset-producing commands.

use anyhow::{Context, Result};
use owo_colors::OwoColorize;

use crate::{
    cli::{AppContext, LabelArgs, RunArgs, TraceArgs},
    core::{
        batch::{self, Manifest, ProjectStatus, RunOptions},
        git::GitRepo,
        locate::FunctionLocator,
        output::{self, BlameReport},
        pipeline::{self, PipelineOptions, ProjectStats},
    },
    infra::config::Config,
};

pub fn run_batch(
    args: RunArgs,
    mut cfg: Config,
    ctx: &AppContext,
) -> Result<()>
{
    if let Some(w) = args.workers
    {
        cfg.workers = w.max(1);
    }

    let manifest = Manifest::load(&args.manifest)?;
    let opts = RunOptions {
        force: args.force,
        format: args
            .format
            .unwrap_or(cfg.output.format),
        quiet: ctx.quiet,
    };

    let outcomes = batch::run_batch(&manifest, &cfg, &opts)?;

    if !ctx.quiet
    {
        println!("{}", batch::render_summary(&outcomes, ctx.no_color));
    }

    let failed = outcomes
        .iter()
        .filter(|o| matches!(o.status, ProjectStatus::Failed(_)))
        .count();
    if failed > 0 && !ctx.quiet
    {
        let msg = format!("{failed} of {} projects failed", outcomes.len());
        if ctx.no_color
        {
            eprintln!("{msg}");
        }
        else
        {
            eprintln!("{}", msg.yellow());
        }
    }

    Ok(())
}

pub fn run_trace(
    args: TraceArgs,
    cfg: &Config,
    ctx: &AppContext,
) -> Result<()>
{
    let mut raw = args.bfcs;
    if let Some(path) = &args.bfc_file
    {
        raw.extend(batch::read_commit_list(path)?);
    }
    if raw.is_empty()
    {
        anyhow::bail!("No fixing commits given (use --bfc or --bfc-file)");
    }

    let commits: Vec<String> = batch::unique_commits(raw)
        .into_iter()
        .map(|c| c.to_string())
        .collect();

    let repo = GitRepo::open(&args.repo, cfg.git_options())
        .with_context(|| format!("Failed to open {}", args.repo.display()))?;
    let report = batch::scan_fixing_commits(&repo, &commits, cfg);

    if let Some(path) = &args.records_out
    {
        output::write_report(&report, path)?;
    }

    label_and_write(&repo, &report, 0, &args.output, cfg, ctx)
}

pub fn run_label(
    args: LabelArgs,
    cfg: &Config,
    ctx: &AppContext,
) -> Result<()>
{
    let repo = GitRepo::open(&args.repo, cfg.git_options())
        .with_context(|| format!("Failed to open {}", args.repo.display()))?;
    let loaded = output::read_report(&args.records)?;

    label_and_write(&repo, &loaded.report, loaded.malformed, &args.output, cfg, ctx)
}

fn label_and_write(
    repo: &GitRepo,
    report: &BlameReport,
    malformed: usize,
    csv: &std::path::Path,
    cfg: &Config,
    ctx: &AppContext,
) -> Result<()>
{
    let locator = FunctionLocator::c_family(
        cfg.parser
            .max_source_bytes,
    );
    let options = PipelineOptions {
        only_touching_path: cfg
            .latent
            .only_touching_path,
    };
    let progress = pipeline::progress_bar(report.len(), ctx.quiet);

    let mut out = repo.with_session(|session| pipeline::label_report(session, &locator, report, &options, &progress))?;
    out.stats
        .malformed = malformed;
    progress.finish_and_clear();

    output::write_csv(&out.rows, csv)?;

    if !ctx.quiet
    {
        print_stats(&out.stats, csv, ctx);
    }

    Ok(())
}

fn print_stats(
    stats: &ProjectStats,
    csv: &std::path::Path,
    ctx: &AppContext,
)
{
    let line = format!(
        "Wrote {} rows to {} ({} BIC, {} latent, {} duplicates; {} resolved, {} unresolved, {} malformed)",
        stats.labeled_rows,
        csv.display(),
        stats.bic_records,
        stats.latent_records,
        stats.duplicates,
        stats.resolved(),
        stats.unresolved(),
        stats.malformed
    );

    if ctx.no_color
    {
        println!("{line}");
    }
    else
    {
        println!("{} {}", "✓".green(), line);
    }
}
