//! `locate` and `between`: single-query inspection commands.

use anyhow::{Context, Result};
use owo_colors::OwoColorize;
use serde_json::json;
use tabled::{Table, Tabled};
use tracing::instrument;

use crate::{
    cli::{AppContext, BetweenArgs, LocateArgs},
    core::{
        git::GitRepo,
        history::HistoryWalker,
        locate::FunctionLocator,
        model::LineLocation,
    },
    infra::config::Config,
};

/// Print the function enclosing `--file:--line` at `--commit`.
#[instrument(skip_all, fields(commit = %args.commit, file = %args.file, line = args.line))]
pub fn run_locate(
    args: LocateArgs,
    cfg: &Config,
    ctx: &AppContext,
) -> Result<()>
{
    let repo = GitRepo::open(&args.repo, cfg.git_options())
        .with_context(|| format!("Failed to open {}", args.repo.display()))?;
    let commit = repo
        .rev_parse(&args.commit)
        .with_context(|| format!("Unknown commit {}", args.commit))?;
    let locator = FunctionLocator::c_family(
        cfg.parser
            .max_source_bytes,
    );
    let key = LineLocation::new(&args.file, args.line, &args.text);

    let found = repo.with_session(|session| {
        let walker = HistoryWalker::new(session);
        walker
            .materialize(&args.file, &commit)
            .and_then(|snapshot| locator.locate(&snapshot, &key))
    })?;

    let Some((location, function)) = found
    else
    {
        if args.json
        {
            println!("{}", json!({ "status": "not_found", "commit": commit, "location": key }));
        }
        else if ctx.no_color
        {
            println!("NotFound: no function encloses {}:{} at {}", key.path, key.line, commit.short());
        }
        else
        {
            println!(
                "{} no function encloses {}:{} at {}",
                "NotFound".red().bold(),
                key.path,
                key.line,
                commit.short()
            );
        }
        return Ok(());
    };

    if args.json
    {
        let out = json!({
            "status": "found",
            "commit": commit,
            "location": location,
            "function": function,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    if !ctx.quiet
    {
        let moved = if location.line == key.line
        {
            String::new()
        }
        else
        {
            format!(" (re-anchored from {})", key.line)
        };

        let header = format!(
            "Found {} [{}..{}] at {}:{}{}",
            function.name,
            function.start_line,
            function.end_line,
            location.path,
            location.line,
            moved
        );

        if ctx.no_color
        {
            println!("{header}");
        }
        else
        {
            println!("{}", header.green());
        }
    }
    println!("{}", function.source);

    Ok(())
}

#[derive(Tabled)]
struct CommitRow
{
    #[tabled(rename = "#")]
    index: usize,
    commit: String,
}

/// Print the commits strictly between `--older` and `--newer`.
pub fn run_between(
    args: BetweenArgs,
    cfg: &Config,
    ctx: &AppContext,
) -> Result<()>
{
    let repo = GitRepo::open(&args.repo, cfg.git_options())
        .with_context(|| format!("Failed to open {}", args.repo.display()))?;
    let older = repo
        .rev_parse(&args.older)
        .with_context(|| format!("Unknown commit {}", args.older))?;
    let newer = repo
        .rev_parse(&args.newer)
        .with_context(|| format!("Unknown commit {}", args.newer))?;

    let commits = repo.with_session(|session| {
        let walker = HistoryWalker::new(session);
        match &args.path
        {
            Some(p) => walker.ancestors_touching(&older, &newer, p),
            None => walker.ancestors_between(&older, &newer),
        }
    })?;

    // Plain hashes for scripting
    if ctx.quiet
    {
        for c in &commits
        {
            println!("{c}");
        }
        return Ok(());
    }

    let rows: Vec<CommitRow> = commits
        .iter()
        .enumerate()
        .map(|(i, c)| CommitRow { index: i + 1, commit: c.to_string() })
        .collect();
    println!("{}", Table::new(rows));

    Ok(())
}
