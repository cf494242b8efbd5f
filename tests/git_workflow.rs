//! Real-repository workflow: diff/blame records, labeling, CLI commands.
//!
//! Every test skips itself when no `git` binary is available.

mod util;

use assert_cmd::prelude::*;
use indicatif::ProgressBar;
use predicates::prelude::*;
use std::{
    panic::{AssertUnwindSafe, catch_unwind},
    process::Command,
};
use util::{GitFixture, git_available};
use vszz::{
    core::{
        CommitRef, FunctionLocator, GitOptions, GitRepo, HistoryWalker, MaterializeMode, RecordType, Vcs,
        batch::scan_fixing_commits, label_report, pipeline::PipelineOptions,
    },
    infra::Config,
};

const BASE: &str = "int helper(void)\n{\n    return 1;\n}\n";
const BIC: &str = "int helper(void)\n{\n    return 1;\n}\n\nvoid bar(int x)\n{\n    foo(x);\n}\n";
const M3: &str = "int helper(void)\n{\n    return 1;\n}\n\nvoid bar(int x)\n{\n    log(x);\n    foo(x);\n}\n";
const FIX: &str = "int helper(void)\n{\n    return 1;\n}\n\nvoid bar(int x)\n{\n    log(x);\n}\n";

struct History
{
    fx: GitFixture,
    bic: String,
    m1: String,
    m3: String,
    fix: String,
}

fn history() -> History
{
    let fx = GitFixture::new();
    fx.commit("base", &[("src/a.c", BASE)]);
    let bic = fx.commit("introduce bar", &[("src/a.c", BIC)]);
    let m1 = fx.commit("unrelated", &[("src/b.c", "int unrelated;\n"), ("README", "notes\n")]);
    let m3 = fx.commit("log calls", &[("src/a.c", M3)]);
    let fix = fx.commit("fix CVE", &[("src/a.c", FIX), ("README", "notes\nfixed\n")]);

    History { fx, bic, m1, m3, fix }
}

fn vszz() -> Command
{
    Command::cargo_bin("vszz").expect("vszz binary")
}

#[test]
fn deleted_line_blames_to_introducing_commit()
{
    if !git_available()
    {
        println!("Git not available, skipping test");
        return;
    }

    let h = history();
    let repo = GitRepo::open(h.fx.path(), GitOptions::default()).unwrap();
    let report = scan_fixing_commits(&repo, &[h.fix.clone()], &Config::default());

    let records = &report[0];
    assert_eq!(records.len(), 1, "README change must be ignored");
    assert_eq!(records[0].file_path, "src/a.c");
    assert_eq!(records[0].line_num, 9);
    assert_eq!(records[0].line_str, "foo(x);");
    assert_eq!(records[0].previous_commits, vec![(h.bic.clone(), 8, "foo(x);".to_string())]);
}

#[test]
fn checkout_session_restores_working_tree()
{
    if !git_available()
    {
        println!("Git not available, skipping test");
        return;
    }

    let h = history();
    let repo = GitRepo::open(
        h.fx.path(),
        GitOptions { materialize: MaterializeMode::Checkout, ..GitOptions::default() },
    )
    .unwrap();

    let mid = repo
        .with_session(|s| s.file_at(&h.m1.as_str().into(), "src/a.c"))
        .unwrap()
        .unwrap()
        .unwrap();

    assert_eq!(String::from_utf8(mid).unwrap(), BIC);
    assert_eq!(std::fs::read_to_string(h.fx.path().join("src/a.c")).unwrap(), FIX);
    assert_eq!(h.fx.git(&["status", "--porcelain"]), "");
}

#[test]
fn checkout_of_path_deleted_at_head_leaves_no_trace()
{
    if !git_available()
    {
        println!("Git not available, skipping test");
        return;
    }

    let fx = GitFixture::new();
    fx.commit("base", &[("src/a.c", BASE)]);
    let added = fx.commit("add old", &[("src/old.c", "int old;\n")]);
    fx.git(&["rm", "--quiet", "src/old.c"]);
    fx.git(&["commit", "--quiet", "-m", "drop old"]);

    let repo = GitRepo::open(fx.path(), GitOptions::default()).unwrap();
    let old = repo
        .with_session(|s| s.file_at(&added.as_str().into(), "src/old.c"))
        .unwrap()
        .unwrap();

    assert_eq!(old.as_deref(), Some(&b"int old;\n"[..]));
    assert_eq!(fx.git(&["status", "--porcelain"]), "");
    assert!(
        !fx.path()
            .join("src/old.c")
            .exists()
    );
}

#[test]
fn panicking_session_still_restores_working_tree()
{
    if !git_available()
    {
        println!("Git not available, skipping test");
        return;
    }

    let h = history();
    let repo = GitRepo::open(h.fx.path(), GitOptions::default()).unwrap();

    let result = catch_unwind(AssertUnwindSafe(|| {
        repo.with_session(|s| {
            s.file_at(&h.bic.as_str().into(), "src/a.c")
                .unwrap();
            panic!("worker failed mid-session");
        })
    }));

    assert!(result.is_err());
    assert_eq!(std::fs::read_to_string(h.fx.path().join("src/a.c")).unwrap(), FIX);
    assert_eq!(h.fx.git(&["status", "--porcelain"]), "");
    // The lock is usable again
    assert!(
        repo.with_session(|_| ())
            .is_ok()
    );
}

#[test]
fn merged_side_branch_commits_are_not_latent()
{
    if !git_available()
    {
        println!("Git not available, skipping test");
        return;
    }

    let fx = GitFixture::new();
    let base = fx.commit("base", &[("src/a.c", BASE)]);
    let bic = fx.commit("introduce bar", &[("src/a.c", BIC)]);
    fx.git(&["checkout", "--quiet", "-b", "side", &base]);
    let side = fx.commit("side work", &[("src/side.c", "int side;\n")]);
    fx.git(&["checkout", "--quiet", "-"]);
    let m3 = fx.commit("log calls", &[("src/a.c", M3)]);
    fx.git(&["merge", "--quiet", "--no-ff", "--no-edit", "side"]);
    let merge = fx.git(&["rev-parse", "HEAD"]);
    let fix = fx.commit("fix CVE", &[("src/a.c", FIX)]);

    let repo = GitRepo::open(fx.path(), GitOptions::default()).unwrap();
    let report = scan_fixing_commits(&repo, &[fix.clone()], &Config::default());
    let locator = FunctionLocator::c_family(1 << 20);

    let (between, out) = repo
        .with_session(|s| {
            let between: Vec<String> = HistoryWalker::new(s)
                .ancestors_between(&bic.as_str().into(), &fix.as_str().into())
                .iter()
                .map(CommitRef::to_string)
                .collect();
            let out = label_report(s, &locator, &report, &PipelineOptions::default(), &ProgressBar::hidden());
            (between, out)
        })
        .unwrap();

    assert_eq!(between.len(), 2);
    assert!(between.contains(&m3) && between.contains(&merge));
    assert!(!between.contains(&side));

    for row in &out.rows
    {
        match row.record_type
        {
            RecordType::Bic => assert_eq!(row.commit.as_str(), bic),
            RecordType::Latent => assert!(between.contains(&row.commit.to_string())),
        }
    }
    assert!(
        out.rows
            .iter()
            .any(|r| r.record_type == RecordType::Latent && r.commit.as_str() == m3)
    );
}

#[test]
fn trace_command_writes_dataset_and_records()
{
    if !git_available()
    {
        println!("Git not available, skipping test");
        return;
    }

    let h = history();
    let work = assert_fs::TempDir::new().unwrap();
    let csv = work
        .path()
        .join("out/labeled.csv");
    let records = work
        .path()
        .join("out/records.json");

    vszz()
        .current_dir(work.path())
        .args(["--quiet", "trace", "--repo"])
        .arg(h.fx.path())
        .args(["--bfc", &h.fix, "--output"])
        .arg(&csv)
        .arg("--records-out")
        .arg(&records)
        .assert()
        .success();

    let data = std::fs::read_to_string(&csv).unwrap();
    let lines: Vec<&str> = data
        .lines()
        .collect();

    assert_eq!(lines[0], "commit_hash,type,function_name,content_fingerprint,normalized_source,label");
    assert!(lines[1].starts_with(&format!("{},bic,bar,", h.bic)));
    assert!(data.contains(&format!("{},latent,bar,", h.m3)));
    // m1 leaves bar untouched
    assert!(!data.contains(&h.m1));

    let json = std::fs::read_to_string(&records).unwrap();
    assert!(json.contains(&h.fix));
}

#[test]
fn between_lists_intermediate_commits_oldest_first()
{
    if !git_available()
    {
        println!("Git not available, skipping test");
        return;
    }

    let h = history();

    vszz()
        .current_dir(h.fx.path())
        .args(["--quiet", "between", "--repo", ".", "--older", &h.bic, "--newer", &h.fix])
        .assert()
        .success()
        .stdout(format!("{}\n{}\n", h.m1, h.m3));

    vszz()
        .current_dir(h.fx.path())
        .args(["--quiet", "between", "--repo", ".", "--older", &h.bic, "--newer", &h.fix, "--path", "src/a.c"])
        .assert()
        .success()
        .stdout(format!("{}\n", h.m3));
}

#[test]
fn locate_reanchors_stale_line_numbers()
{
    if !git_available()
    {
        println!("Git not available, skipping test");
        return;
    }

    let h = history();

    vszz()
        .current_dir(h.fx.path())
        .args([
            "locate", "--repo", ".", "--commit", &h.m3, "--file", "src/a.c", "--line", "8", "--text", "foo(x);",
            "--json",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"status\": \"found\""))
        .stdout(predicate::str::contains("\"line\": 9"))
        .stdout(predicate::str::contains("\"name\": \"bar\""));

    vszz()
        .current_dir(h.fx.path())
        .args(["--no-color", "locate", "--repo", ".", "--commit", &h.bic, "--file", "src/a.c", "--line", "1", "--text", "nope();"])
        .assert()
        .success()
        .stdout(predicate::str::contains("NotFound"));
}

#[test]
fn run_command_labels_projects_and_resumes()
{
    if !git_available()
    {
        println!("Git not available, skipping test");
        return;
    }

    let h = history();
    let work = assert_fs::TempDir::new().unwrap();
    let manifest = work
        .path()
        .join("manifest.json");
    let body = serde_json::json!({
        "projects": [
            {"name": "demo", "repo": h.fx.path(), "fixing_commits": [h.fix]},
            {"name": "absent", "fixing_commits": ["abc"]}
        ]
    });
    std::fs::write(&manifest, body.to_string()).unwrap();

    vszz()
        .current_dir(work.path())
        .env("VSZZ_RESULTS_DIR", "results")
        .env("VSZZ_REPOS_DIR", "repos")
        .args(["--no-color", "run"])
        .arg(&manifest)
        .assert()
        .success()
        .stdout(predicate::str::contains("demo"))
        .stdout(predicate::str::contains("failed"));

    let results = work
        .path()
        .join("results");
    assert!(
        results
            .join("demo.csv")
            .exists()
    );
    assert!(
        results
            .join("demo-bic.json")
            .exists()
    );

    vszz()
        .current_dir(work.path())
        .env("VSZZ_RESULTS_DIR", "results")
        .args(["--no-color", "run"])
        .arg(&manifest)
        .assert()
        .success()
        .stdout(predicate::str::contains("skipped"));
}
