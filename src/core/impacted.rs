//! Upstream pass: deleted lines of a fixing commit and their blame.
//!
//! Produces the intermediate exchange records consumed by the pipeline:
//! one [`BlameRecord`] per deleted C-family source line, with the commit
//! that last touched the line before the fix.

use std::{path::Path, sync::OnceLock};

use regex::Regex;
use tracing::{debug, instrument, warn};

use crate::core::{
    git::GitRepo,
    model::{BlameRecord, CommitRef},
};

/// A line removed by a diff, numbered on the old side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeletedLine
{
    pub path: String,
    pub line: usize,
    pub text: String,
}

/// One hunk header of a unified diff.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct HunkHeader
{
    old_start: usize,
    old_count: usize,
    new_count: usize,
}

fn hunk_re() -> &'static Regex
{
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^@@ -(\d+)(?:,(\d+))? \+(\d+)(?:,(\d+))? @@").expect("static hunk regex")
    })
}

fn parse_hunk_header(line: &str) -> Option<HunkHeader>
{
    let caps = hunk_re().captures(line)?;
    let num = |i: usize, default: usize| {
        caps.get(i)
            .and_then(|m| {
                m.as_str()
                    .parse()
                    .ok()
            })
            .unwrap_or(default)
    };

    Some(HunkHeader { old_start: num(1, 0), old_count: num(2, 1), new_count: num(4, 1) })
}

/// Deleted lines of every file in a unified diff.
///
/// The old-side path is used (`--- a/...`); files added by the diff have
/// no old side and contribute nothing.
pub fn parse_deleted_lines(diff: &str) -> Vec<DeletedLine>
{
    let mut out = Vec::new();
    let mut old_path: Option<String> = None;
    let mut old_line = 0usize;
    let mut old_left = 0usize;
    let mut new_left = 0usize;

    for raw in diff.lines()
    {
        // Inside a hunk the counters decide what a line is
        if old_left > 0 || new_left > 0
        {
            match raw
                .chars()
                .next()
            {
                Some('-') =>
                {
                    if let Some(path) = &old_path
                    {
                        out.push(DeletedLine { path: path.clone(), line: old_line, text: raw[1..].to_string() });
                    }
                    old_line += 1;
                    old_left = old_left.saturating_sub(1);
                }
                Some('+') => new_left = new_left.saturating_sub(1),
                Some(' ') =>
                {
                    old_line += 1;
                    old_left = old_left.saturating_sub(1);
                    new_left = new_left.saturating_sub(1);
                }
                // "\ No newline at end of file"
                Some('\\') =>
                {}
                _ =>
                {
                    old_left = 0;
                    new_left = 0;
                }
            }
            continue;
        }

        if raw.starts_with("diff --git ")
        {
            old_path = None;
        }
        else if let Some(rest) = raw.strip_prefix("--- ")
        {
            old_path = rest
                .strip_prefix("a/")
                .map(str::to_string);
        }
        else if let Some(h) = parse_hunk_header(raw)
        {
            old_line = h.old_start;
            old_left = h.old_count;
            new_left = h.new_count;
        }
    }

    out
}

/// (previous commit, original line number, line text) from porcelain blame.
pub fn parse_blame_porcelain(out: &str) -> Option<(CommitRef, usize, String)>
{
    let mut lines = out.lines();
    let header = lines.next()?;
    let mut fields = header.split_whitespace();

    let sha = fields.next()?;
    let orig_line: usize = fields
        .next()?
        .parse()
        .ok()?;

    if sha.len() < 7
        || !sha
            .chars()
            .all(|c| c.is_ascii_hexdigit())
    {
        return None;
    }

    let text = lines.find_map(|l| l.strip_prefix('\t'))?;

    Some((CommitRef::new(sha), orig_line, text.trim().to_string()))
}

/// True for lines that carry no code: blank or comment-only.
pub fn is_trivial_line(
    text: &str,
    skip_comments: bool,
) -> bool
{
    let t = text.trim();

    if t.is_empty()
    {
        return true;
    }

    skip_comments
        && (t.starts_with("//") || t.starts_with("/*") || t.starts_with('*') || t.ends_with("*/") && !t.contains(';'))
}

/// Extension filter, case-insensitive, without the dot.
pub fn has_extension(
    path: &str,
    extensions: &[String],
) -> bool
{
    Path::new(path)
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| {
            extensions
                .iter()
                .any(|x| x.eq_ignore_ascii_case(e))
        })
}

/// Diff-and-blame scanner over one repository.
pub struct ImpactScanner<'a>
{
    repo: &'a GitRepo,
    extensions: &'a [String],
    skip_comments: bool,
}

impl<'a> ImpactScanner<'a>
{
    pub fn new(
        repo: &'a GitRepo,
        extensions: &'a [String],
        skip_comments: bool,
    ) -> Self
    {
        Self { repo, extensions, skip_comments }
    }

    /// Blame records for every deleted source line of `bfc`.
    ///
    /// Root commits and unreadable diffs give no records; a line whose
    /// blame fails keeps an empty `previous_commits`.
    #[instrument(level = "debug", skip(self), fields(bfc = %bfc.short()))]
    pub fn scan(
        &self,
        bfc: &CommitRef,
    ) -> Vec<BlameRecord>
    {
        let parent = match self
            .repo
            .parent(bfc)
        {
            Ok(Some(p)) => p,
            Ok(None) =>
            {
                debug!("root commit has no deleted lines");
                return Vec::new();
            }
            Err(e) =>
            {
                warn!(error = %e, "fixing commit not found");
                return Vec::new();
            }
        };

        let diff = match self
            .repo
            .diff_unified0(&parent, bfc)
        {
            Ok(d) => d,
            Err(e) =>
            {
                warn!(error = %e, "diff unavailable");
                return Vec::new();
            }
        };

        parse_deleted_lines(&diff)
            .into_iter()
            .filter(|d| has_extension(&d.path, self.extensions))
            .filter(|d| !is_trivial_line(&d.text, self.skip_comments))
            .map(|d| self.blame(&parent, d))
            .collect()
    }

    fn blame(
        &self,
        parent: &CommitRef,
        deleted: DeletedLine,
    ) -> BlameRecord
    {
        let previous_commits = match self
            .repo
            .blame_line(parent, &deleted.path, deleted.line)
        {
            Ok(out) => parse_blame_porcelain(&out)
                .map(|(c, n, t)| vec![(c.to_string(), n, t)])
                .unwrap_or_default(),
            Err(e) =>
            {
                debug!(path = %deleted.path, line = deleted.line, error = %e, "blame failed");
                Vec::new()
            }
        };

        BlameRecord {
            line_num: deleted.line,
            line_str: deleted
                .text
                .trim()
                .to_string(),
            file_path: deleted.path,
            previous_commits,
        }
    }
}

#[cfg(test)]
mod tests
{
    use super::*;

    const DIFF: &str = "\
diff --git a/src/a.c b/src/a.c
index 1111111..2222222 100644
--- a/src/a.c
+++ b/src/a.c
@@ -40,0 +41,2 @@ int x;
+    check(x);
+    check(y);
@@ -42 +44 @@ void bar(int x)
-    foo(x);
+    foo_checked(x);
@@ -50,2 +51,0 @@ void bar(int x)
-    --count;
-    // stale
diff --git a/new.c b/new.c
new file mode 100644
index 0000000..3333333
--- /dev/null
+++ b/new.c
@@ -0,0 +1 @@
+int fresh;
";

    #[test]
    fn deleted_lines_use_old_side_numbers()
    {
        let got = parse_deleted_lines(DIFF);

        assert_eq!(
            got,
            vec![
                DeletedLine { path: "src/a.c".into(), line: 42, text: "    foo(x);".into() },
                DeletedLine { path: "src/a.c".into(), line: 50, text: "    --count;".into() },
                DeletedLine { path: "src/a.c".into(), line: 51, text: "    // stale".into() },
            ]
        );
    }

    #[test]
    fn hunk_header_defaults_counts_to_one()
    {
        assert_eq!(
            parse_hunk_header("@@ -42 +44 @@ void bar"),
            Some(HunkHeader { old_start: 42, old_count: 1, new_count: 1 })
        );
        assert_eq!(
            parse_hunk_header("@@ -40,0 +41,2 @@"),
            Some(HunkHeader { old_start: 40, old_count: 0, new_count: 2 })
        );
        assert_eq!(parse_hunk_header("not a hunk"), None);
    }

    #[test]
    fn porcelain_blame_yields_commit_line_and_text()
    {
        let out = "\
5d8406741f8c60e7bf0a06e4fb71a5cf7a6458dc 6056 6060 1
author Someone
author-mail <someone@example.com>
summary initial
filename lib/Runtime/ByteCode/ByteCodeEmitter.cpp
\t    Js::RegSlot rhsLocation,
";
        let (commit, line, text) = parse_blame_porcelain(out).expect("parsed");

        assert_eq!(commit.as_str(), "5d8406741f8c60e7bf0a06e4fb71a5cf7a6458dc");
        assert_eq!(line, 6056);
        assert_eq!(text, "Js::RegSlot rhsLocation,");
        assert!(parse_blame_porcelain("fatal: no such path").is_none());
    }

    #[test]
    fn trivial_lines_are_skipped()
    {
        assert!(is_trivial_line("   ", false));
        assert!(is_trivial_line("  // note", true));
        assert!(is_trivial_line(" * detail", true));
        assert!(!is_trivial_line("  // note", false));
        assert!(!is_trivial_line("x = *p;", true));
        assert!(!is_trivial_line("foo(); /* why */", true));
    }

    #[test]
    fn extension_filter_ignores_case()
    {
        let exts = vec!["c".to_string(), "cpp".to_string()];

        assert!(has_extension("a/B.CPP", &exts));
        assert!(has_extension("x.c", &exts));
        assert!(!has_extension("x.rs", &exts));
        assert!(!has_extension("Makefile", &exts));
    }
}
