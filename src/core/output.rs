//! Dataset and intermediate-record files.

use std::{
    fs::File,
    io::{BufWriter, Write},
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::core::model::{BlameRecord, CommitRef, LabeledFunction};

/// Deleted-line records per fixing commit, in input order.
pub type BlameReport = IndexMap<CommitRef, Vec<BlameRecord>>;

/// Header of the labeled dataset CSV.
pub const CSV_HEADER: [&str; 6] =
    ["commit_hash", "type", "function_name", "content_fingerprint", "normalized_source", "label"];

/// Which dataset files to write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum DatasetFormat
{
    #[default]
    Csv,
    Jsonl,
    Both,
}

impl DatasetFormat
{
    pub fn writes_csv(self) -> bool
    {
        matches!(self, Self::Csv | Self::Both)
    }

    pub fn writes_jsonl(self) -> bool
    {
        matches!(self, Self::Jsonl | Self::Both)
    }
}

/// A report read from disk plus the number of records that failed to parse.
#[derive(Debug, Default)]
pub struct LoadedReport
{
    pub report: BlameReport,
    pub malformed: usize,
}

fn ensure_parent(path: &Path) -> Result<()>
{
    if let Some(parent) = path.parent()
        && !parent
            .as_os_str()
            .is_empty()
    {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory {}", parent.display()))?;
    }
    Ok(())
}

/// Read an intermediate `{bfc: [record, ...]}` file.
///
/// Records are decoded one at a time; a malformed record is logged,
/// counted and skipped. A file that is not a JSON object of arrays is an
/// error.
pub fn read_report(path: &Path) -> Result<LoadedReport>
{
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    parse_report(&text).with_context(|| format!("Failed to parse {}", path.display()))
}

pub fn parse_report(text: &str) -> Result<LoadedReport>
{
    let raw: IndexMap<String, Vec<serde_json::Value>> = serde_json::from_str(text)?;
    let mut loaded = LoadedReport::default();

    for (bfc, values) in raw
    {
        let bfc = CommitRef::new(bfc);
        let mut records = Vec::with_capacity(values.len());

        for (i, value) in values
            .into_iter()
            .enumerate()
        {
            match serde_json::from_value::<BlameRecord>(value)
            {
                Ok(r) => records.push(r),
                Err(e) =>
                {
                    warn!(bfc = %bfc.short(), index = i, error = %e, "skipping malformed record");
                    loaded.malformed += 1;
                }
            }
        }

        loaded
            .report
            .entry(bfc)
            .or_default()
            .extend(records);
    }

    Ok(loaded)
}

/// Write an intermediate report as pretty-printed JSON.
pub fn write_report(
    report: &BlameReport,
    path: &Path,
) -> Result<()>
{
    ensure_parent(path)?;

    let file = File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
    let mut writer = BufWriter::new(file);

    serde_json::to_writer_pretty(&mut writer, report).context("Failed to serialize records")?;
    writer
        .write_all(b"\n")
        .context("Failed to write newline")?;
    writer
        .flush()
        .context("Failed to flush output")?;

    Ok(())
}

/// Quote a CSV field when it contains a delimiter, quote or line break.
fn csv_field(raw: &str) -> String
{
    if raw.contains([',', '"', '\n', '\r'])
    {
        format!("\"{}\"", raw.replace('"', "\"\""))
    }
    else
    {
        raw.to_string()
    }
}

/// Render the six-column dataset as CSV.
pub fn render_csv<W: Write>(
    rows: &[LabeledFunction],
    out: &mut W,
) -> std::io::Result<()>
{
    writeln!(out, "{}", CSV_HEADER.join(","))?;

    for row in rows
    {
        let fields = [
            csv_field(
                row.commit
                    .as_str(),
            ),
            row.record_type
                .to_string(),
            csv_field(&row.function_name),
            row.fingerprint
                .clone(),
            csv_field(&row.normalized_source),
            row.label
                .to_string(),
        ];
        writeln!(out, "{}", fields.join(","))?;
    }

    Ok(())
}

pub fn write_csv(
    rows: &[LabeledFunction],
    path: &Path,
) -> Result<()>
{
    ensure_parent(path)?;

    let file = File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
    let mut writer = BufWriter::new(file);

    render_csv(rows, &mut writer).with_context(|| format!("Failed to write {}", path.display()))?;
    writer
        .flush()
        .context("Failed to flush output")?;

    Ok(())
}

/// One JSON object per line, full provenance included.
pub fn write_jsonl(
    rows: &[LabeledFunction],
    path: &Path,
) -> Result<()>
{
    ensure_parent(path)?;

    let file = File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
    let mut writer = BufWriter::new(file);

    for row in rows
    {
        let json = serde_json::to_string(row).context("Failed to serialize row")?;
        writer
            .write_all(json.as_bytes())
            .context("Failed to write row")?;
        writer
            .write_all(b"\n")
            .context("Failed to write newline")?;
    }

    writer
        .flush()
        .context("Failed to flush output")?;

    Ok(())
}

/// Output paths of one project under `results_dir`.
#[derive(Debug, Clone)]
pub struct ProjectPaths
{
    pub csv: PathBuf,
    pub jsonl: PathBuf,
    pub report: PathBuf,
}

impl ProjectPaths
{
    pub fn new(
        results_dir: &Path,
        project: &str,
    ) -> Self
    {
        Self {
            csv: results_dir.join(format!("{project}.csv")),
            jsonl: results_dir.join(format!("{project}.jsonl")),
            report: results_dir.join(format!("{project}-bic.json")),
        }
    }

    /// The file whose presence marks the project as done.
    pub fn marker(
        &self,
        format: DatasetFormat,
    ) -> &Path
    {
        if format.writes_csv() { &self.csv } else { &self.jsonl }
    }
}

/// Write the dataset in `format`; returns the files written.
pub fn write_dataset(
    rows: &[LabeledFunction],
    paths: &ProjectPaths,
    format: DatasetFormat,
) -> Result<Vec<PathBuf>>
{
    let mut written = Vec::new();

    if format.writes_csv()
    {
        write_csv(rows, &paths.csv)?;
        written.push(
            paths
                .csv
                .clone(),
        );
    }

    if format.writes_jsonl()
    {
        write_jsonl(rows, &paths.jsonl)?;
        written.push(
            paths
                .jsonl
                .clone(),
        );
    }

    Ok(written)
}
