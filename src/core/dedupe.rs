//! Fingerprint-based deduplication of labeled function snapshots.
//!
//! Normalization collapses every whitespace run before the body's opening
//! `{` into one space, so a signature reflowed across lines keeps its
//! fingerprint. Text from the brace on is left untouched. Without a brace
//! (`= delete;` definitions) the whole text is collapsed.

use indexmap::IndexMap;

use crate::core::model::{FunctionRecord, LabeledFunction};

/// Collapse whitespace runs before the first `{` into single spaces.
pub fn normalize(source: &str) -> String
{
    let (head, tail) = match source.find('{')
    {
        Some(i) => source.split_at(i),
        None => (source, ""),
    };

    let mut out = String::with_capacity(source.len());
    let mut in_space = false;

    for ch in head.chars()
    {
        if ch.is_whitespace()
        {
            if !in_space
            {
                out.push(' ');
            }
            in_space = true;
        }
        else
        {
            out.push(ch);
            in_space = false;
        }
    }

    out.push_str(tail);
    out
}

/// Hex blake3 digest of normalized text.
pub fn fingerprint(normalized: &str) -> String
{
    blake3::hash(normalized.as_bytes())
        .to_hex()
        .to_string()
}

/// Keeps the first record per fingerprint, in arrival order.
#[derive(Debug, Default)]
pub struct ResultDeduplicator
{
    rows: IndexMap<String, LabeledFunction>,
    dropped: usize,
}

impl ResultDeduplicator
{
    pub fn new() -> Self
    {
        Self::default()
    }

    /// Add one record; returns false if its fingerprint was already seen.
    pub fn push(
        &mut self,
        record: FunctionRecord,
    ) -> bool
    {
        let normalized = normalize(&record.function.source);
        let fp = fingerprint(&normalized);

        if self
            .rows
            .contains_key(&fp)
        {
            self.dropped += 1;
            return false;
        }

        let row = LabeledFunction {
            commit: record.commit,
            record_type: record.record_type,
            function_name: record
                .function
                .name,
            fingerprint: fp.clone(),
            normalized_source: normalized,
            label: 1,
            file_path: record.file_path,
            fixing_commit: record.fixing_commit,
        };

        self.rows
            .insert(fp, row);
        true
    }

    /// Records dropped as duplicates so far.
    pub fn dropped(&self) -> usize
    {
        self.dropped
    }

    pub fn into_rows(self) -> Vec<LabeledFunction>
    {
        self.rows
            .into_values()
            .collect()
    }

    /// Deduplicate a whole record stream.
    pub fn finalize(records: impl IntoIterator<Item = FunctionRecord>) -> Vec<LabeledFunction>
    {
        let mut dedup = Self::new();

        for r in records
        {
            dedup.push(r);
        }

        dedup.into_rows()
    }
}

#[cfg(test)]
mod tests
{
    use proptest::prelude::*;

    use super::*;
    use crate::core::model::{CommitRef, FunctionUnit, RecordType};

    fn record(
        commit: &str,
        kind: RecordType,
        source: &str,
    ) -> FunctionRecord
    {
        FunctionRecord {
            commit: CommitRef::new(commit),
            record_type: kind,
            function: FunctionUnit {
                name: "bar".into(),
                source: source.into(),
                start_line: 1,
                end_line: 3,
            },
            file_path: "a.c".into(),
            fixing_commit: CommitRef::new("fix"),
        }
    }

    #[test]
    fn reflowed_signature_normalizes_identically()
    {
        let a = "Js::Var\nBailOut(int a,\n\tint b)\n{\n    return a;\n}";
        let b = "Js::Var BailOut(int a, int b)\n{\n    return a;\n}";

        assert_eq!(normalize(a), "Js::Var BailOut(int a, int b) {\n    return a;\n}");
        assert_eq!(fingerprint(&normalize(a)), fingerprint(&normalize(b)));
    }

    #[test]
    fn body_whitespace_is_significant()
    {
        let a = "void f() {\n    x();\n}";
        let b = "void f() {\n  x();\n}";

        assert_ne!(fingerprint(&normalize(a)), fingerprint(&normalize(b)));
    }

    #[test]
    fn braceless_definition_collapses_everything()
    {
        assert_eq!(normalize("Foo(const Foo&)\n    = delete;"), "Foo(const Foo&) = delete;");
    }

    #[test]
    fn same_record_twice_yields_one_row()
    {
        let r = record("c1", RecordType::Bic, "void bar() {\n}");
        let rows = ResultDeduplicator::finalize(vec![r.clone(), r]);

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].label, 1);
    }

    #[test]
    fn first_occurrence_wins_and_order_is_kept()
    {
        let rows = ResultDeduplicator::finalize(vec![
            record("c1", RecordType::Bic, "void bar() {\n  a();\n}"),
            record("c2", RecordType::Latent, "void bar() {\n  b();\n}"),
            record("c3", RecordType::Latent, "void  bar()\n{\n  a();\n}"),
        ]);

        let got: Vec<(&str, RecordType)> = rows
            .iter()
            .map(|r| (r.commit.as_str(), r.record_type))
            .collect();

        // c3 only reflows the signature of c1
        assert_eq!(got, vec![("c1", RecordType::Bic), ("c2", RecordType::Latent)]);
    }

    proptest! {
        #[test]
        fn normalized_head_has_no_newline(src in "[a-z (),\n\t]{0,40}\\{[a-z;\n ]{0,20}")
        {
            let n = normalize(&src);
            let head = n.split('{').next().unwrap_or("");

            prop_assert!(!head.contains('\n'));
            prop_assert!(!head.contains("  "));
        }

        #[test]
        fn normalize_is_idempotent(src in "[a-z (){},;\n\t]{0,60}")
        {
            let once = normalize(&src);
            prop_assert_eq!(normalize(&once), once);
        }
    }
}
