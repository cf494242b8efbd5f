//! Utility helpers organized by small, focused structs.
//! All functions are associated fns to keep call sites
//! ergonomic, testable, and discoverable.

// Tree-sitter types for node helpers
use tree_sitter::{Node, Point};

/// Qualified-name helpers
pub struct NameUtils;

impl NameUtils
{
    /// Join name parts with the given separator into a String
    pub fn join(
        parts: &[&str],
        sep: &str,
    ) -> String
    {
        // Pre-allocate with a simple heuristic
        let mut out = String::with_capacity(
            parts
                .iter()
                .map(|p| p.len() + sep.len())
                .sum(),
        );

        for (i, p) in parts
            .iter()
            .enumerate()
        {
            if i > 0
            {
                out.push_str(sep);
            }

            out.push_str(p);
        }

        out
    }

    /// Drop all whitespace from a name fragment (`operator ()` -> `operator()`)
    pub fn squash(part: &str) -> String
    {
        part.chars()
            .filter(|c| !c.is_whitespace())
            .collect()
    }
}

/// UTF-8 safe slicing helpers
pub struct Utf8Utils;

impl Utf8Utils
{
    /// Return a substring by byte range if it is on a char
    /// boundary within `full`, else None
    pub fn slice_str(
        full: &str,
        start: usize,
        end: usize,
    ) -> Option<&str>
    {
        if start > end || end > full.len()
        {
            return None;
        }

        // Use get(..) to enforce char boundary safety
        full.get(start..end)
    }
}

/// Common Tree-sitter node helpers
pub struct TsNodeUtils;

impl TsNodeUtils
{
    /// Convert node positions to 1-based inclusive line numbers
    pub fn line_range_1based(node: Node) -> (usize, usize)
    {
        let s: Point = node.start_position();
        let e: Point = node.end_position();

        // A node ending at column 0 stops on the previous line
        let end_row = if e.column == 0 && e.row > s.row { e.row - 1 } else { e.row };

        (s.row + 1, end_row + 1)
    }

    /// Collect every node of `kind` under `root` in document (pre-)order
    pub fn collect_kind<'a>(
        root: Node<'a>,
        kind: &str,
    ) -> Vec<Node<'a>>
    {
        let mut out = Vec::new();
        let mut cursor = root.walk();

        loop
        {
            let node = cursor.node();

            if node.kind() == kind
            {
                out.push(node);
            }

            // Descend first, then siblings, then climb until a sibling exists
            if cursor.goto_first_child() || cursor.goto_next_sibling()
            {
                continue;
            }

            loop
            {
                if !cursor.goto_parent()
                {
                    return out;
                }

                if cursor.goto_next_sibling()
                {
                    break;
                }
            }
        }
    }

    /// First named child whose kind is in `kinds`
    pub fn first_named_child_of<'a>(
        node: Node<'a>,
        kinds: &[&str],
    ) -> Option<Node<'a>>
    {
        (0..node.named_child_count())
            .filter_map(|i| node.named_child(i))
            .find(|c| kinds.contains(&c.kind()))
    }
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn join_uses_separator_between_parts()
    {
        assert_eq!(NameUtils::join(&["a", "b", "c"], "::"), "a::b::c");
        assert_eq!(NameUtils::join(&["only"], "::"), "only");
        assert_eq!(NameUtils::join(&[], "::"), "");
    }

    #[test]
    fn squash_removes_inner_whitespace()
    {
        assert_eq!(NameUtils::squash("operator ()"), "operator()");
        assert_eq!(NameUtils::squash(" ~Foo "), "~Foo");
    }

    #[test]
    fn slice_rejects_bad_ranges()
    {
        let s = "héllo";

        assert_eq!(Utf8Utils::slice_str(s, 0, 1), Some("h"));
        assert_eq!(Utf8Utils::slice_str(s, 1, 2), None); // inside 'é'
        assert_eq!(Utf8Utils::slice_str(s, 3, 2), None);
        assert_eq!(Utf8Utils::slice_str(s, 0, 99), None);
    }
}
