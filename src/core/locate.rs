//! Line -> enclosing function resolution.
//!
//! A location resolves when the structural parser places it inside a
//! function definition *and* the location's text occurs verbatim in that
//! definition's source. Everything else, including unparsable snapshots,
//! is `None`: resolution misses are an expected outcome, not an error.

use std::path::Path;

use tracing::{debug, trace};

use crate::core::model::{FileSnapshot, FunctionUnit, LineLocation};
use crate::parsers::cfamily_parser::{
    CFamilyParser, Dialect, FunctionNode, StructuralParser, StructuralTree,
};

/// How the locator picks a parser for a path.
enum ParserSet
{
    /// C grammar for `.c`, C++ grammar for the other C-family extensions
    CFamily
    {
        c: CFamilyParser, cpp: CFamilyParser
    },
    /// One parser for every path
    Single(Box<dyn StructuralParser>),
}

pub struct FunctionLocator
{
    parsers: ParserSet,
}

impl FunctionLocator
{
    /// Locator over the tree-sitter C and C++ grammars.
    pub fn c_family(max_source_bytes: usize) -> Self
    {
        Self {
            parsers: ParserSet::CFamily {
                c: CFamilyParser::new(Dialect::C, max_source_bytes),
                cpp: CFamilyParser::new(Dialect::Cpp, max_source_bytes),
            },
        }
    }

    /// Locator using `parser` regardless of file extension.
    pub fn with_parser(parser: Box<dyn StructuralParser>) -> Self
    {
        Self { parsers: ParserSet::Single(parser) }
    }

    fn parser_for(
        &self,
        path: &str,
    ) -> Option<&dyn StructuralParser>
    {
        match &self.parsers
        {
            ParserSet::Single(p) => Some(p.as_ref()),
            ParserSet::CFamily { c, cpp } => match Dialect::from_path(Path::new(path))?
            {
                Dialect::C => Some(c),
                Dialect::Cpp => Some(cpp),
            },
        }
    }

    fn parse(
        &self,
        snapshot: &FileSnapshot,
    ) -> Option<(&dyn StructuralParser, StructuralTree)>
    {
        let Some(parser) = self.parser_for(&snapshot.path)
        else
        {
            trace!(path = %snapshot.path, "no structural parser for path");
            return None;
        };

        let Some(text) = snapshot.text()
        else
        {
            debug!(path = %snapshot.path, commit = %snapshot.commit.short(), "snapshot is not UTF-8");
            return None;
        };

        match parser.parse(text)
        {
            Ok(tree) => Some((parser, tree)),
            Err(e) =>
            {
                debug!(path = %snapshot.path, commit = %snapshot.commit.short(), error = %e, "parse failed");
                None
            }
        }
    }

    /// Enclosing function of `location` in `snapshot`.
    ///
    /// Picks the first function node in document order spanning the line;
    /// the line text must then occur verbatim in the node's source, otherwise
    /// the node is a sibling or boundary mismatch and the result is `None`.
    pub fn resolve(
        &self,
        snapshot: &FileSnapshot,
        location: &LineLocation,
    ) -> Option<FunctionUnit>
    {
        if location
            .text
            .is_empty()
        {
            return None;
        }

        let (parser, tree) = self.parse(snapshot)?;

        let node = tree
            .functions()
            .iter()
            .find(|f| f.contains_line(location.line))?;

        let source = parser
            .unparse(&tree, node)
            .ok()?;

        if !source.contains(location.text.as_str())
        {
            trace!(
                line = location.line,
                function = %node.qualified_name(),
                "line text not inside enclosing function"
            );
            return None;
        }

        Some(unit_from(node, source))
    }

    /// Function whose qualified name equals `name`, first in document order.
    pub fn resolve_by_name(
        &self,
        snapshot: &FileSnapshot,
        name: &str,
    ) -> Option<FunctionUnit>
    {
        let (parser, tree) = self.parse(snapshot)?;

        let node = tree
            .functions()
            .iter()
            .find(|f| f.qualified_name() == name)?;

        let source = parser
            .unparse(&tree, node)
            .ok()?;

        Some(unit_from(node, source))
    }

    /// Re-anchor a possibly stale location against `snapshot`.
    ///
    /// A location whose line still carries its text is returned as is.
    /// Otherwise the nearest line with the same trimmed text wins, ties
    /// going to the earlier line.
    pub fn anchor(
        &self,
        snapshot: &FileSnapshot,
        location: &LineLocation,
    ) -> Option<LineLocation>
    {
        if location.is_valid_for(snapshot)
        {
            return Some(location.clone());
        }

        if location
            .text
            .is_empty()
        {
            return None;
        }

        (1..=snapshot.line_count())
            .filter(|&n| {
                snapshot
                    .line(n)
                    .is_some_and(|l| l.trim() == location.text)
            })
            .min_by_key(|&n| (n.abs_diff(location.line), n))
            .map(|n| location.moved_to(n))
    }

    /// `anchor` followed by `resolve`.
    pub fn locate(
        &self,
        snapshot: &FileSnapshot,
        location: &LineLocation,
    ) -> Option<(LineLocation, FunctionUnit)>
    {
        let anchored = self.anchor(snapshot, location)?;
        let unit = self.resolve(snapshot, &anchored)?;
        Some((anchored, unit))
    }
}

fn unit_from(
    node: &FunctionNode,
    source: String,
) -> FunctionUnit
{
    FunctionUnit {
        name: node.qualified_name(),
        source,
        start_line: node.start_line,
        end_line: node.end_line,
    }
}
