//! Structural parser for C-family sources backed by tree-sitter.
//!
//! The locator only needs a flat list of function definitions with
//! positions and names, plus a way to turn one of them back into source
//! text. [`StructuralParser`] is that contract; [`CFamilyParser`] is the
//! tree-sitter implementation for C and C++.

use std::path::Path;

use thiserror::Error;
use tree_sitter::{Language, Node, Parser};

use crate::infra::utils::{NameUtils, TsNodeUtils, Utf8Utils};

/// Failure to produce or unparse a structural tree.
#[derive(Debug, Error)]
pub enum ParseError
{
    #[error("source contains NUL bytes (binary content)")]
    Binary,

    #[error("source is {bytes} bytes, over the {limit} byte limit")]
    TooLarge
    {
        bytes: usize, limit: usize
    },

    #[error("failed to load grammar: {0}")]
    Language(String),

    #[error("parser produced no tree")]
    Aborted,

    #[error("node span {start}..{end} is not a valid UTF-8 slice")]
    InvalidSpan
    {
        start: usize, end: usize
    },
}

/// A function-like node with inclusive 1-based line positions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionNode
{
    /// Scope parts followed by the simple name (`["Ns", "Cls", "run"]`)
    pub name_parts: Vec<String>,
    pub start_line: usize,
    pub end_line: usize,
    pub byte_start: usize,
    pub byte_end: usize,
}

impl FunctionNode
{
    /// All name parts concatenated with `::`
    pub fn qualified_name(&self) -> String
    {
        let parts: Vec<&str> = self
            .name_parts
            .iter()
            .map(String::as_str)
            .collect();
        NameUtils::join(&parts, "::")
    }

    pub fn contains_line(
        &self,
        line: usize,
    ) -> bool
    {
        self.start_line <= line && line <= self.end_line
    }
}

/// Parsed view of one source text.
#[derive(Debug, Clone)]
pub struct StructuralTree
{
    source: String,
    functions: Vec<FunctionNode>,
}

impl StructuralTree
{
    pub fn new(
        source: String,
        functions: Vec<FunctionNode>,
    ) -> Self
    {
        Self { source, functions }
    }

    /// Function nodes in document order
    pub fn functions(&self) -> &[FunctionNode]
    {
        &self.functions
    }

    pub fn source(&self) -> &str
    {
        &self.source
    }
}

/// Source text <-> structural tree conversion.
pub trait StructuralParser: Send + Sync
{
    fn parse(
        &self,
        source: &str,
    ) -> Result<StructuralTree, ParseError>;

    /// Source text of one node of `tree`.
    fn unparse(
        &self,
        tree: &StructuralTree,
        node: &FunctionNode,
    ) -> Result<String, ParseError>
    {
        Utf8Utils::slice_str(tree.source(), node.byte_start, node.byte_end)
            .map(str::to_string)
            .ok_or(ParseError::InvalidSpan { start: node.byte_start, end: node.byte_end })
    }
}

/// Grammar used for a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect
{
    C,
    Cpp,
}

impl Dialect
{
    /// Map a file extension to a grammar; headers go to C++, whose grammar
    /// also accepts plain C declarations.
    pub fn from_path(path: &Path) -> Option<Self>
    {
        let ext = path
            .extension()?
            .to_str()?
            .to_lowercase();

        match ext.as_str()
        {
            "c" => Some(Dialect::C),
            "h" | "cpp" | "hpp" | "cxx" | "hxx" | "cc" | "hh" => Some(Dialect::Cpp),
            _ => None,
        }
    }

    fn language(self) -> Language
    {
        match self
        {
            Dialect::C => tree_sitter_c::LANGUAGE.into(),
            Dialect::Cpp => tree_sitter_cpp::LANGUAGE.into(),
        }
    }
}

/// Declarator wrappers unwrapped on the way to the function declarator.
const WRAPPER_DECLARATORS: &[&str] = &[
    "pointer_declarator",
    "reference_declarator",
    "attributed_declarator",
    "parenthesized_declarator",
];

/// Tree-sitter backed parser for one C-family dialect.
pub struct CFamilyParser
{
    language: Language,
    max_source_bytes: usize,
}

impl CFamilyParser
{
    pub fn new(
        dialect: Dialect,
        max_source_bytes: usize,
    ) -> Self
    {
        Self { language: dialect.language(), max_source_bytes }
    }

    fn function_node(
        node: Node,
        bytes: &[u8],
    ) -> Option<FunctionNode>
    {
        let declarator = node.child_by_field_name("declarator")?;
        let name_parts = name_parts_of_declarator(declarator, bytes)?;
        let (start_line, end_line) = TsNodeUtils::line_range_1based(node);

        Some(FunctionNode {
            name_parts,
            start_line,
            end_line,
            byte_start: node.start_byte(),
            byte_end: node.end_byte(),
        })
    }
}

impl StructuralParser for CFamilyParser
{
    fn parse(
        &self,
        source: &str,
    ) -> Result<StructuralTree, ParseError>
    {
        if source.len() > self.max_source_bytes
        {
            return Err(ParseError::TooLarge { bytes: source.len(), limit: self.max_source_bytes });
        }

        if memchr::memchr(0, source.as_bytes()).is_some()
        {
            return Err(ParseError::Binary);
        }

        let mut parser = Parser::new();
        parser
            .set_language(&self.language)
            .map_err(|e| ParseError::Language(e.to_string()))?;

        let tree = parser
            .parse(source, None)
            .ok_or(ParseError::Aborted)?;
        let bytes = source.as_bytes();

        let functions = TsNodeUtils::collect_kind(tree.root_node(), "function_definition")
            .into_iter()
            .filter_map(|n| Self::function_node(n, bytes))
            .collect();

        Ok(StructuralTree::new(source.to_string(), functions))
    }
}

/// Walk a declarator chain down to the function declarator and split its
/// name into scope parts.
fn name_parts_of_declarator(
    mut node: Node,
    bytes: &[u8],
) -> Option<Vec<String>>
{
    while node.kind() != "function_declarator"
    {
        if !WRAPPER_DECLARATORS.contains(&node.kind())
        {
            return None;
        }

        node = match node.child_by_field_name("declarator")
        {
            Some(inner) => inner,
            // parenthesized_declarator carries its inner declarator unnamed
            None => TsNodeUtils::first_named_child_of(
                node,
                &[
                    "function_declarator",
                    "pointer_declarator",
                    "reference_declarator",
                    "attributed_declarator",
                    "parenthesized_declarator",
                ],
            )?,
        };
    }

    let name = node.child_by_field_name("declarator")?;
    let mut parts = Vec::new();
    push_name_parts(name, bytes, &mut parts)?;

    if parts
        .iter()
        .any(|p| p.is_empty())
    {
        return None;
    }

    Some(parts)
}

fn push_name_parts(
    node: Node,
    bytes: &[u8],
    out: &mut Vec<String>,
) -> Option<()>
{
    if node.kind() == "qualified_identifier"
    {
        // `::f` has no scope; the global qualifier adds no part
        if let Some(scope) = node.child_by_field_name("scope")
        {
            out.push(NameUtils::squash(
                scope
                    .utf8_text(bytes)
                    .ok()?,
            ));
        }

        return push_name_parts(node.child_by_field_name("name")?, bytes, out);
    }

    out.push(NameUtils::squash(
        node.utf8_text(bytes)
            .ok()?,
    ));
    Some(())
}
