//! **vszz** - AST-aware SZZ for C/C++ vulnerability datasets
//!
//! Traces lines deleted by a vulnerability-fixing commit back to the commits
//! that introduced them, resolving each to its enclosing function, then
//! labels every intermediate commit that still carries the defective function.

/// Command-line interface with clap integration
pub mod cli;

/// Shell completion generation
pub mod completion;

/// Command handlers behind the CLI subcommands
pub mod cli_ext {
    /// `locate` and `between`
    pub mod locate_cmd;

    /// `run`, `trace` and `label`
    pub mod trace_cmd;
}

/// Core tracing pipeline - function resolution, history walks, labeling
pub mod core {
    /// Value types: commits, snapshots, line locations, records
    pub mod model;
    pub use model::{
        BicRecord, BlameRecord, CommitRef, FileSnapshot, FunctionUnit, LabeledFunction, LatentRecord,
        LineLocation, RecordType,
    };

    /// Git plumbing with per-command timeouts and exclusive sessions
    pub mod git;
    pub use git::{GitOptions, GitRepo, MaterializeMode, RepoSession, Vcs, VcsError};

    /// Function lookup by line and by qualified name
    pub mod locate;
    pub use locate::FunctionLocator;

    /// Commit ranges and file materialization
    pub mod history;
    pub use history::HistoryWalker;

    /// Bug-introducing commit tracing
    pub mod blame;
    pub use blame::{Ancestor, BlameTracer};

    /// Latent commit expansion
    pub mod latent;
    pub use latent::LatentExpander;

    /// Whitespace normalization and fingerprint deduplication
    pub mod dedupe;
    pub use dedupe::ResultDeduplicator;

    /// Deleted lines of a fixing commit and their blame
    pub mod impacted;
    pub use impacted::ImpactScanner;

    /// Per-repository labeling pass with counters
    pub mod pipeline;
    pub use pipeline::{ProjectStats, label_report};

    /// Dataset CSV/JSONL and intermediate JSON files
    pub mod output;
    pub use output::BlameReport;

    /// Bounded multi-project runner
    pub mod batch;
    pub use batch::{Manifest, run_batch};
}

/// Language processing - tree-sitter structural parsing
pub mod parsers {
    /// C and C++ function extraction with tree-sitter
    pub mod cfamily_parser;
    pub use cfamily_parser::{CFamilyParser, Dialect, ParseError, StructuralParser, StructuralTree};
}

/// Infrastructure - Configuration, logging, and utilities
pub mod infra {
    /// Configuration management with TOML support and env overrides
    pub mod config;
    pub use config::{Config, init as config_init, load_config};

    /// tracing-subscriber setup
    pub mod logging;

    /// CRLF/LF-robust line indexing for O(1) line→byte mapping
    pub mod line_index;
    pub use line_index::NewlineIndex;

    /// Utility functions and helpers for common operations
    pub mod utils;
    // Keep utils private - not part of the public API
}

// Strategic re-exports for clean CLI interface
pub use cli::{AppContext, Cli, Commands};
pub use infra::{Config, load_config};

// Core types for external consumers
pub use core::{CommitRef, FunctionLocator, FunctionUnit, LabeledFunction, LineLocation, ResultDeduplicator, Vcs};
