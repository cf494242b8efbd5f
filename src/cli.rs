use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::core::output::DatasetFormat;

/// Shared application context for global flags
#[derive(Clone, Debug)]
pub struct AppContext {
    pub quiet: bool,    // global --quiet
    pub no_color: bool, // global --no-color
    pub verbose: u8,    // global -v count
}

#[derive(Parser)]
#[command(name = "vszz")]
#[command(
    about = "Trace bug-introducing and latent commits of C/C++ vulnerability fixes down to the enclosing function"
)]
#[command(version, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Suppress progress bars and non-essential output
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Label every project of a manifest on a worker pool
    Run(RunArgs),

    /// Trace fixing commits of one repository end to end
    Trace(TraceArgs),

    /// Label precomputed deleted-line records
    Label(LabelArgs),

    /// List commits strictly between two commits, oldest first
    Between(BetweenArgs),

    /// Resolve the function enclosing a line at a commit
    Locate(LocateArgs),

    /// Initialize a vszz.toml config file
    Init(InitArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Project manifest (JSON)
    pub manifest: PathBuf,

    /// Concurrent projects (overrides config `workers`)
    #[arg(long)]
    pub workers: Option<usize>,

    /// Re-run projects whose dataset already exists
    #[arg(long)]
    pub force: bool,

    /// Dataset format (overrides config `output.format`)
    #[arg(long, value_enum)]
    pub format: Option<DatasetFormat>,
}

#[derive(Parser, Debug)]
pub struct TraceArgs {
    /// Repository checkout
    #[arg(long)]
    pub repo: PathBuf,

    /// Fixing commit (repeatable)
    #[arg(long = "bfc", value_name = "HASH")]
    pub bfcs: Vec<String>,

    /// File with one fixing commit per line
    #[arg(long)]
    pub bfc_file: Option<PathBuf>,

    /// Dataset CSV path
    #[arg(short, long, default_value = "labeled.csv")]
    pub output: PathBuf,

    /// Also write the deleted-line records to this JSON file
    #[arg(long)]
    pub records_out: Option<PathBuf>,
}

#[derive(Parser, Debug)]
pub struct LabelArgs {
    /// Repository checkout
    #[arg(long)]
    pub repo: PathBuf,

    /// Deleted-line records (`{bfc: [record, ...]}` JSON)
    #[arg(long)]
    pub records: PathBuf,

    /// Dataset CSV path
    #[arg(short, long, default_value = "labeled.csv")]
    pub output: PathBuf,
}

#[derive(Parser, Debug)]
pub struct BetweenArgs {
    /// Repository checkout
    #[arg(long)]
    pub repo: PathBuf,

    /// Older endpoint (excluded)
    #[arg(long)]
    pub older: String,

    /// Newer endpoint (excluded)
    #[arg(long)]
    pub newer: String,

    /// Only commits touching this path
    #[arg(long)]
    pub path: Option<String>,
}

#[derive(Parser, Debug)]
pub struct LocateArgs {
    /// Repository checkout
    #[arg(long)]
    pub repo: PathBuf,

    /// Commit to read the file at
    #[arg(long)]
    pub commit: String,

    /// Repository-relative file path
    #[arg(long)]
    pub file: String,

    /// 1-based line number (hint)
    #[arg(long)]
    pub line: usize,

    /// Exact line text (match key)
    #[arg(long)]
    pub text: String,

    /// Print the function as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Parser, Debug)]
pub struct InitArgs {
    /// Directory to initialize config in
    #[arg(default_value = ".")]
    pub path: PathBuf,

    /// Overwrite existing config file
    #[arg(long)]
    pub force: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Shell {
    Bash,
    Zsh,
    Fish,
    PowerShell,
    Elvish,
}

#[derive(Parser, Debug)]
pub struct CompletionsArgs {
    /// Target shell
    #[arg(value_enum)]
    pub shell: Shell,

    /// Output directory; if omitted and --stdout not set, prints error
    #[arg(long)]
    pub out_dir: Option<PathBuf>,

    /// Print completion script to stdout instead of a file
    #[arg(long)]
    pub stdout: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn command_tree_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn trace_accepts_repeated_bfcs_and_global_flags() {
        let cli = Cli::try_parse_from([
            "vszz", "trace", "--repo", "r", "--bfc", "aaa", "--bfc", "bbb", "-vv", "--quiet",
        ])
        .unwrap();

        assert!(cli.quiet);
        assert_eq!(cli.verbose, 2);
        match cli.command {
            Commands::Trace(args) => assert_eq!(args.bfcs, vec!["aaa", "bbb"]),
            _ => panic!("expected trace"),
        }
    }

    #[test]
    fn run_parses_format_override() {
        let cli = Cli::try_parse_from(["vszz", "run", "m.json", "--format", "both", "--workers", "3"])
            .unwrap();

        match cli.command {
            Commands::Run(args) => {
                assert_eq!(args.format, Some(DatasetFormat::Both));
                assert_eq!(args.workers, Some(3));
                assert!(!args.force);
            }
            _ => panic!("expected run"),
        }
    }
}
