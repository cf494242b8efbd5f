use anyhow::Result;
use clap::Parser;
use vszz::cli::{AppContext, Cli, Commands};
use vszz::cli_ext::{locate_cmd, trace_cmd};
use vszz::load_config;

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Build a context once, pass everywhere
    let ctx = AppContext {
        quiet: cli.quiet,
        no_color: cli.no_color,
        verbose: cli.verbose,
    };

    vszz::infra::logging::init(ctx.verbose, ctx.no_color);

    match cli.command {
        Commands::Run(args) => trace_cmd::run_batch(args, load_config()?, &ctx),
        Commands::Trace(args) => trace_cmd::run_trace(args, &load_config()?, &ctx),
        Commands::Label(args) => trace_cmd::run_label(args, &load_config()?, &ctx),
        Commands::Between(args) => locate_cmd::run_between(args, &load_config()?, &ctx),
        Commands::Locate(args) => locate_cmd::run_locate(args, &load_config()?, &ctx),
        Commands::Init(args) => vszz::infra::config::init(args, &ctx),
        Commands::Completions(args) => vszz::completion::run(args, &ctx),
    }
}
