//! `vszz completions`: shell completion scripts for the `vszz` binary.
//!
//! With `--stdout` the script is printed for piping into a shell rc file;
//! otherwise it is written under `--out-dir` and a hint tells the user how
//! their shell picks it up.

use anyhow::{Context, Result};
use clap::{Command, CommandFactory};
use clap_complete::{Shell as CompletionShell, generate, generate_to};
use std::{fs, io, path::Path};

use crate::cli::{AppContext, Cli, CompletionsArgs, Shell};

impl From<Shell> for CompletionShell {
    fn from(shell: Shell) -> Self {
        match shell {
            Shell::Bash => CompletionShell::Bash,
            Shell::Zsh => CompletionShell::Zsh,
            Shell::Fish => CompletionShell::Fish,
            Shell::PowerShell => CompletionShell::PowerShell,
            Shell::Elvish => CompletionShell::Elvish,
        }
    }
}

/// How `shell` loads a completion file written to `path`.
fn install_hint(shell: Shell, path: &Path) -> String {
    let p = path.display();
    match shell {
        Shell::Bash => format!("add `source {p}` to ~/.bashrc"),
        Shell::Zsh => format!("put {p} on $fpath, then run `compinit`"),
        Shell::Fish => format!("copy {p} to ~/.config/fish/completions/"),
        Shell::PowerShell => format!("add `. {p}` to your $PROFILE"),
        Shell::Elvish => format!("add `eval (slurp < {p})` to ~/.config/elvish/rc.elv"),
    }
}

pub fn run(args: CompletionsArgs, ctx: &AppContext) -> Result<()> {
    let mut cmd: Command = Cli::command();
    let bin = cmd.get_name().to_string();

    if args.stdout {
        generate(CompletionShell::from(args.shell), &mut cmd, bin, &mut io::stdout());
        return Ok(());
    }

    let dir = args
        .out_dir
        .ok_or_else(|| anyhow::anyhow!("--out-dir is required unless --stdout is set"))?;

    fs::create_dir_all(&dir).with_context(|| format!("create {}", dir.display()))?;
    let path = generate_to(CompletionShell::from(args.shell), &mut cmd, bin, &dir)
        .context("generate vszz completion file")?;

    if !ctx.quiet {
        eprintln!("Wrote {} completion to {}", cmd.get_name(), path.display());
        eprintln!("To enable it, {}", install_hint(args.shell, &path));
    }
    Ok(())
}
