use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::{
    cli::{AppContext, InitArgs},
    core::{
        git::{GitOptions, MaterializeMode},
        output::DatasetFormat,
    },
};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config
{
    /// Where project repositories live (`<repos_dir>/<name>`)
    pub repos_dir: PathBuf,

    /// Where datasets and intermediate records are written
    pub results_dir: PathBuf,

    /// Projects processed concurrently by `run`
    pub workers: usize,

    pub git: GitConfig,
    pub parser: ParserConfig,
    pub trace: TraceConfig,
    pub latent: LatentConfig,
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GitConfig
{
    pub timeout_secs: u64,
    pub clone_timeout_secs: u64,
    pub materialize: MaterializeMode,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ParserConfig
{
    /// Larger files are treated as unparseable
    pub max_source_bytes: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TraceConfig
{
    /// File extensions whose deleted lines are traced
    pub extensions: Vec<String>,
    pub skip_comment_lines: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LatentConfig
{
    pub only_touching_path: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig
{
    pub format: DatasetFormat,
}

impl Default for Config
{
    fn default() -> Self
    {
        Self {
            repos_dir: PathBuf::from("repos"),
            results_dir: PathBuf::from("results"),
            workers: 5,
            git: GitConfig::default(),
            parser: ParserConfig::default(),
            trace: TraceConfig::default(),
            latent: LatentConfig::default(),
            output: OutputConfig::default(),
        }
    }
}

impl Default for GitConfig
{
    fn default() -> Self
    {
        Self { timeout_secs: 120, clone_timeout_secs: 3600, materialize: MaterializeMode::Checkout }
    }
}

impl Default for ParserConfig
{
    fn default() -> Self
    {
        Self { max_source_bytes: 8 * 1024 * 1024 }
    }
}

impl Default for TraceConfig
{
    fn default() -> Self
    {
        Self {
            extensions: ["c", "cpp", "h", "hpp", "cxx", "hxx", "cc", "hh"]
                .iter()
                .map(|e| e.to_string())
                .collect(),
            skip_comment_lines: true,
        }
    }
}

impl Config
{
    /// `repos_dir` with `~` and `$VARS` expanded.
    pub fn repos_dir(&self) -> PathBuf
    {
        expand(&self.repos_dir)
    }

    pub fn results_dir(&self) -> PathBuf
    {
        expand(&self.results_dir)
    }

    pub fn git_options(&self) -> GitOptions
    {
        GitOptions {
            timeout: Duration::from_secs(
                self.git
                    .timeout_secs
                    .max(1),
            ),
            materialize: self
                .git
                .materialize,
        }
    }

    pub fn clone_timeout(&self) -> Duration
    {
        Duration::from_secs(
            self.git
                .clone_timeout_secs
                .max(1),
        )
    }
}

fn expand(path: &Path) -> PathBuf
{
    let raw = path.to_string_lossy();

    match shellexpand::full(&raw)
    {
        Ok(s) => PathBuf::from(s.as_ref()),
        Err(_) => path.to_path_buf(),
    }
}

/// Load configuration from the working directory and the environment.
pub fn load_config() -> Result<Config>
{
    load_config_from(Path::new("."))
}

pub fn load_config_from(dir: &Path) -> Result<Config>
{
    let mut builder = config::Config::builder();

    // Load from config files in priority order
    let config_paths = ["vszz.toml", "vszz.yaml", "vszz.json", ".vszz.toml"];

    for name in &config_paths
    {
        let path = dir.join(name);
        if path.exists()
        {
            builder = builder.add_source(config::File::from(path));
            break;
        }
    }

    // VSZZ_WORKERS, VSZZ_GIT__TIMEOUT_SECS, ...
    builder = builder.add_source(
        config::Environment::with_prefix("VSZZ")
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true),
    );

    let cfg = builder
        .build()
        .context("Failed to load configuration")?;
    let parsed: Config = cfg
        .try_deserialize()
        .context("Failed to parse configuration")?;

    if parsed.workers == 0
    {
        anyhow::bail!("workers must be at least 1");
    }

    Ok(parsed)
}

pub fn init(
    args: InitArgs,
    ctx: &AppContext,
) -> Result<()>
{
    let config_path = args
        .path
        .join("vszz.toml");

    if config_path.exists() && !args.force
    {
        anyhow::bail!(
            "Config file already exists at {}. Use --force to overwrite.",
            config_path.display()
        );
    }

    let config = Config::default();
    let toml_string =
        toml::to_string_pretty(&config).context("Failed to serialize default config")?;

    std::fs::create_dir_all(&args.path).context("Failed to create config directory")?;
    std::fs::write(&config_path, toml_string).context("Failed to write config file")?;

    if !ctx.quiet
    {
        println!("Created config file at {}", config_path.display());
    }
    Ok(())
}
