use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub sources: SourcesConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub query: QueryConfig,
}

/// Where the manuals live. Each non-hidden subdirectory of `root` is one
/// source collection.
#[derive(Debug, Deserialize, Clone)]
pub struct SourcesConfig {
    pub root: PathBuf,
    /// Stripped from a directory name to obtain the collection name.
    #[serde(default = "default_suffix")]
    pub suffix: String,
    #[serde(default = "default_include_globs")]
    pub include_globs: Vec<String>,
    #[serde(default)]
    pub exclude_globs: Vec<String>,
    #[serde(default)]
    pub follow_symlinks: bool,
}

fn default_suffix() -> String {
    "-manual".to_string()
}

fn default_include_globs() -> Vec<String> {
    vec!["**/*.tex".to_string()]
}

#[derive(Debug, Deserialize, Clone)]
pub struct OutputConfig {
    #[serde(default = "default_output_dir")]
    pub dir: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: default_output_dir(),
        }
    }
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("./data")
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:7331".to_string()
}

/// Default and maximum result counts for lookups.
#[derive(Debug, Deserialize, Clone)]
pub struct QueryConfig {
    #[serde(default = "default_example_limit")]
    pub example_limit: usize,
    #[serde(default = "default_search_limit")]
    pub search_limit: usize,
    #[serde(default = "default_max_limit")]
    pub max_limit: usize,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            example_limit: default_example_limit(),
            search_limit: default_search_limit(),
            max_limit: default_max_limit(),
        }
    }
}

impl QueryConfig {
    /// Requested limit, or `default`, capped at `max_limit`.
    pub fn clamp(&self, requested: Option<usize>, default: usize) -> usize {
        requested.unwrap_or(default).min(self.max_limit)
    }
}

fn default_example_limit() -> usize {
    5
}
fn default_search_limit() -> usize {
    10
}
fn default_max_limit() -> usize {
    100
}

impl Config {
    /// Configuration for a corpus root with every other setting defaulted.
    pub fn for_root(root: impl Into<PathBuf>) -> Self {
        Self {
            sources: SourcesConfig {
                root: root.into(),
                suffix: default_suffix(),
                include_globs: default_include_globs(),
                exclude_globs: Vec::new(),
                follow_symlinks: false,
            },
            output: OutputConfig::default(),
            server: ServerConfig::default(),
            query: QueryConfig::default(),
        }
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

pub fn validate(config: &Config) -> Result<()> {
    if config.sources.include_globs.is_empty() {
        anyhow::bail!("sources.include_globs must not be empty");
    }

    if config.query.max_limit == 0 {
        anyhow::bail!("query.max_limit must be >= 1");
    }
    if config.query.example_limit == 0 || config.query.search_limit == 0 {
        anyhow::bail!("query.example_limit and query.search_limit must be >= 1");
    }
    if config.query.example_limit > config.query.max_limit
        || config.query.search_limit > config.query.max_limit
    {
        anyhow::bail!(
            "query default limits must not exceed query.max_limit ({})",
            config.query.max_limit
        );
    }

    if config.server.bind.trim().is_empty() {
        anyhow::bail!("server.bind must not be empty");
    }

    Ok(())
}
