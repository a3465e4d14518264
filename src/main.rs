//! # texkb CLI
//!
//! ## Usage
//!
//! ```bash
//! texkb --config ./config/texkb.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `texkb sources` | List source collections with their dialect and document count |
//! | `texkb build` | Extract every collection and write the JSON artifacts |
//! | `texkb stats` | Print item counts by kind, collection and chart category |
//! | `texkb search "<query>"` | Paginated free-text search |
//! | `texkb tool list` | List the built-in tools |
//! | `texkb tool call <name>` | Call a tool with `--param key=value` arguments |
//! | `texkb serve` | Start the HTTP server (REST, tools, MCP at `/mcp`) |
//!
//! Logging goes to stderr and is controlled with `RUST_LOG`
//! (default `texkb=info`).

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand, ValueEnum};
use texkb::config::{load_config, Config};
use texkb::pipeline::{load_or_build, print_build_summary, run_build};
use texkb::progress::ProgressMode;
use texkb::query::QueryEngine;
use texkb::registry::ExtractorRegistry;
use texkb::search::{run_search, SearchArgs};
use texkb::snapshot::KnowledgeHandle;
use texkb::tools::{ToolContext, ToolRegistry};
use tracing_subscriber::EnvFilter;

/// Extracts LaTeX package manuals into a queryable knowledge base.
#[derive(Parser)]
#[command(name = "texkb", version, about)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/texkb.toml")]
    config: PathBuf,

    /// Progress output on stderr. Defaults to `human` on a terminal, `off` otherwise.
    #[arg(long, global = true, value_enum)]
    progress: Option<ProgressArg>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum ProgressArg {
    Off,
    Human,
    Json,
}

impl From<ProgressArg> for ProgressMode {
    fn from(arg: ProgressArg) -> Self {
        match arg {
            ProgressArg::Off => ProgressMode::Off,
            ProgressArg::Human => ProgressMode::Human,
            ProgressArg::Json => ProgressMode::Json,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// List source collections and the dialect each resolves to.
    Sources,

    /// Extract and structure every collection, then write the artifacts.
    Build,

    /// Print knowledge base statistics.
    ///
    /// Reads the structured artifact when present, otherwise builds in memory.
    Stats,

    /// Free-text search over descriptions, code, messages and tags.
    Search {
        query: String,

        /// `all`, `charts`, `commands`, `environments`, `feedback`, or a collection name.
        #[arg(long)]
        category: Option<String>,

        /// Only examples of this chart category (e.g. `bar_chart`).
        #[arg(long)]
        chart: Option<String>,

        /// Only items from this collection.
        #[arg(long)]
        collection: Option<String>,

        #[arg(long, default_value_t = 0)]
        offset: usize,

        #[arg(long)]
        limit: Option<usize>,
    },

    /// Inspect or call the built-in tools.
    Tool {
        #[command(subcommand)]
        action: ToolAction,
    },

    /// Start the HTTP server.
    Serve,
}

#[derive(Subcommand)]
enum ToolAction {
    /// List tools with their argument schemas.
    List,
    /// Call a tool and print its text output.
    Call {
        name: String,
        /// Tool arguments as `key=value` pairs. Values that parse as JSON
        /// (numbers, booleans) are passed as such, everything else as strings.
        #[arg(long = "param", value_parser = parse_key_val)]
        params: Vec<(String, String)>,
    },
}

/// Parse a `key=value` pair for `--param` arguments.
fn parse_key_val(s: &str) -> Result<(String, String), String> {
    let pos = s
        .find('=')
        .ok_or_else(|| format!("invalid KEY=VALUE: no '=' found in '{}'", s))?;
    Ok((s[..pos].to_string(), s[pos + 1..].to_string()))
}

fn params_to_json(params: Vec<(String, String)>) -> serde_json::Value {
    let map = params
        .into_iter()
        .map(|(k, v)| {
            let value = match serde_json::from_str::<serde_json::Value>(&v) {
                Ok(parsed @ (serde_json::Value::Number(_) | serde_json::Value::Bool(_))) => parsed,
                _ => serde_json::Value::String(v),
            };
            (k, value)
        })
        .collect();
    serde_json::Value::Object(map)
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("texkb=info")),
        )
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing();

    // Listing tools needs no corpus.
    if let Commands::Tool {
        action: ToolAction::List,
    } = &cli.command
    {
        let registry = ToolRegistry::with_builtins();
        println!("{}", serde_json::to_string_pretty(&registry.list())?);
        return Ok(());
    }

    let cfg: Config = load_config(&cli.config)?;
    let mode = cli
        .progress
        .map(ProgressMode::from)
        .unwrap_or_else(ProgressMode::default_for_tty);
    let progress = mode.reporter();
    let extractors = ExtractorRegistry::with_builtins();

    match cli.command {
        Commands::Sources => {
            texkb::sources::list_sources(&cfg, &extractors)?;
        }
        Commands::Build => {
            let output = run_build(&cfg, &extractors, progress.as_ref())?;
            print_build_summary(&output, &cfg.output.dir);
        }
        Commands::Stats => {
            texkb::stats::run_stats(&cfg, &extractors, progress.as_ref())?;
        }
        Commands::Search {
            query,
            category,
            chart,
            collection,
            offset,
            limit,
        } => {
            run_search(
                &cfg,
                &extractors,
                progress.as_ref(),
                SearchArgs {
                    query,
                    category,
                    chart_category: chart,
                    source_collection: collection,
                    offset,
                    limit,
                },
            )?;
        }
        Commands::Tool { action } => match action {
            ToolAction::Call { name, params } => {
                let kb = load_or_build(&cfg, &extractors, progress.as_ref())?;
                let engine = QueryEngine::new(Arc::new(kb));
                let ctx = ToolContext {
                    engine: &engine,
                    limits: &cfg.query,
                };
                let output = ToolRegistry::with_builtins().dispatch(&name, params_to_json(params), &ctx);
                println!("{}", output.joined_text());
                if output.is_error {
                    std::process::exit(1);
                }
            }
            ToolAction::List => {
                // Handled above (before config loading)
                unreachable!()
            }
        },
        Commands::Serve => {
            let kb = {
                let cfg = cfg.clone();
                tokio::task::spawn_blocking(move || {
                    let extractors = ExtractorRegistry::with_builtins();
                    load_or_build(&cfg, &extractors, mode.reporter().as_ref())
                })
                .await??
            };
            tracing::info!(items = kb.len(), "knowledge base loaded");
            texkb::server::run_server(cfg, Arc::new(KnowledgeHandle::new(kb))).await?;
        }
    }

    Ok(())
}
