//! The name-dispatched tool façade.
//!
//! Four built-in tools map onto [`QueryEngine`] lookups and answer with a
//! single text content block. [`ToolRegistry::dispatch`] never fails: an
//! unknown tool name or unusable arguments come back as a content block
//! with `isError: true`, naming the tool and, for bad arguments, the
//! deserialization problem.
//!
//! ```text
//! POST /tools/{name}  ─┐
//! MCP tools/call      ─┼──▶ ToolRegistry::dispatch ──▶ Tool::execute ──▶ QueryEngine
//! texkb tool <name>   ─┘
//! ```

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use texkb_core::models::{ChartCategory, ItemContent, KnowledgeItem};
use texkb_core::query::{ListFilter, QueryEngine, SearchCategory, SearchRequest};

use crate::config::QueryConfig;

/// One block of tool output. Only text blocks are produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentBlock {
    #[serde(rename = "type")]
    pub kind: String,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolOutput {
    pub content: Vec<ContentBlock>,
    #[serde(rename = "isError")]
    pub is_error: bool,
}

impl ToolOutput {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content: vec![ContentBlock {
                kind: "text".to_string(),
                text: text.into(),
            }],
            is_error: false,
        }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self {
            is_error: true,
            ..Self::text(text)
        }
    }

    /// All text blocks joined, for printing.
    pub fn joined_text(&self) -> String {
        self.content
            .iter()
            .map(|b| b.text.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// What a tool can see while executing.
pub struct ToolContext<'a> {
    pub engine: &'a QueryEngine,
    pub limits: &'a QueryConfig,
}

/// A named operation over the knowledge base.
///
/// `execute` receives the raw JSON arguments and returns the text of the
/// answer. Errors are turned into error blocks by
/// [`ToolRegistry::dispatch`].
pub trait Tool: Send + Sync {
    /// Route name, as in `POST /tools/{name}`.
    fn name(&self) -> &str;

    /// One-line description for tool discovery.
    fn description(&self) -> &str;

    /// JSON Schema of the arguments object.
    fn parameters_schema(&self) -> Value;

    fn execute(&self, params: Value, ctx: &ToolContext<'_>) -> Result<String>;
}

/// Deserialize tool arguments; a missing or `null` body means no arguments.
fn parse_args<T: DeserializeOwned>(params: Value) -> Result<T> {
    let params = if params.is_null() {
        Value::Object(Default::default())
    } else {
        params
    };
    serde_json::from_value(params).context("invalid arguments")
}

/// The text shown for an item's body.
fn snippet(item: &KnowledgeItem) -> String {
    match &item.content {
        ItemContent::Example(c) => c.code.clone(),
        ItemContent::Command(c) => c.syntax.clone(),
        ItemContent::Environment(c) => format!("{}\n...\n{}", c.begin_syntax, c.end_syntax),
        ItemContent::Feedback(c) => c.message.clone(),
    }
}

fn join_sections(parts: Vec<String>) -> String {
    parts.join("\n---\n\n")
}

// ═══════════════════════════════════════════════════════════════════════
// Built-in tools
// ═══════════════════════════════════════════════════════════════════════

/// Runnable examples, optionally by chart category and collection.
pub struct ChartExampleTool;

#[derive(Debug, Deserialize)]
struct ChartExampleArgs {
    #[serde(default, alias = "chart_type")]
    chart_category: Option<ChartCategory>,
    #[serde(default, alias = "macro_package")]
    source_collection: Option<String>,
    #[serde(default)]
    limit: Option<usize>,
}

impl Tool for ChartExampleTool {
    fn name(&self) -> &str {
        "get_latex_chart_example"
    }

    fn description(&self) -> &str {
        "Get executable LaTeX chart examples by type. Returns ready-to-use TikZ/PGFPlots code for various chart types."
    }

    fn parameters_schema(&self) -> Value {
        let charts: Vec<&str> = ChartCategory::ALL.iter().map(|c| c.as_str()).collect();
        json!({
            "type": "object",
            "properties": {
                "chart_category": {
                    "type": "string",
                    "enum": charts,
                    "description": "Type of chart to get examples for"
                },
                "source_collection": {
                    "type": "string",
                    "description": "Source collection to restrict to (e.g. pgfplots, tikz-pgf)"
                },
                "limit": {
                    "type": "integer",
                    "default": 5,
                    "description": "Maximum number of examples to return"
                }
            }
        })
    }

    fn execute(&self, params: Value, ctx: &ToolContext<'_>) -> Result<String> {
        let args: ChartExampleArgs = parse_args(params)?;
        let limit = ctx.limits.clamp(args.limit, ctx.limits.example_limit);
        let items = ctx.engine.examples(
            args.chart_category,
            args.source_collection.as_deref(),
            limit,
        );
        let parts = items
            .iter()
            .map(|item| {
                format!(
                    "**Example ({})**\n{}\n\n```latex\n{}\n```\n",
                    item.source_collection,
                    item.description(),
                    snippet(item)
                )
            })
            .collect();
        Ok(format!(
            "Found {} examples:\n\n{}",
            items.len(),
            join_sections(parts)
        ))
    }
}

/// Paginated free-text search.
pub struct SearchKnowledgeTool;

#[derive(Debug, Deserialize)]
struct SearchArgs {
    query: String,
    #[serde(default)]
    category: Option<String>,
    #[serde(default, alias = "chart_type")]
    chart_category: Option<ChartCategory>,
    #[serde(default, alias = "macro_package")]
    source_collection: Option<String>,
    #[serde(default)]
    limit: Option<usize>,
    #[serde(default)]
    offset: usize,
}

impl Tool for SearchKnowledgeTool {
    fn name(&self) -> &str {
        "search_latex_knowledge"
    }

    fn description(&self) -> &str {
        "Search the LaTeX knowledge base for commands, examples, or concepts. Searches across code, descriptions, and tags."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "Search query (substring match over code, descriptions, tags and kind)"
                },
                "category": {
                    "type": "string",
                    "default": "all",
                    "description": "all, charts, examples, commands, environments, feedback, or a source collection name"
                },
                "chart_category": { "type": "string", "description": "Only examples of this chart category" },
                "source_collection": { "type": "string", "description": "Only items from this collection" },
                "limit": { "type": "integer", "default": 10, "description": "Maximum number of results" },
                "offset": { "type": "integer", "default": 0, "description": "Number of matches to skip" }
            },
            "required": ["query"]
        })
    }

    fn execute(&self, params: Value, ctx: &ToolContext<'_>) -> Result<String> {
        let args: SearchArgs = parse_args(params)?;
        let request = SearchRequest {
            query: args.query,
            category: SearchCategory::parse(args.category.as_deref().unwrap_or("all")),
            filters: ListFilter {
                kind: None,
                source_collection: args.source_collection,
                chart_category: args.chart_category,
            },
            offset: args.offset,
            limit: ctx.limits.clamp(args.limit, ctx.limits.search_limit),
        };
        let page = ctx.engine.search(&request);
        let parts = page
            .items
            .iter()
            .map(|item| {
                format!(
                    "**{}** ({})\n{}\n\n```latex\n{}\n```",
                    item.kind,
                    item.source_collection,
                    item.description(),
                    snippet(item)
                )
            })
            .collect();
        let mut text = format!(
            "Found {} results for '{}' (showing {} from offset {}):\n\n{}",
            page.total,
            page.query,
            page.items.len(),
            page.offset,
            join_sections(parts)
        );
        if let Some(next) = page.next_offset {
            text.push_str(&format!("\n\nMore results available at offset {}.", next));
        }
        Ok(text)
    }
}

/// Command and environment specifications by name substring.
pub struct CommandSpecTool;

#[derive(Debug, Deserialize)]
struct CommandSpecArgs {
    command_name: String,
    #[serde(default, alias = "macro_package")]
    source_collection: Option<String>,
    #[serde(default)]
    limit: Option<usize>,
}

impl Tool for CommandSpecTool {
    fn name(&self) -> &str {
        "get_command_spec"
    }

    fn description(&self) -> &str {
        "Get detailed TikZ/PGFPlots command specifications including syntax, parameters, and usage examples."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "command_name": {
                    "type": "string",
                    "description": "Command or environment name to look up (e.g., draw, node, addplot)"
                },
                "source_collection": {
                    "type": "string",
                    "description": "Source collection to restrict to"
                },
                "limit": {
                    "type": "integer",
                    "default": 10,
                    "description": "Maximum number of specifications to return"
                }
            },
            "required": ["command_name"]
        })
    }

    fn execute(&self, params: Value, ctx: &ToolContext<'_>) -> Result<String> {
        let args: CommandSpecArgs = parse_args(params)?;
        let limit = ctx.limits.clamp(args.limit, ctx.limits.search_limit);
        let items = ctx
            .engine
            .specs(&args.command_name, args.source_collection.as_deref(), limit);
        let parts = items
            .iter()
            .map(|item| {
                let label = match item.content {
                    ItemContent::Environment(_) => "Environment",
                    _ => "Command",
                };
                format!(
                    "**{} {}** `{}`\n{}\n\n```latex\n{}\n```",
                    item.source_collection,
                    label,
                    item.name().unwrap_or(""),
                    item.description(),
                    snippet(item)
                )
            })
            .collect();
        Ok(format!(
            "Found {} command specifications:\n\n{}",
            items.len(),
            join_sections(parts)
        ))
    }
}

/// Warnings and notes, optionally by collection.
pub struct HumanFeedbackTool;

#[derive(Debug, Deserialize)]
struct FeedbackArgs {
    #[serde(default, alias = "macro_package")]
    source_collection: Option<String>,
    #[serde(default)]
    limit: Option<usize>,
}

impl Tool for HumanFeedbackTool {
    fn name(&self) -> &str {
        "get_human_feedback"
    }

    fn description(&self) -> &str {
        "Get warnings, best practices, and human feedback about LaTeX chart generation."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "source_collection": {
                    "type": "string",
                    "description": "Source collection to restrict to"
                },
                "limit": {
                    "type": "integer",
                    "default": 10,
                    "description": "Maximum number of feedback items to return"
                }
            }
        })
    }

    fn execute(&self, params: Value, ctx: &ToolContext<'_>) -> Result<String> {
        let args: FeedbackArgs = parse_args(params)?;
        let limit = ctx.limits.clamp(args.limit, ctx.limits.search_limit);
        let items = ctx
            .engine
            .feedback(args.source_collection.as_deref(), limit);
        let parts = items
            .iter()
            .map(|item| {
                let severity = match &item.content {
                    ItemContent::Feedback(c) => {
                        serde_json::to_value(c.severity).unwrap_or(Value::Null)
                    }
                    _ => Value::Null,
                };
                format!(
                    "**{}** (severity: {})\n{}",
                    item.source_collection,
                    severity.as_str().unwrap_or("unknown"),
                    snippet(item)
                )
            })
            .collect();
        Ok(format!(
            "Found {} feedback items:\n\n{}",
            items.len(),
            join_sections(parts)
        ))
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Registry
// ═══════════════════════════════════════════════════════════════════════

/// Registry of tools, looked up by name.
pub struct ToolRegistry {
    tools: Vec<Box<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self { tools: Vec::new() }
    }

    /// Registry with the four built-in tools.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(ChartExampleTool));
        registry.register(Box::new(SearchKnowledgeTool));
        registry.register(Box::new(CommandSpecTool));
        registry.register(Box::new(HumanFeedbackTool));
        registry
    }

    pub fn register(&mut self, tool: Box<dyn Tool>) {
        self.tools.push(tool);
    }

    pub fn tools(&self) -> &[Box<dyn Tool>] {
        &self.tools
    }

    pub fn find(&self, name: &str) -> Option<&dyn Tool> {
        self.tools
            .iter()
            .find(|t| t.name() == name)
            .map(|t| t.as_ref())
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Tool descriptors for discovery.
    pub fn list(&self) -> Vec<Value> {
        self.tools
            .iter()
            .map(|t| {
                json!({
                    "name": t.name(),
                    "description": t.description(),
                    "parameters": t.parameters_schema(),
                })
            })
            .collect()
    }

    /// Run the named tool. Never fails: problems become error blocks.
    pub fn dispatch(&self, name: &str, params: Value, ctx: &ToolContext<'_>) -> ToolOutput {
        let Some(tool) = self.find(name) else {
            tracing::debug!(tool = name, "unknown tool");
            return ToolOutput::error(format!("Unknown tool: {}", name));
        };
        match tool.execute(params, ctx) {
            Ok(text) => ToolOutput::text(text),
            Err(e) => {
                tracing::debug!(tool = name, error = %e, "tool failed");
                ToolOutput::error(format!("Error executing tool {}: {:#}", name, e))
            }
        }
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}
