//! Core data models shared by the extraction pipeline and the query engine.
//!
//! Two shapes flow through the system:
//!
//! - [`RawRecord`]: what a dialect extractor produces for one matched
//!   construct. Loosely typed: a `type` tag, the originating collection and
//!   document, and an open map of type-specific fields.
//! - [`KnowledgeItem`]: the canonical, schema-stable record stored in a
//!   [`KnowledgeBase`](crate::knowledge::KnowledgeBase). Its [`ItemContent`]
//!   is an enum, so the content fields always match the item's [`ItemKind`].

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use std::fmt;

/// Schema version stamped into every item's metadata.
pub const SCHEMA_VERSION: &str = "1.0.0";

/// Number of hex characters kept from the seed digest.
const ID_LEN: usize = 12;

/// Raw record `type` tags emitted by the extractors.
pub mod raw_type {
    pub const COMMAND: &str = "command";
    pub const ENVIRONMENT: &str = "environment";
    pub const EXECUTABLE_EXAMPLE: &str = "executable_example";
    pub const KEY_VALUE: &str = "key_value";
    pub const FEEDBACK: &str = "feedback";
}

/// Derive a short deterministic identifier from a seed string.
///
/// The same seed always yields the same id, which makes re-extraction of an
/// unchanged collection idempotent.
pub fn item_id(seed: &str) -> String {
    let digest = Sha256::digest(seed.as_bytes());
    let mut id = hex::encode(digest);
    id.truncate(ID_LEN);
    id
}

/// Un-normalized extraction result for one matched construct.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawRecord {
    #[serde(rename = "type")]
    pub record_type: String,
    pub source_collection: String,
    /// Path of the originating document, relative to the collection root.
    pub source_document: String,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl RawRecord {
    pub fn new(
        record_type: &str,
        source_collection: impl Into<String>,
        source_document: impl Into<String>,
    ) -> Self {
        Self {
            record_type: record_type.to_string(),
            source_collection: source_collection.into(),
            source_document: source_document.into(),
            fields: Map::new(),
        }
    }

    /// Builder-style field setter.
    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.fields.insert(key.to_string(), value.into());
        self
    }

    /// Sets `id` from the given seed.
    pub fn with_seed(self, seed: &str) -> Self {
        let id = item_id(seed);
        self.with("id", id)
    }

    pub fn id(&self) -> Option<&str> {
        self.str_field("id")
    }

    pub fn str_field(&self, key: &str) -> Option<&str> {
        self.fields.get(key).and_then(Value::as_str)
    }

    /// Best-effort identifier for log messages about this record.
    pub fn display_id(&self) -> String {
        match self.id() {
            Some(id) => id.to_string(),
            None => format!(
                "{}:{}:{}",
                self.source_collection, self.source_document, self.record_type
            ),
        }
    }
}

/// The four representable item kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemKind {
    CommandSpecification,
    EnvironmentSpecification,
    ExecutableExample,
    HumanFeedback,
}

impl ItemKind {
    pub const ALL: [ItemKind; 4] = [
        ItemKind::CommandSpecification,
        ItemKind::EnvironmentSpecification,
        ItemKind::ExecutableExample,
        ItemKind::HumanFeedback,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ItemKind::CommandSpecification => "command_specification",
            ItemKind::EnvironmentSpecification => "environment_specification",
            ItemKind::ExecutableExample => "executable_example",
            ItemKind::HumanFeedback => "human_feedback",
        }
    }

    /// Ordering hint. Not a relevance score.
    pub const fn priority(&self) -> u8 {
        match self {
            ItemKind::ExecutableExample => 10,
            ItemKind::CommandSpecification => 8,
            ItemKind::EnvironmentSpecification => 7,
            ItemKind::HumanFeedback => 6,
        }
    }

    pub const fn quality_score(&self) -> f64 {
        match self {
            ItemKind::ExecutableExample => 0.9,
            ItemKind::CommandSpecification | ItemKind::EnvironmentSpecification => 0.8,
            ItemKind::HumanFeedback => 0.7,
        }
    }

    pub const fn category(&self) -> &'static str {
        match self {
            ItemKind::CommandSpecification => "latex_command",
            ItemKind::EnvironmentSpecification => "latex_environment",
            ItemKind::ExecutableExample => "code_example",
            ItemKind::HumanFeedback => "best_practice",
        }
    }
}

impl fmt::Display for ItemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Closed set of labels assigned to runnable samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ChartCategory {
    #[serde(rename = "line_chart")]
    LineChart,
    #[serde(rename = "bar_chart")]
    BarChart,
    #[serde(rename = "scatter_plot")]
    ScatterPlot,
    #[serde(rename = "3d_plot")]
    Plot3d,
    #[serde(rename = "node_graph")]
    NodeGraph,
    #[serde(rename = "pie_chart")]
    PieChart,
    #[serde(rename = "other")]
    Other,
}

impl ChartCategory {
    pub const ALL: [ChartCategory; 7] = [
        ChartCategory::LineChart,
        ChartCategory::BarChart,
        ChartCategory::ScatterPlot,
        ChartCategory::Plot3d,
        ChartCategory::NodeGraph,
        ChartCategory::PieChart,
        ChartCategory::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ChartCategory::LineChart => "line_chart",
            ChartCategory::BarChart => "bar_chart",
            ChartCategory::ScatterPlot => "scatter_plot",
            ChartCategory::Plot3d => "3d_plot",
            ChartCategory::NodeGraph => "node_graph",
            ChartCategory::PieChart => "pie_chart",
            ChartCategory::Other => "other",
        }
    }

    pub fn parse(s: &str) -> Option<ChartCategory> {
        Self::ALL.into_iter().find(|c| c.as_str() == s)
    }
}

impl fmt::Display for ChartCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    High,
    Medium,
    Low,
}

/// Canonical knowledge unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeItem {
    pub id: String,
    pub kind: ItemKind,
    pub source_collection: String,
    pub metadata: ItemMetadata,
    pub content: ItemContent,
    pub ranking: Ranking,
}

impl KnowledgeItem {
    /// Assemble an item; `kind` and `ranking` follow from the content variant.
    pub fn new(
        id: String,
        source_collection: String,
        metadata: ItemMetadata,
        content: ItemContent,
    ) -> Self {
        let kind = content.kind();
        Self {
            id,
            kind,
            source_collection,
            metadata,
            content,
            ranking: Ranking::for_kind(kind),
        }
    }

    /// Name of the command or environment, for specification items.
    pub fn name(&self) -> Option<&str> {
        self.metadata.name.as_deref()
    }

    pub fn chart_category(&self) -> Option<ChartCategory> {
        self.metadata.chart_category
    }

    pub fn description(&self) -> &str {
        match &self.content {
            ItemContent::Command(c) => &c.description,
            ItemContent::Environment(c) => &c.description,
            ItemContent::Example(c) => &c.description,
            ItemContent::Feedback(_) => "",
        }
    }

    pub fn code(&self) -> Option<&str> {
        match &self.content {
            ItemContent::Example(c) => Some(&c.code),
            _ => None,
        }
    }

    /// Lower-cased text that free-text search matches against.
    pub fn searchable_text(&self) -> String {
        let mut text = String::new();
        match &self.content {
            ItemContent::Example(c) => text.push_str(&c.code),
            ItemContent::Feedback(c) => text.push_str(&c.message),
            _ => {}
        }
        text.push_str(self.description());
        text.push(' ');
        text.push_str(&self.metadata.tags.join(" "));
        text.push(' ');
        text.push_str(self.kind.as_str());
        text.to_lowercase()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemMetadata {
    pub tags: Vec<String>,
    pub category: String,
    pub source_document: String,
    pub schema_version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chart_category: Option<ChartCategory>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feedback_type: Option<String>,
}

/// Kind-specific payload. Serialized without a tag; the variant is
/// recovered from its field set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ItemContent {
    Example(ExampleContent),
    Environment(EnvironmentContent),
    Command(CommandContent),
    Feedback(FeedbackContent),
}

impl ItemContent {
    pub fn kind(&self) -> ItemKind {
        match self {
            ItemContent::Command(_) => ItemKind::CommandSpecification,
            ItemContent::Environment(_) => ItemKind::EnvironmentSpecification,
            ItemContent::Example(_) => ItemKind::ExecutableExample,
            ItemContent::Feedback(_) => ItemKind::HumanFeedback,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CommandContent {
    pub description: String,
    pub syntax: String,
    pub parameters: Vec<Parameter>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EnvironmentContent {
    pub description: String,
    pub begin_syntax: String,
    pub end_syntax: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExampleContent {
    pub description: String,
    pub code: String,
    pub options: String,
    pub dependencies: Vec<String>,
    pub parameters: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FeedbackContent {
    pub message: String,
    pub severity: Severity,
}

/// A command argument parsed from `\marg{}` / `\oarg{}` markup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    pub kind: ParameterKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParameterKind {
    Required,
    Optional,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ranking {
    pub priority: u8,
    pub quality_score: f64,
}

impl Ranking {
    pub fn for_kind(kind: ItemKind) -> Self {
        Self {
            priority: kind.priority(),
            quality_score: kind.quality_score(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn item_id_is_deterministic_and_short() {
        let a = item_id("cmd_\\draw");
        let b = item_id("cmd_\\draw");
        assert_eq!(a, b);
        assert_eq!(a.len(), 12);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, item_id("cmd_\\node"));
    }

    #[test]
    fn raw_record_serializes_flat() {
        let rec = RawRecord::new(raw_type::COMMAND, "pgfplots", "axis.tex")
            .with("command_name", "\\addplot")
            .with_seed("cmd_\\addplot_axis");
        let json = serde_json::to_value(&rec).unwrap();
        assert_eq!(json["type"], "command");
        assert_eq!(json["command_name"], "\\addplot");
        assert_eq!(json["id"], item_id("cmd_\\addplot_axis"));

        let back: RawRecord = serde_json::from_value(json).unwrap();
        assert_eq!(back, rec);
    }

    #[test]
    fn display_id_falls_back_to_location() {
        let rec = RawRecord::new(raw_type::FEEDBACK, "tikz-pgf", "a/b.tex");
        assert_eq!(rec.display_id(), "tikz-pgf:a/b.tex:feedback");
    }

    #[test]
    fn priorities_order_examples_first() {
        assert_eq!(ItemKind::ExecutableExample.priority(), 10);
        assert_eq!(ItemKind::CommandSpecification.priority(), 8);
        assert_eq!(ItemKind::EnvironmentSpecification.priority(), 7);
        assert_eq!(ItemKind::HumanFeedback.priority(), 6);
    }

    #[test]
    fn content_round_trips_to_the_same_variant() {
        let item = KnowledgeItem::new(
            "abc".to_string(),
            "tikz-pgf".to_string(),
            ItemMetadata {
                tags: vec!["tikz-pgf".to_string(), "environment".to_string()],
                category: ItemKind::EnvironmentSpecification.category().to_string(),
                source_document: "x.tex".to_string(),
                schema_version: SCHEMA_VERSION.to_string(),
                name: Some("tikzpicture".to_string()),
                chart_category: None,
                feedback_type: None,
            },
            ItemContent::Environment(EnvironmentContent {
                description: "pictures".to_string(),
                begin_syntax: "\\begin{tikzpicture}".to_string(),
                end_syntax: "\\end{tikzpicture}".to_string(),
            }),
        );
        let json = serde_json::to_string(&item).unwrap();
        let back: KnowledgeItem = serde_json::from_str(&json).unwrap();
        assert_eq!(back.kind, ItemKind::EnvironmentSpecification);
        assert_eq!(back.content.kind(), back.kind);
        assert_eq!(back, item);
    }

    #[test]
    fn chart_category_names() {
        assert_eq!(ChartCategory::parse("3d_plot"), Some(ChartCategory::Plot3d));
        assert_eq!(ChartCategory::parse("flowchart"), None);
        assert_eq!(
            serde_json::to_value(ChartCategory::Plot3d).unwrap(),
            serde_json::json!("3d_plot")
        );
    }
}
