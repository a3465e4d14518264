//! Raw record → [`KnowledgeItem`] structuring.
//!
//! One mapping per recognized record type. Records of any other type
//! (`key_value`, or anything a future extractor emits) are excluded without
//! error. A record missing a required field is malformed: it is skipped and
//! counted, never allowed to abort the batch.

use std::collections::BTreeSet;
use std::sync::LazyLock;

use anyhow::{anyhow, Result};
use regex::Regex;

use crate::classify::classify_chart;
use crate::models::{
    raw_type, ChartCategory, CommandContent, EnvironmentContent, ExampleContent,
    FeedbackContent, ItemContent, ItemKind, ItemMetadata, KnowledgeItem, Parameter,
    ParameterKind, RawRecord, Severity, SCHEMA_VERSION,
};

/// Maximum number of parameter hints kept per example.
const MAX_EXAMPLE_PARAMETERS: usize = 10;

static MARG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\\marg\{([^}]+)\}").expect("valid marg regex"));
static OARG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\\oarg\{([^}]+)\}").expect("valid oarg regex"));
static TIKZ_LIBRARY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\\usetikzlibrary\{([^}]+)\}").expect("valid usetikzlibrary regex")
});

/// Key-value hints scanned in example code, in reporting order.
static PARAMETER_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"xlabel\s*=\s*\{([^}]+)\}",
        r"ylabel\s*=\s*\{([^}]+)\}",
        r"title\s*=\s*\{([^}]+)\}",
        r"width\s*=\s*([^,\]]+)",
        r"height\s*=\s*([^,\]]+)",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("valid parameter regex"))
    .collect()
});

/// Outcome of structuring a batch of raw records.
#[derive(Debug, Default)]
pub struct StructureReport {
    pub items: Vec<KnowledgeItem>,
    /// Records skipped because a required field was missing or mistyped.
    pub malformed: usize,
    /// Records whose `type` has no knowledge item kind.
    pub unrecognized: usize,
}

/// Structure one raw record.
///
/// Returns `Ok(None)` for record types that are not representable and
/// `Err` for malformed records.
pub fn structure(record: &RawRecord) -> Result<Option<KnowledgeItem>> {
    let item = match record.record_type.as_str() {
        raw_type::COMMAND => structure_command(record)?,
        raw_type::ENVIRONMENT => structure_environment(record)?,
        raw_type::EXECUTABLE_EXAMPLE => structure_example(record)?,
        raw_type::FEEDBACK => structure_feedback(record)?,
        _ => return Ok(None),
    };
    Ok(Some(item))
}

/// Structure every record, absorbing per-record failures into counts.
pub fn structure_all<'a, I>(records: I) -> StructureReport
where
    I: IntoIterator<Item = &'a RawRecord>,
{
    let mut report = StructureReport::default();
    for record in records {
        match structure(record) {
            Ok(Some(item)) => report.items.push(item),
            Ok(None) => {
                report.unrecognized += 1;
                tracing::debug!(
                    record = %record.display_id(),
                    record_type = %record.record_type,
                    "skipping record with no knowledge item kind"
                );
            }
            Err(e) => {
                report.malformed += 1;
                tracing::warn!(record = %record.display_id(), error = %e, "skipping malformed record");
            }
        }
    }
    report
}

fn required<'a>(record: &'a RawRecord, key: &str) -> Result<&'a str> {
    record.str_field(key).ok_or_else(|| {
        anyhow!(
            "{} record is missing required field '{}'",
            record.record_type,
            key
        )
    })
}

fn required_id(record: &RawRecord) -> Result<String> {
    let id = required(record, "id")?;
    if id.is_empty() {
        return Err(anyhow!("{} record has an empty id", record.record_type));
    }
    Ok(id.to_string())
}

fn metadata(record: &RawRecord, kind: ItemKind, extra_tags: &[&str]) -> ItemMetadata {
    ItemMetadata {
        tags: tags(&record.source_collection, extra_tags),
        category: kind.category().to_string(),
        source_document: record.source_document.clone(),
        schema_version: SCHEMA_VERSION.to_string(),
        name: None,
        chart_category: None,
        feedback_type: None,
    }
}

/// Source collection first, then kind-specific tags, without repeats.
fn tags(collection: &str, extra: &[&str]) -> Vec<String> {
    let mut tags: Vec<String> = vec![collection.to_string()];
    for tag in extra {
        if !tags.iter().any(|t| t == tag) {
            tags.push(tag.to_string());
        }
    }
    tags
}

fn structure_command(record: &RawRecord) -> Result<KnowledgeItem> {
    let id = required_id(record)?;
    let name = required(record, "command_name")?;
    let description = required(record, "description")?;
    let syntax = record.str_field("syntax").unwrap_or(name);

    let mut meta = metadata(record, ItemKind::CommandSpecification, &["command"]);
    meta.name = Some(name.to_string());

    let content = ItemContent::Command(CommandContent {
        description: description.to_string(),
        syntax: syntax.to_string(),
        parameters: extract_signature_parameters(syntax),
    });
    Ok(KnowledgeItem::new(
        id,
        record.source_collection.clone(),
        meta,
        content,
    ))
}

fn structure_environment(record: &RawRecord) -> Result<KnowledgeItem> {
    let id = required_id(record)?;
    let name = required(record, "environment_name")?;
    let description = required(record, "description")?;

    let mut meta = metadata(record, ItemKind::EnvironmentSpecification, &["environment"]);
    meta.name = Some(name.to_string());

    let content = ItemContent::Environment(EnvironmentContent {
        description: description.to_string(),
        begin_syntax: format!("\\begin{{{}}}", name),
        end_syntax: format!("\\end{{{}}}", name),
    });
    Ok(KnowledgeItem::new(
        id,
        record.source_collection.clone(),
        meta,
        content,
    ))
}

fn structure_example(record: &RawRecord) -> Result<KnowledgeItem> {
    let id = required_id(record)?;
    let code = required(record, "code")?;
    let chart = record
        .str_field("chart_category")
        .and_then(ChartCategory::parse)
        .unwrap_or_else(|| classify_chart(code));

    let mut meta = metadata(
        record,
        ItemKind::ExecutableExample,
        &[chart.as_str(), "example"],
    );
    meta.chart_category = Some(chart);

    let content = ItemContent::Example(ExampleContent {
        description: record.str_field("description").unwrap_or("").to_string(),
        code: code.to_string(),
        options: record.str_field("options").unwrap_or("").to_string(),
        dependencies: extract_dependencies(code),
        parameters: extract_code_parameters(code),
    });
    Ok(KnowledgeItem::new(
        id,
        record.source_collection.clone(),
        meta,
        content,
    ))
}

fn structure_feedback(record: &RawRecord) -> Result<KnowledgeItem> {
    let id = required_id(record)?;
    let message = required(record, "content")?;
    let feedback_type = record.str_field("feedback_type").unwrap_or("warning");

    let mut meta = metadata(record, ItemKind::HumanFeedback, &["feedback", feedback_type]);
    meta.feedback_type = Some(feedback_type.to_string());

    let content = ItemContent::Feedback(FeedbackContent {
        message: message.to_string(),
        severity: severity(message),
    });
    Ok(KnowledgeItem::new(
        id,
        record.source_collection.clone(),
        meta,
        content,
    ))
}

/// `\marg{}` arguments are required, `\oarg{}` optional; required first.
pub fn extract_signature_parameters(syntax: &str) -> Vec<Parameter> {
    let required = MARG.captures_iter(syntax).map(|c| Parameter {
        name: c[1].to_string(),
        kind: ParameterKind::Required,
    });
    let optional = OARG.captures_iter(syntax).map(|c| Parameter {
        name: c[1].to_string(),
        kind: ParameterKind::Optional,
    });
    required.chain(optional).collect()
}

/// Supporting packages implied by markers in the code, plus declared
/// TikZ libraries. Sorted and deduplicated.
pub fn extract_dependencies(code: &str) -> Vec<String> {
    let mut deps = BTreeSet::new();
    if code.contains("\\begin{tikzpicture}") {
        deps.insert("tikz".to_string());
    }
    if code.contains("\\begin{axis}") || code.contains("\\addplot") {
        deps.insert("pgfplots".to_string());
    }
    for caps in TIKZ_LIBRARY.captures_iter(code) {
        for lib in caps[1].split(',') {
            let lib = lib.trim();
            if !lib.is_empty() {
                deps.insert(lib.to_string());
            }
        }
    }
    deps.into_iter().collect()
}

/// Best-effort hints: axis labels, title, width, height.
pub fn extract_code_parameters(code: &str) -> Vec<String> {
    PARAMETER_PATTERNS
        .iter()
        .flat_map(|re| re.captures_iter(code).map(|c| c[1].to_string()))
        .take(MAX_EXAMPLE_PARAMETERS)
        .collect()
}

pub fn severity(message: &str) -> Severity {
    let lower = message.to_lowercase();
    if lower.contains("error") || lower.contains("fail") {
        Severity::High
    } else if lower.contains("warning") {
        Severity::Medium
    } else {
        Severity::Low
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::item_id;

    fn command(name: &str) -> RawRecord {
        RawRecord::new(raw_type::COMMAND, "tikz-pgf", "base.tex")
            .with("command_name", name)
            .with("description", "draws things")
            .with_seed(&format!("cmd_{}_base", name))
    }

    #[test]
    fn command_gets_fixed_ranking_and_tags() {
        let item = structure(&command("\\draw")).unwrap().unwrap();
        assert_eq!(item.kind, ItemKind::CommandSpecification);
        assert_eq!(item.id, item_id("cmd_\\draw_base"));
        assert_eq!(item.ranking.priority, 8);
        assert!((item.ranking.quality_score - 0.8).abs() < 1e-9);
        assert_eq!(item.metadata.tags, vec!["tikz-pgf", "command"]);
        assert_eq!(item.metadata.category, "latex_command");
        assert_eq!(item.name(), Some("\\draw"));
    }

    #[test]
    fn command_parameters_come_from_signature() {
        let rec = command("\\node").with("syntax", "\\node\\oarg{options}\\marg{text}");
        let item = structure(&rec).unwrap().unwrap();
        match item.content {
            ItemContent::Command(c) => {
                assert_eq!(
                    c.parameters,
                    vec![
                        Parameter {
                            name: "text".to_string(),
                            kind: ParameterKind::Required
                        },
                        Parameter {
                            name: "options".to_string(),
                            kind: ParameterKind::Optional
                        },
                    ]
                );
            }
            other => panic!("unexpected content: {:?}", other),
        }
    }

    #[test]
    fn environment_syntax_is_derived_from_name() {
        let rec = RawRecord::new(raw_type::ENVIRONMENT, "pgfplots", "axis.tex")
            .with("environment_name", "axis")
            .with("description", "an axis")
            .with_seed("env_axis_axis");
        let item = structure(&rec).unwrap().unwrap();
        assert_eq!(item.ranking.priority, 7);
        match item.content {
            ItemContent::Environment(c) => {
                assert_eq!(c.begin_syntax, "\\begin{axis}");
                assert_eq!(c.end_syntax, "\\end{axis}");
            }
            other => panic!("unexpected content: {:?}", other),
        }
    }

    #[test]
    fn example_derives_dependencies_and_parameters() {
        let code = "\\usetikzlibrary{arrows, shapes}\n\\begin{tikzpicture}\\begin{axis}[xlabel={Time}, ylabel={Speed}, width=7cm, height=5cm]\\addplot {x};\\end{axis}\\end{tikzpicture}";
        let rec = RawRecord::new(raw_type::EXECUTABLE_EXAMPLE, "pgfplots", "intro.tex")
            .with("code", code)
            .with_seed("example_intro_0");
        let item = structure(&rec).unwrap().unwrap();
        assert_eq!(item.ranking.priority, 10);
        assert_eq!(item.chart_category(), Some(ChartCategory::LineChart));
        assert_eq!(item.metadata.tags, vec!["pgfplots", "line_chart", "example"]);
        match item.content {
            ItemContent::Example(c) => {
                assert_eq!(c.dependencies, vec!["arrows", "pgfplots", "shapes", "tikz"]);
                assert_eq!(c.parameters, vec!["Time", "Speed", "7cm", "5cm"]);
            }
            other => panic!("unexpected content: {:?}", other),
        }
    }

    #[test]
    fn example_parameters_are_capped() {
        let code: String = (0..15).map(|i| format!("title={{T{}}} ", i)).collect();
        assert_eq!(extract_code_parameters(&code).len(), 10);
    }

    #[test]
    fn declared_chart_category_is_kept() {
        let rec = RawRecord::new(raw_type::EXECUTABLE_EXAMPLE, "pgfplots", "a.tex")
            .with("code", "\\addplot {x};")
            .with("chart_category", "bar_chart")
            .with_seed("example_a_0");
        let item = structure(&rec).unwrap().unwrap();
        assert_eq!(item.chart_category(), Some(ChartCategory::BarChart));
    }

    #[test]
    fn feedback_severity_tiers() {
        assert_eq!(severity("This will FAIL to compile"), Severity::High);
        assert_eq!(severity("an error occurs when"), Severity::High);
        assert_eq!(severity("Warning: slow"), Severity::Medium);
        assert_eq!(severity("note that spacing differs"), Severity::Low);
    }

    #[test]
    fn feedback_tags_include_subtype() {
        let rec = RawRecord::new(raw_type::FEEDBACK, "tikz-pgf", "a.tex")
            .with("feedback_type", "warning")
            .with("content", "options are ignored")
            .with_seed("warning_options are ignored");
        let item = structure(&rec).unwrap().unwrap();
        assert_eq!(item.kind, ItemKind::HumanFeedback);
        assert_eq!(item.metadata.tags, vec!["tikz-pgf", "feedback", "warning"]);
        assert_eq!(item.metadata.feedback_type.as_deref(), Some("warning"));
    }

    #[test]
    fn unknown_types_are_excluded_not_errors() {
        let rec = RawRecord::new(raw_type::KEY_VALUE, "chemfig", "chemfig-en.tex")
            .with("key_name", "atom sep")
            .with_seed("key_atom sep");
        assert!(structure(&rec).unwrap().is_none());
    }

    #[test]
    fn malformed_record_is_skipped_and_counted() {
        let good = command("\\draw");
        let missing_name = RawRecord::new(raw_type::COMMAND, "tikz-pgf", "base.tex")
            .with("description", "no name")
            .with_seed("cmd_x");
        let missing_id = RawRecord::new(raw_type::FEEDBACK, "tikz-pgf", "base.tex")
            .with("content", "text");
        let key = RawRecord::new(raw_type::KEY_VALUE, "chemfig", "c.tex").with_seed("key_a");

        let report = structure_all([&good, &missing_name, &missing_id, &key]);
        assert_eq!(report.items.len(), 1);
        assert_eq!(report.malformed, 2);
        assert_eq!(report.unrecognized, 1);
    }
}
