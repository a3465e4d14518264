//! `texkb search`: free-text search from the command line.

use std::sync::Arc;

use anyhow::{bail, Result};
use texkb_core::models::{ChartCategory, ItemContent, KnowledgeItem};
use texkb_core::query::{ListFilter, QueryEngine, SearchCategory, SearchRequest};

use crate::config::Config;
use crate::pipeline::load_or_build;
use crate::progress::BuildProgressReporter;
use crate::registry::ExtractorRegistry;

const EXCERPT_CHARS: usize = 120;

pub struct SearchArgs {
    pub query: String,
    pub category: Option<String>,
    pub chart_category: Option<String>,
    pub source_collection: Option<String>,
    pub offset: usize,
    pub limit: Option<usize>,
}

pub fn run_search(
    config: &Config,
    registry: &ExtractorRegistry,
    progress: &dyn BuildProgressReporter,
    args: SearchArgs,
) -> Result<()> {
    let chart_category = match args.chart_category.as_deref() {
        None => None,
        Some(s) => match ChartCategory::parse(s) {
            Some(c) => Some(c),
            None => bail!(
                "Unknown chart category: {}. Use one of: {}",
                s,
                ChartCategory::ALL
                    .iter()
                    .map(|c| c.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
        },
    };

    let kb = load_or_build(config, registry, progress)?;
    let engine = QueryEngine::new(Arc::new(kb));
    let request = SearchRequest {
        query: args.query,
        category: SearchCategory::parse(args.category.as_deref().unwrap_or("all")),
        filters: ListFilter {
            kind: None,
            source_collection: args.source_collection,
            chart_category,
        },
        offset: args.offset,
        limit: config.query.clamp(args.limit, config.query.search_limit),
    };
    let page = engine.search(&request);

    if page.items.is_empty() {
        println!("No results.");
        return Ok(());
    }

    for (i, item) in page.items.iter().enumerate() {
        println!(
            "{}. [{}] {} / {}",
            page.offset + i + 1,
            item.kind,
            item.source_collection,
            item.name().unwrap_or(&item.metadata.source_document)
        );
        if let Some(chart) = item.chart_category() {
            println!("    chart: {}", chart);
        }
        println!("    document: {}", item.metadata.source_document);
        println!("    excerpt: \"{}\"", excerpt(item));
        println!("    id: {}", item.id);
        println!();
    }

    println!(
        "Showing {}-{} of {}.",
        page.offset + 1,
        page.offset + page.items.len(),
        page.total
    );
    if let Some(next) = page.next_offset {
        println!("Next page: --offset {}", next);
    }
    Ok(())
}

fn excerpt(item: &KnowledgeItem) -> String {
    let text = if !item.description().is_empty() {
        item.description()
    } else {
        match &item.content {
            ItemContent::Example(c) => c.code.as_str(),
            ItemContent::Feedback(c) => c.message.as_str(),
            _ => "",
        }
    };
    let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() > EXCERPT_CHARS {
        let cut: String = flat.chars().take(EXCERPT_CHARS).collect();
        format!("{}...", cut)
    } else {
        flat
    }
}
