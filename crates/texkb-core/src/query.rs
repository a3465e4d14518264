//! Query engine over an immutable [`KnowledgeBase`] snapshot.
//!
//! Operations:
//!
//! | Method | Purpose |
//! |--------|---------|
//! | [`list`](QueryEngine::list) | Conjunctive exact-match filtering with a result cap |
//! | [`search`](QueryEngine::search) | Paginated free-text containment search |
//! | [`stats`](QueryEngine::stats) | Precomputed counts |
//! | [`examples`](QueryEngine::examples), [`specs`](QueryEngine::specs), [`feedback`](QueryEngine::feedback) | Shaped lookups used by the HTTP routes and tools |
//!
//! Free-text search is plain substring containment of the lower-cased query
//! in an item's searchable text. There is no tokenization, stemming or
//! scoring: every match is equally relevant and results come back in
//! collection order.

use std::sync::Arc;

use serde::Serialize;

use crate::knowledge::{KnowledgeBase, KnowledgeStats};
use crate::models::{ChartCategory, ItemKind, KnowledgeItem};

/// Exact-match predicates, combined with AND. `None` means unconstrained.
#[derive(Debug, Clone, Default)]
pub struct ListFilter {
    pub kind: Option<ItemKind>,
    pub source_collection: Option<String>,
    pub chart_category: Option<ChartCategory>,
}

impl ListFilter {
    pub fn matches(&self, item: &KnowledgeItem) -> bool {
        if let Some(kind) = self.kind {
            if item.kind != kind {
                return false;
            }
        }
        if let Some(ref collection) = self.source_collection {
            if &item.source_collection != collection {
                return false;
            }
        }
        if let Some(chart) = self.chart_category {
            if item.chart_category() != Some(chart) {
                return false;
            }
        }
        true
    }
}

/// Shorthand restricting a search to a kind or a source collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchCategory {
    All,
    Kind(ItemKind),
    Collection(String),
}

impl SearchCategory {
    /// `all`, a kind shorthand (`charts`, `examples`, `commands`,
    /// `environments`, `feedback`), or otherwise a collection name.
    pub fn parse(s: &str) -> SearchCategory {
        match s.trim() {
            "" | "all" => SearchCategory::All,
            "charts" | "examples" => SearchCategory::Kind(ItemKind::ExecutableExample),
            "commands" => SearchCategory::Kind(ItemKind::CommandSpecification),
            "environments" => SearchCategory::Kind(ItemKind::EnvironmentSpecification),
            "feedback" => SearchCategory::Kind(ItemKind::HumanFeedback),
            other => SearchCategory::Collection(other.to_string()),
        }
    }

    fn matches(&self, item: &KnowledgeItem) -> bool {
        match self {
            SearchCategory::All => true,
            SearchCategory::Kind(kind) => item.kind == *kind,
            SearchCategory::Collection(name) => &item.source_collection == name,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SearchRequest {
    pub query: String,
    pub category: SearchCategory,
    /// Extra exact-match predicates applied on top of the category.
    pub filters: ListFilter,
    pub offset: usize,
    pub limit: usize,
}

impl SearchRequest {
    pub fn new(query: &str, limit: usize) -> Self {
        Self {
            query: query.to_string(),
            category: SearchCategory::All,
            filters: ListFilter::default(),
            offset: 0,
            limit,
        }
    }
}

/// One page of search results.
#[derive(Debug, Clone, Serialize)]
pub struct SearchPage<'a> {
    pub query: String,
    pub items: Vec<&'a KnowledgeItem>,
    pub total: usize,
    pub offset: usize,
    pub limit: usize,
    pub has_more: bool,
    pub next_offset: Option<usize>,
}

/// Stateless reader over one knowledge base snapshot.
#[derive(Debug, Clone)]
pub struct QueryEngine {
    kb: Arc<KnowledgeBase>,
}

impl QueryEngine {
    pub fn new(kb: Arc<KnowledgeBase>) -> Self {
        Self { kb }
    }

    pub fn knowledge_base(&self) -> &KnowledgeBase {
        &self.kb
    }

    /// Items satisfying every supplied predicate, in collection order, at
    /// most `limit` of them.
    pub fn list(&self, filter: &ListFilter, limit: usize) -> Vec<&KnowledgeItem> {
        let items = self.kb.items();
        match self.candidates(filter) {
            Some(positions) => positions
                .iter()
                .map(|&pos| &items[pos])
                .filter(|item| filter.matches(item))
                .take(limit)
                .collect(),
            None => items
                .iter()
                .filter(|item| filter.matches(item))
                .take(limit)
                .collect(),
        }
    }

    /// Smallest index slice covering the filter, if any predicate is set.
    fn candidates(&self, filter: &ListFilter) -> Option<&[usize]> {
        let mut slices: Vec<&[usize]> = Vec::new();
        if let Some(kind) = filter.kind {
            slices.push(self.kb.positions_by_kind(kind));
        }
        if let Some(ref collection) = filter.source_collection {
            slices.push(self.kb.positions_by_collection(collection));
        }
        if let Some(chart) = filter.chart_category {
            slices.push(self.kb.positions_by_chart(chart));
        }
        slices.into_iter().min_by_key(|s| s.len())
    }

    /// Paginated containment search. Pages are taken from the full match
    /// set in collection order, so consecutive pages never overlap.
    pub fn search(&self, req: &SearchRequest) -> SearchPage<'_> {
        let needle = req.query.to_lowercase();
        let matches: Vec<&KnowledgeItem> = self
            .kb
            .items()
            .iter()
            .filter(|item| req.category.matches(item))
            .filter(|item| req.filters.matches(item))
            .filter(|item| needle.is_empty() || item.searchable_text().contains(&needle))
            .collect();

        let total = matches.len();
        let end = req.offset.saturating_add(req.limit);
        let has_more = end < total;
        let items = matches
            .into_iter()
            .skip(req.offset)
            .take(req.limit)
            .collect();

        SearchPage {
            query: needle,
            items,
            total,
            offset: req.offset,
            limit: req.limit,
            has_more,
            next_offset: has_more.then_some(end),
        }
    }

    pub fn stats(&self) -> &KnowledgeStats {
        self.kb.stats()
    }

    pub fn examples(
        &self,
        chart_category: Option<ChartCategory>,
        source_collection: Option<&str>,
        limit: usize,
    ) -> Vec<&KnowledgeItem> {
        let filter = ListFilter {
            kind: Some(ItemKind::ExecutableExample),
            source_collection: source_collection.map(str::to_string),
            chart_category,
        };
        self.list(&filter, limit)
    }

    /// Command and environment specifications whose name contains `name`
    /// (case-insensitive). An empty `name` matches every specification.
    pub fn specs(
        &self,
        name: &str,
        source_collection: Option<&str>,
        limit: usize,
    ) -> Vec<&KnowledgeItem> {
        let needle = name.to_lowercase();
        self.kb
            .items()
            .iter()
            .filter(|item| {
                matches!(
                    item.kind,
                    ItemKind::CommandSpecification | ItemKind::EnvironmentSpecification
                )
            })
            .filter(|item| source_collection.is_none_or(|c| item.source_collection == c))
            .filter(|item| {
                item.name()
                    .map(|n| n.to_lowercase().contains(&needle))
                    .unwrap_or(false)
            })
            .take(limit)
            .collect()
    }

    pub fn feedback(&self, source_collection: Option<&str>, limit: usize) -> Vec<&KnowledgeItem> {
        let filter = ListFilter {
            kind: Some(ItemKind::HumanFeedback),
            source_collection: source_collection.map(str::to_string),
            chart_category: None,
        };
        self.list(&filter, limit)
    }
}
