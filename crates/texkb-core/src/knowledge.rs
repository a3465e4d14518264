//! The immutable knowledge base aggregate.
//!
//! A [`KnowledgeBase`] is built once from a batch of raw record sequences
//! (one per source collection) and never mutated afterwards. Indices and
//! statistics are computed eagerly at build time; rebuilding means building
//! a new instance.

use std::collections::{BTreeMap, HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::models::{ChartCategory, ItemKind, KnowledgeItem, Ranking, RawRecord};
use crate::structure::structure_all;

/// Raw records extracted from one source collection, in extraction order.
#[derive(Debug, Clone, Default)]
pub struct CollectionBatch {
    pub collection: String,
    pub records: Vec<RawRecord>,
}

/// Counts by kind, source collection and chart category.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeStats {
    pub total_items: usize,
    pub by_kind: BTreeMap<String, usize>,
    pub by_source_collection: BTreeMap<String, usize>,
    pub by_chart_category: BTreeMap<String, usize>,
}

impl KnowledgeStats {
    fn compute(items: &[KnowledgeItem]) -> Self {
        let mut stats = KnowledgeStats {
            total_items: items.len(),
            ..Default::default()
        };
        for item in items {
            *stats.by_kind.entry(item.kind.to_string()).or_insert(0) += 1;
            *stats
                .by_source_collection
                .entry(item.source_collection.clone())
                .or_insert(0) += 1;
            if let Some(chart) = item.chart_category() {
                *stats.by_chart_category.entry(chart.to_string()).or_insert(0) += 1;
            }
        }
        stats
    }
}

/// What happened while building a knowledge base.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BuildSummary {
    pub raw_records: usize,
    pub items: usize,
    pub malformed: usize,
    pub unrecognized: usize,
    /// Items dropped because an earlier item already carried the same id.
    pub duplicate_ids: usize,
    /// Stored item count per collection, in batch order.
    pub per_collection: Vec<(String, usize)>,
}

impl BuildSummary {
    /// Raw records that did not become items.
    pub fn dropped(&self) -> usize {
        self.raw_records - self.items
    }
}

#[derive(Debug, Default)]
struct Indices {
    by_kind: HashMap<ItemKind, Vec<usize>>,
    by_collection: HashMap<String, Vec<usize>>,
    by_chart: HashMap<ChartCategory, Vec<usize>>,
}

impl Indices {
    fn compute(items: &[KnowledgeItem]) -> Self {
        let mut idx = Indices::default();
        for (pos, item) in items.iter().enumerate() {
            idx.by_kind.entry(item.kind).or_default().push(pos);
            idx.by_collection
                .entry(item.source_collection.clone())
                .or_default()
                .push(pos);
            if let Some(chart) = item.chart_category() {
                idx.by_chart.entry(chart).or_default().push(pos);
            }
        }
        idx
    }
}

/// Ordered, read-only collection of knowledge items.
#[derive(Debug, Default)]
pub struct KnowledgeBase {
    items: Vec<KnowledgeItem>,
    indices: Indices,
    stats: KnowledgeStats,
}

impl KnowledgeBase {
    /// Structure and concatenate collection batches in order.
    pub fn build(batches: &[CollectionBatch]) -> (KnowledgeBase, BuildSummary) {
        let mut summary = BuildSummary::default();
        let mut items: Vec<KnowledgeItem> = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();

        for batch in batches {
            summary.raw_records += batch.records.len();
            let report = structure_all(&batch.records);
            summary.malformed += report.malformed;
            summary.unrecognized += report.unrecognized;

            let mut stored = 0usize;
            for item in report.items {
                if !seen.insert(item.id.clone()) {
                    summary.duplicate_ids += 1;
                    tracing::warn!(
                        id = %item.id,
                        collection = %batch.collection,
                        document = %item.metadata.source_document,
                        "dropping item with duplicate id"
                    );
                    continue;
                }
                items.push(item);
                stored += 1;
            }
            summary.per_collection.push((batch.collection.clone(), stored));
        }

        summary.items = items.len();
        (Self::from_trusted(items), summary)
    }

    /// Rebuild indices and statistics over an already structured item list,
    /// such as one loaded from a batch artifact. Items with an empty id, a
    /// `kind` that disagrees with their content, or an id repeating an
    /// earlier one are dropped. Rankings are reset from the kind table.
    pub fn from_items(items: Vec<KnowledgeItem>) -> KnowledgeBase {
        let mut seen: HashSet<String> = HashSet::new();
        let mut kept: Vec<KnowledgeItem> = Vec::with_capacity(items.len());
        for mut item in items {
            if item.id.is_empty() {
                tracing::warn!(collection = %item.source_collection, "dropping item with empty id");
                continue;
            }
            let content_kind = item.content.kind();
            if item.kind != content_kind {
                tracing::warn!(
                    id = %item.id,
                    kind = %item.kind,
                    content_kind = %content_kind,
                    "dropping item whose kind does not match its content"
                );
                continue;
            }
            if !seen.insert(item.id.clone()) {
                tracing::warn!(id = %item.id, "dropping item with duplicate id");
                continue;
            }
            item.ranking = Ranking::for_kind(item.kind);
            kept.push(item);
        }
        Self::from_trusted(kept)
    }

    fn from_trusted(items: Vec<KnowledgeItem>) -> KnowledgeBase {
        let indices = Indices::compute(&items);
        let stats = KnowledgeStats::compute(&items);
        KnowledgeBase {
            items,
            indices,
            stats,
        }
    }

    pub fn items(&self) -> &[KnowledgeItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn stats(&self) -> &KnowledgeStats {
        &self.stats
    }

    pub fn get(&self, id: &str) -> Option<&KnowledgeItem> {
        self.items.iter().find(|item| item.id == id)
    }

    /// Positions of items of the given kind, ascending.
    pub fn positions_by_kind(&self, kind: ItemKind) -> &[usize] {
        self.indices
            .by_kind
            .get(&kind)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn positions_by_collection(&self, collection: &str) -> &[usize] {
        self.indices
            .by_collection
            .get(collection)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn positions_by_chart(&self, chart: ChartCategory) -> &[usize] {
        self.indices
            .by_chart
            .get(&chart)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn collections(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self
            .indices
            .by_collection
            .keys()
            .map(String::as_str)
            .collect();
        names.sort_unstable();
        names
    }
}
