//! Source collection discovery and the raw extraction driver.
//!
//! Every non-hidden subdirectory of `sources.root` is one collection. Its
//! name, minus the configured suffix, selects the dialect. Documents are
//! found by walking the directory and applying the include/exclude globs,
//! then sorted so that extraction order never depends on the filesystem.

use std::path::Path;

use anyhow::{bail, Context, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use serde::Serialize;
use texkb_core::knowledge::CollectionBatch;
use walkdir::WalkDir;

use crate::config::SourcesConfig;
use crate::extract::SourceCollection;
use crate::progress::{BuildProgressEvent, BuildProgressReporter};
use crate::registry::ExtractorRegistry;

/// Extraction results for one collection.
#[derive(Debug, Clone, Serialize)]
pub struct CollectionReport {
    pub collection: String,
    pub dialect: String,
    pub documents: usize,
    pub documents_scanned: usize,
    pub records: usize,
    pub warnings: Vec<String>,
}

/// Everything extracted in one pass over all collections.
#[derive(Debug, Default)]
pub struct Collected {
    pub batches: Vec<CollectionBatch>,
    pub reports: Vec<CollectionReport>,
}

impl Collected {
    pub fn total_records(&self) -> usize {
        self.batches.iter().map(|b| b.records.len()).sum()
    }
}

/// Collection name for a directory name: the suffix is stripped when present.
pub fn collection_name(dir_name: &str, suffix: &str) -> String {
    if suffix.is_empty() {
        return dir_name.to_string();
    }
    dir_name.strip_suffix(suffix).unwrap_or(dir_name).to_string()
}

/// Find every source collection under `sources.root`, sorted by name.
pub fn discover_collections(sources: &SourcesConfig) -> Result<Vec<SourceCollection>> {
    let root = &sources.root;
    if !root.is_dir() {
        bail!("sources.root does not exist: {}", root.display());
    }

    let include_set = build_globset(&sources.include_globs)?;
    let exclude_set = build_globset(&sources.exclude_globs)?;

    let mut collections = Vec::new();
    let entries = std::fs::read_dir(root)
        .with_context(|| format!("Failed to list {}", root.display()))?;
    for entry in entries {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            continue;
        }
        let dir_name = entry.file_name().to_string_lossy().to_string();
        if dir_name.starts_with('.') {
            continue;
        }
        let documents = list_documents(
            &entry.path(),
            &include_set,
            &exclude_set,
            sources.follow_symlinks,
        )?;
        collections.push(SourceCollection::new(
            collection_name(&dir_name, &sources.suffix),
            entry.path(),
            documents,
        ));
    }

    collections.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(collections)
}

fn list_documents(
    dir: &Path,
    include_set: &GlobSet,
    exclude_set: &GlobSet,
    follow_symlinks: bool,
) -> Result<Vec<String>> {
    let mut documents = Vec::new();
    for entry in WalkDir::new(dir).follow_links(follow_symlinks) {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let relative = path.strip_prefix(dir).unwrap_or(path);
        let rel_str = relative.to_string_lossy().to_string();

        if exclude_set.is_match(&rel_str) {
            continue;
        }
        if !include_set.is_match(&rel_str) {
            continue;
        }
        documents.push(rel_str);
    }
    documents.sort();
    Ok(documents)
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern).with_context(|| format!("Invalid glob: {}", pattern))?);
    }
    Ok(builder.build()?)
}

/// Drives extraction across every collection in order.
pub struct RawKnowledgeCollector<'a> {
    registry: &'a ExtractorRegistry,
    progress: &'a dyn BuildProgressReporter,
}

impl<'a> RawKnowledgeCollector<'a> {
    pub fn new(registry: &'a ExtractorRegistry, progress: &'a dyn BuildProgressReporter) -> Self {
        Self { registry, progress }
    }

    /// Extract every collection. Per-collection problems are recorded in
    /// the reports; this never fails.
    pub fn collect(&self, collections: &[SourceCollection]) -> Collected {
        let mut collected = Collected::default();
        let total = collections.len() as u64;

        for (i, collection) in collections.iter().enumerate() {
            let extractor = self.registry.resolve(&collection.name);
            self.progress.report(BuildProgressEvent::Extracting {
                collection: collection.name.clone(),
                dialect: extractor.dialect().to_string(),
                n: i as u64 + 1,
                total,
            });

            let outcome = extractor.extract(collection);
            tracing::info!(
                collection = %collection.name,
                dialect = extractor.dialect(),
                documents = outcome.documents_scanned,
                records = outcome.records.len(),
                warnings = outcome.warnings.len(),
                "extracted collection"
            );
            self.progress.report(BuildProgressEvent::Extracted {
                collection: collection.name.clone(),
                records: outcome.records.len() as u64,
            });

            collected.reports.push(CollectionReport {
                collection: collection.name.clone(),
                dialect: extractor.dialect().to_string(),
                documents: collection.documents.len(),
                documents_scanned: outcome.documents_scanned,
                records: outcome.records.len(),
                warnings: outcome.warnings,
            });
            collected.batches.push(CollectionBatch {
                collection: collection.name.clone(),
                records: outcome.records,
            });
        }

        collected
    }
}
