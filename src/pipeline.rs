//! The batch pipeline: discover, extract, structure, write artifacts.
//!
//! # Artifacts
//!
//! Written to `output.dir`:
//!
//! | File | Contents |
//! |------|----------|
//! | `<collection>-knowledge-raw.json` | Raw records of one collection (only when it produced any) |
//! | `knowledge-raw.json` | All raw records, in collection order |
//! | `knowledge-structured.json` | The structured knowledge items |
//! | `knowledge-stats.json` | Item counts by kind, collection and chart category |
//! | `extraction-stats.json` | Raw record count per collection, plus `total` |
//!
//! `texkb serve` loads `knowledge-structured.json` when it exists.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use texkb_core::knowledge::{BuildSummary, KnowledgeBase, KnowledgeStats};
use texkb_core::models::{KnowledgeItem, RawRecord, SCHEMA_VERSION};

use crate::collect::{discover_collections, Collected, CollectionReport, RawKnowledgeCollector};
use crate::config::Config;
use crate::progress::{BuildProgressEvent, BuildProgressReporter};
use crate::registry::ExtractorRegistry;

pub const RAW_ARTIFACT: &str = "knowledge-raw.json";
pub const STRUCTURED_ARTIFACT: &str = "knowledge-structured.json";
pub const STATS_ARTIFACT: &str = "knowledge-stats.json";
pub const EXTRACTION_STATS_ARTIFACT: &str = "extraction-stats.json";

/// `knowledge-stats.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatsArtifact {
    #[serde(flatten)]
    pub stats: KnowledgeStats,
    pub schema_version: String,
    pub generated_at: String,
}

/// Result of one full build.
#[derive(Debug)]
pub struct BuildOutput {
    pub knowledge: KnowledgeBase,
    pub summary: BuildSummary,
    pub reports: Vec<CollectionReport>,
}

/// Discover, extract and structure every collection. Writes nothing.
pub fn build_knowledge(
    config: &Config,
    registry: &ExtractorRegistry,
    progress: &dyn BuildProgressReporter,
) -> Result<(BuildOutput, Collected)> {
    let collections = discover_collections(&config.sources)?;
    let mut collected = RawKnowledgeCollector::new(registry, progress).collect(&collections);

    progress.report(BuildProgressEvent::Structuring {
        records: collected.total_records() as u64,
    });
    let (knowledge, summary) = KnowledgeBase::build(&collected.batches);
    if summary.dropped() > 0 {
        tracing::warn!(
            malformed = summary.malformed,
            unrecognized = summary.unrecognized,
            duplicate_ids = summary.duplicate_ids,
            "{} raw records did not become knowledge items",
            summary.dropped()
        );
    }

    let reports = std::mem::take(&mut collected.reports);
    Ok((
        BuildOutput {
            knowledge,
            summary,
            reports,
        },
        collected,
    ))
}

/// Full build, with every artifact written to `output.dir`.
pub fn run_build(
    config: &Config,
    registry: &ExtractorRegistry,
    progress: &dyn BuildProgressReporter,
) -> Result<BuildOutput> {
    let (output, collected) = build_knowledge(config, registry, progress)?;
    write_artifacts(&config.output.dir, &collected, &output)?;
    Ok(output)
}

/// Write to a sibling temp file, then rename over `path`. Readers see the
/// old file or the new one, never a partial write.
fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    let mut tmp_name = path.file_name().unwrap_or_default().to_os_string();
    tmp_name.push(".tmp");
    let tmp = path.with_file_name(tmp_name);
    std::fs::write(&tmp, json).with_context(|| format!("Failed to write {}", tmp.display()))?;
    std::fs::rename(&tmp, path).with_context(|| {
        let _ = std::fs::remove_file(&tmp);
        format!("Failed to replace {}", path.display())
    })
}

pub fn write_artifacts(dir: &Path, collected: &Collected, output: &BuildOutput) -> Result<()> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create output directory {}", dir.display()))?;

    let mut extraction_stats: BTreeMap<String, usize> = BTreeMap::new();
    let mut all_raw: Vec<&RawRecord> = Vec::new();
    for batch in &collected.batches {
        extraction_stats.insert(batch.collection.clone(), batch.records.len());
        if batch.records.is_empty() {
            continue;
        }
        let path = dir.join(format!("{}-knowledge-raw.json", batch.collection));
        write_json(&path, &batch.records)?;
        all_raw.extend(batch.records.iter());
    }
    extraction_stats.insert("total".to_string(), all_raw.len());

    write_json(&dir.join(RAW_ARTIFACT), &all_raw)?;
    write_json(
        &dir.join(STATS_ARTIFACT),
        &StatsArtifact {
            stats: output.knowledge.stats().clone(),
            schema_version: SCHEMA_VERSION.to_string(),
            generated_at: chrono::Utc::now().to_rfc3339(),
        },
    )?;
    write_json(&dir.join(EXTRACTION_STATS_ARTIFACT), &extraction_stats)?;
    // Last, so `load_or_build` never picks up a build whose other artifacts failed.
    write_json(&dir.join(STRUCTURED_ARTIFACT), output.knowledge.items())?;
    Ok(())
}

/// Human summary of a finished build, on stdout.
pub fn print_build_summary(output: &BuildOutput, dir: &Path) {
    println!("{:<20} {:<14} {:>9} {:>8}", "COLLECTION", "DIALECT", "DOCUMENTS", "RECORDS");
    for report in &output.reports {
        println!(
            "{:<20} {:<14} {:>9} {:>8}",
            report.collection, report.dialect, report.documents, report.records
        );
        for warning in &report.warnings {
            println!("  warning: {}", warning);
        }
    }
    println!();
    println!("  Raw records:     {}", output.summary.raw_records);
    println!("  Items:           {}", output.summary.items);
    if output.summary.dropped() > 0 {
        println!(
            "  Dropped:         {} (malformed {}, unrecognized {}, duplicate ids {})",
            output.summary.dropped(),
            output.summary.malformed,
            output.summary.unrecognized,
            output.summary.duplicate_ids
        );
    }
    println!("  Artifacts:       {}", dir.display());
}

pub fn structured_artifact_path(config: &Config) -> PathBuf {
    config.output.dir.join(STRUCTURED_ARTIFACT)
}

/// Load a knowledge base from a structured artifact.
pub fn load_structured(path: &Path) -> Result<KnowledgeBase> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let items: Vec<KnowledgeItem> = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))?;
    Ok(KnowledgeBase::from_items(items))
}

/// The knowledge base `serve` and the query commands start from: the
/// structured artifact when present, otherwise a fresh in-memory build.
pub fn load_or_build(
    config: &Config,
    registry: &ExtractorRegistry,
    progress: &dyn BuildProgressReporter,
) -> Result<KnowledgeBase> {
    let path = structured_artifact_path(config);
    if path.is_file() {
        tracing::info!(path = %path.display(), "loading structured knowledge");
        return load_structured(&path);
    }
    tracing::info!("no structured artifact found, building from sources");
    let (output, _) = build_knowledge(config, registry, progress)?;
    Ok(output.knowledge)
}
