//! `texkb stats`: item counts of the current knowledge base.

use anyhow::Result;
use texkb_core::knowledge::KnowledgeStats;

use crate::config::Config;
use crate::pipeline::{load_or_build, structured_artifact_path};
use crate::progress::BuildProgressReporter;
use crate::registry::ExtractorRegistry;

pub fn run_stats(
    config: &Config,
    registry: &ExtractorRegistry,
    progress: &dyn BuildProgressReporter,
) -> Result<()> {
    let kb = load_or_build(config, registry, progress)?;
    let path = structured_artifact_path(config);

    println!("texkb knowledge base");
    println!("====================");
    println!();
    if path.is_file() {
        println!("  Artifact:    {}", path.display());
    } else {
        println!("  Artifact:    (none, built in memory)");
    }
    print_stats(kb.stats());
    Ok(())
}

pub fn print_stats(stats: &KnowledgeStats) {
    println!("  Items:       {}", stats.total_items);
    print_section("By kind", &stats.by_kind);
    print_section("By collection", &stats.by_source_collection);
    print_section("By chart category", &stats.by_chart_category);
}

fn print_section(title: &str, counts: &std::collections::BTreeMap<String, usize>) {
    if counts.is_empty() {
        return;
    }
    println!();
    println!("  {}:", title);
    for (name, count) in counts {
        println!("    {:<28} {}", name, count);
    }
}
