//! `texkb sources`: the collections a build would see.

use anyhow::Result;

use crate::collect::discover_collections;
use crate::config::Config;
use crate::registry::ExtractorRegistry;

pub fn list_sources(config: &Config, registry: &ExtractorRegistry) -> Result<()> {
    let collections = discover_collections(&config.sources)?;
    if collections.is_empty() {
        println!("No source collections under {}", config.sources.root.display());
        return Ok(());
    }

    println!("{:<20} {:<14} DOCUMENTS", "COLLECTION", "DIALECT");
    for collection in &collections {
        println!(
            "{:<20} {:<14} {}",
            collection.name,
            registry.dialect_for(&collection.name),
            collection.documents.len()
        );
    }
    Ok(())
}
