//! Fallback for collections with no dedicated dialect.
//!
//! Runs a fixed list of common sample environments over every document.
//! Coverage over precision: anything inside one of these blocks that looks
//! like LaTeX becomes an example.

use std::sync::LazyLock;

use regex::Regex;
use texkb_core::models::RawRecord;

use crate::extract::{
    block_regex, blocks, document_stem, example_record, is_runnable_sample, scan_documents,
    ExtractOutcome, PatternExtractor, SourceCollection,
};

/// Sample environments tried in order.
pub const SAMPLE_ENVIRONMENTS: [&str; 7] = [
    "codeexample",
    "lstlisting",
    "verbatim",
    "example",
    "LTXexample",
    "tkzexample",
    "examplecode",
];

static SAMPLE_BLOCKS: LazyLock<Vec<(&'static str, Regex)>> = LazyLock::new(|| {
    SAMPLE_ENVIRONMENTS
        .iter()
        .map(|env| (*env, block_regex(env)))
        .collect()
});

pub struct GenericExtractor;

impl PatternExtractor for GenericExtractor {
    fn dialect(&self) -> &str {
        "generic"
    }

    fn extract(&self, collection: &SourceCollection) -> ExtractOutcome {
        let name = collection.name.as_str();
        scan_documents(
            collection,
            collection.documents.iter().map(String::as_str),
            |document, text, out| out.extend(samples(name, document, text)),
        )
    }
}

fn samples(collection: &str, document: &str, text: &str) -> Vec<RawRecord> {
    let stem = document_stem(document);
    let mut records = Vec::new();
    for (env, re) in SAMPLE_BLOCKS.iter() {
        for (idx, block) in blocks(re, text).into_iter().enumerate() {
            if !is_runnable_sample(block.body) {
                continue;
            }
            records.push(
                example_record(
                    collection,
                    document,
                    block.body,
                    &format!("example_{}_{}_{}", stem, env, idx),
                )
                .with("options", block.options.unwrap_or("")),
            );
        }
    }
    records
}
