//! `circuitikz`: component descriptors and `LTXexample` samples.
//!
//! Components are described with `\circuitdesc` and the bipole variant
//! `\circuitdescbip`, which carries a third argument listing aliases. Both
//! become `command` records named after the component.

use std::sync::LazyLock;

use regex::Regex;
use texkb_core::models::{raw_type, RawRecord};

use crate::extract::{
    block_regex, blocks, clean_text, document_stem, example_record, is_runnable_sample,
    scan_primary, ExtractOutcome, PatternExtractor, SourceCollection,
};

const PRIMARY_DOCUMENT: &str = "circuitikzmanual.tex";

static CIRCUIT_DESC: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\\circuitdesc(?:\*)?(?:\[[^\]]*\])?\{([^}]+)\}\{([^}]+)\}")
        .expect("valid circuitdesc regex")
});
static CIRCUIT_DESC_BIP: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\\circuitdescbip(?:\*)?(?:\[[^\]]*\])?\{([^}]+)\}\{([^}]+)\}\{([^}]*)\}")
        .expect("valid circuitdescbip regex")
});
static LTX_EXAMPLE: LazyLock<Regex> = LazyLock::new(|| block_regex("LTXexample"));

pub struct CircuitikzExtractor;

impl PatternExtractor for CircuitikzExtractor {
    fn dialect(&self) -> &str {
        "circuitikz"
    }

    fn extract(&self, collection: &SourceCollection) -> ExtractOutcome {
        let name = collection.name.as_str();
        scan_primary(collection, PRIMARY_DOCUMENT, |document, text, out| {
            out.extend(components(name, document, text));
            out.extend(samples(name, document, text));
        })
    }
}

fn component(collection: &str, document: &str, name: &str, description: &str) -> RawRecord {
    RawRecord::new(raw_type::COMMAND, collection, document)
        .with("command_name", name)
        .with("description", clean_text(description))
        .with_seed(&format!("comp_{}", name))
}

fn components(collection: &str, document: &str, text: &str) -> Vec<RawRecord> {
    let plain = CIRCUIT_DESC
        .captures_iter(text)
        .map(|c| component(collection, document, &c[1], &c[2]));
    let bipoles = CIRCUIT_DESC_BIP.captures_iter(text).map(|c| {
        component(collection, document, &c[1], &c[2]).with("aliases", c[3].trim())
    });
    plain.chain(bipoles).collect()
}

fn samples(collection: &str, document: &str, text: &str) -> Vec<RawRecord> {
    let stem = document_stem(document);
    blocks(&LTX_EXAMPLE, text)
        .into_iter()
        .enumerate()
        .filter(|(_, b)| is_runnable_sample(b.body))
        .map(|(idx, b)| {
            example_record(collection, document, b.body, &format!("example_{}_{}", stem, idx))
                .with("options", b.options.unwrap_or(""))
        })
        .collect()
}
