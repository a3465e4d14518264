//! `chemfig`: `\exemple` samples and `\CFkey` option declarations from the
//! English manual.
//!
//! A sample reads `\exemple[*][options]{title}<d>code<d>` where the code
//! delimiter `<d>` is `/` or `|` and the same character closes the code.

use std::sync::LazyLock;

use regex::Regex;
use texkb_core::models::{raw_type, RawRecord};

use crate::extract::{
    document_stem, example_record, is_runnable_sample, scan_primary, ExtractOutcome,
    PatternExtractor, SourceCollection,
};

const PRIMARY_DOCUMENT: &str = "chemfig-en.tex";

static EXEMPLE_HEAD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\\exemple(\*)?(?:\[([^\]]*)\])?\{([^/|]*)\}([/|])").expect("valid exemple regex")
});
static CF_KEY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\\CFkey\{([^}]+)\}").expect("valid CFkey regex"));

pub struct ChemfigExtractor;

impl PatternExtractor for ChemfigExtractor {
    fn dialect(&self) -> &str {
        "chemfig"
    }

    fn extract(&self, collection: &SourceCollection) -> ExtractOutcome {
        let name = collection.name.as_str();
        scan_primary(collection, PRIMARY_DOCUMENT, |document, text, out| {
            out.extend(samples(name, document, text));
            out.extend(keys(name, document, text));
        })
    }
}

struct Exemple<'t> {
    options: &'t str,
    title: &'t str,
    code: &'t str,
}

/// Scan `\exemple` heads, closing each sample at the next occurrence of its
/// own delimiter. A head whose delimiter never recurs is not a sample.
fn exemples(text: &str) -> Vec<Exemple<'_>> {
    let mut found = Vec::new();
    let mut pos = 0usize;
    while let Some(caps) = EXEMPLE_HEAD.captures_at(text, pos) {
        let (Some(head), Some(delim)) = (caps.get(0), caps.get(4)) else {
            break;
        };
        let body_start = head.end();
        match text[body_start..].find(delim.as_str()) {
            Some(len) => {
                found.push(Exemple {
                    options: caps.get(2).map_or("", |m| m.as_str()),
                    title: caps.get(3).map_or("", |m| m.as_str()),
                    code: text[body_start..body_start + len].trim(),
                });
                pos = body_start + len + delim.len();
            }
            None => pos = head.end(),
        }
    }
    found
}

fn samples(collection: &str, document: &str, text: &str) -> Vec<RawRecord> {
    let stem = document_stem(document);
    exemples(text)
        .into_iter()
        .enumerate()
        .filter(|(_, e)| is_runnable_sample(e.code))
        .map(|(idx, e)| {
            example_record(collection, document, e.code, &format!("example_{}_{}", stem, idx))
                .with("title", e.title)
                .with("description", e.title)
                .with("options", e.options)
        })
        .collect()
}

fn keys(collection: &str, document: &str, text: &str) -> Vec<RawRecord> {
    CF_KEY
        .captures_iter(text)
        .map(|c| {
            let name = &c[1];
            RawRecord::new(raw_type::KEY_VALUE, collection, document)
                .with("key_name", name)
                .with("description", format!("Configuration key: {}", name))
                .with_seed(&format!("key_{}", name))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delimiter_closes_its_own_sample() {
        let text = r"\exemple{Ethanol}/\chemfig{H_3C-CH_2-OH}/ then
\exemple*[45]{With slash}|\chemfig{A-[:30]B/C}| and
\exemple{Dangling}/never closed";
        let found = exemples(text);
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].title, "Ethanol");
        assert_eq!(found[0].code, "\\chemfig{H_3C-CH_2-OH}");
        assert_eq!(found[1].options, "45");
        assert_eq!(found[1].code, "\\chemfig{A-[:30]B/C}");
    }

    #[test]
    fn extracts_samples_then_keys() {
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::write(
            dir.path().join(PRIMARY_DOCUMENT),
            r"\CFkey{atom sep} \exemple{Water}/\chemfig{H-O-H}/ \CFkey{bond offset} \exemple{Tiny}/\x/",
        )
        .unwrap();
        let c = SourceCollection::new("chemfig", dir.path(), vec![]);
        let outcome = ChemfigExtractor.extract(&c);
        let types: Vec<&str> = outcome.records.iter().map(|r| r.record_type.as_str()).collect();
        assert_eq!(types, vec!["executable_example", "key_value", "key_value"]);
        assert_eq!(outcome.records[0].str_field("description"), Some("Water"));
        assert_eq!(outcome.records[0].str_field("chart_category"), Some("other"));
        assert_eq!(outcome.records[1].str_field("key_name"), Some("atom sep"));
    }
}
