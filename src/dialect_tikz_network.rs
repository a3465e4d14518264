//! `tikz-network`: one primary document, `\doccmddef{}` command entries and
//! `lstlisting` samples that draw vertices or edges.

use std::sync::LazyLock;

use regex::Regex;
use texkb_core::models::{raw_type, RawRecord};

use crate::extract::{
    block_regex, blocks, document_stem, example_record, is_runnable_sample, scan_primary,
    ExtractOutcome, PatternExtractor, SourceCollection,
};

const PRIMARY_DOCUMENT: &str = "tikz-network.tex";

static DOC_CMD_DEF: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\\doccmddef\{([^}]+)\}").expect("valid doccmddef regex"));
static LISTING: LazyLock<Regex> = LazyLock::new(|| block_regex("lstlisting"));

pub struct TikzNetworkExtractor;

impl PatternExtractor for TikzNetworkExtractor {
    fn dialect(&self) -> &str {
        "tikz-network"
    }

    fn extract(&self, collection: &SourceCollection) -> ExtractOutcome {
        let name = collection.name.as_str();
        scan_primary(collection, PRIMARY_DOCUMENT, |document, text, out| {
            out.extend(commands(name, document, text));
            out.extend(samples(name, document, text));
        })
    }
}

fn commands(collection: &str, document: &str, text: &str) -> Vec<RawRecord> {
    DOC_CMD_DEF
        .captures_iter(text)
        .map(|c| {
            let name = &c[1];
            RawRecord::new(raw_type::COMMAND, collection, document)
                .with("command_name", name)
                .with("description", format!("Command for {}", name))
                .with_seed(&format!("cmd_{}", name))
        })
        .collect()
}

fn samples(collection: &str, document: &str, text: &str) -> Vec<RawRecord> {
    let stem = document_stem(document);
    blocks(&LISTING, text)
        .into_iter()
        .enumerate()
        .filter(|(_, b)| b.body.contains("\\Vertex") || b.body.contains("\\Edge"))
        .filter(|(_, b)| is_runnable_sample(b.body))
        .map(|(idx, b)| example_record(collection, document, b.body, &format!("example_{}_{}", stem, idx)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_only_network_listings() {
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::write(
            dir.path().join(PRIMARY_DOCUMENT),
            r"\doccmddef{Vertex} \doccmddef{Edge}
\begin{lstlisting}
\Vertex[x=1]{A} \Vertex[x=3]{B}
\Edge(A)(B)
\end{lstlisting}
\begin{lstlisting}[language=TeX]
\usepackage{tikz-network}
\end{lstlisting}",
        )
        .unwrap();
        let c = SourceCollection::new("tikz-network", dir.path(), vec![]);
        let outcome = TikzNetworkExtractor.extract(&c);
        let names: Vec<&str> = outcome
            .records
            .iter()
            .filter_map(|r| r.str_field("command_name"))
            .collect();
        assert_eq!(names, vec!["Vertex", "Edge"]);
        let examples: Vec<&RawRecord> = outcome
            .records
            .iter()
            .filter(|r| r.record_type == raw_type::EXECUTABLE_EXAMPLE)
            .collect();
        assert_eq!(examples.len(), 1);
        assert!(examples[0].str_field("code").unwrap().starts_with("\\Vertex"));
        assert_eq!(examples[0].source_document, PRIMARY_DOCUMENT);
    }

    #[test]
    fn missing_manual_yields_warning() {
        let dir = tempfile::TempDir::new().unwrap();
        let c = SourceCollection::new("tikz-network", dir.path(), vec![]);
        let outcome = TikzNetworkExtractor.extract(&c);
        assert!(outcome.records.is_empty());
        assert_eq!(outcome.warnings.len(), 1);
    }
}
