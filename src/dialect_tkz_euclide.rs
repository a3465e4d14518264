//! `tkz-euclide`: `NewMacroBox` command signatures and `tkzexample`
//! samples, from the top-level chapter files only.

use std::sync::LazyLock;

use regex::Regex;
use texkb_core::models::{raw_type, RawRecord};

use crate::extract::{
    block_regex, blocks, document_stem, example_record, is_runnable_sample, scan_documents,
    ExtractOutcome, PatternExtractor, SourceCollection,
};

static NEW_MACRO_BOX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\\begin\{NewMacroBox\}\{([^}]+)\}\{([^}]+)\}").expect("valid NewMacroBox regex")
});
static TKZ_EXAMPLE: LazyLock<Regex> = LazyLock::new(|| block_regex("tkzexample"));

pub struct TkzEuclideExtractor;

impl PatternExtractor for TkzEuclideExtractor {
    fn dialect(&self) -> &str {
        "tkz-euclide"
    }

    fn extract(&self, collection: &SourceCollection) -> ExtractOutcome {
        let name = collection.name.as_str();
        scan_documents(
            collection,
            collection.top_level_documents(),
            |document, text, out| {
                out.extend(commands(name, document, text));
                out.extend(samples(name, document, text));
            },
        )
    }
}

fn commands(collection: &str, document: &str, text: &str) -> Vec<RawRecord> {
    NEW_MACRO_BOX
        .captures_iter(text)
        .map(|c| {
            let name = &c[1];
            RawRecord::new(raw_type::COMMAND, collection, document)
                .with("command_name", name)
                .with("syntax", &c[2])
                .with("description", format!("Geometry command: {}", name))
                .with_seed(&format!("cmd_{}", name))
        })
        .collect()
}

fn samples(collection: &str, document: &str, text: &str) -> Vec<RawRecord> {
    let stem = document_stem(document);
    blocks(&TKZ_EXAMPLE, text)
        .into_iter()
        .enumerate()
        .filter(|(_, b)| is_runnable_sample(b.body))
        .map(|(idx, b)| {
            example_record(collection, document, b.body, &format!("example_{}_{}", stem, idx))
                .with("options", b.options.unwrap_or(""))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nested_chapters_are_ignored() {
        let dir = tempfile::TempDir::new().unwrap();
        let chapter = r"\begin{NewMacroBox}{tkzDefPoint}{\oarg{local options}(\meta{x,y})\marg{name}}
\end{NewMacroBox}
\begin{tkzexample}[latex=7cm]
\begin{tikzpicture}
\tkzDefPoint(0,0){A}
\end{tikzpicture}
\end{tkzexample}";
        std::fs::write(dir.path().join("TKZdoc-euclide-points.tex"), chapter).unwrap();
        std::fs::create_dir(dir.path().join("old")).unwrap();
        std::fs::write(dir.path().join("old/legacy.tex"), chapter).unwrap();

        let c = SourceCollection::new(
            "tkz-euclide",
            dir.path(),
            vec![
                "TKZdoc-euclide-points.tex".to_string(),
                "old/legacy.tex".to_string(),
            ],
        );
        let outcome = TkzEuclideExtractor.extract(&c);
        assert_eq!(outcome.documents_scanned, 1);
        assert_eq!(outcome.records.len(), 2);
        let cmd = &outcome.records[0];
        assert_eq!(cmd.str_field("command_name"), Some("tkzDefPoint"));
        assert_eq!(cmd.str_field("syntax"), Some("\\oarg{local options"));
        assert_eq!(outcome.records[1].str_field("options"), Some("latex=7cm"));
    }
}
