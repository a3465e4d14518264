//! The pgf manual dialect, shared by `tikz-pgf` and `pgfplots`.
//!
//! Every matched document is scanned for `command` and `environment`
//! description blocks, `codeexample` samples, and warning blocks.

use std::sync::LazyLock;

use regex::Regex;
use texkb_core::models::{raw_type, RawRecord};

use crate::extract::{
    block_regex, blocks, clean_text, document_stem, example_record, is_runnable_sample,
    scan_documents, scan_warnings, ExtractOutcome, PatternExtractor, SourceCollection,
};

static COMMAND_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)\\begin\{command\}\{([^}]+)\}(.*?)\\end\{command\}")
        .expect("valid command block regex")
});
static ENVIRONMENT_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)\\begin\{environment\}\{([^}]+)\}(.*?)\\end\{environment\}")
        .expect("valid environment block regex")
});
static CODE_EXAMPLE: LazyLock<Regex> = LazyLock::new(|| block_regex("codeexample"));

pub struct StandardExtractor;

impl PatternExtractor for StandardExtractor {
    fn dialect(&self) -> &str {
        "standard"
    }

    fn extract(&self, collection: &SourceCollection) -> ExtractOutcome {
        let name = collection.name.as_str();
        scan_documents(
            collection,
            collection.documents.iter().map(String::as_str),
            |document, text, out| {
                out.extend(commands(name, document, text));
                out.extend(environments(name, document, text));
                out.extend(code_examples(name, document, text));
                out.extend(scan_warnings(name, document, text));
            },
        )
    }
}

fn commands(collection: &str, document: &str, text: &str) -> Vec<RawRecord> {
    let stem = document_stem(document);
    COMMAND_BLOCK
        .captures_iter(text)
        .map(|c| {
            let name = c[1].trim();
            RawRecord::new(raw_type::COMMAND, collection, document)
                .with("command_name", name)
                .with("syntax", name)
                .with("description", clean_text(c[2].trim()))
                .with_seed(&format!("cmd_{}_{}", name, stem))
        })
        .collect()
}

fn environments(collection: &str, document: &str, text: &str) -> Vec<RawRecord> {
    let stem = document_stem(document);
    ENVIRONMENT_BLOCK
        .captures_iter(text)
        .map(|c| {
            let name = c[1].trim();
            RawRecord::new(raw_type::ENVIRONMENT, collection, document)
                .with("environment_name", name)
                .with("description", clean_text(c[2].trim()))
                .with_seed(&format!("env_{}_{}", name, stem))
        })
        .collect()
}

fn code_examples(collection: &str, document: &str, text: &str) -> Vec<RawRecord> {
    let stem = document_stem(document);
    blocks(&CODE_EXAMPLE, text)
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
    use texkb_core::models::item_id;

    const PATHS: &str = r"
\section{Paths}
\begin{command}{\draw}
  Draws the path. % see below
  \begin{codeexample}[]
\tikz \draw (0,0) -- (1,1);
  \end{codeexample}
\end{command}

\begin{environment}{tikzpicture}
  All pictures live in a \texttt{tikzpicture}.
\end{environment}

\begin{codeexample}[width=4cm]
\end{codeexample}

\textbf{Warning:} Paths must be closed.\\
";

    fn collection(docs: &[(&str, &str)]) -> (tempfile::TempDir, SourceCollection) {
        let dir = tempfile::TempDir::new().unwrap();
        for (rel, body) in docs {
            let path = dir.path().join(rel);
            std::fs::create_dir_all(path.parent().unwrap()).unwrap();
            std::fs::write(path, body).unwrap();
        }
        let names = docs.iter().map(|(rel, _)| rel.to_string()).collect();
        let collection = SourceCollection::new("tikz-pgf", dir.path(), names);
        (dir, collection)
    }

    #[test]
    fn extracts_every_pass_in_order() {
        let (_dir, c) = collection(&[("text-en/pgfmanual-en-tikz-paths.tex", PATHS)]);
        let outcome = StandardExtractor.extract(&c);
        let types: Vec<&str> = outcome.records.iter().map(|r| r.record_type.as_str()).collect();
        assert_eq!(
            types,
            vec!["command", "environment", "executable_example", "feedback"]
        );
        assert_eq!(outcome.documents_scanned, 1);
        assert!(outcome.warnings.is_empty());

        let cmd = &outcome.records[0];
        assert_eq!(cmd.source_document, "text-en/pgfmanual-en-tikz-paths.tex");
        assert_eq!(
            cmd.id(),
            Some(item_id("cmd_\\draw_pgfmanual-en-tikz-paths").as_str())
        );
        assert!(cmd.str_field("description").unwrap().starts_with("Draws the path."));

        let example = &outcome.records[2];
        assert_eq!(example.str_field("code"), Some("\\tikz \\draw (0,0) -- (1,1);"));
        assert_eq!(
            example.id(),
            Some(item_id("example_pgfmanual-en-tikz-paths_0").as_str())
        );
    }

    #[test]
    fn empty_code_examples_are_dropped() {
        let (_dir, c) = collection(&[("a.tex", "\\begin{codeexample}[]\n  \n\\end{codeexample}")]);
        assert!(StandardExtractor.extract(&c).records.is_empty());
    }

    #[test]
    fn same_command_in_two_documents_gets_two_ids() {
        let body = "\\begin{command}{\\node}text\\end{command}";
        let (_dir, c) = collection(&[("a.tex", body), ("b.tex", body)]);
        let outcome = StandardExtractor.extract(&c);
        assert_eq!(outcome.records.len(), 2);
        assert_ne!(outcome.records[0].id(), outcome.records[1].id());
    }

    #[test]
    fn re_extraction_is_identical() {
        let (_dir, c) = collection(&[("a.tex", PATHS), ("sub/b.tex", PATHS)]);
        let first = StandardExtractor.extract(&c);
        let second = StandardExtractor.extract(&c);
        assert_eq!(first.records, second.records);
    }
}
