//! Dialect-agnostic extraction plumbing.
//!
//! A [`PatternExtractor`] turns the documents of one [`SourceCollection`]
//! into [`RawRecord`]s. Each dialect lives in its own `dialect_*` module and
//! is picked by name through the [`ExtractorRegistry`](crate::registry::ExtractorRegistry).
//!
//! Extraction is multi-pass per document: every construct category is a
//! separate scan over the full text. Pass order only fixes the order of the
//! resulting records, which in turn fixes index-based example ids.
//!
//! Nothing here fails the run. A missing primary document, an unreadable
//! file, or a document with no matches all end up as warnings or as zero
//! records in the [`ExtractOutcome`].

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use anyhow::{Context, Result};
use regex::Regex;
use texkb_core::classify::classify_chart;
use texkb_core::models::{raw_type, RawRecord};

/// Hard cap on cleaned description length, in characters.
pub const MAX_DESCRIPTION_CHARS: usize = 500;

/// A runnable sample body must be strictly longer than this after trimming.
const MIN_SAMPLE_CHARS: usize = 10;

/// Characters of a warning message that seed its id.
const WARNING_SEED_CHARS: usize = 20;

static COMMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)%.*$").expect("valid comment regex"));
static WRAPPED_ARG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\\[a-zA-Z]+\{([^}]*)\}").expect("valid wrapper regex"));
static BARE_COMMAND: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\\[a-zA-Z]+").expect("valid command regex"));
static WARNING_HEAD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\\textbf\{(warning|note|attention)[:\s]*\}").expect("valid warning regex")
});

/// One named corpus of documents written in one dialect.
#[derive(Debug, Clone)]
pub struct SourceCollection {
    /// Collection name, which doubles as the dialect name.
    pub name: String,
    pub root: PathBuf,
    /// Documents matched by the configured globs, relative to `root`, sorted.
    pub documents: Vec<String>,
}

impl SourceCollection {
    pub fn new(name: impl Into<String>, root: impl Into<PathBuf>, mut documents: Vec<String>) -> Self {
        documents.sort();
        documents.dedup();
        Self {
            name: name.into(),
            root: root.into(),
            documents,
        }
    }

    /// Documents directly under the collection root.
    pub fn top_level_documents(&self) -> impl Iterator<Item = &str> {
        self.documents
            .iter()
            .map(String::as_str)
            .filter(|d| !d.contains('/') && !d.contains('\\'))
    }

    /// Read a document as text, replacing invalid UTF-8.
    pub fn read_document(&self, relative: &str) -> Result<String> {
        read_text(&self.root.join(relative))
    }
}

fn read_text(path: &Path) -> Result<String> {
    let bytes =
        std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Records and non-fatal problems from extracting one collection.
#[derive(Debug, Default)]
pub struct ExtractOutcome {
    pub records: Vec<RawRecord>,
    pub warnings: Vec<String>,
    pub documents_scanned: usize,
}

impl ExtractOutcome {
    fn warn(&mut self, collection: &str, message: String) {
        tracing::warn!(collection = %collection, "{}", message);
        self.warnings.push(message);
    }
}

/// Extracts raw records from the documents of one source collection.
pub trait PatternExtractor: Send + Sync {
    /// Dialect label, as shown by `texkb sources`.
    fn dialect(&self) -> &str;

    fn extract(&self, collection: &SourceCollection) -> ExtractOutcome;
}

/// Run `passes` over each listed document. Unreadable documents are skipped
/// with a warning.
pub(crate) fn scan_documents<'a, I, F>(
    collection: &SourceCollection,
    documents: I,
    mut passes: F,
) -> ExtractOutcome
where
    I: IntoIterator<Item = &'a str>,
    F: FnMut(&str, &str, &mut Vec<RawRecord>),
{
    let mut outcome = ExtractOutcome::default();
    for relative in documents {
        match collection.read_document(relative) {
            Ok(text) => {
                outcome.documents_scanned += 1;
                passes(relative, &text, &mut outcome.records);
            }
            Err(e) => outcome.warn(
                &collection.name,
                format!("skipping unreadable document {}: {:#}", relative, e),
            ),
        }
    }
    outcome
}

/// Run `passes` over the dialect's single primary document. A missing
/// primary document yields no records and a warning.
pub(crate) fn scan_primary<F>(
    collection: &SourceCollection,
    file_name: &str,
    passes: F,
) -> ExtractOutcome
where
    F: FnOnce(&str, &str, &mut Vec<RawRecord>),
{
    let mut outcome = ExtractOutcome::default();
    let path = collection.root.join(file_name);
    if !path.is_file() {
        outcome.warn(
            &collection.name,
            format!("primary document {} not found", path.display()),
        );
        return outcome;
    }
    match read_text(&path) {
        Ok(text) => {
            outcome.documents_scanned = 1;
            passes(file_name, &text, &mut outcome.records);
        }
        Err(e) => outcome.warn(&collection.name, format!("{:#}", e)),
    }
    outcome
}

/// Reduce a LaTeX fragment to a plain, summary-sized description.
///
/// Drops `%` comments, unwraps one level of `\cmd{arg}` to `arg`, strips
/// remaining `\cmd` tokens, collapses whitespace and keeps the first
/// [`MAX_DESCRIPTION_CHARS`] characters. The cut is not word-aware.
pub fn clean_text(text: &str) -> String {
    let text = COMMENT.replace_all(text, "");
    let text = WRAPPED_ARG.replace_all(&text, "$1");
    let text = BARE_COMMAND.replace_all(&text, "");
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    collapsed.chars().take(MAX_DESCRIPTION_CHARS).collect()
}

/// Whether a trimmed block body is worth keeping as a runnable sample.
pub fn is_runnable_sample(body: &str) -> bool {
    body.chars().count() > MIN_SAMPLE_CHARS && body.contains('\\')
}

/// File stem of a relative document path.
pub fn document_stem(relative: &str) -> &str {
    Path::new(relative)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(relative)
}

/// `\begin{env}[options]body\end{env}` with the options group optional.
pub(crate) fn block_regex(env: &str) -> Regex {
    let env = regex::escape(env);
    Regex::new(&format!(
        r"(?s)\\begin\{{{env}\}}(?:\[([^\]]*)\])?(.*?)\\end\{{{env}\}}"
    ))
    .expect("valid block regex")
}

/// A fenced block matched by [`block_regex`].
#[derive(Debug)]
pub(crate) struct Block<'t> {
    pub options: Option<&'t str>,
    pub body: &'t str,
}

/// Every block matched by `re` in document order, trimmed, including
/// blocks that are too small to be samples. Callers index over this list.
pub(crate) fn blocks<'t>(re: &Regex, text: &'t str) -> Vec<Block<'t>> {
    re.captures_iter(text)
        .map(|c| Block {
            options: c.get(1).map(|m| m.as_str()),
            body: c.get(2).map(|m| m.as_str().trim()).unwrap_or(""),
        })
        .collect()
}

/// An `executable_example` record with its chart category assigned.
pub(crate) fn example_record(
    collection: &str,
    document: &str,
    code: &str,
    seed: &str,
) -> RawRecord {
    RawRecord::new(raw_type::EXECUTABLE_EXAMPLE, collection, document)
        .with("code", code)
        .with("chart_category", classify_chart(code).as_str())
        .with_seed(seed)
}

/// Free-text warning, note and attention blocks.
///
/// A block starts at `\textbf{Warning:}` (any case, with `Note` and
/// `Attention` as alternatives) and runs to the next `\\` or blank line.
/// A head with no terminator after it is not a block. Heads inside an
/// earlier block's text are not matched again.
pub fn scan_warnings(collection: &str, document: &str, text: &str) -> Vec<RawRecord> {
    let mut records = Vec::new();
    for keyword in ["warning", "note", "attention"] {
        let mut resume = 0usize;
        for caps in WARNING_HEAD.captures_iter(text) {
            let head = match caps.get(0) {
                Some(m) => m,
                None => continue,
            };
            if head.start() < resume || !caps[1].eq_ignore_ascii_case(keyword) {
                continue;
            }
            let rest = &text[head.end()..];
            let end = match (rest.find("\\\\"), rest.find("\n\n")) {
                (Some(a), Some(b)) => a.min(b),
                (Some(a), None) => a,
                (None, Some(b)) => b,
                (None, None) => continue,
            };
            resume = head.end() + end;
            let message = rest[..end].trim();
            let prefix: String = message.chars().take(WARNING_SEED_CHARS).collect();
            records.push(
                RawRecord::new(raw_type::FEEDBACK, collection, document)
                    .with("feedback_type", "warning")
                    .with("content", message)
                    .with_seed(&format!("warning_{}", prefix)),
            );
        }
    }
    records
}
