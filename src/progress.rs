//! Build progress reporting.
//!
//! Reports which collection is being extracted and how far the build has
//! got, so a long `texkb build` over a large manual tree is observable.
//! Progress is emitted on **stderr** so stdout remains parseable for scripts.

use std::io::Write;

/// A single progress event for a build.
#[derive(Clone, Debug)]
pub enum BuildProgressEvent {
    /// Extraction of collection `n` of `total` is starting.
    Extracting {
        collection: String,
        dialect: String,
        n: u64,
        total: u64,
    },
    /// A collection finished with this many raw records.
    Extracted { collection: String, records: u64 },
    /// All raw records are being structured into the knowledge base.
    Structuring { records: u64 },
}

/// Reports build progress. Implementations write to stderr (human or JSON).
pub trait BuildProgressReporter: Send + Sync {
    fn report(&self, event: BuildProgressEvent);
}

/// Human-friendly progress on stderr: "build chemfig  extracting (chemfig)  3 / 19".
pub struct StderrProgress;

impl BuildProgressReporter for StderrProgress {
    fn report(&self, event: BuildProgressEvent) {
        let line = match &event {
            BuildProgressEvent::Extracting {
                collection,
                dialect,
                n,
                total,
            } => format!(
                "build {}  extracting ({})  {} / {}\n",
                collection,
                dialect,
                format_number(*n),
                format_number(*total)
            ),
            BuildProgressEvent::Extracted {
                collection,
                records,
            } => format!(
                "build {}  {} records\n",
                collection,
                format_number(*records)
            ),
            BuildProgressEvent::Structuring { records } => {
                format!("build  structuring {} records\n", format_number(*records))
            }
        };
        let _ = std::io::stderr().lock().write_all(line.as_bytes());
        let _ = std::io::stderr().lock().flush();
    }
}

/// Machine-readable progress: one JSON object per line on stderr.
pub struct JsonProgress;

impl BuildProgressReporter for JsonProgress {
    fn report(&self, event: BuildProgressEvent) {
        let obj = match &event {
            BuildProgressEvent::Extracting {
                collection,
                dialect,
                n,
                total,
            } => serde_json::json!({
                "event": "progress",
                "collection": collection,
                "dialect": dialect,
                "phase": "extracting",
                "n": n,
                "total": total
            }),
            BuildProgressEvent::Extracted {
                collection,
                records,
            } => serde_json::json!({
                "event": "progress",
                "collection": collection,
                "phase": "extracted",
                "records": records
            }),
            BuildProgressEvent::Structuring { records } => serde_json::json!({
                "event": "progress",
                "phase": "structuring",
                "records": records
            }),
        };
        if let Ok(line) = serde_json::to_string(&obj) {
            let _ = writeln!(std::io::stderr().lock(), "{}", line);
            let _ = std::io::stderr().lock().flush();
        }
    }
}

/// No-op reporter when progress is disabled.
pub struct NoProgress;

impl BuildProgressReporter for NoProgress {
    fn report(&self, _event: BuildProgressEvent) {}
}

fn format_number(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::with_capacity(s.len() + (s.len() - 1) / 3);
    for (i, c) in s.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.push(',');
        }
        result.push(c);
    }
    result.chars().rev().collect()
}

/// Progress mode for the CLI: off, human (stderr), or JSON (stderr).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ProgressMode {
    Off,
    Human,
    Json,
}

impl ProgressMode {
    /// Default: human progress when stderr is a TTY, otherwise off.
    pub fn default_for_tty() -> Self {
        if atty::is(atty::Stream::Stderr) {
            ProgressMode::Human
        } else {
            ProgressMode::Off
        }
    }

    pub fn reporter(&self) -> Box<dyn BuildProgressReporter> {
        match self {
            ProgressMode::Off => Box::new(NoProgress),
            ProgressMode::Human => Box::new(StderrProgress),
            ProgressMode::Json => Box::new(JsonProgress),
        }
    }
}
