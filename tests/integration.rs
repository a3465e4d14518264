use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn texkb_binary() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_texkb"))
}

fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();

    let pgfplots = root.join("manuals/pgfplots-manual");
    fs::create_dir_all(&pgfplots).unwrap();
    fs::write(
        pgfplots.join("pgfplots.reference.axis.tex"),
        r"\begin{command}{\addplot}
  Adds a plot to the current \texttt{axis}.
\end{command}
\begin{environment}{axis}
  The default axis environment.
\end{environment}
\begin{codeexample}[]
\begin{axis}
\addplot[ybar] coordinates {(0,1) (1,2)};
\end{axis}
\end{codeexample}
\begin{codeexample}[]
\begin{axis}
\addplot {x^2};
\end{axis}
\end{codeexample}
\textbf{Warning:} Always set compat or the output may fail to match.\\
",
    )
    .unwrap();

    let chemfig = root.join("manuals/chemfig-manual");
    fs::create_dir_all(&chemfig).unwrap();
    fs::write(chemfig.join("notes.tex"), "no primary document").unwrap();

    let config_content = format!(
        r#"[sources]
root = "{}/manuals"

[output]
dir = "{}/data"

[server]
bind = "127.0.0.1:7331"

[query]
example_limit = 5
search_limit = 10
max_limit = 50
"#,
        root.display(),
        root.display()
    );

    let config_path = config_dir.join("texkb.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn run_texkb(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = texkb_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .arg("--progress")
        .arg("off")
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("Failed to run texkb binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (stdout, stderr, output.status.success())
}

#[test]
fn test_sources_lists_dialects() {
    let (_tmp, config) = setup_test_env();
    let (stdout, stderr, success) = run_texkb(&config, &["sources"]);
    assert!(success, "sources failed: {}", stderr);
    assert!(stdout.contains("COLLECTION"));
    let pgf_line = stdout.lines().find(|l| l.starts_with("pgfplots")).unwrap();
    assert!(pgf_line.contains("standard"));
    let chem_line = stdout.lines().find(|l| l.starts_with("chemfig")).unwrap();
    assert!(chem_line.contains("chemfig"));
}

#[test]
fn test_build_writes_artifacts() {
    let (tmp, config) = setup_test_env();
    let (stdout, stderr, success) = run_texkb(&config, &["build"]);
    assert!(success, "build failed: {}", stderr);
    assert!(stdout.contains("Items:           5"));
    let warning = stdout.lines().find(|l| l.contains("warning:")).unwrap();
    assert!(warning.contains("primary document"));
    assert!(warning.ends_with("chemfig-en.tex not found"));

    let data = tmp.path().join("data");
    for name in [
        "pgfplots-knowledge-raw.json",
        "knowledge-raw.json",
        "knowledge-structured.json",
        "knowledge-stats.json",
        "extraction-stats.json",
    ] {
        assert!(data.join(name).is_file(), "missing artifact {}", name);
    }
    assert!(!data.join("chemfig-knowledge-raw.json").exists());

    let stats: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(data.join("knowledge-stats.json")).unwrap())
            .unwrap();
    assert_eq!(stats["total_items"], 5);
    assert_eq!(stats["by_kind"]["executable_example"], 2);
    assert_eq!(stats["by_chart_category"]["bar_chart"], 1);
    assert_eq!(stats["by_chart_category"]["line_chart"], 1);
    assert!(stats["generated_at"].is_string());
}

#[test]
fn test_build_idempotent() {
    let (tmp, config) = setup_test_env();
    let structured = tmp.path().join("data/knowledge-structured.json");
    let (_, _, ok1) = run_texkb(&config, &["build"]);
    let first = fs::read_to_string(&structured).unwrap();
    let (_, _, ok2) = run_texkb(&config, &["build"]);
    let second = fs::read_to_string(&structured).unwrap();
    assert!(ok1 && ok2);
    assert_eq!(first, second);
}

#[test]
fn test_stats_after_build() {
    let (_tmp, config) = setup_test_env();
    run_texkb(&config, &["build"]);
    let (stdout, stderr, success) = run_texkb(&config, &["stats"]);
    assert!(success, "stats failed: {}", stderr);
    assert!(stdout.contains("Items:       5"));
    assert!(stdout.contains("command_specification"));
    assert!(stdout.contains("knowledge-structured.json"));
}

#[test]
fn test_search_paginates() {
    let (_tmp, config) = setup_test_env();
    let (stdout, stderr, success) =
        run_texkb(&config, &["search", "ADDPLOT", "--limit", "1"]);
    assert!(success, "search failed: {}", stderr);
    assert!(stdout.contains("1. [executable_example] pgfplots"));
    assert!(stdout.contains("Showing 1-1 of 2."));
    assert!(stdout.contains("Next page: --offset 1"));
}

#[test]
fn test_search_no_results() {
    let (_tmp, config) = setup_test_env();
    let (stdout, _, success) = run_texkb(&config, &["search", "xyzzy_nonexistent"]);
    assert!(success);
    assert!(stdout.contains("No results."));
}

#[test]
fn test_search_unknown_chart_errors() {
    let (_tmp, config) = setup_test_env();
    let (_, stderr, success) = run_texkb(&config, &["search", "x", "--chart", "flowchart"]);
    assert!(!success);
    assert!(stderr.contains("Unknown chart category: flowchart"));
}

#[test]
fn test_tool_call_examples() {
    let (_tmp, config) = setup_test_env();
    let (stdout, stderr, success) = run_texkb(
        &config,
        &[
            "tool",
            "call",
            "get_latex_chart_example",
            "--param",
            "chart_category=bar_chart",
        ],
    );
    assert!(success, "tool call failed: {}", stderr);
    assert!(stdout.starts_with("Found 1 examples:"));
    assert!(stdout.contains("```latex"));
}

#[test]
fn test_tool_call_unknown_tool() {
    let (_tmp, config) = setup_test_env();
    let (stdout, _, success) = run_texkb(&config, &["tool", "call", "nope"]);
    assert!(!success);
    assert!(stdout.contains("Unknown tool: nope"));
}

#[test]
fn test_tool_list_needs_no_config() {
    let binary = texkb_binary();
    let output = Command::new(&binary)
        .args(["--config", "/nonexistent/texkb.toml", "tool", "list"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let tools: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(tools.as_array().unwrap().len(), 4);
}

#[test]
fn test_missing_config_errors() {
    let (_, stderr, success) = run_texkb(Path::new("/nonexistent/texkb.toml"), &["sources"]);
    assert!(!success);
    assert!(stderr.contains("Failed to read config file"));
}
