//! Integration tests for callvis
//!
//! These drive the built binary and the library crates together.

use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use std::sync::Arc;

use callvis_artifacts::testing::{FakeConverter, MINIMAL_GRAPH_JSON};
use callvis_artifacts::{ArtifactCache, OutputTarget, PipelineRunner};
use callvis_core::{CallGraphSource, Error, JsonGraphSource, Options};
use tempfile::TempDir;
use tokio_test::{assert_err, assert_ok};

/// Temp working directory holding `callgraph.json`.
fn workspace() -> TempDir {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("callgraph.json"), MINIMAL_GRAPH_JSON).unwrap();
    dir
}

fn callvis(cwd: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_callvis"))
        .args(args)
        .current_dir(cwd)
        .env_remove("CALLVIS_DOT")
        .env_remove("CALLVIS_CACHE_DIR")
        .env_remove("CALLVIS_GRAPH")
        .env("RUST_LOG", "off")
        .output()
        .unwrap()
}

#[test]
fn test_cli_help() {
    let dir = workspace();
    let output = callvis(dir.path(), &["--help"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Interactive call graph visualization"));
    assert!(stdout.contains("--nointer"));
}

#[test]
fn test_missing_package_exits_2() {
    let dir = workspace();
    assert_eq!(callvis(dir.path(), &[]).status.code(), Some(2));
    assert_eq!(callvis(dir.path(), &[""]).status.code(), Some(2));
}

#[test]
fn test_unknown_package_exits_2() {
    let dir = workspace();
    let output = callvis(dir.path(), &["github.com/acme/none", "--file", "out", "--format", "gv"]);
    assert_eq!(output.status.code(), Some(2));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("github.com/acme/none"));
    assert!(stderr.contains("callgraph.json"));
}

#[test]
fn test_batch_writes_description() {
    let dir = workspace();
    let output = callvis(dir.path(), &["app", "--file", "out", "--format", "gv", "--nointer=false"]);
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    let gv = std::fs::read_to_string(dir.path().join("out.gv")).unwrap();
    assert!(gv.starts_with("digraph callvis {"));
    assert!(gv.contains("\"lib.Do\" -> \"lib.helper\""));
    assert!(!gv.contains("fmt.Println"));
}

#[test]
fn test_batch_reads_config_file() {
    let dir = workspace();
    std::fs::write(
        dir.path().join("callvis.toml"),
        "file = \"from-config\"\nformat = \"gv\"\n\n[options]\nnostd = false\nnointer = false\n",
    )
    .unwrap();

    let output = callvis(dir.path(), &["app"]);
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    let gv = std::fs::read_to_string(dir.path().join("from-config.gv")).unwrap();
    assert!(gv.contains("fmt.Println"));
}

#[test]
fn test_batch_without_layout_engine_fails() {
    let dir = workspace();
    let output = callvis(
        dir.path(),
        &["app", "--file", "out", "--format", "svg", "--dot", "/nonexistent/bin/dot"],
    );
    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("layout engine unavailable"));
}

#[test]
fn test_non_main_entry_is_fatal() {
    let dir = workspace();
    let output = callvis(dir.path(), &["lib", "--file", "out", "--format", "gv"]);
    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("analysis unavailable"));
}

#[test]
fn test_missing_graph_file_is_fatal() {
    let dir = TempDir::new().unwrap();
    let output = callvis(dir.path(), &["app", "--file", "out", "--format", "gv"]);
    assert_eq!(output.status.code(), Some(1));
}

fn runner_for(graph: &Path, cache_dir: PathBuf, converter: Arc<FakeConverter>) -> PipelineRunner {
    let run = JsonGraphSource::new(graph).load("app", false).unwrap();
    PipelineRunner::new(
        Arc::new(run),
        Arc::new(ArtifactCache::new(Some(cache_dir))),
        converter,
        OutputTarget::default(),
    )
}

#[tokio::test]
async fn test_cache_survives_restart() {
    let dir = workspace();
    let graph = dir.path().join("callgraph.json");
    let cache_dir = dir.path().join("cache");

    let first = runner_for(&graph, cache_dir.clone(), Arc::new(FakeConverter::default()));
    let rendered = assert_ok!(first.render(&Options::default(), false).await);
    assert_eq!(first.computations(), 1);

    // A fresh process over the same graph and cache reuses the entry.
    let converter = Arc::new(FakeConverter::default());
    let second = runner_for(&graph, cache_dir, converter.clone());
    let cached = assert_ok!(second.render(&Options::default(), false).await);
    assert_eq!(second.computations(), 0);
    assert_eq!(converter.calls(), 0);
    assert_eq!(rendered.artifact, cached.artifact);
}

#[tokio::test]
async fn test_changed_graph_misses_cache() {
    let dir = workspace();
    let graph = dir.path().join("callgraph.json");
    let cache_dir = dir.path().join("cache");

    let first = runner_for(&graph, cache_dir.clone(), Arc::new(FakeConverter::default()));
    assert_ok!(first.render(&Options::default(), false).await);

    // Any byte change yields a new analysis run identity.
    std::fs::write(&graph, format!("{MINIMAL_GRAPH_JSON}\n")).unwrap();
    let second = runner_for(&graph, cache_dir, Arc::new(FakeConverter::default()));
    assert_ok!(second.render(&Options::default(), false).await);
    assert_eq!(second.computations(), 1);
    assert_eq!(second.cache().entries().await.len(), 2);
}

#[tokio::test]
async fn test_focus_error_then_recovery() {
    let dir = workspace();
    let runner = runner_for(
        &dir.path().join("callgraph.json"),
        dir.path().join("cache"),
        Arc::new(FakeConverter::default()),
    );

    let bad = Options {
        focus: "github.com/none".into(),
        ..Options::default()
    };
    let err = assert_err!(runner.render(&bad, false).await);
    assert_eq!(err, Error::FocusNotFound("github.com/none".into()));
    assert_ok!(runner.render(&Options::default(), false).await);
}
