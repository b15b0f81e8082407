//! End-to-end tests for the pure pipeline

use crate::*;
use crate::test_utils::{extended_graph, sample_graph, sample_run, DOTLESS_MODULE_JSON};

#[test]
fn test_pipeline_idempotent() {
    let run = sample_run();
    let options = Options::default();

    let first = describe(&run.graph, &options).unwrap();
    let second = describe(&run.graph, &options).unwrap();
    assert_eq!(first.as_bytes(), second.as_bytes());
}

#[test]
fn test_scenario_nostd_nointer_pkg() {
    let graph = sample_graph();
    let options = Options {
        nostd: true,
        nointer: true,
        group: GroupMode::Package,
        ..Options::default()
    };

    let filtered = filter::apply(&graph, &options).unwrap();
    let grouped = grouping::group(filtered, options.group);
    let keys: Vec<String> = grouped.groups.iter().map(|g| g.key.as_text()).collect();
    assert_eq!(keys, vec!["app", "lib"]);

    let dot = render::render(&grouped, &options.style);
    assert!(dot.as_str().contains("\"app.main\""));
    assert!(dot.as_str().contains("\"lib.Do\""));
    assert!(!dot.as_str().contains("lib.helper"));
}

#[test]
fn test_scenario_nointer_off() {
    let graph = sample_graph();
    let options = Options {
        nostd: true,
        nointer: false,
        group: GroupMode::Package,
        ..Options::default()
    };

    let dot = describe(&graph, &options).unwrap();
    assert!(dot.as_str().contains("\"lib.helper\" ["));
    assert!(dot.as_str().contains("\"lib.Do\" -> \"lib.helper\""));
}

#[test]
fn test_focus_not_found_is_recoverable() {
    let graph = sample_graph();
    let bad = Options {
        focus: "github.com/none".into(),
        ..Options::default()
    };

    let err = describe(&graph, &bad).unwrap_err();
    assert!(matches!(err, Error::FocusNotFound(_)));
    assert!(err.is_recoverable());

    // The same graph keeps working with corrected options.
    assert!(describe(&graph, &Options::default()).is_ok());
}

#[test]
fn test_equivalent_options_render_identically() {
    let graph = extended_graph();
    let a = Options {
        ignore: vec!["fmt".into(), "lib/internal".into()],
        focus: "main".into(),
        ..Options::default()
    };
    let b = Options {
        ignore: vec!["lib/internal".into(), " fmt".into()],
        focus: " main ".into(),
        ..Options::default()
    };
    assert_eq!(describe(&graph, &a).unwrap(), describe(&graph, &b).unwrap());
}

#[test]
fn test_fingerprint_tracks_analysis_run() {
    let run = sample_run();
    let options = Options::default();
    let fp = Fingerprint::compute(&run.id, &options, "svg").unwrap();
    let again = Fingerprint::compute(&sample_run().id, &options, "svg").unwrap();
    assert_eq!(fp, again);
}

#[test]
fn test_dotless_module_survives_nostd() {
    let raw: RawCallGraph = serde_json::from_str(DOTLESS_MODULE_JSON).unwrap();
    let run = AnalysisRun::resolve(&raw, DOTLESS_MODULE_JSON.as_bytes(), "myapp/cmd/server", false).unwrap();

    let dot = describe(&run.graph, &Options::default()).unwrap();
    assert!(dot.as_str().contains("\"myapp/internal/db.Open\" ["));
    assert!(dot.as_str().contains("\"myapp/cmd/server.main\" -> \"myapp/internal/db.Open\""));
    assert!(!dot.as_str().contains("database/sql.Open"));
}
