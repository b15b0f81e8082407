//! Test utilities for callvis-core

use crate::graph::CallGraph;
use crate::source::{AnalysisRun, RawCallGraph};

/// `app` (main) calls `lib.Do` twice and a `lib.Server` method through an
/// interface; `lib.Do` calls the unexported `lib.helper`, which prints via
/// the standard library.
pub const SAMPLE_GRAPH_JSON: &str = r#"{
  "packages": [
    { "path": "app", "name": "main" },
    { "path": "lib", "name": "lib", "std": false },
    { "path": "fmt", "name": "fmt" }
  ],
  "functions": [
    { "name": "app.main", "package": "app" },
    { "name": "lib.Do", "package": "lib" },
    { "name": "lib.helper", "package": "lib" },
    { "name": "(*lib.Server).Start", "package": "lib", "func": "Start",
      "receiver": { "type": "Server", "pointer": true } },
    { "name": "fmt.Println", "package": "fmt" }
  ],
  "calls": [
    { "caller": "app.main", "callee": "lib.Do" },
    { "caller": "app.main", "callee": "lib.Do" },
    { "caller": "app.main", "callee": "(*lib.Server).Start", "dynamic": true },
    { "caller": "lib.Do", "callee": "lib.helper" },
    { "caller": "lib.helper", "callee": "fmt.Println" }
  ]
}"#;

/// A module declared without a domain (`module myapp`): the entry command
/// calls into a sibling internal package, which calls the standard library.
pub const DOTLESS_MODULE_JSON: &str = r#"{
  "packages": [
    { "path": "myapp/cmd/server", "name": "main" },
    { "path": "myapp/internal/db", "name": "db" },
    { "path": "database/sql", "name": "sql" }
  ],
  "functions": [
    { "name": "myapp/cmd/server.main", "package": "myapp/cmd/server", "func": "main" },
    { "name": "myapp/internal/db.Open", "package": "myapp/internal/db", "func": "Open" },
    { "name": "database/sql.Open", "package": "database/sql", "func": "Open" }
  ],
  "calls": [
    { "caller": "myapp/cmd/server.main", "callee": "myapp/internal/db.Open" },
    { "caller": "myapp/internal/db.Open", "callee": "database/sql.Open" }
  ]
}"#;

pub fn sample_raw_graph() -> RawCallGraph {
    serde_json::from_str(SAMPLE_GRAPH_JSON).unwrap()
}

/// The sample graph resolved for entry package `app`.
pub fn sample_run() -> AnalysisRun {
    AnalysisRun::resolve(&sample_raw_graph(), SAMPLE_GRAPH_JSON.as_bytes(), "app", false).unwrap()
}

pub fn sample_graph() -> CallGraph {
    sample_run().graph
}

/// Sample graph extended with a test function, a synthetic wrapper and a
/// deeper unexported chain `lib.helper -> lib.inner`.
pub fn extended_raw_graph() -> RawCallGraph {
    let mut raw = sample_raw_graph();
    let extra: RawCallGraph = serde_json::from_str(
        r#"{
          "functions": [
            { "name": "lib.TestDo", "package": "lib", "test": true },
            { "name": "lib.Do$bound", "package": "lib", "func": "Do$bound", "synthetic": true },
            { "name": "lib.inner", "package": "lib" },
            { "name": "(lib.Server).stop", "package": "lib", "func": "stop",
              "receiver": { "type": "Server" } }
          ],
          "calls": [
            { "caller": "lib.TestDo", "callee": "lib.Do" },
            { "caller": "app.main", "callee": "lib.Do$bound" },
            { "caller": "lib.helper", "callee": "lib.inner" },
            { "caller": "(*lib.Server).Start", "callee": "(lib.Server).stop" }
          ]
        }"#,
    )
    .unwrap();
    raw.functions.extend(extra.functions);
    raw.calls.extend(extra.calls);
    raw
}

pub fn extended_graph() -> CallGraph {
    AnalysisRun::resolve(&extended_raw_graph(), b"extended", "app", false)
        .unwrap()
        .graph
}

/// Names of the given nodes, sorted.
pub fn names(graph: &CallGraph, ids: impl IntoIterator<Item = crate::model::NodeId>) -> Vec<String> {
    let mut names: Vec<String> = ids
        .into_iter()
        .filter_map(|id| graph.node(id).map(|n| n.name.clone()))
        .collect();
    names.sort();
    names
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixtures_resolve() {
        assert_eq!(sample_graph().node_count(), 5);
        assert_eq!(extended_graph().node_count(), 9);
    }
}
