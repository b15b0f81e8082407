//! Raw call graphs handed over by the analysis front end
//!
//! The front end (parser, type checker, pointer analysis) is a separate
//! program. It exports its call graph as JSON, which [`JsonGraphSource`]
//! turns into a resolved [`AnalysisRun`].

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{Error, Result};
use crate::graph::CallGraph;
use crate::model::{is_exported_name, is_std_package, Dispatch, FunctionNode, NodeId, Package, Receiver};

/// Call graph exactly as the analysis front end exported it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawCallGraph {
    #[serde(default)]
    pub packages: Vec<RawPackage>,
    #[serde(default)]
    pub functions: Vec<RawFunction>,
    #[serde(default)]
    pub calls: Vec<RawCall>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawPackage {
    pub path: String,
    pub name: String,
    /// Falls back to the import-path convention when absent.
    #[serde(default)]
    pub std: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawFunction {
    pub name: String,
    pub package: String,
    #[serde(default)]
    pub func: Option<String>,
    #[serde(default)]
    pub receiver: Option<RawReceiver>,
    #[serde(default)]
    pub exported: Option<bool>,
    #[serde(default)]
    pub synthetic: bool,
    #[serde(default)]
    pub test: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawReceiver {
    #[serde(rename = "type")]
    pub type_name: String,
    #[serde(default)]
    pub pointer: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawCall {
    pub caller: String,
    pub callee: String,
    #[serde(default)]
    pub dynamic: bool,
}

impl RawCallGraph {
    pub fn has_package(&self, path: &str) -> bool {
        self.packages.iter().any(|p| p.path == path)
    }
}

/// A resolved call graph plus the identity of the inputs that produced it.
#[derive(Debug)]
pub struct AnalysisRun {
    /// Hex digest of (raw graph, entry package, test mode).
    pub id: String,
    pub entry: String,
    pub tests: bool,
    pub graph: CallGraph,
}

impl AnalysisRun {
    /// Build the graph model for `entry`.
    ///
    /// The entry package must exist and must be a main package unless
    /// test mode is on.
    pub fn resolve(raw: &RawCallGraph, raw_bytes: &[u8], entry: &str, tests: bool) -> Result<Self> {
        let graph = build_graph(raw, entry)?;

        let package = graph
            .package(entry)
            .ok_or_else(|| Error::analysis_unavailable(entry, "package not found in call graph"))?;
        if package.name != "main" && !tests {
            return Err(Error::analysis_unavailable(
                entry,
                format!("package {} is not a main package (enable tests to analyze it)", package.name),
            ));
        }

        let mut hasher = Sha256::new();
        hasher.update(raw_bytes);
        hasher.update([0]);
        hasher.update(entry.as_bytes());
        hasher.update([u8::from(tests)]);
        let id = hex::encode(hasher.finalize());

        tracing::info!(
            "Resolved call graph for {}: {} packages, {} functions, {} edges",
            entry,
            raw.packages.len(),
            graph.node_count(),
            graph.edge_count()
        );

        Ok(AnalysisRun {
            id,
            entry: entry.to_string(),
            tests,
            graph,
        })
    }
}

fn build_graph(raw: &RawCallGraph, entry: &str) -> Result<CallGraph> {
    let mut graph = CallGraph::new();

    for pkg in &raw.packages {
        graph.add_package(Package {
            path: pkg.path.clone(),
            name: pkg.name.clone(),
            std: pkg.std.unwrap_or_else(|| is_std_package(&pkg.path, entry)),
        });
    }

    for func in &raw.functions {
        let short = func.func.clone().unwrap_or_else(|| {
            func.name.rsplit('.').next().unwrap_or(&func.name).to_string()
        });
        let node = FunctionNode {
            id: NodeId::default(),
            name: func.name.clone(),
            exported: func.exported.unwrap_or_else(|| is_exported_name(&short)),
            func: short,
            package: func.package.clone(),
            receiver: func.receiver.as_ref().map(|r| Receiver {
                type_name: r.type_name.clone(),
                pointer: r.pointer,
            }),
            synthetic: func.synthetic,
            test: func.test,
        };
        graph
            .add_function(node)
            .map_err(|e| Error::analysis_unavailable(entry, e.to_string()))?;
    }

    for call in &raw.calls {
        let lookup = |name: &str| {
            graph.find_function(name).ok_or_else(|| {
                Error::analysis_unavailable(entry, format!("call references unknown function {name}"))
            })
        };
        let caller = lookup(&call.caller)?;
        let callee = lookup(&call.callee)?;
        let dispatch = if call.dynamic { Dispatch::Dynamic } else { Dispatch::Static };
        graph.add_call(caller, callee, dispatch);
    }

    Ok(graph)
}

/// The analysis collaborator: produces a resolved call graph for an entry
/// package.
pub trait CallGraphSource: Send + Sync {
    fn load(&self, entry: &str, tests: bool) -> Result<AnalysisRun>;
}

/// Reads a call graph exported as JSON by an external analyzer.
#[derive(Debug, Clone)]
pub struct JsonGraphSource {
    path: PathBuf,
}

impl JsonGraphSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        JsonGraphSource { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Parse the export without resolving an entry package.
    pub fn read_raw(&self, entry: &str) -> Result<(RawCallGraph, Vec<u8>)> {
        let bytes = std::fs::read(&self.path).map_err(|e| {
            Error::analysis_unavailable(entry, format!("cannot read {}: {}", self.path.display(), e))
        })?;
        let raw = serde_json::from_slice(&bytes).map_err(|e| {
            Error::analysis_unavailable(entry, format!("malformed call graph {}: {}", self.path.display(), e))
        })?;
        Ok((raw, bytes))
    }
}

impl CallGraphSource for JsonGraphSource {
    fn load(&self, entry: &str, tests: bool) -> Result<AnalysisRun> {
        tracing::debug!("Loading call graph from {}", self.path.display());
        let (raw, bytes) = self.read_raw(entry)?;
        AnalysisRun::resolve(&raw, &bytes, entry, tests)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{sample_raw_graph, DOTLESS_MODULE_JSON, SAMPLE_GRAPH_JSON};

    #[test]
    fn test_resolve_sample_graph() {
        let raw = sample_raw_graph();
        let run = AnalysisRun::resolve(&raw, SAMPLE_GRAPH_JSON.as_bytes(), "app", false).unwrap();

        assert_eq!(run.graph.node_count(), 5);
        let helper = run.graph.find_function("lib.helper").unwrap();
        let helper = run.graph.node(helper).unwrap();
        assert!(!helper.exported);
        assert_eq!(helper.func, "helper");
        assert!(run.graph.package("fmt").unwrap().std);
        assert!(!run.graph.package("lib").unwrap().std);
        assert!(!run.graph.package("app").unwrap().std);
        assert_eq!(run.id.len(), 64);
    }

    #[test]
    fn test_dotless_module_packages_stay_user_code() {
        let raw: RawCallGraph = serde_json::from_str(DOTLESS_MODULE_JSON).unwrap();
        let run = AnalysisRun::resolve(&raw, DOTLESS_MODULE_JSON.as_bytes(), "myapp/cmd/server", false).unwrap();

        assert!(!run.graph.package("myapp/cmd/server").unwrap().std);
        assert!(!run.graph.package("myapp/internal/db").unwrap().std);
        assert!(run.graph.package("database/sql").unwrap().std);
    }

    #[test]
    fn test_duplicate_call_sites_collapse() {
        let raw = sample_raw_graph();
        let run = AnalysisRun::resolve(&raw, SAMPLE_GRAPH_JSON.as_bytes(), "app", false).unwrap();

        let main = run.graph.find_function("app.main").unwrap();
        let edges: Vec<_> = run.graph.calls().filter(|e| e.caller == main).collect();
        let to_do = edges
            .iter()
            .find(|e| run.graph.node(e.callee).unwrap().name == "lib.Do")
            .unwrap();
        assert_eq!(to_do.sites(), 2);
    }

    #[test]
    fn test_entry_must_be_main_package() {
        let raw = sample_raw_graph();
        let err = AnalysisRun::resolve(&raw, b"", "lib", false).unwrap_err();
        assert!(matches!(err, Error::AnalysisUnavailable { .. }));

        // Test mode lifts the restriction.
        assert!(AnalysisRun::resolve(&raw, b"", "lib", true).is_ok());
    }

    #[test]
    fn test_unknown_entry_package() {
        let raw = sample_raw_graph();
        let err = AnalysisRun::resolve(&raw, b"", "missing", false).unwrap_err();
        assert!(err.to_string().contains("package not found"));
    }

    #[test]
    fn test_unknown_callee_rejected() {
        let mut raw = sample_raw_graph();
        raw.calls.push(RawCall {
            caller: "app.main".into(),
            callee: "lib.Gone".into(),
            dynamic: false,
        });
        let err = AnalysisRun::resolve(&raw, b"", "app", false).unwrap_err();
        assert!(err.to_string().contains("lib.Gone"));
    }

    #[test]
    fn test_run_identity_tracks_inputs() {
        let raw = sample_raw_graph();
        let a = AnalysisRun::resolve(&raw, b"v1", "app", false).unwrap();
        let b = AnalysisRun::resolve(&raw, b"v1", "app", false).unwrap();
        let c = AnalysisRun::resolve(&raw, b"v1", "app", true).unwrap();
        assert_eq!(a.id, b.id);
        assert_ne!(a.id, c.id);
    }

    #[test]
    fn test_json_source_reads_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("callgraph.json");
        std::fs::write(&path, SAMPLE_GRAPH_JSON).unwrap();

        let source = JsonGraphSource::new(&path);
        let run = source.load("app", false).unwrap();
        assert_eq!(run.entry, "app");
        assert!(run.graph.find_function("app.main").is_some());
    }

    #[test]
    fn test_json_source_missing_file() {
        let source = JsonGraphSource::new("/definitely/not/here.json");
        let err = source.load("app", false).unwrap_err();
        assert!(matches!(err, Error::AnalysisUnavailable { .. }));
    }
}
