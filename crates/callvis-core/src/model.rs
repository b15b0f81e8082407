//! Core data structures for the call graph

use serde::{Deserialize, Serialize};

/// Index of a function inside one analysis run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
pub struct NodeId(pub u32);

/// Index of a collapsed call edge inside one analysis run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
pub struct EdgeId(pub u32);

/// A package (import path) that declares functions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Package {
    /// Full import path, e.g. `github.com/acme/app/internal/db`.
    pub path: String,
    /// Short package name as written in the package clause.
    pub name: String,
    /// Whether the package belongs to the language's standard library.
    pub std: bool,
}

/// Receiver of a method.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Receiver {
    /// Type name without package qualifier, e.g. `Server`.
    pub type_name: String,
    pub pointer: bool,
}

/// A single function in the call graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionNode {
    pub id: NodeId,
    /// Fully-qualified signature; unique within a run.
    pub name: String,
    /// Bare function name, used as the node label.
    pub func: String,
    /// Import path of the declaring package.
    pub package: String,
    pub receiver: Option<Receiver>,
    pub exported: bool,
    /// Compiler-generated wrapper with no source of its own.
    pub synthetic: bool,
    /// Declared in test code.
    pub test: bool,
}

/// How a call site was resolved by the analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Dispatch {
    Static,
    Dynamic,
}

/// A caller → callee relationship. All call sites between the same pair
/// collapse into one edge; the per-dispatch site counts are kept.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallEdge {
    pub id: EdgeId,
    pub caller: NodeId,
    pub callee: NodeId,
    pub static_sites: u32,
    pub dynamic_sites: u32,
}

impl CallEdge {
    pub fn sites(&self) -> u32 {
        self.static_sites + self.dynamic_sites
    }

    /// True if at least one site went through dynamic dispatch.
    pub fn is_dynamic(&self) -> bool {
        self.dynamic_sites > 0
    }

    pub(crate) fn record(&mut self, dispatch: Dispatch) {
        match dispatch {
            Dispatch::Static => self.static_sites += 1,
            Dispatch::Dynamic => self.dynamic_sites += 1,
        }
    }
}

/// True if `name` starts with an uppercase letter (exported identifier).
pub fn is_exported_name(name: &str) -> bool {
    name.chars().next().is_some_and(char::is_uppercase)
}

fn path_root(path: &str) -> &str {
    path.split('/').next().unwrap_or(path)
}

/// Standard-library packages have no dot in their first path element and
/// sit outside the module root of the entry package.
pub fn is_std_package(path: &str, entry: &str) -> bool {
    let root = path_root(path);
    !root.contains('.') && root != path_root(entry)
}
