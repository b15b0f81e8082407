//! Call graph wrapper using petgraph::DiGraph with custom NodeId/EdgeId

use crate::model::*;
use petgraph::graph::{DiGraph, EdgeIndex, NodeIndex};
use petgraph::Direction;
use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};

/// The call graph of one analysis run. Functions and packages are added
/// once while building and never removed.
pub struct CallGraph {
    inner: DiGraph<FunctionNode, CallEdge>,
    by_name: HashMap<String, NodeId>,
    packages: BTreeMap<String, Package>,
}

impl std::fmt::Debug for CallGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallGraph")
            .field("package_count", &self.packages.len())
            .field("node_count", &self.inner.node_count())
            .field("edge_count", &self.inner.edge_count())
            .finish()
    }
}

/// Why a function or call could not be added.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildError {
    DuplicateFunction(String),
    UnknownPackage { function: String, package: String },
}

impl std::fmt::Display for BuildError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BuildError::DuplicateFunction(name) => write!(f, "duplicate function {name}"),
            BuildError::UnknownPackage { function, package } => {
                write!(f, "function {function} declared in unknown package {package}")
            }
        }
    }
}

fn node_index(id: NodeId) -> NodeIndex {
    NodeIndex::new(id.0 as usize)
}

fn node_id(idx: NodeIndex) -> NodeId {
    NodeId(idx.index() as u32)
}

impl CallGraph {
    pub fn new() -> Self {
        CallGraph {
            inner: DiGraph::new(),
            by_name: HashMap::new(),
            packages: BTreeMap::new(),
        }
    }

    /// Register a package. A later registration of the same path wins.
    pub fn add_package(&mut self, package: Package) {
        self.packages.insert(package.path.clone(), package);
    }

    /// Add a function. Returns its assigned NodeId.
    pub fn add_function(&mut self, mut node: FunctionNode) -> Result<NodeId, BuildError> {
        if self.by_name.contains_key(&node.name) {
            return Err(BuildError::DuplicateFunction(node.name));
        }
        if !self.packages.contains_key(&node.package) {
            return Err(BuildError::UnknownPackage {
                function: node.name,
                package: node.package,
            });
        }
        let id = node_id(NodeIndex::new(self.inner.node_count()));
        node.id = id;
        self.by_name.insert(node.name.clone(), id);
        self.inner.add_node(node);
        Ok(id)
    }

    /// Record one call site. Sites between the same pair share an edge.
    pub fn add_call(&mut self, caller: NodeId, callee: NodeId, dispatch: Dispatch) -> EdgeId {
        let (a, b) = (node_index(caller), node_index(callee));
        if let Some(idx) = self.inner.find_edge(a, b) {
            if let Some(edge) = self.inner.edge_weight_mut(idx) {
                edge.record(dispatch);
            }
            return EdgeId(idx.index() as u32);
        }
        let id = EdgeId(self.inner.edge_count() as u32);
        let mut edge = CallEdge {
            id,
            caller,
            callee,
            static_sites: 0,
            dynamic_sites: 0,
        };
        edge.record(dispatch);
        self.inner.add_edge(a, b, edge);
        id
    }

    /// Get a function by ID.
    pub fn node(&self, id: NodeId) -> Option<&FunctionNode> {
        self.inner.node_weight(node_index(id))
    }

    /// Get an edge by ID.
    pub fn edge(&self, id: EdgeId) -> Option<&CallEdge> {
        self.inner.edge_weight(EdgeIndex::new(id.0 as usize))
    }

    pub fn node_count(&self) -> usize {
        self.inner.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.inner.edge_count()
    }

    /// Iterate over all functions in insertion order.
    pub fn functions(&self) -> impl Iterator<Item = &FunctionNode> {
        self.inner.node_weights()
    }

    /// Iterate over all collapsed call edges.
    pub fn calls(&self) -> impl Iterator<Item = &CallEdge> {
        self.inner.edge_weights()
    }

    /// Look up a package by import path.
    pub fn package(&self, path: &str) -> Option<&Package> {
        self.packages.get(path)
    }

    /// Packages ordered by import path.
    pub fn packages(&self) -> impl Iterator<Item = &Package> {
        self.packages.values()
    }

    /// Find a function by its fully-qualified name.
    pub fn find_function(&self, name: &str) -> Option<NodeId> {
        self.by_name.get(name).copied()
    }

    /// All functions declared in the package at `path`.
    pub fn functions_in_package<'a>(&'a self, path: &'a str) -> impl Iterator<Item = NodeId> + 'a {
        self.inner
            .node_weights()
            .filter(move |n| n.package == path)
            .map(|n| n.id)
    }

    /// Direct callees of a function.
    pub fn callees(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.inner
            .neighbors_directed(node_index(id), Direction::Outgoing)
            .map(node_id)
    }

    /// Nodes reachable from `roots` within `max_depth` hops (`None` means
    /// unbounded). The roots themselves are included.
    pub fn reachable_from(&self, roots: &BTreeSet<NodeId>, max_depth: Option<usize>) -> BTreeSet<NodeId> {
        let mut seen: BTreeSet<NodeId> = roots.clone();
        let mut queue: VecDeque<(NodeId, usize)> = roots.iter().map(|&id| (id, 0)).collect();

        while let Some((current, depth)) = queue.pop_front() {
            if max_depth.is_some_and(|max| depth >= max) {
                continue;
            }
            for next in self.callees(current) {
                if seen.insert(next) {
                    queue.push_back((next, depth + 1));
                }
            }
        }

        seen
    }
}

impl Default for CallGraph {
    fn default() -> Self {
        Self::new()
    }
}
