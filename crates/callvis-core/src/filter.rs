//! Node and edge filtering driven by options

use std::collections::BTreeSet;

use crate::error::{Error, Result};
use crate::graph::CallGraph;
use crate::model::{EdgeId, FunctionNode, NodeId};
use crate::options::Options;

/// The subset of a call graph that survives filtering.
#[derive(Debug, Clone)]
pub struct FilteredGraph<'g> {
    pub graph: &'g CallGraph,
    pub nodes: BTreeSet<NodeId>,
    /// Edges whose caller and callee both survived, in graph order.
    pub edges: Vec<EdgeId>,
    /// Functions highlighted as the focus target. May include nodes that
    /// were filtered out.
    pub focus: BTreeSet<NodeId>,
}

impl FilteredGraph<'_> {
    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains(&id)
    }

    pub fn is_focus(&self, id: NodeId) -> bool {
        self.focus.contains(&id)
    }

    pub fn functions(&self) -> impl Iterator<Item = &FunctionNode> {
        self.nodes.iter().filter_map(|&id| self.graph.node(id))
    }
}

/// Resolve a focus target as a function name, a package import path or a
/// package name, in that order. An empty target means no focus.
pub fn resolve_focus(graph: &CallGraph, focus: &str) -> Result<BTreeSet<NodeId>> {
    let focus = focus.trim();
    if focus.is_empty() {
        return Ok(BTreeSet::new());
    }
    if let Some(id) = graph.find_function(focus) {
        return Ok(BTreeSet::from([id]));
    }
    if graph.package(focus).is_some() {
        return Ok(graph.functions_in_package(focus).collect());
    }

    let by_name: Vec<&str> = graph
        .packages()
        .filter(|p| p.name == focus)
        .map(|p| p.path.as_str())
        .collect();
    if by_name.is_empty() {
        return Err(Error::FocusNotFound(focus.to_string()));
    }
    Ok(by_name
        .into_iter()
        .flat_map(|path| graph.functions_in_package(path))
        .collect())
}

fn has_prefix(path: &str, prefixes: &[String]) -> bool {
    prefixes.iter().any(|p| path.starts_with(p.as_str()))
}

/// Apply every filtering rule in `options` to `graph`.
pub fn apply<'g>(graph: &'g CallGraph, options: &Options) -> Result<FilteredGraph<'g>> {
    let focus = resolve_focus(graph, &options.focus)?;

    // Only the `nointer` rule consults reachability.
    let retained = if options.nointer {
        graph.reachable_from(&focus, options.retention.max_depth())
    } else {
        BTreeSet::new()
    };

    let nodes: BTreeSet<NodeId> = graph
        .functions()
        .filter(|node| keep_node(graph, node, options, &retained))
        .map(|node| node.id)
        .collect();

    let edges: Vec<EdgeId> = graph
        .calls()
        .filter(|e| nodes.contains(&e.caller) && nodes.contains(&e.callee))
        .map(|e| e.id)
        .collect();

    tracing::debug!(
        "Filter kept {}/{} functions and {}/{} edges (focus: {} nodes)",
        nodes.len(),
        graph.node_count(),
        edges.len(),
        graph.edge_count(),
        focus.len()
    );

    Ok(FilteredGraph {
        graph,
        nodes,
        edges,
        focus,
    })
}

fn keep_node(graph: &CallGraph, node: &FunctionNode, options: &Options, retained: &BTreeSet<NodeId>) -> bool {
    if node.synthetic || (node.test && !options.tests) {
        return false;
    }

    let path = node.package.as_str();
    if !options.include.is_empty() && !has_prefix(path, &options.include) {
        return false;
    }
    if has_prefix(path, &options.ignore) {
        return false;
    }
    if !options.limit.is_empty() && !has_prefix(path, &options.limit) {
        return false;
    }
    if options.nostd && graph.package(path).is_some_and(|p| p.std) {
        return false;
    }
    if options.nointer && !node.exported && !retained.contains(&node.id) {
        return false;
    }
    true
}
