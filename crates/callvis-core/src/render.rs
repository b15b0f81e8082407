//! Graphviz DOT rendering of grouped call graphs
//!
//! Style options become graph-wide directives; per-node attributes only
//! carry identity, labels and the focus/export markers.

use std::fmt;

use crate::graph::CallGraph;
use crate::grouping::{Group, GroupedGraph};
use crate::model::{CallEdge, FunctionNode, NodeId};
use crate::options::StyleOptions;

const EXPORTED_FILL: &str = "#adedad";
const UNEXPORTED_FILL: &str = "moccasin";
const FOCUS_FILL: &str = "lightblue";
const CLUSTER_FILL: &str = "lightyellow";
const STD_CLUSTER_FILL: &str = "#e0ffe1";
const TYPE_CLUSTER_FILL: &str = "lemonchiffon";

/// Textual graph description ready for the layout engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphDescription(String);

impl GraphDescription {
    pub fn new(text: String) -> Self {
        GraphDescription(text)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for GraphDescription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Quote a DOT string literal.
pub fn quote(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for ch in value.chars() {
        match ch {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => {}
            _ => out.push(ch),
        }
    }
    out.push('"');
    out
}

/// Link that re-renders the graph focused on `target`.
fn focus_link(target: &str) -> String {
    format!("/render?focus={}", urlencoding::encode(target))
}

fn node_label(node: &FunctionNode) -> String {
    match &node.receiver {
        Some(recv) if recv.pointer => format!("(*{}).{}", recv.type_name, node.func),
        Some(recv) => format!("({}).{}", recv.type_name, node.func),
        None => node.func.clone(),
    }
}

fn node_line(grouped: &GroupedGraph<'_>, id: NodeId, indent: &str) -> Option<String> {
    let node = grouped.filtered.graph.node(id)?;
    let mut attrs = vec![
        format!("label={}", quote(&node_label(node))),
        format!("tooltip={}", quote(&format!("{} | package {}", node.name, node.package))),
        format!("URL={}", quote(&focus_link(&node.name))),
    ];
    if grouped.filtered.is_focus(id) {
        attrs.push(format!("fillcolor={}", quote(FOCUS_FILL)));
        attrs.push("penwidth=\"2.0\"".to_string());
    } else if node.exported {
        attrs.push(format!("fillcolor={}", quote(EXPORTED_FILL)));
    } else {
        attrs.push(format!("fillcolor={}", quote(UNEXPORTED_FILL)));
    }
    Some(format!("{indent}{} [{}];", quote(&node.name), attrs.join(" ")))
}

fn edge_line(graph: &CallGraph, edge: &CallEdge) -> Option<String> {
    let caller = graph.node(edge.caller)?;
    let callee = graph.node(edge.callee)?;

    let mut tooltip = format!("{} --> {}", caller.name, callee.name);
    if edge.sites() > 1 {
        tooltip.push_str(&format!(" ({} call sites)", edge.sites()));
    }
    let mut attrs = vec![format!("tooltip={}", quote(&tooltip))];
    if edge.is_dynamic() {
        attrs.push("style=\"dashed\"".to_string());
    }
    if caller.package != callee.package {
        attrs.push("color=\"saddlebrown\"".to_string());
    }
    Some(format!(
        "    {} -> {} [{}];",
        quote(&caller.name),
        quote(&callee.name),
        attrs.join(" ")
    ))
}

fn cluster_lines(grouped: &GroupedGraph<'_>, group: &Group, id: &str, depth: usize, lines: &mut Vec<String>) {
    let indent = "    ".repeat(depth);
    let inner = "    ".repeat(depth + 1);
    let nested = depth > 1;
    let fill = if group.std {
        STD_CLUSTER_FILL
    } else if nested {
        TYPE_CLUSTER_FILL
    } else {
        CLUSTER_FILL
    };

    lines.push(format!("{indent}subgraph {} {{", quote(id)));
    lines.push(format!("{inner}label={};", quote(&group.label)));
    lines.push(format!("{inner}tooltip={};", quote(&group.key.as_text())));
    lines.push(format!("{inner}URL={};", quote(&focus_link(&group.key.as_text()))));
    lines.push(format!("{inner}fontsize=\"{}\";", if nested { 15 } else { 16 }));
    lines.push(format!("{inner}style=\"filled\";"));
    lines.push(format!("{inner}fillcolor={};", quote(fill)));
    lines.push(format!("{inner}penwidth=\"0.8\";"));
    lines.push(String::new());

    for &member in &group.members {
        if let Some(line) = node_line(grouped, member, &inner) {
            lines.push(line);
        }
    }
    for (n, sub) in group.subgroups.iter().enumerate() {
        lines.push(String::new());
        cluster_lines(grouped, sub, &format!("{id}_{n}"), depth + 1, lines);
    }

    lines.push(format!("{indent}}}"));
}

/// Serialize a grouped graph into DOT.
pub fn render(grouped: &GroupedGraph<'_>, style: &StyleOptions) -> GraphDescription {
    let graph = grouped.filtered.graph;
    let mut lines = Vec::new();

    lines.push("digraph callvis {".to_string());
    lines.push("    labeljust=\"l\";".to_string());
    lines.push("    fontname=\"Arial\";".to_string());
    lines.push("    fontsize=\"14\";".to_string());
    lines.push(format!("    rankdir={};", quote(&style.rankdir.to_string())));
    lines.push("    bgcolor=\"lightgray\";".to_string());
    lines.push("    style=\"solid\";".to_string());
    lines.push("    penwidth=\"0.5\";".to_string());
    lines.push("    pad=\"0.0\";".to_string());
    lines.push(format!("    nodesep=\"{}\";", style.nodesep));
    lines.push(String::new());
    lines.push(format!(
        "    node [shape={} style={} fillcolor=\"honeydew\" fontname=\"Verdana\" penwidth=\"1.0\" margin=\"0.05,0.0\"];",
        quote(&style.nodeshape),
        quote(&style.nodestyle)
    ));
    lines.push(format!("    edge [minlen=\"{}\"];", style.minlen));
    lines.push(String::new());

    for (n, group) in grouped.groups.iter().enumerate() {
        cluster_lines(grouped, group, &format!("cluster_{n}"), 1, &mut lines);
        lines.push(String::new());
    }

    for &id in &grouped.ungrouped {
        if let Some(line) = node_line(grouped, id, "    ") {
            lines.push(line);
        }
    }
    if !grouped.ungrouped.is_empty() {
        lines.push(String::new());
    }

    let mut edges: Vec<&CallEdge> = grouped
        .filtered
        .edges
        .iter()
        .filter_map(|&id| graph.edge(id))
        .collect();
    edges.sort_by(|a, b| {
        let key = |e: &CallEdge| {
            (
                graph.node(e.caller).map(|n| n.name.clone()),
                graph.node(e.callee).map(|n| n.name.clone()),
            )
        };
        key(*a).cmp(&key(*b))
    });
    lines.extend(edges.into_iter().filter_map(|edge| edge_line(graph, edge)));

    lines.push("}".to_string());
    lines.push(String::new());

    GraphDescription(lines.join("\n"))
}
