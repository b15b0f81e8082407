//! Partitioning filtered functions into visual clusters

use std::collections::BTreeMap;

use serde::Serialize;

use crate::filter::FilteredGraph;
use crate::graph::CallGraph;
use crate::model::{FunctionNode, NodeId};
use crate::options::GroupMode;

/// Identity of a cluster. Ordering is lexicographic, packages before
/// types, which fixes the order clusters are emitted in.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum GroupKey {
    Package { path: String },
    Type { package: String, type_name: String },
}

impl GroupKey {
    /// Stable text form, e.g. `lib` or `lib.Server`.
    pub fn as_text(&self) -> String {
        match self {
            GroupKey::Package { path } => path.clone(),
            GroupKey::Type { package, type_name } => format!("{package}.{type_name}"),
        }
    }
}

/// A cluster of functions. Nested groups only occur in `pkg,type` mode.
#[derive(Debug, Clone, Serialize)]
pub struct Group {
    pub key: GroupKey,
    pub label: String,
    /// All members belong to the standard library.
    pub std: bool,
    /// Direct members, ordered by function name.
    pub members: Vec<NodeId>,
    pub subgroups: Vec<Group>,
}

impl Group {
    fn new(key: GroupKey, label: String, std: bool) -> Self {
        Group {
            key,
            label,
            std,
            members: Vec::new(),
            subgroups: Vec::new(),
        }
    }

    /// Members of this group and every nested group.
    pub fn all_members(&self) -> Vec<NodeId> {
        let mut out = self.members.clone();
        for sub in &self.subgroups {
            out.extend(sub.all_members());
        }
        out
    }
}

/// A filtered graph plus its cluster partition.
#[derive(Debug, Clone)]
pub struct GroupedGraph<'g> {
    pub filtered: FilteredGraph<'g>,
    pub mode: GroupMode,
    pub groups: Vec<Group>,
    /// Nodes outside every cluster (the implicit default group).
    pub ungrouped: Vec<NodeId>,
}

impl GroupedGraph<'_> {
    /// Every node exactly once: grouped members first, then ungrouped.
    pub fn all_members(&self) -> Vec<NodeId> {
        let mut out: Vec<NodeId> = self.groups.iter().flat_map(Group::all_members).collect();
        out.extend(self.ungrouped.iter().copied());
        out
    }
}

fn package_group(graph: &CallGraph, path: &str) -> Group {
    let (label, std) = graph
        .package(path)
        .map(|p| (p.path.clone(), p.std))
        .unwrap_or_else(|| (path.to_string(), false));
    Group::new(GroupKey::Package { path: path.to_string() }, label, std)
}

fn type_group(graph: &CallGraph, node: &FunctionNode, type_name: &str) -> Group {
    let (pkg_name, std) = graph
        .package(&node.package)
        .map(|p| (p.name.as_str(), p.std))
        .unwrap_or((node.package.as_str(), false));
    Group::new(
        GroupKey::Type {
            package: node.package.clone(),
            type_name: type_name.to_string(),
        },
        format!("{pkg_name}.{type_name}"),
        std,
    )
}

fn sort_by_name(graph: &CallGraph, ids: &mut [NodeId]) {
    ids.sort_by(|a, b| {
        let name = |id: &NodeId| graph.node(*id).map(|n| n.name.as_str()).unwrap_or("");
        name(a).cmp(name(b))
    });
}

fn finish(graph: &CallGraph, groups: BTreeMap<GroupKey, Group>) -> Vec<Group> {
    groups
        .into_values()
        .map(|mut group| {
            sort_by_name(graph, &mut group.members);
            group.subgroups = group
                .subgroups
                .into_iter()
                .map(|mut sub| {
                    sort_by_name(graph, &mut sub.members);
                    sub
                })
                .collect();
            group
        })
        .collect()
}

/// Partition the filtered nodes into clusters according to `mode`.
pub fn group<'g>(filtered: FilteredGraph<'g>, mode: GroupMode) -> GroupedGraph<'g> {
    let graph = filtered.graph;
    let mut groups: BTreeMap<GroupKey, Group> = BTreeMap::new();
    let mut ungrouped: Vec<NodeId> = Vec::new();

    for node in filtered.functions() {
        match mode {
            GroupMode::None => ungrouped.push(node.id),
            GroupMode::Package => {
                groups
                    .entry(GroupKey::Package { path: node.package.clone() })
                    .or_insert_with(|| package_group(graph, &node.package))
                    .members
                    .push(node.id);
            }
            GroupMode::Type => {
                let group = match &node.receiver {
                    Some(recv) => groups
                        .entry(GroupKey::Type {
                            package: node.package.clone(),
                            type_name: recv.type_name.clone(),
                        })
                        .or_insert_with(|| type_group(graph, node, &recv.type_name)),
                    None => groups
                        .entry(GroupKey::Package { path: node.package.clone() })
                        .or_insert_with(|| package_group(graph, &node.package)),
                };
                group.members.push(node.id);
            }
            GroupMode::PackageType => {
                let pkg = groups
                    .entry(GroupKey::Package { path: node.package.clone() })
                    .or_insert_with(|| package_group(graph, &node.package));
                match &node.receiver {
                    Some(recv) => {
                        let key = GroupKey::Type {
                            package: node.package.clone(),
                            type_name: recv.type_name.clone(),
                        };
                        match pkg.subgroups.iter_mut().find(|g| g.key == key) {
                            Some(sub) => sub.members.push(node.id),
                            None => {
                                let mut sub = type_group(graph, node, &recv.type_name);
                                sub.members.push(node.id);
                                pkg.subgroups.push(sub);
                            }
                        }
                    }
                    None => pkg.members.push(node.id),
                }
            }
        }
    }

    let mut groups = finish(graph, groups);
    for group in &mut groups {
        group.subgroups.sort_by(|a, b| a.key.cmp(&b.key));
    }
    sort_by_name(graph, &mut ungrouped);

    tracing::debug!(
        "Grouped {} functions into {} clusters ({} mode)",
        filtered.nodes.len(),
        groups.len(),
        mode
    );

    GroupedGraph {
        filtered,
        mode,
        groups,
        ungrouped,
    }
}
