//! The pure build → filter → group → render chain

use std::time::Instant;

use crate::error::Result;
use crate::filter;
use crate::graph::CallGraph;
use crate::grouping;
use crate::options::Options;
use crate::render::{self, GraphDescription};

/// Run every pure stage on one options snapshot.
///
/// Identical graphs and options always produce byte-identical output.
pub fn describe(graph: &CallGraph, options: &Options) -> Result<GraphDescription> {
    let started = Instant::now();
    let options = options.normalized();
    options.validate()?;

    let filtered = filter::apply(graph, &options)?;
    let (nodes, edges) = (filtered.nodes.len(), filtered.edges.len());
    let grouped = grouping::group(filtered, options.group);
    let clusters = grouped.groups.len();
    let description = render::render(&grouped, &options.style);

    tracing::info!(
        "Described {} functions, {} calls, {} clusters in {:?}",
        nodes,
        edges,
        clusters,
        started.elapsed()
    );
    Ok(description)
}
