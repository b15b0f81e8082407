//! Callvis Core: call graph model, filtering, grouping and DOT rendering

pub mod error;
pub mod model;
pub mod graph;
pub mod source;
pub mod options;
pub mod fingerprint;
pub mod filter;
pub mod grouping;
pub mod render;
pub mod pipeline;

#[cfg(test)]
pub mod tests;

#[cfg(test)]
pub mod test_utils;

pub use error::{Error, Result};
pub use model::{NodeId, EdgeId, Package, Receiver, FunctionNode, CallEdge, Dispatch};
pub use graph::CallGraph;
pub use source::{AnalysisRun, CallGraphSource, JsonGraphSource, RawCallGraph};
pub use options::{GroupMode, Options, OptionsStore, RankDir, Retention, StyleOptions};
pub use fingerprint::Fingerprint;
pub use filter::FilteredGraph;
pub use grouping::{Group, GroupKey, GroupedGraph};
pub use render::GraphDescription;
pub use pipeline::describe;
