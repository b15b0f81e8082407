//! Callvis Artifacts: image conversion, artifact caching and pipeline runs

pub mod cache;
pub mod convert;
pub mod runner;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use cache::{Artifact, ArtifactCache};
pub use convert::{DEFAULT_TIMEOUT, GraphvizConverter, ImageConverter};
pub use runner::{OutputTarget, PipelineRunner, RenderOutcome};
