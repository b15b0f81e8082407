//! One pipeline invocation: fingerprint, cache lookup, build, convert, write

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use callvis_core::{AnalysisRun, Error, Fingerprint, Options, Result, describe};
use chrono::Utc;
use tracing::{debug, info};

use crate::cache::{Artifact, ArtifactCache};
use crate::convert::{ImageConverter, validate_format};

/// Format name that skips the layout engine and keeps only the description.
pub const DESCRIPTION_FORMAT: &str = "gv";

/// Where finished artifacts are written and in which image format.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputTarget {
    /// Files land at `<base>.gv` and `<base>.<format>`; `None` keeps
    /// artifacts in memory and in the cache only.
    pub base: Option<PathBuf>,
    pub format: String,
}

impl OutputTarget {
    pub fn new(base: Option<PathBuf>, format: impl Into<String>) -> Self {
        OutputTarget {
            base,
            format: format.into(),
        }
    }

    pub fn description_path(&self) -> Option<PathBuf> {
        self.base.as_deref().map(|b| with_suffix(b, DESCRIPTION_FORMAT))
    }

    pub fn image_path(&self) -> Option<PathBuf> {
        if self.format == DESCRIPTION_FORMAT {
            return None;
        }
        self.base.as_deref().map(|b| with_suffix(b, &self.format))
    }
}

impl Default for OutputTarget {
    fn default() -> Self {
        Self::new(None, "svg")
    }
}

fn with_suffix(base: &Path, ext: &str) -> PathBuf {
    let mut name = OsString::from(base.as_os_str());
    name.push(".");
    name.push(ext);
    PathBuf::from(name)
}

/// Result of a finished render.
#[derive(Debug, Clone)]
pub struct RenderOutcome {
    pub artifact: Artifact,
    pub description_path: Option<PathBuf>,
    pub image_path: Option<PathBuf>,
}

/// Drives the pipeline for one analysis run.
///
/// Cheap to share behind an `Arc`; every call to [`PipelineRunner::render`]
/// works from the options snapshot it is given.
pub struct PipelineRunner {
    run: Arc<AnalysisRun>,
    cache: Arc<ArtifactCache>,
    converter: Arc<dyn ImageConverter>,
    output: OutputTarget,
    computations: AtomicU64,
}

impl PipelineRunner {
    pub fn new(
        run: Arc<AnalysisRun>,
        cache: Arc<ArtifactCache>,
        converter: Arc<dyn ImageConverter>,
        output: OutputTarget,
    ) -> Self {
        PipelineRunner {
            run,
            cache,
            converter,
            output,
            computations: AtomicU64::new(0),
        }
    }

    pub fn run(&self) -> &AnalysisRun {
        &self.run
    }

    pub fn cache(&self) -> &ArtifactCache {
        &self.cache
    }

    pub fn output(&self) -> &OutputTarget {
        &self.output
    }

    /// Number of times the pipeline actually executed (cache hits and
    /// joined flights excluded).
    pub fn computations(&self) -> u64 {
        self.computations.load(Ordering::SeqCst)
    }

    /// Cache key for `options` against this runner's analysis run.
    pub fn fingerprint(&self, options: &Options) -> Result<Fingerprint> {
        Fingerprint::compute(&self.run.id, &options.normalized(), &self.output.format)
    }

    /// Render `options`, reusing a cached artifact unless `refresh`.
    pub async fn render(&self, options: &Options, refresh: bool) -> Result<RenderOutcome> {
        validate_format(&self.output.format)?;
        let options = options.normalized();
        options.validate()?;
        let fingerprint = self.fingerprint(&options)?;

        let started = Instant::now();
        let artifact = self
            .cache
            .get_or_compute(&fingerprint, || self.compute(fingerprint.clone(), options.clone()), refresh)
            .await?;

        let outcome = self.write_outputs(artifact).await?;
        info!(
            "Rendered {} ({}) in {:?}",
            fingerprint.short(),
            self.output.format,
            started.elapsed()
        );
        Ok(outcome)
    }

    async fn compute(&self, fingerprint: Fingerprint, options: Options) -> Result<Artifact> {
        self.computations.fetch_add(1, Ordering::SeqCst);

        let run = Arc::clone(&self.run);
        let description = tokio::task::spawn_blocking(move || describe(&run.graph, &options))
            .await
            .map_err(|e| Error::Internal(format!("graph build task: {e}")))??;

        let image = if self.output.format == DESCRIPTION_FORMAT {
            None
        } else {
            debug!("Converting {} with {}", fingerprint.short(), self.converter.name());
            Some(self.converter.convert(&description, &self.output.format).await?)
        };

        Ok(Artifact {
            fingerprint,
            description: description.into_string(),
            image,
            format: self.output.format.clone(),
            created_at: Utc::now(),
        })
    }

    async fn write_outputs(&self, artifact: Artifact) -> Result<RenderOutcome> {
        let description_path = self.output.description_path();
        if let Some(path) = &description_path {
            write_atomic(path, artifact.description.as_bytes()).await?;
        }

        let image_path = match (self.output.image_path(), &artifact.image) {
            (Some(path), Some(image)) => {
                write_atomic(&path, image).await?;
                Some(path)
            }
            _ => None,
        };

        Ok(RenderOutcome {
            artifact,
            description_path,
            image_path,
        })
    }
}

impl std::fmt::Debug for PipelineRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineRunner")
            .field("run", &self.run.id)
            .field("entry", &self.run.entry)
            .field("converter", &self.converter.name())
            .field("output", &self.output)
            .field("computations", &self.computations())
            .finish()
    }
}

/// Write through a sibling temp file so readers never see a partial file.
async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let tmp = with_suffix(path, "tmp");
    tokio::fs::write(&tmp, bytes)
        .await
        .map_err(|e| Error::io(&tmp, e))?;
    tokio::fs::rename(&tmp, path)
        .await
        .map_err(|e| Error::io(path, e))
}
