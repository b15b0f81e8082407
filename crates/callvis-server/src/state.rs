//! Shared server state and background render jobs

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use callvis_artifacts::{PipelineRunner, RenderOutcome};
use callvis_core::{Error, Options, OptionsStore};
use tokio::sync::RwLock;
use tracing::{info, warn};

/// Outcome of the most recently triggered render.
#[derive(Debug, Clone)]
pub enum RenderStatus {
    /// Nothing has been rendered yet.
    Idle,
    Pending { generation: u64 },
    Ready { generation: u64, outcome: Arc<RenderOutcome> },
    Failed { generation: u64, error: Error },
}

impl RenderStatus {
    pub fn generation(&self) -> u64 {
        match self {
            RenderStatus::Idle => 0,
            RenderStatus::Pending { generation }
            | RenderStatus::Ready { generation, .. }
            | RenderStatus::Failed { generation, .. } => *generation,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            RenderStatus::Idle => "idle",
            RenderStatus::Pending { .. } => "pending",
            RenderStatus::Ready { .. } => "ready",
            RenderStatus::Failed { .. } => "failed",
        }
    }
}

/// State shared by every request handler.
pub struct ServerState {
    pub options: Arc<OptionsStore>,
    pub runner: Arc<PipelineRunner>,
    /// Where a render trigger redirects the caller.
    pub viewer_url: String,
    latest: RwLock<RenderStatus>,
    generation: AtomicU64,
}

impl ServerState {
    pub fn new(options: Arc<OptionsStore>, runner: Arc<PipelineRunner>, viewer_url: impl Into<String>) -> Self {
        ServerState {
            options,
            runner,
            viewer_url: viewer_url.into(),
            latest: RwLock::new(RenderStatus::Idle),
            generation: AtomicU64::new(0),
        }
    }

    pub async fn status(&self) -> RenderStatus {
        self.latest.read().await.clone()
    }

    /// Start rendering `options` in the background and return its generation.
    pub async fn trigger(self: &Arc<Self>, options: Options, refresh: bool) -> u64 {
        let generation = self.begin().await;

        let state = Arc::clone(self);
        tokio::spawn(async move {
            let result = state.runner.render(&options, refresh).await.map(Arc::new);
            state.finish(generation, result).await;
        });
        generation
    }

    /// Run a render to completion, updating the status like `trigger` does.
    pub async fn render_now(&self, options: &Options, refresh: bool) -> Result<Arc<RenderOutcome>, Error> {
        let generation = self.begin().await;
        let result = self.runner.render(options, refresh).await.map(Arc::new);
        self.finish(generation, result.clone()).await;
        result
    }

    async fn begin(&self) -> u64 {
        let mut latest = self.latest.write().await;
        let generation = self.next_generation();
        *latest = RenderStatus::Pending { generation };
        generation
    }

    fn next_generation(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::SeqCst) + 1
    }

    async fn finish(&self, generation: u64, result: Result<Arc<RenderOutcome>, Error>) {
        let mut latest = self.latest.write().await;
        if latest.generation() > generation {
            // A newer trigger owns the status now.
            return;
        }
        *latest = match result {
            Ok(outcome) => {
                info!(
                    "Render #{} ready ({})",
                    generation,
                    outcome.artifact.fingerprint.short()
                );
                RenderStatus::Ready { generation, outcome }
            }
            Err(error) => {
                warn!("Render #{} failed: {}", generation, error);
                RenderStatus::Failed { generation, error }
            }
        };
    }
}

impl std::fmt::Debug for ServerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerState")
            .field("runner", &self.runner)
            .field("viewer_url", &self.viewer_url)
            .field("generation", &self.generation.load(Ordering::SeqCst))
            .finish()
    }
}
