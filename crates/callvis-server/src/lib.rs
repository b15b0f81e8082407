//! HTTP control service: option exchange, render triggers and artifact serving

pub mod router;
pub mod handlers;
pub mod state;

use std::sync::Arc;

use anyhow::Context;
use callvis_artifacts::PipelineRunner;
use callvis_core::OptionsStore;

pub use state::{RenderStatus, ServerState};

/// Listen address and redirect target.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Location the render trigger redirects to.
    pub viewer_url: String,
}

impl ServerConfig {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 7878,
            viewer_url: "/artifact".to_string(),
        }
    }
}

pub struct CallvisServer {
    state: Arc<ServerState>,
    config: ServerConfig,
}

impl CallvisServer {
    pub fn new(options: Arc<OptionsStore>, runner: Arc<PipelineRunner>, config: ServerConfig) -> Self {
        let state = Arc::new(ServerState::new(options, runner, config.viewer_url.clone()));
        CallvisServer { state, config }
    }

    pub fn state(&self) -> Arc<ServerState> {
        Arc::clone(&self.state)
    }

    /// Serve until the process is stopped.
    pub async fn start(self) -> anyhow::Result<()> {
        let address = self.config.address();
        let listener = tokio::net::TcpListener::bind(&address)
            .await
            .with_context(|| format!("failed to bind {address}"))?;
        tracing::info!("Listening on http://{}", listener.local_addr()?);

        let app = router::create_router(self.state);
        axum::serve(listener, app).await.context("server loop failed")?;
        Ok(())
    }
}
