//! CLI command implementations

use std::sync::Arc;

use anyhow::Context;
use callvis_artifacts::{ArtifactCache, GraphvizConverter, PipelineRunner};
use callvis_core::{AnalysisRun, Error, JsonGraphSource, OptionsStore};
use callvis_server::{CallvisServer, ServerConfig};

use crate::config::{Mode, Settings};

/// Bad command-line usage; reported with exit status 2.
#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct UsageError(pub String);

pub async fn run(settings: Settings) -> anyhow::Result<()> {
    let run = load_analysis(&settings)?;
    tracing::info!(
        "Loaded {} functions, {} calls for {}",
        run.graph.node_count(),
        run.graph.edge_count(),
        run.entry
    );

    let cache = Arc::new(ArtifactCache::new(settings.cache_dir.clone()));
    if let Some(dir) = cache.dir() {
        tracing::info!("Caching artifacts in {}", dir.display());
    }
    let converter = Arc::new(GraphvizConverter::new(settings.dot.clone(), settings.dot_timeout));
    tracing::debug!(
        "Layout engine {} (timeout {:?})",
        converter.program().display(),
        converter.timeout()
    );
    let runner = Arc::new(PipelineRunner::new(
        Arc::new(run),
        cache,
        converter,
        settings.output.clone(),
    ));
    let store = Arc::new(OptionsStore::new(settings.options.clone()));

    match settings.mode.clone() {
        Mode::Batch => render_once(&runner, &store).await,
        Mode::Serve { host, port } => serve(settings, runner, store, host, port).await,
    }
}

/// Read the exported call graph and resolve the entry package.
fn load_analysis(settings: &Settings) -> anyhow::Result<AnalysisRun> {
    let source = JsonGraphSource::new(&settings.graph);
    let (raw, bytes) = source.read_raw(&settings.entry)?;
    if !raw.has_package(&settings.entry) {
        return Err(UsageError(format!(
            "package {:?} not found in {}",
            settings.entry,
            source.path().display()
        ))
        .into());
    }
    let run = AnalysisRun::resolve(&raw, &bytes, &settings.entry, settings.options.tests)?;
    Ok(run)
}

async fn render_once(runner: &PipelineRunner, store: &OptionsStore) -> anyhow::Result<()> {
    let outcome = runner
        .render(&store.snapshot(), false)
        .await
        .context("render failed")?;
    for path in [&outcome.description_path, &outcome.image_path].into_iter().flatten() {
        tracing::info!("Wrote {}", path.display());
    }
    Ok(())
}

async fn serve(
    settings: Settings,
    runner: Arc<PipelineRunner>,
    store: Arc<OptionsStore>,
    host: String,
    port: u16,
) -> anyhow::Result<()> {
    let config = ServerConfig {
        host,
        port,
        viewer_url: settings.viewer_url.clone(),
    };
    let address = config.address();
    let server = CallvisServer::new(Arc::clone(&store), runner, config);
    let state = server.state();

    // First render before serving; only a broken analysis is fatal.
    match state.render_now(&store.snapshot(), false).await {
        Ok(outcome) => {
            tracing::info!("Initial render {} ready", outcome.artifact.fingerprint.short());
            if !settings.skip_browser {
                open_browser(&viewer_location(&address, &settings.viewer_url));
            }
        }
        Err(err @ Error::AnalysisUnavailable { .. }) => {
            return Err(anyhow::Error::new(err).context("initial render failed"));
        }
        Err(err) => tracing::error!("Initial render failed: {}", err),
    }

    server.start().await
}

/// Absolute URL for the viewer; relative locations resolve against the server.
fn viewer_location(address: &str, viewer_url: &str) -> String {
    if viewer_url.starts_with("http://") || viewer_url.starts_with("https://") {
        viewer_url.to_string()
    } else {
        format!("http://{}/{}", address, viewer_url.trim_start_matches('/'))
    }
}

fn open_browser(url: &str) {
    tracing::info!("Opening {}", url);
    if let Err(e) = open::that_detached(url) {
        tracing::warn!("Could not open a browser: {}", e);
    }
}
