//! Fixtures shared by the artifact, server and integration tests

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use callvis_core::{AnalysisRun, Error, GraphDescription, RawCallGraph, Result};

use crate::convert::ImageConverter;

/// Entry package `app` calling into `lib`, which prints through `fmt`.
/// Static calls only, so rendered descriptions stay small.
pub const MINIMAL_GRAPH_JSON: &str = r#"{
  "packages": [
    { "path": "app", "name": "main" },
    { "path": "lib", "name": "lib", "std": false },
    { "path": "fmt", "name": "fmt" }
  ],
  "functions": [
    { "name": "app.main", "package": "app" },
    { "name": "lib.Do", "package": "lib" },
    { "name": "lib.helper", "package": "lib" },
    { "name": "fmt.Println", "package": "fmt" }
  ],
  "calls": [
    { "caller": "app.main", "callee": "lib.Do" },
    { "caller": "lib.Do", "callee": "lib.helper" },
    { "caller": "lib.helper", "callee": "fmt.Println" }
  ]
}"#;

pub fn minimal_run() -> AnalysisRun {
    let raw: RawCallGraph = serde_json::from_str(MINIMAL_GRAPH_JSON).unwrap();
    AnalysisRun::resolve(&raw, MINIMAL_GRAPH_JSON.as_bytes(), "app", false).unwrap()
}

/// Converter that wraps the description instead of running a layout engine.
#[derive(Debug, Default)]
pub struct FakeConverter {
    calls: AtomicUsize,
    delay: Option<Duration>,
    failure: Option<String>,
}

impl FakeConverter {
    pub fn slow(delay: Duration) -> Self {
        FakeConverter {
            delay: Some(delay),
            ..Self::default()
        }
    }

    pub fn failing(message: &str) -> Self {
        FakeConverter {
            failure: Some(message.to_string()),
            ..Self::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ImageConverter for FakeConverter {
    async fn convert(&self, description: &GraphDescription, format: &str) -> Result<Vec<u8>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(message) = &self.failure {
            return Err(Error::RendererFailed(message.clone()));
        }
        Ok(format!("<{format}>{}</{format}>", description.as_str()).into_bytes())
    }

    fn name(&self) -> &str {
        "fake"
    }
}
