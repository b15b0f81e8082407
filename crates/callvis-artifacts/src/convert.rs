//! Conversion of graph descriptions into images by the external layout engine

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use callvis_core::{Error, GraphDescription, Result};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, warn};

/// Default bound on a single layout-engine invocation.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Turns a graph description into image bytes.
#[async_trait]
pub trait ImageConverter: Send + Sync {
    async fn convert(&self, description: &GraphDescription, format: &str) -> Result<Vec<u8>>;

    /// Converter name for log lines.
    fn name(&self) -> &str;
}

/// Output formats are passed to the engine as `-T<format>`; only plain
/// renderer names such as `svg`, `png` or `svg:cairo` are accepted.
pub fn validate_format(format: &str) -> Result<()> {
    let valid = !format.is_empty()
        && format
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == ':' || c == '_');
    if valid {
        Ok(())
    } else {
        Err(Error::invalid_option("format", format, "expected a layout engine format such as svg or png"))
    }
}

/// Runs Graphviz `dot`, feeding the description on stdin.
#[derive(Debug, Clone)]
pub struct GraphvizConverter {
    program: PathBuf,
    timeout: Duration,
}

impl GraphvizConverter {
    pub fn new(program: impl Into<PathBuf>, timeout: Duration) -> Self {
        GraphvizConverter {
            program: program.into(),
            timeout,
        }
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

impl Default for GraphvizConverter {
    fn default() -> Self {
        Self::new("dot", DEFAULT_TIMEOUT)
    }
}

#[async_trait]
impl ImageConverter for GraphvizConverter {
    async fn convert(&self, description: &GraphDescription, format: &str) -> Result<Vec<u8>> {
        validate_format(format)?;
        let program = self.program.display().to_string();

        let mut child = Command::new(&self.program)
            .arg(format!("-T{format}"))
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| match e.kind() {
                ErrorKind::NotFound | ErrorKind::PermissionDenied => {
                    Error::RendererUnavailable(format!("{program}: {e}"))
                }
                _ => Error::RendererFailed(format!("failed to start {program}: {e}")),
            })?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| Error::RendererFailed(format!("{program}: stdin not captured")))?;
        let input = description.as_bytes().to_vec();
        // Feed stdin concurrently so a large image on stdout cannot block us.
        let feeder = tokio::spawn(async move {
            let result = stdin.write_all(&input).await;
            drop(stdin);
            result
        });

        debug!("Running {} -T{} with a {:?} timeout", program, format, self.timeout);
        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => return Err(Error::RendererFailed(format!("{program}: {e}"))),
            Err(_) => {
                warn!("{} did not finish within {:?}, killed", program, self.timeout);
                return Err(Error::RendererFailed(format!(
                    "{program} timed out after {:?}",
                    self.timeout
                )));
            }
        };

        if let Ok(Err(e)) = feeder.await {
            // A broken pipe just means the engine exited early; its status
            // and stderr below explain why.
            debug!("Writing to {} stdin failed: {}", program, e);
        }

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::RendererFailed(format!(
                "{program} exited with {}: {stderr}",
                output.status
            )));
        }

        Ok(output.stdout)
    }

    fn name(&self) -> &str {
        "graphviz"
    }
}
