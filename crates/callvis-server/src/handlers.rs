//! REST handlers for the option exchange, render trigger and artifact endpoints

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json, Redirect, Response},
};
use callvis_core::Error;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::state::{RenderStatus, ServerState};

/// Query parameter that carries a serialized option set.
const OPTS_PARAM: &str = "opts";
/// Query parameter that bypasses cached artifacts.
const REFRESH_PARAM: &str = "refresh";
/// Query parameter that restores the launch defaults before overrides apply.
const RESET_PARAM: &str = "reset";

fn is_set(value: &str) -> bool {
    matches!(value.trim(), "true" | "1" | "on" | "yes")
}

/// Pipeline error as an HTTP response.
#[derive(Debug)]
pub struct ApiError(pub Error);

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        ApiError(err)
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
    recoverable: bool,
}

pub fn status_for(err: &Error) -> StatusCode {
    match err {
        Error::FocusNotFound(_) => StatusCode::NOT_FOUND,
        Error::InvalidOption { .. } => StatusCode::BAD_REQUEST,
        Error::RendererUnavailable(_) | Error::RendererFailed(_) => StatusCode::BAD_GATEWAY,
        Error::AnalysisUnavailable { .. } | Error::Internal(_) | Error::Io { .. } => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: self.0.to_string(),
            recoverable: self.0.is_recoverable(),
        };
        (status_for(&self.0), Json(body)).into_response()
    }
}

#[derive(Debug, Deserialize)]
pub struct OptionsQuery {
    pub opts: Option<String>,
}

/// `GET /options[?opts=<json>]`: merge a partial option set if given and
/// return the current one.
pub async fn exchange_options(
    State(state): State<Arc<ServerState>>,
    Query(query): Query<OptionsQuery>,
) -> Result<Response, ApiError> {
    if let Some(payload) = query.opts.as_deref().filter(|p| !p.trim().is_empty()) {
        debug!("Merging {} from client", OPTS_PARAM);
        state.options.merge_serialized(payload)?;
    }
    let body = state.options.serialize()?;
    Ok(([(header::CONTENT_TYPE, "application/json")], body).into_response())
}

/// `GET /render?<overrides>[&refresh=true][&reset=true]`: apply overrides,
/// start a background render and redirect to the viewer. With `reset` the
/// overrides apply to the launch defaults instead of the current options.
pub async fn trigger_render(
    State(state): State<Arc<ServerState>>,
    Query(params): Query<Vec<(String, String)>>,
) -> Result<Redirect, ApiError> {
    let mut refresh = false;
    let mut reset = false;
    let mut overrides = Vec::with_capacity(params.len());
    for (key, value) in &params {
        match key.as_str() {
            REFRESH_PARAM => refresh = is_set(value),
            RESET_PARAM => reset = is_set(value),
            _ => overrides.push((key.as_str(), value.as_str())),
        }
    }

    let snapshot = if reset {
        state.options.reset_with_overrides(overrides)?
    } else {
        state.options.apply_overrides(overrides)?
    };
    let generation = state.trigger(snapshot, refresh).await;
    info!("Render #{} triggered (refresh: {})", generation, refresh);
    Ok(Redirect::to(&state.viewer_url))
}

/// `GET /artifact`: the latest image, `202` while it is still rendering.
pub async fn get_artifact(State(state): State<Arc<ServerState>>) -> Result<Response, ApiError> {
    serve_latest(&state, |outcome| {
        let artifact = &outcome.artifact;
        match &artifact.image {
            Some(image) => {
                let mime = mime_guess::from_ext(&artifact.format).first_or_octet_stream();
                ([(header::CONTENT_TYPE, mime.to_string())], image.clone()).into_response()
            }
            None => description_response(&artifact.description),
        }
    })
    .await
}

/// `GET /artifact/gv`: the latest graph description.
pub async fn get_description(State(state): State<Arc<ServerState>>) -> Result<Response, ApiError> {
    serve_latest(&state, |outcome| description_response(&outcome.artifact.description)).await
}

async fn serve_latest<F>(state: &ServerState, ready: F) -> Result<Response, ApiError>
where
    F: FnOnce(&callvis_artifacts::RenderOutcome) -> Response,
{
    match state.status().await {
        RenderStatus::Idle => Ok((StatusCode::NOT_FOUND, "nothing rendered yet").into_response()),
        RenderStatus::Pending { generation } => Ok((
            StatusCode::ACCEPTED,
            [(header::RETRY_AFTER, "1")],
            format!("render #{generation} in progress"),
        )
            .into_response()),
        RenderStatus::Ready { outcome, .. } => Ok(ready(&outcome)),
        RenderStatus::Failed { error, .. } => Err(ApiError(error)),
    }
}

fn description_response(description: &str) -> Response {
    (
        [(header::CONTENT_TYPE, "text/vnd.graphviz; charset=utf-8")],
        description.to_string(),
    )
        .into_response()
}

#[derive(Debug, Serialize)]
pub struct ClearResponse {
    pub removed: usize,
}

/// `DELETE /cache`
pub async fn clear_cache(State(state): State<Arc<ServerState>>) -> Result<Json<ClearResponse>, ApiError> {
    let removed = state.runner.cache().clear().await?;
    info!("Cleared {} cached artifacts", removed);
    Ok(Json(ClearResponse { removed }))
}

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub entry: String,
    pub render: String,
    pub computations: u64,
}

/// Health check endpoint
pub async fn health_check(State(state): State<Arc<ServerState>>) -> impl IntoResponse {
    let health = HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        entry: state.runner.run().entry.clone(),
        render: state.status().await.label().to_string(),
        computations: state.runner.computations(),
    };
    Json(health)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(status_for(&Error::FocusNotFound("x".into())), StatusCode::NOT_FOUND);
        assert_eq!(
            status_for(&Error::invalid_option("minlen", "x", "bad")),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(status_for(&Error::RendererFailed("exit 1".into())), StatusCode::BAD_GATEWAY);
        assert_eq!(
            status_for(&Error::Internal("panic".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
