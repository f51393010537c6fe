// HTTP route handlers for the reporpc API

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use reporpc_common::ExecutionRequest;
use reporpc_engine::{AggregateError, RequestOutcome};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::{metrics, AppState};

#[derive(Debug, Default, Deserialize)]
pub struct EvaluateParams {
    pub timeout_ms: Option<u64>,
}

/// Per-request outcome in a failed batch
#[derive(Debug, Serialize)]
pub struct OutcomeBody {
    pub index: usize,
    pub project: String,
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stdout: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
}

impl From<&RequestOutcome> for OutcomeBody {
    fn from(outcome: &RequestOutcome) -> Self {
        let base = OutcomeBody {
            index: outcome.index,
            project: outcome.project.to_string(),
            status: "ok",
            stdout: None,
            kind: None,
            message: None,
            exit_code: None,
        };
        match &outcome.result {
            Ok(result) => OutcomeBody {
                stdout: Some(result.stdout_lossy()),
                ..base
            },
            Err(e) => OutcomeBody {
                status: "failed",
                kind: Some(e.kind()),
                message: Some(e.to_string()),
                exit_code: e.exit_code(),
                ..base
            },
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub outcomes: Vec<OutcomeBody>,
}

impl From<&AggregateError> for ErrorResponse {
    fn from(err: &AggregateError) -> Self {
        ErrorResponse {
            error: err.to_string(),
            outcomes: err.outcomes.iter().map(OutcomeBody::from).collect(),
        }
    }
}

/// POST /evaluate - Run a batch concurrently, outputs in request order
pub async fn evaluate(
    State(state): State<Arc<AppState>>,
    Query(params): Query<EvaluateParams>,
    Json(requests): Json<Vec<ExecutionRequest>>,
) -> Response {
    let batch_id = Uuid::new_v4();
    metrics::record_batch_received();

    if requests.len() > state.config.max_batch_size {
        metrics::record_batch_rejected("batch_too_large");
        tracing::warn!(
            %batch_id,
            size = requests.len(),
            max = state.config.max_batch_size,
            "Rejected oversized batch"
        );
        return (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                error: format!(
                    "batch of {} requests exceeds the limit of {}",
                    requests.len(),
                    state.config.max_batch_size
                ),
                outcomes: vec![],
            }),
        )
            .into_response();
    }

    let timeout_ms = state.config.effective_timeout_ms(params.timeout_ms);
    let dispatcher = state
        .dispatcher
        .clone()
        .with_timeout(Duration::from_millis(timeout_ms));

    tracing::info!(%batch_id, size = requests.len(), timeout_ms, "Evaluating batch");
    let outcome = dispatcher.fan_out(requests).await;

    for o in &outcome.outcomes {
        let project = o.project.to_string();
        match &o.result {
            Ok(r) => metrics::record_request(&project, "ok", Some(r.execution_time_ms)),
            Err(e) => metrics::record_request(&project, e.kind(), None),
        }
    }

    match outcome.into_results() {
        Ok(results) => {
            tracing::info!(%batch_id, "Batch succeeded");
            let outputs: Vec<String> = results.iter().map(|r| r.stdout_lossy()).collect();
            (StatusCode::OK, Json(outputs)).into_response()
        }
        Err(err) => {
            for (index, e) in err.failures() {
                tracing::warn!(%batch_id, index, kind = e.kind(), error = %e, "Request failed");
            }
            tracing::warn!(%batch_id, error = %err, "Batch failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse::from(&err)),
            )
                .into_response()
        }
    }
}

/// GET /health - Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

/// GET /metrics - Prometheus exposition
pub async fn metrics_handler() -> Response {
    match metrics::render_metrics() {
        Ok(body) => (StatusCode::OK, body).into_response(),
        Err(e) => {
            tracing::error!(error = %e, "Failed to render metrics");
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}
