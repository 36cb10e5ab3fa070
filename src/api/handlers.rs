use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use serde::Serialize;
use serde_json::json;

use crate::errors::AppError;
use crate::ledger::{DecisionRequest, Recorded};
use crate::middleware::identity::Identity;
use crate::models::approval::{Decision, LedgerState};
use crate::models::status::{Receipt, StatusSnapshot};
use crate::AppState;

// ── Response DTOs ────────────────────────────────────────────

#[derive(Serialize)]
pub struct PushResponse {
    pub ok: bool,
    #[serde(flatten)]
    pub receipt: Receipt,
}

#[derive(Serialize)]
pub struct DecisionResponse {
    pub ok: bool,
    #[serde(flatten)]
    pub recorded: Recorded,
}

fn require_agent(state: &AppState, headers: &HeaderMap) -> Result<(), AppError> {
    match state.agent_auth.resolve(headers) {
        Some(Identity::Agent) => Ok(()),
        _ => Err(AppError::Unauthorized),
    }
}

fn require_approver(state: &AppState, headers: &HeaderMap) -> Result<String, AppError> {
    match state.approver_auth.resolve(headers) {
        Some(Identity::Approver { email }) => Ok(email),
        _ => Err(AppError::Unauthorized),
    }
}

/// POST /api/status — the agent pushes its latest snapshot
pub async fn push_status(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<PushResponse>, AppError> {
    require_agent(&state, &headers)?;
    let snapshot = StatusSnapshot::parse(&body).map_err(|e| {
        tracing::warn!("push_status: {}", e);
        e
    })?;

    let receipt = state.relay.accept_snapshot(snapshot, Utc::now()).await?;
    Ok(Json(PushResponse { ok: true, receipt }))
}

/// GET /api/status — latest snapshot, exactly as pushed
pub async fn get_status(State(state): State<Arc<AppState>>) -> Response {
    match state.relay.get_latest_snapshot().await {
        Ok(raw) => ([(header::CONTENT_TYPE, "application/json")], raw).into_response(),
        // Dashboards key off the top-level `error` string here.
        Err(AppError::NotFound(msg)) => {
            (StatusCode::NOT_FOUND, Json(json!({ "error": msg }))).into_response()
        }
        Err(e) => e.into_response(),
    }
}

/// GET /api/status/sync — when the agent last pushed
pub async fn get_last_sync(
    State(state): State<Arc<AppState>>,
) -> Result<Json<serde_json::Value>, AppError> {
    let last_sync = state.relay.last_sync().await?;
    Ok(Json(json!({ "last_sync": last_sync })))
}

/// GET /api/approvals — pending queue and decision history
pub async fn list_approvals(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<LedgerState>, AppError> {
    require_approver(&state, &headers)?;
    Ok(Json(state.ledger.list_state().await?))
}

/// POST /api/approvals — approve or reject an item
pub async fn submit_decision(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<DecisionResponse>, AppError> {
    let approver = require_approver(&state, &headers)?;
    let req: DecisionRequest =
        serde_json::from_slice(&body).map_err(|e| AppError::InvalidPayload(e.to_string()))?;

    let recorded = state
        .ledger
        .record_decision(req, &approver, Utc::now())
        .await?;

    Ok(Json(DecisionResponse { ok: true, recorded }))
}

/// GET /api/approvals/:id — the latest decision recorded for an id
pub async fn get_decision(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<Decision>, AppError> {
    require_approver(&state, &headers)?;
    Ok(Json(state.ledger.get_decision(&id).await?))
}
