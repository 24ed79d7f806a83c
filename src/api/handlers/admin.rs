use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::api::response::{ApiError, AppQuery, JSend};
use crate::storage::{AuditAction, AuditEvent};
use crate::vault::IndexStats;
use crate::AppState;

// ============================================================================
// Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

#[derive(Debug, Deserialize)]
pub struct AuditParams {
    #[serde(default = "default_audit_limit")]
    pub limit: u32,
}

fn default_audit_limit() -> u32 {
    100
}

#[derive(Debug, Serialize)]
pub struct AuditEventResponse {
    pub action: AuditAction,
    pub allowed: bool,
    pub file_id: String,
    pub seq: u64,
    pub timestamp: String,
    pub user: String,
}

// ============================================================================
// Handlers
// ============================================================================

pub async fn health() -> Json<JSend<HealthResponse>> {
    JSend::success(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

pub async fn index_stats(
    State(state): State<Arc<AppState>>,
) -> Result<Json<JSend<IndexStats>>, ApiError> {
    Ok(JSend::success(state.vault.index_stats()?))
}

/// Recent access decisions, newest first.
pub async fn list_audit(
    State(state): State<Arc<AppState>>,
    AppQuery(params): AppQuery<AuditParams>,
) -> Result<Json<JSend<Vec<AuditEventResponse>>>, ApiError> {
    if params.limit == 0 {
        return Err(ApiError::bad_request("limit must be greater than 0"));
    }

    let events = state
        .vault
        .list_audit(params.limit as usize)?
        .iter()
        .map(event_to_response)
        .collect();

    Ok(JSend::success(events))
}

fn event_to_response(event: &AuditEvent) -> AuditEventResponse {
    AuditEventResponse {
        action: event.action,
        allowed: event.allowed,
        file_id: event.file_id.clone(),
        seq: event.seq,
        timestamp: event.timestamp.to_rfc3339(),
        user: event.user.clone(),
    }
}
