use std::sync::Arc;

use axum::{Json, extract::State, http::StatusCode};

use super::super::state::AppState;
use super::super::types::{DebugStateResponse, TransferResponse};

/// Current balances, recent journal rows and recent operation ids
///
/// GET /debug/state
#[utoipa::path(
    get,
    path = "/debug/state",
    responses(
        (status = 200, description = "Ledger snapshot", body = DebugStateResponse),
        (status = 500, description = "Store failure", body = TransferResponse)
    ),
    tag = "Debug"
)]
pub async fn debug_state(
    State(state): State<Arc<AppState>>,
) -> Result<Json<DebugStateResponse>, (StatusCode, Json<TransferResponse>)> {
    match state.reader.snapshot().await {
        Ok(snapshot) => Ok(Json(snapshot.into())),
        Err(e) => {
            tracing::error!(kind = e.kind(), "State read failed: {}", e);
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(TransferResponse::error("database error")),
            ))
        }
    }
}
