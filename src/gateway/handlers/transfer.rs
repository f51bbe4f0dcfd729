//! Transfer handler

use std::sync::Arc;

use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
};

use super::super::state::AppState;
use super::super::types::TransferResponse;
use crate::transfer::TransferRequest;

/// Move funds between two accounts
///
/// POST /transfer
///
/// A body that does not parse is answered with `invalid json` and does not
/// count as a transfer call.
#[utoipa::path(
    post,
    path = "/transfer",
    request_body = TransferRequest,
    responses(
        (status = 200, description = "Transfer completed or operation already processed", body = TransferResponse),
        (status = 400, description = "Invalid json, validation error, account not found or insufficient funds", body = TransferResponse),
        (status = 500, description = "Store failure", body = TransferResponse)
    ),
    tag = "Transfer"
)]
pub async fn create_transfer(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<TransferRequest>, JsonRejection>,
) -> (StatusCode, Json<TransferResponse>) {
    let request = match payload {
        Ok(Json(request)) => request,
        Err(rejection) => {
            tracing::debug!("Rejected transfer body: {}", rejection.body_text());
            return (
                StatusCode::BAD_REQUEST,
                Json(TransferResponse::error("invalid json")),
            );
        }
    };

    match state.engine.transfer(request).await {
        Ok(outcome) => (StatusCode::OK, Json(outcome.into())),
        Err(e) => {
            let status = StatusCode::from_u16(e.http_status())
                .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            (status, Json(TransferResponse::error(e.public_message())))
        }
    }
}
