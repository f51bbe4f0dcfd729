//! Gateway response DTOs

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::Serialize;
use utoipa::ToSchema;

use crate::models::{Account, LedgerEntry};
use crate::state_reader::StateSnapshot;
use crate::transfer::TransferOutcome;

/// Body of every `POST /transfer` response, and of gateway errors
#[derive(Debug, Serialize, ToSchema)]
pub struct TransferResponse {
    /// `ok` or `error`
    #[schema(example = "ok")]
    pub status: String,
    #[schema(example = "transfer completed")]
    pub message: String,
    /// Post-commit balances of both accounts; only on a completed transfer
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<std::collections::HashMap<String, f64>>, example = json!({"A": 800.0, "B": 700.0}))]
    pub balances: Option<BTreeMap<String, Decimal>>,
}

impl TransferResponse {
    pub fn ok(message: impl Into<String>, balances: Option<BTreeMap<String, Decimal>>) -> Self {
        Self {
            status: "ok".to_string(),
            message: message.into(),
            balances,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: "error".to_string(),
            message: message.into(),
            balances: None,
        }
    }
}

impl From<TransferOutcome> for TransferResponse {
    fn from(outcome: TransferOutcome) -> Self {
        let message = outcome.message();
        match outcome {
            TransferOutcome::Completed { balances } => Self::ok(message, Some(balances)),
            TransferOutcome::AlreadyProcessed => Self::ok(message, None),
        }
    }
}

/// `GET /debug/state` body
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DebugStateResponse {
    pub accounts: BTreeMap<String, Account>,
    /// Newest first
    pub ledger: Vec<LedgerEntry>,
    /// Newest first
    #[schema(example = json!(["op-2", "op-1"]))]
    pub processed_ops: Vec<String>,
}

impl From<StateSnapshot> for DebugStateResponse {
    fn from(snapshot: StateSnapshot) -> Self {
        Self {
            accounts: snapshot.accounts,
            ledger: snapshot.ledger,
            processed_ops: snapshot.processed_ops,
        }
    }
}

/// `GET /health` body
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    #[schema(example = "ok")]
    pub status: String,
    /// Build revision; omitted when unhealthy
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(example = "a1b2c3d")]
    pub version: Option<String>,
}
