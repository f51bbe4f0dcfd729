//! Transfer Error Types

use rust_decimal::Decimal;
use thiserror::Error;

use super::validation::ValidationError;
use crate::store::StoreError;

/// Rejections and failures of a transfer call.
///
/// Business rejections are returned after the unit of work was rolled back.
#[derive(Error, Debug)]
pub enum TransferError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Account not found: {0}")]
    AccountNotFound(String),

    #[error("Insufficient funds in {account}: balance {balance}, requested {amount}")]
    InsufficientFunds {
        account: String,
        balance: Decimal,
        amount: Decimal,
    },

    #[error("Store failure: {0}")]
    Store(#[from] StoreError),
}

impl TransferError {
    /// Get the error code for API responses
    pub fn code(&self) -> &'static str {
        match self {
            TransferError::Validation(_) => "VALIDATION_ERROR",
            TransferError::AccountNotFound(_) => "ACCOUNT_NOT_FOUND",
            TransferError::InsufficientFunds { .. } => "INSUFFICIENT_FUNDS",
            TransferError::Store(_) => "STORE_FAILURE",
        }
    }

    /// Get HTTP status code
    pub fn http_status(&self) -> u16 {
        match self {
            TransferError::Validation(_)
            | TransferError::AccountNotFound(_)
            | TransferError::InsufficientFunds { .. } => 400,
            TransferError::Store(_) => 500,
        }
    }

    /// Message safe to return to a caller. Store internals stay in the logs.
    pub fn public_message(&self) -> String {
        match self {
            TransferError::Validation(e) => e.to_string(),
            TransferError::AccountNotFound(_) => "account not found".to_string(),
            TransferError::InsufficientFunds { .. } => "insufficient funds".to_string(),
            TransferError::Store(_) => "database error".to_string(),
        }
    }

    /// Value of the `result` label on `transfer_requests_total`
    pub fn metric_label(&self) -> &'static str {
        match self {
            TransferError::Validation(_) => "validation_error",
            TransferError::AccountNotFound(_) => "account_not_found",
            TransferError::InsufficientFunds { .. } => "insufficient_funds",
            TransferError::Store(_) => "store_failure",
        }
    }
}
