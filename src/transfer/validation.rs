//! Request validation. Runs before any store access.

use rust_decimal::Decimal;
use thiserror::Error;

use super::types::{TransferCommand, TransferRequest};
use crate::models::{BALANCE_SCALE, MAX_AMOUNT};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("fromAccountId and toAccountId are required")]
    MissingAccount,

    #[error("fromAccountId and toAccountId must differ")]
    SameAccount,

    #[error("amount must be > 0")]
    NonPositiveAmount,

    #[error("amount must have at most 2 decimal places")]
    TooManyDecimals,

    #[error("amount exceeds maximum")]
    AmountTooLarge,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

/// Check a request in fixed order: ids present, ids distinct, amount positive,
/// then the amount fits the stored column.
pub fn validate(request: TransferRequest) -> Result<TransferCommand, ValidationError> {
    let (Some(from_account_id), Some(to_account_id)) = (
        non_empty(request.from_account_id),
        non_empty(request.to_account_id),
    ) else {
        return Err(ValidationError::MissingAccount);
    };

    if from_account_id == to_account_id {
        return Err(ValidationError::SameAccount);
    }

    let amount = match request.amount {
        Some(amount) if amount > Decimal::ZERO => amount,
        _ => return Err(ValidationError::NonPositiveAmount),
    };

    if amount.normalize().scale() > BALANCE_SCALE {
        return Err(ValidationError::TooManyDecimals);
    }

    if amount > MAX_AMOUNT {
        return Err(ValidationError::AmountTooLarge);
    }

    Ok(TransferCommand {
        from_account_id,
        to_account_id,
        amount,
        operation_id: non_empty(request.operation_id),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn request(from: Option<&str>, to: Option<&str>, amount: Option<Decimal>) -> TransferRequest {
        TransferRequest {
            from_account_id: from.map(str::to_string),
            to_account_id: to.map(str::to_string),
            amount,
            operation_id: None,
        }
    }

    #[test]
    fn test_valid_request() {
        let cmd = validate(TransferRequest::new("A", "B", dec!(200), Some("op-1"))).unwrap();
        assert_eq!(cmd.from_account_id, "A");
        assert_eq!(cmd.to_account_id, "B");
        assert_eq!(cmd.amount, dec!(200));
        assert_eq!(cmd.operation_id.as_deref(), Some("op-1"));
    }

    #[test]
    fn test_missing_or_empty_ids() {
        assert_eq!(
            validate(request(None, Some("B"), Some(dec!(1)))),
            Err(ValidationError::MissingAccount)
        );
        assert_eq!(
            validate(request(Some("A"), Some(""), Some(dec!(1)))),
            Err(ValidationError::MissingAccount)
        );
    }

    #[test]
    fn test_same_account() {
        let err = validate(request(Some("A"), Some("A"), Some(dec!(10)))).unwrap_err();
        assert_eq!(err.to_string(), "fromAccountId and toAccountId must differ");
    }

    #[test]
    fn test_amount_must_be_positive() {
        for amount in [None, Some(dec!(0)), Some(dec!(-5))] {
            let err = validate(request(Some("A"), Some("B"), amount)).unwrap_err();
            assert_eq!(err.to_string(), "amount must be > 0");
        }
    }

    #[test]
    fn test_order_reports_first_failure() {
        // missing ids win over a bad amount; same ids win over a bad amount
        assert_eq!(
            validate(request(None, None, Some(dec!(0)))),
            Err(ValidationError::MissingAccount)
        );
        assert_eq!(
            validate(request(Some("A"), Some("A"), Some(dec!(0)))),
            Err(ValidationError::SameAccount)
        );
    }

    #[test]
    fn test_scale() {
        assert_eq!(
            validate(request(Some("A"), Some("B"), Some(dec!(0.001)))),
            Err(ValidationError::TooManyDecimals)
        );
        // trailing zeros do not count
        assert!(validate(request(Some("A"), Some("B"), Some(dec!(1.2500)))).is_ok());
    }

    #[test]
    fn test_amount_upper_bound() {
        assert!(validate(request(Some("A"), Some("B"), Some(MAX_AMOUNT))).is_ok());
        assert_eq!(
            validate(request(Some("A"), Some("B"), Some(dec!(10000000000000000)))),
            Err(ValidationError::AmountTooLarge)
        );
    }

    #[test]
    fn test_empty_operation_id_is_none() {
        let cmd = validate(TransferRequest::new("A", "B", dec!(1), Some(""))).unwrap();
        assert_eq!(cmd.operation_id, None);
    }
}
