//! Transfer request and outcome types

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::Deserialize;
use utoipa::ToSchema;

/// Transfer request as received from a caller.
///
/// Every field is optional at this stage so that a missing field is reported
/// as a validation error instead of a parse failure.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct TransferRequest {
    #[schema(example = "A")]
    pub from_account_id: Option<String>,
    #[schema(example = "B")]
    pub to_account_id: Option<String>,
    #[schema(value_type = Option<f64>, example = 200.0)]
    pub amount: Option<Decimal>,
    /// Idempotency key; an empty string means none
    #[schema(example = "op-1")]
    pub operation_id: Option<String>,
}

impl TransferRequest {
    pub fn new(from: &str, to: &str, amount: Decimal, operation_id: Option<&str>) -> Self {
        Self {
            from_account_id: Some(from.to_string()),
            to_account_id: Some(to.to_string()),
            amount: Some(amount),
            operation_id: operation_id.map(str::to_string),
        }
    }
}

/// Transfer that passed validation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferCommand {
    pub from_account_id: String,
    pub to_account_id: String,
    pub amount: Decimal,
    pub operation_id: Option<String>,
}

impl TransferCommand {
    /// Both account ids in the order their row locks are taken.
    ///
    /// The order depends only on the ids, never on the transfer direction,
    /// so A->B and B->A contend for the same first lock.
    pub fn lock_order(&self) -> [&str; 2] {
        let (from, to) = (self.from_account_id.as_str(), self.to_account_id.as_str());
        if from <= to { [from, to] } else { [to, from] }
    }
}

/// Non-error result of a transfer call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferOutcome {
    /// Funds moved; balances after commit keyed by account id
    Completed { balances: BTreeMap<String, Decimal> },
    /// The operation id was recorded by an earlier transfer; nothing changed
    AlreadyProcessed,
}

impl TransferOutcome {
    pub fn message(&self) -> &'static str {
        match self {
            TransferOutcome::Completed { .. } => "transfer completed",
            TransferOutcome::AlreadyProcessed => "operation already processed",
        }
    }

    pub fn metric_label(&self) -> &'static str {
        match self {
            TransferOutcome::Completed { .. } => "success",
            TransferOutcome::AlreadyProcessed => "duplicate",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn command(from: &str, to: &str) -> TransferCommand {
        TransferCommand {
            from_account_id: from.to_string(),
            to_account_id: to.to_string(),
            amount: dec!(1),
            operation_id: None,
        }
    }

    #[test]
    fn test_lock_order_ignores_direction() {
        assert_eq!(command("A", "B").lock_order(), ["A", "B"]);
        assert_eq!(command("B", "A").lock_order(), ["A", "B"]);
    }

    #[test]
    fn test_request_parses_camel_case_and_missing_fields() {
        let req: TransferRequest =
            serde_json::from_str(r#"{"fromAccountId":"A","amount":200.5}"#).unwrap();
        assert_eq!(req.from_account_id.as_deref(), Some("A"));
        assert_eq!(req.to_account_id, None);
        assert_eq!(req.amount, Some(dec!(200.5)));
        assert_eq!(req.operation_id, None);
    }

    #[test]
    fn test_float_amount_keeps_decimal_digits() {
        let req: TransferRequest = serde_json::from_str(r#"{"amount":0.1}"#).unwrap();
        assert_eq!(req.amount, Some(dec!(0.1)));
    }

    #[test]
    fn test_outcome_messages() {
        assert_eq!(TransferOutcome::AlreadyProcessed.message(), "operation already processed");
        let done = TransferOutcome::Completed {
            balances: BTreeMap::new(),
        };
        assert_eq!(done.message(), "transfer completed");
        assert_eq!(done.metric_label(), "success");
    }
}
