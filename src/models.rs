//! Ledger data model: accounts, journal entries and processed operations.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Decimal places carried by every stored balance and amount.
pub const BALANCE_SCALE: u32 = 2;

/// Largest value a `NUMERIC(18, 2)` column holds: 9999999999999999.99
pub const MAX_AMOUNT: Decimal = Decimal::from_parts(2_808_348_671, 232_830_643, 0, false, 2);

/// Account row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Account {
    pub id: String,
    #[schema(value_type = f64, example = 1000.0)]
    pub balance: Decimal,
}

impl Account {
    pub fn new(id: impl Into<String>, balance: Decimal) -> Self {
        Self {
            id: id.into(),
            balance,
        }
    }
}

/// Side of a journal entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum EntryType {
    Debit,
    Credit,
}

impl EntryType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryType::Debit => "DEBIT",
            EntryType::Credit => "CREDIT",
        }
    }
}

impl fmt::Display for EntryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntryType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "DEBIT" => Ok(EntryType::Debit),
            "CREDIT" => Ok(EntryType::Credit),
            other => Err(format!("unknown ledger entry type: {}", other)),
        }
    }
}

/// Journal row as written by a transfer (id is assigned by the store).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewLedgerEntry {
    pub entry_type: EntryType,
    pub account_id: String,
    pub amount: Decimal,
    pub at: DateTime<Utc>,
}

impl NewLedgerEntry {
    /// Build the DEBIT/CREDIT pair for one transfer. Both legs share `amount` and `at`.
    pub fn pair(
        from_account_id: &str,
        to_account_id: &str,
        amount: Decimal,
        at: DateTime<Utc>,
    ) -> [NewLedgerEntry; 2] {
        [
            NewLedgerEntry {
                entry_type: EntryType::Debit,
                account_id: from_account_id.to_string(),
                amount,
                at,
            },
            NewLedgerEntry {
                entry_type: EntryType::Credit,
                account_id: to_account_id.to_string(),
                amount,
                at,
            },
        ]
    }
}

/// Committed journal row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LedgerEntry {
    #[serde(skip)]
    pub id: i64,
    #[serde(rename = "type")]
    pub entry_type: EntryType,
    pub account_id: String,
    #[schema(value_type = f64, example = 200.0)]
    pub amount: Decimal,
    pub at: DateTime<Utc>,
}

/// Idempotency key recorded by a committed transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessedOperation {
    pub operation_id: String,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_max_amount_matches_column() {
        assert_eq!(MAX_AMOUNT, dec!(9999999999999999.99));
    }

    #[test]
    fn test_entry_type_round_trips_through_str() {
        assert_eq!("DEBIT".parse::<EntryType>(), Ok(EntryType::Debit));
        assert_eq!(EntryType::Credit.to_string(), "CREDIT");
        assert!("debit".parse::<EntryType>().is_err());
    }

    #[test]
    fn test_pair_shares_amount_and_timestamp() {
        let at = Utc::now();
        let [debit, credit] = NewLedgerEntry::pair("A", "B", dec!(12.50), at);

        assert_eq!(debit.entry_type, EntryType::Debit);
        assert_eq!(debit.account_id, "A");
        assert_eq!(credit.entry_type, EntryType::Credit);
        assert_eq!(credit.account_id, "B");
        assert_eq!(debit.amount, credit.amount);
        assert_eq!(debit.at, credit.at);
    }

    #[test]
    fn test_ledger_entry_serializes_camel_case() {
        let entry = LedgerEntry {
            id: 7,
            entry_type: EntryType::Debit,
            account_id: "A".to_string(),
            amount: dec!(200.00),
            at: Utc::now(),
        };
        let json = serde_json::to_value(&entry).unwrap();

        assert_eq!(json["type"], "DEBIT");
        assert_eq!(json["accountId"], "A");
        assert_eq!(json["amount"], 200.0);
        assert!(json.get("id").is_none());
    }
}
