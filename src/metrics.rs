//! Prometheus metrics for the transfer service.
//!
//! - `transfer_requests_total{result}` - one increment per transfer call
//! - `account_balance{account}` - committed balance per account

use prometheus::{Encoder, GaugeVec, IntCounterVec, Opts, Registry, TextEncoder};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;

use crate::models::Account;

/// Every value the `result` label can take
pub const RESULT_LABELS: [&str; 6] = [
    "success",
    "validation_error",
    "duplicate",
    "account_not_found",
    "insufficient_funds",
    "store_failure",
];

pub struct TransferMetrics {
    registry: Registry,
    requests_total: IntCounterVec,
    account_balance: GaugeVec,
}

impl TransferMetrics {
    /// Create the metrics in a fresh registry.
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let requests_total = IntCounterVec::new(
            Opts::new("transfer_requests_total", "Transfer calls by result"),
            &["result"],
        )?;
        registry.register(Box::new(requests_total.clone()))?;

        let account_balance = GaugeVec::new(
            Opts::new("account_balance", "Committed account balance"),
            &["account"],
        )?;
        registry.register(Box::new(account_balance.clone()))?;

        // Pre-create every series so the exposition lists zero counts too
        for result in RESULT_LABELS {
            requests_total.with_label_values(&[result]);
        }

        Ok(Self {
            registry,
            requests_total,
            account_balance,
        })
    }

    pub fn record_transfer(&self, result: &str) {
        self.requests_total.with_label_values(&[result]).inc();
    }

    pub fn transfer_count(&self, result: &str) -> u64 {
        self.requests_total.with_label_values(&[result]).get()
    }

    pub fn set_balance(&self, account_id: &str, balance: Decimal) {
        self.account_balance
            .with_label_values(&[account_id])
            .set(balance.to_f64().unwrap_or(f64::NAN));
    }

    pub fn refresh_balances(&self, accounts: &[Account]) {
        for account in accounts {
            self.set_balance(&account.id, account.balance);
        }
    }

    pub fn balance(&self, account_id: &str) -> f64 {
        self.account_balance.with_label_values(&[account_id]).get()
    }

    /// Text exposition format of every registered metric
    pub fn render(&self) -> Result<String, prometheus::Error> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_counter_increments_per_label() {
        let metrics = TransferMetrics::new().unwrap();
        metrics.record_transfer("success");
        metrics.record_transfer("success");
        metrics.record_transfer("duplicate");

        assert_eq!(metrics.transfer_count("success"), 2);
        assert_eq!(metrics.transfer_count("duplicate"), 1);
        assert_eq!(metrics.transfer_count("store_failure"), 0);
    }

    #[test]
    fn test_render_lists_all_results() {
        let metrics = TransferMetrics::new().unwrap();
        metrics.record_transfer("validation_error");
        let text = metrics.render().unwrap();

        for result in RESULT_LABELS {
            assert!(
                text.contains(&format!("transfer_requests_total{{result=\"{}\"}}", result)),
                "missing series for {}",
                result
            );
        }
        assert!(text.contains("transfer_requests_total{result=\"validation_error\"} 1"));
    }

    #[test]
    fn test_refresh_sets_gauges() {
        let metrics = TransferMetrics::new().unwrap();
        metrics.refresh_balances(&[Account::new("A", dec!(800.00)), Account::new("B", dec!(700.50))]);

        assert_eq!(metrics.balance("A"), 800.0);
        assert_eq!(metrics.balance("B"), 700.5);
        assert!(metrics.render().unwrap().contains("account_balance{account=\"B\"} 700.5"));
    }

    #[test]
    fn test_registries_are_independent() {
        let first = TransferMetrics::new().unwrap();
        let second = TransferMetrics::new().unwrap();
        first.record_transfer("success");
        assert_eq!(second.transfer_count("success"), 0);
    }
}
