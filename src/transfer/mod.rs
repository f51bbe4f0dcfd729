//! Transfer with idempotency
//!
//! Moves an amount between two accounts of the ledger store and journals it,
//! applying each operation id at most once.
//!
//! # Safety Invariants
//!
//! 1. **Conservation**: a committed transfer changes the sum of all balances by zero
//! 2. **Exactly once**: an operation id guards at most one committed balance change
//! 3. **All or nothing**: balances, journal rows and the operation id commit together
//! 4. **Canonical lock order**: account rows are locked in sorted id order

pub mod engine;
pub mod error;
pub mod types;
pub mod validation;

pub use engine::TransferEngine;
pub use error::TransferError;
pub use types::{TransferCommand, TransferOutcome, TransferRequest};
pub use validation::{ValidationError, validate};
