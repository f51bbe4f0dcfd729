//! HTTP handlers

pub mod debug;
pub mod health;
pub mod transfer;

pub use debug::debug_state;
pub use health::{health_check, metrics};
pub use transfer::create_transfer;
