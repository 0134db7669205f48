//! Withdrawal requests: lifecycle types, the store seam, and the orchestrator
//! that moves a request through the payout gateway.

pub mod memory;
pub mod orchestrator;
pub mod store;
pub mod types;

pub use orchestrator::WithdrawalOrchestrator;
pub use store::WithdrawalStore;
pub use types::{WithdrawalRequest, WithdrawalSnapshot, WithdrawalStatus};
