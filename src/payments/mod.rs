//! Payout gateway integration module
//!
//! A gateway-neutral payout interface and the FedaPay adapter used to pay
//! withdrawals out to mobile-money accounts.

pub mod error;
pub mod providers;
pub mod traits;
pub mod types;

pub use error::{PayoutError, PayoutResult};
pub use traits::PayoutGateway;
