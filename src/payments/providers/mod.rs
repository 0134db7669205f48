//! Payout gateway implementations
//!
//! Concrete implementations of the PayoutGateway trait.

pub mod fedapay;

pub use fedapay::{FedaPayConfig, FedaPayProvider};
