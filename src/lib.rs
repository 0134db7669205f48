//! MoneyMaker withdrawal backend
//!
//! Moves a business's confirmed mobile-money balance out to a phone number
//! through the FedaPay payout gateway.

pub mod api;
pub mod auth;
pub mod config;
pub mod database;
pub mod error;
pub mod payments;
pub mod withdrawals;

pub use error::{AuthError, WithdrawalError, WithdrawalResult};
