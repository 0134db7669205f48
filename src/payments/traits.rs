//! Payout gateway trait definitions

use crate::payments::error::PayoutResult;
use crate::payments::types::{CreatedPayout, StartedPayout};
use crate::withdrawals::types::WithdrawalSnapshot;
use async_trait::async_trait;

/// Two-step payout to a mobile-money account
///
/// Implementations translate a reserved withdrawal into the gateway's wire
/// format and normalize both success and error shapes.
#[async_trait]
pub trait PayoutGateway: Send + Sync {
    /// Create the payout
    ///
    /// Resolves country and payout mode from the snapshot, so a missing live
    /// payout mode fails here before any request is sent.
    ///
    /// # Returns
    /// * `CreatedPayout` - gateway id plus the raw creation body
    async fn create_payout(&self, snapshot: &WithdrawalSnapshot) -> PayoutResult<CreatedPayout>;

    /// Start moving funds for a created payout
    ///
    /// # Returns
    /// * `StartedPayout` - the provider reference to persist
    async fn start_payout(
        &self,
        payout: &CreatedPayout,
        snapshot: &WithdrawalSnapshot,
    ) -> PayoutResult<StartedPayout>;

    /// Short provider name for logs
    fn name(&self) -> &'static str;
}
