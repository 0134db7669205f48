use crate::database::error::DbResult;
use crate::withdrawals::types::{
    NewWithdrawal, PayoutOutcome, WalletSummary, WithdrawalRequest, WithdrawalSnapshot,
};
use async_trait::async_trait;
use uuid::Uuid;

/// Persistence seam for withdrawal requests and the wallet ledger view.
///
/// Every status change is a compare-and-swap on the current status, so two
/// callers racing on the same request can never both win.
#[async_trait]
pub trait WithdrawalStore: Send + Sync {
    /// Insert a `pending` request for a business the caller owns.
    ///
    /// Rejects non-positive amounts, a blank phone, and amounts above the
    /// available balance.
    async fn create_withdrawal(&self, caller: Uuid, request: NewWithdrawal) -> DbResult<Uuid>;

    /// `pending | failed → canceled`; NotFound when no eligible row matches
    async fn cancel_withdrawal(&self, caller: Uuid, withdrawal_id: Uuid) -> DbResult<()>;

    /// Atomic reservation point: verify ownership, re-check the balance,
    /// flip `pending | failed → processing` and clear `failure_reason`.
    ///
    /// `Ok(None)` when the request is missing, not owned by the caller, or
    /// not in a processable state.
    async fn prepare_for_processing(
        &self,
        withdrawal_id: Uuid,
        caller: Uuid,
    ) -> DbResult<Option<WithdrawalSnapshot>>;

    /// `processing → succeeded`; `false` when the row was no longer processing
    async fn mark_succeeded(&self, withdrawal_id: Uuid, outcome: &PayoutOutcome) -> DbResult<bool>;

    /// `processing → failed`; `false` when the row was no longer processing
    async fn mark_failed(&self, withdrawal_id: Uuid, reason: &str) -> DbResult<bool>;

    /// Wallet aggregates, recomputed on every call
    async fn wallet_summary(&self, caller: Uuid, business_id: Uuid) -> DbResult<WalletSummary>;

    /// Requests of a business, newest first
    async fn list_withdrawals(
        &self,
        caller: Uuid,
        business_id: Uuid,
    ) -> DbResult<Vec<WithdrawalRequest>>;
}
