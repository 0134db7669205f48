//! Withdrawal orchestrator
//!
//! Drives one withdrawal request through the payout gateway and persists the
//! outcome. The store's prepare step is the only serialization point; the
//! orchestrator itself holds no locks.

use crate::auth::session::{Session, SessionGuard};
use crate::auth::{Authenticator, CallerIdentity};
use crate::error::{WithdrawalError, WithdrawalResult};
use crate::payments::traits::PayoutGateway;
use crate::withdrawals::store::WithdrawalStore;
use crate::withdrawals::types::{PayoutOutcome, ProcessOutcome, WithdrawalSnapshot};
use serde_json::json;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

pub struct WithdrawalOrchestrator {
    store: Arc<dyn WithdrawalStore>,
    gateway: Arc<dyn PayoutGateway>,
    authenticator: Arc<dyn Authenticator>,
    guard: SessionGuard,
}

impl WithdrawalOrchestrator {
    pub fn new(
        store: Arc<dyn WithdrawalStore>,
        gateway: Arc<dyn PayoutGateway>,
        authenticator: Arc<dyn Authenticator>,
        guard: SessionGuard,
    ) -> Self {
        Self {
            store,
            gateway,
            authenticator,
            guard,
        }
    }

    pub fn store(&self) -> &Arc<dyn WithdrawalStore> {
        &self.store
    }

    /// Resolve the caller behind a live session
    pub async fn authorize(&self, session: &Session) -> WithdrawalResult<CallerIdentity> {
        let token = self.guard.ensure_live_token(session).await?;
        Ok(self.authenticator.authenticate(&token).await?)
    }

    /// Process one withdrawal request for the caller.
    ///
    /// Auth and prepare failures leave the row untouched. Once the row is
    /// `processing`, every error is paired with a best-effort `failed` write
    /// carrying the same message before it is returned.
    #[instrument(skip_all, fields(withdrawal_id = %withdrawal_id))]
    pub async fn process(
        &self,
        withdrawal_id: Uuid,
        session: &Session,
    ) -> WithdrawalResult<ProcessOutcome> {
        let caller = self.authorize(session).await?;

        let snapshot = self
            .store
            .prepare_for_processing(withdrawal_id, caller.user_id)
            .await
            .map_err(|e| {
                warn!("Prepare step failed: {}", e);
                WithdrawalError::Prepare(e.to_string())
            })?
            .ok_or(WithdrawalError::NotFound)?;

        info!(
            "Withdrawal reserved for processing: business_id={} amount={} gateway={}",
            snapshot.business_id,
            snapshot.amount,
            self.gateway.name()
        );

        let outcome = match self.pay_out(&snapshot).await {
            Ok(outcome) => outcome,
            Err(err) => return Err(self.record_failure(&snapshot, err).await),
        };

        match self.store.mark_succeeded(withdrawal_id, &outcome).await {
            Ok(true) => {
                info!(
                    "Withdrawal succeeded: provider_reference={}",
                    outcome.provider_reference
                );
            }
            Ok(false) => {
                // The payout went through; the row was finalized elsewhere
                warn!(
                    "Withdrawal was no longer processing at finalize: provider_reference={}",
                    outcome.provider_reference
                );
            }
            Err(e) => {
                let err = WithdrawalError::Persistence(e.to_string());
                return Err(self.record_failure(&snapshot, err).await);
            }
        }

        Ok(ProcessOutcome {
            success: true,
            withdrawal_id,
            provider_reference: outcome.provider_reference,
        })
    }

    async fn pay_out(&self, snapshot: &WithdrawalSnapshot) -> WithdrawalResult<PayoutOutcome> {
        let created = self.gateway.create_payout(snapshot).await?;
        let started = self.gateway.start_payout(&created, snapshot).await?;

        Ok(PayoutOutcome {
            provider_reference: started.reference,
            provider_payload: json!({
                "created": created.raw,
                "started": started.raw,
            }),
        })
    }

    async fn record_failure(
        &self,
        snapshot: &WithdrawalSnapshot,
        err: WithdrawalError,
    ) -> WithdrawalError {
        let reason = err.to_string();
        warn!("Withdrawal failed: {}", reason);

        match self.store.mark_failed(snapshot.withdrawal_id, &reason).await {
            Ok(true) => {}
            Ok(false) => warn!("Failure not recorded, withdrawal no longer processing"),
            Err(e) => error!("Failed to record withdrawal failure: {}", e),
        }

        err
    }
}
