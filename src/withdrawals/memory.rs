//! In-memory withdrawal store
//!
//! Same transition rules as the Postgres repository, with a single mutex as
//! the transaction boundary. Used for tests and local runs without a database.

use crate::database::error::{DatabaseError, DatabaseErrorKind, DbResult};
use crate::withdrawals::store::WithdrawalStore;
use crate::withdrawals::types::{
    NewWithdrawal, PayoutOutcome, WalletSummary, WithdrawalRequest, WithdrawalSnapshot,
    WithdrawalStatus,
};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use tokio::sync::Mutex;
use tracing::debug;
use uuid::Uuid;

#[derive(Debug, Clone)]
struct Business {
    owner_id: Uuid,
    name: String,
    confirmed_incoming: i64,
}

#[derive(Debug, Default)]
struct State {
    businesses: HashMap<Uuid, Business>,
    withdrawals: HashMap<Uuid, WithdrawalRequest>,
    /// Insertion order, oldest first
    order: Vec<Uuid>,
}

impl State {
    fn owned_business(&self, caller: Uuid, business_id: Uuid) -> DbResult<&Business> {
        self.businesses
            .get(&business_id)
            .filter(|business| business.owner_id == caller)
            .ok_or_else(|| DatabaseError::not_found("Business", business_id))
    }

    /// Amount held or paid out by every request of the business except `skip`
    fn committed(&self, business_id: Uuid, skip: Option<Uuid>) -> i64 {
        self.withdrawals
            .values()
            .filter(|w| w.business_id == business_id && Some(w.id) != skip)
            .filter(|w| w.status.is_reserved() || w.status == WithdrawalStatus::Succeeded)
            .map(|w| w.amount)
            .sum()
    }

    fn transition(&mut self, withdrawal_id: Uuid, next: WithdrawalStatus) -> Option<&mut WithdrawalRequest> {
        let row = self.withdrawals.get_mut(&withdrawal_id)?;
        if !row.status.can_transition_to(next) {
            debug!(
                "Rejected transition {} -> {} for withdrawal {}",
                row.status, next, withdrawal_id
            );
            return None;
        }
        row.status = next;
        row.updated_at = Utc::now();
        Some(row)
    }
}

#[derive(Debug, Default)]
pub struct InMemoryWithdrawalStore {
    state: Mutex<State>,
}

impl InMemoryWithdrawalStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a business owned by `owner_id`
    pub async fn add_business(&self, owner_id: Uuid, name: &str) -> Uuid {
        let id = Uuid::new_v4();
        self.state.lock().await.businesses.insert(
            id,
            Business {
                owner_id,
                name: name.to_string(),
                confirmed_incoming: 0,
            },
        );
        id
    }

    /// Record a successful incoming payment
    pub async fn record_payment(&self, business_id: Uuid, amount: i64) -> DbResult<()> {
        let mut state = self.state.lock().await;
        let business = state
            .businesses
            .get_mut(&business_id)
            .ok_or_else(|| DatabaseError::not_found("Business", business_id))?;
        business.confirmed_incoming += amount;
        Ok(())
    }

    pub async fn get(&self, withdrawal_id: Uuid) -> Option<WithdrawalRequest> {
        self.state.lock().await.withdrawals.get(&withdrawal_id).cloned()
    }
}

#[async_trait]
impl WithdrawalStore for InMemoryWithdrawalStore {
    async fn create_withdrawal(&self, caller: Uuid, request: NewWithdrawal) -> DbResult<Uuid> {
        if request.amount <= 0 {
            return Err(DatabaseError::new(DatabaseErrorKind::InvalidAmount {
                amount: request.amount,
            }));
        }
        let phone = request.destination_phone.trim().to_string();
        if phone.is_empty() {
            return Err(DatabaseError::new(DatabaseErrorKind::MissingDestination));
        }

        let mut state = self.state.lock().await;
        let business = state.owned_business(caller, request.business_id)?;
        let available = business.confirmed_incoming - state.committed(request.business_id, None);
        if request.amount > available {
            return Err(DatabaseError::new(DatabaseErrorKind::InsufficientBalance {
                available,
                required: request.amount,
            }));
        }

        let now = Utc::now();
        let id = Uuid::new_v4();
        state.withdrawals.insert(
            id,
            WithdrawalRequest {
                id,
                business_id: request.business_id,
                amount: request.amount,
                destination_phone: phone,
                destination_name: request.normalized_name(),
                status: WithdrawalStatus::Pending,
                provider_reference: None,
                provider_payload: None,
                failure_reason: None,
                requested_at: now,
                processed_at: None,
                created_at: now,
                updated_at: now,
            },
        );
        state.order.push(id);
        Ok(id)
    }

    async fn cancel_withdrawal(&self, caller: Uuid, withdrawal_id: Uuid) -> DbResult<()> {
        let mut state = self.state.lock().await;
        let cancelable = state
            .withdrawals
            .get(&withdrawal_id)
            .filter(|w| w.status.is_cancelable())
            .map(|w| state.owned_business(caller, w.business_id).is_ok())
            .unwrap_or(false);

        if !cancelable {
            return Err(DatabaseError::not_found("Withdrawal", withdrawal_id));
        }

        let row = state
            .transition(withdrawal_id, WithdrawalStatus::Canceled)
            .ok_or_else(|| DatabaseError::not_found("Withdrawal", withdrawal_id))?;
        row.processed_at = Some(Utc::now());
        Ok(())
    }

    async fn prepare_for_processing(
        &self,
        withdrawal_id: Uuid,
        caller: Uuid,
    ) -> DbResult<Option<WithdrawalSnapshot>> {
        let mut state = self.state.lock().await;

        let Some(row) = state.withdrawals.get(&withdrawal_id) else {
            return Ok(None);
        };
        if !row.status.is_processable() {
            return Ok(None);
        }
        let (business_id, amount) = (row.business_id, row.amount);
        let Ok(business) = state.owned_business(caller, business_id) else {
            return Ok(None);
        };
        let business_name = business.name.clone();

        let available = business.confirmed_incoming - state.committed(business_id, Some(withdrawal_id));
        if amount > available {
            return Err(DatabaseError::new(DatabaseErrorKind::InsufficientBalance {
                available,
                required: amount,
            }));
        }

        let Some(row) = state.transition(withdrawal_id, WithdrawalStatus::Processing) else {
            return Ok(None);
        };
        row.failure_reason = None;
        row.processed_at = Some(Utc::now());

        Ok(Some(WithdrawalSnapshot {
            withdrawal_id,
            business_id,
            business_name,
            amount: row.amount,
            destination_phone: row.destination_phone.clone(),
            destination_name: row.destination_name.clone(),
        }))
    }

    async fn mark_succeeded(&self, withdrawal_id: Uuid, outcome: &PayoutOutcome) -> DbResult<bool> {
        let mut state = self.state.lock().await;
        Ok(match state.transition(withdrawal_id, WithdrawalStatus::Succeeded) {
            Some(row) => {
                row.provider_reference = Some(outcome.provider_reference.clone());
                row.provider_payload = Some(outcome.provider_payload.clone());
                row.failure_reason = None;
                row.processed_at = Some(Utc::now());
                true
            }
            None => false,
        })
    }

    async fn mark_failed(&self, withdrawal_id: Uuid, reason: &str) -> DbResult<bool> {
        let mut state = self.state.lock().await;
        Ok(match state.transition(withdrawal_id, WithdrawalStatus::Failed) {
            Some(row) => {
                row.failure_reason = Some(reason.to_string());
                row.processed_at = Some(Utc::now());
                true
            }
            None => false,
        })
    }

    async fn wallet_summary(&self, caller: Uuid, business_id: Uuid) -> DbResult<WalletSummary> {
        let state = self.state.lock().await;
        let business = state.owned_business(caller, business_id)?;

        let mut reserved = 0;
        let mut withdrawn = 0;
        for row in state.withdrawals.values().filter(|w| w.business_id == business_id) {
            if row.status.is_reserved() {
                reserved += row.amount;
            } else if row.status == WithdrawalStatus::Succeeded {
                withdrawn += row.amount;
            }
        }

        let default_phone = state
            .order
            .iter()
            .rev()
            .filter_map(|id| state.withdrawals.get(id))
            .find(|w| w.business_id == business_id)
            .map(|w| w.destination_phone.clone());

        Ok(WalletSummary::from_totals(
            business_id,
            business.confirmed_incoming,
            reserved,
            withdrawn,
            default_phone,
        ))
    }

    async fn list_withdrawals(
        &self,
        caller: Uuid,
        business_id: Uuid,
    ) -> DbResult<Vec<WithdrawalRequest>> {
        let state = self.state.lock().await;
        state.owned_business(caller, business_id)?;

        Ok(state
            .order
            .iter()
            .rev()
            .filter_map(|id| state.withdrawals.get(id))
            .filter(|w| w.business_id == business_id)
            .cloned()
            .collect())
    }
}
