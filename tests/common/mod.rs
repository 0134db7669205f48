//! Shared fixtures for the integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use moneymaker_backend::auth::{Authenticator, CallerIdentity, Session, SessionGuard, SessionProvider};
use moneymaker_backend::error::{AuthError, AuthResult};
use moneymaker_backend::payments::PayoutGateway;
use moneymaker_backend::withdrawals::memory::InMemoryWithdrawalStore;
use moneymaker_backend::withdrawals::types::NewWithdrawal;
use moneymaker_backend::withdrawals::{WithdrawalOrchestrator, WithdrawalStore};
use std::sync::Arc;
use uuid::Uuid;

/// Any JWT-shaped token belongs to the same user
pub struct FixedUser(pub Uuid);

#[async_trait]
impl Authenticator for FixedUser {
    async fn authenticate(&self, access_token: &str) -> AuthResult<CallerIdentity> {
        if access_token == "bad.token.value" {
            return Err(AuthError::InvalidSession);
        }
        Ok(CallerIdentity { user_id: self.0 })
    }
}

pub struct NoRefresh;

#[async_trait]
impl SessionProvider for NoRefresh {
    async fn refresh_session(&self, _current: &Session) -> AuthResult<Session> {
        Err(AuthError::SessionExpired)
    }
}

/// Token without a readable `exp` claim, so the guard never refreshes it
pub const TOKEN: &str = "header.payload.signature";

pub fn session() -> Session {
    Session::from_bearer(TOKEN)
}

pub struct Fixture {
    pub store: Arc<InMemoryWithdrawalStore>,
    pub orchestrator: Arc<WithdrawalOrchestrator>,
    pub owner: Uuid,
    pub business_id: Uuid,
}

impl Fixture {
    /// A business with `balance` confirmed incoming, paid out through `gateway`
    pub async fn new(gateway: Arc<dyn PayoutGateway>, balance: i64) -> Self {
        let owner = Uuid::new_v4();
        let store = Arc::new(InMemoryWithdrawalStore::new());
        let business_id = store.add_business(owner, "Boutique Awa").await;
        store.record_payment(business_id, balance).await.unwrap();

        let orchestrator = Arc::new(WithdrawalOrchestrator::new(
            store.clone(),
            gateway,
            Arc::new(FixedUser(owner)),
            SessionGuard::new(Arc::new(NoRefresh)),
        ));

        Self {
            store,
            orchestrator,
            owner,
            business_id,
        }
    }

    pub async fn request(&self, amount: i64, phone: &str) -> Uuid {
        self.store
            .create_withdrawal(
                self.owner,
                NewWithdrawal {
                    business_id: self.business_id,
                    amount,
                    destination_phone: phone.to_string(),
                    destination_name: None,
                },
            )
            .await
            .unwrap()
    }
}
