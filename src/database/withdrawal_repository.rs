use crate::database::error::{DatabaseError, DatabaseErrorKind, DbResult};
use crate::database::transaction::DatabaseTransaction;
use crate::database::wallet_repository::{ledger_totals, WalletRepository};
use crate::withdrawals::store::WithdrawalStore;
use crate::withdrawals::types::{
    NewWithdrawal, PayoutOutcome, WalletSummary, WithdrawalRequest, WithdrawalSnapshot,
};
use async_trait::async_trait;
use sqlx::PgPool;
use tracing::{debug, info, warn};
use uuid::Uuid;

const WITHDRAWAL_COLUMNS: &str = "w.id, w.business_id, w.amount, w.destination_phone, w.destination_name, \
     w.status, w.provider_reference, w.provider_payload, w.failure_reason, \
     w.requested_at, w.processed_at, w.created_at, w.updated_at";

/// Postgres-backed withdrawal store.
///
/// Status changes are single `UPDATE ... WHERE status ...` statements; the
/// affected-row count tells whether this caller won the transition.
pub struct WithdrawalRepository {
    pool: PgPool,
    wallets: WalletRepository,
}

impl WithdrawalRepository {
    pub fn new(pool: PgPool) -> Self {
        Self {
            wallets: WalletRepository::new(pool.clone()),
            pool,
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn ensure_owner(&self, caller: Uuid, business_id: Uuid) -> DbResult<()> {
        let owned: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM businesses WHERE id = $1 AND owner_id = $2)",
        )
        .bind(business_id)
        .bind(caller)
        .fetch_one(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        if owned {
            Ok(())
        } else {
            Err(DatabaseError::not_found("Business", business_id))
        }
    }
}

#[async_trait]
impl WithdrawalStore for WithdrawalRepository {
    async fn create_withdrawal(&self, caller: Uuid, request: NewWithdrawal) -> DbResult<Uuid> {
        if request.amount <= 0 {
            return Err(DatabaseError::new(DatabaseErrorKind::InvalidAmount {
                amount: request.amount,
            }));
        }
        let phone = request.destination_phone.trim();
        if phone.is_empty() {
            return Err(DatabaseError::new(DatabaseErrorKind::MissingDestination));
        }

        let mut tx = DatabaseTransaction::begin(&self.pool).await?;

        // Serializes concurrent requests of the same business
        let locked: Option<Uuid> = sqlx::query_scalar(
            "SELECT id FROM businesses WHERE id = $1 AND owner_id = $2 FOR UPDATE",
        )
        .bind(request.business_id)
        .bind(caller)
        .fetch_optional(tx.conn()?)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        if locked.is_none() {
            tx.rollback().await?;
            return Err(DatabaseError::not_found("Business", request.business_id));
        }

        let totals = ledger_totals(tx.conn()?, request.business_id, None).await?;
        if request.amount > totals.available() {
            tx.rollback().await?;
            return Err(DatabaseError::new(DatabaseErrorKind::InsufficientBalance {
                available: totals.available(),
                required: request.amount,
            }));
        }

        let id: Uuid = sqlx::query_scalar(
            "INSERT INTO withdrawal_requests (business_id, amount, destination_phone, destination_name, status)
             VALUES ($1, $2, $3, $4, 'pending')
             RETURNING id",
        )
        .bind(request.business_id)
        .bind(request.amount)
        .bind(phone)
        .bind(request.normalized_name())
        .fetch_one(tx.conn()?)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        tx.commit().await?;

        info!(
            "Withdrawal request created: id={} business_id={} amount={}",
            id, request.business_id, request.amount
        );
        Ok(id)
    }

    async fn cancel_withdrawal(&self, caller: Uuid, withdrawal_id: Uuid) -> DbResult<()> {
        let result = sqlx::query(
            "UPDATE withdrawal_requests w
             SET status = 'canceled', processed_at = NOW(), updated_at = NOW()
             FROM businesses b
             WHERE w.id = $1 AND w.business_id = b.id AND b.owner_id = $2
               AND w.status IN ('pending', 'failed')",
        )
        .bind(withdrawal_id)
        .bind(caller)
        .execute(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::not_found("Withdrawal", withdrawal_id));
        }

        info!("Withdrawal request canceled: id={}", withdrawal_id);
        Ok(())
    }

    async fn prepare_for_processing(
        &self,
        withdrawal_id: Uuid,
        caller: Uuid,
    ) -> DbResult<Option<WithdrawalSnapshot>> {
        let mut tx = DatabaseTransaction::begin(&self.pool).await?;

        // A second caller blocks here, then sees the row already processing
        let eligible: Option<(Uuid, i64)> = sqlx::query_as(
            "SELECT w.business_id, w.amount
             FROM withdrawal_requests w
             JOIN businesses b ON b.id = w.business_id
             WHERE w.id = $1 AND b.owner_id = $2 AND w.status IN ('pending', 'failed')
             FOR UPDATE OF b, w",
        )
        .bind(withdrawal_id)
        .bind(caller)
        .fetch_optional(tx.conn()?)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        let Some((business_id, amount)) = eligible else {
            debug!("No processable withdrawal {} for caller {}", withdrawal_id, caller);
            tx.rollback().await?;
            return Ok(None);
        };

        let totals = ledger_totals(tx.conn()?, business_id, Some(withdrawal_id)).await?;
        if amount > totals.available() {
            warn!(
                "Withdrawal {} no longer fits the wallet: available={} required={}",
                withdrawal_id,
                totals.available(),
                amount
            );
            tx.rollback().await?;
            return Err(DatabaseError::new(DatabaseErrorKind::InsufficientBalance {
                available: totals.available(),
                required: amount,
            }));
        }

        let snapshot = sqlx::query_as::<_, WithdrawalSnapshot>(
            "UPDATE withdrawal_requests w
             SET status = 'processing', failure_reason = NULL, processed_at = NOW(), updated_at = NOW()
             FROM businesses b
             WHERE w.id = $1 AND w.business_id = b.id AND w.status IN ('pending', 'failed')
             RETURNING w.id AS withdrawal_id, w.business_id, b.name AS business_name, w.amount,
                       w.destination_phone, w.destination_name",
        )
        .bind(withdrawal_id)
        .fetch_optional(tx.conn()?)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        tx.commit().await?;
        Ok(snapshot)
    }

    async fn mark_succeeded(&self, withdrawal_id: Uuid, outcome: &PayoutOutcome) -> DbResult<bool> {
        let result = sqlx::query(
            "UPDATE withdrawal_requests
             SET status = 'succeeded', provider_reference = $2, provider_payload = $3,
                 failure_reason = NULL, processed_at = NOW(), updated_at = NOW()
             WHERE id = $1 AND status = 'processing'",
        )
        .bind(withdrawal_id)
        .bind(&outcome.provider_reference)
        .bind(&outcome.provider_payload)
        .execute(&self.pool)
        .await
        .map_err(|e| DatabaseError::from_sqlx(e).with_context("mark_succeeded"))?;

        Ok(result.rows_affected() > 0)
    }

    async fn mark_failed(&self, withdrawal_id: Uuid, reason: &str) -> DbResult<bool> {
        let result = sqlx::query(
            "UPDATE withdrawal_requests
             SET status = 'failed', failure_reason = $2, processed_at = NOW(), updated_at = NOW()
             WHERE id = $1 AND status = 'processing'",
        )
        .bind(withdrawal_id)
        .bind(reason)
        .execute(&self.pool)
        .await
        .map_err(|e| DatabaseError::from_sqlx(e).with_context("mark_failed"))?;

        Ok(result.rows_affected() > 0)
    }

    async fn wallet_summary(&self, caller: Uuid, business_id: Uuid) -> DbResult<WalletSummary> {
        self.wallets.summary(caller, business_id).await
    }

    async fn list_withdrawals(
        &self,
        caller: Uuid,
        business_id: Uuid,
    ) -> DbResult<Vec<WithdrawalRequest>> {
        self.ensure_owner(caller, business_id).await?;

        sqlx::query_as::<_, WithdrawalRequest>(&format!(
            "SELECT {} FROM withdrawal_requests w
             WHERE w.business_id = $1
             ORDER BY w.created_at DESC",
            WITHDRAWAL_COLUMNS
        ))
        .bind(business_id)
        .fetch_all(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }
}

#[cfg(test)]
mod tests {
    //! Run against a migrated database:
    //! DATABASE_URL=postgres://... cargo test -- --ignored

    use super::*;
    use crate::database::{init_pool, PoolConfig};
    use crate::withdrawals::types::WithdrawalStatus;

    async fn setup() -> (WithdrawalRepository, Uuid, Uuid) {
        let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
        let pool = init_pool(&url, Some(PoolConfig::default())).await.unwrap();
        let owner = Uuid::new_v4();
        let business: Uuid = sqlx::query_scalar(
            "INSERT INTO businesses (owner_id, name) VALUES ($1, 'Boutique Test') RETURNING id",
        )
        .bind(owner)
        .fetch_one(&pool)
        .await
        .unwrap();
        sqlx::query("INSERT INTO payments (business_id, amount, status) VALUES ($1, 10000, 'succeeded')")
            .bind(business)
            .execute(&pool)
            .await
            .unwrap();
        (WithdrawalRepository::new(pool), owner, business)
    }

    #[tokio::test]
    #[ignore] // Requires database running
    async fn test_prepare_then_finalize_once() {
        let (repo, owner, business) = setup().await;
        let id = repo
            .create_withdrawal(
                owner,
                NewWithdrawal {
                    business_id: business,
                    amount: 5000,
                    destination_phone: "+229 01 23 45 67".to_string(),
                    destination_name: None,
                },
            )
            .await
            .unwrap();

        assert!(repo.prepare_for_processing(id, owner).await.unwrap().is_some());
        assert!(repo.prepare_for_processing(id, owner).await.unwrap().is_none());

        let outcome = PayoutOutcome {
            provider_reference: "PAY-99".to_string(),
            provider_payload: serde_json::json!({}),
        };
        assert!(repo.mark_succeeded(id, &outcome).await.unwrap());
        assert!(!repo.mark_succeeded(id, &outcome).await.unwrap());

        let rows = repo.list_withdrawals(owner, business).await.unwrap();
        assert_eq!(rows[0].status, WithdrawalStatus::Succeeded);

        let summary = repo.wallet_summary(owner, business).await.unwrap();
        assert_eq!(summary.available_balance, 5000);
    }

    #[tokio::test]
    #[ignore] // Requires database running
    async fn test_cancel_stamps_processed_at() {
        let (repo, owner, business) = setup().await;
        let id = repo
            .create_withdrawal(
                owner,
                NewWithdrawal {
                    business_id: business,
                    amount: 1000,
                    destination_phone: "+22901234567".to_string(),
                    destination_name: None,
                },
            )
            .await
            .unwrap();

        repo.cancel_withdrawal(owner, id).await.unwrap();

        let rows = repo.list_withdrawals(owner, business).await.unwrap();
        assert_eq!(rows[0].status, WithdrawalStatus::Canceled);
        assert!(rows[0].processed_at.is_some());
    }
}
