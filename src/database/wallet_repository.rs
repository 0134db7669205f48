use crate::database::error::{DatabaseError, DbResult};
use crate::withdrawals::types::WalletSummary;
use sqlx::{FromRow, PgConnection, PgPool};
use uuid::Uuid;

/// Aggregates behind a wallet summary
#[derive(Debug, Clone, FromRow)]
struct WalletTotals {
    business_id: Uuid,
    confirmed_incoming: i64,
    reserved_withdrawals: i64,
    total_withdrawn: i64,
    default_phone: Option<String>,
}

/// Funds a business can no longer spend: confirmed incoming and everything
/// pending, processing or already paid out
#[derive(Debug, Clone, Copy, FromRow)]
pub struct LedgerTotals {
    pub confirmed_incoming: i64,
    pub committed: i64,
}

impl LedgerTotals {
    pub fn available(&self) -> i64 {
        self.confirmed_incoming - self.committed
    }
}

/// Read-only wallet ledger view, recomputed on every call
pub struct WalletRepository {
    pool: PgPool,
}

impl WalletRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Wallet summary of a business owned by `caller`
    pub async fn summary(&self, caller: Uuid, business_id: Uuid) -> DbResult<WalletSummary> {
        let totals = sqlx::query_as::<_, WalletTotals>(
            "SELECT b.id AS business_id,
                    COALESCE((SELECT SUM(p.amount) FROM payments p
                              WHERE p.business_id = b.id AND p.status = 'succeeded'), 0)::BIGINT
                        AS confirmed_incoming,
                    COALESCE((SELECT SUM(w.amount) FROM withdrawal_requests w
                              WHERE w.business_id = b.id AND w.status IN ('pending', 'processing')), 0)::BIGINT
                        AS reserved_withdrawals,
                    COALESCE((SELECT SUM(w.amount) FROM withdrawal_requests w
                              WHERE w.business_id = b.id AND w.status = 'succeeded'), 0)::BIGINT
                        AS total_withdrawn,
                    (SELECT w.destination_phone FROM withdrawal_requests w
                     WHERE w.business_id = b.id ORDER BY w.created_at DESC LIMIT 1)
                        AS default_phone
             FROM businesses b
             WHERE b.id = $1 AND b.owner_id = $2",
        )
        .bind(business_id)
        .bind(caller)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)?
        .ok_or_else(|| DatabaseError::not_found("Business", business_id))?;

        Ok(WalletSummary::from_totals(
            totals.business_id,
            totals.confirmed_incoming,
            totals.reserved_withdrawals,
            totals.total_withdrawn,
            totals.default_phone,
        ))
    }
}

/// Ledger totals on an open connection, optionally leaving one request out
/// (the one being re-reserved)
pub async fn ledger_totals(
    conn: &mut PgConnection,
    business_id: Uuid,
    skip_withdrawal: Option<Uuid>,
) -> DbResult<LedgerTotals> {
    sqlx::query_as::<_, LedgerTotals>(
        "SELECT COALESCE((SELECT SUM(p.amount) FROM payments p
                          WHERE p.business_id = $1 AND p.status = 'succeeded'), 0)::BIGINT
                    AS confirmed_incoming,
                COALESCE((SELECT SUM(w.amount) FROM withdrawal_requests w
                          WHERE w.business_id = $1
                            AND w.status IN ('pending', 'processing', 'succeeded')
                            AND ($2::UUID IS NULL OR w.id <> $2)), 0)::BIGINT
                    AS committed",
    )
    .bind(business_id)
    .bind(skip_withdrawal)
    .fetch_one(conn)
    .await
    .map_err(DatabaseError::from_sqlx)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_available_from_ledger() {
        let totals = LedgerTotals {
            confirmed_incoming: 10_000,
            committed: 7_500,
        };
        assert_eq!(totals.available(), 2_500);
    }
}
