//! Withdrawal domain types
//!
//! Records, snapshots and derived wallet aggregates shared by the store,
//! the orchestrator and the HTTP layer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Lifecycle state of a withdrawal request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[cfg_attr(feature = "database", derive(sqlx::Type))]
#[cfg_attr(
    feature = "database",
    sqlx(type_name = "withdrawal_status", rename_all = "lowercase")
)]
pub enum WithdrawalStatus {
    Pending,
    Processing,
    Succeeded,
    Failed,
    Canceled,
}

impl WithdrawalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
            Self::Canceled => "canceled",
        }
    }

    /// Whether a request in this state may be picked up for processing
    pub fn is_processable(&self) -> bool {
        matches!(self, Self::Pending | Self::Failed)
    }

    /// Whether the owner may still cancel a request in this state
    pub fn is_cancelable(&self) -> bool {
        matches!(self, Self::Pending | Self::Failed)
    }

    /// Whether the amount is held against the wallet without having left it
    pub fn is_reserved(&self) -> bool {
        matches!(self, Self::Pending | Self::Processing)
    }

    /// Allowed edges of the lifecycle.
    ///
    /// `succeeded` and `canceled` are final, `processing` only resolves to
    /// `succeeded` or `failed`, and `failed` may be retried or canceled.
    pub fn can_transition_to(&self, next: WithdrawalStatus) -> bool {
        use WithdrawalStatus::*;
        matches!(
            (self, next),
            (Pending, Processing)
                | (Pending, Canceled)
                | (Processing, Succeeded)
                | (Processing, Failed)
                | (Failed, Processing)
                | (Failed, Canceled)
        )
    }
}

impl fmt::Display for WithdrawalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Persisted withdrawal request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "database", derive(sqlx::FromRow))]
pub struct WithdrawalRequest {
    pub id: Uuid,
    pub business_id: Uuid,
    /// Integer currency units
    pub amount: i64,
    pub destination_phone: String,
    pub destination_name: Option<String>,
    pub status: WithdrawalStatus,
    pub provider_reference: Option<String>,
    pub provider_payload: Option<serde_json::Value>,
    pub failure_reason: Option<String>,
    pub requested_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for a new withdrawal request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewWithdrawal {
    pub business_id: Uuid,
    pub amount: i64,
    pub destination_phone: String,
    #[serde(default)]
    pub destination_name: Option<String>,
}

impl NewWithdrawal {
    /// Trimmed destination name, `None` when blank
    pub fn normalized_name(&self) -> Option<String> {
        self.destination_name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(str::to_string)
    }
}

/// Row returned by the prepare-for-processing step.
///
/// Amount and destination are re-read under the reservation, so the gateway
/// always pays what is stored, never what the caller last saw.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "database", derive(sqlx::FromRow))]
pub struct WithdrawalSnapshot {
    pub withdrawal_id: Uuid,
    pub business_id: Uuid,
    pub business_name: String,
    pub amount: i64,
    pub destination_phone: String,
    pub destination_name: Option<String>,
}

impl WithdrawalSnapshot {
    /// Idempotency key sent to the gateway, stable across retries
    pub fn merchant_reference(&self) -> String {
        format!("MM-WDR-{}", self.withdrawal_id)
    }
}

/// Derived wallet aggregates for one business
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletSummary {
    pub business_id: Uuid,
    pub confirmed_incoming: i64,
    pub reserved_withdrawals: i64,
    pub total_withdrawn: i64,
    pub available_balance: i64,
    pub default_phone: Option<String>,
}

impl WalletSummary {
    pub fn from_totals(
        business_id: Uuid,
        confirmed_incoming: i64,
        reserved_withdrawals: i64,
        total_withdrawn: i64,
        default_phone: Option<String>,
    ) -> Self {
        Self {
            business_id,
            confirmed_incoming,
            reserved_withdrawals,
            total_withdrawn,
            available_balance: confirmed_incoming - reserved_withdrawals - total_withdrawn,
            default_phone,
        }
    }
}

/// What the gateway returned for a completed payout, ready to persist
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PayoutOutcome {
    pub provider_reference: String,
    pub provider_payload: serde_json::Value,
}

/// Result of a successful `process` call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessOutcome {
    pub success: bool,
    pub withdrawal_id: Uuid,
    pub provider_reference: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use WithdrawalStatus::*;

    const ALL: [WithdrawalStatus; 5] = [Pending, Processing, Succeeded, Failed, Canceled];

    #[test]
    fn test_final_states_have_no_exits() {
        for next in ALL {
            assert!(!Succeeded.can_transition_to(next));
            assert!(!Canceled.can_transition_to(next));
        }
    }

    #[test]
    fn test_processing_only_resolves() {
        let exits: Vec<_> = ALL
            .into_iter()
            .filter(|next| Processing.can_transition_to(*next))
            .collect();
        assert_eq!(exits, vec![Succeeded, Failed]);
    }

    #[test]
    fn test_failed_can_retry_or_cancel() {
        assert!(Failed.can_transition_to(Processing));
        assert!(Failed.can_transition_to(Canceled));
        assert!(!Failed.can_transition_to(Succeeded));
        assert!(!Failed.can_transition_to(Pending));
    }

    #[test]
    fn test_cancelable_matches_cancel_edge() {
        for status in ALL {
            assert_eq!(status.is_cancelable(), status.can_transition_to(Canceled));
        }
    }

    #[test]
    fn test_status_serializes_lowercase() {
        let json = serde_json::to_string(&Processing).unwrap();
        assert_eq!(json, "\"processing\"");
        assert_eq!(Canceled.to_string(), "canceled");
    }

    #[test]
    fn test_available_balance() {
        let summary = WalletSummary::from_totals(Uuid::new_v4(), 20_000, 5_000, 3_000, None);
        assert_eq!(summary.available_balance, 12_000);
    }

    #[test]
    fn test_merchant_reference_is_stable() {
        let snapshot = WithdrawalSnapshot {
            withdrawal_id: Uuid::nil(),
            business_id: Uuid::new_v4(),
            business_name: "Boutique".to_string(),
            amount: 5000,
            destination_phone: "+22901234567".to_string(),
            destination_name: None,
        };
        assert_eq!(
            snapshot.merchant_reference(),
            "MM-WDR-00000000-0000-0000-0000-000000000000"
        );
        assert_eq!(snapshot.merchant_reference(), snapshot.clone().merchant_reference());
    }

    #[test]
    fn test_normalized_name() {
        let mut new = NewWithdrawal {
            business_id: Uuid::new_v4(),
            amount: 1,
            destination_phone: "+229".to_string(),
            destination_name: Some("   ".to_string()),
        };
        assert_eq!(new.normalized_name(), None);
        new.destination_name = Some("  Awa Kone ".to_string());
        assert_eq!(new.normalized_name().as_deref(), Some("Awa Kone"));
    }
}
