use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Append-only audit row paired with every wallet balance mutation.
/// Positive amounts are credits, negative amounts are debits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletEntry {
    pub id: Uuid,
    pub user_id: Uuid,
    pub booking_id: Option<Uuid>,
    pub amount: Decimal,
    pub balance_after: Decimal,
    pub created_at: DateTime<Utc>,
}

impl WalletEntry {
    /// Debit applied by a booking commit.
    pub fn debit(user_id: Uuid, booking_id: Uuid, amount: Decimal, balance_after: Decimal) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            booking_id: Some(booking_id),
            amount: -amount.abs(),
            balance_after,
            created_at: Utc::now(),
        }
    }

    /// Credit from a top-up or bootstrap grant.
    pub fn credit(user_id: Uuid, amount: Decimal, balance_after: Decimal) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            booking_id: None,
            amount: amount.abs(),
            balance_after,
            created_at: Utc::now(),
        }
    }
}
