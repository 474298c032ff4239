use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use trekora_shared::clamp_non_negative;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PromoStatus {
    Active,
    Disabled,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DiscountType {
    Fixed,
    Percentage,
}

/// A campaign coupon code. Applying a code never mutates it; usage_count
/// is incremented only by a successful booking commit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromoCode {
    pub id: Uuid,
    pub code: String,
    pub discount_type: DiscountType,
    pub discount_value: Decimal,
    /// None means the campaign has no redemption cap.
    pub usage_limit: Option<i32>,
    pub usage_count: i32,
    /// None means the code never expires.
    pub expires_at: Option<DateTime<Utc>>,
    pub status: PromoStatus,
    pub created_at: DateTime<Utc>,
}

impl PromoCode {
    pub fn new(
        code: impl Into<String>,
        discount_type: DiscountType,
        discount_value: Decimal,
        usage_limit: Option<i32>,
        expires_at: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            code: code.into(),
            discount_type,
            discount_value,
            usage_limit,
            usage_count: 0,
            expires_at,
            status: PromoStatus::Active,
            created_at: Utc::now(),
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        match self.expires_at {
            Some(expiry) => now >= expiry,
            None => false,
        }
    }

    pub fn is_exhausted(&self) -> bool {
        match self.usage_limit {
            Some(limit) => self.usage_count >= limit,
            None => false,
        }
    }

    /// Amount this code takes off a subtotal, un-rounded. The discount is
    /// clamped so it never exceeds what is being discounted.
    pub fn discount_amount(&self, subtotal: Decimal) -> Decimal {
        let raw = match self.discount_type {
            DiscountType::Fixed => self.discount_value,
            DiscountType::Percentage => subtotal * self.discount_value / Decimal::ONE_HUNDRED,
        };
        clamp_non_negative(raw.min(subtotal))
    }
}
