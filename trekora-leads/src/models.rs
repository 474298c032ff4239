use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use trekora_shared::Masked;
use uuid::Uuid;

/// A prospective-customer inquiry. Contact details stay hidden from
/// organizers until a credit is spent to unlock them, and are masked in
/// Debug output so they never leak through logging.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Lead {
    pub id: Uuid,
    pub trip_id: Uuid,
    pub name: String,
    pub phone: Masked<String>,
    pub email: Masked<String>,
    pub message: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Lead {
    pub fn new(
        trip_id: Uuid,
        name: impl Into<String>,
        phone: impl Into<String>,
        email: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            trip_id,
            name: name.into(),
            phone: Masked(phone.into()),
            email: Masked(email.into()),
            message: None,
            created_at: Utc::now(),
        }
    }

    /// Full contact payload, returned only through a successful unlock.
    pub fn contact_details(&self) -> LeadContact {
        LeadContact {
            name: self.name.clone(),
            phone: self.phone.expose().clone(),
            email: self.email.expose().clone(),
        }
    }
}

/// What an organizer receives for one spent credit.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LeadContact {
    pub name: String,
    pub phone: String,
    pub email: String,
}

/// A purchasable bundle of lead-unlock credits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreditPackage {
    pub id: Uuid,
    pub name: String,
    pub credits: i32,
    pub price: Decimal,
    pub is_active: bool,
}

impl CreditPackage {
    pub fn new(name: impl Into<String>, credits: i32, price: Decimal) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            credits,
            price,
            is_active: true,
        }
    }
}

/// Append-only record of a credit purchase.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LeadPurchase {
    pub id: Uuid,
    pub organizer_id: Uuid,
    pub package_id: Uuid,
    pub package_name: String,
    pub credits_granted: i32,
    pub price: Decimal,
    pub balance_after: i32,
    pub created_at: DateTime<Utc>,
}

impl LeadPurchase {
    pub fn new(organizer_id: Uuid, package: &CreditPackage, balance_after: i32) -> Self {
        Self {
            id: Uuid::new_v4(),
            organizer_id,
            package_id: package.id,
            package_name: package.name.clone(),
            credits_granted: package.credits,
            price: package.price,
            balance_after,
            created_at: Utc::now(),
        }
    }
}

/// Append-only record of one consumed credit. At most one row may ever
/// exist per (organizer_id, lead_id); never mutated or deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeadUnlock {
    pub id: Uuid,
    pub organizer_id: Uuid,
    pub lead_id: Uuid,
    pub balance_after: i32,
    pub created_at: DateTime<Utc>,
}

impl LeadUnlock {
    pub fn new(organizer_id: Uuid, lead_id: Uuid, balance_after: i32) -> Self {
        Self {
            id: Uuid::new_v4(),
            organizer_id,
            lead_id,
            balance_after,
            created_at: Utc::now(),
        }
    }
}
