use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle of a scheduled departure
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BatchStatus {
    Scheduled,
    Departed,
    Completed,
    Cancelled,
}

/// One tier of a trip's cancellation policy: cancelling at least
/// `days_before_departure` days out earns `refund_percentage` back.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CancellationRule {
    pub days_before_departure: i64,
    pub refund_percentage: Decimal,
}

/// A published trip listing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trip {
    pub id: Uuid,
    pub organizer_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub price: Decimal,
    /// Fixed advance charged to reserve a spot; None disables spot
    /// reservations for this trip.
    pub advance_amount: Option<Decimal>,
    pub tax_percentage: Decimal,
    pub tax_included: bool,
    pub pickup_points: Vec<String>,
    pub cancellation_rules: Vec<CancellationRule>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl Trip {
    pub fn new(
        organizer_id: Uuid,
        title: impl Into<String>,
        price: Decimal,
        tax_percentage: Decimal,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            organizer_id,
            title: title.into(),
            description: None,
            price,
            advance_amount: None,
            tax_percentage,
            tax_included: false,
            pickup_points: Vec::new(),
            cancellation_rules: Vec::new(),
            is_active: true,
            created_at: Utc::now(),
        }
    }

    pub fn supports_spot_reservation(&self) -> bool {
        self.advance_amount.is_some()
    }

    pub fn requires_pickup_selection(&self) -> bool {
        !self.pickup_points.is_empty()
    }
}

/// A scheduled departure of a trip with its own capacity and optional
/// price override.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TripBatch {
    pub id: Uuid,
    pub trip_id: Uuid,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub max_participants: i32,
    pub available_slots: i32,
    pub price_override: Option<Decimal>,
    pub status: BatchStatus,
}

impl TripBatch {
    pub fn new(
        trip_id: Uuid,
        start_date: DateTime<Utc>,
        end_date: DateTime<Utc>,
        max_participants: i32,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            trip_id,
            start_date,
            end_date,
            max_participants,
            available_slots: max_participants,
            price_override: None,
            status: BatchStatus::Scheduled,
        }
    }

    /// Per-person price for this departure. A batch override always wins
    /// over the trip's listed price.
    pub fn effective_price(&self, trip: &Trip) -> Decimal {
        self.price_override.unwrap_or(trip.price)
    }

    pub fn is_bookable(&self) -> bool {
        self.status == BatchStatus::Scheduled && self.available_slots > 0
    }

    pub fn has_ended(&self, now: DateTime<Utc>) -> bool {
        now >= self.end_date
    }
}

/// Per-traveler details captured at checkout
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TravelerDetail {
    pub name: String,
    pub phone: String,
    pub email: String,
}
