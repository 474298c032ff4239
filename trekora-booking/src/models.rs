use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use trekora_catalog::TravelerDetail;
use trekora_fare::FareBreakdown;
use uuid::Uuid;

/// Booking status in the lifecycle
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BookingStatus {
    Confirmed,
    Cancelled,
    Completed,
}

/// Refund progress on a cancelled booking. `None` is terminal for
/// zero-percent cancellations; payout itself happens outside the engine.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RefundStatus {
    None,
    Pending,
    Processed,
}

/// The single source of truth for a traveler's purchase. Immutable once
/// confirmed except through cancellation, completion, and refund
/// processing; never deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Booking {
    pub id: Uuid,
    pub trip_id: Uuid,
    pub batch_id: Uuid,
    pub user_id: Uuid,
    pub traveler_count: i32,
    pub travelers: Vec<TravelerDetail>,
    pub pickup_point: Option<String>,
    pub promo_code: Option<String>,
    pub subtotal: Decimal,
    pub coupon_discount: Decimal,
    pub wallet_amount_used: Decimal,
    pub tax_amount: Decimal,
    /// What was actually collected at checkout: the advance for a spot
    /// reservation, the full total otherwise.
    pub amount: Decimal,
    pub is_partial_booking: bool,
    pub advance_paid: Decimal,
    pub remaining_amount: Decimal,
    pub status: BookingStatus,
    pub refund_percentage: Option<Decimal>,
    pub refund_amount: Option<Decimal>,
    pub refund_status: RefundStatus,
    pub cancellation_reason: Option<String>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Booking {
    pub fn new(
        trip_id: Uuid,
        batch_id: Uuid,
        user_id: Uuid,
        fare: &FareBreakdown,
        travelers: Vec<TravelerDetail>,
        pickup_point: Option<String>,
        promo_code: Option<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            trip_id,
            batch_id,
            user_id,
            traveler_count: travelers.len() as i32,
            travelers,
            pickup_point,
            promo_code,
            subtotal: fare.subtotal,
            coupon_discount: fare.coupon_discount,
            wallet_amount_used: fare.wallet_applied,
            tax_amount: fare.tax_amount,
            amount: fare.amount_due,
            is_partial_booking: fare.is_partial,
            advance_paid: fare.advance_paid,
            remaining_amount: fare.remaining_amount,
            status: BookingStatus::Confirmed,
            refund_percentage: None,
            refund_amount: None,
            refund_status: RefundStatus::None,
            cancellation_reason: None,
            cancelled_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.status == BookingStatus::Cancelled
    }

    /// Total the buyer committed to, including any balance still due.
    pub fn total_payable(&self) -> Decimal {
        if self.is_partial_booking {
            self.advance_paid + self.remaining_amount
        } else {
            self.amount
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_fare() -> FareBreakdown {
        FareBreakdown {
            subtotal: Decimal::from(10000),
            coupon_discount: Decimal::from(500),
            wallet_applied: Decimal::ZERO,
            taxable_amount: Decimal::from(9500),
            tax_amount: Decimal::from(475),
            total_payable: Decimal::from(9975),
            amount_due: Decimal::from(9975),
            is_partial: false,
            advance_paid: Decimal::ZERO,
            remaining_amount: Decimal::ZERO,
        }
    }

    #[test]
    fn test_new_booking_copies_fare_fields() {
        let travelers = vec![
            TravelerDetail {
                name: "Asha Rao".to_string(),
                phone: "9876543210".to_string(),
                email: "asha@example.com".to_string(),
            },
            TravelerDetail {
                name: "Vivek Rao".to_string(),
                phone: "9876543211".to_string(),
                email: "vivek@example.com".to_string(),
            },
        ];
        let booking = Booking::new(
            Uuid::new_v4(),
            Uuid::new_v4(),
            Uuid::new_v4(),
            &sample_fare(),
            travelers,
            None,
            Some("TREK500".to_string()),
        );

        assert_eq!(booking.status, BookingStatus::Confirmed);
        assert_eq!(booking.traveler_count, 2);
        assert_eq!(booking.amount, Decimal::from(9975));
        assert_eq!(booking.coupon_discount, Decimal::from(500));
        assert_eq!(booking.refund_status, RefundStatus::None);
        assert_eq!(booking.total_payable(), Decimal::from(9975));
    }

    #[test]
    fn test_partial_booking_total_includes_remaining() {
        let fare = FareBreakdown {
            subtotal: Decimal::from(10000),
            coupon_discount: Decimal::ZERO,
            wallet_applied: Decimal::ZERO,
            taxable_amount: Decimal::from(10000),
            tax_amount: Decimal::from(500),
            total_payable: Decimal::from(10500),
            amount_due: Decimal::from(2000),
            is_partial: true,
            advance_paid: Decimal::from(2000),
            remaining_amount: Decimal::from(8500),
        };
        let booking = Booking::new(
            Uuid::new_v4(),
            Uuid::new_v4(),
            Uuid::new_v4(),
            &fare,
            vec![],
            None,
            None,
        );
        assert_eq!(booking.amount, Decimal::from(2000));
        assert_eq!(booking.total_payable(), Decimal::from(10500));
    }
}
