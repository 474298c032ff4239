use chrono::{DateTime, Utc};

use crate::models::{Booking, BookingStatus, RefundStatus};
use crate::refund::RefundQuote;
use rust_decimal::Decimal;

#[derive(Debug, thiserror::Error)]
pub enum BookingError {
    #[error("Booking not found: {0}")]
    NotFound(String),

    #[error("Invalid state transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },
}

impl Booking {
    /// Transition: Confirmed → Cancelled, recording the refund terms from
    /// an evaluated quote. A second cancel request is an error, never a
    /// re-computation.
    pub fn cancel(
        &mut self,
        quote: &RefundQuote,
        reason: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<(), BookingError> {
        if self.status != BookingStatus::Confirmed {
            return Err(BookingError::InvalidTransition {
                from: format!("{:?}", self.status),
                to: "CANCELLED".to_string(),
            });
        }

        self.status = BookingStatus::Cancelled;
        self.refund_percentage = Some(quote.refund_percentage);
        self.refund_amount = Some(quote.refund_amount);
        self.refund_status = if quote.refund_percentage > Decimal::ZERO {
            RefundStatus::Pending
        } else {
            RefundStatus::None
        };
        self.cancellation_reason = reason;
        self.cancelled_at = Some(now);
        self.updated_at = now;
        Ok(())
    }

    /// Transition: Confirmed → Completed once the departure has ended.
    pub fn complete(&mut self, now: DateTime<Utc>) -> Result<(), BookingError> {
        if self.status != BookingStatus::Confirmed {
            return Err(BookingError::InvalidTransition {
                from: format!("{:?}", self.status),
                to: "COMPLETED".to_string(),
            });
        }
        self.status = BookingStatus::Completed;
        self.updated_at = now;
        Ok(())
    }

    /// Transition: Cancelled{Pending} → Cancelled{Processed}, driven by the
    /// external refund processor's confirmation.
    pub fn mark_refund_processed(&mut self, now: DateTime<Utc>) -> Result<(), BookingError> {
        if self.status != BookingStatus::Cancelled || self.refund_status != RefundStatus::Pending {
            return Err(BookingError::InvalidTransition {
                from: format!("{:?}/{:?}", self.status, self.refund_status),
                to: "CANCELLED/PROCESSED".to_string(),
            });
        }
        self.refund_status = RefundStatus::Processed;
        self.updated_at = now;
        Ok(())
    }
}
