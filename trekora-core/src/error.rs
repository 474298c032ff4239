use trekora_booking::{BookingError, RefundError};
use trekora_catalog::SlotError;
use trekora_fare::{FareError, PromoRejection};
use trekora_leads::LedgerError;

/// Engine-wide error taxonomy. Every rejection carries a human-readable
/// message; `kind()` gives the machine-readable class callers branch on.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Bad input shape, rejected before any computation runs.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// A business precondition failed; the reason is surfaced verbatim.
    #[error("{0}")]
    Rule(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// Lost a race on a shared row; safe to retry.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Ledger drift, negative amounts, impossible states. Fatal, logged,
    /// never silently corrected.
    #[error("Invariant violated: {0}")]
    Invariant(String),

    #[error("Storage error: {0}")]
    Storage(String),
}

pub type EngineResult<T> = Result<T, EngineError>;

impl EngineError {
    pub fn kind(&self) -> &'static str {
        match self {
            EngineError::Validation(_) => "VALIDATION_ERROR",
            EngineError::Rule(_) => "BUSINESS_RULE_VIOLATION",
            EngineError::NotFound(_) => "NOT_FOUND",
            EngineError::Conflict(_) => "CONCURRENCY_CONFLICT",
            EngineError::Invariant(_) => "INVARIANT_VIOLATION",
            EngineError::Storage(_) => "STORAGE_ERROR",
        }
    }

    /// True for failures a caller may retry verbatim.
    pub fn is_retryable(&self) -> bool {
        matches!(self, EngineError::Conflict(_))
    }
}

impl From<FareError> for EngineError {
    fn from(err: FareError) -> Self {
        match err {
            FareError::InvalidTravelerCount(_) | FareError::NegativeInput { .. } => {
                EngineError::Validation(err.to_string())
            }
            FareError::Promo(rejection) => rejection.into(),
            FareError::DiscountOnSpotReservation
            | FareError::AdvanceNotConfigured
            | FareError::AdvanceExceedsTotal { .. } => EngineError::Rule(err.to_string()),
        }
    }
}

impl From<PromoRejection> for EngineError {
    fn from(rejection: PromoRejection) -> Self {
        EngineError::Rule(rejection.to_string())
    }
}

impl From<RefundError> for EngineError {
    fn from(err: RefundError) -> Self {
        // The refund calculator raises only for corrupted stored state or a
        // malformed rule table, never for expected business conditions.
        EngineError::Invariant(err.to_string())
    }
}

impl From<SlotError> for EngineError {
    fn from(err: SlotError) -> Self {
        match err {
            SlotError::NonPositiveCount(_) => EngineError::Validation(err.to_string()),
            SlotError::InsufficientSlots { .. } => EngineError::Rule(err.to_string()),
            SlotError::ExceedsCapacity { .. } => EngineError::Invariant(err.to_string()),
        }
    }
}

impl From<LedgerError> for EngineError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::InsufficientCredits => EngineError::Rule(err.to_string()),
            LedgerError::EmptyPackage(_) => EngineError::Validation(err.to_string()),
            LedgerError::DuplicateUnlock { .. } | LedgerError::Drift { .. } => {
                EngineError::Invariant(err.to_string())
            }
        }
    }
}

impl From<BookingError> for EngineError {
    fn from(err: BookingError) -> Self {
        match err {
            BookingError::NotFound(id) => EngineError::NotFound(format!("Booking {}", id)),
            BookingError::InvalidTransition { .. } => EngineError::Rule(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use uuid::Uuid;

    #[test]
    fn test_kind_strings() {
        assert_eq!(
            EngineError::Validation("x".into()).kind(),
            "VALIDATION_ERROR"
        );
        assert_eq!(EngineError::Rule("x".into()).kind(), "BUSINESS_RULE_VIOLATION");
        assert_eq!(EngineError::Conflict("x".into()).kind(), "CONCURRENCY_CONFLICT");
        assert_eq!(
            EngineError::Invariant("x".into()).kind(),
            "INVARIANT_VIOLATION"
        );
    }

    #[test]
    fn test_fare_error_classification() {
        let err: EngineError = FareError::InvalidTravelerCount(0).into();
        assert_eq!(err.kind(), "VALIDATION_ERROR");

        let err: EngineError = FareError::DiscountOnSpotReservation.into();
        assert_eq!(err.kind(), "BUSINESS_RULE_VIOLATION");

        let err: EngineError = FareError::Promo(PromoRejection::Expired("X".into())).into();
        assert_eq!(err.kind(), "BUSINESS_RULE_VIOLATION");
        assert_eq!(err.to_string(), "This coupon has expired");
    }

    #[test]
    fn test_ledger_error_classification() {
        let err: EngineError = LedgerError::InsufficientCredits.into();
        assert_eq!(err.kind(), "BUSINESS_RULE_VIOLATION");
        assert_eq!(err.to_string(), "No credits remaining");

        let err: EngineError = LedgerError::Drift {
            organizer_id: Uuid::new_v4(),
            available: -1,
            expected: 0,
        }
        .into();
        assert_eq!(err.kind(), "INVARIANT_VIOLATION");
    }

    #[test]
    fn test_slot_exhaustion_is_a_rule_violation() {
        let err: EngineError = SlotError::InsufficientSlots {
            requested: 2,
            available: 1,
        }
        .into();
        assert_eq!(err.kind(), "BUSINESS_RULE_VIOLATION");
    }

    #[test]
    fn test_refund_calculator_failures_are_invariants() {
        let err: EngineError = RefundError::NegativeAmount(Decimal::from(-5)).into();
        assert_eq!(err.kind(), "INVARIANT_VIOLATION");
    }

    #[test]
    fn test_only_conflicts_are_retryable() {
        assert!(EngineError::Conflict("x".into()).is_retryable());
        assert!(!EngineError::Rule("x".into()).is_retryable());
        assert!(!EngineError::Invariant("x".into()).is_retryable());
    }
}
