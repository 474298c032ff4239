use chrono::{DateTime, Utc};
use trekora_catalog::{PromoCode, PromoStatus};

/// Reasons a coupon code is not applicable. Messages are surfaced to the
/// booking UI as-is.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum PromoRejection {
    #[error("Coupon code \"{0}\" was not recognized")]
    Unknown(String),

    #[error("Coupon \"{0}\" is currently disabled")]
    Disabled(String),

    #[error("This coupon has expired")]
    Expired(String),

    #[error("This coupon has reached its usage limit")]
    Exhausted(String),
}

/// Precondition pass over a resolved coupon. Applying the code does not
/// mutate it; usage is counted only by the booking commit.
pub fn validate_promo(promo: &PromoCode, now: DateTime<Utc>) -> Result<(), PromoRejection> {
    if promo.status != PromoStatus::Active {
        return Err(PromoRejection::Disabled(promo.code.clone()));
    }
    if promo.is_expired(now) {
        return Err(PromoRejection::Expired(promo.code.clone()));
    }
    if promo.is_exhausted() {
        return Err(PromoRejection::Exhausted(promo.code.clone()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use rust_decimal::Decimal;
    use trekora_catalog::DiscountType;

    fn active_promo() -> PromoCode {
        PromoCode::new(
            "TREK500",
            DiscountType::Fixed,
            Decimal::from(500),
            Some(10),
            Some(Utc::now() + Duration::days(7)),
        )
    }

    #[test]
    fn test_active_promo_passes() {
        let promo = active_promo();
        assert!(validate_promo(&promo, Utc::now()).is_ok());
    }

    #[test]
    fn test_disabled_promo_rejected() {
        let mut promo = active_promo();
        promo.status = PromoStatus::Disabled;
        assert_eq!(
            validate_promo(&promo, Utc::now()),
            Err(PromoRejection::Disabled("TREK500".to_string()))
        );
    }

    #[test]
    fn test_expired_promo_rejected() {
        let promo = active_promo();
        let later = Utc::now() + Duration::days(8);
        assert_eq!(
            validate_promo(&promo, later),
            Err(PromoRejection::Expired("TREK500".to_string()))
        );
    }

    #[test]
    fn test_expiry_boundary_is_inclusive() {
        let mut promo = active_promo();
        let expiry = Utc::now() + Duration::days(1);
        promo.expires_at = Some(expiry);
        // Exactly at the expiry instant the code is no longer valid.
        assert!(validate_promo(&promo, expiry).is_err());
        assert!(validate_promo(&promo, expiry - Duration::seconds(1)).is_ok());
    }

    #[test]
    fn test_exhausted_promo_rejected() {
        let mut promo = active_promo();
        promo.usage_count = 10;
        assert_eq!(
            validate_promo(&promo, Utc::now()),
            Err(PromoRejection::Exhausted("TREK500".to_string()))
        );
    }
}
