use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use trekora_catalog::PromoCode;
use trekora_shared::{clamp_non_negative, percentage_of, round_money};

use crate::promo_gate::{validate_promo, PromoRejection};

/// Resolved inputs for one fare derivation. The caller resolves the batch
/// price override and coupon lookup before building this.
#[derive(Debug, Clone)]
pub struct FareRequest {
    pub base_price_per_person: Decimal,
    pub traveler_count: i32,
    pub promo: Option<PromoCode>,
    pub wallet_balance: Decimal,
    pub use_wallet: bool,
    pub tax_included: bool,
    pub tax_percentage: Decimal,
    pub is_partial: bool,
    /// The trip's configured spot-reservation advance, if any.
    pub advance_amount: Option<Decimal>,
}

/// What a prospective booking costs, field by field. Every amount is
/// rounded to settlement precision; `advance_paid + remaining_amount ==
/// total_payable` holds exactly for partial bookings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FareBreakdown {
    pub subtotal: Decimal,
    pub coupon_discount: Decimal,
    pub wallet_applied: Decimal,
    pub taxable_amount: Decimal,
    pub tax_amount: Decimal,
    pub total_payable: Decimal,
    /// What the buyer pays now: the advance for a spot reservation, the
    /// full total otherwise.
    pub amount_due: Decimal,
    pub is_partial: bool,
    pub advance_paid: Decimal,
    pub remaining_amount: Decimal,
}

#[derive(Debug, Clone, thiserror::Error, PartialEq)]
pub enum FareError {
    #[error("Traveler count must be at least 1, got {0}")]
    InvalidTravelerCount(i32),

    #[error("{field} cannot be negative, got {value}")]
    NegativeInput { field: &'static str, value: Decimal },

    #[error(transparent)]
    Promo(#[from] PromoRejection),

    #[error("Spot reservations cannot be combined with coupons or wallet credit")]
    DiscountOnSpotReservation,

    #[error("This trip does not accept spot reservations")]
    AdvanceNotConfigured,

    #[error("Advance {advance} exceeds the total payable {total}")]
    AdvanceExceedsTotal { advance: Decimal, total: Decimal },
}

/// Derives the full fare breakdown for a prospective booking.
///
/// Pure and deterministic: same inputs and clock always produce the same
/// breakdown. Intermediate math stays un-rounded; each published field is
/// rounded exactly once at the end.
pub fn compute_fare(request: &FareRequest, now: DateTime<Utc>) -> Result<FareBreakdown, FareError> {
    // 1. Preconditions
    if request.traveler_count < 1 {
        return Err(FareError::InvalidTravelerCount(request.traveler_count));
    }
    check_non_negative("base price", request.base_price_per_person)?;
    check_non_negative("tax percentage", request.tax_percentage)?;
    check_non_negative("wallet balance", request.wallet_balance)?;
    if let Some(advance) = request.advance_amount {
        check_non_negative("advance amount", advance)?;
    }
    if let Some(promo) = &request.promo {
        validate_promo(promo, now)?;
    }
    if request.is_partial && (request.promo.is_some() || request.use_wallet) {
        return Err(FareError::DiscountOnSpotReservation);
    }

    // 2. Subtotal
    let subtotal = request.base_price_per_person * Decimal::from(request.traveler_count);

    // 3. Coupon, clamped so it never exceeds the subtotal
    let coupon_discount = request
        .promo
        .as_ref()
        .map(|p| p.discount_amount(subtotal))
        .unwrap_or(Decimal::ZERO);

    // 4. Wallet, applied after the coupon and capped by both the remaining
    //    payable and the user's balance
    let after_coupon = subtotal - coupon_discount;
    let wallet_applied = if request.use_wallet {
        request.wallet_balance.min(after_coupon)
    } else {
        Decimal::ZERO
    };

    // 5. Tax on the post-coupon, pre-wallet amount; wallet credit is a
    //    payment method, not a price reduction
    let taxable_amount = after_coupon;
    let tax_amount = if request.tax_included {
        Decimal::ZERO
    } else {
        percentage_of(taxable_amount, request.tax_percentage)
    };

    // 6. Total payable
    let total_raw = clamp_non_negative(subtotal - coupon_discount - wallet_applied + tax_amount);
    let total_payable = round_money(total_raw);

    // 7. Spot reservations pin the amount due to the configured advance;
    //    the rest falls due later
    let (amount_due, advance_paid, remaining_amount) = if request.is_partial {
        let advance = round_money(request.advance_amount.ok_or(FareError::AdvanceNotConfigured)?);
        if advance > total_payable {
            return Err(FareError::AdvanceExceedsTotal {
                advance,
                total: total_payable,
            });
        }
        (advance, advance, total_payable - advance)
    } else {
        (total_payable, Decimal::ZERO, Decimal::ZERO)
    };

    Ok(FareBreakdown {
        subtotal: round_money(subtotal),
        coupon_discount: round_money(coupon_discount),
        wallet_applied: round_money(wallet_applied),
        taxable_amount: round_money(taxable_amount),
        tax_amount: round_money(tax_amount),
        total_payable,
        amount_due,
        is_partial: request.is_partial,
        advance_paid,
        remaining_amount,
    })
}

fn check_non_negative(field: &'static str, value: Decimal) -> Result<(), FareError> {
    if value < Decimal::ZERO {
        return Err(FareError::NegativeInput { field, value });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use trekora_catalog::DiscountType;

    fn base_request() -> FareRequest {
        FareRequest {
            base_price_per_person: Decimal::from(5000),
            traveler_count: 2,
            promo: None,
            wallet_balance: Decimal::ZERO,
            use_wallet: false,
            tax_included: false,
            tax_percentage: Decimal::from(5),
            is_partial: false,
            advance_amount: None,
        }
    }

    fn fixed_coupon(value: i64) -> PromoCode {
        PromoCode::new(
            "TREK500",
            DiscountType::Fixed,
            Decimal::from(value),
            Some(100),
            Some(Utc::now() + Duration::days(30)),
        )
    }

    #[test]
    fn test_fixed_coupon_with_tax() {
        let request = FareRequest {
            promo: Some(fixed_coupon(500)),
            ..base_request()
        };
        let fare = compute_fare(&request, Utc::now()).unwrap();

        assert_eq!(fare.subtotal, Decimal::from(10000));
        assert_eq!(fare.coupon_discount, Decimal::from(500));
        assert_eq!(fare.taxable_amount, Decimal::from(9500));
        assert_eq!(fare.tax_amount, Decimal::from(475));
        assert_eq!(fare.total_payable, Decimal::from(9975));
        assert_eq!(fare.amount_due, Decimal::from(9975));
        assert_eq!(fare.wallet_applied, Decimal::ZERO);
        assert!(!fare.is_partial);
    }

    #[test]
    fn test_percentage_coupon() {
        let request = FareRequest {
            promo: Some(PromoCode::new(
                "SAVE10",
                DiscountType::Percentage,
                Decimal::from(10),
                None,
                None,
            )),
            ..base_request()
        };
        let fare = compute_fare(&request, Utc::now()).unwrap();

        assert_eq!(fare.coupon_discount, Decimal::from(1000));
        assert_eq!(fare.taxable_amount, Decimal::from(9000));
        assert_eq!(fare.tax_amount, Decimal::from(450));
        assert_eq!(fare.total_payable, Decimal::from(9450));
    }

    #[test]
    fn test_coupon_never_exceeds_subtotal() {
        let request = FareRequest {
            promo: Some(fixed_coupon(15000)),
            ..base_request()
        };
        let fare = compute_fare(&request, Utc::now()).unwrap();

        assert_eq!(fare.coupon_discount, Decimal::from(10000));
        assert_eq!(fare.taxable_amount, Decimal::ZERO);
        assert_eq!(fare.tax_amount, Decimal::ZERO);
        assert_eq!(fare.total_payable, Decimal::ZERO);
    }

    #[test]
    fn test_wallet_applied_after_coupon() {
        let request = FareRequest {
            promo: Some(fixed_coupon(500)),
            wallet_balance: Decimal::from(600),
            use_wallet: true,
            ..base_request()
        };
        let fare = compute_fare(&request, Utc::now()).unwrap();

        assert_eq!(fare.wallet_applied, Decimal::from(600));
        // 10000 - 500 - 600 + 475
        assert_eq!(fare.total_payable, Decimal::from(9375));
        // Tax is still computed on the pre-wallet amount.
        assert_eq!(fare.tax_amount, Decimal::from(475));
    }

    #[test]
    fn test_wallet_capped_by_remaining_payable() {
        let request = FareRequest {
            promo: Some(fixed_coupon(500)),
            wallet_balance: Decimal::from(20000),
            use_wallet: true,
            ..base_request()
        };
        let fare = compute_fare(&request, Utc::now()).unwrap();

        // Capped at subtotal - coupon, never the full balance.
        assert_eq!(fare.wallet_applied, Decimal::from(9500));
        // Only the tax remains payable.
        assert_eq!(fare.total_payable, Decimal::from(475));
    }

    #[test]
    fn test_wallet_ignored_when_not_requested() {
        let request = FareRequest {
            wallet_balance: Decimal::from(5000),
            use_wallet: false,
            ..base_request()
        };
        let fare = compute_fare(&request, Utc::now()).unwrap();
        assert_eq!(fare.wallet_applied, Decimal::ZERO);
        assert_eq!(fare.total_payable, Decimal::from(10500));
    }

    #[test]
    fn test_tax_included_price_adds_no_tax() {
        let request = FareRequest {
            tax_included: true,
            ..base_request()
        };
        let fare = compute_fare(&request, Utc::now()).unwrap();
        assert_eq!(fare.tax_amount, Decimal::ZERO);
        assert_eq!(fare.total_payable, Decimal::from(10000));
    }

    #[test]
    fn test_fractional_amounts_round_half_away_from_zero() {
        let request = FareRequest {
            base_price_per_person: Decimal::from(1583),
            traveler_count: 3,
            promo: Some(PromoCode::new(
                "SAVE10",
                DiscountType::Percentage,
                Decimal::from(10),
                None,
                None,
            )),
            ..base_request()
        };
        let fare = compute_fare(&request, Utc::now()).unwrap();

        // subtotal 4749, 10% coupon 474.9, taxable 4274.1, 5% tax 213.705
        assert_eq!(fare.subtotal, Decimal::from(4749));
        assert_eq!(fare.coupon_discount, Decimal::from(475));
        assert_eq!(fare.taxable_amount, Decimal::from(4274));
        assert_eq!(fare.tax_amount, Decimal::from(214));
        // 4749 - 474.9 + 213.705 = 4487.805, rounded once
        assert_eq!(fare.total_payable, Decimal::from(4488));
    }

    #[test]
    fn test_partial_booking_pins_amount_due_to_advance() {
        let request = FareRequest {
            is_partial: true,
            advance_amount: Some(Decimal::from(2000)),
            ..base_request()
        };
        let fare = compute_fare(&request, Utc::now()).unwrap();

        assert!(fare.is_partial);
        assert_eq!(fare.total_payable, Decimal::from(10500));
        assert_eq!(fare.amount_due, Decimal::from(2000));
        assert_eq!(fare.advance_paid, Decimal::from(2000));
        assert_eq!(fare.remaining_amount, Decimal::from(8500));
        assert_eq!(
            fare.advance_paid + fare.remaining_amount,
            fare.total_payable
        );
    }

    #[test]
    fn test_partial_booking_rejects_coupon() {
        let request = FareRequest {
            is_partial: true,
            advance_amount: Some(Decimal::from(2000)),
            promo: Some(fixed_coupon(500)),
            ..base_request()
        };
        assert_eq!(
            compute_fare(&request, Utc::now()),
            Err(FareError::DiscountOnSpotReservation)
        );
    }

    #[test]
    fn test_partial_booking_rejects_wallet() {
        let request = FareRequest {
            is_partial: true,
            advance_amount: Some(Decimal::from(2000)),
            use_wallet: true,
            wallet_balance: Decimal::from(100),
            ..base_request()
        };
        assert_eq!(
            compute_fare(&request, Utc::now()),
            Err(FareError::DiscountOnSpotReservation)
        );
    }

    #[test]
    fn test_partial_without_configured_advance_rejected() {
        let request = FareRequest {
            is_partial: true,
            advance_amount: None,
            ..base_request()
        };
        assert_eq!(
            compute_fare(&request, Utc::now()),
            Err(FareError::AdvanceNotConfigured)
        );
    }

    #[test]
    fn test_advance_exceeding_total_rejected() {
        let request = FareRequest {
            is_partial: true,
            advance_amount: Some(Decimal::from(20000)),
            ..base_request()
        };
        assert!(matches!(
            compute_fare(&request, Utc::now()),
            Err(FareError::AdvanceExceedsTotal { .. })
        ));
    }

    #[test]
    fn test_traveler_count_must_be_positive() {
        for count in [0, -3] {
            let request = FareRequest {
                traveler_count: count,
                ..base_request()
            };
            assert_eq!(
                compute_fare(&request, Utc::now()),
                Err(FareError::InvalidTravelerCount(count))
            );
        }
    }

    #[test]
    fn test_expired_promo_rejected_before_computation() {
        let mut promo = fixed_coupon(500);
        promo.expires_at = Some(Utc::now() - Duration::days(1));
        let request = FareRequest {
            promo: Some(promo),
            ..base_request()
        };
        assert!(matches!(
            compute_fare(&request, Utc::now()),
            Err(FareError::Promo(PromoRejection::Expired(_)))
        ));
    }

    #[test]
    fn test_negative_inputs_rejected() {
        let request = FareRequest {
            wallet_balance: Decimal::from(-10),
            ..base_request()
        };
        assert!(matches!(
            compute_fare(&request, Utc::now()),
            Err(FareError::NegativeInput { .. })
        ));
    }

    #[test]
    fn test_total_never_negative() {
        // A free trip with a generous coupon still settles at zero.
        let request = FareRequest {
            base_price_per_person: Decimal::ZERO,
            promo: Some(fixed_coupon(500)),
            ..base_request()
        };
        let fare = compute_fare(&request, Utc::now()).unwrap();
        assert_eq!(fare.total_payable, Decimal::ZERO);
        assert_eq!(fare.amount_due, Decimal::ZERO);
    }
}
