use rust_decimal::{Decimal, RoundingStrategy};

/// Monetary amounts are stored and settled in whole currency units.
pub const MONEY_DP: u32 = 0;

/// Rounds a monetary amount to its settlement precision, half away from zero.
///
/// Every calculator keeps intermediate values un-rounded and applies this
/// exactly once per output field, so repeated derivations of the same fare
/// or refund always agree to the unit.
pub fn round_money(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(MONEY_DP, RoundingStrategy::MidpointAwayFromZero)
}

/// Clamps a computed amount at zero. Discounts and wallet applications may
/// drive an intermediate below zero; payable amounts never go negative.
pub fn clamp_non_negative(value: Decimal) -> Decimal {
    value.max(Decimal::ZERO)
}

/// `percentage` percent of `amount`, un-rounded.
pub fn percentage_of(amount: Decimal, percentage: Decimal) -> Decimal {
    amount * percentage / Decimal::ONE_HUNDRED
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_money_half_away_from_zero() {
        assert_eq!(round_money(Decimal::new(4745, 1)), Decimal::from(475)); // 474.5
        assert_eq!(round_money(Decimal::new(4744, 1)), Decimal::from(474)); // 474.4
        assert_eq!(round_money(Decimal::new(-125, 1)), Decimal::from(-13)); // -12.5
    }

    #[test]
    fn test_round_money_whole_values_unchanged() {
        assert_eq!(round_money(Decimal::from(9975)), Decimal::from(9975));
        assert_eq!(round_money(Decimal::ZERO), Decimal::ZERO);
    }

    #[test]
    fn test_clamp_non_negative() {
        assert_eq!(clamp_non_negative(Decimal::from(-50)), Decimal::ZERO);
        assert_eq!(clamp_non_negative(Decimal::from(50)), Decimal::from(50));
        assert_eq!(clamp_non_negative(Decimal::ZERO), Decimal::ZERO);
    }

    #[test]
    fn test_percentage_of() {
        assert_eq!(
            percentage_of(Decimal::from(9500), Decimal::from(5)),
            Decimal::from(475)
        );
        assert_eq!(
            percentage_of(Decimal::from(10000), Decimal::ZERO),
            Decimal::ZERO
        );
    }
}
