use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use trekora_catalog::CancellationRule;
use trekora_shared::{percentage_of, round_money};

/// Outcome of evaluating a cancellation request against a trip's refund
/// policy. `cancellable == false` means the request falls inside the
/// operational buffer and no tier was evaluated.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RefundQuote {
    pub lead_days: i64,
    pub refund_percentage: Decimal,
    pub refund_amount: Decimal,
    pub cancellable: bool,
}

#[derive(Debug, Clone, thiserror::Error, PartialEq)]
pub enum RefundError {
    #[error("Booking amount cannot be negative, got {0}")]
    NegativeAmount(Decimal),

    #[error("Malformed cancellation rule: refund percentage {0} outside 0..=100")]
    InvalidRulePercentage(Decimal),

    #[error("Malformed cancellation rule: negative threshold {0}")]
    NegativeThreshold(i64),
}

/// Derives the refund owed for cancelling `amount_paid` ahead of
/// `batch_start`.
///
/// Lead time uses calendar days. Rules are walked most-restrictive-first:
/// the highest `days_before_departure` threshold the lead time still
/// satisfies wins, so cancelling earlier never lands a worse tier than
/// cancelling later. No threshold met means no refund.
pub fn compute_refund(
    amount_paid: Decimal,
    batch_start: DateTime<Utc>,
    now: DateTime<Utc>,
    rules: &[CancellationRule],
    buffer_days: i64,
) -> Result<RefundQuote, RefundError> {
    if amount_paid < Decimal::ZERO {
        return Err(RefundError::NegativeAmount(amount_paid));
    }

    let lead_days = (batch_start.date_naive() - now.date_naive()).num_days();

    // Inside the buffer the request is refused outright; the rule table is
    // never consulted.
    if lead_days <= buffer_days {
        return Ok(RefundQuote {
            lead_days,
            refund_percentage: Decimal::ZERO,
            refund_amount: Decimal::ZERO,
            cancellable: false,
        });
    }

    for rule in rules {
        if rule.days_before_departure < 0 {
            return Err(RefundError::NegativeThreshold(rule.days_before_departure));
        }
        if rule.refund_percentage < Decimal::ZERO || rule.refund_percentage > Decimal::ONE_HUNDRED
        {
            return Err(RefundError::InvalidRulePercentage(rule.refund_percentage));
        }
    }

    let mut sorted: Vec<&CancellationRule> = rules.iter().collect();
    sorted.sort_by(|a, b| b.days_before_departure.cmp(&a.days_before_departure));

    let refund_percentage = sorted
        .iter()
        .find(|rule| lead_days >= rule.days_before_departure)
        .map(|rule| rule.refund_percentage)
        .unwrap_or(Decimal::ZERO);

    Ok(RefundQuote {
        lead_days,
        refund_percentage,
        refund_amount: round_money(percentage_of(amount_paid, refund_percentage)),
        cancellable: true,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn standard_rules() -> Vec<CancellationRule> {
        // Deliberately out of order; the calculator sorts.
        vec![
            CancellationRule {
                days_before_departure: 15,
                refund_percentage: Decimal::from(50),
            },
            CancellationRule {
                days_before_departure: 30,
                refund_percentage: Decimal::from(100),
            },
            CancellationRule {
                days_before_departure: 7,
                refund_percentage: Decimal::from(25),
            },
        ]
    }

    fn quote_at(lead_days: i64) -> RefundQuote {
        let now = Utc::now();
        compute_refund(
            Decimal::from(10000),
            now + Duration::days(lead_days),
            now,
            &standard_rules(),
            1,
        )
        .unwrap()
    }

    #[test]
    fn test_tier_selection_twenty_days_out() {
        let quote = quote_at(20);
        assert!(quote.cancellable);
        assert_eq!(quote.lead_days, 20);
        assert_eq!(quote.refund_percentage, Decimal::from(50));
        assert_eq!(quote.refund_amount, Decimal::from(5000));
    }

    #[test]
    fn test_full_refund_tier() {
        let quote = quote_at(45);
        assert_eq!(quote.refund_percentage, Decimal::from(100));
        assert_eq!(quote.refund_amount, Decimal::from(10000));
    }

    #[test]
    fn test_no_tier_met_means_zero_refund() {
        let quote = quote_at(5);
        assert!(quote.cancellable);
        assert_eq!(quote.refund_percentage, Decimal::ZERO);
        assert_eq!(quote.refund_amount, Decimal::ZERO);
    }

    #[test]
    fn test_threshold_boundary_is_inclusive() {
        let quote = quote_at(15);
        assert_eq!(quote.refund_percentage, Decimal::from(50));
        let quote = quote_at(14);
        assert_eq!(quote.refund_percentage, Decimal::from(25));
    }

    #[test]
    fn test_inside_buffer_rejected_regardless_of_rules() {
        for lead_days in [1, 0, -2] {
            let quote = quote_at(lead_days);
            assert!(!quote.cancellable, "lead_days {} should be refused", lead_days);
            assert_eq!(quote.refund_percentage, Decimal::ZERO);
            assert_eq!(quote.refund_amount, Decimal::ZERO);
        }
    }

    #[test]
    fn test_hours_before_departure_counts_as_same_day() {
        // 12 hours out is at most one calendar day of lead time, which a
        // one-day buffer refuses.
        let departure = Utc.with_ymd_and_hms(2026, 3, 12, 6, 0, 0).unwrap();
        let now = Utc.with_ymd_and_hms(2026, 3, 11, 18, 0, 0).unwrap();
        let quote =
            compute_refund(Decimal::from(10000), departure, now, &standard_rules(), 1).unwrap();
        assert_eq!(quote.lead_days, 1);
        assert!(!quote.cancellable);
    }

    #[test]
    fn test_calendar_days_not_elapsed_hours() {
        // 26 hours apart but two calendar-date boundaries.
        let departure = Utc.with_ymd_and_hms(2026, 3, 12, 1, 0, 0).unwrap();
        let now = Utc.with_ymd_and_hms(2026, 3, 10, 23, 0, 0).unwrap();
        let quote =
            compute_refund(Decimal::from(10000), departure, now, &standard_rules(), 1).unwrap();
        assert_eq!(quote.lead_days, 2);
        assert!(quote.cancellable);
    }

    #[test]
    fn test_refund_monotonically_non_increasing_toward_departure() {
        let mut previous = Decimal::from(100);
        for lead_days in (2..=40).rev() {
            let pct = quote_at(lead_days).refund_percentage;
            assert!(
                pct <= previous,
                "refund at {} days ({}) exceeds refund at {} days ({})",
                lead_days,
                pct,
                lead_days + 1,
                previous
            );
            previous = pct;
        }
    }

    #[test]
    fn test_refund_amount_rounds_half_away_from_zero() {
        let now = Utc::now();
        let quote = compute_refund(
            Decimal::from(9975),
            now + Duration::days(20),
            now,
            &standard_rules(),
            1,
        )
        .unwrap();
        // 50% of 9975 = 4987.5
        assert_eq!(quote.refund_amount, Decimal::from(4988));
    }

    #[test]
    fn test_empty_rule_table_means_zero_refund() {
        let now = Utc::now();
        let quote =
            compute_refund(Decimal::from(10000), now + Duration::days(20), now, &[], 1).unwrap();
        assert!(quote.cancellable);
        assert_eq!(quote.refund_percentage, Decimal::ZERO);
    }

    #[test]
    fn test_malformed_rules_raise() {
        let now = Utc::now();
        let overfull = vec![CancellationRule {
            days_before_departure: 10,
            refund_percentage: Decimal::from(150),
        }];
        assert_eq!(
            compute_refund(
                Decimal::from(10000),
                now + Duration::days(20),
                now,
                &overfull,
                1
            ),
            Err(RefundError::InvalidRulePercentage(Decimal::from(150)))
        );

        let negative = vec![CancellationRule {
            days_before_departure: -3,
            refund_percentage: Decimal::from(50),
        }];
        assert_eq!(
            compute_refund(
                Decimal::from(10000),
                now + Duration::days(20),
                now,
                &negative,
                1
            ),
            Err(RefundError::NegativeThreshold(-3))
        );
    }

    #[test]
    fn test_negative_amount_raises() {
        let now = Utc::now();
        assert_eq!(
            compute_refund(
                Decimal::from(-100),
                now + Duration::days(20),
                now,
                &standard_rules(),
                1
            ),
            Err(RefundError::NegativeAmount(Decimal::from(-100)))
        );
    }
}
