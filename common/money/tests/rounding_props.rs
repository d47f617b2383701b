use bigdecimal::BigDecimal;
use common_money::{aggregate_rounding_sum, floor_to_cents, round_money, Money, RoundingMode};
use proptest::prelude::*;
use std::str::FromStr;

// Thousandths as integers keep the expectations exact.
fn thousandths(v: i64) -> BigDecimal {
    BigDecimal::from(v) / BigDecimal::from(1000)
}

proptest! {
    #[test]
    fn floor_is_greatest_cent_not_above(v in -10_000_000i64..10_000_000) {
        let value = thousandths(v);
        let floored = floor_to_cents(&value);
        let expected_cents = v.div_euclid(10);
        prop_assert_eq!(floored.clone(), Money::from_cents(expected_cents).into_inner());
        prop_assert!(floored <= value);
    }

    #[test]
    fn sum_then_floor_matches_integer_math(parts in proptest::collection::vec(0i64..1_000_000, 0..20)) {
        let values: Vec<BigDecimal> = parts.iter().copied().map(thousandths).collect();
        let got = aggregate_rounding_sum(&values, RoundingMode::Floor);
        let expected = Money::from_cents(parts.iter().sum::<i64>().div_euclid(10));
        prop_assert_eq!(got, expected);
    }

    // Half-up moves a .5 cent tie away from zero.
    #[test]
    fn half_up_midpoint_behavior(base_cents in -10_000i64..10_000) {
        let tie = thousandths(base_cents * 10 + if base_cents < 0 { -5 } else { 5 });
        let got = round_money(&tie, RoundingMode::HalfUp);
        let expected = Money::from_cents(base_cents + if base_cents < 0 { -1 } else { 1 });
        prop_assert_eq!(got, expected.into_inner());
    }

    // Bankers rounding lands on an even cent for exact ties.
    #[test]
    fn bankers_tie_even(base_cents in 0i64..100_000) {
        let tie = thousandths(base_cents * 10 + 5);
        let got = Money::with_mode(&tie, RoundingMode::Bankers);
        let cents = got.as_cents().unwrap();
        prop_assert_eq!(cents % 2, 0, "input={} got={}", tie, got);
        prop_assert!(cents == base_cents || cents == base_cents + 1);
    }

    #[test]
    fn truncate_never_exceeds_half_up(v in 0..10_000_000i64) {
        let value = thousandths(v);
        let truncated = round_money(&value, RoundingMode::Truncate);
        let half_up = round_money(&value, RoundingMode::HalfUp);
        prop_assert!(truncated <= half_up, "orig={} trunc={} halfup={}", value, truncated, half_up);
    }
}

#[test]
fn two_items_of_ten_point_zero_zero_three() {
    let values = vec![
        BigDecimal::from_str("10.003").unwrap(),
        BigDecimal::from_str("10.003").unwrap(),
    ];
    let per_item: Money = values
        .iter()
        .map(|v| Money::with_mode(v, RoundingMode::HalfUp))
        .sum();
    let aggregated = aggregate_rounding_sum(&values, RoundingMode::Floor);
    assert_eq!(aggregated.to_string(), "20.00");
    assert_eq!(per_item.to_string(), "20.00");
    let ceilingish = aggregate_rounding_sum(&values, RoundingMode::HalfUp);
    assert_eq!(ceilingish.to_string(), "20.01");
}
