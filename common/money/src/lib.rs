use bigdecimal::BigDecimal;
use bigdecimal::ToPrimitive;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::Add;

/// Scale every monetary amount is stored at.
pub const MONEY_SCALE: i64 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RoundingMode {
    /// Ties move away from zero.
    HalfUp,
    /// Ties move to the even cent.
    Bankers,
    /// Drop extra digits (toward zero).
    Truncate,
    /// Toward negative infinity.
    Floor,
}

fn one_cent() -> BigDecimal {
    BigDecimal::from(1) / BigDecimal::from(100)
}

fn half_cent() -> BigDecimal {
    BigDecimal::from(5) / BigDecimal::from(1000)
}

fn cents_are_odd(truncated: &BigDecimal) -> bool {
    let cents = (truncated.clone() * BigDecimal::from(100)).with_scale(0);
    let halved = (cents.clone() / BigDecimal::from(2)).with_scale(0);
    halved * BigDecimal::from(2) != cents
}

/// Round a value to two decimal places using an explicit mode.
pub fn round_money(value: &BigDecimal, mode: RoundingMode) -> BigDecimal {
    let zero = BigDecimal::from(0);
    // with_scale truncates toward zero
    let truncated = value.with_scale(MONEY_SCALE);
    let remainder = value - &truncated;
    if remainder == zero {
        return truncated;
    }
    let away = |t: BigDecimal| -> BigDecimal {
        if value < &zero {
            t - one_cent()
        } else {
            t + one_cent()
        }
    };
    let rounded = match mode {
        RoundingMode::Truncate => truncated,
        RoundingMode::Floor => {
            if value < &zero {
                truncated - one_cent()
            } else {
                truncated
            }
        }
        RoundingMode::HalfUp => {
            if remainder.abs() >= half_cent() {
                away(truncated)
            } else {
                truncated
            }
        }
        RoundingMode::Bankers => {
            let magnitude = remainder.abs();
            let half = half_cent();
            if magnitude > half || (magnitude == half && cents_are_odd(&truncated)) {
                away(truncated)
            } else {
                truncated
            }
        }
    };
    rounded.with_scale(MONEY_SCALE)
}

/// Floor to whole cents. Reimbursement totals never round up in the customer's favour.
pub fn floor_to_cents(value: &BigDecimal) -> BigDecimal {
    round_money(value, RoundingMode::Floor)
}

/// Sum exactly, then round once.
pub fn aggregate_rounding_sum<'a, I>(values: I, mode: RoundingMode) -> Money
where
    I: IntoIterator<Item = &'a BigDecimal>,
{
    let exact = values
        .into_iter()
        .fold(BigDecimal::from(0), |acc, v| acc + v);
    Money(round_money(&exact, mode))
}

/// Two-decimal monetary amount. Construction always names its rounding mode.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, PartialOrd)]
pub struct Money(BigDecimal);

impl Money {
    pub fn with_mode(raw: &BigDecimal, mode: RoundingMode) -> Self {
        Self(round_money(raw, mode))
    }

    pub fn zero() -> Self {
        Self(BigDecimal::from(0).with_scale(MONEY_SCALE))
    }

    pub fn from_cents(cents: i64) -> Self {
        Self((BigDecimal::from(cents) / BigDecimal::from(100)).with_scale(MONEY_SCALE))
    }

    /// None when the amount does not fit in i64 cents.
    pub fn as_cents(&self) -> Option<i64> {
        (self.0.clone() * BigDecimal::from(100)).with_scale(0).to_i64()
    }

    pub fn into_inner(self) -> BigDecimal {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == BigDecimal::from(0)
    }
}

impl Add for Money {
    type Output = Money;
    fn add(self, rhs: Money) -> Money {
        Money(self.0 + rhs.0)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Money {
        iter.fold(Money::zero(), |acc, m| acc + m)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.with_scale(MONEY_SCALE))
    }
}

fn currency_symbol(currency: &str) -> Option<&'static str> {
    match currency {
        "USD" | "CAD" | "AUD" | "NZD" => Some("$"),
        "EUR" => Some("€"),
        "GBP" => Some("£"),
        "JPY" => Some("¥"),
        "INR" => Some("₹"),
        _ => None,
    }
}

fn minor_units(currency: &str) -> i64 {
    match currency {
        "JPY" | "KRW" | "CLP" | "VND" => 0,
        _ => MONEY_SCALE,
    }
}

fn group_thousands(digits: &str) -> String {
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (idx, ch) in digits.chars().enumerate() {
        if idx > 0 && (digits.len() - idx) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

/// Human readable amount, e.g. `$1,234.50` or `12.00 CHF` for currencies without a symbol.
pub fn format_money(amount: &BigDecimal, currency: &str) -> String {
    let code = currency.trim().to_ascii_uppercase();
    let scale = minor_units(&code);
    let rounded = if scale == MONEY_SCALE {
        round_money(amount, RoundingMode::HalfUp)
    } else {
        // round whole units by rounding hundreds to cents
        round_money(&(amount.clone() / BigDecimal::from(100)), RoundingMode::HalfUp)
            * BigDecimal::from(100)
    }
    .with_scale(scale);
    let negative = rounded < BigDecimal::from(0);
    let text = rounded.abs().to_string();
    let (whole, fraction) = match text.split_once('.') {
        Some((w, f)) => (w.to_string(), Some(f.to_string())),
        None => (text, None),
    };
    let mut body = group_thousands(&whole);
    if let Some(fraction) = fraction {
        body.push('.');
        body.push_str(&fraction);
    }
    let sign = if negative { "-" } else { "" };
    match currency_symbol(&code) {
        Some(symbol) => format!("{sign}{symbol}{body}"),
        None => format!("{sign}{body} {code}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn dec(s: &str) -> BigDecimal {
        BigDecimal::from_str(s).unwrap()
    }

    #[test]
    fn floor_never_rounds_up() {
        assert_eq!(floor_to_cents(&dec("20.006")).to_string(), "20.00");
        assert_eq!(floor_to_cents(&dec("10.999")).to_string(), "10.99");
        assert_eq!(floor_to_cents(&dec("-1.001")).to_string(), "-1.01");
        assert_eq!(floor_to_cents(&dec("3")).to_string(), "3.00");
    }

    #[test]
    fn half_up_and_truncate() {
        assert_eq!(round_money(&dec("1.005"), RoundingMode::HalfUp).to_string(), "1.01");
        assert_eq!(round_money(&dec("-1.005"), RoundingMode::HalfUp).to_string(), "-1.01");
        assert_eq!(round_money(&dec("12.3456"), RoundingMode::Truncate).to_string(), "12.34");
        assert_eq!(round_money(&dec("-12.3456"), RoundingMode::Truncate).to_string(), "-12.34");
    }

    #[test]
    fn bankers_ties_go_even() {
        assert_eq!(round_money(&dec("2.345"), RoundingMode::Bankers).to_string(), "2.34");
        assert_eq!(round_money(&dec("2.355"), RoundingMode::Bankers).to_string(), "2.36");
        assert_eq!(round_money(&dec("2.3451"), RoundingMode::Bankers).to_string(), "2.35");
    }

    #[test]
    fn aggregate_rounds_once() {
        let values = vec![dec("10.003"), dec("10.003")];
        assert_eq!(aggregate_rounding_sum(&values, RoundingMode::Floor).to_string(), "20.00");
        let empty: Vec<BigDecimal> = Vec::new();
        assert!(aggregate_rounding_sum(&empty, RoundingMode::Floor).is_zero());
    }

    #[test]
    fn money_cents_round_trip() {
        let m = Money::from_cents(1234);
        assert_eq!(m.to_string(), "12.34");
        assert_eq!(m.as_cents(), Some(1234));
        let total: Money = vec![Money::from_cents(5), Money::from_cents(95)].into_iter().sum();
        assert_eq!(total.as_cents(), Some(100));
    }

    #[test]
    fn formats_with_currency() {
        assert_eq!(format_money(&dec("1234.5"), "USD"), "$1,234.50");
        assert_eq!(format_money(&dec("20"), "eur"), "€20.00");
        assert_eq!(format_money(&dec("-5"), "USD"), "-$5.00");
        assert_eq!(format_money(&dec("12"), "CHF"), "12.00 CHF");
        assert_eq!(format_money(&dec("1500"), "JPY"), "¥1,500");
    }
}
