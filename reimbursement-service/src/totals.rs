use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use common_money::{aggregate_rounding_sum, RoundingMode};

use crate::model::{ExchangeRequiredCheck, ReturnItem};

/// Whether items flagged for exchange still count toward the refundable total.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ExchangeTotalPolicy {
    /// Exchanged items are settled by the replacement, not by cash.
    #[default]
    Exclude,
    /// Every attached item is refunded, exchanges ship on top.
    Include,
}

impl ExchangeTotalPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExchangeTotalPolicy::Exclude => "exclude",
            ExchangeTotalPolicy::Include => "include",
        }
    }

    pub fn counts(&self, item: &ReturnItem) -> bool {
        match self {
            ExchangeTotalPolicy::Exclude => !item.exchange_required(),
            ExchangeTotalPolicy::Include => true,
        }
    }
}

impl FromStr for ExchangeTotalPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "exclude" | "exclude_exchanges" => Ok(ExchangeTotalPolicy::Exclude),
            "include" | "include_exchanges" => Ok(ExchangeTotalPolicy::Include),
            other => Err(format!("unknown exchange total policy: {other}")),
        }
    }
}

/// Sum of item contributions, floored to cents once after summing.
pub fn calculated_total<'a, I>(items: I, policy: ExchangeTotalPolicy) -> BigDecimal
where
    I: IntoIterator<Item = &'a ReturnItem>,
{
    let contributions: Vec<BigDecimal> = items
        .into_iter()
        .filter(|item| policy.counts(item))
        .map(ReturnItem::total)
        .collect();
    aggregate_rounding_sum(&contributions, RoundingMode::Floor).into_inner()
}
