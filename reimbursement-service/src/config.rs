use anyhow::{anyhow, Context, Result};
use std::env;

use crate::totals::ExchangeTotalPolicy;

pub const DEFAULT_NUMBER_MAX_ATTEMPTS: u32 = 10;
pub const DEFAULT_COMMIT_MAX_ATTEMPTS: u32 = 3;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReimbursementConfig {
    pub exchange_policy: ExchangeTotalPolicy,
    /// Draws allowed before number generation gives up.
    pub number_max_attempts: u32,
    /// Allocate-and-commit rounds tried when payment capacity moves underneath a perform.
    pub commit_max_attempts: u32,
    pub audit_topic: String,
    pub source_service: String,
}

impl Default for ReimbursementConfig {
    fn default() -> Self {
        Self {
            exchange_policy: ExchangeTotalPolicy::default(),
            number_max_attempts: DEFAULT_NUMBER_MAX_ATTEMPTS,
            commit_max_attempts: DEFAULT_COMMIT_MAX_ATTEMPTS,
            audit_topic: "audit.events".to_string(),
            source_service: "reimbursement-service".to_string(),
        }
    }
}

pub fn load_reimbursement_config() -> Result<ReimbursementConfig> {
    let defaults = ReimbursementConfig::default();

    let exchange_policy = env::var("REIMBURSEMENT_EXCHANGE_POLICY")
        .ok()
        .and_then(|value| normalize_optional(&value))
        .map(|value| value.parse::<ExchangeTotalPolicy>().map_err(|err| anyhow!(err)))
        .transpose()
        .context("Failed to parse REIMBURSEMENT_EXCHANGE_POLICY")?
        .unwrap_or(defaults.exchange_policy);

    let number_max_attempts = attempts_from_env("REIMBURSEMENT_NUMBER_MAX_ATTEMPTS")?
        .unwrap_or(defaults.number_max_attempts);
    let commit_max_attempts = attempts_from_env("REIMBURSEMENT_COMMIT_MAX_ATTEMPTS")?
        .unwrap_or(defaults.commit_max_attempts);

    let audit_topic = env::var("REIMBURSEMENT_AUDIT_TOPIC")
        .ok()
        .and_then(|value| normalize_optional(&value))
        .unwrap_or(defaults.audit_topic);
    let source_service = env::var("REIMBURSEMENT_SOURCE_SERVICE")
        .ok()
        .and_then(|value| normalize_optional(&value))
        .unwrap_or(defaults.source_service);

    Ok(ReimbursementConfig {
        exchange_policy,
        number_max_attempts,
        commit_max_attempts,
        audit_topic,
        source_service,
    })
}

fn attempts_from_env(key: &str) -> Result<Option<u32>> {
    let Some(raw) = env::var(key).ok().and_then(|value| normalize_optional(&value)) else {
        return Ok(None);
    };
    let parsed = raw
        .parse::<u32>()
        .with_context(|| format!("Failed to parse {key} '{raw}'"))?;
    Ok(Some(parsed.max(1)))
}

fn normalize_optional(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attempts_are_clamped_to_one() {
        std::env::set_var("TEST_REIMB_ATTEMPTS_ZERO", "0");
        std::env::set_var("TEST_REIMB_ATTEMPTS_FIVE", " 5 ");
        std::env::set_var("TEST_REIMB_ATTEMPTS_BAD", "many");
        assert_eq!(attempts_from_env("TEST_REIMB_ATTEMPTS_ZERO").unwrap(), Some(1));
        assert_eq!(attempts_from_env("TEST_REIMB_ATTEMPTS_FIVE").unwrap(), Some(5));
        assert!(attempts_from_env("TEST_REIMB_ATTEMPTS_BAD").is_err());
        assert_eq!(attempts_from_env("TEST_REIMB_ATTEMPTS_UNSET").unwrap(), None);
    }

    #[test]
    fn defaults_exclude_exchanges() {
        let config = ReimbursementConfig::default();
        assert_eq!(config.exchange_policy, ExchangeTotalPolicy::Exclude);
        assert_eq!(config.number_max_attempts, 10);
        assert_eq!(config.commit_max_attempts, 3);
        assert_eq!(config.audit_topic, "audit.events");
    }
}
