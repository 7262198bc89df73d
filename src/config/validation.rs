//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, retry budgets > 0)
//! - Check that URLs and bind addresses parse
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: OrchestratorConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::fmt;
use std::net::SocketAddr;
use url::Url;

use crate::config::schema::OrchestratorConfig;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path of the offending field.
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Validate a parsed configuration.
pub fn validate_config(config: &OrchestratorConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if let Err(e) = Url::parse(&config.rpc.url) {
        errors.push(ValidationError::new("rpc.url", format!("invalid URL: {}", e)));
    }
    for (i, url) in config.rpc.failover_urls.iter().enumerate() {
        if let Err(e) = Url::parse(url) {
            errors.push(ValidationError::new(
                &format!("rpc.failover_urls[{}]", i),
                format!("invalid URL: {}", e),
            ));
        }
    }
    if config.rpc.timeout_secs == 0 {
        errors.push(ValidationError::new("rpc.timeout_secs", "must be greater than 0"));
    }

    let retries = &config.retries;
    for (field, value) in [
        ("retries.status_check_max_retries", retries.status_check_max_retries),
        ("retries.broadcast_max_retries", retries.broadcast_max_retries),
        ("retries.balance_check_max_retries", retries.balance_check_max_retries),
        ("retries.atomic_utxo_max_retries", retries.atomic_utxo_max_retries),
    ] {
        if value == 0 {
            errors.push(ValidationError::new(field, "must allow at least one attempt"));
        }
    }
    if retries.base_delay_ms > retries.max_delay_ms {
        errors.push(ValidationError::new(
            "retries.base_delay_ms",
            "must not exceed retries.max_delay_ms",
        ));
    }

    for (field, value) in [
        ("fees.p_fee_multiplier", config.fees.p_fee_multiplier),
        ("fees.c_base_fee_multiplier", config.fees.c_base_fee_multiplier),
    ] {
        if !value.is_finite() || value < 0.0 {
            errors.push(ValidationError::new(field, "must be a finite non-negative value"));
        }
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            "must be a socket address",
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate_config(&OrchestratorConfig::default()).is_ok());
    }

    #[test]
    fn test_bad_failover_url() {
        let mut config = OrchestratorConfig::default();
        config.rpc.failover_urls.push("not a url".to_string());
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors[0].field, "rpc.failover_urls[0]");
    }

    #[test]
    fn test_zero_budget_and_multiplier() {
        let mut config = OrchestratorConfig::default();
        config.retries.status_check_max_retries = 0;
        config.fees.c_base_fee_multiplier = -0.5;
        let errors = validate_config(&config).unwrap_err();
        let fields: Vec<_> = errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(
            fields,
            vec!["retries.status_check_max_retries", "fees.c_base_fee_multiplier"]
        );
    }

    #[test]
    fn test_metrics_address_checked_only_when_enabled() {
        let mut config = OrchestratorConfig::default();
        config.observability.metrics_address = "localhost".to_string();
        assert!(validate_config(&config).is_ok());

        config.observability.metrics_enabled = true;
        assert!(validate_config(&config).is_err());
    }
}
