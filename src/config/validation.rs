//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate URLs and the registry contract address
//! - Validate value ranges (threshold > 0, attempts > 0, ttl > 0)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: EngineConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use alloy::primitives::Address;
use thiserror::Error;

use crate::config::schema::EngineConfig;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{field}: invalid URL '{value}'")]
    InvalidUrl { field: &'static str, value: String },

    #[error("ledger.contract_address: invalid address '{0}'")]
    InvalidContractAddress(String),

    #[error("{0} must be greater than zero")]
    Zero(&'static str),

    #[error("ledger.gas_price_multiplier must be at least 1.0, got {0}")]
    GasMultiplier(String),

    #[error("{0} must not be empty")]
    Empty(&'static str),
}

/// Validate a parsed configuration.
pub fn validate_config(config: &EngineConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    check_url(&mut errors, "ledger.rpc_url", &config.ledger.rpc_url);
    for url in &config.ledger.failover_urls {
        check_url(&mut errors, "ledger.failover_urls", url);
    }

    if config.ledger.contract_address.parse::<Address>().is_err() {
        errors.push(ValidationError::InvalidContractAddress(
            config.ledger.contract_address.clone(),
        ));
    }
    if config.ledger.private_key_env.trim().is_empty() {
        errors.push(ValidationError::Empty("ledger.private_key_env"));
    }
    if config.ledger.default_gas_limit == 0 {
        errors.push(ValidationError::Zero("ledger.default_gas_limit"));
    }
    if config.ledger.gas_price_multiplier < 1.0 {
        errors.push(ValidationError::GasMultiplier(
            config.ledger.gas_price_multiplier.to_string(),
        ));
    }
    if config.ledger.retry.max_attempts == 0 {
        errors.push(ValidationError::Zero("ledger.retry.max_attempts"));
    }

    if config.monitor.confirmation_threshold == 0 {
        errors.push(ValidationError::Zero("monitor.confirmation_threshold"));
    }
    if config.monitor.max_attempts == 0 {
        errors.push(ValidationError::Zero("monitor.max_attempts"));
    }

    if config.cache.ttl_secs == 0 {
        errors.push(ValidationError::Zero("cache.ttl_secs"));
    }
    if config.cache.sweep_interval_secs == 0 {
        errors.push(ValidationError::Zero("cache.sweep_interval_secs"));
    }

    if let Some(explorer) = &config.secondary.explorer {
        check_url(&mut errors, "secondary.explorer.base_url", &explorer.base_url);
    }
    if let Some(permissioned) = &config.secondary.permissioned {
        check_url(
            &mut errors,
            "secondary.permissioned.gateway_url",
            &permissioned.gateway_url,
        );
        if permissioned.channel.trim().is_empty() {
            errors.push(ValidationError::Empty("secondary.permissioned.channel"));
        }
    }

    if config.admin.api_key.is_empty() {
        errors.push(ValidationError::Empty("admin.api_key"));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_url(errors: &mut Vec<ValidationError>, field: &'static str, value: &str) {
    if url::Url::parse(value).is_err() {
        errors.push(ValidationError::InvalidUrl {
            field,
            value: value.to_string(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::PermissionedConfig;

    fn valid_config() -> EngineConfig {
        let mut config = EngineConfig::default();
        config.ledger.contract_address = "0x5FbDB2315678afecb367f032d93F642f64180aa3".to_string();
        config
    }

    #[test]
    fn test_valid_config() {
        assert!(validate_config(&valid_config()).is_ok());
    }

    #[test]
    fn test_collects_all_errors() {
        let mut config = valid_config();
        config.ledger.rpc_url = "not a url".to_string();
        config.ledger.contract_address = "0x1234".to_string();
        config.monitor.confirmation_threshold = 0;
        config.secondary.permissioned = Some(PermissionedConfig {
            gateway_url: "http://gw:4000".to_string(),
            channel: " ".to_string(),
            auth_token: String::new(),
            timeout_secs: 5,
        });

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 4);
        assert!(errors.contains(&ValidationError::Zero("monitor.confirmation_threshold")));
        assert!(errors.contains(&ValidationError::Empty("secondary.permissioned.channel")));
    }

    #[test]
    fn test_gas_multiplier_below_one() {
        let mut config = valid_config();
        config.ledger.gas_price_multiplier = 0.5;
        let errors = validate_config(&config).unwrap_err();
        assert!(errors[0].to_string().contains("0.5"));
    }
}
