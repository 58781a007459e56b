//! Configuration loading from TOML with environment variable resolution.
//!
//! Reads `config.toml` and deserializes into strongly-typed structs.
//! Secrets (RPC endpoint, account credentials) are referenced by env-var
//! name in the config and resolved at runtime via `std::env::var`, so the
//! file itself stays free of credentials.

use alloy_primitives::Address;
use anyhow::{Context, Result};
use secrecy::SecretString;
use serde::Deserialize;
use std::fs;

use crate::types::Account;

/// Top-level application configuration.
#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub oracle: OracleConfig,
    pub source: SourceConfig,
    pub chain: ChainConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct OracleConfig {
    pub name: String,
    /// Instrument detail pages, processed strictly sequentially so at most
    /// one transaction per account is in flight.
    pub start_urls: Vec<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SourceConfig {
    pub request_timeout_secs: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

fn default_user_agent() -> String {
    format!("NAVPOKE/{} (nav-oracle-updater)", env!("CARGO_PKG_VERSION"))
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChainConfig {
    pub rpc_url_env: String,
    pub registry_address_env: String,
    pub account_address_env: String,
    pub private_key_env: String,
    /// Bounded wait for a confirmation receipt.
    pub confirm_timeout_secs: u64,
    /// Receipt polling interval.
    pub confirm_poll_secs: u64,
    /// Overrides `eth_estimateGas` when set.
    #[serde(default)]
    pub gas_limit: Option<u64>,
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {path}"))?;
        let config: AppConfig = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {path}"))?;
        Ok(config)
    }

    /// Resolve an environment variable name to its value.
    /// Useful for loading secrets referenced in the config.
    pub fn resolve_env(env_name: &str) -> Result<String> {
        std::env::var(env_name)
            .with_context(|| format!("Environment variable not set: {env_name}"))
    }
}

impl ChainConfig {
    /// Node RPC endpoint URL.
    pub fn rpc_url(&self) -> Result<String> {
        AppConfig::resolve_env(&self.rpc_url_env)
    }

    /// Registry contract address.
    pub fn registry(&self) -> Result<Address> {
        let raw = AppConfig::resolve_env(&self.registry_address_env)?;
        raw.trim()
            .parse::<Address>()
            .with_context(|| format!("Invalid registry address in {}", self.registry_address_env))
    }

    /// The signing account. The private key goes straight into a
    /// `SecretString` and is never logged.
    pub fn account(&self) -> Result<Account> {
        let raw = AppConfig::resolve_env(&self.account_address_env)?;
        let address = raw
            .trim()
            .parse::<Address>()
            .with_context(|| format!("Invalid account address in {}", self.account_address_env))?;
        let key = AppConfig::resolve_env(&self.private_key_env)?;
        Ok(Account::new(address, SecretString::new(key)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_config() {
        // This test requires config.toml to be in the working directory.
        let result = AppConfig::load("config.toml");
        if let Ok(cfg) = result {
            assert_eq!(cfg.oracle.name, "NAVPOKE-001");
            assert!(!cfg.oracle.start_urls.is_empty());
            assert!(cfg.source.request_timeout_secs > 0);
            assert!(cfg.chain.confirm_timeout_secs > 0);
            assert!(cfg.chain.confirm_poll_secs > 0);
        }
        // If config.toml isn't found, that's acceptable in some test environments
    }

    #[test]
    fn test_parse_minimal_config() {
        let toml = r#"
            [oracle]
            name = "NAVPOKE-TEST"
            start_urls = ["https://example.com/fund"]

            [source]
            request_timeout_secs = 10

            [chain]
            rpc_url_env = "WEB3_HTTP_PROVIDER"
            registry_address_env = "REGISTRY_ADDRESS"
            account_address_env = "ACCOUNT_ADDRESS"
            private_key_env = "PRIVATE_KEY"
            confirm_timeout_secs = 60
            confirm_poll_secs = 2
        "#;
        let cfg: AppConfig = toml::from_str(toml).unwrap();
        assert_eq!(cfg.oracle.start_urls.len(), 1);
        assert!(cfg.chain.gas_limit.is_none());
        assert!(cfg.source.user_agent.starts_with("NAVPOKE/"));
    }

    #[test]
    fn test_resolve_env_missing() {
        let result = AppConfig::resolve_env("NAVPOKE_DEFINITELY_UNSET_VAR");
        assert!(result.is_err());
    }
}
