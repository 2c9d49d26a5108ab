//! Faucet configuration, loaded once at startup from `.env`/environment.

use std::env;
use std::fmt;
use std::path::Path;
use std::time::Duration;

use eyre::{eyre, Result, WrapErr};
use serde::Deserialize;

use crate::amount;

/// Main configuration for the faucet service
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub chain: ChainConfig,
    pub faucet: FaucetConfig,
    pub server: ServerConfig,
}

/// Chain connection and signing configuration
#[derive(Clone, Deserialize)]
pub struct ChainConfig {
    /// LCD REST endpoint of the node (e.g. http://localhost:1317)
    pub lcd_url: String,
    pub chain_id: String,
    pub mnemonic: String,
    /// bech32 human-readable prefix recipients must carry
    #[serde(default = "default_address_prefix")]
    pub address_prefix: String,
    /// Base denom of the dispensed token
    #[serde(default = "default_denom")]
    pub denom: String,
    #[serde(default = "default_gas_limit")]
    pub gas_limit: u64,
    /// Fixed fee in base units attached to every transfer
    #[serde(default = "default_fee_amount")]
    pub fee_amount: u128,
    /// Base units the faucet account must retain after a transfer
    #[serde(default = "default_keep_alive_reserve")]
    pub keep_alive_reserve: u128,
}

/// Custom Debug that redacts the mnemonic to prevent accidental log leakage.
impl fmt::Debug for ChainConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChainConfig")
            .field("lcd_url", &self.lcd_url)
            .field("chain_id", &self.chain_id)
            .field("mnemonic", &"<redacted>")
            .field("address_prefix", &self.address_prefix)
            .field("denom", &self.denom)
            .field("gas_limit", &self.gas_limit)
            .field("fee_amount", &self.fee_amount)
            .field("keep_alive_reserve", &self.keep_alive_reserve)
            .finish()
    }
}

/// Dispensing policy configuration
#[derive(Debug, Clone, Deserialize)]
pub struct FaucetConfig {
    /// Human-readable decimal amount dispensed per request
    #[serde(default = "default_amount")]
    pub amount: String,
    /// Power-of-ten exponent between the display amount and base units
    #[serde(default = "default_decimals")]
    pub decimals: u32,
    #[serde(default = "default_symbol")]
    pub symbol: String,
    /// Network display name used in the invalid-address reply
    #[serde(default = "default_network")]
    pub network: String,
    #[serde(default = "default_cooldown_hours")]
    pub cooldown_hours: u64,
    /// Trigger prefix the chat collaborator strips (e.g. "!")
    #[serde(default = "default_command_prefix")]
    pub command_prefix: String,
}

impl FaucetConfig {
    pub fn cooldown(&self) -> Duration {
        Duration::from_secs(self.cooldown_hours * 3600)
    }
}

/// HTTP server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

/// Default functions
fn default_address_prefix() -> String {
    "terra".to_string()
}

fn default_denom() -> String {
    "uluna".to_string()
}

fn default_gas_limit() -> u64 {
    200_000
}

fn default_fee_amount() -> u128 {
    50_000
}

fn default_keep_alive_reserve() -> u128 {
    1_000_000
}

fn default_amount() -> String {
    "10".to_string()
}

fn default_decimals() -> u32 {
    6
}

fn default_symbol() -> String {
    "LUNC".to_string()
}

fn default_network() -> String {
    "Terra Classic".to_string()
}

fn default_cooldown_hours() -> u64 {
    24
}

fn default_command_prefix() -> String {
    "!".to_string()
}

fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    9123
}

impl Config {
    /// Load configuration from environment variables.
    /// Loads .env file if present, then reads from environment.
    pub fn load() -> Result<Self> {
        Self::load_from_file(".env").or_else(|_| Self::load_from_env())
    }

    /// Load from a specific .env file path
    pub fn load_from_file(path: &str) -> Result<Self> {
        if Path::new(path).exists() {
            dotenvy::from_filename(path)
                .wrap_err_with(|| format!("Failed to load .env file from {}", path))?;
        }
        Self::load_from_env()
    }

    /// Load configuration from environment variables
    fn load_from_env() -> Result<Self> {
        let chain = ChainConfig {
            lcd_url: env::var("FAUCET_LCD_URL")
                .map_err(|_| eyre!("FAUCET_LCD_URL environment variable is required"))?,
            chain_id: env::var("FAUCET_CHAIN_ID")
                .map_err(|_| eyre!("FAUCET_CHAIN_ID environment variable is required"))?,
            mnemonic: env::var("FAUCET_MNEMONIC")
                .map_err(|_| eyre!("FAUCET_MNEMONIC environment variable is required"))?,
            address_prefix: env::var("FAUCET_ADDRESS_PREFIX")
                .unwrap_or_else(|_| default_address_prefix()),
            denom: env::var("FAUCET_DENOM").unwrap_or_else(|_| default_denom()),
            gas_limit: env::var("FAUCET_GAS_LIMIT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default_gas_limit()),
            fee_amount: env::var("FAUCET_FEE_AMOUNT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default_fee_amount()),
            keep_alive_reserve: env::var("FAUCET_KEEP_ALIVE_RESERVE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default_keep_alive_reserve()),
        };

        let faucet = FaucetConfig {
            amount: env::var("FAUCET_AMOUNT").unwrap_or_else(|_| default_amount()),
            decimals: env::var("FAUCET_DECIMALS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default_decimals()),
            symbol: env::var("FAUCET_SYMBOL").unwrap_or_else(|_| default_symbol()),
            network: env::var("FAUCET_NETWORK").unwrap_or_else(|_| default_network()),
            cooldown_hours: env::var("FAUCET_COOLDOWN_HOURS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default_cooldown_hours()),
            command_prefix: env::var("FAUCET_COMMAND_PREFIX")
                .unwrap_or_else(|_| default_command_prefix()),
        };

        let server = ServerConfig {
            bind_address: env::var("FAUCET_BIND_ADDRESS")
                .unwrap_or_else(|_| default_bind_address()),
            port: env::var("FAUCET_PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default_port()),
        };

        let config = Config { chain, faucet, server };

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration. Fatal misconfiguration aborts startup here,
    /// never at dispense time.
    pub fn validate(&self) -> Result<()> {
        if self.chain.lcd_url.is_empty() {
            return Err(eyre!("chain.lcd_url cannot be empty"));
        }

        if self.chain.chain_id.is_empty() {
            return Err(eyre!("chain.chain_id cannot be empty"));
        }

        let mnemonic_words: Vec<&str> = self.chain.mnemonic.split_whitespace().collect();
        if mnemonic_words.len() < 12 {
            return Err(eyre!("chain.mnemonic must have at least 12 words"));
        }

        if self.chain.address_prefix.is_empty()
            || !self.chain.address_prefix.chars().all(|c| c.is_ascii_lowercase())
        {
            return Err(eyre!(
                "chain.address_prefix must be a non-empty lowercase bech32 prefix"
            ));
        }

        if self.chain.denom.is_empty() {
            return Err(eyre!("chain.denom cannot be empty"));
        }

        if self.chain.gas_limit == 0 {
            return Err(eyre!("chain.gas_limit cannot be zero"));
        }

        // The decimal-precision precondition: the configured amount must
        // convert exactly and be non-zero.
        let base_units = amount::to_base_units_u128(&self.faucet.amount, self.faucet.decimals)
            .wrap_err_with(|| {
                format!(
                    "faucet.amount '{}' is not valid for {} decimals",
                    self.faucet.amount, self.faucet.decimals
                )
            })?;
        if base_units == 0 {
            return Err(eyre!("faucet.amount must be greater than zero"));
        }

        if self.faucet.cooldown_hours == 0 {
            return Err(eyre!("faucet.cooldown_hours cannot be zero"));
        }

        if self.faucet.command_prefix.is_empty() {
            return Err(eyre!("faucet.command_prefix cannot be empty"));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> Config {
        Config {
            chain: ChainConfig {
                lcd_url: "http://localhost:1317".to_string(),
                chain_id: "rebel-2".to_string(),
                mnemonic: "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about".to_string(),
                address_prefix: default_address_prefix(),
                denom: default_denom(),
                gas_limit: default_gas_limit(),
                fee_amount: default_fee_amount(),
                keep_alive_reserve: default_keep_alive_reserve(),
            },
            faucet: FaucetConfig {
                amount: default_amount(),
                decimals: default_decimals(),
                symbol: default_symbol(),
                network: default_network(),
                cooldown_hours: default_cooldown_hours(),
                command_prefix: default_command_prefix(),
            },
            server: ServerConfig {
                bind_address: default_bind_address(),
                port: default_port(),
            },
        }
    }

    #[test]
    fn test_defaults() {
        assert_eq!(default_gas_limit(), 200_000);
        assert_eq!(default_fee_amount(), 50_000);
        assert_eq!(default_decimals(), 6);
        assert_eq!(default_cooldown_hours(), 24);
        assert_eq!(default_port(), 9123);
    }

    #[test]
    fn test_valid_config_passes() {
        assert!(test_config().validate().is_ok());
    }

    #[test]
    fn test_short_mnemonic_rejected() {
        let mut config = test_config();
        config.chain.mnemonic = "abandon abandon abandon".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_excess_amount_precision_rejected() {
        // More fractional digits than decimals allow is a startup error.
        let mut config = test_config();
        config.faucet.amount = "0.1234567".to_string();
        config.faucet.decimals = 6;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_amount_rejected() {
        let mut config = test_config();
        config.faucet.amount = "0".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_cooldown_rejected() {
        let mut config = test_config();
        config.faucet.cooldown_hours = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_bad_address_prefix_rejected() {
        let mut config = test_config();
        config.chain.address_prefix = "Terra".to_string();
        assert!(config.validate().is_err());

        config.chain.address_prefix = String::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_mnemonic_is_redacted_in_debug() {
        let config = test_config();
        let rendered = format!("{:?}", config.chain);
        assert!(rendered.contains("<redacted>"));
        assert!(!rendered.contains("abandon"));
    }

    #[test]
    fn test_cooldown_duration() {
        let config = test_config();
        assert_eq!(config.faucet.cooldown(), Duration::from_secs(24 * 3600));
    }
}
