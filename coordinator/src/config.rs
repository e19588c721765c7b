//! Coordinator configuration.

use crate::{Error, Result};
use potshot_chain::VaultConfig;
use std::time::Duration;

/// Default secret length in digits.
pub const DEFAULT_DIGITS: usize = 6;

/// Default lower bound for the secret length.
pub const DEFAULT_MIN_DIGITS: usize = 3;

/// Default upper bound for the secret length.
pub const DEFAULT_MAX_DIGITS: usize = 9;

/// Default buy-in for a fresh round, in the payment token's smallest unit.
pub const DEFAULT_BUY_IN: u128 = 1_000_000;

/// Default exact-position match count that triggers price escalation.
pub const DEFAULT_NEAR_MATCH_THRESHOLD: u32 = 3;

/// Default escalation step in basis points (1500 = +15%).
pub const DEFAULT_PRICE_INCREASE_BPS: u32 = 1500;

/// Default cap on escalation steps per round.
pub const DEFAULT_MAX_PRICE_STEPS: u32 = 10;

/// Default bound on each chain confirmation wait, in seconds.
pub const DEFAULT_CONFIRMATION_TIMEOUT_SECS: u64 = 90;

/// Everything the coordinator needs: vault connection parameters plus the
/// game parameters applied to each freshly opened round.
#[derive(Clone, Debug)]
pub struct CoordinatorConfig {
    pub rpc_url: String,
    pub vault_address: String,
    /// Absent means read-only: status queries work, anything that writes to
    /// the vault fails with [`Error::Configuration`].
    pub signer_key: Option<String>,
    pub chain_id: u64,
    pub confirmations: usize,
    pub confirmation_timeout_secs: u64,
    pub digit_count: usize,
    pub min_digits: usize,
    pub max_digits: usize,
    pub default_buy_in: u128,
    pub near_match_threshold: u32,
    pub price_increase_bps: u32,
    pub max_price_steps: u32,
}

impl CoordinatorConfig {
    /// Build a config from connection parameters plus game parameters read
    /// from the environment (with defaults).
    pub fn from_env(
        rpc_url: String,
        vault_address: String,
        signer_key: Option<String>,
        chain_id: u64,
        confirmations: usize,
        confirmation_timeout_secs: u64,
    ) -> Self {
        Self {
            rpc_url,
            vault_address,
            signer_key,
            chain_id,
            confirmations,
            confirmation_timeout_secs,
            digit_count: read_usize("POTSHOT_DIGITS", DEFAULT_DIGITS),
            min_digits: read_usize("POTSHOT_MIN_DIGITS", DEFAULT_MIN_DIGITS),
            max_digits: read_usize("POTSHOT_MAX_DIGITS", DEFAULT_MAX_DIGITS),
            default_buy_in: read_u128("POTSHOT_BUY_IN", DEFAULT_BUY_IN),
            near_match_threshold: read_u32(
                "POTSHOT_NEAR_MATCH_THRESHOLD",
                DEFAULT_NEAR_MATCH_THRESHOLD,
            ),
            price_increase_bps: read_u32("POTSHOT_PRICE_INCREASE_BPS", DEFAULT_PRICE_INCREASE_BPS),
            max_price_steps: read_u32("POTSHOT_MAX_PRICE_STEPS", DEFAULT_MAX_PRICE_STEPS),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.rpc_url.trim().is_empty() {
            return Err(Error::Configuration("rpc url is empty".to_string()));
        }
        if self.vault_address.trim().is_empty() {
            return Err(Error::Configuration("vault address is empty".to_string()));
        }
        if self.min_digits == 0 || self.min_digits > self.max_digits {
            return Err(Error::Configuration(format!(
                "invalid digit range [{}, {}]",
                self.min_digits, self.max_digits
            )));
        }
        if self.default_buy_in == 0 {
            return Err(Error::Configuration("buy-in must be positive".to_string()));
        }
        Ok(())
    }

    pub fn vault_config(&self) -> VaultConfig {
        VaultConfig {
            rpc_url: self.rpc_url.clone(),
            vault_address: self.vault_address.clone(),
            signer_key: self.signer_key.clone(),
            chain_id: self.chain_id,
            confirmations: self.confirmations,
            confirmation_timeout: Duration::from_secs(self.confirmation_timeout_secs),
        }
    }
}

fn read_usize(key: &str, fallback: usize) -> usize {
    std::env::var(key)
        .ok()
        .and_then(|raw| raw.parse::<usize>().ok())
        .unwrap_or(fallback)
}

fn read_u32(key: &str, fallback: u32) -> u32 {
    std::env::var(key)
        .ok()
        .and_then(|raw| raw.parse::<u32>().ok())
        .unwrap_or(fallback)
}

fn read_u128(key: &str, fallback: u128) -> u128 {
    std::env::var(key)
        .ok()
        .and_then(|raw| raw.parse::<u128>().ok())
        .unwrap_or(fallback)
}
