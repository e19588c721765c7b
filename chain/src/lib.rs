//! Vault contract client for the potshot coordinator.
//!
//! Every state-changing call blocks until the transaction is confirmed to the
//! configured depth (bounded by a timeout) and its receipt status is checked;
//! reads are synchronous round-trips with no caching. The coordinator's
//! in-memory round is the only cache, and it is rebuilt from this client's
//! reads whenever it disagrees with the ledger.

pub mod vault;

pub use vault::{RoundRecord, VaultClient, VaultConfig};

use thiserror::Error;

/// Error type for vault operations.
#[derive(Error, Debug)]
pub enum Error {
    #[error("rpc error: {0}")]
    Rpc(String),
    #[error("transaction rejected before submission: {reason}")]
    Rejected { reason: String },
    #[error("transaction {tx_hash} reverted")]
    Reverted { tx_hash: String },
    #[error("transaction {tx_hash} dropped without a receipt")]
    MissingReceipt { tx_hash: String },
    #[error("no payment event for {player} in receipt {tx_hash}")]
    PaymentEventNotFound { player: String, tx_hash: String },
    #[error("round {round_id} on the ledger does not carry the sealed commitment")]
    CommitmentMismatch { round_id: u64 },
    #[error("timed out after {waited_secs}s waiting for confirmation of {tx_hash}")]
    ConfirmationTimeout { tx_hash: String, waited_secs: u64 },
    #[error("{context} {value} exceeds the supported range")]
    ValueOutOfRange {
        context: &'static str,
        value: String,
    },
    #[error("invalid vault address: {0}")]
    InvalidVaultAddress(String),
    #[error("invalid signer key")]
    InvalidSignerKey,
    #[error("no signer key configured; vault writes are disabled")]
    SignerMissing,
    #[error("signing failed: {0}")]
    Signing(String),
}

/// Result type for vault operations.
pub type Result<T> = std::result::Result<T, Error>;
