//! Round coordinator for the potshot sealed-number game.
//!
//! The coordinator holds the one piece of state the ledger cannot: the sealed
//! secret target. Everything economic (buy-in, pot, guess count) is owned by
//! the vault contract; the in-memory round here is a cache that must always
//! be reconcilable from the ledger plus the locally-held secret.
//!
//! The entire guess-submission protocol runs inside a single-writer critical
//! section (one `tokio::sync::Mutex` over the round, its phase, and the
//! processed-payment set). Overlapping submissions would otherwise read a
//! stale pot or both believe they hit the exact match; read-only status
//! queries take the lock only long enough to clone a snapshot.

pub mod config;
pub mod ledger;
pub mod service;
pub mod verifier;

#[cfg(any(test, feature = "mocks"))]
pub mod mocks;

#[cfg(test)]
mod tests;

pub use config::CoordinatorConfig;
pub use ledger::Ledger;
pub use service::{Coordinator, CoordinatorStatus, GuessOutcome};

use thiserror::Error;

/// Error type for coordinator operations.
///
/// A closed taxonomy: callers branch on the variant, not on message text.
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed guess, wrong length, or an already-settled round. Rejected
    /// without a ledger call except where the protocol deliberately
    /// validates after payment (see [`service::Coordinator::submit_guess`]).
    #[error("invalid guess: {0}")]
    Validation(String),
    /// Signature, payer, or round mismatch, or missing authorization fields.
    /// Always rejected before any ledger call.
    #[error("authorization rejected: {0}")]
    Authorization(String),
    /// The `(payer, nonce)` pair was already consumed this session. Always
    /// rejected before any ledger call.
    #[error("authorization from {player} with nonce {nonce} already used")]
    Replay { player: String, nonce: String },
    /// Transaction reverted, payment event missing, or a read failed. Not
    /// retried automatically; the ledger stays authoritative for any later
    /// reconciliation.
    #[error("ledger error: {0}")]
    Chain(#[source] potshot_chain::Error),
    /// A bounded confirmation wait elapsed. Local state is unchanged and the
    /// operation is safe to retry.
    #[error("ledger confirmation timed out: {0}")]
    ChainTimeout(#[source] potshot_chain::Error),
    /// Missing signer key or vault address. Fatal for the affected
    /// capability; read-only status queries are still served.
    #[error("coordinator misconfigured: {0}")]
    Configuration(String),
}

impl From<potshot_chain::Error> for Error {
    fn from(err: potshot_chain::Error) -> Self {
        use potshot_chain::Error as ChainError;
        match err {
            err @ ChainError::ConfirmationTimeout { .. } => Error::ChainTimeout(err),
            ChainError::SignerMissing => {
                Error::Configuration(ChainError::SignerMissing.to_string())
            }
            other => Error::Chain(other),
        }
    }
}

/// Result type for coordinator operations.
pub type Result<T> = std::result::Result<T, Error>;
