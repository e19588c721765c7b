use ethers::types::{Address, Signature, U256};
use serde::{Deserialize, Serialize};

/// A player-signed payment authorization as it arrives off the wire.
///
/// Fields the verifier must check for presence are optional here so a
/// missing or malformed value is detectable rather than defaulted. The
/// verified form is [`PaymentAuthorization`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AuthorizationPayload {
    pub round_id: u64,
    /// 0x-hex address of the payer. Must resolve to the claimed player.
    pub payer_address: String,
    /// Stake in the payment token's smallest unit, as a decimal string.
    pub amount: Option<String>,
    /// Unix-seconds deadline baked into the signed authorization.
    pub deadline: Option<u64>,
    /// Single-use nonce, as a decimal string.
    pub nonce: Option<String>,
    /// 65-byte recoverable signature (`r || s || v`), 0x-hex.
    pub signature: Option<String>,
}

/// A verified, fully-typed payment authorization ready for the vault's
/// payment entry point. Single-use: consumed exactly once, tracked by the
/// coordinator's processed-payment set keyed on `(payer, nonce)`.
#[derive(Clone, Debug)]
pub struct PaymentAuthorization {
    pub round_id: u64,
    pub payer: Address,
    pub amount: U256,
    pub deadline: U256,
    pub nonce: U256,
    pub signature: Signature,
}

/// Authoritative outcome of an on-chain payment, decoded from the vault's
/// payment event (amounts and counters come from the ledger, not from the
/// caller's claims).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PaymentResult {
    pub round_id: u64,
    /// Amount actually pulled from the payer, smallest unit.
    pub amount: u128,
    /// Pot after this payment landed.
    pub pot_after: u128,
    /// Total paid guesses in the round after this payment.
    pub guess_count: u64,
    /// Buy-in read back from the round record after the payment.
    pub buy_in_after: u128,
}

/// Binds the coordinator to a sealed target before any guess is accepted.
///
/// Created by the sealer, optionally attested with the coordinator's wallet,
/// and consumed by the vault client when opening the round on-chain.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TargetCommitment {
    /// Hex-encoded SHA-256 over `"{round_id}:{target_secret}"`.
    pub digest: String,
    /// Human-readable message binding round id and digest.
    pub attestation_message: String,
    /// Present when the coordinator holds a signer key.
    pub signature: Option<String>,
    pub signer_address: Option<Address>,
    /// Unix seconds at sealing.
    pub committed_at: u64,
}
