//! Target generation and sealing for provably fair rounds.
//!
//! ## Seal flow
//!
//! 1. **Generate** - Draw a fixed-length decimal secret from a CSPRNG
//! 2. **Seal** - Publish `digest = SHA-256("{round_id}:{secret}")` on the
//!    ledger before any guess is accepted
//! 3. **Verify** - After settlement (or on bootstrap adoption), anyone with
//!    the secret can check `hash(round_id, secret) == digest`
//!
//! The digest binds the coordinator to one target per round id: the round id
//! is part of the pre-image, so a secret cannot be replayed across rounds.

use rand::{CryptoRng, RngCore};
use sha2::{Digest, Sha256};

/// Length of the commitment digest in bytes.
pub const DIGEST_LEN: usize = 32;

/// A freshly generated secret and its binding commitment.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SealedTarget {
    /// Fixed-length decimal secret. Held in memory only; there is no
    /// on-chain backup.
    pub secret: String,
    /// Hex-encoded commitment digest for display and verification.
    pub digest: String,
    /// The same digest in the fixed-size form the vault contract stores.
    pub digest_bytes: [u8; DIGEST_LEN],
}

/// Clamp a requested digit count into the configured `[min, max]` range.
pub fn clamp_digit_count(requested: usize, min: usize, max: usize) -> usize {
    requested.clamp(min, max)
}

/// Draw a decimal secret of exactly `digit_count` digits: one random byte per
/// digit, reduced modulo 10. Leading zeros are legitimate digits, so the
/// result is structurally left-padded to the full length.
fn generate_target(digit_count: usize, rng: &mut (impl RngCore + CryptoRng)) -> String {
    let mut bytes = vec![0u8; digit_count];
    rng.fill_bytes(&mut bytes);
    bytes
        .into_iter()
        .map(|byte| char::from(b'0' + byte % 10))
        .collect()
}

/// Generate and seal a new round target.
///
/// `digit_count` is clamped to `[min_digits, max_digits]` before the draw, so
/// an out-of-range request cannot produce an invalid round. Pure computation:
/// the caller is responsible for publishing the digest before accepting
/// guesses.
pub fn seal_round(
    round_id: u64,
    digit_count: usize,
    min_digits: usize,
    max_digits: usize,
    rng: &mut (impl RngCore + CryptoRng),
) -> SealedTarget {
    let digit_count = clamp_digit_count(digit_count, min_digits, max_digits);
    let secret = generate_target(digit_count, rng);
    let digest_bytes = commitment_digest_bytes(round_id, &secret);
    SealedTarget {
        secret,
        digest: hex::encode(digest_bytes),
        digest_bytes,
    }
}

fn commitment_digest_bytes(round_id: u64, secret: &str) -> [u8; DIGEST_LEN] {
    let mut hasher = Sha256::new();
    hasher.update(round_id.to_string().as_bytes());
    hasher.update(b":");
    hasher.update(secret.as_bytes());
    hasher.finalize().into()
}

/// Compute the hex-encoded commitment digest `SHA-256("{round_id}:{secret}")`.
pub fn commitment_digest(round_id: u64, secret: &str) -> String {
    hex::encode(commitment_digest_bytes(round_id, secret))
}

/// Verify that a (round id, secret) pair matches a published digest.
pub fn verify_commitment(round_id: u64, secret: &str, digest: &str) -> bool {
    commitment_digest(round_id, secret) == digest.trim_start_matches("0x").to_lowercase()
}

/// Human-readable message binding a round id to its commitment, signed by the
/// coordinator's wallet when one is configured.
pub fn attestation_message(round_id: u64, digest: &str) -> String {
    format!("potshot round {round_id} target commitment {digest}")
}
