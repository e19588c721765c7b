//! Pure game logic for the potshot coordinator.
//!
//! This crate contains the deterministic pieces of the game with no I/O:
//! target sealing, guess scoring, and price escalation.
//!
//! ## Determinism requirements
//! - No wall-clock time inside game logic; timestamps are stamped by callers.
//! - The only randomness is the secret target draw, which takes the RNG as an
//!   argument (a CSPRNG in production, a seeded RNG in tests).
//! - Scoring and pricing are pure functions of their inputs.

pub mod pricing;
pub mod scoring;
pub mod sealer;

pub use pricing::{apply_escalation, BPS_DENOMINATOR};
pub use scoring::{is_decimal, score, Score, ScoreError};
pub use sealer::{
    attestation_message, clamp_digit_count, commitment_digest, seal_round, verify_commitment,
    SealedTarget, DIGEST_LEN,
};
