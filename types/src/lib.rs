//! Shared data model for the potshot coordinator.
//!
//! This crate contains the types passed between the game engine, the vault
//! client, and the coordinator service: the single active [`Round`] and its
//! guess log, payment authorizations in wire and verified form, the target
//! commitment, and the public snapshot projection.
//!
//! The secret target lives only inside [`Round`]; the one path from internal
//! state to callers is [`Round::snapshot`], which never carries it.

pub mod auth;
pub mod round;

pub use auth::{AuthorizationPayload, PaymentAuthorization, PaymentResult, TargetCommitment};
pub use round::{GuessRecord, Round, RoundPhase, RoundSnapshot, Winner, MAX_GUESS_LOG};
