//! Off-chain verification of player payment authorizations.
//!
//! Only the cheap checks happen here: field presence, well-formedness, payer
//! identity, round binding. The vault contract remains the authority on the
//! signature's validity against the actual token balance; a payload that
//! passes this gate can still revert on-chain.

use crate::{Error, Result};
use ethers::types::{Address, Signature, U256};
use potshot_types::{AuthorizationPayload, PaymentAuthorization};

/// Length of a recoverable `r || s || v` signature in bytes.
const SIGNATURE_LEN: usize = 65;

/// Validate an authorization payload against the claimed player and the
/// active round, producing the typed form the vault client submits.
///
/// Address comparison is parse-normalized, so payer/player casing never
/// matters. No ledger call happens here; every failure is rejected before
/// funds can move.
pub fn verify_authorization(
    player: &str,
    active_round_id: u64,
    payload: &AuthorizationPayload,
) -> Result<PaymentAuthorization> {
    let claimed: Address = player
        .trim()
        .parse()
        .map_err(|_| Error::Authorization(format!("invalid player address: {player}")))?;
    let payer: Address = payload
        .payer_address
        .trim()
        .parse()
        .map_err(|_| {
            Error::Authorization(format!(
                "invalid payer address: {}",
                payload.payer_address
            ))
        })?;
    if payer != claimed {
        return Err(Error::Authorization(
            "authorization payer does not match player".to_string(),
        ));
    }
    if payload.round_id != active_round_id {
        return Err(Error::Authorization(format!(
            "authorization is for round {} but round {active_round_id} is active",
            payload.round_id
        )));
    }

    let amount = require_decimal(&payload.amount, "amount")?;
    let nonce = require_decimal(&payload.nonce, "nonce")?;
    let deadline = payload
        .deadline
        .ok_or_else(|| Error::Authorization("missing deadline".to_string()))?;
    let signature = parse_signature(&payload.signature)?;

    Ok(PaymentAuthorization {
        round_id: payload.round_id,
        payer,
        amount,
        deadline: U256::from(deadline),
        nonce,
        signature,
    })
}

fn require_decimal(value: &Option<String>, field: &'static str) -> Result<U256> {
    let raw = value
        .as_ref()
        .ok_or_else(|| Error::Authorization(format!("missing {field}")))?;
    U256::from_dec_str(raw.trim())
        .map_err(|_| Error::Authorization(format!("{field} is not a decimal integer: {raw}")))
}

fn parse_signature(value: &Option<String>) -> Result<Signature> {
    let raw = value
        .as_ref()
        .ok_or_else(|| Error::Authorization("missing signature".to_string()))?;
    let bytes = hex::decode(raw.trim().trim_start_matches("0x"))
        .map_err(|_| Error::Authorization("signature is not valid hex".to_string()))?;
    if bytes.len() != SIGNATURE_LEN {
        return Err(Error::Authorization(format!(
            "signature must be {SIGNATURE_LEN} bytes, got {}",
            bytes.len()
        )));
    }
    Signature::try_from(bytes.as_slice())
        .map_err(|_| Error::Authorization("malformed signature".to_string()))
}
