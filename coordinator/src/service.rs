//! Round lifecycle manager.
//!
//! Drives the `Bootstrapping → Active → Settling → Closed` machine across
//! rounds, cycling indefinitely. The ledger owns every economic fact; this
//! service owns the secret and the protocol ordering. See the crate docs for
//! the locking discipline.

use crate::{config::CoordinatorConfig, ledger::Ledger, verifier, Error, Result};
use ethers::types::{Address, U256};
use potshot_engine as engine;
use potshot_types::{
    AuthorizationPayload, GuessRecord, Round, RoundPhase, RoundSnapshot, TargetCommitment,
};
use rand::rngs::OsRng;
use serde::Serialize;
use std::collections::HashSet;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::Mutex;
use tracing::{info, warn};

/// Public view of the coordinator: the phase, the active round snapshot, and
/// the published commitment. Never carries the secret.
#[derive(Clone, Debug, Serialize)]
pub struct CoordinatorStatus {
    pub phase: RoundPhase,
    pub round: Option<RoundSnapshot>,
    pub commitment: Option<TargetCommitment>,
}

/// Result of an accepted guess submission.
#[derive(Clone, Debug, Serialize)]
pub struct GuessOutcome {
    /// Round state after the guess (the next round, if this guess won and
    /// the rollover landed).
    pub snapshot: RoundSnapshot,
    pub record: GuessRecord,
    /// Set when this guess hit the exact match: the full pot at match time.
    pub payout: Option<u128>,
    /// Set when the winning guess was recorded but the ledger's
    /// settle-and-open call failed; the advance must be retried.
    pub settlement_error: Option<String>,
}

/// Everything guarded by the round lock.
struct RoundState {
    phase: RoundPhase,
    round: Option<Round>,
    commitment: Option<TargetCommitment>,
    /// `(payer, nonce)` pairs consumed this session. Cleared on every
    /// rollover or resync; the vault's own nonce bookkeeping is the durable
    /// replay guard.
    processed: HashSet<(Address, U256)>,
}

/// The round coordinator. Generic over the ledger so the protocol can be
/// exercised against the in-memory mock.
pub struct Coordinator<L: Ledger> {
    ledger: L,
    config: CoordinatorConfig,
    state: Mutex<RoundState>,
}

impl<L: Ledger> Coordinator<L> {
    pub fn new(ledger: L, config: CoordinatorConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            ledger,
            config,
            state: Mutex::new(RoundState {
                phase: RoundPhase::Bootstrapping,
                round: None,
                commitment: None,
                processed: HashSet::new(),
            }),
        })
    }

    /// Reconcile with the ledger and open a round if none is serviceable.
    ///
    /// Called once at startup (best-effort: the caller logs a failure and
    /// leaves the coordinator in `Bootstrapping`) and again from every guess
    /// submission, so a failed startup heals on the next guess.
    pub async fn bootstrap(&self) -> Result<CoordinatorStatus> {
        let mut state = self.state.lock().await;
        let s = &mut *state;
        self.reconcile(s).await?;
        Ok(Self::status_of(s))
    }

    /// Snapshot of the current phase and round. Lock-held only for the copy.
    pub async fn public_state(&self) -> CoordinatorStatus {
        let state = self.state.lock().await;
        Self::status_of(&state)
    }

    /// Run the full guess-submission protocol.
    ///
    /// The whole sequence (reconciliation, authorization, payment, scoring,
    /// escalation, settlement) is one critical section under the round lock;
    /// ledger calls block inside it until bounded finality.
    ///
    /// Ordering note: the settled/length checks run only after the payment
    /// succeeds, so such a guess consumes its stake and the pot keeps it.
    /// This matches the vault-facing behavior the system was built against;
    /// see DESIGN.md before reordering.
    pub async fn submit_guess(
        &self,
        player: &str,
        guess_value: &str,
        authorization: AuthorizationPayload,
    ) -> Result<GuessOutcome> {
        if !engine::is_decimal(guess_value) {
            return Err(Error::Validation(
                "guess must be a non-empty string of decimal digits".to_string(),
            ));
        }

        let mut state = self.state.lock().await;
        let s = &mut *state;
        self.reconcile(s).await?;

        let round_id = s
            .round
            .as_ref()
            .map(|round| round.round_id)
            .ok_or_else(|| Error::Validation("no active round".to_string()))?;

        let auth = verifier::verify_authorization(player, round_id, &authorization)?;
        let key = (auth.payer, auth.nonce);
        if s.processed.contains(&key) {
            return Err(Error::Replay {
                player: format!("{:#x}", auth.payer),
                nonce: auth.nonce.to_string(),
            });
        }

        // The only point at which funds move.
        let payment = self.ledger.pay_for_guess(&auth).await?;

        let round = s
            .round
            .as_mut()
            .ok_or_else(|| Error::Validation("no active round".to_string()))?;

        // Ledger truth applies immediately: pot and guess count reflect the
        // payment even if the guess is rejected below. The locally escalated
        // buy-in is kept unless the ledger reports a higher one.
        round.pot = payment.pot_after;
        round.guess_count = payment.guess_count;
        if payment.buy_in_after > round.buy_in {
            round.buy_in = payment.buy_in_after;
        }

        if round.winner.is_some() {
            return Err(Error::Validation("round already settled".to_string()));
        }
        if guess_value.len() != round.digit_count {
            return Err(Error::Validation(format!(
                "guess length {} does not match round digit count {}",
                guess_value.len(),
                round.digit_count
            )));
        }

        let score = engine::score(&round.target_secret, guess_value)
            .map_err(|err| Error::Validation(err.to_string()))?;
        let won = score.matches as usize == round.digit_count;

        let record = GuessRecord {
            player: auth.payer,
            guess_value: guess_value.to_string(),
            stake: payment.amount,
            matches: score.matches,
            distance: score.distance,
            hint: score.hint,
            submitted_at: now_secs(),
            price_step_at_guess: round.price_steps,
        };

        let mut payout = None;
        if won {
            let captured = round
                .record_winner(record.clone())
                .map_err(|msg| Error::Validation(msg.to_string()))?;
            payout = Some(captured);
            s.phase = RoundPhase::Settling;
            info!(
                round_id,
                player = %format!("{:#x}", auth.payer),
                payout = captured,
                "exact match; settling round"
            );
        } else if engine::apply_escalation(round, score.matches, false) {
            info!(
                round_id,
                buy_in = round.buy_in,
                price_steps = round.price_steps,
                "near match; buy-in escalated"
            );
        }

        round.push_guess(record.clone());
        s.processed.insert(key);

        let mut settlement_error = None;
        if won {
            if let Err(err) = self
                .open_round(s, round_id, self.config.default_buy_in, Some(auth.payer))
                .await
            {
                warn!(round_id, error = %err, "settle-and-open failed; round remains settling");
                settlement_error = Some(err.to_string());
            }
        }

        let snapshot = s
            .round
            .as_ref()
            .map(Round::snapshot)
            .ok_or_else(|| Error::Validation("no active round".to_string()))?;
        Ok(GuessOutcome {
            snapshot,
            record,
            payout,
            settlement_error,
        })
    }

    /// Re-drive the atomic settle-and-open call after a failed rollover.
    pub async fn retry_settlement(&self) -> Result<CoordinatorStatus> {
        let mut state = self.state.lock().await;
        let s = &mut *state;
        if s.phase != RoundPhase::Settling {
            return Err(Error::Validation("no settlement pending".to_string()));
        }
        let (winner, round_id) = {
            let round = s
                .round
                .as_ref()
                .ok_or_else(|| Error::Validation("no settling round".to_string()))?;
            let winner = round
                .winner
                .as_ref()
                .ok_or_else(|| Error::Validation("no winner recorded".to_string()))?;
            (winner.record.player, round.round_id)
        };
        self.open_round(s, round_id, self.config.default_buy_in, Some(winner))
            .await?;
        Ok(Self::status_of(s))
    }

    /// Administrative override: close the ledger round if one is active,
    /// then open a fresh sealed round, optionally at a new buy-in. The old
    /// pot stays escrowed.
    pub async fn reset_round(&self, buy_in: Option<u128>) -> Result<CoordinatorStatus> {
        let mut state = self.state.lock().await;
        let s = &mut *state;
        let ledger_round_id = self.close_ledger_round_if_active().await?;
        s.phase = RoundPhase::Bootstrapping;
        s.round = None;
        s.commitment = None;
        s.processed.clear();
        self.open_round(
            s,
            ledger_round_id,
            buy_in.unwrap_or(self.config.default_buy_in),
            None,
        )
        .await?;
        Ok(Self::status_of(s))
    }

    /// Administrative close without payout. Funds remain escrowed,
    /// withdrawable via [`Coordinator::withdraw_idle`]; `reset_round`
    /// re-enters bootstrapping from here.
    pub async fn close_round(&self) -> Result<CoordinatorStatus> {
        let mut state = self.state.lock().await;
        let s = &mut *state;
        let ledger_round_id = self.close_ledger_round_if_active().await?;
        s.phase = RoundPhase::Closed;
        s.processed.clear();
        info!(
            round_id = ledger_round_id,
            "round closed administratively; pot remains escrowed"
        );
        Ok(Self::status_of(s))
    }

    /// Push the locally escalated buy-in to the vault. Escalation never
    /// reaches the ledger any other way.
    pub async fn push_buy_in(&self) -> Result<CoordinatorStatus> {
        let state = self.state.lock().await;
        let buy_in = state
            .round
            .as_ref()
            .map(|round| round.buy_in)
            .ok_or_else(|| Error::Validation("no active round".to_string()))?;
        self.ledger.update_buy_in(buy_in).await?;
        Ok(Self::status_of(&state))
    }

    /// Withdraw funds not tied to an active pot.
    pub async fn withdraw_idle(&self, recipient: &str, amount: u128) -> Result<()> {
        let recipient: Address = recipient
            .trim()
            .parse()
            .map_err(|_| Error::Validation(format!("invalid recipient address: {recipient}")))?;
        self.ledger.withdraw_idle(recipient, amount).await?;
        Ok(())
    }

    /// Drop local state and rebuild from the ledger whenever the ledger's
    /// round id differs from the local one. Stale guess history is not
    /// recoverable and is dropped.
    async fn reconcile(&self, s: &mut RoundState) -> Result<()> {
        let ledger_round_id = self.ledger.current_round_id().await?;
        if let Some(round) = &s.round {
            if round.round_id == ledger_round_id {
                return Ok(());
            }
            warn!(
                local = round.round_id,
                ledger = ledger_round_id,
                "ledger moved past the local round; dropping local state"
            );
        }
        self.rebuild(s, ledger_round_id).await
    }

    async fn rebuild(&self, s: &mut RoundState, ledger_round_id: u64) -> Result<()> {
        s.phase = RoundPhase::Bootstrapping;
        s.round = None;
        s.commitment = None;
        s.processed.clear();

        if ledger_round_id > 0 {
            let record = self.ledger.round(ledger_round_id).await?;
            if record.active {
                // An active round whose secret this process does not hold is
                // unrecoverable: the commitment cannot be re-derived. Close
                // it (the pot stays escrowed) and seal a fresh round.
                warn!(
                    round_id = ledger_round_id,
                    "active ledger round has no locally-held secret; closing it"
                );
                self.ledger.close_active_round().await?;
            }
        }
        self.open_round(s, ledger_round_id, self.config.default_buy_in, None)
            .await
    }

    async fn close_ledger_round_if_active(&self) -> Result<u64> {
        let ledger_round_id = self.ledger.current_round_id().await?;
        if ledger_round_id > 0 {
            let record = self.ledger.round(ledger_round_id).await?;
            if record.active {
                self.ledger.close_active_round().await?;
            }
        }
        Ok(ledger_round_id)
    }

    /// Seal the next round and open it on the ledger, settling the current
    /// round to `settle_winner` in the same transaction when given. Local
    /// state is touched only after the ledger call succeeds, so a failure
    /// leaves the caller's state intact.
    async fn open_round(
        &self,
        s: &mut RoundState,
        previous_round_id: u64,
        buy_in: u128,
        settle_winner: Option<Address>,
    ) -> Result<()> {
        let next_id = previous_round_id + 1;
        let sealed = engine::seal_round(
            next_id,
            self.config.digit_count,
            self.config.min_digits,
            self.config.max_digits,
            &mut OsRng,
        );
        let message = engine::attestation_message(next_id, &sealed.digest);
        let attestation = self.ledger.attest(&message).await?;

        match settle_winner {
            Some(winner) => {
                self.ledger
                    .settle_and_start_next_round(winner, buy_in, sealed.digest_bytes)
                    .await?
            }
            None => {
                self.ledger
                    .start_next_round(buy_in, sealed.digest_bytes)
                    .await?
            }
        }

        // Adopt ledger truth for the new round and confirm the published
        // digest is the one just sealed.
        let record = self.ledger.round(next_id).await?;
        if !record.active || record.commitment != sealed.digest_bytes {
            return Err(potshot_chain::Error::CommitmentMismatch { round_id: next_id }.into());
        }

        let opened_at = now_secs();
        s.commitment = Some(TargetCommitment {
            digest: sealed.digest.clone(),
            attestation_message: message,
            signature: attestation
                .as_ref()
                .map(|(_, signature)| format!("0x{signature}")),
            signer_address: attestation.map(|(address, _)| address),
            committed_at: opened_at,
        });
        let digit_count = sealed.secret.len();
        s.round = Some(Round {
            round_id: next_id,
            digit_count,
            target_secret: sealed.secret,
            commitment_digest: sealed.digest,
            buy_in: record.buy_in,
            pot: record.pot,
            guess_count: record.guess_count,
            price_steps: 0,
            near_match_threshold: self.config.near_match_threshold,
            price_increase_bps: self.config.price_increase_bps,
            max_price_steps: self.config.max_price_steps,
            started_at: opened_at,
            winner: None,
            guesses: Vec::new(),
        });
        s.phase = RoundPhase::Active;
        s.processed.clear();
        info!(
            round_id = next_id,
            digit_count,
            buy_in = record.buy_in,
            "round sealed and active"
        );
        Ok(())
    }

    fn status_of(s: &RoundState) -> CoordinatorStatus {
        CoordinatorStatus {
            phase: s.phase,
            round: s.round.as_ref().map(Round::snapshot),
            commitment: s.commitment.clone(),
        }
    }

    /// The sealed secret of the current round, for protocol tests only.
    #[cfg(any(test, feature = "mocks"))]
    pub async fn target_for_tests(&self) -> Option<String> {
        let state = self.state.lock().await;
        state.round.as_ref().map(|round| round.target_secret.clone())
    }

    /// Direct handle on the ledger, for protocol tests only.
    #[cfg(any(test, feature = "mocks"))]
    pub fn ledger_for_tests(&self) -> &L {
        &self.ledger
    }
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs())
        .unwrap_or(0)
}
