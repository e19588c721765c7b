use ethers::types::Address;
use serde::{Deserialize, Serialize};

/// Maximum number of guesses retained in a round's public log.
///
/// The ledger keeps the authoritative guess count; the local log exists for
/// display and is truncated from the tail (oldest entries) past this bound.
pub const MAX_GUESS_LOG: usize = 256;

/// Lifecycle phase of the coordinator's round state machine.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoundPhase {
    /// No serviceable round yet; the coordinator is reconciling with the
    /// ledger or waiting to open a fresh round.
    Bootstrapping,
    /// A sealed round is open on the ledger and accepting paid guesses.
    Active,
    /// A winner is recorded locally but the ledger settle-and-open call has
    /// not landed yet.
    Settling,
    /// Administratively closed without payout; funds remain escrowed.
    Closed,
}

impl RoundPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            RoundPhase::Bootstrapping => "bootstrapping",
            RoundPhase::Active => "active",
            RoundPhase::Settling => "settling",
            RoundPhase::Closed => "closed",
        }
    }
}

/// One accepted guess. Created once, never mutated.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuessRecord {
    pub player: Address,
    pub guess_value: String,
    /// Stake actually pulled on-chain for this guess, in the payment token's
    /// smallest unit (the event's amount, not the caller's claim).
    pub stake: u128,
    pub matches: u32,
    pub distance: u32,
    pub hint: String,
    /// Unix seconds at submission completion.
    pub submitted_at: u64,
    /// The round's price step counter at the moment this guess was scored.
    pub price_step_at_guess: u32,
}

/// The winning guess and the pot it captured.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Winner {
    pub record: GuessRecord,
    /// Full pot at the moment of the exact match, in the smallest unit.
    pub payout: u128,
}

/// The single active round.
///
/// Mutated only by the lifecycle manager and the pricing escalator, always
/// under the coordinator's round lock. Superseded (never edited in place)
/// when the next round opens after settlement or administrative closure.
#[derive(Clone, Debug)]
pub struct Round {
    pub round_id: u64,
    /// Fixed for the round's lifetime.
    pub digit_count: usize,
    /// The sealed secret. Never leaves this struct except through scoring.
    pub target_secret: String,
    /// Hex-encoded SHA-256 over `"{round_id}:{target_secret}"`; must equal
    /// the digest published on the ledger while the round is active.
    pub commitment_digest: String,
    /// Current entry price in the smallest unit.
    pub buy_in: u128,
    /// Escrowed pot in the smallest unit. Only increases until a winner is
    /// recorded, then resets to zero atomically with the payout capture.
    pub pot: u128,
    /// Ledger-authoritative number of paid guesses.
    pub guess_count: u64,
    pub price_steps: u32,
    pub near_match_threshold: u32,
    pub price_increase_bps: u32,
    pub max_price_steps: u32,
    /// Unix seconds when the round became active locally.
    pub started_at: u64,
    pub winner: Option<Winner>,
    /// Newest first, bounded by [`MAX_GUESS_LOG`].
    pub guesses: Vec<GuessRecord>,
}

impl Round {
    /// Record the winning guess, capturing the pot as the payout and zeroing
    /// it in the same step. Returns the payout; fails if a winner is already
    /// recorded.
    pub fn record_winner(&mut self, record: GuessRecord) -> Result<u128, &'static str> {
        if self.winner.is_some() {
            return Err("winner already recorded");
        }
        let payout = self.pot;
        self.pot = 0;
        self.winner = Some(Winner { record, payout });
        Ok(payout)
    }

    /// Push a guess to the front of the log, truncating the oldest entries
    /// past [`MAX_GUESS_LOG`].
    pub fn push_guess(&mut self, record: GuessRecord) {
        self.guesses.insert(0, record);
        self.guesses.truncate(MAX_GUESS_LOG);
    }

    /// Public projection of the round. Never carries the secret target.
    pub fn snapshot(&self) -> RoundSnapshot {
        RoundSnapshot {
            round_id: self.round_id,
            digit_count: self.digit_count,
            commitment_digest: self.commitment_digest.clone(),
            buy_in: self.buy_in,
            pot: self.pot,
            guess_count: self.guess_count,
            price_steps: self.price_steps,
            near_match_threshold: self.near_match_threshold,
            price_increase_bps: self.price_increase_bps,
            max_price_steps: self.max_price_steps,
            started_at: self.started_at,
            winner: self.winner.clone(),
            guesses: self.guesses.clone(),
        }
    }
}

/// Public view of a round: every [`Round`] field except the secret.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RoundSnapshot {
    pub round_id: u64,
    pub digit_count: usize,
    pub commitment_digest: String,
    pub buy_in: u128,
    pub pot: u128,
    pub guess_count: u64,
    pub price_steps: u32,
    pub near_match_threshold: u32,
    pub price_increase_bps: u32,
    pub max_price_steps: u32,
    pub started_at: u64,
    pub winner: Option<Winner>,
    pub guesses: Vec<GuessRecord>,
}
