//! In-memory vault for exercising the coordinator protocol without a chain.
//!
//! The mock keeps the same bookkeeping the contract does (round table,
//! current round id, pot/guess counters, nonce tracking is left to the
//! coordinator) and can be told to fail its next payment or settlement to
//! drive the partial-failure paths.

use crate::ledger::Ledger;
use async_trait::async_trait;
use ethers::types::{Address, Signature};
use potshot_chain::{Error, Result, RoundRecord};
use potshot_types::{PaymentAuthorization, PaymentResult};
use std::collections::HashMap;
use std::sync::Mutex;

#[derive(Clone, Debug)]
struct MockRound {
    buy_in: u128,
    pot: u128,
    guess_count: u64,
    winner: Option<Address>,
    active: bool,
    commitment: [u8; 32],
}

#[derive(Default)]
struct MockVault {
    current_round_id: u64,
    rounds: HashMap<u64, MockRound>,
    /// Error to return from the next `pay_for_guess` call.
    fail_next_payment: Option<Error>,
    /// Fail the next settle-and-open with a revert.
    fail_next_settle: bool,
    /// When set, every write fails as if no signer key were configured.
    read_only: bool,
    withdrawn: u128,
}

/// Mutex-guarded in-memory vault implementing [`Ledger`].
#[derive(Default)]
pub struct MockLedger {
    inner: Mutex<MockVault>,
}

impl MockLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// A ledger whose writes all fail with `SignerMissing`.
    pub fn read_only() -> Self {
        let ledger = Self::default();
        ledger.inner.lock().unwrap().read_only = true;
        ledger
    }

    pub fn fail_next_payment(&self, err: Error) {
        self.inner.lock().unwrap().fail_next_payment = Some(err);
    }

    pub fn fail_next_settle(&self) {
        self.inner.lock().unwrap().fail_next_settle = true;
    }

    /// Simulate another operator moving the ledger: deactivate the current
    /// round and open the next one under a commitment this coordinator
    /// cannot know.
    pub fn advance_externally(&self, commitment: [u8; 32], buy_in: u128) -> u64 {
        let mut vault = self.inner.lock().unwrap();
        let current = vault.current_round_id;
        if let Some(round) = vault.rounds.get_mut(&current) {
            round.active = false;
        }
        let next = current + 1;
        vault.rounds.insert(
            next,
            MockRound {
                buy_in,
                pot: 0,
                guess_count: 0,
                winner: None,
                active: true,
                commitment,
            },
        );
        vault.current_round_id = next;
        next
    }

    pub fn record(&self, round_id: u64) -> Option<RoundRecord> {
        let vault = self.inner.lock().unwrap();
        vault.rounds.get(&round_id).map(|round| to_record(round_id, round))
    }

    pub fn withdrawn(&self) -> u128 {
        self.inner.lock().unwrap().withdrawn
    }
}

fn to_record(round_id: u64, round: &MockRound) -> RoundRecord {
    RoundRecord {
        round_id,
        buy_in: round.buy_in,
        pot: round.pot,
        guess_count: round.guess_count,
        winner: round.winner,
        active: round.active,
        commitment: round.commitment,
    }
}

impl MockVault {
    fn check_writable(&self) -> Result<()> {
        if self.read_only {
            return Err(Error::SignerMissing);
        }
        Ok(())
    }

    fn open(&mut self, buy_in: u128, commitment: [u8; 32]) -> Result<()> {
        let current = self.current_round_id;
        if let Some(round) = self.rounds.get(&current) {
            if round.active {
                return Err(Error::Rejected {
                    reason: "previous round still active".to_string(),
                });
            }
        }
        if commitment == [0u8; 32] {
            return Err(Error::Rejected {
                reason: "zero commitment".to_string(),
            });
        }
        let next = current + 1;
        self.rounds.insert(
            next,
            MockRound {
                buy_in,
                pot: 0,
                guess_count: 0,
                winner: None,
                active: true,
                commitment,
            },
        );
        self.current_round_id = next;
        Ok(())
    }

    fn settle(&mut self, winner: Address) -> Result<()> {
        let current = self.current_round_id;
        let round = self
            .rounds
            .get_mut(&current)
            .filter(|round| round.active)
            .ok_or_else(|| Error::Rejected {
                reason: "no active round".to_string(),
            })?;
        round.winner = Some(winner);
        round.pot = 0;
        round.active = false;
        Ok(())
    }
}

#[async_trait]
impl Ledger for MockLedger {
    async fn current_round_id(&self) -> Result<u64> {
        Ok(self.inner.lock().unwrap().current_round_id)
    }

    async fn round(&self, round_id: u64) -> Result<RoundRecord> {
        let vault = self.inner.lock().unwrap();
        vault
            .rounds
            .get(&round_id)
            .map(|round| to_record(round_id, round))
            .ok_or_else(|| Error::Rpc(format!("unknown round {round_id}")))
    }

    async fn pay_for_guess(&self, auth: &PaymentAuthorization) -> Result<PaymentResult> {
        let mut vault = self.inner.lock().unwrap();
        vault.check_writable()?;
        if let Some(err) = vault.fail_next_payment.take() {
            return Err(err);
        }
        let round = vault
            .rounds
            .get_mut(&auth.round_id)
            .filter(|round| round.active)
            .ok_or_else(|| Error::Rejected {
                reason: format!("round {} is not active", auth.round_id),
            })?;
        let amount = auth.amount.as_u128();
        round.pot += amount;
        round.guess_count += 1;
        Ok(PaymentResult {
            round_id: auth.round_id,
            amount,
            pot_after: round.pot,
            guess_count: round.guess_count,
            buy_in_after: round.buy_in,
        })
    }

    async fn start_next_round(&self, buy_in: u128, commitment: [u8; 32]) -> Result<()> {
        let mut vault = self.inner.lock().unwrap();
        vault.check_writable()?;
        vault.open(buy_in, commitment)
    }

    async fn settle_and_start_next_round(
        &self,
        winner: Address,
        buy_in: u128,
        commitment: [u8; 32],
    ) -> Result<()> {
        let mut vault = self.inner.lock().unwrap();
        vault.check_writable()?;
        if vault.fail_next_settle {
            vault.fail_next_settle = false;
            return Err(Error::Reverted {
                tx_hash: "0xmock".to_string(),
            });
        }
        vault.settle(winner)?;
        vault.open(buy_in, commitment)
    }

    async fn update_buy_in(&self, new_buy_in: u128) -> Result<()> {
        let mut vault = self.inner.lock().unwrap();
        vault.check_writable()?;
        let current = vault.current_round_id;
        let round = vault
            .rounds
            .get_mut(&current)
            .filter(|round| round.active)
            .ok_or_else(|| Error::Rejected {
                reason: "no active round".to_string(),
            })?;
        round.buy_in = new_buy_in;
        Ok(())
    }

    async fn close_active_round(&self) -> Result<()> {
        let mut vault = self.inner.lock().unwrap();
        vault.check_writable()?;
        let current = vault.current_round_id;
        if let Some(round) = vault.rounds.get_mut(&current) {
            round.active = false;
        }
        Ok(())
    }

    async fn withdraw_idle(&self, _recipient: Address, amount: u128) -> Result<()> {
        let mut vault = self.inner.lock().unwrap();
        vault.check_writable()?;
        vault.withdrawn += amount;
        Ok(())
    }

    async fn attest(&self, _message: &str) -> Result<Option<(Address, Signature)>> {
        Ok(None)
    }
}
