//! Ledger seam between the coordinator and the vault contract.
//!
//! The coordinator is generic over this trait so the lifecycle protocol can
//! be exercised against the in-memory mock ledger; production wires in
//! [`VaultClient`].

use async_trait::async_trait;
use ethers::types::{Address, Signature};
use potshot_chain::{Result, RoundRecord, VaultClient};
use potshot_types::{PaymentAuthorization, PaymentResult};

/// The vault operations the coordinator drives.
#[async_trait]
pub trait Ledger: Send + Sync {
    async fn current_round_id(&self) -> Result<u64>;
    async fn round(&self, round_id: u64) -> Result<RoundRecord>;
    async fn pay_for_guess(&self, auth: &PaymentAuthorization) -> Result<PaymentResult>;
    async fn start_next_round(&self, buy_in: u128, commitment: [u8; 32]) -> Result<()>;
    async fn settle_and_start_next_round(
        &self,
        winner: Address,
        buy_in: u128,
        commitment: [u8; 32],
    ) -> Result<()>;
    async fn update_buy_in(&self, new_buy_in: u128) -> Result<()>;
    async fn close_active_round(&self) -> Result<()>;
    async fn withdraw_idle(&self, recipient: Address, amount: u128) -> Result<()>;
    /// Sign a commitment attestation. `None` when running without a signer.
    async fn attest(&self, message: &str) -> Result<Option<(Address, Signature)>>;
}

#[async_trait]
impl Ledger for VaultClient {
    async fn current_round_id(&self) -> Result<u64> {
        VaultClient::current_round_id(self).await
    }

    async fn round(&self, round_id: u64) -> Result<RoundRecord> {
        VaultClient::round(self, round_id).await
    }

    async fn pay_for_guess(&self, auth: &PaymentAuthorization) -> Result<PaymentResult> {
        VaultClient::pay_for_guess(self, auth).await
    }

    async fn start_next_round(&self, buy_in: u128, commitment: [u8; 32]) -> Result<()> {
        VaultClient::start_next_round(self, buy_in, commitment).await
    }

    async fn settle_and_start_next_round(
        &self,
        winner: Address,
        buy_in: u128,
        commitment: [u8; 32],
    ) -> Result<()> {
        VaultClient::settle_and_start_next_round(self, winner, buy_in, commitment).await
    }

    async fn update_buy_in(&self, new_buy_in: u128) -> Result<()> {
        VaultClient::update_buy_in(self, new_buy_in).await
    }

    async fn close_active_round(&self) -> Result<()> {
        VaultClient::close_active_round(self).await
    }

    async fn withdraw_idle(&self, recipient: Address, amount: u128) -> Result<()> {
        VaultClient::withdraw_idle(self, recipient, amount).await
    }

    async fn attest(&self, message: &str) -> Result<Option<(Address, Signature)>> {
        VaultClient::attest(self, message).await
    }
}
