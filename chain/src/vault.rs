//! `GuessVault` contract bindings and the client wrapping them.

use crate::{Error, Result};
use ethers::{
    abi::RawLog,
    contract::{ContractError, EthLogDecode},
    middleware::SignerMiddleware,
    prelude::abigen,
    providers::{Http, PendingTransaction, Provider},
    signers::{LocalWallet, Signer},
    types::{Address, Log, Signature, TransactionReceipt, U256, U64},
};
use potshot_types::{PaymentAuthorization, PaymentResult};
use std::{sync::Arc, time::Duration};
use tracing::{info, warn};

abigen!(
    GuessVault,
    r#"[
        event RoundOpened(uint256 indexed roundId, uint256 buyIn, bytes32 commitment)
        event GuessPaid(uint256 indexed roundId, address indexed player, uint256 amount, uint256 pot, uint256 guessCount)
        event BuyInUpdated(uint256 indexed roundId, uint256 newBuyIn)
        event RoundSettled(uint256 indexed roundId, address indexed winner, uint256 payout)
        function payForGuess(uint256 roundId, address payer, uint256 amount, uint256 deadline, uint8 v, bytes32 r, bytes32 s) external
        function settleWinner(address winner) external
        function startNextRound(uint256 buyIn, bytes32 commitment) external
        function settleAndStartNextRound(address winner, uint256 buyIn, bytes32 commitment) external
        function updateBuyIn(uint256 newBuyIn) external
        function closeActiveRound() external
        function withdrawIdle(address recipient, uint256 amount) external
        function rounds(uint256 roundId) external view returns (uint256 buyIn, uint256 pot, uint256 guessCount, address winner, bool active, bytes32 commitment)
        function currentRoundId() external view returns (uint256)
    ]"#
);

type WriteMiddleware = SignerMiddleware<Provider<Http>, LocalWallet>;

/// Connection parameters for the vault client.
#[derive(Clone, Debug)]
pub struct VaultConfig {
    /// EVM JSON-RPC endpoint URL.
    pub rpc_url: String,
    /// Vault contract address, 0x-hex.
    pub vault_address: String,
    /// Coordinator private key hex. Absent means read-only: every write
    /// fails with [`Error::SignerMissing`].
    pub signer_key: Option<String>,
    pub chain_id: u64,
    /// Confirmations required before a write is treated as final.
    pub confirmations: usize,
    /// Bound on each confirmation wait; elapsing surfaces
    /// [`Error::ConfirmationTimeout`] without touching local state.
    pub confirmation_timeout: Duration,
}

/// One row of the vault's round table.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RoundRecord {
    pub round_id: u64,
    pub buy_in: u128,
    pub pot: u128,
    pub guess_count: u64,
    /// `None` until settled (the contract stores the zero address).
    pub winner: Option<Address>,
    pub active: bool,
    pub commitment: [u8; 32],
}

/// Client for the `GuessVault` contract.
///
/// Reads go through a bare provider; writes require the configured signer
/// and follow send → bounded confirmation wait → receipt status check.
pub struct VaultClient {
    address: Address,
    reader: GuessVault<Provider<Http>>,
    writer: Option<GuessVault<WriteMiddleware>>,
    wallet: Option<LocalWallet>,
    confirmations: usize,
    confirmation_timeout: Duration,
}

impl VaultClient {
    pub fn connect(config: &VaultConfig) -> Result<Self> {
        let provider = Provider::<Http>::try_from(config.rpc_url.as_str())
            .map_err(|err| Error::Rpc(err.to_string()))?;
        let address: Address = config
            .vault_address
            .parse()
            .map_err(|_| Error::InvalidVaultAddress(config.vault_address.clone()))?;
        let reader = GuessVault::new(address, Arc::new(provider.clone()));

        let (writer, wallet) = match &config.signer_key {
            Some(key) => {
                let wallet: LocalWallet = key
                    .trim_start_matches("0x")
                    .parse()
                    .map_err(|_| Error::InvalidSignerKey)?;
                let wallet = wallet.with_chain_id(config.chain_id);
                let middleware = SignerMiddleware::new(provider, wallet.clone());
                let writer = GuessVault::new(address, Arc::new(middleware));
                (Some(writer), Some(wallet))
            }
            None => {
                warn!("no signer key configured; vault writes disabled");
                (None, None)
            }
        };

        Ok(Self {
            address,
            reader,
            writer,
            wallet,
            confirmations: config.confirmations,
            confirmation_timeout: config.confirmation_timeout,
        })
    }

    /// Address of the configured signer, if any.
    pub fn signer_address(&self) -> Option<Address> {
        self.wallet.as_ref().map(|wallet| wallet.address())
    }

    /// Sign an attestation message with the coordinator wallet. Returns
    /// `None` when running read-only.
    pub async fn attest(&self, message: &str) -> Result<Option<(Address, Signature)>> {
        let Some(wallet) = &self.wallet else {
            return Ok(None);
        };
        let signature = wallet
            .sign_message(message)
            .await
            .map_err(|err| Error::Signing(err.to_string()))?;
        Ok(Some((wallet.address(), signature)))
    }

    pub async fn current_round_id(&self) -> Result<u64> {
        let round_id = self
            .reader
            .current_round_id()
            .call()
            .await
            .map_err(|err| Error::Rpc(err.to_string()))?;
        to_u64(round_id, "round id")
    }

    pub async fn round(&self, round_id: u64) -> Result<RoundRecord> {
        let (buy_in, pot, guess_count, winner, active, commitment) = self
            .reader
            .rounds(U256::from(round_id))
            .call()
            .await
            .map_err(|err| Error::Rpc(err.to_string()))?;
        Ok(RoundRecord {
            round_id,
            buy_in: to_u128(buy_in, "buy-in")?,
            pot: to_u128(pot, "pot")?,
            guess_count: to_u64(guess_count, "guess count")?,
            winner: if winner == Address::zero() {
                None
            } else {
                Some(winner)
            },
            active,
            commitment,
        })
    }

    /// Forward a verified payment authorization to the vault and decode the
    /// resulting `GuessPaid` event. The event's amounts and counters (plus
    /// the round record's buy-in, read back afterwards) are the basis of
    /// truth, not the caller's claims.
    pub async fn pay_for_guess(&self, auth: &PaymentAuthorization) -> Result<PaymentResult> {
        let writer = self.writer()?;
        let (v, r, s) = split_signature(&auth.signature);
        let call = writer.pay_for_guess(
            U256::from(auth.round_id),
            auth.payer,
            auth.amount,
            auth.deadline,
            v,
            r,
            s,
        );
        let pending = call.send().await.map_err(map_send_error)?;
        let receipt = self.confirm(pending).await?;
        let event = find_guess_paid(&receipt.logs, self.address, auth.payer).ok_or_else(|| {
            Error::PaymentEventNotFound {
                player: format!("{:#x}", auth.payer),
                tx_hash: format!("{:#x}", receipt.transaction_hash),
            }
        })?;

        let round_id = to_u64(event.round_id, "round id")?;
        let record = self.round(round_id).await?;
        let result = PaymentResult {
            round_id,
            amount: to_u128(event.amount, "amount")?,
            pot_after: to_u128(event.pot, "pot")?,
            guess_count: to_u64(event.guess_count, "guess count")?,
            buy_in_after: record.buy_in,
        };
        info!(
            round_id,
            player = %format!("{:#x}", auth.payer),
            amount = result.amount,
            pot = result.pot_after,
            guesses = result.guess_count,
            "guess payment confirmed"
        );
        Ok(result)
    }

    pub async fn settle_winner(&self, winner: Address) -> Result<()> {
        let call = self.writer()?.settle_winner(winner);
        let pending = call.send().await.map_err(map_send_error)?;
        let receipt = self.confirm(pending).await?;
        info!(
            winner = %format!("{winner:#x}"),
            tx_hash = %format!("{:#x}", receipt.transaction_hash),
            "round settled"
        );
        Ok(())
    }

    pub async fn start_next_round(&self, buy_in: u128, commitment: [u8; 32]) -> Result<()> {
        let call = self
            .writer()?
            .start_next_round(U256::from(buy_in), commitment);
        let pending = call.send().await.map_err(map_send_error)?;
        let receipt = self.confirm(pending).await?;
        info!(
            buy_in,
            commitment = %hex::encode(commitment),
            tx_hash = %format!("{:#x}", receipt.transaction_hash),
            "next round opened"
        );
        Ok(())
    }

    /// Atomic settle + open in a single transaction.
    pub async fn settle_and_start_next_round(
        &self,
        winner: Address,
        buy_in: u128,
        commitment: [u8; 32],
    ) -> Result<()> {
        let call = self.writer()?.settle_and_start_next_round(
            winner,
            U256::from(buy_in),
            commitment,
        );
        let pending = call.send().await.map_err(map_send_error)?;
        let receipt = self.confirm(pending).await?;
        info!(
            winner = %format!("{winner:#x}"),
            next_buy_in = buy_in,
            tx_hash = %format!("{:#x}", receipt.transaction_hash),
            "round settled and next round opened"
        );
        Ok(())
    }

    pub async fn update_buy_in(&self, new_buy_in: u128) -> Result<()> {
        let call = self.writer()?.update_buy_in(U256::from(new_buy_in));
        let pending = call.send().await.map_err(map_send_error)?;
        self.confirm(pending).await?;
        info!(new_buy_in, "buy-in pushed to the vault");
        Ok(())
    }

    pub async fn close_active_round(&self) -> Result<()> {
        let call = self.writer()?.close_active_round();
        let pending = call.send().await.map_err(map_send_error)?;
        self.confirm(pending).await?;
        info!("active round closed without payout");
        Ok(())
    }

    pub async fn withdraw_idle(&self, recipient: Address, amount: u128) -> Result<()> {
        let call = self.writer()?.withdraw_idle(recipient, U256::from(amount));
        let pending = call.send().await.map_err(map_send_error)?;
        self.confirm(pending).await?;
        info!(
            recipient = %format!("{recipient:#x}"),
            amount,
            "idle funds withdrawn"
        );
        Ok(())
    }

    fn writer(&self) -> Result<&GuessVault<WriteMiddleware>> {
        self.writer.as_ref().ok_or(Error::SignerMissing)
    }

    /// Block until the transaction is confirmed to the configured depth,
    /// bounded by the configured timeout, and check its status.
    async fn confirm(&self, pending: PendingTransaction<'_, Http>) -> Result<TransactionReceipt> {
        let tx_hash = format!("{:#x}", pending.tx_hash());
        let waited = self.confirmation_timeout;
        let receipt = tokio::time::timeout(waited, pending.confirmations(self.confirmations))
            .await
            .map_err(|_| Error::ConfirmationTimeout {
                tx_hash: tx_hash.clone(),
                waited_secs: waited.as_secs(),
            })?
            .map_err(|err| Error::Rpc(err.to_string()))?
            .ok_or_else(|| Error::MissingReceipt {
                tx_hash: tx_hash.clone(),
            })?;
        if receipt.status == Some(U64::zero()) {
            warn!(%tx_hash, "vault transaction reverted");
            return Err(Error::Reverted { tx_hash });
        }
        Ok(receipt)
    }
}

/// Scan receipt logs for the vault's `GuessPaid` event with the expected
/// payer. Logs from other contracts and other payers are skipped.
fn find_guess_paid(logs: &[Log], vault: Address, payer: Address) -> Option<GuessPaidFilter> {
    logs.iter()
        .filter(|log| log.address == vault)
        .filter_map(|log| {
            let raw: RawLog = log.clone().into();
            GuessPaidFilter::decode_log(&raw).ok()
        })
        .find(|event| event.player == payer)
}

fn map_send_error(err: ContractError<WriteMiddleware>) -> Error {
    match err {
        ContractError::Revert(_) => Error::Rejected {
            reason: err.to_string(),
        },
        other => Error::Rpc(other.to_string()),
    }
}

/// Split a recoverable signature into the `(v, r, s)` form the vault's
/// payment entry point takes.
fn split_signature(signature: &Signature) -> (u8, [u8; 32], [u8; 32]) {
    let mut r = [0u8; 32];
    signature.r.to_big_endian(&mut r);
    let mut s = [0u8; 32];
    signature.s.to_big_endian(&mut s);
    (signature.v as u8, r, s)
}

fn to_u128(value: U256, context: &'static str) -> Result<u128> {
    if value > U256::from(u128::MAX) {
        return Err(Error::ValueOutOfRange {
            context,
            value: value.to_string(),
        });
    }
    Ok(value.as_u128())
}

fn to_u64(value: U256, context: &'static str) -> Result<u64> {
    if value > U256::from(u64::MAX) {
        return Err(Error::ValueOutOfRange {
            context,
            value: value.to_string(),
        });
    }
    Ok(value.as_u64())
}
