//! End-to-end protocol tests against the in-memory vault.

use crate::config::CoordinatorConfig;
use crate::mocks::MockLedger;
use crate::{Coordinator, Error};
use ethers::types::Address;
use potshot_chain::Error as ChainError;
use potshot_types::{AuthorizationPayload, RoundPhase};

const PLAYER: &str = "0x1111111111111111111111111111111111111111";

fn test_config() -> CoordinatorConfig {
    CoordinatorConfig {
        rpc_url: "http://localhost:8545".to_string(),
        vault_address: "0x00000000000000000000000000000000000000aa".to_string(),
        signer_key: None,
        chain_id: 31337,
        confirmations: 1,
        confirmation_timeout_secs: 5,
        digit_count: 4,
        min_digits: 3,
        max_digits: 9,
        default_buy_in: 1_000_000,
        near_match_threshold: 3,
        price_increase_bps: 1500,
        max_price_steps: 10,
    }
}

async fn active_coordinator() -> Coordinator<MockLedger> {
    let coordinator =
        Coordinator::new(MockLedger::new(), test_config()).expect("config is valid");
    coordinator.bootstrap().await.expect("bootstrap opens round 1");
    coordinator
}

fn player_address() -> Address {
    PLAYER.parse().expect("valid address")
}

fn signature_hex() -> String {
    // r = 1, s = 2, v = 27; the mock vault does not re-verify signatures.
    let mut raw = [0u8; 65];
    raw[31] = 1;
    raw[63] = 2;
    raw[64] = 27;
    format!("0x{}", hex::encode(raw))
}

fn auth(round_id: u64, nonce: u64, amount: u128) -> AuthorizationPayload {
    AuthorizationPayload {
        round_id,
        payer_address: PLAYER.to_string(),
        amount: Some(amount.to_string()),
        deadline: Some(1_900_000_000),
        nonce: Some(nonce.to_string()),
        signature: Some(signature_hex()),
    }
}

async fn secret_of(coordinator: &Coordinator<MockLedger>) -> String {
    coordinator
        .target_for_tests()
        .await
        .expect("round is active")
}

fn shift_digit(digit: u8) -> char {
    char::from(b'0' + (digit - b'0' + 1) % 10)
}

/// A guess with zero positional matches.
fn miss_guess(secret: &str) -> String {
    secret.bytes().map(shift_digit).collect()
}

/// A guess matching every position but the last (3/4 with the test config,
/// exactly the near-match threshold).
fn near_guess(secret: &str) -> String {
    let mut out: Vec<char> = secret.chars().collect();
    let last = secret.as_bytes()[secret.len() - 1];
    out[secret.len() - 1] = shift_digit(last);
    out.into_iter().collect()
}

#[tokio::test]
async fn test_bootstrap_seals_and_opens_round_one() {
    let coordinator = active_coordinator().await;
    let status = coordinator.public_state().await;

    assert_eq!(status.phase, RoundPhase::Active);
    let round = status.round.expect("round snapshot present");
    assert_eq!(round.round_id, 1);
    assert_eq!(round.digit_count, 4);
    assert_eq!(round.buy_in, 1_000_000);
    assert_eq!(round.pot, 0);
    assert!(round.guesses.is_empty());

    // The digest on the ledger is the commitment to the local secret.
    let ledger = coordinator.ledger_for_tests();
    let record = ledger.record(1).expect("round 1 on ledger");
    assert!(record.active);
    let secret = secret_of(&coordinator).await;
    assert!(potshot_engine::verify_commitment(
        1,
        &secret,
        &hex::encode(record.commitment)
    ));
    assert_eq!(hex::encode(record.commitment), round.commitment_digest);
}

#[tokio::test]
async fn test_guess_adopts_ledger_pot_and_counters() {
    let coordinator = active_coordinator().await;
    let secret = secret_of(&coordinator).await;

    let outcome = coordinator
        .submit_guess(PLAYER, &miss_guess(&secret), auth(1, 1, 1_000_000))
        .await
        .expect("guess accepted");

    assert_eq!(outcome.record.matches, 0);
    assert_eq!(outcome.record.distance, 4);
    assert_eq!(outcome.record.hint, "0/4 digits in place");
    assert_eq!(outcome.record.stake, 1_000_000);
    assert_eq!(outcome.record.player, player_address());
    assert!(outcome.payout.is_none());
    assert!(outcome.settlement_error.is_none());

    // Pot and guess count are the ledger event's numbers.
    assert_eq!(outcome.snapshot.pot, 1_000_000);
    assert_eq!(outcome.snapshot.guess_count, 1);
    assert_eq!(outcome.snapshot.guesses.len(), 1);
    assert_eq!(outcome.snapshot.guesses[0], outcome.record);
}

#[tokio::test]
async fn test_guess_log_is_newest_first() {
    let coordinator = active_coordinator().await;
    let secret = secret_of(&coordinator).await;

    coordinator
        .submit_guess(PLAYER, &miss_guess(&secret), auth(1, 1, 1_000_000))
        .await
        .expect("first guess accepted");
    let outcome = coordinator
        .submit_guess(PLAYER, &near_guess(&secret), auth(1, 2, 1_000_000))
        .await
        .expect("second guess accepted");

    assert_eq!(outcome.snapshot.guesses.len(), 2);
    assert_eq!(outcome.snapshot.guesses[0].guess_value, near_guess(&secret));
    assert_eq!(outcome.snapshot.guesses[1].guess_value, miss_guess(&secret));
}

#[tokio::test]
async fn test_replayed_nonce_rejected_without_payment() {
    let coordinator = active_coordinator().await;
    let secret = secret_of(&coordinator).await;

    coordinator
        .submit_guess(PLAYER, &miss_guess(&secret), auth(1, 1, 1_000_000))
        .await
        .expect("first submission accepted");

    let err = coordinator
        .submit_guess(PLAYER, &miss_guess(&secret), auth(1, 1, 1_000_000))
        .await
        .expect_err("replay rejected");
    assert!(matches!(err, Error::Replay { .. }));

    // Round state is unchanged from after the first attempt: one payment,
    // one guess.
    let ledger = coordinator.ledger_for_tests();
    assert_eq!(ledger.record(1).expect("round 1").pot, 1_000_000);
    let status = coordinator.public_state().await;
    assert_eq!(status.round.expect("round").guesses.len(), 1);
}

#[tokio::test]
async fn test_near_match_escalates_buy_in() {
    let coordinator = active_coordinator().await;
    let secret = secret_of(&coordinator).await;

    let outcome = coordinator
        .submit_guess(PLAYER, &near_guess(&secret), auth(1, 1, 1_000_000))
        .await
        .expect("near match accepted");
    assert_eq!(outcome.record.matches, 3);
    assert_eq!(outcome.record.price_step_at_guess, 0);
    assert_eq!(outcome.snapshot.buy_in, 1_150_000);
    assert_eq!(outcome.snapshot.price_steps, 1);

    // Escalation compounds on the escalated price.
    let outcome = coordinator
        .submit_guess(PLAYER, &near_guess(&secret), auth(1, 2, 1_150_000))
        .await
        .expect("second near match accepted");
    assert_eq!(outcome.record.price_step_at_guess, 1);
    assert_eq!(outcome.snapshot.buy_in, 1_322_500);
    assert_eq!(outcome.snapshot.price_steps, 2);
}

#[tokio::test]
async fn test_miss_does_not_escalate() {
    let coordinator = active_coordinator().await;
    let secret = secret_of(&coordinator).await;

    let outcome = coordinator
        .submit_guess(PLAYER, &miss_guess(&secret), auth(1, 1, 1_000_000))
        .await
        .expect("miss accepted");
    assert_eq!(outcome.snapshot.buy_in, 1_000_000);
    assert_eq!(outcome.snapshot.price_steps, 0);
}

#[tokio::test]
async fn test_exact_match_settles_and_opens_next_round() {
    let coordinator = active_coordinator().await;
    let secret = secret_of(&coordinator).await;
    let first_digest = coordinator
        .public_state()
        .await
        .round
        .expect("round")
        .commitment_digest;

    // Build the pot with a miss first.
    coordinator
        .submit_guess(PLAYER, &miss_guess(&secret), auth(1, 1, 1_000_000))
        .await
        .expect("miss accepted");

    let outcome = coordinator
        .submit_guess(PLAYER, &secret, auth(1, 2, 1_000_000))
        .await
        .expect("winning guess accepted");

    // Payout is the full pot at match time (both payments).
    assert_eq!(outcome.payout, Some(2_000_000));
    assert!(outcome.settlement_error.is_none());
    assert_eq!(outcome.record.matches, 4);

    // The returned snapshot is already the next round.
    assert_eq!(outcome.snapshot.round_id, 2);
    assert_eq!(outcome.snapshot.pot, 0);
    assert_eq!(outcome.snapshot.price_steps, 0);
    assert!(outcome.snapshot.guesses.is_empty());
    assert_ne!(outcome.snapshot.commitment_digest, first_digest);

    let status = coordinator.public_state().await;
    assert_eq!(status.phase, RoundPhase::Active);

    // Ledger: round 1 settled to the player, round 2 active under the new
    // commitment.
    let ledger = coordinator.ledger_for_tests();
    let settled = ledger.record(1).expect("round 1");
    assert!(!settled.active);
    assert_eq!(settled.winner, Some(player_address()));
    assert_eq!(settled.pot, 0);
    let fresh = ledger.record(2).expect("round 2");
    assert!(fresh.active);
    let next_secret = secret_of(&coordinator).await;
    assert_ne!(next_secret, secret);
    assert!(potshot_engine::verify_commitment(
        2,
        &next_secret,
        &hex::encode(fresh.commitment)
    ));

    // Rollover cleared the processed-payment set: the old nonce is usable
    // on the new round.
    coordinator
        .submit_guess(PLAYER, &miss_guess(&next_secret), auth(2, 1, 1_000_000))
        .await
        .expect("nonce reusable after rollover");
}

#[tokio::test]
async fn test_settle_failure_keeps_round_settling() {
    let coordinator = active_coordinator().await;
    let secret = secret_of(&coordinator).await;
    coordinator.ledger_for_tests().fail_next_settle();

    let outcome = coordinator
        .submit_guess(PLAYER, &secret, auth(1, 1, 1_000_000))
        .await
        .expect("winning guess still returned");
    assert_eq!(outcome.payout, Some(1_000_000));
    assert!(outcome.settlement_error.is_some());
    assert_eq!(outcome.snapshot.round_id, 1);

    let status = coordinator.public_state().await;
    assert_eq!(status.phase, RoundPhase::Settling);

    // A guess during settling consumes its payment, then is rejected: the
    // settled/length validation deliberately runs after the funds move.
    let err = coordinator
        .submit_guess(PLAYER, &miss_guess(&secret), auth(1, 2, 1_000_000))
        .await
        .expect_err("settled round rejects guesses");
    assert!(matches!(err, Error::Validation(_)));
    assert!(err.to_string().contains("already settled"));
    let ledger = coordinator.ledger_for_tests();
    assert_eq!(ledger.record(1).expect("round 1").pot, 2_000_000);

    // The explicit retry completes the advance.
    let status = coordinator
        .retry_settlement()
        .await
        .expect("retry settles and opens");
    assert_eq!(status.phase, RoundPhase::Active);
    assert_eq!(status.round.expect("round").round_id, 2);
    assert_eq!(
        ledger.record(1).expect("round 1").winner,
        Some(player_address())
    );
}

#[tokio::test]
async fn test_retry_settlement_requires_pending_settlement() {
    let coordinator = active_coordinator().await;
    let err = coordinator
        .retry_settlement()
        .await
        .expect_err("nothing to retry");
    assert!(matches!(err, Error::Validation(_)));
}

#[tokio::test]
async fn test_mislength_guess_consumes_payment_but_not_nonce() {
    let coordinator = active_coordinator().await;
    let secret = secret_of(&coordinator).await;

    let err = coordinator
        .submit_guess(PLAYER, "12345", auth(1, 1, 1_000_000))
        .await
        .expect_err("five digits against a four-digit round");
    assert!(matches!(err, Error::Validation(_)));

    // The payment went through and the counters keep it.
    let ledger = coordinator.ledger_for_tests();
    assert_eq!(ledger.record(1).expect("round 1").pot, 1_000_000);
    assert_eq!(ledger.record(1).expect("round 1").guess_count, 1);
    let status = coordinator.public_state().await;
    let round = status.round.expect("round");
    assert_eq!(round.pot, 1_000_000);
    assert_eq!(round.guess_count, 1);
    // The rejected guess is not in the log.
    assert!(round.guesses.is_empty());

    // The nonce was not consumed by the rejected guess.
    coordinator
        .submit_guess(PLAYER, &miss_guess(&secret), auth(1, 1, 1_000_000))
        .await
        .expect("same nonce accepted after local rejection");
}

#[tokio::test]
async fn test_nondecimal_guess_rejected_before_payment() {
    let coordinator = active_coordinator().await;

    for bad in ["12a4", "", "12 4", "١٢٣٤"] {
        let err = coordinator
            .submit_guess(PLAYER, bad, auth(1, 1, 1_000_000))
            .await
            .expect_err("non-decimal guess rejected");
        assert!(matches!(err, Error::Validation(_)));
    }

    // No ledger call was attempted.
    let ledger = coordinator.ledger_for_tests();
    assert_eq!(ledger.record(1).expect("round 1").pot, 0);
}

#[tokio::test]
async fn test_wrong_round_authorization_rejected_before_payment() {
    let coordinator = active_coordinator().await;
    let secret = secret_of(&coordinator).await;

    let err = coordinator
        .submit_guess(PLAYER, &miss_guess(&secret), auth(9, 1, 1_000_000))
        .await
        .expect_err("stale round authorization rejected");
    assert!(matches!(err, Error::Authorization(_)));
    let ledger = coordinator.ledger_for_tests();
    assert_eq!(ledger.record(1).expect("round 1").pot, 0);
}

#[tokio::test]
async fn test_confirmation_timeout_leaves_state_unchanged() {
    let coordinator = active_coordinator().await;
    let secret = secret_of(&coordinator).await;
    coordinator
        .ledger_for_tests()
        .fail_next_payment(ChainError::ConfirmationTimeout {
            tx_hash: "0xabc".to_string(),
            waited_secs: 5,
        });

    let err = coordinator
        .submit_guess(PLAYER, &miss_guess(&secret), auth(1, 1, 1_000_000))
        .await
        .expect_err("timeout surfaces");
    assert!(matches!(err, Error::ChainTimeout(_)));

    // Safe to retry with the same nonce: nothing was recorded.
    let status = coordinator.public_state().await;
    assert!(status.round.expect("round").guesses.is_empty());
    coordinator
        .submit_guess(PLAYER, &miss_guess(&secret), auth(1, 1, 1_000_000))
        .await
        .expect("retry after timeout accepted");
}

#[tokio::test]
async fn test_reverted_payment_surfaces_chain_error() {
    let coordinator = active_coordinator().await;
    let secret = secret_of(&coordinator).await;
    coordinator
        .ledger_for_tests()
        .fail_next_payment(ChainError::Reverted {
            tx_hash: "0xabc".to_string(),
        });

    let err = coordinator
        .submit_guess(PLAYER, &miss_guess(&secret), auth(1, 1, 1_000_000))
        .await
        .expect_err("revert surfaces");
    assert!(matches!(err, Error::Chain(_)));
}

#[tokio::test]
async fn test_ledger_advance_rebuilds_local_round() {
    let coordinator = active_coordinator().await;
    let secret = secret_of(&coordinator).await;
    coordinator
        .submit_guess(PLAYER, &miss_guess(&secret), auth(1, 1, 1_000_000))
        .await
        .expect("guess accepted");

    // Another operator settles round 1 and opens round 2 under a commitment
    // this coordinator cannot know.
    let ledger = coordinator.ledger_for_tests();
    ledger.advance_externally([0x42; 32], 7_000_000);

    // Reconciliation drops the stale round; round 2's secret is unknowable,
    // so it is closed and round 3 is sealed fresh.
    let status = coordinator.bootstrap().await.expect("reconcile");
    assert_eq!(status.phase, RoundPhase::Active);
    let round = status.round.expect("round");
    assert_eq!(round.round_id, 3);
    assert!(round.guesses.is_empty());

    assert!(!ledger.record(2).expect("round 2").active);
    let fresh = ledger.record(3).expect("round 3");
    assert!(fresh.active);
    let next_secret = secret_of(&coordinator).await;
    assert!(potshot_engine::verify_commitment(
        3,
        &next_secret,
        &hex::encode(fresh.commitment)
    ));
}

#[tokio::test]
async fn test_reset_round_closes_and_reopens_with_override() {
    let coordinator = active_coordinator().await;
    let secret = secret_of(&coordinator).await;
    coordinator
        .submit_guess(PLAYER, &miss_guess(&secret), auth(1, 1, 1_000_000))
        .await
        .expect("guess accepted");

    let status = coordinator
        .reset_round(Some(2_000_000))
        .await
        .expect("reset opens a fresh round");
    assert_eq!(status.phase, RoundPhase::Active);
    let round = status.round.expect("round");
    assert_eq!(round.round_id, 2);
    assert_eq!(round.buy_in, 2_000_000);
    assert!(round.guesses.is_empty());

    // The closed round's pot stays escrowed and is withdrawable.
    let ledger = coordinator.ledger_for_tests();
    let closed = ledger.record(1).expect("round 1");
    assert!(!closed.active);
    assert!(closed.winner.is_none());
    assert_eq!(closed.pot, 1_000_000);
    coordinator
        .withdraw_idle(PLAYER, 500_000)
        .await
        .expect("idle withdrawal");
    assert_eq!(ledger.withdrawn(), 500_000);
}

#[tokio::test]
async fn test_close_round_without_payout() {
    let coordinator = active_coordinator().await;
    let status = coordinator.close_round().await.expect("close");
    assert_eq!(status.phase, RoundPhase::Closed);
    assert!(!coordinator
        .ledger_for_tests()
        .record(1)
        .expect("round 1")
        .active);
}

#[tokio::test]
async fn test_push_buy_in_is_the_only_ledger_price_path() {
    let coordinator = active_coordinator().await;
    let secret = secret_of(&coordinator).await;

    coordinator
        .submit_guess(PLAYER, &near_guess(&secret), auth(1, 1, 1_000_000))
        .await
        .expect("near match accepted");

    // Escalation is local until explicitly pushed.
    let ledger = coordinator.ledger_for_tests();
    assert_eq!(ledger.record(1).expect("round 1").buy_in, 1_000_000);

    coordinator.push_buy_in().await.expect("push");
    assert_eq!(ledger.record(1).expect("round 1").buy_in, 1_150_000);
}

#[tokio::test]
async fn test_read_only_coordinator_serves_status_only() {
    let coordinator =
        Coordinator::new(MockLedger::read_only(), test_config()).expect("config is valid");

    let err = coordinator
        .bootstrap()
        .await
        .expect_err("cannot open a round without a signer");
    assert!(matches!(err, Error::Configuration(_)));

    // Read-only queries still work.
    let status = coordinator.public_state().await;
    assert_eq!(status.phase, RoundPhase::Bootstrapping);
    assert!(status.round.is_none());
}
