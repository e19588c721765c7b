//! Buy-in escalation on near-match guesses.
//!
//! A guess that lands at or above the round's near-match threshold without
//! winning raises the entry price by a fixed basis-point step, up to a
//! bounded number of steps per round. The escalated price lives in local
//! round state; it reaches the ledger only through the explicit
//! `updateBuyIn` administrative push, never automatically.

use potshot_types::Round;

/// Basis-point denominator (10000 = 100%).
pub const BPS_DENOMINATOR: u128 = 10_000;

/// Apply price escalation for a scored guess. Returns whether the buy-in
/// changed.
///
/// Fires only when `matches >= near_match_threshold`, the step cap has not
/// been reached, and the guess did not win outright. The increment is
/// `floor(buy_in * price_increase_bps / 10000)`; escalation is monotonic and
/// capped at `max_price_steps`.
pub fn apply_escalation(round: &mut Round, matches: u32, won: bool) -> bool {
    if won
        || matches < round.near_match_threshold
        || round.price_steps >= round.max_price_steps
    {
        return false;
    }

    let increment = round
        .buy_in
        .checked_mul(round.price_increase_bps as u128)
        .map(|raised| raised / BPS_DENOMINATOR);
    let escalated = increment.and_then(|inc| round.buy_in.checked_add(inc));

    match escalated {
        Some(buy_in) => {
            round.buy_in = buy_in;
            round.price_steps += 1;
            true
        }
        // Overflow would need a buy-in near u128::MAX; leave the price alone
        // rather than wrap.
        None => false,
    }
}
