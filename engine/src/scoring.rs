//! Exact-position guess scoring.
//!
//! `matches` counts positions where the guess digit equals the target digit.
//! This is not edit distance: transposed digits score as misses.

/// Result of scoring one guess against the sealed target.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Score {
    /// Positions where the guess digit equals the target digit.
    pub matches: u32,
    /// `digit_count - matches`.
    pub distance: u32,
    /// Human-readable proximity hint, e.g. `"2/4 digits in place"`.
    pub hint: String,
}

/// Scoring errors.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ScoreError {
    #[error("guess length {got} does not match round digit count {expected}")]
    LengthMismatch { expected: usize, got: usize },
}

/// Whether a guess is a non-empty run of ASCII decimal digits.
pub fn is_decimal(guess: &str) -> bool {
    !guess.is_empty() && guess.bytes().all(|b| b.is_ascii_digit())
}

/// Score a guess against the target. Both must be decimal strings of the
/// same length; a length mismatch is the caller's validation failure.
pub fn score(target: &str, guess: &str) -> Result<Score, ScoreError> {
    if guess.len() != target.len() {
        return Err(ScoreError::LengthMismatch {
            expected: target.len(),
            got: guess.len(),
        });
    }

    let matches = target
        .bytes()
        .zip(guess.bytes())
        .filter(|(t, g)| t == g)
        .count() as u32;
    let length = target.len() as u32;

    Ok(Score {
        matches,
        distance: length - matches,
        hint: format!("{matches}/{length} digits in place"),
    })
}
