//! Prefix beam search over frame-wise class probabilities.
//!
//! Each hypothesis tracks two log-probabilities per frame: paths ending in
//! blank and paths ending in the hypothesis' last label. Keeping the two
//! apart is what lets a repeated label either collapse into its prefix or,
//! after a blank, start a fresh emission. Hypotheses share structure in a
//! prefix trie; an optional [`Scorer`](crate::scorer::Scorer) folds n-gram
//! language-model weight into extensions at unit boundaries and an optional
//! lexicon restricts extensions to in-vocabulary words.

mod batch;
mod state;
pub(crate) mod trie;

#[cfg(test)]
mod testutil;

use serde::{Deserialize, Serialize};

use crate::alphabet::Alphabet;
use crate::config::DecoderConfig;
use crate::error::Result;
use crate::scorer::Scorer;

pub use batch::decode_batch;
pub use state::CtcDecoderState;

/// One ranked decoding hypothesis.
///
/// `tokens` are alphabet label ids with blanks and repeats collapsed;
/// `timesteps` holds the frame at which each token was emitted and is
/// non-decreasing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Output {
    pub tokens: Vec<u32>,
    pub timesteps: Vec<usize>,
    pub confidence: f32,
}

/// Decode a single utterance of `time_dim` rows laid out
/// `[time_dim][alphabet.size() + 1]`, the last class being the blank.
pub fn decode(
    probs: &[f32],
    time_dim: usize,
    alphabet: &Alphabet,
    config: &DecoderConfig,
    scorer: Option<&Scorer>,
) -> Result<Vec<Output>> {
    let mut state = CtcDecoderState::new(alphabet, config, scorer)?;
    state.feed(probs, time_dim)?;
    Ok(state.finish())
}
