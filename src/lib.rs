//! CTC prefix beam search decoding.
//!
//! Recovers the most likely label sequences from a time × class matrix of
//! per-frame probabilities, optionally rescored by an n-gram language model
//! and constrained to a lexicon.

pub mod alphabet;
pub mod config;
pub mod decoder;
pub mod error;
pub mod lexicon;
pub mod lm;
pub mod logmath;
pub mod scorer;
pub mod trace_init;

pub use alphabet::Alphabet;
pub use config::DecoderConfig;
pub use decoder::{decode, decode_batch, CtcDecoderState, Output};
pub use error::{DecodeError, Result};
pub use lexicon::Lexicon;
pub use lm::{ArpaModel, LanguageModel};
pub use scorer::Scorer;
