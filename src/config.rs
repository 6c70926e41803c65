//! Decoding parameters, loadable from TOML.

use serde::Deserialize;

use crate::error::{DecodeError, Result};

/// Hard upper bound on the number of surviving prefixes per frame.
pub const MAX_BEAM_SIZE: usize = 10_000;

/// Embedded defaults, kept in sync with `Default` (checked by a test).
pub const DEFAULT_CONFIG_TOML: &str = include_str!("default_config.toml");

/// Beam-search decoding parameters.
///
/// Missing TOML keys fall back to the defaults, so a config file only needs
/// to name what it changes.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DecoderConfig {
    /// Number of prefixes kept alive per frame.
    pub beam_size: usize,
    /// Cumulative probability mass considered per frame (1.0 disables).
    pub cutoff_prob: f32,
    /// Maximum candidate labels considered per frame.
    pub cutoff_top_n: usize,
    /// Number of ranked hypotheses emitted per utterance.
    pub top_paths: usize,
    /// Worker threads for batch decoding.
    pub num_workers: usize,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            beam_size: 500,
            cutoff_prob: 1.0,
            cutoff_top_n: 40,
            top_paths: 1,
            num_workers: 1,
        }
    }
}

impl DecoderConfig {
    pub fn from_toml(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| DecodeError::Parse(e.to_string()))
    }

    /// Check ranges against the class dimension of the probability rows
    /// (`alphabet size + 1` for the blank).
    pub fn validate(&self, class_dim: usize) -> Result<()> {
        if self.beam_size == 0 || self.beam_size > MAX_BEAM_SIZE {
            return Err(DecodeError::InvalidArgument(format!(
                "beam_size must be in 1..={MAX_BEAM_SIZE}, got {}",
                self.beam_size
            )));
        }
        if !(self.cutoff_prob > 0.0 && self.cutoff_prob <= 1.0) {
            return Err(DecodeError::InvalidArgument(format!(
                "cutoff_prob must be in (0, 1], got {}",
                self.cutoff_prob
            )));
        }
        if self.cutoff_top_n == 0 || self.cutoff_top_n > class_dim {
            return Err(DecodeError::InvalidArgument(format!(
                "cutoff_top_n must be in 1..={class_dim}, got {}",
                self.cutoff_top_n
            )));
        }
        if self.top_paths == 0 {
            return Err(DecodeError::InvalidArgument(
                "top_paths must be at least 1".to_string(),
            ));
        }
        if self.num_workers == 0 {
            return Err(DecodeError::InvalidArgument(
                "num_workers must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embedded_defaults_match_default_impl() {
        let from_toml = DecoderConfig::from_toml(DEFAULT_CONFIG_TOML).unwrap();
        assert_eq!(from_toml, DecoderConfig::default());
    }

    #[test]
    fn test_partial_toml_overrides() {
        let config = DecoderConfig::from_toml("beam_size = 16\n").unwrap();
        assert_eq!(config.beam_size, 16);
        assert_eq!(config.cutoff_top_n, DecoderConfig::default().cutoff_top_n);
    }

    #[test]
    fn test_unknown_key_rejected() {
        assert!(DecoderConfig::from_toml("beam_width = 16\n").is_err());
    }

    fn with(f: impl FnOnce(&mut DecoderConfig)) -> DecoderConfig {
        let mut c = DecoderConfig::default();
        f(&mut c);
        c
    }

    #[test]
    fn test_validate_ranges() {
        assert!(DecoderConfig::default().validate(41).is_ok());
        assert!(with(|c| c.beam_size = 0).validate(41).is_err());
        assert!(with(|c| c.beam_size = MAX_BEAM_SIZE + 1).validate(41).is_err());
        assert!(with(|c| c.cutoff_prob = 0.0).validate(41).is_err());
        assert!(with(|c| c.cutoff_prob = 1.5).validate(41).is_err());
        assert!(with(|c| c.cutoff_top_n = 42).validate(41).is_err());
        assert!(with(|c| c.top_paths = 0).validate(41).is_err());
        assert!(with(|c| c.num_workers = 0).validate(41).is_err());
    }
}
