use std::io;

/// Unified error type for decoding, scorer construction and lexicon I/O.
///
/// A rejected lexicon transition during beam search is not an error: it
/// surfaces as a `None` extension inside the search and never reaches the
/// caller.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("language model IO: {0}")]
    LmIo(#[from] io::Error),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("lexicon error: {0}")]
    Lexicon(String),

    #[error("internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, DecodeError>;
