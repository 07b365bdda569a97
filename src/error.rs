use thiserror::Error;

use crate::document::DecodeError;
use crate::parse::ParseError;

/// Unified error type covering document parsing, decoding, and I/O.
///
/// Returned by convenience methods like [`RuleSet::from_json_str()`](crate::RuleSet::from_json_str)
/// and [`RuleSet::from_file()`](crate::RuleSet::from_file).
#[derive(Debug, Error)]
pub enum RulesError {
    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error("malformed JSON document: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[cfg(feature = "binary-cache")]
    #[error(transparent)]
    Serialize(#[from] crate::serial::SerializeError),

    #[cfg(feature = "binary-cache")]
    #[error(transparent)]
    Deserialize(#[from] crate::serial::DeserializeError),
}
