//! Binary cache for decoded rule sets.
//!
//! Decoding a large rule document validates every node; the cache lets a
//! host skip the JSON tokenizer and detect stale or corrupted files cheaply.
//! The format is a 32-byte fixed header followed by a bincode-encoded payload.
//!
//! ## Wire Format
//!
//! ```text
//! Offset  Size  Field
//! 0       4     Magic bytes: b"RRUL"
//! 4       2     Format version (u16, little-endian)
//! 6       2     Engine version (u16, little-endian)
//! 8       4     Flags (u32, reserved)
//! 12      4     Payload length in bytes (u32, little-endian)
//! 16      16    BLAKE3 hash of the payload (truncated to 16 bytes)
//! 32..    var   Bincode-encoded payload
//! ```
//!
//! The payload carries metadata plus the canonical document as a string.
//! Loading re-runs the decoder on that document, so a cache can never
//! produce a tree the decoder would reject.
//!
//! ## Versioning
//!
//! The format version in the header must match exactly. If it does not,
//! deserialization fails immediately with [`DeserializeError::IncompatibleVersion`].
//! The engine version is informational only.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::document::{Decode, Encode};
use crate::types::RuleSet;

const MAGIC: &[u8; 4] = b"RRUL";
const FORMAT_VERSION: u16 = 1;
const ENGINE_VERSION: u16 = 1;
const HEADER_SIZE: usize = 32;

/// Errors that can occur when serializing a [`RuleSet`](crate::RuleSet) to bytes.
#[derive(Debug, Error)]
pub enum SerializeError {
    #[error("failed to encode rule set: {0}")]
    Encode(#[from] bincode::error::EncodeError),

    #[error("rule set document could not be rendered: {0}")]
    Document(#[from] serde_json::Error),

    #[error("payload of {0} bytes exceeds the 4 GiB format limit")]
    TooLarge(usize),

    #[error("I/O error during serialization: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors that can occur when deserializing a [`RuleSet`](crate::RuleSet) from bytes.
#[derive(Debug, Error)]
pub enum DeserializeError {
    #[error("not a rule cache: invalid magic bytes")]
    BadMagic,

    #[error("incompatible format version: blob is v{blob}, engine supports v{supported}")]
    IncompatibleVersion { blob: u16, supported: u16 },

    #[error("integrity check failed: BLAKE3 checksum mismatch")]
    ChecksumMismatch,

    #[error("payload length mismatch: expected {expected} bytes, got {actual}")]
    LengthMismatch { expected: u32, actual: usize },

    #[error("failed to decode payload: {0}")]
    Decode(#[from] bincode::error::DecodeError),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("I/O error during deserialization: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Serialize, Deserialize)]
struct CachedRuleSet {
    metadata: CacheMetadata,
    /// Canonical JSON of the rule set.
    document: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct CacheMetadata {
    rule_count: usize,
    filter_count: usize,
    package: Option<String>,
    source_digest: Option<[u8; 32]>,
}

/// Metadata stored alongside a cached rule set, readable without decoding
/// the rules themselves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheInfo {
    pub engine_version: u16,
    pub rule_count: usize,
    pub filter_count: usize,
    pub package: Option<String>,
    /// BLAKE3 hash of the source text given to [`RuleSet::to_bytes`], if any.
    pub source_digest: Option<[u8; 32]>,
}

impl CacheInfo {
    /// True when the cache was built from exactly `source_text`.
    #[must_use]
    pub fn matches_source(&self, source_text: &str) -> bool {
        self.source_digest == Some(*blake3::hash(source_text.as_bytes()).as_bytes())
    }
}

fn write_header(buf: &mut Vec<u8>, payload: &[u8]) -> Result<(), SerializeError> {
    let payload_len =
        u32::try_from(payload.len()).map_err(|_| SerializeError::TooLarge(payload.len()))?;
    let hash = blake3::hash(payload);

    buf.extend_from_slice(MAGIC);
    buf.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
    buf.extend_from_slice(&ENGINE_VERSION.to_le_bytes());
    buf.extend_from_slice(&0u32.to_le_bytes()); // flags
    buf.extend_from_slice(&payload_len.to_le_bytes());
    buf.extend_from_slice(&hash.as_bytes()[..16]);
    Ok(())
}

struct Header {
    format_version: u16,
    engine_version: u16,
    payload_len: u32,
    hash: [u8; 16],
}

#[allow(clippy::cast_possible_truncation)] // HEADER_SIZE is 32
fn read_header(bytes: &[u8]) -> Result<Header, DeserializeError> {
    if bytes.len() < HEADER_SIZE {
        return Err(DeserializeError::LengthMismatch {
            expected: HEADER_SIZE as u32,
            actual: bytes.len(),
        });
    }
    if &bytes[0..4] != MAGIC {
        return Err(DeserializeError::BadMagic);
    }

    let mut hash = [0u8; 16];
    hash.copy_from_slice(&bytes[16..32]);
    Ok(Header {
        format_version: u16::from_le_bytes([bytes[4], bytes[5]]),
        engine_version: u16::from_le_bytes([bytes[6], bytes[7]]),
        // bytes[8..12] are flags
        payload_len: u32::from_le_bytes([bytes[12], bytes[13], bytes[14], bytes[15]]),
        hash,
    })
}

/// Check the header and checksum, returning the verified payload.
fn payload(bytes: &[u8]) -> Result<(Header, CachedRuleSet), DeserializeError> {
    let header = read_header(bytes)?;
    if header.format_version != FORMAT_VERSION {
        return Err(DeserializeError::IncompatibleVersion {
            blob: header.format_version,
            supported: FORMAT_VERSION,
        });
    }

    let payload_end = HEADER_SIZE + header.payload_len as usize;
    if bytes.len() < payload_end {
        return Err(DeserializeError::LengthMismatch {
            expected: header.payload_len,
            actual: bytes.len() - HEADER_SIZE,
        });
    }
    let payload = &bytes[HEADER_SIZE..payload_end];
    if blake3::hash(payload).as_bytes()[..16] != header.hash {
        return Err(DeserializeError::ChecksumMismatch);
    }

    let (cached, _): (CachedRuleSet, usize) =
        bincode::serde::decode_from_slice(payload, bincode::config::standard())?;
    Ok((header, cached))
}

fn validate(cached: &CachedRuleSet, ruleset: &RuleSet) -> Result<(), DeserializeError> {
    if cached.metadata.rule_count != ruleset.rules.len() {
        return Err(DeserializeError::Validation(format!(
            "metadata says {} rules but document has {}",
            cached.metadata.rule_count,
            ruleset.rules.len()
        )));
    }
    if cached.metadata.filter_count != ruleset.filters.len() {
        return Err(DeserializeError::Validation(format!(
            "metadata says {} filters but document has {}",
            cached.metadata.filter_count,
            ruleset.filters.len()
        )));
    }
    if cached.metadata.package != ruleset.package {
        return Err(DeserializeError::Validation(
            "metadata package does not match document".to_owned(),
        ));
    }
    Ok(())
}

pub(crate) fn encode(
    ruleset: &RuleSet,
    source_text: Option<&str>,
) -> Result<Vec<u8>, SerializeError> {
    let cached = CachedRuleSet {
        metadata: CacheMetadata {
            rule_count: ruleset.rules.len(),
            filter_count: ruleset.filters.len(),
            package: ruleset.package.clone(),
            source_digest: source_text.map(|s| *blake3::hash(s.as_bytes()).as_bytes()),
        },
        document: serde_json::to_string(&ruleset.encode())?,
    };
    let payload = bincode::serde::encode_to_vec(&cached, bincode::config::standard())?;

    let mut buf = Vec::with_capacity(HEADER_SIZE + payload.len());
    write_header(&mut buf, &payload)?;
    buf.extend_from_slice(&payload);
    tracing::debug!(
        rules = ruleset.rules.len(),
        bytes = buf.len(),
        "encoded rule set cache"
    );
    Ok(buf)
}

pub(crate) fn decode(bytes: &[u8]) -> Result<RuleSet, DeserializeError> {
    let (_, cached) = payload(bytes)?;
    let doc: Value = serde_json::from_str(&cached.document)
        .map_err(|e| DeserializeError::Validation(format!("embedded document: {e}")))?;
    let ruleset = RuleSet::decode(&doc).map_err(|e| DeserializeError::Validation(e.to_string()))?;
    validate(&cached, &ruleset)?;
    Ok(ruleset)
}

/// Read the header and metadata of a cached rule set without decoding its rules.
///
/// # Errors
///
/// Returns [`DeserializeError`] on a bad header, checksum or payload.
pub fn inspect(bytes: &[u8]) -> Result<CacheInfo, DeserializeError> {
    let (header, cached) = payload(bytes)?;
    Ok(CacheInfo {
        engine_version: header.engine_version,
        rule_count: cached.metadata.rule_count,
        filter_count: cached.metadata.filter_count,
        package: cached.metadata.package,
        source_digest: cached.metadata.source_digest,
    })
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn sample() -> RuleSet {
        RuleSet::from_document(&json!({
            "package": "arena",
            "rules": [{
                "name": "tick",
                "trigger": {"type": "OnTick"},
                "effects": [{"type": "Increment", "path": "$.World.tick"}]
            }]
        }))
        .unwrap()
    }

    fn with_payload(cached: &CachedRuleSet) -> Vec<u8> {
        let payload = bincode::serde::encode_to_vec(cached, bincode::config::standard()).unwrap();
        let mut buf = Vec::new();
        write_header(&mut buf, &payload).unwrap();
        buf.extend_from_slice(&payload);
        buf
    }

    #[test]
    fn header_round_trip() {
        let payload = b"test payload data";
        let mut buf = Vec::new();
        write_header(&mut buf, payload).unwrap();
        assert_eq!(buf.len(), HEADER_SIZE);

        let header = read_header(&buf).unwrap();
        assert_eq!(header.format_version, FORMAT_VERSION);
        assert_eq!(header.engine_version, ENGINE_VERSION);
        assert_eq!(header.payload_len as usize, payload.len());
        assert_eq!(&header.hash, &blake3::hash(payload).as_bytes()[..16]);
    }

    #[test]
    fn header_bad_magic() {
        let mut buf = vec![0u8; HEADER_SIZE];
        buf[0..4].copy_from_slice(b"BAAD");
        assert!(matches!(read_header(&buf), Err(DeserializeError::BadMagic)));
    }

    #[test]
    fn header_too_short() {
        assert!(matches!(
            read_header(&[0u8; 10]),
            Err(DeserializeError::LengthMismatch { .. })
        ));
    }

    #[test]
    fn round_trip_through_decoder() {
        let ruleset = sample();
        let bytes = encode(&ruleset, None).unwrap();
        assert_eq!(&bytes[0..4], MAGIC);
        assert_eq!(decode(&bytes).unwrap(), ruleset);
    }

    #[test]
    fn inspect_reads_metadata() {
        let source = r#"{"package": "arena"}"#;
        let bytes = encode(&sample(), Some(source)).unwrap();
        let info = inspect(&bytes).unwrap();
        assert_eq!(info.rule_count, 1);
        assert_eq!(info.package.as_deref(), Some("arena"));
        assert!(info.matches_source(source));
        assert!(!info.matches_source("edited"));
    }

    #[test]
    fn count_mismatch_rejected() {
        let ruleset = sample();
        let bytes = with_payload(&CachedRuleSet {
            metadata: CacheMetadata {
                rule_count: 7,
                filter_count: 0,
                package: ruleset.package.clone(),
                source_digest: None,
            },
            document: serde_json::to_string(&ruleset.encode()).unwrap(),
        });
        assert!(matches!(decode(&bytes), Err(DeserializeError::Validation(_))));
    }

    #[test]
    fn invalid_document_rejected() {
        let bytes = with_payload(&CachedRuleSet {
            metadata: CacheMetadata {
                rule_count: 1,
                filter_count: 0,
                package: None,
                source_digest: None,
            },
            document: r#"{"rules": [{"name": "r", "trigger": {"type": "OnBlink"}}]}"#.to_owned(),
        });
        let err = decode(&bytes).unwrap_err();
        assert!(matches!(&err, DeserializeError::Validation(msg) if msg.contains("OnBlink")));
    }
}
