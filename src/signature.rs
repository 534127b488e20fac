//! Deterministic configuration fingerprints
//!
//! The pool caches one browser per distinct configuration. The key is a
//! digest of the configuration's canonical JSON form: object keys sorted,
//! no whitespace, so the same settings hash identically across calls and
//! processes regardless of how the struct or map was built.
//!
//! xxh3 is not cryptographic; it only needs enough collision resistance
//! to keep distinct configurations from sharing a browser by accident.

use serde::Serialize;
use xxhash_rust::xxh3::xxh3_128;

/// Error produced when a configuration cannot be fingerprinted
#[derive(Debug, thiserror::Error)]
#[error("configuration is not serializable: {0}")]
pub struct SignatureError(#[from] serde_json::Error);

/// Compute the pool signature for a configuration object.
///
/// serde_json's default map keeps keys sorted, so converting through
/// `Value` before rendering yields the canonical form.
pub fn signature_of<T: Serialize>(config: &T) -> Result<String, SignatureError> {
    let value = serde_json::to_value(config)?;
    let canonical = serde_json::to_string(&value)?;
    Ok(hex::encode(xxh3_128(canonical.as_bytes()).to_be_bytes()))
}
