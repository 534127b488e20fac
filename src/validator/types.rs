//! Record types for batch URL validation

use serde::{Deserialize, Serialize};

/// An input record: arbitrary caller metadata, one field of which holds
/// the URL to check (the field name comes from
/// [`ValidatorConfig::url_field`](crate::config::ValidatorConfig)).
///
/// Items are never mutated; validation produces a new [`ValidatedItem`]
/// that carries the original alongside the outcome.
pub type ValidationItem = serde_json::Map<String, serde_json::Value>;

/// Outcome of validating one item.
///
/// The original metadata is flattened on serialization, so consumers see
/// the same merged shape the upstream service produced: all caller fields
/// plus the four validation fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidatedItem {
    /// The untouched input record
    #[serde(flatten)]
    pub original: ValidationItem,
    /// Whether the URL answered with a status below 400
    pub is_valid: bool,
    /// Last observed HTTP status, if any response was received
    pub status_code: Option<u16>,
    /// Terminal error description for failed items
    pub error_message: Option<String>,
    /// URL after following redirects, for successful checks
    pub final_url: Option<String>,
}

impl ValidatedItem {
    pub(crate) fn rejected(original: ValidationItem, message: String) -> Self {
        Self {
            original,
            is_valid: false,
            status_code: None,
            error_message: Some(message),
            final_url: None,
        }
    }
}
