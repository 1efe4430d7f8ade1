//! FILENAME: core/rollup-engine/src/definition.rs
//! Rollup Definition - Typed records and the engine configuration.
//!
//! Raw submissions arrive as loosely typed JSON. This module holds the
//! types those submissions are coerced into, plus the configuration that
//! decides which fields the engine reads and how strictly it validates.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::RollupError;

/// Field name validated as the stream identifier.
pub const STREAM_FIELD: &str = "stream";

/// Field name carrying the detail records of a stream.
pub const DETAILED_FIELD: &str = "detailed";

/// Field name of the top-level grouping key.
pub const TERM_FIELD: &str = "term";

/// Field name of the stream list under a term.
pub const INFO_FIELD: &str = "info";

/// Default field carrying a caller-supplied term identifier.
pub const UNIQUE_FIELD: &str = "unique";

// ============================================================================
// DETAIL RECORD
// ============================================================================

/// One dated, branch-tagged observation.
/// Identity for deduplication is `(month, branch)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetailRecord {
    /// `YYYY-MM`; fixed width, so string order is chronological order.
    pub month: String,
    pub branch: String,
    pub value: f64,
}

impl DetailRecord {
    pub fn new(month: impl Into<String>, branch: impl Into<String>, value: f64) -> Self {
        DetailRecord {
            month: month.into(),
            branch: branch.into(),
            value,
        }
    }

    /// Key used by the merge: month and branch concatenated.
    pub fn merge_key(&self) -> String {
        format!("{}{}", self.month, self.branch)
    }
}

// ============================================================================
// VALIDATION POLICY
// ============================================================================

/// How the engine reacts to a rejected item or an unexpected failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ValidationPolicy {
    /// Skip rejected items and keep folding; an unexpected failure yields
    /// an empty (uncached) result.
    #[default]
    Lenient,
    /// Abort the whole call with the first rejection or failure.
    Strict,
}

// ============================================================================
// CONFIGURATION
// ============================================================================

/// Engine configuration. Every field has a default, so `{}` is a valid
/// configuration document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RollupConfig {
    /// Field whose value keys the per-term stream map.
    #[serde(default = "default_stream_field")]
    pub stream: String,

    /// Field carrying a caller-supplied term identifier.
    #[serde(default = "default_unique_field")]
    pub unique: String,

    #[serde(default)]
    pub policy: ValidationPolicy,

    /// Gate every record value through `is_valid_value` before folding.
    #[serde(default)]
    pub validate_values: bool,

    /// Normalize records merged into an existing stream, not only the
    /// first set seen for it.
    #[serde(default)]
    pub normalize_merged: bool,
}

fn default_stream_field() -> String {
    STREAM_FIELD.to_string()
}

fn default_unique_field() -> String {
    UNIQUE_FIELD.to_string()
}

impl Default for RollupConfig {
    fn default() -> Self {
        RollupConfig {
            stream: default_stream_field(),
            unique: default_unique_field(),
            policy: ValidationPolicy::default(),
            validate_values: false,
            normalize_merged: false,
        }
    }
}

impl RollupConfig {
    /// Builds a configuration from a JSON document.
    pub fn from_json(raw: &str) -> Result<Self, RollupError> {
        Ok(serde_json::from_str(raw)?)
    }

    pub fn strict() -> Self {
        RollupConfig {
            policy: ValidationPolicy::Strict,
            ..Default::default()
        }
    }

    /// Lookup key for an info item's stream map entry.
    /// Reads the configured field and falls back to the literal `stream`
    /// when the configured field is absent, empty or not scalar text.
    pub fn stream_key_of(&self, item: &Value) -> Option<String> {
        item.get(&self.stream)
            .and_then(scalar_text)
            .filter(|key| !key.is_empty())
            .or_else(|| item.get(STREAM_FIELD).and_then(scalar_text))
    }

    /// Caller-supplied identifier of a term entry, if it carries one.
    pub fn unique_id_of(&self, entry: &Value) -> Option<String> {
        entry
            .get(&self.unique)
            .and_then(scalar_text)
            .filter(|id| !id.is_empty())
    }
}

/// Text of a string or number; `None` for every other shape.
pub fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
