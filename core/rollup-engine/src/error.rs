//! FILENAME: core/rollup-engine/src/error.rs

use thiserror::Error;

/// A structural problem with one input item.
/// Under the lenient policy the item is skipped and the batch continues;
/// under the strict policy the whole call aborts with it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    #[error("entry {entry}: term must be a non-empty string")]
    InvalidTerm { entry: usize },

    #[error("entry {entry}: unique id `{id}` already belongs to another term")]
    DuplicateId { entry: usize, id: String },

    #[error("entry {entry}: info must be an array")]
    InvalidInfo { entry: usize },

    #[error("entry {entry}, info {item}: stream must be a non-empty string")]
    InvalidStream { entry: usize, item: usize },

    #[error("entry {entry}, info {item}: detailed must be a non-empty array")]
    InvalidDetailed { entry: usize, item: usize },

    #[error("entry {entry}, info {item}, record {record}: value is not numeric")]
    InvalidValue { entry: usize, item: usize, record: usize },
}

#[derive(Error, Debug)]
pub enum RollupError {
    #[error("Rejected input: {0}")]
    Rejected(#[from] Rejection),

    #[error("Malformed input: {0}")]
    MalformedInput(String),

    #[error("Malformed detail record {index}: {reason}")]
    MalformedRecord { index: usize, reason: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
