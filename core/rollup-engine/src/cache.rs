//! FILENAME: core/rollup-engine/src/cache.rs
//! Result Cache - memoized pipeline outputs.
//!
//! Keys are the compact JSON serialization of the whole raw input. Values
//! are shared snapshots: a hit hands back the very `Arc` stored by the run
//! that produced it. No eviction, no TTL, no size bound; entries live until
//! deleted or cleared.

use std::sync::Arc;

use rustc_hash::FxHashMap;
use serde_json::Value;

use crate::error::RollupError;
use crate::view::ProcessedOutput;

#[derive(Debug, Default)]
pub struct ResultCache {
    entries: FxHashMap<String, Arc<ProcessedOutput>>,
}

impl ResultCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serializes the raw input into its lookup key.
    /// Only serialization-identical inputs share a key.
    pub fn generate_key(data: &Value) -> Result<String, RollupError> {
        Ok(serde_json::to_string(data)?)
    }

    pub fn get(&self, key: &str) -> Option<Arc<ProcessedOutput>> {
        self.entries.get(key).cloned()
    }

    pub fn set(&mut self, key: String, value: Arc<ProcessedOutput>) {
        self.entries.insert(key, value);
    }

    pub fn has(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn delete(&mut self, key: &str) -> Option<Arc<ProcessedOutput>> {
        self.entries.remove(key)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
