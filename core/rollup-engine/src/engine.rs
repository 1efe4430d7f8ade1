//! FILENAME: core/rollup-engine/src/engine.rs
//! Rollup Engine - The pipeline that turns raw submissions into the view.
//!
//! Algorithm:
//! 1. Serialize the raw input into a cache key; a hit returns immediately
//! 2. Fold entries in order: validate the term, find or create its record
//! 3. Fold each info item: validate stream/detailed, then either merge into
//!    the existing stream and recompute its aggregates, or normalize a new one
//! 4. Flatten terms into the view, sorting each stream's detail latest first
//! 5. Store the finished view in the cache and return it

use std::sync::Arc;

use indexmap::map::Entry;
use indexmap::IndexMap;
use rustc_hash::FxHashSet;
use serde_json::Value;
use uuid::Uuid;

use crate::cache::ResultCache;
use crate::definition::{
    RollupConfig, ValidationPolicy, DETAILED_FIELD, INFO_FIELD, STREAM_FIELD, TERM_FIELD,
};
use crate::error::{Rejection, RollupError};
use crate::transform::{calculate_aggregates, coerce_detailed, merge_detailed, normalize_data};
use crate::validate::{is_valid_detailed, is_valid_stream, is_valid_term, is_valid_value};
use crate::view::{MonthRange, ProcessedOutput, StreamInfo, TermView};

// ============================================================================
// WORKING STATE
// ============================================================================

/// A term being assembled during one pipeline run.
/// The id is fixed on creation and survives every merge in the run.
#[derive(Debug)]
struct TermRecord {
    id: String,
    term: String,
    /// Keyed by the configured stream field.
    info: IndexMap<String, StreamInfo>,
}

/// Applies the validation policy and records what was skipped.
struct Triage<'a> {
    policy: ValidationPolicy,
    diagnostics: &'a mut Vec<Rejection>,
}

impl Triage<'_> {
    /// `Ok` means "skip the item and continue"; `Err` aborts the call.
    fn reject(&mut self, rejection: Rejection) -> Result<(), RollupError> {
        match self.policy {
            ValidationPolicy::Lenient => {
                log::warn!("Skipping invalid input: {}", rejection);
                self.diagnostics.push(rejection);
                Ok(())
            }
            ValidationPolicy::Strict => Err(rejection.into()),
        }
    }
}

// ============================================================================
// ROLLUP CALCULATOR
// ============================================================================

/// Runs one uncached pass over the raw input.
struct RollupCalculator<'a> {
    config: &'a RollupConfig,
    triage: Triage<'a>,
    terms: IndexMap<String, TermRecord>,
    /// Ids handed out so far; a caller-supplied id is used at most once.
    assigned_ids: FxHashSet<String>,
}

impl<'a> RollupCalculator<'a> {
    fn new(config: &'a RollupConfig, diagnostics: &'a mut Vec<Rejection>) -> Self {
        RollupCalculator {
            config,
            triage: Triage {
                policy: config.policy,
                diagnostics,
            },
            terms: IndexMap::new(),
            assigned_ids: FxHashSet::default(),
        }
    }

    fn calculate(mut self, data: &Value) -> Result<ProcessedOutput, RollupError> {
        let entries = data.as_array().ok_or_else(|| {
            RollupError::MalformedInput(format!("expected an array of entries, got {}", kind_of(data)))
        })?;

        for (index, entry) in entries.iter().enumerate() {
            self.fold_entry(index, entry)?;
        }

        Ok(self.flatten())
    }

    fn fold_entry(&mut self, index: usize, entry: &Value) -> Result<(), RollupError> {
        let term_value = entry.get(TERM_FIELD);
        if !is_valid_term(term_value) {
            return self.triage.reject(Rejection::InvalidTerm { entry: index });
        }
        let term = term_value.and_then(Value::as_str).unwrap_or_default();

        let config = self.config;
        let record = match self.terms.entry(term.to_string()) {
            Entry::Occupied(occupied) => occupied.into_mut(),
            Entry::Vacant(vacant) => {
                let id = match config.unique_id_of(entry) {
                    Some(id) if !self.assigned_ids.contains(&id) => id,
                    Some(id) => {
                        self.triage.reject(Rejection::DuplicateId { entry: index, id })?;
                        Uuid::new_v4().to_string()
                    }
                    None => Uuid::new_v4().to_string(),
                };
                self.assigned_ids.insert(id.clone());
                vacant.insert(TermRecord {
                    id,
                    term: term.to_string(),
                    info: IndexMap::new(),
                })
            }
        };

        let items = match entry.get(INFO_FIELD) {
            Some(Value::Array(items)) => items,
            _ => return self.triage.reject(Rejection::InvalidInfo { entry: index }),
        };

        for (item_index, item) in items.iter().enumerate() {
            fold_item(config, &mut self.triage, record, index, item_index, item)?;
        }
        Ok(())
    }

    fn flatten(self) -> ProcessedOutput {
        self.terms
            .into_values()
            .map(|record| TermView {
                id: record.id,
                term: record.term,
                info: record
                    .info
                    .into_values()
                    .map(|mut stream| {
                        stream.sort_detailed();
                        stream
                    })
                    .collect(),
            })
            .collect()
    }
}

fn fold_item(
    config: &RollupConfig,
    triage: &mut Triage<'_>,
    record: &mut TermRecord,
    entry: usize,
    item_index: usize,
    item: &Value,
) -> Result<(), RollupError> {
    let stream = item.get(STREAM_FIELD);
    if !is_valid_stream(stream) {
        return triage.reject(Rejection::InvalidStream { entry, item: item_index });
    }
    let detailed = item.get(DETAILED_FIELD);
    if !is_valid_detailed(detailed) {
        return triage.reject(Rejection::InvalidDetailed { entry, item: item_index });
    }

    let raw = detailed.and_then(Value::as_array).map(Vec::as_slice).unwrap_or_default();

    if config.validate_values {
        if let Some(position) = raw.iter().position(|r| !is_valid_value(r.get("value"))) {
            return triage.reject(Rejection::InvalidValue {
                entry,
                item: item_index,
                record: position,
            });
        }
    }

    let stream_name = stream.and_then(Value::as_str).unwrap_or_default().to_string();
    let key = config
        .stream_key_of(item)
        .unwrap_or_else(|| stream_name.clone());

    match record.info.get_mut(&key) {
        Some(existing) => {
            let incoming = if config.normalize_merged {
                normalize_data(raw)?
            } else {
                coerce_detailed(raw)?
            };
            existing.detailed = merge_detailed(&existing.detailed, &incoming);
            refresh_aggregates(existing);
        }
        None => {
            let mut info = StreamInfo {
                stream: stream_name,
                detailed: normalize_data(raw)?,
                unique_branches: 0,
                month_range: MonthRange::default(),
                value: 0.0,
            };
            refresh_aggregates(&mut info);
            record.info.insert(key, info);
        }
    }
    Ok(())
}

fn refresh_aggregates(info: &mut StreamInfo) {
    let aggregates = calculate_aggregates(&info.detailed);
    info.value = aggregates.total;
    info.unique_branches = aggregates.unique_branches();
    info.month_range = aggregates.month_range();
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

// ============================================================================
// PUBLIC API
// ============================================================================

/// Side-effect counters, useful to observe cache behaviour.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EngineStats {
    /// Uncached passes, successful or not.
    pub pipeline_runs: u64,
    pub cache_hits: u64,
}

/// Owns a result cache and runs the pipeline against it.
/// One instance is one cache scope; build one per process, request or test.
#[derive(Debug, Default)]
pub struct RollupEngine {
    config: RollupConfig,
    cache: ResultCache,
    stats: EngineStats,
    diagnostics: Vec<Rejection>,
}

impl RollupEngine {
    pub fn new(config: RollupConfig) -> Self {
        RollupEngine {
            config,
            ..Default::default()
        }
    }

    pub fn config(&self) -> &RollupConfig {
        &self.config
    }

    pub fn cache(&self) -> &ResultCache {
        &self.cache
    }

    pub fn cache_mut(&mut self) -> &mut ResultCache {
        &mut self.cache
    }

    pub fn stats(&self) -> EngineStats {
        self.stats
    }

    /// Items skipped by the most recent uncached run.
    pub fn diagnostics(&self) -> &[Rejection] {
        &self.diagnostics
    }

    /// Processes raw term/stream/detail submissions.
    ///
    /// Serialization-identical input is served from the cache as the same
    /// `Arc`. A failed run never touches the cache.
    pub fn process_raw_data(&mut self, data: &Value) -> Result<Arc<ProcessedOutput>, RollupError> {
        let key = match ResultCache::generate_key(data) {
            Ok(key) => key,
            Err(err) => return self.fail(err),
        };

        if let Some(hit) = self.cache.get(&key) {
            self.stats.cache_hits += 1;
            log::debug!("Rollup cache hit ({} terms)", hit.len());
            return Ok(hit);
        }

        self.stats.pipeline_runs += 1;
        self.diagnostics.clear();

        let result = RollupCalculator::new(&self.config, &mut self.diagnostics).calculate(data);
        match result {
            Ok(output) => {
                log::debug!(
                    "Rollup computed {} terms, {} items skipped",
                    output.len(),
                    self.diagnostics.len()
                );
                let output = Arc::new(output);
                self.cache.set(key, Arc::clone(&output));
                Ok(output)
            }
            Err(err) => self.fail(err),
        }
    }

    /// Parses `raw` as JSON, then processes it. A parse error is returned
    /// under either policy.
    pub fn process_json(&mut self, raw: &str) -> Result<Arc<ProcessedOutput>, RollupError> {
        let data: Value = serde_json::from_str(raw)?;
        self.process_raw_data(&data)
    }

    /// Drops every memoized result; later calls recompute.
    pub fn clear_cache(&mut self) {
        log::debug!("Clearing rollup cache ({} entries)", self.cache.len());
        self.cache.clear();
    }

    fn fail(&self, err: RollupError) -> Result<Arc<ProcessedOutput>, RollupError> {
        log::error!("Rollup pipeline failed: {}", err);
        match self.config.policy {
            ValidationPolicy::Lenient => Ok(Arc::new(Vec::new())),
            ValidationPolicy::Strict => Err(err),
        }
    }
}
