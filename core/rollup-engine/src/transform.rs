//! FILENAME: core/rollup-engine/src/transform.rs
//! Transformers over detail record sets.
//!
//! - `normalize_data` / `coerce_detailed`: raw JSON records -> `DetailRecord`
//! - `merge_detailed`: keyed merge with a latest-month tie-break
//! - `calculate_aggregates`: total, distinct branches, distinct months

use std::collections::BTreeSet;

use chrono::NaiveDate;
use indexmap::IndexMap;
use rustc_hash::FxHashSet;
use serde_json::Value;

use crate::definition::{scalar_text, DetailRecord};
use crate::error::RollupError;
use crate::validate::coerce_number;
use crate::view::MonthRange;

// ============================================================================
// RECORD CONVERSION
// ============================================================================

/// Converts a first-seen record set: `month`/`branch` trimmed, `value`
/// coerced with NaN and zero both mapped to `0`.
pub fn normalize_data(detailed: &[Value]) -> Result<Vec<DetailRecord>, RollupError> {
    detailed
        .iter()
        .enumerate()
        .map(|(index, raw)| {
            let (month, branch) = read_keys(index, raw)?;
            Ok(DetailRecord {
                month: month.trim().to_string(),
                branch: branch.trim().to_string(),
                value: falsy_to_zero(coerce_number(raw.get("value"))),
            })
        })
        .collect()
}

/// Converts records without normalizing them: text is kept verbatim and a
/// non-numeric value stays NaN.
pub fn coerce_detailed(detailed: &[Value]) -> Result<Vec<DetailRecord>, RollupError> {
    detailed
        .iter()
        .enumerate()
        .map(|(index, raw)| {
            let (month, branch) = read_keys(index, raw)?;
            Ok(DetailRecord {
                month,
                branch,
                value: coerce_number(raw.get("value")),
            })
        })
        .collect()
}

fn read_keys(index: usize, raw: &Value) -> Result<(String, String), RollupError> {
    if !raw.is_object() {
        return Err(RollupError::MalformedRecord {
            index,
            reason: "record is not an object".to_string(),
        });
    }
    let field = |name: &str| {
        raw.get(name)
            .and_then(scalar_text)
            .ok_or_else(|| RollupError::MalformedRecord {
                index,
                reason: format!("`{}` must be a string or number", name),
            })
    };
    Ok((field("month")?, field("branch")?))
}

fn falsy_to_zero(n: f64) -> f64 {
    if n.is_nan() || n == 0.0 {
        0.0
    } else {
        n
    }
}

// ============================================================================
// MERGE
// ============================================================================

/// Merges `incoming` into `existing`, keyed by `month + branch`.
///
/// An incoming record replaces the stored one only when its month, read as
/// a date, is strictly later. Replaced records keep their position, unseen
/// incoming records are appended. The result is not sorted.
pub fn merge_detailed(existing: &[DetailRecord], incoming: &[DetailRecord]) -> Vec<DetailRecord> {
    let mut merged: IndexMap<String, DetailRecord> =
        IndexMap::with_capacity(existing.len() + incoming.len());

    for record in existing {
        merged.insert(record.merge_key(), record.clone());
    }

    for record in incoming {
        let key = record.merge_key();
        match merged.get_mut(&key) {
            Some(stored) => {
                if is_later_month(&record.month, &stored.month) {
                    *stored = record.clone();
                }
            }
            None => {
                merged.insert(key, record.clone());
            }
        }
    }

    merged.into_values().collect()
}

/// First day of a `YYYY-MM` month, ignoring surrounding whitespace.
fn month_as_date(month: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(&format!("{}-01", month.trim()), "%Y-%m-%d").ok()
}

/// Unparseable months never compare as later.
fn is_later_month(candidate: &str, current: &str) -> bool {
    match (month_as_date(candidate), month_as_date(current)) {
        (Some(a), Some(b)) => a > b,
        _ => false,
    }
}

// ============================================================================
// AGGREGATES
// ============================================================================

/// Summary statistics over a record set.
#[derive(Debug, Clone, Default)]
pub struct Aggregates {
    /// Sum of values; a single NaN poisons it.
    pub total: f64,
    pub branches: FxHashSet<String>,
    pub months: BTreeSet<String>,
}

impl Aggregates {
    pub fn unique_branches(&self) -> usize {
        self.branches.len()
    }

    /// Lexicographic min/max of the months seen.
    pub fn month_range(&self) -> MonthRange {
        match (self.months.first(), self.months.last()) {
            (Some(start), Some(end)) => MonthRange {
                start: start.clone(),
                end: end.clone(),
            },
            _ => MonthRange::default(),
        }
    }
}

pub fn calculate_aggregates(detailed: &[DetailRecord]) -> Aggregates {
    detailed.iter().fold(Aggregates::default(), |mut acc, record| {
        acc.total += record.value;
        acc.branches.insert(record.branch.clone());
        acc.months.insert(record.month.clone());
        acc
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn rec(month: &str, branch: &str, value: f64) -> DetailRecord {
        DetailRecord::new(month, branch, value)
    }

    #[test]
    fn test_normalize_trims_and_zeroes() {
        let raw = vec![
            json!({"month": " 2025-01 ", "branch": " b1", "value": "12"}),
            json!({"month": "2025-02", "branch": "b2", "value": "oops"}),
            json!({"month": "2025-03", "branch": "b3"}),
        ];
        let records = normalize_data(&raw).unwrap();
        assert_eq!(records[0], rec("2025-01", "b1", 12.0));
        assert_eq!(records[1].value, 0.0);
        assert_eq!(records[2].value, 0.0);
    }

    #[test]
    fn test_coerce_keeps_raw_text_and_nan() {
        let raw = vec![json!({"month": " 2025-01", "branch": "b1 ", "value": "oops"})];
        let records = coerce_detailed(&raw).unwrap();
        assert_eq!(records[0].month, " 2025-01");
        assert_eq!(records[0].branch, "b1 ");
        assert!(records[0].value.is_nan());
    }

    #[test]
    fn test_numeric_keys_render_as_text() {
        let raw = vec![json!({"month": "2025-01", "branch": 7, "value": 1})];
        let records = normalize_data(&raw).unwrap();
        assert_eq!(records[0].branch, "7");
    }

    #[test]
    fn test_malformed_records() {
        let err = normalize_data(&[json!("2025-01")]).unwrap_err();
        assert!(matches!(err, RollupError::MalformedRecord { index: 0, .. }));

        let err = coerce_detailed(&[
            json!({"month": "2025-01", "branch": "b1", "value": 1}),
            json!({"month": "2025-02", "value": 1}),
        ])
        .unwrap_err();
        assert!(matches!(err, RollupError::MalformedRecord { index: 1, .. }));
    }

    #[test]
    fn test_merge_appends_unseen_keys() {
        let existing = vec![rec("2025-01", "b1", 100.0)];
        let incoming = vec![rec("2025-02", "b1", 50.0), rec("2025-01", "b2", 5.0)];

        let merged = merge_detailed(&existing, &incoming);

        assert_eq!(
            merged,
            vec![
                rec("2025-01", "b1", 100.0),
                rec("2025-02", "b1", 50.0),
                rec("2025-01", "b2", 5.0),
            ]
        );
    }

    #[test]
    fn test_merge_keeps_existing_on_same_key() {
        let existing = vec![rec("2025-01", "b1", 100.0)];
        let incoming = vec![rec("2025-01", "b1", 999.0)];

        let merged = merge_detailed(&existing, &incoming);

        assert_eq!(merged, vec![rec("2025-01", "b1", 100.0)]);
    }

    #[test]
    fn test_merge_replaces_on_later_month_with_colliding_key() {
        // "2024-12 " + "b1" and "2024-12" + " b1" concatenate to the same key;
        // neither month is later, so the stored record stays.
        let existing = vec![rec("2024-12 ", "b1", 1.0)];
        let merged = merge_detailed(&existing, &[rec("2024-12", " b1", 2.0)]);
        assert_eq!(merged, vec![rec("2024-12 ", "b1", 1.0)]);

        // "2024-1" + "2b" vs "2024-12" + "b": same key, the latter month is later.
        let existing = vec![rec("2024-1", "2b", 1.0)];
        let merged = merge_detailed(&existing, &[rec("2024-12", "b", 2.0)]);
        assert_eq!(merged, vec![rec("2024-12", "b", 2.0)]);
    }

    #[test]
    fn test_merge_collapses_duplicates_in_existing() {
        let existing = vec![
            rec("2025-01", "b1", 1.0),
            rec("2025-02", "b1", 2.0),
            rec("2025-01", "b1", 3.0),
        ];
        let merged = merge_detailed(&existing, &[]);
        assert_eq!(merged, vec![rec("2025-01", "b1", 3.0), rec("2025-02", "b1", 2.0)]);
    }

    #[test]
    fn test_merge_is_idempotent_for_repeated_input() {
        let a = vec![rec("2025-01", "b1", 10.0), rec("2025-02", "b2", 20.0)];
        let b = vec![rec("2025-02", "b2", 99.0), rec("2025-03", "b1", 30.0)];

        let once = merge_detailed(&a, &b);
        let twice = merge_detailed(&once, &b);

        assert_eq!(once, twice);
    }

    #[test]
    fn test_aggregates() {
        let records = vec![
            rec("2025-03", "b1", 10.0),
            rec("2025-01", "b2", 20.0),
            rec("2025-02", "b1", 5.5),
        ];
        let agg = calculate_aggregates(&records);
        assert_eq!(agg.total, 35.5);
        assert_eq!(agg.unique_branches(), 2);
        assert_eq!(agg.months.len(), 3);
        assert_eq!(
            agg.month_range(),
            MonthRange {
                start: "2025-01".to_string(),
                end: "2025-03".to_string()
            }
        );
    }

    #[test]
    fn test_aggregates_nan_poisons_total() {
        let records = vec![rec("2025-01", "b1", 10.0), rec("2025-02", "b1", f64::NAN)];
        let agg = calculate_aggregates(&records);
        assert!(agg.total.is_nan());
        assert_eq!(agg.unique_branches(), 1);
    }

    #[test]
    fn test_aggregates_empty() {
        let agg = calculate_aggregates(&[]);
        assert_eq!(agg.total, 0.0);
        assert_eq!(agg.unique_branches(), 0);
        assert_eq!(agg.month_range(), MonthRange::default());
    }
}
