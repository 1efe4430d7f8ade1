//! FILENAME: core/rollup-engine/src/view.rs
//! Rollup View - The canonical output handed to consumers.
//!
//! These structures are what a renderer or downstream analysis receives.
//! They serialize with camelCase keys.

use serde::{Deserialize, Serialize};

use crate::definition::DetailRecord;

/// Earliest and latest month present in a stream.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonthRange {
    pub start: String,
    pub end: String,
}

/// One stream under a term, with its aggregates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamInfo {
    pub stream: String,
    /// Sorted by month, latest first.
    pub detailed: Vec<DetailRecord>,
    pub unique_branches: usize,
    pub month_range: MonthRange,
    /// Sum of `detailed[*].value`.
    pub value: f64,
}

impl StreamInfo {
    /// Sorts `detailed` latest month first. Stable, so ties keep their
    /// merge order.
    pub fn sort_detailed(&mut self) {
        self.detailed.sort_by(|a, b| b.month.cmp(&a.month));
    }
}

/// One term with its streams flattened into a list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TermView {
    pub id: String,
    pub term: String,
    pub info: Vec<StreamInfo>,
}

impl TermView {
    pub fn stream(&self, name: &str) -> Option<&StreamInfo> {
        self.info.iter().find(|s| s.stream == name)
    }
}

pub type ProcessedOutput = Vec<TermView>;
