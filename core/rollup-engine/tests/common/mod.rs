//! FILENAME: core/rollup-engine/tests/common/mod.rs
//! Fixtures for rollup-engine integration tests.

#![allow(dead_code)]

use serde_json::{json, Value};

/// A raw detail record.
pub fn detail(month: &str, branch: &str, value: Value) -> Value {
    json!({"month": month, "branch": branch, "value": value})
}

/// A raw info item for one stream.
pub fn stream(name: &str, detailed: Vec<Value>) -> Value {
    json!({"stream": name, "detailed": detailed})
}

/// A raw top-level entry.
pub fn entry(term: &str, info: Vec<Value>) -> Value {
    json!({"term": term, "info": info})
}

/// Regional sales fixture: two terms, overlapping streams and resubmissions.
pub struct SalesFixture;

impl SalesFixture {
    pub fn data() -> Value {
        Value::Array(vec![
            entry(
                "revenue",
                vec![
                    stream(
                        "online",
                        vec![
                            detail("2025-01", "north", json!(100)),
                            detail("2025-01", "south", json!(80)),
                            detail("2025-02", "north", json!(120)),
                        ],
                    ),
                    stream("retail", vec![detail("2025-01", "north", json!(40))]),
                ],
            ),
            entry(
                "headcount",
                vec![stream("staff", vec![detail("2025-03", "north", json!(12))])],
            ),
            entry(
                "revenue",
                vec![stream(
                    "online",
                    vec![
                        // Same key as an existing record: the stored one wins.
                        detail("2025-01", "north", json!(999)),
                        detail("2025-03", "south", json!(90)),
                    ],
                )],
            ),
        ])
    }
}
