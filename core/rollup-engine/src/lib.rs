//! FILENAME: core/rollup-engine/src/lib.rs
//! Term/stream rollup engine.
//!
//! Turns nested term -> stream -> detail submissions into a canonical,
//! deduplicated structure with per-stream aggregates, and memoizes whole
//! invocations by their serialized input.
//!
//! Layers:
//! - `definition`: Typed records and configuration (what the input IS)
//! - `validate`: Total predicates over raw values
//! - `transform`: Record conversion, merge and aggregates
//! - `cache`: Memoized results keyed by serialized input
//! - `view`: Canonical output handed to consumers (WHAT we return)
//! - `engine`: The pipeline (HOW we calculate)
//! - `shared`: Mutex-guarded engine for multi-context hosts

pub mod definition;
pub mod error;
pub mod validate;
pub mod transform;
pub mod cache;
pub mod view;
pub mod engine;
pub mod shared;

pub use definition::*;
pub use error::{Rejection, RollupError};
pub use cache::ResultCache;
pub use view::*;
pub use engine::{EngineStats, RollupEngine};
pub use shared::SharedRollupEngine;
pub use transform::{
    calculate_aggregates, coerce_detailed, merge_detailed, normalize_data, Aggregates,
};
