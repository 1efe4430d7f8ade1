//! FILENAME: core/rollup-engine/src/shared.rs
//! Mutex-guarded engine for hosts that call in from several threads.
//!
//! Each call holds the lock for its whole duration, so cache reads and
//! writes never interleave across callers.

use std::sync::{Arc, Mutex, MutexGuard};

use serde_json::Value;

use crate::definition::RollupConfig;
use crate::engine::{EngineStats, RollupEngine};
use crate::error::RollupError;
use crate::view::ProcessedOutput;

#[derive(Debug, Default)]
pub struct SharedRollupEngine {
    inner: Mutex<RollupEngine>,
}

impl SharedRollupEngine {
    pub fn new(config: RollupConfig) -> Self {
        SharedRollupEngine {
            inner: Mutex::new(RollupEngine::new(config)),
        }
    }

    pub fn process_raw_data(&self, data: &Value) -> Result<Arc<ProcessedOutput>, RollupError> {
        self.lock().process_raw_data(data)
    }

    pub fn process_json(&self, raw: &str) -> Result<Arc<ProcessedOutput>, RollupError> {
        self.lock().process_json(raw)
    }

    pub fn clear_cache(&self) {
        self.lock().clear_cache();
    }

    pub fn stats(&self) -> EngineStats {
        self.lock().stats()
    }

    /// The cache is only written once an output is fully assembled, so the
    /// state behind a poisoned lock is still consistent.
    fn lock(&self) -> MutexGuard<'_, RollupEngine> {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::thread;

    #[test]
    fn test_concurrent_callers_share_one_cache() {
        let shared = Arc::new(SharedRollupEngine::default());
        let input = json!([{
            "term": "t1",
            "info": [{"stream": "s1", "detailed": [{"month": "2025-01", "branch": "b1", "value": 3}]}]
        }]);

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let shared = Arc::clone(&shared);
                let input = input.clone();
                thread::spawn(move || shared.process_raw_data(&input).map(|out| out.len()))
            })
            .collect();

        for handle in handles {
            assert_eq!(handle.join().unwrap().unwrap(), 1);
        }

        let stats = shared.stats();
        assert_eq!(stats.pipeline_runs, 1);
        assert_eq!(stats.cache_hits, 3);
    }

    #[test]
    fn test_poisoned_lock_is_recovered() {
        let shared = Arc::new(SharedRollupEngine::default());
        shared.process_json("[]").unwrap();

        let holder = Arc::clone(&shared);
        let result = thread::spawn(move || {
            let _guard = holder.inner.lock().unwrap();
            panic!("panic while holding the engine lock");
        })
        .join();
        assert!(result.is_err());
        assert!(shared.inner.is_poisoned());

        let output = shared
            .process_raw_data(&json!([{"term": "t1", "info": []}]))
            .unwrap();
        assert_eq!(output.len(), 1);
        assert_eq!(shared.stats().pipeline_runs, 2);
    }

    #[test]
    fn test_clear_cache_through_shared_handle() {
        let shared = SharedRollupEngine::new(RollupConfig::default());
        shared.process_json(r#"[{"term": "t1", "info": []}]"#).unwrap();
        shared.clear_cache();
        shared.process_json(r#"[{"term": "t1", "info": []}]"#).unwrap();
        assert_eq!(shared.stats().pipeline_runs, 2);
    }
}
