use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Engine-wide knobs, threaded explicitly through the translator and every
/// chain instead of living in process-global state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Materialise a column only on code paths that actually read it.
    pub lazy_load: bool,
    /// Fuse MVCC validation into the chain instead of leaving it to a
    /// stand-alone operator.
    pub fuse_validate: bool,
    /// Rewrite dictionary-column predicates into value-id comparisons.
    pub value_id_acceleration: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            lazy_load: true,
            fuse_validate: true,
            value_id_acceleration: true,
        }
    }
}

/// Caller-owned abort signal, consulted at chunk boundaries.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        CancellationToken::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}
