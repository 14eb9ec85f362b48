//! Fused tuple-at-a-time execution core for a columnar analytical database.
//!
//! A recognised sub-plan of the logical query plan (scan, MVCC validation,
//! predicates, projections, limit, aggregation) is fused into a single
//! operator chain that walks one chunk at a time, materialises each row into
//! a small fixed-slot runtime tuple, and evaluates expression trees against
//! it. Dictionary-encoded predicate columns are compared in the value-id
//! domain, with the target value-ids precomputed once per chunk.
//!
//! The [`plan::Translator`] decides what gets fused; the resulting
//! [`chain::OperatorChain`] executes against in-memory [`storage`] tables.

pub mod chain;
pub mod config;
pub mod error;
pub mod plan;
pub mod runtime;
pub mod storage;
pub mod types;

pub use chain::OperatorChain;
pub use config::{CancellationToken, EngineConfig};
pub use error::{ExecutionError, ExecutionResult, TranslateError, TranslateResult};
pub use plan::{PlanExpression, PlanNode, Translator};
pub use storage::{Snapshot, Table};
pub use types::{DataType, Value};
