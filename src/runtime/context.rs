use crate::chain::aggregate::AggregateState;
use crate::chain::write::OutputState;
use crate::runtime::reader::{EncodingFingerprint, SegmentReader};
use crate::runtime::tuple::RuntimeTuple;
use crate::storage::mvcc::{MvccArrays, Snapshot};
use crate::storage::segment::PosList;
use crate::storage::table::Table;
use crate::types::{ChunkId, ChunkOffset};
use parking_lot::RawRwLock;
use parking_lot::lock_api::ArcRwLockReadGuard;
use std::sync::Arc;

/// All mutable state of one query execution.
///
/// The chain itself is immutable and shareable; everything a row mutates
/// lives here, owned by exactly one thread: the runtime tuple, cursor
/// positions, reader bindings, and the terminal operators' accumulators.
pub struct RuntimeContext {
    pub tuple: RuntimeTuple,

    pub chunk_id: ChunkId,
    pub chunk_offset: ChunkOffset,
    pub chunk_size: ChunkOffset,

    /// Rows the chain may still emit. `usize::MAX` when unlimited; the row
    /// loop stops once this reaches zero.
    pub limit_rows: usize,

    /// Readers bound to the current chunk, one per declared input column.
    pub readers: Vec<Box<dyn SegmentReader>>,
    /// Fingerprints of the first chunk's readers; later chunks compare
    /// against these to decide whether specialised dispatch is still valid.
    pub reader_fingerprints: Vec<EncodingFingerprint>,

    pub snapshot: Option<Snapshot>,
    /// Scoped read lock over the current chunk's MVCC arrays, held from one
    /// `before_chunk` to the next.
    pub mvcc_guard: Option<ArcRwLockReadGuard<RawRwLock, MvccArrays>>,
    /// Set while the current chunk is a reference chunk.
    pub referenced_table: Option<Arc<Table>>,
    pub pos_list: Option<Arc<PosList>>,

    pub aggregate: AggregateState,
    pub output: OutputState,
    pub output_pos_list: PosList,
}

impl RuntimeContext {
    pub fn new(snapshot: Option<Snapshot>) -> Self {
        RuntimeContext {
            tuple: RuntimeTuple::new(),
            chunk_id: 0,
            chunk_offset: 0,
            chunk_size: 0,
            limit_rows: usize::MAX,
            readers: Vec::new(),
            reader_fingerprints: Vec::new(),
            snapshot,
            mvcc_guard: None,
            referenced_table: None,
            pos_list: None,
            aggregate: AggregateState::default(),
            output: OutputState::default(),
            output_pos_list: PosList::new(),
        }
    }
}
