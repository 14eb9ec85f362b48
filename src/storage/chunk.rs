use crate::storage::mvcc::MvccArrays;
use crate::storage::segment::{PosList, Segment};
use crate::storage::table::Table;
use crate::types::{ChunkOffset, ColumnId};
use parking_lot::RwLock;
use std::sync::Arc;

/// An immutable horizontal slab of a table: one segment per column, all of
/// identical length, plus optional MVCC arrays of the same length.
///
/// The MVCC arrays sit behind a lock because the transaction manager mutates
/// them concurrently with reads; everything else in a chunk is frozen once
/// the chunk is built.
#[derive(Debug, Clone)]
pub struct Chunk {
    segments: Vec<Arc<Segment>>,
    mvcc: Option<Arc<RwLock<MvccArrays>>>,
}

impl Chunk {
    pub fn new(segments: Vec<Arc<Segment>>) -> Self {
        assert!(!segments.is_empty(), "a chunk needs at least one segment");
        let size = segments[0].len();
        assert!(
            segments.iter().all(|segment| segment.len() == size),
            "all segments of a chunk must have the same length"
        );
        Chunk {
            segments,
            mvcc: None,
        }
    }

    pub fn with_mvcc(segments: Vec<Arc<Segment>>, mvcc: MvccArrays) -> Self {
        let chunk = Chunk::new(segments);
        assert_eq!(
            chunk.size() as usize,
            mvcc.len(),
            "MVCC arrays must cover every row"
        );
        Chunk {
            mvcc: Some(Arc::new(RwLock::new(mvcc))),
            ..chunk
        }
    }

    pub fn size(&self) -> ChunkOffset {
        self.segments[0].len() as ChunkOffset
    }

    pub fn column_count(&self) -> usize {
        self.segments.len()
    }

    pub fn get_segment(&self, column_id: ColumnId) -> &Arc<Segment> {
        &self.segments[column_id]
    }

    pub fn has_mvcc_data(&self) -> bool {
        self.mvcc.is_some()
    }

    pub fn mvcc_arrays(&self) -> Option<&Arc<RwLock<MvccArrays>>> {
        self.mvcc.as_ref()
    }

    pub fn is_reference(&self) -> bool {
        matches!(&*self.segments[0], Segment::Reference(_))
    }

    /// The shared position list, when this is a reference chunk.
    pub fn position_list(&self) -> Option<Arc<PosList>> {
        match &*self.segments[0] {
            Segment::Reference(segment) => Some(Arc::clone(&segment.pos_list)),
            _ => None,
        }
    }

    /// The table behind this chunk's reference segments.
    pub fn referenced_table(&self) -> Option<Arc<Table>> {
        match &*self.segments[0] {
            Segment::Reference(segment) => Some(Arc::clone(&segment.referenced_table)),
            _ => None,
        }
    }

    /// Whether every reference segment points into the same table through the
    /// same position list. Validation of reference chunks requires this.
    pub fn references_exactly_one_table(&self) -> bool {
        let Segment::Reference(first) = &*self.segments[0] else {
            return false;
        };
        self.segments.iter().all(|segment| match &**segment {
            Segment::Reference(other) => {
                Arc::ptr_eq(&other.referenced_table, &first.referenced_table)
                    && Arc::ptr_eq(&other.pos_list, &first.pos_list)
            }
            _ => false,
        })
    }
}
