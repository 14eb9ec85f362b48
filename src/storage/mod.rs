pub mod chunk;
pub mod mvcc;
pub mod segment;
pub mod table;

pub use chunk::Chunk;
pub use mvcc::{MvccArrays, Snapshot, is_row_visible};
pub use segment::{
    ColumnData, DictionarySegment, PosList, ReferenceSegment, Segment, SegmentEncoding,
    ValueSegment,
};
pub use table::{ColumnDefinition, DEFAULT_MAX_CHUNK_SIZE, Table, TableKind};
