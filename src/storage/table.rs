use crate::storage::chunk::Chunk;
use crate::storage::segment::{Segment, ValueSegment};
use crate::types::{ChunkId, ColumnId, DataType, Value};
use std::sync::Arc;

pub const DEFAULT_MAX_CHUNK_SIZE: usize = 2048;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDefinition {
    pub name: String,
    pub data_type: DataType,
    pub nullable: bool,
}

impl ColumnDefinition {
    pub fn new(name: impl Into<String>, data_type: DataType, nullable: bool) -> Self {
        ColumnDefinition {
            name: name.into(),
            data_type,
            nullable,
        }
    }
}

/// Whether a table owns its rows or merely references rows of another table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableKind {
    Data,
    References,
}

#[derive(Debug, Clone)]
pub struct Table {
    columns: Vec<ColumnDefinition>,
    chunks: Vec<Arc<Chunk>>,
    kind: TableKind,
    max_chunk_size: usize,
}

impl Table {
    pub fn new(columns: Vec<ColumnDefinition>, kind: TableKind) -> Self {
        Table {
            columns,
            chunks: Vec::new(),
            kind,
            max_chunk_size: DEFAULT_MAX_CHUNK_SIZE,
        }
    }

    pub fn with_max_chunk_size(mut self, max_chunk_size: usize) -> Self {
        assert!(max_chunk_size > 0, "chunk size target must be positive");
        self.max_chunk_size = max_chunk_size;
        self
    }

    pub fn add_chunk(&mut self, chunk: Chunk) {
        assert_eq!(
            chunk.column_count(),
            self.columns.len(),
            "chunk column count does not match the table schema"
        );
        self.chunks.push(Arc::new(chunk));
    }

    pub fn kind(&self) -> TableKind {
        self.kind
    }

    pub fn max_chunk_size(&self) -> usize {
        self.max_chunk_size
    }

    pub fn chunk_count(&self) -> ChunkId {
        self.chunks.len() as ChunkId
    }

    pub fn get_chunk(&self, chunk_id: ChunkId) -> &Arc<Chunk> {
        &self.chunks[chunk_id as usize]
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn column_definitions(&self) -> &[ColumnDefinition] {
        &self.columns
    }

    pub fn column_name(&self, column_id: ColumnId) -> &str {
        &self.columns[column_id].name
    }

    pub fn column_data_type(&self, column_id: ColumnId) -> DataType {
        self.columns[column_id].data_type
    }

    pub fn column_is_nullable(&self, column_id: ColumnId) -> bool {
        self.columns[column_id].nullable
    }

    pub fn row_count(&self) -> usize {
        self.chunks.iter().map(|chunk| chunk.size() as usize).sum()
    }

    /// Decodes one column across all chunks into owned scalars, resolving
    /// dictionary and reference encodings. Nulls come back as `Value::Null`.
    ///
    /// This walks every row and exists for result collection and tests, not
    /// for the execution hot path.
    pub fn materialize_column(&self, column_id: ColumnId) -> Vec<Value> {
        let mut values = Vec::with_capacity(self.row_count());
        for chunk in &self.chunks {
            let segment = chunk.get_segment(column_id);
            for row in 0..segment.len() {
                values.push(materialize_cell(segment, row));
            }
        }
        values
    }
}

fn materialize_cell(segment: &Segment, row: usize) -> Value {
    match segment {
        Segment::Value(ValueSegment { data, nulls }) => {
            if nulls.as_ref().is_some_and(|nulls| nulls[row]) {
                Value::Null
            } else {
                data.value_at(row)
            }
        }
        Segment::Dictionary(dictionary) => {
            let value_id = dictionary.value_id_at(row);
            if value_id == crate::types::INVALID_VALUE_ID {
                Value::Null
            } else {
                dictionary.decode(value_id)
            }
        }
        Segment::Reference(reference) => {
            let row_id = reference.pos_list[row];
            let chunk = reference.referenced_table.get_chunk(row_id.chunk_id);
            let target = chunk.get_segment(reference.referenced_column);
            materialize_cell(target, row_id.chunk_offset as usize)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::segment::{DictionarySegment, PosList};
    use crate::types::RowId;

    fn int_table(rows: &[&[i64]]) -> Table {
        let mut table = Table::new(
            vec![ColumnDefinition::new("a", DataType::Int64, false)],
            TableKind::Data,
        );
        for chunk_rows in rows {
            let values: Vec<Value> = chunk_rows.iter().map(|v| Value::Int64(*v)).collect();
            table.add_chunk(Chunk::new(vec![Arc::new(Segment::Value(
                ValueSegment::from_values(DataType::Int64, &values),
            ))]));
        }
        table
    }

    #[test]
    fn test_materialize_across_chunks() {
        let table = int_table(&[&[1, 2], &[3]]);
        assert_eq!(
            table.materialize_column(0),
            vec![Value::Int64(1), Value::Int64(2), Value::Int64(3)]
        );
    }

    #[test]
    fn test_materialize_through_reference_segment() {
        let data = Arc::new(int_table(&[&[10, 20], &[30]]));
        let pos_list: Arc<PosList> =
            Arc::new(vec![RowId::new(1, 0), RowId::new(0, 1)]);
        let mut referencing = Table::new(
            vec![ColumnDefinition::new("a", DataType::Int64, false)],
            TableKind::References,
        );
        referencing.add_chunk(Chunk::new(vec![Arc::new(Segment::Reference(
            crate::storage::segment::ReferenceSegment::new(data, 0, pos_list),
        ))]));
        assert_eq!(
            referencing.materialize_column(0),
            vec![Value::Int64(30), Value::Int64(20)]
        );
    }

    #[test]
    fn test_materialize_decodes_dictionary_nulls() {
        let mut table = Table::new(
            vec![ColumnDefinition::new("s", DataType::String, true)],
            TableKind::Data,
        );
        table.add_chunk(Chunk::new(vec![Arc::new(Segment::Dictionary(
            DictionarySegment::from_values(
                DataType::String,
                &[Value::from("b"), Value::Null, Value::from("a")],
            ),
        ))]));
        assert_eq!(
            table.materialize_column(0),
            vec![Value::from("b"), Value::Null, Value::from("a")]
        );
    }
}
