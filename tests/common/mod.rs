#![allow(dead_code)]

use shearwater::chain::OperatorChain;
use shearwater::plan::{PlanNode, Translator};
use shearwater::storage::{
    Chunk, ColumnDefinition, DictionarySegment, MvccArrays, PosList, ReferenceSegment, Segment,
    Table, TableKind, ValueSegment,
};
use once_cell::sync::OnceCell;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use shearwater::types::{DataType, RowId, Value};
use std::collections::HashMap;
use std::sync::Arc;

static SHARED_NUMBERS: OnceCell<Arc<Table>> = OnceCell::new();

/// A deterministic pseudo-random Int64 table shared by the heavier
/// differential tests.
pub fn shared_numbers_table() -> Arc<Table> {
    Arc::clone(SHARED_NUMBERS.get_or_init(|| {
        let mut rng = StdRng::seed_from_u64(0xC0FFEE);
        let chunks: Vec<Vec<i64>> = (0..8)
            .map(|_| (0..256).map(|_| rng.gen_range(-1000..1000)).collect())
            .collect();
        let slices: Vec<&[i64]> = chunks.iter().map(Vec::as_slice).collect();
        int64_table(&slices)
    }))
}

/// Builds a one-column Int64 data table, one chunk per slice.
pub fn int64_table(chunks: &[&[i64]]) -> Arc<Table> {
    let mut table = Table::new(
        vec![ColumnDefinition::new("a", DataType::Int64, false)],
        TableKind::Data,
    );
    for rows in chunks {
        let values: Vec<Value> = rows.iter().map(|v| Value::Int64(*v)).collect();
        table.add_chunk(Chunk::new(vec![Arc::new(Segment::Value(
            ValueSegment::from_values(DataType::Int64, &values),
        ))]));
    }
    Arc::new(table)
}

/// Builds a one-column nullable Int64 data table from optional rows.
pub fn nullable_int64_table(chunks: &[&[Option<i64>]]) -> Arc<Table> {
    let mut table = Table::new(
        vec![ColumnDefinition::new("a", DataType::Int64, true)],
        TableKind::Data,
    );
    for rows in chunks {
        let values: Vec<Value> = rows
            .iter()
            .map(|v| v.map(Value::Int64).unwrap_or(Value::Null))
            .collect();
        table.add_chunk(Chunk::new(vec![Arc::new(Segment::Value(
            ValueSegment::from_values(DataType::Int64, &values),
        ))]));
    }
    Arc::new(table)
}

/// Builds a one-column dictionary-encoded string table.
pub fn dictionary_string_table(chunks: &[&[&str]]) -> Arc<Table> {
    let mut table = Table::new(
        vec![ColumnDefinition::new("s", DataType::String, false)],
        TableKind::Data,
    );
    for rows in chunks {
        let values: Vec<Value> = rows.iter().map(|v| Value::from(*v)).collect();
        table.add_chunk(Chunk::new(vec![Arc::new(Segment::Dictionary(
            DictionarySegment::from_values(DataType::String, &values),
        ))]));
    }
    Arc::new(table)
}

/// Builds a `(k, v)` Int64 data table from row pairs, one chunk per slice.
pub fn key_value_table(chunks: &[&[(i64, i64)]]) -> Arc<Table> {
    let mut table = Table::new(
        vec![
            ColumnDefinition::new("k", DataType::Int64, false),
            ColumnDefinition::new("v", DataType::Int64, false),
        ],
        TableKind::Data,
    );
    for rows in chunks {
        let keys: Vec<Value> = rows.iter().map(|(k, _)| Value::Int64(*k)).collect();
        let values: Vec<Value> = rows.iter().map(|(_, v)| Value::Int64(*v)).collect();
        table.add_chunk(Chunk::new(vec![
            Arc::new(Segment::Value(ValueSegment::from_values(
                DataType::Int64,
                &keys,
            ))),
            Arc::new(Segment::Value(ValueSegment::from_values(
                DataType::Int64,
                &values,
            ))),
        ]));
    }
    Arc::new(table)
}

/// Builds a one-column Int64 table whose single chunk carries the given
/// MVCC rows as `(value, begin_cid, end_cid, tid)`.
pub fn mvcc_int64_table(rows: &[(i64, u32, u32, u32)]) -> Arc<Table> {
    let mut table = Table::new(
        vec![ColumnDefinition::new("a", DataType::Int64, false)],
        TableKind::Data,
    );
    let values: Vec<Value> = rows.iter().map(|(v, ..)| Value::Int64(*v)).collect();
    let mut arrays = MvccArrays::new_committed(rows.len(), 0);
    for (index, (_, begin_cid, end_cid, tid)) in rows.iter().enumerate() {
        arrays.set_row(index, *begin_cid, *end_cid, *tid);
    }
    table.add_chunk(Chunk::with_mvcc(
        vec![Arc::new(Segment::Value(ValueSegment::from_values(
            DataType::Int64,
            &values,
        )))],
        arrays,
    ));
    Arc::new(table)
}

/// Wraps rows of a data table into a single-chunk reference table.
pub fn reference_table(data: &Arc<Table>, positions: &[(u32, u32)]) -> Arc<Table> {
    let pos_list: Arc<PosList> = Arc::new(
        positions
            .iter()
            .map(|(chunk_id, offset)| RowId::new(*chunk_id, *offset))
            .collect(),
    );
    let mut table = Table::new(data.column_definitions().to_vec(), TableKind::References);
    let segments = (0..data.column_count())
        .map(|column_id| {
            Arc::new(Segment::Reference(ReferenceSegment::new(
                Arc::clone(data),
                column_id,
                Arc::clone(&pos_list),
            )))
        })
        .collect();
    table.add_chunk(Chunk::new(segments));
    Arc::new(table)
}

/// Translates with default configuration, expecting a chain.
pub fn translate(root: &Arc<PlanNode>) -> OperatorChain {
    Translator::default()
        .translate(root)
        .expect("translation succeeds")
        .expect("sub-plan is fusable")
}

/// Executes without parameters or a snapshot.
pub fn execute(chain: &OperatorChain, table: &Arc<Table>) -> Table {
    chain
        .execute(table, &HashMap::new(), None)
        .expect("execution succeeds")
}

/// One column of a result table as owned scalars.
pub fn column(table: &Table, column_id: usize) -> Vec<Value> {
    table.materialize_column(column_id)
}

/// One column of a result table as non-null Int64 values.
pub fn int_column(table: &Table, column_id: usize) -> Vec<i64> {
    table
        .materialize_column(column_id)
        .into_iter()
        .map(|value| match value {
            Value::Int64(v) => v,
            other => panic!("expected an Int64, got {other}"),
        })
        .collect()
}
