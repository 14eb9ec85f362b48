use crate::chain::aggregate::AggregateOperator;
use crate::chain::write::{WriteOffsets, WriteTuples};
use crate::runtime::context::RuntimeContext;
use crate::runtime::expression::Expression;
use crate::runtime::tuple::TupleSlot;
use crate::storage::mvcc::is_row_visible;
use crate::storage::table::TableKind;
use std::fmt;

/// Materialises one input column into its tuple slot. Threaded into the
/// chain by the lazy-load placement pass.
#[derive(Debug, Clone)]
pub struct ReadValue {
    pub reader_index: usize,
    pub slot: TupleSlot,
}

/// Drops rows invisible under the query snapshot.
#[derive(Debug, Clone)]
pub struct Validate {
    pub table_kind: TableKind,
}

impl Validate {
    fn row_is_visible(&self, context: &RuntimeContext) -> bool {
        let snapshot = context.snapshot.expect("validation requires a snapshot");
        match self.table_kind {
            TableKind::Data => {
                let arrays = context
                    .mvcc_guard
                    .as_deref()
                    .expect("MVCC arrays are locked in the chunk preamble");
                let row = context.chunk_offset as usize;
                is_row_visible(
                    snapshot,
                    arrays.begin_cids[row],
                    arrays.end_cids[row],
                    arrays.tids[row],
                )
            }
            TableKind::References => {
                let pos_list = context
                    .pos_list
                    .as_ref()
                    .expect("reference chunk without a position list");
                let row_id = pos_list[context.chunk_offset as usize];
                let table = context
                    .referenced_table
                    .as_ref()
                    .expect("reference chunk without a referenced table");
                let chunk = table.get_chunk(row_id.chunk_id);
                let arrays = chunk
                    .mvcc_arrays()
                    .expect("referenced chunk without MVCC data")
                    .read();
                let row = row_id.chunk_offset as usize;
                is_row_visible(
                    snapshot,
                    arrays.begin_cids[row],
                    arrays.end_cids[row],
                    arrays.tids[row],
                )
            }
        }
    }
}

/// Evaluates an expression tree into its result slot.
#[derive(Debug, Clone)]
pub struct Compute {
    pub expression: Expression,
}

/// Forwards a row only when the boolean at `slot` is true and not null.
#[derive(Debug, Clone)]
pub struct Filter {
    pub slot: TupleSlot,
    pub load_reader: Option<usize>,
}

/// The fused operators a chain is assembled from. A small closed set, so a
/// tagged variant beats open dispatch here.
#[derive(Debug, Clone)]
pub enum ChainOperator {
    ReadValue(ReadValue),
    Validate(Validate),
    Compute(Compute),
    Filter(Filter),
    Limit,
    Aggregate(AggregateOperator),
    WriteTuples(WriteTuples),
    WriteOffsets(WriteOffsets),
}

impl ChainOperator {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ChainOperator::Aggregate(_)
                | ChainOperator::WriteTuples(_)
                | ChainOperator::WriteOffsets(_)
        )
    }

    /// Distinct input-tuple slots this operator reads, used by the lazy-load
    /// placement pass. Producers (ReadValue) and slot-free operators report
    /// nothing.
    pub(crate) fn accessed_slots(&self) -> Vec<usize> {
        match self {
            ChainOperator::Compute(compute) => {
                let mut slots = Vec::new();
                compute.expression.collect_column_slots(&mut slots);
                slots
            }
            ChainOperator::Filter(filter) => vec![filter.slot.index],
            ChainOperator::Aggregate(aggregate) => {
                let mut slots = Vec::new();
                for column in &aggregate.group_by {
                    if !slots.contains(&column.slot.index) {
                        slots.push(column.slot.index);
                    }
                }
                for column in &aggregate.aggregates {
                    if let Some(slot) = column.slot
                        && !slots.contains(&slot.index)
                    {
                        slots.push(slot.index);
                    }
                }
                slots
            }
            ChainOperator::WriteTuples(write) => {
                let mut slots = Vec::new();
                for column in &write.output_columns {
                    if !slots.contains(&column.slot.index) {
                        slots.push(column.slot.index);
                    }
                }
                slots
            }
            _ => Vec::new(),
        }
    }
}

impl fmt::Display for ChainOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChainOperator::ReadValue(read_value) => {
                write!(f, "[ReadValue] {}", read_value.slot)
            }
            ChainOperator::Validate(_) => write!(f, "[Validate]"),
            ChainOperator::Compute(compute) => {
                write!(f, "[Compute] {} = {}", compute.expression.result(), compute.expression)
            }
            ChainOperator::Filter(filter) => write!(f, "[Filter] {}", filter.slot),
            ChainOperator::Limit => write!(f, "[Limit]"),
            ChainOperator::Aggregate(aggregate) => write!(f, "{aggregate}"),
            ChainOperator::WriteTuples(write) => write!(f, "{write}"),
            ChainOperator::WriteOffsets(write) => write!(f, "{write}"),
        }
    }
}

/// Drives one row through the chain. Each operator either mutates the tuple,
/// short-circuits the row, or hands it to its successor; recursing over the
/// operator slice is the successor pointer.
pub(crate) fn consume(operators: &[ChainOperator], context: &mut RuntimeContext) {
    let Some((operator, successors)) = operators.split_first() else {
        return;
    };
    match operator {
        ChainOperator::ReadValue(read_value) => {
            context.readers[read_value.reader_index]
                .read_into(context.chunk_offset, &mut context.tuple);
            consume(successors, context);
        }
        ChainOperator::Validate(validate) => {
            if validate.row_is_visible(context) {
                consume(successors, context);
            }
        }
        ChainOperator::Compute(compute) => {
            compute.expression.evaluate(context);
            consume(successors, context);
        }
        ChainOperator::Filter(filter) => {
            if let Some(reader_index) = filter.load_reader {
                context.readers[reader_index]
                    .read_into(context.chunk_offset, &mut context.tuple);
            }
            if !context.tuple.is_null(filter.slot.index)
                && context.tuple.get::<bool>(filter.slot.index)
            {
                consume(successors, context);
            }
        }
        ChainOperator::Limit => {
            if context.limit_rows > 0 {
                context.limit_rows -= 1;
                consume(successors, context);
            }
        }
        ChainOperator::Aggregate(aggregate) => aggregate.consume_row(context),
        ChainOperator::WriteTuples(write) => write.consume_row(context),
        ChainOperator::WriteOffsets(write) => write.consume_row(context),
    }
}
