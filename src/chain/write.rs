use crate::runtime::context::RuntimeContext;
use crate::runtime::tuple::TupleSlot;
use crate::storage::chunk::Chunk;
use crate::storage::segment::{ReferenceSegment, Segment, ValueSegment};
use crate::storage::table::{ColumnDefinition, Table, TableKind};
use crate::types::{ColumnId, DataType, RowId, Value};
use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct OutputColumn {
    pub name: String,
    pub slot: TupleSlot,
}

/// Terminal operator materialising one output row per consumed tuple.
#[derive(Debug, Clone)]
pub struct WriteTuples {
    pub output_columns: Vec<OutputColumn>,
}

impl WriteTuples {
    pub(crate) fn before_query(&self, max_chunk_size: usize, context: &mut RuntimeContext) {
        context.output.max_chunk_size = max_chunk_size;
        context.output.chunks.clear();
        context.output.builders = self
            .output_columns
            .iter()
            .map(|column| ColumnBuilder {
                definition: ColumnDefinition::new(
                    column.name.clone(),
                    column.slot.data_type,
                    column.slot.nullable,
                ),
                values: Vec::new(),
            })
            .collect();
    }

    pub(crate) fn consume_row(&self, context: &mut RuntimeContext) {
        for (builder_index, column) in self.output_columns.iter().enumerate() {
            let value = context.tuple.value(&column.slot);
            context.output.builders[builder_index].values.push(value);
        }
        if context.output.builders[0].values.len() >= context.output.max_chunk_size {
            flush_builders(&mut context.output);
        }
    }

    pub(crate) fn after_query(&self, context: &mut RuntimeContext) -> Table {
        flush_builders(&mut context.output);
        let state = std::mem::take(&mut context.output);
        let definitions = state
            .builders
            .iter()
            .map(|builder| builder.definition.clone())
            .collect();
        let mut table = Table::new(definitions, TableKind::Data);
        for chunk in state.chunks {
            table.add_chunk(chunk);
        }
        table
    }
}

impl fmt::Display for WriteTuples {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[WriteTuples]")?;
        for column in &self.output_columns {
            write!(f, " {} = {},", column.name, column.slot)?;
        }
        Ok(())
    }
}

fn flush_builders(output: &mut OutputState) {
    if output.builders.is_empty() || output.builders[0].values.is_empty() {
        return;
    }
    let segments: Vec<Arc<Segment>> = output
        .builders
        .iter_mut()
        .map(|builder| {
            let values = std::mem::take(&mut builder.values);
            Arc::new(Segment::Value(ValueSegment::from_values(
                builder.definition.data_type,
                &values,
            )))
        })
        .collect();
    output.chunks.push(Chunk::new(segments));
}

#[derive(Debug, Clone)]
pub struct ColumnBuilder {
    pub definition: ColumnDefinition,
    pub values: Vec<Value>,
}

/// Output under construction, owned by the context.
#[derive(Debug, Clone, Default)]
pub struct OutputState {
    pub builders: Vec<ColumnBuilder>,
    pub chunks: Vec<Chunk>,
    pub max_chunk_size: usize,
}

/// One output column of a reference table.
#[derive(Debug, Clone)]
pub struct ReferenceOutputColumn {
    pub name: String,
    pub data_type: DataType,
    pub nullable: bool,
    pub referenced_column: ColumnId,
}

/// Terminal operator for reference output: rows are recorded as positions
/// into the data table instead of being copied.
#[derive(Debug, Clone)]
pub struct WriteOffsets {
    pub output_columns: Vec<ReferenceOutputColumn>,
}

impl WriteOffsets {
    pub(crate) fn consume_row(&self, context: &mut RuntimeContext) {
        // A reference chunk flattens through its own position list, so the
        // emitted positions always land in a data table.
        let row_id = match &context.pos_list {
            Some(pos_list) => pos_list[context.chunk_offset as usize],
            None => RowId::new(context.chunk_id, context.chunk_offset),
        };
        context.output_pos_list.push(row_id);
    }

    pub(crate) fn after_query(&self, context: &mut RuntimeContext, in_table: &Arc<Table>) -> Table {
        // A reference input was flattened row by row, so the output points at
        // the underlying data table, with column ordinals resolved through
        // the input's own reference segments.
        let referenced_table = if in_table.chunk_count() > 0
            && let Some(referenced) = in_table.get_chunk(0).referenced_table()
        {
            referenced
        } else {
            Arc::clone(in_table)
        };
        let resolve_column = |column_id: ColumnId| -> ColumnId {
            if in_table.chunk_count() > 0
                && let Segment::Reference(reference) =
                    &**in_table.get_chunk(0).get_segment(column_id)
            {
                reference.referenced_column
            } else {
                column_id
            }
        };

        let pos_list = Arc::new(std::mem::take(&mut context.output_pos_list));
        let definitions = self
            .output_columns
            .iter()
            .map(|column| {
                ColumnDefinition::new(column.name.clone(), column.data_type, column.nullable)
            })
            .collect();
        let mut table = Table::new(definitions, TableKind::References);
        let segments = self
            .output_columns
            .iter()
            .map(|column| {
                Arc::new(Segment::Reference(ReferenceSegment::new(
                    Arc::clone(&referenced_table),
                    resolve_column(column.referenced_column),
                    Arc::clone(&pos_list),
                )))
            })
            .collect();
        table.add_chunk(Chunk::new(segments));
        table
    }
}

impl fmt::Display for WriteOffsets {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[WriteOffsets]")?;
        for column in &self.output_columns {
            write!(f, " {} = Column#{},", column.name, column.referenced_column)?;
        }
        Ok(())
    }
}
