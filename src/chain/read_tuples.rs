use crate::chain::operators::{ChainOperator, consume};
use crate::error::{ExecutionError, ExecutionResult};
use crate::plan::{PlanExpression, evaluate_constant};
use crate::runtime::context::RuntimeContext;
use crate::runtime::expression::{Expression, ExpressionKind};
use crate::runtime::reader::{EncodingFingerprint, bind_reader};
use crate::runtime::tuple::TupleSlot;
use crate::storage::segment::Segment;
use crate::storage::table::Table;
use crate::types::{
    ChunkId, ColumnId, DataType, INVALID_VALUE_ID, ParameterId, Value, ValueId,
};
use hashbrown::HashMap;
use std::fmt;

#[derive(Debug, Clone)]
pub struct InputColumn {
    pub column_id: ColumnId,
    /// The column's stored type; differs from `slot.data_type` when the
    /// column is read in value-id mode.
    pub data_type: DataType,
    pub slot: TupleSlot,
    pub use_value_id: bool,
}

#[derive(Debug, Clone)]
pub struct InputLiteral {
    pub value: Value,
    pub slot: TupleSlot,
    pub use_value_id: bool,
}

#[derive(Debug, Clone)]
pub struct InputParameter {
    pub parameter_id: ParameterId,
    pub slot: TupleSlot,
    pub use_value_id: bool,
}

/// A comparison registered for per-chunk value-id precomputation. `kind` is
/// the comparison as declared; the expression node itself may have been
/// rewritten to the bound-adjusted operator.
#[derive(Debug, Clone)]
pub struct ValueIdPredicate {
    pub input_column_index: usize,
    pub kind: ExpressionKind,
    pub input_literal_index: Option<usize>,
    pub input_parameter_index: Option<usize>,
}

/// The head of every chain. Owns the slot registries, installs literals and
/// parameters, binds segment readers at each chunk boundary, precomputes
/// value-ids, and runs the row loop.
#[derive(Debug, Clone)]
pub struct ReadTuples {
    slot_count: usize,
    input_columns: Vec<InputColumn>,
    input_literals: Vec<InputLiteral>,
    input_parameters: Vec<InputParameter>,
    value_id_predicates: Vec<ValueIdPredicate>,
    has_validate: bool,
    row_count_expression: Option<PlanExpression>,
}

impl ReadTuples {
    pub fn new(has_validate: bool, row_count_expression: Option<PlanExpression>) -> Self {
        ReadTuples {
            slot_count: 0,
            input_columns: Vec::new(),
            input_literals: Vec::new(),
            input_parameters: Vec::new(),
            value_id_predicates: Vec::new(),
            has_validate,
            row_count_expression,
        }
    }

    pub fn has_validate(&self) -> bool {
        self.has_validate
    }

    pub fn slot_count(&self) -> usize {
        self.slot_count
    }

    pub fn input_columns(&self) -> &[InputColumn] {
        &self.input_columns
    }

    pub fn input_literals(&self) -> &[InputLiteral] {
        &self.input_literals
    }

    pub fn input_parameters(&self) -> &[InputParameter] {
        &self.input_parameters
    }

    pub fn value_id_predicates(&self) -> &[ValueIdPredicate] {
        &self.value_id_predicates
    }

    /// Declares a column read, returning its slot. Asking for the same
    /// column in the same mode twice reuses the first slot.
    pub fn add_input_column(
        &mut self,
        data_type: DataType,
        nullable: bool,
        column_id: ColumnId,
        use_value_id: bool,
    ) -> TupleSlot {
        if let Some(existing) = self
            .input_columns
            .iter()
            .find(|column| column.column_id == column_id && column.use_value_id == use_value_id)
        {
            return existing.slot;
        }
        let slot_type = if use_value_id {
            DataType::ValueId
        } else {
            data_type
        };
        let slot = TupleSlot::new(slot_type, nullable, self.allocate_slot());
        self.input_columns.push(InputColumn {
            column_id,
            data_type,
            slot,
            use_value_id,
        });
        slot
    }

    /// Declares a literal, returning the slot it will be installed into.
    /// Deduplicated by value within the same read mode.
    pub fn add_literal(&mut self, value: &Value, use_value_id: bool) -> TupleSlot {
        if let Some(existing) = self
            .input_literals
            .iter()
            .find(|literal| literal.value == *value && literal.use_value_id == use_value_id)
        {
            return existing.slot;
        }
        let slot_type = if use_value_id {
            DataType::ValueId
        } else {
            value.data_type()
        };
        let slot = TupleSlot::new(slot_type, value.is_null(), self.allocate_slot());
        self.input_literals.push(InputLiteral {
            value: value.clone(),
            slot,
            use_value_id,
        });
        slot
    }

    /// Declares an externally supplied parameter, deduplicated by id within
    /// the same read mode.
    pub fn add_parameter(
        &mut self,
        data_type: DataType,
        nullable: bool,
        parameter_id: ParameterId,
        use_value_id: bool,
    ) -> TupleSlot {
        if let Some(existing) = self.input_parameters.iter().find(|parameter| {
            parameter.parameter_id == parameter_id && parameter.use_value_id == use_value_id
        }) {
            return existing.slot;
        }
        let slot_type = if use_value_id {
            DataType::ValueId
        } else {
            data_type
        };
        let slot = TupleSlot::new(slot_type, nullable, self.allocate_slot());
        self.input_parameters.push(InputParameter {
            parameter_id,
            slot,
            use_value_id,
        });
        slot
    }

    /// Reserves an anonymous slot for an expression's intermediate result.
    pub fn add_temporary_slot(&mut self) -> usize {
        self.allocate_slot()
    }

    fn allocate_slot(&mut self) -> usize {
        let index = self.slot_count;
        self.slot_count += 1;
        index
    }

    /// Registers a column-vs-literal comparison for value-id precomputation.
    /// Expects the column operand on the left. Upper-bound comparisons are
    /// rewritten in place: `x <= k` becomes `x < upper_bound(k)` and `x > k`
    /// becomes `x >= upper_bound(k)`.
    pub fn register_value_id_predicate(&mut self, expression: &mut Expression) {
        debug_assert!(expression.kind().is_comparison());
        let left_slot = expression
            .left_child()
            .expect("comparison is binary")
            .result();
        let right_slot = expression
            .right_child()
            .expect("comparison is binary")
            .result();

        let input_column_index = self
            .input_columns
            .iter()
            .rposition(|column| column.use_value_id && column.slot == left_slot)
            .expect("value-id predicate without a value-id column operand");
        let input_literal_index = self
            .input_literals
            .iter()
            .rposition(|literal| literal.use_value_id && literal.slot == right_slot);
        let input_parameter_index = if input_literal_index.is_none() {
            self.input_parameters
                .iter()
                .rposition(|parameter| parameter.use_value_id && parameter.slot == right_slot)
        } else {
            None
        };
        debug_assert!(
            input_literal_index.is_some() || input_parameter_index.is_some(),
            "value-id predicate without a literal or parameter operand"
        );

        let kind = expression.kind();
        match kind {
            ExpressionKind::GreaterThan => expression.set_kind(ExpressionKind::GreaterThanEquals),
            ExpressionKind::LessThanEquals => expression.set_kind(ExpressionKind::LessThan),
            _ => {}
        }
        self.value_id_predicates.push(ValueIdPredicate {
            input_column_index,
            kind,
            input_literal_index,
            input_parameter_index,
        });
    }

    pub fn find_input_column(&self, slot: TupleSlot) -> Option<ColumnId> {
        self.input_columns
            .iter()
            .find(|column| column.slot == slot)
            .map(|column| column.column_id)
    }

    pub fn find_literal_value(&self, slot: TupleSlot) -> Option<&Value> {
        self.input_literals
            .iter()
            .find(|literal| literal.slot.index == slot.index)
            .map(|literal| &literal.value)
    }

    /// Query preamble: size the tuple, resolve the row limit, install
    /// literals and parameters. Value-id slots are installed per chunk
    /// instead, once the chunk's dictionary is known.
    pub fn before_query(
        &self,
        parameter_values: &[Value],
        parameters: &HashMap<ParameterId, Value>,
        context: &mut RuntimeContext,
    ) -> ExecutionResult<()> {
        context.tuple.resize(self.slot_count);

        context.limit_rows = match &self.row_count_expression {
            Some(expression) => {
                let value = evaluate_constant(expression, parameters)?;
                let rows = value.as_i64().ok_or_else(|| {
                    ExecutionError::InvalidValue(format!(
                        "limit must evaluate to a non-null integer, got {value}"
                    ))
                })?;
                if rows < 0 {
                    return Err(ExecutionError::InvalidValue(format!(
                        "cannot limit to {rows} rows"
                    )));
                }
                rows as usize
            }
            None => usize::MAX,
        };

        for literal in &self.input_literals {
            if !literal.use_value_id {
                context.tuple.set_value(&literal.slot, &literal.value);
            }
        }

        debug_assert_eq!(
            parameter_values.len(),
            self.input_parameters.len(),
            "one value per declared parameter"
        );
        for (parameter, value) in self.input_parameters.iter().zip(parameter_values) {
            if parameter.use_value_id {
                continue;
            }
            let coerced = value.cast_to(parameter.slot.data_type).ok_or_else(|| {
                ExecutionError::InvalidValue(format!(
                    "parameter #{} expects {}, got {value}",
                    parameter.parameter_id, parameter.slot.data_type
                ))
            })?;
            context.tuple.set_value(&parameter.slot, &coerced);
        }
        Ok(())
    }

    /// Chunk preamble: bind readers, snapshot MVCC state, install value-ids.
    /// Returns whether the chunk's encodings match the ones the readers were
    /// first bound against (the same-type fast path).
    pub fn before_chunk(
        &self,
        in_table: &Table,
        chunk_id: ChunkId,
        parameter_values: &[Value],
        context: &mut RuntimeContext,
    ) -> ExecutionResult<bool> {
        let chunk = in_table.get_chunk(chunk_id);
        context.chunk_id = chunk_id;
        context.chunk_offset = 0;
        context.chunk_size = chunk.size();
        context.mvcc_guard = None;
        context.pos_list = None;
        context.referenced_table = None;

        if chunk.is_reference() {
            debug_assert!(
                chunk.references_exactly_one_table(),
                "chunk references more than one table"
            );
            context.pos_list = chunk.position_list();
            context.referenced_table = chunk.referenced_table();
        } else if self.has_validate {
            let arrays = chunk.mvcc_arrays().ok_or_else(|| {
                ExecutionError::InvalidValue(
                    "cannot validate a chunk without MVCC data".to_string(),
                )
            })?;
            // Lock the MVCC arrays before touching them; released when the
            // next chunk replaces the guard.
            context.mvcc_guard = Some(arrays.read_arc());
        }

        context.readers.clear();
        for input_column in &self.input_columns {
            let segment = chunk.get_segment(input_column.column_id);
            let reader = bind_reader(
                segment,
                in_table.column_is_nullable(input_column.column_id),
                input_column.use_value_id,
                input_column.slot,
            )?;
            context.readers.push(reader);
        }

        for predicate in &self.value_id_predicates {
            let input_column = &self.input_columns[predicate.input_column_index];
            let Segment::Dictionary(dictionary) =
                &**chunk.get_segment(input_column.column_id)
            else {
                return Err(ExecutionError::InvalidValue(format!(
                    "value-id predicate on column #{} requires dictionary encoding",
                    input_column.column_id
                )));
            };
            if dictionary.dictionary_size() >= INVALID_VALUE_ID as usize {
                return Err(ExecutionError::InvalidValue(
                    "dictionary exhausts the value-id range".to_string(),
                ));
            }

            let (value, slot) = match (predicate.input_literal_index, predicate.input_parameter_index)
            {
                (Some(index), _) => {
                    let literal = &self.input_literals[index];
                    (literal.value.clone(), literal.slot)
                }
                (None, Some(index)) => {
                    (parameter_values[index].clone(), self.input_parameters[index].slot)
                }
                (None, None) => unreachable!("predicate without a comparison value"),
            };
            let probe = value.cast_to(input_column.data_type).ok_or_else(|| {
                ExecutionError::InvalidValue(format!(
                    "cannot probe a {} dictionary with {value}",
                    input_column.data_type
                ))
            })?;

            let value_id = match predicate.kind {
                ExpressionKind::Equals | ExpressionKind::NotEquals => {
                    let lower = dictionary.lower_bound(&probe);
                    if lower == dictionary.upper_bound(&probe) {
                        // Absent from this chunk's dictionary: the sentinel
                        // makes `=` always false and `<>` true for non-nulls.
                        INVALID_VALUE_ID
                    } else {
                        lower
                    }
                }
                ExpressionKind::LessThan | ExpressionKind::GreaterThanEquals => {
                    dictionary.lower_bound(&probe)
                }
                ExpressionKind::LessThanEquals | ExpressionKind::GreaterThan => {
                    dictionary.upper_bound(&probe)
                }
                other => panic!("{other} cannot be precomputed from a dictionary"),
            };
            context.tuple.set::<ValueId>(slot.index, value_id);
            context.tuple.set_null(slot.index, false);
        }

        let fingerprints: Vec<EncodingFingerprint> = context
            .readers
            .iter()
            .map(|reader| reader.fingerprint())
            .collect();
        let same_type = if context.reader_fingerprints.is_empty() {
            context.reader_fingerprints = fingerprints;
            true
        } else {
            context.reader_fingerprints == fingerprints
        };
        Ok(same_type)
    }

    /// The fused row loop. The offset advances after the chain has seen the
    /// row, so lazy loads inside the chain still observe the current row.
    pub fn execute(&self, operators: &[ChainOperator], context: &mut RuntimeContext) {
        while context.chunk_offset < context.chunk_size {
            if context.limit_rows == 0 {
                break;
            }
            consume(operators, context);
            context.chunk_offset += 1;
        }
    }
}

impl fmt::Display for ReadTuples {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[ReadTuples]")?;
        for column in &self.input_columns {
            let mode = if column.use_value_id { "(V) " } else { "" };
            write!(
                f,
                " ({}{} {} = Column#{}),",
                mode, column.data_type, column.slot, column.column_id
            )?;
        }
        for literal in &self.input_literals {
            let mode = if literal.use_value_id { "(V) " } else { "" };
            write!(f, " ({}{} = {}),", mode, literal.slot, literal.value)?;
        }
        for parameter in &self.input_parameters {
            let mode = if parameter.use_value_id { "(V) " } else { "" };
            write!(
                f,
                " ({}{} = Par#{}),",
                mode, parameter.slot, parameter.parameter_id
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_input_column_deduplication_is_per_mode() {
        let mut read_tuples = ReadTuples::new(false, None);
        let decoded = read_tuples.add_input_column(DataType::String, false, 0, false);
        let decoded_again = read_tuples.add_input_column(DataType::String, false, 0, false);
        let value_id = read_tuples.add_input_column(DataType::String, false, 0, true);

        assert_eq!(decoded, decoded_again);
        assert_ne!(decoded, value_id);
        assert_eq!(read_tuples.input_columns().len(), 2);
        assert_eq!(value_id.data_type, DataType::ValueId);
    }

    #[test]
    fn test_literal_deduplication_by_value() {
        let mut read_tuples = ReadTuples::new(false, None);
        let five = read_tuples.add_literal(&Value::Int64(5), false);
        let five_again = read_tuples.add_literal(&Value::Int64(5), false);
        let six = read_tuples.add_literal(&Value::Int64(6), false);
        assert_eq!(five, five_again);
        assert_ne!(five, six);
        assert_eq!(read_tuples.slot_count(), 2);
    }

    #[test]
    fn test_temporary_slots_are_never_shared() {
        let mut read_tuples = ReadTuples::new(false, None);
        assert_ne!(read_tuples.add_temporary_slot(), read_tuples.add_temporary_slot());
    }

    #[test]
    fn test_upper_bound_predicates_are_rewritten() {
        let mut read_tuples = ReadTuples::new(false, None);
        let column = read_tuples.add_input_column(DataType::Int32, false, 0, true);
        let literal = read_tuples.add_literal(&Value::Int32(10), true);
        let mut expression = Expression::binary(
            Expression::column(column),
            ExpressionKind::LessThanEquals,
            Expression::column(literal),
            read_tuples.add_temporary_slot(),
        )
        .unwrap();

        read_tuples.register_value_id_predicate(&mut expression);
        // The node now compares against the exclusive upper bound.
        assert_eq!(expression.kind(), ExpressionKind::LessThan);
        assert_eq!(
            read_tuples.value_id_predicates()[0].kind,
            ExpressionKind::LessThanEquals
        );
    }
}
