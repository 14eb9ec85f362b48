use crate::runtime::context::RuntimeContext;
use crate::runtime::tuple::TupleSlot;
use crate::storage::chunk::Chunk;
use crate::storage::segment::{Segment, ValueSegment};
use crate::storage::table::{ColumnDefinition, Table, TableKind};
use crate::types::{DataType, Value};
use hashbrown::HashMap;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AggregateFunction {
    Count,
    Sum,
    Min,
    Max,
    Avg,
}

impl fmt::Display for AggregateFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AggregateFunction::Count => write!(f, "COUNT"),
            AggregateFunction::Sum => write!(f, "SUM"),
            AggregateFunction::Min => write!(f, "MIN"),
            AggregateFunction::Max => write!(f, "MAX"),
            AggregateFunction::Avg => write!(f, "AVG"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct GroupByColumn {
    pub name: String,
    pub slot: TupleSlot,
}

/// One aggregate output column. `slot` is absent for `COUNT(*)`, which
/// counts rows unconditionally instead of reading anything.
#[derive(Debug, Clone)]
pub struct AggregateColumn {
    pub name: String,
    pub function: AggregateFunction,
    pub slot: Option<TupleSlot>,
}

impl AggregateColumn {
    pub fn output_definition(&self) -> ColumnDefinition {
        let (data_type, nullable) = match (self.function, self.slot) {
            (AggregateFunction::Count, _) => (DataType::Int64, false),
            (AggregateFunction::Sum, Some(slot)) if slot.data_type.is_integer() => {
                (DataType::Int64, true)
            }
            (AggregateFunction::Sum, _) => (DataType::Double, true),
            (AggregateFunction::Avg, _) => (DataType::Double, true),
            (AggregateFunction::Min | AggregateFunction::Max, Some(slot)) => {
                (slot.data_type, true)
            }
            (function, None) => panic!("{function} needs an argument"),
        };
        ColumnDefinition::new(self.name.clone(), data_type, nullable)
    }
}

/// Terminal operator: groups rows by the concatenated group-by slots and
/// folds every aggregate column into a per-group accumulator.
#[derive(Debug, Clone)]
pub struct AggregateOperator {
    pub group_by: Vec<GroupByColumn>,
    pub aggregates: Vec<AggregateColumn>,
}

impl AggregateOperator {
    pub(crate) fn consume_row(&self, context: &mut RuntimeContext) {
        let key = GroupKey(
            self.group_by
                .iter()
                .map(|column| context.tuple.value(&column.slot))
                .collect(),
        );
        let group_index = match context.aggregate.index.get(&key) {
            Some(index) => *index,
            None => {
                let index = context.aggregate.groups.len();
                context.aggregate.groups.push(Group {
                    key: key.0.clone(),
                    accumulators: self.aggregates.iter().map(Accumulator::init).collect(),
                });
                context.aggregate.index.insert(key, index);
                index
            }
        };

        let group = &mut context.aggregate.groups[group_index];
        for (accumulator, column) in group.accumulators.iter_mut().zip(&self.aggregates) {
            let value = column.slot.as_ref().map(|slot| context.tuple.value(slot));
            accumulator.update(value.as_ref());
        }
    }

    /// Materialises the group table. Groups come out in first-seen order,
    /// which keeps repeated executions bit-identical.
    pub(crate) fn emit(&self, context: &mut RuntimeContext) -> Table {
        let mut state = std::mem::take(&mut context.aggregate);
        // A limit above the aggregation bounds the emitted groups, not the
        // rows consumed; nothing in an aggregating chain decrements the
        // counter while scanning.
        if state.groups.len() > context.limit_rows {
            state.groups.truncate(context.limit_rows);
        }

        let mut definitions: Vec<ColumnDefinition> = self
            .group_by
            .iter()
            .map(|column| {
                ColumnDefinition::new(column.name.clone(), column.slot.data_type, column.slot.nullable)
            })
            .collect();
        definitions.extend(self.aggregates.iter().map(AggregateColumn::output_definition));

        let mut table = Table::new(definitions.clone(), TableKind::Data);
        if state.groups.is_empty() {
            return table;
        }

        let mut segments: Vec<Arc<Segment>> = Vec::with_capacity(definitions.len());
        for key_index in 0..self.group_by.len() {
            let values: Vec<Value> = state
                .groups
                .iter()
                .map(|group| group.key[key_index].clone())
                .collect();
            segments.push(Arc::new(Segment::Value(ValueSegment::from_values(
                definitions[key_index].data_type,
                &values,
            ))));
        }
        for (aggregate_index, definition) in
            definitions.iter().enumerate().skip(self.group_by.len())
        {
            let values: Vec<Value> = state
                .groups
                .iter()
                .map(|group| group.accumulators[aggregate_index - self.group_by.len()].finalize())
                .collect();
            segments.push(Arc::new(Segment::Value(ValueSegment::from_values(
                definition.data_type,
                &values,
            ))));
        }
        table.add_chunk(Chunk::new(segments));
        table
    }
}

impl fmt::Display for AggregateOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[Aggregate]")?;
        for column in &self.group_by {
            write!(f, " group by {},", column.slot)?;
        }
        for column in &self.aggregates {
            match column.slot {
                Some(slot) => write!(f, " {}({}),", column.function, slot)?,
                None => write!(f, " {}(*),", column.function)?,
            }
        }
        Ok(())
    }
}

/// Group-by key with bit-level float semantics so hashing and equality agree
/// and nulls fall into one shared group.
#[derive(Debug, Clone)]
struct GroupKey(SmallVec<[Value; 4]>);

impl PartialEq for GroupKey {
    fn eq(&self, other: &Self) -> bool {
        self.0.len() == other.0.len()
            && self
                .0
                .iter()
                .zip(other.0.iter())
                .all(|(a, b)| key_value_eq(a, b))
    }
}

impl Eq for GroupKey {}

impl Hash for GroupKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        for value in &self.0 {
            std::mem::discriminant(value).hash(state);
            match value {
                Value::Null => {}
                Value::Int32(v) => v.hash(state),
                Value::Int64(v) => v.hash(state),
                Value::Float(v) => v.to_bits().hash(state),
                Value::Double(v) => v.to_bits().hash(state),
                Value::String(v) => v.hash(state),
                Value::Bool(v) => v.hash(state),
                Value::ValueId(v) => v.hash(state),
            }
        }
    }
}

fn key_value_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Float(x), Value::Float(y)) => x.to_bits() == y.to_bits(),
        (Value::Double(x), Value::Double(y)) => x.to_bits() == y.to_bits(),
        (a, b) => a == b,
    }
}

#[derive(Debug, Clone)]
pub struct Group {
    key: SmallVec<[Value; 4]>,
    accumulators: SmallVec<[Accumulator; 4]>,
}

/// Per-query aggregation scratch, owned by the context.
#[derive(Debug, Clone, Default)]
pub struct AggregateState {
    index: HashMap<GroupKey, usize>,
    groups: Vec<Group>,
}

impl AggregateState {
    pub fn group_count(&self) -> usize {
        self.groups.len()
    }
}

#[derive(Debug, Clone)]
enum Accumulator {
    Count(i64),
    SumInt(Option<i64>),
    SumDouble(Option<f64>),
    Min(Option<Value>),
    Max(Option<Value>),
    Avg { sum: f64, count: i64 },
}

impl Accumulator {
    fn init(column: &AggregateColumn) -> Accumulator {
        match column.function {
            AggregateFunction::Count => Accumulator::Count(0),
            AggregateFunction::Sum => {
                let slot = column.slot.expect("SUM needs an argument");
                if slot.data_type.is_integer() {
                    Accumulator::SumInt(None)
                } else {
                    Accumulator::SumDouble(None)
                }
            }
            AggregateFunction::Min => Accumulator::Min(None),
            AggregateFunction::Max => Accumulator::Max(None),
            AggregateFunction::Avg => Accumulator::Avg { sum: 0.0, count: 0 },
        }
    }

    /// Folds one row in. `None` marks a `COUNT(*)`; a null argument is
    /// skipped by every function except `COUNT(*)`.
    fn update(&mut self, value: Option<&Value>) {
        match self {
            Accumulator::Count(count) => match value {
                Some(Value::Null) => {}
                _ => *count += 1,
            },
            Accumulator::SumInt(sum) => {
                if let Some(value) = value
                    && let Some(addend) = value.as_i64()
                {
                    *sum = Some(sum.unwrap_or(0) + addend);
                }
            }
            Accumulator::SumDouble(sum) => {
                if let Some(value) = value
                    && let Some(addend) = value.as_f64()
                {
                    *sum = Some(sum.unwrap_or(0.0) + addend);
                }
            }
            Accumulator::Min(current) => fold_extreme(current, value, Ordering::Less),
            Accumulator::Max(current) => fold_extreme(current, value, Ordering::Greater),
            Accumulator::Avg { sum, count } => {
                if let Some(value) = value
                    && let Some(addend) = value.as_f64()
                {
                    *sum += addend;
                    *count += 1;
                }
            }
        }
    }

    fn finalize(&self) -> Value {
        match self {
            Accumulator::Count(count) => Value::Int64(*count),
            Accumulator::SumInt(sum) => sum.map(Value::Int64).unwrap_or(Value::Null),
            Accumulator::SumDouble(sum) => sum.map(Value::Double).unwrap_or(Value::Null),
            Accumulator::Min(value) | Accumulator::Max(value) => {
                value.clone().unwrap_or(Value::Null)
            }
            Accumulator::Avg { sum, count } => {
                if *count == 0 {
                    Value::Null
                } else {
                    Value::Double(sum / *count as f64)
                }
            }
        }
    }
}

fn fold_extreme(current: &mut Option<Value>, value: Option<&Value>, wanted: Ordering) {
    let Some(value) = value else { return };
    if value.is_null() {
        return;
    }
    match current {
        None => *current = Some(value.clone()),
        Some(best) => {
            if value.partial_cmp_same_type(best) == Some(wanted) {
                *current = Some(value.clone());
            }
        }
    }
}
