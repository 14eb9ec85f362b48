use crate::storage::table::Table;
use crate::types::{ColumnId, DataType, INVALID_VALUE_ID, RowId, Value, ValueId};
use arcstr::ArcStr;
use std::sync::Arc;

/// Typed column payload shared by value segments and dictionaries.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnData {
    Int32(Vec<i32>),
    Int64(Vec<i64>),
    Float(Vec<f32>),
    Double(Vec<f64>),
    String(Vec<ArcStr>),
    Bool(Vec<bool>),
}

impl ColumnData {
    pub fn len(&self) -> usize {
        match self {
            ColumnData::Int32(values) => values.len(),
            ColumnData::Int64(values) => values.len(),
            ColumnData::Float(values) => values.len(),
            ColumnData::Double(values) => values.len(),
            ColumnData::String(values) => values.len(),
            ColumnData::Bool(values) => values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn data_type(&self) -> DataType {
        match self {
            ColumnData::Int32(_) => DataType::Int32,
            ColumnData::Int64(_) => DataType::Int64,
            ColumnData::Float(_) => DataType::Float,
            ColumnData::Double(_) => DataType::Double,
            ColumnData::String(_) => DataType::String,
            ColumnData::Bool(_) => DataType::Bool,
        }
    }

    pub fn value_at(&self, index: usize) -> Value {
        match self {
            ColumnData::Int32(values) => Value::Int32(values[index]),
            ColumnData::Int64(values) => Value::Int64(values[index]),
            ColumnData::Float(values) => Value::Float(values[index]),
            ColumnData::Double(values) => Value::Double(values[index]),
            ColumnData::String(values) => Value::String(values[index].clone()),
            ColumnData::Bool(values) => Value::Bool(values[index]),
        }
    }

    /// Packs a row of scalars into a typed vector. Nulls are stored as the
    /// type's default; callers track null positions separately.
    pub fn from_values(data_type: DataType, values: &[Value]) -> ColumnData {
        match data_type {
            DataType::Int32 => ColumnData::Int32(
                values
                    .iter()
                    .map(|v| match v {
                        Value::Int32(v) => *v,
                        _ => 0,
                    })
                    .collect(),
            ),
            DataType::Int64 => ColumnData::Int64(
                values
                    .iter()
                    .map(|v| match v {
                        Value::Int64(v) => *v,
                        _ => 0,
                    })
                    .collect(),
            ),
            DataType::Float => ColumnData::Float(
                values
                    .iter()
                    .map(|v| match v {
                        Value::Float(v) => *v,
                        _ => 0.0,
                    })
                    .collect(),
            ),
            DataType::Double => ColumnData::Double(
                values
                    .iter()
                    .map(|v| match v {
                        Value::Double(v) => *v,
                        _ => 0.0,
                    })
                    .collect(),
            ),
            DataType::String => ColumnData::String(
                values
                    .iter()
                    .map(|v| match v {
                        Value::String(v) => v.clone(),
                        _ => ArcStr::new(),
                    })
                    .collect(),
            ),
            DataType::Bool => ColumnData::Bool(
                values
                    .iter()
                    .map(|v| match v {
                        Value::Bool(v) => *v,
                        _ => false,
                    })
                    .collect(),
            ),
            DataType::ValueId | DataType::Null => {
                panic!("{data_type} is not a storable column type")
            }
        }
    }
}

/// A plain typed array with an optional null map.
#[derive(Debug, Clone)]
pub struct ValueSegment {
    pub data: ColumnData,
    pub nulls: Option<Vec<bool>>,
}

impl ValueSegment {
    pub fn new(data: ColumnData) -> Self {
        ValueSegment { data, nulls: None }
    }

    pub fn new_nullable(data: ColumnData, nulls: Vec<bool>) -> Self {
        assert_eq!(data.len(), nulls.len(), "null map length mismatch");
        ValueSegment {
            data,
            nulls: Some(nulls),
        }
    }

    /// Builds a segment from scalars, deriving the null map from the nulls in
    /// the input.
    pub fn from_values(data_type: DataType, values: &[Value]) -> Self {
        let nulls: Vec<bool> = values.iter().map(Value::is_null).collect();
        let data = ColumnData::from_values(data_type, values);
        if nulls.iter().any(|null| *null) {
            ValueSegment::new_nullable(data, nulls)
        } else {
            ValueSegment::new(data)
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn is_null_at(&self, index: usize) -> bool {
        self.nulls.as_ref().is_some_and(|nulls| nulls[index])
    }
}

/// A sorted dictionary plus an attribute vector of value-ids.
///
/// Value-id order matches decoded-value order, which is what makes bound
/// probes (`lower_bound` / `upper_bound`) usable for comparisons.
#[derive(Debug, Clone)]
pub struct DictionarySegment {
    dictionary: ColumnData,
    attribute_vector: Vec<ValueId>,
}

impl DictionarySegment {
    pub fn new(dictionary: ColumnData, attribute_vector: Vec<ValueId>) -> Self {
        debug_assert!(
            attribute_vector
                .iter()
                .all(|id| *id == INVALID_VALUE_ID || (*id as usize) < dictionary.len()),
            "attribute vector entry outside the dictionary"
        );
        DictionarySegment {
            dictionary,
            attribute_vector,
        }
    }

    /// Dictionary-encodes a row of scalars. Nulls become `INVALID_VALUE_ID`.
    pub fn from_values(data_type: DataType, values: &[Value]) -> Self {
        let mut distinct: Vec<Value> = values
            .iter()
            .filter(|value| !value.is_null())
            .cloned()
            .collect();
        distinct.sort_by(|a, b| {
            a.partial_cmp_same_type(b)
                .expect("dictionary input must be comparable")
        });
        distinct.dedup();

        let attribute_vector = values
            .iter()
            .map(|value| {
                if value.is_null() {
                    INVALID_VALUE_ID
                } else {
                    distinct
                        .iter()
                        .position(|candidate| candidate == value)
                        .expect("distinct set covers every input") as ValueId
                }
            })
            .collect();
        DictionarySegment::new(ColumnData::from_values(data_type, &distinct), attribute_vector)
    }

    pub fn len(&self) -> usize {
        self.attribute_vector.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attribute_vector.is_empty()
    }

    pub fn data_type(&self) -> DataType {
        self.dictionary.data_type()
    }

    pub fn dictionary_size(&self) -> usize {
        self.dictionary.len()
    }

    pub fn dictionary_data(&self) -> &ColumnData {
        &self.dictionary
    }

    pub fn value_id_at(&self, index: usize) -> ValueId {
        self.attribute_vector[index]
    }

    pub fn decode(&self, value_id: ValueId) -> Value {
        self.dictionary.value_at(value_id as usize)
    }

    /// First value-id whose decoded value is not less than `value`.
    pub fn lower_bound(&self, value: &Value) -> ValueId {
        self.partition(value, |ordering| ordering == std::cmp::Ordering::Less)
    }

    /// First value-id whose decoded value is greater than `value`.
    pub fn upper_bound(&self, value: &Value) -> ValueId {
        self.partition(value, |ordering| ordering != std::cmp::Ordering::Greater)
    }

    fn partition(
        &self,
        value: &Value,
        keep: impl Fn(std::cmp::Ordering) -> bool,
    ) -> ValueId {
        let size = self.dictionary.len();
        let mut low = 0usize;
        let mut high = size;
        while low < high {
            let mid = (low + high) / 2;
            let entry = self.dictionary.value_at(mid);
            let stays_left = entry
                .partial_cmp_same_type(value)
                .is_some_and(&keep);
            if stays_left {
                low = mid + 1;
            } else {
                high = mid;
            }
        }
        low as ValueId
    }
}

/// Borrowed view into another table, one `(chunk, offset)` entry per row.
pub type PosList = Vec<RowId>;

#[derive(Debug, Clone)]
pub struct ReferenceSegment {
    pub referenced_table: Arc<Table>,
    pub referenced_column: ColumnId,
    pub pos_list: Arc<PosList>,
}

impl ReferenceSegment {
    pub fn new(
        referenced_table: Arc<Table>,
        referenced_column: ColumnId,
        pos_list: Arc<PosList>,
    ) -> Self {
        ReferenceSegment {
            referenced_table,
            referenced_column,
            pos_list,
        }
    }

    pub fn len(&self) -> usize {
        self.pos_list.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pos_list.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SegmentEncoding {
    Value,
    Dictionary,
    Reference,
}

#[derive(Debug, Clone)]
pub enum Segment {
    Value(ValueSegment),
    Dictionary(DictionarySegment),
    Reference(ReferenceSegment),
}

impl Segment {
    pub fn len(&self) -> usize {
        match self {
            Segment::Value(segment) => segment.len(),
            Segment::Dictionary(segment) => segment.len(),
            Segment::Reference(segment) => segment.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn encoding(&self) -> SegmentEncoding {
        match self {
            Segment::Value(_) => SegmentEncoding::Value,
            Segment::Dictionary(_) => SegmentEncoding::Dictionary,
            Segment::Reference(_) => SegmentEncoding::Reference,
        }
    }
}
