use arcstr::ArcStr;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

pub type ChunkId = u32;
pub type ChunkOffset = u32;
pub type ColumnId = usize;
pub type ParameterId = usize;
pub type ValueId = u32;
pub type TransactionId = u32;
pub type CommitId = u32;

/// Reserved value-id marking a null entry in a dictionary attribute vector.
/// Doubles as the guaranteed-miss sentinel installed for equality probes on
/// values absent from a chunk's dictionary.
pub const INVALID_VALUE_ID: ValueId = ValueId::MAX;

/// Sentinel commit id for "not deleted".
pub const MAX_COMMIT_ID: CommitId = CommitId::MAX;

/// Position of a single row inside a table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RowId {
    pub chunk_id: ChunkId,
    pub chunk_offset: ChunkOffset,
}

impl RowId {
    pub fn new(chunk_id: ChunkId, chunk_offset: ChunkOffset) -> Self {
        RowId {
            chunk_id,
            chunk_offset,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataType {
    Int32,
    Int64,
    Float,
    Double,
    String,
    Bool,
    ValueId,
    Null,
}

impl DataType {
    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            DataType::Int32 | DataType::Int64 | DataType::Float | DataType::Double
        )
    }

    pub fn is_integer(&self) -> bool {
        matches!(self, DataType::Int32 | DataType::Int64)
    }

    /// The type both operands of a mixed-type operation are widened to.
    ///
    /// `Null` (the type of a literal null) joins with anything; a numeric
    /// pair joins to the wider of the two. Non-numeric types only join with
    /// themselves.
    pub fn promote(lhs: DataType, rhs: DataType) -> Option<DataType> {
        fn numeric_rank(data_type: DataType) -> u8 {
            match data_type {
                DataType::Int32 => 0,
                DataType::Int64 => 1,
                DataType::Float => 2,
                DataType::Double => 3,
                _ => unreachable!(),
            }
        }

        match (lhs, rhs) {
            (DataType::Null, other) | (other, DataType::Null) => Some(other),
            (lhs, rhs) if lhs == rhs => Some(lhs),
            (lhs, rhs) if lhs.is_numeric() && rhs.is_numeric() => {
                if numeric_rank(lhs) >= numeric_rank(rhs) {
                    Some(lhs)
                } else {
                    Some(rhs)
                }
            }
            _ => None,
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataType::Int32 => write!(f, "Int32"),
            DataType::Int64 => write!(f, "Int64"),
            DataType::Float => write!(f, "Float"),
            DataType::Double => write!(f, "Double"),
            DataType::String => write!(f, "String"),
            DataType::Bool => write!(f, "Bool"),
            DataType::ValueId => write!(f, "ValueId"),
            DataType::Null => write!(f, "Null"),
        }
    }
}

/// An owned scalar of any supported type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Null,
    Int32(i32),
    Int64(i64),
    Float(f32),
    Double(f64),
    String(ArcStr),
    Bool(bool),
    ValueId(ValueId),
}

impl Value {
    pub fn data_type(&self) -> DataType {
        match self {
            Value::Null => DataType::Null,
            Value::Int32(_) => DataType::Int32,
            Value::Int64(_) => DataType::Int64,
            Value::Float(_) => DataType::Float,
            Value::Double(_) => DataType::Double,
            Value::String(_) => DataType::String,
            Value::Bool(_) => DataType::Bool,
            Value::ValueId(_) => DataType::ValueId,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int32(v) => Some(i64::from(*v)),
            Value::Int64(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int32(v) => Some(f64::from(*v)),
            Value::Int64(v) => Some(*v as f64),
            Value::Float(v) => Some(f64::from(*v)),
            Value::Double(v) => Some(*v),
            _ => None,
        }
    }

    /// Converts the value into the given type, if the conversion is exact
    /// enough for predicate probes. Nulls convert to nulls.
    pub fn cast_to(&self, target: DataType) -> Option<Value> {
        if self.is_null() {
            return Some(Value::Null);
        }
        if self.data_type() == target {
            return Some(self.clone());
        }
        match target {
            DataType::Int32 => self.as_i64().and_then(|v| i32::try_from(v).ok()).map(Value::Int32),
            DataType::Int64 => self.as_i64().map(Value::Int64),
            DataType::Float => self.as_f64().map(|v| Value::Float(v as f32)),
            DataType::Double => self.as_f64().map(Value::Double),
            _ => None,
        }
    }

    /// Ordering between two values of the same type. `None` for nulls,
    /// incomparable types and NaN.
    pub fn partial_cmp_same_type(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Int32(a), Value::Int32(b)) => Some(a.cmp(b)),
            (Value::Int64(a), Value::Int64(b)) => Some(a.cmp(b)),
            (Value::Float(a), Value::Float(b)) => a.partial_cmp(b),
            (Value::Double(a), Value::Double(b)) => a.partial_cmp(b),
            (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
            (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
            (Value::ValueId(a), Value::ValueId(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Int32(v) => write!(f, "{v}"),
            Value::Int64(v) => write!(f, "{v}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::Double(v) => write!(f, "{v}"),
            Value::String(v) => write!(f, "'{v}'"),
            Value::Bool(v) => write!(f, "{v}"),
            Value::ValueId(v) => write!(f, "#{v}"),
        }
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Int32(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int64(value)
    }
}

impl From<f32> for Value {
    fn from(value: f32) -> Self {
        Value::Float(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Double(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(ArcStr::from(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_promote_numeric_widens() {
        assert_eq!(
            DataType::promote(DataType::Int32, DataType::Int64),
            Some(DataType::Int64)
        );
        assert_eq!(
            DataType::promote(DataType::Int64, DataType::Float),
            Some(DataType::Float)
        );
        assert_eq!(
            DataType::promote(DataType::Int32, DataType::Double),
            Some(DataType::Double)
        );
        assert_eq!(
            DataType::promote(DataType::Double, DataType::Float),
            Some(DataType::Double)
        );
    }

    #[test]
    fn test_promote_null_joins_with_anything() {
        assert_eq!(
            DataType::promote(DataType::Null, DataType::String),
            Some(DataType::String)
        );
        assert_eq!(
            DataType::promote(DataType::Int32, DataType::Null),
            Some(DataType::Int32)
        );
    }

    #[test]
    fn test_promote_rejects_mixed_families() {
        assert_eq!(DataType::promote(DataType::String, DataType::Int64), None);
        assert_eq!(DataType::promote(DataType::Bool, DataType::Int32), None);
        assert_eq!(DataType::promote(DataType::ValueId, DataType::Int64), None);
    }

    #[test]
    fn test_cast_between_numeric_types() {
        assert_eq!(
            Value::Int64(7).cast_to(DataType::Int32),
            Some(Value::Int32(7))
        );
        assert_eq!(
            Value::Int32(7).cast_to(DataType::Double),
            Some(Value::Double(7.0))
        );
        assert_eq!(Value::Int64(i64::MAX).cast_to(DataType::Int32), None);
        assert_eq!(Value::from("x").cast_to(DataType::Int64), None);
    }
}
