use crate::types::{DataType, Value, ValueId};
use arcstr::ArcStr;
use std::fmt;

/// One fixed-width cell of the runtime tuple. The payload is at most 64 bits;
/// strings live in the tuple's side table instead.
#[derive(Debug, Clone, Copy, Default)]
pub enum Cell {
    #[default]
    Empty,
    Int32(i32),
    Int64(i64),
    Float(f32),
    Double(f64),
    Bool(bool),
    ValueId(ValueId),
}

/// A slot of the runtime tuple as seen at chain-build time.
///
/// `data_type` and `nullable` are compile-time contracts; at runtime only the
/// index matters, which is why equality compares indices alone.
#[derive(Debug, Clone, Copy)]
pub struct TupleSlot {
    pub data_type: DataType,
    pub nullable: bool,
    pub index: usize,
}

impl TupleSlot {
    pub fn new(data_type: DataType, nullable: bool, index: usize) -> Self {
        TupleSlot {
            data_type,
            nullable,
            index,
        }
    }
}

impl PartialEq for TupleSlot {
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index
    }
}

impl Eq for TupleSlot {}

impl fmt::Display for TupleSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "x{}", self.index)
    }
}

/// The scratch record reused for every row: a dense cell array, parallel null
/// flags, and a string side table indexed by the same slot ids.
#[derive(Debug, Clone, Default)]
pub struct RuntimeTuple {
    cells: Vec<Cell>,
    nulls: Vec<bool>,
    strings: Vec<ArcStr>,
}

/// Typed access to runtime-tuple slots. Reading a slot as the wrong type is a
/// chain-construction bug and panics with the offending slot.
pub trait TupleValue: Sized {
    fn read(tuple: &RuntimeTuple, index: usize) -> Self;
    fn write(tuple: &mut RuntimeTuple, index: usize, value: Self);
}

macro_rules! cell_tuple_value {
    ($payload:ty, $variant:ident) => {
        impl TupleValue for $payload {
            fn read(tuple: &RuntimeTuple, index: usize) -> Self {
                match tuple.cells[index] {
                    Cell::$variant(value) => value,
                    ref other => panic!(
                        "tuple slot x{index} holds {other:?}, not {}",
                        stringify!($variant)
                    ),
                }
            }

            fn write(tuple: &mut RuntimeTuple, index: usize, value: Self) {
                tuple.cells[index] = Cell::$variant(value);
            }
        }
    };
}

cell_tuple_value!(i32, Int32);
cell_tuple_value!(i64, Int64);
cell_tuple_value!(f32, Float);
cell_tuple_value!(f64, Double);
cell_tuple_value!(bool, Bool);
cell_tuple_value!(ValueId, ValueId);

impl TupleValue for ArcStr {
    fn read(tuple: &RuntimeTuple, index: usize) -> Self {
        tuple.strings[index].clone()
    }

    fn write(tuple: &mut RuntimeTuple, index: usize, value: Self) {
        tuple.strings[index] = value;
    }
}

impl RuntimeTuple {
    pub fn new() -> Self {
        RuntimeTuple::default()
    }

    /// Sizes the tuple for a chain with `size` slots. Cells keep no state
    /// between rows; producers must write before consumers read.
    pub fn resize(&mut self, size: usize) {
        self.cells.clear();
        self.cells.resize(size, Cell::Empty);
        self.nulls.clear();
        self.nulls.resize(size, false);
        self.strings.clear();
        self.strings.resize(size, ArcStr::new());
    }

    pub fn size(&self) -> usize {
        self.cells.len()
    }

    pub fn get<T: TupleValue>(&self, index: usize) -> T {
        T::read(self, index)
    }

    pub fn set<T: TupleValue>(&mut self, index: usize, value: T) {
        T::write(self, index, value);
    }

    pub fn is_null(&self, index: usize) -> bool {
        self.nulls[index]
    }

    pub fn set_null(&mut self, index: usize, null: bool) {
        self.nulls[index] = null;
    }

    /// Reads a slot as an owned scalar, honouring the null flag.
    pub fn value(&self, slot: &TupleSlot) -> Value {
        if self.is_null(slot.index) {
            return Value::Null;
        }
        match slot.data_type {
            DataType::Int32 => Value::Int32(self.get(slot.index)),
            DataType::Int64 => Value::Int64(self.get(slot.index)),
            DataType::Float => Value::Float(self.get(slot.index)),
            DataType::Double => Value::Double(self.get(slot.index)),
            DataType::String => Value::String(self.get(slot.index)),
            DataType::Bool => Value::Bool(self.get(slot.index)),
            DataType::ValueId => Value::ValueId(self.get(slot.index)),
            DataType::Null => Value::Null,
        }
    }

    /// Installs an owned scalar into a slot, setting payload and null flag.
    pub fn set_value(&mut self, slot: &TupleSlot, value: &Value) {
        debug_assert!(
            value.is_null() || value.data_type() == slot.data_type,
            "cannot install {value} into a {} slot",
            slot.data_type
        );
        match value {
            Value::Null => {
                debug_assert!(
                    slot.nullable || slot.data_type == DataType::Null,
                    "null installed into non-nullable slot x{}",
                    slot.index
                );
                self.set_null(slot.index, true);
            }
            Value::Int32(v) => self.set(slot.index, *v),
            Value::Int64(v) => self.set(slot.index, *v),
            Value::Float(v) => self.set(slot.index, *v),
            Value::Double(v) => self.set(slot.index, *v),
            Value::String(v) => self.set(slot.index, v.clone()),
            Value::Bool(v) => self.set(slot.index, *v),
            Value::ValueId(v) => self.set(slot.index, *v),
        }
        if !value.is_null() {
            self.set_null(slot.index, false);
        }
    }
}
