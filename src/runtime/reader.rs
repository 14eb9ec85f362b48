use crate::error::{ExecutionError, ExecutionResult};
use crate::runtime::tuple::{RuntimeTuple, TupleSlot, TupleValue};
use crate::storage::segment::{ColumnData, Segment, SegmentEncoding};
use crate::storage::table::Table;
use crate::types::{ChunkOffset, DataType, INVALID_VALUE_ID, RowId, Value, ValueId};
use arcstr::ArcStr;
use std::marker::PhantomData;
use std::sync::Arc;

/// Compact identity of a bound reader: concrete segment encoding, payload
/// type and nullability. Two chunks whose fingerprints match can run under
/// the same specialised dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodingFingerprint {
    pub encoding: SegmentEncoding,
    pub data_type: DataType,
    pub nullable: bool,
    pub value_id_mode: bool,
}

/// A reader bound to one input segment for the duration of a chunk. Readers
/// are stateless between rows; the driver passes the current offset in.
pub trait SegmentReader {
    fn read_into(&self, offset: ChunkOffset, tuple: &mut RuntimeTuple);
    fn fingerprint(&self) -> EncodingFingerprint;
}

/// Payload types that can be pulled out of a typed column array.
pub trait SegmentPayload: TupleValue + Default + Clone {
    fn extract(data: &ColumnData, index: usize) -> Self;
}

macro_rules! segment_payload {
    ($payload:ty, $variant:ident) => {
        impl SegmentPayload for $payload {
            fn extract(data: &ColumnData, index: usize) -> Self {
                match data {
                    ColumnData::$variant(values) => values[index].clone(),
                    other => panic!(
                        "column data is {:?}, not {}",
                        other.data_type(),
                        stringify!($variant)
                    ),
                }
            }
        }
    };
}

segment_payload!(i32, Int32);
segment_payload!(i64, Int64);
segment_payload!(f32, Float);
segment_payload!(f64, Double);
segment_payload!(bool, Bool);
segment_payload!(ArcStr, String);

struct ValueReader<T> {
    segment: Arc<Segment>,
    slot_index: usize,
    nullable: bool,
    fingerprint: EncodingFingerprint,
    marker: PhantomData<fn() -> T>,
}

impl<T: SegmentPayload> SegmentReader for ValueReader<T> {
    fn read_into(&self, offset: ChunkOffset, tuple: &mut RuntimeTuple) {
        let Segment::Value(segment) = &*self.segment else {
            unreachable!("value reader bound to a non-value segment");
        };
        let index = offset as usize;
        tuple.set(self.slot_index, T::extract(&segment.data, index));
        if self.nullable {
            tuple.set_null(self.slot_index, segment.is_null_at(index));
        }
    }

    fn fingerprint(&self) -> EncodingFingerprint {
        self.fingerprint
    }
}

/// Reads a materialised boolean that upstream operators stored as Int32.
struct BoolFromIntReader {
    segment: Arc<Segment>,
    slot_index: usize,
    fingerprint: EncodingFingerprint,
}

impl SegmentReader for BoolFromIntReader {
    fn read_into(&self, offset: ChunkOffset, tuple: &mut RuntimeTuple) {
        let Segment::Value(segment) = &*self.segment else {
            unreachable!("value reader bound to a non-value segment");
        };
        let value = i32::extract(&segment.data, offset as usize);
        tuple.set(self.slot_index, value != 0);
    }

    fn fingerprint(&self) -> EncodingFingerprint {
        self.fingerprint
    }
}

struct DictionaryReader<T> {
    segment: Arc<Segment>,
    slot_index: usize,
    nullable: bool,
    fingerprint: EncodingFingerprint,
    marker: PhantomData<fn() -> T>,
}

impl<T: SegmentPayload> SegmentReader for DictionaryReader<T> {
    fn read_into(&self, offset: ChunkOffset, tuple: &mut RuntimeTuple) {
        let Segment::Dictionary(segment) = &*self.segment else {
            unreachable!("dictionary reader bound to a non-dictionary segment");
        };
        let value_id = segment.value_id_at(offset as usize);
        if value_id == INVALID_VALUE_ID {
            debug_assert!(self.nullable, "null entry in a non-nullable column");
            tuple.set(self.slot_index, T::default());
            tuple.set_null(self.slot_index, true);
        } else {
            tuple.set(
                self.slot_index,
                T::extract(segment.dictionary_data(), value_id as usize),
            );
            if self.nullable {
                tuple.set_null(self.slot_index, false);
            }
        }
    }

    fn fingerprint(&self) -> EncodingFingerprint {
        self.fingerprint
    }
}

/// Yields raw value-ids instead of decoded values, for predicates running in
/// the value-id domain.
struct ValueIdReader {
    segment: Arc<Segment>,
    slot_index: usize,
    nullable: bool,
    fingerprint: EncodingFingerprint,
}

impl SegmentReader for ValueIdReader {
    fn read_into(&self, offset: ChunkOffset, tuple: &mut RuntimeTuple) {
        let Segment::Dictionary(segment) = &*self.segment else {
            unreachable!("value-id reader bound to a non-dictionary segment");
        };
        let value_id = segment.value_id_at(offset as usize);
        tuple.set::<ValueId>(self.slot_index, value_id);
        if self.nullable {
            tuple.set_null(self.slot_index, value_id == INVALID_VALUE_ID);
        }
    }

    fn fingerprint(&self) -> EncodingFingerprint {
        self.fingerprint
    }
}

/// Fully polymorphic reader for reference segments: resolves the position
/// list, then whatever encoding the referenced row lives under.
struct ReferenceReader {
    segment: Arc<Segment>,
    slot: TupleSlot,
    fingerprint: EncodingFingerprint,
}

impl SegmentReader for ReferenceReader {
    fn read_into(&self, offset: ChunkOffset, tuple: &mut RuntimeTuple) {
        let Segment::Reference(reference) = &*self.segment else {
            unreachable!("reference reader bound to a non-reference segment");
        };
        let value = resolve_referenced_value(
            &reference.referenced_table,
            reference.referenced_column,
            reference.pos_list[offset as usize],
        );
        tuple.set_value(&self.slot, &value);
    }

    fn fingerprint(&self) -> EncodingFingerprint {
        self.fingerprint
    }
}

fn resolve_referenced_value(table: &Arc<Table>, column: usize, row_id: RowId) -> Value {
    let mut table = Arc::clone(table);
    let mut column = column;
    let mut row_id = row_id;
    loop {
        let segment = Arc::clone(table.get_chunk(row_id.chunk_id).get_segment(column));
        let index = row_id.chunk_offset as usize;
        match &*segment {
            Segment::Reference(next) => {
                row_id = next.pos_list[index];
                column = next.referenced_column;
                table = Arc::clone(&next.referenced_table);
            }
            Segment::Value(value_segment) => {
                return if value_segment.is_null_at(index) {
                    Value::Null
                } else {
                    value_segment.data.value_at(index)
                };
            }
            Segment::Dictionary(dictionary) => {
                let value_id = dictionary.value_id_at(index);
                return if value_id == INVALID_VALUE_ID {
                    Value::Null
                } else {
                    dictionary.decode(value_id)
                };
            }
        }
    }
}

/// Resolves the concrete encoding of `segment` and binds the typed reader
/// that feeds `slot`.
pub fn bind_reader(
    segment: &Arc<Segment>,
    nullable: bool,
    use_value_id: bool,
    slot: TupleSlot,
) -> ExecutionResult<Box<dyn SegmentReader>> {
    if use_value_id {
        let Segment::Dictionary(dictionary) = &**segment else {
            return Err(ExecutionError::InvalidValue(format!(
                "value-id read requested on a {:?}-encoded segment",
                segment.encoding()
            )));
        };
        let fingerprint = EncodingFingerprint {
            encoding: SegmentEncoding::Dictionary,
            data_type: dictionary.data_type(),
            nullable,
            value_id_mode: true,
        };
        return Ok(Box::new(ValueIdReader {
            segment: Arc::clone(segment),
            slot_index: slot.index,
            nullable,
            fingerprint,
        }));
    }

    match &**segment {
        Segment::Value(value_segment) => {
            let concrete_nullable = value_segment.nulls.is_some();
            let fingerprint = EncodingFingerprint {
                encoding: SegmentEncoding::Value,
                data_type: value_segment.data.data_type(),
                nullable: concrete_nullable,
                value_id_mode: false,
            };
            if slot.data_type == DataType::Bool
                && value_segment.data.data_type() == DataType::Int32
            {
                return Ok(Box::new(BoolFromIntReader {
                    segment: Arc::clone(segment),
                    slot_index: slot.index,
                    fingerprint: EncodingFingerprint {
                        data_type: DataType::Bool,
                        ..fingerprint
                    },
                }));
            }
            let reader: Box<dyn SegmentReader> = match value_segment.data.data_type() {
                DataType::Int32 => Box::new(value_reader::<i32>(segment, slot, nullable, fingerprint)),
                DataType::Int64 => Box::new(value_reader::<i64>(segment, slot, nullable, fingerprint)),
                DataType::Float => Box::new(value_reader::<f32>(segment, slot, nullable, fingerprint)),
                DataType::Double => Box::new(value_reader::<f64>(segment, slot, nullable, fingerprint)),
                DataType::Bool => Box::new(value_reader::<bool>(segment, slot, nullable, fingerprint)),
                DataType::String => Box::new(value_reader::<ArcStr>(segment, slot, nullable, fingerprint)),
                other => {
                    return Err(ExecutionError::InvalidValue(format!(
                        "{other} is not a readable column type"
                    )));
                }
            };
            Ok(reader)
        }
        Segment::Dictionary(dictionary) => {
            let fingerprint = EncodingFingerprint {
                encoding: SegmentEncoding::Dictionary,
                data_type: dictionary.data_type(),
                nullable,
                value_id_mode: false,
            };
            let reader: Box<dyn SegmentReader> = match dictionary.data_type() {
                DataType::Int32 => Box::new(dictionary_reader::<i32>(segment, slot, nullable, fingerprint)),
                DataType::Int64 => Box::new(dictionary_reader::<i64>(segment, slot, nullable, fingerprint)),
                DataType::Float => Box::new(dictionary_reader::<f32>(segment, slot, nullable, fingerprint)),
                DataType::Double => Box::new(dictionary_reader::<f64>(segment, slot, nullable, fingerprint)),
                DataType::Bool => Box::new(dictionary_reader::<bool>(segment, slot, nullable, fingerprint)),
                DataType::String => Box::new(dictionary_reader::<ArcStr>(segment, slot, nullable, fingerprint)),
                other => {
                    return Err(ExecutionError::InvalidValue(format!(
                        "{other} is not a readable column type"
                    )));
                }
            };
            Ok(reader)
        }
        Segment::Reference(_) => Ok(Box::new(ReferenceReader {
            segment: Arc::clone(segment),
            slot,
            fingerprint: EncodingFingerprint {
                encoding: SegmentEncoding::Reference,
                data_type: slot.data_type,
                nullable,
                value_id_mode: false,
            },
        })),
    }
}

fn value_reader<T: SegmentPayload>(
    segment: &Arc<Segment>,
    slot: TupleSlot,
    nullable: bool,
    fingerprint: EncodingFingerprint,
) -> ValueReader<T> {
    ValueReader {
        segment: Arc::clone(segment),
        slot_index: slot.index,
        nullable,
        fingerprint,
        marker: PhantomData,
    }
}

fn dictionary_reader<T: SegmentPayload>(
    segment: &Arc<Segment>,
    slot: TupleSlot,
    nullable: bool,
    fingerprint: EncodingFingerprint,
) -> DictionaryReader<T> {
    DictionaryReader {
        segment: Arc::clone(segment),
        slot_index: slot.index,
        nullable,
        fingerprint,
        marker: PhantomData,
    }
}
