pub mod context;
pub mod expression;
pub mod reader;
pub mod tuple;

pub use context::RuntimeContext;
pub use expression::{Expression, ExpressionKind};
pub use reader::{EncodingFingerprint, SegmentReader, bind_reader};
pub use tuple::{RuntimeTuple, TupleSlot, TupleValue};
