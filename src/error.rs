use crate::types::{DataType, ParameterId};
use std::fmt;

/// Errors raised while building an operator chain from a logical plan.
///
/// A sub-plan that is merely not worth fusing is not an error; the translator
/// signals that by returning no chain at all.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TranslateError {
    TypeMismatch {
        operation: String,
        left: DataType,
        right: DataType,
    },
    UnsupportedOperator(String),
}

impl fmt::Display for TranslateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TranslateError::TypeMismatch {
                operation,
                left,
                right,
            } => {
                write!(f, "cannot apply {operation} to {left} and {right}")
            }
            TranslateError::UnsupportedOperator(what) => {
                write!(f, "unsupported operator: {what}")
            }
        }
    }
}

impl std::error::Error for TranslateError {}

pub type TranslateResult<T> = Result<T, TranslateError>;

/// Errors raised while executing an operator chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionError {
    InvalidValue(String),
    MissingParameter(ParameterId),
    Cancelled,
}

impl fmt::Display for ExecutionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutionError::InvalidValue(msg) => write!(f, "{msg}"),
            ExecutionError::MissingParameter(id) => {
                write!(f, "no value bound for parameter #{id}")
            }
            ExecutionError::Cancelled => write!(f, "query execution was cancelled"),
        }
    }
}

impl std::error::Error for ExecutionError {}

pub type ExecutionResult<T> = Result<T, ExecutionError>;
