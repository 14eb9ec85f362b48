pub mod translator;

pub use translator::Translator;

use crate::chain::aggregate::AggregateFunction;
use crate::error::{ExecutionError, ExecutionResult};
use crate::storage::table::Table;
use crate::types::{ColumnId, DataType, ParameterId, Value};
use hashbrown::HashMap;
use std::sync::Arc;

/// Comparison and null-test conditions a predicate node may carry. `Like`,
/// `NotLike` and `In` are representable but never fused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PredicateCondition {
    Equals,
    NotEquals,
    LessThan,
    LessThanEquals,
    GreaterThan,
    GreaterThanEquals,
    Between,
    IsNull,
    IsNotNull,
    Like,
    NotLike,
    In,
}

impl PredicateCondition {
    pub fn is_binary_comparison(&self) -> bool {
        matches!(
            self,
            PredicateCondition::Equals
                | PredicateCondition::NotEquals
                | PredicateCondition::LessThan
                | PredicateCondition::LessThanEquals
                | PredicateCondition::GreaterThan
                | PredicateCondition::GreaterThanEquals
        )
    }

    /// The condition that holds when the operands switch sides.
    pub fn mirrored(&self) -> PredicateCondition {
        match self {
            PredicateCondition::LessThan => PredicateCondition::GreaterThan,
            PredicateCondition::LessThanEquals => PredicateCondition::GreaterThanEquals,
            PredicateCondition::GreaterThan => PredicateCondition::LessThan,
            PredicateCondition::GreaterThanEquals => PredicateCondition::LessThanEquals,
            other => *other,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithmeticOperator {
    Addition,
    Subtraction,
    Multiplication,
    Division,
    Modulo,
}

impl ArithmeticOperator {
    fn symbol(&self) -> &'static str {
        match self {
            ArithmeticOperator::Addition => "+",
            ArithmeticOperator::Subtraction => "-",
            ArithmeticOperator::Multiplication => "*",
            ArithmeticOperator::Division => "/",
            ArithmeticOperator::Modulo => "%",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOperator {
    And,
    Or,
}

/// An expression of the logical plan, before lowering onto tuple slots.
/// `Column` references a column of the chain's input table by ordinal.
#[derive(Debug, Clone)]
pub enum PlanExpression {
    Column(ColumnId),
    Value(Value),
    Parameter {
        parameter_id: ParameterId,
        data_type: DataType,
        nullable: bool,
    },
    Arithmetic {
        operator: ArithmeticOperator,
        left: Box<PlanExpression>,
        right: Box<PlanExpression>,
    },
    Predicate {
        condition: PredicateCondition,
        arguments: Vec<PlanExpression>,
    },
    Logical {
        operator: LogicalOperator,
        left: Box<PlanExpression>,
        right: Box<PlanExpression>,
    },
    Not(Box<PlanExpression>),
    Cast {
        expression: Box<PlanExpression>,
        target: DataType,
    },
    Aggregate {
        function: AggregateFunction,
        argument: Option<Box<PlanExpression>>,
        distinct: bool,
    },
}

impl PlanExpression {
    pub fn column(column_id: ColumnId) -> PlanExpression {
        PlanExpression::Column(column_id)
    }

    pub fn value(value: impl Into<Value>) -> PlanExpression {
        PlanExpression::Value(value.into())
    }

    pub fn parameter(
        parameter_id: ParameterId,
        data_type: DataType,
        nullable: bool,
    ) -> PlanExpression {
        PlanExpression::Parameter {
            parameter_id,
            data_type,
            nullable,
        }
    }

    pub fn arithmetic(
        left: PlanExpression,
        operator: ArithmeticOperator,
        right: PlanExpression,
    ) -> PlanExpression {
        PlanExpression::Arithmetic {
            operator,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn comparison(
        left: PlanExpression,
        condition: PredicateCondition,
        right: PlanExpression,
    ) -> PlanExpression {
        PlanExpression::Predicate {
            condition,
            arguments: vec![left, right],
        }
    }

    pub fn between(
        probe: PlanExpression,
        low: PlanExpression,
        high: PlanExpression,
    ) -> PlanExpression {
        PlanExpression::Predicate {
            condition: PredicateCondition::Between,
            arguments: vec![probe, low, high],
        }
    }

    pub fn is_null(argument: PlanExpression) -> PlanExpression {
        PlanExpression::Predicate {
            condition: PredicateCondition::IsNull,
            arguments: vec![argument],
        }
    }

    pub fn is_not_null(argument: PlanExpression) -> PlanExpression {
        PlanExpression::Predicate {
            condition: PredicateCondition::IsNotNull,
            arguments: vec![argument],
        }
    }

    pub fn and(left: PlanExpression, right: PlanExpression) -> PlanExpression {
        PlanExpression::Logical {
            operator: LogicalOperator::And,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn or(left: PlanExpression, right: PlanExpression) -> PlanExpression {
        PlanExpression::Logical {
            operator: LogicalOperator::Or,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn not(argument: PlanExpression) -> PlanExpression {
        PlanExpression::Not(Box::new(argument))
    }

    pub fn aggregate(function: AggregateFunction, argument: PlanExpression) -> PlanExpression {
        PlanExpression::Aggregate {
            function,
            argument: Some(Box::new(argument)),
            distinct: false,
        }
    }

    pub fn count_star() -> PlanExpression {
        PlanExpression::Aggregate {
            function: AggregateFunction::Count,
            argument: None,
            distinct: false,
        }
    }

    /// The output-column name this expression produces, with column
    /// references resolved against the input table's schema.
    pub fn name(&self, table: &Table) -> String {
        match self {
            PlanExpression::Column(column_id) => table.column_name(*column_id).to_string(),
            PlanExpression::Value(value) => value.to_string(),
            PlanExpression::Parameter { parameter_id, .. } => format!("${parameter_id}"),
            PlanExpression::Arithmetic {
                operator,
                left,
                right,
            } => format!("{} {} {}", left.name(table), operator.symbol(), right.name(table)),
            PlanExpression::Predicate {
                condition,
                arguments,
            } => match condition {
                PredicateCondition::Between => format!(
                    "{} BETWEEN {} AND {}",
                    arguments[0].name(table),
                    arguments[1].name(table),
                    arguments[2].name(table)
                ),
                PredicateCondition::IsNull => format!("{} IS NULL", arguments[0].name(table)),
                PredicateCondition::IsNotNull => {
                    format!("{} IS NOT NULL", arguments[0].name(table))
                }
                condition => format!(
                    "{} {} {}",
                    arguments[0].name(table),
                    condition_symbol(*condition),
                    arguments[1].name(table)
                ),
            },
            PlanExpression::Logical {
                operator,
                left,
                right,
            } => {
                let symbol = match operator {
                    LogicalOperator::And => "AND",
                    LogicalOperator::Or => "OR",
                };
                format!("{} {symbol} {}", left.name(table), right.name(table))
            }
            PlanExpression::Not(argument) => format!("NOT {}", argument.name(table)),
            PlanExpression::Cast { expression, target } => {
                format!("CAST({} AS {target})", expression.name(table))
            }
            PlanExpression::Aggregate {
                function, argument, ..
            } => match argument {
                Some(argument) => format!("{function}({})", argument.name(table)),
                None => format!("{function}(*)"),
            },
        }
    }
}

fn condition_symbol(condition: PredicateCondition) -> &'static str {
    match condition {
        PredicateCondition::Equals => "=",
        PredicateCondition::NotEquals => "<>",
        PredicateCondition::LessThan => "<",
        PredicateCondition::LessThanEquals => "<=",
        PredicateCondition::GreaterThan => ">",
        PredicateCondition::GreaterThanEquals => ">=",
        PredicateCondition::Like => "LIKE",
        PredicateCondition::NotLike => "NOT LIKE",
        PredicateCondition::In => "IN",
        other => unreachable!("{other:?} has no infix symbol"),
    }
}

/// Folds an expression that must not depend on any row: literals, external
/// parameters and arithmetic over them. Used for limit row counts.
pub fn evaluate_constant(
    expression: &PlanExpression,
    parameters: &HashMap<ParameterId, Value>,
) -> ExecutionResult<Value> {
    match expression {
        PlanExpression::Value(value) => Ok(value.clone()),
        PlanExpression::Parameter { parameter_id, .. } => parameters
            .get(parameter_id)
            .cloned()
            .ok_or(ExecutionError::MissingParameter(*parameter_id)),
        PlanExpression::Arithmetic {
            operator,
            left,
            right,
        } => {
            let lhs = evaluate_constant(left, parameters)?;
            let rhs = evaluate_constant(right, parameters)?;
            if lhs.is_null() || rhs.is_null() {
                return Ok(Value::Null);
            }
            match (lhs.as_i64(), rhs.as_i64()) {
                (Some(lhs), Some(rhs)) => {
                    let folded = match operator {
                        ArithmeticOperator::Addition => Some(lhs + rhs),
                        ArithmeticOperator::Subtraction => Some(lhs - rhs),
                        ArithmeticOperator::Multiplication => Some(lhs * rhs),
                        ArithmeticOperator::Division => lhs.checked_div(rhs),
                        ArithmeticOperator::Modulo => lhs.checked_rem(rhs),
                    };
                    Ok(folded.map(Value::Int64).unwrap_or(Value::Null))
                }
                _ => Err(ExecutionError::InvalidValue(format!(
                    "cannot fold {lhs} {} {rhs}",
                    operator.symbol()
                ))),
            }
        }
        other => Err(ExecutionError::InvalidValue(format!(
            "{other:?} is not a constant expression"
        ))),
    }
}

/// A node of the logical query plan handed in by the planner.
#[derive(Debug)]
pub enum PlanNode {
    StoredTableScan {
        table: Arc<Table>,
    },
    Validate {
        input: Arc<PlanNode>,
    },
    Predicate {
        input: Arc<PlanNode>,
        predicate: PlanExpression,
    },
    Projection {
        input: Arc<PlanNode>,
        expressions: Vec<PlanExpression>,
    },
    Limit {
        input: Arc<PlanNode>,
        row_count: PlanExpression,
    },
    Union {
        left: Arc<PlanNode>,
        right: Arc<PlanNode>,
    },
    Aggregate {
        input: Arc<PlanNode>,
        group_by: Vec<PlanExpression>,
        aggregates: Vec<PlanExpression>,
    },
}

impl PlanNode {
    pub fn scan(table: Arc<Table>) -> Arc<PlanNode> {
        Arc::new(PlanNode::StoredTableScan { table })
    }

    pub fn validate(input: Arc<PlanNode>) -> Arc<PlanNode> {
        Arc::new(PlanNode::Validate { input })
    }

    pub fn predicate(input: Arc<PlanNode>, predicate: PlanExpression) -> Arc<PlanNode> {
        Arc::new(PlanNode::Predicate { input, predicate })
    }

    pub fn projection(input: Arc<PlanNode>, expressions: Vec<PlanExpression>) -> Arc<PlanNode> {
        Arc::new(PlanNode::Projection { input, expressions })
    }

    pub fn limit(input: Arc<PlanNode>, row_count: PlanExpression) -> Arc<PlanNode> {
        Arc::new(PlanNode::Limit { input, row_count })
    }

    pub fn union(left: Arc<PlanNode>, right: Arc<PlanNode>) -> Arc<PlanNode> {
        Arc::new(PlanNode::Union { left, right })
    }

    pub fn aggregate(
        input: Arc<PlanNode>,
        group_by: Vec<PlanExpression>,
        aggregates: Vec<PlanExpression>,
    ) -> Arc<PlanNode> {
        Arc::new(PlanNode::Aggregate {
            input,
            group_by,
            aggregates,
        })
    }

    pub fn inputs(&self) -> Vec<&Arc<PlanNode>> {
        match self {
            PlanNode::StoredTableScan { .. } => Vec::new(),
            PlanNode::Validate { input }
            | PlanNode::Predicate { input, .. }
            | PlanNode::Projection { input, .. }
            | PlanNode::Limit { input, .. }
            | PlanNode::Aggregate { input, .. } => vec![input],
            PlanNode::Union { left, right } => vec![left, right],
        }
    }

    pub fn left_input(&self) -> Option<&Arc<PlanNode>> {
        self.inputs().first().copied()
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            PlanNode::StoredTableScan { .. } => "StoredTableScan",
            PlanNode::Validate { .. } => "Validate",
            PlanNode::Predicate { .. } => "Predicate",
            PlanNode::Projection { .. } => "Projection",
            PlanNode::Limit { .. } => "Limit",
            PlanNode::Union { .. } => "Union",
            PlanNode::Aggregate { .. } => "Aggregate",
        }
    }
}
