use crate::error::{TranslateError, TranslateResult};
use crate::runtime::context::RuntimeContext;
use crate::runtime::tuple::TupleSlot;
use crate::types::{DataType, ValueId};
use arcstr::ArcStr;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpressionKind {
    Column,
    Addition,
    Subtraction,
    Multiplication,
    Division,
    Modulo,
    Equals,
    NotEquals,
    LessThan,
    LessThanEquals,
    GreaterThan,
    GreaterThanEquals,
    And,
    Or,
    Not,
    IsNull,
    IsNotNull,
}

impl ExpressionKind {
    pub fn is_arithmetic(&self) -> bool {
        matches!(
            self,
            ExpressionKind::Addition
                | ExpressionKind::Subtraction
                | ExpressionKind::Multiplication
                | ExpressionKind::Division
                | ExpressionKind::Modulo
        )
    }

    pub fn is_comparison(&self) -> bool {
        matches!(
            self,
            ExpressionKind::Equals
                | ExpressionKind::NotEquals
                | ExpressionKind::LessThan
                | ExpressionKind::LessThanEquals
                | ExpressionKind::GreaterThan
                | ExpressionKind::GreaterThanEquals
        )
    }

    pub fn is_unary(&self) -> bool {
        matches!(
            self,
            ExpressionKind::Not | ExpressionKind::IsNull | ExpressionKind::IsNotNull
        )
    }

    pub fn is_binary(&self) -> bool {
        !self.is_unary() && *self != ExpressionKind::Column
    }

    /// The comparison that holds when the operands switch sides.
    pub fn mirrored(&self) -> ExpressionKind {
        match self {
            ExpressionKind::LessThan => ExpressionKind::GreaterThan,
            ExpressionKind::LessThanEquals => ExpressionKind::GreaterThanEquals,
            ExpressionKind::GreaterThan => ExpressionKind::LessThan,
            ExpressionKind::GreaterThanEquals => ExpressionKind::LessThanEquals,
            other => *other,
        }
    }
}

impl fmt::Display for ExpressionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let symbol = match self {
            ExpressionKind::Column => "COL",
            ExpressionKind::Addition => "+",
            ExpressionKind::Subtraction => "-",
            ExpressionKind::Multiplication => "*",
            ExpressionKind::Division => "/",
            ExpressionKind::Modulo => "%",
            ExpressionKind::Equals => "=",
            ExpressionKind::NotEquals => "<>",
            ExpressionKind::LessThan => "<",
            ExpressionKind::LessThanEquals => "<=",
            ExpressionKind::GreaterThan => ">",
            ExpressionKind::GreaterThanEquals => ">=",
            ExpressionKind::And => "AND",
            ExpressionKind::Or => "OR",
            ExpressionKind::Not => "NOT",
            ExpressionKind::IsNull => "IS NULL",
            ExpressionKind::IsNotNull => "IS NOT NULL",
        };
        write!(f, "{symbol}")
    }
}

/// A node of the expression tree.
///
/// Leaves are always `Column` nodes whose slot was populated upstream, by a
/// segment reader, the literal/parameter installer, or an earlier compute
/// operator. Inner nodes write their result into their own slot, so the tree
/// never aliases another node's storage.
#[derive(Debug, Clone)]
pub struct Expression {
    kind: ExpressionKind,
    left: Option<Box<Expression>>,
    right: Option<Box<Expression>>,
    result: TupleSlot,
    load_reader: Option<usize>,
}

impl Expression {
    pub fn column(slot: TupleSlot) -> Expression {
        Expression {
            kind: ExpressionKind::Column,
            left: None,
            right: None,
            result: slot,
            load_reader: None,
        }
    }

    pub fn unary(
        kind: ExpressionKind,
        child: Expression,
        result_index: usize,
    ) -> TranslateResult<Expression> {
        if !kind.is_unary() {
            return Err(TranslateError::UnsupportedOperator(format!(
                "{kind} is not a unary operator"
            )));
        }
        let (data_type, nullable) = unary_result_type(kind, &child)?;
        Ok(Expression {
            kind,
            left: Some(Box::new(child)),
            right: None,
            result: TupleSlot::new(data_type, nullable, result_index),
            load_reader: None,
        })
    }

    pub fn binary(
        left: Expression,
        kind: ExpressionKind,
        right: Expression,
        result_index: usize,
    ) -> TranslateResult<Expression> {
        if !kind.is_binary() {
            return Err(TranslateError::UnsupportedOperator(format!(
                "{kind} is not a binary operator"
            )));
        }
        let (data_type, nullable) = binary_result_type(kind, &left, &right)?;
        Ok(Expression {
            kind,
            left: Some(Box::new(left)),
            right: Some(Box::new(right)),
            result: TupleSlot::new(data_type, nullable, result_index),
            load_reader: None,
        })
    }

    pub fn kind(&self) -> ExpressionKind {
        self.kind
    }

    pub fn result(&self) -> TupleSlot {
        self.result
    }

    pub fn left_child(&self) -> Option<&Expression> {
        self.left.as_deref()
    }

    pub fn right_child(&self) -> Option<&Expression> {
        self.right.as_deref()
    }

    pub(crate) fn set_kind(&mut self, kind: ExpressionKind) {
        self.kind = kind;
    }

    /// Attaches a lazy-load binding to every column node reading
    /// `slot_index`. Short-circuiting can skip any single occurrence, so each
    /// one must be able to trigger the load; re-reading within one row is
    /// idempotent because the offset does not move. Returns whether at least
    /// one node was found.
    pub(crate) fn attach_load(&mut self, slot_index: usize, reader_index: usize) -> bool {
        if self.kind == ExpressionKind::Column {
            if self.result.index == slot_index {
                self.load_reader = Some(reader_index);
                return true;
            }
            return false;
        }
        let mut attached = false;
        if let Some(left) = self.left.as_mut() {
            attached |= left.attach_load(slot_index, reader_index);
        }
        if let Some(right) = self.right.as_mut() {
            attached |= right.attach_load(slot_index, reader_index);
        }
        attached
    }

    /// Collects the distinct slot indices of all column leaves.
    pub fn collect_column_slots(&self, out: &mut Vec<usize>) {
        if self.kind == ExpressionKind::Column {
            if !out.contains(&self.result.index) {
                out.push(self.result.index);
            }
            return;
        }
        if let Some(left) = &self.left {
            left.collect_column_slots(out);
        }
        if let Some(right) = &self.right {
            right.collect_column_slots(out);
        }
    }

    /// Computes the subtree and stores the scalar result in this node's slot.
    pub fn evaluate(&self, context: &mut RuntimeContext) {
        match self.kind {
            ExpressionKind::Column => {
                if let Some(reader_index) = self.load_reader {
                    context.readers[reader_index]
                        .read_into(context.chunk_offset, &mut context.tuple);
                }
            }
            ExpressionKind::And => self.evaluate_and(context),
            ExpressionKind::Or => self.evaluate_or(context),
            ExpressionKind::Not => self.evaluate_not(context),
            ExpressionKind::IsNull | ExpressionKind::IsNotNull => {
                self.evaluate_null_check(context)
            }
            kind if kind.is_arithmetic() => self.evaluate_arithmetic(context),
            _ => self.evaluate_comparison(context),
        }
    }

    fn evaluate_and(&self, context: &mut RuntimeContext) {
        let left = self.left.as_ref().expect("AND is binary");
        let right = self.right.as_ref().expect("AND is binary");

        left.evaluate(context);
        let left_null = context.tuple.is_null(left.result.index);
        let left_true = !left_null && context.tuple.get::<bool>(left.result.index);
        if !left_null && !left_true {
            // false AND anything = false; the right subtree (and its lazy
            // loads) is skipped entirely.
            self.store_bool(context, Some(false));
            return;
        }

        right.evaluate(context);
        let right_null = context.tuple.is_null(right.result.index);
        let right_true = !right_null && context.tuple.get::<bool>(right.result.index);
        if !right_null && !right_true {
            self.store_bool(context, Some(false));
        } else if left_null || right_null {
            self.store_bool(context, None);
        } else {
            self.store_bool(context, Some(true));
        }
    }

    fn evaluate_or(&self, context: &mut RuntimeContext) {
        let left = self.left.as_ref().expect("OR is binary");
        let right = self.right.as_ref().expect("OR is binary");

        left.evaluate(context);
        let left_null = context.tuple.is_null(left.result.index);
        let left_true = !left_null && context.tuple.get::<bool>(left.result.index);
        if left_true {
            self.store_bool(context, Some(true));
            return;
        }

        right.evaluate(context);
        let right_null = context.tuple.is_null(right.result.index);
        let right_true = !right_null && context.tuple.get::<bool>(right.result.index);
        if right_true {
            self.store_bool(context, Some(true));
        } else if left_null || right_null {
            self.store_bool(context, None);
        } else {
            self.store_bool(context, Some(false));
        }
    }

    fn evaluate_not(&self, context: &mut RuntimeContext) {
        let child = self.left.as_ref().expect("NOT is unary");
        child.evaluate(context);
        if context.tuple.is_null(child.result.index) {
            self.store_bool(context, None);
        } else {
            let value = context.tuple.get::<bool>(child.result.index);
            self.store_bool(context, Some(!value));
        }
    }

    fn evaluate_null_check(&self, context: &mut RuntimeContext) {
        let child = self.left.as_ref().expect("null check is unary");
        child.evaluate(context);
        let is_null = context.tuple.is_null(child.result.index);
        let value = match self.kind {
            ExpressionKind::IsNull => is_null,
            _ => !is_null,
        };
        self.store_bool(context, Some(value));
    }

    fn evaluate_arithmetic(&self, context: &mut RuntimeContext) {
        let left = self.left.as_ref().expect("arithmetic is binary");
        let right = self.right.as_ref().expect("arithmetic is binary");
        left.evaluate(context);
        right.evaluate(context);

        if context.tuple.is_null(left.result.index) || context.tuple.is_null(right.result.index)
        {
            self.store_null(context);
            return;
        }

        let index = self.result.index;
        match self.result.data_type {
            DataType::Int32 => {
                let lhs: i32 = context.tuple.get(left.result.index);
                let rhs: i32 = context.tuple.get(right.result.index);
                match integer_arithmetic(self.kind, i64::from(lhs), i64::from(rhs)) {
                    Some(value) => {
                        context.tuple.set(index, value as i32);
                        context.tuple.set_null(index, false);
                    }
                    None => self.store_null(context),
                }
            }
            DataType::Int64 => {
                let lhs = read_i64(context, &left.result);
                let rhs = read_i64(context, &right.result);
                match integer_arithmetic(self.kind, lhs, rhs) {
                    Some(value) => {
                        context.tuple.set(index, value);
                        context.tuple.set_null(index, false);
                    }
                    None => self.store_null(context),
                }
            }
            DataType::Float => {
                let lhs = read_f32(context, &left.result);
                let rhs = read_f32(context, &right.result);
                match float_arithmetic(self.kind, f64::from(lhs), f64::from(rhs)) {
                    Some(value) => {
                        context.tuple.set(index, value as f32);
                        context.tuple.set_null(index, false);
                    }
                    None => self.store_null(context),
                }
            }
            DataType::Double => {
                let lhs = read_f64(context, &left.result);
                let rhs = read_f64(context, &right.result);
                match float_arithmetic(self.kind, lhs, rhs) {
                    Some(value) => {
                        context.tuple.set(index, value);
                        context.tuple.set_null(index, false);
                    }
                    None => self.store_null(context),
                }
            }
            // Both operands are literal nulls; the result stays null.
            DataType::Null => self.store_null(context),
            other => panic!("arithmetic cannot produce {other}"),
        }
    }

    fn evaluate_comparison(&self, context: &mut RuntimeContext) {
        let left = self.left.as_ref().expect("comparison is binary");
        let right = self.right.as_ref().expect("comparison is binary");
        left.evaluate(context);
        right.evaluate(context);

        if context.tuple.is_null(left.result.index) || context.tuple.is_null(right.result.index)
        {
            self.store_bool(context, None);
            return;
        }

        let common = DataType::promote(left.result.data_type, right.result.data_type)
            .expect("operand types were checked at build time");
        let outcome = match common {
            DataType::Int32 | DataType::Int64 => {
                let lhs = read_i64(context, &left.result);
                let rhs = read_i64(context, &right.result);
                compare(self.kind, &lhs, &rhs)
            }
            DataType::Float => {
                let lhs = read_f32(context, &left.result);
                let rhs = read_f32(context, &right.result);
                compare(self.kind, &lhs, &rhs)
            }
            DataType::Double => {
                let lhs = read_f64(context, &left.result);
                let rhs = read_f64(context, &right.result);
                compare(self.kind, &lhs, &rhs)
            }
            DataType::String => {
                let lhs: ArcStr = context.tuple.get(left.result.index);
                let rhs: ArcStr = context.tuple.get(right.result.index);
                compare(self.kind, &lhs, &rhs)
            }
            DataType::ValueId => {
                let lhs: ValueId = context.tuple.get(left.result.index);
                let rhs: ValueId = context.tuple.get(right.result.index);
                compare(self.kind, &lhs, &rhs)
            }
            DataType::Bool => {
                let lhs: bool = context.tuple.get(left.result.index);
                let rhs: bool = context.tuple.get(right.result.index);
                match self.kind {
                    ExpressionKind::Equals => lhs == rhs,
                    ExpressionKind::NotEquals => lhs != rhs,
                    other => panic!("{other} is not defined on booleans"),
                }
            }
            DataType::Null => false,
        };
        self.store_bool(context, Some(outcome));
    }

    fn store_bool(&self, context: &mut RuntimeContext, value: Option<bool>) {
        let index = self.result.index;
        context.tuple.set(index, value.unwrap_or(false));
        context.tuple.set_null(index, value.is_none());
    }

    fn store_null(&self, context: &mut RuntimeContext) {
        let index = self.result.index;
        match self.result.data_type {
            DataType::Int32 => context.tuple.set(index, 0i32),
            DataType::Int64 => context.tuple.set(index, 0i64),
            DataType::Float => context.tuple.set(index, 0f32),
            DataType::Double => context.tuple.set(index, 0f64),
            DataType::Bool => context.tuple.set(index, false),
            _ => {}
        }
        context.tuple.set_null(index, true);
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            ExpressionKind::Column => write!(f, "{}", self.result),
            ExpressionKind::Not => {
                write!(f, "NOT {}", self.left.as_ref().unwrap())
            }
            ExpressionKind::IsNull | ExpressionKind::IsNotNull => {
                write!(f, "{} {}", self.left.as_ref().unwrap(), self.kind)
            }
            _ => write!(
                f,
                "({} {} {})",
                self.left.as_ref().unwrap(),
                self.kind,
                self.right.as_ref().unwrap()
            ),
        }
    }
}

/// PartialOrd-driven comparison; NaN compares unequal to everything and is
/// never less or greater.
fn compare<T: PartialOrd>(kind: ExpressionKind, lhs: &T, rhs: &T) -> bool {
    match kind {
        ExpressionKind::Equals => lhs == rhs,
        ExpressionKind::NotEquals => lhs != rhs,
        ExpressionKind::LessThan => lhs < rhs,
        ExpressionKind::LessThanEquals => lhs <= rhs,
        ExpressionKind::GreaterThan => lhs > rhs,
        ExpressionKind::GreaterThanEquals => lhs >= rhs,
        other => panic!("{other} is not a comparison"),
    }
}

fn integer_arithmetic(kind: ExpressionKind, lhs: i64, rhs: i64) -> Option<i64> {
    match kind {
        ExpressionKind::Addition => Some(lhs + rhs),
        ExpressionKind::Subtraction => Some(lhs - rhs),
        ExpressionKind::Multiplication => Some(lhs * rhs),
        ExpressionKind::Division => lhs.checked_div(rhs),
        ExpressionKind::Modulo => lhs.checked_rem(rhs),
        other => panic!("{other} is not arithmetic"),
    }
}

fn float_arithmetic(kind: ExpressionKind, lhs: f64, rhs: f64) -> Option<f64> {
    match kind {
        ExpressionKind::Addition => Some(lhs + rhs),
        ExpressionKind::Subtraction => Some(lhs - rhs),
        ExpressionKind::Multiplication => Some(lhs * rhs),
        ExpressionKind::Division | ExpressionKind::Modulo if rhs == 0.0 => None,
        ExpressionKind::Division => Some(lhs / rhs),
        ExpressionKind::Modulo => Some(lhs % rhs),
        other => panic!("{other} is not arithmetic"),
    }
}

fn read_i64(context: &RuntimeContext, slot: &TupleSlot) -> i64 {
    match slot.data_type {
        DataType::Int32 => i64::from(context.tuple.get::<i32>(slot.index)),
        DataType::Int64 => context.tuple.get(slot.index),
        other => panic!("{slot} holds {other}, not an integer"),
    }
}

fn read_f32(context: &RuntimeContext, slot: &TupleSlot) -> f32 {
    match slot.data_type {
        DataType::Int32 => context.tuple.get::<i32>(slot.index) as f32,
        DataType::Int64 => context.tuple.get::<i64>(slot.index) as f32,
        DataType::Float => context.tuple.get(slot.index),
        other => panic!("{slot} holds {other}, not a float"),
    }
}

fn read_f64(context: &RuntimeContext, slot: &TupleSlot) -> f64 {
    match slot.data_type {
        DataType::Int32 => f64::from(context.tuple.get::<i32>(slot.index)),
        DataType::Int64 => context.tuple.get::<i64>(slot.index) as f64,
        DataType::Float => f64::from(context.tuple.get::<f32>(slot.index)),
        DataType::Double => context.tuple.get(slot.index),
        other => panic!("{slot} holds {other}, not a double"),
    }
}

fn unary_result_type(
    kind: ExpressionKind,
    child: &Expression,
) -> TranslateResult<(DataType, bool)> {
    let child_slot = child.result;
    match kind {
        ExpressionKind::IsNull | ExpressionKind::IsNotNull => Ok((DataType::Bool, false)),
        ExpressionKind::Not => match child_slot.data_type {
            DataType::Bool | DataType::Null => {
                Ok((DataType::Bool, child_slot.nullable || child_slot.data_type == DataType::Null))
            }
            other => Err(TranslateError::TypeMismatch {
                operation: "NOT".to_string(),
                left: other,
                right: other,
            }),
        },
        other => unreachable!("{other} is not unary"),
    }
}

fn binary_result_type(
    kind: ExpressionKind,
    left: &Expression,
    right: &Expression,
) -> TranslateResult<(DataType, bool)> {
    let lhs = left.result;
    let rhs = right.result;
    let mismatch = || TranslateError::TypeMismatch {
        operation: kind.to_string(),
        left: lhs.data_type,
        right: rhs.data_type,
    };
    let either_null_typed = lhs.data_type == DataType::Null || rhs.data_type == DataType::Null;
    let nullable = lhs.nullable || rhs.nullable || either_null_typed;

    if kind.is_arithmetic() {
        let both_numeric = (lhs.data_type.is_numeric() || lhs.data_type == DataType::Null)
            && (rhs.data_type.is_numeric() || rhs.data_type == DataType::Null);
        if !both_numeric {
            return Err(mismatch());
        }
        let promoted = DataType::promote(lhs.data_type, rhs.data_type).ok_or_else(mismatch)?;
        // Division and modulo produce null on a zero divisor, regardless of
        // operand nullability.
        let divides = matches!(kind, ExpressionKind::Division | ExpressionKind::Modulo);
        return Ok((promoted, nullable || divides));
    }

    if kind.is_comparison() {
        let common = DataType::promote(lhs.data_type, rhs.data_type).ok_or_else(mismatch)?;
        if common == DataType::Bool
            && !matches!(kind, ExpressionKind::Equals | ExpressionKind::NotEquals)
        {
            return Err(mismatch());
        }
        return Ok((DataType::Bool, nullable));
    }

    // And / Or
    let boolish = |data_type: DataType| {
        data_type == DataType::Bool || data_type == DataType::Null
    };
    if !boolish(lhs.data_type) || !boolish(rhs.data_type) {
        return Err(mismatch());
    }
    Ok((DataType::Bool, nullable))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::context::RuntimeContext;

    fn context_with_slots(size: usize) -> RuntimeContext {
        let mut context = RuntimeContext::new(None);
        context.tuple.resize(size);
        context
    }

    fn int_slot(index: usize, nullable: bool) -> TupleSlot {
        TupleSlot::new(DataType::Int64, nullable, index)
    }

    #[test]
    fn test_arithmetic_computes_in_promoted_type() {
        let mut context = context_with_slots(3);
        context.tuple.set(0, 2i64);
        context.tuple.set(1, 3i32);
        let expression = Expression::binary(
            Expression::column(int_slot(0, false)),
            ExpressionKind::Multiplication,
            Expression::column(TupleSlot::new(DataType::Int32, false, 1)),
            2,
        )
        .unwrap();
        assert_eq!(expression.result().data_type, DataType::Int64);
        expression.evaluate(&mut context);
        assert_eq!(context.tuple.get::<i64>(2), 6);
    }

    #[test]
    fn test_null_operand_nulls_the_result() {
        let mut context = context_with_slots(3);
        context.tuple.set(0, 2i64);
        context.tuple.set(1, 3i64);
        context.tuple.set_null(1, true);
        let expression = Expression::binary(
            Expression::column(int_slot(0, false)),
            ExpressionKind::Addition,
            Expression::column(int_slot(1, true)),
            2,
        )
        .unwrap();
        expression.evaluate(&mut context);
        assert!(context.tuple.is_null(2));
    }

    #[test]
    fn test_division_by_zero_yields_null() {
        let mut context = context_with_slots(3);
        context.tuple.set(0, 10i64);
        context.tuple.set(1, 0i64);
        let expression = Expression::binary(
            Expression::column(int_slot(0, false)),
            ExpressionKind::Division,
            Expression::column(int_slot(1, false)),
            2,
        )
        .unwrap();
        assert!(expression.result().nullable);
        expression.evaluate(&mut context);
        assert!(context.tuple.is_null(2));
    }

    #[test]
    fn test_three_valued_and() {
        // false AND null = false, true AND null = null
        let mut context = context_with_slots(3);
        let lhs = TupleSlot::new(DataType::Bool, false, 0);
        let rhs = TupleSlot::new(DataType::Bool, true, 1);
        let expression = Expression::binary(
            Expression::column(lhs),
            ExpressionKind::And,
            Expression::column(rhs),
            2,
        )
        .unwrap();

        context.tuple.set(0, false);
        context.tuple.set_null(1, true);
        expression.evaluate(&mut context);
        assert!(!context.tuple.is_null(2));
        assert!(!context.tuple.get::<bool>(2));

        context.tuple.set(0, true);
        expression.evaluate(&mut context);
        assert!(context.tuple.is_null(2));
    }

    #[test]
    fn test_three_valued_or() {
        // true OR null = true, false OR null = null
        let mut context = context_with_slots(3);
        let lhs = TupleSlot::new(DataType::Bool, false, 0);
        let rhs = TupleSlot::new(DataType::Bool, true, 1);
        let expression = Expression::binary(
            Expression::column(lhs),
            ExpressionKind::Or,
            Expression::column(rhs),
            2,
        )
        .unwrap();

        context.tuple.set(0, true);
        context.tuple.set_null(1, true);
        expression.evaluate(&mut context);
        assert!(context.tuple.get::<bool>(2));
        assert!(!context.tuple.is_null(2));

        context.tuple.set(0, false);
        expression.evaluate(&mut context);
        assert!(context.tuple.is_null(2));
    }

    #[test]
    fn test_nan_compares_unequal_and_unordered() {
        let mut context = context_with_slots(3);
        let slot = |index| TupleSlot::new(DataType::Double, false, index);
        context.tuple.set(0, f64::NAN);
        context.tuple.set(1, 1.0f64);

        for (kind, expected) in [
            (ExpressionKind::Equals, false),
            (ExpressionKind::NotEquals, true),
            (ExpressionKind::LessThan, false),
            (ExpressionKind::GreaterThan, false),
        ] {
            let expression = Expression::binary(
                Expression::column(slot(0)),
                kind,
                Expression::column(slot(1)),
                2,
            )
            .unwrap();
            expression.evaluate(&mut context);
            assert_eq!(context.tuple.get::<bool>(2), expected, "{kind}");
        }
    }

    #[test]
    fn test_null_checks_never_return_null() {
        let mut context = context_with_slots(2);
        let child = Expression::column(int_slot(0, true));
        let is_null = Expression::unary(ExpressionKind::IsNull, child.clone(), 1).unwrap();
        let is_not_null = Expression::unary(ExpressionKind::IsNotNull, child, 1).unwrap();

        context.tuple.set(0, 5i64);
        context.tuple.set_null(0, true);
        is_null.evaluate(&mut context);
        assert!(context.tuple.get::<bool>(1));
        assert!(!context.tuple.is_null(1));
        is_not_null.evaluate(&mut context);
        assert!(!context.tuple.get::<bool>(1));
    }

    #[test]
    fn test_string_comparison_is_lexicographic() {
        let mut context = context_with_slots(3);
        let slot = |index| TupleSlot::new(DataType::String, false, index);
        context.tuple.set(0, ArcStr::from("apple"));
        context.tuple.set(1, ArcStr::from("banana"));
        let expression = Expression::binary(
            Expression::column(slot(0)),
            ExpressionKind::LessThan,
            Expression::column(slot(1)),
            2,
        )
        .unwrap();
        expression.evaluate(&mut context);
        assert!(context.tuple.get::<bool>(2));
    }

    #[test]
    fn test_misused_operator_arity_is_unsupported() {
        let column = Expression::column(TupleSlot::new(DataType::Bool, false, 0));
        assert!(matches!(
            Expression::unary(ExpressionKind::Addition, column.clone(), 1),
            Err(TranslateError::UnsupportedOperator(_))
        ));
        assert!(matches!(
            Expression::binary(column.clone(), ExpressionKind::Not, column, 1),
            Err(TranslateError::UnsupportedOperator(_))
        ));
    }

    #[test]
    fn test_string_arithmetic_is_a_type_mismatch() {
        let result = Expression::binary(
            Expression::column(TupleSlot::new(DataType::String, false, 0)),
            ExpressionKind::Addition,
            Expression::column(int_slot(1, false)),
            2,
        );
        assert!(matches!(
            result,
            Err(TranslateError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn test_value_id_comparison_is_integer_comparison() {
        let mut context = context_with_slots(3);
        let slot = |index| TupleSlot::new(DataType::ValueId, false, index);
        context.tuple.set::<ValueId>(0, 1);
        context.tuple.set::<ValueId>(1, 2);
        let expression = Expression::binary(
            Expression::column(slot(0)),
            ExpressionKind::LessThan,
            Expression::column(slot(1)),
            2,
        )
        .unwrap();
        expression.evaluate(&mut context);
        assert!(context.tuple.get::<bool>(2));
    }
}
