use crate::chain::aggregate::{AggregateColumn, AggregateOperator, GroupByColumn};
use crate::chain::operators::{ChainOperator, Compute, Filter, Validate};
use crate::chain::read_tuples::ReadTuples;
use crate::chain::write::{OutputColumn, ReferenceOutputColumn, WriteOffsets, WriteTuples};
use crate::chain::OperatorChain;
use crate::config::EngineConfig;
use crate::error::TranslateResult;
use crate::plan::{PlanExpression, PlanNode, PredicateCondition};
use crate::plan::{ArithmeticOperator, LogicalOperator};
use crate::runtime::expression::{Expression, ExpressionKind};
use crate::storage::segment::Segment;
use crate::storage::table::{Table, TableKind};
use crate::types::{ColumnId, DataType, Value};
use hashbrown::HashSet;
use std::collections::VecDeque;
use std::sync::Arc;

/// Translates the fusable sub-plan under a logical-plan root into an
/// operator chain. Returns no chain when the sub-plan is not worth fusing;
/// the caller then falls back to stock operators.
#[derive(Debug, Clone, Default)]
pub struct Translator {
    config: EngineConfig,
}

/// What the chain will execute against, resolved from the sub-plan's single
/// input node. Column ordinals in plan expressions refer to this schema.
struct InputInfo {
    table: Arc<Table>,
    is_stored_table_scan: bool,
    table_kind: TableKind,
}

impl Translator {
    pub fn new(config: EngineConfig) -> Self {
        Translator { config }
    }

    pub fn translate(&self, root: &Arc<PlanNode>) -> TranslateResult<Option<OperatorChain>> {
        self.try_translate_sub_plan(root, self.config.value_id_acceleration)
    }

    fn try_translate_sub_plan(
        &self,
        root: &Arc<PlanNode>,
        use_value_id: bool,
    ) -> TranslateResult<Option<OperatorChain>> {
        // Breadth-first collection of fusable nodes, stopping each branch at
        // the first node that cannot join the chain. An aggregate terminates
        // the chain, so it stays fusable only while every node collected
        // before it was a limit.
        let mut jittable_count = 0usize;
        let mut use_validate = false;
        let mut allow_aggregate = true;
        let mut input_nodes: Vec<Arc<PlanNode>> = Vec::new();
        let mut visited: HashSet<*const PlanNode> = HashSet::new();
        let mut queue: VecDeque<Arc<PlanNode>> = VecDeque::from([Arc::clone(root)]);
        while let Some(node) = queue.pop_front() {
            if !visited.insert(Arc::as_ptr(&node)) {
                continue;
            }
            let is_root = Arc::ptr_eq(&node, root);
            if self.node_is_fusable(&node, is_root, allow_aggregate) {
                use_validate |= matches!(&*node, PlanNode::Validate { .. });
                allow_aggregate &= matches!(&*node, PlanNode::Limit { .. });
                jittable_count += 1;
                for input in node.inputs() {
                    queue.push_back(Arc::clone(input));
                }
            } else if !input_nodes.iter().any(|seen| Arc::ptr_eq(seen, &node)) {
                input_nodes.push(node);
            }
        }

        // Fusing pays off only for sub-plans with one input and enough
        // operators to save materialisation; aggregates are always worth it.
        if input_nodes.len() != 1 || jittable_count == 0 {
            tracing::debug!(root = root.type_name(), "sub-plan not fusable");
            return Ok(None);
        }
        if jittable_count == 1
            && matches!(
                &**root,
                PlanNode::Projection { .. }
                    | PlanNode::Validate { .. }
                    | PlanNode::Limit { .. }
                    | PlanNode::Predicate { .. }
            )
        {
            return Ok(None);
        }
        if jittable_count == 2 && matches!(&**root, PlanNode::Validate { .. }) {
            return Ok(None);
        }

        let input_node = &input_nodes[0];
        let Some(input_info) = resolve_input_info(input_node) else {
            return Ok(None);
        };

        let (last_node, row_count_expression) = match &**root {
            PlanNode::Limit { input, row_count } => {
                (Arc::clone(input), Some(row_count.clone()))
            }
            _ => (Arc::clone(root), None),
        };
        let use_limit = row_count_expression.is_some();

        let mut read_tuples = ReadTuples::new(use_validate, row_count_expression);
        let mut operators: Vec<ChainOperator> = Vec::new();

        if use_validate {
            operators.push(ChainOperator::Validate(Validate {
                table_kind: input_info.table_kind,
            }));
        }

        // The filter subtree: every predicate and union between the sink end
        // of the chain and the input collapses into one boolean expression.
        let mut filter_node = Arc::clone(&last_node);
        while !Arc::ptr_eq(&filter_node, input_node)
            && !matches!(
                &*filter_node,
                PlanNode::Predicate { .. } | PlanNode::Union { .. }
            )
        {
            match filter_node.left_input() {
                Some(input) => filter_node = Arc::clone(input),
                None => break,
            }
        }
        if !Arc::ptr_eq(&filter_node, input_node)
            && matches!(
                &*filter_node,
                PlanNode::Predicate { .. } | PlanNode::Union { .. }
            )
        {
            let Some(boolean) = boolean_expression(&filter_node, input_node) else {
                return Ok(None);
            };
            let Some(lowered) =
                self.lower(&boolean, &mut read_tuples, &input_info, false, false, use_value_id)?
            else {
                return self.fallback(root, use_value_id);
            };
            let slot = lowered.result();
            if lowered.kind() != ExpressionKind::Column {
                operators.push(ChainOperator::Compute(Compute { expression: lowered }));
            }
            operators.push(ChainOperator::Filter(Filter {
                slot,
                load_reader: None,
            }));
        }

        if let PlanNode::Aggregate {
            group_by,
            aggregates,
            ..
        } = &*last_node
        {
            // Aggregation materialises, so it is always the end of the chain.
            let mut group_columns = Vec::new();
            for expression in group_by {
                let Some(lowered) = self.lower(
                    expression,
                    &mut read_tuples,
                    &input_info,
                    false,
                    false,
                    use_value_id,
                )?
                else {
                    return self.fallback(root, use_value_id);
                };
                let slot = lowered.result();
                if lowered.kind() != ExpressionKind::Column {
                    operators.push(ChainOperator::Compute(Compute { expression: lowered }));
                }
                group_columns.push(GroupByColumn {
                    name: expression.name(&input_info.table),
                    slot,
                });
            }

            let mut aggregate_columns = Vec::new();
            for expression in aggregates {
                let PlanExpression::Aggregate {
                    function,
                    argument,
                    distinct,
                } = expression
                else {
                    return Ok(None);
                };
                if *distinct {
                    return Ok(None);
                }
                let slot = match argument {
                    None => None,
                    Some(argument) => {
                        let Some(lowered) = self.lower(
                            argument,
                            &mut read_tuples,
                            &input_info,
                            false,
                            false,
                            use_value_id,
                        )?
                        else {
                            return self.fallback(root, use_value_id);
                        };
                        let slot = lowered.result();
                        if lowered.kind() != ExpressionKind::Column {
                            operators.push(ChainOperator::Compute(Compute {
                                expression: lowered,
                            }));
                        }
                        Some(slot)
                    }
                };
                aggregate_columns.push(AggregateColumn {
                    name: expression.name(&input_info.table),
                    function: *function,
                    slot,
                });
            }
            operators.push(ChainOperator::Aggregate(AggregateOperator {
                group_by: group_columns,
                aggregates: aggregate_columns,
            }));
        } else {
            if use_limit {
                operators.push(ChainOperator::Limit);
            }

            let outputs = output_expressions(&last_node, &input_info.table);
            let all_direct = outputs
                .iter()
                .all(|(_, expression)| matches!(expression, PlanExpression::Column(_)));
            if all_direct {
                // Nothing is computed; rows can be emitted as positions.
                let output_columns = outputs
                    .iter()
                    .map(|(name, expression)| {
                        let PlanExpression::Column(column_id) = expression else {
                            unreachable!("only direct column outputs reach here");
                        };
                        ReferenceOutputColumn {
                            name: name.clone(),
                            data_type: input_info.table.column_data_type(*column_id),
                            nullable: input_info.table.column_is_nullable(*column_id),
                            referenced_column: *column_id,
                        }
                    })
                    .collect();
                operators.push(ChainOperator::WriteOffsets(WriteOffsets { output_columns }));
            } else {
                let mut output_columns = Vec::new();
                for (name, expression) in &outputs {
                    let Some(lowered) = self.lower(
                        expression,
                        &mut read_tuples,
                        &input_info,
                        false,
                        false,
                        use_value_id,
                    )?
                    else {
                        return self.fallback(root, use_value_id);
                    };
                    let slot = lowered.result();
                    if lowered.kind() != ExpressionKind::Column {
                        operators.push(ChainOperator::Compute(Compute { expression: lowered }));
                    }
                    output_columns.push(OutputColumn {
                        name: name.clone(),
                        slot,
                    });
                }
                operators.push(ChainOperator::WriteTuples(WriteTuples { output_columns }));
            }
        }

        let chain = OperatorChain::new(read_tuples, operators, self.config.clone());
        tracing::debug!(chain = %chain.id(), "fused sub-plan: {chain}");
        Ok(Some(chain))
    }

    /// A failed lowering under value-id acceleration retries the whole
    /// sub-plan with acceleration disabled before giving up.
    fn fallback(
        &self,
        root: &Arc<PlanNode>,
        use_value_id: bool,
    ) -> TranslateResult<Option<OperatorChain>> {
        if use_value_id {
            self.try_translate_sub_plan(root, false)
        } else {
            Ok(None)
        }
    }

    fn node_is_fusable(&self, node: &Arc<PlanNode>, is_root: bool, allow_aggregate: bool) -> bool {
        match &**node {
            PlanNode::StoredTableScan { .. } => false,
            PlanNode::Validate { .. } => self.config.fuse_validate,
            PlanNode::Limit { .. } => is_root,
            PlanNode::Union { .. } => true,
            PlanNode::Predicate { predicate, .. } => {
                if let PlanExpression::Predicate {
                    condition,
                    arguments,
                } = predicate
                {
                    if matches!(
                        condition,
                        PredicateCondition::In
                            | PredicateCondition::Like
                            | PredicateCondition::NotLike
                    ) {
                        return false;
                    }
                    // The column side is not inspected; only comparison
                    // values need to be expressible.
                    arguments.iter().skip(1).all(expression_is_fusable)
                } else {
                    expression_is_fusable(predicate)
                }
            }
            PlanNode::Projection { expressions, .. } => expressions
                .iter()
                .all(|expression| {
                    matches!(expression, PlanExpression::Column(_))
                        || expression_is_fusable(expression)
                }),
            PlanNode::Aggregate {
                group_by,
                aggregates,
                ..
            } => {
                if !allow_aggregate {
                    return false;
                }
                let supported = aggregates.iter().all(|expression| match expression {
                    PlanExpression::Aggregate {
                        argument, distinct, ..
                    } => {
                        !*distinct
                            && argument
                                .as_deref()
                                .is_none_or(expression_is_fusable)
                    }
                    _ => false,
                });
                supported && group_by.iter().all(expression_is_fusable)
            }
        }
    }

    /// Lowers a plan expression onto runtime-tuple slots. `use_value_id`
    /// puts column/literal/parameter leaves into value-id mode; it is set by
    /// an enclosing accelerated predicate. Returns `None` when the
    /// expression cannot run in the fused chain.
    fn lower(
        &self,
        expression: &PlanExpression,
        read_tuples: &mut ReadTuples,
        input: &InputInfo,
        use_value_id: bool,
        can_be_bool_column: bool,
        value_id_enabled: bool,
    ) -> TranslateResult<Option<Expression>> {
        match expression {
            PlanExpression::Column(column_id) => {
                let data_type = if can_be_bool_column {
                    DataType::Bool
                } else {
                    input.table.column_data_type(*column_id)
                };
                let slot = read_tuples.add_input_column(
                    data_type,
                    input.table.column_is_nullable(*column_id),
                    *column_id,
                    use_value_id,
                );
                Ok(Some(Expression::column(slot)))
            }
            PlanExpression::Value(value) => {
                Ok(Some(Expression::column(read_tuples.add_literal(value, use_value_id))))
            }
            PlanExpression::Parameter {
                parameter_id,
                data_type,
                nullable,
            } => Ok(Some(Expression::column(read_tuples.add_parameter(
                *data_type,
                *nullable,
                *parameter_id,
                use_value_id,
            )))),
            PlanExpression::Predicate {
                condition,
                arguments,
            } => self.lower_predicate(
                *condition,
                arguments,
                read_tuples,
                input,
                value_id_enabled,
            ),
            PlanExpression::Arithmetic {
                operator,
                left,
                right,
            } => {
                let Some(lowered_left) =
                    self.lower(left, read_tuples, input, false, false, value_id_enabled)?
                else {
                    return Ok(None);
                };
                let Some(lowered_right) =
                    self.lower(right, read_tuples, input, false, false, value_id_enabled)?
                else {
                    return Ok(None);
                };
                let kind = match operator {
                    ArithmeticOperator::Addition => ExpressionKind::Addition,
                    ArithmeticOperator::Subtraction => ExpressionKind::Subtraction,
                    ArithmeticOperator::Multiplication => ExpressionKind::Multiplication,
                    ArithmeticOperator::Division => ExpressionKind::Division,
                    ArithmeticOperator::Modulo => ExpressionKind::Modulo,
                };
                Ok(Some(Expression::binary(
                    lowered_left,
                    kind,
                    lowered_right,
                    read_tuples.add_temporary_slot(),
                )?))
            }
            PlanExpression::Logical {
                operator,
                left,
                right,
            } => {
                let Some(lowered_left) =
                    self.lower(left, read_tuples, input, false, false, value_id_enabled)?
                else {
                    return Ok(None);
                };
                let Some(lowered_right) =
                    self.lower(right, read_tuples, input, false, false, value_id_enabled)?
                else {
                    return Ok(None);
                };
                let kind = match operator {
                    LogicalOperator::And => ExpressionKind::And,
                    LogicalOperator::Or => ExpressionKind::Or,
                };
                Ok(Some(Expression::binary(
                    lowered_left,
                    kind,
                    lowered_right,
                    read_tuples.add_temporary_slot(),
                )?))
            }
            PlanExpression::Not(argument) => {
                let Some(lowered) =
                    self.lower(argument, read_tuples, input, false, false, value_id_enabled)?
                else {
                    return Ok(None);
                };
                Ok(Some(Expression::unary(
                    ExpressionKind::Not,
                    lowered,
                    read_tuples.add_temporary_slot(),
                )?))
            }
            // CAST and nested aggregates never run inside the chain.
            PlanExpression::Cast { .. } | PlanExpression::Aggregate { .. } => Ok(None),
        }
    }

    fn lower_predicate(
        &self,
        condition: PredicateCondition,
        arguments: &[PlanExpression],
        read_tuples: &mut ReadTuples,
        input: &InputInfo,
        value_id_enabled: bool,
    ) -> TranslateResult<Option<Expression>> {
        // `<boolean expression> <> 0` is an artifact of SQL translation;
        // collapse it to its left side, read as a boolean when it is a bare
        // column.
        if condition == PredicateCondition::NotEquals
            && arguments.len() == 2
            && let PlanExpression::Value(value) = &arguments[1]
            && matches!(value, Value::Int32(0))
        {
            return self.lower(&arguments[0], read_tuples, input, false, true, value_id_enabled);
        }

        match condition {
            PredicateCondition::In | PredicateCondition::Like | PredicateCondition::NotLike => {
                Ok(None)
            }
            PredicateCondition::IsNull | PredicateCondition::IsNotNull => {
                let Some(lowered) = self.lower(
                    &arguments[0],
                    read_tuples,
                    input,
                    false,
                    false,
                    value_id_enabled,
                )?
                else {
                    return Ok(None);
                };
                let kind = if condition == PredicateCondition::IsNull {
                    ExpressionKind::IsNull
                } else {
                    ExpressionKind::IsNotNull
                };
                Ok(Some(Expression::unary(
                    kind,
                    lowered,
                    read_tuples.add_temporary_slot(),
                )?))
            }
            PredicateCondition::Between => {
                let accelerate =
                    value_id_enabled && self.can_accelerate(condition, arguments, input);
                let Some(probe) = self.lower(
                    &arguments[0],
                    read_tuples,
                    input,
                    accelerate,
                    false,
                    value_id_enabled,
                )?
                else {
                    return Ok(None);
                };
                let Some(low) = self.lower(
                    &arguments[1],
                    read_tuples,
                    input,
                    accelerate,
                    false,
                    value_id_enabled,
                )?
                else {
                    return Ok(None);
                };
                let Some(high) = self.lower(
                    &arguments[2],
                    read_tuples,
                    input,
                    accelerate,
                    false,
                    value_id_enabled,
                )?
                else {
                    return Ok(None);
                };
                // The tree stays binary: lo <= x AND x <= hi, each bound
                // registered for value-id precomputation on its own.
                let mut lower_check = Expression::binary(
                    probe.clone(),
                    ExpressionKind::GreaterThanEquals,
                    low,
                    read_tuples.add_temporary_slot(),
                )?;
                if accelerate {
                    read_tuples.register_value_id_predicate(&mut lower_check);
                }
                let mut upper_check = Expression::binary(
                    probe,
                    ExpressionKind::LessThanEquals,
                    high,
                    read_tuples.add_temporary_slot(),
                )?;
                if accelerate {
                    read_tuples.register_value_id_predicate(&mut upper_check);
                }
                Ok(Some(Expression::binary(
                    lower_check,
                    ExpressionKind::And,
                    upper_check,
                    read_tuples.add_temporary_slot(),
                )?))
            }
            condition if condition.is_binary_comparison() => {
                let accelerate =
                    value_id_enabled && self.can_accelerate(condition, arguments, input);
                // Accelerated predicates are normalised to column-on-left so
                // the per-chunk precomputation sees one canonical shape.
                let (left_argument, right_argument, condition) = if accelerate
                    && !matches!(arguments[0], PlanExpression::Column(_))
                {
                    (&arguments[1], &arguments[0], condition.mirrored())
                } else {
                    (&arguments[0], &arguments[1], condition)
                };
                let Some(lowered_left) = self.lower(
                    left_argument,
                    read_tuples,
                    input,
                    accelerate,
                    false,
                    value_id_enabled,
                )?
                else {
                    return Ok(None);
                };
                let Some(lowered_right) = self.lower(
                    right_argument,
                    read_tuples,
                    input,
                    accelerate,
                    false,
                    value_id_enabled,
                )?
                else {
                    return Ok(None);
                };
                // Strings compare only with strings inside the chain.
                let left_is_string = lowered_left.result().data_type == DataType::String;
                let right_is_string = lowered_right.result().data_type == DataType::String;
                if left_is_string != right_is_string {
                    return Ok(None);
                }
                let kind = condition_to_kind(condition);
                let mut lowered = Expression::binary(
                    lowered_left,
                    kind,
                    lowered_right,
                    read_tuples.add_temporary_slot(),
                )?;
                if accelerate {
                    read_tuples.register_value_id_predicate(&mut lowered);
                }
                Ok(Some(lowered))
            }
            _ => Ok(None),
        }
    }

    /// A predicate runs in the value-id domain iff its column side is a
    /// dictionary-encoded column of a stored table and the other side is a
    /// literal or external parameter.
    fn can_accelerate(
        &self,
        condition: PredicateCondition,
        arguments: &[PlanExpression],
        input: &InputInfo,
    ) -> bool {
        if !input.is_stored_table_scan {
            return false;
        }
        if !condition.is_binary_comparison() && condition != PredicateCondition::Between {
            return false;
        }
        let mut column: Option<ColumnId> = None;
        for argument in arguments {
            match argument {
                PlanExpression::Value(_) | PlanExpression::Parameter { .. } => {}
                PlanExpression::Column(column_id) => {
                    if column.is_some() {
                        return false;
                    }
                    column = Some(*column_id);
                }
                _ => return false,
            }
        }
        let Some(column_id) = column else { return false };
        // A range probe only works when the probed side is the column.
        if condition == PredicateCondition::Between
            && !matches!(arguments[0], PlanExpression::Column(_))
        {
            return false;
        }
        input.table.chunk_count() > 0
            && matches!(
                &**input.table.get_chunk(0).get_segment(column_id),
                Segment::Dictionary(_)
            )
    }
}

fn condition_to_kind(condition: PredicateCondition) -> ExpressionKind {
    match condition {
        PredicateCondition::Equals => ExpressionKind::Equals,
        PredicateCondition::NotEquals => ExpressionKind::NotEquals,
        PredicateCondition::LessThan => ExpressionKind::LessThan,
        PredicateCondition::LessThanEquals => ExpressionKind::LessThanEquals,
        PredicateCondition::GreaterThan => ExpressionKind::GreaterThan,
        PredicateCondition::GreaterThanEquals => ExpressionKind::GreaterThanEquals,
        other => unreachable!("{other:?} is not a binary comparison"),
    }
}

fn expression_is_fusable(expression: &PlanExpression) -> bool {
    match expression {
        PlanExpression::Cast { .. } | PlanExpression::Aggregate { .. } => false,
        PlanExpression::Predicate {
            condition,
            arguments,
        } => {
            !matches!(
                condition,
                PredicateCondition::In | PredicateCondition::Like | PredicateCondition::NotLike
            ) && arguments.iter().all(expression_is_fusable)
        }
        PlanExpression::Arithmetic { left, right, .. }
        | PlanExpression::Logical { left, right, .. } => {
            expression_is_fusable(left) && expression_is_fusable(right)
        }
        PlanExpression::Not(argument) => expression_is_fusable(argument),
        PlanExpression::Column(_)
        | PlanExpression::Value(_)
        | PlanExpression::Parameter { .. } => true,
    }
}

/// Collapses consecutive predicate and union nodes below `node` into one
/// boolean expression: conjunction along a predicate chain, disjunction
/// across union branches.
fn boolean_expression(node: &Arc<PlanNode>, input_node: &Arc<PlanNode>) -> Option<PlanExpression> {
    if Arc::ptr_eq(node, input_node) {
        return None;
    }
    match &**node {
        PlanNode::Predicate { input, predicate } => {
            match boolean_expression(input, input_node) {
                Some(below) => Some(PlanExpression::and(below, predicate.clone())),
                None => Some(predicate.clone()),
            }
        }
        PlanNode::Union { left, right } => Some(PlanExpression::or(
            boolean_expression(left, input_node)?,
            boolean_expression(right, input_node)?,
        )),
        _ => None,
    }
}

fn resolve_input_info(input_node: &Arc<PlanNode>) -> Option<InputInfo> {
    let mut current = input_node;
    loop {
        match &**current {
            PlanNode::StoredTableScan { table } => {
                let is_scan = Arc::ptr_eq(current, input_node);
                return Some(InputInfo {
                    table: Arc::clone(table),
                    is_stored_table_scan: is_scan,
                    table_kind: if is_scan {
                        TableKind::Data
                    } else {
                        TableKind::References
                    },
                });
            }
            PlanNode::Validate { input }
            | PlanNode::Predicate { input, .. }
            | PlanNode::Limit { input, .. } => current = input,
            PlanNode::Union { left, .. } => current = left,
            // Schema-changing nodes hide the stored schema the chain needs
            // to type its column reads.
            PlanNode::Projection { .. } | PlanNode::Aggregate { .. } => return None,
        }
    }
}

/// The named output expressions of the sub-plan root.
fn output_expressions(node: &Arc<PlanNode>, table: &Table) -> Vec<(String, PlanExpression)> {
    match &**node {
        PlanNode::Projection { expressions, .. } => expressions
            .iter()
            .map(|expression| (expression.name(table), expression.clone()))
            .collect(),
        PlanNode::Validate { input }
        | PlanNode::Predicate { input, .. }
        | PlanNode::Limit { input, .. } => output_expressions(input, table),
        PlanNode::Union { left, .. } => output_expressions(left, table),
        _ => (0..table.column_count())
            .map(|column_id| {
                (
                    table.column_name(column_id).to_string(),
                    PlanExpression::Column(column_id),
                )
            })
            .collect(),
    }
}
