mod common;

use common::*;
use shearwater::chain::ChainOperator;
use shearwater::config::CancellationToken;
use shearwater::error::{ExecutionError, TranslateError};
use shearwater::plan::{ArithmeticOperator, PlanExpression, PlanNode, PredicateCondition, Translator};
use shearwater::storage::{Chunk, ColumnDefinition, DictionarySegment, Segment, Snapshot, Table, TableKind, ValueSegment};
use shearwater::types::{DataType, Value};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

fn select_where_a_greater_equals(table: &Arc<Table>, bound: i64) -> Arc<PlanNode> {
    let scan = PlanNode::scan(Arc::clone(table));
    let predicate = PlanNode::predicate(
        Arc::clone(&scan),
        PlanExpression::comparison(
            PlanExpression::column(0),
            PredicateCondition::GreaterThanEquals,
            PlanExpression::value(bound),
        ),
    );
    PlanNode::projection(predicate, vec![PlanExpression::column(0)])
}

#[test]
fn scan_and_filter_keeps_qualifying_rows_in_order() {
    let table = int64_table(&[&[1, 2, 3, 4, 5]]);
    let chain = translate(&select_where_a_greater_equals(&table, 3));
    let output = execute(&chain, &table);
    assert_eq!(int_column(&output, 0), vec![3, 4, 5]);
}

#[test]
fn filter_spans_chunks_in_chunk_order() {
    let table = int64_table(&[&[1, 2, 3], &[4, 5], &[], &[6]]);
    let chain = translate(&select_where_a_greater_equals(&table, 2));
    let output = execute(&chain, &table);
    assert_eq!(int_column(&output, 0), vec![2, 3, 4, 5, 6]);
}

#[test]
fn computed_projection_propagates_nulls() {
    let table = nullable_int64_table(&[&[Some(1), None, Some(3)]]);
    let scan = PlanNode::scan(Arc::clone(&table));
    // A trivially true filter keeps the sub-plan big enough to fuse without
    // dropping any rows.
    let predicate = PlanNode::predicate(
        Arc::clone(&scan),
        PlanExpression::comparison(
            PlanExpression::value(1i64),
            PredicateCondition::Equals,
            PlanExpression::value(1i64),
        ),
    );
    let root = PlanNode::projection(
        predicate,
        vec![PlanExpression::arithmetic(
            PlanExpression::column(0),
            ArithmeticOperator::Addition,
            PlanExpression::value(1i64),
        )],
    );
    let output = execute(&translate(&root), &table);
    assert_eq!(
        column(&output, 0),
        vec![Value::Int64(2), Value::Null, Value::Int64(4)]
    );
}

#[test]
fn limit_truncates_the_result() {
    let table = int64_table(&[&[1, 2, 3, 4, 5]]);
    let scan = PlanNode::scan(Arc::clone(&table));
    let projection = PlanNode::projection(scan, vec![PlanExpression::column(0)]);
    let root = PlanNode::limit(projection, PlanExpression::value(2i64));
    let output = execute(&translate(&root), &table);
    assert_eq!(int_column(&output, 0), vec![1, 2]);
}

#[test]
fn limit_zero_emits_nothing() {
    let table = int64_table(&[&[1, 2, 3]]);
    let scan = PlanNode::scan(Arc::clone(&table));
    let projection = PlanNode::projection(scan, vec![PlanExpression::column(0)]);
    let root = PlanNode::limit(projection, PlanExpression::value(0i64));
    let output = execute(&translate(&root), &table);
    assert_eq!(output.row_count(), 0);
}

#[test]
fn limit_stops_consuming_chunks_once_satisfied() {
    let table = int64_table(&[&[1, 2], &[3, 4], &[5, 6]]);
    let scan = PlanNode::scan(Arc::clone(&table));
    let projection = PlanNode::projection(scan, vec![PlanExpression::column(0)]);
    let root = PlanNode::limit(projection, PlanExpression::value(3i64));
    let output = execute(&translate(&root), &table);
    assert_eq!(int_column(&output, 0), vec![1, 2, 3]);
}

#[test]
fn negative_limit_is_an_invalid_value() {
    let table = int64_table(&[&[1]]);
    let scan = PlanNode::scan(Arc::clone(&table));
    let projection = PlanNode::projection(scan, vec![PlanExpression::column(0)]);
    let root = PlanNode::limit(projection, PlanExpression::value(-1i64));
    let chain = translate(&root);
    let result = chain.execute(&table, &HashMap::new(), None);
    assert!(matches!(result, Err(ExecutionError::InvalidValue(_))));
}

#[test]
fn empty_table_produces_empty_output() {
    let table = int64_table(&[]);
    let chain = translate(&select_where_a_greater_equals(&table, 0));
    let output = execute(&chain, &table);
    assert_eq!(output.row_count(), 0);
}

#[test]
fn execution_is_deterministic() {
    let table = int64_table(&[&[5, 1, 4, 2, 3], &[9, 7, 8]]);
    let chain = translate(&select_where_a_greater_equals(&table, 4));
    let first = execute(&chain, &table);
    let second = execute(&chain, &table);
    assert_eq!(column(&first, 0), column(&second, 0));
}

#[test]
fn retranslating_the_same_plan_is_functionally_equivalent() {
    let table = int64_table(&[&[1, 2, 3, 4]]);
    let root = select_where_a_greater_equals(&table, 2);
    let first = translate(&root);
    let second = translate(&root);
    assert_eq!(
        column(&execute(&first, &table), 0),
        column(&execute(&second, &table), 0)
    );
}

#[test]
fn cloned_chain_is_functionally_equivalent() {
    let table = int64_table(&[&[1, 2, 3, 4]]);
    let chain = translate(&select_where_a_greater_equals(&table, 2));
    let copy = chain.clone();
    assert_eq!(
        column(&execute(&chain, &table), 0),
        column(&execute(&copy, &table), 0)
    );
}

#[test]
fn parameters_bind_at_execution_time() {
    let table = int64_table(&[&[1, 2, 3, 4, 5]]);
    let scan = PlanNode::scan(Arc::clone(&table));
    let predicate = PlanNode::predicate(
        Arc::clone(&scan),
        PlanExpression::comparison(
            PlanExpression::column(0),
            PredicateCondition::GreaterThanEquals,
            PlanExpression::parameter(0, DataType::Int64, false),
        ),
    );
    let root = PlanNode::projection(predicate, vec![PlanExpression::column(0)]);
    let chain = translate(&root);

    let mut parameters = HashMap::new();
    parameters.insert(0usize, Value::Int64(4));
    let output = chain.execute(&table, &parameters, None).unwrap();
    assert_eq!(int_column(&output, 0), vec![4, 5]);

    // The same chain re-executes under a different binding.
    parameters.insert(0usize, Value::Int64(2));
    let output = chain.execute(&table, &parameters, None).unwrap();
    assert_eq!(int_column(&output, 0), vec![2, 3, 4, 5]);
}

#[test]
fn missing_parameter_is_reported() {
    let table = int64_table(&[&[1]]);
    let scan = PlanNode::scan(Arc::clone(&table));
    let predicate = PlanNode::predicate(
        Arc::clone(&scan),
        PlanExpression::comparison(
            PlanExpression::column(0),
            PredicateCondition::Equals,
            PlanExpression::parameter(7, DataType::Int64, false),
        ),
    );
    let root = PlanNode::projection(predicate, vec![PlanExpression::column(0)]);
    let chain = translate(&root);
    let result = chain.execute(&table, &HashMap::new(), None);
    assert_eq!(result.unwrap_err(), ExecutionError::MissingParameter(7));
}

#[test]
fn cancellation_aborts_before_the_next_chunk() {
    let table = int64_table(&[&[1, 2, 3]]);
    let chain = translate(&select_where_a_greater_equals(&table, 1));
    let token = CancellationToken::new();
    token.cancel();
    let result = chain.execute_cancellable(&table, &HashMap::new(), None, &token);
    assert_eq!(result.unwrap_err(), ExecutionError::Cancelled);
}

#[test]
fn string_against_number_comparison_fails_to_build() {
    let table = int64_table(&[&[1]]);
    let scan = PlanNode::scan(Arc::clone(&table));
    let predicate = PlanNode::predicate(
        Arc::clone(&scan),
        PlanExpression::comparison(
            PlanExpression::arithmetic(
                PlanExpression::column(0),
                ArithmeticOperator::Addition,
                PlanExpression::value("oops"),
            ),
            PredicateCondition::Equals,
            PlanExpression::value(1i64),
        ),
    );
    let root = PlanNode::projection(predicate, vec![PlanExpression::column(0)]);
    let result = Translator::default().translate(&root);
    assert!(matches!(result, Err(TranslateError::TypeMismatch { .. })));
}

#[test]
fn between_filters_both_bounds() {
    let table = int64_table(&[&[1, 2, 3, 4, 5, 6]]);
    let scan = PlanNode::scan(Arc::clone(&table));
    let predicate = PlanNode::predicate(
        Arc::clone(&scan),
        PlanExpression::between(
            PlanExpression::column(0),
            PlanExpression::value(2i64),
            PlanExpression::value(4i64),
        ),
    );
    let root = PlanNode::projection(predicate, vec![PlanExpression::column(0)]);
    let output = execute(&translate(&root), &table);
    assert_eq!(int_column(&output, 0), vec![2, 3, 4]);
}

#[test]
fn disjunction_of_predicate_branches_unions_rows() {
    let table = int64_table(&[&[1, 2, 3, 4, 5]]);
    let scan = PlanNode::scan(Arc::clone(&table));
    let below = PlanNode::predicate(
        Arc::clone(&scan),
        PlanExpression::comparison(
            PlanExpression::column(0),
            PredicateCondition::LessThan,
            PlanExpression::value(2i64),
        ),
    );
    let above = PlanNode::predicate(
        Arc::clone(&scan),
        PlanExpression::comparison(
            PlanExpression::column(0),
            PredicateCondition::GreaterThan,
            PlanExpression::value(4i64),
        ),
    );
    let union = PlanNode::union(below, above);
    let root = PlanNode::projection(union, vec![PlanExpression::column(0)]);
    let output = execute(&translate(&root), &table);
    assert_eq!(int_column(&output, 0), vec![1, 5]);
}

#[test]
fn output_chunks_flush_at_the_target_size() {
    let mut table = Table::new(
        vec![ColumnDefinition::new("a", DataType::Int64, false)],
        TableKind::Data,
    );
    let values: Vec<Value> = (1..=5).map(Value::Int64).collect();
    table.add_chunk(Chunk::new(vec![Arc::new(Segment::Value(
        ValueSegment::from_values(DataType::Int64, &values),
    ))]));
    let table = Arc::new(table.with_max_chunk_size(2));

    let scan = PlanNode::scan(Arc::clone(&table));
    let predicate = PlanNode::predicate(
        Arc::clone(&scan),
        PlanExpression::comparison(
            PlanExpression::column(0),
            PredicateCondition::GreaterThan,
            PlanExpression::value(0i64),
        ),
    );
    let root = PlanNode::projection(
        predicate,
        vec![PlanExpression::arithmetic(
            PlanExpression::column(0),
            ArithmeticOperator::Multiplication,
            PlanExpression::value(10i64),
        )],
    );
    let output = execute(&translate(&root), &table);
    assert_eq!(output.chunk_count(), 3);
    assert_eq!(int_column(&output, 0), vec![10, 20, 30, 40, 50]);
}

#[test]
fn specialized_row_loop_is_indistinguishable_from_the_interpreter() {
    let table = int64_table(&[&[1, 2, 3, 4], &[5, 6]]);
    let root = select_where_a_greater_equals(&table, 3);
    let interpreted = translate(&root);

    let mut specialized = interpreted.clone();
    let invocations = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&invocations);
    specialized.set_specialized_loop(Arc::new(move |read_tuples, operators, context| {
        counter.fetch_add(1, Ordering::Relaxed);
        read_tuples.execute(operators, context);
    }));

    assert_eq!(
        column(&execute(&interpreted, &table), 0),
        column(&execute(&specialized, &table), 0)
    );
    // Homogeneous encodings keep every chunk on the fast path.
    assert_eq!(invocations.load(Ordering::Relaxed), 2);
}

#[test]
fn encoding_change_falls_back_to_per_row_dispatch() {
    // Chunk 0 is value-encoded, chunk 1 dictionary-encoded: the second chunk
    // must leave the fast path but still produce correct rows.
    let mut table = Table::new(
        vec![ColumnDefinition::new("a", DataType::Int64, false)],
        TableKind::Data,
    );
    table.add_chunk(Chunk::new(vec![Arc::new(Segment::Value(
        ValueSegment::from_values(
            DataType::Int64,
            &[Value::Int64(1), Value::Int64(2)],
        ),
    ))]));
    table.add_chunk(Chunk::new(vec![Arc::new(Segment::Dictionary(
        DictionarySegment::from_values(
            DataType::Int64,
            &[Value::Int64(3), Value::Int64(4)],
        ),
    ))]));
    let table = Arc::new(table);

    let root = select_where_a_greater_equals(&table, 2);
    let mut chain = translate(&root);
    let fast_path_chunks = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&fast_path_chunks);
    chain.set_specialized_loop(Arc::new(move |read_tuples, operators, context| {
        counter.fetch_add(1, Ordering::Relaxed);
        read_tuples.execute(operators, context);
    }));

    let output = execute(&chain, &table);
    assert_eq!(int_column(&output, 0), vec![2, 3, 4]);
    // Only the first chunk ran specialised; the mismatching one interpreted.
    assert_eq!(fast_path_chunks.load(Ordering::Relaxed), 1);
}

#[test]
fn validating_chain_requires_a_snapshot() {
    let table = mvcc_int64_table(&[(1, 1, u32::MAX, 0)]);
    let scan = PlanNode::scan(Arc::clone(&table));
    let validate = PlanNode::validate(scan);
    let root = PlanNode::projection(validate, vec![PlanExpression::column(0)]);
    let chain = translate(&root);
    assert!(matches!(
        chain.execute(&table, &HashMap::new(), None),
        Err(ExecutionError::InvalidValue(_))
    ));
    assert!(
        chain
            .execute(&table, &HashMap::new(), Some(Snapshot::new(1, 5)))
            .is_ok()
    );
}

#[test]
fn chain_description_names_every_operator() {
    let table = int64_table(&[&[1, 2, 3]]);
    let chain = translate(&select_where_a_greater_equals(&table, 2));
    let description = format!("{chain}");
    assert!(description.contains("[ReadTuples]"));
    assert!(description.contains("[Filter]"));
    assert!(description.contains("[WriteOffsets]"));
}

#[test]
fn null_predicates_partition_the_rows() {
    let table = nullable_int64_table(&[&[Some(1), None, Some(3), None]]);
    let scan = PlanNode::scan(Arc::clone(&table));

    let not_null = PlanNode::projection(
        PlanNode::predicate(
            Arc::clone(&scan),
            PlanExpression::is_not_null(PlanExpression::column(0)),
        ),
        vec![PlanExpression::column(0)],
    );
    let output = execute(&translate(&not_null), &table);
    assert_eq!(column(&output, 0), vec![Value::Int64(1), Value::Int64(3)]);

    let null_only = PlanNode::projection(
        PlanNode::predicate(
            Arc::clone(&scan),
            PlanExpression::is_null(PlanExpression::column(0)),
        ),
        vec![PlanExpression::column(0)],
    );
    let output = execute(&translate(&null_only), &table);
    assert_eq!(column(&output, 0), vec![Value::Null, Value::Null]);
}

#[test]
fn negated_filter_drops_null_outcomes_too() {
    // NOT (a < 3) keeps neither rows below 3 nor null rows.
    let table = nullable_int64_table(&[&[Some(1), None, Some(3), Some(5)]]);
    let scan = PlanNode::scan(Arc::clone(&table));
    let predicate = PlanNode::predicate(
        Arc::clone(&scan),
        PlanExpression::not(PlanExpression::comparison(
            PlanExpression::column(0),
            PredicateCondition::LessThan,
            PlanExpression::value(3i64),
        )),
    );
    let root = PlanNode::projection(predicate, vec![PlanExpression::column(0)]);
    let output = execute(&translate(&root), &table);
    assert_eq!(column(&output, 0), vec![Value::Int64(3), Value::Int64(5)]);
}

#[test]
fn materialised_boolean_filter_reads_the_column_directly() {
    // `flag <> 0` over an Int32 column is the SQL translator's way of
    // filtering on a materialised boolean; the chain reads it as one.
    let mut raw = Table::new(
        vec![ColumnDefinition::new("flag", DataType::Int32, false)],
        TableKind::Data,
    );
    raw.add_chunk(Chunk::new(vec![Arc::new(Segment::Value(
        ValueSegment::from_values(
            DataType::Int32,
            &[
                Value::Int32(0),
                Value::Int32(1),
                Value::Int32(0),
                Value::Int32(1),
            ],
        ),
    ))]));
    let table = Arc::new(raw);

    let scan = PlanNode::scan(Arc::clone(&table));
    let predicate = PlanNode::predicate(
        Arc::clone(&scan),
        PlanExpression::comparison(
            PlanExpression::column(0),
            PredicateCondition::NotEquals,
            PlanExpression::value(0i32),
        ),
    );
    let root = PlanNode::projection(predicate, vec![PlanExpression::column(0)]);
    let output = execute(&translate(&root), &table);
    assert_eq!(column(&output, 0), vec![Value::Int32(1), Value::Int32(1)]);
}

#[test]
fn direct_projection_emits_reference_output() {
    let table = int64_table(&[&[1, 2, 3]]);
    let chain = translate(&select_where_a_greater_equals(&table, 2));
    assert!(matches!(
        chain.operators().last(),
        Some(ChainOperator::WriteOffsets(_))
    ));
    let output = execute(&chain, &table);
    assert_eq!(output.kind(), TableKind::References);
    assert_eq!(int_column(&output, 0), vec![2, 3]);
}
