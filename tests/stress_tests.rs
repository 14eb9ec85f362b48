mod common;

use common::*;
use shearwater::chain::AggregateFunction;
use shearwater::plan::{ArithmeticOperator, PlanExpression, PlanNode, PredicateCondition};
use shearwater::types::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

#[test]
fn fused_filters_match_a_naive_reference() {
    let table = shared_numbers_table();
    let input = table.materialize_column(0);

    for bound in [-1200i64, -500, -1, 0, 1, 499, 1200] {
        let scan = PlanNode::scan(Arc::clone(&table));
        let predicate = PlanNode::predicate(
            scan,
            PlanExpression::comparison(
                PlanExpression::column(0),
                PredicateCondition::GreaterThanEquals,
                PlanExpression::value(bound),
            ),
        );
        let root = PlanNode::projection(predicate, vec![PlanExpression::column(0)]);
        let fused = int_column(&execute(&translate(&root), &table), 0);

        let expected: Vec<i64> = input
            .iter()
            .filter_map(|value| match value {
                Value::Int64(v) if *v >= bound => Some(*v),
                _ => None,
            })
            .collect();
        assert_eq!(fused, expected, "bound {bound}");
    }
}

#[test]
fn fused_aggregation_matches_a_naive_reference() {
    let table = shared_numbers_table();
    let input = table.materialize_column(0);

    // SELECT a % 10, SUM(a), COUNT(*) GROUP BY a % 10
    let group_expression = PlanExpression::arithmetic(
        PlanExpression::column(0),
        ArithmeticOperator::Modulo,
        PlanExpression::value(10i64),
    );
    let root = PlanNode::aggregate(
        PlanNode::scan(Arc::clone(&table)),
        vec![group_expression],
        vec![
            PlanExpression::aggregate(AggregateFunction::Sum, PlanExpression::column(0)),
            PlanExpression::count_star(),
        ],
    );
    let output = execute(&translate(&root), &table);

    let mut expected: BTreeMap<i64, (i64, i64)> = BTreeMap::new();
    for value in &input {
        let Value::Int64(v) = value else { unreachable!() };
        let entry = expected.entry(v % 10).or_insert((0, 0));
        entry.0 += v;
        entry.1 += 1;
    }

    let keys = int_column(&output, 0);
    let sums = int_column(&output, 1);
    let counts = int_column(&output, 2);
    assert_eq!(keys.len(), expected.len());
    for ((key, sum), count) in keys.iter().zip(&sums).zip(&counts) {
        let reference = expected[key];
        assert_eq!((*sum, *count), reference, "group {key}");
    }
}
