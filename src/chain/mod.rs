pub mod aggregate;
pub mod operators;
pub mod read_tuples;
pub mod write;

pub use aggregate::{AggregateColumn, AggregateFunction, AggregateOperator, GroupByColumn};
pub use operators::{ChainOperator, Compute, Filter, ReadValue, Validate};
pub use read_tuples::ReadTuples;
pub use write::{OutputColumn, ReferenceOutputColumn, WriteOffsets, WriteTuples};

use crate::config::{CancellationToken, EngineConfig};
use crate::error::{ExecutionError, ExecutionResult};
use crate::runtime::context::RuntimeContext;
use crate::storage::mvcc::Snapshot;
use crate::storage::table::Table;
use crate::types::{ParameterId, Value};
use hashbrown::{HashMap, HashSet};
use rand::Rng;
use rand::distributions::Alphanumeric;
use std::collections::HashMap as StdHashMap;
use std::fmt;
use std::sync::Arc;

/// Optional substitute for the interpreted row loop. A specialiser installed
/// here must be observationally identical to `ReadTuples::execute`; it only
/// runs for chunks on the same-type fast path.
pub type SpecializedRowLoop =
    Arc<dyn Fn(&ReadTuples, &[ChainOperator], &mut RuntimeContext) + Send + Sync>;

/// A fused operator chain, immutable once built. Sharing across queries goes
/// through `clone()`; every execution owns a fresh context.
#[derive(Clone)]
pub struct OperatorChain {
    id: String,
    read_tuples: ReadTuples,
    operators: Vec<ChainOperator>,
    config: EngineConfig,
    specialized_loop: Option<SpecializedRowLoop>,
}

impl OperatorChain {
    pub(crate) fn new(
        read_tuples: ReadTuples,
        operators: Vec<ChainOperator>,
        config: EngineConfig,
    ) -> Self {
        debug_assert!(
            operators.last().is_some_and(ChainOperator::is_terminal),
            "chain must end in a terminal operator"
        );
        let mut chain = OperatorChain {
            id: generate_chain_id(),
            read_tuples,
            operators,
            config,
            specialized_loop: None,
        };
        chain.insert_loads();
        chain
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn read_tuples(&self) -> &ReadTuples {
        &self.read_tuples
    }

    pub fn operators(&self) -> &[ChainOperator] {
        &self.operators
    }

    pub fn set_specialized_loop(&mut self, row_loop: SpecializedRowLoop) {
        self.specialized_loop = Some(row_loop);
    }

    pub fn execute(
        &self,
        in_table: &Arc<Table>,
        parameters: &StdHashMap<ParameterId, Value>,
        snapshot: Option<Snapshot>,
    ) -> ExecutionResult<Table> {
        self.execute_cancellable(in_table, parameters, snapshot, &CancellationToken::new())
    }

    pub fn execute_cancellable(
        &self,
        in_table: &Arc<Table>,
        parameters: &StdHashMap<ParameterId, Value>,
        snapshot: Option<Snapshot>,
        token: &CancellationToken,
    ) -> ExecutionResult<Table> {
        if self.read_tuples.has_validate() && snapshot.is_none() {
            return Err(ExecutionError::InvalidValue(
                "a validating chain needs a snapshot".to_string(),
            ));
        }
        let parameter_values = self.resolve_parameters(parameters)?;

        let mut context = RuntimeContext::new(snapshot);
        let parameters_by_id: HashMap<ParameterId, Value> =
            parameters.iter().map(|(id, value)| (*id, value.clone())).collect();
        self.read_tuples
            .before_query(&parameter_values, &parameters_by_id, &mut context)?;
        if let Some(ChainOperator::WriteTuples(write)) = self.operators.last() {
            write.before_query(in_table.max_chunk_size(), &mut context);
        }

        for chunk_id in 0..in_table.chunk_count() {
            if context.limit_rows == 0 {
                break;
            }
            if token.is_cancelled() {
                tracing::debug!(chain = %self.id, chunk_id, "execution cancelled");
                return Err(ExecutionError::Cancelled);
            }
            let same_type =
                self.read_tuples
                    .before_chunk(in_table, chunk_id, &parameter_values, &mut context)?;
            if same_type && let Some(row_loop) = &self.specialized_loop {
                row_loop(&self.read_tuples, &self.operators, &mut context);
            } else {
                if !same_type {
                    tracing::warn!(
                        chain = %self.id,
                        chunk_id,
                        "segment encodings changed; running per-row dispatch for this chunk"
                    );
                }
                self.read_tuples.execute(&self.operators, &mut context);
            }
        }
        context.mvcc_guard = None;

        let output = match self.operators.last().expect("chain is never empty") {
            ChainOperator::Aggregate(aggregate) => aggregate.emit(&mut context),
            ChainOperator::WriteTuples(write) => write.after_query(&mut context),
            ChainOperator::WriteOffsets(write) => write.after_query(&mut context, in_table),
            other => panic!("{other} cannot terminate a chain"),
        };
        Ok(output)
    }

    fn resolve_parameters(
        &self,
        parameters: &StdHashMap<ParameterId, Value>,
    ) -> ExecutionResult<Vec<Value>> {
        self.read_tuples
            .input_parameters()
            .iter()
            .map(|parameter| {
                parameters
                    .get(&parameter.parameter_id)
                    .cloned()
                    .ok_or(ExecutionError::MissingParameter(parameter.parameter_id))
            })
            .collect()
    }

    /// Places column loads. A column consumed by a single operator loads at
    /// that operator (attached to the expression for computes and filters,
    /// threaded in as a ReadValue for other consumers), so rows dropped
    /// upstream never touch it. Columns with several consumers (or every
    /// column, when lazy loading is off) load once at the top of the chain.
    fn insert_loads(&mut self) {
        let input_columns = self.read_tuples.input_columns();
        if input_columns.is_empty() {
            return;
        }
        let slot_to_reader: HashMap<usize, usize> = input_columns
            .iter()
            .enumerate()
            .map(|(reader_index, column)| (column.slot.index, reader_index))
            .collect();

        let accessed: Vec<Vec<usize>> = self
            .operators
            .iter()
            .map(|operator| {
                operator
                    .accessed_slots()
                    .into_iter()
                    .filter(|slot| slot_to_reader.contains_key(slot))
                    .collect()
            })
            .collect();
        let mut consumer_counts: HashMap<usize, usize> = HashMap::new();
        for slots in &accessed {
            for slot in slots {
                *consumer_counts.entry(*slot).or_insert(0) += 1;
            }
        }

        let mut rebuilt: Vec<ChainOperator> =
            Vec::with_capacity(self.operators.len() + input_columns.len());
        let mut placed: HashSet<usize> = HashSet::new();

        for (reader_index, column) in input_columns.iter().enumerate() {
            let consumers = consumer_counts.get(&column.slot.index).copied().unwrap_or(0);
            if !self.config.lazy_load || consumers >= 2 {
                rebuilt.push(ChainOperator::ReadValue(ReadValue {
                    reader_index,
                    slot: column.slot,
                }));
                placed.insert(column.slot.index);
            }
        }

        let operators = std::mem::take(&mut self.operators);
        for (mut operator, slots) in operators.into_iter().zip(accessed) {
            for slot in slots {
                if placed.contains(&slot) {
                    continue;
                }
                let reader_index = slot_to_reader[&slot];
                let attached = match &mut operator {
                    ChainOperator::Compute(compute) => {
                        compute.expression.attach_load(slot, reader_index)
                    }
                    ChainOperator::Filter(filter) if filter.slot.index == slot => {
                        filter.load_reader = Some(reader_index);
                        true
                    }
                    _ => false,
                };
                if !attached {
                    rebuilt.push(ChainOperator::ReadValue(ReadValue {
                        reader_index,
                        slot: input_columns[reader_index].slot,
                    }));
                }
                placed.insert(slot);
            }
            rebuilt.push(operator);
        }
        self.operators = rebuilt;
    }
}

impl fmt::Display for OperatorChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.read_tuples)?;
        for operator in &self.operators {
            write!(f, " -> {operator}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for OperatorChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OperatorChain")
            .field("id", &self.id)
            .field("operators", &self.operators)
            .field("config", &self.config)
            .finish()
    }
}

fn generate_chain_id() -> String {
    let mut rng = rand::thread_rng();
    let suffix: String = (&mut rng)
        .sample_iter(&Alphanumeric)
        .take(12)
        .map(char::from)
        .collect();
    format!("chain-{suffix}")
}
