// Licensed to the Apache Software Foundation (ASF) under one
// or more contributor license agreements.  See the NOTICE file
// distributed with this work for additional information
// regarding copyright ownership.  The ASF licenses this file
// to you under the Apache License, Version 2.0 (the
// "License"); you may not use this file except in compliance
// with the License.  You may obtain a copy of the License at
//
//   http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing,
// software distributed under the License is distributed on an
// "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied.  See the License for the
// specific language governing permissions and limitations
// under the License.

//! Stream and batch window function evaluation over partitioned input

use std::fmt;
use std::sync::Arc;

use arrow::array::{Array, ArrayRef};
use arrow::compute::{can_cast_types, cast_with_options, CastOptions};
use arrow::datatypes::{DataType, Field};
use arrow::record_batch::RecordBatch;
use hashbrown::HashSet;
use itertools::Itertools;
use log::{debug, trace};
use shardwin_common::cast::as_uint64_array;
use shardwin_common::config::ConfigOptions;
use shardwin_common::{
    exec_err, internal_err, schema_err, Result, ResultExt, ShardwinError,
};
use shardwin_expr::{Column, WindowExpr, WindowFunctionKind, WindowSpec};
use tokio::task::JoinSet;

use super::frame::FrameEvaluator;
use super::functions::WindowFunctionEvaluator;
use super::order::OrderResolver;
use super::reassemble::{output_schema, ResultReassembler};
use super::shuffle::{column_by_name, PartitionGroup, PartitionKeyShuffler, RowLocation};

/// Row locations of an evaluated group, in group order, and one result array
/// per window expression
type GroupResult = (Vec<RowLocation>, Vec<ArrayRef>);

/// Evaluates window expressions sharing one [`WindowSpec`] over a set of
/// record batches.
///
/// The output has the same batches, with the same rows in the same order, as
/// the input, with one column appended per expression. Results do not depend
/// on how the rows are split into batches: rows are regrouped by partition
/// key and ordered with ties broken by row id before anything is computed.
#[derive(Debug, Clone)]
pub struct WindowExec {
    spec: WindowSpec,
    exprs: Vec<WindowExpr>,
    config: ConfigOptions,
}

impl WindowExec {
    /// Create a new execution plan for window functions
    pub fn try_new(
        spec: WindowSpec,
        exprs: Vec<WindowExpr>,
        config: ConfigOptions,
    ) -> Result<Self> {
        spec.validate()?;
        {
            let mut names = HashSet::with_capacity(exprs.len());
            for expr in &exprs {
                expr.function.validate()?;
                if !names.insert(expr.name.as_str()) {
                    return schema_err!("duplicate output column {}", expr.name);
                }
            }
        }
        Ok(Self {
            spec,
            exprs,
            config,
        })
    }

    /// Window specification shared by all expressions
    pub fn spec(&self) -> &WindowSpec {
        &self.spec
    }

    /// Window expressions
    pub fn exprs(&self) -> &[WindowExpr] {
        &self.exprs
    }

    pub fn config(&self) -> &ConfigOptions {
        &self.config
    }

    /// Evaluates every expression over `batches`.
    ///
    /// Either all results are returned or the first error is.
    pub async fn execute(&self, batches: Vec<RecordBatch>) -> Result<Vec<RecordBatch>> {
        let num_rows: usize = batches.iter().map(|b| b.num_rows()).sum();
        debug!(
            "Start {self} over {num_rows} rows in {} batches",
            batches.len()
        );
        let Some(first) = batches.first() else {
            return Ok(vec![]);
        };

        // order-by keys come first in the payload, then each distinct argument
        let order_columns = self.spec.order_by.iter().map(|k| k.column.clone());
        let arguments: Vec<Column> = self
            .exprs
            .iter()
            .filter_map(|e| e.function.argument().cloned())
            .unique()
            .collect();
        let payload: Vec<Column> = order_columns.chain(arguments.iter().cloned()).collect();

        let order_keys = self
            .spec
            .order_by
            .iter()
            .map(|key| {
                let data_type = column_by_name(first, &key.column)?.data_type().clone();
                Ok((data_type, key.options))
            })
            .collect::<Result<Vec<_>>>()?;
        let frames = FrameEvaluator::try_new(&self.spec.frame, &order_keys)?;

        let mut functions = Vec::with_capacity(self.exprs.len());
        let mut fields = Vec::with_capacity(self.exprs.len());
        for expr in &self.exprs {
            let (input_type, arg_index) = match expr.function.argument() {
                Some(arg) => {
                    let data_type = column_by_name(first, arg)?.data_type().clone();
                    let index = arguments.iter().position(|a| a == arg);
                    (Some(data_type), index.map(|i| order_keys.len() + i))
                }
                None => (None, None),
            };
            let return_type = expr.function.return_type(input_type.as_ref())?;
            let evaluator = WindowFunctionEvaluator::try_new(
                &expr.function,
                input_type.as_ref(),
                self.config.window.sliding_aggregates,
            )?;
            fields.push(Field::new(&expr.name, return_type, true));
            functions.push((evaluator, arg_index));
        }
        output_schema(first.schema().as_ref(), &fields)?;

        let row_ids = self.row_ids(&batches)?;
        let shuffler = PartitionKeyShuffler::new(self.spec.partition_by.clone(), payload);
        let groups = shuffler.shuffle(&batches, &row_ids)?;
        debug!("Shuffled {num_rows} rows into {} partitions", groups.len());

        let evaluator = Arc::new(GroupEvaluator {
            resolver: OrderResolver::new(order_keys),
            frames,
            functions,
        });
        let evaluated = self.evaluate_groups(evaluator, groups, num_rows).await?;

        let batch_rows: Vec<usize> = batches.iter().map(|b| b.num_rows()).collect();
        let reassembler = ResultReassembler::try_new(
            &batch_rows,
            evaluated.iter().map(|(locations, _)| locations.as_slice()),
        )?;
        let results: Vec<Vec<ArrayRef>> =
            evaluated.into_iter().map(|(_, results)| results).collect();
        let output = reassembler.reassemble(&batches, &results, &fields)?;
        debug!("Finished {self}");
        Ok(output)
    }

    /// Global row id of every input row, indexed `[batch][row]`
    fn row_ids(&self, batches: &[RecordBatch]) -> Result<Vec<Vec<u64>>> {
        let Some(name) = &self.config.window.row_id_column else {
            let mut offset = 0;
            return Ok(batches
                .iter()
                .map(|batch| {
                    let start = offset;
                    offset += batch.num_rows() as u64;
                    (start..offset).collect()
                })
                .collect());
        };

        let column = Column::from(name);
        let options = CastOptions {
            safe: false,
            ..Default::default()
        };
        let mut seen = HashSet::new();
        batches
            .iter()
            .enumerate()
            .map(|(batch_idx, batch)| {
                let array = column_by_name(batch, &column)?;
                if !can_cast_types(array.data_type(), &DataType::UInt64) {
                    return schema_err!(
                        "row id column {column} has type {}, which cannot be cast to UInt64",
                        array.data_type()
                    );
                }
                let ids = cast_with_options(array, &DataType::UInt64, &options)
                    .with_context(|| format!("row id column {column} in batch {batch_idx}"))?;
                let ids = as_uint64_array(&ids)?;
                if ids.null_count() > 0 {
                    return exec_err!(
                        "row id column {column} has nulls in batch {batch_idx}"
                    );
                }
                for id in ids.values().iter() {
                    if !seen.insert(*id) {
                        return exec_err!("duplicate row id {id} in batch {batch_idx}");
                    }
                }
                Ok(ids.values().to_vec())
            })
            .collect()
    }

    /// Evaluates `groups`, inline for small inputs and otherwise spread
    /// round-robin over `target_partitions` blocking tasks. Results are
    /// returned in group order.
    async fn evaluate_groups(
        &self,
        evaluator: Arc<GroupEvaluator>,
        groups: Vec<PartitionGroup>,
        num_rows: usize,
    ) -> Result<Vec<GroupResult>> {
        let options = &self.config.window;
        let num_tasks = options.target_partitions.min(groups.len());
        if num_rows < options.min_rows_for_parallelism || num_tasks <= 1 {
            trace!("Evaluating {} partitions inline", groups.len());
            return groups.into_iter().map(|g| evaluator.evaluate(g)).collect();
        }

        let num_groups = groups.len();
        let mut buckets: Vec<Vec<(usize, PartitionGroup)>> =
            (0..num_tasks).map(|_| vec![]).collect();
        for (i, group) in groups.into_iter().enumerate() {
            buckets[i % num_tasks].push((i, group));
        }

        let mut join_set = JoinSet::new();
        for (task, bucket) in buckets.into_iter().enumerate() {
            let evaluator = Arc::clone(&evaluator);
            join_set.spawn_blocking(move || {
                trace!("Task {task} evaluating {} partitions", bucket.len());
                bucket
                    .into_iter()
                    .map(|(i, group)| Ok((i, evaluator.evaluate(group)?)))
                    .collect::<Result<Vec<_>>>()
            });
        }

        let mut results: Vec<Option<GroupResult>> = (0..num_groups).map(|_| None).collect();
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok(Ok(evaluated)) => {
                    for (i, result) in evaluated {
                        results[i] = Some(result);
                    }
                }
                Ok(Err(e)) => {
                    join_set.abort_all();
                    return Err(e);
                }
                Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
                Err(e) => return Err(ShardwinError::External(Box::new(e))),
            }
        }
        results
            .into_iter()
            .enumerate()
            .map(|(i, result)| match result {
                Some(result) => Ok(result),
                None => internal_err!("partition {i} was not evaluated"),
            })
            .collect()
    }
}

impl fmt::Display for WindowExec {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "WindowExec: wdw=[{}], over=[{}]",
            self.exprs.iter().join(", "),
            self.spec
        )
    }
}

/// Everything needed to evaluate one partition group, shared by all tasks
struct GroupEvaluator {
    resolver: OrderResolver,
    frames: FrameEvaluator,
    /// each function with the payload index of its argument
    functions: Vec<(WindowFunctionEvaluator, Option<usize>)>,
}

impl GroupEvaluator {
    fn evaluate(&self, group: PartitionGroup) -> Result<GroupResult> {
        let key = group.key.clone();
        self.evaluate_group(group)
            .with_context(|| format!("partition {key}"))
    }

    fn evaluate_group(&self, group: PartitionGroup) -> Result<GroupResult> {
        trace!("Evaluating partition {} of {} rows", group.key, group.num_rows());
        let group = self.resolver.resolve(group)?;
        let frames = if self.functions.iter().any(|(f, _)| f.uses_frames()) {
            self.frames.evaluate(&group)?
        } else {
            vec![]
        };
        let results = self
            .functions
            .iter()
            .map(|(function, arg)| {
                let arg = arg.map(|i| &group.columns[i]);
                function.evaluate(&group, arg, &frames)
            })
            .collect::<Result<Vec<_>>>()?;
        Ok((group.locations, results))
    }
}

/// Evaluates `function` over `batches` with configuration read from the
/// environment. The result is appended as a column named after the
/// function, e.g. `sum(values)`.
pub async fn evaluate(
    batches: Vec<RecordBatch>,
    spec: WindowSpec,
    function: WindowFunctionKind,
) -> Result<Vec<RecordBatch>> {
    evaluate_exprs(batches, spec, vec![function.into()]).await
}

/// Evaluates several named window expressions over `batches` in one pass,
/// with configuration read from the environment
pub async fn evaluate_exprs(
    batches: Vec<RecordBatch>,
    spec: WindowSpec,
    exprs: Vec<WindowExpr>,
) -> Result<Vec<RecordBatch>> {
    WindowExec::try_new(spec, exprs, ConfigOptions::from_env()?)?
        .execute(batches)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::{Float64Array, Int64Array, StringArray, UInt64Array};
    use shardwin_common::{assert_batches_eq, assert_contains};
    use shardwin_expr::{col, FrameSpec, SortKey};

    fn config() -> ConfigOptions {
        ConfigOptions::new()
            .with_target_partitions(4)
            .with_min_rows_for_parallelism(0)
    }

    fn batch(ids: Vec<&str>, values: Vec<f64>) -> RecordBatch {
        RecordBatch::try_from_iter([
            ("id", Arc::new(StringArray::from(ids)) as ArrayRef),
            ("v", Arc::new(Float64Array::from(values)) as ArrayRef),
        ])
        .unwrap()
    }

    fn spec() -> WindowSpec {
        WindowSpec::new()
            .with_partition_by(["id"])
            .with_order_by([SortKey::asc("v")])
            .with_frame(FrameSpec::Cumulative)
    }

    #[tokio::test]
    async fn multiple_exprs() -> Result<()> {
        let _ = env_logger::try_init();
        let exec = WindowExec::try_new(
            spec(),
            vec![
                col("v").sum().alias("running"),
                WindowFunctionKind::rank().into(),
                col("v").lag(1, None).into(),
            ],
            config(),
        )?;
        assert_eq!(
            exec.to_string(),
            "WindowExec: wdw=[sum(v) AS running, rank() AS rank(), lag(v, 1) AS lag(v, 1)], \
             over=[PARTITION BY [id] ORDER BY [v ASC NULLS LAST] \
             ROWS BETWEEN UNBOUNDED PRECEDING AND CURRENT ROW]"
        );
        let input = vec![
            batch(vec!["a", "b", "a"], vec![2.0, 1.0, 1.0]),
            batch(vec!["b", "a"], vec![3.0, 1.0]),
        ];
        let output = exec.execute(input).await?;
        assert_eq!(output.len(), 2);
        assert_batches_eq!(
            [
                "+----+-----+---------+--------+-----------+",
                "| id | v   | running | rank() | lag(v, 1) |",
                "+----+-----+---------+--------+-----------+",
                "| a  | 2.0 | 4.0     | 3      | 1.0       |",
                "| b  | 1.0 | 1.0     | 1      |           |",
                "| a  | 1.0 | 1.0     | 1      |           |",
                "| b  | 3.0 | 4.0     | 2      | 1.0       |",
                "| a  | 1.0 | 2.0     | 1      | 1.0       |",
                "+----+-----+---------+--------+-----------+",
            ],
            &output
        );
        Ok(())
    }

    #[tokio::test]
    async fn row_id_column_breaks_ties() -> Result<()> {
        let input = vec![RecordBatch::try_from_iter([
            ("k", Arc::new(Int64Array::from(vec![1, 1, 1])) as ArrayRef),
            ("rid", Arc::new(UInt64Array::from(vec![7, 3, 5])) as ArrayRef),
        ])?];
        let spec = WindowSpec::new().with_order_by([SortKey::asc("k")]);
        let exec = WindowExec::try_new(
            spec,
            vec![WindowFunctionKind::row_number().alias("n")],
            config().with_row_id_column("rid"),
        )?;
        let output = exec.execute(input).await?;
        let n = output[0].column_by_name("n").unwrap();
        assert_eq!(as_uint64_array(n)?.values().to_vec(), vec![3, 1, 2]);
        Ok(())
    }

    #[tokio::test]
    async fn invalid_row_ids() -> Result<()> {
        let exec = WindowExec::try_new(
            WindowSpec::new(),
            vec![WindowFunctionKind::row_number().into()],
            config().with_row_id_column("rid"),
        )?;
        let duplicate = RecordBatch::try_from_iter([(
            "rid",
            Arc::new(UInt64Array::from(vec![1, 2, 1])) as ArrayRef,
        )])?;
        let err = exec.execute(vec![duplicate]).await.unwrap_err();
        assert!(matches!(err, ShardwinError::Execution(_)), "{err}");
        assert_contains!(err.to_string(), "duplicate row id 1");

        let nulls = RecordBatch::try_from_iter([(
            "rid",
            Arc::new(UInt64Array::from(vec![Some(1), None])) as ArrayRef,
        )])?;
        let err = exec.execute(vec![nulls]).await.unwrap_err();
        assert!(matches!(err, ShardwinError::Execution(_)), "{err}");
        Ok(())
    }

    #[test]
    fn duplicate_output_names() {
        let err = WindowExec::try_new(
            spec(),
            vec![col("v").sum().alias("w"), col("v").max().alias("w")],
            config(),
        )
        .unwrap_err();
        assert!(matches!(err, ShardwinError::SchemaMismatch(_)));

        let exec = WindowExec::try_new(
            spec(),
            vec![col("v").sum().alias("w"), col("v").max().alias("m")],
            config(),
        )
        .unwrap();
        let names: Vec<_> = exec.exprs().iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["w", "m"]);
    }

    #[tokio::test]
    async fn errors_carry_partition_key() -> Result<()> {
        let input = vec![RecordBatch::try_from_iter([
            ("id", Arc::new(StringArray::from(vec!["x", "y"])) as ArrayRef),
            ("t", Arc::new(Int64Array::from(vec![0, i64::MAX])) as ArrayRef),
        ])?];
        let spec = WindowSpec::new()
            .with_partition_by(["id"])
            .with_order_by([SortKey::asc("t")])
            .with_frame(FrameSpec::range_around(0i64, 1i64)?);
        let exec = WindowExec::try_new(spec, vec![col("t").count().into()], config())?;
        let err = exec.execute(input).await.unwrap_err();
        assert_contains!(err.to_string(), "partition [id=y]");
        assert!(matches!(
            err.find_root(),
            ShardwinError::FrameBoundsOverflow(_)
        ));
        Ok(())
    }

    #[tokio::test]
    async fn no_batches() -> Result<()> {
        let exec =
            WindowExec::try_new(spec(), vec![col("v").sum().into()], config())?;
        assert!(exec.execute(vec![]).await?.is_empty());
        Ok(())
    }
}
