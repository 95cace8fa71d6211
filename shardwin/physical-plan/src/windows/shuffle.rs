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

//! Regrouping of input rows by partition key

use std::sync::Arc;

use ahash::RandomState;
use arrow::array::{Array, ArrayRef};
use arrow::compute::interleave;
use arrow::datatypes::{DataType, Float32Type, Float64Type};
use arrow::record_batch::RecordBatch;
use arrow::row::{RowConverter, SortField};
use arrow::util::display::array_value_to_string;
use hashbrown::HashMap;
use itertools::Itertools;
use log::trace;
use shardwin_common::cast::as_primitive_array;
use shardwin_common::{internal_err, schema_err, Result};
use shardwin_expr::Column;

/// Where a row lives in the input, and its global row id
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowLocation {
    /// index of the input batch
    pub batch: usize,
    /// index of the row within the batch
    pub row: usize,
    /// global row id, used to break ordering ties
    pub row_id: u64,
}

/// All rows sharing one partition key, merged across input batches
#[derive(Debug, Clone)]
pub struct PartitionGroup {
    /// Display form of the partition key, e.g. `[id=2]`
    pub key: String,
    /// Input location of every row of the group, in arrival order
    pub locations: Vec<RowLocation>,
    /// The payload columns gathered for the rows of the group, aligned with
    /// `locations`
    pub columns: Vec<ArrayRef>,
}

impl PartitionGroup {
    /// Number of rows in the group
    pub fn num_rows(&self) -> usize {
        self.locations.len()
    }
}

/// Groups rows of any number of input batches by the value of their
/// partition-key columns.
///
/// Keys are compared in the Arrow row format, so equality is value equality
/// per column type and nulls compare equal to each other. Float keys are
/// passed through [`normalize_float_keys`] first. Groups are emitted
/// in order of first appearance of their key.
#[derive(Debug)]
pub struct PartitionKeyShuffler {
    partition_by: Vec<Column>,
    payload: Vec<Column>,
    random_state: RandomState,
}

impl PartitionKeyShuffler {
    /// Create a shuffler keyed on `partition_by` that gathers the `payload`
    /// columns for each group
    pub fn new(partition_by: Vec<Column>, payload: Vec<Column>) -> Self {
        Self {
            partition_by,
            payload,
            random_state: RandomState::new(),
        }
    }

    /// Regroups the rows of `batches`. `row_ids[i][j]` is the global row id
    /// of row `j` of batch `i`.
    pub fn shuffle(
        &self,
        batches: &[RecordBatch],
        row_ids: &[Vec<u64>],
    ) -> Result<Vec<PartitionGroup>> {
        if batches.len() != row_ids.len() {
            return internal_err!(
                "got row ids for {} batches, expected {}",
                row_ids.len(),
                batches.len()
            );
        }
        let Some(first) = batches.first() else {
            return Ok(vec![]);
        };

        let key_columns = columns_of(batches, first, &self.partition_by)?;
        let payload_columns = columns_of(batches, first, &self.payload)?;

        let mut keys = vec![];
        let mut members: Vec<Vec<RowLocation>> = vec![];
        if self.partition_by.is_empty() {
            let locations: Vec<_> = locations(batches, row_ids).collect();
            if !locations.is_empty() {
                keys.push("[]".to_string());
                members.push(locations);
            }
        } else {
            let converter = RowConverter::new(
                key_columns[0]
                    .iter()
                    .map(|array| SortField::new(array.data_type().clone()))
                    .collect(),
            )?;
            let mut map: HashMap<Box<[u8]>, usize, RandomState> =
                HashMap::with_hasher(self.random_state.clone());

            for (batch_idx, columns) in key_columns.iter().enumerate() {
                let rows = converter.convert_columns(&normalize_float_keys(columns)?)?;
                let ids = &row_ids[batch_idx];
                if ids.len() != rows.num_rows() {
                    return internal_err!(
                        "batch {batch_idx} has {} rows but {} row ids",
                        rows.num_rows(),
                        ids.len()
                    );
                }
                for (row, row_id) in ids.iter().enumerate() {
                    let next = members.len();
                    let group = *map.entry_ref(rows.row(row).as_ref()).or_insert(next);
                    if group == next {
                        keys.push(self.format_key(columns, row)?);
                        members.push(vec![]);
                    }
                    members[group].push(RowLocation {
                        batch: batch_idx,
                        row,
                        row_id: *row_id,
                    });
                }
            }
        }

        let groups = keys
            .into_iter()
            .zip(members)
            .map(|(key, locations)| {
                let indices: Vec<_> = locations.iter().map(|l| (l.batch, l.row)).collect();
                let columns = (0..self.payload.len())
                    .map(|col| {
                        let sources: Vec<&dyn Array> = payload_columns
                            .iter()
                            .map(|batch_columns| batch_columns[col].as_ref())
                            .collect();
                        Ok(interleave(&sources, &indices)?)
                    })
                    .collect::<Result<Vec<_>>>()?;
                trace!("partition {key} has {} rows", locations.len());
                Ok(PartitionGroup {
                    key,
                    locations,
                    columns,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(groups)
    }

    fn format_key(&self, columns: &[ArrayRef], row: usize) -> Result<String> {
        let values = self
            .partition_by
            .iter()
            .zip(columns)
            .map(|(column, array)| {
                let value = if array.is_null(row) {
                    "NULL".to_string()
                } else {
                    array_value_to_string(array, row)?
                };
                Ok(format!("{column}={value}"))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(format!("[{}]", values.iter().join(", ")))
    }
}

fn locations<'a>(
    batches: &'a [RecordBatch],
    row_ids: &'a [Vec<u64>],
) -> impl Iterator<Item = RowLocation> + 'a {
    batches
        .iter()
        .zip(row_ids)
        .enumerate()
        .flat_map(|(batch, (b, ids))| {
            ids.iter()
                .take(b.num_rows())
                .enumerate()
                .map(move |(row, row_id)| RowLocation {
                    batch,
                    row,
                    row_id: *row_id,
                })
        })
}

/// Folds `-0.0` into `0.0` and every `NaN` into [`f64::NAN`] (or
/// [`f32::NAN`]) in float columns. The row format compares floats bit by
/// bit, which would otherwise split equal values.
pub(crate) fn normalize_float_keys(columns: &[ArrayRef]) -> Result<Vec<ArrayRef>> {
    columns
        .iter()
        .map(|array| {
            Ok(match array.data_type() {
                DataType::Float32 => Arc::new(
                    as_primitive_array::<Float32Type>(array)?
                        .unary::<_, Float32Type>(|v| match v {
                            v if v == 0.0 => 0.0,
                            v if v.is_nan() => f32::NAN,
                            v => v,
                        }),
                ) as ArrayRef,
                DataType::Float64 => Arc::new(
                    as_primitive_array::<Float64Type>(array)?
                        .unary::<_, Float64Type>(canonical_f64),
                ),
                _ => Arc::clone(array),
            })
        })
        .collect()
}

/// `-0.0` as `0.0` and any `NaN` as [`f64::NAN`]
pub(crate) fn canonical_f64(v: f64) -> f64 {
    match v {
        v if v == 0.0 => 0.0,
        v if v.is_nan() => f64::NAN,
        v => v,
    }
}

/// Looks up `columns` in every batch, checking that each has the type it
/// has in `first`. The result is indexed `[batch][column]`.
pub(crate) fn columns_of(
    batches: &[RecordBatch],
    first: &RecordBatch,
    columns: &[Column],
) -> Result<Vec<Vec<ArrayRef>>> {
    let expected = columns
        .iter()
        .map(|column| Ok(column_by_name(first, column)?.data_type().clone()))
        .collect::<Result<Vec<DataType>>>()?;
    batches
        .iter()
        .enumerate()
        .map(|(batch_idx, batch)| {
            columns
                .iter()
                .zip(&expected)
                .map(|(column, data_type)| {
                    let array = column_by_name(batch, column)?;
                    if array.data_type() != data_type {
                        return schema_err!(
                            "column {column} has type {} in batch {batch_idx} but {data_type} in batch 0",
                            array.data_type()
                        );
                    }
                    Ok(Arc::clone(array))
                })
                .collect()
        })
        .collect()
}

/// Finds a column of `batch` by name
pub(crate) fn column_by_name<'a>(
    batch: &'a RecordBatch,
    column: &Column,
) -> Result<&'a ArrayRef> {
    match batch.column_by_name(column.name()) {
        Some(array) => Ok(array),
        None => schema_err!(
            "column {column} not found; available columns are [{}]",
            batch.schema().fields().iter().map(|f| f.name()).join(", ")
        ),
    }
}
