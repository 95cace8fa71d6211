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

//! Scattering of per-group results back into input order

use std::sync::Arc;

use arrow::array::{new_empty_array, Array, ArrayRef};
use arrow::compute::interleave;
use arrow::datatypes::{Field, Schema};
use arrow::record_batch::{RecordBatch, RecordBatchOptions};
use shardwin_common::{internal_err, schema_err, Result};

use super::shuffle::RowLocation;

/// Maps every input row to the group and position that computed its
/// results, then rebuilds the input batches with the results appended.
///
/// Every input row must be covered by exactly one group position.
#[derive(Debug)]
pub struct ResultReassembler {
    /// `slots[batch][row]` is `(group, position)`
    slots: Vec<Vec<(usize, usize)>>,
}

impl ResultReassembler {
    /// `batch_rows[i]` is the row count of input batch `i`; `groups` yields
    /// the ordered row locations of every group.
    pub fn try_new<'a>(
        batch_rows: &[usize],
        groups: impl IntoIterator<Item = &'a [RowLocation]>,
    ) -> Result<Self> {
        let mut slots: Vec<Vec<Option<(usize, usize)>>> =
            batch_rows.iter().map(|&n| vec![None; n]).collect();
        for (group, locations) in groups.into_iter().enumerate() {
            for (position, location) in locations.iter().enumerate() {
                let Some(slot) = slots
                    .get_mut(location.batch)
                    .and_then(|rows| rows.get_mut(location.row))
                else {
                    return internal_err!(
                        "row {} of batch {} is out of bounds",
                        location.row,
                        location.batch
                    );
                };
                if slot.replace((group, position)).is_some() {
                    return internal_err!(
                        "row {} of batch {} belongs to more than one group",
                        location.row,
                        location.batch
                    );
                }
            }
        }

        let slots = slots
            .into_iter()
            .enumerate()
            .map(|(batch, rows)| {
                rows.into_iter()
                    .enumerate()
                    .map(|(row, slot)| match slot {
                        Some(slot) => Ok(slot),
                        None => internal_err!("row {row} of batch {batch} has no result"),
                    })
                    .collect::<Result<Vec<_>>>()
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { slots })
    }

    /// Appends one column per entry of `fields` to each batch of `batches`.
    /// `results[g][e]` holds the values of output `e` for group `g`, in
    /// group order.
    pub fn reassemble(
        &self,
        batches: &[RecordBatch],
        results: &[Vec<ArrayRef>],
        fields: &[Field],
    ) -> Result<Vec<RecordBatch>> {
        if batches.len() != self.slots.len() {
            return internal_err!(
                "expected {} batches, got {}",
                self.slots.len(),
                batches.len()
            );
        }
        if let Some(bad) = results.iter().position(|r| r.len() != fields.len()) {
            return internal_err!(
                "group {bad} has {} results, expected {}",
                results[bad].len(),
                fields.len()
            );
        }

        batches
            .iter()
            .zip(&self.slots)
            .map(|(batch, slots)| {
                let schema = output_schema(batch.schema().as_ref(), fields)?;
                let mut columns = batch.columns().to_vec();
                for (e, field) in fields.iter().enumerate() {
                    let column = if slots.is_empty() {
                        new_empty_array(field.data_type())
                    } else {
                        let values: Vec<&dyn Array> =
                            results.iter().map(|r| r[e].as_ref()).collect();
                        interleave(&values, slots)?
                    };
                    columns.push(column);
                }
                let options = RecordBatchOptions::new().with_row_count(Some(slots.len()));
                Ok(RecordBatch::try_new_with_options(
                    Arc::new(schema),
                    columns,
                    &options,
                )?)
            })
            .collect()
    }
}

/// The schema of `input` with `fields` appended
pub fn output_schema(input: &Schema, fields: &[Field]) -> Result<Schema> {
    for field in fields {
        if input.column_with_name(field.name()).is_some() {
            return schema_err!(
                "output column {} already exists in the input",
                field.name()
            );
        }
    }
    let fields = input
        .fields()
        .iter()
        .map(|f| f.as_ref().clone())
        .chain(fields.iter().cloned())
        .collect::<Vec<_>>();
    Ok(Schema::new_with_metadata(fields, input.metadata().clone()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::{Float64Array, Int64Array};
    use arrow::datatypes::DataType;
    use shardwin_common::{assert_batches_eq, assert_contains, ShardwinError};

    fn location(batch: usize, row: usize) -> RowLocation {
        RowLocation {
            batch,
            row,
            row_id: 0,
        }
    }

    fn batch(values: Vec<i64>) -> RecordBatch {
        let array = Arc::new(Int64Array::from(values)) as ArrayRef;
        RecordBatch::try_from_iter([("id", array)]).unwrap()
    }

    #[test]
    fn scatter_back_to_input_order() -> Result<()> {
        let batches = vec![batch(vec![1, 2]), batch(vec![]), batch(vec![2, 1])];
        let groups = [
            vec![location(2, 1), location(0, 0)],
            vec![location(0, 1), location(2, 0)],
        ];
        let reassembler =
            ResultReassembler::try_new(&[2, 0, 2], groups.iter().map(Vec::as_slice))?;
        let results = vec![
            vec![Arc::new(Float64Array::from(vec![1.0, 1.5])) as ArrayRef],
            vec![Arc::new(Float64Array::from(vec![2.0, 2.5])) as ArrayRef],
        ];
        let fields = [Field::new("w", DataType::Float64, true)];
        let output = reassembler.reassemble(&batches, &results, &fields)?;

        assert_eq!(output[1].num_rows(), 0);
        assert_eq!(output[1].num_columns(), 2);
        assert_batches_eq!(
            [
                "+----+-----+",
                "| id | w   |",
                "+----+-----+",
                "| 1  | 1.5 |",
                "| 2  | 2.0 |",
                "| 2  | 2.5 |",
                "| 1  | 1.0 |",
                "+----+-----+",
            ],
            &output
        );
        Ok(())
    }

    #[test]
    fn uncovered_and_duplicate_rows() {
        let groups = [vec![location(0, 0)]];
        let err = ResultReassembler::try_new(&[2], groups.iter().map(Vec::as_slice))
            .unwrap_err();
        assert!(matches!(err, ShardwinError::Internal(_)));
        assert_contains!(err.to_string(), "row 1 of batch 0 has no result");

        let groups = [vec![location(0, 0)], vec![location(0, 0)]];
        let err = ResultReassembler::try_new(&[1], groups.iter().map(Vec::as_slice))
            .unwrap_err();
        assert_contains!(err.to_string(), "belongs to more than one group");
    }

    #[test]
    fn output_name_collision() {
        let input = batch(vec![1]);
        let err = output_schema(
            input.schema().as_ref(),
            &[Field::new("id", DataType::UInt64, true)],
        )
        .unwrap_err();
        assert!(matches!(err, ShardwinError::SchemaMismatch(_)));
    }
}
