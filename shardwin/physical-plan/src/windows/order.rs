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

//! Deterministic ordering of the rows of a partition group

use std::ops::Range;

use arrow::array::{ArrayRef, UInt32Array};
use arrow::compute::{take, SortOptions};
use arrow::datatypes::DataType;
use arrow::row::{RowConverter, Rows, SortField};
use shardwin_common::{internal_err, Result};

use super::shuffle::{normalize_float_keys, PartitionGroup, RowLocation};

/// A partition group whose rows are in their final order
#[derive(Debug, Clone)]
pub struct OrderedGroup {
    /// Display form of the partition key
    pub key: String,
    /// Input location of each row, in order
    pub locations: Vec<RowLocation>,
    /// Payload columns, in order. The first `num_order_keys` are the
    /// order-by keys.
    pub columns: Vec<ArrayRef>,
    /// Runs of consecutive rows with equal order-by keys. Without order-by
    /// keys every row is a peer of every other.
    pub peer_ranges: Vec<Range<usize>>,
    num_order_keys: usize,
}

impl OrderedGroup {
    /// Number of rows in the group
    pub fn num_rows(&self) -> usize {
        self.locations.len()
    }

    /// The order-by key columns
    pub fn order_columns(&self) -> &[ArrayRef] {
        &self.columns[..self.num_order_keys]
    }

    /// Row id of the row at `position`
    pub fn row_id(&self, position: usize) -> Option<u64> {
        self.locations.get(position).map(|l| l.row_id)
    }
}

/// Orders the rows of a [`PartitionGroup`] by its order-by keys.
///
/// Keys are compared in the Arrow row format, which gives a total order for
/// every supported type honouring each key's [`SortOptions`]. Rows whose
/// keys are all equal are ordered by ascending row id, so the order depends
/// only on the rows themselves and never on how they arrived.
#[derive(Debug, Clone)]
pub struct OrderResolver {
    fields: Vec<SortField>,
}

impl OrderResolver {
    /// Create a resolver for keys of the given types and options
    pub fn new(keys: impl IntoIterator<Item = (DataType, SortOptions)>) -> Self {
        Self {
            fields: keys
                .into_iter()
                .map(|(data_type, options)| SortField::new_with_options(data_type, options))
                .collect(),
        }
    }

    /// Number of order-by keys
    pub fn num_keys(&self) -> usize {
        self.fields.len()
    }

    /// Orders `group`, whose first [`Self::num_keys`] columns must be the
    /// order-by keys
    pub fn resolve(&self, group: PartitionGroup) -> Result<OrderedGroup> {
        let num_keys = self.fields.len();
        if group.columns.len() < num_keys {
            return internal_err!(
                "group {} has {} columns but {num_keys} order-by keys",
                group.key,
                group.columns.len()
            );
        }

        let n = group.num_rows();
        let mut permutation: Vec<usize> = (0..n).collect();
        let row_id = |i: usize| group.locations[i].row_id;

        let rows = if num_keys == 0 {
            permutation.sort_unstable_by_key(|&i| row_id(i));
            None
        } else {
            let converter = RowConverter::new(self.fields.clone())?;
            let keys = normalize_float_keys(&group.columns[..num_keys])?;
            let rows = converter.convert_columns(&keys)?;
            permutation.sort_unstable_by(|&a, &b| {
                rows.row(a)
                    .cmp(&rows.row(b))
                    .then_with(|| row_id(a).cmp(&row_id(b)))
            });
            Some(rows)
        };

        let peer_ranges = match &rows {
            Some(rows) => peer_ranges(rows, &permutation),
            None if n == 0 => vec![],
            None => vec![0..n],
        };

        let indices = UInt32Array::from_iter_values(
            permutation
                .iter()
                .map(|&i| u32::try_from(i))
                .collect::<Result<Vec<_>, _>>()
                .or_else(|_| internal_err!("group {} is too large", group.key))?,
        );
        let columns = group
            .columns
            .iter()
            .map(|column| Ok(take(column.as_ref(), &indices, None)?))
            .collect::<Result<Vec<_>>>()?;
        let locations = permutation.iter().map(|&i| group.locations[i]).collect();

        Ok(OrderedGroup {
            key: group.key,
            locations,
            columns,
            peer_ranges,
            num_order_keys: num_keys,
        })
    }
}

fn peer_ranges(rows: &Rows, permutation: &[usize]) -> Vec<Range<usize>> {
    let mut ranges = vec![];
    let mut start = 0;
    for end in 1..=permutation.len() {
        if end == permutation.len()
            || rows.row(permutation[end]) != rows.row(permutation[start])
        {
            ranges.push(start..end);
            start = end;
        }
    }
    ranges
}

/// Builds a group directly from columns, for tests
#[cfg(test)]
pub(crate) fn ordered_group(
    columns: Vec<ArrayRef>,
    num_order_keys: usize,
) -> OrderedGroup {
    use arrow::array::Array;
    let n = columns.first().map(|c| c.len()).unwrap_or(0);
    let group = PartitionGroup {
        key: "[test]".to_string(),
        locations: (0..n)
            .map(|row| RowLocation {
                batch: 0,
                row,
                row_id: row as u64,
            })
            .collect(),
        columns,
    };
    let keys = group.columns[..num_order_keys]
        .iter()
        .map(|c| (c.data_type().clone(), SortOptions::default()))
        .collect::<Vec<_>>();
    OrderResolver::new(keys).resolve(group).unwrap()
}
