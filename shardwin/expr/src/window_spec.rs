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

//! [`WindowSpec`]: how rows are grouped, ordered and framed

use std::fmt;

use arrow::compute::SortOptions;
use itertools::Itertools;
use shardwin_common::{frame_type_err, Result, ScalarValue};

use crate::column::Column;
use crate::window_frame::{delta_sign, FrameSpec};

/// An order-by key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortKey {
    /// The column to sort on
    pub column: Column,
    /// Direction and null placement
    pub options: SortOptions,
}

impl SortKey {
    /// Create a sort key
    pub fn new(column: impl Into<Column>, ascending: bool, nulls_first: bool) -> Self {
        Self {
            column: column.into(),
            options: SortOptions {
                descending: !ascending,
                nulls_first,
            },
        }
    }

    /// Ascending, nulls last
    pub fn asc(column: impl Into<Column>) -> Self {
        Self::new(column, true, false)
    }

    /// Descending, nulls first
    pub fn desc(column: impl Into<Column>) -> Self {
        Self::new(column, false, true)
    }
}

impl Column {
    /// Create a sort key from this column
    pub fn sort(self, asc: bool, nulls_first: bool) -> SortKey {
        SortKey::new(self, asc, nulls_first)
    }
}

impl From<Column> for SortKey {
    fn from(column: Column) -> Self {
        Self::asc(column)
    }
}

impl From<&str> for SortKey {
    fn from(name: &str) -> Self {
        Self::asc(name)
    }
}

impl fmt::Display for SortKey {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{} {} {}",
            self.column,
            if self.options.descending { "DESC" } else { "ASC" },
            if self.options.nulls_first {
                "NULLS FIRST"
            } else {
                "NULLS LAST"
            }
        )
    }
}

/// Partitioning, ordering and framing shared by every function evaluated in
/// one window pass
#[derive(Debug, Clone, PartialEq, Default)]
pub struct WindowSpec {
    /// Rows with equal values in these columns form one group. Empty means
    /// the whole input is one group.
    pub partition_by: Vec<Column>,
    /// Order of rows within a group. Remaining ties are broken by row id.
    pub order_by: Vec<SortKey>,
    /// The frame of each row
    pub frame: FrameSpec,
}

impl WindowSpec {
    /// A window over the whole input, unordered, with an unbounded frame
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the partition-by columns
    pub fn with_partition_by<I, C>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: Into<Column>,
    {
        self.partition_by = columns.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the order-by keys
    pub fn with_order_by<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<SortKey>,
    {
        self.order_by = keys.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the frame
    pub fn with_frame(mut self, frame: FrameSpec) -> Self {
        self.frame = frame;
        self
    }

    /// Checks the frame against the order-by keys.
    ///
    /// `RangeBetween` needs exactly one order-by key and two non-null deltas
    /// that are both numeric or both durations. Whether the deltas fit the
    /// order-by column's type is only known once the input is seen.
    pub fn validate(&self) -> Result<()> {
        let FrameSpec::RangeBetween(start, end) = &self.frame else {
            return Ok(());
        };
        if self.order_by.len() != 1 {
            return frame_type_err!(
                "RANGE frames require exactly one ORDER BY column, got {}",
                self.order_by.len()
            );
        }
        match (delta_kind(start), delta_kind(end)) {
            (Some(a), Some(b)) if a == b => Ok(()),
            (Some(_), Some(_)) => frame_type_err!(
                "RANGE frame deltas {start} and {end} must both be numbers or both be durations"
            ),
            _ => frame_type_err!(
                "RANGE frame deltas must be non-null numbers or durations, got {} and {}",
                start.data_type(),
                end.data_type()
            ),
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
enum DeltaKind {
    Number,
    Duration,
}

fn delta_kind(value: &ScalarValue) -> Option<DeltaKind> {
    delta_sign(value)?;
    Some(match value {
        ScalarValue::DurationSecond(_)
        | ScalarValue::DurationMillisecond(_)
        | ScalarValue::DurationMicrosecond(_)
        | ScalarValue::DurationNanosecond(_) => DeltaKind::Duration,
        _ => DeltaKind::Number,
    })
}

impl fmt::Display for WindowSpec {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if !self.partition_by.is_empty() {
            write!(f, "PARTITION BY [{}] ", self.partition_by.iter().join(", "))?;
        }
        if !self.order_by.is_empty() {
            write!(f, "ORDER BY [{}] ", self.order_by.iter().join(", "))?;
        }
        write!(f, "{}", self.frame)
    }
}
