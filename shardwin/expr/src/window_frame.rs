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

//! Window frame module
//!
//! The frame determines which rows of the ordered partition group are read
//! by an aggregate window function for each output row. Offsets are signed
//! and relative to the current row: negative values reach backwards,
//! positive values forwards, and zero is the current row.

use std::cmp::Ordering;
use std::fmt;

use shardwin_common::{Result, ScalarValue};

/// Which rows of the ordered partition group make up a row's frame
#[derive(Debug, Clone, PartialEq, Default)]
pub enum FrameSpec {
    /// The whole partition group
    #[default]
    Unbounded,
    /// From the first row of the group up to and including the current row
    Cumulative,
    /// Bounds counted in row positions relative to the current row
    RowsBetween(i64, i64),
    /// Bounds expressed in the domain of the single order-by column: a row
    /// is in frame when its order value lies between `v + start` and
    /// `v + end`, where `v` is the current row's order value.
    ///
    /// Deltas are numeric for numeric order columns and durations for
    /// temporal ones.
    RangeBetween(ScalarValue, ScalarValue),
}

impl FrameSpec {
    /// `ROWS BETWEEN preceding PRECEDING AND following FOLLOWING`
    ///
    /// ```
    /// # use shardwin_expr::FrameSpec;
    /// assert_eq!(FrameSpec::rows_around(1, 2), FrameSpec::RowsBetween(-1, 2));
    /// ```
    pub fn rows_around(preceding: u64, following: u64) -> Self {
        let clamp = |n: u64| i64::try_from(n).unwrap_or(i64::MAX);
        Self::RowsBetween(-clamp(preceding), clamp(following))
    }

    /// `RANGE BETWEEN preceding PRECEDING AND following FOLLOWING`
    pub fn range_around(
        preceding: impl Into<ScalarValue>,
        following: impl Into<ScalarValue>,
    ) -> Result<Self> {
        Ok(Self::RangeBetween(
            preceding.into().arithmetic_negate()?,
            following.into(),
        ))
    }

    /// Returns the SQL frame unit, `ROWS` or `RANGE`
    pub fn units(&self) -> &'static str {
        match self {
            FrameSpec::RangeBetween(..) => "RANGE",
            _ => "ROWS",
        }
    }
}

/// Sign of a numeric or duration value, `None` for anything else
pub(crate) fn delta_sign(value: &ScalarValue) -> Option<Ordering> {
    match value {
        ScalarValue::Int32(Some(v)) => Some(v.cmp(&0)),
        ScalarValue::UInt64(Some(v)) => Some(v.cmp(&0)),
        ScalarValue::Int64(Some(v))
        | ScalarValue::DurationSecond(Some(v))
        | ScalarValue::DurationMillisecond(Some(v))
        | ScalarValue::DurationMicrosecond(Some(v))
        | ScalarValue::DurationNanosecond(Some(v)) => Some(v.cmp(&0)),
        ScalarValue::Float32(Some(v)) => v.partial_cmp(&0.0),
        ScalarValue::Float64(Some(v)) => v.partial_cmp(&0.0),
        _ => None,
    }
}

fn fmt_range_bound(value: &ScalarValue, f: &mut fmt::Formatter) -> fmt::Result {
    match delta_sign(value) {
        Some(Ordering::Less) => match value.arithmetic_negate() {
            Ok(negated) => write!(f, "{negated} PRECEDING"),
            Err(_) => write!(f, "{value}"),
        },
        Some(Ordering::Equal) => f.write_str("CURRENT ROW"),
        Some(Ordering::Greater) => write!(f, "{value} FOLLOWING"),
        None => write!(f, "{value}"),
    }
}

fn fmt_rows_bound(offset: i64, f: &mut fmt::Formatter) -> fmt::Result {
    match offset.cmp(&0) {
        Ordering::Less => write!(f, "{} PRECEDING", offset.unsigned_abs()),
        Ordering::Equal => f.write_str("CURRENT ROW"),
        Ordering::Greater => write!(f, "{offset} FOLLOWING"),
    }
}

impl fmt::Display for FrameSpec {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} BETWEEN ", self.units())?;
        match self {
            FrameSpec::Unbounded => {
                f.write_str("UNBOUNDED PRECEDING AND UNBOUNDED FOLLOWING")
            }
            FrameSpec::Cumulative => f.write_str("UNBOUNDED PRECEDING AND CURRENT ROW"),
            FrameSpec::RowsBetween(start, end) => {
                fmt_rows_bound(*start, f)?;
                f.write_str(" AND ")?;
                fmt_rows_bound(*end, f)
            }
            FrameSpec::RangeBetween(start, end) => {
                fmt_range_bound(start, f)?;
                f.write_str(" AND ")?;
                fmt_range_bound(end, f)
            }
        }
    }
}
