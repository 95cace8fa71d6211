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

//! Per-row frame boundaries
//!
//! ROWS frames are a fixed offset from the current position. RANGE frames
//! are found with two pointers that only ever move forward: the order-by
//! values are sorted, so the frame bounds of consecutive rows are
//! non-decreasing and the whole group is scanned in linear time.

use std::cmp::Ordering;
use std::ops::Range;

use arrow::array::{Array, ArrayRef};
use arrow::compute::{cast, SortOptions};
use arrow::datatypes::{DataType, Int32Type, TimeUnit};
use shardwin_common::cast::{
    as_float64_array, as_int64_array, as_primitive_array, as_uint64_array,
};
use shardwin_common::{
    frame_overflow_err, frame_type_err, internal_err, Result, ResultExt, ScalarValue,
};
use shardwin_expr::FrameSpec;

use super::order::OrderedGroup;
use super::shuffle::canonical_f64;

/// The rows of the ordered group that make up one row's frame.
///
/// Stored half-open; [`RowFrame::lo`] and [`RowFrame::hi`] give the
/// inclusive bounds of a non-empty frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowFrame {
    start: usize,
    end: usize,
}

impl RowFrame {
    /// Frame over positions `start..end`; empty if `end <= start`
    pub fn new(start: usize, end: usize) -> Self {
        Self {
            start,
            end: end.max(start),
        }
    }

    /// First position in the frame
    pub fn lo(&self) -> Option<usize> {
        (!self.is_empty()).then_some(self.start)
    }

    /// Last position in the frame
    pub fn hi(&self) -> Option<usize> {
        (!self.is_empty()).then(|| self.end - 1)
    }

    /// True if no row is in the frame
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Number of rows in the frame
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    /// Positions in the frame
    pub fn range(&self) -> Range<usize> {
        self.start..self.end
    }
}

/// Computes the [`RowFrame`] of every row of an [`OrderedGroup`]
#[derive(Debug, Clone)]
pub struct FrameEvaluator {
    bounds: FrameBounds,
}

#[derive(Debug, Clone)]
enum FrameBounds {
    Unbounded,
    Cumulative,
    Rows(i64, i64),
    Range {
        domain: RangeDomain,
        options: SortOptions,
    },
}

/// RANGE deltas resolved against the order-by column. `lower` and `upper`
/// are added to the current row's value to get the inclusive value bounds
/// of its frame.
#[derive(Debug, Clone)]
enum RangeDomain {
    /// Integers, dates, timestamps and durations, in the column's own unit
    Integer {
        lower: i128,
        upper: i128,
        min: i128,
        max: i128,
        unsigned: bool,
        data_type: DataType,
    },
    Float {
        lower: f64,
        upper: f64,
    },
}

#[derive(Debug, Clone, Copy)]
enum OrderKind {
    Integer { min: i128, max: i128, unsigned: bool },
    /// `unit` is the number of nanoseconds in one step of the column
    Temporal { min: i128, max: i128, unit: i128 },
    Float,
}

const NANOS_PER_DAY: i128 = 86_400_000_000_000;

fn nanos_per(unit: &TimeUnit) -> i128 {
    match unit {
        TimeUnit::Second => 1_000_000_000,
        TimeUnit::Millisecond => 1_000_000,
        TimeUnit::Microsecond => 1_000,
        TimeUnit::Nanosecond => 1,
    }
}

fn order_kind(data_type: &DataType) -> Option<OrderKind> {
    let integer = |min: i128, max: i128| OrderKind::Integer {
        min,
        max,
        unsigned: false,
    };
    let unsigned = |max: i128| OrderKind::Integer {
        min: 0,
        max,
        unsigned: true,
    };
    let temporal = |min: i128, max: i128, unit: i128| OrderKind::Temporal { min, max, unit };
    Some(match data_type {
        DataType::Int8 => integer(i8::MIN.into(), i8::MAX.into()),
        DataType::Int16 => integer(i16::MIN.into(), i16::MAX.into()),
        DataType::Int32 => integer(i32::MIN.into(), i32::MAX.into()),
        DataType::Int64 => integer(i64::MIN.into(), i64::MAX.into()),
        DataType::UInt8 => unsigned(u8::MAX.into()),
        DataType::UInt16 => unsigned(u16::MAX.into()),
        DataType::UInt32 => unsigned(u32::MAX.into()),
        DataType::UInt64 => unsigned(u64::MAX.into()),
        DataType::Float16 | DataType::Float32 | DataType::Float64 => OrderKind::Float,
        DataType::Date32 => temporal(i32::MIN.into(), i32::MAX.into(), NANOS_PER_DAY),
        DataType::Date64 => temporal(i64::MIN.into(), i64::MAX.into(), 1_000_000),
        DataType::Timestamp(unit, _) | DataType::Duration(unit) => {
            temporal(i64::MIN.into(), i64::MAX.into(), nanos_per(unit))
        }
        _ => return None,
    })
}

/// A duration delta in nanoseconds, `None` for anything else
fn duration_nanos(delta: &ScalarValue) -> Option<i128> {
    let (value, unit) = match delta {
        ScalarValue::DurationSecond(Some(v)) => (v, TimeUnit::Second),
        ScalarValue::DurationMillisecond(Some(v)) => (v, TimeUnit::Millisecond),
        ScalarValue::DurationMicrosecond(Some(v)) => (v, TimeUnit::Microsecond),
        ScalarValue::DurationNanosecond(Some(v)) => (v, TimeUnit::Nanosecond),
        _ => return None,
    };
    Some(i128::from(*value) * nanos_per(&unit))
}

/// A numeric delta as an integer, `None` for anything else
fn integer_delta(delta: &ScalarValue, data_type: &DataType) -> Result<Option<i128>> {
    let float = match delta {
        ScalarValue::Int32(Some(v)) => return Ok(Some((*v).into())),
        ScalarValue::Int64(Some(v)) => return Ok(Some((*v).into())),
        ScalarValue::UInt64(Some(v)) => return Ok(Some((*v).into())),
        ScalarValue::Float32(Some(v)) => f64::from(*v),
        ScalarValue::Float64(Some(v)) => *v,
        _ => return Ok(None),
    };
    // |float| < 2^100 keeps the conversion exact and the sums within i128
    if float.is_finite() && float.fract() == 0.0 && float.abs() < 2f64.powi(100) {
        Ok(Some(float as i128))
    } else {
        frame_overflow_err!("RANGE delta {delta} is not a whole number of {data_type}")
    }
}

fn float_delta(delta: &ScalarValue) -> Option<f64> {
    match delta {
        ScalarValue::Int32(Some(v)) => Some((*v).into()),
        ScalarValue::Int64(Some(v)) => Some(*v as f64),
        ScalarValue::UInt64(Some(v)) => Some(*v as f64),
        ScalarValue::Float32(Some(v)) => Some((*v).into()),
        ScalarValue::Float64(Some(v)) => Some(*v),
        _ => None,
    }
}

impl RangeDomain {
    fn try_new(start: &ScalarValue, end: &ScalarValue, data_type: &DataType) -> Result<Self> {
        let Some(kind) = order_kind(data_type) else {
            return frame_type_err!("RANGE frames cannot be evaluated over {data_type}");
        };
        let (min, max, unsigned, start, end) = match kind {
            OrderKind::Integer { min, max, unsigned } => {
                match (integer_delta(start, data_type)?, integer_delta(end, data_type)?) {
                    (Some(s), Some(e)) => (min, max, unsigned, s, e),
                    _ => {
                        return frame_type_err!(
                            "RANGE frames over {data_type} require numeric deltas, got {} and {}",
                            start.data_type(),
                            end.data_type()
                        )
                    }
                }
            }
            OrderKind::Temporal { min, max, unit } => {
                let resolve = |delta: &ScalarValue| match duration_nanos(delta) {
                    Some(nanos) if nanos % unit == 0 => Ok(nanos / unit),
                    Some(_) => frame_overflow_err!(
                        "RANGE delta {delta} is not a whole number of steps of {data_type}"
                    ),
                    None => frame_type_err!(
                        "RANGE frames over {data_type} require duration deltas, got {}",
                        delta.data_type()
                    ),
                };
                (min, max, false, resolve(start)?, resolve(end)?)
            }
            OrderKind::Float => {
                return match (float_delta(start), float_delta(end)) {
                    (Some(s), Some(e)) => Ok(RangeDomain::Float {
                        lower: s.min(e),
                        upper: s.max(e),
                    }),
                    _ => frame_type_err!(
                        "RANGE frames over {data_type} require numeric deltas, got {} and {}",
                        start.data_type(),
                        end.data_type()
                    ),
                };
            }
        };
        Ok(RangeDomain::Integer {
            lower: start.min(end),
            upper: start.max(end),
            min,
            max,
            unsigned,
            data_type: data_type.clone(),
        })
    }
}

impl FrameEvaluator {
    /// Resolves `frame` against the types and sort options of the order-by
    /// keys. Fails if a RANGE frame cannot be applied to the order-by column.
    pub fn try_new(frame: &FrameSpec, order_by: &[(DataType, SortOptions)]) -> Result<Self> {
        let bounds = match frame {
            FrameSpec::Unbounded => FrameBounds::Unbounded,
            FrameSpec::Cumulative => FrameBounds::Cumulative,
            FrameSpec::RowsBetween(start, end) => FrameBounds::Rows(*start, *end),
            FrameSpec::RangeBetween(start, end) => {
                let [(data_type, options)] = order_by else {
                    return frame_type_err!(
                        "RANGE frames require exactly one ORDER BY column, got {}",
                        order_by.len()
                    );
                };
                FrameBounds::Range {
                    domain: RangeDomain::try_new(start, end, data_type)?,
                    options: *options,
                }
            }
        };
        Ok(Self { bounds })
    }

    /// Returns the frame of every row of `group`, by position
    pub fn evaluate(&self, group: &OrderedGroup) -> Result<Vec<RowFrame>> {
        let n = group.num_rows();
        match &self.bounds {
            FrameBounds::Unbounded => Ok(vec![RowFrame::new(0, n); n]),
            FrameBounds::Cumulative => Ok((0..n).map(|p| RowFrame::new(0, p + 1)).collect()),
            FrameBounds::Rows(start, end) => {
                // both bounds are clamped onto the group; the frame is empty
                // only when they cross
                let last = n as i128 - 1;
                Ok((0..n)
                    .map(|p| {
                        let p = p as i128;
                        let lo = (p + i128::from(*start)).clamp(0, last);
                        let hi = (p + i128::from(*end)).clamp(0, last);
                        RowFrame::new(lo as usize, hi as usize + 1)
                    })
                    .collect())
            }
            FrameBounds::Range { domain, options } => {
                let [order] = group.order_columns() else {
                    return internal_err!(
                        "RANGE frame over {} order-by columns",
                        group.order_columns().len()
                    );
                };
                self.range_frames(group, order, domain, options)
            }
        }
    }

    fn range_frames(
        &self,
        group: &OrderedGroup,
        order: &ArrayRef,
        domain: &RangeDomain,
        options: &SortOptions,
    ) -> Result<Vec<RowFrame>> {
        let row_context = |p: usize| {
            let row_id = group.row_id(p);
            move || format!("row id {}", row_id.unwrap_or_default())
        };
        match domain {
            RangeDomain::Integer {
                lower,
                upper,
                min,
                max,
                unsigned,
                data_type,
            } => {
                let values = integer_values(order)?;
                scan_range(&values, options, i128::cmp, |p, v| {
                    let mirrored = mirror(*lower, *upper, options.descending, |d| -d);
                    let bounds = (v + mirrored.0, v + mirrored.1);
                    for bound in [bounds.0, bounds.1] {
                        let below = bound < *min && !*unsigned;
                        if below || bound > *max {
                            return frame_overflow_err!(
                                "RANGE bound {bound} for order value {v} is outside the range of {data_type}"
                            )
                            .with_context(row_context(p));
                        }
                    }
                    Ok(bounds)
                })
            }
            RangeDomain::Float { lower, upper } => {
                let values = float_values(order)?;
                scan_range(&values, options, f64::total_cmp, |p, v| {
                    let mirrored = mirror(*lower, *upper, options.descending, |d| -d);
                    let bounds = (v + mirrored.0, v + mirrored.1);
                    if v.is_finite() && !(bounds.0.is_finite() && bounds.1.is_finite()) {
                        return frame_overflow_err!(
                            "RANGE bounds for order value {v} are not finite"
                        )
                        .with_context(row_context(p));
                    }
                    Ok(bounds)
                })
            }
        }
    }
}

/// For descending order the frame extends to larger values when reaching
/// back, so the deltas swap and change sign
fn mirror<T: Copy>(lower: T, upper: T, descending: bool, neg: impl Fn(T) -> T) -> (T, T) {
    if descending {
        (neg(upper), neg(lower))
    } else {
        (lower, upper)
    }
}

fn integer_values(array: &ArrayRef) -> Result<Vec<Option<i128>>> {
    Ok(match array.data_type() {
        DataType::UInt8 | DataType::UInt16 | DataType::UInt32 | DataType::UInt64 => {
            let array = cast(array, &DataType::UInt64)?;
            as_uint64_array(&array)?
                .iter()
                .map(|v| v.map(i128::from))
                .collect()
        }
        DataType::Int8 | DataType::Int16 | DataType::Int32 | DataType::Date32 => {
            let array = cast(array, &DataType::Int32)?;
            as_primitive_array::<Int32Type>(&array)?
                .iter()
                .map(|v| v.map(i128::from))
                .collect()
        }
        _ => {
            let array = cast(array, &DataType::Int64)?;
            as_int64_array(&array)?
                .iter()
                .map(|v| v.map(i128::from))
                .collect()
        }
    })
}

fn float_values(array: &ArrayRef) -> Result<Vec<Option<f64>>> {
    let array = cast(array, &DataType::Float64)?;
    // same order as the row format after normalize_float_keys
    Ok(as_float64_array(&array)?
        .iter()
        .map(|v| v.map(canonical_f64))
        .collect())
}

/// Two-pointer scan over sorted order-by values. `bounds(p, v)` returns the
/// inclusive value bounds of the frame of the row at position `p` with value
/// `v`. Rows with a null order value frame exactly the null rows.
fn scan_range<K: Copy>(
    values: &[Option<K>],
    options: &SortOptions,
    cmp: impl Fn(&K, &K) -> Ordering,
    mut bounds: impl FnMut(usize, K) -> Result<(K, K)>,
) -> Result<Vec<RowFrame>> {
    let n = values.len();
    let nulls = values.iter().filter(|v| v.is_none()).count();
    let (non_null, null_frame) = if options.nulls_first {
        (nulls..n, RowFrame::new(0, nulls))
    } else {
        (0..n - nulls, RowFrame::new(n - nulls, n))
    };
    let value_at = |i: usize| match values[i] {
        Some(v) => Ok(v),
        None => internal_err!("null order value at position {i} outside the null rows"),
    };

    // `before` is how a value ahead of the frame compares to the frame's
    // first bound in sort order
    let before = if options.descending {
        Ordering::Greater
    } else {
        Ordering::Less
    };

    let mut frames = vec![null_frame; n];
    let (mut start, mut end) = (non_null.start, non_null.start);
    for p in non_null.clone() {
        let (lower, upper) = bounds(p, value_at(p)?)?;
        let (first, last) = if options.descending {
            (upper, lower)
        } else {
            (lower, upper)
        };
        while start < non_null.end && cmp(&value_at(start)?, &first) == before {
            start += 1;
        }
        end = end.max(start);
        while end < non_null.end && cmp(&value_at(end)?, &last) != before.reverse() {
            end += 1;
        }
        frames[p] = RowFrame::new(start, end);
    }
    Ok(frames)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::windows::order::ordered_group;
    use arrow::array::{Date32Array, Float64Array, Int8Array, UInt32Array};
    use chrono::TimeDelta;
    use rand::prelude::StdRng;
    use rand::{Rng, SeedableRng};
    use rstest::rstest;
    use shardwin_common::ShardwinError;
    use std::sync::Arc;

    fn sums(values: &[f64], frames: &[RowFrame]) -> Vec<f64> {
        frames
            .iter()
            .map(|f| values[f.range()].iter().sum())
            .collect()
    }

    fn float_group(values: &[f64]) -> OrderedGroup {
        let array = Arc::new(Float64Array::from(values.to_vec())) as ArrayRef;
        ordered_group(vec![array], 1)
    }

    fn order_by(data_type: DataType) -> Vec<(DataType, SortOptions)> {
        vec![(data_type, SortOptions::default())]
    }

    const VALUES: [f64; 7] = [0.0, 1.5, 3.0, 3.0, 3.5, 6.0, 6.0];

    #[test]
    fn rows_frames() -> Result<()> {
        let group = float_group(&VALUES);
        let evaluator =
            FrameEvaluator::try_new(&FrameSpec::rows_around(1, 2), &order_by(DataType::Float64))?;
        let frames = evaluator.evaluate(&group)?;
        assert_eq!(frames[0].lo(), Some(0));
        assert_eq!(frames[0].hi(), Some(2));
        assert_eq!(frames[6].range(), 5..7);
        assert_eq!(
            sums(&VALUES, &frames),
            vec![4.5, 7.5, 11.0, 15.5, 18.5, 15.5, 12.0]
        );
        Ok(())
    }

    #[test]
    fn range_frames() -> Result<()> {
        let group = float_group(&VALUES);
        let evaluator = FrameEvaluator::try_new(
            &FrameSpec::range_around(1, 2)?,
            &order_by(DataType::Float64),
        )?;
        let frames = evaluator.evaluate(&group)?;
        assert_eq!(
            sums(&VALUES, &frames),
            vec![1.5, 11.0, 9.5, 9.5, 9.5, 12.0, 12.0]
        );
        // peers of a boundary value are never split
        assert_eq!(frames[2].range(), frames[3].range());
        Ok(())
    }

    #[rstest]
    #[case(FrameSpec::RowsBetween(3, 5), vec![(3, 6), (4, 6), (5, 6), (5, 6), (5, 6), (5, 6)])]
    #[case(FrameSpec::RowsBetween(-5, -3), vec![(0, 1), (0, 1), (0, 1), (0, 1), (0, 2), (0, 3)])]
    #[case(FrameSpec::RowsBetween(2, -2), vec![(2, 2), (3, 3), (4, 4), (5, 5), (5, 5), (5, 5)])]
    #[case(FrameSpec::Cumulative, vec![(0, 1), (0, 2), (0, 3), (0, 4), (0, 5), (0, 6)])]
    #[case(FrameSpec::Unbounded, vec![(0, 6); 6])]
    fn rows_edge_cases(#[case] frame: FrameSpec, #[case] expected: Vec<(usize, usize)>) -> Result<()> {
        let group = float_group(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        let frames = FrameEvaluator::try_new(&frame, &[])?.evaluate(&group)?;
        let expected: Vec<_> = expected
            .into_iter()
            .map(|(s, e)| RowFrame::new(s, e))
            .collect();
        assert_eq!(frames, expected);
        assert!(frames.iter().all(|f| f.is_empty() || f.lo() <= f.hi()));
        Ok(())
    }

    #[test]
    fn rows_past_the_end_clamp_onto_edge_row() -> Result<()> {
        let values = [1.0, 2.0, 4.0, 8.0];
        let group = float_group(&values);
        let frames = FrameEvaluator::try_new(&FrameSpec::RowsBetween(2, 3), &[])?
            .evaluate(&group)?;
        assert_eq!(sums(&values, &frames), vec![12.0, 8.0, 8.0, 8.0]);

        let frames = FrameEvaluator::try_new(&FrameSpec::RowsBetween(-3, -2), &[])?
            .evaluate(&group)?;
        assert_eq!(sums(&values, &frames), vec![1.0, 1.0, 1.0, 3.0]);
        Ok(())
    }

    #[test]
    fn widening_rows_frames_never_shrinks() -> Result<()> {
        let mut rng = StdRng::seed_from_u64(17);
        for _ in 0..200 {
            let n = rng.gen_range(1..20);
            let values: Vec<f64> = (0..n).map(|_| rng.gen_range(0..10) as f64).collect();
            let group = float_group(&values);
            let (start, end) = (rng.gen_range(-6..6), rng.gen_range(-6..6));
            let (wide_start, wide_end) = (start - rng.gen_range(0..4), end + rng.gen_range(0..4));

            let narrow = FrameEvaluator::try_new(&FrameSpec::RowsBetween(start, end), &[])?
                .evaluate(&group)?;
            let wide = FrameEvaluator::try_new(&FrameSpec::RowsBetween(wide_start, wide_end), &[])?
                .evaluate(&group)?;
            let (narrow_sums, wide_sums) = (sums(&values, &narrow), sums(&values, &wide));
            for p in 0..n {
                let context = format!(
                    "row {p} of {values:?}, ({start}, {end}) widened to ({wide_start}, {wide_end})"
                );
                assert!(narrow[p].len() <= wide[p].len(), "{context}");
                assert!(narrow_sums[p] <= wide_sums[p], "{context}");
            }
        }
        Ok(())
    }

    #[test]
    fn range_over_dates() -> Result<()> {
        let days = Arc::new(Date32Array::from(vec![0, 1, 2, 4, 7])) as ArrayRef;
        let group = ordered_group(vec![days], 1);
        let frame = FrameSpec::range_around(TimeDelta::days(1), TimeDelta::days(2))?;
        let frames = FrameEvaluator::try_new(&frame, &order_by(DataType::Date32))?
            .evaluate(&group)?;
        let ranges: Vec<_> = frames.iter().map(|f| f.range()).collect();
        assert_eq!(ranges, vec![0..3, 0..3, 1..4, 3..4, 4..5]);
        Ok(())
    }

    #[test]
    fn fractional_days_are_rejected() {
        let frame = FrameSpec::range_around(TimeDelta::hours(12), TimeDelta::days(1)).unwrap();
        let err = FrameEvaluator::try_new(&frame, &order_by(DataType::Date32)).unwrap_err();
        assert!(matches!(err, ShardwinError::FrameBoundsOverflow(_)), "{err}");
    }

    #[rstest]
    #[case(DataType::Utf8, FrameSpec::range_around(1, 1).unwrap())]
    #[case(DataType::Date32, FrameSpec::range_around(1, 1).unwrap())]
    #[case(
        DataType::Int64,
        FrameSpec::range_around(TimeDelta::days(1), TimeDelta::days(1)).unwrap()
    )]
    fn unsupported_range_frames(#[case] data_type: DataType, #[case] frame: FrameSpec) {
        let err = FrameEvaluator::try_new(&frame, &order_by(data_type)).unwrap_err();
        assert!(matches!(err, ShardwinError::UnsupportedFrameType(_)), "{err}");
    }

    #[test]
    fn range_requires_one_order_key() {
        let frame = FrameSpec::range_around(1, 1).unwrap();
        let err = FrameEvaluator::try_new(&frame, &[]).unwrap_err();
        assert!(matches!(err, ShardwinError::UnsupportedFrameType(_)));
    }

    #[test]
    fn descending_range_is_mirrored() -> Result<()> {
        let values = [6.0, 6.0, 3.5, 3.0, 3.0, 1.5, 0.0];
        let array = Arc::new(Float64Array::from(values.to_vec())) as ArrayRef;
        let mut group = ordered_group(vec![array], 1);
        // already in descending order; the helper sorts ascending, so undo it
        group.columns = vec![Arc::new(Float64Array::from(values.to_vec())) as ArrayRef];
        let options = SortOptions {
            descending: true,
            nulls_first: false,
        };
        let frame = FrameSpec::range_around(1, 2)?;
        let frames = FrameEvaluator::try_new(&frame, &[(DataType::Float64, options)])?
            .evaluate(&group)?;
        // 1 preceding reaches values up to v + 1, 2 following down to v - 2
        assert_eq!(
            sums(&values, &frames),
            vec![12.0, 12.0, 11.0, 11.0, 11.0, 1.5, 0.0]
        );
        Ok(())
    }

    #[test]
    fn null_order_values_frame_the_null_rows() -> Result<()> {
        let array = Arc::new(Float64Array::from(vec![Some(1.0), None, Some(2.0), None]))
            as ArrayRef;
        let group = ordered_group(vec![array], 1);
        let options = SortOptions {
            descending: false,
            nulls_first: true,
        };
        // ordered_group sorts nulls first with the default options
        let frame = FrameSpec::range_around(0, 5)?;
        let frames = FrameEvaluator::try_new(&frame, &[(DataType::Float64, options)])?
            .evaluate(&group)?;
        let ranges: Vec<_> = frames.iter().map(|f| f.range()).collect();
        assert_eq!(ranges, vec![0..2, 0..2, 2..4, 3..4]);
        Ok(())
    }

    #[test]
    fn overflow_reports_row_id() {
        let array = Arc::new(Int8Array::from(vec![100, 120])) as ArrayRef;
        let group = ordered_group(vec![array], 1);
        let frame = FrameSpec::range_around(0, 10).unwrap();
        let err = FrameEvaluator::try_new(&frame, &order_by(DataType::Int8))
            .unwrap()
            .evaluate(&group)
            .unwrap_err();
        assert!(matches!(err.find_root(), ShardwinError::FrameBoundsOverflow(_)));
        assert!(err.to_string().starts_with("row id 1\ncaused by\n"), "{err}");
    }

    #[test]
    fn unsigned_lower_bound_saturates() -> Result<()> {
        let array = Arc::new(UInt32Array::from(vec![0, 1, 5])) as ArrayRef;
        let group = ordered_group(vec![array], 1);
        let frame = FrameSpec::range_around(3, 0)?;
        let frames = FrameEvaluator::try_new(&frame, &order_by(DataType::UInt32))?
            .evaluate(&group)?;
        let ranges: Vec<_> = frames.iter().map(|f| f.range()).collect();
        assert_eq!(ranges, vec![0..1, 0..2, 2..3]);
        Ok(())
    }
}
