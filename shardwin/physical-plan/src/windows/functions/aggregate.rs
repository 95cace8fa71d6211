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

//! Aggregates over row frames.
//!
//! Every aggregate is written as a [`FrameAccumulator`] that can add and
//! remove single rows. When consecutive frames overlap and move forward,
//! only the rows entering and leaving the frame are touched; otherwise the
//! frame is aggregated from scratch.
//!
//! Floating point sums cannot be retracted: subtracting a value back out of
//! a sum does not undo adding it once `inf`, `NaN` or values of very
//! different magnitudes are involved. Their frames only slide while the
//! start stays put (cumulative and whole-partition frames) and are rebuilt
//! whenever the start moves, so they always equal the frame summed from
//! its first row.

use std::collections::VecDeque;
use std::sync::Arc;

use arrow::array::{
    Array, ArrayRef, ArrowNativeTypeOp, ArrowPrimitiveType, Float64Array, Int64Array,
    PrimitiveArray, UInt64Array,
};
use arrow::compute::{cast, take};
use arrow::datatypes::{DataType, Float64Type, Int64Type, UInt64Type};
use arrow::row::{RowConverter, Rows, SortField};
use shardwin_common::cast::{as_float64_array, as_primitive_array};
use shardwin_common::{internal_err, Result};
use shardwin_expr::AggregateFunction;

use crate::windows::frame::RowFrame;

/// Incremental state of an aggregate over a frame of row positions
pub(crate) trait FrameAccumulator {
    type Output;

    /// Adds the row at `index` to the frame
    fn update(&mut self, index: usize);

    /// Removes the row at `index`, which must be the oldest row in the frame
    fn retract(&mut self, index: usize);

    /// False if [`Self::retract`] is not exact
    fn supports_retract(&self) -> bool {
        true
    }

    /// Empties the frame
    fn reset(&mut self);

    /// Returns the aggregate of the current frame
    fn evaluate(&self) -> Self::Output;
}

/// Evaluates `acc` over every frame. With `sliding` unset, every frame is
/// aggregated from scratch.
pub(crate) fn evaluate_frames<A: FrameAccumulator>(
    mut acc: A,
    frames: &[RowFrame],
    sliding: bool,
) -> Vec<A::Output> {
    let retractable = acc.supports_retract();
    let mut current = 0..0;
    frames
        .iter()
        .map(|frame| {
            let next = frame.range();
            if !sliding
                || next.start < current.start
                || next.end < current.end
                || next.start > current.end
                || (next.start != current.start && !retractable)
            {
                acc.reset();
                current = next.start..next.start;
            }
            for index in current.start..next.start {
                acc.retract(index);
            }
            for index in current.end..next.end {
                acc.update(index);
            }
            current = next;
            acc.evaluate()
        })
        .collect()
}

/// Sum of the non-null values; zero for an empty frame. Integer sums wrap.
struct SumAccumulator<'a, T: ArrowPrimitiveType> {
    values: &'a PrimitiveArray<T>,
    sum: T::Native,
}

impl<'a, T: ArrowPrimitiveType> SumAccumulator<'a, T> {
    fn new(values: &'a PrimitiveArray<T>) -> Self {
        Self {
            values,
            sum: T::Native::ZERO,
        }
    }
}

impl<T: ArrowPrimitiveType> FrameAccumulator for SumAccumulator<'_, T> {
    type Output = T::Native;

    fn update(&mut self, index: usize) {
        if self.values.is_valid(index) {
            self.sum = self.sum.add_wrapping(self.values.value(index));
        }
    }

    fn retract(&mut self, index: usize) {
        if self.values.is_valid(index) {
            self.sum = self.sum.sub_wrapping(self.values.value(index));
        }
    }

    fn supports_retract(&self) -> bool {
        !T::DATA_TYPE.is_floating()
    }

    fn reset(&mut self) {
        self.sum = T::Native::ZERO;
    }

    fn evaluate(&self) -> T::Native {
        self.sum
    }
}

/// Number of non-null values
struct CountAccumulator<'a> {
    values: &'a dyn Array,
    count: i64,
}

impl FrameAccumulator for CountAccumulator<'_> {
    type Output = i64;

    fn update(&mut self, index: usize) {
        if self.values.is_valid(index) {
            self.count += 1;
        }
    }

    fn retract(&mut self, index: usize) {
        if self.values.is_valid(index) {
            self.count -= 1;
        }
    }

    fn reset(&mut self) {
        self.count = 0;
    }

    fn evaluate(&self) -> i64 {
        self.count
    }
}

/// Mean of the non-null values; null when there are none
struct MeanAccumulator<'a> {
    values: &'a Float64Array,
    sum: f64,
    count: u64,
}

impl FrameAccumulator for MeanAccumulator<'_> {
    type Output = Option<f64>;

    fn update(&mut self, index: usize) {
        if self.values.is_valid(index) {
            self.sum += self.values.value(index);
            self.count += 1;
        }
    }

    fn retract(&mut self, index: usize) {
        if self.values.is_valid(index) {
            self.sum -= self.values.value(index);
            self.count -= 1;
        }
    }

    fn supports_retract(&self) -> bool {
        false
    }

    fn reset(&mut self) {
        self.sum = 0.0;
        self.count = 0;
    }

    fn evaluate(&self) -> Option<f64> {
        (self.count > 0).then(|| self.sum / self.count as f64)
    }
}

/// Position of the minimum or maximum non-null value, kept with a monotonic
/// deque of candidate positions. Values are compared in the row format so
/// any orderable type works.
struct MinMaxAccumulator<'a> {
    rows: Rows,
    values: &'a dyn Array,
    /// set for max, unset for min
    max: bool,
    candidates: VecDeque<usize>,
}

impl FrameAccumulator for MinMaxAccumulator<'_> {
    type Output = Option<u64>;

    fn update(&mut self, index: usize) {
        if self.values.is_null(index) {
            return;
        }
        let new = self.rows.row(index);
        while let Some(&back) = self.candidates.back() {
            let old = self.rows.row(back);
            let dominated = if self.max { old <= new } else { old >= new };
            if !dominated {
                break;
            }
            self.candidates.pop_back();
        }
        self.candidates.push_back(index);
    }

    fn retract(&mut self, index: usize) {
        if self.candidates.front() == Some(&index) {
            self.candidates.pop_front();
        }
    }

    fn reset(&mut self) {
        self.candidates.clear();
    }

    fn evaluate(&self) -> Option<u64> {
        self.candidates.front().map(|&i| i as u64)
    }
}

/// Evaluates one [`AggregateFunction`] over the frames of a group
#[derive(Debug, Clone)]
pub struct AggregateEvaluator {
    func: AggregateFunction,
    return_type: DataType,
    sliding: bool,
}

impl AggregateEvaluator {
    pub(crate) fn new(func: AggregateFunction, return_type: DataType, sliding: bool) -> Self {
        Self {
            func,
            return_type,
            sliding,
        }
    }

    /// Aggregates `values` over each of `frames`
    pub fn evaluate(&self, values: &ArrayRef, frames: &[RowFrame]) -> Result<ArrayRef> {
        let sliding = self.sliding;
        Ok(match self.func {
            AggregateFunction::Count => {
                let acc = CountAccumulator {
                    values: values.as_ref(),
                    count: 0,
                };
                Arc::new(Int64Array::from(evaluate_frames(acc, frames, sliding)))
            }
            AggregateFunction::Sum => {
                let values = cast(values, &self.return_type)?;
                match &self.return_type {
                    DataType::Int64 => sum::<Int64Type>(&values, frames, sliding)?,
                    DataType::UInt64 => sum::<UInt64Type>(&values, frames, sliding)?,
                    DataType::Float64 => sum::<Float64Type>(&values, frames, sliding)?,
                    other => return internal_err!("sum cannot produce {other}"),
                }
            }
            AggregateFunction::Mean => {
                let values = cast(values, &DataType::Float64)?;
                let acc = MeanAccumulator {
                    values: as_float64_array(&values)?,
                    sum: 0.0,
                    count: 0,
                };
                Arc::new(Float64Array::from(evaluate_frames(acc, frames, sliding)))
            }
            AggregateFunction::Min | AggregateFunction::Max => {
                let converter =
                    RowConverter::new(vec![SortField::new(values.data_type().clone())])?;
                let acc = MinMaxAccumulator {
                    rows: converter.convert_columns(&[Arc::clone(values)])?,
                    values: values.as_ref(),
                    max: self.func == AggregateFunction::Max,
                    candidates: VecDeque::new(),
                };
                let indices = UInt64Array::from(evaluate_frames(acc, frames, sliding));
                take(values.as_ref(), &indices, None)?
            }
        })
    }
}

fn sum<T: ArrowPrimitiveType>(
    values: &ArrayRef,
    frames: &[RowFrame],
    sliding: bool,
) -> Result<ArrayRef> {
    let acc = SumAccumulator::new(as_primitive_array::<T>(values)?);
    let sums = evaluate_frames(acc, frames, sliding);
    Ok(Arc::new(PrimitiveArray::<T>::from_iter_values(sums)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::{Int32Array, StringArray, UInt8Array};
    use rstest::rstest;
    use shardwin_common::cast::{as_int64_array, as_string_array, as_uint64_array};

    const VALUES: [f64; 7] = [0.0, 1.5, 3.0, 3.0, 3.5, 6.0, 6.0];

    fn rows_around(n: usize, preceding: usize, following: usize) -> Vec<RowFrame> {
        (0..n)
            .map(|p| {
                RowFrame::new(p.saturating_sub(preceding), (p + following + 1).min(n))
            })
            .collect()
    }

    fn evaluate(
        func: AggregateFunction,
        values: ArrayRef,
        frames: &[RowFrame],
        sliding: bool,
    ) -> Result<ArrayRef> {
        let return_type = func.return_type(values.data_type())?;
        AggregateEvaluator::new(func, return_type, sliding).evaluate(&values, frames)
    }

    #[test]
    fn sliding_sum_matches_scenario() -> Result<()> {
        let values = Arc::new(Float64Array::from(VALUES.to_vec())) as ArrayRef;
        let frames = rows_around(7, 1, 2);
        for sliding in [true, false] {
            let sums = evaluate(AggregateFunction::Sum, Arc::clone(&values), &frames, sliding)?;
            assert_eq!(
                as_float64_array(&sums)?.values().to_vec(),
                vec![4.5, 7.5, 11.0, 15.5, 18.5, 15.5, 12.0]
            );
        }
        Ok(())
    }

    #[test]
    fn nulls_and_empty_frames() -> Result<()> {
        let values = Arc::new(Int32Array::from(vec![Some(1), None, Some(3)])) as ArrayRef;
        let frames = vec![
            RowFrame::new(0, 3),
            RowFrame::new(1, 2),
            RowFrame::new(3, 3),
        ];

        let sums = evaluate(AggregateFunction::Sum, Arc::clone(&values), &frames, true)?;
        assert_eq!(sums.data_type(), &DataType::Int64);
        assert_eq!(as_int64_array(&sums)?.values().to_vec(), vec![4, 0, 0]);
        assert_eq!(sums.null_count(), 0);

        let counts = evaluate(AggregateFunction::Count, Arc::clone(&values), &frames, true)?;
        assert_eq!(as_int64_array(&counts)?.values().to_vec(), vec![2, 0, 0]);

        let means = evaluate(AggregateFunction::Mean, Arc::clone(&values), &frames, true)?;
        let means = as_float64_array(&means)?;
        assert_eq!(means.value(0), 2.0);
        assert!(means.is_null(1));
        assert!(means.is_null(2));

        let mins = evaluate(AggregateFunction::Min, values, &frames, true)?;
        assert_eq!(mins.data_type(), &DataType::Int32);
        assert_eq!(mins.null_count(), 2);
        Ok(())
    }

    #[test]
    fn unsigned_sum() -> Result<()> {
        let values = Arc::new(UInt8Array::from(vec![200, 100])) as ArrayRef;
        let frames = vec![RowFrame::new(0, 2); 2];
        let sums = evaluate(AggregateFunction::Sum, values, &frames, true)?;
        assert_eq!(as_uint64_array(&sums)?.values().to_vec(), vec![300, 300]);
        Ok(())
    }

    #[test]
    fn integer_sum_wraps() -> Result<()> {
        let values = Arc::new(Int64Array::from(vec![i64::MAX, 1])) as ArrayRef;
        let frames = vec![RowFrame::new(0, 2)];
        let sums = evaluate(AggregateFunction::Sum, values, &frames, false)?;
        assert_eq!(as_int64_array(&sums)?.value(0), i64::MIN);
        Ok(())
    }

    #[test]
    fn sliding_min_max() -> Result<()> {
        let values =
            Arc::new(Int64Array::from(vec![5, 1, 4, 1, 9, 2, 6, 5, 3])) as ArrayRef;
        let frames = rows_around(9, 2, 1);
        for (func, expected) in [
            (AggregateFunction::Min, vec![1, 1, 1, 1, 1, 1, 2, 2, 3]),
            (AggregateFunction::Max, vec![5, 5, 5, 9, 9, 9, 9, 6, 6]),
        ] {
            let sliding = evaluate(func, Arc::clone(&values), &frames, true)?;
            let recomputed = evaluate(func, Arc::clone(&values), &frames, false)?;
            assert_eq!(as_int64_array(&sliding)?.values().to_vec(), expected);
            assert_eq!(&sliding, &recomputed);
        }
        Ok(())
    }

    #[test]
    fn string_min_max() -> Result<()> {
        let values = Arc::new(StringArray::from(vec![
            Some("pear"),
            None,
            Some("apple"),
            Some("zucchini"),
        ])) as ArrayRef;
        let frames = vec![RowFrame::new(0, 4); 4];
        let max = evaluate(AggregateFunction::Max, Arc::clone(&values), &frames, true)?;
        assert_eq!(as_string_array(&max)?.value(0), "zucchini");
        let min = evaluate(AggregateFunction::Min, values, &frames, true)?;
        assert_eq!(as_string_array(&min)?.value(3), "apple");
        Ok(())
    }

    fn float_bits(array: &ArrayRef) -> Result<Vec<Option<u64>>> {
        Ok(as_float64_array(array)?
            .iter()
            .map(|v| v.map(f64::to_bits))
            .collect())
    }

    #[rstest]
    #[case(vec![f64::INFINITY, 1.0, 2.0], vec![f64::INFINITY, f64::INFINITY, 3.0])]
    #[case(vec![f64::NAN, 1.0, 2.0], vec![f64::NAN, f64::NAN, 3.0])]
    #[case(vec![1.0, f64::NEG_INFINITY, 2.0, 4.0], vec![1.0, f64::NEG_INFINITY, f64::NEG_INFINITY, 6.0])]
    #[case(vec![1e16, 1.0, 1.0], vec![1e16, 1e16, 2.0])]
    fn float_sums_leave_no_residue(#[case] values: Vec<f64>, #[case] expected: Vec<f64>) -> Result<()> {
        let values = Arc::new(Float64Array::from(values)) as ArrayRef;
        // one preceding row and the current row
        let frames = rows_around(values.len(), 1, 0);
        let expected = Arc::new(Float64Array::from(expected)) as ArrayRef;
        for sliding in [true, false] {
            let sums = evaluate(AggregateFunction::Sum, Arc::clone(&values), &frames, sliding)?;
            assert_eq!(float_bits(&sums)?, float_bits(&expected)?, "sliding: {sliding}");
        }

        let sliding = evaluate(AggregateFunction::Mean, Arc::clone(&values), &frames, true)?;
        let recomputed = evaluate(AggregateFunction::Mean, values, &frames, false)?;
        assert_eq!(float_bits(&sliding)?, float_bits(&recomputed)?);
        Ok(())
    }

    #[test]
    fn float_sums_slide_while_the_start_is_fixed() -> Result<()> {
        let values = Arc::new(Float64Array::from(vec![0.1, 0.2, f64::INFINITY, 0.3])) as ArrayRef;
        let frames: Vec<_> = (0..4).map(|p| RowFrame::new(0, p + 1)).collect();
        let sums = evaluate(AggregateFunction::Sum, values, &frames, true)?;
        assert_eq!(
            as_float64_array(&sums)?.values().to_vec(),
            vec![0.1, 0.1 + 0.2, f64::INFINITY, f64::INFINITY]
        );
        Ok(())
    }

    #[test]
    fn non_monotonic_frames_fall_back_to_recompute() -> Result<()> {
        let values = Arc::new(Int64Array::from(vec![1, 2, 4, 8])) as ArrayRef;
        let frames = vec![
            RowFrame::new(2, 4),
            RowFrame::new(0, 2),
            RowFrame::new(3, 4),
            RowFrame::new(0, 1),
        ];
        let sums = evaluate(AggregateFunction::Sum, values, &frames, true)?;
        assert_eq!(as_int64_array(&sums)?.values().to_vec(), vec![12, 3, 8, 1]);
        Ok(())
    }
}
