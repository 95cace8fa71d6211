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

//! Evaluation of window functions over ordered groups

mod aggregate;
mod offset;
mod rank;

use arrow::array::ArrayRef;
use arrow::datatypes::DataType;
use shardwin_common::{internal_err, Result};
use shardwin_expr::{RankingFunction, WindowFunctionKind};

pub use aggregate::AggregateEvaluator;
pub use offset::OffsetEvaluator;

use super::frame::RowFrame;
use super::order::OrderedGroup;

/// A window function bound to the type of its argument
#[derive(Debug, Clone)]
pub enum WindowFunctionEvaluator {
    /// An aggregate over each row's frame
    Aggregate(AggregateEvaluator),
    /// A ranking function over the peer groups
    Ranking(RankingFunction),
    /// `lead` or `lag`
    Offset(OffsetEvaluator),
}

impl WindowFunctionEvaluator {
    /// Binds `function` to its argument type. With `sliding` unset,
    /// aggregates recompute every frame from scratch.
    pub fn try_new(
        function: &WindowFunctionKind,
        input_type: Option<&DataType>,
        sliding: bool,
    ) -> Result<Self> {
        function.validate()?;
        let return_type = function.return_type(input_type)?;
        Ok(match function {
            WindowFunctionKind::Aggregate { func, .. } => {
                Self::Aggregate(AggregateEvaluator::new(*func, return_type, sliding))
            }
            WindowFunctionKind::Ranking(func) => Self::Ranking(*func),
            WindowFunctionKind::Offset {
                direction,
                offset,
                default,
                ..
            } => Self::Offset(OffsetEvaluator::try_new(
                *direction,
                *offset,
                default.as_ref(),
                &return_type,
            )?),
        })
    }

    /// Whether this function reads the row frames
    pub fn uses_frames(&self) -> bool {
        matches!(self, Self::Aggregate(_))
    }

    /// Evaluates the function for every row of `group`. `arg` is the
    /// argument column in group order; `frames` holds each row's frame.
    pub fn evaluate(
        &self,
        group: &OrderedGroup,
        arg: Option<&ArrayRef>,
        frames: &[RowFrame],
    ) -> Result<ArrayRef> {
        let result = match (self, arg) {
            (Self::Ranking(func), _) => {
                rank::evaluate_ranking(*func, group.num_rows(), &group.peer_ranges)
            }
            (Self::Aggregate(aggregate), Some(arg)) => {
                if frames.len() != group.num_rows() {
                    return internal_err!(
                        "expected {} frames, got {}",
                        group.num_rows(),
                        frames.len()
                    );
                }
                aggregate.evaluate(arg, frames)?
            }
            (Self::Offset(offset), Some(arg)) => offset.evaluate(arg)?,
            (_, None) => return internal_err!("missing argument for {self:?}"),
        };
        if result.len() != group.num_rows() {
            return internal_err!(
                "window function produced {} values for {} rows",
                result.len(),
                group.num_rows()
            );
        }
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::windows::order::ordered_group;
    use arrow::array::{Float64Array, Int64Array};
    use shardwin_common::cast::{as_float64_array, as_uint64_array};
    use shardwin_common::ShardwinError;
    use shardwin_expr::col;
    use std::sync::Arc;

    #[test]
    fn evaluate_over_group() -> Result<()> {
        let order = Arc::new(Int64Array::from(vec![1, 1, 2, 3])) as ArrayRef;
        let values = Arc::new(Float64Array::from(vec![1.0, 2.0, 4.0, 8.0])) as ArrayRef;
        let group = ordered_group(vec![order, Arc::clone(&values)], 1);
        let frames: Vec<_> = (1..=4).map(|end| RowFrame::new(0, end)).collect();

        let rank = WindowFunctionEvaluator::try_new(&WindowFunctionKind::rank(), None, true)?;
        assert!(!rank.uses_frames());
        let ranks = rank.evaluate(&group, None, &[])?;
        assert_eq!(as_uint64_array(&ranks)?.values().to_vec(), vec![1, 1, 3, 4]);

        let sum = WindowFunctionEvaluator::try_new(
            &col("v").sum(),
            Some(&DataType::Float64),
            true,
        )?;
        assert!(sum.uses_frames());
        let sums = sum.evaluate(&group, Some(&values), &frames)?;
        assert_eq!(
            as_float64_array(&sums)?.values().to_vec(),
            vec![1.0, 3.0, 7.0, 15.0]
        );

        let lag = WindowFunctionEvaluator::try_new(
            &col("v").lag(1, None),
            Some(&DataType::Float64),
            true,
        )?;
        let lagged = lag.evaluate(&group, Some(&values), &[])?;
        assert_eq!(
            as_float64_array(&lagged)?.iter().collect::<Vec<_>>(),
            vec![None, Some(1.0), Some(2.0), Some(4.0)]
        );
        Ok(())
    }

    #[test]
    fn negative_offset_is_rejected() {
        let err = WindowFunctionEvaluator::try_new(
            &col("v").lead(-1, None),
            Some(&DataType::Float64),
            true,
        )
        .unwrap_err();
        assert!(matches!(err, ShardwinError::InvalidOffset(_)), "{err}");
    }

    #[test]
    fn missing_frames_is_internal() -> Result<()> {
        let values = Arc::new(Float64Array::from(vec![1.0])) as ArrayRef;
        let group = ordered_group(vec![Arc::clone(&values)], 0);
        let sum = WindowFunctionEvaluator::try_new(
            &col("v").sum(),
            Some(&DataType::Float64),
            false,
        )?;
        let err = sum.evaluate(&group, Some(&values), &[]).unwrap_err();
        assert!(matches!(err, ShardwinError::Internal(_)));
        Ok(())
    }
}
