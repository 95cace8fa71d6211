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

//! Window function module contains the closed set of functions that can be
//! evaluated over a window, and the named expressions that carry them.

use std::{fmt, str::FromStr};

use arrow::compute::can_cast_types;
use arrow::datatypes::DataType;
use shardwin_common::{
    internal_err, offset_err, type_mismatch_err, Result, ScalarValue, ShardwinError,
};

use crate::aggregate_function::AggregateFunction;
use crate::column::Column;

/// Functions that depend only on the position of a row within its ordered
/// group and on its tie group
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RankingFunction {
    /// number of the current row within its partition, counting from 1
    RowNumber,
    /// rank of the current row with gaps; same as row_number of its first peer
    Rank,
    /// rank of the current row without gaps; this function counts peer groups
    DenseRank,
}

/// Direction in which `lead`/`lag` reach from the current row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OffsetDirection {
    /// returns value evaluated at the row that is offset rows after the
    /// current row within the partition
    Lead,
    /// returns value evaluated at the row that is offset rows before the
    /// current row within the partition
    Lag,
}

/// A window function together with its arguments
#[derive(Debug, Clone, PartialEq)]
pub enum WindowFunctionKind {
    /// An aggregate combined over each row's frame
    Aggregate {
        /// the aggregate
        func: AggregateFunction,
        /// aggregated column
        arg: Column,
    },
    /// A ranking function over the ordered group
    Ranking(RankingFunction),
    /// `lead` or `lag`. If there is no row at the offset, `default` is
    /// returned, or null when no default is given.
    Offset {
        /// lead or lag
        direction: OffsetDirection,
        /// column whose value is read
        arg: Column,
        /// number of rows to reach; must not be negative
        offset: i64,
        /// value returned for rows whose offset falls outside the group
        default: Option<ScalarValue>,
    },
}

impl WindowFunctionKind {
    /// `row_number()`
    pub fn row_number() -> Self {
        Self::Ranking(RankingFunction::RowNumber)
    }

    /// `rank()`
    pub fn rank() -> Self {
        Self::Ranking(RankingFunction::Rank)
    }

    /// `dense_rank()`
    pub fn dense_rank() -> Self {
        Self::Ranking(RankingFunction::DenseRank)
    }

    /// The column read by this function, if any
    pub fn argument(&self) -> Option<&Column> {
        match self {
            WindowFunctionKind::Aggregate { arg, .. }
            | WindowFunctionKind::Offset { arg, .. } => Some(arg),
            WindowFunctionKind::Ranking(_) => None,
        }
    }

    /// Checks the arguments that do not depend on the input schema
    pub fn validate(&self) -> Result<()> {
        match self {
            WindowFunctionKind::Offset {
                direction, offset, ..
            } if *offset < 0 => {
                offset_err!("{direction} offset must be non-negative, got {offset}")
            }
            _ => Ok(()),
        }
    }

    /// Returns the output type given the type of [`Self::argument`]
    pub fn return_type(&self, input: Option<&DataType>) -> Result<DataType> {
        match (self, input) {
            (WindowFunctionKind::Ranking(_), _) => Ok(DataType::UInt64),
            (WindowFunctionKind::Aggregate { func, .. }, Some(input)) => {
                func.return_type(input)
            }
            (
                WindowFunctionKind::Offset {
                    direction, default, ..
                },
                Some(input),
            ) => match default {
                Some(default) if !can_cast_types(&default.data_type(), input) => {
                    type_mismatch_err!(
                        "{direction} default {default} of type {} cannot be cast to {input}",
                        default.data_type()
                    )
                }
                _ => Ok(input.clone()),
            },
            (_, None) => internal_err!("{self} requires the type of its argument"),
        }
    }

    /// Names the output column of this function
    pub fn alias(self, name: impl Into<String>) -> WindowExpr {
        WindowExpr {
            function: self,
            name: name.into(),
        }
    }
}

/// Builders for window functions over a column
impl Column {
    fn aggregate(self, func: AggregateFunction) -> WindowFunctionKind {
        WindowFunctionKind::Aggregate { func, arg: self }
    }

    /// `sum(self)`
    pub fn sum(self) -> WindowFunctionKind {
        self.aggregate(AggregateFunction::Sum)
    }

    /// `mean(self)`
    pub fn mean(self) -> WindowFunctionKind {
        self.aggregate(AggregateFunction::Mean)
    }

    /// `min(self)`
    pub fn min(self) -> WindowFunctionKind {
        self.aggregate(AggregateFunction::Min)
    }

    /// `max(self)`
    pub fn max(self) -> WindowFunctionKind {
        self.aggregate(AggregateFunction::Max)
    }

    /// `count(self)`
    pub fn count(self) -> WindowFunctionKind {
        self.aggregate(AggregateFunction::Count)
    }

    /// `lead(self, offset, default)`
    pub fn lead(self, offset: i64, default: Option<ScalarValue>) -> WindowFunctionKind {
        WindowFunctionKind::Offset {
            direction: OffsetDirection::Lead,
            arg: self,
            offset,
            default,
        }
    }

    /// `lag(self, offset, default)`
    pub fn lag(self, offset: i64, default: Option<ScalarValue>) -> WindowFunctionKind {
        WindowFunctionKind::Offset {
            direction: OffsetDirection::Lag,
            arg: self,
            offset,
            default,
        }
    }
}

/// A window function with the name of the column it produces
#[derive(Debug, Clone, PartialEq)]
pub struct WindowExpr {
    /// the function
    pub function: WindowFunctionKind,
    /// name of the output column
    pub name: String,
}

impl From<WindowFunctionKind> for WindowExpr {
    fn from(function: WindowFunctionKind) -> Self {
        let name = function.to_string();
        Self { function, name }
    }
}

impl fmt::Display for WindowExpr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} AS {}", self.function, self.name)
    }
}

impl fmt::Display for RankingFunction {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match self {
            RankingFunction::RowNumber => "row_number",
            RankingFunction::Rank => "rank",
            RankingFunction::DenseRank => "dense_rank",
        })
    }
}

impl fmt::Display for OffsetDirection {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match self {
            OffsetDirection::Lead => "lead",
            OffsetDirection::Lag => "lag",
        })
    }
}

impl fmt::Display for WindowFunctionKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            WindowFunctionKind::Aggregate { func, arg } => write!(f, "{func}({arg})"),
            WindowFunctionKind::Ranking(func) => write!(f, "{func}()"),
            WindowFunctionKind::Offset {
                direction,
                arg,
                offset,
                default: None,
            } => write!(f, "{direction}({arg}, {offset})"),
            WindowFunctionKind::Offset {
                direction,
                arg,
                offset,
                default: Some(default),
            } => write!(f, "{direction}({arg}, {offset}, {default})"),
        }
    }
}

impl FromStr for RankingFunction {
    type Err = ShardwinError;
    fn from_str(name: &str) -> Result<RankingFunction> {
        Ok(match name.to_lowercase().as_str() {
            "row_number" => RankingFunction::RowNumber,
            "rank" => RankingFunction::Rank,
            "dense_rank" => RankingFunction::DenseRank,
            _ => {
                return Err(ShardwinError::Execution(format!(
                    "There is no ranking window function named {name}"
                )))
            }
        })
    }
}

impl FromStr for OffsetDirection {
    type Err = ShardwinError;
    fn from_str(name: &str) -> Result<OffsetDirection> {
        Ok(match name.to_lowercase().as_str() {
            "lead" => OffsetDirection::Lead,
            "lag" => OffsetDirection::Lag,
            _ => {
                return Err(ShardwinError::Execution(format!(
                    "There is no offset window function named {name}"
                )))
            }
        })
    }
}
