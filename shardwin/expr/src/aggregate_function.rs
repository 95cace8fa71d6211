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

//! Aggregate function module contains the aggregates that can be evaluated
//! over a window frame

use std::{fmt, str::FromStr};

use arrow::datatypes::DataType;
use arrow::row::{RowConverter, SortField};
use shardwin_common::{type_mismatch_err, Result, ShardwinError};

/// Enum of all aggregate functions usable as window functions
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Hash)]
pub enum AggregateFunction {
    /// count of non-null values
    Count,
    /// sum
    Sum,
    /// arithmetic mean
    Mean,
    /// min
    Min,
    /// max
    Max,
}

impl AggregateFunction {
    /// Returns the output type of this aggregate over `input`
    pub fn return_type(&self, input: &DataType) -> Result<DataType> {
        match self {
            AggregateFunction::Count => Ok(DataType::Int64),
            AggregateFunction::Sum => match input {
                DataType::Int8 | DataType::Int16 | DataType::Int32 | DataType::Int64 => {
                    Ok(DataType::Int64)
                }
                DataType::UInt8
                | DataType::UInt16
                | DataType::UInt32
                | DataType::UInt64 => Ok(DataType::UInt64),
                DataType::Float16 | DataType::Float32 | DataType::Float64 => {
                    Ok(DataType::Float64)
                }
                other => type_mismatch_err!("sum does not support inputs of type {other}"),
            },
            AggregateFunction::Mean if input.is_numeric() => Ok(DataType::Float64),
            AggregateFunction::Mean => {
                type_mismatch_err!("mean does not support inputs of type {input}")
            }
            AggregateFunction::Min | AggregateFunction::Max => {
                if *input != DataType::Null
                    && RowConverter::supports_fields(&[SortField::new(input.clone())])
                {
                    Ok(input.clone())
                } else {
                    type_mismatch_err!("{self} does not support inputs of type {input}")
                }
            }
        }
    }
}

impl fmt::Display for AggregateFunction {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        // lowercase of the debug.
        write!(f, "{}", format!("{self:?}").to_lowercase())
    }
}

impl FromStr for AggregateFunction {
    type Err = ShardwinError;
    fn from_str(name: &str) -> Result<AggregateFunction> {
        Ok(match name.to_lowercase().as_str() {
            "count" => AggregateFunction::Count,
            "sum" => AggregateFunction::Sum,
            "mean" | "avg" => AggregateFunction::Mean,
            "min" => AggregateFunction::Min,
            "max" => AggregateFunction::Max,
            _ => {
                return Err(ShardwinError::Execution(format!(
                    "There is no aggregate window function named {name}"
                )));
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(AggregateFunction::Sum, DataType::Int32, DataType::Int64)]
    #[case(AggregateFunction::Sum, DataType::UInt8, DataType::UInt64)]
    #[case(AggregateFunction::Sum, DataType::Float32, DataType::Float64)]
    #[case(AggregateFunction::Mean, DataType::Int64, DataType::Float64)]
    #[case(AggregateFunction::Count, DataType::Utf8, DataType::Int64)]
    #[case(AggregateFunction::Min, DataType::Utf8, DataType::Utf8)]
    #[case(AggregateFunction::Max, DataType::Date32, DataType::Date32)]
    fn return_types(
        #[case] func: AggregateFunction,
        #[case] input: DataType,
        #[case] expected: DataType,
    ) -> Result<()> {
        assert_eq!(func.return_type(&input)?, expected);
        Ok(())
    }

    #[rstest]
    #[case(AggregateFunction::Sum, DataType::Utf8)]
    #[case(AggregateFunction::Sum, DataType::Boolean)]
    #[case(AggregateFunction::Mean, DataType::Date32)]
    #[case(AggregateFunction::Min, DataType::Null)]
    fn unsupported_inputs(#[case] func: AggregateFunction, #[case] input: DataType) {
        let err = func.return_type(&input).unwrap_err();
        assert!(matches!(err, ShardwinError::TypeMismatch(_)), "{err}");
    }

    #[test]
    fn names_round_trip() -> Result<()> {
        for name in ["count", "sum", "mean", "min", "max"] {
            let func = AggregateFunction::from_str(name)?;
            assert_eq!(func, AggregateFunction::from_str(&name.to_uppercase())?);
            assert_eq!(func.to_string(), name);
        }
        assert_eq!(AggregateFunction::from_str("avg")?, AggregateFunction::Mean);
        assert!(AggregateFunction::from_str("median").is_err());
        Ok(())
    }
}
