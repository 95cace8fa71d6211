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

//! [`ScalarValue`]: single values used for frame deltas and `lead`/`lag`
//! defaults

use std::fmt;
use std::sync::Arc;

use arrow::array::{
    new_null_array, ArrayRef, BooleanArray, Date32Array, Date64Array,
    DurationMicrosecondArray, DurationMillisecondArray, DurationNanosecondArray,
    DurationSecondArray, Float32Array, Float64Array, Int32Array, Int64Array,
    StringArray, TimestampMicrosecondArray, TimestampMillisecondArray,
    TimestampNanosecondArray, TimestampSecondArray, UInt64Array,
};
use arrow::datatypes::{DataType, TimeUnit};
use arrow::util::display::array_value_to_string;
use chrono::{Datelike, NaiveDate, TimeDelta};

use crate::error::{Result, ShardwinError};

/// Number of days between 0001-01-01 and 1970-01-01
const EPOCH_DAYS_FROM_CE: i32 = 719_163;

/// A dynamically typed, nullable single value.
///
/// `None` in any typed variant is a null of that type; [`ScalarValue::Null`]
/// is the untyped null.
#[derive(Debug, Clone, PartialEq)]
pub enum ScalarValue {
    /// untyped null
    Null,
    /// true or false value
    Boolean(Option<bool>),
    /// signed 32bit int
    Int32(Option<i32>),
    /// signed 64bit int
    Int64(Option<i64>),
    /// unsigned 64bit int
    UInt64(Option<u64>),
    /// 32bit float
    Float32(Option<f32>),
    /// 64bit float
    Float64(Option<f64>),
    /// utf-8 encoded string
    Utf8(Option<String>),
    /// Date stored as a signed 32bit int days since UNIX epoch 1970-01-01
    Date32(Option<i32>),
    /// Date stored as a signed 64bit int milliseconds since UNIX epoch 1970-01-01
    Date64(Option<i64>),
    /// Timestamp Second
    TimestampSecond(Option<i64>, Option<Arc<str>>),
    /// Timestamp Milliseconds
    TimestampMillisecond(Option<i64>, Option<Arc<str>>),
    /// Timestamp Microseconds
    TimestampMicrosecond(Option<i64>, Option<Arc<str>>),
    /// Timestamp Nanoseconds
    TimestampNanosecond(Option<i64>, Option<Arc<str>>),
    /// Duration in seconds
    DurationSecond(Option<i64>),
    /// Duration in milliseconds
    DurationMillisecond(Option<i64>),
    /// Duration in microseconds
    DurationMicrosecond(Option<i64>),
    /// Duration in nanoseconds
    DurationNanosecond(Option<i64>),
}

macro_rules! typed_array {
    ($ARRAY:ident, $VALUE:expr, $SIZE:expr) => {
        Arc::new($ARRAY::from(vec![*$VALUE; $SIZE])) as ArrayRef
    };
    ($ARRAY:ident, $VALUE:expr, $TZ:expr, $SIZE:expr) => {
        Arc::new($ARRAY::from(vec![*$VALUE; $SIZE]).with_timezone_opt($TZ.clone()))
            as ArrayRef
    };
}

impl ScalarValue {
    /// Returns the Arrow type of this value
    pub fn data_type(&self) -> DataType {
        match self {
            ScalarValue::Null => DataType::Null,
            ScalarValue::Boolean(_) => DataType::Boolean,
            ScalarValue::Int32(_) => DataType::Int32,
            ScalarValue::Int64(_) => DataType::Int64,
            ScalarValue::UInt64(_) => DataType::UInt64,
            ScalarValue::Float32(_) => DataType::Float32,
            ScalarValue::Float64(_) => DataType::Float64,
            ScalarValue::Utf8(_) => DataType::Utf8,
            ScalarValue::Date32(_) => DataType::Date32,
            ScalarValue::Date64(_) => DataType::Date64,
            ScalarValue::TimestampSecond(_, tz) => {
                DataType::Timestamp(TimeUnit::Second, tz.clone())
            }
            ScalarValue::TimestampMillisecond(_, tz) => {
                DataType::Timestamp(TimeUnit::Millisecond, tz.clone())
            }
            ScalarValue::TimestampMicrosecond(_, tz) => {
                DataType::Timestamp(TimeUnit::Microsecond, tz.clone())
            }
            ScalarValue::TimestampNanosecond(_, tz) => {
                DataType::Timestamp(TimeUnit::Nanosecond, tz.clone())
            }
            ScalarValue::DurationSecond(_) => DataType::Duration(TimeUnit::Second),
            ScalarValue::DurationMillisecond(_) => {
                DataType::Duration(TimeUnit::Millisecond)
            }
            ScalarValue::DurationMicrosecond(_) => {
                DataType::Duration(TimeUnit::Microsecond)
            }
            ScalarValue::DurationNanosecond(_) => DataType::Duration(TimeUnit::Nanosecond),
        }
    }

    /// Returns true if this is a null of any type
    pub fn is_null(&self) -> bool {
        match self {
            ScalarValue::Null => true,
            ScalarValue::Boolean(v) => v.is_none(),
            ScalarValue::Utf8(v) => v.is_none(),
            ScalarValue::Float32(v) => v.is_none(),
            ScalarValue::Float64(v) => v.is_none(),
            ScalarValue::UInt64(v) => v.is_none(),
            ScalarValue::Int32(v) | ScalarValue::Date32(v) => v.is_none(),
            ScalarValue::Int64(v)
            | ScalarValue::Date64(v)
            | ScalarValue::TimestampSecond(v, _)
            | ScalarValue::TimestampMillisecond(v, _)
            | ScalarValue::TimestampMicrosecond(v, _)
            | ScalarValue::TimestampNanosecond(v, _)
            | ScalarValue::DurationSecond(v)
            | ScalarValue::DurationMillisecond(v)
            | ScalarValue::DurationMicrosecond(v)
            | ScalarValue::DurationNanosecond(v) => v.is_none(),
        }
    }

    /// Converts a scalar value into a 1-row array.
    pub fn to_array(&self) -> Result<ArrayRef> {
        self.to_array_of_size(1)
    }

    /// Converts a scalar value into an array of `size` rows.
    pub fn to_array_of_size(&self, size: usize) -> Result<ArrayRef> {
        Ok(match self {
            ScalarValue::Null => new_null_array(&DataType::Null, size),
            ScalarValue::Boolean(v) => typed_array!(BooleanArray, v, size),
            ScalarValue::Int32(v) => typed_array!(Int32Array, v, size),
            ScalarValue::Int64(v) => typed_array!(Int64Array, v, size),
            ScalarValue::UInt64(v) => typed_array!(UInt64Array, v, size),
            ScalarValue::Float32(v) => typed_array!(Float32Array, v, size),
            ScalarValue::Float64(v) => typed_array!(Float64Array, v, size),
            ScalarValue::Utf8(v) => {
                Arc::new(StringArray::from(vec![v.as_deref(); size])) as ArrayRef
            }
            ScalarValue::Date32(v) => typed_array!(Date32Array, v, size),
            ScalarValue::Date64(v) => typed_array!(Date64Array, v, size),
            ScalarValue::TimestampSecond(v, tz) => {
                typed_array!(TimestampSecondArray, v, tz, size)
            }
            ScalarValue::TimestampMillisecond(v, tz) => {
                typed_array!(TimestampMillisecondArray, v, tz, size)
            }
            ScalarValue::TimestampMicrosecond(v, tz) => {
                typed_array!(TimestampMicrosecondArray, v, tz, size)
            }
            ScalarValue::TimestampNanosecond(v, tz) => {
                typed_array!(TimestampNanosecondArray, v, tz, size)
            }
            ScalarValue::DurationSecond(v) => typed_array!(DurationSecondArray, v, size),
            ScalarValue::DurationMillisecond(v) => {
                typed_array!(DurationMillisecondArray, v, size)
            }
            ScalarValue::DurationMicrosecond(v) => {
                typed_array!(DurationMicrosecondArray, v, size)
            }
            ScalarValue::DurationNanosecond(v) => {
                typed_array!(DurationNanosecondArray, v, size)
            }
        })
    }

    /// Returns the arithmetic negation of this value.
    ///
    /// An unsigned value negates into an `Int64`; a null stays null.
    pub fn arithmetic_negate(&self) -> Result<Self> {
        fn neg_i64(v: &Option<i64>) -> Result<Option<i64>> {
            v.map(|v| {
                v.checked_neg().ok_or_else(|| {
                    ShardwinError::FrameBoundsOverflow(format!("cannot negate {v}"))
                })
            })
            .transpose()
        }

        Ok(match self {
            ScalarValue::Null => ScalarValue::Null,
            ScalarValue::Int32(v) => ScalarValue::Int32(
                v.map(|v| {
                    v.checked_neg().ok_or_else(|| {
                        ShardwinError::FrameBoundsOverflow(format!("cannot negate {v}"))
                    })
                })
                .transpose()?,
            ),
            ScalarValue::Int64(v) => ScalarValue::Int64(neg_i64(v)?),
            ScalarValue::UInt64(v) => ScalarValue::Int64(
                v.map(|v| {
                    i64::try_from(v).map(|v| -v).map_err(|_| {
                        ShardwinError::FrameBoundsOverflow(format!("cannot negate {v}"))
                    })
                })
                .transpose()?,
            ),
            ScalarValue::Float32(v) => ScalarValue::Float32(v.map(|v| -v)),
            ScalarValue::Float64(v) => ScalarValue::Float64(v.map(|v| -v)),
            ScalarValue::DurationSecond(v) => ScalarValue::DurationSecond(neg_i64(v)?),
            ScalarValue::DurationMillisecond(v) => {
                ScalarValue::DurationMillisecond(neg_i64(v)?)
            }
            ScalarValue::DurationMicrosecond(v) => {
                ScalarValue::DurationMicrosecond(neg_i64(v)?)
            }
            ScalarValue::DurationNanosecond(v) => {
                ScalarValue::DurationNanosecond(neg_i64(v)?)
            }
            other => {
                return Err(ShardwinError::TypeMismatch(format!(
                    "cannot negate a value of type {}",
                    other.data_type()
                )))
            }
        })
    }
}

impl fmt::Display for ScalarValue {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.is_null() {
            return write!(f, "NULL");
        }
        let array = self.to_array().map_err(|_| fmt::Error)?;
        let value = array_value_to_string(&array, 0).map_err(|_| fmt::Error)?;
        write!(f, "{value}")
    }
}

macro_rules! impl_scalar {
    ($ty:ty, $scalar:tt) => {
        impl From<$ty> for ScalarValue {
            fn from(value: $ty) -> Self {
                ScalarValue::$scalar(Some(value))
            }
        }

        impl From<Option<$ty>> for ScalarValue {
            fn from(value: Option<$ty>) -> Self {
                ScalarValue::$scalar(value)
            }
        }
    };
}

impl_scalar!(bool, Boolean);
impl_scalar!(i32, Int32);
impl_scalar!(i64, Int64);
impl_scalar!(u64, UInt64);
impl_scalar!(f32, Float32);
impl_scalar!(f64, Float64);
impl_scalar!(String, Utf8);

impl From<&str> for ScalarValue {
    fn from(value: &str) -> Self {
        Some(value).into()
    }
}

impl From<Option<&str>> for ScalarValue {
    fn from(value: Option<&str>) -> Self {
        ScalarValue::Utf8(value.map(ToString::to_string))
    }
}

impl From<NaiveDate> for ScalarValue {
    fn from(value: NaiveDate) -> Self {
        ScalarValue::Date32(Some(value.num_days_from_ce() - EPOCH_DAYS_FROM_CE))
    }
}

/// Durations keep nanosecond resolution unless that overflows `i64`.
impl From<TimeDelta> for ScalarValue {
    fn from(value: TimeDelta) -> Self {
        match value.num_nanoseconds() {
            Some(ns) => ScalarValue::DurationNanosecond(Some(ns)),
            None => ScalarValue::DurationMicrosecond(value.num_microseconds()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::Array;
    use rstest::rstest;

    #[rstest]
    #[case(ScalarValue::from(1.5), "1.5")]
    #[case(ScalarValue::from(-3_i64), "-3")]
    #[case(ScalarValue::Int64(None), "NULL")]
    #[case(ScalarValue::from("a"), "a")]
    #[case(
        ScalarValue::from(NaiveDate::from_ymd_opt(2024, 1, 2).unwrap()),
        "2024-01-02"
    )]
    fn display(#[case] value: ScalarValue, #[case] expected: &str) {
        assert_eq!(value.to_string(), expected);
    }

    #[test]
    fn date_is_days_since_epoch() {
        let date = NaiveDate::from_ymd_opt(1970, 1, 11).unwrap();
        assert_eq!(ScalarValue::from(date), ScalarValue::Date32(Some(10)));
    }

    #[test]
    fn duration_resolution() {
        assert_eq!(
            ScalarValue::from(TimeDelta::days(1)),
            ScalarValue::DurationNanosecond(Some(86_400_000_000_000))
        );
        let huge = TimeDelta::days(365 * 1000);
        assert!(matches!(
            ScalarValue::from(huge),
            ScalarValue::DurationMicrosecond(Some(_))
        ));
    }

    #[test]
    fn negate() -> Result<()> {
        assert_eq!(
            ScalarValue::from(2_u64).arithmetic_negate()?,
            ScalarValue::Int64(Some(-2))
        );
        assert_eq!(
            ScalarValue::from(1.5).arithmetic_negate()?,
            ScalarValue::Float64(Some(-1.5))
        );
        assert_eq!(
            ScalarValue::DurationSecond(Some(5)).arithmetic_negate()?,
            ScalarValue::DurationSecond(Some(-5))
        );
        let err = ScalarValue::from(i64::MIN).arithmetic_negate().unwrap_err();
        assert!(matches!(err, ShardwinError::FrameBoundsOverflow(_)));
        let err = ScalarValue::from("x").arithmetic_negate().unwrap_err();
        assert!(matches!(err, ShardwinError::TypeMismatch(_)));
        Ok(())
    }

    #[test]
    fn to_array_of_size_keeps_type() -> Result<()> {
        let value = ScalarValue::TimestampSecond(Some(1), Some("UTC".into()));
        let array = value.to_array_of_size(3)?;
        assert_eq!(array.len(), 3);
        assert_eq!(array.data_type(), &value.data_type());

        let array = ScalarValue::Float64(None).to_array_of_size(2)?;
        assert_eq!(array.null_count(), 2);
        Ok(())
    }
}
