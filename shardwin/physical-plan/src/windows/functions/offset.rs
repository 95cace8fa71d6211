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

//! `lead` and `lag`

use arrow::array::{new_null_array, Array, ArrayRef};
use arrow::compute::{cast_with_options, interleave, CastOptions};
use arrow::datatypes::DataType;
use shardwin_common::{Result, ResultExt, ScalarValue};
use shardwin_expr::OffsetDirection;

/// Reads the argument `offset` rows after (lead) or before (lag) each row
/// of an ordered group
#[derive(Debug, Clone)]
pub struct OffsetEvaluator {
    direction: OffsetDirection,
    offset: i64,
    /// single row holding the default, already of the argument's type
    default: ArrayRef,
}

impl OffsetEvaluator {
    pub(crate) fn try_new(
        direction: OffsetDirection,
        offset: i64,
        default: Option<&ScalarValue>,
        data_type: &DataType,
    ) -> Result<Self> {
        let default = match default {
            Some(value) => {
                let options = CastOptions {
                    safe: false,
                    ..Default::default()
                };
                cast_with_options(&value.to_array()?, data_type, &options)
                    .with_context(|| format!("{direction} default {value}"))?
            }
            None => new_null_array(data_type, 1),
        };
        Ok(Self {
            direction,
            offset,
            default,
        })
    }

    /// Shifts `values`, filling positions without a source row with the
    /// default
    pub fn evaluate(&self, values: &ArrayRef) -> Result<ArrayRef> {
        let num_rows = values.len() as i128;
        let offset = match self.direction {
            OffsetDirection::Lead => self.offset as i128,
            OffsetDirection::Lag => -(self.offset as i128),
        };
        let indices: Vec<(usize, usize)> = (0..num_rows)
            .map(|position| {
                let source = position + offset;
                if (0..num_rows).contains(&source) {
                    (0, source as usize)
                } else {
                    (1, 0)
                }
            })
            .collect();
        Ok(interleave(
            &[values.as_ref(), self.default.as_ref()],
            &indices,
        )?)
    }
}
