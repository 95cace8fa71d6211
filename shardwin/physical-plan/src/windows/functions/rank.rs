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

//! `row_number`, `rank` and `dense_rank`, computed from the peer ranges of
//! an ordered group without looking at any frame

use std::iter;
use std::ops::Range;
use std::sync::Arc;

use arrow::array::{ArrayRef, UInt64Array};
use shardwin_expr::RankingFunction;

/// Evaluates `func` for a group of `num_rows` ordered rows split into
/// `peer_ranges`
pub(crate) fn evaluate_ranking(
    func: RankingFunction,
    num_rows: usize,
    peer_ranges: &[Range<usize>],
) -> ArrayRef {
    let result = match func {
        RankingFunction::RowNumber => UInt64Array::from_iter_values(1..=num_rows as u64),
        RankingFunction::Rank => UInt64Array::from_iter_values(
            peer_ranges
                .iter()
                .flat_map(|r| iter::repeat(r.start as u64 + 1).take(r.len())),
        ),
        RankingFunction::DenseRank => UInt64Array::from_iter_values(
            peer_ranges
                .iter()
                .zip(1u64..)
                .flat_map(|(r, rank)| iter::repeat(rank).take(r.len())),
        ),
    };
    Arc::new(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use shardwin_common::cast::as_uint64_array;
    use shardwin_common::Result;

    fn test_i64_result(
        func: RankingFunction,
        peer_ranges: &[Range<usize>],
        expected: Vec<u64>,
    ) -> Result<()> {
        let num_rows = peer_ranges.last().map(|r| r.end).unwrap_or(0);
        let result = evaluate_ranking(func, num_rows, peer_ranges);
        assert_eq!(expected, as_uint64_array(&result)?.values().to_vec());
        Ok(())
    }

    #[test]
    fn test_row_number() -> Result<()> {
        test_i64_result(RankingFunction::RowNumber, &[0..3, 3..4], vec![1, 2, 3, 4])
    }

    #[test]
    fn test_rank() -> Result<()> {
        let ranges = [0..3, 3..4, 4..6, 6..7];
        test_i64_result(RankingFunction::Rank, &ranges, vec![1, 1, 1, 4, 5, 5, 7])?;
        test_i64_result(RankingFunction::DenseRank, &ranges, vec![1, 1, 1, 2, 3, 3, 4])
    }

    #[test]
    fn test_without_order_by() -> Result<()> {
        test_i64_result(RankingFunction::Rank, &[0..4], vec![1; 4])?;
        test_i64_result(RankingFunction::DenseRank, &[0..4], vec![1; 4])?;
        test_i64_result(RankingFunction::Rank, &[], vec![])
    }
}
