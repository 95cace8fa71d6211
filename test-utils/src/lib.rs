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

//! Common utils for window function tests: deterministic random tables and
//! the different ways of splitting them into record batches

use std::sync::Arc;

use arrow::array::{ArrayRef, Float64Array, Int32Array, Int64Array, UInt32Array, UInt64Array};
use arrow::compute::take_record_batch;
use arrow::record_batch::RecordBatch;
use rand::prelude::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

pub use env_logger;

/// Returns a single batch of `len` rows with columns
///
/// * `rid`: `UInt64` row id, `0..len`
/// * `id`: `Int32` partition key in `0..distinct`, sometimes null
/// * `ts`: `Int64` order key with many ties, sometimes null
/// * `v`: `Int64` value in `-100..=100`, sometimes null
/// * `f`: `Float64` multiple of 0.5 in `-50.0..=50.0`, so that sums are exact
/// * `g`: `Float64` mixing tenths, magnitudes around `1e16`, infinities and
///   `NaN`, sometimes null
pub fn make_table(len: usize, distinct: i32, seed: u64) -> RecordBatch {
    let mut rng = StdRng::seed_from_u64(seed);
    let id: Int32Array = (0..len)
        .map(|_| (!rng.gen_bool(0.05)).then(|| rng.gen_range(0..distinct.max(1))))
        .collect();
    let ts: Int64Array = (0..len)
        .map(|_| (!rng.gen_bool(0.05)).then(|| rng.gen_range(0..(len as i64 / 4).max(1))))
        .collect();
    let v: Int64Array = (0..len)
        .map(|_| (!rng.gen_bool(0.1)).then(|| rng.gen_range(-100..=100)))
        .collect();
    let f: Float64Array = (0..len)
        .map(|_| rng.gen_range(-100..=100) as f64 / 2.0)
        .map(Some)
        .collect();
    let g: Float64Array = (0..len)
        .map(|_| match rng.gen_range(0..40) {
            0 => None,
            1 => Some(f64::INFINITY),
            2 => Some(f64::NEG_INFINITY),
            3 => Some(f64::NAN),
            4..=9 => Some(rng.gen_range(-9..=9) as f64 * 1e16),
            _ => Some(rng.gen_range(-1000..=1000) as f64 / 10.0),
        })
        .collect();

    RecordBatch::try_from_iter([
        ("rid", Arc::new(UInt64Array::from_iter_values(0..len as u64)) as ArrayRef),
        ("id", Arc::new(id) as ArrayRef),
        ("ts", Arc::new(ts) as ArrayRef),
        ("v", Arc::new(v) as ArrayRef),
        ("f", Arc::new(f) as ArrayRef),
        ("g", Arc::new(g) as ArrayRef),
    ])
    .unwrap()
}

/// Splits `batch` into `num_chunks` slices of (nearly) equal size
pub fn split_into_chunks(batch: &RecordBatch, num_chunks: usize) -> Vec<RecordBatch> {
    let num_chunks = num_chunks.max(1);
    let len = batch.num_rows();
    let size = len.div_ceil(num_chunks).max(1);
    let mut chunks: Vec<_> = (0..len)
        .step_by(size)
        .map(|offset| batch.slice(offset, size.min(len - offset)))
        .collect();
    while chunks.len() < num_chunks {
        chunks.push(batch.slice(len, 0));
    }
    chunks
}

/// Splits `batch` into randomly sized slices, with random empty batches in
/// between
pub fn make_staggered_batches(batch: &RecordBatch, rng: &mut StdRng) -> Vec<RecordBatch> {
    let mut remainder = batch.clone();
    let mut batches = vec![];
    while remainder.num_rows() > 0 {
        let batch_size = rng.gen_range(1..=remainder.num_rows());
        batches.push(remainder.slice(0, batch_size));
        remainder = remainder.slice(batch_size, remainder.num_rows() - batch_size);
    }
    if batches.is_empty() {
        batches.push(remainder);
    }
    add_empty_batches(batches, rng)
}

/// Adds a random number of empty record batches into the stream
pub fn add_empty_batches(batches: Vec<RecordBatch>, rng: &mut StdRng) -> Vec<RecordBatch> {
    let Some(schema) = batches.first().map(|b| b.schema()) else {
        return batches;
    };

    batches
        .into_iter()
        .flat_map(|batch| {
            // insert 0, or 1 empty batches before and after the current batch
            let empty_batch = RecordBatch::new_empty(Arc::clone(&schema));
            std::iter::repeat(empty_batch.clone())
                .take(rng.gen_range(0..2))
                .chain(std::iter::once(batch))
                .chain(std::iter::repeat(empty_batch).take(rng.gen_range(0..2)))
        })
        .collect()
}

/// Returns the rows of `batch` in a random order
pub fn shuffle_rows(batch: &RecordBatch, rng: &mut StdRng) -> RecordBatch {
    let mut indices: Vec<u32> = (0..batch.num_rows() as u32).collect();
    indices.shuffle(rng);
    take_record_batch(batch, &UInt32Array::from(indices)).unwrap()
}

/// Returns the rows of `batches` ordered by the `UInt64` column `rid`
pub fn sort_by_row_id(batches: &[RecordBatch]) -> RecordBatch {
    let schema = batches[0].schema();
    let batch = arrow::compute::concat_batches(&schema, batches).unwrap();
    let ids = batch
        .column_by_name("rid")
        .unwrap()
        .as_any()
        .downcast_ref::<UInt64Array>()
        .unwrap();
    let mut indices: Vec<u32> = (0..batch.num_rows() as u32).collect();
    indices.sort_by_key(|&i| ids.value(i as usize));
    take_record_batch(&batch, &UInt32Array::from(indices)).unwrap()
}
