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

#![cfg_attr(docsrs, feature(doc_auto_cfg))]
#![deny(clippy::clone_on_ref_ptr)]

//! Partition-invariant evaluation of window functions over Arrow record
//! batches.
//!
//! Rows are regrouped by partition key ([`PartitionKeyShuffler`]), ordered
//! within each group with ties broken by row id ([`OrderResolver`]), framed
//! ([`FrameEvaluator`]), evaluated ([`WindowFunctionEvaluator`]) and
//! scattered back into their input positions ([`ResultReassembler`]).
//! [`WindowExec`] drives the whole pass.

pub mod windows;

pub use windows::{
    evaluate, evaluate_exprs, FrameEvaluator, OrderResolver, PartitionKeyShuffler,
    ResultReassembler, WindowExec, WindowFunctionEvaluator,
};
