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

//! Physical execution of window functions

mod frame;
mod functions;
mod order;
mod reassemble;
mod shuffle;
mod window_exec;

pub use frame::{FrameEvaluator, RowFrame};
pub use functions::{AggregateEvaluator, OffsetEvaluator, WindowFunctionEvaluator};
pub use order::{OrderResolver, OrderedGroup};
pub use reassemble::{output_schema, ResultReassembler};
pub use shuffle::{PartitionGroup, PartitionKeyShuffler, RowLocation};
pub use window_exec::{evaluate, evaluate_exprs, WindowExec};
