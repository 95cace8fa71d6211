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

//! Types describing window functions: which rows form a partition group,
//! how the group is ordered, which rows make up each row's frame, and
//! which function is evaluated over it.

pub mod aggregate_function;
pub mod column;
pub mod window_frame;
pub mod window_function;
pub mod window_spec;

pub use aggregate_function::AggregateFunction;
pub use column::{col, Column};
pub use window_frame::FrameSpec;
pub use window_function::{
    OffsetDirection, RankingFunction, WindowExpr, WindowFunctionKind,
};
pub use window_spec::{SortKey, WindowSpec};
