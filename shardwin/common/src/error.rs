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

//! Shardwin error types

use std::error;
use std::fmt::{Display, Formatter};
use std::result;

use arrow::error::ArrowError;

/// Result type for operations that could result in an [`ShardwinError`]
pub type Result<T, E = ShardwinError> = result::Result<T, E>;

/// Error type for generic operations that could result in ShardwinError::External
pub type GenericError = Box<dyn error::Error + Send + Sync>;

/// Shardwin error
///
/// Every error aborts the window evaluation it was raised in; there is no
/// partially evaluated output.
#[derive(Debug)]
pub enum ShardwinError {
    /// Error returned by arrow.
    ArrowError(ArrowError),
    /// Column types differ between input batches, or a referenced column
    /// does not exist.
    SchemaMismatch(String),
    /// The frame cannot be evaluated over the order-by key, e.g. a
    /// `RangeBetween` frame with several order-by columns or over a
    /// string column.
    UnsupportedFrameType(String),
    /// Adding a frame delta to an order-by value leaves the range the
    /// column type can represent.
    FrameBoundsOverflow(String),
    /// A `lead`/`lag` offset was negative.
    InvalidOffset(String),
    /// A function was applied to a value type it does not accept.
    TypeMismatch(String),
    /// Invalid or unknown configuration key or value.
    Configuration(String),
    /// Error returned during evaluation that does not fit any of the
    /// categories above.
    Execution(String),
    /// Error returned as a consequence of a bug in shardwin.
    // Raised when an internal invariant we cannot ask the compiler to
    // check for us does not hold.
    Internal(String),
    /// Errors originating from outside shardwin's codebase.
    External(GenericError),
    /// Error with additional context, such as the partition key or row id
    /// being evaluated when the error occurred.
    Context(String, Box<ShardwinError>),
}

impl From<ArrowError> for ShardwinError {
    fn from(e: ArrowError) -> Self {
        ShardwinError::ArrowError(e)
    }
}

impl From<ShardwinError> for ArrowError {
    fn from(e: ShardwinError) -> Self {
        match e {
            ShardwinError::ArrowError(e) => e,
            ShardwinError::External(e) => ArrowError::ExternalError(e),
            other => ArrowError::ExternalError(Box::new(other)),
        }
    }
}

impl From<GenericError> for ShardwinError {
    fn from(err: GenericError) -> Self {
        ShardwinError::External(err)
    }
}

impl Display for ShardwinError {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        match *self {
            ShardwinError::ArrowError(ref desc) => write!(f, "Arrow error: {desc}"),
            ShardwinError::SchemaMismatch(ref desc) => {
                write!(f, "Schema mismatch: {desc}")
            }
            ShardwinError::UnsupportedFrameType(ref desc) => {
                write!(f, "Unsupported frame type: {desc}")
            }
            ShardwinError::FrameBoundsOverflow(ref desc) => {
                write!(f, "Frame bounds overflow: {desc}")
            }
            ShardwinError::InvalidOffset(ref desc) => {
                write!(f, "Invalid offset: {desc}")
            }
            ShardwinError::TypeMismatch(ref desc) => {
                write!(f, "Type mismatch: {desc}")
            }
            ShardwinError::Configuration(ref desc) => {
                write!(f, "Invalid or Unsupported Configuration: {desc}")
            }
            ShardwinError::Execution(ref desc) => {
                write!(f, "Execution error: {desc}")
            }
            ShardwinError::Internal(ref desc) => {
                write!(f, "Internal error: {desc}. This was likely caused by a bug in shardwin's \
                    code and we would welcome that you file an bug report in our issue tracker")
            }
            ShardwinError::External(ref desc) => {
                write!(f, "External error: {desc}")
            }
            ShardwinError::Context(ref desc, ref err) => {
                write!(f, "{desc}\ncaused by\n{}", *err)
            }
        }
    }
}

impl error::Error for ShardwinError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            ShardwinError::ArrowError(e) => Some(e),
            ShardwinError::External(e) => Some(e.as_ref()),
            ShardwinError::Context(_, e) => Some(e.as_ref()),
            _ => None,
        }
    }
}

impl ShardwinError {
    /// Wraps this error with the given description, keeping the original
    /// error reachable through [`Self::find_root`].
    pub fn context(self, description: impl Into<String>) -> Self {
        Self::Context(description.into(), Box::new(self))
    }

    /// Returns the innermost error, skipping any [`ShardwinError::Context`]
    /// layers.
    ///
    /// ```
    /// # use shardwin_common::ShardwinError;
    /// let e = ShardwinError::InvalidOffset("-1".to_string())
    ///     .context("partition [id=2]")
    ///     .context("window lead(values, -1)");
    /// assert!(matches!(e.find_root(), ShardwinError::InvalidOffset(_)));
    /// ```
    pub fn find_root(&self) -> &Self {
        let mut last = self;
        while let ShardwinError::Context(_, inner) = last {
            last = inner.as_ref();
        }
        last
    }
}

/// Extension trait adding [`ShardwinError::context`] to results.
pub trait ResultExt<T> {
    /// Wraps the error, if any, with a lazily built description.
    fn with_context<F, S>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> S,
        S: Into<String>;
}

impl<T, E: Into<ShardwinError>> ResultExt<T> for result::Result<T, E> {
    fn with_context<F, S>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> S,
        S: Into<String>,
    {
        self.map_err(|e| e.into().context(f()))
    }
}

/// Returns `Err(ShardwinError::Internal)` with a formatted message
#[macro_export]
macro_rules! internal_err {
    ($($args:expr),*) => {
        Err($crate::ShardwinError::Internal(format!($($args),*)))
    };
}

/// Returns `Err(ShardwinError::Execution)` with a formatted message
#[macro_export]
macro_rules! exec_err {
    ($($args:expr),*) => {
        Err($crate::ShardwinError::Execution(format!($($args),*)))
    };
}

/// Returns `Err(ShardwinError::SchemaMismatch)` with a formatted message
#[macro_export]
macro_rules! schema_err {
    ($($args:expr),*) => {
        Err($crate::ShardwinError::SchemaMismatch(format!($($args),*)))
    };
}

/// Returns `Err(ShardwinError::UnsupportedFrameType)` with a formatted message
#[macro_export]
macro_rules! frame_type_err {
    ($($args:expr),*) => {
        Err($crate::ShardwinError::UnsupportedFrameType(format!($($args),*)))
    };
}

/// Returns `Err(ShardwinError::FrameBoundsOverflow)` with a formatted message
#[macro_export]
macro_rules! frame_overflow_err {
    ($($args:expr),*) => {
        Err($crate::ShardwinError::FrameBoundsOverflow(format!($($args),*)))
    };
}

/// Returns `Err(ShardwinError::InvalidOffset)` with a formatted message
#[macro_export]
macro_rules! offset_err {
    ($($args:expr),*) => {
        Err($crate::ShardwinError::InvalidOffset(format!($($args),*)))
    };
}

/// Returns `Err(ShardwinError::TypeMismatch)` with a formatted message
#[macro_export]
macro_rules! type_mismatch_err {
    ($($args:expr),*) => {
        Err($crate::ShardwinError::TypeMismatch(format!($($args),*)))
    };
}

/// Returns `Err(ShardwinError::Configuration)` with a formatted message
#[macro_export]
macro_rules! config_err {
    ($($args:expr),*) => {
        Err($crate::ShardwinError::Configuration(format!($($args),*)))
    };
}
