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

//! Common column buffer errors.

use arrow::error::ArrowError;
use std::{num::ParseIntError, result, str::Utf8Error};

#[derive(thiserror::Error, Debug)]
pub enum SomaError {
    /// The column name matches neither an attribute nor a dimension of the schema.
    #[error("[ColumnBuffer] Column name not found: {0}")]
    ColumnNotFound(String),

    /// A fixed-size column stores more than one value per cell.
    #[error("[ColumnBuffer] Values per cell > 1 is not supported: {name} ({cell_val_num})")]
    UnsupportedCellLayout { name: String, cell_val_num: u32 },

    /// The buffer budget in the configuration is not an unsigned integer.
    #[error("[ColumnBuffer] Error parsing {key}: '{value}' ({source})")]
    ConfigParse {
        key: String,
        value: String,
        #[source]
        source: ParseIntError,
    },

    #[error("[ColumnBuffer] Query reported no result sizes for column: {0}")]
    MissingResult(String),

    #[error(
        "[ColumnBuffer] Query result for '{name}' ({offsets} offsets, {elements} elements) \
         exceeds buffer capacity ({offsets_capacity} offsets, {elements_capacity} elements)"
    )]
    ResultOverflow {
        name: String,
        offsets: u64,
        elements: u64,
        offsets_capacity: usize,
        elements_capacity: usize,
    },

    /// The caller supplied data that does not fit the column's layout, e.g. strings for a
    /// fixed-size column or a validity vector of the wrong length.
    #[error("[ColumnBuffer] Column mismatch for '{name}': {reason}")]
    ColumnMismatch { name: String, reason: String },

    #[error("Out of bounds: index {index} of {len} cells")]
    IndexOutOfBounds { index: usize, len: usize },

    #[error("Configuration Error: {0}")]
    Config(String),

    #[error("Failed to allocate a buffer of {bytes} bytes")]
    Allocation { bytes: usize },

    #[error("Soma Internal Error: {0}")]
    Internal(String),

    #[error(transparent)]
    Arrow {
        #[from]
        source: ArrowError,
    },

    #[error(transparent)]
    Format {
        #[from]
        source: Utf8Error,
    },
}

impl SomaError {
    pub(crate) fn mismatch(name: &str, reason: impl Into<String>) -> Self {
        SomaError::ColumnMismatch {
            name: name.to_string(),
            reason: reason.into(),
        }
    }
}

/// A specialized `Result` for column buffer errors.
pub type SomaResult<T> = result::Result<T, SomaError>;
