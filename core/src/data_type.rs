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

use arrow::datatypes::{DataType as ArrowDataType, TimeUnit};
use std::fmt;

/// Scalar element type of an attribute or dimension, as the storage engine sees it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataType {
    Int8,
    Int16,
    Int32,
    Int64,
    UInt8,
    UInt16,
    UInt32,
    UInt64,
    Float32,
    Float64,
    Bool,
    Char,
    StringAscii,
    StringUtf8,
    Blob,
    DateTimeSec,
    DateTimeMs,
    DateTimeUs,
    DateTimeNs,
}

impl DataType {
    /// Returns the size of one element of this type, in bytes. String-like types are measured in
    /// bytes, so a single element is one byte.
    pub fn type_size(&self) -> usize {
        match self {
            DataType::Int8
            | DataType::UInt8
            | DataType::Bool
            | DataType::Char
            | DataType::StringAscii
            | DataType::StringUtf8
            | DataType::Blob => 1,
            DataType::Int16 | DataType::UInt16 => 2,
            DataType::Int32 | DataType::UInt32 | DataType::Float32 => 4,
            DataType::Int64
            | DataType::UInt64
            | DataType::Float64
            | DataType::DateTimeSec
            | DataType::DateTimeMs
            | DataType::DateTimeUs
            | DataType::DateTimeNs => 8,
        }
    }

    /// Whether a dimension of this type always has variable-length cells.
    pub fn is_string(&self) -> bool {
        matches!(self, DataType::StringAscii | DataType::StringUtf8)
    }

    /// Whether cells of this type hold text, as opposed to numbers or opaque bytes.
    pub fn is_text(&self) -> bool {
        matches!(
            self,
            DataType::Char | DataType::StringAscii | DataType::StringUtf8
        )
    }

    /// Arrow type of a column holding this type. `is_var` selects the 64-bit offset variant for
    /// variable-length cells, since offsets are stored as `u64`.
    pub fn to_arrow(&self, is_var: bool) -> ArrowDataType {
        if is_var {
            return if self.is_text() {
                ArrowDataType::LargeUtf8
            } else {
                ArrowDataType::LargeBinary
            };
        }
        match self {
            DataType::Int8 => ArrowDataType::Int8,
            DataType::Int16 => ArrowDataType::Int16,
            DataType::Int32 => ArrowDataType::Int32,
            DataType::Int64 => ArrowDataType::Int64,
            DataType::UInt8
            | DataType::Char
            | DataType::StringAscii
            | DataType::StringUtf8
            | DataType::Blob => ArrowDataType::UInt8,
            DataType::UInt16 => ArrowDataType::UInt16,
            DataType::UInt32 => ArrowDataType::UInt32,
            DataType::UInt64 => ArrowDataType::UInt64,
            DataType::Float32 => ArrowDataType::Float32,
            DataType::Float64 => ArrowDataType::Float64,
            // the engine stores booleans as one byte per cell
            DataType::Bool => ArrowDataType::Boolean,
            DataType::DateTimeSec => ArrowDataType::Timestamp(TimeUnit::Second, None),
            DataType::DateTimeMs => ArrowDataType::Timestamp(TimeUnit::Millisecond, None),
            DataType::DateTimeUs => ArrowDataType::Timestamp(TimeUnit::Microsecond, None),
            DataType::DateTimeNs => ArrowDataType::Timestamp(TimeUnit::Nanosecond, None),
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Number of values stored in each cell of an attribute or dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CellValNum {
    /// Every cell stores exactly this many values.
    Fixed(u32),
    /// Cells store a variable number of values, located through an offsets buffer.
    Var,
}

impl CellValNum {
    pub fn single() -> Self {
        CellValNum::Fixed(1)
    }

    pub fn is_var(&self) -> bool {
        matches!(self, CellValNum::Var)
    }
}

impl Default for CellValNum {
    fn default() -> Self {
        Self::single()
    }
}
