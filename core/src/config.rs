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

use crate::{
    errors::{SomaError, SomaResult},
    schema::Config,
};

/// Config key overriding the number of bytes reserved for each column's data buffer.
pub const CONFIG_KEY_INIT_BYTES: &str = "soma.init_buffer_bytes";

/// Bytes reserved for each column's data buffer when the config doesn't say otherwise.
pub const DEFAULT_ALLOC_BYTES: u64 = 1 << 24;

/// Largest budget accepted, leaving room to round the offsets region up to its alignment.
pub const MAX_ALLOC_BYTES: u64 = (isize::MAX as u64) >> 1;

/// Width of one entry in an offsets buffer.
pub const OFFSET_SIZE: usize = std::mem::size_of::<u64>();

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferConfig {
    pub init_bytes: u64,
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self {
            init_bytes: DEFAULT_ALLOC_BYTES,
        }
    }
}

impl BufferConfig {
    /// Reads the buffer budget from `config`, falling back to [`DEFAULT_ALLOC_BYTES`]. A value
    /// that is present but not an unsigned integer is an error.
    pub fn from_config(config: &Config) -> SomaResult<Self> {
        let init_bytes = match config.get(CONFIG_KEY_INIT_BYTES) {
            None => DEFAULT_ALLOC_BYTES,
            Some(value) => value
                .parse::<u64>()
                .map_err(|source| SomaError::ConfigParse {
                    key: CONFIG_KEY_INIT_BYTES.to_string(),
                    value: value.to_string(),
                    source,
                })?,
        };
        Ok(Self { init_bytes })
    }

    /// Number of bytes to reserve for a data buffer.
    pub fn num_bytes(&self) -> SomaResult<usize> {
        if self.init_bytes > MAX_ALLOC_BYTES {
            return Err(SomaError::Config(format!(
                "{CONFIG_KEY_INIT_BYTES} of {} bytes exceeds the maximum of {MAX_ALLOC_BYTES}",
                self.init_bytes
            )));
        }
        usize::try_from(self.init_bytes).map_err(|_| {
            SomaError::Config(format!(
                "{CONFIG_KEY_INIT_BYTES} of {} bytes is not addressable",
                self.init_bytes
            ))
        })
    }

    /// Number of cells a column can hold within the budget. Variable-length columns are bounded
    /// by how many offsets fit in the budget; fixed-size columns by how many elements do.
    pub fn num_cells(&self, type_size: usize, is_var: bool) -> SomaResult<usize> {
        let num_bytes = self.num_bytes()?;
        let unit = if is_var { OFFSET_SIZE } else { type_size };
        if unit == 0 {
            return Err(SomaError::Internal(
                "cannot size a buffer for a zero-width type".to_string(),
            ));
        }
        Ok(num_bytes / unit)
    }
}
