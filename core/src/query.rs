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

//! The buffer registration protocol of a storage engine query.
//!
//! A [`Query`] borrows every region registered with it for its lifetime `'buf`. The borrow ends
//! when the query is consumed by [`Query::submit`], which returns owned [`ResultSizes`]. That is
//! what keeps column buffers from being touched, resized or dropped while the engine may still
//! read or write through the registered regions.

use crate::errors::SomaResult;
use std::collections::HashMap;

/// Whether a submitted query produced everything it was asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryStatus {
    /// All results fit in the registered buffers.
    Complete,
    /// The buffers filled up before the query finished; submitting again continues from there.
    Incomplete,
}

/// Per-column `(offset_count, element_count)` pairs reported by the engine after a query.
///
/// For variable-length columns `offset_count` is the number of cells. `element_count` is the
/// number of data elements produced or consumed, in units of the column's type.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResultSizes {
    sizes: HashMap<String, (u64, u64)>,
}

impl ResultSizes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, num_offsets: u64, num_elements: u64) {
        self.sizes.insert(name.into(), (num_offsets, num_elements));
    }

    pub fn get(&self, name: &str) -> Option<(u64, u64)> {
        self.sizes.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.sizes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sizes.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryResult {
    pub status: QueryStatus,
    pub sizes: ResultSizes,
}

/// A pending read or write against an array.
pub trait Query<'buf> {
    /// Registers the data region of column `name`. `num_elements` is the number of elements of
    /// the column's type the region can hold.
    fn set_data_buffer(
        &mut self,
        name: &str,
        data: &'buf mut [u8],
        num_elements: usize,
    ) -> SomaResult<()>;

    /// Registers the offsets region of a variable-length column, one slot per cell.
    fn set_offsets_buffer(&mut self, name: &str, offsets: &'buf mut [u64]) -> SomaResult<()>;

    /// Registers the validity region of a nullable column, one byte per cell.
    fn set_validity_buffer(&mut self, name: &str, validity: &'buf mut [u8]) -> SomaResult<()>;

    /// Runs the query to completion or until the registered buffers are full, releasing every
    /// registered region.
    fn submit(self) -> SomaResult<QueryResult>
    where
        Self: Sized;
}

/// Something that can open successive read queries against the same array, each continuing
/// where the previous one stopped.
pub trait QueryEngine {
    type Query<'buf>: Query<'buf>
    where
        Self: 'buf;

    fn query<'buf>(&'buf mut self) -> SomaResult<Self::Query<'buf>>;
}
