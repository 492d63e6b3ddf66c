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
    buffer::ArrayBuffers,
    errors::{SomaError, SomaResult},
    query::{Query, QueryEngine, QueryStatus},
    schema::ArraySchema,
};
use log::debug;

/// Reads an array batch by batch into one set of reusable column buffers.
///
/// Each call to [`ManagedQuery::read_next`] opens a query on the engine, attaches the buffers,
/// submits it and reconciles the buffer sizes. The buffers are allocated once, so a batch is only
/// valid until the next call.
#[derive(Debug)]
pub struct ManagedQuery<E: QueryEngine> {
    engine: E,
    buffers: ArrayBuffers,
    /// Status of the last submitted query, `None` before the first one.
    status: Option<QueryStatus>,
    total_num_cells: usize,
}

impl<E: QueryEngine> ManagedQuery<E> {
    /// Creates read buffers for `column_names`, sized by the schema's config.
    pub fn new<S, N>(engine: E, schema: &S, column_names: &[N]) -> SomaResult<Self>
    where
        S: ArraySchema + ?Sized,
        N: AsRef<str>,
    {
        Ok(Self::with_buffers(
            engine,
            ArrayBuffers::create(schema, column_names)?,
        ))
    }

    pub fn with_buffers(engine: E, buffers: ArrayBuffers) -> Self {
        Self {
            engine,
            buffers,
            status: None,
            total_num_cells: 0,
        }
    }

    /// Reads the next batch. Returns `None` once the engine reported the read complete and its
    /// last batch was returned.
    ///
    /// The first call always returns a batch, which is empty when the array holds no cells.
    pub fn read_next(&mut self) -> SomaResult<Option<&ArrayBuffers>> {
        if self.is_complete() {
            return Ok(None);
        }

        let result = {
            let mut query = self.engine.query()?;
            self.buffers.attach(&mut query)?;
            query.submit()?
        };
        let num_cells = self.buffers.update_sizes(&result.sizes)?;
        let first = self.status.is_none();
        self.status = Some(result.status);
        self.total_num_cells += num_cells;
        debug!(
            "[ManagedQuery] read {} cells ({} total), status {:?}",
            num_cells, self.total_num_cells, result.status
        );

        match result.status {
            QueryStatus::Incomplete if num_cells == 0 => Err(SomaError::Internal(
                "[ManagedQuery] buffers are too small to hold a single cell".to_string(),
            )),
            QueryStatus::Complete if num_cells == 0 && !first => Ok(None),
            _ => Ok(Some(&self.buffers)),
        }
    }

    /// Whether the engine reported the read complete.
    pub fn is_complete(&self) -> bool {
        self.status == Some(QueryStatus::Complete)
    }

    /// Number of cells read so far, summed over all batches.
    pub fn total_num_cells(&self) -> usize {
        self.total_num_cells
    }

    /// The buffers of the last batch.
    pub fn results(&self) -> &ArrayBuffers {
        &self.buffers
    }
}
