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
    buffer::{BatchSize, ColumnBuffer},
    errors::{SomaError, SomaResult},
    query::{Query, ResultSizes},
    schema::ArraySchema,
};
use arrow::{
    array::{ArrayRef, RecordBatch, RecordBatchOptions},
    datatypes::{Field, Schema as ArrowSchema},
};
use std::{collections::HashMap, sync::Arc};

/// The column buffers of one batch, in insertion order, keyed by column name.
#[derive(Debug, Default)]
pub struct ArrayBuffers {
    buffers: Vec<ColumnBuffer>,
    index: HashMap<String, usize>,
}

impl ArrayBuffers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates empty read buffers for `names`, in that order.
    pub fn create<S, N>(schema: &S, names: &[N]) -> SomaResult<Self>
    where
        S: ArraySchema + ?Sized,
        N: AsRef<str>,
    {
        let mut buffers = Self::new();
        for name in names {
            buffers.emplace(ColumnBuffer::create(schema, name.as_ref())?);
        }
        Ok(buffers)
    }

    /// Adds `buffer`. A buffer with the same name is replaced, keeping its position.
    pub fn emplace(&mut self, buffer: ColumnBuffer) {
        match self.index.get(buffer.name()) {
            Some(&i) => self.buffers[i] = buffer,
            None => {
                self.index
                    .insert(buffer.name().to_string(), self.buffers.len());
                self.buffers.push(buffer);
            }
        }
    }

    pub fn at(&self, name: &str) -> Option<&ColumnBuffer> {
        self.index.get(name).map(|&i| &self.buffers[i])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.buffers.iter().map(ColumnBuffer::name).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ColumnBuffer> {
        self.buffers.iter()
    }

    pub fn len(&self) -> usize {
        self.buffers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffers.is_empty()
    }

    /// Attaches every buffer to `query`.
    pub fn attach<'buf, Q>(&'buf mut self, query: &mut Q) -> SomaResult<()>
    where
        Q: Query<'buf> + ?Sized,
    {
        for buffer in self.buffers.iter_mut() {
            buffer.attach(query)?;
        }
        Ok(())
    }

    /// Reconciles every buffer with `sizes` and returns the number of rows in the batch. All
    /// columns of a batch must hold the same number of cells.
    ///
    /// Every column is checked before any is updated, so on error all buffers keep the previous
    /// batch.
    pub fn update_sizes(&mut self, sizes: &ResultSizes) -> SomaResult<usize> {
        let mut checked: Vec<BatchSize> = Vec::with_capacity(self.buffers.len());
        for buffer in self.buffers.iter() {
            let size = buffer.check_size(sizes)?;
            if let Some(first) = checked.first() {
                if first.num_cells != size.num_cells {
                    return Err(SomaError::Internal(format!(
                        "column '{}' holds {} cells, expected {}",
                        buffer.name(),
                        size.num_cells,
                        first.num_cells
                    )));
                }
            }
            checked.push(size);
        }

        for (buffer, size) in self.buffers.iter_mut().zip(checked.iter()) {
            buffer.commit_size(*size);
        }
        Ok(checked.first().map_or(0, |size| size.num_cells))
    }

    /// Number of rows in the last batch.
    pub fn num_rows(&self) -> usize {
        self.buffers.first().map_or(0, ColumnBuffer::num_cells)
    }

    /// Copies the last batch into an Arrow record batch, one column per buffer.
    pub fn to_record_batch(&self) -> SomaResult<RecordBatch> {
        let fields: Vec<Field> = self.buffers.iter().map(ColumnBuffer::arrow_field).collect();
        let columns = self
            .buffers
            .iter()
            .map(ColumnBuffer::to_arrow)
            .collect::<SomaResult<Vec<ArrayRef>>>()?;
        let options = RecordBatchOptions::new().with_row_count(Some(self.num_rows()));
        Ok(RecordBatch::try_new_with_options(
            Arc::new(ArrowSchema::new(fields)),
            columns,
            &options,
        )?)
    }
}
