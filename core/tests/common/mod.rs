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

//! An in-memory array engine for tests. Cells are kept as byte vectors per column; reads hand
//! out as many cells as fit in the registered buffers.

#![allow(dead_code)]

use soma_buffers::{
    query::{Query, QueryEngine, QueryResult, QueryStatus, ResultSizes},
    schema::{ArraySchema, Schema},
    SomaError, SomaResult,
};
use std::collections::HashMap;

#[derive(Debug, Default)]
struct Column {
    type_size: usize,
    cells: Vec<Vec<u8>>,
    validity: Vec<u8>,
}

#[derive(Debug)]
pub struct MemoryArray {
    schema: Schema,
    columns: HashMap<String, Column>,
    num_cells: usize,
    cursor: usize,
    /// Number of read queries submitted so far.
    pub submits: usize,
}

impl MemoryArray {
    pub fn new(schema: Schema) -> Self {
        let columns = schema
            .column_names()
            .into_iter()
            .map(|name| {
                let type_size = match schema.attribute(&name) {
                    Some(attr) => attr.data_type.type_size(),
                    None => schema.dimension(&name).unwrap().data_type.type_size(),
                };
                let column = Column {
                    type_size,
                    ..Default::default()
                };
                (name, column)
            })
            .collect();
        Self {
            schema,
            columns,
            num_cells: 0,
            cursor: 0,
            submits: 0,
        }
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn num_cells(&self) -> usize {
        self.num_cells
    }

    /// Starts reading from the first cell again.
    pub fn rewind(&mut self) {
        self.cursor = 0;
    }

    pub fn write_query(&mut self) -> MemoryQuery<'_> {
        MemoryQuery {
            array: self,
            mode: Mode::Write,
            registered: HashMap::new(),
        }
    }
}

impl QueryEngine for MemoryArray {
    type Query<'buf> = MemoryQuery<'buf>;

    fn query<'buf>(&'buf mut self) -> SomaResult<MemoryQuery<'buf>> {
        Ok(MemoryQuery {
            array: self,
            mode: Mode::Read,
            registered: HashMap::new(),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Read,
    Write,
}

#[derive(Default)]
struct Registered<'buf> {
    data: Option<(&'buf mut [u8], usize)>,
    offsets: Option<&'buf mut [u64]>,
    validity: Option<&'buf mut [u8]>,
}

pub struct MemoryQuery<'buf> {
    array: &'buf mut MemoryArray,
    mode: Mode,
    registered: HashMap<String, Registered<'buf>>,
}

impl<'buf> MemoryQuery<'buf> {
    fn entry(&mut self, name: &str) -> SomaResult<&mut Registered<'buf>> {
        if !self.array.columns.contains_key(name) {
            return Err(SomaError::ColumnNotFound(name.to_string()));
        }
        Ok(self.registered.entry(name.to_string()).or_default())
    }

    fn read(mut self) -> SomaResult<QueryResult> {
        let array = self.array;
        array.submits += 1;
        let cursor = array.cursor;
        let remaining = array.num_cells - cursor;

        let mut n = remaining;
        for (name, reg) in &self.registered {
            let column = &array.columns[name];
            let (data, _) = reg
                .data
                .as_ref()
                .ok_or_else(|| SomaError::Internal(format!("no data buffer for {name}")))?;
            let mut fit = 0;
            let mut bytes = 0;
            for cell in &column.cells[cursor..cursor + n] {
                let full_offsets = reg.offsets.as_ref().is_some_and(|o| fit >= o.len());
                let full_validity = reg.validity.as_ref().is_some_and(|v| fit >= v.len());
                if bytes + cell.len() > data.len() || full_offsets || full_validity {
                    break;
                }
                bytes += cell.len();
                fit += 1;
            }
            n = n.min(fit);
        }

        let mut sizes = ResultSizes::new();
        for (name, reg) in self.registered.iter_mut() {
            let column = &array.columns[name];
            let (data, _) = reg.data.as_mut().unwrap();
            let mut bytes = 0;
            for (i, cell) in column.cells[cursor..cursor + n].iter().enumerate() {
                if let Some(offsets) = reg.offsets.as_mut() {
                    offsets[i] = bytes as u64;
                }
                if let Some(validity) = reg.validity.as_mut() {
                    validity[i] = column.validity[cursor + i];
                }
                data[bytes..bytes + cell.len()].copy_from_slice(cell);
                bytes += cell.len();
            }
            let num_offsets = if reg.offsets.is_some() { n } else { 0 };
            sizes.insert(
                name.clone(),
                num_offsets as u64,
                (bytes / column.type_size) as u64,
            );
        }

        array.cursor += n;
        let status = if array.cursor == array.num_cells {
            QueryStatus::Complete
        } else {
            QueryStatus::Incomplete
        };
        Ok(QueryResult { status, sizes })
    }

    fn write(self) -> SomaResult<QueryResult> {
        let array = self.array;
        let mut sizes = ResultSizes::new();
        let mut written = None;

        for (name, reg) in self.registered {
            let column = array.columns.get_mut(&name).unwrap();
            let (data, num_elements) = reg
                .data
                .ok_or_else(|| SomaError::Internal(format!("no data buffer for {name}")))?;
            let cells: Vec<Vec<u8>> = match &reg.offsets {
                Some(offsets) => {
                    let mut ends: Vec<usize> = offsets.iter().skip(1).map(|o| *o as usize).collect();
                    ends.push(data.len());
                    offsets
                        .iter()
                        .zip(ends)
                        .map(|(start, end)| data[*start as usize..end].to_vec())
                        .collect()
                }
                None => data.chunks(column.type_size).map(<[u8]>::to_vec).collect(),
            };
            let n = cells.len();
            match written {
                None => written = Some(n),
                Some(w) if w != n => {
                    return Err(SomaError::Internal(format!(
                        "column {name} writes {n} cells, expected {w}"
                    )))
                }
                Some(_) => {}
            }
            match reg.validity {
                Some(validity) => column.validity.extend_from_slice(&validity[..n]),
                None => column.validity.extend(std::iter::repeat_n(1u8, n)),
            }
            column.cells.extend(cells);
            let num_offsets = if reg.offsets.is_some() { n } else { 0 };
            sizes.insert(name, num_offsets as u64, num_elements as u64);
        }

        array.num_cells += written.unwrap_or(0);
        Ok(QueryResult {
            status: QueryStatus::Complete,
            sizes,
        })
    }
}

impl<'buf> Query<'buf> for MemoryQuery<'buf> {
    fn set_data_buffer(
        &mut self,
        name: &str,
        data: &'buf mut [u8],
        num_elements: usize,
    ) -> SomaResult<()> {
        self.entry(name)?.data = Some((data, num_elements));
        Ok(())
    }

    fn set_offsets_buffer(&mut self, name: &str, offsets: &'buf mut [u64]) -> SomaResult<()> {
        self.entry(name)?.offsets = Some(offsets);
        Ok(())
    }

    fn set_validity_buffer(&mut self, name: &str, validity: &'buf mut [u8]) -> SomaResult<()> {
        self.entry(name)?.validity = Some(validity);
        Ok(())
    }

    fn submit(self) -> SomaResult<QueryResult> {
        match self.mode {
            Mode::Read => self.read(),
            Mode::Write => self.write(),
        }
    }
}
