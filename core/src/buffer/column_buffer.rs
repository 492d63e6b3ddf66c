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
    common::{bit, FixedBuffer},
    config::{BufferConfig, OFFSET_SIZE},
    data_type::{CellValNum, DataType},
    errors::{SomaError, SomaResult},
    query::{Query, ResultSizes},
    schema::ArraySchema,
};
use arrow::{
    array::{ArrayRef, BooleanArray, LargeBinaryArray, LargeStringArray, PrimitiveArray},
    buffer::{BooleanBuffer, Buffer, NullBuffer, OffsetBuffer, ScalarBuffer},
    datatypes::{
        ArrowNativeType, ArrowPrimitiveType, Field, Float32Type, Float64Type, Int16Type,
        Int32Type, Int64Type, Int8Type, TimestampMicrosecondType, TimestampMillisecondType,
        TimestampNanosecondType, TimestampSecondType, UInt16Type, UInt32Type, UInt64Type,
        UInt8Type,
    },
};
use log::debug;
use std::{mem::size_of, sync::Arc};

/// Type, variability and nullability of a column, as resolved from the schema.
#[derive(Debug, Clone, Copy)]
struct ColumnLayout {
    data_type: DataType,
    is_var: bool,
    is_nullable: bool,
}

impl ColumnLayout {
    /// Attributes are looked up first, then dimensions.
    fn resolve<S: ArraySchema + ?Sized>(schema: &S, name: &str) -> SomaResult<Self> {
        let (data_type, cell_val_num, is_var, is_nullable) =
            if let Some(attr) = schema.attribute(name) {
                let is_var = attr.cell_val_num.is_var();
                (attr.data_type, attr.cell_val_num, is_var, attr.nullable)
            } else if let Some(dim) = schema.dimension(name) {
                let is_var = dim.cell_val_num.is_var() || dim.data_type.is_string();
                (dim.data_type, dim.cell_val_num, is_var, false)
            } else {
                return Err(SomaError::ColumnNotFound(name.to_string()));
            };

        match cell_val_num {
            CellValNum::Fixed(n) if !is_var && n != 1 => Err(SomaError::UnsupportedCellLayout {
                name: name.to_string(),
                cell_val_num: n,
            }),
            _ => Ok(Self {
                data_type,
                is_var,
                is_nullable,
            }),
        }
    }
}

/// Cells and bytes a query produced for one column, checked against its capacity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct BatchSize {
    pub num_cells: usize,
    pub data_len: usize,
}

/// Buffers holding the cells of one attribute or dimension, for bulk reads and writes.
///
/// A read buffer is created once with [`ColumnBuffer::create`] and reused for every batch:
/// [`ColumnBuffer::attach`] hands the full reserved capacity to a query, and after the query ran
/// [`ColumnBuffer::update_size`] records how many cells it produced. Accessors only see the cells
/// of the last reconciled batch.
///
/// None of the regions is ever reallocated, so their addresses stay stable across batches.
#[derive(Debug)]
pub struct ColumnBuffer {
    name: String,
    data_type: DataType,
    type_size: usize,
    is_var: bool,
    is_nullable: bool,
    /// Number of cells in the last batch.
    num_cells: usize,
    /// Raw element bytes, or the concatenated cell payloads of a variable-length column.
    data: FixedBuffer,
    /// `num_cells + 1` byte offsets into `data`, for variable-length columns only.
    offsets: Option<FixedBuffer>,
    /// One byte per cell, nonzero when the cell is valid, for nullable columns only.
    validity: Option<FixedBuffer>,
}

impl ColumnBuffer {
    /// Creates an empty buffer for column `name`, sized by the buffer budget in the schema's
    /// config (see [`BufferConfig`]).
    pub fn create<S: ArraySchema + ?Sized>(schema: &S, name: &str) -> SomaResult<Self> {
        let layout = ColumnLayout::resolve(schema, name)?;
        let config = BufferConfig::from_config(schema.config())?;
        let num_bytes = config.num_bytes()?;
        let num_cells = config.num_cells(layout.data_type.type_size(), layout.is_var)?;
        Self::alloc(name, layout, num_cells, num_bytes)
    }

    fn alloc(
        name: &str,
        layout: ColumnLayout,
        num_cells: usize,
        num_bytes: usize,
    ) -> SomaResult<Self> {
        debug!(
            "[ColumnBuffer] '{}' {} bytes is_var={} is_nullable={}",
            name, num_bytes, layout.is_var, layout.is_nullable
        );
        // one extra offset marks the end of the last cell
        let offsets = if layout.is_var {
            let offsets_bytes = num_cells
                .checked_add(1)
                .and_then(|slots| slots.checked_mul(OFFSET_SIZE))
                .ok_or_else(|| {
                    SomaError::Config(format!(
                        "[ColumnBuffer] offsets for {num_cells} cells of '{name}' overflow"
                    ))
                })?;
            Some(FixedBuffer::with_capacity(offsets_bytes)?)
        } else {
            None
        };
        let validity = if layout.is_nullable {
            Some(FixedBuffer::with_capacity(num_cells)?)
        } else {
            None
        };

        Ok(Self {
            name: name.to_string(),
            data_type: layout.data_type,
            type_size: layout.data_type.type_size(),
            is_var: layout.is_var,
            is_nullable: layout.is_nullable,
            num_cells: 0,
            data: FixedBuffer::with_capacity(num_bytes)?,
            offsets,
            validity,
        })
    }

    /// Creates a buffer holding `values`, for writing to a fixed-size column. Every region is
    /// sized exactly to the data, so attaching it registers exactly these cells.
    ///
    /// `validity` holds one byte per value and is only accepted for nullable columns; when it is
    /// omitted for a nullable column all cells are valid.
    pub fn from_values<S, T>(
        schema: &S,
        name: &str,
        values: &[T],
        validity: Option<&[u8]>,
    ) -> SomaResult<Self>
    where
        S: ArraySchema + ?Sized,
        T: ArrowNativeType,
    {
        let layout = ColumnLayout::resolve(schema, name)?;
        if layout.is_var {
            return Err(SomaError::mismatch(
                name,
                "variable-length columns are written with from_strings",
            ));
        }
        let type_size = layout.data_type.type_size();
        if size_of::<T>() != type_size {
            return Err(SomaError::mismatch(
                name,
                format!(
                    "values are {} bytes wide but {} is {} bytes wide",
                    size_of::<T>(),
                    layout.data_type,
                    type_size
                ),
            ));
        }
        let validity = Self::write_validity(name, &layout, values.len(), validity)?;

        Ok(Self {
            name: name.to_string(),
            data_type: layout.data_type,
            type_size,
            is_var: false,
            is_nullable: layout.is_nullable,
            num_cells: values.len(),
            data: FixedBuffer::from_typed(values)?,
            offsets: None,
            validity,
        })
    }

    /// Creates a buffer holding `values`, one cell each, for writing to a variable-length
    /// column. See [`ColumnBuffer::from_values`] for `validity`.
    pub fn from_strings<S, V>(
        schema: &S,
        name: &str,
        values: &[V],
        validity: Option<&[u8]>,
    ) -> SomaResult<Self>
    where
        S: ArraySchema + ?Sized,
        V: AsRef<[u8]>,
    {
        let layout = ColumnLayout::resolve(schema, name)?;
        if !layout.is_var {
            return Err(SomaError::mismatch(
                name,
                "fixed-size columns are written with from_values",
            ));
        }
        let type_size = layout.data_type.type_size();
        let total_bytes = values.iter().map(|v| v.as_ref().len()).sum::<usize>();
        let mut data = Vec::with_capacity(total_bytes);
        let mut offsets = Vec::with_capacity(values.len() + 1);
        for value in values {
            let value = value.as_ref();
            if value.len() % type_size != 0 {
                return Err(SomaError::mismatch(
                    name,
                    format!(
                        "a cell of {} bytes is not a whole number of {} values",
                        value.len(),
                        layout.data_type
                    ),
                ));
            }
            offsets.push(data.len() as u64);
            data.extend_from_slice(value);
        }
        offsets.push(data.len() as u64);
        let validity = Self::write_validity(name, &layout, values.len(), validity)?;

        Ok(Self {
            name: name.to_string(),
            data_type: layout.data_type,
            type_size,
            is_var: true,
            is_nullable: layout.is_nullable,
            num_cells: values.len(),
            data: FixedBuffer::from_slice(&data)?,
            offsets: Some(FixedBuffer::from_typed(&offsets)?),
            validity,
        })
    }

    fn write_validity(
        name: &str,
        layout: &ColumnLayout,
        num_cells: usize,
        validity: Option<&[u8]>,
    ) -> SomaResult<Option<FixedBuffer>> {
        match (layout.is_nullable, validity) {
            (false, None) => Ok(None),
            (false, Some(_)) => Err(SomaError::mismatch(
                name,
                "validity given for a column that is not nullable",
            )),
            (true, Some(v)) if v.len() != num_cells => Err(SomaError::mismatch(
                name,
                format!("{} validity values for {} cells", v.len(), num_cells),
            )),
            (true, Some(v)) => Ok(Some(FixedBuffer::from_slice(v)?)),
            (true, None) => Ok(Some(FixedBuffer::from_slice(&vec![1u8; num_cells])?)),
        }
    }

    /// Converts a byte-per-cell validity map into a bitmap in place and returns the number of
    /// leading bytes holding the bitmap. See [`bit::bytemap_to_bitmap`].
    pub fn to_bitmap(bytemap: &mut [u8]) -> usize {
        bit::bytemap_to_bitmap(bytemap)
    }

    /// Registers this buffer's regions with `query`.
    ///
    /// The data region is registered with its full capacity, not the size of the last batch, so
    /// the engine can always fill all of it. The offsets region is registered without its
    /// trailing slot, since the engine expects as many offsets as validity values.
    ///
    /// The regions stay borrowed until the query is submitted.
    pub fn attach<'buf, Q>(&'buf mut self, query: &mut Q) -> SomaResult<()>
    where
        Q: Query<'buf> + ?Sized,
    {
        let Self {
            name,
            type_size,
            data,
            offsets,
            validity,
            ..
        } = self;
        let num_elements = data.capacity() / *type_size;
        debug!(
            "[ColumnBuffer] attach '{}' {} elements is_var={} is_nullable={}",
            name,
            num_elements,
            offsets.is_some(),
            validity.is_some()
        );

        query.set_data_buffer(name, data.as_capacity_slice_mut(), num_elements)?;
        if let Some(offsets) = offsets {
            let slots = offsets.typed_capacity_mut::<u64>();
            let num_slots = slots.len() - 1;
            query.set_offsets_buffer(name, &mut slots[..num_slots])?;
        }
        if let Some(validity) = validity {
            query.set_validity_buffer(name, validity.as_capacity_slice_mut())?;
        }
        Ok(())
    }

    /// Records the result of the query this buffer was last attached to and returns the number
    /// of cells it holds now.
    ///
    /// For variable-length columns this also writes the trailing offset, so that the last cell
    /// has an end like every other cell. On error the buffer is left as it was.
    pub fn update_size(&mut self, sizes: &ResultSizes) -> SomaResult<usize> {
        let size = self.check_size(sizes)?;
        self.commit_size(size);
        Ok(size.num_cells)
    }

    /// Validates this column's entry in `sizes` against the buffer, without changing it.
    pub(crate) fn check_size(&self, sizes: &ResultSizes) -> SomaResult<BatchSize> {
        let (num_offsets, num_elements) = sizes
            .get(&self.name)
            .ok_or_else(|| SomaError::MissingResult(self.name.clone()))?;
        let num_cells = if self.is_var {
            num_offsets
        } else {
            num_elements
        };

        let elements_capacity = self.data.capacity() / self.type_size;
        let cell_capacity = self.cell_capacity();
        if num_elements > elements_capacity as u64 || num_cells > cell_capacity as u64 {
            return Err(SomaError::ResultOverflow {
                name: self.name.clone(),
                offsets: num_offsets,
                elements: num_elements,
                offsets_capacity: if self.is_var { cell_capacity } else { 0 },
                elements_capacity,
            });
        }
        // both fit in a capacity, so they fit in usize
        let num_cells = num_cells as usize;
        let data_len = num_elements as usize * self.type_size;

        if let Some(offsets) = &self.offsets {
            if num_cells == 0 && data_len != 0 {
                return Err(SomaError::Internal(format!(
                    "[ColumnBuffer] Query returned {data_len} bytes but no offsets for '{}'",
                    self.name
                )));
            }
            validate_offsets(&self.name, offsets.typed::<u64>(num_cells), data_len as u64)?;
        }
        Ok(BatchSize {
            num_cells,
            data_len,
        })
    }

    /// Applies a size accepted by [`ColumnBuffer::check_size`].
    pub(crate) fn commit_size(&mut self, size: BatchSize) {
        let BatchSize {
            num_cells,
            data_len,
        } = size;
        if let Some(offsets) = &mut self.offsets {
            offsets.typed_capacity_mut::<u64>()[num_cells] = data_len as u64;
            offsets.set_len((num_cells + 1) * OFFSET_SIZE);
        }
        if let Some(validity) = &mut self.validity {
            validity.set_len(num_cells);
        }
        self.data.set_len(data_len);
        self.num_cells = num_cells;

        debug!(
            "[ColumnBuffer] '{}' holds {} cells, {} bytes",
            self.name, num_cells, data_len
        );
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn data_type(&self) -> DataType {
        self.data_type
    }

    /// Size of one element, in bytes.
    pub fn type_size(&self) -> usize {
        self.type_size
    }

    pub fn is_var(&self) -> bool {
        self.is_var
    }

    pub fn is_nullable(&self) -> bool {
        self.is_nullable
    }

    /// Number of cells in the last batch.
    pub fn num_cells(&self) -> usize {
        self.num_cells
    }

    /// Maximum number of cells one batch can hold.
    pub fn cell_capacity(&self) -> usize {
        match &self.offsets {
            Some(offsets) => offsets.capacity() / OFFSET_SIZE - 1,
            None => self.data.capacity() / self.type_size,
        }
    }

    /// Capacity of the data region, in bytes.
    pub fn data_capacity(&self) -> usize {
        self.data.capacity()
    }

    /// The elements of the last batch, viewed as `T`.
    ///
    /// `T` must be the native type of the column; only its width is checked, and only in debug
    /// builds.
    pub fn data<T: ArrowNativeType>(&self) -> &[T] {
        debug_assert_eq!(
            size_of::<T>(),
            self.type_size,
            "'{}' holds {} values",
            self.name,
            self.data_type
        );
        self.data.typed::<T>(self.data.len() / size_of::<T>())
    }

    /// The `num_cells + 1` offsets of the last batch, for variable-length columns.
    pub fn offsets(&self) -> Option<&[u64]> {
        self.offsets
            .as_ref()
            .map(|offsets| offsets.typed::<u64>(self.num_cells + 1))
    }

    /// The byte-per-cell validity of the last batch, for nullable columns.
    pub fn validity(&self) -> Option<&[u8]> {
        self.validity.as_ref().map(FixedBuffer::as_slice)
    }

    /// The bytes of cell `index` of a variable-length column.
    pub fn bytes_view(&self, index: usize) -> SomaResult<&[u8]> {
        let offsets = self.offsets().ok_or_else(|| {
            SomaError::mismatch(&self.name, "cell views need a variable-length column")
        })?;
        if index >= self.num_cells {
            return Err(SomaError::IndexOutOfBounds {
                index,
                len: self.num_cells,
            });
        }
        let start = offsets[index] as usize;
        let end = offsets[index + 1] as usize;
        Ok(&self.data.as_slice()[start..end])
    }

    /// The text of cell `index` of a variable-length column.
    pub fn string_view(&self, index: usize) -> SomaResult<&str> {
        Ok(std::str::from_utf8(self.bytes_view(index)?)?)
    }

    /// Copies every cell of the last batch out as a `String`.
    pub fn strings(&self) -> SomaResult<Vec<String>> {
        (0..self.num_cells)
            .map(|i| self.string_view(i).map(str::to_string))
            .collect()
    }

    /// Arrow field describing this column.
    pub fn arrow_field(&self) -> Field {
        Field::new(
            &self.name,
            self.data_type.to_arrow(self.is_var),
            self.is_nullable,
        )
    }

    /// Copies the last batch into an Arrow array. Variable-length columns become
    /// `LargeUtf8`/`LargeBinary` arrays, and validity becomes the array's null buffer.
    pub fn to_arrow(&self) -> SomaResult<ArrayRef> {
        let nulls = self.null_buffer();

        if self.is_var {
            let offsets = self
                .offsets()
                .unwrap_or(&[0])
                .iter()
                .map(|offset| {
                    i64::try_from(*offset).map_err(|_| {
                        SomaError::Internal(format!("offset {offset} does not fit Arrow offsets"))
                    })
                })
                .collect::<SomaResult<Vec<i64>>>()?;
            let offsets = OffsetBuffer::new(ScalarBuffer::from(offsets));
            let values = Buffer::from_slice_ref(self.data.as_slice());
            let array: ArrayRef = if self.data_type.is_text() {
                Arc::new(LargeStringArray::try_new(offsets, values, nulls)?)
            } else {
                Arc::new(LargeBinaryArray::try_new(offsets, values, nulls)?)
            };
            return Ok(array);
        }

        let array: ArrayRef = match self.data_type {
            DataType::Int8 => self.primitive_array::<Int8Type>(nulls),
            DataType::Int16 => self.primitive_array::<Int16Type>(nulls),
            DataType::Int32 => self.primitive_array::<Int32Type>(nulls),
            DataType::Int64 => self.primitive_array::<Int64Type>(nulls),
            DataType::UInt8
            | DataType::Char
            | DataType::StringAscii
            | DataType::StringUtf8
            | DataType::Blob => self.primitive_array::<UInt8Type>(nulls),
            DataType::UInt16 => self.primitive_array::<UInt16Type>(nulls),
            DataType::UInt32 => self.primitive_array::<UInt32Type>(nulls),
            DataType::UInt64 => self.primitive_array::<UInt64Type>(nulls),
            DataType::Float32 => self.primitive_array::<Float32Type>(nulls),
            DataType::Float64 => self.primitive_array::<Float64Type>(nulls),
            DataType::DateTimeSec => self.primitive_array::<TimestampSecondType>(nulls),
            DataType::DateTimeMs => self.primitive_array::<TimestampMillisecondType>(nulls),
            DataType::DateTimeUs => self.primitive_array::<TimestampMicrosecondType>(nulls),
            DataType::DateTimeNs => self.primitive_array::<TimestampNanosecondType>(nulls),
            DataType::Bool => {
                let values: BooleanBuffer = self.data::<u8>().iter().map(|v| *v != 0).collect();
                Arc::new(BooleanArray::new(values, nulls))
            }
        };
        Ok(array)
    }

    fn primitive_array<T: ArrowPrimitiveType>(&self, nulls: Option<NullBuffer>) -> ArrayRef {
        let values = ScalarBuffer::from(self.data::<T::Native>().to_vec());
        Arc::new(PrimitiveArray::<T>::new(values, nulls))
    }

    fn null_buffer(&self) -> Option<NullBuffer> {
        let mut bitmap = self.validity()?.to_vec();
        let len = Self::to_bitmap(&mut bitmap);
        bitmap.truncate(len);
        Some(NullBuffer::new(BooleanBuffer::new(
            Buffer::from_vec(bitmap),
            0,
            self.num_cells,
        )))
    }
}

/// Checks the offsets the engine wrote for a batch: they start at 0, never decrease and stay
/// within the `data_len` bytes it produced.
fn validate_offsets(name: &str, offsets: &[u64], data_len: u64) -> SomaResult<()> {
    let first_ok = offsets.first().is_none_or(|first| *first == 0);
    let sorted = offsets.windows(2).all(|w| w[0] <= w[1]);
    let last_ok = offsets.last().is_none_or(|last| *last <= data_len);
    if first_ok && sorted && last_ok {
        Ok(())
    } else {
        Err(SomaError::Internal(format!(
            "[ColumnBuffer] Query returned invalid offsets for '{name}'"
        )))
    }
}
