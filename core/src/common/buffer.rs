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
    common::bit,
    errors::{SomaError, SomaResult},
};
use arrow::datatypes::ArrowNativeType;
use std::{
    alloc::Layout,
    mem::size_of,
    ptr::NonNull,
};

/// A fixed-capacity buffer. This is similar to Arrow's [`MutableBuffer`], except that its
/// capacity is decided once at construction and the memory never moves afterwards: there is no
/// `resize`, `push` or `reserve`.
///
/// The buffer tracks a logical `len` separately from its `capacity`. The storage engine fills the
/// whole capacity through [`FixedBuffer::as_capacity_slice_mut`], after which the owner records
/// how much of it is meaningful through [`FixedBuffer::set_len`].
///
/// Memory comes from `alloc_zeroed`, so contents are always initialized. For large capacities
/// the allocator hands out untouched zero pages, which keeps the resident footprint of an unused
/// buffer low.
///
/// [`MutableBuffer`]: arrow::buffer::MutableBuffer
#[derive(Debug)]
pub struct FixedBuffer {
    data: NonNull<u8>,
    /// Number of meaningful bytes, always `<= capacity`.
    len: usize,
    /// Requested capacity in bytes.
    capacity: usize,
    /// Size of the underlying allocation, `capacity` rounded up to `ALIGNMENT`.
    layout_size: usize,
}

unsafe impl Sync for FixedBuffer {}
unsafe impl Send for FixedBuffer {}

/// All buffers are aligned to 64 bytes.
const ALIGNMENT: usize = 64;

impl FixedBuffer {
    /// Allocates a zeroed buffer of `capacity` bytes with a logical length of 0.
    ///
    /// Fails with [`SomaError::Allocation`] when `capacity` cannot be laid out or the allocator
    /// has no memory for it.
    pub fn with_capacity(capacity: usize) -> SomaResult<Self> {
        let alloc_error = || SomaError::Allocation { bytes: capacity };
        // never ask the allocator for 0 bytes
        let layout_size =
            bit::round_upto_power_of_2(capacity.max(1), ALIGNMENT).ok_or_else(alloc_error)?;
        let layout = Layout::from_size_align(layout_size, ALIGNMENT).map_err(|_| alloc_error())?;
        let ptr = unsafe { std::alloc::alloc_zeroed(layout) };
        Ok(Self {
            data: NonNull::new(ptr).ok_or_else(alloc_error)?,
            len: 0,
            capacity,
            layout_size,
        })
    }

    /// Allocates a buffer sized exactly to `src` and copies `src` into it.
    pub fn from_slice(src: &[u8]) -> SomaResult<Self> {
        let mut buffer = Self::with_capacity(src.len())?;
        buffer.as_capacity_slice_mut().copy_from_slice(src);
        buffer.len = src.len();
        Ok(buffer)
    }

    /// Allocates a buffer sized exactly to `values` and copies their bytes into it.
    pub fn from_typed<T: ArrowNativeType>(values: &[T]) -> SomaResult<Self> {
        let mut buffer = Self::with_capacity(std::mem::size_of_val(values))?;
        buffer.typed_capacity_mut::<T>().copy_from_slice(values);
        buffer.len = buffer.capacity;
        Ok(buffer)
    }

    /// Returns the capacity of this buffer, in bytes.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns the logical length of this buffer, in bytes.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether this buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Sets the logical length. The capacity and memory location are left untouched.
    ///
    /// Panics if `len` exceeds the capacity.
    pub fn set_len(&mut self, len: usize) {
        assert!(
            len <= self.capacity,
            "length {len} exceeds buffer capacity {}",
            self.capacity
        );
        self.len = len;
    }

    /// Returns the bytes in `[0, len)`.
    pub fn as_slice(&self) -> &[u8] {
        unsafe { std::slice::from_raw_parts(self.as_ptr(), self.len) }
    }

    /// Returns the whole capacity as a mutable slice, regardless of the logical length.
    pub fn as_capacity_slice_mut(&mut self) -> &mut [u8] {
        unsafe { std::slice::from_raw_parts_mut(self.as_mut_ptr(), self.capacity) }
    }

    /// Returns the first `num` elements of this buffer reinterpreted as `T`.
    ///
    /// Panics if `num` elements don't fit in the capacity.
    pub fn typed<T: ArrowNativeType>(&self, num: usize) -> &[T] {
        assert!(
            num * size_of::<T>() <= self.capacity,
            "{num} elements of {} bytes exceed buffer capacity {}",
            size_of::<T>(),
            self.capacity
        );
        // aligned to ALIGNMENT, which is larger than any native type
        unsafe { std::slice::from_raw_parts(self.as_ptr() as *const T, num) }
    }

    /// Returns the whole capacity reinterpreted as a mutable slice of `T`. Trailing bytes that
    /// don't make up a full element are excluded.
    pub fn typed_capacity_mut<T: ArrowNativeType>(&mut self) -> &mut [T] {
        let num = self.capacity / size_of::<T>();
        unsafe { std::slice::from_raw_parts_mut(self.as_mut_ptr() as *mut T, num) }
    }

    /// Returns a raw pointer to this buffer's internal memory
    /// This pointer is guaranteed to be aligned along cache-lines.
    #[inline]
    pub const fn as_ptr(&self) -> *const u8 {
        self.data.as_ptr()
    }

    /// Returns a mutable raw pointer to this buffer's internal memory
    /// This pointer is guaranteed to be aligned along cache-lines.
    #[inline]
    pub fn as_mut_ptr(&mut self) -> *mut u8 {
        self.data.as_ptr()
    }
}

impl Drop for FixedBuffer {
    fn drop(&mut self) {
        unsafe {
            std::alloc::dealloc(
                self.data.as_ptr(),
                Layout::from_size_align_unchecked(self.layout_size, ALIGNMENT),
            )
        }
    }
}

impl PartialEq for FixedBuffer {
    fn eq(&self, other: &FixedBuffer) -> bool {
        self.capacity == other.capacity && self.as_slice() == other.as_slice()
    }
}
