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

//! Bit and byte map helpers used for validity buffers.

/// Returns `ceil(value / divisor)`.
#[inline]
pub fn ceil(value: usize, divisor: usize) -> usize {
    value / divisor + usize::from(value % divisor != 0)
}

#[inline]
pub fn set_bit(bits: &mut [u8], i: usize) {
    bits[i / 8] |= 1 << (i % 8);
}

#[inline]
pub fn unset_bit(bits: &mut [u8], i: usize) {
    bits[i / 8] &= !(1 << (i % 8));
}

static BIT_MASK: [u8; 8] = [1, 2, 4, 8, 16, 32, 64, 128];

/// Returns whether bit at position `i` in `data` is set or not
#[inline]
pub fn get_bit(data: &[u8], i: usize) -> bool {
    (data[i >> 3] & BIT_MASK[i & 7]) != 0
}

/// Packs a byte-per-cell validity map into a bit-per-cell bitmap, in place.
///
/// Every group of 8 source bytes is folded into one output byte, least-significant bit first,
/// and written to the front of `bytemap`. A nonzero source byte sets its bit. The trailing group
/// may hold fewer than 8 bytes; its missing bits stay 0.
///
/// Returns the number of leading bytes that hold the bitmap, i.e. `ceil(bytemap.len(), 8)`.
/// The bytes after that are left as they were and carry no meaning. The transform can't be
/// undone in place, use [`bitmap_to_bytemap`] to get a byte map back.
pub fn bytemap_to_bitmap(bytemap: &mut [u8]) -> usize {
    let len = bytemap.len();
    let mut i_dst = 0;
    let mut i_src = 0;
    while i_src < len {
        let end = (i_src + 8).min(len);
        let mut bitmap = 0u8;
        for (bit, byte) in bytemap[i_src..end].iter().enumerate() {
            bitmap |= u8::from(*byte != 0) << bit;
        }
        // i_dst <= i_src, so the bytes still to be read are never overwritten
        bytemap[i_dst] = bitmap;
        i_dst += 1;
        i_src = end;
    }
    i_dst
}

/// Expands the first `num_bits` bits of `bitmap` into one byte (0 or 1) per bit.
pub fn bitmap_to_bytemap(bitmap: &[u8], num_bits: usize) -> Vec<u8> {
    debug_assert!(ceil(num_bits, 8) <= bitmap.len());
    (0..num_bits).map(|i| u8::from(get_bit(bitmap, i))).collect()
}

/// Returns the nearest number that is `>=` than `num` and is a multiple of `factor`, or `None`
/// if that overflows. `factor` must be a power of 2.
pub fn round_upto_power_of_2(num: usize, factor: usize) -> Option<usize> {
    debug_assert!(factor > 0 && (factor & (factor - 1)) == 0);
    num.checked_add(factor - 1).map(|n| n & !(factor - 1))
}
