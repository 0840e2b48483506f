// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 itsakeyfut
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Numeric helpers shared by the memory layout and format code
//!
//! - Morton (Z-order) addressing of `2^n × 2^n` blocks and of blocked textures
//! - IEEE 754 binary16 conversion matching the hardware rounding (mantissa truncation,
//!   float32 denormals flushed to zero, out of range values saturated to infinity)

/// Spread the low 16 bits of `n` to the even bit positions
#[inline(always)]
fn separate_bits(mut n: u32) -> u32 {
    n &= 0x0000_FFFF;
    n = (n | (n << 8)) & 0x00FF_00FF;
    n = (n | (n << 4)) & 0x0F0F_0F0F;
    n = (n | (n << 2)) & 0x3333_3333;
    n = (n | (n << 1)) & 0x5555_5555;
    n
}

/// Address of element `(i, j)` in Morton order inside a `2^size × 2^size` block
///
/// `i` (horizontal) occupies the even bits and `j` (vertical) the odd bits. Only the
/// low `size` bits of each coordinate are used.
///
/// # Examples
///
/// ```
/// use attila_emu::core::math::morton;
///
/// assert_eq!(morton(2, 1, 0), 1);
/// assert_eq!(morton(2, 0, 1), 2);
/// assert_eq!(morton(2, 3, 3), 15);
/// assert_eq!(morton(1, 3, 3), 3);
/// ```
#[inline(always)]
pub fn morton(size: u32, i: u32, j: u32) -> u32 {
    if size == 0 {
        return 0;
    }
    let mask = if size >= 16 { 0xFFFF } else { (1u32 << size) - 1 };
    separate_bits(i & mask) | (separate_bits(j & mask) << 1)
}

/// Texel offset inside a texture stored in the blocked Morton layout
///
/// Texels are grouped in `2^block_dim` square blocks, blocks in `2^super_block_dim`
/// square super blocks, both in Morton order. Super blocks are laid out in rows across a
/// texture `2^width2` texels wide.
///
/// # Examples
///
/// ```
/// use attila_emu::core::math::texel_to_morton_address;
///
/// assert_eq!(texel_to_morton_address(1, 1, 1, 1, 4), 3);
/// assert_eq!(texel_to_morton_address(2, 0, 1, 1, 4), 4);
/// // Second super block of the first row
/// assert_eq!(texel_to_morton_address(4, 0, 1, 1, 4), 16);
/// ```
pub fn texel_to_morton_address(i: u32, j: u32, block_dim: u32, super_block_dim: u32, width2: u32) -> u32 {
    let texel = morton(block_dim, i, j);
    let block = morton(super_block_dim, i >> block_dim, j >> block_dim);
    let level = super_block_dim + block_dim;
    let row_shift = width2.saturating_sub(level);
    let super_block = ((j >> level) << row_shift) + (i >> level);
    (((super_block << (2 * super_block_dim)) + block) << (2 * block_dim)) + texel
}

/// Convert a binary16 value to f32
///
/// Widening is exact.
#[inline]
pub fn f16_to_f32(input: u16) -> f32 {
    half::f16::from_bits(input).to_f32()
}

/// Convert an f32 value to binary16
pub fn f32_to_f16(input: f32) -> u16 {
    let bits = input.to_bits();
    let sign = ((bits >> 31) & 1) as u16;
    let exponent = ((bits >> 23) & 0xff) as i32;
    let mantissa = bits & 0x007f_ffff;

    // float32 zeros and denormals flush to zero
    if exponent == 0 {
        return sign << 15;
    }

    // Not representable (including NaN) saturates to infinity
    if exponent > 127 + 15 {
        return (sign << 15) | 0x7c00;
    }

    let mut exp16 = exponent - 127 + 15;
    let mut mant16 = (mantissa >> 13) & 0x03ff;

    if exp16 <= 0 {
        let shift = (1 - exp16) as u32;
        mant16 = (mant16 + 0x0400).checked_shr(shift).unwrap_or(0);
        exp16 = 0;
    }

    (sign << 15) | (((exp16 as u16) & 0x1f) << 10) | mant16 as u16
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_morton_order_of_4x4_block() {
        let expected = [
            [0, 1, 4, 5],
            [2, 3, 6, 7],
            [8, 9, 12, 13],
            [10, 11, 14, 15],
        ];
        for (j, row) in expected.iter().enumerate() {
            for (i, &addr) in row.iter().enumerate() {
                assert_eq!(morton(2, i as u32, j as u32), addr, "texel ({i}, {j})");
            }
        }
    }

    #[test]
    fn test_morton_ignores_high_bits() {
        assert_eq!(morton(2, 5, 0), morton(2, 1, 0));
        assert_eq!(morton(0, 7, 7), 0);
    }

    #[test]
    fn test_texel_address_rows_of_super_blocks() {
        // 2x2 blocks, 2x2 super blocks: 16 texels per super block, 2 per row at width 8
        assert_eq!(texel_to_morton_address(0, 4, 1, 1, 3), 32);
        assert_eq!(texel_to_morton_address(7, 7, 1, 1, 3), 63);
        // Narrow texture: one super block per row
        assert_eq!(texel_to_morton_address(0, 4, 1, 1, 1), 16);
    }

    #[test]
    fn test_f16_known_values() {
        assert_eq!(f32_to_f16(1.0), 0x3c00);
        assert_eq!(f32_to_f16(-2.0), 0xc000);
        assert_eq!(f32_to_f16(0.5), 0x3800);
        assert_eq!(f32_to_f16(65504.0), 0x7bff);
        assert_eq!(f32_to_f16(1.0e6), 0x7c00);
        assert_eq!(f16_to_f32(0x3c00), 1.0);
        assert_eq!(f16_to_f32(0xc000), -2.0);
        assert_eq!(f16_to_f32(0x7c00), f32::INFINITY);
        assert_eq!(f16_to_f32(0x8000).to_bits(), 0x8000_0000);
        assert!(f16_to_f32(0x7e00).is_nan());
    }

    #[test]
    fn test_f16_denormals() {
        // Smallest half denormal
        let tiny = f16_to_f32(0x0001);
        assert_eq!(tiny, 2.0f32.powi(-24));
        assert_eq!(f32_to_f16(tiny), 0x0001);
        assert_eq!(f32_to_f16(f32::from_bits(1)), 0);
    }

    #[test]
    fn test_f16_round_trip_of_every_finite_half() {
        for h in 0u16..=0xffff {
            let exponent = (h >> 10) & 0x1f;
            if exponent == 0x1f {
                continue;
            }
            assert_eq!(f32_to_f16(f16_to_f32(h)), h, "half {h:#06x}");
        }
    }
}
