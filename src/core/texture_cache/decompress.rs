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

//! Compressed texture block decoders
//!
//! Each decoder expands one 4×4 texel block into its uncompressed form, storing the texels
//! in 2×2 Morton order (`morton(2, i, j)`):
//!
//! | Format          | In  | Out | Texel          |
//! |-----------------|-----|-----|----------------|
//! | DXT1 RGB/RGBA   | 8   | 64  | RGBA8888       |
//! | DXT3 / DXT5     | 16  | 64  | RGBA8888       |
//! | LATC1 (signed)  | 8   | 16  | L8 (L8 signed) |
//! | LATC2 (signed)  | 16  | 32  | L8A8           |
//!
//! DXT blocks whose first word is the uninitialized memory marker `0xDEADCAFE` decode to
//! all ones.

use crate::core::gpu::QuadFloat;
use crate::core::math::morton;

/// First word of a DXT block read from uninitialized memory
pub const UNINITIALIZED_BLOCK_MARKER: u32 = 0xDEAD_CAFE;

/// Texels per block side
const BLOCK_SIDE: u32 = 4;

#[inline(always)]
fn unorm8(value: f32) -> u8 {
    (value.clamp(0.0, 1.0) * 255.0) as u8
}

#[inline(always)]
fn snorm8(value: f32) -> u8 {
    ((value.clamp(-1.0, 1.0) * 127.0) as i8) as u8
}

#[inline(always)]
fn pack_rgba8(color: &QuadFloat) -> [u8; 4] {
    [unorm8(color[0]), unorm8(color[1]), unorm8(color[2]), unorm8(color[3])]
}

fn rgb565(color: u16) -> QuadFloat {
    [
        (color >> 11) as f32 / 31.0,
        ((color >> 5) & 0x3f) as f32 / 63.0,
        (color & 0x1f) as f32 / 31.0,
        1.0,
    ]
}

fn le_u48(bytes: &[u8]) -> u64 {
    bytes[..6]
        .iter()
        .enumerate()
        .fold(0u64, |acc, (n, b)| acc | ((*b as u64) << (8 * n)))
}

/// Visit the 16 texels of a block in row order with their Morton slot
fn for_each_texel(mut f: impl FnMut(usize, usize)) {
    let mut n = 0;
    for j in 0..BLOCK_SIDE {
        for i in 0..BLOCK_SIDE {
            f(n, morton(2, i, j) as usize);
            n += 1;
        }
    }
}

/// Palette color for a 2-bit code
///
/// The 4-color mode interpolates thirds. The 3-color mode uses the midpoint for code 2 and
/// black for code 3.
fn s3tc_color(code: u32, c0: &QuadFloat, c1: &QuadFloat, four_color: bool) -> QuadFloat {
    let mut out = [0.0, 0.0, 0.0, 1.0];
    for ch in 0..3 {
        out[ch] = match (code, four_color) {
            (0, _) => c0[ch],
            (1, _) => c1[ch],
            (2, true) => (2.0 * c0[ch] + c1[ch]) / 3.0,
            (2, false) => (c0[ch] + c1[ch]) * 0.5,
            (_, true) => (c0[ch] + 2.0 * c1[ch]) / 3.0,
            (_, false) => 0.0,
        };
    }
    out
}

/// Interpolated value for a 3-bit alpha (or luminance) code
fn s3tc_alpha(code: u32, a0: f32, a1: f32) -> f32 {
    if a0 > a1 {
        match code {
            0 => a0,
            1 => a1,
            c => ((8 - c) as f32 * a0 + (c - 1) as f32 * a1) / 7.0,
        }
    } else {
        match code {
            0 => a0,
            1 => a1,
            6 => 0.0,
            7 => 1.0,
            c => ((6 - c) as f32 * a0 + (c - 1) as f32 * a1) / 5.0,
        }
    }
}

fn is_uninitialized(input: &[u8], output: &mut [u8]) -> bool {
    let marker = u32::from_le_bytes([input[0], input[1], input[2], input[3]]);
    if marker == UNINITIALIZED_BLOCK_MARKER {
        output[..64].fill(0xff);
        return true;
    }
    false
}

fn decode_dxt1(input: &[u8], output: &mut [u8], with_alpha: bool) {
    if is_uninitialized(input, output) {
        return;
    }

    let color0 = u16::from_le_bytes([input[0], input[1]]);
    let color1 = u16::from_le_bytes([input[2], input[3]]);
    let (c0, c1) = (rgb565(color0), rgb565(color1));
    let codes = u32::from_le_bytes([input[4], input[5], input[6], input[7]]);
    let four_color = color0 > color1;

    for_each_texel(|n, slot| {
        let code = (codes >> (2 * n)) & 0x3;
        let mut color = s3tc_color(code, &c0, &c1, four_color);
        color[3] = if with_alpha && !four_color && code == 3 { 0.0 } else { 1.0 };
        output[slot * 4..slot * 4 + 4].copy_from_slice(&pack_rgba8(&color));
    });
}

/// DXT1 without alpha: every texel is opaque
pub fn decode_dxt1_rgb(input: &[u8], output: &mut [u8]) {
    decode_dxt1(input, output, false);
}

/// DXT1 with 1-bit alpha: code 3 of the 3-color mode is transparent black
pub fn decode_dxt1_rgba(input: &[u8], output: &mut [u8]) {
    decode_dxt1(input, output, true);
}

/// Decode the color half (bytes 8..16) of a DXT3/DXT5 block, always in 4-color mode
fn dxt_color_block(input: &[u8]) -> (QuadFloat, QuadFloat, u32) {
    let c0 = rgb565(u16::from_le_bytes([input[8], input[9]]));
    let c1 = rgb565(u16::from_le_bytes([input[10], input[11]]));
    let codes = u32::from_le_bytes([input[12], input[13], input[14], input[15]]);
    (c0, c1, codes)
}

/// DXT3: explicit 4-bit alpha per texel
pub fn decode_dxt3_rgba(input: &[u8], output: &mut [u8]) {
    if is_uninitialized(input, output) {
        return;
    }

    let (c0, c1, codes) = dxt_color_block(input);
    let alpha_bits = u64::from_le_bytes([
        input[0], input[1], input[2], input[3], input[4], input[5], input[6], input[7],
    ]);

    for_each_texel(|n, slot| {
        let mut color = s3tc_color((codes >> (2 * n)) & 0x3, &c0, &c1, true);
        color[3] = ((alpha_bits >> (4 * n)) & 0xf) as f32 / 15.0;
        output[slot * 4..slot * 4 + 4].copy_from_slice(&pack_rgba8(&color));
    });
}

/// DXT5: interpolated alpha with 3-bit codes
pub fn decode_dxt5_rgba(input: &[u8], output: &mut [u8]) {
    if is_uninitialized(input, output) {
        return;
    }

    let (c0, c1, codes) = dxt_color_block(input);
    let a0 = input[0] as f32 / 255.0;
    let a1 = input[1] as f32 / 255.0;
    let alpha_codes = le_u48(&input[2..8]);

    for_each_texel(|n, slot| {
        let mut color = s3tc_color((codes >> (2 * n)) & 0x3, &c0, &c1, true);
        color[3] = s3tc_alpha(((alpha_codes >> (3 * n)) & 0x7) as u32, a0, a1);
        output[slot * 4..slot * 4 + 4].copy_from_slice(&pack_rgba8(&color));
    });
}

/// One 8-byte interpolated channel block: two reference values and 48 code bits
struct ChannelBlock {
    v0: f32,
    v1: f32,
    codes: u64,
}

impl ChannelBlock {
    fn unsigned(block: &[u8]) -> Self {
        Self {
            v0: block[0] as f32 / 255.0,
            v1: block[1] as f32 / 255.0,
            codes: le_u48(&block[2..8]),
        }
    }

    fn signed(block: &[u8]) -> Self {
        Self {
            v0: (block[0] as i8) as f32 / 127.0,
            v1: (block[1] as i8) as f32 / 127.0,
            codes: le_u48(&block[2..8]),
        }
    }

    fn texel(&self, n: usize) -> f32 {
        s3tc_alpha(((self.codes >> (3 * n)) & 0x7) as u32, self.v0, self.v1)
    }
}

/// LATC1: one luminance channel, 8-bit unsigned output
pub fn decode_latc1(input: &[u8], output: &mut [u8]) {
    let lum = ChannelBlock::unsigned(&input[0..8]);
    for_each_texel(|n, slot| output[slot] = unorm8(lum.texel(n)));
}

/// LATC1 signed: one luminance channel, 8-bit signed output
pub fn decode_latc1_signed(input: &[u8], output: &mut [u8]) {
    let lum = ChannelBlock::signed(&input[0..8]);
    for_each_texel(|n, slot| output[slot] = snorm8(lum.texel(n)));
}

/// LATC2: luminance block followed by alpha block, L8A8 output
pub fn decode_latc2(input: &[u8], output: &mut [u8]) {
    let lum = ChannelBlock::unsigned(&input[0..8]);
    let alpha = ChannelBlock::unsigned(&input[8..16]);
    for_each_texel(|n, slot| {
        output[slot * 2] = unorm8(lum.texel(n));
        output[slot * 2 + 1] = unorm8(alpha.texel(n));
    });
}

/// LATC2 signed: signed luminance and alpha blocks, signed L8A8 output
pub fn decode_latc2_signed(input: &[u8], output: &mut [u8]) {
    let lum = ChannelBlock::signed(&input[0..8]);
    let alpha = ChannelBlock::signed(&input[8..16]);
    for_each_texel(|n, slot| {
        output[slot * 2] = snorm8(lum.texel(n));
        output[slot * 2 + 1] = snorm8(alpha.texel(n));
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texel(out: &[u8], i: u32, j: u32) -> [u8; 4] {
        let slot = morton(2, i, j) as usize * 4;
        [out[slot], out[slot + 1], out[slot + 2], out[slot + 3]]
    }

    #[test]
    fn test_dxt1_four_color_mode() {
        // color0 = white, color1 = black, codes: texel 0 -> 0, texel 1 -> 1, texel 2 -> 2, rest 3
        let codes: u32 = 0b11_11_11_11_11_11_11_11_11_11_11_11_11_10_01_00;
        let mut block = vec![0xff, 0xff, 0x00, 0x00];
        block.extend_from_slice(&codes.to_le_bytes());
        let mut out = [0u8; 64];
        decode_dxt1_rgb(&block, &mut out);

        assert_eq!(texel(&out, 0, 0), [255, 255, 255, 255]);
        assert_eq!(texel(&out, 1, 0), [0, 0, 0, 255]);
        assert_eq!(texel(&out, 2, 0), [170, 170, 170, 255]);
        assert_eq!(texel(&out, 3, 3), [85, 85, 85, 255]);
    }

    #[test]
    fn test_dxt1_transparent_code() {
        // color0 <= color1 selects the 3-color mode; all codes 3
        let block = [0x00, 0x00, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff];
        let mut rgb = [0u8; 64];
        let mut rgba = [0u8; 64];
        decode_dxt1_rgb(&block, &mut rgb);
        decode_dxt1_rgba(&block, &mut rgba);

        assert_eq!(texel(&rgb, 2, 1), [0, 0, 0, 255]);
        assert_eq!(texel(&rgba, 2, 1), [0, 0, 0, 0]);
    }

    #[test]
    fn test_uninitialized_marker() {
        let mut block = [0u8; 16];
        block[..4].copy_from_slice(&UNINITIALIZED_BLOCK_MARKER.to_le_bytes());
        let mut out = [0u8; 64];
        decode_dxt5_rgba(&block, &mut out);
        assert!(out.iter().all(|&b| b == 0xff));
    }

    #[test]
    fn test_dxt3_explicit_alpha() {
        let mut block = [0u8; 16];
        // Alpha nibble 0xf for texel 0, 0x0 for the rest
        block[0] = 0x0f;
        // Color block: red opaque, all codes 0
        block[8..10].copy_from_slice(&0xf800u16.to_le_bytes());
        let mut out = [0u8; 64];
        decode_dxt3_rgba(&block, &mut out);

        assert_eq!(texel(&out, 0, 0), [255, 0, 0, 255]);
        assert_eq!(texel(&out, 1, 0), [255, 0, 0, 0]);
    }

    #[test]
    fn test_dxt5_alpha_ramp() {
        assert_eq!(s3tc_alpha(0, 1.0, 0.0), 1.0);
        assert_eq!(s3tc_alpha(1, 1.0, 0.0), 0.0);
        assert!((s3tc_alpha(2, 1.0, 0.0) - 6.0 / 7.0).abs() < 1e-6);
        assert!((s3tc_alpha(7, 1.0, 0.0) - 1.0 / 7.0).abs() < 1e-6);
        assert!((s3tc_alpha(2, 0.0, 1.0) - 0.2).abs() < 1e-6);
        assert_eq!(s3tc_alpha(6, 0.0, 1.0), 0.0);
        assert_eq!(s3tc_alpha(7, 0.0, 1.0), 1.0);
    }

    #[test]
    fn test_latc1_output_layout() {
        // l0 = 255, l1 = 0, texel 0 uses code 1, rest code 0
        let block = [255, 0, 0b001, 0, 0, 0, 0, 0];
        let mut out = [0u8; 16];
        decode_latc1(&block, &mut out);
        assert_eq!(out[0], 0);
        assert!(out[1..].iter().all(|&l| l == 255));
    }

    #[test]
    fn test_latc_signed_values() {
        // l0 = -127, l1 = 127, all codes 0
        let block = [0x81, 0x7f, 0, 0, 0, 0, 0, 0];
        let mut out = [0u8; 16];
        decode_latc1_signed(&block, &mut out);
        assert!(out.iter().all(|&l| l as i8 == -127));

        let mut block2 = [0u8; 16];
        block2[..8].copy_from_slice(&block);
        block2[8] = 0x7f;
        let mut out2 = [0u8; 32];
        decode_latc2_signed(&block2, &mut out2);
        assert_eq!(out2[0] as i8, -127);
        assert_eq!(out2[1] as i8, 127);
    }

    #[test]
    fn test_latc2_interleaves_luminance_and_alpha() {
        let mut block = [0u8; 16];
        block[0] = 200;
        block[8] = 100;
        let mut out = [0u8; 32];
        decode_latc2(&block, &mut out);
        // Truncating conversion may land one code below
        for slot in 0..16 {
            assert!((199..=200).contains(&out[slot * 2]));
            assert!((99..=100).contains(&out[slot * 2 + 1]));
        }
    }
}
