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

//! Color format codec
//!
//! Conversions between the internal RGBA32F color and the color buffer storage
//! formats, plus sRGB gamma and multisample resolve.
//!
//! # Storage Formats
//!
//! | Format   | Bytes | Layout (little endian)                          |
//! |----------|-------|-------------------------------------------------|
//! | RGBA8888 | 4     | R, G, B, A as unorm8                            |
//! | RG16F    | 4     | R, G as binary16; B = 0, A = 1 on decode        |
//! | R32F     | 4     | R as f32; G = B = 0, A = 1 on decode            |
//! | RGBA16   | 8     | R, G, B, A as unorm16                           |
//! | RGBA16F  | 8     | R, G, B, A as binary16                          |
//!
//! Normalized encodes clamp to [0, 1] and truncate toward zero. Decodes multiply by the
//! single precision reciprocal of the largest code, matching the hardware bit for bit.

use crate::core::error::ProtocolError;
use crate::core::gpu::{QuadFloat, TextureFormat};
use crate::core::math::{f16_to_f32, f32_to_f16};

const GAMMA_EXPONENT: f64 = (1.0f32 / 2.2) as f64;
const LINEAR_EXPONENT: f64 = 2.2f32 as f64;

const UNORM8_SCALE: f32 = 1.0f32 / 255.0;
const UNORM16_SCALE: f32 = 1.0f32 / 65535.0;

#[inline(always)]
fn unorm(value: f32, max: f32) -> f32 {
    max * value.clamp(0.0, 1.0)
}

#[inline(always)]
fn u16_at(bytes: &[u8], index: usize) -> u16 {
    u16::from_le_bytes([bytes[index * 2], bytes[index * 2 + 1]])
}

/// Decode one RGBA8888 pixel
pub fn rgba8_to_rgba32f(bytes: &[u8]) -> QuadFloat {
    [
        bytes[0] as f32 * UNORM8_SCALE,
        bytes[1] as f32 * UNORM8_SCALE,
        bytes[2] as f32 * UNORM8_SCALE,
        bytes[3] as f32 * UNORM8_SCALE,
    ]
}

/// Encode one RGBA8888 pixel
pub fn rgba32f_to_rgba8(color: &QuadFloat) -> [u8; 4] {
    color.map(|c| unorm(c, 255.0) as u8)
}

/// Decode one RGBA16 (unorm16) pixel
pub fn rgba16_to_rgba32f(bytes: &[u8]) -> QuadFloat {
    std::array::from_fn(|i| u16_at(bytes, i) as f32 * UNORM16_SCALE)
}

/// Encode one RGBA16 (unorm16) pixel
pub fn rgba32f_to_rgba16(color: &QuadFloat) -> [u8; 8] {
    let mut out = [0u8; 8];
    for (i, c) in color.iter().enumerate() {
        out[i * 2..i * 2 + 2].copy_from_slice(&(unorm(*c, 65535.0) as u16).to_le_bytes());
    }
    out
}

/// Decode one RGBA16F pixel
pub fn rgba16f_to_rgba32f(bytes: &[u8]) -> QuadFloat {
    std::array::from_fn(|i| f16_to_f32(u16_at(bytes, i)))
}

/// Encode one RGBA16F pixel
pub fn rgba32f_to_rgba16f(color: &QuadFloat) -> [u8; 8] {
    let mut out = [0u8; 8];
    for (i, c) in color.iter().enumerate() {
        out[i * 2..i * 2 + 2].copy_from_slice(&f32_to_f16(*c).to_le_bytes());
    }
    out
}

/// Decode one RG16F pixel
pub fn rg16f_to_rgba32f(bytes: &[u8]) -> QuadFloat {
    [f16_to_f32(u16_at(bytes, 0)), f16_to_f32(u16_at(bytes, 1)), 0.0, 1.0]
}

/// Encode one RG16F pixel
pub fn rgba32f_to_rg16f(color: &QuadFloat) -> [u8; 4] {
    let r = f32_to_f16(color[0]).to_le_bytes();
    let g = f32_to_f16(color[1]).to_le_bytes();
    [r[0], r[1], g[0], g[1]]
}

/// Decode one R32F pixel
pub fn r32f_to_rgba32f(bytes: &[u8]) -> QuadFloat {
    [f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]), 0.0, 0.0, 1.0]
}

/// Encode one R32F pixel
pub fn rgba32f_to_r32f(color: &QuadFloat) -> [u8; 4] {
    color[0].to_le_bytes()
}

/// Convert a color from linear to sRGB space (alpha untouched)
pub fn linear_to_srgb(color: &mut QuadFloat) {
    for c in color.iter_mut().take(3) {
        *c = (*c as f64).powf(GAMMA_EXPONENT) as f32;
    }
}

/// Convert a color from sRGB to linear space (alpha untouched)
pub fn srgb_to_linear(color: &mut QuadFloat) {
    for c in color.iter_mut().take(3) {
        *c = (*c as f64).powf(LINEAR_EXPONENT) as f32;
    }
}

/// Bytes per pixel of a color buffer format
pub fn bytes_per_pixel(format: TextureFormat) -> Result<usize, ProtocolError> {
    format
        .render_target_bytes()
        .map(|b| b as usize)
        .ok_or_else(|| unsupported(format))
}

fn unsupported(format: TextureFormat) -> ProtocolError {
    ProtocolError::UnsupportedFormat(format!("{:?} color buffer", format))
}

/// Decode one stored pixel of a color buffer format into RGBA32F
pub fn decode_color(format: TextureFormat, bytes: &[u8]) -> Result<QuadFloat, ProtocolError> {
    match format {
        TextureFormat::Rgba8888 => Ok(rgba8_to_rgba32f(bytes)),
        TextureFormat::Rg16F => Ok(rg16f_to_rgba32f(bytes)),
        TextureFormat::R32F => Ok(r32f_to_rgba32f(bytes)),
        TextureFormat::Rgba16 => Ok(rgba16_to_rgba32f(bytes)),
        TextureFormat::Rgba16F => Ok(rgba16f_to_rgba32f(bytes)),
        _ => Err(unsupported(format)),
    }
}

/// Encode an RGBA32F color into the storage bytes of a color buffer format
///
/// `out` must hold at least `bytes_per_pixel(format)` bytes.
pub fn encode_color(format: TextureFormat, color: &QuadFloat, out: &mut [u8]) -> Result<(), ProtocolError> {
    match format {
        TextureFormat::Rgba8888 => out[..4].copy_from_slice(&rgba32f_to_rgba8(color)),
        TextureFormat::Rg16F => out[..4].copy_from_slice(&rgba32f_to_rg16f(color)),
        TextureFormat::R32F => out[..4].copy_from_slice(&rgba32f_to_r32f(color)),
        TextureFormat::Rgba16 => out[..8].copy_from_slice(&rgba32f_to_rgba16(color)),
        TextureFormat::Rgba16F => out[..8].copy_from_slice(&rgba32f_to_rgba16f(color)),
        _ => return Err(unsupported(format)),
    }
    Ok(())
}

/// Resolve the samples of one pixel into a single color
///
/// When every sample holds the same value (full coverage) that value is returned
/// unchanged. Otherwise samples are averaged in linear space and gamma is re-applied.
pub fn resolve_samples(samples: &[QuadFloat]) -> QuadFloat {
    let Some(first) = samples.first() else {
        return [0.0; 4];
    };
    if samples.iter().all(|s| s == first) {
        return *first;
    }

    let mut acc = [0.0f32; 4];
    for sample in samples {
        let mut linear = *sample;
        srgb_to_linear(&mut linear);
        for (a, c) in acc.iter_mut().zip(linear) {
            *a += c;
        }
    }
    let n = samples.len() as f32;
    let mut resolved = acc.map(|a| a / n);
    linear_to_srgb(&mut resolved);
    resolved
}
