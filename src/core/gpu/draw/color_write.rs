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

use crate::core::codec;
use crate::core::error::{ProtocolError, Result};
use crate::core::gpu::types::*;
use crate::core::gpu::units::ShadedFragment;
use crate::core::gpu::validation::{ColorRecord, FragmentKey};
use crate::core::gpu::GpuEmulator;

const COMPONENT: &str = "GpuEmulator";

/// Bytes of a stored pixel that a color mask allows to be written
///
/// Channel `c` of the format occupies bytes `c * width .. (c + 1) * width`. Formats with
/// fewer than four channels ignore the mask bits of the missing channels.
pub(in crate::core::gpu) fn channel_byte_mask(format: TextureFormat, mask: ColorMask) -> [bool; MAX_BYTES_PER_PIXEL] {
    let (channels, width) = match format {
        TextureFormat::Rgba8888 => (4, 1),
        TextureFormat::Rg16F => (2, 2),
        TextureFormat::R32F => (1, 4),
        TextureFormat::Rgba16 | TextureFormat::Rgba16F => (4, 2),
        _ => (0, 0),
    };

    let mut bytes = [false; MAX_BYTES_PER_PIXEL];
    for (c, flag) in ColorMask::CHANNELS.iter().enumerate().take(channels) {
        if mask.contains(*flag) {
            bytes[c * width..(c + 1) * width].fill(true);
        }
    }
    bytes
}

/// One sample to be written into a render target
struct ColorSample {
    fragment: usize,
    sample: u32,
    address: u64,
    source: QuadFloat,
}

impl GpuEmulator {
    /// Blend, logic op and write the shaded colors of a stamp into every enabled render target
    pub(super) fn emulate_color_write(&mut self, quad: &[ShadedFragment; STAMP_FRAGMENTS], triangle: u64) -> Result<()> {
        for rt in 0..MAX_RENDER_TARGETS {
            if self.state.rt_enable[rt] {
                self.write_render_target(rt, quad, triangle)?;
            }
        }
        Ok(())
    }

    fn write_render_target(&mut self, rt: usize, quad: &[ShadedFragment; STAMP_FRAGMENTS], triangle: u64) -> Result<()> {
        let s = &self.state;
        let format = s.rt_format[rt];
        let bpp = codec::bytes_per_pixel(format).map_err(|e| e.at(COMPONENT, "emulate_color_write"))?;
        let byte_mask = channel_byte_mask(format, s.color_mask(rt));
        let srgb = s.color_srgb_write;
        let blend = s.color_blend[rt];
        let logic_op = rt == 0 && s.logical_operation;

        if logic_op && format != TextureFormat::Rgba8888 {
            return Err(ProtocolError::UnsupportedFormat(format!("logic operation on a {:?} color buffer", format))
                .at(COMPONENT, "emulate_color_write"));
        }

        let samples = self.sample_count();
        let mut pending = Vec::with_capacity(STAMP_FRAGMENTS * samples as usize);
        for (i, shaded) in quad.iter().enumerate() {
            if shaded.culled {
                continue;
            }
            let f = &shaded.fragment;
            let base = s.rt_address[rt] as u64 + self.color_mappers[rt].compute_address(f.x as u32, f.y as u32) as u64;

            let mut source = shaded.attributes[COLOR_ATTRIBUTE + rt];
            if format == TextureFormat::Rgba8888 {
                for c in source.iter_mut() {
                    *c = c.clamp(0.0, 1.0);
                }
            }

            for sample in 0..samples {
                if s.multisampling && !f.coverage[sample as usize] {
                    continue;
                }
                pending.push(ColorSample {
                    fragment: i,
                    sample,
                    address: base + (sample as u64) * bpp as u64,
                    source,
                });
            }
        }

        if pending.is_empty() {
            return Ok(());
        }

        let mut stored = Vec::with_capacity(pending.len());
        for p in &pending {
            let bytes = self
                .memory
                .read(p.address, bpp)
                .map_err(|e| e.at(COMPONENT, "emulate_color_write"))?;
            stored.push(bytes.to_vec());
        }

        let mut colors: Vec<QuadFloat> = pending.iter().map(|p| p.source).collect();
        if blend {
            let mut destination = Vec::with_capacity(pending.len());
            for bytes in &stored {
                let mut color = codec::decode_color(format, bytes).map_err(|e| e.at(COMPONENT, "emulate_color_write"))?;
                if srgb {
                    codec::srgb_to_linear(&mut color);
                }
                destination.push(color);
            }
            let source = colors.clone();
            self.units.fragment_ops.blend(rt, &source, &destination, &mut colors);
        }

        let mut encoded = Vec::with_capacity(pending.len());
        for color in colors.iter_mut() {
            if srgb {
                codec::linear_to_srgb(color);
            }
            let mut bytes = vec![0u8; bpp];
            codec::encode_color(format, color, &mut bytes).map_err(|e| e.at(COMPONENT, "emulate_color_write"))?;
            encoded.push(bytes);
        }

        if logic_op {
            for (bytes, destination) in encoded.iter_mut().zip(&stored) {
                let source = bytes.clone();
                self.units.fragment_ops.logic_op(&source, destination, bytes);
            }
        }

        for ((p, bytes), read) in pending.iter().zip(&encoded).zip(&stored) {
            let target = self
                .memory
                .slice_mut(p.address, bpp)
                .map_err(|e| e.at(COMPONENT, "emulate_color_write"))?;
            for (b, (dst, &src)) in target.iter_mut().zip(bytes).enumerate() {
                if byte_mask[b] {
                    *dst = src;
                }
            }
            let written = target.to_vec();

            let f = &quad[p.fragment].fragment;
            self.update_maps.mark_color(rt, f.x as u32, f.y as u32);

            if let Some(log) = self.validation.as_mut() {
                log.record_color(
                    rt,
                    FragmentKey::new(f.x, f.y, triangle, p.sample),
                    ColorRecord {
                        input: p.source,
                        read: read.clone(),
                        written,
                    },
                );
            }
        }

        Ok(())
    }
}
