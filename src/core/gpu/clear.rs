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

//! Fast clears and the blitter

use crate::core::codec;
use crate::core::error::{ProtocolError, Result};
use crate::core::math::texel_to_morton_address;
use crate::core::pixel_mapper::PixelMapper;

use super::types::*;
use super::GpuEmulator;

const COMPONENT: &str = "GpuEmulator";

bitflags::bitflags! {
    /// Buffers affected by a clear command
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ClearMask: u8 {
        const COLOR = 0b001;
        const DEPTH = 0b010;
        const STENCIL = 0b100;
    }
}

const DEPTH_MASK: u32 = 0x00ff_ffff;

/// Repeat `pattern` over `target`
fn fill_pattern(target: &mut [u8], pattern: &[u8]) {
    for chunk in target.chunks_mut(pattern.len()) {
        chunk.copy_from_slice(&pattern[..chunk.len()]);
    }
}

impl GpuEmulator {
    /// Clear the buffers selected by `mask` with the current clear values
    pub(in crate::core::gpu) fn clear(&mut self, mask: ClearMask) -> Result<()> {
        log::debug!("Clear {:?}", mask);

        if mask.contains(ClearMask::COLOR) {
            self.clear_color_buffer()?;
        }
        if mask.intersects(ClearMask::DEPTH | ClearMask::STENCIL) {
            self.clear_z_stencil_buffer(mask)?;
        }
        Ok(())
    }

    /// Fill every enabled render target with the clear color
    fn clear_color_buffer(&mut self) -> Result<()> {
        let mut color = self.state.color_buffer_clear;
        if self.state.color_srgb_write {
            codec::linear_to_srgb(&mut color);
        }

        for rt in 0..MAX_RENDER_TARGETS {
            if !self.state.rt_enable[rt] {
                continue;
            }

            self.setup_color_mapper(rt)?;
            let format = self.state.rt_format[rt];
            let bpp = codec::bytes_per_pixel(format).map_err(|e| e.at(COMPONENT, "clear_color_buffer"))?;
            let mut pattern = vec![0u8; bpp];
            codec::encode_color(format, &color, &mut pattern).map_err(|e| e.at(COMPONENT, "clear_color_buffer"))?;

            let size = self.color_mappers[rt].frame_buffer_size() as usize;
            let target = self
                .memory
                .slice_mut(self.state.rt_address[rt] as u64, size)
                .map_err(|e| e.at(COMPONENT, "clear_color_buffer"))?;
            fill_pattern(target, &pattern);

            self.update_maps.fill_color(rt);
        }
        Ok(())
    }

    /// Clear depth and/or stencil, preserving the part not selected by `mask`
    fn clear_z_stencil_buffer(&mut self, mask: ClearMask) -> Result<()> {
        self.setup_zstencil_mapper()?;

        let depth = self.state.z_buffer_clear & DEPTH_MASK;
        let stencil = self.state.stencil_buffer_clear & 0xff;
        let clear_depth = mask.contains(ClearMask::DEPTH);
        let clear_stencil = mask.contains(ClearMask::STENCIL);

        let size = self.zstencil_mapper.frame_buffer_size() as usize;
        let target = self
            .memory
            .slice_mut(self.state.zstencil_buffer_addr as u64, size)
            .map_err(|e| e.at(COMPONENT, "clear_z_stencil_buffer"))?;

        if clear_depth && clear_stencil {
            fill_pattern(target, &((stencil << 24) | depth).to_le_bytes());
        } else {
            for word in target.chunks_exact_mut(4) {
                let old = u32::from_le_bytes([word[0], word[1], word[2], word[3]]);
                let new = if clear_depth {
                    (old & !DEPTH_MASK) | depth
                } else {
                    (old & DEPTH_MASK) | (stencil << 24)
                };
                word.copy_from_slice(&new.to_le_bytes());
            }
        }

        self.update_maps.fill_z();
        Ok(())
    }

    /// Copy a rectangle of the back buffer into a texture
    ///
    /// Source pixels `(blit_ini_x + i, blit_ini_y + j)` are written to texel
    /// `(blit_x_offset + i, blit_y_offset + j)` of the destination, laid out either with
    /// the texture Morton order or with the framebuffer tiling.
    pub(in crate::core::gpu) fn blit(&mut self) -> Result<()> {
        let s = &self.state;

        if s.rt_format[0] != TextureFormat::Rgba8888 {
            return Err(ProtocolError::UnsupportedFormat(format!("blit from a {:?} color buffer", s.rt_format[0]))
                .at(COMPONENT, "blit"));
        }
        if s.blit_destination_format != TextureFormat::Rgba8888 {
            return Err(ProtocolError::UnsupportedFormat(format!(
                "blit into a {:?} texture",
                s.blit_destination_format
            ))
            .at(COMPONENT, "blit"));
        }

        let right = s.blit_ini_x as u64 + s.blit_width as u64;
        let bottom = s.blit_ini_y as u64 + s.blit_height as u64;
        if right > s.display_res_x as u64 || bottom > s.display_res_y as u64 {
            return Err(ProtocolError::ValueOutOfRange {
                register: "GPU_BLIT_INI_X/Y",
                value: format!(
                    "{}x{} at ({}, {}) outside the {}x{} display",
                    s.blit_width, s.blit_height, s.blit_ini_x, s.blit_ini_y, s.display_res_x, s.display_res_y
                ),
            }
            .at(COMPONENT, "blit"));
        }

        // Destination texels are addressed with 32 bit arithmetic inside one texture
        let max_dimension = 1u32 << (MAX_TEXTURE_SIZE - 1);
        let fits = |offset: u32, extent: u32| offset.checked_add(extent).is_some_and(|end| end <= max_dimension);
        if s.blit_texture_width2 >= MAX_TEXTURE_SIZE as u32
            || !fits(s.blit_x_offset, s.blit_width)
            || !fits(s.blit_y_offset, s.blit_height)
        {
            return Err(ProtocolError::ValueOutOfRange {
                register: "GPU_BLIT_X/Y_OFFSET",
                value: format!(
                    "{}x{} at ({}, {}) in a 2^{} wide texture, limit {}",
                    s.blit_width, s.blit_height, s.blit_x_offset, s.blit_y_offset, s.blit_texture_width2, max_dimension
                ),
            }
            .at(COMPONENT, "blit"));
        }

        log::debug!(
            "Blit {}x{} from ({}, {}) to ({}, {}) at {:#010x} ({:?})",
            s.blit_width,
            s.blit_height,
            s.blit_ini_x,
            s.blit_ini_y,
            s.blit_x_offset,
            s.blit_y_offset,
            s.blit_destination_address,
            s.blit_destination_blocking
        );

        self.setup_color_mapper(0)?;

        let s = &self.state;
        let destination_mapper = match s.blit_destination_blocking {
            TextureBlocking::Texture => None,
            TextureBlocking::Framebuffer => {
                let mut mapper = PixelMapper::new();
                mapper
                    .setup_display(
                        1 << s.blit_texture_width2,
                        s.blit_y_offset + s.blit_height,
                        &self.geometry,
                        1,
                        4,
                    )
                    .map_err(|e| e.at(COMPONENT, "blit"))?;
                Some(mapper)
            }
        };

        let samples = self.sample_count() as usize;
        let source_base = s.rt_address[0] as u64;
        let destination_base = s.blit_destination_address as u64;
        let (block_dim, super_block_dim) = (self.texture_config.block_dim, self.texture_config.super_block_dim);
        let (ini_x, ini_y, x_offset, y_offset) = (s.blit_ini_x, s.blit_ini_y, s.blit_x_offset, s.blit_y_offset);
        let (width, height, width2) = (s.blit_width, s.blit_height, s.blit_texture_width2);

        for j in 0..height {
            for i in 0..width {
                let source = source_base + self.color_mappers[0].compute_address(ini_x + i, ini_y + j) as u64;
                let bytes = self
                    .memory
                    .read(source, samples * 4)
                    .map_err(|e| e.at(COMPONENT, "blit"))?;

                let texel = if samples == 1 {
                    [bytes[0], bytes[1], bytes[2], bytes[3]]
                } else {
                    let colors: Vec<QuadFloat> = bytes.chunks_exact(4).map(codec::rgba8_to_rgba32f).collect();
                    codec::rgba32f_to_rgba8(&codec::resolve_samples(&colors))
                };

                let (tx, ty) = (x_offset + i, y_offset + j);
                let offset = match &destination_mapper {
                    Some(mapper) => mapper.compute_address(tx, ty) as u64,
                    None => texel_to_morton_address(tx, ty, block_dim, super_block_dim, width2) as u64 * 4,
                };

                self.memory
                    .slice_mut(destination_base + offset, 4)
                    .map_err(|e| e.at(COMPONENT, "blit"))?
                    .copy_from_slice(&texel);
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fill_pattern_repeats() {
        let mut buffer = [0u8; 10];
        fill_pattern(&mut buffer, &[1, 2, 3, 4]);
        assert_eq!(buffer, [1, 2, 3, 4, 1, 2, 3, 4, 1, 2]);
    }

    #[test]
    fn test_clear_mask_combinations() {
        let z_only = ClearMask::DEPTH;
        assert!(!z_only.contains(ClearMask::STENCIL));
        assert!(ClearMask::all().contains(ClearMask::COLOR | ClearMask::DEPTH | ClearMask::STENCIL));
    }
}
