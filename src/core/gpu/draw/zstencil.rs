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

use crate::core::error::Result;
use crate::core::gpu::types::*;
use crate::core::gpu::units::ShadedFragment;
use crate::core::gpu::validation::{FragmentKey, ZStencilRecord};
use crate::core::gpu::GpuEmulator;

const COMPONENT: &str = "GpuEmulator";

/// Bytes of a Z/stencil word holding the 24-bit depth
const DEPTH_BYTES: std::ops::Range<usize> = 0..3;
/// Byte of a Z/stencil word holding the stencil value
const STENCIL_BYTE: usize = 3;

/// Per sample data of one stamp gathered for the fragment operation unit
#[derive(Debug, Default)]
struct SampleBatch {
    /// (fragment, sample) of each entry
    owner: Vec<(usize, usize)>,
    depth: Vec<u32>,
    buffer: Vec<u32>,
    culled: Vec<bool>,
    address: Vec<u64>,
}

impl GpuEmulator {
    /// Stencil and depth test of a stamp against the Z/stencil buffer
    ///
    /// Fragments (or samples when multisampling) failing either test are marked as
    /// culled. Stencil and depth values are written back honoring the stencil update
    /// mask and the depth mask.
    pub(super) fn emulate_z_stencil(&mut self, quad: &mut [ShadedFragment; STAMP_FRAGMENTS], triangle: u64) -> Result<()> {
        if !self.state.depth_test && !self.state.stencil_test {
            return Ok(());
        }

        let multisampling = self.state.multisampling;
        let samples = self.sample_count() as usize;
        let mut batch = SampleBatch::default();

        for (i, shaded) in quad.iter().enumerate() {
            let f = &shaded.fragment;
            // Culled fragments may lie outside the framebuffer
            let base = if shaded.culled {
                0
            } else {
                self.state.zstencil_buffer_addr as u64
                    + self.zstencil_mapper.compute_address(f.x as u32, f.y as u32) as u64
            };

            let modified_z = self.state.modify_depth.then(|| {
                let depth = shaded.attributes[POSITION_ATTRIBUTE][3].clamp(0.0, 1.0);
                self.units.rasterizer.convert_z(depth as f64)
            });

            for s in 0..samples {
                let address = base + (s as u64) * 4;
                let culled = shaded.culled || (multisampling && !f.coverage[s]);
                let z = match modified_z {
                    Some(z) => z,
                    None if multisampling => f.msaa_z[s],
                    None => f.z,
                };
                let word = if culled {
                    0
                } else {
                    self.memory
                        .read_u32(address)
                        .map_err(|e| e.at(COMPONENT, "emulate_z_stencil"))?
                };

                batch.owner.push((i, s));
                batch.depth.push(z);
                batch.buffer.push(word);
                batch.culled.push(culled);
                batch.address.push(address);
            }
        }

        let read = batch.buffer.clone();
        let was_culled = batch.culled.clone();
        self.units
            .fragment_ops
            .stencil_z_test(&batch.depth, &mut batch.buffer, &mut batch.culled);

        let write_depth = self.state.depth_test && self.state.depth_mask;
        let write_stencil = self.state.stencil_test && self.state.stencil_update_mask != 0;

        for (k, &(i, s)) in batch.owner.iter().enumerate() {
            if was_culled[k] {
                continue;
            }

            let bytes = batch.buffer[k].to_le_bytes();
            let target = self
                .memory
                .slice_mut(batch.address[k], 4)
                .map_err(|e| e.at(COMPONENT, "emulate_z_stencil"))?;
            if write_depth {
                target[DEPTH_BYTES].copy_from_slice(&bytes[DEPTH_BYTES]);
            }
            if write_stencil {
                target[STENCIL_BYTE] = bytes[STENCIL_BYTE];
            }

            let f = &quad[i].fragment;
            if write_depth || write_stencil {
                self.update_maps.mark_z(f.x as u32, f.y as u32);
            }

            if let Some(log) = self.validation.as_mut() {
                log.record_z_stencil(
                    FragmentKey::new(f.x, f.y, triangle, s as u32),
                    ZStencilRecord {
                        depth: batch.depth[k],
                        read: read[k],
                        written: batch.buffer[k],
                        culled: batch.culled[k],
                    },
                );
            }
        }

        for (k, &(i, s)) in batch.owner.iter().enumerate() {
            if multisampling {
                quad[i].fragment.coverage[s] = !batch.culled[k];
            }
        }
        for (i, shaded) in quad.iter_mut().enumerate() {
            let start = i * samples;
            shaded.culled = batch.culled[start..start + samples].iter().all(|&c| c);
        }

        Ok(())
    }
}
