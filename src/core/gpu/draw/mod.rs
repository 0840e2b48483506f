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

//! Draw call orchestration
//!
//! A draw call runs these stages, the streamer to rasterization part once per instance:
//!
//! 1. [`setup_draw`](GpuEmulator::setup_draw): push register state into the rasterizer
//!    and the fragment operation unit, configure the framebuffer address mappers
//! 2. streamer: index fetch, attribute fetch and vertex shading with a per instance cache
//! 3. primitive assembly: index list to triangles
//! 4. rasterization: per triangle culling, then per stamp fragment culling, attribute
//!    setup, Z/stencil test (early or late), fragment shading and color write
//! 5. cleanup of the vertex cache and index list

mod assembly;
mod color_write;
mod rasterization;
mod shading;
mod streamer;
mod texture;
mod zstencil;

use std::collections::HashMap;

#[cfg(test)]
pub(in crate::core::gpu) use assembly::assemble_triangles;
#[cfg(test)]
pub(in crate::core::gpu) use color_write::channel_byte_mask;
#[cfg(test)]
pub(in crate::core::gpu) use rasterization::{face_culling, FaceCulling};
#[cfg(test)]
pub(in crate::core::gpu) use streamer::convert_stream_element;

use super::types::*;
use super::units::ShadedVertex;
use super::GpuEmulator;
use crate::core::codec;
use crate::core::error::{EmulatorError, Result};

const COMPONENT: &str = "GpuEmulator";

/// Counters of the work done by the draw pipeline
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineStats {
    /// Draw calls that reached the pipeline
    pub draws: u64,
    /// Draw calls dropped by skip-batch mode
    pub skipped_draws: u64,
    pub vertices_shaded: u64,
    /// Vertices served from the per draw vertex cache
    pub vertex_cache_hits: u64,
    /// Triangles dropped by the frustum trivial reject
    pub triangles_rejected: u64,
    /// Triangles dropped by face or zero area culling
    pub triangles_culled: u64,
    pub triangles_rasterized: u64,
    pub stamps_generated: u64,
    /// Stamps dropped because every fragment was culled before shading
    pub stamps_culled: u64,
    /// Fragment shader invocations, one per stamp
    pub stamps_shaded: u64,
    pub fragments_shaded: u64,
    pub texture_accesses: u64,
}

/// Shaded vertices of the current draw call, keyed by vertex index
#[derive(Debug, Default)]
pub(in crate::core::gpu) struct VertexCache {
    vertices: Vec<ShadedVertex>,
    slots: HashMap<u32, usize>,
}

impl VertexCache {
    pub fn get(&self, index: u32) -> Option<&ShadedVertex> {
        self.slots.get(&index).map(|&slot| &self.vertices[slot])
    }

    pub fn contains(&self, index: u32) -> bool {
        self.slots.contains_key(&index)
    }

    pub fn insert(&mut self, index: u32, vertex: ShadedVertex) {
        let slot = self.vertices.len();
        self.vertices.push(vertex);
        self.slots.insert(index, slot);
    }

    pub fn len(&self) -> usize {
        self.vertices.len()
    }

    pub fn clear(&mut self) {
        self.vertices.clear();
        self.slots.clear();
    }
}

impl GpuEmulator {
    /// GPU_DRAW
    pub(in crate::core::gpu) fn draw(&mut self) -> Result<()> {
        self.next_batch();

        if self.skip_batches() {
            log::debug!("Skipping batch {}", self.batch_counter());
            self.stats.skipped_draws += 1;
            return Ok(());
        }

        if !self.units.rasterizer.is_attached() {
            return Err(EmulatorError::UnitUnavailable { unit: "rasterizer" });
        }
        if !self.units.shader.is_attached() {
            return Err(EmulatorError::UnitUnavailable { unit: "shader" });
        }

        log::debug!(
            "Draw batch {}: {} {} vertices, {} instances",
            self.batch_counter(),
            self.state.stream_count,
            self.state.primitive_mode.name(),
            self.state.stream_instances
        );

        self.setup_draw()?;

        for instance in 0..self.state.stream_instances {
            let result = self
                .emulate_streamer(instance)
                .and_then(|_| self.emulate_primitive_assembly());
            self.cleanup_draw();
            result?;
        }

        self.stats.draws += 1;
        Ok(())
    }

    /// Push the register state used by the pipeline into the external units
    pub(in crate::core::gpu) fn setup_draw(&mut self) -> Result<()> {
        let s = &self.state;

        let r = &mut self.units.rasterizer;
        r.set_viewport(
            s.d3d9_pixel_coordinates,
            s.viewport_ini_x,
            s.viewport_ini_y,
            s.viewport_width,
            s.viewport_height,
        );
        r.set_scissor(
            s.display_res_x,
            s.display_res_y,
            s.scissor_test,
            s.scissor_ini_x,
            s.scissor_ini_y,
            s.scissor_width,
            s.scissor_height,
        );
        r.set_depth_range(s.d3d9_depth_range, s.near_range, s.far_range);
        r.set_polygon_offset(s.slope_factor, s.unit_offset);
        r.set_depth_precision(s.z_buffer_bit_precision);
        r.set_face_mode(s.face_mode);
        r.set_d3d9_rasterization_rules(s.d3d9_rasterization_rules);

        let f = &mut self.units.fragment_ops;
        for rt in 0..MAX_RENDER_TARGETS {
            f.set_blending(
                rt,
                s.blend_equation[rt],
                s.blend_source_rgb[rt],
                s.blend_source_alpha[rt],
                s.blend_destination_rgb[rt],
                s.blend_destination_alpha[rt],
                s.blend_color[rt],
            );
        }
        f.set_logic_op_mode(s.logic_op_function);
        f.configure_z_test(s.depth_function, s.depth_mask);
        f.set_z_test(s.depth_test);
        f.configure_stencil_test(
            s.stencil_function,
            s.stencil_reference,
            s.stencil_test_mask,
            s.stencil_update_mask,
            s.stencil_fail,
            s.depth_fail,
            s.depth_pass,
        );
        f.set_stencil_test(s.stencil_test);

        for rt in 0..MAX_RENDER_TARGETS {
            if self.state.rt_enable[rt] {
                self.setup_color_mapper(rt)?;
            }
        }
        self.setup_zstencil_mapper()
    }

    /// Samples stored per pixel
    pub(in crate::core::gpu) fn sample_count(&self) -> u32 {
        if self.state.multisampling {
            self.state.msaa_samples
        } else {
            1
        }
    }

    /// Configure the address mapping of a render target for the current display
    pub(in crate::core::gpu) fn setup_color_mapper(&mut self, rt: usize) -> Result<()> {
        let bytes = codec::bytes_per_pixel(self.state.rt_format[rt])
            .map_err(|e| e.at(COMPONENT, "setup_color_mapper"))?;
        let samples = self.sample_count();
        self.color_mappers[rt]
            .setup_display(
                self.state.display_res_x,
                self.state.display_res_y,
                &self.geometry,
                samples,
                bytes as u32,
            )
            .map_err(|e| e.at(COMPONENT, "setup_color_mapper"))
    }

    /// Configure the address mapping of the depth/stencil buffer for the current display
    pub(in crate::core::gpu) fn setup_zstencil_mapper(&mut self) -> Result<()> {
        let samples = self.sample_count();
        self.zstencil_mapper
            .setup_display(
                self.state.display_res_x,
                self.state.display_res_y,
                &self.geometry,
                samples,
                self.state.zstencil_bytes_per_pixel(),
            )
            .map_err(|e| e.at(COMPONENT, "setup_zstencil_mapper"))
    }

    fn cleanup_draw(&mut self) {
        self.vertex_cache.clear();
        self.index_list.clear();
    }
}
