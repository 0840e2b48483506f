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

//! Vertex fetch and vertex shading

use super::COMPONENT;
use crate::core::error::{ProtocolError, Result};
use crate::core::gpu::types::*;
use crate::core::gpu::units::{Bank, ShadedVertex};
use crate::core::gpu::GpuEmulator;
use crate::core::math::f16_to_f32;

/// Convert one stream element to float
///
/// Normalized formats multiply by the single precision reciprocal of their largest code,
/// integer formats convert by value. `bytes` holds at least `format.size()` little endian
/// bytes.
pub(in crate::core::gpu) fn convert_stream_element(format: StreamData, bytes: &[u8]) -> f32 {
    let u16_at = || u16::from_le_bytes([bytes[0], bytes[1]]);
    let u32_at = || u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);

    match format {
        StreamData::Unorm8 => bytes[0] as f32 * (1.0f32 / 255.0),
        StreamData::Snorm8 => bytes[0] as i8 as f32 * (1.0f32 / 127.0),
        StreamData::Unorm16 => u16_at() as f32 * (1.0f32 / 65535.0),
        StreamData::Snorm16 => u16_at() as i16 as f32 * (1.0f32 / 32767.0),
        StreamData::Unorm32 => u32_at() as f32 * (1.0f32 / 4294967295.0),
        StreamData::Snorm32 => u32_at() as i32 as f32 * (1.0f32 / 2147483647.0),
        StreamData::Float16 => f16_to_f32(u16_at()),
        StreamData::Float32 => f32::from_bits(u32_at()),
        StreamData::Uint8 => bytes[0] as f32,
        StreamData::Sint8 => bytes[0] as i8 as f32,
        StreamData::Uint16 => u16_at() as f32,
        StreamData::Sint16 => u16_at() as i16 as f32,
        StreamData::Uint32 => u32_at() as f32,
        StreamData::Sint32 => u32_at() as i32 as f32,
    }
}

impl GpuEmulator {
    /// Fetch and shade the vertices of one instance and build the index list
    pub(super) fn emulate_streamer(&mut self, instance: u32) -> Result<()> {
        let count = self.state.stream_count;
        self.index_list.reserve(count as usize);

        for i in 0..count {
            let index = self.fetch_index(i)?;

            if self.vertex_cache.contains(index) {
                self.stats.vertex_cache_hits += 1;
            } else {
                let inputs = self.fetch_attributes(index, instance)?;
                let vertex = self.shade_vertex(index, instance, &inputs)?;
                self.vertex_cache.insert(index, vertex);
            }
            self.index_list.push(index);
        }

        log::trace!(
            "Instance {}: {} indices, {} vertices shaded",
            instance,
            self.index_list.len(),
            self.vertex_cache.len()
        );
        Ok(())
    }

    /// Vertex index of the `i`-th vertex of the draw call
    fn fetch_index(&self, i: u32) -> Result<u32> {
        let s = &self.state;
        let position = s.stream_start + i;
        if !s.indexed_mode {
            return Ok(position);
        }

        let stream = s.index_stream as usize;
        let format = s.stream_data[stream];
        let size = format.size();
        let address = s.stream_address[stream] as u64 + position as u64 * size as u64;
        let read = |size| {
            self.memory
                .read(address, size)
                .map_err(|e| e.at(COMPONENT, "fetch_index"))
        };

        match format {
            StreamData::Uint8 => Ok(read(1)?[0] as u32),
            StreamData::Uint16 => {
                let b = read(2)?;
                Ok(u16::from_le_bytes([b[0], b[1]]) as u32)
            }
            StreamData::Uint32 => {
                let b = read(4)?;
                Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            }
            _ => Err(ProtocolError::UnsupportedFormat(format!("{:?} index stream", format))
                .at(COMPONENT, "fetch_index")),
        }
    }

    /// Read the input attributes of a vertex from its streams
    fn fetch_attributes(&self, index: u32, instance: u32) -> Result<[QuadFloat; MAX_VERTEX_ATTRIBUTES]> {
        let s = &self.state;
        let mut inputs = s.attribute_default;

        if s.attribute_load_bypass {
            inputs[0] = [index as f32, instance as f32, 0.0, 0.0];
            return Ok(inputs);
        }

        for (attribute, input) in inputs.iter_mut().enumerate() {
            let stream = s.attribute_map[attribute];
            if stream == ST_INACTIVE_ATTRIBUTE {
                continue;
            }
            let stream = stream as usize;

            let element = match s.stream_frequency[stream] {
                0 => index,
                frequency => instance / frequency,
            };
            let format = s.stream_data[stream];
            let size = format.size();
            let components = s.stream_elements[stream] as usize;
            let address = s.stream_address[stream] as u64 + element as u64 * s.stream_stride[stream] as u64;

            let bytes = self
                .memory
                .read(address, components * size)
                .map_err(|e| e.at(COMPONENT, "fetch_attributes"))?;
            for (c, chunk) in bytes.chunks_exact(size).enumerate() {
                input[c] = convert_stream_element(format, chunk);
            }

            // D3D9 colors are stored BGRA
            if s.d3d9_color_stream[stream] {
                input.swap(0, 2);
            }
        }

        Ok(inputs)
    }

    fn shade_vertex(
        &mut self,
        index: u32,
        instance: u32,
        inputs: &[QuadFloat; MAX_VERTEX_ATTRIBUTES],
    ) -> Result<ShadedVertex> {
        let start_pc = self.state.program_start_pc[ShaderTarget::Vertex as usize];

        self.units.shader.reset_shader_state(0);
        self.units.shader.load_shader_state(0, Bank::Input, inputs);
        self.execute_program(1, start_pc, ShaderTarget::Vertex)?;

        let mut outputs = [[0.0; 4]; MAX_VERTEX_ATTRIBUTES];
        self.units.shader.read_shader_state(0, Bank::Output, &mut outputs);

        for c in outputs[COLOR_ATTRIBUTE].iter_mut() {
            *c = c.clamp(0.0, 1.0);
        }

        if let Some(log) = self.validation.as_mut() {
            log.record_vertex(index, instance, inputs, &outputs);
        }
        self.stats.vertices_shaded += 1;

        Ok(ShadedVertex::new(outputs))
    }
}
