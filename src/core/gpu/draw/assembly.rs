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

//! Primitive assembly

use super::COMPONENT;
use crate::core::error::{Result, TopologyError};
use crate::core::gpu::types::PrimitiveMode;
use crate::core::gpu::units::ShadedVertex;
use crate::core::gpu::GpuEmulator;

/// Split an index list into triangles
///
/// Incomplete trailing primitives are ignored. Strip triangles alternate winding so every
/// triangle keeps the orientation of the first one.
///
/// # Returns
///
/// `UnimplementedPrimitive` for line and point topologies
pub(in crate::core::gpu) fn assemble_triangles(
    mode: PrimitiveMode,
    indices: &[u32],
) -> std::result::Result<Vec<[u32; 3]>, TopologyError> {
    let n = indices.len();
    let at = |i: usize| indices[i];

    let triangles: Vec<[u32; 3]> = match mode {
        PrimitiveMode::Triangle => indices.chunks_exact(3).map(|t| [t[0], t[1], t[2]]).collect(),
        PrimitiveMode::TriangleStrip => (2..n)
            .map(|i| {
                if i % 2 == 0 {
                    [at(i - 2), at(i - 1), at(i)]
                } else {
                    [at(i - 1), at(i - 2), at(i)]
                }
            })
            .collect(),
        PrimitiveMode::TriangleFan => (2..n).map(|i| [at(0), at(i - 1), at(i)]).collect(),
        PrimitiveMode::Quad => indices
            .chunks_exact(4)
            .flat_map(|q| [[q[0], q[1], q[3]], [q[1], q[2], q[3]]])
            .collect(),
        PrimitiveMode::QuadStrip => (3..n)
            .step_by(2)
            .flat_map(|i| {
                let (a, b, c, d) = (at(i - 3), at(i - 2), at(i - 1), at(i));
                [[a, b, c], [b, d, c]]
            })
            .collect(),
        PrimitiveMode::Line | PrimitiveMode::LineStrip | PrimitiveMode::LineFan | PrimitiveMode::Point => {
            return Err(TopologyError::UnimplementedPrimitive(mode.name()));
        }
    };

    Ok(triangles)
}

impl GpuEmulator {
    /// Build triangles from the index list and rasterize them in order
    pub(super) fn emulate_primitive_assembly(&mut self) -> Result<()> {
        let triangles = assemble_triangles(self.state.primitive_mode, &self.index_list)
            .map_err(|e| e.at(COMPONENT, "emulate_primitive_assembly"))?;

        for [a, b, c] in triangles {
            let v1 = self.shaded_vertex(a)?;
            let v2 = self.shaded_vertex(b)?;
            let v3 = self.shaded_vertex(c)?;
            self.emulate_rasterization(&v1, &v2, &v3)?;
        }
        Ok(())
    }

    fn shaded_vertex(&self, index: u32) -> Result<ShadedVertex> {
        self.vertex_cache
            .get(index)
            .copied()
            .ok_or_else(|| TopologyError::MissingVertex { index }.at(COMPONENT, "emulate_primitive_assembly"))
    }
}
