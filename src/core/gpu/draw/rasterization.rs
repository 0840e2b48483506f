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

//! Triangle culling, stamp iteration and fragment attribute setup

use crate::core::clipper::trivial_reject;
use crate::core::error::Result;
use crate::core::gpu::types::*;
use crate::core::gpu::units::{Fragment, ShadedFragment, ShadedVertex, Stamp, TriangleId};
use crate::core::gpu::GpuEmulator;

/// Outcome of face culling for a triangle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(in crate::core::gpu) enum FaceCulling {
    Drop,
    Keep,
    /// Keep, rasterizing with the edge equations inverted
    KeepInverted,
}

/// Face culling decision from the signed triangle area
///
/// Positive area is front facing. Zero area triangles are always dropped.
pub(in crate::core::gpu) fn face_culling(mode: CullingMode, area: f64) -> FaceCulling {
    if area == 0.0 {
        return FaceCulling::Drop;
    }

    match mode {
        CullingMode::None if area < 0.0 => FaceCulling::KeepInverted,
        CullingMode::None => FaceCulling::Keep,
        CullingMode::Front if area > 0.0 => FaceCulling::Drop,
        CullingMode::Front => FaceCulling::KeepInverted,
        CullingMode::Back if area < 0.0 => FaceCulling::Drop,
        CullingMode::Back => FaceCulling::Keep,
        CullingMode::FrontAndBack => FaceCulling::Drop,
    }
}

/// `x` inside `[origin, origin + size)`
fn inside(x: i32, origin: i32, size: u32) -> bool {
    x >= origin && (x as i64) < origin as i64 + size as i64
}

impl GpuEmulator {
    /// Rasterize, shade, test and write one triangle
    pub(super) fn emulate_rasterization(&mut self, v1: &ShadedVertex, v2: &ShadedVertex, v3: &ShadedVertex) -> Result<()> {
        let triangle_number = self.count_triangle();

        if self.state.frustum_clipping
            && trivial_reject(v1.position(), v2.position(), v3.position(), self.state.d3d9_depth_range)
        {
            log::trace!("Triangle {} rejected by the frustum", triangle_number);
            self.stats.triangles_rejected += 1;
            return Ok(());
        }

        let triangle = self.units.rasterizer.setup(v1, v2, v3);
        let area = self.units.rasterizer.triangle_area(triangle);

        match face_culling(self.state.cull_mode, area) {
            FaceCulling::Drop => {
                log::trace!("Triangle {} culled (area {})", triangle_number, area);
                self.units.rasterizer.destroy_triangle(triangle);
                self.stats.triangles_culled += 1;
                return Ok(());
            }
            FaceCulling::KeepInverted => self.units.rasterizer.invert_triangle_facing(triangle),
            FaceCulling::Keep => {}
        }

        self.stats.triangles_rasterized += 1;
        self.units
            .rasterizer
            .start_rasterization(triangle, self.state.multisampling);

        let result = loop {
            let Some(stamp) = self.units.rasterizer.next_stamp(triangle) else {
                break Ok(());
            };
            if let Err(e) = self.emulate_stamp(triangle, triangle_number, area, stamp) {
                break Err(e);
            }
        };

        self.units.rasterizer.destroy_triangle(triangle);
        result
    }

    fn emulate_stamp(&mut self, triangle: TriangleId, triangle_number: u64, area: f64, stamp: Stamp) -> Result<()> {
        self.stats.stamps_generated += 1;

        let samples = self.sample_count();
        let mut quad = stamp.map(|mut fragment| {
            if self.state.multisampling {
                self.units
                    .rasterizer
                    .compute_msaa_samples(triangle, &mut fragment, samples);
            }
            let culled = self.fragment_culled(&fragment);
            ShadedFragment::new(fragment, culled)
        });

        if quad.iter().all(|f| f.culled) {
            self.stats.stamps_culled += 1;
            return Ok(());
        }

        for fragment in quad.iter_mut() {
            self.setup_fragment_attributes(triangle, area, fragment);
        }

        let early_z = self.state.early_z && !self.state.modify_depth;
        if early_z {
            self.emulate_z_stencil(&mut quad, triangle_number)?;
            if quad.iter().all(|f| f.culled) {
                self.stats.stamps_culled += 1;
                return Ok(());
            }
        }

        self.emulate_fragment_shading(&mut quad)?;

        if !early_z {
            self.emulate_z_stencil(&mut quad, triangle_number)?;
        }

        self.emulate_color_write(&quad, triangle_number)
    }

    /// Fragment outside the triangle, the display, the viewport or the scissor rectangle
    fn fragment_culled(&self, fragment: &Fragment) -> bool {
        let s = &self.state;

        let covered = if s.multisampling {
            fragment.any_sample_inside
        } else {
            fragment.inside_triangle
        };
        let (x, y) = (fragment.x, fragment.y);

        let in_display = inside(x, 0, s.display_res_x) && inside(y, 0, s.display_res_y);
        let in_viewport = inside(x, s.viewport_ini_x, s.viewport_width) && inside(y, s.viewport_ini_y, s.viewport_height);
        let in_scissor = !s.scissor_test
            || (inside(x, s.scissor_ini_x, s.scissor_width) && inside(y, s.scissor_ini_y, s.scissor_height));

        !(covered && in_display && in_viewport && in_scissor)
    }

    fn setup_fragment_attributes(&self, triangle: TriangleId, area: f64, fragment: &mut ShadedFragment) {
        let s = &self.state;
        let rasterizer = &self.units.rasterizer;

        for attribute in 0..MAX_FRAGMENT_ATTRIBUTES {
            fragment.attributes[attribute] = if !s.fragment_input_attributes[attribute] {
                [0.0; 4]
            } else if s.interpolation[attribute] {
                rasterizer.interpolate(triangle, &fragment.fragment, attribute)
            } else {
                // Flat shading takes the last vertex
                rasterizer.copy(triangle, &fragment.fragment, attribute, 2)
            };
        }

        let max_z = ((1u64 << s.z_buffer_bit_precision) - 1) as f64;
        let f = &fragment.fragment;
        fragment.attributes[POSITION_ATTRIBUTE] = [f.x as f32, f.y as f32, (f.z as f64 / max_z) as f32, 1.0];
        fragment.attributes[FACE_ATTRIBUTE][3] = area as f32;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_area_always_dropped() {
        for mode in [CullingMode::None, CullingMode::Front, CullingMode::Back, CullingMode::FrontAndBack] {
            assert_eq!(face_culling(mode, 0.0), FaceCulling::Drop, "{:?}", mode);
        }
    }

    #[test]
    fn test_inside_range() {
        assert!(inside(0, 0, 1));
        assert!(!inside(1, 0, 1));
        assert!(!inside(-1, 0, 4));
        assert!(!inside(5, 5, 0));
        assert!(inside(i32::MAX - 1, i32::MAX - 1, u32::MAX));
    }
}
