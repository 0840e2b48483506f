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

//! Interfaces of the units the draw pipeline drives
//!
//! The rasterizer, the shader unit and the texture address/filter unit live outside this
//! crate. The pipeline only sees them through the traits below. [`Detached`] stands in
//! for a unit that is not attached: register mirroring into it is dropped and a draw call
//! fails with [`EmulatorError::UnitUnavailable`](crate::core::error::EmulatorError).

use super::registers::{GpuRegister, RegisterValue};
use super::types::*;
use crate::core::fragment_ops::{FragmentOpEmulator, FragmentOps};

/// Output attributes of the vertex program for one vertex
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShadedVertex {
    pub attributes: [QuadFloat; MAX_VERTEX_ATTRIBUTES],
}

impl ShadedVertex {
    pub fn new(attributes: [QuadFloat; MAX_VERTEX_ATTRIBUTES]) -> Self {
        Self { attributes }
    }

    pub fn position(&self) -> &QuadFloat {
        &self.attributes[POSITION_ATTRIBUTE]
    }
}

/// Handle of a triangle set up in the rasterizer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TriangleId(pub u32);

/// Fragment generated by the rasterizer
#[derive(Debug, Clone, PartialEq)]
pub struct Fragment {
    pub x: i32,
    pub y: i32,
    /// Depth converted to the depth buffer precision
    pub z: u32,
    pub inside_triangle: bool,
    /// Rasterizer private interpolation data
    pub coordinates: [f64; 4],
    /// Per sample depth, valid when multisampling
    pub msaa_z: [u32; MAX_MSAA_SAMPLES],
    /// Per sample coverage, valid when multisampling
    pub coverage: [bool; MAX_MSAA_SAMPLES],
    pub any_sample_inside: bool,
}

impl Fragment {
    pub fn new(x: i32, y: i32, z: u32, inside_triangle: bool) -> Self {
        Self {
            x,
            y,
            z,
            inside_triangle,
            coordinates: [0.0; 4],
            msaa_z: [z; MAX_MSAA_SAMPLES],
            coverage: [inside_triangle; MAX_MSAA_SAMPLES],
            any_sample_inside: inside_triangle,
        }
    }
}

/// 2×2 fragment quad handed out by the rasterizer
pub type Stamp = [Fragment; STAMP_FRAGMENTS];

/// Fragment plus its attributes while it travels through shading and color write
///
/// Owns the fragment taken from the rasterizer; it is released when the quad is dropped
/// after color write.
#[derive(Debug, Clone, PartialEq)]
pub struct ShadedFragment {
    pub fragment: Fragment,
    pub attributes: [QuadFloat; MAX_FRAGMENT_ATTRIBUTES],
    pub culled: bool,
}

impl ShadedFragment {
    pub fn new(fragment: Fragment, culled: bool) -> Self {
        Self {
            fragment,
            attributes: [[0.0; 4]; MAX_FRAGMENT_ATTRIBUTES],
            culled,
        }
    }
}

/// Triangle setup and fragment generation
pub trait Rasterizer {
    /// `false` for a placeholder that cannot rasterize
    fn is_attached(&self) -> bool {
        true
    }

    fn set_viewport(&mut self, d3d9_pixel_coordinates: bool, x: i32, y: i32, width: u32, height: u32);

    #[allow(clippy::too_many_arguments)]
    fn set_scissor(
        &mut self,
        display_width: u32,
        display_height: u32,
        enabled: bool,
        x: i32,
        y: i32,
        width: u32,
        height: u32,
    );

    fn set_depth_range(&mut self, d3d9_depth_range: bool, near: f32, far: f32);

    fn set_polygon_offset(&mut self, slope_factor: f32, unit_offset: f32);

    fn set_depth_precision(&mut self, bits: u32);

    fn set_face_mode(&mut self, mode: FaceMode);

    fn set_d3d9_rasterization_rules(&mut self, enable: bool);

    /// Set up a triangle and return its handle
    fn setup(&mut self, v1: &ShadedVertex, v2: &ShadedVertex, v3: &ShadedVertex) -> TriangleId;

    /// Signed area of a triangle; negative for back facing triangles
    fn triangle_area(&self, triangle: TriangleId) -> f64;

    /// Flip the edge equation signs so the triangle rasterizes with the opposite winding
    fn invert_triangle_facing(&mut self, triangle: TriangleId);

    /// Start fragment generation of a triangle
    fn start_rasterization(&mut self, triangle: TriangleId, multisampling: bool);

    /// Next fragment quad, `None` once the last fragment of the triangle was generated
    fn next_stamp(&mut self, triangle: TriangleId) -> Option<Stamp>;

    /// Perspective correct interpolation of a vertex attribute at a fragment
    fn interpolate(&self, triangle: TriangleId, fragment: &Fragment, attribute: usize) -> QuadFloat;

    /// Attribute value of one triangle vertex (flat shading)
    fn copy(&self, triangle: TriangleId, fragment: &Fragment, attribute: usize, vertex: usize) -> QuadFloat;

    /// Fill the per sample depth and coverage of a fragment
    fn compute_msaa_samples(&self, triangle: TriangleId, fragment: &mut Fragment, samples: u32);

    /// Convert a [0, 1] depth to the depth buffer precision
    fn convert_z(&self, z: f64) -> u32;

    fn destroy_triangle(&mut self, triangle: TriangleId);
}

/// Shader register banks addressable from outside the shader unit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bank {
    Input,
    Output,
}

/// Decoded shader instruction as seen by the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodedInstruction {
    pub thread: u32,
    pub pc: u32,
    /// Last instruction of the program
    pub end: bool,
    /// Unit private instruction word
    pub opaque: u64,
}

/// One stamp wide texture request of the shader unit
#[derive(Debug, Clone, PartialEq)]
pub struct TextureAccess {
    pub id: u32,
    pub unit: usize,
    pub coordinates: [QuadFloat; STAMP_FRAGMENTS],
    /// LOD or bias parameter
    pub parameter: [f32; STAMP_FRAGMENTS],
    pub vertex_access: bool,
    /// Anisotropic samples to read, set by the texture unit
    pub aniso_samples: u32,
    /// Texel reads of the current sample, set by the texture unit
    pub texels: Vec<TexelRequest>,
    /// Filtered result per fragment
    pub samples: [QuadFloat; STAMP_FRAGMENTS],
}

impl TextureAccess {
    pub fn new(id: u32, unit: usize, coordinates: [QuadFloat; STAMP_FRAGMENTS], parameter: [f32; STAMP_FRAGMENTS]) -> Self {
        Self {
            id,
            unit,
            coordinates,
            parameter,
            vertex_access: false,
            aniso_samples: 0,
            texels: Vec::new(),
            samples: [[0.0; 4]; STAMP_FRAGMENTS],
        }
    }
}

/// Texel read needed by one filter step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TexelRequest {
    pub sample: u32,
    pub fragment: usize,
    pub texel: usize,
    /// Tagged texture address (see [`crate::core::texture_cache`])
    pub address: u64,
    pub size: usize,
}

/// Shader thread state and instruction execution
pub trait ShaderUnit {
    fn is_attached(&self) -> bool {
        true
    }

    /// Load `code` into instruction memory starting at instruction `pc`
    fn load_program(&mut self, pc: u32, code: &[u8]);

    /// Mirror of a vertex or fragment constant register
    fn write_constant(&mut self, target: ShaderTarget, index: usize, value: QuadFloat);

    fn reset_shader_state(&mut self, thread: u32);

    fn load_shader_state(&mut self, thread: u32, bank: Bank, data: &[QuadFloat]);

    fn set_thread_pc(&mut self, thread: u32, pc: u32);

    fn fetch_shader_instruction(&mut self, thread: u32, pc: u32) -> DecodedInstruction;

    fn exec_shader_instruction(&mut self, instruction: &DecodedInstruction);

    /// Target PC when the instruction jumps
    fn check_jump(&mut self, instruction: &DecodedInstruction, batch_size: u32) -> Option<u32>;

    fn read_shader_state(&self, thread: u32, bank: Bank, data: &mut [QuadFloat]);

    /// Whether the thread executed a kill
    fn thread_kill(&self, thread: u32) -> bool;

    fn next_texture_access(&mut self) -> Option<TextureAccess>;

    fn next_vertex_texture_access(&mut self) -> Option<TextureAccess>;

    fn write_texture_access(&mut self, access: &TextureAccess);
}

/// Texture address generation, format conversion and filtering
pub trait TextureUnit {
    fn is_attached(&self) -> bool {
        true
    }

    /// Mirror of texture, stream and attribute registers
    fn write_register(&mut self, register: GpuRegister, sub_index: u32, value: &RegisterValue);

    fn reset(&mut self);

    /// Replace `texels` with the reads needed by one anisotropic sample
    ///
    /// Called with sample 0 first, which also sets `aniso_samples`.
    fn calculate_address(&mut self, access: &mut TextureAccess, sample: u32);

    fn convert_format(&mut self, access: &mut TextureAccess, request: &TexelRequest, data: &[u8]);

    /// Filter the converted texels of one anisotropic sample
    fn filter(&mut self, access: &mut TextureAccess, sample: u32);
}

/// Placeholder for a unit that is not attached
#[derive(Debug, Clone, Copy, Default)]
pub struct Detached;

impl Rasterizer for Detached {
    fn is_attached(&self) -> bool {
        false
    }
    fn set_viewport(&mut self, _: bool, _: i32, _: i32, _: u32, _: u32) {}
    fn set_scissor(&mut self, _: u32, _: u32, _: bool, _: i32, _: i32, _: u32, _: u32) {}
    fn set_depth_range(&mut self, _: bool, _: f32, _: f32) {}
    fn set_polygon_offset(&mut self, _: f32, _: f32) {}
    fn set_depth_precision(&mut self, _: u32) {}
    fn set_face_mode(&mut self, _: FaceMode) {}
    fn set_d3d9_rasterization_rules(&mut self, _: bool) {}
    fn setup(&mut self, _: &ShadedVertex, _: &ShadedVertex, _: &ShadedVertex) -> TriangleId {
        TriangleId(0)
    }
    fn triangle_area(&self, _: TriangleId) -> f64 {
        0.0
    }
    fn invert_triangle_facing(&mut self, _: TriangleId) {}
    fn start_rasterization(&mut self, _: TriangleId, _: bool) {}
    fn next_stamp(&mut self, _: TriangleId) -> Option<Stamp> {
        None
    }
    fn interpolate(&self, _: TriangleId, _: &Fragment, _: usize) -> QuadFloat {
        [0.0; 4]
    }
    fn copy(&self, _: TriangleId, _: &Fragment, _: usize, _: usize) -> QuadFloat {
        [0.0; 4]
    }
    fn compute_msaa_samples(&self, _: TriangleId, _: &mut Fragment, _: u32) {}
    fn convert_z(&self, _: f64) -> u32 {
        0
    }
    fn destroy_triangle(&mut self, _: TriangleId) {}
}

impl ShaderUnit for Detached {
    fn is_attached(&self) -> bool {
        false
    }
    fn load_program(&mut self, _: u32, _: &[u8]) {}
    fn write_constant(&mut self, _: ShaderTarget, _: usize, _: QuadFloat) {}
    fn reset_shader_state(&mut self, _: u32) {}
    fn load_shader_state(&mut self, _: u32, _: Bank, _: &[QuadFloat]) {}
    fn set_thread_pc(&mut self, _: u32, _: u32) {}
    fn fetch_shader_instruction(&mut self, thread: u32, pc: u32) -> DecodedInstruction {
        DecodedInstruction {
            thread,
            pc,
            end: true,
            opaque: 0,
        }
    }
    fn exec_shader_instruction(&mut self, _: &DecodedInstruction) {}
    fn check_jump(&mut self, _: &DecodedInstruction, _: u32) -> Option<u32> {
        None
    }
    fn read_shader_state(&self, _: u32, _: Bank, _: &mut [QuadFloat]) {}
    fn thread_kill(&self, _: u32) -> bool {
        false
    }
    fn next_texture_access(&mut self) -> Option<TextureAccess> {
        None
    }
    fn next_vertex_texture_access(&mut self) -> Option<TextureAccess> {
        None
    }
    fn write_texture_access(&mut self, _: &TextureAccess) {}
}

impl TextureUnit for Detached {
    fn is_attached(&self) -> bool {
        false
    }
    fn write_register(&mut self, _: GpuRegister, _: u32, _: &RegisterValue) {}
    fn reset(&mut self) {}
    fn calculate_address(&mut self, _: &mut TextureAccess, _: u32) {}
    fn convert_format(&mut self, _: &mut TextureAccess, _: &TexelRequest, _: &[u8]) {}
    fn filter(&mut self, _: &mut TextureAccess, _: u32) {}
}

/// The collaborating units driven by the pipeline
pub struct Units {
    pub rasterizer: Box<dyn Rasterizer>,
    pub shader: Box<dyn ShaderUnit>,
    pub texture: Box<dyn TextureUnit>,
    pub fragment_ops: Box<dyn FragmentOps>,
}

impl Units {
    pub fn new(
        rasterizer: Box<dyn Rasterizer>,
        shader: Box<dyn ShaderUnit>,
        texture: Box<dyn TextureUnit>,
    ) -> Self {
        Self {
            rasterizer,
            shader,
            texture,
            fragment_ops: Box::new(FragmentOpEmulator::new()),
        }
    }

    /// Only the built in fragment operation unit; draw calls are unavailable
    pub fn detached() -> Self {
        Self::new(Box::new(Detached), Box::new(Detached), Box::new(Detached))
    }

    /// Replace the fragment operation unit
    pub fn with_fragment_ops(mut self, fragment_ops: Box<dyn FragmentOps>) -> Self {
        self.fragment_ops = fragment_ops;
        self
    }
}

impl Default for Units {
    fn default() -> Self {
        Self::detached()
    }
}
