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

//! GPU register file
//!
//! `GpuState` holds one field per architectural register. Writes go through
//! [`GpuState::write`], which validates the sub-index and the value domain before
//! anything is committed: a rejected write leaves every register untouched.
//!
//! # Indexed registers
//!
//! | Register group                       | Sub-index range          |
//! |--------------------------------------|--------------------------|
//! | vertex constants                     | 0..512                   |
//! | vertex output/attribute map/defaults | 0..16                    |
//! | stream layout                        | 0..32                    |
//! | user clip planes                     | 0..6                     |
//! | interpolation / fragment inputs      | 0..16                    |
//! | fragment constants                   | 0..1024                  |
//! | shader program PC/resources          | 0..4 (shader target)     |
//! | texture unit state                   | 0..16 (texture unit)     |
//! | texture address                      | unit × 13 × 6 + level × 6 + face |
//! | render target / blend / color mask   | 0..8                     |

use super::registers::{GpuRegister, RegisterValue};
use super::types::*;
use crate::core::error::{ProtocolError, Result};
use bincode::{Decode, Encode};

/// Default front buffer address
pub const DEFAULT_FRONT_BUFFER_ADDR: u32 = 0x0020_0000;

/// Default back buffer address (render target 0)
pub const DEFAULT_BACK_BUFFER_ADDR: u32 = 0x0040_0000;

/// Default depth/stencil buffer address
pub const DEFAULT_ZSTENCIL_BUFFER_ADDR: u32 = 0x0060_0000;

/// Default display resolution on both axes
pub const DEFAULT_DISPLAY_RES: u32 = 400;

/// Architectural register state of the GPU
#[derive(Debug, Clone, PartialEq, Encode, Decode)]
pub struct GpuState {
    pub status: GpuStatus,

    // Display
    pub display_res_x: u32,
    pub display_res_y: u32,

    // Buffer base addresses
    pub front_buffer_addr: u32,
    pub back_buffer_addr: u32,
    pub zstencil_buffer_addr: u32,
    pub texture_memory_addr: u32,
    pub program_memory_addr: u32,

    // Vertex shader
    pub vertex_program_addr: u32,
    pub vertex_program_start_pc: u32,
    pub vertex_program_size: u32,
    pub vertex_thread_resources: u32,
    pub vertex_constants: [QuadFloat; MAX_VERTEX_CONSTANTS],
    pub output_attribute: [bool; MAX_VERTEX_ATTRIBUTES],

    // Streamer
    pub attribute_map: [u32; MAX_VERTEX_ATTRIBUTES],
    pub attribute_default: [QuadFloat; MAX_VERTEX_ATTRIBUTES],
    pub stream_address: [u32; MAX_STREAM_BUFFERS],
    pub stream_stride: [u32; MAX_STREAM_BUFFERS],
    pub stream_data: [StreamData; MAX_STREAM_BUFFERS],
    pub stream_elements: [u32; MAX_STREAM_BUFFERS],
    pub stream_frequency: [u32; MAX_STREAM_BUFFERS],
    pub stream_start: u32,
    pub stream_count: u32,
    pub stream_instances: u32,
    pub indexed_mode: bool,
    pub index_stream: u32,
    pub d3d9_color_stream: [bool; MAX_STREAM_BUFFERS],
    pub attribute_load_bypass: bool,

    // Primitive assembly, clipping and culling
    pub primitive_mode: PrimitiveMode,
    pub frustum_clipping: bool,
    pub user_clip: [QuadFloat; MAX_USER_CLIP_PLANES],
    pub user_clip_planes: bool,
    pub face_mode: FaceMode,
    pub cull_mode: CullingMode,
    pub hierarchical_z: bool,
    pub early_z: bool,

    // Rasterization
    pub d3d9_pixel_coordinates: bool,
    pub viewport_ini_x: i32,
    pub viewport_ini_y: i32,
    pub viewport_width: u32,
    pub viewport_height: u32,
    pub scissor_test: bool,
    pub scissor_ini_x: i32,
    pub scissor_ini_y: i32,
    pub scissor_width: u32,
    pub scissor_height: u32,
    pub near_range: f32,
    pub far_range: f32,
    pub slope_factor: f32,
    pub unit_offset: f32,
    pub d3d9_depth_range: bool,
    pub z_buffer_bit_precision: u32,
    pub d3d9_rasterization_rules: bool,
    pub two_sided_lighting: bool,
    pub multisampling: bool,
    pub msaa_samples: u32,
    pub interpolation: [bool; MAX_FRAGMENT_ATTRIBUTES],
    pub fragment_input_attributes: [bool; MAX_FRAGMENT_ATTRIBUTES],

    // Fragment shader
    pub fragment_program_addr: u32,
    pub fragment_program_start_pc: u32,
    pub fragment_program_size: u32,
    pub fragment_thread_resources: u32,
    pub fragment_constants: [QuadFloat; MAX_FRAGMENT_CONSTANTS],
    pub modify_depth: bool,

    // Unified shader programs
    pub program_address: u32,
    pub program_size: u32,
    pub program_load_pc: u32,
    pub program_start_pc: [u32; MAX_SHADER_TARGETS],
    pub program_resources: [u32; MAX_SHADER_TARGETS],

    // Texture units
    pub texture_enabled: [bool; MAX_TEXTURES],
    pub texture_mode: [TextureMode; MAX_TEXTURES],
    pub texture_address: [[[u32; CUBEMAP_IMAGES]; MAX_TEXTURE_SIZE]; MAX_TEXTURES],
    pub texture_width: [u32; MAX_TEXTURES],
    pub texture_height: [u32; MAX_TEXTURES],
    pub texture_depth: [u32; MAX_TEXTURES],
    pub texture_width2: [u32; MAX_TEXTURES],
    pub texture_height2: [u32; MAX_TEXTURES],
    pub texture_depth2: [u32; MAX_TEXTURES],
    pub texture_border: [u32; MAX_TEXTURES],
    pub texture_border_color: [QuadFloat; MAX_TEXTURES],
    pub texture_format: [TextureFormat; MAX_TEXTURES],
    pub texture_compression: [TextureCompression; MAX_TEXTURES],
    pub texture_blocking: [TextureBlocking; MAX_TEXTURES],
    pub texture_reverse: [bool; MAX_TEXTURES],
    pub texture_d3d9_color_conv: [bool; MAX_TEXTURES],
    pub texture_d3d9_v_invert: [bool; MAX_TEXTURES],
    pub texture_wrap_s: [ClampMode; MAX_TEXTURES],
    pub texture_wrap_t: [ClampMode; MAX_TEXTURES],
    pub texture_wrap_r: [ClampMode; MAX_TEXTURES],
    pub texture_non_normalized: [bool; MAX_TEXTURES],
    pub texture_min_filter: [FilterMode; MAX_TEXTURES],
    pub texture_mag_filter: [FilterMode; MAX_TEXTURES],
    pub texture_enable_comparison: [bool; MAX_TEXTURES],
    pub texture_comparison_function: [CompareMode; MAX_TEXTURES],
    pub texture_srgb: [bool; MAX_TEXTURES],
    pub texture_min_lod: [f32; MAX_TEXTURES],
    pub texture_max_lod: [f32; MAX_TEXTURES],
    pub texture_lod_bias: [f32; MAX_TEXTURES],
    pub texture_min_level: [u32; MAX_TEXTURES],
    pub texture_max_level: [u32; MAX_TEXTURES],
    pub texture_unit_lod_bias: [f32; MAX_TEXTURES],
    pub max_anisotropy: [u32; MAX_TEXTURES],

    // Depth and stencil
    pub z_buffer_clear: u32,
    pub stencil_buffer_clear: u32,
    pub zstencil_state_buffer_addr: u32,
    pub stencil_test: bool,
    pub stencil_function: CompareMode,
    pub stencil_reference: u8,
    pub stencil_test_mask: u8,
    pub stencil_update_mask: u8,
    pub stencil_fail: StencilUpdateFunction,
    pub depth_fail: StencilUpdateFunction,
    pub depth_pass: StencilUpdateFunction,
    pub depth_test: bool,
    pub depth_function: CompareMode,
    pub depth_mask: bool,
    pub zstencil_compression: bool,

    // Color buffer and render targets
    pub color_buffer_format: TextureFormat,
    pub color_compression: bool,
    pub color_srgb_write: bool,
    pub rt_enable: [bool; MAX_RENDER_TARGETS],
    pub rt_format: [TextureFormat; MAX_RENDER_TARGETS],
    pub rt_address: [u32; MAX_RENDER_TARGETS],
    pub color_buffer_clear: QuadFloat,
    pub color_state_buffer_addr: u32,

    // Blending
    pub color_blend: [bool; MAX_RENDER_TARGETS],
    pub blend_equation: [BlendEquation; MAX_RENDER_TARGETS],
    pub blend_source_rgb: [BlendFunction; MAX_RENDER_TARGETS],
    pub blend_destination_rgb: [BlendFunction; MAX_RENDER_TARGETS],
    pub blend_source_alpha: [BlendFunction; MAX_RENDER_TARGETS],
    pub blend_destination_alpha: [BlendFunction; MAX_RENDER_TARGETS],
    pub blend_color: [QuadFloat; MAX_RENDER_TARGETS],
    pub color_mask_r: [bool; MAX_RENDER_TARGETS],
    pub color_mask_g: [bool; MAX_RENDER_TARGETS],
    pub color_mask_b: [bool; MAX_RENDER_TARGETS],
    pub color_mask_a: [bool; MAX_RENDER_TARGETS],

    // Logic op
    pub logical_operation: bool,
    pub logic_op_function: LogicOpMode,

    // Memory controller
    pub mc_second_interleaving_start_addr: u32,

    // Blitter
    pub blit_ini_x: u32,
    pub blit_ini_y: u32,
    pub blit_x_offset: u32,
    pub blit_y_offset: u32,
    pub blit_width: u32,
    pub blit_height: u32,
    pub blit_destination_address: u32,
    pub blit_texture_width2: u32,
    pub blit_destination_format: TextureFormat,
    pub blit_destination_blocking: TextureBlocking,
}

impl GpuState {
    /// Create a register file holding the reset defaults
    pub fn new() -> Self {
        let mut attribute_map = [ST_INACTIVE_ATTRIBUTE; MAX_VERTEX_ATTRIBUTES];
        attribute_map[POSITION_ATTRIBUTE] = 0;

        let mut rt_enable = [false; MAX_RENDER_TARGETS];
        rt_enable[0] = true;
        let mut rt_address = [0; MAX_RENDER_TARGETS];
        rt_address[0] = DEFAULT_BACK_BUFFER_ADDR;

        Self {
            status: GpuStatus::Ready,

            display_res_x: DEFAULT_DISPLAY_RES,
            display_res_y: DEFAULT_DISPLAY_RES,

            front_buffer_addr: DEFAULT_FRONT_BUFFER_ADDR,
            back_buffer_addr: DEFAULT_BACK_BUFFER_ADDR,
            zstencil_buffer_addr: DEFAULT_ZSTENCIL_BUFFER_ADDR,
            texture_memory_addr: 0,
            program_memory_addr: 0,

            vertex_program_addr: 0,
            vertex_program_start_pc: 0,
            vertex_program_size: 0,
            vertex_thread_resources: 0,
            vertex_constants: [[0.0; 4]; MAX_VERTEX_CONSTANTS],
            output_attribute: [false; MAX_VERTEX_ATTRIBUTES],

            attribute_map,
            attribute_default: [[0.0, 0.0, 0.0, 1.0]; MAX_VERTEX_ATTRIBUTES],
            stream_address: [0; MAX_STREAM_BUFFERS],
            stream_stride: [0; MAX_STREAM_BUFFERS],
            stream_data: [StreamData::Float32; MAX_STREAM_BUFFERS],
            stream_elements: [0; MAX_STREAM_BUFFERS],
            stream_frequency: [0; MAX_STREAM_BUFFERS],
            stream_start: 0,
            stream_count: 0,
            stream_instances: 1,
            indexed_mode: false,
            index_stream: 0,
            d3d9_color_stream: [false; MAX_STREAM_BUFFERS],
            attribute_load_bypass: false,

            primitive_mode: PrimitiveMode::Triangle,
            frustum_clipping: true,
            user_clip: [[0.0; 4]; MAX_USER_CLIP_PLANES],
            user_clip_planes: false,
            face_mode: FaceMode::Ccw,
            cull_mode: CullingMode::Back,
            hierarchical_z: true,
            early_z: true,

            d3d9_pixel_coordinates: false,
            viewport_ini_x: 0,
            viewport_ini_y: 0,
            viewport_width: DEFAULT_DISPLAY_RES,
            viewport_height: DEFAULT_DISPLAY_RES,
            scissor_test: false,
            scissor_ini_x: 0,
            scissor_ini_y: 0,
            scissor_width: DEFAULT_DISPLAY_RES,
            scissor_height: DEFAULT_DISPLAY_RES,
            near_range: 0.0,
            far_range: 1.0,
            slope_factor: 0.0,
            unit_offset: 0.0,
            d3d9_depth_range: false,
            z_buffer_bit_precision: 24,
            d3d9_rasterization_rules: false,
            two_sided_lighting: false,
            multisampling: false,
            msaa_samples: 4,
            interpolation: [true; MAX_FRAGMENT_ATTRIBUTES],
            fragment_input_attributes: [false; MAX_FRAGMENT_ATTRIBUTES],

            fragment_program_addr: 0,
            fragment_program_start_pc: 0,
            fragment_program_size: 0,
            fragment_thread_resources: 0,
            fragment_constants: [[0.0; 4]; MAX_FRAGMENT_CONSTANTS],
            modify_depth: false,

            program_address: 0,
            program_size: 0,
            program_load_pc: 0,
            program_start_pc: [0; MAX_SHADER_TARGETS],
            program_resources: [0; MAX_SHADER_TARGETS],

            texture_enabled: [false; MAX_TEXTURES],
            texture_mode: [TextureMode::Texture2D; MAX_TEXTURES],
            texture_address: [[[0; CUBEMAP_IMAGES]; MAX_TEXTURE_SIZE]; MAX_TEXTURES],
            texture_width: [0; MAX_TEXTURES],
            texture_height: [0; MAX_TEXTURES],
            texture_depth: [0; MAX_TEXTURES],
            texture_width2: [0; MAX_TEXTURES],
            texture_height2: [0; MAX_TEXTURES],
            texture_depth2: [0; MAX_TEXTURES],
            texture_border: [0; MAX_TEXTURES],
            texture_border_color: [[0.0; 4]; MAX_TEXTURES],
            texture_format: [TextureFormat::Rgba8888; MAX_TEXTURES],
            texture_compression: [TextureCompression::None; MAX_TEXTURES],
            texture_blocking: [TextureBlocking::Texture; MAX_TEXTURES],
            texture_reverse: [false; MAX_TEXTURES],
            texture_d3d9_color_conv: [false; MAX_TEXTURES],
            texture_d3d9_v_invert: [false; MAX_TEXTURES],
            texture_wrap_s: [ClampMode::Repeat; MAX_TEXTURES],
            texture_wrap_t: [ClampMode::Repeat; MAX_TEXTURES],
            texture_wrap_r: [ClampMode::Repeat; MAX_TEXTURES],
            texture_non_normalized: [false; MAX_TEXTURES],
            texture_min_filter: [FilterMode::Nearest; MAX_TEXTURES],
            texture_mag_filter: [FilterMode::Nearest; MAX_TEXTURES],
            texture_enable_comparison: [false; MAX_TEXTURES],
            texture_comparison_function: [CompareMode::LEqual; MAX_TEXTURES],
            texture_srgb: [false; MAX_TEXTURES],
            texture_min_lod: [0.0; MAX_TEXTURES],
            texture_max_lod: [12.0; MAX_TEXTURES],
            texture_lod_bias: [0.0; MAX_TEXTURES],
            texture_min_level: [0; MAX_TEXTURES],
            texture_max_level: [(MAX_TEXTURE_SIZE - 1) as u32; MAX_TEXTURES],
            texture_unit_lod_bias: [0.0; MAX_TEXTURES],
            max_anisotropy: [1; MAX_TEXTURES],

            z_buffer_clear: 0x00ff_ffff,
            stencil_buffer_clear: 0,
            zstencil_state_buffer_addr: 0,
            stencil_test: false,
            stencil_function: CompareMode::Always,
            stencil_reference: 0,
            stencil_test_mask: 0xff,
            stencil_update_mask: 0xff,
            stencil_fail: StencilUpdateFunction::Keep,
            depth_fail: StencilUpdateFunction::Keep,
            depth_pass: StencilUpdateFunction::Keep,
            depth_test: false,
            depth_function: CompareMode::Less,
            depth_mask: true,
            zstencil_compression: false,

            color_buffer_format: TextureFormat::Rgba8888,
            color_compression: false,
            color_srgb_write: false,
            rt_enable,
            rt_format: [TextureFormat::Rgba8888; MAX_RENDER_TARGETS],
            rt_address,
            color_buffer_clear: [0.0; 4],
            color_state_buffer_addr: 0,

            color_blend: [false; MAX_RENDER_TARGETS],
            blend_equation: [BlendEquation::Add; MAX_RENDER_TARGETS],
            blend_source_rgb: [BlendFunction::One; MAX_RENDER_TARGETS],
            blend_destination_rgb: [BlendFunction::Zero; MAX_RENDER_TARGETS],
            blend_source_alpha: [BlendFunction::One; MAX_RENDER_TARGETS],
            blend_destination_alpha: [BlendFunction::Zero; MAX_RENDER_TARGETS],
            blend_color: [[0.0; 4]; MAX_RENDER_TARGETS],
            color_mask_r: [true; MAX_RENDER_TARGETS],
            color_mask_g: [true; MAX_RENDER_TARGETS],
            color_mask_b: [true; MAX_RENDER_TARGETS],
            color_mask_a: [true; MAX_RENDER_TARGETS],

            logical_operation: false,
            logic_op_function: LogicOpMode::Copy,

            mc_second_interleaving_start_addr: 0,

            blit_ini_x: 0,
            blit_ini_y: 0,
            blit_x_offset: 0,
            blit_y_offset: 0,
            blit_width: 0,
            blit_height: 0,
            blit_destination_address: 0,
            blit_texture_width2: 0,
            blit_destination_format: TextureFormat::Rgba8888,
            blit_destination_blocking: TextureBlocking::Texture,
        }
    }

    /// Restore every register to its reset default
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// Channel write mask of a render target
    pub fn color_mask(&self, rt: usize) -> ColorMask {
        let mut mask = ColorMask::empty();
        mask.set(ColorMask::R, self.color_mask_r[rt]);
        mask.set(ColorMask::G, self.color_mask_g[rt]);
        mask.set(ColorMask::B, self.color_mask_b[rt]);
        mask.set(ColorMask::A, self.color_mask_a[rt]);
        mask
    }

    /// Bytes per pixel of the depth/stencil buffer
    pub fn zstencil_bytes_per_pixel(&self) -> u32 {
        4
    }

    /// Validate and commit a register write
    ///
    /// # Arguments
    ///
    /// * `register` - Register to write
    /// * `sub_index` - Element of an indexed register (ignored for scalar registers)
    /// * `value` - Typed register payload
    ///
    /// # Returns
    ///
    /// A protocol error tagged `GpuState::write` when the register is read-only, the
    /// sub-index is out of range or the value is outside the register domain. The state
    /// is unchanged in that case.
    pub fn write(&mut self, register: GpuRegister, sub_index: u32, value: RegisterValue) -> Result<()> {
        self.apply(register, sub_index, value)
            .map_err(|e| e.at("GpuState", "write"))
    }

    fn apply(
        &mut self,
        register: GpuRegister,
        sub: u32,
        value: RegisterValue,
    ) -> std::result::Result<(), ProtocolError> {
        use GpuRegister as R;

        let reg = register;
        match register {
            R::Status | R::Memory => {
                return Err(ProtocolError::ReadOnlyRegister {
                    register: register.name(),
                });
            }

            // Display
            R::DisplayXRes => {
                self.display_res_x = in_range(reg, value.as_u32(reg)?, 1, MAX_DISPLAY_RES)?;
            }
            R::DisplayYRes => {
                self.display_res_y = in_range(reg, value.as_u32(reg)?, 1, MAX_DISPLAY_RES)?;
            }

            // Buffer addresses. The back buffer doubles as render target 0.
            R::FrontBufferAddr => self.front_buffer_addr = value.as_u32(reg)?,
            R::BackBufferAddr => {
                let addr = value.as_u32(reg)?;
                self.back_buffer_addr = addr;
                self.rt_address[0] = addr;
            }
            R::ZStencilBufferAddr => self.zstencil_buffer_addr = value.as_u32(reg)?,
            R::TextureMemAddr => self.texture_memory_addr = value.as_u32(reg)?,
            R::ProgramMemAddr => self.program_memory_addr = value.as_u32(reg)?,

            // Vertex shader
            R::VertexProgram => self.vertex_program_addr = value.as_u32(reg)?,
            R::VertexProgramPc => {
                self.vertex_program_start_pc =
                    below(reg, value.as_u32(reg)?, UNIFIED_INSTRUCTION_MEMORY_SIZE)?;
            }
            R::VertexProgramSize => self.vertex_program_size = value.as_u32(reg)?,
            R::VertexThreadResources => self.vertex_thread_resources = value.as_u32(reg)?,
            R::VertexConstant => {
                let i = index(reg, sub, MAX_VERTEX_CONSTANTS)?;
                self.vertex_constants[i] = value.as_quad(reg)?;
            }
            R::VertexOutputAttribute => {
                let i = index(reg, sub, MAX_VERTEX_ATTRIBUTES)?;
                self.output_attribute[i] = value.as_bool(reg)?;
            }

            // Streamer
            R::VertexAttributeMap => {
                let i = index(reg, sub, MAX_VERTEX_ATTRIBUTES)?;
                let stream = value.as_u32(reg)?;
                if stream != ST_INACTIVE_ATTRIBUTE && stream as usize >= MAX_STREAM_BUFFERS {
                    return Err(out_of_range(reg, stream));
                }
                self.attribute_map[i] = stream;
            }
            R::VertexAttributeDefaultValue => {
                let i = index(reg, sub, MAX_VERTEX_ATTRIBUTES)?;
                self.attribute_default[i] = value.as_quad(reg)?;
            }
            R::StreamAddress => {
                let i = index(reg, sub, MAX_STREAM_BUFFERS)?;
                self.stream_address[i] = value.as_u32(reg)?;
            }
            R::StreamStride => {
                let i = index(reg, sub, MAX_STREAM_BUFFERS)?;
                self.stream_stride[i] = value.as_u32(reg)?;
            }
            R::StreamData => {
                let i = index(reg, sub, MAX_STREAM_BUFFERS)?;
                self.stream_data[i] = value.as_stream_data(reg)?;
            }
            R::StreamElements => {
                let i = index(reg, sub, MAX_STREAM_BUFFERS)?;
                self.stream_elements[i] = in_range(reg, value.as_u32(reg)?, 0, 4)?;
            }
            R::StreamFrequency => {
                let i = index(reg, sub, MAX_STREAM_BUFFERS)?;
                self.stream_frequency[i] = value.as_u32(reg)?;
            }
            R::StreamStart => self.stream_start = value.as_u32(reg)?,
            R::StreamCount => self.stream_count = value.as_u32(reg)?,
            R::StreamInstances => {
                self.stream_instances = in_range(reg, value.as_u32(reg)?, 1, u32::MAX)?;
            }
            R::IndexMode => self.indexed_mode = value.as_bool(reg)?,
            R::IndexStream => {
                self.index_stream = below(reg, value.as_u32(reg)?, MAX_STREAM_BUFFERS as u32)?;
            }
            R::D3d9ColorStream => {
                let i = index(reg, sub, MAX_STREAM_BUFFERS)?;
                self.d3d9_color_stream[i] = value.as_bool(reg)?;
            }
            R::AttributeLoadBypass => self.attribute_load_bypass = value.as_bool(reg)?,

            // Primitive assembly, clipping and culling
            R::Primitive => self.primitive_mode = value.as_primitive(reg)?,
            R::FrustumClipping => self.frustum_clipping = value.as_bool(reg)?,
            R::UserClip => {
                let i = index(reg, sub, MAX_USER_CLIP_PLANES)?;
                self.user_clip[i] = value.as_quad(reg)?;
            }
            R::UserClipPlane => self.user_clip_planes = value.as_bool(reg)?,
            R::FaceMode => self.face_mode = value.as_face_mode(reg)?,
            R::Culling => self.cull_mode = value.as_culling(reg)?,
            R::HierarchicalZ => self.hierarchical_z = value.as_bool(reg)?,
            R::EarlyZ => self.early_z = value.as_bool(reg)?,

            // Rasterization
            R::D3d9PixelCoordinates => self.d3d9_pixel_coordinates = value.as_bool(reg)?,
            R::ViewportIniX => self.viewport_ini_x = viewport_coord(reg, value.as_i32(reg)?)?,
            R::ViewportIniY => self.viewport_ini_y = viewport_coord(reg, value.as_i32(reg)?)?,
            R::ViewportWidth => {
                self.viewport_width = in_range(reg, value.as_u32(reg)?, 0, MAX_VIEWPORT as u32)?;
            }
            R::ViewportHeight => {
                self.viewport_height = in_range(reg, value.as_u32(reg)?, 0, MAX_VIEWPORT as u32)?;
            }
            R::ScissorTest => self.scissor_test = value.as_bool(reg)?,
            R::ScissorIniX => self.scissor_ini_x = viewport_coord(reg, value.as_i32(reg)?)?,
            R::ScissorIniY => self.scissor_ini_y = viewport_coord(reg, value.as_i32(reg)?)?,
            R::ScissorWidth => {
                self.scissor_width = in_range(reg, value.as_u32(reg)?, 0, MAX_VIEWPORT as u32)?;
            }
            R::ScissorHeight => {
                self.scissor_height = in_range(reg, value.as_u32(reg)?, 0, MAX_VIEWPORT as u32)?;
            }
            R::DepthRangeNear => self.near_range = unit_interval(reg, value.as_f32(reg)?)?,
            R::DepthRangeFar => self.far_range = unit_interval(reg, value.as_f32(reg)?)?,
            R::DepthSlopeFactor => self.slope_factor = value.as_f32(reg)?,
            R::DepthUnitOffset => self.unit_offset = value.as_f32(reg)?,
            R::ZBufferBitPrecision => {
                let bits = value.as_u32(reg)?;
                if !matches!(bits, 16 | 24 | 32) {
                    return Err(out_of_range(reg, bits));
                }
                self.z_buffer_bit_precision = bits;
            }
            R::D3d9DepthRange => self.d3d9_depth_range = value.as_bool(reg)?,
            R::D3d9RasterizationRules => self.d3d9_rasterization_rules = value.as_bool(reg)?,
            R::TwoSidedLighting => self.two_sided_lighting = value.as_bool(reg)?,
            R::Multisampling => self.multisampling = value.as_bool(reg)?,
            R::MsaaSamples => {
                let samples = value.as_u32(reg)?;
                if !matches!(samples, 1 | 2 | 4 | 8) {
                    return Err(out_of_range(reg, samples));
                }
                self.msaa_samples = samples;
            }
            R::Interpolation => {
                let i = index(reg, sub, MAX_FRAGMENT_ATTRIBUTES)?;
                self.interpolation[i] = value.as_bool(reg)?;
            }
            R::FragmentInputAttributes => {
                let i = index(reg, sub, MAX_FRAGMENT_ATTRIBUTES)?;
                self.fragment_input_attributes[i] = value.as_bool(reg)?;
            }

            // Fragment shader
            R::FragmentProgram => self.fragment_program_addr = value.as_u32(reg)?,
            R::FragmentProgramPc => {
                self.fragment_program_start_pc =
                    below(reg, value.as_u32(reg)?, UNIFIED_INSTRUCTION_MEMORY_SIZE)?;
            }
            R::FragmentProgramSize => self.fragment_program_size = value.as_u32(reg)?,
            R::FragmentThreadResources => self.fragment_thread_resources = value.as_u32(reg)?,
            R::FragmentConstant => {
                let i = index(reg, sub, MAX_FRAGMENT_CONSTANTS)?;
                self.fragment_constants[i] = value.as_quad(reg)?;
            }
            R::ModifyFragmentDepth => self.modify_depth = value.as_bool(reg)?,

            // Unified shader programs
            R::ShaderProgramAddress => self.program_address = value.as_u32(reg)?,
            R::ShaderProgramSize => self.program_size = value.as_u32(reg)?,
            R::ShaderProgramLoadPc => {
                self.program_load_pc =
                    below(reg, value.as_u32(reg)?, UNIFIED_INSTRUCTION_MEMORY_SIZE)?;
            }
            R::ShaderProgramPc => {
                let i = index(reg, sub, MAX_SHADER_TARGETS)?;
                self.program_start_pc[i] =
                    below(reg, value.as_u32(reg)?, UNIFIED_INSTRUCTION_MEMORY_SIZE)?;
            }
            R::ShaderThreadResources => {
                let i = index(reg, sub, MAX_SHADER_TARGETS)?;
                self.program_resources[i] = value.as_u32(reg)?;
            }

            // Texture units
            R::TextureAddress => {
                let per_unit = (MAX_TEXTURE_SIZE * CUBEMAP_IMAGES) as u32;
                let max = per_unit * MAX_TEXTURES as u32;
                if sub >= max {
                    return Err(ProtocolError::SubIndexOutOfRange {
                        register: reg.name(),
                        index: sub,
                        max,
                    });
                }
                let unit = (sub / per_unit) as usize;
                let level = ((sub / CUBEMAP_IMAGES as u32) % MAX_TEXTURE_SIZE as u32) as usize;
                let face = (sub % CUBEMAP_IMAGES as u32) as usize;
                self.texture_address[unit][level][face] = value.as_u32(reg)?;
            }
            R::TextureEnable
            | R::TextureMode
            | R::TextureWidth
            | R::TextureHeight
            | R::TextureDepth
            | R::TextureWidth2
            | R::TextureHeight2
            | R::TextureDepth2
            | R::TextureBorder
            | R::TextureFormat
            | R::TextureReverse
            | R::TextureD3d9ColorConv
            | R::TextureD3d9VInvert
            | R::TextureCompression
            | R::TextureBlocking
            | R::TextureBorderColor
            | R::TextureWrapS
            | R::TextureWrapT
            | R::TextureWrapR
            | R::TextureNonNormalized
            | R::TextureMinFilter
            | R::TextureMagFilter
            | R::TextureEnableComparison
            | R::TextureComparisonFunction
            | R::TextureSrgb
            | R::TextureMinLod
            | R::TextureMaxLod
            | R::TextureLodBias
            | R::TextureMinLevel
            | R::TextureMaxLevel
            | R::TextureUnitLodBias
            | R::TextureMaxAnisotropy => {
                let unit = index(reg, sub, MAX_TEXTURES)?;
                self.write_texture_unit(reg, unit, value)?;
            }

            // Depth and stencil
            R::ZBufferClear => self.z_buffer_clear = value.as_u32(reg)?,
            R::StencilBufferClear => {
                self.stencil_buffer_clear = in_range(reg, value.as_u32(reg)?, 0, 0xff)?;
            }
            R::ZStencilStateBufferMemAddr => self.zstencil_state_buffer_addr = value.as_u32(reg)?,
            R::StencilTest => self.stencil_test = value.as_bool(reg)?,
            R::StencilFunction => self.stencil_function = value.as_compare(reg)?,
            R::StencilReference => self.stencil_reference = byte(reg, value.as_u32(reg)?)?,
            R::StencilCompareMask => self.stencil_test_mask = byte(reg, value.as_u32(reg)?)?,
            R::StencilUpdateMask => self.stencil_update_mask = byte(reg, value.as_u32(reg)?)?,
            R::StencilFailUpdate => self.stencil_fail = value.as_stencil_op(reg)?,
            R::DepthFailUpdate => self.depth_fail = value.as_stencil_op(reg)?,
            R::DepthPassUpdate => self.depth_pass = value.as_stencil_op(reg)?,
            R::DepthTest => self.depth_test = value.as_bool(reg)?,
            R::DepthFunction => self.depth_function = value.as_compare(reg)?,
            R::DepthMask => self.depth_mask = value.as_bool(reg)?,
            R::ZStencilCompression => self.zstencil_compression = value.as_bool(reg)?,

            // Color buffer. The color buffer format doubles as render target 0 format.
            R::ColorBufferFormat => {
                let format = render_target_format(reg, value.as_texture_format(reg)?)?;
                self.color_buffer_format = format;
                self.rt_format[0] = format;
            }
            R::ColorCompression => self.color_compression = value.as_bool(reg)?,
            R::ColorSrgbWrite => self.color_srgb_write = value.as_bool(reg)?,
            R::RenderTargetEnable => {
                let i = index(reg, sub, MAX_RENDER_TARGETS)?;
                self.rt_enable[i] = value.as_bool(reg)?;
            }
            R::RenderTargetFormat => {
                let i = index(reg, sub, MAX_RENDER_TARGETS)?;
                let format = render_target_format(reg, value.as_texture_format(reg)?)?;
                self.rt_format[i] = format;
                if i == 0 {
                    self.color_buffer_format = format;
                }
            }
            R::RenderTargetAddress => {
                let i = index(reg, sub, MAX_RENDER_TARGETS)?;
                let addr = value.as_u32(reg)?;
                self.rt_address[i] = addr;
                if i == 0 {
                    self.back_buffer_addr = addr;
                }
            }
            R::ColorBufferClear => self.color_buffer_clear = value.as_quad(reg)?,
            R::ColorStateBufferMemAddr => self.color_state_buffer_addr = value.as_u32(reg)?,

            // Blending
            R::ColorBlend => {
                let i = index(reg, sub, MAX_RENDER_TARGETS)?;
                self.color_blend[i] = value.as_bool(reg)?;
            }
            R::BlendEquation => {
                let i = index(reg, sub, MAX_RENDER_TARGETS)?;
                self.blend_equation[i] = value.as_blend_equation(reg)?;
            }
            R::BlendSrcRgb => {
                let i = index(reg, sub, MAX_RENDER_TARGETS)?;
                self.blend_source_rgb[i] = value.as_blend_function(reg)?;
            }
            R::BlendDstRgb => {
                let i = index(reg, sub, MAX_RENDER_TARGETS)?;
                self.blend_destination_rgb[i] = value.as_blend_function(reg)?;
            }
            R::BlendSrcAlpha => {
                let i = index(reg, sub, MAX_RENDER_TARGETS)?;
                self.blend_source_alpha[i] = value.as_blend_function(reg)?;
            }
            R::BlendDstAlpha => {
                let i = index(reg, sub, MAX_RENDER_TARGETS)?;
                self.blend_destination_alpha[i] = value.as_blend_function(reg)?;
            }
            R::BlendColor => {
                let i = index(reg, sub, MAX_RENDER_TARGETS)?;
                self.blend_color[i] = value.as_quad(reg)?;
            }
            R::ColorMaskR => {
                let i = index(reg, sub, MAX_RENDER_TARGETS)?;
                self.color_mask_r[i] = value.as_bool(reg)?;
            }
            R::ColorMaskG => {
                let i = index(reg, sub, MAX_RENDER_TARGETS)?;
                self.color_mask_g[i] = value.as_bool(reg)?;
            }
            R::ColorMaskB => {
                let i = index(reg, sub, MAX_RENDER_TARGETS)?;
                self.color_mask_b[i] = value.as_bool(reg)?;
            }
            R::ColorMaskA => {
                let i = index(reg, sub, MAX_RENDER_TARGETS)?;
                self.color_mask_a[i] = value.as_bool(reg)?;
            }

            R::LogicalOperation => self.logical_operation = value.as_bool(reg)?,
            R::LogicOpFunction => self.logic_op_function = value.as_logic_op(reg)?,

            R::Mcv2SecondInterleavingStartAddr => {
                self.mc_second_interleaving_start_addr = value.as_u32(reg)?;
            }

            // Blitter
            R::BlitIniX => self.blit_ini_x = value.as_u32(reg)?,
            R::BlitIniY => self.blit_ini_y = value.as_u32(reg)?,
            R::BlitXOffset => self.blit_x_offset = value.as_u32(reg)?,
            R::BlitYOffset => self.blit_y_offset = value.as_u32(reg)?,
            R::BlitWidth => self.blit_width = value.as_u32(reg)?,
            R::BlitHeight => self.blit_height = value.as_u32(reg)?,
            R::BlitDstAddress => self.blit_destination_address = value.as_u32(reg)?,
            R::BlitDstTxWidth2 => {
                self.blit_texture_width2 = below(reg, value.as_u32(reg)?, MAX_TEXTURE_SIZE as u32)?;
            }
            R::BlitDstTxFormat => self.blit_destination_format = value.as_texture_format(reg)?,
            R::BlitDstTxBlock => self.blit_destination_blocking = value.as_blocking(reg)?,
        }

        Ok(())
    }

    fn write_texture_unit(
        &mut self,
        reg: GpuRegister,
        unit: usize,
        value: RegisterValue,
    ) -> std::result::Result<(), ProtocolError> {
        use GpuRegister as R;

        let max_level = MAX_TEXTURE_SIZE as u32;
        match reg {
            R::TextureEnable => self.texture_enabled[unit] = value.as_bool(reg)?,
            R::TextureMode => self.texture_mode[unit] = value.as_texture_mode(reg)?,
            R::TextureWidth => {
                self.texture_width[unit] = in_range(reg, value.as_u32(reg)?, 0, 1 << (max_level - 1))?;
            }
            R::TextureHeight => {
                self.texture_height[unit] = in_range(reg, value.as_u32(reg)?, 0, 1 << (max_level - 1))?;
            }
            R::TextureDepth => {
                self.texture_depth[unit] = in_range(reg, value.as_u32(reg)?, 0, 1 << (max_level - 1))?;
            }
            R::TextureWidth2 => self.texture_width2[unit] = below(reg, value.as_u32(reg)?, max_level)?,
            R::TextureHeight2 => self.texture_height2[unit] = below(reg, value.as_u32(reg)?, max_level)?,
            R::TextureDepth2 => self.texture_depth2[unit] = below(reg, value.as_u32(reg)?, max_level)?,
            R::TextureBorder => self.texture_border[unit] = in_range(reg, value.as_u32(reg)?, 0, 1)?,
            R::TextureFormat => self.texture_format[unit] = value.as_texture_format(reg)?,
            R::TextureReverse => self.texture_reverse[unit] = value.as_bool(reg)?,
            R::TextureD3d9ColorConv => self.texture_d3d9_color_conv[unit] = value.as_bool(reg)?,
            R::TextureD3d9VInvert => self.texture_d3d9_v_invert[unit] = value.as_bool(reg)?,
            R::TextureCompression => self.texture_compression[unit] = value.as_compression(reg)?,
            R::TextureBlocking => self.texture_blocking[unit] = value.as_blocking(reg)?,
            R::TextureBorderColor => self.texture_border_color[unit] = value.as_quad(reg)?,
            R::TextureWrapS => self.texture_wrap_s[unit] = value.as_clamp(reg)?,
            R::TextureWrapT => self.texture_wrap_t[unit] = value.as_clamp(reg)?,
            R::TextureWrapR => self.texture_wrap_r[unit] = value.as_clamp(reg)?,
            R::TextureNonNormalized => self.texture_non_normalized[unit] = value.as_bool(reg)?,
            R::TextureMinFilter => self.texture_min_filter[unit] = value.as_filter(reg)?,
            R::TextureMagFilter => self.texture_mag_filter[unit] = value.as_filter(reg)?,
            R::TextureEnableComparison => self.texture_enable_comparison[unit] = value.as_bool(reg)?,
            R::TextureComparisonFunction => {
                self.texture_comparison_function[unit] = value.as_compare(reg)?;
            }
            R::TextureSrgb => self.texture_srgb[unit] = value.as_bool(reg)?,
            R::TextureMinLod => self.texture_min_lod[unit] = value.as_f32(reg)?,
            R::TextureMaxLod => self.texture_max_lod[unit] = value.as_f32(reg)?,
            R::TextureLodBias => self.texture_lod_bias[unit] = value.as_f32(reg)?,
            R::TextureMinLevel => self.texture_min_level[unit] = below(reg, value.as_u32(reg)?, max_level)?,
            R::TextureMaxLevel => self.texture_max_level[unit] = below(reg, value.as_u32(reg)?, max_level)?,
            R::TextureUnitLodBias => self.texture_unit_lod_bias[unit] = value.as_f32(reg)?,
            R::TextureMaxAnisotropy => {
                self.max_anisotropy[unit] = in_range(reg, value.as_u32(reg)?, 1, MAX_ANISOTROPY)?;
            }
            _ => return Err(ProtocolError::UnknownRegister { id: reg.id() }),
        }
        Ok(())
    }
}

impl Default for GpuState {
    fn default() -> Self {
        Self::new()
    }
}

fn index(register: GpuRegister, sub: u32, max: usize) -> std::result::Result<usize, ProtocolError> {
    if (sub as usize) < max {
        Ok(sub as usize)
    } else {
        Err(ProtocolError::SubIndexOutOfRange {
            register: register.name(),
            index: sub,
            max: max as u32,
        })
    }
}

fn out_of_range(register: GpuRegister, value: impl std::fmt::Display) -> ProtocolError {
    ProtocolError::ValueOutOfRange {
        register: register.name(),
        value: value.to_string(),
    }
}

fn in_range(register: GpuRegister, value: u32, min: u32, max: u32) -> std::result::Result<u32, ProtocolError> {
    if (min..=max).contains(&value) {
        Ok(value)
    } else {
        Err(out_of_range(register, value))
    }
}

fn below(register: GpuRegister, value: u32, limit: u32) -> std::result::Result<u32, ProtocolError> {
    if value < limit {
        Ok(value)
    } else {
        Err(out_of_range(register, value))
    }
}

fn byte(register: GpuRegister, value: u32) -> std::result::Result<u8, ProtocolError> {
    u8::try_from(value).map_err(|_| out_of_range(register, value))
}

fn viewport_coord(register: GpuRegister, value: i32) -> std::result::Result<i32, ProtocolError> {
    if (-MAX_VIEWPORT..=MAX_VIEWPORT).contains(&value) {
        Ok(value)
    } else {
        Err(out_of_range(register, value))
    }
}

fn unit_interval(register: GpuRegister, value: f32) -> std::result::Result<f32, ProtocolError> {
    if (0.0..=1.0).contains(&value) {
        Ok(value)
    } else {
        Err(out_of_range(register, value))
    }
}

fn render_target_format(
    register: GpuRegister,
    format: TextureFormat,
) -> std::result::Result<TextureFormat, ProtocolError> {
    match format.render_target_bytes() {
        Some(_) => Ok(format),
        None => Err(ProtocolError::UnsupportedFormat(format!(
            "{:?} as {}",
            format,
            register.name()
        ))),
    }
}
