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

//! GPU register identifiers, register payloads, commands and events
//!
//! Register and command codes arrive from the bus as raw 32-bit values; they are
//! resolved here with `TryFrom<u32>` so an unknown code turns into a protocol error
//! at the command processor boundary instead of an impossible enum value.

use super::types::*;
use crate::core::error::ProtocolError;
use serde::{Deserialize, Serialize};

macro_rules! gpu_registers {
    ($($variant:ident => $name:literal),* $(,)?) => {
        /// Architectural GPU register identifier
        ///
        /// The numeric value of each variant is its bus register id.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[repr(u32)]
        pub enum GpuRegister {
            $($variant),*
        }

        impl GpuRegister {
            /// All registers ordered by register id
            pub const ALL: &'static [GpuRegister] = &[$(GpuRegister::$variant),*];

            /// Register name as used in traces and diagnostics
            pub fn name(self) -> &'static str {
                match self {
                    $(GpuRegister::$variant => $name),*
                }
            }
        }
    };
}

gpu_registers! {
    Status => "GPU_STATUS",
    Memory => "GPU_MEMORY",
    VertexProgram => "GPU_VERTEX_PROGRAM",
    VertexProgramPc => "GPU_VERTEX_PROGRAM_PC",
    VertexProgramSize => "GPU_VERTEX_PROGRAM_SIZE",
    VertexThreadResources => "GPU_VERTEX_THREAD_RESOURCES",
    VertexConstant => "GPU_VERTEX_CONSTANT",
    VertexOutputAttribute => "GPU_VERTEX_OUTPUT_ATTRIBUTE",
    VertexAttributeMap => "GPU_VERTEX_ATTRIBUTE_MAP",
    VertexAttributeDefaultValue => "GPU_VERTEX_ATTRIBUTE_DEFAULT_VALUE",
    StreamAddress => "GPU_STREAM_ADDRESS",
    StreamStride => "GPU_STREAM_STRIDE",
    StreamData => "GPU_STREAM_DATA",
    StreamElements => "GPU_STREAM_ELEMENTS",
    StreamFrequency => "GPU_STREAM_FREQUENCY",
    StreamStart => "GPU_STREAM_START",
    StreamCount => "GPU_STREAM_COUNT",
    StreamInstances => "GPU_STREAM_INSTANCES",
    IndexMode => "GPU_INDEX_MODE",
    IndexStream => "GPU_INDEX_STREAM",
    D3d9ColorStream => "GPU_D3D9_COLOR_STREAM",
    AttributeLoadBypass => "GPU_ATTRIBUTE_LOAD_BYPASS",
    Primitive => "GPU_PRIMITIVE",
    FrustumClipping => "GPU_FRUSTUM_CLIPPING",
    UserClip => "GPU_USER_CLIP",
    UserClipPlane => "GPU_USER_CLIP_PLANE",
    FrontBufferAddr => "GPU_FRONTBUFFER_ADDR",
    BackBufferAddr => "GPU_BACKBUFFER_ADDR",
    ZStencilBufferAddr => "GPU_ZSTENCILBUFFER_ADDR",
    TextureMemAddr => "GPU_TEXTURE_MEM_ADDR",
    ProgramMemAddr => "GPU_PROGRAM_MEM_ADDR",
    FaceMode => "GPU_FACEMODE",
    Culling => "GPU_CULLING",
    HierarchicalZ => "GPU_HIERARCHICALZ",
    EarlyZ => "GPU_EARLYZ",
    DisplayXRes => "GPU_DISPLAY_X_RES",
    DisplayYRes => "GPU_DISPLAY_Y_RES",
    D3d9PixelCoordinates => "GPU_D3D9_PIXEL_COORDINATES",
    ViewportIniX => "GPU_VIEWPORT_INI_X",
    ViewportIniY => "GPU_VIEWPORT_INI_Y",
    ViewportWidth => "GPU_VIEWPORT_WIDTH",
    ViewportHeight => "GPU_VIEWPORT_HEIGHT",
    ScissorTest => "GPU_SCISSOR_TEST",
    ScissorIniX => "GPU_SCISSOR_INI_X",
    ScissorIniY => "GPU_SCISSOR_INI_Y",
    ScissorWidth => "GPU_SCISSOR_WIDTH",
    ScissorHeight => "GPU_SCISSOR_HEIGHT",
    DepthRangeNear => "GPU_DEPTH_RANGE_NEAR",
    DepthRangeFar => "GPU_DEPTH_RANGE_FAR",
    DepthSlopeFactor => "GPU_DEPTH_SLOPE_FACTOR",
    DepthUnitOffset => "GPU_DEPTH_UNIT_OFFSET",
    ZBufferBitPrecision => "GPU_Z_BUFFER_BIT_PRECISSION",
    D3d9DepthRange => "GPU_D3D9_DEPTH_RANGE",
    D3d9RasterizationRules => "GPU_D3D9_RASTERIZATION_RULES",
    TwoSidedLighting => "GPU_TWOSIDED_LIGHTING",
    Multisampling => "GPU_MULTISAMPLING",
    MsaaSamples => "GPU_MSAA_SAMPLES",
    Interpolation => "GPU_INTERPOLATION",
    FragmentInputAttributes => "GPU_FRAGMENT_INPUT_ATTRIBUTES",
    FragmentProgram => "GPU_FRAGMENT_PROGRAM",
    FragmentProgramPc => "GPU_FRAGMENT_PROGRAM_PC",
    FragmentProgramSize => "GPU_FRAGMENT_PROGRAM_SIZE",
    FragmentThreadResources => "GPU_FRAGMENT_THREAD_RESOURCES",
    FragmentConstant => "GPU_FRAGMENT_CONSTANT",
    ModifyFragmentDepth => "GPU_MODIFY_FRAGMENT_DEPTH",
    ShaderProgramAddress => "GPU_SHADER_PROGRAM_ADDRESS",
    ShaderProgramSize => "GPU_SHADER_PROGRAM_SIZE",
    ShaderProgramLoadPc => "GPU_SHADER_PROGRAM_LOAD_PC",
    ShaderProgramPc => "GPU_SHADER_PROGRAM_PC",
    ShaderThreadResources => "GPU_SHADER_THREAD_RESOURCES",
    TextureEnable => "GPU_TEXTURE_ENABLE",
    TextureMode => "GPU_TEXTURE_MODE",
    TextureAddress => "GPU_TEXTURE_ADDRESS",
    TextureWidth => "GPU_TEXTURE_WIDTH",
    TextureHeight => "GPU_TEXTURE_HEIGHT",
    TextureDepth => "GPU_TEXTURE_DEPTH",
    TextureWidth2 => "GPU_TEXTURE_WIDTH2",
    TextureHeight2 => "GPU_TEXTURE_HEIGHT2",
    TextureDepth2 => "GPU_TEXTURE_DEPTH2",
    TextureBorder => "GPU_TEXTURE_BORDER",
    TextureFormat => "GPU_TEXTURE_FORMAT",
    TextureReverse => "GPU_TEXTURE_REVERSE",
    TextureD3d9ColorConv => "GPU_TEXTURE_D3D9_COLOR_CONV",
    TextureD3d9VInvert => "GPU_TEXTURE_D3D9_V_INV",
    TextureCompression => "GPU_TEXTURE_COMPRESSION",
    TextureBlocking => "GPU_TEXTURE_BLOCKING",
    TextureBorderColor => "GPU_TEXTURE_BORDER_COLOR",
    TextureWrapS => "GPU_TEXTURE_WRAP_S",
    TextureWrapT => "GPU_TEXTURE_WRAP_T",
    TextureWrapR => "GPU_TEXTURE_WRAP_R",
    TextureNonNormalized => "GPU_TEXTURE_NON_NORMALIZED",
    TextureMinFilter => "GPU_TEXTURE_MIN_FILTER",
    TextureMagFilter => "GPU_TEXTURE_MAG_FILTER",
    TextureEnableComparison => "GPU_TEXTURE_ENABLE_COMPARISON",
    TextureComparisonFunction => "GPU_TEXTURE_COMPARISON_FUNCTION",
    TextureSrgb => "GPU_TEXTURE_SRGB",
    TextureMinLod => "GPU_TEXTURE_MIN_LOD",
    TextureMaxLod => "GPU_TEXTURE_MAX_LOD",
    TextureLodBias => "GPU_TEXTURE_LOD_BIAS",
    TextureMinLevel => "GPU_TEXTURE_MIN_LEVEL",
    TextureMaxLevel => "GPU_TEXTURE_MAX_LEVEL",
    TextureUnitLodBias => "GPU_TEXT_UNIT_LOD_BIAS",
    TextureMaxAnisotropy => "GPU_TEXTURE_MAX_ANISOTROPY",
    ZBufferClear => "GPU_Z_BUFFER_CLEAR",
    StencilBufferClear => "GPU_STENCIL_BUFFER_CLEAR",
    ZStencilStateBufferMemAddr => "GPU_ZSTENCIL_STATE_BUFFER_MEM_ADDR",
    StencilTest => "GPU_STENCIL_TEST",
    StencilFunction => "GPU_STENCIL_FUNCTION",
    StencilReference => "GPU_STENCIL_REFERENCE",
    StencilCompareMask => "GPU_STENCIL_COMPARE_MASK",
    StencilUpdateMask => "GPU_STENCIL_UPDATE_MASK",
    StencilFailUpdate => "GPU_STENCIL_FAIL_UPDATE",
    DepthFailUpdate => "GPU_DEPTH_FAIL_UPDATE",
    DepthPassUpdate => "GPU_DEPTH_PASS_UPDATE",
    DepthTest => "GPU_DEPTH_TEST",
    DepthFunction => "GPU_DEPTH_FUNCTION",
    DepthMask => "GPU_DEPTH_MASK",
    ZStencilCompression => "GPU_ZSTENCIL_COMPRESSION",
    ColorBufferFormat => "GPU_COLOR_BUFFER_FORMAT",
    ColorCompression => "GPU_COLOR_COMPRESSION",
    ColorSrgbWrite => "GPU_COLOR_SRGB_WRITE",
    RenderTargetEnable => "GPU_RENDER_TARGET_ENABLE",
    RenderTargetFormat => "GPU_RENDER_TARGET_FORMAT",
    RenderTargetAddress => "GPU_RENDER_TARGET_ADDRESS",
    ColorBufferClear => "GPU_COLOR_BUFFER_CLEAR",
    ColorStateBufferMemAddr => "GPU_COLOR_STATE_BUFFER_MEM_ADDR",
    ColorBlend => "GPU_COLOR_BLEND",
    BlendEquation => "GPU_BLEND_EQUATION",
    BlendSrcRgb => "GPU_BLEND_SRC_RGB",
    BlendDstRgb => "GPU_BLEND_DST_RGB",
    BlendSrcAlpha => "GPU_BLEND_SRC_ALPHA",
    BlendDstAlpha => "GPU_BLEND_DST_ALPHA",
    BlendColor => "GPU_BLEND_COLOR",
    ColorMaskR => "GPU_COLOR_MASK_R",
    ColorMaskG => "GPU_COLOR_MASK_G",
    ColorMaskB => "GPU_COLOR_MASK_B",
    ColorMaskA => "GPU_COLOR_MASK_A",
    LogicalOperation => "GPU_LOGICAL_OPERATION",
    LogicOpFunction => "GPU_LOGICOP_FUNCTION",
    Mcv2SecondInterleavingStartAddr => "GPU_MCV2_2ND_INTERLEAVING_START_ADDR",
    BlitIniX => "GPU_BLIT_INI_X",
    BlitIniY => "GPU_BLIT_INI_Y",
    BlitXOffset => "GPU_BLIT_X_OFFSET",
    BlitYOffset => "GPU_BLIT_Y_OFFSET",
    BlitWidth => "GPU_BLIT_WIDTH",
    BlitHeight => "GPU_BLIT_HEIGHT",
    BlitDstAddress => "GPU_BLIT_DST_ADDRESS",
    BlitDstTxWidth2 => "GPU_BLIT_DST_TX_WIDTH2",
    BlitDstTxFormat => "GPU_BLIT_DST_TX_FORMAT",
    BlitDstTxBlock => "GPU_BLIT_DST_TX_BLOCK",
}

impl GpuRegister {
    /// Bus register id of this register
    pub fn id(self) -> u32 {
        self as u32
    }
}

impl TryFrom<u32> for GpuRegister {
    type Error = ProtocolError;

    fn try_from(id: u32) -> Result<Self, Self::Error> {
        Self::ALL
            .get(id as usize)
            .copied()
            .ok_or(ProtocolError::UnknownRegister { id })
    }
}

/// Typed payload of a register write
///
/// Each register accepts exactly one variant; a mismatch is a protocol error.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum RegisterValue {
    Uint(u32),
    Int(i32),
    Float(f32),
    Bool(bool),
    QuadFloat(QuadFloat),
    Status(GpuStatus),
    FaceMode(FaceMode),
    Culling(CullingMode),
    Primitive(PrimitiveMode),
    StreamData(StreamData),
    TextureMode(TextureMode),
    TextureFormat(TextureFormat),
    Compression(TextureCompression),
    Blocking(TextureBlocking),
    Clamp(ClampMode),
    Filter(FilterMode),
    Compare(CompareMode),
    StencilOp(StencilUpdateFunction),
    BlendEquation(BlendEquation),
    BlendFunction(BlendFunction),
    LogicOp(LogicOpMode),
}

macro_rules! value_accessor {
    ($fn_name:ident, $variant:ident, $ty:ty, $expected:literal) => {
        pub fn $fn_name(&self, register: GpuRegister) -> Result<$ty, ProtocolError> {
            match *self {
                RegisterValue::$variant(v) => Ok(v),
                _ => Err(ProtocolError::ValueType {
                    register: register.name(),
                    expected: $expected,
                }),
            }
        }
    };
}

impl RegisterValue {
    value_accessor!(as_u32, Uint, u32, "unsigned integer");
    value_accessor!(as_i32, Int, i32, "signed integer");
    value_accessor!(as_f32, Float, f32, "float");
    value_accessor!(as_bool, Bool, bool, "boolean");
    value_accessor!(as_quad, QuadFloat, QuadFloat, "quad float");
    value_accessor!(as_face_mode, FaceMode, FaceMode, "face mode");
    value_accessor!(as_culling, Culling, CullingMode, "culling mode");
    value_accessor!(as_primitive, Primitive, PrimitiveMode, "primitive mode");
    value_accessor!(as_stream_data, StreamData, StreamData, "stream data type");
    value_accessor!(as_texture_mode, TextureMode, TextureMode, "texture mode");
    value_accessor!(as_texture_format, TextureFormat, TextureFormat, "texture format");
    value_accessor!(as_compression, Compression, TextureCompression, "texture compression");
    value_accessor!(as_blocking, Blocking, TextureBlocking, "texture blocking");
    value_accessor!(as_clamp, Clamp, ClampMode, "clamp mode");
    value_accessor!(as_filter, Filter, FilterMode, "filter mode");
    value_accessor!(as_compare, Compare, CompareMode, "compare mode");
    value_accessor!(as_stencil_op, StencilOp, StencilUpdateFunction, "stencil update function");
    value_accessor!(as_blend_equation, BlendEquation, BlendEquation, "blend equation");
    value_accessor!(as_blend_function, BlendFunction, BlendFunction, "blend function");
    value_accessor!(as_logic_op, LogicOp, LogicOpMode, "logic op mode");
}

macro_rules! gpu_commands {
    ($($variant:ident => $name:literal),* $(,)?) => {
        /// Command accepted by the GPU command processor
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[repr(u32)]
        pub enum GpuCommand {
            $($variant),*
        }

        impl GpuCommand {
            /// All commands ordered by command code
            pub const ALL: &'static [GpuCommand] = &[$(GpuCommand::$variant),*];

            pub fn name(self) -> &'static str {
                match self {
                    $(GpuCommand::$variant => $name),*
                }
            }
        }
    };
}

gpu_commands! {
    Reset => "GPU_RESET",
    Draw => "GPU_DRAW",
    SwapBuffers => "GPU_SWAPBUFFERS",
    DumpColor => "GPU_DUMPCOLOR",
    DumpDepth => "GPU_DUMPDEPTH",
    DumpStencil => "GPU_DUMPSTENCIL",
    Blit => "GPU_BLIT",
    ClearBuffers => "GPU_CLEARBUFFERS",
    ClearZBuffer => "GPU_CLEARZBUFFER",
    ClearZStencilBuffer => "GPU_CLEARZSTENCILBUFFER",
    ClearColorBuffer => "GPU_CLEARCOLORBUFFER",
    LoadVertexProgram => "GPU_LOAD_VERTEX_PROGRAM",
    LoadFragmentProgram => "GPU_LOAD_FRAGMENT_PROGRAM",
    LoadShaderProgram => "GPU_LOAD_SHADER_PROGRAM",
    FlushZStencil => "GPU_FLUSHZSTENCIL",
    FlushColor => "GPU_FLUSHCOLOR",
    SaveColorState => "GPU_SAVE_COLOR_STATE",
    RestoreColorState => "GPU_RESTORE_COLOR_STATE",
    SaveZStencilState => "GPU_SAVE_ZSTENCIL_STATE",
    RestoreZStencilState => "GPU_RESTORE_ZSTENCIL_STATE",
    ResetColorState => "GPU_RESET_COLOR_STATE",
    ResetZStencilState => "GPU_RESET_ZSTENCIL_STATE",
}

impl GpuCommand {
    /// Bus command code
    pub fn code(self) -> u32 {
        self as u32
    }

    /// Commands kept for protocol compatibility that have no effect on the emulated state
    pub fn is_compatibility_noop(self) -> bool {
        matches!(
            self,
            GpuCommand::FlushZStencil
                | GpuCommand::FlushColor
                | GpuCommand::SaveColorState
                | GpuCommand::RestoreColorState
                | GpuCommand::SaveZStencilState
                | GpuCommand::RestoreZStencilState
                | GpuCommand::ResetColorState
                | GpuCommand::ResetZStencilState
        )
    }
}

impl TryFrom<u32> for GpuCommand {
    type Error = ProtocolError;

    fn try_from(code: u32) -> Result<Self, Self::Error> {
        Self::ALL
            .get(code as usize)
            .copied()
            .ok_or(ProtocolError::UnknownCommand { code })
    }
}

/// Event signalled to the command processor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GpuEvent {
    EndOfFrame,
    Unnamed,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_id_round_trip() {
        for (id, reg) in GpuRegister::ALL.iter().enumerate() {
            assert_eq!(reg.id(), id as u32);
            assert_eq!(GpuRegister::try_from(id as u32), Ok(*reg));
        }
    }

    #[test]
    fn test_unknown_register_id() {
        let id = GpuRegister::ALL.len() as u32;
        assert_eq!(
            GpuRegister::try_from(id),
            Err(ProtocolError::UnknownRegister { id })
        );
    }

    #[test]
    fn test_command_codes() {
        assert_eq!(GpuCommand::try_from(GpuCommand::Draw.code()), Ok(GpuCommand::Draw));
        assert!(GpuCommand::try_from(1000).is_err());
        assert!(GpuCommand::SaveColorState.is_compatibility_noop());
        assert!(!GpuCommand::ClearColorBuffer.is_compatibility_noop());
    }

    #[test]
    fn test_value_type_mismatch() {
        let value = RegisterValue::Float(1.0);
        assert_eq!(value.as_f32(GpuRegister::DepthRangeFar), Ok(1.0));
        assert_eq!(
            value.as_u32(GpuRegister::DisplayXRes),
            Err(ProtocolError::ValueType {
                register: "GPU_DISPLAY_X_RES",
                expected: "unsigned integer",
            })
        );
    }
}
