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

//! GPU type definitions
//!
//! Architectural limits of the emulated GPU and the enumerated register value types
//! (primitive topology, compare functions, blend state, texture formats and so on).

use bincode::{Decode, Encode};
use serde::{Deserialize, Serialize};

/// Four component float vector (RGBA color, XYZW position, generic attribute)
pub type QuadFloat = [f32; 4];

/// Maximum horizontal/vertical display resolution
pub const MAX_DISPLAY_RES: u32 = 4096;

/// Maximum viewport coordinate magnitude
pub const MAX_VIEWPORT: i32 = 4096;

/// Number of vertex program constant registers
pub const MAX_VERTEX_CONSTANTS: usize = 512;

/// Number of fragment program constant registers
pub const MAX_FRAGMENT_CONSTANTS: usize = 1024;

/// Number of vertex attributes (shader input and output registers)
pub const MAX_VERTEX_ATTRIBUTES: usize = 16;

/// Number of fragment attributes
pub const MAX_FRAGMENT_ATTRIBUTES: usize = 16;

/// Number of vertex streams
pub const MAX_STREAM_BUFFERS: usize = 32;

/// Number of user clip planes
pub const MAX_USER_CLIP_PLANES: usize = 6;

/// Attribute map value marking an attribute not fed by any stream
pub const ST_INACTIVE_ATTRIBUTE: u32 = 255;

/// Number of texture units
pub const MAX_TEXTURES: usize = 16;

/// Number of mipmap levels (log2 of the largest texture dimension plus one)
pub const MAX_TEXTURE_SIZE: usize = 13;

/// Number of cubemap faces
pub const CUBEMAP_IMAGES: usize = 6;

/// Maximum anisotropy ratio
pub const MAX_ANISOTROPY: u32 = 16;

/// Maximum number of samples per pixel
pub const MAX_MSAA_SAMPLES: usize = 16;

/// Number of render targets
pub const MAX_RENDER_TARGETS: usize = 8;

/// Maximum bytes per pixel of a color buffer
pub const MAX_BYTES_PER_PIXEL: usize = 8;

/// Stamp (fragment quad) width in pixels
pub const STAMP_WIDTH: u32 = 2;

/// Stamp (fragment quad) height in pixels
pub const STAMP_HEIGHT: u32 = 2;

/// Fragments per stamp
pub const STAMP_FRAGMENTS: usize = (STAMP_WIDTH * STAMP_HEIGHT) as usize;

/// Number of shader targets of the unified shader model
pub const MAX_SHADER_TARGETS: usize = 4;

/// Unified shader instruction memory size in instructions
pub const UNIFIED_INSTRUCTION_MEMORY_SIZE: u32 = 2048;

/// Size of an encoded shader instruction in bytes
pub const SHADER_INSTRUCTION_SIZE: u32 = 16;

// Attribute slots with a fixed meaning
pub const POSITION_ATTRIBUTE: usize = 0;
pub const COLOR_ATTRIBUTE: usize = 1;
pub const COLOR_ATTRIBUTE_SEC: usize = 2;
pub const COLOR_ATTRIBUTE_BACK_PRI: usize = 3;
pub const COLOR_ATTRIBUTE_BACK_SEC: usize = 4;
pub const FACE_ATTRIBUTE: usize = 15;

/// Status of the GPU as seen through the read-only status register
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Encode, Decode)]
pub enum GpuStatus {
    #[default]
    Reset,
    Ready,
    Drawing,
    EndGeometry,
    EndFragment,
    MemoryRead,
    MemoryWrite,
    MemoryPreload,
    Swap,
    DumpBuffer,
    Blitting,
    ClearColor,
    ClearZ,
    FlushColor,
    FlushZ,
    SaveStateColor,
    RestoreStateColor,
    SaveStateZ,
    RestoreStateZ,
    Error,
}

/// Vertex winding that defines the front face
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Encode, Decode)]
pub enum FaceMode {
    /// Clockwise
    Cw,
    /// Counter-clockwise
    #[default]
    Ccw,
}

/// Which triangle faces are discarded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Encode, Decode)]
pub enum CullingMode {
    None,
    Front,
    #[default]
    Back,
    FrontAndBack,
}

/// Primitive topology of a draw call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Encode, Decode)]
pub enum PrimitiveMode {
    #[default]
    Triangle,
    TriangleStrip,
    TriangleFan,
    Quad,
    QuadStrip,
    Line,
    LineStrip,
    LineFan,
    Point,
}

impl PrimitiveMode {
    pub fn name(self) -> &'static str {
        match self {
            PrimitiveMode::Triangle => "TRIANGLE",
            PrimitiveMode::TriangleStrip => "TRIANGLE_STRIP",
            PrimitiveMode::TriangleFan => "TRIANGLE_FAN",
            PrimitiveMode::Quad => "QUAD",
            PrimitiveMode::QuadStrip => "QUAD_STRIP",
            PrimitiveMode::Line => "LINE",
            PrimitiveMode::LineStrip => "LINE_STRIP",
            PrimitiveMode::LineFan => "LINE_FAN",
            PrimitiveMode::Point => "POINT",
        }
    }
}

/// Numeric format of the elements stored in a vertex stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Encode, Decode)]
pub enum StreamData {
    Unorm8,
    Snorm8,
    Unorm16,
    Snorm16,
    Unorm32,
    Snorm32,
    Float16,
    #[default]
    Float32,
    Uint8,
    Sint8,
    Uint16,
    Sint16,
    Uint32,
    Sint32,
}

impl StreamData {
    /// Size in bytes of one element
    pub fn size(self) -> usize {
        match self {
            StreamData::Unorm8 | StreamData::Snorm8 | StreamData::Uint8 | StreamData::Sint8 => 1,
            StreamData::Unorm16
            | StreamData::Snorm16
            | StreamData::Float16
            | StreamData::Uint16
            | StreamData::Sint16 => 2,
            StreamData::Unorm32
            | StreamData::Snorm32
            | StreamData::Float32
            | StreamData::Uint32
            | StreamData::Sint32 => 4,
        }
    }
}

/// Texture dimensionality
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Encode, Decode)]
pub enum TextureMode {
    Texture1D,
    #[default]
    Texture2D,
    Texture3D,
    CubeMap,
}

/// Texel and pixel formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Encode, Decode)]
pub enum TextureFormat {
    Alpha8,
    Alpha12,
    Alpha16,
    DepthComponent16,
    DepthComponent24,
    DepthComponent32,
    Luminance8,
    Luminance8Signed,
    Luminance12,
    Luminance16,
    Luminance4Alpha4,
    Luminance6Alpha2,
    Luminance8Alpha8,
    Luminance8Alpha8Signed,
    Luminance12Alpha4,
    Luminance12Alpha12,
    Luminance16Alpha16,
    Intensity8,
    Intensity12,
    Intensity16,
    Rgb332,
    Rgb444,
    Rgb555,
    Rgb565,
    Rgb888,
    Rgb101010,
    Rgb121212,
    Rgba2222,
    Rgba4444,
    Rgba5551,
    #[default]
    Rgba8888,
    Rgba1010102,
    R16,
    Rg16,
    Rgba16,
    R16F,
    Rg16F,
    Rgba16F,
    R32F,
    Rg32F,
    Rgba32F,
}

impl TextureFormat {
    /// Bytes per pixel when the format is used as a color render target
    ///
    /// Returns `None` for formats the color write path does not support.
    pub fn render_target_bytes(self) -> Option<u32> {
        match self {
            TextureFormat::Rgba8888 | TextureFormat::Rg16F | TextureFormat::R32F => Some(4),
            TextureFormat::Rgba16 | TextureFormat::Rgba16F => Some(8),
            _ => None,
        }
    }
}

/// Texture compression scheme
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Encode, Decode)]
pub enum TextureCompression {
    #[default]
    None,
    Dxt1Rgb,
    Dxt1Rgba,
    Dxt3Rgba,
    Dxt5Rgba,
    Latc1,
    Latc1Signed,
    Latc2,
    Latc2Signed,
}

/// Memory layout of texture data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Encode, Decode)]
pub enum TextureBlocking {
    /// Morton ordered texel blocks
    #[default]
    Texture,
    /// Framebuffer tiled layout
    Framebuffer,
}

/// Texture coordinate wrap mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Encode, Decode)]
pub enum ClampMode {
    Clamp,
    ClampToEdge,
    #[default]
    Repeat,
    ClampToBorder,
    MirroredRepeat,
}

/// Texture minification/magnification filter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Encode, Decode)]
pub enum FilterMode {
    Nearest,
    #[default]
    Linear,
    NearestMipmapNearest,
    NearestMipmapLinear,
    LinearMipmapNearest,
    LinearMipmapLinear,
}

/// Comparison function for depth, stencil and shadow map tests
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Encode, Decode)]
pub enum CompareMode {
    Never,
    #[default]
    Always,
    Less,
    LEqual,
    Equal,
    GEqual,
    Greater,
    NotEqual,
}

/// Stencil buffer update operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Encode, Decode)]
pub enum StencilUpdateFunction {
    #[default]
    Keep,
    Zero,
    Replace,
    Incr,
    Decr,
    Invert,
    IncrWrap,
    DecrWrap,
}

/// Blend equation combining source and destination terms
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Encode, Decode)]
pub enum BlendEquation {
    #[default]
    Add,
    Subtract,
    ReverseSubtract,
    Min,
    Max,
}

/// Blend weight function
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Encode, Decode)]
pub enum BlendFunction {
    Zero,
    #[default]
    One,
    SrcColor,
    OneMinusSrcColor,
    DstColor,
    OneMinusDstColor,
    SrcAlpha,
    OneMinusSrcAlpha,
    DstAlpha,
    OneMinusDstAlpha,
    ConstantColor,
    OneMinusConstantColor,
    ConstantAlpha,
    OneMinusConstantAlpha,
    SrcAlphaSaturate,
}

/// Logical operation applied between incoming and stored color
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Encode, Decode)]
pub enum LogicOpMode {
    Clear,
    And,
    AndReverse,
    #[default]
    Copy,
    AndInverted,
    Noop,
    Xor,
    Or,
    Nor,
    Equiv,
    Invert,
    OrReverse,
    CopyInverted,
    OrInverted,
    Nand,
    Set,
}

/// Shader target of the unified shader model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Encode, Decode)]
pub enum ShaderTarget {
    Vertex = 0,
    Fragment = 1,
    Triangle = 2,
    MicroTriangle = 3,
}

impl ShaderTarget {
    pub fn from_index(index: u32) -> Option<Self> {
        match index {
            0 => Some(ShaderTarget::Vertex),
            1 => Some(ShaderTarget::Fragment),
            2 => Some(ShaderTarget::Triangle),
            3 => Some(ShaderTarget::MicroTriangle),
            _ => None,
        }
    }
}

bitflags::bitflags! {
    /// Per channel color write mask of a render target
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ColorMask: u8 {
        const R = 0b0001;
        const G = 0b0010;
        const B = 0b0100;
        const A = 0b1000;
    }
}

impl ColorMask {
    /// Channel flags in RGBA order
    pub const CHANNELS: [ColorMask; 4] = [ColorMask::R, ColorMask::G, ColorMask::B, ColorMask::A];
}
