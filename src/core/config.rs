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

//! Emulator configuration
//!
//! Loaded from a TOML file; every section and field is optional and falls back to the
//! defaults below.
//!
//! ```toml
//! [memory]
//! gpu_memory_mb = 64
//! system_memory_mb = 64
//!
//! [raster]
//! over_scan_width = 1
//! over_scan_height = 1
//! scan_width = 64
//! scan_height = 64
//! gen_width = 16
//! gen_height = 16
//!
//! [texture]
//! block_dim = 2
//! super_block_dim = 4
//! cache_blocks = 4096
//!
//! [debug]
//! validation = false
//! skip_batches = false
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::core::error::{EmulatorError, Result};
use crate::core::gpu::{STAMP_HEIGHT, STAMP_WIDTH};

/// Top level configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmulatorConfig {
    pub memory: MemoryConfig,
    pub raster: RasterConfig,
    pub texture: TextureConfig,
    pub debug: DebugConfig,
}

/// Sizes of the two emulated memory spaces
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryConfig {
    pub gpu_memory_mb: u32,
    pub system_memory_mb: u32,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            gpu_memory_mb: 64,
            system_memory_mb: 64,
        }
    }
}

impl MemoryConfig {
    pub fn gpu_memory_bytes(&self) -> usize {
        self.gpu_memory_mb as usize * 1024 * 1024
    }

    pub fn system_memory_bytes(&self) -> usize {
        self.system_memory_mb as usize * 1024 * 1024
    }
}

/// Framebuffer tiling geometry
///
/// Scan tiles are measured in pixels and must be a multiple of the generation tile,
/// which in turn must be a multiple of the 2×2 stamp. Over-scan tiles are counted in
/// scan tiles and must be square with a power of two side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RasterConfig {
    pub over_scan_width: u32,
    pub over_scan_height: u32,
    pub scan_width: u32,
    pub scan_height: u32,
    pub gen_width: u32,
    pub gen_height: u32,
}

impl Default for RasterConfig {
    fn default() -> Self {
        Self {
            over_scan_width: 1,
            over_scan_height: 1,
            scan_width: 64,
            scan_height: 64,
            gen_width: 16,
            gen_height: 16,
        }
    }
}

/// Texture layout and compressed cache sizing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TextureConfig {
    /// log2 of the texel block side used by the Morton texture layout
    pub block_dim: u32,
    /// log2 of the block side (in blocks) of a texture super block
    pub super_block_dim: u32,
    /// Decompressed blocks kept per compressed format
    pub cache_blocks: usize,
}

impl Default for TextureConfig {
    fn default() -> Self {
        Self {
            block_dim: 2,
            super_block_dim: 4,
            cache_blocks: crate::core::texture_cache::DEFAULT_CACHE_BLOCKS,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DebugConfig {
    /// Record vertex and fragment validation logs
    pub validation: bool,
    /// Only update state and counters on draw calls
    pub skip_batches: bool,
}

impl EmulatorConfig {
    /// Load and validate a configuration file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&content)
    }

    /// Parse and validate a configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: EmulatorConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Check the values that the emulator cannot work with
    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: String| Err(EmulatorError::InvalidConfig(msg));

        if self.memory.gpu_memory_mb == 0 || self.memory.system_memory_mb == 0 {
            return invalid("memory sizes must be non-zero".to_string());
        }

        let r = &self.raster;
        if r.gen_width == 0 || r.gen_width % STAMP_WIDTH != 0 || r.gen_height == 0 || r.gen_height % STAMP_HEIGHT != 0 {
            return invalid(format!(
                "generation tile {}x{} must be a non-zero multiple of the {}x{} stamp",
                r.gen_width, r.gen_height, STAMP_WIDTH, STAMP_HEIGHT
            ));
        }
        if r.scan_width == 0 || r.scan_width % r.gen_width != 0 || r.scan_height == 0 || r.scan_height % r.gen_height != 0 {
            return invalid(format!(
                "scan tile {}x{} must be a non-zero multiple of the generation tile {}x{}",
                r.scan_width, r.scan_height, r.gen_width, r.gen_height
            ));
        }
        if r.over_scan_width != r.over_scan_height || !r.over_scan_width.is_power_of_two() {
            return invalid(format!(
                "over-scan tile {}x{} must be square with a power of two side",
                r.over_scan_width, r.over_scan_height
            ));
        }

        let t = &self.texture;
        if t.block_dim == 0 || t.block_dim + t.super_block_dim > 12 {
            return invalid(format!(
                "texture block dimensions {}/{} out of range",
                t.block_dim, t.super_block_dim
            ));
        }
        if t.cache_blocks == 0 {
            return invalid("texture cache must hold at least one block".to_string());
        }

        Ok(())
    }
}
