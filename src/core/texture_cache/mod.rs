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

//! Compressed texture data caches
//!
//! Texel addresses produced by the texture unit carry a texture address space tag in their
//! top byte that names the storage format of the texel data:
//!
//! | Top byte | Space                      |
//! |----------|----------------------------|
//! | `0x00`   | Uncompressed (direct read) |
//! | `0x10`   | DXT1 RGB                   |
//! | `0x20`   | DXT1 RGBA                  |
//! | `0x30`   | DXT3 RGBA                  |
//! | `0x40`   | DXT5 RGBA                  |
//! | `0x50`   | LATC1                      |
//! | `0x60`   | LATC1 signed               |
//! | `0x70`   | LATC2                      |
//! | `0x80`   | LATC2 signed               |
//!
//! A compressed space address is the address the texel would have in the decompressed
//! image. The compressed data lives at that address shifted right by the compression ratio.
//!
//! # Cache Organization
//!
//! Each compressed format owns a [`CompressedTextureCache`] holding whole decompressed
//! blocks in a fixed capacity arena. There is no replacement policy: when a miss finds the
//! arena full every block is dropped at once. All caches are also flushed at the start of
//! every frame.
//!
//! # Example
//!
//! ```
//! use attila_emu::core::memory::Memory;
//! use attila_emu::core::texture_cache::{TextureCaches, COMPRESSED_TEXTURE_SPACE_LATC1};
//!
//! let mut memory = Memory::new(4096, 16).unwrap();
//! // LATC1 block at 0x100: l0 = 255, all codes 0
//! memory.write(0x100, &[255, 0, 0, 0, 0, 0, 0, 0]).unwrap();
//!
//! let mut caches = TextureCaches::new(16);
//! let mut texel = [0u8; 1];
//! caches.read_texel(&memory, COMPRESSED_TEXTURE_SPACE_LATC1 | (0x100 << 1), &mut texel).unwrap();
//! assert_eq!(texel, [255]);
//! ```

pub mod decompress;

use std::collections::HashMap;

use log::trace;

use crate::core::error::ProtocolError;
use crate::core::memory::Memory;

pub const UNCOMPRESSED_TEXTURE_SPACE: u64 = 0x0000_0000_0000_0000;
pub const COMPRESSED_TEXTURE_SPACE_DXT1_RGB: u64 = 0x1000_0000_0000_0000;
pub const COMPRESSED_TEXTURE_SPACE_DXT1_RGBA: u64 = 0x2000_0000_0000_0000;
pub const COMPRESSED_TEXTURE_SPACE_DXT3_RGBA: u64 = 0x3000_0000_0000_0000;
pub const COMPRESSED_TEXTURE_SPACE_DXT5_RGBA: u64 = 0x4000_0000_0000_0000;
pub const COMPRESSED_TEXTURE_SPACE_LATC1: u64 = 0x5000_0000_0000_0000;
pub const COMPRESSED_TEXTURE_SPACE_LATC1_SIGNED: u64 = 0x6000_0000_0000_0000;
pub const COMPRESSED_TEXTURE_SPACE_LATC2: u64 = 0x7000_0000_0000_0000;
pub const COMPRESSED_TEXTURE_SPACE_LATC2_SIGNED: u64 = 0x8000_0000_0000_0000;

/// Reserved address that reads as a black (all zero) texel
pub const BLACK_TEXEL_ADDRESS: u64 = 0x00ff_ffff_ffff_ffff;

/// Mask of the texture address space tag
pub const TEXTURE_ADDRESS_SPACE_MASK: u64 = 0xff00_0000_0000_0000;

/// Default number of decompressed blocks kept per format
pub const DEFAULT_CACHE_BLOCKS: usize = 4096;

/// Block decoder: compressed block in, decompressed block out
pub type BlockDecoder = fn(&[u8], &mut [u8]);

/// Decompress-on-miss cache for one compressed texture format
pub struct CompressedTextureCache {
    name: &'static str,
    /// Bytes in one decompressed block
    block_size: usize,
    /// Address bits inside a decompressed block
    block_mask: u64,
    /// log2 of the decompressed / compressed size ratio
    ratio_shift: u32,
    capacity: usize,
    decoder: BlockDecoder,
    /// Decompressed blocks, `capacity * block_size` bytes once full
    data: Vec<u8>,
    /// Block base address -> slot in `data`
    blocks: HashMap<u64, usize>,
    hits: u64,
    misses: u64,
}

impl CompressedTextureCache {
    /// Create an empty cache
    ///
    /// # Arguments
    ///
    /// * `name` - Format name used in diagnostics
    /// * `capacity` - Maximum number of cached blocks
    /// * `block_size` - Decompressed block size in bytes (a power of two)
    /// * `ratio_shift` - Compression ratio as a shift
    /// * `decoder` - Block decompression function
    pub fn new(
        name: &'static str,
        capacity: usize,
        block_size: usize,
        ratio_shift: u32,
        decoder: BlockDecoder,
    ) -> Self {
        Self {
            name,
            block_size,
            block_mask: block_size as u64 - 1,
            ratio_shift,
            capacity: capacity.max(1),
            decoder,
            data: Vec::new(),
            blocks: HashMap::new(),
            hits: 0,
            misses: 0,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Number of blocks currently cached
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// (hits, misses) since creation
    pub fn stats(&self) -> (u64, u64) {
        (self.hits, self.misses)
    }

    /// Read decompressed texel data
    ///
    /// On a miss the compressed block is read from `memory`, decompressed and inserted.
    /// A miss on a full cache drops every cached block first.
    ///
    /// # Arguments
    ///
    /// * `memory` - Emulated memory holding the compressed data
    /// * `address` - Decompressed space address with the space tag removed
    /// * `out` - Destination; its length is the number of bytes to read and the read must
    ///   stay inside one block
    pub fn read_data(&mut self, memory: &Memory, address: u64, out: &mut [u8]) -> Result<(), ProtocolError> {
        let base = address & !self.block_mask;
        let offset = (address & self.block_mask) as usize;

        if offset + out.len() > self.block_size {
            return Err(ProtocolError::AddressOverflow {
                space: self.name,
                offset: address,
                size: out.len(),
                limit: self.block_size,
            });
        }

        let slot = match self.blocks.get(&base) {
            Some(&slot) => {
                self.hits += 1;
                slot
            }
            None => {
                self.misses += 1;
                self.fill(memory, base)?
            }
        };

        let start = slot * self.block_size + offset;
        out.copy_from_slice(&self.data[start..start + out.len()]);
        Ok(())
    }

    fn fill(&mut self, memory: &Memory, base: u64) -> Result<usize, ProtocolError> {
        let compressed = memory.read(base >> self.ratio_shift, self.block_size >> self.ratio_shift)?;

        if self.blocks.len() >= self.capacity {
            trace!("{} texture cache full, flushing {} blocks", self.name, self.blocks.len());
            self.clear();
        }

        let slot = self.blocks.len();
        let start = slot * self.block_size;
        if self.data.len() < start + self.block_size {
            self.data.resize(start + self.block_size, 0);
        }
        (self.decoder)(compressed, &mut self.data[start..start + self.block_size]);
        self.blocks.insert(base, slot);
        Ok(slot)
    }

    /// Drop every cached block
    pub fn clear(&mut self) {
        self.blocks.clear();
    }
}

/// The eight compressed texture caches behind one texel read entry point
pub struct TextureCaches {
    dxt1_rgb: CompressedTextureCache,
    dxt1_rgba: CompressedTextureCache,
    dxt3_rgba: CompressedTextureCache,
    dxt5_rgba: CompressedTextureCache,
    latc1: CompressedTextureCache,
    latc1_signed: CompressedTextureCache,
    latc2: CompressedTextureCache,
    latc2_signed: CompressedTextureCache,
}

impl TextureCaches {
    /// Decompressed DXT block: 16 RGBA8 texels
    const DXT_BLOCK_SIZE: usize = 64;
    /// Decompressed LATC1 block: 16 single byte texels
    const LATC1_BLOCK_SIZE: usize = 16;
    /// Decompressed LATC2 block: 16 two byte texels
    const LATC2_BLOCK_SIZE: usize = 32;

    const DXT1_RATIO_SHIFT: u32 = 3;
    const DXT3_DXT5_RATIO_SHIFT: u32 = 2;
    const LATC_RATIO_SHIFT: u32 = 1;

    /// Create the caches, each holding up to `blocks` decompressed blocks
    pub fn new(blocks: usize) -> Self {
        use decompress::*;

        let dxt = |name: &'static str, shift: u32, decoder: BlockDecoder| {
            CompressedTextureCache::new(name, blocks, Self::DXT_BLOCK_SIZE, shift, decoder)
        };
        let latc1 = |name: &'static str, decoder: BlockDecoder| {
            CompressedTextureCache::new(name, blocks, Self::LATC1_BLOCK_SIZE, Self::LATC_RATIO_SHIFT, decoder)
        };
        let latc2 = |name: &'static str, decoder: BlockDecoder| {
            CompressedTextureCache::new(name, blocks, Self::LATC2_BLOCK_SIZE, Self::LATC_RATIO_SHIFT, decoder)
        };

        Self {
            dxt1_rgb: dxt("DXT1_RGB", Self::DXT1_RATIO_SHIFT, decode_dxt1_rgb),
            dxt1_rgba: dxt("DXT1_RGBA", Self::DXT1_RATIO_SHIFT, decode_dxt1_rgba),
            dxt3_rgba: dxt("DXT3_RGBA", Self::DXT3_DXT5_RATIO_SHIFT, decode_dxt3_rgba),
            dxt5_rgba: dxt("DXT5_RGBA", Self::DXT3_DXT5_RATIO_SHIFT, decode_dxt5_rgba),
            latc1: latc1("LATC1", decode_latc1),
            latc1_signed: latc1("LATC1_SIGNED", decode_latc1_signed),
            latc2: latc2("LATC2", decode_latc2),
            latc2_signed: latc2("LATC2_SIGNED", decode_latc2_signed),
        }
    }

    fn cache_for(&mut self, space: u64) -> Option<&mut CompressedTextureCache> {
        match space {
            COMPRESSED_TEXTURE_SPACE_DXT1_RGB => Some(&mut self.dxt1_rgb),
            COMPRESSED_TEXTURE_SPACE_DXT1_RGBA => Some(&mut self.dxt1_rgba),
            COMPRESSED_TEXTURE_SPACE_DXT3_RGBA => Some(&mut self.dxt3_rgba),
            COMPRESSED_TEXTURE_SPACE_DXT5_RGBA => Some(&mut self.dxt5_rgba),
            COMPRESSED_TEXTURE_SPACE_LATC1 => Some(&mut self.latc1),
            COMPRESSED_TEXTURE_SPACE_LATC1_SIGNED => Some(&mut self.latc1_signed),
            COMPRESSED_TEXTURE_SPACE_LATC2 => Some(&mut self.latc2),
            COMPRESSED_TEXTURE_SPACE_LATC2_SIGNED => Some(&mut self.latc2_signed),
            _ => None,
        }
    }

    /// Read the data of one texel
    ///
    /// # Arguments
    ///
    /// * `memory` - Emulated memory
    /// * `address` - Texel address including its texture space tag
    /// * `out` - Destination, sized to the texel's bytes
    ///
    /// # Returns
    ///
    /// `InvalidAddressSpace` for an unknown space tag, or the memory access error
    pub fn read_texel(&mut self, memory: &Memory, address: u64, out: &mut [u8]) -> Result<(), ProtocolError> {
        if address == BLACK_TEXEL_ADDRESS {
            out.fill(0);
            return Ok(());
        }

        let space = address & TEXTURE_ADDRESS_SPACE_MASK;
        let offset = address & !TEXTURE_ADDRESS_SPACE_MASK;

        if space == UNCOMPRESSED_TEXTURE_SPACE {
            out.copy_from_slice(memory.read(offset, out.len())?);
            return Ok(());
        }

        match self.cache_for(space) {
            Some(cache) => cache.read_data(memory, offset, out),
            None => Err(ProtocolError::InvalidAddressSpace { address }),
        }
    }

    fn all_mut(&mut self) -> [&mut CompressedTextureCache; 8] {
        [
            &mut self.dxt1_rgb,
            &mut self.dxt1_rgba,
            &mut self.dxt3_rgba,
            &mut self.dxt5_rgba,
            &mut self.latc1,
            &mut self.latc1_signed,
            &mut self.latc2,
            &mut self.latc2_signed,
        ]
    }

    /// Flush every cache (start of a new frame)
    pub fn clear_all(&mut self) {
        for cache in self.all_mut() {
            cache.clear();
        }
    }

    /// Total cached blocks across all formats
    pub fn cached_blocks(&self) -> usize {
        [
            &self.dxt1_rgb,
            &self.dxt1_rgba,
            &self.dxt3_rgba,
            &self.dxt5_rgba,
            &self.latc1,
            &self.latc1_signed,
            &self.latc2,
            &self.latc2_signed,
        ]
        .iter()
        .map(|c| c.len())
        .sum()
    }
}

impl Default for TextureCaches {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_BLOCKS)
    }
}
