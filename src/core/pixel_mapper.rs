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

//! Pixel to memory address mapping
//!
//! Framebuffers are stored tiled. From outermost to innermost level:
//!
//! 1. **Over-scan tiles** in row order across the display
//! 2. **Scan sub-tiles**: with multisampling (or 8 byte pixels) a scan tile is split in
//!    sub-tiles and equal sub-tiles of all scan tiles in an over-scan tile are grouped
//! 3. **Scan tiles** in Morton order inside the over-scan tile
//! 4. **Generation tiles** in row order inside the (sub-)scan tile
//! 5. **Stamps** in row order inside the generation tile
//! 6. **Pixels** in row order inside the stamp
//! 7. **Samples**, then bytes, inside the pixel
//!
//! Each level's dimensions are counted in units of the level below it.

use crate::core::config::RasterConfig;
use crate::core::error::ProtocolError;
use crate::core::gpu::{STAMP_HEIGHT, STAMP_WIDTH};
use crate::core::math::morton;

/// Tile dimensions of every tiling level
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileGeometry {
    /// Pixels per stamp
    pub stamp_width: u32,
    pub stamp_height: u32,
    /// Stamps per generation tile
    pub gen_width: u32,
    pub gen_height: u32,
    /// Generation tiles per scan tile
    pub scan_width: u32,
    pub scan_height: u32,
    /// Scan tiles per over-scan tile
    pub over_width: u32,
    pub over_height: u32,
}

impl TileGeometry {
    /// Derive the geometry from the pixel sized raster configuration
    pub fn from_raster(raster: &RasterConfig) -> Self {
        Self {
            stamp_width: STAMP_WIDTH,
            stamp_height: STAMP_HEIGHT,
            gen_width: raster.gen_width / STAMP_WIDTH,
            gen_height: raster.gen_height / STAMP_HEIGHT,
            scan_width: raster.scan_width / raster.gen_width,
            scan_height: raster.scan_height / raster.gen_height,
            over_width: raster.over_scan_width,
            over_height: raster.over_scan_height,
        }
    }
}

impl Default for TileGeometry {
    fn default() -> Self {
        Self::from_raster(&RasterConfig::default())
    }
}

/// Maps framebuffer pixel coordinates to byte offsets
#[derive(Debug, Clone, Default)]
pub struct PixelMapper {
    width: u32,
    height: u32,
    samples: u32,
    bytes_per_sample: u32,
    geometry: TileGeometry,

    over_tile_pixel_width: u32,
    over_tile_pixel_height: u32,
    over_tile_row_width: u32,
    over_tile_rows: u32,
    over_tile_size: u32,

    scan_tile_pixel_width: u32,
    scan_tile_pixel_height: u32,
    scan_tile_size: u32,

    scan_sub_tile_width: u32,
    scan_sub_tile_height: u32,
    scan_sub_tile_size: u32,
    scan_sub_tile_pixel_width: u32,
    scan_sub_tile_pixel_height: u32,

    gen_adj_tile_width: u32,
    gen_adj_tile_height: u32,
    gen_adj_tile_size: u32,
    gen_adj_tile_pixel_width: u32,
    gen_adj_tile_pixel_height: u32,

    stamp_tile_size: u32,
}

impl PixelMapper {
    pub fn new() -> Self {
        Self::default()
    }

    /// Configure the mapping for a framebuffer
    ///
    /// # Arguments
    ///
    /// * `width`, `height` - Display resolution in pixels
    /// * `geometry` - Tile dimensions
    /// * `samples` - Samples per pixel (1, 2, 4 or 8)
    /// * `bytes_per_sample` - Bytes per sample (4 or 8)
    ///
    /// # Returns
    ///
    /// An error when the generation tile is too small to be split for the requested sample
    /// count or pixel size.
    pub fn setup_display(
        &mut self,
        width: u32,
        height: u32,
        geometry: &TileGeometry,
        samples: u32,
        bytes_per_sample: u32,
    ) -> Result<(), ProtocolError> {
        let g = *geometry;
        let too_small = |what: &str| ProtocolError::ValueOutOfRange {
            register: "PixelMapper::setup_display",
            value: format!("{what} ({}x{} stamp generation tile)", g.gen_width, g.gen_height),
        };

        let (mut sub_w, mut sub_h) = (1, 1);
        let (mut adj_w, mut adj_h) = (g.gen_width, g.gen_height);

        match samples {
            1 => {}
            2 => {
                sub_w = 2;
                if adj_w < 2 {
                    return Err(too_small("2x MSAA needs 2 stamp wide generation tiles"));
                }
                adj_w /= 2;
            }
            4 => {
                sub_w = 2;
                sub_h = 2;
                if adj_w < 2 || adj_h < 2 {
                    return Err(too_small("4x MSAA needs 2x2 stamp generation tiles"));
                }
                adj_w /= 2;
                adj_h /= 2;
            }
            8 => {
                sub_w = 4;
                sub_h = 2;
                if adj_w < 4 || adj_h < 2 {
                    return Err(too_small("8x MSAA needs 4x2 stamp generation tiles"));
                }
                adj_w /= 4;
                adj_h /= 2;
            }
            _ => {
                return Err(ProtocolError::ValueOutOfRange {
                    register: "PixelMapper::setup_display",
                    value: format!("{samples} samples per pixel"),
                })
            }
        }

        if bytes_per_sample == 8 {
            sub_h *= 2;
            if adj_h < 2 {
                return Err(too_small("8 byte pixels need 2 stamp high generation tiles"));
            }
            adj_h /= 2;
        }

        self.width = width;
        self.height = height;
        self.samples = samples;
        self.bytes_per_sample = bytes_per_sample;
        self.geometry = g;

        self.over_tile_pixel_width = g.over_width * g.scan_width * g.gen_width * g.stamp_width;
        self.over_tile_pixel_height = g.over_height * g.scan_height * g.gen_height * g.stamp_height;
        self.over_tile_size = g.over_width * g.over_height;

        self.scan_tile_pixel_width = g.scan_width * g.gen_width * g.stamp_width;
        self.scan_tile_pixel_height = g.scan_height * g.gen_height * g.stamp_height;
        self.scan_tile_size = g.scan_width * g.scan_height;

        self.scan_sub_tile_width = sub_w;
        self.scan_sub_tile_height = sub_h;
        self.scan_sub_tile_size = sub_w * sub_h;
        self.scan_sub_tile_pixel_width = g.scan_width * adj_w * g.stamp_width;
        self.scan_sub_tile_pixel_height = g.scan_height * adj_h * g.stamp_height;

        self.gen_adj_tile_width = adj_w;
        self.gen_adj_tile_height = adj_h;
        self.gen_adj_tile_size = adj_w * adj_h;
        self.gen_adj_tile_pixel_width = adj_w * g.stamp_width;
        self.gen_adj_tile_pixel_height = adj_h * g.stamp_height;

        self.stamp_tile_size = g.stamp_width * g.stamp_height;

        self.change_resolution(width, height);
        Ok(())
    }

    /// Change the display resolution keeping the tile configuration
    pub fn change_resolution(&mut self, width: u32, height: u32) {
        self.width = width;
        self.height = height;
        self.over_tile_row_width = width.div_ceil(self.over_tile_pixel_width.max(1));
        self.over_tile_rows = height.div_ceil(self.over_tile_pixel_height.max(1));
    }

    /// Byte offset of pixel `(x, y)` (sample 0, byte 0) from the buffer start
    pub fn compute_address(&self, x: u32, y: u32) -> u32 {
        let g = &self.geometry;

        let x_over = x / self.over_tile_pixel_width;
        let y_over = y / self.over_tile_pixel_height;
        let mut address = y_over * self.over_tile_row_width + x_over;

        let x_scan = (x / self.scan_tile_pixel_width) % g.over_width;
        let y_scan = (y / self.scan_tile_pixel_height) % g.over_height;
        let x_sub = (x / self.scan_sub_tile_pixel_width) % self.scan_sub_tile_width;
        let y_sub = (y / self.scan_sub_tile_pixel_height) % self.scan_sub_tile_height;

        address = address * self.scan_sub_tile_size + y_sub * self.scan_sub_tile_width + x_sub;
        address = address * self.over_tile_size + morton(g.over_width, x_scan, y_scan);

        let x_gen = (x / self.gen_adj_tile_pixel_width) % g.scan_width;
        let y_gen = (y / self.gen_adj_tile_pixel_height) % g.scan_height;
        address = address * self.scan_tile_size + y_gen * g.scan_width + x_gen;

        let x_stamp = (x / g.stamp_width) % self.gen_adj_tile_width;
        let y_stamp = (y / g.stamp_height) % self.gen_adj_tile_height;
        address = address * self.gen_adj_tile_size + y_stamp * self.gen_adj_tile_width + x_stamp;

        let x_pixel = x % g.stamp_width;
        let y_pixel = y % g.stamp_height;
        address = address * self.stamp_tile_size + y_pixel * g.stamp_width + x_pixel;

        address * self.samples * self.bytes_per_sample
    }

    /// Bytes covered by the whole framebuffer, rounded up to whole over-scan tiles
    pub fn frame_buffer_size(&self) -> u32 {
        self.over_tile_row_width
            * self.over_tile_rows
            * self.over_tile_pixel_width
            * self.over_tile_pixel_height
            * self.samples
            * self.bytes_per_sample
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn samples(&self) -> u32 {
        self.samples
    }

    pub fn bytes_per_sample(&self) -> u32 {
        self.bytes_per_sample
    }

    /// Bytes of one pixel including all of its samples
    pub fn bytes_per_pixel(&self) -> u32 {
        self.samples * self.bytes_per_sample
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::HashSet;

    fn mapper(width: u32, height: u32, samples: u32, bytes: u32) -> PixelMapper {
        let mut m = PixelMapper::new();
        m.setup_display(width, height, &TileGeometry::default(), samples, bytes)
            .unwrap();
        m
    }

    #[test]
    fn test_first_stamp_layout() {
        let m = mapper(64, 64, 1, 4);
        assert_eq!(m.compute_address(0, 0), 0);
        assert_eq!(m.compute_address(1, 0), 4);
        assert_eq!(m.compute_address(0, 1), 8);
        assert_eq!(m.compute_address(1, 1), 12);
        // Next stamp to the right
        assert_eq!(m.compute_address(2, 0), 16);
    }

    #[test]
    fn test_frame_buffer_rounds_to_over_tiles() {
        let m = mapper(400, 400, 1, 4);
        // 64x64 over-scan tiles: 7x7 tiles of 4 KiB pixels
        assert_eq!(m.frame_buffer_size(), 7 * 7 * 64 * 64 * 4);
    }

    #[test]
    fn test_unsupported_sample_count() {
        let mut m = PixelMapper::new();
        assert!(m.setup_display(64, 64, &TileGeometry::default(), 3, 4).is_err());
    }

    #[test]
    fn test_small_generation_tile_rejects_msaa() {
        let geometry = TileGeometry {
            gen_width: 1,
            gen_height: 1,
            ..TileGeometry::default()
        };
        let mut m = PixelMapper::new();
        assert!(m.setup_display(64, 64, &geometry, 4, 4).is_err());
        assert!(m.setup_display(64, 64, &geometry, 1, 8).is_err());
        assert!(m.setup_display(64, 64, &geometry, 1, 4).is_ok());
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(24))]

        #[test]
        fn prop_addresses_are_unique_and_in_bounds(
            width in 1u32..150,
            height in 1u32..150,
            samples in prop_oneof![Just(1u32), Just(2), Just(4), Just(8)],
            bytes in prop_oneof![Just(4u32), Just(8)],
        ) {
            let m = mapper(width, height, samples, bytes);
            let size = m.frame_buffer_size();
            let mut seen = HashSet::new();
            for y in 0..height {
                for x in 0..width {
                    let address = m.compute_address(x, y);
                    prop_assert_eq!(address % (samples * bytes), 0);
                    prop_assert!(address + samples * bytes <= size);
                    prop_assert!(seen.insert(address), "duplicate address for ({}, {})", x, y);
                }
            }
        }
    }
}
