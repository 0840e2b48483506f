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

//! Debug dumps of the color, depth and stencil buffers
//!
//! Buffers are converted to top-down RGBA8 images and handed to a [`FrameSink`]. Encoding
//! the image to a file is left to the sink.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use image::RgbaImage;

use crate::core::codec;
use crate::core::error::{EmulatorError, Result};

use super::types::*;
use super::GpuEmulator;

const COMPONENT: &str = "GpuEmulator";

/// Buffer selected for a dump
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DumpKind {
    Color,
    Depth,
    Stencil,
}

impl DumpKind {
    pub fn name(self) -> &'static str {
        match self {
            DumpKind::Color => "frame",
            DumpKind::Depth => "depth",
            DumpKind::Stencil => "stencil",
        }
    }
}

/// Top-down RGBA8 image of a buffer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameImage {
    pub kind: DumpKind,
    pub frame: u32,
    /// Batch of a mid-frame dump, `None` for the end of frame dump
    pub batch: Option<u32>,
    pub width: u32,
    pub height: u32,
    /// `width * height` RGBA8 pixels, first row at the top
    pub data: Vec<u8>,
}

impl FrameImage {
    /// RGBA bytes of an image pixel
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let i = ((y * self.width + x) * 4) as usize;
        Some([self.data[i], self.data[i + 1], self.data[i + 2], self.data[i + 3]])
    }

    /// File name used when the image is saved, e.g. `frame0003.png`
    pub fn file_name(&self) -> String {
        match self.batch {
            None => format!("{}{:04}.png", self.kind.name(), self.frame),
            Some(batch) => format!("{}{:04}-batch{:05}.png", self.kind.name(), self.frame, batch),
        }
    }
}

/// Receiver of buffer dumps
pub trait FrameSink {
    fn write_frame(&mut self, image: FrameImage) -> Result<()>;
}

/// Sink keeping every image in memory
///
/// Clones share the same storage, so a clone can be handed to the emulator and the
/// original inspected afterwards.
#[derive(Debug, Clone, Default)]
pub struct VecSink {
    frames: Arc<Mutex<Vec<FrameImage>>>,
}

impl VecSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Images received so far
    pub fn frames(&self) -> Vec<FrameImage> {
        match self.frames.lock() {
            Ok(frames) => frames.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl FrameSink for VecSink {
    fn write_frame(&mut self, image: FrameImage) -> Result<()> {
        match self.frames.lock() {
            Ok(mut frames) => frames.push(image),
            Err(poisoned) => poisoned.into_inner().push(image),
        }
        Ok(())
    }
}

/// Sink encoding every image as a PNG file in a directory
#[derive(Debug, Clone)]
pub struct PngSink {
    dir: PathBuf,
}

impl PngSink {
    /// Create the sink, creating `dir` if needed
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }
}

impl FrameSink for PngSink {
    fn write_frame(&mut self, image: FrameImage) -> Result<()> {
        let path = self.dir.join(image.file_name());
        let buffer = RgbaImage::from_raw(image.width, image.height, image.data)
            .ok_or_else(|| EmulatorError::Image(format!("{}: pixel data does not match size", path.display())))?;
        buffer
            .save(&path)
            .map_err(|e| EmulatorError::Image(format!("{}: {e}", path.display())))?;
        log::debug!("Wrote {}", path.display());
        Ok(())
    }
}

impl GpuEmulator {
    /// Push a mid-frame dump of a buffer to the frame sink, if any
    pub(in crate::core::gpu) fn dump(&mut self, kind: DumpKind) -> Result<()> {
        self.push_dump(kind, false)
    }

    /// Push the end of frame dump of the back buffer
    pub(in crate::core::gpu) fn dump_frame(&mut self) -> Result<()> {
        self.push_dump(DumpKind::Color, true)
    }

    fn push_dump(&mut self, kind: DumpKind, end_of_frame: bool) -> Result<()> {
        if self.frame_sink.is_none() {
            log::debug!("No frame sink, {} dump dropped", kind.name());
            return Ok(());
        }

        let mut image = self.frame_image(kind)?;
        if end_of_frame {
            image.batch = None;
        }
        if let Some(sink) = self.frame_sink.as_mut() {
            sink.write_frame(image)?;
        }
        Ok(())
    }

    /// Convert the back buffer, depth or stencil values into an image
    ///
    /// Multisampled color buffers are resolved. Depth and stencil use the first sample.
    /// Depth is spread over the color channels, most significant byte in red; stencil is
    /// written as gray.
    pub fn frame_image(&mut self, kind: DumpKind) -> Result<FrameImage> {
        let (width, height) = (self.state.display_res_x, self.state.display_res_y);
        let samples = self.sample_count() as usize;
        let flip = !self.state.d3d9_pixel_coordinates;

        let (base, format, bpp) = match kind {
            DumpKind::Color => {
                self.setup_color_mapper(0)?;
                let format = self.state.rt_format[0];
                let bpp = codec::bytes_per_pixel(format).map_err(|e| e.at(COMPONENT, "frame_image"))?;
                (self.state.rt_address[0] as u64, format, bpp)
            }
            DumpKind::Depth | DumpKind::Stencil => {
                self.setup_zstencil_mapper()?;
                (self.state.zstencil_buffer_addr as u64, TextureFormat::Rgba8888, 4)
            }
        };
        let mapper = match kind {
            DumpKind::Color => &self.color_mappers[0],
            _ => &self.zstencil_mapper,
        };

        let mut data = vec![0u8; width as usize * height as usize * 4];
        let mut colors = Vec::with_capacity(samples);

        for y in 0..height {
            let row = if flip { height - 1 - y } else { y };
            for x in 0..width {
                let address = base + mapper.compute_address(x, y) as u64;
                let bytes = self
                    .memory
                    .read(address, samples * bpp)
                    .map_err(|e| e.at(COMPONENT, "frame_image"))?;

                let pixel = match kind {
                    DumpKind::Color => {
                        colors.clear();
                        for sample in bytes.chunks_exact(bpp) {
                            colors.push(codec::decode_color(format, sample).map_err(|e| e.at(COMPONENT, "frame_image"))?);
                        }
                        codec::rgba32f_to_rgba8(&codec::resolve_samples(&colors))
                    }
                    DumpKind::Depth => [bytes[2], bytes[1], bytes[0], 255],
                    DumpKind::Stencil => [bytes[3], bytes[3], bytes[3], 255],
                };

                let i = (row as usize * width as usize + x as usize) * 4;
                data[i..i + 4].copy_from_slice(&pixel);
            }
        }

        Ok(FrameImage {
            kind,
            frame: self.frame_counter(),
            batch: Some(self.batch_counter()),
            width,
            height,
            data,
        })
    }
}
