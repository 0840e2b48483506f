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

//! GPU command processor and draw pipeline
//!
//! [`GpuEmulator`] owns everything the GPU touches: the register file, the two memory
//! spaces, the compressed texture caches and the framebuffer address mappers. It consumes
//! AGP transactions one at a time ([`GpuEmulator::process`]) and runs a draw call to
//! completion before returning.
//!
//! # Draw Pipeline
//!
//! ```text
//! setup_draw ─► streamer ─► primitive assembly ─► per triangle:
//!     trivial reject ─► setup + face culling ─► per stamp:
//!         fragment culling ─► attributes ─► [early Z] ─► shading ─► [late Z] ─► color write
//! ```
//!
//! The streamer, assembly and rasterization stages run once per instance. Rasterization,
//! shading and texture sampling math live in external units (see [`units`]); everything
//! between them, including every memory access, happens here.
//!
//! # Errors
//!
//! Every error is fatal for the run: the pipeline stops at the first failure and the error
//! carries the component and operation that detected it.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::core::agp::AgpTransaction;
use crate::core::config::{EmulatorConfig, TextureConfig};
use crate::core::error::Result;
use crate::core::memory::Memory;
use crate::core::pixel_mapper::{PixelMapper, TileGeometry};
use crate::core::snapshot::{self, SnapshotHeader};
use crate::core::texture_cache::TextureCaches;
use crate::core::trace::TraceDriver;

// Module declarations
mod clear;
mod command;
mod draw;
mod dump;
mod registers;
mod state;
#[cfg(test)]
mod tests;
mod types;
pub mod units;
mod validation;

// Public re-exports
pub use crate::core::fragment_ops::{FragmentOpEmulator, FragmentOps};
pub use clear::ClearMask;
pub use draw::PipelineStats;
pub use dump::{DumpKind, FrameImage, FrameSink, PngSink, VecSink};
pub use registers::{GpuCommand, GpuEvent, GpuRegister, RegisterValue};
pub use state::{
    GpuState, DEFAULT_BACK_BUFFER_ADDR, DEFAULT_DISPLAY_RES, DEFAULT_FRONT_BUFFER_ADDR,
    DEFAULT_ZSTENCIL_BUFFER_ADDR,
};
pub use types::*;
pub use units::{Detached, Rasterizer, ShaderUnit, TextureUnit, Units};
pub use validation::{ColorRecord, FragmentKey, UpdateMap, ValidationLog, VertexRecord, ZStencilRecord};

/// Why [`GpuEmulator::run`] returned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The trace driver ran out of transactions
    EndOfTrace,
    /// The requested number of frames was swapped
    FrameLimit,
    /// The abort flag was raised
    Aborted,
}

/// Summary of a [`GpuEmulator::run`] call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunOutcome {
    pub transactions: u64,
    pub frames: u32,
    pub reason: StopReason,
}

/// Functional emulator of the GPU command processor and draw pipeline
///
/// # Examples
///
/// ```
/// use attila_emu::core::agp::AgpTransaction;
/// use attila_emu::core::config::EmulatorConfig;
/// use attila_emu::core::gpu::{GpuCommand, GpuEmulator, GpuRegister, RegisterValue, Units};
///
/// let mut config = EmulatorConfig::default();
/// config.memory.gpu_memory_mb = 8;
/// config.memory.system_memory_mb = 1;
/// let mut gpu = GpuEmulator::new(&config, Units::detached()).unwrap();
///
/// gpu.process(AgpTransaction::command(GpuCommand::Reset)).unwrap();
/// gpu.process(AgpTransaction::reg_write(GpuRegister::DisplayXRes, 0, RegisterValue::Uint(64)))
///     .unwrap();
/// assert_eq!(gpu.state().display_res_x, 64);
/// ```
pub struct GpuEmulator {
    /// Architectural register file
    pub(in crate::core::gpu) state: GpuState,

    /// GPU local and system memory
    pub(in crate::core::gpu) memory: Memory,

    /// External rasterizer, shader and texture units plus the fragment operation unit
    pub(in crate::core::gpu) units: Units,

    /// One decompression cache per compressed texture format
    pub(in crate::core::gpu) texture_caches: TextureCaches,

    /// Address mapping of each render target, configured by `setup_draw`
    pub(in crate::core::gpu) color_mappers: [PixelMapper; MAX_RENDER_TARGETS],

    /// Address mapping of the depth/stencil buffer
    pub(in crate::core::gpu) zstencil_mapper: PixelMapper,

    /// Framebuffer tiling geometry from the configuration
    pub(in crate::core::gpu) geometry: TileGeometry,

    /// Texture layout used by the blitter
    pub(in crate::core::gpu) texture_config: TextureConfig,

    /// Vertices shaded in the current draw call and instance
    pub(in crate::core::gpu) vertex_cache: draw::VertexCache,

    /// Vertex indices in submission order for primitive assembly
    pub(in crate::core::gpu) index_list: Vec<u32>,

    pub(in crate::core::gpu) stats: PipelineStats,

    /// Recorded inputs and outputs for cross checking, when enabled
    pub(in crate::core::gpu) validation: Option<ValidationLog>,

    /// Pixels written since the last swap
    pub(in crate::core::gpu) update_maps: validation::UpdateMaps,

    /// Receives color, depth and stencil dumps
    pub(in crate::core::gpu) frame_sink: Option<Box<dyn FrameSink>>,

    frame_counter: u32,
    batch_counter: u32,
    triangle_counter: u64,

    /// Draw calls only advance the counters
    skip_batches: bool,

    abort: Arc<AtomicBool>,
}

impl GpuEmulator {
    /// Create an emulator with freshly allocated memory and reset registers
    ///
    /// # Arguments
    ///
    /// * `config` - Memory sizes, tiling geometry, texture layout and debug switches
    /// * `units` - External units driven by the draw pipeline
    ///
    /// # Returns
    ///
    /// An allocation error when a memory space cannot be reserved, or a configuration
    /// error when `config` does not validate.
    pub fn new(config: &EmulatorConfig, units: Units) -> Result<Self> {
        config.validate()?;

        let memory = Memory::new(
            config.memory.gpu_memory_bytes(),
            config.memory.system_memory_bytes(),
        )?;

        log::info!(
            "GPU emulator: {} MiB GPU memory, {} MiB system memory",
            config.memory.gpu_memory_mb,
            config.memory.system_memory_mb
        );

        let mut gpu = Self {
            state: GpuState::new(),
            memory,
            units,
            texture_caches: TextureCaches::new(config.texture.cache_blocks),
            color_mappers: std::array::from_fn(|_| PixelMapper::new()),
            zstencil_mapper: PixelMapper::new(),
            geometry: TileGeometry::from_raster(&config.raster),
            texture_config: config.texture.clone(),
            vertex_cache: draw::VertexCache::default(),
            index_list: Vec::new(),
            stats: PipelineStats::default(),
            validation: config.debug.validation.then(ValidationLog::default),
            update_maps: validation::UpdateMaps::default(),
            frame_sink: None,
            frame_counter: 0,
            batch_counter: 0,
            triangle_counter: 0,
            skip_batches: config.debug.skip_batches,
            abort: Arc::new(AtomicBool::new(false)),
        };
        gpu.reset();
        Ok(gpu)
    }

    /// Reset the register file and the texture unit
    ///
    /// Memory contents and counters are kept.
    pub fn reset(&mut self) {
        self.state.reset();
        self.units.texture.reset();
        self.update_maps.resize(self.state.display_res_x, self.state.display_res_y);
    }

    /// Register file
    pub fn state(&self) -> &GpuState {
        &self.state
    }

    pub fn memory(&self) -> &Memory {
        &self.memory
    }

    pub fn memory_mut(&mut self) -> &mut Memory {
        &mut self.memory
    }

    pub fn units_mut(&mut self) -> &mut Units {
        &mut self.units
    }

    /// Swapped frames since creation
    pub fn frame_counter(&self) -> u32 {
        self.frame_counter
    }

    /// Draw calls since the last swap
    pub fn batch_counter(&self) -> u32 {
        self.batch_counter
    }

    /// Triangles assembled since creation
    pub fn triangle_counter(&self) -> u64 {
        self.triangle_counter
    }

    /// Work done by the draw pipeline since creation
    pub fn stats(&self) -> &PipelineStats {
        &self.stats
    }

    pub fn texture_caches(&self) -> &TextureCaches {
        &self.texture_caches
    }

    pub fn set_skip_batches(&mut self, skip: bool) {
        self.skip_batches = skip;
    }

    pub fn skip_batches(&self) -> bool {
        self.skip_batches
    }

    /// Start or stop recording validation logs
    pub fn set_validation(&mut self, enable: bool) {
        match (enable, self.validation.is_some()) {
            (true, false) => self.validation = Some(ValidationLog::default()),
            (false, true) => self.validation = None,
            _ => {}
        }
    }

    pub fn validation(&self) -> Option<&ValidationLog> {
        self.validation.as_ref()
    }

    /// Route color, depth and stencil dumps to `sink`
    pub fn set_frame_sink(&mut self, sink: Box<dyn FrameSink>) {
        self.frame_sink = Some(sink);
    }

    pub fn take_frame_sink(&mut self) -> Option<Box<dyn FrameSink>> {
        self.frame_sink.take()
    }

    /// Pixels of the depth/stencil buffer written since the last swap
    pub fn z_stencil_update_map(&self) -> &UpdateMap {
        self.update_maps.z_stencil()
    }

    /// Pixels of a render target written since the last swap
    pub fn color_update_map(&self, rt: usize) -> Option<&UpdateMap> {
        self.update_maps.color(rt)
    }

    /// Shared flag that stops [`run`](Self::run) before the next transaction
    pub fn abort_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.abort)
    }

    /// Process transactions from a trace until it ends, `max_frames` frames were swapped
    /// or the abort flag is raised
    ///
    /// The abort flag is only checked between transactions, never inside a draw call.
    pub fn run(&mut self, trace: &mut dyn TraceDriver, max_frames: Option<u32>) -> Result<RunOutcome> {
        let start_frame = self.frame_counter;
        let mut transactions = 0u64;

        let reason = loop {
            if self.abort.load(Ordering::Relaxed) {
                log::info!("Run aborted after {} transactions", transactions);
                break StopReason::Aborted;
            }

            let Some(transaction) = trace.next_transaction()? else {
                break StopReason::EndOfTrace;
            };
            self.process(transaction)?;
            transactions += 1;

            if let Some(max) = max_frames {
                if self.frame_counter - start_frame >= max {
                    break StopReason::FrameLimit;
                }
            }
        };

        Ok(RunOutcome {
            transactions,
            frames: self.frame_counter - start_frame,
            reason,
        })
    }

    /// Write the register file and both memory spaces to `dir`
    pub fn save_snapshot(&self, dir: impl AsRef<Path>) -> Result<()> {
        let header = SnapshotHeader::new(self.state.clone(), self.frame_counter, self.batch_counter);
        snapshot::save(dir.as_ref(), &header, &self.memory)?;
        log::info!("Snapshot saved to {} at frame {}", dir.as_ref().display(), self.frame_counter);
        Ok(())
    }

    /// Write what a stopped run leaves behind
    ///
    /// `validation.json` lands in `validation_dir` when validation is on, the snapshot in
    /// `snapshot_dir` when one is given.
    pub fn save_run_outputs(&self, validation_dir: &Path, snapshot_dir: Option<&Path>) -> Result<()> {
        if let Some(log) = &self.validation {
            log.save_json(validation_dir.join("validation.json"))?;
        }
        if let Some(dir) = snapshot_dir {
            self.save_snapshot(dir)?;
        }
        Ok(())
    }

    /// Restore the register file and both memory spaces from `dir`
    ///
    /// The memory spaces must have the sizes recorded in the snapshot. Compressed texture
    /// caches are flushed since memory changed under them.
    pub fn load_snapshot(&mut self, dir: impl AsRef<Path>) -> Result<()> {
        let header = snapshot::load(dir.as_ref(), &mut self.memory)?;
        self.state = header.state;
        self.frame_counter = header.metadata.frame;
        self.batch_counter = header.metadata.batch;
        self.texture_caches.clear_all();
        self.update_maps.resize(self.state.display_res_x, self.state.display_res_y);
        log::info!("Snapshot loaded from {} at frame {}", dir.as_ref().display(), self.frame_counter);
        Ok(())
    }

    pub(in crate::core::gpu) fn next_frame(&mut self) {
        self.frame_counter += 1;
        self.batch_counter = 0;
    }

    pub(in crate::core::gpu) fn next_batch(&mut self) {
        self.batch_counter += 1;
    }

    pub(in crate::core::gpu) fn count_triangle(&mut self) -> u64 {
        let id = self.triangle_counter;
        self.triangle_counter += 1;
        id
    }
}

impl std::fmt::Debug for GpuEmulator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GpuEmulator")
            .field("frame_counter", &self.frame_counter)
            .field("batch_counter", &self.batch_counter)
            .field("triangle_counter", &self.triangle_counter)
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}
