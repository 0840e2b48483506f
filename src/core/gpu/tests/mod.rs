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

//! GPU module tests
//!
//! Tests are organized into the following modules:
//! - `basic`: construction, reset, counters and accessors
//! - `registers`: register writes through the command processor and mirroring into units
//! - `commands`: command dispatch, program loads, swaps and the run loop
//! - `clear`: color and depth/stencil clears, blits and dumps
//! - `pipeline`: draw calls through the mock units
//! - `texture`: texture requests from fragment shading
//! - `snapshot`: snapshot save and restore
//!
//! `mocks` holds the rasterizer, shader and texture units the pipeline tests drive.

mod basic;
mod pipeline;
mod snapshot;

use crate::core::agp::AgpTransaction;
use crate::core::config::EmulatorConfig;
use crate::core::error::Result;

use super::*;
use mocks::Mocks;

/// Address of the vertex position stream used by the pipeline tests
pub const POSITION_STREAM: u32 = 0x0010_0000;
/// Address of the vertex color stream used by the pipeline tests
pub const COLOR_STREAM: u32 = 0x0011_0000;
/// Free GPU memory for textures and programs
pub const SCRATCH: u32 = 0x0070_0000;

pub fn config() -> EmulatorConfig {
    let mut config = EmulatorConfig::default();
    config.memory.gpu_memory_mb = 8;
    config.memory.system_memory_mb = 1;
    config
}

pub fn detached() -> GpuEmulator {
    GpuEmulator::new(&config(), Units::detached()).unwrap()
}

pub fn mocked() -> (GpuEmulator, Mocks) {
    let (units, mocks) = mocks::mock_units(SCRATCH as u64);
    (GpuEmulator::new(&config(), units).unwrap(), mocks)
}

pub fn reg(gpu: &mut GpuEmulator, register: GpuRegister, sub_index: u32, value: RegisterValue) -> Result<()> {
    gpu.process(AgpTransaction::reg_write(register, sub_index, value))
}

pub fn cmd(gpu: &mut GpuEmulator, command: GpuCommand) -> Result<()> {
    gpu.process(AgpTransaction::command(command))
}

/// Display, viewport and scissor rectangle of `width`x`height` at the origin
pub fn set_display(gpu: &mut GpuEmulator, width: u32, height: u32) {
    use GpuRegister as R;
    for (register, value) in [
        (R::DisplayXRes, width),
        (R::DisplayYRes, height),
        (R::ViewportWidth, width),
        (R::ViewportHeight, height),
        (R::ScissorWidth, width),
        (R::ScissorHeight, height),
    ] {
        reg(gpu, register, 0, RegisterValue::Uint(value)).unwrap();
    }
}

fn floats_to_bytes(values: &[QuadFloat]) -> Vec<u8> {
    values.iter().flatten().flat_map(|f| f.to_le_bytes()).collect()
}

/// Load a non-indexed triangle list with a position and a color per vertex
///
/// Positions go to stream 0 (POSITION), colors to stream 1 (COLOR). The fragment shader
/// receives the interpolated color.
pub fn load_triangles(gpu: &mut GpuEmulator, positions: &[QuadFloat], colors: &[QuadFloat]) {
    use GpuRegister as R;

    gpu.process(AgpTransaction::write(POSITION_STREAM, floats_to_bytes(positions))).unwrap();
    gpu.process(AgpTransaction::write(COLOR_STREAM, floats_to_bytes(colors))).unwrap();

    for (stream, address) in [(0, POSITION_STREAM), (1, COLOR_STREAM)] {
        reg(gpu, R::StreamAddress, stream, RegisterValue::Uint(address)).unwrap();
        reg(gpu, R::StreamStride, stream, RegisterValue::Uint(16)).unwrap();
        reg(gpu, R::StreamData, stream, RegisterValue::StreamData(StreamData::Float32)).unwrap();
        reg(gpu, R::StreamElements, stream, RegisterValue::Uint(4)).unwrap();
    }
    reg(gpu, R::VertexAttributeMap, COLOR_ATTRIBUTE as u32, RegisterValue::Uint(1)).unwrap();
    reg(gpu, R::FragmentInputAttributes, COLOR_ATTRIBUTE as u32, RegisterValue::Bool(true)).unwrap();
    reg(gpu, R::StreamCount, 0, RegisterValue::Uint(positions.len() as u32)).unwrap();
}

/// Counter-clockwise triangle covering the lower left half of the viewport
pub const LOWER_LEFT: [QuadFloat; 3] = [[-1.0, -1.0, 0.0, 1.0], [1.0, -1.0, 0.0, 1.0], [-1.0, 1.0, 0.0, 1.0]];

pub const RED: QuadFloat = [1.0, 0.0, 0.0, 1.0];
pub const GREEN: QuadFloat = [0.0, 1.0, 0.0, 1.0];

/// 16x16 display with the lower left triangle in `color` loaded
pub fn triangle_scene(gpu: &mut GpuEmulator, color: QuadFloat) {
    set_display(gpu, 16, 16);
    load_triangles(gpu, &LOWER_LEFT, &[color; 3]);
}

/// Pixels of the 16x16 lower left triangle: centers with x + y + 1 <= 16
pub const LOWER_LEFT_PIXELS: usize = 136;

pub fn covered(x: u32, y: u32) -> bool {
    x + y < 16
}
