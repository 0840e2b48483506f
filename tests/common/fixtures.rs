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

//! Test fixtures for common test scenarios

use std::cell::Cell;
use std::collections::HashMap;
use std::rc::Rc;

use attila_emu::core::agp::AgpTransaction;
use attila_emu::core::config::EmulatorConfig;
use attila_emu::core::gpu::units::{Bank, DecodedInstruction, Fragment, ShadedVertex, Stamp, TextureAccess, TriangleId};
use attila_emu::core::gpu::*;

/// Small memory configuration shared by the integration tests
#[allow(dead_code)]
pub fn small_config() -> EmulatorConfig {
    let mut config = EmulatorConfig::default();
    config.memory.gpu_memory_mb = 8;
    config.memory.system_memory_mb = 1;
    config
}

/// Emulator without rasterizer, shader or texture unit
#[allow(dead_code)]
pub fn detached_gpu() -> GpuEmulator {
    GpuEmulator::new(&small_config(), Units::detached()).expect("Failed to create emulator")
}

/// Register write transaction
#[allow(dead_code)]
pub fn reg(register: GpuRegister, sub_index: u32, value: RegisterValue) -> AgpTransaction {
    AgpTransaction::reg_write(register, sub_index, value)
}

/// Transactions setting display, viewport and scissor to `width`x`height`
#[allow(dead_code)]
pub fn display_setup(width: u32, height: u32) -> Vec<AgpTransaction> {
    use GpuRegister as R;
    [
        (R::DisplayXRes, width),
        (R::DisplayYRes, height),
        (R::ViewportWidth, width),
        (R::ViewportHeight, height),
        (R::ScissorWidth, width),
        (R::ScissorHeight, height),
    ]
    .into_iter()
    .map(|(register, value)| reg(register, 0, RegisterValue::Uint(value)))
    .collect()
}

/// Transactions loading a non-indexed triangle list of positions at `address`
#[allow(dead_code)]
pub fn triangle_list(address: u32, positions: &[QuadFloat]) -> Vec<AgpTransaction> {
    use GpuRegister as R;
    let bytes: Vec<u8> = positions.iter().flatten().flat_map(|f| f.to_le_bytes()).collect();
    vec![
        AgpTransaction::write(address, bytes),
        reg(R::StreamAddress, 0, RegisterValue::Uint(address)),
        reg(R::StreamStride, 0, RegisterValue::Uint(16)),
        reg(R::StreamData, 0, RegisterValue::StreamData(StreamData::Float32)),
        reg(R::StreamElements, 0, RegisterValue::Uint(4)),
        reg(R::StreamCount, 0, RegisterValue::Uint(positions.len() as u32)),
    ]
}

/// Rasterizer that only counts set up triangles; it never produces fragments
#[derive(Debug, Default)]
pub struct CountingRasterizer {
    pub setups: Rc<Cell<u32>>,
}

impl Rasterizer for CountingRasterizer {
    fn set_viewport(&mut self, _: bool, _: i32, _: i32, _: u32, _: u32) {}
    fn set_scissor(&mut self, _: u32, _: u32, _: bool, _: i32, _: i32, _: u32, _: u32) {}
    fn set_depth_range(&mut self, _: bool, _: f32, _: f32) {}
    fn set_polygon_offset(&mut self, _: f32, _: f32) {}
    fn set_depth_precision(&mut self, _: u32) {}
    fn set_face_mode(&mut self, _: FaceMode) {}
    fn set_d3d9_rasterization_rules(&mut self, _: bool) {}

    fn setup(&mut self, _: &ShadedVertex, _: &ShadedVertex, _: &ShadedVertex) -> TriangleId {
        self.setups.set(self.setups.get() + 1);
        TriangleId(self.setups.get())
    }

    fn triangle_area(&self, _: TriangleId) -> f64 {
        1.0
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

type Registers = [QuadFloat; MAX_VERTEX_ATTRIBUTES];

/// Shader unit running a one instruction program that copies inputs to outputs
#[derive(Debug, Default)]
pub struct PassthroughShader {
    inputs: HashMap<u32, Registers>,
    outputs: HashMap<u32, Registers>,
    pub executed: Rc<Cell<u64>>,
}

impl ShaderUnit for PassthroughShader {
    fn load_program(&mut self, _: u32, _: &[u8]) {}
    fn write_constant(&mut self, _: ShaderTarget, _: usize, _: QuadFloat) {}

    fn reset_shader_state(&mut self, thread: u32) {
        self.inputs.remove(&thread);
        self.outputs.remove(&thread);
    }

    fn load_shader_state(&mut self, thread: u32, bank: Bank, data: &[QuadFloat]) {
        let target = match bank {
            Bank::Input => self.inputs.entry(thread).or_insert([[0.0; 4]; MAX_VERTEX_ATTRIBUTES]),
            Bank::Output => self.outputs.entry(thread).or_insert([[0.0; 4]; MAX_VERTEX_ATTRIBUTES]),
        };
        for (t, d) in target.iter_mut().zip(data) {
            *t = *d;
        }
    }

    fn set_thread_pc(&mut self, _: u32, _: u32) {}

    fn fetch_shader_instruction(&mut self, thread: u32, pc: u32) -> DecodedInstruction {
        DecodedInstruction {
            thread,
            pc,
            end: true,
            opaque: 0,
        }
    }

    fn exec_shader_instruction(&mut self, instruction: &DecodedInstruction) {
        let inputs = self.inputs.get(&instruction.thread).copied().unwrap_or([[0.0; 4]; MAX_VERTEX_ATTRIBUTES]);
        self.outputs.insert(instruction.thread, inputs);
        self.executed.set(self.executed.get() + 1);
    }

    fn check_jump(&mut self, _: &DecodedInstruction, _: u32) -> Option<u32> {
        None
    }

    fn read_shader_state(&self, thread: u32, bank: Bank, data: &mut [QuadFloat]) {
        let source = match bank {
            Bank::Input => self.inputs.get(&thread),
            Bank::Output => self.outputs.get(&thread),
        };
        if let Some(source) = source {
            for (d, s) in data.iter_mut().zip(source) {
                *d = *s;
            }
        }
    }

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

/// Emulator with the counting rasterizer and the pass-through shader
///
/// Returns the emulator with the rasterizer setup counter and the shader execution counter.
#[allow(dead_code)]
pub fn geometry_gpu() -> (GpuEmulator, Rc<Cell<u32>>, Rc<Cell<u64>>) {
    let rasterizer = CountingRasterizer::default();
    let shader = PassthroughShader::default();
    let setups = Rc::clone(&rasterizer.setups);
    let executed = Rc::clone(&shader.executed);

    let units = Units::new(Box::new(rasterizer), Box::new(shader), Box::new(Detached));
    let gpu = GpuEmulator::new(&small_config(), units).expect("Failed to create emulator");
    (gpu, setups, executed)
}
