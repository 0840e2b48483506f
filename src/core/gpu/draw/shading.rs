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

//! Shader program execution for vertices and fragment stamps

use super::COMPONENT;
use crate::core::error::{ProtocolError, Result};
use crate::core::gpu::registers::GpuRegister;
use crate::core::gpu::types::*;
use crate::core::gpu::units::{Bank, ShadedFragment};
use crate::core::gpu::GpuEmulator;

impl GpuEmulator {
    /// Run the loaded program on threads `0..threads` until every thread ends
    ///
    /// Threads advance in lock step, one instruction per round. Texture requests raised by
    /// a round are served before jumps are resolved.
    pub(super) fn execute_program(&mut self, threads: u32, start_pc: u32, target: ShaderTarget) -> Result<()> {
        let mut pcs = vec![start_pc; threads as usize];
        let mut done = vec![false; threads as usize];
        for thread in 0..threads {
            self.units.shader.set_thread_pc(thread, start_pc);
        }

        let mut round = Vec::with_capacity(threads as usize);
        while done.iter().any(|d| !d) {
            round.clear();
            for thread in 0..threads {
                let t = thread as usize;
                if done[t] {
                    continue;
                }
                if pcs[t] >= UNIFIED_INSTRUCTION_MEMORY_SIZE {
                    let register = match target {
                        ShaderTarget::Vertex => GpuRegister::VertexProgramPc,
                        _ => GpuRegister::FragmentProgramPc,
                    };
                    return Err(ProtocolError::ValueOutOfRange {
                        register: register.name(),
                        value: pcs[t].to_string(),
                    }
                    .at(COMPONENT, "execute_program"));
                }

                let instruction = self.units.shader.fetch_shader_instruction(thread, pcs[t]);
                self.units.shader.exec_shader_instruction(&instruction);
                round.push(instruction);
            }

            self.emulate_texture_requests(target == ShaderTarget::Vertex)?;

            for instruction in &round {
                let t = instruction.thread as usize;
                match self.units.shader.check_jump(instruction, threads) {
                    Some(target_pc) => pcs[t] = target_pc,
                    None if instruction.end => done[t] = true,
                    None => pcs[t] = instruction.pc + 1,
                }
            }
        }

        Ok(())
    }

    /// Run the fragment program on a stamp, one thread per fragment
    ///
    /// The attributes of every fragment are replaced by the program outputs. Fragments
    /// whose thread executed a kill are culled.
    pub(super) fn emulate_fragment_shading(&mut self, quad: &mut [ShadedFragment; STAMP_FRAGMENTS]) -> Result<()> {
        let start_pc = self.state.program_start_pc[ShaderTarget::Fragment as usize];

        for (thread, fragment) in quad.iter().enumerate() {
            self.units.shader.reset_shader_state(thread as u32);
            self.units.shader.load_shader_state(thread as u32, Bank::Input, &fragment.attributes);
        }

        self.execute_program(STAMP_FRAGMENTS as u32, start_pc, ShaderTarget::Fragment)?;

        for (thread, fragment) in quad.iter_mut().enumerate() {
            self.units
                .shader
                .read_shader_state(thread as u32, Bank::Output, &mut fragment.attributes);
            if self.units.shader.thread_kill(thread as u32) {
                fragment.culled = true;
            }
        }

        self.stats.stamps_shaded += 1;
        self.stats.fragments_shaded += STAMP_FRAGMENTS as u64;
        Ok(())
    }
}
