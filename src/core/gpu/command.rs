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

//! Transaction dispatch: memory writes, register writes and GPU commands

use super::clear::ClearMask;
use super::dump::DumpKind;
use super::registers::{GpuCommand, GpuRegister, RegisterValue};
use super::types::*;
use super::GpuEmulator;
use crate::core::agp::AgpTransaction;
use crate::core::error::{ProtocolError, Result};

const COMPONENT: &str = "GpuEmulator";

impl GpuEmulator {
    /// Consume one AGP transaction
    ///
    /// # Arguments
    ///
    /// * `transaction` - Transaction taken over by the command processor
    ///
    /// # Returns
    ///
    /// The fatal error that stopped the transaction. Memory writes and register writes are
    /// validated before anything is modified; a failing draw call may leave the buffers
    /// partially rendered.
    pub fn process(&mut self, transaction: AgpTransaction) -> Result<()> {
        match transaction {
            AgpTransaction::Write { address, data } | AgpTransaction::Preload { address, data } => {
                log::trace!("Memory write of {} bytes at {:#010x}", data.len(), address);
                self.memory
                    .write(address, &data)
                    .map_err(|e| e.at(COMPONENT, "process_memory_write"))
            }
            AgpTransaction::RegWrite {
                register,
                sub_index,
                value,
            } => self.process_register_write(register, sub_index, value),
            AgpTransaction::Command(code) => {
                let command = GpuCommand::try_from(code).map_err(|e| e.at(COMPONENT, "process_command"))?;
                self.process_command(command)
            }
            AgpTransaction::InitEnd => {
                log::debug!("End of trace initialization");
                Ok(())
            }
            AgpTransaction::Event { event, message } => {
                log::debug!("Event {:?}: {}", event, message);
                Ok(())
            }
        }
    }

    fn process_register_write(&mut self, id: u32, sub_index: u32, value: RegisterValue) -> Result<()> {
        let register = GpuRegister::try_from(id).map_err(|e| e.at(COMPONENT, "process_register_write"))?;
        log::trace!("{}[{}] = {:?}", register.name(), sub_index, value);

        self.state.write(register, sub_index, value)?;
        self.mirror_register(register, sub_index, &value);
        Ok(())
    }

    /// Forward a committed register write to the units that keep their own copy
    fn mirror_register(&mut self, register: GpuRegister, sub_index: u32, value: &RegisterValue) {
        use GpuRegister as R;

        let index = sub_index as usize;
        match register {
            R::VertexConstant => {
                let constant = self.state.vertex_constants[index];
                self.units.shader.write_constant(ShaderTarget::Vertex, index, constant);
            }
            R::FragmentConstant => {
                let constant = self.state.fragment_constants[index];
                self.units.shader.write_constant(ShaderTarget::Fragment, index, constant);
            }
            R::VertexAttributeMap
            | R::VertexAttributeDefaultValue
            | R::StreamAddress
            | R::StreamStride
            | R::StreamData
            | R::StreamElements
            | R::StreamFrequency
            | R::StreamStart
            | R::StreamCount
            | R::StreamInstances
            | R::IndexMode
            | R::IndexStream
            | R::D3d9ColorStream
            | R::AttributeLoadBypass
            | R::TextureEnable
            | R::TextureMode
            | R::TextureAddress
            | R::TextureWidth
            | R::TextureHeight
            | R::TextureDepth
            | R::TextureWidth2
            | R::TextureHeight2
            | R::TextureDepth2
            | R::TextureBorder
            | R::TextureFormat
            | R::TextureReverse
            | R::TextureD3d9ColorConv
            | R::TextureD3d9VInvert
            | R::TextureCompression
            | R::TextureBlocking
            | R::TextureBorderColor
            | R::TextureWrapS
            | R::TextureWrapT
            | R::TextureWrapR
            | R::TextureNonNormalized
            | R::TextureMinFilter
            | R::TextureMagFilter
            | R::TextureEnableComparison
            | R::TextureComparisonFunction
            | R::TextureSrgb
            | R::TextureMinLod
            | R::TextureMaxLod
            | R::TextureLodBias
            | R::TextureMinLevel
            | R::TextureMaxLevel
            | R::TextureUnitLodBias
            | R::TextureMaxAnisotropy => {
                self.units.texture.write_register(register, sub_index, value);
            }
            R::DisplayXRes | R::DisplayYRes => {
                self.update_maps.resize(self.state.display_res_x, self.state.display_res_y);
            }
            _ => {}
        }
    }

    fn process_command(&mut self, command: GpuCommand) -> Result<()> {
        use GpuCommand as C;

        log::debug!("{} (frame {}, batch {})", command.name(), self.frame_counter(), self.batch_counter());

        match command {
            C::Reset => {
                self.reset();
                Ok(())
            }
            C::Draw => self.draw(),
            C::SwapBuffers => self.swap_buffers(),
            C::DumpColor => self.dump(DumpKind::Color),
            C::DumpDepth => self.dump(DumpKind::Depth),
            C::DumpStencil => self.dump(DumpKind::Stencil),
            C::Blit => self.blit(),
            C::ClearBuffers => self.clear(ClearMask::all()),
            C::ClearZBuffer => self.clear(ClearMask::DEPTH),
            C::ClearZStencilBuffer => self.clear(ClearMask::DEPTH | ClearMask::STENCIL),
            C::ClearColorBuffer => self.clear(ClearMask::COLOR),
            C::LoadVertexProgram => self.load_program(Some(ShaderTarget::Vertex)),
            C::LoadFragmentProgram => self.load_program(Some(ShaderTarget::Fragment)),
            C::LoadShaderProgram => self.load_program(None),
            C::FlushZStencil
            | C::FlushColor
            | C::SaveColorState
            | C::RestoreColorState
            | C::SaveZStencilState
            | C::RestoreZStencilState
            | C::ResetColorState
            | C::ResetZStencilState => {
                log::debug!("Ignoring {}", command.name());
                Ok(())
            }
        }
    }

    fn swap_buffers(&mut self) -> Result<()> {
        self.dump_frame()?;

        log::info!(
            "End of frame {} ({} batches, {} triangles so far)",
            self.frame_counter(),
            self.batch_counter(),
            self.triangle_counter()
        );

        self.next_frame();
        self.texture_caches.clear_all();
        self.update_maps.clear();
        Ok(())
    }

    /// Copy a shader program from memory into the shader unit instruction memory
    ///
    /// `target` selects the legacy vertex or fragment program registers, which also set the
    /// start PC of that target. `None` loads a unified program at the load PC register.
    fn load_program(&mut self, target: Option<ShaderTarget>) -> Result<()> {
        let s = &self.state;
        let (address, size, pc) = match target {
            Some(ShaderTarget::Vertex) => (s.vertex_program_addr, s.vertex_program_size, s.vertex_program_start_pc),
            Some(ShaderTarget::Fragment) => {
                (s.fragment_program_addr, s.fragment_program_size, s.fragment_program_start_pc)
            }
            _ => (s.program_address, s.program_size, s.program_load_pc),
        };

        let instructions = size / SHADER_INSTRUCTION_SIZE;
        if size % SHADER_INSTRUCTION_SIZE != 0 || pc + instructions > UNIFIED_INSTRUCTION_MEMORY_SIZE {
            return Err(ProtocolError::ValueOutOfRange {
                register: "GPU_SHADER_PROGRAM_SIZE",
                value: format!("{} bytes at pc {}", size, pc),
            }
            .at(COMPONENT, "load_program"));
        }

        let code = self
            .memory
            .read(address as u64, size as usize)
            .map_err(|e| e.at(COMPONENT, "load_program"))?;
        self.units.shader.load_program(pc, code);

        if let Some(target) = target {
            self.state.program_start_pc[target as usize] = pc;
        }

        log::debug!("Loaded {} instructions at pc {} from {:#010x}", instructions, pc, address);
        Ok(())
    }
}
