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

//! AGP bus transactions
//!
//! One [`AgpTransaction`] is one unit of bus traffic delivered to the GPU command
//! processor: a memory write, a register write, a command or a marker with no effect.

use serde::{Deserialize, Serialize};

use crate::core::gpu::{GpuCommand, GpuEvent, GpuRegister, RegisterValue};

/// Unit of work consumed by [`GpuEmulator::process`](crate::core::gpu::GpuEmulator::process)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AgpTransaction {
    /// Copy `data` to a bus address
    Write { address: u32, data: Vec<u8> },
    /// Same as `Write`; preloads bypass timing on the real bus
    Preload { address: u32, data: Vec<u8> },
    /// Write a GPU register; `register` is the raw bus register id
    RegWrite {
        register: u32,
        sub_index: u32,
        value: RegisterValue,
    },
    /// Issue a GPU command by raw command code
    Command(u32),
    /// End of the trace initialization phase
    InitEnd,
    /// Event signal, carries no state change
    Event { event: GpuEvent, message: String },
}

impl AgpTransaction {
    pub fn write(address: u32, data: impl Into<Vec<u8>>) -> Self {
        AgpTransaction::Write {
            address,
            data: data.into(),
        }
    }

    pub fn reg_write(register: GpuRegister, sub_index: u32, value: RegisterValue) -> Self {
        AgpTransaction::RegWrite {
            register: register.id(),
            sub_index,
            value,
        }
    }

    pub fn command(command: GpuCommand) -> Self {
        AgpTransaction::Command(command.code())
    }

    /// Short name of the transaction kind for logs
    pub fn kind(&self) -> &'static str {
        match self {
            AgpTransaction::Write { .. } => "WRITE",
            AgpTransaction::Preload { .. } => "PRELOAD",
            AgpTransaction::RegWrite { .. } => "REG_WRITE",
            AgpTransaction::Command(_) => "COMMAND",
            AgpTransaction::InitEnd => "INIT_END",
            AgpTransaction::Event { .. } => "EVENT",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constructors_use_bus_codes() {
        let reg = AgpTransaction::reg_write(GpuRegister::DisplayXRes, 0, RegisterValue::Uint(64));
        assert_eq!(
            reg,
            AgpTransaction::RegWrite {
                register: GpuRegister::DisplayXRes.id(),
                sub_index: 0,
                value: RegisterValue::Uint(64),
            }
        );
        assert_eq!(
            AgpTransaction::command(GpuCommand::SwapBuffers),
            AgpTransaction::Command(GpuCommand::SwapBuffers.code())
        );
        assert_eq!(AgpTransaction::write(0x10, [1u8, 2]).kind(), "WRITE");
    }
}
