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

//! ATTILA GPU emulator core library
//!
//! This library emulates the command processor of the ATTILA GPU and drives a draw call
//! through its pipeline: streaming, primitive assembly, clipping, rasterization, fragment
//! shading, texturing, z/stencil test and color write. The rasterizer, shader and texture
//! units are provided by the embedder through the traits in [`core::gpu::units`].
//!
//! # Example
//!
//! ```
//! use attila_emu::core::agp::AgpTransaction;
//! use attila_emu::core::config::EmulatorConfig;
//! use attila_emu::core::gpu::{GpuCommand, GpuEmulator, GpuRegister, RegisterValue, Units};
//!
//! let mut gpu = GpuEmulator::new(&EmulatorConfig::default(), Units::detached()).unwrap();
//!
//! gpu.process(AgpTransaction::reg_write(GpuRegister::DisplayXRes, 0, RegisterValue::Uint(64)))
//!     .unwrap();
//! gpu.process(AgpTransaction::command(GpuCommand::ClearColorBuffer)).unwrap();
//! gpu.process(AgpTransaction::command(GpuCommand::SwapBuffers)).unwrap();
//!
//! assert_eq!(gpu.frame_counter(), 1);
//! ```

pub mod core;
