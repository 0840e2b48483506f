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

//! Core emulation components
//!
//! - `agp`, `trace`: transactions fed to the GPU and trace files holding them
//! - `gpu`: command processor, register file and the draw pipeline
//! - `memory`: GPU and system memory spaces
//! - `pixel_mapper`, `codec`: framebuffer layout and pixel formats
//! - `clipper`, `fragment_ops`, `texture_cache`: pipeline helpers
//! - `config`, `snapshot`, `error`: ambient support

pub mod agp;
pub mod clipper;
pub mod codec;
pub mod config;
pub mod error;
pub mod fragment_ops;
pub mod gpu;
pub mod math;
pub mod memory;
pub mod pixel_mapper;
pub mod snapshot;
pub mod texture_cache;
pub mod trace;

// Re-export commonly used types
pub use agp::AgpTransaction;
pub use config::EmulatorConfig;
pub use error::{EmulatorError, ProtocolError, Result};
pub use gpu::{GpuEmulator, Units};
pub use memory::Memory;
pub use trace::{TraceDriver, TraceReader, VecTrace};
