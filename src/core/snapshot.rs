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

//! Snapshot save and restore
//!
//! A snapshot is a directory holding three files:
//!
//! - `state.snapshot`: bincode encoded [`SnapshotHeader`] (version, metadata, register file)
//! - `gpu_memory.snapshot`: raw contents of GPU memory
//! - `system_memory.snapshot`: raw contents of system memory
//!
//! # Version Compatibility
//!
//! Snapshots carry a version number; loading a snapshot with a different version fails.
//! Memory sizes recorded in the header must match the emulator memory before anything is
//! restored.

use std::fs;
use std::path::Path;

use bincode::{config, Decode, Encode};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::error::{EmulatorError, Result};
use crate::core::gpu::GpuState;
use crate::core::memory::{Memory, MemorySelector};

/// Snapshot format version
pub const SNAPSHOT_VERSION: u32 = 1;

pub const STATE_FILE: &str = "state.snapshot";
pub const GPU_MEMORY_FILE: &str = "gpu_memory.snapshot";
pub const SYSTEM_MEMORY_FILE: &str = "system_memory.snapshot";

/// Information about when a snapshot was taken
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Encode, Decode)]
#[bincode(encode_bounds = "", decode_bounds = "")]
pub struct SnapshotMetadata {
    #[bincode(with_serde)]
    pub timestamp: DateTime<Utc>,

    pub frame: u32,
    pub batch: u32,

    /// Sizes of the memory files, checked before restoring
    pub gpu_memory_bytes: u64,
    pub system_memory_bytes: u64,
}

/// Contents of the state file
#[derive(Debug, Clone, PartialEq, Encode, Decode)]
pub struct SnapshotHeader {
    pub version: u32,
    pub metadata: SnapshotMetadata,
    pub state: GpuState,
}

impl SnapshotHeader {
    pub fn new(state: GpuState, frame: u32, batch: u32) -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            metadata: SnapshotMetadata {
                timestamp: Utc::now(),
                frame,
                batch,
                gpu_memory_bytes: 0,
                system_memory_bytes: 0,
            },
            state,
        }
    }
}

/// Write a snapshot into `dir`, creating it if needed
///
/// # Arguments
///
/// * `dir` - Snapshot directory
/// * `header` - Register file and counters; memory sizes are filled in from `memory`
/// * `memory` - Both memory spaces
pub fn save(dir: &Path, header: &SnapshotHeader, memory: &Memory) -> Result<()> {
    fs::create_dir_all(dir)?;

    let mut header = header.clone();
    header.metadata.gpu_memory_bytes = memory.gpu().len() as u64;
    header.metadata.system_memory_bytes = memory.system().len() as u64;

    let encoded = bincode::encode_to_vec(&header, config::standard())
        .map_err(|e| EmulatorError::Snapshot(format!("encoding state: {e}")))?;

    fs::write(dir.join(STATE_FILE), encoded)?;
    fs::write(dir.join(GPU_MEMORY_FILE), memory.gpu().as_bytes())?;
    fs::write(dir.join(SYSTEM_MEMORY_FILE), memory.system().as_bytes())?;
    Ok(())
}

/// Read a snapshot from `dir`, restoring both memory spaces into `memory`
///
/// # Returns
///
/// The decoded header. `memory` is left untouched when any check fails.
///
/// # Errors
///
/// Returns error if:
/// - a file cannot be read
/// - the state file cannot be decoded
/// - the version is incompatible
/// - a memory file size does not match the emulator memory
pub fn load(dir: &Path, memory: &mut Memory) -> Result<SnapshotHeader> {
    let buffer = fs::read(dir.join(STATE_FILE))?;
    let (header, _): (SnapshotHeader, usize) = bincode::decode_from_slice(&buffer, config::standard())
        .map_err(|e| EmulatorError::Snapshot(format!("decoding state: {e}")))?;

    if header.version != SNAPSHOT_VERSION {
        return Err(EmulatorError::Snapshot(format!(
            "incompatible snapshot version: expected {}, got {}",
            SNAPSHOT_VERSION, header.version
        )));
    }

    let gpu = fs::read(dir.join(GPU_MEMORY_FILE))?;
    let system = fs::read(dir.join(SYSTEM_MEMORY_FILE))?;

    let check = |name: &str, data: &[u8], recorded: u64, expected: usize| {
        if data.len() as u64 != recorded || data.len() != expected {
            return Err(EmulatorError::Snapshot(format!(
                "{name} memory is {} bytes (recorded {recorded}), emulator has {expected}",
                data.len()
            )));
        }
        Ok(())
    };
    check("gpu", &gpu, header.metadata.gpu_memory_bytes, memory.gpu().len())?;
    check("system", &system, header.metadata.system_memory_bytes, memory.system().len())?;

    memory
        .space_mut(MemorySelector::Gpu)
        .load_bytes(&gpu)
        .map_err(|e| e.at("snapshot", "load"))?;
    memory
        .space_mut(MemorySelector::System)
        .load_bytes(&system)
        .map_err(|e| e.at("snapshot", "load"))?;

    Ok(header)
}
