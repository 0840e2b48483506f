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

//! Snapshot save and restore through the emulator

use super::*;
use crate::core::error::EmulatorError;

#[test]
fn test_snapshot_round_trip() {
    let dir = tempfile::tempdir().unwrap();

    let mut gpu = detached();
    set_display(&mut gpu, 32, 16);
    reg(&mut gpu, GpuRegister::Culling, 0, RegisterValue::Culling(CullingMode::Front)).unwrap();
    gpu.process(AgpTransaction::write(SCRATCH, vec![0xde, 0xad, 0xbe, 0xef])).unwrap();
    cmd(&mut gpu, GpuCommand::SwapBuffers).unwrap();
    cmd(&mut gpu, GpuCommand::SwapBuffers).unwrap();
    gpu.save_snapshot(dir.path()).unwrap();

    let mut restored = detached();
    restored.load_snapshot(dir.path()).unwrap();

    assert_eq!(restored.state(), gpu.state());
    assert_eq!(restored.state().display_res_x, 32);
    assert_eq!(restored.state().cull_mode, CullingMode::Front);
    assert_eq!(restored.frame_counter(), 2);
    assert_eq!(restored.memory().read(SCRATCH as u64, 4).unwrap(), &[0xde, 0xad, 0xbe, 0xef]);
}

#[test]
fn test_snapshot_restores_over_later_changes() {
    let dir = tempfile::tempdir().unwrap();

    let mut gpu = detached();
    gpu.save_snapshot(dir.path()).unwrap();

    reg(&mut gpu, GpuRegister::DisplayXRes, 0, RegisterValue::Uint(8)).unwrap();
    gpu.process(AgpTransaction::write(SCRATCH, vec![1u8; 4])).unwrap();
    gpu.load_snapshot(dir.path()).unwrap();

    assert_eq!(gpu.state(), &GpuState::new());
    assert_eq!(gpu.memory().read(SCRATCH as u64, 4).unwrap(), &[0u8; 4]);
}

#[test]
fn test_snapshot_memory_size_mismatch() {
    let dir = tempfile::tempdir().unwrap();
    detached().save_snapshot(dir.path()).unwrap();

    let mut larger = config();
    larger.memory.gpu_memory_mb = 16;
    let mut gpu = GpuEmulator::new(&larger, Units::detached()).unwrap();
    reg(&mut gpu, GpuRegister::DisplayXRes, 0, RegisterValue::Uint(8)).unwrap();

    let err = gpu.load_snapshot(dir.path()).unwrap_err();
    assert!(matches!(err, EmulatorError::Snapshot(_)));
    assert_eq!(gpu.state().display_res_x, 8);
}

#[test]
fn test_missing_snapshot_is_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = detached().load_snapshot(dir.path().join("missing")).unwrap_err();
    assert!(matches!(err, EmulatorError::Io(_)));
}
