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

//! Construction, reset, counters and accessors

use super::*;
use crate::core::error::EmulatorError;

#[test]
fn test_new_emulator_has_reset_state() {
    let gpu = detached();

    assert_eq!(gpu.state(), &GpuState::new());
    assert_eq!(gpu.memory().gpu().len(), 8 * 1024 * 1024);
    assert_eq!(gpu.memory().system().len(), 1024 * 1024);
    assert!(gpu.memory().gpu().as_bytes().iter().all(|&b| b == 0));
}

#[test]
fn test_counters_start_at_zero() {
    let gpu = detached();

    assert_eq!(gpu.frame_counter(), 0);
    assert_eq!(gpu.batch_counter(), 0);
    assert_eq!(gpu.triangle_counter(), 0);
    assert_eq!(gpu.stats(), &PipelineStats::default());
}

#[test]
fn test_invalid_config_is_rejected() {
    let mut config = config();
    config.raster.scan_width = 40;

    let err = GpuEmulator::new(&config, Units::detached()).unwrap_err();
    assert!(matches!(err, EmulatorError::InvalidConfig(_)));
}

#[test]
fn test_reset_keeps_memory_and_counters() {
    let mut gpu = detached();
    set_display(&mut gpu, 64, 64);
    gpu.memory_mut().write(0x100, &[7; 4]).unwrap();
    cmd(&mut gpu, GpuCommand::SwapBuffers).unwrap();

    gpu.reset();

    assert_eq!(gpu.state().display_res_x, DEFAULT_DISPLAY_RES);
    assert_eq!(gpu.memory().read(0x100, 4).unwrap(), &[7u8; 4]);
    assert_eq!(gpu.frame_counter(), 1);
}

#[test]
fn test_reset_resets_texture_unit() {
    let (mut gpu, mocks) = mocked();
    let before = mocks.texture.borrow().resets;

    cmd(&mut gpu, GpuCommand::Reset).unwrap();
    assert_eq!(mocks.texture.borrow().resets, before + 1);
}

#[test]
fn test_update_maps_follow_display_size() {
    let mut gpu = detached();
    assert_eq!(gpu.z_stencil_update_map().width(), DEFAULT_DISPLAY_RES);

    set_display(&mut gpu, 32, 16);
    assert_eq!(gpu.z_stencil_update_map().width(), 32);
    assert_eq!(gpu.color_update_map(7).map(UpdateMap::height), Some(16));
    assert!(gpu.color_update_map(8).is_none());
}

#[test]
fn test_validation_toggle() {
    let mut gpu = detached();
    assert!(gpu.validation().is_none());

    gpu.set_validation(true);
    assert_eq!(gpu.validation().map(ValidationLog::vertex_count), Some(0));

    gpu.set_validation(false);
    assert!(gpu.validation().is_none());
}

#[test]
fn test_validation_from_config() {
    let mut config = config();
    config.debug.validation = true;
    config.debug.skip_batches = true;

    let gpu = GpuEmulator::new(&config, Units::detached()).unwrap();
    assert!(gpu.validation().is_some());
    assert!(gpu.skip_batches());
}

#[test]
fn test_abort_handle_is_shared() {
    let gpu = detached();
    let a = gpu.abort_handle();
    let b = gpu.abort_handle();

    a.store(true, std::sync::atomic::Ordering::Relaxed);
    assert!(b.load(std::sync::atomic::Ordering::Relaxed));
}

#[test]
fn test_debug_output_names_counters() {
    let gpu = detached();
    let text = format!("{:?}", gpu);
    assert!(text.contains("GpuEmulator"));
    assert!(text.contains("frame_counter"));
}
