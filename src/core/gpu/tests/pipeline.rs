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

//! Draw calls through the mock units
//!
//! Most tests render the counter-clockwise lower left triangle on a 16x16 display. With
//! the mock rasterizer it touches 64 stamps, 36 of them with at least one covered pixel,
//! and covers the 136 pixels with `x + y < 16`.

use super::*;
use crate::core::error::{EmulatorError, ProtocolError, TopologyError};
use crate::core::gpu::draw::{assemble_triangles, convert_stream_element, face_culling, FaceCulling};
use crate::core::pixel_mapper::{PixelMapper, TileGeometry};

const RED_PIXEL: [u8; 4] = [255, 0, 0, 255];
const BLACK_PIXEL: [u8; 4] = [0, 0, 0, 0];

/// Clockwise version of the lower left triangle
const LOWER_LEFT_CW: [QuadFloat; 3] = [LOWER_LEFT[0], LOWER_LEFT[2], LOWER_LEFT[1]];

fn draw(gpu: &mut GpuEmulator) {
    cmd(gpu, GpuCommand::Draw).unwrap();
}

/// Stored bytes of one back buffer pixel with `bytes` bytes per pixel
fn read_pixel_bytes(gpu: &GpuEmulator, x: u32, y: u32, bytes: u32) -> Vec<u8> {
    let mut mapper = PixelMapper::new();
    mapper
        .setup_display(16, 16, &TileGeometry::from_raster(&config().raster), 1, bytes)
        .unwrap();
    let address = DEFAULT_BACK_BUFFER_ADDR as u64 + mapper.compute_address(x, y) as u64;
    gpu.memory().read(address, bytes as usize).unwrap().to_vec()
}

fn read_pixel(gpu: &GpuEmulator, x: u32, y: u32) -> [u8; 4] {
    let bytes = read_pixel_bytes(gpu, x, y, 4);
    [bytes[0], bytes[1], bytes[2], bytes[3]]
}

fn read_depth(gpu: &GpuEmulator, x: u32, y: u32) -> u32 {
    let mut mapper = PixelMapper::new();
    mapper
        .setup_display(16, 16, &TileGeometry::from_raster(&config().raster), 1, 4)
        .unwrap();
    let address = DEFAULT_ZSTENCIL_BUFFER_ADDR as u64 + mapper.compute_address(x, y) as u64;
    gpu.memory().read_u32(address).unwrap() & 0x00ff_ffff
}

fn written_pixels(gpu: &GpuEmulator) -> usize {
    gpu.color_update_map(0).unwrap().written_count()
}

/// Depth test on a cleared buffer, with the update maps reset by a swap
fn enable_depth_test(gpu: &mut GpuEmulator) {
    reg(gpu, GpuRegister::DepthTest, 0, RegisterValue::Bool(true)).unwrap();
    cmd(gpu, GpuCommand::ClearZStencilBuffer).unwrap();
    cmd(gpu, GpuCommand::SwapBuffers).unwrap();
}

#[test]
fn test_triangle_scene_counts() {
    let (mut gpu, mocks) = mocked();
    triangle_scene(&mut gpu, RED);

    draw(&mut gpu);

    let stats = *gpu.stats();
    assert_eq!(stats.draws, 1);
    assert_eq!(stats.vertices_shaded, 3);
    assert_eq!(stats.triangles_rasterized, 1);
    assert_eq!(stats.stamps_generated, 64);
    assert_eq!(stats.stamps_culled, 28);
    assert_eq!(stats.stamps_shaded, 36);
    assert_eq!(stats.fragments_shaded, 36 * STAMP_FRAGMENTS as u64);
    assert_eq!(gpu.triangle_counter(), 1);
    assert_eq!(gpu.batch_counter(), 1);

    let raster = mocks.raster.borrow();
    assert_eq!(raster.setups, 1);
    assert_eq!(raster.destroyed, 1);
    assert_eq!(raster.stamps, 64);
    assert_eq!(raster.viewport, (0, 0, 16, 16));
    assert_eq!(raster.display, (16, 16));
    assert_eq!(raster.precision, 24);
}

#[test]
fn test_triangle_scene_pixels() {
    let (mut gpu, _mocks) = mocked();
    triangle_scene(&mut gpu, RED);
    cmd(&mut gpu, GpuCommand::ClearColorBuffer).unwrap();
    cmd(&mut gpu, GpuCommand::SwapBuffers).unwrap();

    draw(&mut gpu);

    assert_eq!(written_pixels(&gpu), LOWER_LEFT_PIXELS);
    for y in 0..16 {
        for x in 0..16 {
            let expected = if covered(x, y) { RED_PIXEL } else { BLACK_PIXEL };
            assert_eq!(read_pixel(&gpu, x, y), expected, "pixel ({x}, {y})");
            assert_eq!(gpu.color_update_map(0).unwrap().is_written(x, y), covered(x, y));
        }
    }
}

#[test]
fn test_frame_dump_shows_triangle() {
    let (mut gpu, _mocks) = mocked();
    triangle_scene(&mut gpu, RED);
    let sink = VecSink::new();
    gpu.set_frame_sink(Box::new(sink.clone()));

    draw(&mut gpu);
    cmd(&mut gpu, GpuCommand::SwapBuffers).unwrap();

    let frames = sink.frames();
    let image = &frames[0];
    // Bottom-up framebuffer rows end up top-down in the image
    assert_eq!(image.pixel(0, 15), Some(RED_PIXEL));
    assert_eq!(image.pixel(15, 15), Some(RED_PIXEL));
    assert_eq!(image.pixel(15, 0), Some(BLACK_PIXEL));
    assert_eq!(image.pixel(0, 0), Some(RED_PIXEL));
}

#[test]
fn test_back_faces_are_culled() {
    let (mut gpu, mocks) = mocked();
    set_display(&mut gpu, 16, 16);
    load_triangles(&mut gpu, &LOWER_LEFT_CW, &[RED; 3]);

    draw(&mut gpu);

    assert_eq!(gpu.stats().triangles_culled, 1);
    assert_eq!(gpu.stats().stamps_generated, 0);
    assert_eq!(mocks.raster.borrow().destroyed, 1);
    assert_eq!(written_pixels(&gpu), 0);
}

#[test]
fn test_front_culling_keeps_back_faces() {
    let (mut gpu, mocks) = mocked();
    set_display(&mut gpu, 16, 16);
    load_triangles(&mut gpu, &LOWER_LEFT_CW, &[RED; 3]);
    reg(&mut gpu, GpuRegister::Culling, 0, RegisterValue::Culling(CullingMode::Front)).unwrap();

    draw(&mut gpu);

    assert_eq!(mocks.raster.borrow().inverted, 1);
    assert_eq!(written_pixels(&gpu), LOWER_LEFT_PIXELS);
}

#[test]
fn test_no_culling_inverts_back_faces() {
    let (mut gpu, mocks) = mocked();
    set_display(&mut gpu, 16, 16);
    load_triangles(&mut gpu, &LOWER_LEFT_CW, &[RED; 3]);
    reg(&mut gpu, GpuRegister::Culling, 0, RegisterValue::Culling(CullingMode::None)).unwrap();

    draw(&mut gpu);

    assert_eq!(mocks.raster.borrow().inverted, 1);
    assert_eq!(gpu.stats().triangles_culled, 0);
    assert_eq!(written_pixels(&gpu), LOWER_LEFT_PIXELS);
}

#[test]
fn test_front_and_back_culling_drops_everything() {
    let (mut gpu, _mocks) = mocked();
    triangle_scene(&mut gpu, RED);
    reg(&mut gpu, GpuRegister::Culling, 0, RegisterValue::Culling(CullingMode::FrontAndBack)).unwrap();

    draw(&mut gpu);

    assert_eq!(gpu.stats().triangles_culled, 1);
    assert_eq!(gpu.stats().stamps_shaded, 0);
}

const OFF_SCREEN: [QuadFloat; 3] = [[2.0, 0.0, 0.0, 1.0], [3.0, 0.0, 0.0, 1.0], [2.0, 1.0, 0.0, 1.0]];

#[test]
fn test_off_frustum_triangle_is_rejected() {
    let (mut gpu, mocks) = mocked();
    set_display(&mut gpu, 16, 16);
    load_triangles(&mut gpu, &OFF_SCREEN, &[RED; 3]);

    draw(&mut gpu);

    assert_eq!(gpu.stats().triangles_rejected, 1);
    assert_eq!(gpu.stats().fragments_shaded, 0);
    assert_eq!(gpu.triangle_counter(), 1);
    assert_eq!(mocks.raster.borrow().setups, 0);
    // Only the three vertex shader runs
    assert_eq!(mocks.shader.borrow().instructions, 3);
}

#[test]
fn test_frustum_clipping_disabled_reaches_rasterizer() {
    let (mut gpu, mocks) = mocked();
    set_display(&mut gpu, 16, 16);
    load_triangles(&mut gpu, &OFF_SCREEN, &[RED; 3]);
    reg(&mut gpu, GpuRegister::FrustumClipping, 0, RegisterValue::Bool(false)).unwrap();

    draw(&mut gpu);

    assert_eq!(gpu.stats().triangles_rejected, 0);
    assert_eq!(mocks.raster.borrow().setups, 1);
    assert_eq!(gpu.stats().stamps_generated, 0);
    assert_eq!(written_pixels(&gpu), 0);
}

#[test]
fn test_scissor_limits_written_pixels() {
    use GpuRegister as R;

    let (mut gpu, _mocks) = mocked();
    triangle_scene(&mut gpu, RED);
    reg(&mut gpu, R::ScissorTest, 0, RegisterValue::Bool(true)).unwrap();
    reg(&mut gpu, R::ScissorIniX, 0, RegisterValue::Int(2)).unwrap();
    reg(&mut gpu, R::ScissorWidth, 0, RegisterValue::Uint(4)).unwrap();
    reg(&mut gpu, R::ScissorHeight, 0, RegisterValue::Uint(4)).unwrap();

    draw(&mut gpu);

    assert_eq!(written_pixels(&gpu), 16);
    let map = gpu.color_update_map(0).unwrap();
    assert!(map.is_written(2, 0));
    assert!(map.is_written(5, 3));
    assert!(!map.is_written(1, 0));
    assert!(!map.is_written(6, 0));
}

#[test]
fn test_killed_fragments_are_not_written() {
    let (mut gpu, mocks) = mocked();
    triangle_scene(&mut gpu, RED);
    mocks.kill.borrow_mut().push(0);

    draw(&mut gpu);

    // Thread 0 is the top left fragment of every stamp, covered in all 36 shaded stamps
    assert_eq!(written_pixels(&gpu), LOWER_LEFT_PIXELS - 36);
    assert!(!gpu.color_update_map(0).unwrap().is_written(0, 0));
    assert!(gpu.color_update_map(0).unwrap().is_written(1, 0));
}

#[test]
fn test_depth_test_writes_window_depth() {
    let (mut gpu, _mocks) = mocked();
    triangle_scene(&mut gpu, RED);
    enable_depth_test(&mut gpu);

    draw(&mut gpu);

    assert_eq!(gpu.z_stencil_update_map().written_count(), LOWER_LEFT_PIXELS);
    // z = 0 maps to the middle of the depth range
    let depth = read_depth(&gpu, 3, 4);
    assert!((0x7f_ffff..=0x80_0000).contains(&depth), "depth {depth:#x}");
    assert_eq!(read_depth(&gpu, 15, 15), 0x00ff_ffff);
}

#[test]
fn test_early_z_skips_shading_of_hidden_stamps() {
    let (mut gpu, _mocks) = mocked();
    triangle_scene(&mut gpu, RED);
    enable_depth_test(&mut gpu);

    draw(&mut gpu);
    draw(&mut gpu);

    let stats = gpu.stats();
    assert_eq!(stats.stamps_shaded, 36);
    assert_eq!(stats.stamps_culled, 28 + 28 + 36);
}

#[test]
fn test_late_z_shades_then_discards() {
    let (mut gpu, _mocks) = mocked();
    triangle_scene(&mut gpu, RED);
    enable_depth_test(&mut gpu);
    reg(&mut gpu, GpuRegister::EarlyZ, 0, RegisterValue::Bool(false)).unwrap();
    draw(&mut gpu);

    load_triangles(&mut gpu, &LOWER_LEFT, &[GREEN; 3]);
    draw(&mut gpu);

    assert_eq!(gpu.stats().stamps_shaded, 72);
    assert_eq!(read_pixel(&gpu, 0, 0), RED_PIXEL);
}

#[test]
fn test_modified_depth_forces_late_z() {
    let (mut gpu, _mocks) = mocked();
    triangle_scene(&mut gpu, RED);
    enable_depth_test(&mut gpu);
    reg(&mut gpu, GpuRegister::ModifyFragmentDepth, 0, RegisterValue::Bool(true)).unwrap();

    draw(&mut gpu);

    // The pass-through shader outputs depth 1.0, which never passes LESS against a
    // cleared buffer
    assert_eq!(gpu.stats().stamps_shaded, 36);
    assert_eq!(gpu.z_stencil_update_map().written_count(), 0);
    assert_eq!(written_pixels(&gpu), 0);
}

#[test]
fn test_stencil_replace() {
    use GpuRegister as R;

    let (mut gpu, _mocks) = mocked();
    triangle_scene(&mut gpu, RED);
    reg(&mut gpu, R::StencilTest, 0, RegisterValue::Bool(true)).unwrap();
    reg(&mut gpu, R::StencilReference, 0, RegisterValue::Uint(0x42)).unwrap();
    reg(&mut gpu, R::DepthPassUpdate, 0, RegisterValue::StencilOp(StencilUpdateFunction::Replace)).unwrap();
    cmd(&mut gpu, GpuCommand::ClearZStencilBuffer).unwrap();

    draw(&mut gpu);

    let stencil = gpu.frame_image(DumpKind::Stencil).unwrap();
    // Image rows are flipped
    assert_eq!(stencil.pixel(0, 15), Some([0x42, 0x42, 0x42, 255]));
    assert_eq!(stencil.pixel(15, 0), Some([0, 0, 0, 255]));
}

#[test]
fn test_validation_records() {
    let (mut gpu, _mocks) = mocked();
    gpu.set_validation(true);
    triangle_scene(&mut gpu, RED);
    enable_depth_test(&mut gpu);

    draw(&mut gpu);

    let log = gpu.validation().unwrap();
    assert_eq!(log.vertex_count(), 3);
    let vertex = log.vertex(0, 1).unwrap();
    assert_eq!(vertex.inputs[POSITION_ATTRIBUTE], LOWER_LEFT[1]);
    assert_eq!(vertex.outputs[COLOR_ATTRIBUTE], RED);

    assert_eq!(log.z_stencil_count(), LOWER_LEFT_PIXELS);
    let z = log.z_stencil(&FragmentKey::new(0, 0, 0, 0)).unwrap();
    assert_eq!(z.read, 0x00ff_ffff);
    assert!(!z.culled);

    assert_eq!(log.color_count(0), LOWER_LEFT_PIXELS);
    let color = log.color(0, &FragmentKey::new(2, 3, 0, 0)).unwrap();
    assert_eq!(color.read, vec![0; 4]);
    assert_eq!(color.written, RED_PIXEL.to_vec());
    assert!(log.color(0, &FragmentKey::new(15, 15, 0, 0)).is_none());
}

#[test]
fn test_additive_blending() {
    use GpuRegister as R;

    let (mut gpu, _mocks) = mocked();
    triangle_scene(&mut gpu, RED);
    reg(&mut gpu, R::ColorBufferClear, 0, RegisterValue::QuadFloat([0.0, 0.0, 1.0, 1.0])).unwrap();
    cmd(&mut gpu, GpuCommand::ClearColorBuffer).unwrap();
    reg(&mut gpu, R::ColorBlend, 0, RegisterValue::Bool(true)).unwrap();
    reg(&mut gpu, R::BlendDstRgb, 0, RegisterValue::BlendFunction(BlendFunction::One)).unwrap();

    draw(&mut gpu);

    assert_eq!(read_pixel(&gpu, 0, 0), [255, 0, 255, 255]);
    assert_eq!(read_pixel(&gpu, 15, 15), [0, 0, 255, 255]);
}

#[test]
fn test_color_mask_keeps_masked_channels() {
    use GpuRegister as R;

    let (mut gpu, _mocks) = mocked();
    triangle_scene(&mut gpu, RED);
    reg(&mut gpu, R::ColorBufferClear, 0, RegisterValue::QuadFloat([0.0, 1.0, 0.0, 0.0])).unwrap();
    cmd(&mut gpu, GpuCommand::ClearColorBuffer).unwrap();
    reg(&mut gpu, R::ColorMaskG, 0, RegisterValue::Bool(false)).unwrap();

    draw(&mut gpu);

    assert_eq!(read_pixel(&gpu, 0, 0), [255, 255, 0, 255]);
}

#[test]
fn test_xor_logic_op() {
    use GpuRegister as R;

    let (mut gpu, _mocks) = mocked();
    triangle_scene(&mut gpu, RED);
    reg(&mut gpu, R::ColorBufferClear, 0, RegisterValue::QuadFloat([1.0; 4])).unwrap();
    cmd(&mut gpu, GpuCommand::ClearColorBuffer).unwrap();
    reg(&mut gpu, R::LogicalOperation, 0, RegisterValue::Bool(true)).unwrap();
    reg(&mut gpu, R::LogicOpFunction, 0, RegisterValue::LogicOp(LogicOpMode::Xor)).unwrap();

    draw(&mut gpu);

    assert_eq!(read_pixel(&gpu, 0, 0), [0, 255, 255, 0]);
    assert_eq!(read_pixel(&gpu, 15, 15), [255; 4]);
}

#[test]
fn test_logic_op_requires_rgba8() {
    use GpuRegister as R;

    let (mut gpu, _mocks) = mocked();
    triangle_scene(&mut gpu, RED);
    reg(&mut gpu, R::RenderTargetFormat, 0, RegisterValue::TextureFormat(TextureFormat::Rgba16F)).unwrap();
    reg(&mut gpu, R::LogicalOperation, 0, RegisterValue::Bool(true)).unwrap();

    let err = cmd(&mut gpu, GpuCommand::Draw).unwrap_err();
    assert!(matches!(
        err,
        EmulatorError::Protocol {
            kind: ProtocolError::UnsupportedFormat(_),
            ..
        }
    ));
}

#[test]
fn test_half_float_render_target() {
    use GpuRegister as R;

    let (mut gpu, _mocks) = mocked();
    triangle_scene(&mut gpu, [0.25, 2.0, -1.0, 1.0]);
    reg(&mut gpu, R::RenderTargetFormat, 0, RegisterValue::TextureFormat(TextureFormat::Rgba16F)).unwrap();

    draw(&mut gpu);

    // Vertex colors are clamped after vertex shading, 0.25 truncates to 63
    let image = gpu.frame_image(DumpKind::Color).unwrap();
    assert_eq!(image.pixel(0, 15), Some([63, 255, 0, 255]));
}

const QUAD: [QuadFloat; 4] = [
    [-1.0, -1.0, 0.0, 1.0],
    [1.0, -1.0, 0.0, 1.0],
    [-1.0, 1.0, 0.0, 1.0],
    [1.0, 1.0, 0.0, 1.0],
];

#[test]
fn test_indexed_draw_reuses_shaded_vertices() {
    use GpuRegister as R;

    let (mut gpu, _mocks) = mocked();
    set_display(&mut gpu, 16, 16);
    load_triangles(&mut gpu, &QUAD, &[RED; 4]);

    let indices: Vec<u8> = [0u16, 1, 2, 2, 1, 3].iter().flat_map(|i| i.to_le_bytes()).collect();
    gpu.process(AgpTransaction::write(SCRATCH, indices)).unwrap();
    reg(&mut gpu, R::StreamAddress, 2, RegisterValue::Uint(SCRATCH)).unwrap();
    reg(&mut gpu, R::StreamData, 2, RegisterValue::StreamData(StreamData::Uint16)).unwrap();
    reg(&mut gpu, R::IndexStream, 0, RegisterValue::Uint(2)).unwrap();
    reg(&mut gpu, R::IndexMode, 0, RegisterValue::Bool(true)).unwrap();
    reg(&mut gpu, R::StreamCount, 0, RegisterValue::Uint(6)).unwrap();

    draw(&mut gpu);

    assert_eq!(gpu.stats().vertices_shaded, 4);
    assert_eq!(gpu.stats().vertex_cache_hits, 2);
    assert_eq!(gpu.stats().triangles_rasterized, 2);
    assert_eq!(written_pixels(&gpu), 256);
}

#[test]
fn test_instances_reshade_vertices() {
    let (mut gpu, _mocks) = mocked();
    triangle_scene(&mut gpu, RED);
    reg(&mut gpu, GpuRegister::StreamInstances, 0, RegisterValue::Uint(2)).unwrap();

    draw(&mut gpu);

    assert_eq!(gpu.stats().draws, 1);
    assert_eq!(gpu.stats().vertices_shaded, 6);
    assert_eq!(gpu.stats().vertex_cache_hits, 0);
    assert_eq!(gpu.triangle_counter(), 2);
}

#[test]
fn test_index_stream_widths() {
    use GpuRegister as R;

    let indices = [0u32, 1, 2, 2, 1, 3];
    let u8_indices: Vec<u8> = indices.iter().map(|&i| i as u8).collect();
    let u32_indices: Vec<u8> = indices.iter().flat_map(|i| i.to_le_bytes()).collect();

    for (format, bytes) in [(StreamData::Uint8, u8_indices), (StreamData::Uint32, u32_indices)] {
        let (mut gpu, _mocks) = mocked();
        gpu.set_validation(true);
        set_display(&mut gpu, 16, 16);
        load_triangles(&mut gpu, &QUAD, &[RED; 4]);

        gpu.process(AgpTransaction::write(SCRATCH, bytes)).unwrap();
        reg(&mut gpu, R::StreamAddress, 2, RegisterValue::Uint(SCRATCH)).unwrap();
        reg(&mut gpu, R::StreamData, 2, RegisterValue::StreamData(format)).unwrap();
        reg(&mut gpu, R::IndexStream, 0, RegisterValue::Uint(2)).unwrap();
        reg(&mut gpu, R::IndexMode, 0, RegisterValue::Bool(true)).unwrap();
        reg(&mut gpu, R::StreamCount, 0, RegisterValue::Uint(6)).unwrap();

        draw(&mut gpu);

        assert_eq!(gpu.stats().vertices_shaded, 4, "{format:?}");
        assert_eq!(gpu.stats().vertex_cache_hits, 2, "{format:?}");
        let log = gpu.validation().unwrap();
        assert_eq!(log.vertex(0, 3).unwrap().inputs[POSITION_ATTRIBUTE], QUAD[3], "{format:?}");
        assert_eq!(written_pixels(&gpu), 256, "{format:?}");
    }
}

#[test]
fn test_d3d9_color_stream_swaps_red_and_blue() {
    use GpuRegister as R;

    let (mut gpu, _mocks) = mocked();
    gpu.set_validation(true);
    triangle_scene(&mut gpu, RED);

    // B, G, R, A per vertex
    gpu.process(AgpTransaction::write(COLOR_STREAM, [255u8, 0, 0, 255].repeat(3))).unwrap();
    reg(&mut gpu, R::StreamData, 1, RegisterValue::StreamData(StreamData::Unorm8)).unwrap();
    reg(&mut gpu, R::StreamStride, 1, RegisterValue::Uint(4)).unwrap();
    reg(&mut gpu, R::D3d9ColorStream, 1, RegisterValue::Bool(true)).unwrap();

    draw(&mut gpu);

    let vertex = gpu.validation().unwrap().vertex(0, 0).unwrap();
    assert_eq!(vertex.inputs[COLOR_ATTRIBUTE], [0.0, 0.0, 1.0, 1.0]);
    assert_eq!(vertex.inputs[POSITION_ATTRIBUTE], LOWER_LEFT[0]);
    assert_eq!(read_pixel(&gpu, 0, 15), [0, 0, 255, 255]);
}

#[test]
fn test_stream_frequency_steps_per_instance() {
    use GpuRegister as R;

    let (mut gpu, _mocks) = mocked();
    gpu.set_validation(true);
    set_display(&mut gpu, 16, 16);
    load_triangles(&mut gpu, &LOWER_LEFT, &[RED, GREEN, GREEN]);
    reg(&mut gpu, R::StreamFrequency, 1, RegisterValue::Uint(1)).unwrap();
    reg(&mut gpu, R::StreamInstances, 0, RegisterValue::Uint(2)).unwrap();

    draw(&mut gpu);

    let log = gpu.validation().unwrap();
    for index in 0..3 {
        let first = log.vertex(0, index).unwrap();
        let second = log.vertex(1, index).unwrap();
        assert_eq!(first.inputs[COLOR_ATTRIBUTE], RED, "vertex {index}");
        assert_eq!(second.inputs[COLOR_ATTRIBUTE], GREEN, "vertex {index}");
        assert_eq!(second.inputs[POSITION_ATTRIBUTE], LOWER_LEFT[index as usize]);
    }
    // The second instance is drawn last
    assert_eq!(read_pixel(&gpu, 0, 15), [0, 255, 0, 255]);
}

#[test]
fn test_attribute_load_bypass_feeds_index_and_instance() {
    use GpuRegister as R;

    let (mut gpu, _mocks) = mocked();
    gpu.set_validation(true);
    set_display(&mut gpu, 16, 16);
    load_triangles(&mut gpu, &LOWER_LEFT, &[RED; 3]);
    reg(&mut gpu, R::VertexAttributeDefaultValue, COLOR_ATTRIBUTE as u32, RegisterValue::QuadFloat(GREEN)).unwrap();
    reg(&mut gpu, R::AttributeLoadBypass, 0, RegisterValue::Bool(true)).unwrap();
    reg(&mut gpu, R::StreamInstances, 0, RegisterValue::Uint(2)).unwrap();
    // Two vertices never form a triangle
    reg(&mut gpu, R::StreamCount, 0, RegisterValue::Uint(2)).unwrap();

    draw(&mut gpu);

    let log = gpu.validation().unwrap();
    assert_eq!(log.vertex_count(), 4);
    let vertex = log.vertex(1, 1).unwrap();
    assert_eq!(vertex.inputs[POSITION_ATTRIBUTE], [1.0, 1.0, 0.0, 0.0]);
    assert_eq!(vertex.inputs[COLOR_ATTRIBUTE], GREEN);
    assert_eq!(log.vertex(0, 1).unwrap().inputs[POSITION_ATTRIBUTE], [1.0, 0.0, 0.0, 0.0]);
    assert_eq!(gpu.stats().triangles_rasterized, 0);
}

#[test]
fn test_color_write_formats() {
    use GpuRegister as R;

    let color = [0.5, 0.25, 1.0, 1.0];
    let rgba16: Vec<u8> = [32767u16, 16383, 65535, 65535].iter().flat_map(|c| c.to_le_bytes()).collect();
    let rg16f: Vec<u8> = [0x3800u16, 0x3400].iter().flat_map(|c| c.to_le_bytes()).collect();
    let r32f = 0.5f32.to_le_bytes().to_vec();

    for (format, expected) in [
        (TextureFormat::Rgba16, rgba16),
        (TextureFormat::R32F, r32f),
        (TextureFormat::Rg16F, rg16f),
    ] {
        let (mut gpu, _mocks) = mocked();
        gpu.set_validation(true);
        triangle_scene(&mut gpu, color);
        reg(&mut gpu, R::RenderTargetFormat, 0, RegisterValue::TextureFormat(format)).unwrap();

        draw(&mut gpu);

        let stored = read_pixel_bytes(&gpu, 0, 15, expected.len() as u32);
        assert_eq!(stored, expected, "{format:?}");
        let record = gpu.validation().unwrap().color(0, &FragmentKey::new(0, 15, 0, 0)).unwrap();
        assert_eq!(record.written, expected, "{format:?}");
        assert_eq!(written_pixels(&gpu), LOWER_LEFT_PIXELS, "{format:?}");
        // Nothing outside the triangle
        assert_eq!(read_pixel_bytes(&gpu, 15, 15, expected.len() as u32), vec![0; expected.len()]);
    }
}

#[test]
fn test_triangle_strip_draw() {
    let (mut gpu, _mocks) = mocked();
    set_display(&mut gpu, 16, 16);
    load_triangles(&mut gpu, &QUAD, &[RED; 4]);
    reg(&mut gpu, GpuRegister::Primitive, 0, RegisterValue::Primitive(PrimitiveMode::TriangleStrip)).unwrap();

    draw(&mut gpu);

    assert_eq!(gpu.stats().triangles_rasterized, 2);
    assert_eq!(written_pixels(&gpu), 256);
}

#[test]
fn test_line_draw_is_topology_error() {
    let (mut gpu, _mocks) = mocked();
    triangle_scene(&mut gpu, RED);
    reg(&mut gpu, GpuRegister::Primitive, 0, RegisterValue::Primitive(PrimitiveMode::Line)).unwrap();

    let err = cmd(&mut gpu, GpuCommand::Draw).unwrap_err();
    assert!(matches!(
        err,
        EmulatorError::Topology {
            kind: TopologyError::UnimplementedPrimitive("LINE"),
            ..
        }
    ));
}

#[test]
fn test_multisampled_draw() {
    use GpuRegister as R;

    let (mut gpu, _mocks) = mocked();
    gpu.set_validation(true);
    triangle_scene(&mut gpu, RED);
    reg(&mut gpu, R::Multisampling, 0, RegisterValue::Bool(true)).unwrap();
    cmd(&mut gpu, GpuCommand::ClearColorBuffer).unwrap();

    draw(&mut gpu);

    assert_eq!(gpu.validation().unwrap().color_count(0), LOWER_LEFT_PIXELS * 4);
    let image = gpu.frame_image(DumpKind::Color).unwrap();
    assert_eq!(image.pixel(0, 15), Some(RED_PIXEL));
    assert_eq!(image.pixel(15, 0), Some(BLACK_PIXEL));
}

#[test]
fn test_assemble_topologies() {
    let four = [0, 1, 2, 3];

    assert_eq!(assemble_triangles(PrimitiveMode::Triangle, &four).unwrap(), vec![[0, 1, 2]]);
    assert_eq!(
        assemble_triangles(PrimitiveMode::TriangleStrip, &four).unwrap(),
        vec![[0, 1, 2], [2, 1, 3]]
    );
    assert_eq!(
        assemble_triangles(PrimitiveMode::TriangleFan, &four).unwrap(),
        vec![[0, 1, 2], [0, 2, 3]]
    );
    assert_eq!(
        assemble_triangles(PrimitiveMode::Quad, &four).unwrap(),
        vec![[0, 1, 3], [1, 2, 3]]
    );
    assert_eq!(
        assemble_triangles(PrimitiveMode::QuadStrip, &[0, 1, 2, 3, 4, 5]).unwrap(),
        vec![[0, 1, 2], [1, 3, 2], [2, 3, 4], [3, 5, 4]]
    );
    assert!(assemble_triangles(PrimitiveMode::TriangleStrip, &[0, 1]).unwrap().is_empty());
    assert_eq!(
        assemble_triangles(PrimitiveMode::Point, &four),
        Err(TopologyError::UnimplementedPrimitive("POINT"))
    );
}

#[test]
fn test_face_culling_decisions() {
    use CullingMode as C;

    assert_eq!(face_culling(C::Back, 4.0), FaceCulling::Keep);
    assert_eq!(face_culling(C::Back, -4.0), FaceCulling::Drop);
    assert_eq!(face_culling(C::Front, 4.0), FaceCulling::Drop);
    assert_eq!(face_culling(C::Front, -4.0), FaceCulling::KeepInverted);
    assert_eq!(face_culling(C::None, 4.0), FaceCulling::Keep);
    assert_eq!(face_culling(C::None, -4.0), FaceCulling::KeepInverted);
    assert_eq!(face_culling(C::FrontAndBack, 4.0), FaceCulling::Drop);
    assert_eq!(face_culling(C::None, 0.0), FaceCulling::Drop);
}

#[test]
fn test_stream_element_conversion() {
    assert_eq!(convert_stream_element(StreamData::Unorm8, &[255]), 1.0);
    assert_eq!(convert_stream_element(StreamData::Snorm16, &0x8001u16.to_le_bytes()), -1.0);
    assert_eq!(convert_stream_element(StreamData::Float16, &0x3c00u16.to_le_bytes()), 1.0);
    assert_eq!(convert_stream_element(StreamData::Sint8, &[0xff]), -1.0);
    assert_eq!(convert_stream_element(StreamData::Uint32, &7u32.to_le_bytes()), 7.0);
    assert_eq!(convert_stream_element(StreamData::Float32, &2.5f32.to_le_bytes()), 2.5);
}

#[test]
fn test_normalized_stream_elements_are_bit_exact() {
    let bits = |format, bytes: &[u8]| convert_stream_element(format, bytes).to_bits();

    assert_eq!(bits(StreamData::Unorm8, &[3]), 1010876610);
    assert_eq!(bits(StreamData::Snorm8, &[(-104i8) as u8]), 3209798470);
    assert_eq!(bits(StreamData::Unorm32, &16777217u32.to_le_bytes()), 998244352);
    assert_eq!(convert_stream_element(StreamData::Unorm32, &u32::MAX.to_le_bytes()), 1.0);
}
