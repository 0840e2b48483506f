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

//! Fragment operations: stencil and depth test, blending and logic operations
//!
//! Z/stencil buffer words hold the stencil value in the top byte and a 24-bit depth in
//! the low bits. Only this 8/24 layout is supported.

use crate::core::gpu::{
    BlendEquation, BlendFunction, CompareMode, LogicOpMode, QuadFloat, StencilUpdateFunction,
    MAX_RENDER_TARGETS,
};

const DEPTH_MASK: u32 = 0x00ff_ffff;
const STENCIL_SHIFT: u32 = 24;

/// Fixed function fragment operation unit
///
/// All operations work on one stamp at a time; slices passed in must have the same length
/// (the stamp fragment or sample count).
pub trait FragmentOps {
    fn set_blending(
        &mut self,
        rt: usize,
        equation: BlendEquation,
        src_rgb: BlendFunction,
        src_alpha: BlendFunction,
        dst_rgb: BlendFunction,
        dst_alpha: BlendFunction,
        constant: QuadFloat,
    );

    fn set_logic_op_mode(&mut self, mode: LogicOpMode);

    fn configure_z_test(&mut self, function: CompareMode, depth_mask: bool);

    fn set_z_test(&mut self, enable: bool);

    #[allow(clippy::too_many_arguments)]
    fn configure_stencil_test(
        &mut self,
        function: CompareMode,
        reference: u8,
        test_mask: u8,
        update_mask: u8,
        stencil_fail: StencilUpdateFunction,
        depth_fail: StencilUpdateFunction,
        depth_pass: StencilUpdateFunction,
    );

    fn set_stencil_test(&mut self, enable: bool);

    /// Blend incoming `source` colors with the stored `destination` colors of `rt`
    fn blend(&self, rt: usize, source: &[QuadFloat], destination: &[QuadFloat], out: &mut [QuadFloat]);

    /// Byte-wise logic operation over RGBA8 colors
    fn logic_op(&self, source: &[u8], destination: &[u8], out: &mut [u8]);

    /// Run the stencil and depth tests of a stamp
    ///
    /// `buffer` is updated in place with the new stencil and depth values. `culled` is
    /// read to skip fragments that are already culled and set for every fragment that
    /// fails either test.
    fn stencil_z_test(&self, stamp_z: &[u32], buffer: &mut [u32], culled: &mut [bool]);
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct BlendState {
    equation: BlendEquation,
    src_rgb: BlendFunction,
    src_alpha: BlendFunction,
    dst_rgb: BlendFunction,
    dst_alpha: BlendFunction,
    constant: QuadFloat,
}

impl Default for BlendState {
    fn default() -> Self {
        Self {
            equation: BlendEquation::Add,
            src_rgb: BlendFunction::One,
            src_alpha: BlendFunction::One,
            dst_rgb: BlendFunction::Zero,
            dst_alpha: BlendFunction::Zero,
            constant: [0.0; 4],
        }
    }
}

/// Reference fragment operation unit
#[derive(Debug, Clone)]
pub struct FragmentOpEmulator {
    stencil_test: bool,
    stencil_function: CompareMode,
    stencil_reference: u8,
    stencil_test_mask: u8,
    stencil_update_mask: u8,
    stencil_fail: StencilUpdateFunction,
    depth_fail: StencilUpdateFunction,
    depth_pass: StencilUpdateFunction,

    depth_test: bool,
    depth_function: CompareMode,
    depth_mask: bool,

    blend: [BlendState; MAX_RENDER_TARGETS],
    logic_op_mode: LogicOpMode,
}

impl Default for FragmentOpEmulator {
    fn default() -> Self {
        Self {
            stencil_test: false,
            stencil_function: CompareMode::Always,
            stencil_reference: 0,
            stencil_test_mask: 0xff,
            stencil_update_mask: 0xff,
            stencil_fail: StencilUpdateFunction::Keep,
            depth_fail: StencilUpdateFunction::Keep,
            depth_pass: StencilUpdateFunction::Keep,
            depth_test: false,
            depth_function: CompareMode::Less,
            depth_mask: true,
            blend: [BlendState::default(); MAX_RENDER_TARGETS],
            logic_op_mode: LogicOpMode::Copy,
        }
    }
}

impl FragmentOpEmulator {
    pub fn new() -> Self {
        Self::default()
    }

    fn stencil_compare(&self, value: u8) -> bool {
        let r = self.stencil_reference & self.stencil_test_mask;
        let v = value & self.stencil_test_mask;
        compare(self.stencil_function, r, v)
    }

    fn update_stencil(&self, function: StencilUpdateFunction, stencil: u8, buffer: &mut u32) {
        let updated = match function {
            StencilUpdateFunction::Keep => stencil,
            StencilUpdateFunction::Zero => 0,
            StencilUpdateFunction::Replace => self.stencil_reference,
            StencilUpdateFunction::Incr => stencil.saturating_add(1),
            StencilUpdateFunction::Decr => stencil.saturating_sub(1),
            StencilUpdateFunction::Invert => !stencil,
            StencilUpdateFunction::IncrWrap => stencil.wrapping_add(1),
            StencilUpdateFunction::DecrWrap => stencil.wrapping_sub(1),
        };
        *buffer = (*buffer & DEPTH_MASK) | (((updated & self.stencil_update_mask) as u32) << STENCIL_SHIFT);
    }
}

/// `lhs OP rhs`
fn compare<T: PartialOrd>(function: CompareMode, lhs: T, rhs: T) -> bool {
    match function {
        CompareMode::Never => false,
        CompareMode::Always => true,
        CompareMode::Less => lhs < rhs,
        CompareMode::LEqual => lhs <= rhs,
        CompareMode::Equal => lhs == rhs,
        CompareMode::GEqual => lhs >= rhs,
        CompareMode::Greater => lhs > rhs,
        CompareMode::NotEqual => lhs != rhs,
    }
}

/// RGB part of a blend factor
fn factor_rgb(function: BlendFunction, constant: &QuadFloat, src: &QuadFloat, dst: &QuadFloat) -> [f32; 3] {
    let rgb = |c: &QuadFloat| [c[0], c[1], c[2]];
    let one_minus = |c: [f32; 3]| c.map(|v| 1.0 - v);
    match function {
        BlendFunction::Zero => [0.0; 3],
        BlendFunction::One => [1.0; 3],
        BlendFunction::SrcColor => rgb(src),
        BlendFunction::OneMinusSrcColor => one_minus(rgb(src)),
        BlendFunction::DstColor => rgb(dst),
        BlendFunction::OneMinusDstColor => one_minus(rgb(dst)),
        BlendFunction::SrcAlpha => [src[3]; 3],
        BlendFunction::OneMinusSrcAlpha => [1.0 - src[3]; 3],
        BlendFunction::DstAlpha => [dst[3]; 3],
        BlendFunction::OneMinusDstAlpha => [1.0 - dst[3]; 3],
        BlendFunction::ConstantColor => rgb(constant),
        BlendFunction::OneMinusConstantColor => one_minus(rgb(constant)),
        BlendFunction::ConstantAlpha => [constant[3]; 3],
        BlendFunction::OneMinusConstantAlpha => [1.0 - constant[3]; 3],
        BlendFunction::SrcAlphaSaturate => [src[3].min(1.0 - dst[3]); 3],
    }
}

/// Alpha part of a blend factor
fn factor_alpha(function: BlendFunction, constant: &QuadFloat, src: &QuadFloat, dst: &QuadFloat) -> f32 {
    match function {
        BlendFunction::Zero => 0.0,
        BlendFunction::One | BlendFunction::SrcAlphaSaturate => 1.0,
        BlendFunction::SrcColor | BlendFunction::SrcAlpha => src[3],
        BlendFunction::OneMinusSrcColor | BlendFunction::OneMinusSrcAlpha => 1.0 - src[3],
        BlendFunction::DstColor | BlendFunction::DstAlpha => dst[3],
        BlendFunction::OneMinusDstColor | BlendFunction::OneMinusDstAlpha => 1.0 - dst[3],
        BlendFunction::ConstantColor | BlendFunction::ConstantAlpha => constant[3],
        BlendFunction::OneMinusConstantColor | BlendFunction::OneMinusConstantAlpha => 1.0 - constant[3],
    }
}

impl FragmentOps for FragmentOpEmulator {
    fn set_blending(
        &mut self,
        rt: usize,
        equation: BlendEquation,
        src_rgb: BlendFunction,
        src_alpha: BlendFunction,
        dst_rgb: BlendFunction,
        dst_alpha: BlendFunction,
        constant: QuadFloat,
    ) {
        if let Some(state) = self.blend.get_mut(rt) {
            *state = BlendState {
                equation,
                src_rgb,
                src_alpha,
                dst_rgb,
                dst_alpha,
                constant,
            };
        }
    }

    fn set_logic_op_mode(&mut self, mode: LogicOpMode) {
        self.logic_op_mode = mode;
    }

    fn configure_z_test(&mut self, function: CompareMode, depth_mask: bool) {
        self.depth_function = function;
        self.depth_mask = depth_mask;
    }

    fn set_z_test(&mut self, enable: bool) {
        self.depth_test = enable;
    }

    fn configure_stencil_test(
        &mut self,
        function: CompareMode,
        reference: u8,
        test_mask: u8,
        update_mask: u8,
        stencil_fail: StencilUpdateFunction,
        depth_fail: StencilUpdateFunction,
        depth_pass: StencilUpdateFunction,
    ) {
        self.stencil_function = function;
        self.stencil_reference = reference;
        self.stencil_test_mask = test_mask;
        self.stencil_update_mask = update_mask;
        self.stencil_fail = stencil_fail;
        self.depth_fail = depth_fail;
        self.depth_pass = depth_pass;
    }

    fn set_stencil_test(&mut self, enable: bool) {
        self.stencil_test = enable;
    }

    fn blend(&self, rt: usize, source: &[QuadFloat], destination: &[QuadFloat], out: &mut [QuadFloat]) {
        let state = self.blend.get(rt).copied().unwrap_or_default();

        for ((src, dst), color) in source.iter().zip(destination).zip(out.iter_mut()) {
            let s_rgb = factor_rgb(state.src_rgb, &state.constant, src, dst);
            let d_rgb = factor_rgb(state.dst_rgb, &state.constant, src, dst);
            let s = [s_rgb[0], s_rgb[1], s_rgb[2], factor_alpha(state.src_alpha, &state.constant, src, dst)];
            let d = [d_rgb[0], d_rgb[1], d_rgb[2], factor_alpha(state.dst_alpha, &state.constant, src, dst)];

            for ch in 0..4 {
                color[ch] = match state.equation {
                    BlendEquation::Add => src[ch] * s[ch] + dst[ch] * d[ch],
                    BlendEquation::Subtract => src[ch] * s[ch] - dst[ch] * d[ch],
                    BlendEquation::ReverseSubtract => dst[ch] * d[ch] - src[ch] * s[ch],
                    BlendEquation::Min => src[ch].min(dst[ch]),
                    BlendEquation::Max => src[ch].max(dst[ch]),
                };
            }
        }
    }

    fn logic_op(&self, source: &[u8], destination: &[u8], out: &mut [u8]) {
        for ((&s, &d), o) in source.iter().zip(destination).zip(out.iter_mut()) {
            *o = match self.logic_op_mode {
                LogicOpMode::Clear => 0,
                LogicOpMode::And => s & d,
                LogicOpMode::AndReverse => s & !d,
                LogicOpMode::Copy => s,
                LogicOpMode::AndInverted => !s & d,
                LogicOpMode::Noop => d,
                LogicOpMode::Xor => s ^ d,
                LogicOpMode::Or => s | d,
                LogicOpMode::Nor => !(s | d),
                LogicOpMode::Equiv => !(s ^ d),
                LogicOpMode::Invert => !d,
                LogicOpMode::OrReverse => s | !d,
                LogicOpMode::CopyInverted => !s,
                LogicOpMode::OrInverted => !s | d,
                LogicOpMode::Nand => !(s & d),
                LogicOpMode::Set => 0xff,
            };
        }
    }

    fn stencil_z_test(&self, stamp_z: &[u32], buffer: &mut [u32], culled: &mut [bool]) {
        for ((&z, word), cull) in stamp_z.iter().zip(buffer.iter_mut()).zip(culled.iter_mut()) {
            let stencil = (*word >> STENCIL_SHIFT) as u8;
            let depth = *word & DEPTH_MASK;

            let stencil_pass = !self.stencil_test || self.stencil_compare(stencil);
            let depth_pass = !self.depth_test || compare(self.depth_function, z, depth);

            if !*cull {
                if self.stencil_test {
                    let update = match (stencil_pass, depth_pass) {
                        (false, _) => self.stencil_fail,
                        (true, true) => self.depth_pass,
                        (true, false) => self.depth_fail,
                    };
                    self.update_stencil(update, stencil, word);
                }

                if self.depth_test && stencil_pass && depth_pass && self.depth_mask {
                    *word = (*word & !DEPTH_MASK) | (z & DEPTH_MASK);
                }
            }

            *cull = *cull || !stencil_pass || !depth_pass;
        }
    }
}
