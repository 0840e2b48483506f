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

//! Frustum trivial reject
//!
//! Cohen-Sutherland outcodes of the three clip space vertices of a triangle. A triangle is
//! rejected when all three vertices lie outside the same clip plane. Partially visible
//! triangles are kept whole; no geometric clipping is performed.

use bitflags::bitflags;

use crate::core::gpu::QuadFloat;

bitflags! {
    /// Clip planes a vertex lies outside of
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Outcode: u8 {
        const LEFT = 0x01;
        const RIGHT = 0x02;
        const BOTTOM = 0x04;
        const TOP = 0x08;
        const NEAR = 0x10;
        const FAR = 0x20;
    }
}

impl Outcode {
    /// Outcode of a clip space position
    ///
    /// With the D3D9 depth range the near plane is `z >= 0`, otherwise `z >= -w`.
    pub fn of(v: &QuadFloat, d3d9_depth_range: bool) -> Self {
        let [x, y, z, w] = *v;
        let mut code = Outcode::empty();
        code.set(Outcode::LEFT, w + x < 0.0);
        code.set(Outcode::RIGHT, w - x < 0.0);
        code.set(Outcode::BOTTOM, w + y < 0.0);
        code.set(Outcode::TOP, w - y < 0.0);
        let near = if d3d9_depth_range { z } else { w + z };
        code.set(Outcode::NEAR, near < 0.0);
        code.set(Outcode::FAR, w - z < 0.0);
        code
    }
}

/// True when the triangle lies entirely outside one clip plane
///
/// # Example
///
/// ```
/// use attila_emu::core::clipper::trivial_reject;
///
/// let inside = [[0.0, 0.0, 0.5, 1.0], [0.5, 0.0, 0.5, 1.0], [0.0, 0.5, 0.5, 1.0]];
/// assert!(!trivial_reject(&inside[0], &inside[1], &inside[2], false));
///
/// let behind = [[0.0, 0.0, -2.0, 1.0], [0.5, 0.0, -3.0, 1.0], [0.0, 0.5, -2.5, 1.0]];
/// assert!(trivial_reject(&behind[0], &behind[1], &behind[2], false));
/// ```
pub fn trivial_reject(v1: &QuadFloat, v2: &QuadFloat, v3: &QuadFloat, d3d9_depth_range: bool) -> bool {
    let shared = Outcode::of(v1, d3d9_depth_range)
        & Outcode::of(v2, d3d9_depth_range)
        & Outcode::of(v3, d3d9_depth_range);
    !shared.is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcode_planes() {
        assert_eq!(Outcode::of(&[0.0, 0.0, 0.0, 1.0], false), Outcode::empty());
        assert_eq!(Outcode::of(&[-2.0, 0.0, 0.0, 1.0], false), Outcode::LEFT);
        assert_eq!(Outcode::of(&[0.0, 2.0, 0.0, 1.0], false), Outcode::TOP);
        assert_eq!(Outcode::of(&[2.0, -2.0, 2.0, 1.0], false), Outcode::RIGHT | Outcode::BOTTOM | Outcode::FAR);
    }

    #[test]
    fn test_d3d9_near_plane() {
        let v = [0.0, 0.0, -0.5, 1.0];
        assert_eq!(Outcode::of(&v, false), Outcode::empty());
        assert_eq!(Outcode::of(&v, true), Outcode::NEAR);
    }

    #[test]
    fn test_straddling_triangle_is_kept() {
        // Each vertex is outside a different plane
        let v1 = [-2.0, 0.0, 0.0, 1.0];
        let v2 = [2.0, 0.0, 0.0, 1.0];
        let v3 = [0.0, 2.0, 0.0, 1.0];
        assert!(!trivial_reject(&v1, &v2, &v3, false));
    }

    #[test]
    fn test_all_right_of_frustum_rejected() {
        let v1 = [2.0, 0.0, 0.0, 1.0];
        let v2 = [3.0, 1.0, 0.0, 1.0];
        let v3 = [4.0, -1.0, 0.0, 1.0];
        assert!(trivial_reject(&v1, &v2, &v3, true));
    }
}
