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

//! Custom assertions for GPU emulator testing

use attila_emu::core::gpu::FrameImage;

/// Assert every pixel of an image has the expected RGBA value
#[allow(dead_code)]
pub fn assert_uniform(image: &FrameImage, expected: [u8; 4]) {
    for y in 0..image.height {
        for x in 0..image.width {
            let actual = image.pixel(x, y);
            assert_eq!(
                actual,
                Some(expected),
                "Pixel at ({}, {}) mismatch: expected {:?}, got {:?}",
                x, y, expected, actual
            );
        }
    }
}
