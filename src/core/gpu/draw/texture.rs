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

//! Texture request round trip between the shader unit and the texture unit
//!
//! Address generation and filtering are done by the texture unit. Texel data reads go
//! through [`TextureCaches`](crate::core::texture_cache::TextureCaches), which resolves
//! the texture address space tag of every texel address.

use super::COMPONENT;
use crate::core::error::{EmulatorError, Result};
use crate::core::gpu::units::TextureAccess;
use crate::core::gpu::GpuEmulator;

impl GpuEmulator {
    /// Serve every pending texture request of the shader unit
    pub(super) fn emulate_texture_requests(&mut self, vertex: bool) -> Result<()> {
        loop {
            let access = if vertex {
                self.units.shader.next_vertex_texture_access()
            } else {
                self.units.shader.next_texture_access()
            };

            match access {
                Some(access) => self.emulate_texture_access(access)?,
                None => return Ok(()),
            }
        }
    }

    fn emulate_texture_access(&mut self, mut access: TextureAccess) -> Result<()> {
        if !self.units.texture.is_attached() {
            return Err(EmulatorError::UnitUnavailable { unit: "texture" });
        }

        let mut texel = Vec::new();
        let mut sample = 0;
        loop {
            self.units.texture.calculate_address(&mut access, sample);

            let requests = std::mem::take(&mut access.texels);
            for request in &requests {
                texel.resize(request.size, 0);
                self.texture_caches
                    .read_texel(&self.memory, request.address, &mut texel)
                    .map_err(|e| e.at(COMPONENT, "emulate_texture_access"))?;
                self.units.texture.convert_format(&mut access, request, &texel);
            }
            access.texels = requests;

            self.units.texture.filter(&mut access, sample);

            sample += 1;
            if sample >= access.aniso_samples.max(1) {
                break;
            }
        }

        log::trace!("Texture access {} on unit {}: {} samples", access.id, access.unit, sample);
        self.units.shader.write_texture_access(&access);
        self.stats.texture_accesses += 1;
        Ok(())
    }
}
