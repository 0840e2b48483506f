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

//! Validation logs and framebuffer update maps
//!
//! The validation log records every shaded vertex and every Z/stencil and color write
//! so a run can be compared against another implementation of the pipeline. Update maps
//! track which pixels of each buffer were written since the last swap.

use std::collections::BTreeMap;
use std::path::Path;

use serde::Serialize;

use super::types::{QuadFloat, MAX_RENDER_TARGETS, MAX_VERTEX_ATTRIBUTES};
use crate::core::error::Result;

/// Per pixel written flags of one buffer
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdateMap {
    width: u32,
    height: u32,
    written: Vec<bool>,
}

impl UpdateMap {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            written: vec![false; width as usize * height as usize],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Pixel written since the last clear; out of range pixels are never written
    pub fn is_written(&self, x: u32, y: u32) -> bool {
        x < self.width && y < self.height && self.written[self.index(x, y)]
    }

    pub fn written_count(&self) -> usize {
        self.written.iter().filter(|&&w| w).count()
    }

    pub fn mark(&mut self, x: u32, y: u32) {
        if x < self.width && y < self.height {
            let i = self.index(x, y);
            self.written[i] = true;
        }
    }

    /// Mark every pixel
    pub fn fill(&mut self) {
        self.written.fill(true);
    }

    pub fn clear(&mut self) {
        self.written.fill(false);
    }

    fn index(&self, x: u32, y: u32) -> usize {
        y as usize * self.width as usize + x as usize
    }
}

/// Update maps of the Z/stencil buffer and the render targets
#[derive(Debug, Clone, Default)]
pub(in crate::core::gpu) struct UpdateMaps {
    z_stencil: UpdateMap,
    color: [UpdateMap; MAX_RENDER_TARGETS],
}

impl UpdateMaps {
    /// Reallocate for a new display resolution, dropping all marks
    pub fn resize(&mut self, width: u32, height: u32) {
        if self.z_stencil.width == width && self.z_stencil.height == height {
            return;
        }
        self.z_stencil = UpdateMap::new(width, height);
        for map in self.color.iter_mut() {
            *map = UpdateMap::new(width, height);
        }
    }

    pub fn clear(&mut self) {
        self.z_stencil.clear();
        for map in self.color.iter_mut() {
            map.clear();
        }
    }

    pub fn mark_z(&mut self, x: u32, y: u32) {
        self.z_stencil.mark(x, y);
    }

    pub fn mark_color(&mut self, rt: usize, x: u32, y: u32) {
        self.color[rt].mark(x, y);
    }

    pub fn fill_z(&mut self) {
        self.z_stencil.fill();
    }

    pub fn fill_color(&mut self, rt: usize) {
        self.color[rt].fill();
    }

    pub fn z_stencil(&self) -> &UpdateMap {
        &self.z_stencil
    }

    pub fn color(&self, rt: usize) -> Option<&UpdateMap> {
        self.color.get(rt)
    }
}

/// Identifies one sample written by one triangle
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct FragmentKey {
    pub x: i32,
    pub y: i32,
    pub triangle: u64,
    pub sample: u32,
}

impl FragmentKey {
    pub fn new(x: i32, y: i32, triangle: u64, sample: u32) -> Self {
        Self { x, y, triangle, sample }
    }
}

/// Inputs and outputs of one vertex shader invocation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VertexRecord {
    pub index: u32,
    pub instance: u32,
    pub inputs: [QuadFloat; MAX_VERTEX_ATTRIBUTES],
    pub outputs: [QuadFloat; MAX_VERTEX_ATTRIBUTES],
}

/// Z/stencil test of one sample
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ZStencilRecord {
    /// Incoming fragment depth
    pub depth: u32,
    /// Buffer word before the test
    pub read: u32,
    /// Buffer word after the test, before write masking
    pub written: u32,
    pub culled: bool,
}

/// Color write of one sample
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColorRecord {
    /// Shaded color
    pub input: QuadFloat,
    /// Stored bytes before the write
    pub read: Vec<u8>,
    /// Stored bytes after the write
    pub written: Vec<u8>,
}

#[derive(Serialize)]
struct Entry<'a, R> {
    #[serde(flatten)]
    key: &'a FragmentKey,
    #[serde(flatten)]
    record: &'a R,
}

#[derive(Serialize)]
struct Export<'a> {
    vertices: Vec<&'a VertexRecord>,
    z_stencil: Vec<Entry<'a, ZStencilRecord>>,
    color: Vec<Vec<Entry<'a, ColorRecord>>>,
}

/// Validation records of a run
///
/// Keyed records keep the last write of every (pixel, triangle, sample).
#[derive(Debug, Clone, Default)]
pub struct ValidationLog {
    vertices: BTreeMap<(u32, u32), VertexRecord>,
    z_stencil: BTreeMap<FragmentKey, ZStencilRecord>,
    color: [BTreeMap<FragmentKey, ColorRecord>; MAX_RENDER_TARGETS],
}

impl ValidationLog {
    pub fn record_vertex(
        &mut self,
        index: u32,
        instance: u32,
        inputs: &[QuadFloat; MAX_VERTEX_ATTRIBUTES],
        outputs: &[QuadFloat; MAX_VERTEX_ATTRIBUTES],
    ) {
        self.vertices.insert(
            (instance, index),
            VertexRecord {
                index,
                instance,
                inputs: *inputs,
                outputs: *outputs,
            },
        );
    }

    pub fn record_z_stencil(&mut self, key: FragmentKey, record: ZStencilRecord) {
        self.z_stencil.insert(key, record);
    }

    pub fn record_color(&mut self, rt: usize, key: FragmentKey, record: ColorRecord) {
        self.color[rt].insert(key, record);
    }

    pub fn vertex(&self, instance: u32, index: u32) -> Option<&VertexRecord> {
        self.vertices.get(&(instance, index))
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn z_stencil(&self, key: &FragmentKey) -> Option<&ZStencilRecord> {
        self.z_stencil.get(key)
    }

    pub fn z_stencil_count(&self) -> usize {
        self.z_stencil.len()
    }

    pub fn color(&self, rt: usize, key: &FragmentKey) -> Option<&ColorRecord> {
        self.color.get(rt).and_then(|records| records.get(key))
    }

    pub fn color_count(&self, rt: usize) -> usize {
        self.color.get(rt).map_or(0, BTreeMap::len)
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// Serialize all records as pretty printed JSON
    pub fn to_json(&self) -> Result<String> {
        let export = Export {
            vertices: self.vertices.values().collect(),
            z_stencil: self
                .z_stencil
                .iter()
                .map(|(key, record)| Entry { key, record })
                .collect(),
            color: self
                .color
                .iter()
                .map(|records| records.iter().map(|(key, record)| Entry { key, record }).collect())
                .collect(),
        };
        Ok(serde_json::to_string_pretty(&export)?)
    }

    pub fn save_json(&self, path: impl AsRef<Path>) -> Result<()> {
        std::fs::write(path, self.to_json()?)?;
        log::info!(
            "Validation log saved: {} vertices, {} z/stencil samples",
            self.vertices.len(),
            self.z_stencil.len()
        );
        Ok(())
    }
}
