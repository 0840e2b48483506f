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

//! Emulated GPU memory
//!
//! The GPU sees two flat byte arrays: GPU-local memory and system memory mapped through
//! the bus. The top bits of an address select the space and the remaining bits are the
//! offset inside it.
//!
//! # Address Layout
//!
//! | Bits 31-30 | Space          |
//! |------------|----------------|
//! | `00`       | GPU memory     |
//! | `10`       | System memory  |
//! | other      | invalid        |
//!
//! Every access is bounds checked: `offset + size` must not exceed the space size.
//!
//! # Example
//!
//! ```
//! use attila_emu::core::memory::{Memory, SYSTEM_ADDRESS_SPACE};
//!
//! let mut memory = Memory::new(1024, 1024).unwrap();
//! memory.write(SYSTEM_ADDRESS_SPACE | 0x10, &[1, 2, 3, 4]).unwrap();
//! assert_eq!(memory.read(SYSTEM_ADDRESS_SPACE as u64 | 0x10, 4).unwrap(), &[1, 2, 3, 4]);
//! ```

mod region;
#[cfg(test)]
mod tests;

pub use region::{
    MemorySelector, ADDRESS_SPACE_MASK, GPU_ADDRESS_SPACE, SPACE_OFFSET_MASK,
    SYSTEM_ADDRESS_SPACE,
};

use crate::core::error::{EmulatorError, ProtocolError, Result};

/// One contiguous emulated memory space
#[derive(Debug, Clone, PartialEq)]
pub struct MemorySpace {
    name: &'static str,
    data: Vec<u8>,
}

impl MemorySpace {
    /// Allocate a zero filled memory space
    ///
    /// # Arguments
    ///
    /// * `name` - Space name used in diagnostics ("gpu" or "system")
    /// * `size` - Size in bytes
    ///
    /// # Returns
    ///
    /// An allocation error if the backing buffer cannot be reserved
    pub fn new(name: &'static str, size: usize) -> Result<Self> {
        let mut data = Vec::new();
        data.try_reserve_exact(size)
            .map_err(|_| EmulatorError::Allocation { what: name, bytes: size })?;
        data.resize(size, 0);
        Ok(Self { name, data })
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Raw contents of the whole space
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Replace the whole contents; the size must match
    pub fn load_bytes(&mut self, bytes: &[u8]) -> std::result::Result<(), ProtocolError> {
        if bytes.len() != self.data.len() {
            return Err(ProtocolError::AddressOverflow {
                space: self.name,
                offset: 0,
                size: bytes.len(),
                limit: self.data.len(),
            });
        }
        self.data.copy_from_slice(bytes);
        Ok(())
    }

    #[inline(always)]
    fn range(&self, offset: u64, size: usize) -> std::result::Result<std::ops::Range<usize>, ProtocolError> {
        let overflow = || ProtocolError::AddressOverflow {
            space: self.name,
            offset,
            size,
            limit: self.data.len(),
        };
        let start = usize::try_from(offset).map_err(|_| overflow())?;
        let end = start.checked_add(size).ok_or_else(overflow)?;
        if end > self.data.len() {
            return Err(overflow());
        }
        Ok(start..end)
    }

    /// Borrow `size` bytes at `offset`
    pub fn slice(&self, offset: u64, size: usize) -> std::result::Result<&[u8], ProtocolError> {
        let range = self.range(offset, size)?;
        Ok(&self.data[range])
    }

    /// Mutably borrow `size` bytes at `offset`
    pub fn slice_mut(&mut self, offset: u64, size: usize) -> std::result::Result<&mut [u8], ProtocolError> {
        let range = self.range(offset, size)?;
        Ok(&mut self.data[range])
    }

    /// Copy `data` into the space at `offset`
    pub fn write(&mut self, offset: u64, data: &[u8]) -> std::result::Result<(), ProtocolError> {
        self.slice_mut(offset, data.len())?.copy_from_slice(data);
        Ok(())
    }

    #[inline(always)]
    pub fn read_u32(&self, offset: u64) -> std::result::Result<u32, ProtocolError> {
        let bytes = self.slice(offset, 4)?;
        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    #[inline(always)]
    pub fn write_u32(&mut self, offset: u64, value: u32) -> std::result::Result<(), ProtocolError> {
        self.write(offset, &value.to_le_bytes())
    }

    /// Fill the whole space with a byte value
    pub fn fill(&mut self, value: u8) {
        self.data.fill(value);
    }
}

/// GPU memory and system memory behind one address decoder
#[derive(Debug, Clone, PartialEq)]
pub struct Memory {
    gpu: MemorySpace,
    system: MemorySpace,
}

impl Memory {
    /// Allocate both memory spaces
    ///
    /// # Arguments
    ///
    /// * `gpu_size` - GPU memory size in bytes
    /// * `system_size` - System memory size in bytes
    pub fn new(gpu_size: usize, system_size: usize) -> Result<Self> {
        Ok(Self {
            gpu: MemorySpace::new("gpu", gpu_size)?,
            system: MemorySpace::new("system", system_size)?,
        })
    }

    pub fn space(&self, selector: MemorySelector) -> &MemorySpace {
        match selector {
            MemorySelector::Gpu => &self.gpu,
            MemorySelector::System => &self.system,
        }
    }

    pub fn space_mut(&mut self, selector: MemorySelector) -> &mut MemorySpace {
        match selector {
            MemorySelector::Gpu => &mut self.gpu,
            MemorySelector::System => &mut self.system,
        }
    }

    pub fn gpu(&self) -> &MemorySpace {
        &self.gpu
    }

    pub fn system(&self) -> &MemorySpace {
        &self.system
    }

    /// Borrow `size` bytes at a bus address
    pub fn read(&self, address: u64, size: usize) -> std::result::Result<&[u8], ProtocolError> {
        let (selector, offset) = MemorySelector::decode(address)?;
        self.space(selector).slice(offset, size)
    }

    /// Mutably borrow `size` bytes at a bus address
    pub fn slice_mut(&mut self, address: u64, size: usize) -> std::result::Result<&mut [u8], ProtocolError> {
        let (selector, offset) = MemorySelector::decode(address)?;
        self.space_mut(selector).slice_mut(offset, size)
    }

    /// Copy `data` to a bus address
    pub fn write(&mut self, address: u32, data: &[u8]) -> std::result::Result<(), ProtocolError> {
        let (selector, offset) = MemorySelector::decode(address as u64)?;
        self.space_mut(selector).write(offset, data)
    }

    pub fn read_u32(&self, address: u64) -> std::result::Result<u32, ProtocolError> {
        let (selector, offset) = MemorySelector::decode(address)?;
        self.space(selector).read_u32(offset)
    }

    pub fn write_u32(&mut self, address: u64, value: u32) -> std::result::Result<(), ProtocolError> {
        let (selector, offset) = MemorySelector::decode(address)?;
        self.space_mut(selector).write_u32(offset, value)
    }
}
