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

//! Address space decoding

use crate::core::error::ProtocolError;

/// Mask of the address bits selecting the memory space
pub const ADDRESS_SPACE_MASK: u32 = 0xC000_0000;

/// Space bits of GPU local memory
pub const GPU_ADDRESS_SPACE: u32 = 0x0000_0000;

/// Space bits of system memory
pub const SYSTEM_ADDRESS_SPACE: u32 = 0x8000_0000;

/// Mask of the in-space offset bits
pub const SPACE_OFFSET_MASK: u32 = 0x3FFF_FFFF;

/// Memory space selected by the top address bits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemorySelector {
    Gpu,
    System,
}

impl MemorySelector {
    /// Split a bus address into its memory space and in-space offset
    ///
    /// # Arguments
    ///
    /// * `address` - Bus address. Values wider than 32 bits are invalid.
    ///
    /// # Returns
    ///
    /// `InvalidAddressSpace` when the space bits name neither memory
    ///
    /// # Example
    ///
    /// ```
    /// use attila_emu::core::memory::MemorySelector;
    ///
    /// let (space, offset) = MemorySelector::decode(0x8000_1000).unwrap();
    /// assert_eq!(space, MemorySelector::System);
    /// assert_eq!(offset, 0x1000);
    /// assert!(MemorySelector::decode(0x4000_0000).is_err());
    /// ```
    #[inline(always)]
    pub fn decode(address: u64) -> Result<(MemorySelector, u64), ProtocolError> {
        let address32 =
            u32::try_from(address).map_err(|_| ProtocolError::InvalidAddressSpace { address })?;
        let offset = (address32 & SPACE_OFFSET_MASK) as u64;
        match address32 & ADDRESS_SPACE_MASK {
            GPU_ADDRESS_SPACE => Ok((MemorySelector::Gpu, offset)),
            SYSTEM_ADDRESS_SPACE => Ok((MemorySelector::System, offset)),
            _ => Err(ProtocolError::InvalidAddressSpace { address }),
        }
    }

    /// Space bits to OR into an offset to address this space
    pub fn space_bits(self) -> u32 {
        match self {
            MemorySelector::Gpu => GPU_ADDRESS_SPACE,
            MemorySelector::System => SYSTEM_ADDRESS_SPACE,
        }
    }
}
