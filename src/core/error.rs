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

/// Emulator error types
use std::fmt;
use thiserror::Error;

/// Result type for emulator operations
pub type Result<T> = std::result::Result<T, EmulatorError>;

/// Component and operation where a fatal condition was detected
///
/// Every protocol or topology error is tagged with the emulator component and the
/// operation that raised it so a halted run can be traced back to its origin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Site {
    pub component: &'static str,
    pub operation: &'static str,
}

impl Site {
    pub const fn new(component: &'static str, operation: &'static str) -> Self {
        Self {
            component,
            operation,
        }
    }
}

impl fmt::Display for Site {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}", self.component, self.operation)
    }
}

/// Main error type for the emulator
///
/// All variants are fatal for the emulation run: they are propagated up through the
/// command processor and draw pipeline and surface at the run loop.
#[derive(Error, Debug)]
pub enum EmulatorError {
    #[error("[{site}] protocol error: {kind}")]
    Protocol { site: Site, kind: ProtocolError },

    #[error("[{site}] topology error: {kind}")]
    Topology { site: Site, kind: TopologyError },

    #[error("Allocation of {what} ({bytes} bytes) failed")]
    Allocation { what: &'static str, bytes: usize },

    #[error("No {unit} unit attached to the emulator")]
    UnitUnavailable { unit: &'static str },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Snapshot error: {0}")]
    Snapshot(String),

    #[error("Trace format error: {0}")]
    TraceFormat(String),

    #[error("Image encoding error: {0}")]
    Image(String),
}

/// Protocol errors: the transaction stream asked for something the GPU cannot do
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProtocolError {
    #[error("Unknown register id {id}")]
    UnknownRegister { id: u32 },

    #[error("Register {register} is read-only")]
    ReadOnlyRegister { register: &'static str },

    #[error("Sub-index {index} out of range for {register} (max {max})")]
    SubIndexOutOfRange {
        register: &'static str,
        index: u32,
        max: u32,
    },

    #[error("Value {value} out of range for {register}")]
    ValueOutOfRange {
        register: &'static str,
        value: String,
    },

    #[error("Register {register} expects a {expected} value")]
    ValueType {
        register: &'static str,
        expected: &'static str,
    },

    #[error("Unknown GPU command code {code}")]
    UnknownCommand { code: u32 },

    #[error("Unsupported GPU command {command}")]
    UnsupportedCommand { command: &'static str },

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("Invalid address space bits in address {address:#010x}")]
    InvalidAddressSpace { address: u64 },

    #[error("Access of {size} bytes at offset {offset:#x} overflows {space} memory ({limit} bytes)")]
    AddressOverflow {
        space: &'static str,
        offset: u64,
        size: usize,
        limit: usize,
    },
}

impl ProtocolError {
    /// Tag the error with the component and operation that raised it
    pub fn at(self, component: &'static str, operation: &'static str) -> EmulatorError {
        EmulatorError::Protocol {
            site: Site::new(component, operation),
            kind: self,
        }
    }
}

/// Topology errors: primitive assembly could not build triangles from the draw call
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TopologyError {
    #[error("Primitive type {0} is not implemented")]
    UnimplementedPrimitive(&'static str),

    #[error("Vertex for index {index} was not shaded before assembly")]
    MissingVertex { index: u32 },
}

impl TopologyError {
    /// Tag the error with the component and operation that raised it
    pub fn at(self, component: &'static str, operation: &'static str) -> EmulatorError {
        EmulatorError::Topology {
            site: Site::new(component, operation),
            kind: self,
        }
    }
}
