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

//! Transaction trace drivers
//!
//! A trace driver hands out a finite, non-restartable sequence of transactions. Each
//! transaction is returned exactly once; `None` marks the end of the trace.
//!
//! # Trace File Format
//!
//! | Offset | Content                                              |
//! |--------|------------------------------------------------------|
//! | 0      | Magic `ATTILATR`                                     |
//! | 8      | Format version, u32 little endian                    |
//! | 12     | Transactions, bincode (standard config) one by one   |
//!
//! The file ends after the last transaction; there is no count or terminator.

use std::collections::VecDeque;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Read, Write};
use std::path::Path;

use bincode::config;
use log::debug;

use crate::core::agp::AgpTransaction;
use crate::core::error::{EmulatorError, Result};

/// Trace file magic
pub const TRACE_MAGIC: &[u8; 8] = b"ATTILATR";

/// Trace file format version
pub const TRACE_VERSION: u32 = 1;

/// Source of AGP transactions
pub trait TraceDriver {
    /// Next transaction of the trace, `None` once the trace is exhausted
    fn next_transaction(&mut self) -> Result<Option<AgpTransaction>>;
}

/// In-memory trace
#[derive(Debug, Clone, Default)]
pub struct VecTrace {
    transactions: VecDeque<AgpTransaction>,
}

impl VecTrace {
    pub fn new(transactions: impl IntoIterator<Item = AgpTransaction>) -> Self {
        Self {
            transactions: transactions.into_iter().collect(),
        }
    }

    pub fn push(&mut self, transaction: AgpTransaction) {
        self.transactions.push_back(transaction);
    }

    /// Transactions not handed out yet
    pub fn remaining(&self) -> usize {
        self.transactions.len()
    }
}

impl TraceDriver for VecTrace {
    fn next_transaction(&mut self) -> Result<Option<AgpTransaction>> {
        Ok(self.transactions.pop_front())
    }
}

/// Lazy reader of a trace file
pub struct TraceReader<R: Read> {
    reader: BufReader<R>,
    read: u64,
}

impl TraceReader<File> {
    /// Open a trace file and check its header
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path.as_ref())?;
        debug!("Opened trace {}", path.as_ref().display());
        Self::new(file)
    }
}

impl<R: Read> TraceReader<R> {
    pub fn new(inner: R) -> Result<Self> {
        let mut reader = BufReader::new(inner);

        let mut magic = [0u8; 8];
        reader
            .read_exact(&mut magic)
            .map_err(|_| EmulatorError::TraceFormat("truncated header".into()))?;
        if &magic != TRACE_MAGIC {
            return Err(EmulatorError::TraceFormat("bad magic".into()));
        }

        let mut version = [0u8; 4];
        reader
            .read_exact(&mut version)
            .map_err(|_| EmulatorError::TraceFormat("truncated header".into()))?;
        let version = u32::from_le_bytes(version);
        if version != TRACE_VERSION {
            return Err(EmulatorError::TraceFormat(format!(
                "unsupported version {version} (expected {TRACE_VERSION})"
            )));
        }

        Ok(Self { reader, read: 0 })
    }

    /// Transactions decoded so far
    pub fn transactions_read(&self) -> u64 {
        self.read
    }
}

impl<R: Read> TraceDriver for TraceReader<R> {
    fn next_transaction(&mut self) -> Result<Option<AgpTransaction>> {
        if self.reader.fill_buf()?.is_empty() {
            return Ok(None);
        }

        let transaction: AgpTransaction =
            bincode::serde::decode_from_std_read(&mut self.reader, config::standard()).map_err(|e| {
                EmulatorError::TraceFormat(format!("transaction {}: {}", self.read, e))
            })?;
        self.read += 1;
        Ok(Some(transaction))
    }
}

/// Writer of trace files
pub struct TraceWriter<W: Write> {
    writer: BufWriter<W>,
    written: u64,
}

impl TraceWriter<File> {
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        Self::new(File::create(path)?)
    }
}

impl<W: Write> TraceWriter<W> {
    pub fn new(inner: W) -> Result<Self> {
        let mut writer = BufWriter::new(inner);
        writer.write_all(TRACE_MAGIC)?;
        writer.write_all(&TRACE_VERSION.to_le_bytes())?;
        Ok(Self { writer, written: 0 })
    }

    pub fn write(&mut self, transaction: &AgpTransaction) -> Result<()> {
        bincode::serde::encode_into_std_write(transaction, &mut self.writer, config::standard())
            .map_err(|e| EmulatorError::TraceFormat(e.to_string()))?;
        self.written += 1;
        Ok(())
    }

    /// Flush buffered data and return the number of transactions written
    pub fn finish(mut self) -> Result<u64> {
        self.writer.flush()?;
        Ok(self.written)
    }
}
