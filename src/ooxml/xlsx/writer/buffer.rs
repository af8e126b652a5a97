//! Write buffer that spills to a temporary file.
//!
//! Writes always land in memory. [`SpillBuffer::sync`] moves the in-memory
//! part to a temporary file once it has grown past the threshold, so a
//! streamed worksheet never holds more than one chunk in memory.

use crate::common::error::Result;
use crate::ooxml::opc::PartData;
use std::io::{self, Read, Write};
use tempfile::NamedTempFile;

/// In-memory size at which [`SpillBuffer::sync`] spills (16 MiB).
pub const STREAM_CHUNK_SIZE: usize = 16 << 20;

#[derive(Debug)]
pub struct SpillBuffer {
    buf: Vec<u8>,
    file: Option<NamedTempFile>,
    /// Bytes already moved to the file
    spilled: u64,
    threshold: usize,
}

impl Default for SpillBuffer {
    fn default() -> Self {
        Self::with_threshold(STREAM_CHUNK_SIZE)
    }
}

impl SpillBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_threshold(threshold: usize) -> Self {
        Self {
            buf: Vec::new(),
            file: None,
            spilled: 0,
            threshold,
        }
    }

    #[inline]
    pub fn push_str(&mut self, s: &str) {
        self.buf.extend_from_slice(s.as_bytes());
    }

    /// Total bytes written.
    pub fn len(&self) -> u64 {
        self.spilled + self.buf.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_spilled(&self) -> bool {
        self.file.is_some()
    }

    /// Move the in-memory part to the temporary file if it reached the
    /// threshold.
    pub fn sync(&mut self) -> Result<()> {
        if self.buf.len() < self.threshold {
            return Ok(());
        }
        if self.file.is_none() {
            self.file = Some(NamedTempFile::new()?);
            log::debug!("stream buffer spilled to a temporary file");
        }
        self.spill()
    }

    fn spill(&mut self) -> Result<()> {
        if let Some(file) = self.file.as_mut() {
            file.write_all(&self.buf)?;
            self.spilled += self.buf.len() as u64;
            self.buf.clear();
        }
        Ok(())
    }

    /// Everything written so far as one stream, file content first.
    ///
    /// The file is read through a separate handle, so writing can continue
    /// once the reader is dropped.
    pub fn reader(&self) -> Result<Box<dyn Read + '_>> {
        let tail = self.buf.as_slice();
        match &self.file {
            Some(file) => {
                let head = file.reopen()?.take(self.spilled);
                Ok(Box::new(head.chain(tail)))
            },
            None => Ok(Box::new(tail)),
        }
    }

    /// Finish writing and hand the content over as package part data.
    pub fn into_part_data(mut self) -> Result<PartData> {
        self.spill()?;
        match self.file.take() {
            Some(mut file) => {
                file.flush()?;
                Ok(PartData::Spilled(file))
            },
            None => Ok(PartData::Memory(self.buf)),
        }
    }
}

impl Write for SpillBuffer {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.buf.extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
