// SPDX-License-Identifier: Apache-2.0 OR MIT
// Byte-commit endpoints for formatted records

mod compress;
mod file;

pub use compress::{Compress, GzipCompressor};
pub use file::{FileSink, RotateInterval};

use crate::error::LogError;
use std::io::Write;

/// A byte-commit endpoint.
///
/// `write` appends the bytes exactly once; the terminating newline is the
/// sink's responsibility, not the formatter's. Sinks synchronize internally
/// so a shared reference is enough to write.
pub trait Sink: Send + Sync {
    fn write(&self, bytes: &[u8]) -> Result<(), LogError>;

    /// Flush buffered output. Called once by a route consumer after its
    /// queue drains.
    fn flush(&self) -> Result<(), LogError> {
        Ok(())
    }
}

/// Standard output sink.
pub struct StdoutSink;

impl StdoutSink {
    pub fn new() -> Self {
        Self
    }
}

impl Default for StdoutSink {
    fn default() -> Self {
        Self::new()
    }
}

impl Sink for StdoutSink {
    fn write(&self, bytes: &[u8]) -> Result<(), LogError> {
        let mut out = std::io::stdout().lock();
        out.write_all(bytes)?;
        out.write_all(b"\n")?;
        Ok(())
    }
}
