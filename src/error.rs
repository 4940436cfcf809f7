// Error kinds surfaced by sinks and formatters

use thiserror::Error;

/// Errors raised inside the logging pipeline.
///
/// Route consumers swallow these by design: surfacing a sink failure to the
/// producer would stall or corrupt the producer's own flow.
#[derive(Debug, Error)]
pub enum LogError {
    #[error("I/O failure: {0}")]
    Io(#[from] std::io::Error),

    #[error("rotation failed: {0}")]
    Rotation(#[source] std::io::Error),

    #[error("compression failed: {0}")]
    Compression(#[source] std::io::Error),
}
