// Log levels for routed logging

use serde::{Deserialize, Serialize};

/// Log severity levels (higher is more severe)
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum LogLevel {
    /// Fine-grained diagnostics (hot-path traces)
    Trace = 0,
    /// Debug-level messages
    Debug = 10,
    /// Informational messages (normal operation)
    Info = 20,
    /// Warning conditions (degraded but operating)
    Warning = 30,
    /// Error conditions
    Error = 40,
    /// Faults reported by the host with a backtrace or equivalent
    Exception = 50,
}

impl LogLevel {
    /// Get the level as its stable wire value
    #[inline]
    pub const fn as_i32(self) -> i32 {
        self as i32
    }

    /// Get the level name as a static string
    pub const fn as_str(self) -> &'static str {
        match self {
            LogLevel::Trace => "TRACE",
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warning => "WARNING",
            LogLevel::Error => "ERROR",
            LogLevel::Exception => "EXCEPTION",
        }
    }

    /// ANSI escape used when a formatter colorizes the level token
    pub const fn color(self) -> &'static str {
        match self {
            LogLevel::Trace => "\x1b[90m",
            LogLevel::Debug => "\x1b[34m",
            LogLevel::Info => "\x1b[32m",
            LogLevel::Warning => "\x1b[33m",
            LogLevel::Error => "\x1b[31m",
            LogLevel::Exception => "\x1b[1;31m",
        }
    }

    /// Create from a wire value (returns None if invalid)
    pub const fn from_i32(value: i32) -> Option<Self> {
        match value {
            0 => Some(LogLevel::Trace),
            10 => Some(LogLevel::Debug),
            20 => Some(LogLevel::Info),
            30 => Some(LogLevel::Warning),
            40 => Some(LogLevel::Error),
            50 => Some(LogLevel::Exception),
            _ => None,
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
