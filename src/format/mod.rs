// SPDX-License-Identifier: Apache-2.0 OR MIT
// Formatter contract and the rendering helpers shared by JSON and text

mod json;
mod text;

pub use json::JsonFormatter;
pub use text::TextFormatter;

use crate::error::LogError;
use crate::record::LogRecord;
use chrono::{DateTime, SecondsFormat, Utc};
use std::borrow::Cow;
use std::io::Write;
use std::time::Duration;

/// Contract for any log record formatter.
///
/// Takes a structured record and serializes it into the byte form a sink
/// commits. Implementations must be safe for concurrent invocation and must
/// not retain references to the record across the call.
pub trait Format: Send + Sync {
    fn format(&self, record: &LogRecord) -> Result<Vec<u8>, LogError>;
}

/// Recursion depth applied when a formatter is built without an explicit one.
pub const DEFAULT_MAX_DEPTH: usize = 3;

pub(crate) const MAX_DEPTH_SENTINEL: &str = "<max_depth>";
pub(crate) const CYCLE_SENTINEL: &str = "<cycle>";
pub(crate) const UNSUPPORTED_MAP_KEY_SENTINEL: &str = "<unsupported_map_key>";

/// Normalize CRLF to LF and prefix every continuation line with `| ` so
/// multi-line values stay visually grouped in the output stream.
pub(crate) fn continue_multiline(s: &str) -> Cow<'_, str> {
    if !s.contains('\n') {
        return Cow::Borrowed(s);
    }
    Cow::Owned(s.replace("\r\n", "\n").replace('\n', "\n| "))
}

/// Write `s` as a JSON string literal, after the multiline transform.
pub(crate) fn write_json_string(buf: &mut Vec<u8>, s: &str) {
    let s = continue_multiline(s);
    buf.push(b'"');
    for c in s.chars() {
        match c {
            '"' => buf.extend_from_slice(b"\\\""),
            '\\' => buf.extend_from_slice(b"\\\\"),
            '\n' => buf.extend_from_slice(b"\\n"),
            '\r' => buf.extend_from_slice(b"\\r"),
            '\t' => buf.extend_from_slice(b"\\t"),
            c if (c as u32) < 0x20 => {
                let _ = write!(buf, "\\u{:04x}", c as u32);
            }
            c => {
                let mut utf8 = [0u8; 4];
                buf.extend_from_slice(c.encode_utf8(&mut utf8).as_bytes());
            }
        }
    }
    buf.push(b'"');
}

/// Write a float as JSON. Non-finite values become quoted strings because
/// JSON has no representation for them; both zeroes collapse to `0`.
pub(crate) fn write_json_float(buf: &mut Vec<u8>, f: f64) {
    if f.is_nan() {
        write_json_string(buf, "NaN");
    } else if f == f64::INFINITY {
        write_json_string(buf, "Infinity");
    } else if f == f64::NEG_INFINITY {
        write_json_string(buf, "-Infinity");
    } else if f == 0.0 {
        buf.extend_from_slice(b"0");
    } else {
        let _ = write!(buf, "{f}");
    }
}

/// Float token for the text formatter; non-finite values stay bare.
pub(crate) fn text_float(f: f64) -> String {
    if f.is_nan() {
        "NaN".to_string()
    } else if f == f64::INFINITY {
        "+Inf".to_string()
    } else if f == f64::NEG_INFINITY {
        "-Inf".to_string()
    } else {
        format!("{f}")
    }
}

/// Pad a level name with spaces to the alignment width.
pub(crate) fn pad_level(level: &str) -> String {
    format!("{level:<7}")
}

/// RFC-3339 with subsecond digits, trailing zero groups trimmed.
pub(crate) fn rfc3339_nanos(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

/// Compact human form of an elapsed time: `"742µs"`, `"1.5s"`, `"1h0m12s"`.
pub(crate) fn humanize_duration(d: Duration) -> String {
    let nanos = d.as_nanos();
    if nanos == 0 {
        return "0s".to_string();
    }
    if nanos < 1_000 {
        return format!("{nanos}ns");
    }
    if nanos < 1_000_000 {
        return with_fraction(nanos / 1_000, nanos % 1_000, 3, "µs");
    }
    if nanos < 1_000_000_000 {
        return with_fraction(nanos / 1_000_000, nanos % 1_000_000, 6, "ms");
    }

    let secs = d.as_secs();
    let seconds = with_fraction(u128::from(secs % 60), u128::from(d.subsec_nanos()), 9, "s");
    let minutes = (secs / 60) % 60;
    let hours = secs / 3600;
    if hours > 0 {
        format!("{hours}h{minutes}m{seconds}")
    } else if minutes > 0 {
        format!("{minutes}m{seconds}")
    } else {
        seconds
    }
}

fn with_fraction(whole: u128, frac: u128, width: usize, unit: &str) -> String {
    if frac == 0 {
        return format!("{whole}{unit}");
    }
    let digits = format!("{frac:0width$}");
    let trimmed = digits.trim_end_matches('0');
    format!("{whole}.{trimmed}{unit}")
}
