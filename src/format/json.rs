// SPDX-License-Identifier: Apache-2.0 OR MIT
// JSON rendering of log records: depth-limited, cycle-safe, sorted keys

use super::{
    rfc3339_nanos, write_json_float, write_json_string, Format, CYCLE_SENTINEL,
    DEFAULT_MAX_DEPTH, MAX_DEPTH_SENTINEL, UNSUPPORTED_MAP_KEY_SENTINEL,
};
use crate::error::LogError;
use crate::pool::{KeyScratch, ScratchBuf, VisitedScratch};
use crate::record::LogRecord;
use crate::style::FormatStyle;
use crate::value::{plan_for, FieldList, FieldMap, FieldMeta, Value};
use base64::{engine::general_purpose, Engine as _};
use std::io::Write;
use std::sync::Arc;

/// Serializes a record as a single JSON object:
/// `{"level":...,"ts":...,"msg":...,<sorted fields>}`.
///
/// Key order is lexicographic at every nesting level, so output is
/// byte-identical across calls regardless of map iteration order. Recursion
/// is bounded by `max_depth` and a per-call visited set breaks cycles.
pub struct JsonFormatter {
    #[allow(dead_code)]
    style: FormatStyle,
    max_depth: usize,
}

impl JsonFormatter {
    pub fn new() -> Self {
        Self {
            style: FormatStyle::default(),
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    /// Styling is accepted for interface parity with the text formatter;
    /// JSON output itself never embeds escapes.
    pub fn with_style(mut self, style: FormatStyle) -> Self {
        self.style = style;
        self
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    fn render(&self, buf: &mut Vec<u8>, v: &Value, depth: usize, visited: &mut VisitedScratch) {
        if depth >= self.max_depth {
            write_json_string(buf, MAX_DEPTH_SENTINEL);
            return;
        }

        match v {
            Value::Duration(d) => write_json_string(buf, &super::humanize_duration(*d)),
            Value::Timestamp(ts) => write_json_string(buf, &rfc3339_nanos(ts)),
            Value::Null => buf.extend_from_slice(b"null"),
            Value::Bool(b) => buf.extend_from_slice(if *b { b"true" } else { b"false" }),
            Value::Int(i) => {
                let _ = write!(buf, "{i}");
            }
            Value::Uint(u) => {
                let _ = write!(buf, "{u}");
            }
            Value::Float(f) => write_json_float(buf, *f),
            Value::Str(s) => write_json_string(buf, s),
            Value::Error(s) | Value::Display(s) => write_json_string(buf, s),
            Value::Bytes(bytes) => {
                write_json_string(buf, &general_purpose::STANDARD.encode(bytes))
            }
            Value::Seq(list) => self.render_seq(buf, list, depth, visited),
            Value::Map(map) => self.render_map(buf, map, depth, visited),
            Value::Record(meta) => self.render_record(buf, meta, depth, visited),
            Value::UnsupportedMapKey => write_json_string(buf, UNSUPPORTED_MAP_KEY_SENTINEL),
            Value::Unsupported(kind) => {
                write_json_string(buf, &format!("<unsupported:{kind}>"))
            }
        }
    }

    fn render_seq(
        &self,
        buf: &mut Vec<u8>,
        list: &FieldList,
        depth: usize,
        visited: &mut VisitedScratch,
    ) {
        let id = list.identity();
        if !visited.enter(id) {
            write_json_string(buf, CYCLE_SENTINEL);
            return;
        }

        list.with_items(|items| {
            buf.push(b'[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    buf.push(b',');
                }
                self.render(buf, item, depth + 1, visited);
            }
            buf.push(b']');
        });

        visited.leave(id);
    }

    fn render_map(
        &self,
        buf: &mut Vec<u8>,
        map: &FieldMap,
        depth: usize,
        visited: &mut VisitedScratch,
    ) {
        let id = map.identity();
        if !visited.enter(id) {
            write_json_string(buf, CYCLE_SENTINEL);
            return;
        }

        map.with_entries(|entries| {
            let mut keys = KeyScratch::checkout();
            keys.extend(entries.keys().map(String::as_str));
            keys.sort_unstable();

            buf.push(b'{');
            for (i, key) in keys.iter().enumerate() {
                if i > 0 {
                    buf.push(b',');
                }
                write_json_string(buf, key);
                buf.push(b':');
                if let Some(value) = entries.get(*key) {
                    self.render(buf, value, depth + 1, visited);
                }
            }
            buf.push(b'}');
        });

        visited.leave(id);
    }

    fn render_record(
        &self,
        buf: &mut Vec<u8>,
        meta: &Arc<dyn FieldMeta>,
        depth: usize,
        visited: &mut VisitedScratch,
    ) {
        let id = Arc::as_ptr(meta) as *const () as usize;
        if !visited.enter(id) {
            write_json_string(buf, CYCLE_SENTINEL);
            return;
        }

        let plan = plan_for(meta.as_ref());
        let values = meta.field_values();

        let mut entries: Vec<(&str, &Value)> = Vec::with_capacity(values.len());
        for directive in &plan.fields {
            if directive.skip {
                continue;
            }
            let Some((_, value)) = values.iter().find(|(name, _)| *name == directive.name)
            else {
                continue;
            };
            if directive.omit_zero && value.is_zero() {
                continue;
            }
            entries.push((directive.key.as_str(), value));
        }
        entries.sort_unstable_by(|a, b| a.0.cmp(b.0));

        buf.push(b'{');
        for (i, (key, value)) in entries.iter().enumerate() {
            if i > 0 {
                buf.push(b',');
            }
            write_json_string(buf, key);
            buf.push(b':');
            self.render(buf, value, depth + 1, visited);
        }
        buf.push(b'}');

        visited.leave(id);
    }
}

impl Default for JsonFormatter {
    fn default() -> Self {
        Self::new()
    }
}

impl Format for JsonFormatter {
    fn format(&self, record: &LogRecord) -> Result<Vec<u8>, LogError> {
        let mut buf = ScratchBuf::checkout();

        buf.push(b'{');
        write_json_string(&mut buf, "level");
        buf.push(b':');
        write_json_string(&mut buf, record.level.as_str());

        buf.push(b',');
        write_json_string(&mut buf, "ts");
        buf.push(b':');
        write_json_string(&mut buf, &rfc3339_nanos(&record.timestamp));

        buf.push(b',');
        write_json_string(&mut buf, "msg");
        buf.push(b':');
        write_json_string(&mut buf, &record.message);

        if let Some(caller) = &record.caller {
            buf.push(b',');
            write_json_string(&mut buf, "caller");
            buf.push(b':');
            write_json_string(&mut buf, caller);
        }

        if !record.fields.is_empty() {
            buf.push(b',');
            let mut keys = KeyScratch::checkout();
            keys.extend(record.fields.keys().map(String::as_str));
            keys.sort_unstable();

            let mut visited = VisitedScratch::checkout();
            for (i, key) in keys.iter().enumerate() {
                if i > 0 {
                    buf.push(b',');
                }
                write_json_string(&mut buf, key);
                buf.push(b':');
                if let Some(value) = record.fields.get(*key) {
                    self.render(&mut buf, value, 0, &mut visited);
                }
            }
        }

        buf.push(b'}');
        Ok(buf.copy_out())
    }
}
