// SPDX-License-Identifier: Apache-2.0 OR MIT
// Human-readable single-line rendering with optional ANSI styling

use super::{
    humanize_duration, pad_level, rfc3339_nanos, text_float, write_json_string, Format,
    CYCLE_SENTINEL, DEFAULT_MAX_DEPTH, MAX_DEPTH_SENTINEL, UNSUPPORTED_MAP_KEY_SENTINEL,
};
use crate::error::LogError;
use crate::pool::{KeyScratch, ScratchBuf, VisitedScratch};
use crate::record::LogRecord;
use crate::style::FormatStyle;
use crate::value::{plan_for, FieldList, FieldMap, FieldMeta, Value};
use chrono::Local;
use std::io::Write;
use std::sync::Arc;

/// Serializes a record as one aligned text line:
/// `[<wall clock>] <LEVEL>  → <message> | k=v k=v`.
///
/// Keys, values, and the level token are optionally wrapped in the style's
/// ANSI escapes. The value grammar matches the JSON formatter's dispatch,
/// with text separators (`", "`, `": "`) and unquoted sentinels.
pub struct TextFormatter {
    style: FormatStyle,
    max_depth: usize,
}

impl TextFormatter {
    pub fn new() -> Self {
        Self {
            style: FormatStyle::default(),
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    pub fn with_style(mut self, style: FormatStyle) -> Self {
        self.style = style;
        self
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    fn write_key(&self, buf: &mut Vec<u8>, key: &str) {
        if self.style.color_keys {
            buf.extend_from_slice(self.style.key_color.as_bytes());
            buf.extend_from_slice(key.as_bytes());
            buf.extend_from_slice(self.style.reset.as_bytes());
        } else {
            buf.extend_from_slice(key.as_bytes());
        }
    }

    fn write_value_token(&self, buf: &mut Vec<u8>, token: &str) {
        if self.style.color_values {
            buf.extend_from_slice(self.style.value_color.as_bytes());
            buf.extend_from_slice(token.as_bytes());
            buf.extend_from_slice(self.style.reset.as_bytes());
        } else {
            buf.extend_from_slice(token.as_bytes());
        }
    }

    /// Quoted string token, escaped like a JSON literal (after the
    /// multiline transform), optionally colorized.
    fn write_quoted(&self, buf: &mut Vec<u8>, s: &str) {
        if self.style.color_values {
            buf.extend_from_slice(self.style.value_color.as_bytes());
            write_json_string(buf, s);
            buf.extend_from_slice(self.style.reset.as_bytes());
        } else {
            write_json_string(buf, s);
        }
    }

    fn render(&self, buf: &mut Vec<u8>, v: &Value, depth: usize, visited: &mut VisitedScratch) {
        if depth >= self.max_depth {
            self.write_value_token(buf, MAX_DEPTH_SENTINEL);
            return;
        }

        match v {
            Value::Duration(d) => self.write_value_token(buf, &humanize_duration(*d)),
            Value::Timestamp(ts) => self.write_value_token(buf, &rfc3339_nanos(ts)),
            Value::Null => self.write_value_token(buf, "null"),
            Value::Bool(b) => self.write_value_token(buf, if *b { "true" } else { "false" }),
            Value::Int(i) => self.write_value_token(buf, &i.to_string()),
            Value::Uint(u) => self.write_value_token(buf, &u.to_string()),
            Value::Float(f) => self.write_value_token(buf, &text_float(*f)),
            Value::Str(s) => self.write_quoted(buf, s),
            Value::Error(s) | Value::Display(s) => self.write_quoted(buf, s),
            Value::Bytes(bytes) => {
                self.write_value_token(buf, &format!("[]byte({})", bytes.len()))
            }
            Value::Seq(list) => self.render_seq(buf, list, depth, visited),
            Value::Map(map) => self.render_map(buf, map, depth, visited),
            Value::Record(meta) => self.render_record(buf, meta, depth, visited),
            Value::UnsupportedMapKey => {
                self.write_value_token(buf, UNSUPPORTED_MAP_KEY_SENTINEL)
            }
            Value::Unsupported(kind) => {
                self.write_value_token(buf, &format!("<unsupported:{kind}>"))
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
            self.write_value_token(buf, CYCLE_SENTINEL);
            return;
        }

        list.with_items(|items| {
            buf.push(b'[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    buf.extend_from_slice(b", ");
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
            self.write_value_token(buf, CYCLE_SENTINEL);
            return;
        }

        map.with_entries(|entries| {
            let mut keys = KeyScratch::checkout();
            keys.extend(entries.keys().map(String::as_str));
            keys.sort_unstable();

            buf.push(b'{');
            for (i, key) in keys.iter().enumerate() {
                if i > 0 {
                    buf.extend_from_slice(b", ");
                }
                self.write_key(buf, key);
                buf.extend_from_slice(b": ");
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
            self.write_value_token(buf, CYCLE_SENTINEL);
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
                buf.extend_from_slice(b", ");
            }
            self.write_key(buf, key);
            buf.extend_from_slice(b": ");
            self.render(buf, value, depth + 1, visited);
        }
        buf.push(b'}');

        visited.leave(id);
    }
}

impl Default for TextFormatter {
    fn default() -> Self {
        Self::new()
    }
}

impl Format for TextFormatter {
    fn format(&self, record: &LogRecord) -> Result<Vec<u8>, LogError> {
        let mut buf = ScratchBuf::checkout();

        let wall = record.timestamp.with_timezone(&Local);
        let _ = write!(buf, "[{}] ", wall.format("%Y-%m-%d %H:%M:%S%.3f"));

        if self.style.color_level {
            buf.extend_from_slice(record.level.color().as_bytes());
        }
        buf.extend_from_slice(pad_level(record.level.as_str()).as_bytes());
        if self.style.color_level {
            buf.extend_from_slice(self.style.reset.as_bytes());
        }
        buf.push(b' ');

        buf.extend_from_slice("→ ".as_bytes());
        buf.extend_from_slice(record.message.as_bytes());

        if let Some(caller) = &record.caller {
            let _ = write!(buf, " ({caller})");
        }

        if !record.fields.is_empty() {
            buf.extend_from_slice(b" |");

            let mut keys = KeyScratch::checkout();
            keys.extend(record.fields.keys().map(String::as_str));
            keys.sort_unstable();

            let mut visited = VisitedScratch::checkout();
            for key in keys.iter() {
                buf.push(b' ');
                self.write_key(&mut buf, key);
                buf.push(b'=');
                if let Some(value) = record.fields.get(*key) {
                    self.render(&mut buf, value, 0, &mut visited);
                }
            }
        }

        Ok(buf.copy_out())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::level::LogLevel;
    use chrono::{TimeZone, Utc};
    use std::collections::HashMap;
    use std::time::Duration;

    fn record_at(
        level: LogLevel,
        message: &str,
        fields: HashMap<String, Value>,
    ) -> LogRecord {
        LogRecord {
            level,
            timestamp: Utc.with_ymd_and_hms(2025, 8, 14, 15, 30, 0).unwrap(),
            message: message.to_string(),
            fields,
            caller: None,
        }
    }

    fn format_str(formatter: &TextFormatter, record: &LogRecord) -> String {
        String::from_utf8(formatter.format(record).unwrap()).unwrap()
    }

    fn marker_style() -> FormatStyle {
        FormatStyle::new(true, true, true, "[k]", "[v]", "[r]")
    }

    #[test]
    fn test_header_shape() {
        let record = record_at(LogLevel::Info, "hello", HashMap::new());
        let out = format_str(&TextFormatter::new(), &record);

        let wall = record
            .timestamp
            .with_timezone(&Local)
            .format("%Y-%m-%d %H:%M:%S%.3f")
            .to_string();
        assert_eq!(out, format!("[{wall}] INFO    → hello"));
    }

    #[test]
    fn test_level_padding_alignment() {
        let info = format_str(
            &TextFormatter::new(),
            &record_at(LogLevel::Info, "m", HashMap::new()),
        );
        let warning = format_str(
            &TextFormatter::new(),
            &record_at(LogLevel::Warning, "m", HashMap::new()),
        );
        // Both level tokens occupy seven columns before the separator space.
        assert!(info.contains("INFO    → "));
        assert!(warning.contains("WARNING → "));
    }

    #[test]
    fn test_fields_region() {
        let mut fields = HashMap::new();
        fields.insert("b".to_string(), Value::Int(2));
        fields.insert("a".to_string(), Value::from("x"));
        let record = record_at(LogLevel::Info, "msg", fields);

        let out = format_str(&TextFormatter::new(), &record);
        assert!(
            out.ends_with(r#"→ msg | a="x" b=2"#),
            "unexpected output: {out}"
        );
    }

    #[test]
    fn test_colorized_level_and_fields() {
        let mut fields = HashMap::new();
        fields.insert("k".to_string(), Value::Int(1));
        let record = record_at(LogLevel::Error, "boom", fields);

        let out = format_str(&TextFormatter::new().with_style(marker_style()), &record);
        assert!(out.contains(&format!("{}ERROR  {}", LogLevel::Error.color(), "[r]")));
        assert!(out.contains("[k]k[r]=[v]1[r]"));
    }

    #[test]
    fn test_no_color_when_disabled() {
        let mut fields = HashMap::new();
        fields.insert("k".to_string(), Value::Int(1));
        let record = record_at(LogLevel::Error, "boom", fields);

        let out = format_str(&TextFormatter::new(), &record);
        assert!(!out.contains('\x1b'));
    }

    #[test]
    fn test_container_separators() {
        let inner = FieldMap::new();
        inner.insert("z", 1i64);
        inner.insert("m", 2i64);
        let list = FieldList::new();
        list.push(Value::Int(1));
        list.push(Value::Int(2));

        let mut fields = HashMap::new();
        fields.insert("m".to_string(), Value::Map(inner));
        fields.insert("s".to_string(), Value::Seq(list));
        let record = record_at(LogLevel::Info, "msg", fields);

        let out = format_str(&TextFormatter::new(), &record);
        assert!(out.contains("m={m: 2, z: 1}"), "unexpected output: {out}");
        assert!(out.contains("s=[1, 2]"), "unexpected output: {out}");
    }

    #[test]
    fn test_bytes_and_duration_tokens() {
        let mut fields = HashMap::new();
        fields.insert("data".to_string(), Value::from(vec![0u8; 16]));
        fields.insert("took".to_string(), Value::Duration(Duration::from_secs(90)));
        let record = record_at(LogLevel::Info, "msg", fields);

        let out = format_str(&TextFormatter::new(), &record);
        assert!(out.contains("data=[]byte(16)"));
        assert!(out.contains("took=1m30s"));
    }

    #[test]
    fn test_cycle_and_depth_sentinels() {
        let map = FieldMap::new();
        map.insert("self", Value::Map(map.clone()));

        let mut fields = HashMap::new();
        fields.insert("x".to_string(), Value::Map(map));
        let record = record_at(LogLevel::Info, "msg", fields);

        let out = format_str(&TextFormatter::new(), &record);
        assert!(out.contains("x={self: <cycle>}"), "unexpected output: {out}");

        let deep = FieldMap::new();
        let mid = FieldMap::new();
        mid.insert("inner", Value::Map(FieldMap::new()));
        deep.insert("mid", Value::Map(mid));
        let mut fields = HashMap::new();
        fields.insert("top".to_string(), Value::Map(deep));
        let record = record_at(LogLevel::Info, "msg", fields);

        let out = format_str(&TextFormatter::new().with_max_depth(2), &record);
        assert!(
            out.contains("top={mid: <max_depth>}"),
            "unexpected output: {out}"
        );
    }

    #[test]
    fn test_float_tokens() {
        let mut fields = HashMap::new();
        fields.insert("a".to_string(), Value::Float(f64::NAN));
        fields.insert("b".to_string(), Value::Float(1.5));
        let record = record_at(LogLevel::Info, "msg", fields);

        let out = format_str(&TextFormatter::new(), &record);
        assert!(out.contains("a=NaN"));
        assert!(out.contains("b=1.5"));
    }

    #[test]
    fn test_multiline_string_value() {
        let mut fields = HashMap::new();
        fields.insert("note".to_string(), Value::from("one\ntwo"));
        let record = record_at(LogLevel::Info, "msg", fields);

        let out = format_str(&TextFormatter::new(), &record);
        assert!(out.contains(r#"note="one\n| two""#), "unexpected output: {out}");
    }

    #[test]
    fn test_caller_after_message() {
        let mut record = record_at(LogLevel::Info, "hello", HashMap::new());
        record.caller = Some("app.rs:7".to_string());
        let out = format_str(&TextFormatter::new(), &record);
        assert!(out.ends_with("→ hello (app.rs:7)"), "unexpected output: {out}");
    }
}
