// SPDX-License-Identifier: Apache-2.0 OR MIT
// Log record carriers: the shared immutable record and the bridge's raw form

use crate::level::LogLevel;
use crate::value::{FieldList, FieldMap, Value};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;

/// Key under which a raw record's unparseable fields payload is reported.
pub const FIELDS_PARSE_ERROR_KEY: &str = "_fields_parse_error";

/// An immutable log event.
///
/// Created once on the producer thread and shared by reference across every
/// route that admits its level; routes never mutate it.
#[derive(Debug, Clone)]
pub struct LogRecord {
    pub level: LogLevel,
    pub timestamp: DateTime<Utc>,
    pub message: String,
    pub fields: HashMap<String, Value>,
    /// Call site (`file:line`), captured by the logger when enabled.
    pub caller: Option<String>,
}

impl LogRecord {
    pub fn new(
        level: LogLevel,
        message: impl Into<String>,
        fields: HashMap<String, Value>,
    ) -> Self {
        Self {
            level,
            timestamp: Utc::now(),
            message: message.into(),
            fields,
            caller: None,
        }
    }
}

/// The bridge's wire form of a record: message and fields arrive as byte
/// buffers and stay that way until the route consumer decodes them, keeping
/// the producer path copy-only.
#[derive(Debug, Clone)]
pub struct RawRecord {
    pub level: LogLevel,
    pub message: Vec<u8>,
    /// JSON-encoded string-keyed mapping; may be empty.
    pub fields: Vec<u8>,
}

impl RawRecord {
    /// Decode into a full record. Runs on the consumer path.
    ///
    /// A fields payload that fails to parse does not drop the record; the
    /// record is emitted with a single synthetic field describing the error.
    pub fn into_record(self) -> LogRecord {
        let message = String::from_utf8_lossy(&self.message).into_owned();

        let fields = if self.fields.is_empty() {
            HashMap::new()
        } else {
            match serde_json::from_slice::<serde_json::Map<String, serde_json::Value>>(&self.fields)
            {
                Ok(map) => map
                    .into_iter()
                    .map(|(k, v)| (k, json_to_value(v)))
                    .collect(),
                Err(err) => {
                    let mut fields = HashMap::new();
                    fields.insert(
                        FIELDS_PARSE_ERROR_KEY.to_string(),
                        Value::Str(err.to_string()),
                    );
                    fields
                }
            }
        };

        LogRecord {
            level: self.level,
            timestamp: Utc::now(),
            message,
            fields,
            caller: None,
        }
    }
}

fn json_to_value(v: serde_json::Value) -> Value {
    match v {
        serde_json::Value::Null => Value::Null,
        serde_json::Value::Bool(b) => Value::Bool(b),
        serde_json::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Value::Int(i)
            } else if let Some(u) = n.as_u64() {
                Value::Uint(u)
            } else {
                Value::Float(n.as_f64().unwrap_or(f64::NAN))
            }
        }
        serde_json::Value::String(s) => Value::Str(s),
        serde_json::Value::Array(items) => {
            Value::Seq(items.into_iter().map(json_to_value).collect::<FieldList>())
        }
        serde_json::Value::Object(map) => Value::Map(
            map.into_iter()
                .map(|(k, v)| (k, json_to_value(v)))
                .collect::<FieldMap>(),
        ),
    }
}

/// What a route's queue carries: a record shared across routes, or the
/// bridge's raw payload, decoded on the consumer path.
#[derive(Debug, Clone)]
pub enum Envelope {
    Shared(Arc<LogRecord>),
    Raw(RawRecord),
}

impl Envelope {
    /// Severity of the carried record; what a route's enqueue gate checks.
    pub fn level(&self) -> LogLevel {
        match self {
            Envelope::Shared(record) => record.level,
            Envelope::Raw(raw) => raw.level,
        }
    }

    /// Resolve to a renderable record.
    pub(crate) fn into_record(self) -> Arc<LogRecord> {
        match self {
            Envelope::Shared(record) => record,
            Envelope::Raw(raw) => Arc::new(raw.into_record()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_record_decodes_fields() {
        let raw = RawRecord {
            level: LogLevel::Info,
            message: b"hello".to_vec(),
            fields: br#"{"user_id":123,"ip":"127.0.0.1","ok":true}"#.to_vec(),
        };
        let record = raw.into_record();
        assert_eq!(record.message, "hello");
        assert_eq!(record.fields.len(), 3);
        assert!(matches!(record.fields.get("user_id"), Some(Value::Int(123))));
        assert!(matches!(record.fields.get("ok"), Some(Value::Bool(true))));
    }

    #[test]
    fn test_raw_record_nested_containers() {
        let raw = RawRecord {
            level: LogLevel::Debug,
            message: b"nested".to_vec(),
            fields: br#"{"seq":[1,2],"map":{"a":null}}"#.to_vec(),
        };
        let record = raw.into_record();
        match record.fields.get("seq") {
            Some(Value::Seq(list)) => assert_eq!(list.len(), 2),
            other => panic!("expected seq, got {other:?}"),
        }
        match record.fields.get("map") {
            Some(Value::Map(map)) => assert_eq!(map.len(), 1),
            other => panic!("expected map, got {other:?}"),
        }
    }

    #[test]
    fn test_raw_record_bad_fields_synthesized() {
        let raw = RawRecord {
            level: LogLevel::Error,
            message: b"oops".to_vec(),
            fields: b"{not json".to_vec(),
        };
        let record = raw.into_record();
        assert_eq!(record.message, "oops");
        assert_eq!(record.fields.len(), 1);
        assert!(record.fields.contains_key(FIELDS_PARSE_ERROR_KEY));
    }

    #[test]
    fn test_raw_record_empty_fields() {
        let raw = RawRecord {
            level: LogLevel::Info,
            message: b"plain".to_vec(),
            fields: Vec::new(),
        };
        let record = raw.into_record();
        assert!(record.fields.is_empty());
    }

    #[test]
    fn test_envelope_level() {
        let record = Arc::new(LogRecord::new(LogLevel::Warning, "w", HashMap::new()));
        assert_eq!(Envelope::Shared(record).level(), LogLevel::Warning);
        let raw = RawRecord {
            level: LogLevel::Trace,
            message: Vec::new(),
            fields: Vec::new(),
        };
        assert_eq!(Envelope::Raw(raw).level(), LogLevel::Trace);
    }
}
