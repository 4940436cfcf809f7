// SPDX-License-Identifier: Apache-2.0 OR MIT
// Dynamic field values, shared containers, and structured-record directives

use chrono::{DateTime, Utc};
use std::any::TypeId;
use std::collections::HashMap;
use std::sync::{Arc, OnceLock, RwLock};
use std::time::Duration;

/// A dynamically typed field value.
///
/// Containers (`Seq`, `Map`) have reference semantics: cloning a value that
/// holds one shares the underlying storage, so the same container can appear
/// at several points of a field tree, including cyclically. Formatters guard
/// against both with a per-call visited set keyed on the allocation address.
#[derive(Clone)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Uint(u64),
    Float(f64),
    Str(String),
    /// Elapsed time, rendered in compact human form (`"1m30s"`).
    Duration(Duration),
    /// Point in time, rendered as RFC-3339 with nanoseconds.
    Timestamp(DateTime<Utc>),
    /// An error, carried as its string description.
    Error(String),
    /// Any displayable host value, carried as its rendering.
    Display(String),
    /// Raw bytes; base64 in JSON, `[]byte(N)` in text.
    Bytes(Vec<u8>),
    Seq(FieldList),
    Map(FieldMap),
    /// A named aggregate with per-field rename/skip/omit directives.
    Record(Arc<dyn FieldMeta>),
    /// A mapping whose keys are not strings, unrepresentable here.
    UnsupportedMapKey,
    /// Any other host value the field model cannot carry; holds a kind name.
    Unsupported(&'static str),
}

impl Value {
    /// Short name of the variant, used in diagnostics and sentinels.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Uint(_) => "uint",
            Value::Float(_) => "float",
            Value::Str(_) => "string",
            Value::Duration(_) => "duration",
            Value::Timestamp(_) => "timestamp",
            Value::Error(_) => "error",
            Value::Display(_) => "display",
            Value::Bytes(_) => "bytes",
            Value::Seq(_) => "seq",
            Value::Map(_) => "map",
            Value::Record(_) => "record",
            Value::UnsupportedMapKey => "map_key",
            Value::Unsupported(kind) => kind,
        }
    }

    /// Whether this value equals its type's zero value, the condition under
    /// which an `omitempty` directive drops the field.
    pub fn is_zero(&self) -> bool {
        match self {
            Value::Null => true,
            Value::Bool(b) => !b,
            Value::Int(i) => *i == 0,
            Value::Uint(u) => *u == 0,
            Value::Float(f) => *f == 0.0,
            Value::Str(s) => s.is_empty(),
            Value::Duration(d) => d.is_zero(),
            Value::Timestamp(_) => false,
            Value::Error(s) | Value::Display(s) => s.is_empty(),
            Value::Bytes(b) => b.is_empty(),
            Value::Seq(list) => list.is_empty_nonblocking(),
            Value::Map(map) => map.is_empty_nonblocking(),
            Value::Record(_) => false,
            Value::UnsupportedMapKey | Value::Unsupported(_) => false,
        }
    }
}

impl std::fmt::Debug for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Null => write!(f, "Null"),
            Value::Bool(b) => write!(f, "Bool({b})"),
            Value::Int(i) => write!(f, "Int({i})"),
            Value::Uint(u) => write!(f, "Uint({u})"),
            Value::Float(x) => write!(f, "Float({x})"),
            Value::Str(s) => write!(f, "Str({s:?})"),
            Value::Duration(d) => write!(f, "Duration({d:?})"),
            Value::Timestamp(t) => write!(f, "Timestamp({t})"),
            Value::Error(s) => write!(f, "Error({s:?})"),
            Value::Display(s) => write!(f, "Display({s:?})"),
            Value::Bytes(b) => write!(f, "Bytes({} bytes)", b.len()),
            Value::Seq(l) => write!(f, "Seq(len {})", l.len()),
            Value::Map(m) => write!(f, "Map(len {})", m.len()),
            Value::Record(_) => write!(f, "Record"),
            Value::UnsupportedMapKey => write!(f, "UnsupportedMapKey"),
            Value::Unsupported(kind) => write!(f, "Unsupported({kind})"),
        }
    }
}

/// A string-keyed mapping with shared, mutable storage.
#[derive(Clone, Default)]
pub struct FieldMap {
    inner: Arc<RwLock<HashMap<String, Value>>>,
}

impl FieldMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, key: impl Into<String>, value: impl Into<Value>) {
        let mut guard = self.inner.write().unwrap_or_else(|e| e.into_inner());
        guard.insert(key.into(), value.into());
    }

    pub fn len(&self) -> usize {
        self.inner.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Run `f` against the entries under the read lock.
    pub fn with_entries<R>(&self, f: impl FnOnce(&HashMap<String, Value>) -> R) -> R {
        let guard = self.inner.read().unwrap_or_else(|e| e.into_inner());
        f(&guard)
    }

    /// Address of the shared storage, the cycle-detection identity.
    pub(crate) fn identity(&self) -> usize {
        Arc::as_ptr(&self.inner) as *const () as usize
    }

    /// Emptiness check that never waits on the lock; a contended map is
    /// treated as populated. Used by `Value::is_zero`, which can run while
    /// an enclosing render already holds this map's read lock.
    fn is_empty_nonblocking(&self) -> bool {
        self.inner.try_read().map(|g| g.is_empty()).unwrap_or(false)
    }
}

impl From<HashMap<String, Value>> for FieldMap {
    fn from(entries: HashMap<String, Value>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(entries)),
        }
    }
}

impl FromIterator<(String, Value)> for FieldMap {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self::from(iter.into_iter().collect::<HashMap<_, _>>())
    }
}

/// An ordered sequence with shared, mutable storage.
#[derive(Clone, Default)]
pub struct FieldList {
    inner: Arc<RwLock<Vec<Value>>>,
}

impl FieldList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, value: impl Into<Value>) {
        let mut guard = self.inner.write().unwrap_or_else(|e| e.into_inner());
        guard.push(value.into());
    }

    pub fn len(&self) -> usize {
        self.inner.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Run `f` against the items under the read lock.
    pub fn with_items<R>(&self, f: impl FnOnce(&[Value]) -> R) -> R {
        let guard = self.inner.read().unwrap_or_else(|e| e.into_inner());
        f(&guard)
    }

    pub(crate) fn identity(&self) -> usize {
        Arc::as_ptr(&self.inner) as *const () as usize
    }

    fn is_empty_nonblocking(&self) -> bool {
        self.inner.try_read().map(|g| g.is_empty()).unwrap_or(false)
    }
}

impl From<Vec<Value>> for FieldList {
    fn from(items: Vec<Value>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(items)),
        }
    }
}

impl FromIterator<Value> for FieldList {
    fn from_iter<I: IntoIterator<Item = Value>>(iter: I) -> Self {
        Self::from(iter.into_iter().collect::<Vec<_>>())
    }
}

// Scalar conversions

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

macro_rules! from_int {
    ($($ty:ty),+) => {
        $(impl From<$ty> for Value {
            fn from(v: $ty) -> Self {
                Value::Int(v as i64)
            }
        })+
    };
}

macro_rules! from_uint {
    ($($ty:ty),+) => {
        $(impl From<$ty> for Value {
            fn from(v: $ty) -> Self {
                Value::Uint(v as u64)
            }
        })+
    };
}

from_int!(i8, i16, i32, i64);
from_uint!(u8, u16, u32, u64);

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::Float(v as f64)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(v)
    }
}

impl From<Duration> for Value {
    fn from(v: Duration) -> Self {
        Value::Duration(v)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(v: DateTime<Utc>) -> Self {
        Value::Timestamp(v)
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Bytes(v)
    }
}

impl From<&[u8]> for Value {
    fn from(v: &[u8]) -> Self {
        Value::Bytes(v.to_vec())
    }
}

impl From<Vec<Value>> for Value {
    fn from(v: Vec<Value>) -> Self {
        Value::Seq(FieldList::from(v))
    }
}

impl From<FieldList> for Value {
    fn from(v: FieldList) -> Self {
        Value::Seq(v)
    }
}

impl From<FieldMap> for Value {
    fn from(v: FieldMap) -> Self {
        Value::Map(v)
    }
}

impl From<HashMap<String, Value>> for Value {
    fn from(v: HashMap<String, Value>) -> Self {
        Value::Map(FieldMap::from(v))
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        match v {
            Some(inner) => inner.into(),
            None => Value::Null,
        }
    }
}

/// Adapter implemented by structured aggregates that want deep rendering.
///
/// Directives are a property of the type, not of the value: `field_tags`
/// must return the same slice for every instance of the implementing type,
/// which is what makes the per-type plan cache sound.
pub trait FieldMeta: Send + Sync {
    /// Identity of the concrete type, used to memoize the resolved plan.
    fn type_key(&self) -> TypeId;

    /// Per-field directives in declaration order: `(field_name, tag)`.
    ///
    /// Tags follow the comma-separated `"name,flag1,flag2"` form. An empty
    /// tag keeps the field name as the output key; a name of `-` drops the
    /// field; the `omitempty` flag drops the field when its value is the
    /// type's zero value.
    fn field_tags(&self) -> &'static [(&'static str, &'static str)];

    /// Field values, keyed by the same names as `field_tags`.
    fn field_values(&self) -> Vec<(&'static str, Value)>;
}

/// One field's resolved directive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct FieldDirective {
    pub name: &'static str,
    pub key: String,
    pub skip: bool,
    pub omit_zero: bool,
}

/// The resolved directives of one structured-record type.
pub(crate) struct FieldPlan {
    pub fields: Vec<FieldDirective>,
}

fn parse_tag(name: &'static str, tag: &str) -> FieldDirective {
    if tag.is_empty() {
        return FieldDirective {
            name,
            key: name.to_string(),
            skip: false,
            omit_zero: false,
        };
    }

    let mut parts = tag.split(',');
    let first = parts.next().unwrap_or("");
    let mut omit_zero = false;
    for flag in parts {
        if flag == "omitempty" {
            omit_zero = true;
        }
    }

    FieldDirective {
        name,
        key: if first.is_empty() {
            name.to_string()
        } else {
            first.to_string()
        },
        skip: first == "-",
        omit_zero,
    }
}

static PLAN_CACHE: OnceLock<RwLock<HashMap<TypeId, Arc<FieldPlan>>>> = OnceLock::new();

/// Resolve (or fetch the memoized) field plan for a structured record.
pub(crate) fn plan_for(meta: &dyn FieldMeta) -> Arc<FieldPlan> {
    let cache = PLAN_CACHE.get_or_init(|| RwLock::new(HashMap::new()));
    let key = meta.type_key();

    {
        let map = cache.read().unwrap_or_else(|e| e.into_inner());
        if let Some(plan) = map.get(&key) {
            return Arc::clone(plan);
        }
    }

    let plan = Arc::new(FieldPlan {
        fields: meta
            .field_tags()
            .iter()
            .map(|(name, tag)| parse_tag(name, tag))
            .collect(),
    });

    let mut map = cache.write().unwrap_or_else(|e| e.into_inner());
    Arc::clone(map.entry(key).or_insert(plan))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_zero() {
        assert!(Value::Null.is_zero());
        assert!(Value::Bool(false).is_zero());
        assert!(Value::Int(0).is_zero());
        assert!(Value::Uint(0).is_zero());
        assert!(Value::Float(0.0).is_zero());
        assert!(Value::Str(String::new()).is_zero());
        assert!(Value::Duration(Duration::ZERO).is_zero());
        assert!(Value::Bytes(Vec::new()).is_zero());
        assert!(Value::Seq(FieldList::new()).is_zero());
        assert!(Value::Map(FieldMap::new()).is_zero());

        assert!(!Value::Bool(true).is_zero());
        assert!(!Value::Int(-1).is_zero());
        assert!(!Value::Str("x".into()).is_zero());
        assert!(!Value::Timestamp(Utc::now()).is_zero());
    }

    #[test]
    fn test_from_conversions() {
        assert!(matches!(Value::from(42i32), Value::Int(42)));
        assert!(matches!(Value::from(42u64), Value::Uint(42)));
        assert!(matches!(Value::from(1.5f64), Value::Float(_)));
        assert!(matches!(Value::from("hi"), Value::Str(_)));
        assert!(matches!(Value::from(vec![0u8, 1]), Value::Bytes(_)));
        assert!(matches!(Value::from(Option::<i32>::None), Value::Null));
        assert!(matches!(Value::from(Some(7i64)), Value::Int(7)));
    }

    #[test]
    fn test_shared_map_semantics() {
        let map = FieldMap::new();
        map.insert("a", 1i64);
        let alias = map.clone();
        alias.insert("b", 2i64);
        assert_eq!(map.len(), 2);
        assert_eq!(map.identity(), alias.identity());
    }

    #[test]
    fn test_distinct_maps_distinct_identity() {
        let a = FieldMap::new();
        let b = FieldMap::new();
        assert_ne!(a.identity(), b.identity());
    }

    #[test]
    fn test_parse_tag_forms() {
        let plain = parse_tag("user", "");
        assert_eq!(plain.key, "user");
        assert!(!plain.skip && !plain.omit_zero);

        let renamed = parse_tag("user", "username");
        assert_eq!(renamed.key, "username");

        let skipped = parse_tag("password", "-");
        assert!(skipped.skip);

        let omit = parse_tag("note", ",omitempty");
        assert_eq!(omit.key, "note");
        assert!(omit.omit_zero);

        let both = parse_tag("note", "remark,omitempty");
        assert_eq!(both.key, "remark");
        assert!(both.omit_zero);

        let unknown_flag = parse_tag("note", "remark,whatever");
        assert_eq!(unknown_flag.key, "remark");
        assert!(!unknown_flag.omit_zero);
    }

    struct Sample;

    impl FieldMeta for Sample {
        fn type_key(&self) -> TypeId {
            TypeId::of::<Sample>()
        }

        fn field_tags(&self) -> &'static [(&'static str, &'static str)] {
            &[("a", ""), ("b", "renamed"), ("c", "-")]
        }

        fn field_values(&self) -> Vec<(&'static str, Value)> {
            vec![
                ("a", Value::Int(1)),
                ("b", Value::Int(2)),
                ("c", Value::Int(3)),
            ]
        }
    }

    #[test]
    fn test_plan_cache_reuse() {
        let first = plan_for(&Sample);
        let second = plan_for(&Sample);
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.fields.len(), 3);
        assert_eq!(first.fields[1].key, "renamed");
        assert!(first.fields[2].skip);
    }
}
