// SPDX-License-Identifier: Apache-2.0 OR MIT
// Construction macro for field maps

/// Build the field map for a log call
///
/// # Examples
/// ```
/// use logfan::fields;
///
/// let fields = fields! {
///     "user_id" => 123u64,
///     "ip" => "127.0.0.1",
/// };
/// assert_eq!(fields.len(), 2);
/// ```
#[macro_export]
macro_rules! fields {
    () => {
        ::std::collections::HashMap::<::std::string::String, $crate::Value>::new()
    };
    ($($key:expr => $value:expr),+ $(,)?) => {{
        let mut map =
            ::std::collections::HashMap::<::std::string::String, $crate::Value>::new();
        $(
            map.insert(::std::string::String::from($key), $crate::Value::from($value));
        )+
        map
    }};
}

#[cfg(test)]
mod tests {
    use crate::Value;

    #[test]
    fn test_fields_macro() {
        let fields = fields! {
            "count" => 3i64,
            "name" => "worker",
            "ratio" => 0.5f64,
        };
        assert_eq!(fields.len(), 3);
        assert!(matches!(fields.get("count"), Some(Value::Int(3))));
        assert!(matches!(fields.get("name"), Some(Value::Str(_))));
    }

    #[test]
    fn test_fields_macro_empty() {
        let fields = fields! {};
        assert!(fields.is_empty());
    }
}
