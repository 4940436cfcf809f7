// Visual styling for text-oriented formatters

/// Styling options for a formatter: which parts of a record are colorized
/// and the ANSI escape strings to use.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormatStyle {
    /// Apply `key_color` to the keys of structured fields.
    pub color_keys: bool,
    /// Apply `value_color` to the values of structured fields.
    pub color_values: bool,
    /// Apply the level's own color to the level token (e.g. `INFO`).
    pub color_level: bool,

    /// ANSI escape used to color keys.
    pub key_color: String,
    /// ANSI escape used to color values.
    pub value_color: String,
    /// ANSI escape that resets all text attributes.
    pub reset: String,
}

impl FormatStyle {
    pub fn new(
        color_keys: bool,
        color_values: bool,
        color_level: bool,
        key_color: impl Into<String>,
        value_color: impl Into<String>,
        reset: impl Into<String>,
    ) -> Self {
        Self {
            color_keys,
            color_values,
            color_level,
            key_color: key_color.into(),
            value_color: value_color.into(),
            reset: reset.into(),
        }
    }
}

impl Default for FormatStyle {
    /// Coloring disabled, with standard escapes (blue keys, yellow values)
    /// ready to be switched on.
    fn default() -> Self {
        Self::new(false, false, false, "\x1b[34m", "\x1b[33m", "\x1b[0m")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_style_disabled() {
        let style = FormatStyle::default();
        assert!(!style.color_keys);
        assert!(!style.color_values);
        assert!(!style.color_level);
        assert_eq!(style.reset, "\x1b[0m");
    }

    #[test]
    fn test_custom_style() {
        let style = FormatStyle::new(true, true, false, "[k]", "[v]", "[r]");
        assert!(style.color_keys);
        assert_eq!(style.key_color, "[k]");
        assert_eq!(style.value_color, "[v]");
        assert_eq!(style.reset, "[r]");
    }
}
