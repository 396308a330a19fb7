use std::fmt;

/// One decoded column element.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Row ID emitted for a key column.
    Key(u32),
    UInt(u32),
    Float(f32),
    /// Decoded string with `"` already replaced by `'`.
    Text(String),
}

impl Value {
    /// Build a text value, applying the quote rewrite.
    pub fn text(raw: &str) -> Self {
        Value::Text(raw.replace('"', "'"))
    }

    pub fn is_text(&self) -> bool {
        matches!(self, Value::Text(_))
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Key(v) | Value::UInt(v) => write!(f, "{v}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::Text(s) => f.write_str(s),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_rewrites_double_quotes() {
        let v = Value::text(r#"say "hi""#);
        assert_eq!(v, Value::Text("say 'hi'".to_string()));
        assert_eq!(v.to_string(), "say 'hi'");
    }

    #[test]
    fn numbers_format_plainly() {
        assert_eq!(Value::Key(10).to_string(), "10");
        assert_eq!(Value::UInt(u32::MAX).to_string(), "4294967295");
        assert_eq!(Value::Float(1.5).to_string(), "1.5");
        assert_eq!(Value::Float(-0.25).to_string(), "-0.25");
    }
}
