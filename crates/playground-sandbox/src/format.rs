//! Value formatter: turns a runtime's returned value into display text.

use serde::{Deserialize, Serialize};

/// Serialization of a value failed (circular structure, unsupported type, ...).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Unserializable(pub String);

/// What the formatter needs to know about a runtime value.
pub trait Inspect {
    /// null / undefined / None
    fn is_nullish(&self) -> bool;

    /// The string itself, when the value is a string.
    fn text(&self) -> Option<String>;

    /// Pretty structured serialization. `Ok(None)` when the value has no
    /// structured form (e.g. a function).
    fn structured(&self) -> Result<Option<String>, Unserializable>;

    /// The runtime's default string conversion.
    fn display(&self) -> String;
}

/// `None` means there is nothing to show. Never panics.
pub fn format_value<V: Inspect + ?Sized>(value: &V) -> Option<String> {
    if value.is_nullish() {
        return None;
    }
    if let Some(text) = value.text() {
        return Some(text);
    }
    match value.structured() {
        Ok(Some(serialized)) => Some(serialized),
        Ok(None) => Some(value.display()),
        Err(Unserializable(reason)) => {
            tracing::debug!(reason = %reason, "structured serialization failed, using display form");
            Some(value.display())
        }
    }
}

/// A value handed back by an external runtime over its wire protocol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ForeignValue {
    None,
    Text { text: String },
    /// Structured value, already rendered as two-space-indented JSON by the
    /// runtime so numbers keep their exact digits.
    Json { text: String },
    /// The runtime could not serialize the value; `text` is its `str()`.
    Opaque { text: String },
}

impl Inspect for ForeignValue {
    fn is_nullish(&self) -> bool {
        match self {
            ForeignValue::None => true,
            ForeignValue::Json { text } => text == "null",
            _ => false,
        }
    }

    fn text(&self) -> Option<String> {
        match self {
            ForeignValue::Text { text } => Some(text.clone()),
            _ => None,
        }
    }

    fn structured(&self) -> Result<Option<String>, Unserializable> {
        match self {
            ForeignValue::Json { text } => Ok(Some(text.clone())),
            ForeignValue::Opaque { text } => Err(Unserializable(format!("runtime could not serialize {text}"))),
            ForeignValue::None | ForeignValue::Text { .. } => Ok(None),
        }
    }

    fn display(&self) -> String {
        match self {
            ForeignValue::None => "None".to_string(),
            ForeignValue::Text { text } | ForeignValue::Opaque { text } | ForeignValue::Json { text } => text.clone(),
        }
    }
}

impl Inspect for serde_json::Value {
    fn is_nullish(&self) -> bool {
        self.is_null()
    }

    fn text(&self) -> Option<String> {
        self.as_str().map(str::to_string)
    }

    fn structured(&self) -> Result<Option<String>, Unserializable> {
        serde_json::to_string_pretty(self)
            .map(Some)
            .map_err(|e| Unserializable(e.to_string()))
    }

    fn display(&self) -> String {
        self.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_nullish_formats_to_none() {
        assert_eq!(format_value(&ForeignValue::None), None);
        assert_eq!(format_value(&ForeignValue::Json { text: "null".into() }), None);
        assert_eq!(format_value(&json!(null)), None);
    }

    #[test]
    fn test_strings_are_verbatim() {
        let value = ForeignValue::Text {
            text: "hello \"world\"".into(),
        };
        assert_eq!(format_value(&value).as_deref(), Some("hello \"world\""));
        assert_eq!(format_value(&json!("plain")).as_deref(), Some("plain"));
    }

    #[test]
    fn test_structured_values_are_pretty_json() {
        assert_eq!(format_value(&json!(3)).as_deref(), Some("3"));
        assert_eq!(
            format_value(&json!({"a": [1, 2]})).as_deref(),
            Some("{\n  \"a\": [\n    1,\n    2\n  ]\n}")
        );
        let value = ForeignValue::Json { text: "true".into() };
        assert_eq!(format_value(&value).as_deref(), Some("true"));
    }

    #[test]
    fn test_rendered_json_keeps_big_integers_exact() {
        let value = ForeignValue::Json {
            text: "1267650600228229401496703205376".into(),
        };
        assert_eq!(format_value(&value).as_deref(), Some("1267650600228229401496703205376"));
    }

    #[test]
    fn test_unserializable_falls_back_to_display() {
        let value = ForeignValue::Opaque {
            text: "<object object at 0x1>".into(),
        };
        assert_eq!(format_value(&value).as_deref(), Some("<object object at 0x1>"));
    }

    #[test]
    fn test_foreign_value_wire_shape() {
        let parsed: ForeignValue = serde_json::from_str(r#"{"kind":"json","text":"[1, 2]"}"#).unwrap();
        assert_eq!(parsed, ForeignValue::Json { text: "[1, 2]".into() });
        let parsed: ForeignValue = serde_json::from_str(r#"{"kind":"none"}"#).unwrap();
        assert_eq!(parsed, ForeignValue::None);
    }
}
