//! Multipart form encoding for file-style uploads.

use serde_json::Value;

/// Ordered list of multipart text fields.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MultipartForm {
    fields: Vec<(String, String)>,
}

impl MultipartForm {
    /// Create an empty form.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a form where every top-level key of a JSON object becomes one field.
    ///
    /// Strings are sent verbatim, other values in their JSON text form.
    /// `null` yields an empty form; arrays and scalars are rejected.
    pub fn from_value(data: &Value) -> Result<Self, String> {
        match data {
            Value::Null => Ok(Self::new()),
            Value::Object(map) => Ok(Self {
                fields: map
                    .iter()
                    .map(|(key, value)| (key.clone(), field_text(value)))
                    .collect(),
            }),
            other => Err(format!(
                "multipart body requires a JSON object, got {}",
                json_kind(other)
            )),
        }
    }

    /// Append a field.
    pub fn field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.push((name.into(), value.into()));
        self
    }

    /// All fields in insertion order.
    pub fn fields(&self) -> &[(String, String)] {
        &self.fields
    }

    /// Look up the first field with the given name.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Convert into a reqwest multipart form.
    pub fn to_reqwest(&self) -> reqwest::multipart::Form {
        self.fields
            .iter()
            .fold(reqwest::multipart::Form::new(), |form, (name, value)| {
                form.text(name.clone(), value.clone())
            })
    }
}

fn field_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_object_keys_become_fields() {
        let data = json!({"name": "x", "size": 3, "tags": ["a"]});
        let form = MultipartForm::from_value(&data).unwrap();
        assert_eq!(form.len(), 3);
        assert_eq!(form.get("name"), Some("x"));
        assert_eq!(form.get("size"), Some("3"));
        assert_eq!(form.get("tags"), Some("[\"a\"]"));
    }

    #[test]
    fn test_null_is_empty_form() {
        let form = MultipartForm::from_value(&Value::Null).unwrap();
        assert!(form.is_empty());
    }

    #[test]
    fn test_non_object_rejected() {
        let err = MultipartForm::from_value(&json!([1, 2])).unwrap_err();
        assert!(err.contains("an array"));
        assert!(MultipartForm::from_value(&json!("raw")).is_err());
    }
}
