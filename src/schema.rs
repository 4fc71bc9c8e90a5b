//! Declarative description of the structured output a use case expects.
//!
//! A [`SchemaContract`] serves two purposes: it is rendered to JSON Schema and
//! sent as the `format` of a chat request so the endpoint constrains
//! generation, and it validates the decoded payload before any content rule
//! runs.

use serde_json::{json, Map, Value};

use crate::error::SchemaViolation;

#[derive(Debug, Clone, PartialEq)]
pub enum FieldKind {
    String,
    Integer,
    Number,
    Boolean,
    Array(Box<FieldKind>),
    Object(Vec<FieldSpec>),
}

impl FieldKind {
    /// JSON Schema `type` keyword for this kind.
    pub fn json_type(&self) -> &'static str {
        match self {
            FieldKind::String => "string",
            FieldKind::Integer => "integer",
            FieldKind::Number => "number",
            FieldKind::Boolean => "boolean",
            FieldKind::Array(_) => "array",
            FieldKind::Object(_) => "object",
        }
    }

    /// Shallow type check; nested items are checked by the contract walk.
    pub fn matches(&self, value: &Value) -> bool {
        match self {
            FieldKind::String => value.is_string(),
            FieldKind::Integer => value.is_i64() || value.is_u64(),
            FieldKind::Number => value.is_number(),
            FieldKind::Boolean => value.is_boolean(),
            FieldKind::Array(_) => value.is_array(),
            FieldKind::Object(_) => value.is_object(),
        }
    }

    /// Human-readable type name, e.g. `array of string`.
    pub fn describe(&self) -> String {
        match self {
            FieldKind::Array(item) => format!("array of {}", item.describe()),
            other => other.json_type().to_string(),
        }
    }

    fn to_json_schema(&self) -> Value {
        match self {
            FieldKind::Array(item) => json!({
                "type": "array",
                "items": item.to_json_schema(),
            }),
            FieldKind::Object(fields) => object_schema(fields),
            other => json!({ "type": other.json_type() }),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldSpec {
    pub name: String,
    pub kind: FieldKind,
    pub required: bool,
}

impl FieldSpec {
    pub fn required(name: &str, kind: FieldKind) -> Self {
        Self {
            name: name.to_string(),
            kind,
            required: true,
        }
    }

    pub fn optional(name: &str, kind: FieldKind) -> Self {
        Self {
            name: name.to_string(),
            kind,
            required: false,
        }
    }
}

/// Ordered, immutable set of named fields.
#[derive(Debug, Clone, PartialEq)]
pub struct SchemaContract {
    name: String,
    fields: Vec<FieldSpec>,
}

impl SchemaContract {
    pub fn new(name: &str, fields: Vec<FieldSpec>) -> Self {
        Self {
            name: name.to_string(),
            fields,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    /// Render the contract as the JSON Schema document used for `format`.
    pub fn to_json_schema(&self) -> Value {
        object_schema(&self.fields)
    }

    /// Whether a rule path such as `overview` or `files[].filename` names a
    /// field declared by this contract.
    pub fn has_path(&self, path: &str) -> bool {
        let mut fields = self.fields.as_slice();
        let mut segments = path.split('.').peekable();

        while let Some(segment) = segments.next() {
            let name = segment.strip_suffix("[]").unwrap_or(segment);
            let Some(spec) = fields.iter().find(|f| f.name == name) else {
                return false;
            };
            let through_array = segment.ends_with("[]");
            let kind = match (&spec.kind, through_array) {
                (FieldKind::Array(item), true) => item.as_ref(),
                (_, true) => return false,
                (kind, false) => kind,
            };
            if segments.peek().is_none() {
                return true;
            }
            match kind {
                FieldKind::Object(nested) => fields = nested.as_slice(),
                _ => return false,
            }
        }

        false
    }

    /// Structural pass: the value must be an object carrying every required
    /// field with the declared type, recursively. Returns the decoded object
    /// on success; nothing is partially accepted.
    pub fn validate(&self, value: &Value) -> Result<Map<String, Value>, SchemaViolation> {
        let Value::Object(map) = value else {
            return Err(SchemaViolation::NotAnObject {
                path: "$".to_string(),
                actual: value_type(value),
            });
        };
        validate_object(&self.fields, map, "")?;
        Ok(map.clone())
    }
}

fn object_schema(fields: &[FieldSpec]) -> Value {
    let properties: Map<String, Value> = fields
        .iter()
        .map(|f| (f.name.clone(), f.kind.to_json_schema()))
        .collect();
    let required: Vec<&str> = fields
        .iter()
        .filter(|f| f.required)
        .map(|f| f.name.as_str())
        .collect();

    let mut schema = json!({
        "type": "object",
        "properties": properties,
    });
    if !required.is_empty() {
        schema["required"] = json!(required);
    }
    schema
}

fn join_path(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{}.{}", prefix, name)
    }
}

fn validate_object(
    fields: &[FieldSpec],
    map: &Map<String, Value>,
    prefix: &str,
) -> Result<(), SchemaViolation> {
    for spec in fields {
        let path = join_path(prefix, &spec.name);
        match map.get(&spec.name) {
            None | Some(Value::Null) if spec.required => {
                return Err(SchemaViolation::MissingField { path });
            }
            None | Some(Value::Null) => continue,
            Some(value) => validate_value(&spec.kind, value, &path)?,
        }
    }
    Ok(())
}

fn validate_value(kind: &FieldKind, value: &Value, path: &str) -> Result<(), SchemaViolation> {
    if !kind.matches(value) {
        return Err(SchemaViolation::WrongType {
            path: path.to_string(),
            expected: kind.describe(),
            actual: value_type(value),
        });
    }

    match (kind, value) {
        (FieldKind::Array(item), Value::Array(items)) => {
            for (i, element) in items.iter().enumerate() {
                validate_value(item, element, &format!("{}[{}]", path, i))?;
            }
        }
        (FieldKind::Object(fields), Value::Object(map)) => validate_object(fields, map, path)?,
        _ => {}
    }
    Ok(())
}

/// JSON type name of a value, for error messages.
pub fn value_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_f64() => "number",
        Value::Number(_) => "integer",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn listing() -> SchemaContract {
        SchemaContract::new(
            "listing",
            vec![
                FieldSpec::required("overview", FieldKind::String),
                FieldSpec::required(
                    "files",
                    FieldKind::Array(Box::new(FieldKind::Object(vec![
                        FieldSpec::required("filename", FieldKind::String),
                        FieldSpec::required("contents", FieldKind::String),
                    ]))),
                ),
                FieldSpec::optional("notes", FieldKind::String),
            ],
        )
    }

    #[test]
    fn test_json_schema_shape() {
        let schema = listing().to_json_schema();
        assert_eq!(schema["type"], "object");
        assert_eq!(schema["properties"]["overview"]["type"], "string");
        assert_eq!(schema["properties"]["files"]["type"], "array");
        assert_eq!(
            schema["properties"]["files"]["items"]["required"],
            json!(["filename", "contents"])
        );
        assert_eq!(schema["required"], json!(["overview", "files"]));
    }

    #[test]
    fn test_validate_accepts_conforming_payload() {
        let payload = json!({
            "overview": "x",
            "files": [{"filename": "a.scm", "contents": "b"}]
        });
        let map = listing().validate(&payload).unwrap();
        assert_eq!(map.len(), 2);
    }

    #[test]
    fn test_validate_names_missing_nested_field() {
        let payload = json!({
            "overview": "x",
            "files": [{"filename": "a.scm", "contents": "b"}, {"filename": "b.md"}]
        });
        let err = listing().validate(&payload).unwrap_err();
        assert_eq!(
            err,
            SchemaViolation::MissingField {
                path: "files[1].contents".to_string()
            }
        );
    }

    #[test]
    fn test_validate_rejects_wrong_type() {
        let payload = json!({"overview": 42, "files": []});
        let err = listing().validate(&payload).unwrap_err();
        assert!(err.to_string().contains("`overview` should be string, got integer"));
    }

    #[test]
    fn test_validate_null_required_field_is_missing() {
        let payload = json!({"overview": null, "files": []});
        let err = listing().validate(&payload).unwrap_err();
        assert!(matches!(err, SchemaViolation::MissingField { .. }));
    }

    #[test]
    fn test_validate_rejects_non_object() {
        let err = listing().validate(&json!(["overview"])).unwrap_err();
        assert!(matches!(err, SchemaViolation::NotAnObject { actual: "array", .. }));
    }

    #[test]
    fn test_has_path() {
        let contract = listing();
        assert!(contract.has_path("overview"));
        assert!(contract.has_path("files"));
        assert!(contract.has_path("files[].filename"));
        assert!(!contract.has_path("files[].size"));
        assert!(!contract.has_path("overview[]"));
        assert!(!contract.has_path("files.filename"));
        assert!(!contract.has_path("summary"));
    }
}
