//! Structural validation and JSON Schema rendering

use serde_json::json;
use schemacheck::error::SchemaViolation;
use schemacheck::usecase::{lookup, COUNTRY, SCHEME_FIBONACCI};

#[test]
fn test_directory_listing_schema_shape() {
    let case = lookup(SCHEME_FIBONACCI).unwrap();
    let schema = case.contract.to_json_schema();
    assert_eq!(schema["type"], "object");
    assert_eq!(schema["required"], json!(["overview", "files"]));
    let item = &schema["properties"]["files"]["items"];
    assert_eq!(item["type"], "object");
    assert_eq!(item["required"], json!(["filename", "contents"]));
}

#[test]
fn test_missing_item_field_names_full_path() {
    let case = lookup(SCHEME_FIBONACCI).unwrap();
    let payload = json!({
        "overview": "x",
        "files": [
            {"filename": "fib.scm", "contents": "(define x 1)"},
            {"filename": "README.md"}
        ]
    });
    let err = case.contract.validate(&payload).unwrap_err();
    assert_eq!(
        err,
        SchemaViolation::MissingField {
            path: "files[1].contents".to_string()
        }
    );
}

#[test]
fn test_wrong_type_is_reported_with_both_types() {
    let case = lookup(COUNTRY).unwrap();
    let payload = json!({"name": "Canada", "capital": "Ottawa", "languages": "English"});
    let err = case.contract.validate(&payload).unwrap_err();
    assert_eq!(
        err.to_string(),
        "field `languages` should be array of string, got string"
    );
}

#[test]
fn test_null_counts_as_missing() {
    let case = lookup(COUNTRY).unwrap();
    let payload = json!({"name": "Canada", "capital": null, "languages": []});
    let err = case.contract.validate(&payload).unwrap_err();
    assert_eq!(err.path(), "capital");
}

#[test]
fn test_extra_fields_are_accepted() {
    let case = lookup(COUNTRY).unwrap();
    let payload = json!({
        "name": "Canada", "capital": "Ottawa", "languages": ["en"], "population": 40000000
    });
    let map = case.contract.validate(&payload).unwrap();
    assert_eq!(map.len(), 4);
}

#[test]
fn test_non_object_root_rejected() {
    let case = lookup(COUNTRY).unwrap();
    let err = case.contract.validate(&json!(["Canada"])).unwrap_err();
    assert!(matches!(err, SchemaViolation::NotAnObject { actual: "array", .. }));
}
