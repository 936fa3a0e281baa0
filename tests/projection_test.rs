//! Tests for the JSON projections of bound records.

use dtobind::{Factory, Mapper, Record, SchemaCache};
use serde_json::json;

fn order() -> Record {
    Factory::new(json!({
        "name": "order",
        "properties": {
            "id": {"type": "integer"},
            "paid": {"type": "boolean"},
            "note": {"type": "string"},
            "lines": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "sku": {"type": "string"},
                        "qty": {"type": "integer"}
                    }
                }
            },
            "tags": {"type": "array", "items": {"type": "string"}}
        }
    }))
    .with_cache(SchemaCache::new())
    .create()
    .unwrap()
}

fn mapper() -> Mapper {
    Mapper::new("order")
        .alias("id", "id")
        .alias("paid", "paid")
        .alias("note", "note")
        .alias("lines", "lines")
        .alias("tags", "tags")
}

#[test]
fn test_to_json_quotes_every_scalar() {
    let mut record = order();
    mapper()
        .map(
            &mut record,
            &json!({
                "id": 7,
                "paid": true,
                "lines": [{"sku": "A-1", "qty": 2}],
                "tags": ["gift"]
            }),
        )
        .unwrap();

    assert_eq!(
        record.to_json(),
        r#"{"id":"7","paid":"true","note":"","lines":[{"sku":"A-1","qty":"2"}],"tags":["gift"]}"#
    );
}

#[test]
fn test_to_json_is_valid_json() {
    let mut record = order();
    mapper()
        .map(&mut record, &json!({"note": "say \"hi\"\n", "lines": [{"sku": "B"}]}))
        .unwrap();

    let parsed: serde_json::Value = serde_json::from_str(&record.to_json()).unwrap();
    assert_eq!(parsed["note"], json!("say \"hi\"\n"));
    assert_eq!(parsed["lines"][0]["qty"], json!(""));
}

#[test]
fn test_to_value_keeps_native_types() {
    let mut record = order();
    mapper()
        .map(
            &mut record,
            &json!({"id": 7, "paid": false, "lines": [{"sku": "A-1", "qty": 2}]}),
        )
        .unwrap();

    assert_eq!(
        record.to_value(),
        json!({
            "id": 7,
            "paid": false,
            "note": null,
            "lines": [{"sku": "A-1", "qty": 2}],
            "tags": []
        })
    );
}

#[test]
fn test_record_without_values_projects_empty() {
    let record = Factory::new(json!({"a": {"type": "string"}, "b": {"type": "integer"}}))
        .with_cache(SchemaCache::new())
        .create()
        .unwrap();

    assert_eq!(record.to_json(), "{}");
}

#[test]
fn test_element_records_without_values_project_empty() {
    let mut record = order();
    let lines = record
        .property_mut("lines")
        .unwrap()
        .collection_mut()
        .unwrap();
    lines.bind(0);

    let json = record.to_json();
    assert!(json.contains(r#""lines":[{}]"#), "{}", json);
}
