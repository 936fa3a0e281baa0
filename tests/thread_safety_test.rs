//! Tests for sharing the schema cache across threads.

use dtobind::{Factory, Mapper, MemoryLoader, SchemaCache};
use serde_json::json;
use std::path::Path;
use std::thread;

fn loader() -> MemoryLoader {
    MemoryLoader::new().with_document(
        "address.yaml",
        json!({"dto": {"street": {"type": "string", "required": true}}}),
    )
}

#[test]
fn test_concurrent_compilation_shares_one_entry() {
    let cache = SchemaCache::new();

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let cache = cache.clone();
            thread::spawn(move || {
                let mut record = Factory::new(json!({
                    "name": format!("user{}", i),
                    "properties": {
                        "home": {"type": "dto", "ref": "address.yaml"}
                    }
                }))
                .with_loader(loader())
                .with_cache(cache)
                .create()
                .unwrap();

                Mapper::new("m")
                    .alias("home.street", "street")
                    .map(&mut record, &json!({"street": format!("{} Main St", i)}))
                    .unwrap();
                record
            })
        })
        .collect();

    for (i, handle) in handles.into_iter().enumerate() {
        let record = handle.join().unwrap();
        assert!(record.errors().is_empty());
        assert_eq!(
            record.property_at("home.street").unwrap().data(),
            Some(&json!(format!("{} Main St", i)))
        );
    }

    assert_eq!(cache.len(), 1);
    let cached = cache.get(Path::new("address.yaml")).unwrap();
    assert!(cached.property("street").unwrap().value().is_none());
}

#[test]
fn test_records_move_between_threads() {
    let record = Factory::new(json!({"name": {"type": "name"}}))
        .with_cache(SchemaCache::new())
        .create()
        .unwrap();

    let handle = thread::spawn(move || {
        let mut record = record;
        record.set("name", json!("Ada Lovelace")).unwrap();
        record
    });

    let record = handle.join().unwrap();
    assert_eq!(record.get("name").unwrap(), json!("Ada Lovelace"));
}
