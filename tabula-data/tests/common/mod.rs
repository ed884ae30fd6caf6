#![allow(dead_code)]

use std::sync::Arc;

use serde_json::{json, Value};
use tabula_data::{ColumnDefinition, EntityConfig, InMemoryStorage, Record, Repository};

pub fn record(value: Value) -> Record {
    match value {
        Value::Object(map) => map,
        other => panic!("expected an object, got {other}"),
    }
}

pub fn document_type_config() -> EntityConfig {
    EntityConfig::new("document_type")
        .with_column(ColumnDefinition::int("id"))
        .with_column(ColumnDefinition::string("label").required())
}

pub fn document_config() -> EntityConfig {
    EntityConfig::new("document")
        .with_column(ColumnDefinition::int("id"))
        .with_column(
            ColumnDefinition::string("name")
                .required()
                .rules("maxlength:255")
                .unwrap(),
        )
        .with_column(ColumnDefinition::int("type_id").required())
        .with_column(ColumnDefinition::string("created_at"))
        .with_column(ColumnDefinition::string("internal_note"))
        .with_hidden("internal_note")
}

/// Storage with `document_type` seeded as `(1, draft)`, `(2, final)` and a
/// unique constraint on `document.name`.
pub fn storage() -> InMemoryStorage {
    let storage = InMemoryStorage::new()
        .unique("document", "name")
        .foreign_key("document", "type_id", "document_type");
    storage.seed(
        "document_type",
        "id",
        [
            record(json!({"id": 1, "label": "draft"})),
            record(json!({"id": 2, "label": "final"})),
        ],
    );
    storage
}

pub fn repository(storage: &InMemoryStorage) -> Repository {
    Repository::builder(Arc::new(storage.clone()))
        .type_table(document_type_config())
        .typed_entity(document_config(), "document_type")
        .default_kind("document")
        .build()
        .unwrap()
}

pub fn seed_documents(storage: &InMemoryStorage, count: usize) {
    storage.seed(
        "document",
        "id",
        (1..=count).map(|i| {
            record(json!({
                "name": format!("doc-{i}"),
                "type_id": if i % 2 == 0 { 2 } else { 1 },
                "internal_note": "hidden",
            }))
        }),
    );
}
