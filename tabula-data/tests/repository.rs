mod common;

use std::sync::Arc;

use common::{document_config, document_type_config, record, repository, seed_documents, storage};
use serde_json::json;
use tabula_core::{ApiError, QueryParams, StatusCode};
use tabula_data::{
    ColumnDefinition, DataConfig, DataError, EntityConfig, ErrorTranslator, FriendlyErrorRule,
    InMemoryStorage, Repository,
};

#[tokio::test]
async fn test_unknown_model() {
    let repo = repository(&storage());

    let err = repo.get_model("invoice").unwrap_err();
    assert!(matches!(&err, DataError::UnknownModel(name) if name == "invoice"));
    assert_eq!(err.to_string(), "Unknown Model invoice");

    let api: ApiError = err.into();
    assert_eq!(api.status, StatusCode::NOT_FOUND);
    assert_eq!(api.message(), Some("Unknown Model invoice"));
}

#[tokio::test]
async fn test_empty_name_resolves_default_kind() {
    let repo = repository(&storage());
    assert_eq!(repo.get_model("").unwrap().config().name, "document");
    assert_eq!(repo.kinds(), vec!["document", "document_type"]);

    let no_default = Repository::builder(Arc::new(InMemoryStorage::new()))
        .entity(document_type_config())
        .build()
        .unwrap();
    assert!(matches!(no_default.get_model(""), Err(DataError::UnknownModel(_))));
}

#[tokio::test]
async fn test_update_targets_addressed_row() {
    let storage = storage();
    seed_documents(&storage, 2);
    let repo = repository(&storage);

    // a conflicting id in the body is overridden by the addressed one
    let id = repo
        .update_by_id("document", 1, record(json!({"id": 2, "name": "renamed", "type": "final"})))
        .await
        .unwrap();
    assert_eq!(id, 1);

    let first = repo.find_by_id("document", 1).await.unwrap();
    assert_eq!(first.get("name"), Some(&json!("renamed")));
    assert_eq!(first.get("type_id"), Some(&json!(2)));
    assert_eq!(first.get("internal_note"), Some(&json!("hidden")));

    let second = repo.find_by_id("document", 2).await.unwrap();
    assert_eq!(second.get("name"), Some(&json!("doc-2")));
}

#[tokio::test]
async fn test_update_missing_row() {
    let storage = storage();
    let repo = repository(&storage);
    let err = repo
        .update_by_id("document", 9, record(json!({"name": "ghost"})))
        .await
        .unwrap_err();
    assert!(matches!(err, DataError::NotLoaded { .. }));
    assert_eq!(err.status(), StatusCode::NOT_FOUND);
    assert_eq!(storage.write_count(), 0);
}

#[tokio::test]
async fn test_delete_and_count() {
    let storage = storage();
    seed_documents(&storage, 3);
    let repo = repository(&storage);

    assert_eq!(repo.count("document").await.unwrap(), 3);
    assert_eq!(repo.delete_by_id("document", 2).await.unwrap(), 1);
    assert_eq!(repo.delete_by_id("document", 2).await.unwrap(), 0);
    assert_eq!(repo.count("").await.unwrap(), 2);
}

#[tokio::test]
async fn test_filters_match_stored_punctuation() {
    let storage = storage();
    let repo = repository(&storage);

    let name = "O'Brien & Sons";
    let id = repo
        .create("document", record(json!({"name": name, "type": "draft"})))
        .await
        .unwrap();

    let rows = repo.find_all("document", &record(json!({"name": name})), 0, 0).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].get("id"), Some(&json!(id)));

    let rows = repo
        .find_all("document", &record(json!({"name": ["like", "o'brien &%"]})), 0, 0)
        .await
        .unwrap();
    assert_eq!(rows.len(), 1);

    let mut document = repo.get_model("document").unwrap();
    document.find_one(&record(json!({"name": name}))).await.unwrap();
    assert_eq!(document.id(), Some(id));
    assert_eq!(document.get("name"), Some(&json!(name)));

    let removed = document.delete_by(&record(json!({"name": name}))).await.unwrap();
    assert_eq!(removed, 1);
    assert_eq!(repo.count("document").await.unwrap(), 0);
}

#[tokio::test]
async fn test_list_envelope() {
    let storage = storage();
    seed_documents(&storage, 25);
    let repo = repository(&storage);

    let params = QueryParams::parse("limit=10&offset=10&sort=name");
    let payload = repo.list("document", "/document", &params).await.unwrap();
    let body = serde_json::to_value(&payload).unwrap();

    assert_eq!(body["statusCode"], json!(200));
    assert_eq!(body["data"].as_array().unwrap().len(), 10);
    assert_eq!(body["data"][0]["id"], json!(11));
    assert!(body["data"][0].get("internal_note").is_none());
    assert_eq!(body["next"], json!("/document?limit=10&offset=20&sort=name"));
    assert_eq!(body["prev"], json!(""));
    assert_eq!(body["page"], json!(1));
    assert_eq!(body["pages"], json!(3));
    assert_eq!(body["total"], json!(25));
}

#[tokio::test]
async fn test_list_applies_filters_but_not_reserved_params() {
    let storage = storage();
    seed_documents(&storage, 6);
    let repo = repository(&storage);

    let params = QueryParams::parse("type_id=2&unknown=1&limit=2");
    let payload = repo.list("document", "/document", &params).await.unwrap();
    let ids: Vec<_> = payload
        .data
        .as_array()
        .unwrap()
        .iter()
        .map(|row| row["id"].clone())
        .collect();
    assert_eq!(ids, vec![json!(2), json!(4)]);
}

#[tokio::test]
async fn test_build_rejects_bad_wiring() {
    let storage: Arc<InMemoryStorage> = Arc::new(InMemoryStorage::new());

    let missing_type_table = Repository::builder(storage.clone())
        .typed_entity(document_config(), "document_type")
        .build();
    assert!(matches!(missing_type_table, Err(DataError::Schema(_))));

    let no_type_id = Repository::builder(storage.clone())
        .type_table(document_type_config())
        .typed_entity(
            EntityConfig::new("note").with_column(ColumnDefinition::string("title")),
            "document_type",
        )
        .build();
    assert!(matches!(no_type_id, Err(DataError::Schema(_))));

    let twice = Repository::builder(storage.clone())
        .entity(document_type_config())
        .entity(document_type_config())
        .build();
    assert!(matches!(twice, Err(DataError::Schema(_))));

    let bad_default = Repository::builder(storage)
        .entity(document_type_config())
        .default_kind("document")
        .build();
    assert!(matches!(bad_default, Err(DataError::Schema(_))));
}

#[tokio::test]
async fn test_settings_flow_into_kinds() {
    let storage = storage();
    seed_documents(&storage, 30);
    let settings = DataConfig {
        page_size: 5,
        max_limit: 8,
        ..DataConfig::default()
    };
    let repo = Repository::builder(Arc::new(storage.clone()))
        .settings(settings)
        .translator(
            ErrorTranslator::empty()
                .with_rule(FriendlyErrorRule::new(r"Duplicate entry '(?P<value>[^']+)'", "{value} is taken").unwrap()),
        )
        .type_table(document_type_config())
        .typed_entity(document_config(), "document_type")
        .build()
        .unwrap();

    assert_eq!(repo.find_all("document", &record(json!({})), 0, 0).await.unwrap().len(), 8);

    let payload = repo
        .list("document", "/document", &QueryParams::new())
        .await
        .unwrap();
    assert_eq!(payload.data.as_array().unwrap().len(), 5);

    let err = repo
        .create("document", record(json!({"name": "doc-1", "type": "draft"})))
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "doc-1 is taken");
}
