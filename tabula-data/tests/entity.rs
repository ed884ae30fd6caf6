mod common;

use common::{record, repository, seed_documents, storage};
use serde_json::json;
use tabula_data::{ConstraintKind, DataError, StorageEngine};

#[tokio::test]
async fn test_create_typed_document_end_to_end() {
    let storage = storage();
    let repo = repository(&storage);

    let id = repo
        .create(
            "document",
            record(json!({"name": "Report", "type": "final", "created_at": "2024-01-01"})),
        )
        .await
        .unwrap();

    assert_eq!(
        storage.rows("document"),
        vec![record(json!({
            "id": id,
            "name": "Report",
            "type_id": 2,
            "created_at": "2024-01-01",
        }))]
    );
}

#[tokio::test]
async fn test_unknown_type_label_writes_nothing() {
    let storage = storage();
    let repo = repository(&storage);

    let err = repo
        .create("document", record(json!({"name": "Report", "type": "unknown-type"})))
        .await
        .unwrap_err();

    match err {
        DataError::InvalidTypeLabel { label } => assert_eq!(label, "unknown-type"),
        other => panic!("unexpected {other:?}"),
    }
    assert_eq!(storage.write_count(), 0);
    assert!(storage.rows("document").is_empty());
}

#[tokio::test]
async fn test_overlong_name_writes_nothing() {
    let storage = storage();
    let repo = repository(&storage);

    let err = repo
        .create("document", record(json!({"name": "n".repeat(300), "type": "draft"})))
        .await
        .unwrap_err();

    let DataError::Validation(errors) = &err else {
        panic!("unexpected {err:?}");
    };
    assert!(errors.iter().any(|e| e.message == "Max length exceeded for name"));
    assert_eq!(err.status(), tabula_core::StatusCode::BAD_REQUEST);
    assert_eq!(storage.write_count(), 0);
}

#[tokio::test]
async fn test_missing_required_fields_are_all_reported() {
    let storage = storage();
    let mut document = repository(&storage).get_model("document").unwrap();

    let err = document.store(record(json!({"created_at": "2024-01-01"}))).await.unwrap_err();

    assert_eq!(
        err.to_string(),
        "name is a required field\ntype_id is a required field"
    );
    assert_eq!(document.errors().len(), 2);
    assert_eq!(storage.write_count(), 0);
}

#[tokio::test]
async fn test_duplicate_name_is_translated() {
    let storage = storage();
    let repo = repository(&storage);
    let fields = record(json!({"name": "Report", "type": "draft"}));

    repo.create("document", fields.clone()).await.unwrap();
    let err = repo.create("document", fields).await.unwrap_err();

    match &err {
        DataError::Store { friendly, raw, constraint } => {
            assert_eq!(friendly, "name already exists");
            assert!(raw.contains("1062 Duplicate entry 'Report'"));
            assert_eq!(*constraint, ConstraintKind::Unique);
        }
        other => panic!("unexpected {other:?}"),
    }
    assert_eq!(err.status(), tabula_core::StatusCode::CONFLICT);
    assert_eq!(storage.rows("document").len(), 1);
}

#[tokio::test]
async fn test_foreign_key_violation_is_translated() {
    let storage = storage();
    let repo = repository(&storage);

    let err = repo
        .create("document", record(json!({"name": "Orphan", "type_id": 42})))
        .await
        .unwrap_err();

    assert_eq!(err.to_string(), "Incorrect value for type_id");
    assert_eq!(err.raw_message().map(|m| m.contains("FOREIGN KEY (`type_id`)")), Some(true));
}

#[tokio::test]
async fn test_storage_outage_is_not_translated() {
    let storage = storage();
    let repo = repository(&storage);
    let mut document = repo.get_model("document").unwrap();
    // warm the type cache so the failure comes from the write itself
    repo.type_lookup().table("document_type").await.unwrap();

    storage.set_unavailable(true);
    let err = document
        .store(record(json!({"name": "Report", "type": "final"})))
        .await
        .unwrap_err();
    assert!(matches!(err, DataError::Storage(_)));
    assert_eq!(err.status(), tabula_core::StatusCode::SERVICE_UNAVAILABLE);

    let err = repo.find_all("document", &record(json!({})), 0, 0).await.unwrap_err();
    assert!(matches!(err, DataError::Storage(_)));
}

#[tokio::test]
async fn test_unknown_filter_keys_never_reach_storage() {
    let storage = storage();
    seed_documents(&storage, 4);
    let repo = repository(&storage);

    let rows = repo
        .find_all("document", &record(json!({"type_id": 2, "password": "x"})), 0, 0)
        .await
        .unwrap();
    assert_eq!(rows.len(), 2);

    let rows = repo
        .find_all("document", &record(json!({"type_id": [">", 0], "name": ["like", "DOC-%"]})), 0, 1)
        .await
        .unwrap();
    assert_eq!(rows.len(), 3);
}

#[tokio::test]
async fn test_find_one_and_load_by() {
    let storage = storage();
    seed_documents(&storage, 3);
    let repo = repository(&storage);
    let mut document = repo.get_model("document").unwrap();

    document.find_one(&record(json!({"name": "doc-2"}))).await.unwrap();
    assert_eq!(document.id(), Some(2));

    let err = document
        .find_one(&record(json!({"type_id": 1})))
        .await
        .unwrap_err();
    assert!(matches!(err, DataError::InvalidFilter { .. }));

    let err = document
        .find_one(&record(json!({"name": "nope"})))
        .await
        .unwrap_err();
    assert!(matches!(err, DataError::NotLoaded { .. }));

    let mut other = repo.get_model("document").unwrap();
    other.load_by("name", "doc-3").await.unwrap();
    assert_eq!(other.id(), Some(3));
    assert_eq!(other.get("type_id"), Some(&json!(1)));
}

#[tokio::test]
async fn test_find_one_rejects_only_undeclared_keys() {
    let storage = storage();
    seed_documents(&storage, 1);
    let repo = repository(&storage);
    let mut document = repo.get_model("document").unwrap();

    let err = document
        .find_one(&record(json!({"bogus": 1})))
        .await
        .unwrap_err();
    assert!(matches!(&err, DataError::InvalidFilter { field, .. } if field == "bogus"));
    assert!(!document.is_loaded());

    // one declared key is enough; the undeclared one is dropped
    document
        .find_one(&record(json!({"bogus": 1, "name": "doc-1"})))
        .await
        .unwrap();
    assert_eq!(document.id(), Some(1));
}

#[tokio::test]
async fn test_serialization_hides_columns_and_merges_children() {
    let storage = storage();
    seed_documents(&storage, 1);
    let repo = repository(&storage);

    let mut document = repo.find_by_id("document", 1).await.unwrap();
    let label = repo.type_lookup().label("document_type", 1).await.unwrap();
    document.attach("type", json!({"id": 1, "label": label})).unwrap();

    assert_eq!(
        serde_json::to_value(&document).unwrap(),
        json!({
            "id": 1,
            "name": "doc-1",
            "type_id": 1,
            "type": {"id": 1, "label": "draft"},
        })
    );
}

#[tokio::test]
async fn test_delete_by_refuses_empty_filters() {
    let storage = storage();
    seed_documents(&storage, 3);
    let repo = repository(&storage);
    let document = repo.get_model("document").unwrap();

    let removed = document.delete_by(&record(json!({"bogus": 1}))).await.unwrap();
    assert_eq!(removed, 0);
    assert_eq!(storage.count_rows("document").await.unwrap(), 3);

    let removed = document.delete_by(&record(json!({"type_id": 1}))).await.unwrap();
    assert_eq!(removed, 2);
}
