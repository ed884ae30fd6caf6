mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use common::{record, repository, storage};
use serde_json::json;
use tabula_data::{Filters, InMemoryStorage, Record, StorageEngine, StorageError, TypeLookup};

#[tokio::test]
async fn test_label_round_trip() {
    let repo = repository(&storage());
    let lookup = repo.type_lookup();

    assert_eq!(lookup.label_id("document_type", "FINAL").await.unwrap(), Some(2));
    assert_eq!(lookup.label("document_type", 1).await.unwrap().as_deref(), Some("draft"));
    assert_eq!(lookup.label_id("document_type", "archived").await.unwrap(), None);
    assert!(lookup.is_cached("document_type"));
}

#[tokio::test]
async fn test_save_to_type_table_refreshes_lookup() {
    let storage = storage();
    let repo = repository(&storage);
    let lookup = repo.type_lookup();

    assert_eq!(lookup.label_id("document_type", "archived").await.unwrap(), None);

    let id = repo
        .create("document_type", record(json!({"label": "archived"})))
        .await
        .unwrap();
    assert!(!lookup.is_cached("document_type"));
    assert_eq!(lookup.label_id("document_type", "Archived").await.unwrap(), Some(id));

    // typed entities see the new label right away
    repo.create("document", record(json!({"name": "Old", "type": "archived"})))
        .await
        .unwrap();
    assert_eq!(storage.rows("document")[0]["type_id"], json!(id));
}

#[tokio::test]
async fn test_delete_from_type_table_refreshes_lookup() {
    let repo = repository(&storage());
    let lookup = repo.type_lookup();
    assert_eq!(lookup.label("document_type", 2).await.unwrap().as_deref(), Some("final"));

    repo.delete_by_id("document_type", 2).await.unwrap();
    assert_eq!(lookup.label("document_type", 2).await.unwrap(), None);
}

#[tokio::test]
async fn test_invalidation_is_per_kind() {
    let storage = storage();
    storage.seed(
        "priority",
        "id",
        [record(json!({"id": 1, "label": "low"}))],
    );
    let lookup = TypeLookup::new(Arc::new(storage));
    lookup.table("document_type").await.unwrap();
    lookup.table("priority").await.unwrap();

    lookup.invalidate("document_type");
    assert!(!lookup.is_cached("document_type"));
    assert!(lookup.is_cached("priority"));
}

/// Storage that counts reads of every kind.
struct CountingStorage {
    inner: InMemoryStorage,
    reads: AtomicUsize,
}

#[async_trait]
impl StorageEngine for CountingStorage {
    async fn find_rows(
        &self,
        kind: &str,
        filters: &Filters,
        limit: Option<u64>,
        offset: u64,
    ) -> Result<Vec<Record>, StorageError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        tokio::task::yield_now().await;
        self.inner.find_rows(kind, filters, limit, offset).await
    }

    async fn count_rows(&self, kind: &str) -> Result<u64, StorageError> {
        self.inner.count_rows(kind).await
    }

    async fn insert_or_update(
        &self,
        kind: &str,
        id_field: &str,
        id: Option<i64>,
        fields: Record,
    ) -> Result<i64, StorageError> {
        self.inner.insert_or_update(kind, id_field, id, fields).await
    }

    async fn delete_rows(&self, kind: &str, filters: &Filters) -> Result<u64, StorageError> {
        self.inner.delete_rows(kind, filters).await
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_lookups_share_one_read() {
    let storage = Arc::new(CountingStorage {
        inner: storage(),
        reads: AtomicUsize::new(0),
    });
    let lookup = TypeLookup::new(storage.clone());

    let handles: Vec<_> = (0..32)
        .map(|_| {
            let lookup = lookup.clone();
            tokio::spawn(async move { lookup.label_id("document_type", "final").await })
        })
        .collect();
    for handle in handles {
        assert_eq!(handle.await.unwrap().unwrap(), Some(2));
    }
    assert_eq!(storage.reads.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_failed_rebuild_is_reported_and_retried() {
    let storage = storage();
    let lookup = TypeLookup::new(Arc::new(storage.clone()));

    storage.set_unavailable(true);
    assert!(lookup.table("document_type").await.is_err());
    assert!(!lookup.is_cached("document_type"));

    storage.set_unavailable(false);
    assert_eq!(lookup.table("document_type").await.unwrap().len(), 2);
}
