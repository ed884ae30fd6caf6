use dashmap::DashMap;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::OnceCell;

type Slot<V> = Arc<OnceCell<Arc<V>>>;

/// A thread-safe cache of immutable snapshots, one per key, backed by `DashMap`.
///
/// A key is either empty or holds a complete snapshot. Snapshots are built
/// off to the side and published in one step, so readers never observe a
/// partially built value. Concurrent callers asking for the same missing key
/// share a single in-flight build.
///
/// [`invalidate`](Self::invalidate) detaches the key's slot. A build that was
/// already running finishes into the detached slot and is only seen by the
/// callers that were waiting on it; the next caller starts a fresh build.
pub struct SnapshotCache<V> {
    inner: Arc<DashMap<String, Slot<V>>>,
}

impl<V> Clone for SnapshotCache<V> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<V> Default for SnapshotCache<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> SnapshotCache<V> {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(DashMap::new()),
        }
    }

    /// Get the published snapshot for `key` without triggering a build.
    pub fn peek(&self, key: &str) -> Option<Arc<V>> {
        self.inner
            .get(key)
            .and_then(|slot| slot.value().get().cloned())
    }

    /// Get the snapshot for `key`, building it with `build` if absent.
    ///
    /// Only one `build` runs per key at a time; other callers wait for it.
    /// A failed build publishes nothing and the error goes to the caller
    /// that ran it. Waiting callers then retry with their own `build`.
    pub async fn get_or_try_build<F, Fut, E>(&self, key: &str, build: F) -> Result<Arc<V>, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        // Clone the slot out so no map guard is held across the await.
        let slot = self
            .inner
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(OnceCell::new()))
            .clone();

        if let Some(snapshot) = slot.get() {
            tracing::trace!(key, "snapshot cache hit");
            return Ok(snapshot.clone());
        }

        let snapshot = slot
            .get_or_try_init(move || async move {
                tracing::debug!(key, "building snapshot");
                build().await.map(Arc::new)
            })
            .await?;
        Ok(snapshot.clone())
    }

    /// Drop the snapshot for `key`, forcing the next reader to rebuild.
    pub fn invalidate(&self, key: &str) {
        if self.inner.remove(key).is_some() {
            tracing::debug!(key, "snapshot invalidated");
        }
    }

    /// Drop every snapshot.
    pub fn clear(&self) {
        self.inner.clear();
    }

    /// Number of keys with a published snapshot.
    pub fn len(&self) -> usize {
        self.inner
            .iter()
            .filter(|slot| slot.value().get().is_some())
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
