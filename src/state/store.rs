use std::sync::RwLock;

use crate::state::storage::{KeyValueStorage, StorageError};

/// Storage key for the persisted image list.
/// The value is a JSON-encoded array of image reference strings,
/// insertion-ordered, with no duplicates. An absent key means an
/// empty gallery.
const IMAGES_KEY: &str = "gallery_images";

/// Errors surfaced to callers of the mutating store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("image list could not be encoded or decoded: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Default)]
struct Mirror {
    references: Vec<String>,
    ready: bool,
}

/// The single source of truth for the photo list.
///
/// `ImageStore` owns the canonical list of image references (file
/// paths or URIs — the strings are opaque here), mediates every read
/// and write of its storage key, and keeps an in-memory mirror that
/// the screens render from. It is constructed once at startup and
/// shared as `Arc<ImageStore<_>>` by every screen; screens never
/// mutate the list directly.
///
/// Appends re-read the persisted list fresh from storage before
/// writing, so two sequential appends always observe each other's
/// completed writes even when neither went through this instance's
/// mirror. There is no lock around the read-then-write window; the UI
/// runtime delivers events one at a time and in-flight saves disable
/// the capture buttons, so overlapping appends do not occur in
/// practice.
///
/// The mirror lock is only ever held between awaits, never across one.
pub struct ImageStore<S> {
    storage: S,
    mirror: RwLock<Mirror>,
}

impl<S: KeyValueStorage> ImageStore<S> {
    /// Create a store over the given storage backend. The mirror
    /// starts empty and not ready; call [`initialize`](Self::initialize)
    /// exactly once before rendering from it.
    pub fn new(storage: S) -> Self {
        ImageStore {
            storage,
            mirror: RwLock::new(Mirror::default()),
        }
    }

    /// Load the persisted image list into the mirror.
    ///
    /// Runs once, at startup. A missing key yields an empty list; a
    /// read or parse failure is logged and also yields an empty list.
    /// The store always ends up ready — load problems are never fatal
    /// and never surfaced to the caller.
    pub async fn initialize(&self) {
        let references = self.load_persisted().await;
        println!("📥 Loaded {} image(s) from storage", references.len());

        let mut mirror = self.mirror.write().expect("image list lock poisoned");
        mirror.references = references;
        mirror.ready = true;
    }

    /// Re-read the persisted list and overwrite the mirror with it,
    /// unconditionally.
    ///
    /// Used to resynchronize after something else may have touched the
    /// persisted list. Same recovery behavior as [`initialize`](Self::initialize);
    /// `ready` stays true.
    pub async fn refresh(&self) {
        let references = self.load_persisted().await;

        let mut mirror = self.mirror.write().expect("image list lock poisoned");
        mirror.references = references;
        mirror.ready = true;
    }

    /// Append a batch of image references to the persisted list.
    ///
    /// The current list is re-read fresh from storage (not from the
    /// mirror, which may be stale relative to another writer). Each
    /// candidate not already present — in the fresh list or earlier in
    /// the same batch — is appended in the order given. The combined
    /// list is written back as a single blob, the mirror is updated,
    /// and the combined length is returned.
    ///
    /// If the storage read or write fails, the operation fails as a
    /// whole: nothing is persisted and the mirror is left unchanged.
    pub async fn append_batch(&self, candidates: Vec<String>) -> Result<usize, StoreError> {
        let persisted = self.storage.get(IMAGES_KEY).await?;
        let mut combined: Vec<String> = match persisted {
            Some(blob) => serde_json::from_str(&blob)?,
            None => Vec::new(),
        };

        let existing = combined.len();
        for candidate in candidates {
            if !combined.contains(&candidate) {
                combined.push(candidate);
            }
        }

        let blob = serde_json::to_string(&combined)?;
        self.storage.set(IMAGES_KEY, &blob).await?;

        let total = combined.len();
        println!(
            "💾 Storage updated: {} image(s) ({} new)",
            total,
            total - existing
        );

        let mut mirror = self.mirror.write().expect("image list lock poisoned");
        mirror.references = combined;

        Ok(total)
    }

    /// Append a single image reference. Equivalent to
    /// [`append_batch`](Self::append_batch) with a one-element batch.
    pub async fn append_one(&self, candidate: String) -> Result<usize, StoreError> {
        self.append_batch(vec![candidate]).await
    }

    /// Remove every image reference.
    ///
    /// The mirror is emptied immediately so the gallery clears without
    /// waiting on storage, then the persisted key is deleted. If the
    /// deletion fails the error is returned, but the in-memory clear is
    /// not rolled back; a later [`refresh`](Self::refresh) would reveal
    /// the stale persisted list.
    pub async fn clear(&self) -> Result<(), StoreError> {
        println!("🗑️  Clearing all images");
        {
            let mut mirror = self.mirror.write().expect("image list lock poisoned");
            mirror.references.clear();
        }

        if let Err(e) = self.storage.delete(IMAGES_KEY).await {
            eprintln!("⚠️  Failed to remove the persisted image list: {}", e);
            return Err(e.into());
        }

        Ok(())
    }

    /// A snapshot of the current image list, in insertion order.
    pub fn references(&self) -> Vec<String> {
        self.mirror
            .read()
            .expect("image list lock poisoned")
            .references
            .clone()
    }

    /// False until the initial load has completed.
    pub fn is_ready(&self) -> bool {
        self.mirror.read().expect("image list lock poisoned").ready
    }

    /// Shared load logic for `initialize` and `refresh`: read the
    /// blob, treating an absent key, a failed read, or unparseable
    /// JSON as an empty list.
    async fn load_persisted(&self) -> Vec<String> {
        let blob = match self.storage.get(IMAGES_KEY).await {
            Ok(Some(blob)) => blob,
            Ok(None) => return Vec::new(),
            Err(e) => {
                eprintln!("⚠️  Could not read the image list, starting empty: {}", e);
                return Vec::new();
            }
        };

        match serde_json::from_str(&blob) {
            Ok(references) => references,
            Err(e) => {
                eprintln!("⚠️  Stored image list is unreadable, starting empty: {}", e);
                Vec::new()
            }
        }
    }
}

impl<S> std::fmt::Debug for ImageStore<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mirror = self.mirror.read().expect("image list lock poisoned");
        f.debug_struct("ImageStore")
            .field("references", &mirror.references.len())
            .field("ready", &mirror.ready)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    /// In-memory stand-in for the SQLite backend. Cloning shares the
    /// underlying map, so tests can act as "another writer".
    #[derive(Clone, Default)]
    struct MemoryStorage {
        entries: Arc<Mutex<HashMap<String, String>>>,
    }

    impl MemoryStorage {
        fn with_blob(blob: &str) -> Self {
            let storage = MemoryStorage::default();
            storage
                .entries
                .lock()
                .unwrap()
                .insert(IMAGES_KEY.to_owned(), blob.to_owned());
            storage
        }

        fn raw_blob(&self) -> Option<String> {
            self.entries.lock().unwrap().get(IMAGES_KEY).cloned()
        }
    }

    #[async_trait]
    impl KeyValueStorage for MemoryStorage {
        async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
            Ok(self.entries.lock().unwrap().get(key).cloned())
        }

        async fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
            self.entries
                .lock()
                .unwrap()
                .insert(key.to_owned(), value.to_owned());
            Ok(())
        }

        async fn delete(&self, key: &str) -> Result<(), StorageError> {
            self.entries.lock().unwrap().remove(key);
            Ok(())
        }
    }

    /// Backend whose writes always fail. Reads serve a fixed blob.
    struct FailingStorage {
        blob: Option<String>,
    }

    fn write_refused() -> StorageError {
        StorageError::Io(std::io::Error::new(
            std::io::ErrorKind::Other,
            "storage refused the write",
        ))
    }

    #[async_trait]
    impl KeyValueStorage for FailingStorage {
        async fn get(&self, _key: &str) -> Result<Option<String>, StorageError> {
            Ok(self.blob.clone())
        }

        async fn set(&self, _key: &str, _value: &str) -> Result<(), StorageError> {
            Err(write_refused())
        }

        async fn delete(&self, _key: &str) -> Result<(), StorageError> {
            Err(write_refused())
        }
    }

    fn refs(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_initialize_empty_storage() {
        let store = ImageStore::new(MemoryStorage::default());
        assert!(!store.is_ready());

        store.initialize().await;

        assert!(store.is_ready());
        assert!(store.references().is_empty());
    }

    #[tokio::test]
    async fn test_initialize_adopts_persisted_list() {
        let storage = MemoryStorage::with_blob(r#"["a.jpg","b.jpg"]"#);
        let store = ImageStore::new(storage);

        store.initialize().await;

        assert!(store.is_ready());
        assert_eq!(store.references(), refs(&["a.jpg", "b.jpg"]));
    }

    #[tokio::test]
    async fn test_initialize_with_malformed_blob_starts_empty() {
        let storage = MemoryStorage::with_blob("not json at all {");
        let store = ImageStore::new(storage);

        store.initialize().await;

        assert!(store.is_ready());
        assert!(store.references().is_empty());
    }

    #[tokio::test]
    async fn test_append_then_append_then_clear_scenario() {
        let storage = MemoryStorage::default();
        let store = ImageStore::new(storage.clone());
        store.initialize().await;

        let total = store.append_batch(refs(&["a", "b"])).await.unwrap();
        assert_eq!(total, 2);
        assert_eq!(store.references(), refs(&["a", "b"]));

        let total = store.append_batch(refs(&["b", "c"])).await.unwrap();
        assert_eq!(total, 3);
        assert_eq!(store.references(), refs(&["a", "b", "c"]));

        store.clear().await.unwrap();
        assert!(store.references().is_empty());
        assert_eq!(storage.raw_blob(), None);
    }

    #[tokio::test]
    async fn test_append_empty_batch_is_noop() {
        let storage = MemoryStorage::default();
        let store = ImageStore::new(storage.clone());
        store.initialize().await;
        store.append_batch(refs(&["a", "b"])).await.unwrap();

        let total = store.append_batch(Vec::new()).await.unwrap();

        assert_eq!(total, 2);
        assert_eq!(store.references(), refs(&["a", "b"]));
    }

    #[tokio::test]
    async fn test_append_existing_reference_is_idempotent() {
        let store = ImageStore::new(MemoryStorage::default());
        store.initialize().await;
        store.append_batch(refs(&["a", "b"])).await.unwrap();

        let total = store.append_one("a".to_owned()).await.unwrap();

        assert_eq!(total, 2);
        assert_eq!(store.references(), refs(&["a", "b"]));
    }

    #[tokio::test]
    async fn test_duplicates_within_one_batch_are_skipped() {
        let store = ImageStore::new(MemoryStorage::default());
        store.initialize().await;

        let total = store
            .append_batch(refs(&["a", "b", "a", "c", "b"]))
            .await
            .unwrap();

        assert_eq!(total, 3);
        assert_eq!(store.references(), refs(&["a", "b", "c"]));
    }

    #[tokio::test]
    async fn test_append_preserves_first_appearance_order() {
        let store = ImageStore::new(MemoryStorage::default());
        store.initialize().await;

        store.append_batch(refs(&["c", "a"])).await.unwrap();
        store.append_batch(refs(&["b", "a", "d"])).await.unwrap();

        assert_eq!(store.references(), refs(&["c", "a", "b", "d"]));
    }

    #[tokio::test]
    async fn test_append_reads_fresh_persisted_state() {
        let storage = MemoryStorage::default();
        let store = ImageStore::new(storage.clone());
        store.initialize().await;
        store.append_one("a".to_owned()).await.unwrap();

        // Another writer updates the persisted list behind the mirror's back
        storage
            .set(IMAGES_KEY, r#"["a","outside"]"#)
            .await
            .unwrap();

        let total = store.append_one("b".to_owned()).await.unwrap();

        assert_eq!(total, 3);
        assert_eq!(store.references(), refs(&["a", "outside", "b"]));
    }

    #[tokio::test]
    async fn test_append_write_failure_leaves_mirror_unchanged() {
        let store = ImageStore::new(FailingStorage {
            blob: Some(r#"["a"]"#.to_owned()),
        });
        store.initialize().await;
        assert_eq!(store.references(), refs(&["a"]));

        let result = store.append_one("b".to_owned()).await;

        assert!(result.is_err());
        assert_eq!(store.references(), refs(&["a"]));
    }

    #[tokio::test]
    async fn test_append_over_corrupt_blob_fails() {
        let store = ImageStore::new(MemoryStorage::with_blob("{{{"));
        store.initialize().await;

        let result = store.append_one("a".to_owned()).await;

        assert!(matches!(result, Err(StoreError::Json(_))));
        assert!(store.references().is_empty());
    }

    #[tokio::test]
    async fn test_clear_then_refresh_stays_empty() {
        let storage = MemoryStorage::default();
        let store = ImageStore::new(storage.clone());
        store.initialize().await;
        store.append_batch(refs(&["a", "b"])).await.unwrap();

        store.clear().await.unwrap();
        store.refresh().await;

        assert!(store.references().is_empty());
        assert!(store.is_ready());
    }

    #[tokio::test]
    async fn test_clear_failure_keeps_mirror_empty() {
        let store = ImageStore::new(FailingStorage {
            blob: Some(r#"["a","b"]"#.to_owned()),
        });
        store.initialize().await;
        assert_eq!(store.references().len(), 2);

        let result = store.clear().await;

        assert!(result.is_err());
        assert!(store.references().is_empty());
    }

    #[tokio::test]
    async fn test_refresh_overwrites_mirror() {
        let storage = MemoryStorage::default();
        let store = ImageStore::new(storage.clone());
        store.initialize().await;
        store.append_one("a".to_owned()).await.unwrap();

        storage.set(IMAGES_KEY, r#"["x","y"]"#).await.unwrap();
        store.refresh().await;

        assert_eq!(store.references(), refs(&["x", "y"]));
    }

    #[tokio::test]
    async fn test_refresh_over_corrupt_blob_yields_empty() {
        let storage = MemoryStorage::default();
        let store = ImageStore::new(storage.clone());
        store.initialize().await;
        store.append_one("a".to_owned()).await.unwrap();

        storage.set(IMAGES_KEY, "][").await.unwrap();
        store.refresh().await;

        assert!(store.references().is_empty());
        assert!(store.is_ready());
    }

    #[tokio::test]
    async fn test_persisted_blob_is_a_json_array() {
        let storage = MemoryStorage::default();
        let store = ImageStore::new(storage.clone());
        store.initialize().await;

        store.append_batch(refs(&["a", "b"])).await.unwrap();

        assert_eq!(storage.raw_blob().as_deref(), Some(r#"["a","b"]"#));
    }
}
