//! Asset consistency coordinator
//!
//! Every mutating operation touches two systems that share no
//! transaction: the object store and the metadata repository. Create
//! writes the object first and compensates with a best-effort delete when
//! the metadata insert fails; delete runs both removals independently and
//! propagates failures according to the configured policy.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use thiserror::Error;
use tracing::{info, warn, error, instrument};

use crate::db::models::{ImageRecord, NewImage};
use crate::db::{DbError, ImageRepository};
use crate::storage::{ObjectStore, StorageError};

use super::key::{object_key, sanitize_filename};

/// Errors that can occur while coordinating asset operations
#[derive(Error, Debug)]
pub enum AssetError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Repository error: {0}")]
    Repository(#[from] DbError),

    /// The metadata insert failed and the compensating object delete
    /// failed too: the store holds an orphan under `key`. Kept distinct
    /// from `Repository` so the orphan is never silently hidden.
    #[error("Compensation failed for {key}: {repository} (cleanup: {compensation})")]
    CompensationFailed {
        key: String,
        repository: DbError,
        compensation: StorageError,
    },
}

/// A direct upload: the bytes pass through this service
#[derive(Debug)]
pub struct DirectUpload {
    pub filename: String,
    pub content_type: String,
    pub data: Vec<u8>,
    pub description: Option<String>,
}

/// A presigned upload intent: the client uploads to storage itself
#[derive(Debug)]
pub struct PresignRequest {
    pub filename: String,
    pub description: String,
}

/// Result of a presigned upload intent
#[derive(Debug, Clone)]
pub struct PresignedUpload {
    pub url: String,
    pub key: String,
}

/// One page of the image listing
#[derive(Debug, Clone)]
pub struct ListPage {
    pub items: Vec<ImageRecord>,
    pub total_pages: i64,
    pub current_page: i64,
}

/// Coordinator behavior knobs, taken from `Settings::behavior`/`storage`
#[derive(Debug, Clone)]
pub struct CoordinatorOptions {
    /// Surface delete/list sub-failures instead of logging and swallowing
    pub strict_errors: bool,
    /// Expiry for presigned PUT URLs
    pub presign_expiry: Duration,
}

impl Default for CoordinatorOptions {
    fn default() -> Self {
        CoordinatorOptions {
            strict_errors: false,
            presign_expiry: Duration::from_secs(3600),
        }
    }
}

/// Orchestrates create/delete/list across the object store and the
/// metadata repository
pub struct AssetCoordinator {
    store: Arc<dyn ObjectStore>,
    repo: Arc<dyn ImageRepository>,
    options: CoordinatorOptions,
}

impl AssetCoordinator {
    /// Create a new coordinator over the two collaborators
    pub fn new(
        store: Arc<dyn ObjectStore>,
        repo: Arc<dyn ImageRepository>,
        options: CoordinatorOptions,
    ) -> Self {
        Self { store, repo, options }
    }

    /// Upload an image and record its metadata
    ///
    /// Object first, metadata second. A storage failure aborts before the
    /// metadata step; a metadata failure triggers a compensating delete of
    /// the just-written object.
    #[instrument(skip(self, upload), fields(filename = %upload.filename, size = upload.data.len()))]
    pub async fn create_direct(&self, upload: DirectUpload) -> Result<ImageRecord, AssetError> {
        if upload.filename.is_empty() {
            return Err(AssetError::InvalidInput("Filename must not be empty".to_string()));
        }

        let sanitized = sanitize_filename(&upload.filename);
        let key = object_key(Utc::now().timestamp_millis(), &sanitized);

        self.store
            .put_object(&key, upload.data, &upload.content_type)
            .await?;

        let url = self.store.public_url(&key);
        let record = NewImage {
            key: key.clone(),
            url,
            filename: sanitized,
            description: upload.description.unwrap_or_default(),
        };

        match self.repo.insert(record).await {
            Ok(created) => {
                info!(key = %key, id = created.id, "Image asset created");
                Ok(created)
            }
            Err(db_err) => {
                // Undo the object write so no orphan is left behind
                error!(key = %key, error = %db_err, "Metadata insert failed, deleting object");
                match self.store.delete_object(&key).await {
                    Ok(()) => Err(AssetError::Repository(db_err)),
                    Err(cleanup_err) => {
                        error!(
                            key = %key,
                            repository = %db_err,
                            compensation = %cleanup_err,
                            "Compensating delete failed, orphan object remains"
                        );
                        Err(AssetError::CompensationFailed {
                            key,
                            repository: db_err,
                            compensation: cleanup_err,
                        })
                    }
                }
            }
        }
    }

    /// Record an upload intent and hand back a signed PUT URL
    ///
    /// The metadata row is written speculatively; if the client never
    /// uploads, the row stays without an object until a reconciliation
    /// pass outside this service removes it.
    #[instrument(skip(self, request), fields(filename = %request.filename))]
    pub async fn create_presigned(
        &self,
        request: PresignRequest,
    ) -> Result<PresignedUpload, AssetError> {
        if request.filename.is_empty() {
            return Err(AssetError::InvalidInput("Filename must not be empty".to_string()));
        }
        if request.description.is_empty() {
            return Err(AssetError::InvalidInput("Description must not be empty".to_string()));
        }

        let sanitized = sanitize_filename(&request.filename);
        let key = object_key(Utc::now().timestamp_millis(), &sanitized);

        let url = self
            .store
            .presign_put(&key, self.options.presign_expiry)
            .await?;

        self.repo
            .insert(NewImage {
                key: key.clone(),
                url: url.clone(),
                filename: sanitized,
                description: request.description,
            })
            .await?;

        info!(key = %key, "Presigned upload intent recorded");
        Ok(PresignedUpload { url, key })
    }

    /// Delete the object and its metadata record
    ///
    /// Both removals are always attempted, so a failing object delete
    /// never strands the metadata row. In lenient mode sub-failures are
    /// logged and swallowed; in strict mode the first one is returned.
    #[instrument(skip(self))]
    pub async fn delete(&self, key: &str) -> Result<(), AssetError> {
        if key.is_empty() {
            return Err(AssetError::InvalidInput("Missing key".to_string()));
        }

        let storage_result = self.store.delete_object(key).await;
        if let Err(ref e) = storage_result {
            warn!(key = %key, error = %e, "Object delete failed");
        }

        let repo_result = self.repo.delete_by_key(key).await;
        if let Err(ref e) = repo_result {
            warn!(key = %key, error = %e, "Metadata delete failed");
        }

        if self.options.strict_errors {
            storage_result?;
            repo_result?;
        }

        Ok(())
    }

    /// Fetch one page of image metadata, newest first
    ///
    /// Never touches object storage. Repository failures yield an empty
    /// page in lenient mode.
    #[instrument(skip(self))]
    pub async fn list(&self, page: i64, page_size: i64) -> Result<ListPage, AssetError> {
        let page = page.max(1);
        let page_size = page_size.max(1);
        let offset = (page - 1) * page_size;

        let fetched = async {
            let items = self.repo.find_page(offset, page_size).await?;
            let total = self.repo.count().await?;
            Ok::<_, DbError>((items, total))
        }
        .await;

        match fetched {
            Ok((items, total)) => Ok(ListPage {
                items,
                // ceil(total / page_size); 0 for an empty collection
                total_pages: (total + page_size - 1) / page_size,
                current_page: page,
            }),
            Err(e) if self.options.strict_errors => Err(AssetError::Repository(e)),
            Err(e) => {
                warn!(error = %e, "Listing failed, returning empty page");
                Ok(ListPage {
                    items: Vec::new(),
                    total_pages: 0,
                    current_page: page,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, Ordering};

    /// In-memory object store with per-operation failure toggles
    #[derive(Default)]
    struct MemoryStore {
        objects: Mutex<HashMap<String, Vec<u8>>>,
        fail_put: AtomicBool,
        fail_delete: AtomicBool,
        puts: Mutex<Vec<String>>,
        deletes: Mutex<Vec<String>>,
    }

    impl MemoryStore {
        fn contains(&self, key: &str) -> bool {
            self.objects.lock().unwrap().contains_key(key)
        }
    }

    #[async_trait]
    impl ObjectStore for MemoryStore {
        async fn put_object(
            &self,
            key: &str,
            data: Vec<u8>,
            _content_type: &str,
        ) -> Result<(), StorageError> {
            self.puts.lock().unwrap().push(key.to_string());
            if self.fail_put.load(Ordering::SeqCst) {
                return Err(StorageError::UploadFailed("injected".to_string()));
            }
            self.objects.lock().unwrap().insert(key.to_string(), data);
            Ok(())
        }

        async fn delete_object(&self, key: &str) -> Result<(), StorageError> {
            self.deletes.lock().unwrap().push(key.to_string());
            if self.fail_delete.load(Ordering::SeqCst) {
                return Err(StorageError::DeleteFailed("injected".to_string()));
            }
            self.objects.lock().unwrap().remove(key);
            Ok(())
        }

        async fn presign_put(
            &self,
            key: &str,
            _expires_in: Duration,
        ) -> Result<String, StorageError> {
            Ok(format!("https://mock-bucket.example/{}?X-Amz-Signature=test", key))
        }

        fn public_url(&self, key: &str) -> String {
            format!("https://mock-bucket.example/{}", key)
        }
    }

    /// In-memory metadata repository with an insert failure toggle
    #[derive(Default)]
    struct MemoryRepository {
        records: Mutex<Vec<ImageRecord>>,
        fail_insert: AtomicBool,
        fail_find: AtomicBool,
    }

    impl MemoryRepository {
        fn record_count(&self) -> usize {
            self.records.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl ImageRepository for MemoryRepository {
        async fn insert(&self, image: NewImage) -> Result<ImageRecord, DbError> {
            if self.fail_insert.load(Ordering::SeqCst) {
                return Err(DbError::Config("injected insert failure".to_string()));
            }
            let mut records = self.records.lock().unwrap();
            let record = ImageRecord {
                id: records.len() as i32 + 1,
                key: image.key,
                url: image.url,
                filename: image.filename,
                description: image.description,
                created_at: Utc::now(),
            };
            records.push(record.clone());
            Ok(record)
        }

        async fn find_page(&self, offset: i64, limit: i64) -> Result<Vec<ImageRecord>, DbError> {
            if self.fail_find.load(Ordering::SeqCst) {
                return Err(DbError::Config("injected find failure".to_string()));
            }
            let mut records = self.records.lock().unwrap().clone();
            records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
            Ok(records
                .into_iter()
                .skip(offset as usize)
                .take(limit as usize)
                .collect())
        }

        async fn count(&self) -> Result<i64, DbError> {
            if self.fail_find.load(Ordering::SeqCst) {
                return Err(DbError::Config("injected count failure".to_string()));
            }
            Ok(self.records.lock().unwrap().len() as i64)
        }

        async fn delete_by_key(&self, key: &str) -> Result<(), DbError> {
            self.records.lock().unwrap().retain(|r| r.key != key);
            Ok(())
        }
    }

    fn coordinator(
        store: Arc<MemoryStore>,
        repo: Arc<MemoryRepository>,
        strict: bool,
    ) -> AssetCoordinator {
        AssetCoordinator::new(
            store,
            repo,
            CoordinatorOptions {
                strict_errors: strict,
                presign_expiry: Duration::from_secs(3600),
            },
        )
    }

    fn upload(filename: &str) -> DirectUpload {
        DirectUpload {
            filename: filename.to_string(),
            content_type: "image/png".to_string(),
            data: vec![1, 2, 3],
            description: Some("a test image".to_string()),
        }
    }

    #[tokio::test]
    async fn test_create_direct_writes_object_and_record() {
        let store = Arc::new(MemoryStore::default());
        let repo = Arc::new(MemoryRepository::default());
        let coord = coordinator(store.clone(), repo.clone(), false);

        let record = coord.create_direct(upload("cat photo.png")).await.unwrap();

        assert_eq!(record.filename, "cat_photo.png");
        assert!(record.key.starts_with("images/"));
        assert!(record.key.ends_with("-cat_photo.png"));
        assert_eq!(record.url, format!("https://mock-bucket.example/{}", record.key));
        assert!(store.contains(&record.key));
        assert_eq!(repo.record_count(), 1);
    }

    #[tokio::test]
    async fn test_storage_failure_leaves_no_metadata() {
        let store = Arc::new(MemoryStore::default());
        let repo = Arc::new(MemoryRepository::default());
        store.fail_put.store(true, Ordering::SeqCst);
        let coord = coordinator(store.clone(), repo.clone(), false);

        let err = coord.create_direct(upload("cat.png")).await.unwrap_err();

        assert!(matches!(err, AssetError::Storage(_)));
        assert_eq!(repo.record_count(), 0);
    }

    #[tokio::test]
    async fn test_metadata_failure_compensates_with_object_delete() {
        let store = Arc::new(MemoryStore::default());
        let repo = Arc::new(MemoryRepository::default());
        repo.fail_insert.store(true, Ordering::SeqCst);
        let coord = coordinator(store.clone(), repo.clone(), false);

        let err = coord.create_direct(upload("cat.png")).await.unwrap_err();

        assert!(matches!(err, AssetError::Repository(_)));
        // The written object was removed again
        let written = store.puts.lock().unwrap().clone();
        assert_eq!(written.len(), 1);
        assert!(!store.contains(&written[0]));
    }

    #[tokio::test]
    async fn test_double_failure_is_its_own_category() {
        let store = Arc::new(MemoryStore::default());
        let repo = Arc::new(MemoryRepository::default());
        repo.fail_insert.store(true, Ordering::SeqCst);
        store.fail_delete.store(true, Ordering::SeqCst);
        let coord = coordinator(store.clone(), repo.clone(), false);

        let err = coord.create_direct(upload("cat.png")).await.unwrap_err();

        match err {
            AssetError::CompensationFailed { key, .. } => {
                // The orphan object is still in the store
                assert!(store.contains(&key));
            }
            other => panic!("expected CompensationFailed, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_empty_filename_rejected_before_any_call() {
        let store = Arc::new(MemoryStore::default());
        let repo = Arc::new(MemoryRepository::default());
        let coord = coordinator(store.clone(), repo.clone(), false);

        let err = coord.create_direct(upload("")).await.unwrap_err();

        assert!(matches!(err, AssetError::InvalidInput(_)));
        assert!(store.puts.lock().unwrap().is_empty());
        assert_eq!(repo.record_count(), 0);
    }

    #[tokio::test]
    async fn test_repeated_uploads_create_independent_records() {
        let store = Arc::new(MemoryStore::default());
        let repo = Arc::new(MemoryRepository::default());
        let coord = coordinator(store.clone(), repo.clone(), false);

        let first = coord.create_direct(upload("cat.png")).await.unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;
        let second = coord.create_direct(upload("cat.png")).await.unwrap();

        assert_ne!(first.key, second.key);
        assert_eq!(repo.record_count(), 2);
    }

    #[tokio::test]
    async fn test_presign_records_intent_without_object_write() {
        let store = Arc::new(MemoryStore::default());
        let repo = Arc::new(MemoryRepository::default());
        let coord = coordinator(store.clone(), repo.clone(), false);

        let result = coord
            .create_presigned(PresignRequest {
                filename: "new upload.png".to_string(),
                description: "pending upload".to_string(),
            })
            .await
            .unwrap();

        assert!(result.key.ends_with("-new_upload.png"));
        assert!(result.url.contains("X-Amz-Signature"));
        // No object was written, but the row exists with the signed URL
        assert!(store.puts.lock().unwrap().is_empty());
        assert_eq!(repo.record_count(), 1);
        assert_eq!(repo.records.lock().unwrap()[0].url, result.url);
    }

    #[tokio::test]
    async fn test_presign_rejects_empty_description() {
        let store = Arc::new(MemoryStore::default());
        let repo = Arc::new(MemoryRepository::default());
        let coord = coordinator(store.clone(), repo.clone(), false);

        let err = coord
            .create_presigned(PresignRequest {
                filename: "cat.png".to_string(),
                description: String::new(),
            })
            .await
            .unwrap_err();

        assert!(matches!(err, AssetError::InvalidInput(_)));
        assert_eq!(repo.record_count(), 0);
    }

    #[tokio::test]
    async fn test_delete_removes_both_sides() {
        let store = Arc::new(MemoryStore::default());
        let repo = Arc::new(MemoryRepository::default());
        let coord = coordinator(store.clone(), repo.clone(), false);

        let record = coord.create_direct(upload("cat.png")).await.unwrap();
        coord.delete(&record.key).await.unwrap();

        assert!(!store.contains(&record.key));
        assert_eq!(repo.record_count(), 0);
    }

    #[tokio::test]
    async fn test_lenient_delete_swallows_storage_failure() {
        let store = Arc::new(MemoryStore::default());
        let repo = Arc::new(MemoryRepository::default());
        let coord = coordinator(store.clone(), repo.clone(), false);

        let record = coord.create_direct(upload("cat.png")).await.unwrap();
        store.fail_delete.store(true, Ordering::SeqCst);

        coord.delete(&record.key).await.unwrap();

        // The metadata delete still ran, so the row is gone either way
        assert_eq!(repo.record_count(), 0);
    }

    #[tokio::test]
    async fn test_strict_delete_surfaces_storage_failure() {
        let store = Arc::new(MemoryStore::default());
        let repo = Arc::new(MemoryRepository::default());
        let coord = coordinator(store.clone(), repo.clone(), true);

        let record = coord.create_direct(upload("cat.png")).await.unwrap();
        store.fail_delete.store(true, Ordering::SeqCst);

        let err = coord.delete(&record.key).await.unwrap_err();

        assert!(matches!(err, AssetError::Storage(_)));
        // Both removals were still attempted
        assert_eq!(repo.record_count(), 0);
    }

    #[tokio::test]
    async fn test_delete_empty_key_touches_nothing() {
        let store = Arc::new(MemoryStore::default());
        let repo = Arc::new(MemoryRepository::default());
        let coord = coordinator(store.clone(), repo.clone(), false);

        let err = coord.delete("").await.unwrap_err();

        assert!(matches!(err, AssetError::InvalidInput(_)));
        assert!(store.deletes.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_list_empty_repository() {
        let store = Arc::new(MemoryStore::default());
        let repo = Arc::new(MemoryRepository::default());
        let coord = coordinator(store, repo, false);

        let page = coord.list(1, 12).await.unwrap();

        assert!(page.items.is_empty());
        assert_eq!(page.total_pages, 0);
        assert_eq!(page.current_page, 1);
    }

    #[tokio::test]
    async fn test_list_paginates_newest_first() {
        let store = Arc::new(MemoryStore::default());
        let repo = Arc::new(MemoryRepository::default());
        let coord = coordinator(store, repo.clone(), false);

        for i in 0..5 {
            coord
                .create_direct(upload(&format!("img{}.png", i)))
                .await
                .unwrap();
            tokio::time::sleep(Duration::from_millis(3)).await;
        }

        let page = coord.list(1, 2).await.unwrap();
        assert_eq!(page.items.len(), 2);
        assert_eq!(page.total_pages, 3); // ceil(5 / 2)
        assert_eq!(page.items[0].filename, "img4.png");

        let last = coord.list(3, 2).await.unwrap();
        assert_eq!(last.items.len(), 1);
        assert_eq!(last.items[0].filename, "img0.png");
    }

    #[tokio::test]
    async fn test_lenient_list_returns_empty_page_on_failure() {
        let store = Arc::new(MemoryStore::default());
        let repo = Arc::new(MemoryRepository::default());
        repo.fail_find.store(true, Ordering::SeqCst);
        let coord = coordinator(store, repo, false);

        let page = coord.list(2, 12).await.unwrap();

        assert!(page.items.is_empty());
        assert_eq!(page.total_pages, 0);
        assert_eq!(page.current_page, 2);
    }

    #[tokio::test]
    async fn test_strict_list_surfaces_failure() {
        let store = Arc::new(MemoryStore::default());
        let repo = Arc::new(MemoryRepository::default());
        repo.fail_find.store(true, Ordering::SeqCst);
        let coord = coordinator(store, repo, true);

        let err = coord.list(1, 12).await.unwrap_err();
        assert!(matches!(err, AssetError::Repository(_)));
    }
}
