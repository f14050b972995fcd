//! Object store gateway for source images and cached derivatives
//! Uses Apache Arrow object_store crate

use bytes::Bytes;
use futures::stream::{self, BoxStream, StreamExt};
use object_store::aws::AmazonS3Builder;
use object_store::local::LocalFileSystem;
use object_store::memory::InMemory;
use object_store::{
    Attribute, AttributeValue, Attributes, GetResult, ObjectStore, PutOptions,
    path::Path as StoragePath,
};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;

use crate::config::{StorageConfig, StorageProvider};

/// Bytes inspected when a cached object carries no content type
pub const SNIFF_LEN: usize = 512;

const FALLBACK_CONTENT_TYPE: &str = "application/octet-stream";

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Storage setup failed: {0}")]
    Setup(String),

    #[error("Object store error: {0}")]
    ObjectStoreError(#[from] object_store::Error),
}

/// Storage result type
pub type Result<T> = std::result::Result<T, StorageError>;

/// Cached derivative ready to be streamed back
pub struct CachedObject {
    pub content_type: String,
    pub size: u64,
    pub stream: BoxStream<'static, Result<Bytes>>,
}

/// Fully read source image
#[derive(Debug, Clone)]
pub struct SourceObject {
    pub bytes: Bytes,
    /// Content type recorded by the store, if any
    pub content_type: Option<String>,
}

/// Storage client wrapping object_store
#[derive(Clone)]
pub struct StorageClient {
    store: Arc<dyn ObjectStore>,
    pub bucket: String,
    /// Backends like the local filesystem cannot persist object attributes
    attributes: bool,
    operations: Arc<AtomicU64>,
}

impl StorageClient {
    /// Create new storage client with any object_store backend
    pub fn new(store: Arc<dyn ObjectStore>, bucket: String) -> Self {
        Self {
            store,
            bucket,
            attributes: true,
            operations: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Create in-memory storage for testing/development
    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemory::new()), "thumbbox-local".to_string())
    }

    /// Build the backend selected by configuration
    pub fn from_config(config: &StorageConfig) -> Result<Self> {
        match config.provider {
            StorageProvider::S3 => {
                let mut builder = AmazonS3Builder::new()
                    .with_bucket_name(&config.bucket)
                    .with_endpoint(&config.endpoint)
                    .with_region(&config.region)
                    .with_allow_http(config.endpoint.starts_with("http://"));
                if let (Some(key), Some(secret)) = (&config.access_key, &config.secret_key) {
                    builder = builder
                        .with_access_key_id(key)
                        .with_secret_access_key(secret);
                }
                Ok(Self::new(Arc::new(builder.build()?), config.bucket.clone()))
            }
            StorageProvider::Local => {
                let root = config
                    .root
                    .as_ref()
                    .ok_or_else(|| StorageError::Setup("local provider needs a root".into()))?
                    .join(&config.bucket);
                std::fs::create_dir_all(&root)
                    .map_err(|e| StorageError::Setup(format!("{}: {e}", root.display())))?;
                let store = LocalFileSystem::new_with_prefix(&root)?;
                Ok(Self {
                    attributes: false,
                    ..Self::new(Arc::new(store), config.bucket.clone())
                })
            }
            StorageProvider::Memory => Ok(Self::new(
                Arc::new(InMemory::new()),
                config.bucket.clone(),
            )),
        }
    }

    /// Number of object store calls issued so far
    pub fn operation_count(&self) -> u64 {
        self.operations.load(Ordering::Relaxed)
    }

    fn count(&self) {
        self.operations.fetch_add(1, Ordering::Relaxed);
    }

    /// Size of the object at `key`, or `None` when it does not exist
    pub async fn stat(&self, key: &str) -> Result<Option<u64>> {
        self.count();
        match self.store.head(&StoragePath::from(key)).await {
            Ok(meta) => Ok(Some(meta.size as u64)),
            Err(object_store::Error::NotFound { .. }) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Check if key exists
    pub async fn exists(&self, key: &str) -> Result<bool> {
        Ok(self.stat(key).await?.is_some())
    }

    async fn get(&self, key: &str) -> Result<GetResult> {
        self.count();
        match self.store.get(&StoragePath::from(key)).await {
            Ok(result) => Ok(result),
            Err(object_store::Error::NotFound { .. }) => Err(StorageError::NotFound(key.into())),
            Err(e) => Err(e.into()),
        }
    }

    /// Open a cached derivative as a byte stream.
    ///
    /// When the store kept no content type, it is sniffed from the first
    /// [`SNIFF_LEN`] bytes, which are then replayed ahead of the rest.
    pub async fn fetch_target(&self, key: &str) -> Result<CachedObject> {
        let result = self.get(key).await?;
        let size = result.meta.size as u64;
        let recorded = content_type_of(&result.attributes);
        let mut stream = result.into_stream();

        if let Some(content_type) = recorded {
            return Ok(CachedObject {
                content_type,
                size,
                stream: stream.map(|chunk| chunk.map_err(StorageError::from)).boxed(),
            });
        }

        let mut prefix: Vec<Bytes> = Vec::new();
        let mut buffered = 0;
        while buffered < SNIFF_LEN {
            match stream.next().await {
                Some(chunk) => {
                    let chunk = chunk?;
                    buffered += chunk.len();
                    prefix.push(chunk);
                }
                None => break,
            }
        }

        let head: Vec<u8> = prefix.iter().flat_map(|chunk| chunk.iter().copied()).collect();
        let content_type = sniff_content_type(&head[..head.len().min(SNIFF_LEN)]).to_string();
        tracing::debug!(key, %content_type, "Sniffed cached content type");

        let replay = stream::iter(prefix.into_iter().map(Ok));
        let rest = stream.map(|chunk| chunk.map_err(StorageError::from));
        Ok(CachedObject {
            content_type,
            size,
            stream: replay.chain(rest).boxed(),
        })
    }

    /// Read a whole source image.
    ///
    /// A missing object is reported as [`StorageError::NotFound`].
    pub async fn fetch_source(&self, key: &str) -> Result<SourceObject> {
        let result = self.get(key).await?;
        let content_type = content_type_of(&result.attributes);
        let bytes = result.bytes().await?;

        tracing::info!(key, size = bytes.len(), "Downloaded source from storage");

        Ok(SourceObject {
            bytes,
            content_type,
        })
    }

    /// Store a derivative under `key`, recording its content type when the backend allows
    pub async fn put_target(&self, key: &str, data: Bytes, content_type: &str) -> Result<()> {
        let size = data.len();
        let mut attributes = Attributes::new();
        if self.attributes {
            attributes.insert(
                Attribute::ContentType,
                AttributeValue::from(content_type.to_string()),
            );
        }

        self.count();
        self.store
            .put_opts(
                &StoragePath::from(key),
                data.into(),
                PutOptions {
                    attributes,
                    ..Default::default()
                },
            )
            .await?;

        tracing::info!(key, size, content_type, "Uploaded derivative to storage");
        Ok(())
    }
}

fn content_type_of(attributes: &Attributes) -> Option<String> {
    attributes
        .get(&Attribute::ContentType)
        .map(|value| AsRef::<str>::as_ref(value).to_string())
        .filter(|value| !value.is_empty())
}

/// Guess a MIME type from leading image bytes
pub fn sniff_content_type(head: &[u8]) -> &'static str {
    image::guess_format(head)
        .map(|format| format.to_mime_type())
        .unwrap_or(FALLBACK_CONTENT_TYPE)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG_MAGIC: &[u8] = b"\x89PNG\r\n\x1a\n";

    async fn collect(object: CachedObject) -> Vec<u8> {
        let chunks: Vec<Bytes> = object
            .stream
            .map(|chunk| chunk.unwrap())
            .collect()
            .await;
        chunks.concat()
    }

    #[tokio::test]
    async fn test_stat_missing_is_none() {
        let storage = StorageClient::in_memory();
        assert_eq!(storage.stat("1/pictures/none.jpg").await.unwrap(), None);
        assert!(!storage.exists("1/pictures/none.jpg").await.unwrap());
        assert_eq!(storage.operation_count(), 2);
    }

    #[tokio::test]
    async fn test_put_then_fetch_target_keeps_content_type() {
        let storage = StorageClient::in_memory();
        storage
            .put_target("1/pictures/thumb/50X-a.bmp", Bytes::from_static(b"BMxx"), "image/bmp")
            .await
            .unwrap();

        assert_eq!(storage.stat("1/pictures/thumb/50X-a.bmp").await.unwrap(), Some(4));
        let object = storage.fetch_target("1/pictures/thumb/50X-a.bmp").await.unwrap();
        assert_eq!(object.content_type, "image/bmp");
        assert_eq!(collect(object).await, b"BMxx");
    }

    #[tokio::test]
    async fn test_fetch_target_sniffs_without_attribute() {
        let storage = StorageClient::in_memory();
        let mut payload = PNG_MAGIC.to_vec();
        payload.extend(std::iter::repeat_n(7u8, 2048));
        storage
            .store
            .put(&StoragePath::from("k.png"), Bytes::from(payload.clone()).into())
            .await
            .unwrap();

        let object = storage.fetch_target("k.png").await.unwrap();
        assert_eq!(object.content_type, "image/png");
        assert_eq!(object.size, payload.len() as u64);
        assert_eq!(collect(object).await, payload);
    }

    #[tokio::test]
    async fn test_fetch_source_not_found() {
        let storage = StorageClient::in_memory();
        let err = storage.fetch_source("9/pictures/gone.png").await.unwrap_err();
        assert!(matches!(err, StorageError::NotFound(key) if key == "9/pictures/gone.png"));
    }

    #[tokio::test]
    async fn test_fetch_source_reads_bytes() {
        let storage = StorageClient::in_memory();
        storage
            .put_target("3/pictures/a.png", Bytes::from_static(PNG_MAGIC), "image/png")
            .await
            .unwrap();

        let source = storage.fetch_source("3/pictures/a.png").await.unwrap();
        assert_eq!(source.bytes.as_ref(), PNG_MAGIC);
        assert_eq!(source.content_type.as_deref(), Some("image/png"));
    }

    #[tokio::test]
    async fn test_local_provider_round_trip() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let config = StorageConfig {
            provider: StorageProvider::Local,
            bucket: "media".to_string(),
            root: Some(temp_dir.path().to_path_buf()),
            ..StorageConfig::default()
        };
        let storage = StorageClient::from_config(&config).unwrap();

        storage
            .put_target("1/pictures/thumb/80X-a.png", Bytes::from_static(PNG_MAGIC), "image/png")
            .await
            .unwrap();

        let object = storage.fetch_target("1/pictures/thumb/80X-a.png").await.unwrap();
        assert_eq!(object.content_type, "image/png");
        assert!(temp_dir.path().join("media/1/pictures/thumb/80X-a.png").exists());
    }

    #[test]
    fn test_sniff_content_type() {
        assert_eq!(sniff_content_type(PNG_MAGIC), "image/png");
        assert_eq!(sniff_content_type(b"GIF89a"), "image/gif");
        assert_eq!(sniff_content_type(b"hello"), "application/octet-stream");
    }
}
