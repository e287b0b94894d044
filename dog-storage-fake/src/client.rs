use std::sync::{Arc, Weak};

use parking_lot::RwLock;
use tracing::{debug, info};

use crate::bucket::Bucket;
use crate::registry::Registry;
use crate::{Blob, StorageConfig, StorageError, StorageResult, UploadId, UploadSession, UploadUrl};

/// Registry of buckets and outstanding upload sessions.
///
/// Each client owns its own state; clones share it, separately constructed
/// clients never do.
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

pub(crate) struct ClientInner {
    config: StorageConfig,
    buckets: RwLock<Registry<Bucket>>,
    uploads: RwLock<Registry<Arc<UploadSession>>>,
}

impl Client {
    /// Client with the default configuration
    pub fn new() -> Self {
        Self::build(StorageConfig::default())
    }

    pub fn with_config(config: StorageConfig) -> StorageResult<Self> {
        config.validate()?;
        Ok(Self::build(config))
    }

    /// Client configured from `DOG_STORAGE_*` environment variables
    pub fn from_env() -> StorageResult<Self> {
        Ok(Self::build(StorageConfig::from_env()?))
    }

    fn build(config: StorageConfig) -> Self {
        Self {
            inner: Arc::new(ClientInner {
                config,
                buckets: RwLock::new(Registry::new()),
                uploads: RwLock::new(Registry::new()),
            }),
        }
    }

    pub(crate) fn from_inner(inner: Arc<ClientInner>) -> Self {
        Self { inner }
    }

    pub(crate) fn downgrade(&self) -> Weak<ClientInner> {
        Arc::downgrade(&self.inner)
    }

    pub fn config(&self) -> &StorageConfig {
        &self.inner.config
    }

    /// Look up a registered bucket
    pub fn bucket(&self, name: &str) -> StorageResult<Bucket> {
        self.inner
            .buckets
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| StorageError::bucket_not_found(name))
    }

    pub fn get_bucket(&self, name: &str) -> StorageResult<Bucket> {
        self.bucket(name)
    }

    /// Create and register a bucket; fails with a conflict if the name is taken
    pub fn create_bucket(&self, name: &str) -> StorageResult<Bucket> {
        Bucket::new(self, name)
    }

    /// Buckets in creation order
    pub fn list_buckets(&self) -> Vec<Bucket> {
        self.inner.buckets.read().values().cloned().collect()
    }

    pub(crate) fn register_bucket(&self, bucket: Bucket) -> StorageResult<()> {
        let name = bucket.name().to_string();
        self.inner
            .buckets
            .write()
            .try_insert(name.clone(), bucket)
            .map_err(|_| StorageError::bucket_conflict(&name))?;

        info!("Created bucket {}", name);
        Ok(())
    }

    pub(crate) fn unregister_bucket(&self, bucket: &Bucket) {
        self.inner
            .buckets
            .write()
            .remove_if(bucket.name(), |registered| registered == bucket);
    }

    /// Mint a session for `blob` under a fresh upload id and register it
    pub fn create_upload_session(&self, blob: &Blob) -> StorageResult<UploadUrl> {
        let url = UploadUrl::new(&self.config().upload_base_url, blob.bucket_name(), &UploadId::new());
        let session = UploadSession::new(url.clone(), blob.clone(), self.config().max_blob_bytes);
        self.register_upload(Arc::new(session))?;
        Ok(url)
    }

    /// Register a session under its url. Urls are never overwritten.
    pub fn register_upload(&self, session: Arc<UploadSession>) -> StorageResult<()> {
        let url = session.url().clone();
        self.inner
            .uploads
            .write()
            .try_insert(url.to_string(), session)
            .map_err(|_| StorageError::upload_conflict(url.as_str()))?;

        debug!("Registered upload session {}", url);
        Ok(())
    }

    pub fn upload(&self, url: &str) -> StorageResult<Arc<UploadSession>> {
        self.inner
            .uploads
            .read()
            .get(url)
            .cloned()
            .ok_or_else(|| StorageError::upload_not_found(url))
    }

    /// Remove a session from the registry and hand it back
    pub fn take_upload(&self, url: &str) -> StorageResult<Arc<UploadSession>> {
        self.inner
            .uploads
            .write()
            .remove(url)
            .ok_or_else(|| StorageError::upload_not_found(url))
    }

    pub fn has_upload(&self, url: &str) -> bool {
        self.inner.uploads.read().contains(url)
    }

    /// Registered session urls in registration order
    pub fn upload_urls(&self) -> Vec<UploadUrl> {
        self.inner
            .uploads
            .read()
            .keys()
            .map(|url| UploadUrl(url.clone()))
            .collect()
    }

    pub fn upload_count(&self) -> usize {
        self.inner.uploads.read().len()
    }
}

impl Default for Client {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialEq for Client {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for Client {}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("config", &self.inner.config)
            .field("buckets", &self.inner.buckets.read().len())
            .field("uploads", &self.upload_count())
            .finish()
    }
}
