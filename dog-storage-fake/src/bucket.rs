use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::RwLock;
use tracing::{debug, info};

use crate::client::ClientInner;
use crate::registry::Registry;
use crate::store::{self, Existence};
use crate::{Blob, Client, StorageError, StorageResult};

/// Handle to a bucket registered with a [`Client`]
#[derive(Clone)]
pub struct Bucket {
    inner: Arc<BucketInner>,
}

pub(crate) struct BucketInner {
    name: String,
    client: Weak<ClientInner>,
    exists: AtomicBool,
    /// Blobs in insertion order
    blobs: RwLock<Registry<Blob>>,
}

impl Bucket {
    /// Create a bucket and register it with `client`.
    ///
    /// Fails with [`StorageError::BucketConflict`] when the name is taken.
    pub fn new<S: Into<String>>(client: &Client, name: S) -> StorageResult<Self> {
        let bucket = Self {
            inner: Arc::new(BucketInner {
                name: name.into(),
                client: client.downgrade(),
                exists: AtomicBool::new(true),
                blobs: RwLock::new(Registry::new()),
            }),
        };

        client.register_bucket(bucket.clone())?;
        Ok(bucket)
    }

    pub(crate) fn from_inner(inner: Arc<BucketInner>) -> Self {
        Self { inner }
    }

    pub(crate) fn downgrade(&self) -> Weak<BucketInner> {
        Arc::downgrade(&self.inner)
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Owning client, `None` once every client handle has been dropped
    pub fn client(&self) -> Option<Client> {
        self.inner.client.upgrade().map(Client::from_inner)
    }

    pub fn exists(&self) -> bool {
        self.inner.exists.load(Ordering::SeqCst)
    }

    /// Return the blob registered under `name`, creating and registering an
    /// empty one if there is none.
    pub fn blob(&self, name: &str) -> StorageResult<Blob> {
        // Checked under the registry lock so a concurrent delete cannot miss the new blob
        let mut blobs = self.inner.blobs.write();
        if !self.exists() {
            return Err(StorageError::bucket_not_found(self.name()));
        }

        if let Some(blob) = blobs.get(name).filter(|blob| blob.exists()) {
            return Ok(blob.clone());
        }

        let blob = Blob::new(name.to_string(), self);
        blobs.replace(name.to_string(), blob.clone());
        debug!("Registered blob {}/{}", self.name(), name);
        Ok(blob)
    }

    pub fn get_blob(&self, name: &str) -> StorageResult<Blob> {
        self.inner
            .blobs
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| StorageError::blob_not_found(self.name(), name))
    }

    /// Blobs in the order they were first accessed
    pub fn list_blobs(&self) -> Vec<Blob> {
        self.inner.blobs.read().values().cloned().collect()
    }

    pub fn delete_blob(&self, name: &str) -> StorageResult<()> {
        self.get_blob(name)?.delete()
    }

    /// Mark deleted, unregister from the client and delete every blob.
    ///
    /// The flag flips and the registry drains under one write lock, so no blob
    /// can be registered after the snapshot is taken.
    pub fn delete(&self) -> StorageResult<()> {
        let blobs = {
            let mut blobs = self.inner.blobs.write();
            if !self.inner.exists.swap(false, Ordering::SeqCst) {
                return Err(StorageError::bucket_not_found(self.name()));
            }
            blobs.drain()
        };

        if let Some(client) = self.client() {
            client.unregister_bucket(self);
        }

        let deleted = store::delete_all(&blobs)?;
        info!("Deleted bucket {} with {} blobs", self.name(), deleted);
        Ok(())
    }

    pub(crate) fn unregister_blob(&self, blob: &Blob) {
        self.inner
            .blobs
            .write()
            .remove_if(blob.name(), |registered| registered == blob);
    }
}

impl PartialEq for Bucket {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for Bucket {}

impl std::fmt::Debug for Bucket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bucket")
            .field("name", &self.inner.name)
            .field("exists", &self.exists())
            .field("blobs", &self.inner.blobs.read().len())
            .finish()
    }
}

impl Existence for Bucket {
    fn exists(&self) -> bool {
        Bucket::exists(self)
    }

    fn delete(&self) -> StorageResult<()> {
        Bucket::delete(self)
    }
}
