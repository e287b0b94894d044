use std::sync::{Arc, Weak};

use bytes::Bytes;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use tracing::debug;

use crate::bucket::BucketInner;
use crate::store::{ByteContent, Existence};
use crate::{Bucket, StorageError, StorageResult, UploadUrl};

/// Handle to a named blob inside a bucket.
///
/// Handles are cheap to clone and all clones share the same content. Two
/// handles compare equal when they refer to the same stored blob; a blob that
/// is deleted and later re-accessed under the same name is a new blob.
#[derive(Clone)]
pub struct Blob {
    inner: Arc<BlobInner>,
}

struct BlobInner {
    name: String,
    bucket_name: String,
    bucket: Weak<BucketInner>,
    state: RwLock<BlobState>,
}

#[derive(Default)]
struct BlobState {
    exists: bool,
    /// `None` until the first write, even a zero-length one
    content: Option<Bytes>,
    updated: Option<DateTime<Utc>>,
}

impl Blob {
    /// Fresh, existing, never-written blob. Registration is the bucket's job.
    pub(crate) fn new(name: String, bucket: &Bucket) -> Self {
        Self {
            inner: Arc::new(BlobInner {
                name,
                bucket_name: bucket.name().to_string(),
                bucket: bucket.downgrade(),
                state: RwLock::new(BlobState {
                    exists: true,
                    ..BlobState::default()
                }),
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn bucket_name(&self) -> &str {
        &self.inner.bucket_name
    }

    /// Owning bucket, `None` once its client has been dropped
    pub fn bucket(&self) -> Option<Bucket> {
        self.inner.bucket.upgrade().map(Bucket::from_inner)
    }

    pub fn exists(&self) -> bool {
        self.inner.state.read().exists
    }

    pub fn size(&self) -> Option<u64> {
        self.inner
            .state
            .read()
            .content
            .as_ref()
            .map(|content| content.len() as u64)
    }

    /// Time of the last write
    pub fn updated(&self) -> Option<DateTime<Utc>> {
        self.inner.state.read().updated
    }

    /// Replace the whole content with `data`
    pub fn write<D: Into<Bytes>>(&self, data: D) -> StorageResult<()> {
        let data = data.into();
        let mut state = self.inner.state.write();
        if !state.exists {
            return Err(self.not_found());
        }

        debug!("Writing {} bytes to blob {}/{}", data.len(), self.bucket_name(), self.name());
        state.content = Some(data);
        state.updated = Some(Utc::now());
        Ok(())
    }

    /// Replace the content with UTF-8 encoded `text`
    pub fn upload_from_string(&self, text: &str) -> StorageResult<()> {
        self.write(Bytes::copy_from_slice(text.as_bytes()))
    }

    /// Bytes in `[start, end)`; `end` defaults to the current size.
    ///
    /// Bounds are never clamped: anything outside `start <= end <= size`
    /// fails with [`StorageError::InvalidRange`].
    pub fn read_range(&self, start: u64, end: Option<u64>) -> StorageResult<Bytes> {
        let state = self.inner.state.read();
        if !state.exists {
            return Err(self.not_found());
        }

        let content = state.content.clone().unwrap_or_default();
        let size = content.len() as u64;
        let end = end.unwrap_or(size);
        if start > end || end > size {
            return Err(StorageError::InvalidRange { start, end, size });
        }

        Ok(content.slice(start as usize..end as usize))
    }

    pub fn download_as_bytes(&self) -> StorageResult<Bytes> {
        self.read_range(0, None)
    }

    /// Mark the blob deleted, drop its content and unregister it from its bucket
    pub fn delete(&self) -> StorageResult<()> {
        {
            let mut state = self.inner.state.write();
            if !state.exists {
                return Err(self.not_found());
            }
            *state = BlobState::default();
        }

        if let Some(bucket) = self.bucket() {
            bucket.unregister_blob(self);
        }

        debug!("Deleted blob {}/{}", self.bucket_name(), self.name());
        Ok(())
    }

    /// Mint a resumable upload session targeting this blob and return its url
    pub fn create_resumable_upload_session(&self) -> StorageResult<UploadUrl> {
        if !self.exists() {
            return Err(self.not_found());
        }
        let client = self
            .bucket()
            .and_then(|bucket| bucket.client())
            .ok_or_else(|| StorageError::bucket_not_found(self.bucket_name()))?;

        client.create_upload_session(self)
    }

    fn not_found(&self) -> StorageError {
        StorageError::blob_not_found(self.bucket_name(), self.name())
    }
}

impl PartialEq for Blob {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for Blob {}

impl std::fmt::Debug for Blob {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Blob")
            .field("bucket", &self.inner.bucket_name)
            .field("name", &self.inner.name)
            .field("exists", &self.exists())
            .field("size", &self.size())
            .finish()
    }
}

impl Existence for Blob {
    fn exists(&self) -> bool {
        Blob::exists(self)
    }

    fn delete(&self) -> StorageResult<()> {
        Blob::delete(self)
    }
}

impl ByteContent for Blob {
    fn write_bytes(&self, data: Bytes) -> StorageResult<()> {
        self.write(data)
    }

    fn read_range(&self, start: u64, end: Option<u64>) -> StorageResult<Bytes> {
        Blob::read_range(self, start, end)
    }

    fn size(&self) -> Option<u64> {
        Blob::size(self)
    }
}

#[cfg(test)]
mod tests {
    use crate::Client;

    fn test_blob() -> (Client, crate::Blob) {
        let client = Client::new();
        let bucket = client.create_bucket("test-bucket").unwrap();
        let blob = bucket.blob("fake-blob").unwrap();
        (client, blob)
    }

    #[test]
    fn test_upload_download() {
        let (_client, blob) = test_blob();
        blob.write(&b"test"[..]).unwrap();

        assert_eq!(blob.download_as_bytes().unwrap(), &b"test"[..]);
        assert_eq!(blob.read_range(2, None).unwrap(), &b"st"[..]);
        assert_eq!(blob.read_range(0, Some(2)).unwrap(), &b"te"[..]);
        assert_eq!(blob.read_range(2, Some(3)).unwrap(), &b"s"[..]);
    }

    #[test]
    fn test_size() {
        let (_client, blob) = test_blob();
        assert_eq!(blob.size(), None);

        blob.upload_from_string("test").unwrap();
        assert_eq!(blob.size(), Some(4));

        blob.upload_from_string("test").unwrap();
        assert_eq!(blob.size(), Some(4));
    }

    #[test]
    fn test_zero_length_write_is_not_absent() {
        let (_client, blob) = test_blob();
        blob.write(Vec::new()).unwrap();
        assert_eq!(blob.size(), Some(0));
        assert!(blob.updated().is_some());
    }

    #[test]
    fn test_out_of_range_is_rejected() {
        let (_client, blob) = test_blob();
        blob.upload_from_string("test").unwrap();

        assert!(matches!(
            blob.read_range(0, Some(5)),
            Err(crate::StorageError::InvalidRange { start: 0, end: 5, size: 4 })
        ));
        assert!(blob.read_range(3, Some(2)).is_err());
        assert!(blob.read_range(5, None).is_err());
        assert_eq!(blob.read_range(4, None).unwrap().len(), 0);
    }

    #[test]
    fn test_never_written_reads_empty() {
        let (_client, blob) = test_blob();
        assert!(blob.download_as_bytes().unwrap().is_empty());
    }

    #[test]
    fn test_deleted_handle_fails() {
        let (_client, blob) = test_blob();
        blob.upload_from_string("test").unwrap();
        blob.delete().unwrap();

        assert!(!blob.exists());
        assert_eq!(blob.size(), None);
        assert!(blob.download_as_bytes().unwrap_err().is_not_found());
        assert!(blob.upload_from_string("again").unwrap_err().is_not_found());
        assert!(blob.delete().unwrap_err().is_not_found());
        assert!(blob.create_resumable_upload_session().unwrap_err().is_not_found());
    }
}
