use thiserror::Error;

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors raised by the emulated storage service
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    #[error("Bucket {bucket} not found")]
    BucketNotFound { bucket: String },

    #[error("Blob {name} not found in bucket {bucket}")]
    BlobNotFound { bucket: String, name: String },

    #[error("Upload session not found: {url}")]
    UploadNotFound { url: String },

    #[error("Bucket {bucket} already exists")]
    BucketConflict { bucket: String },

    #[error("Upload session already registered: {url}")]
    UploadConflict { url: String },

    #[error("Invalid range [{start}, {end}) for blob of size {size}")]
    InvalidRange { start: u64, end: u64, size: u64 },

    #[error("Invalid Content-Range header: {value}")]
    InvalidContentRange { value: String },

    #[error("Upload too large: {size} bytes (max: {max})")]
    UploadTooLarge { size: u64, max: u64 },

    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    #[error("Permission denied: {message}")]
    PermissionDenied { message: String },

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl StorageError {
    pub fn bucket_not_found<S: Into<String>>(bucket: S) -> Self {
        Self::BucketNotFound {
            bucket: bucket.into(),
        }
    }

    pub fn blob_not_found<B: Into<String>, N: Into<String>>(bucket: B, name: N) -> Self {
        Self::BlobNotFound {
            bucket: bucket.into(),
            name: name.into(),
        }
    }

    pub fn upload_not_found<S: Into<String>>(url: S) -> Self {
        Self::UploadNotFound { url: url.into() }
    }

    pub fn bucket_conflict<S: Into<String>>(bucket: S) -> Self {
        Self::BucketConflict {
            bucket: bucket.into(),
        }
    }

    pub fn upload_conflict<S: Into<String>>(url: S) -> Self {
        Self::UploadConflict { url: url.into() }
    }

    pub fn invalid_content_range<S: Into<String>>(value: S) -> Self {
        Self::InvalidContentRange {
            value: value.into(),
        }
    }

    pub fn invalid_config<S: Into<String>>(message: S) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    pub fn permission_denied<S: Into<String>>(message: S) -> Self {
        Self::PermissionDenied {
            message: message.into(),
        }
    }

    /// True for every lookup of an absent bucket, blob or upload session
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::BucketNotFound { .. } | Self::BlobNotFound { .. } | Self::UploadNotFound { .. }
        )
    }

    /// True when a name or url is already registered
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::BucketConflict { .. } | Self::UploadConflict { .. })
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_carry_identifier() {
        let err = StorageError::bucket_not_found("test-bucket");
        assert_eq!(err.to_string(), "Bucket test-bucket not found");

        let err = StorageError::blob_not_found("test-bucket", "blob.txt");
        assert!(err.to_string().contains("blob.txt"));
        assert!(err.to_string().contains("test-bucket"));
    }

    #[test]
    fn test_error_kinds() {
        assert!(StorageError::upload_not_found("https://u").is_not_found());
        assert!(!StorageError::upload_not_found("https://u").is_conflict());
        assert!(StorageError::bucket_conflict("b").is_conflict());
        assert!(StorageError::upload_conflict("https://u").is_conflict());
        assert!(!StorageError::invalid_content_range("bytes").is_not_found());
    }
}
