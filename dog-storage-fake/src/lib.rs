//! # dog-storage-fake: In-process object storage for tests
//!
//! `dog-storage-fake` emulates the client-observable behavior of a remote
//! object store so services built on DogRS can be exercised without a network
//! or a backend. It covers:
//!
//! - **Buckets and blobs**: named, insertion-ordered registries with
//!   existence tracking and cascading deletes
//! - **Resumable uploads**: chunked writes staged in a session and committed
//!   atomically when the final chunk arrives
//! - **Transport**: the `put`/`delete` chunk protocol with `Content-Range`
//!   handling and the `200`/`308` status contract
//!
//! ## Quick Start
//!
//! ```rust
//! use dog_storage_fake::prelude::*;
//! use http::{header::CONTENT_RANGE, HeaderMap};
//!
//! # #[tokio::main]
//! # async fn main() -> StorageResult<()> {
//! let client = Client::new();
//! let bucket = client.create_bucket("media")?;
//! let blob = bucket.blob("clip.bin")?;
//!
//! let url = blob.create_resumable_upload_session()?;
//! let session = FakeAuthorizedSession::new(client.clone());
//!
//! let mut headers = HeaderMap::new();
//! headers.insert(CONTENT_RANGE, "bytes 0-1/*".parse().unwrap());
//! let response = session.put(url.as_str(), Some("he".into()), &headers).await?;
//! assert!(response.is_incomplete());
//!
//! headers.insert(CONTENT_RANGE, "bytes 2-4/5".parse().unwrap());
//! session.put(url.as_str(), Some("llo".into()), &headers).await?;
//! assert_eq!(blob.download_as_bytes()?, "hello");
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────┐
//! │ FakeAuthorizedSession│  ← put/delete chunk protocol
//! ├──────────────────────┤
//! │ UploadSession        │  ← staging buffer state machine
//! ├──────────────────────┤
//! │ Client → Bucket →Blob│  ← address space
//! └──────────────────────┘
//! ```
//!
//! Accessing a blob through [`Bucket::blob`] always registers it, mirroring
//! the eager registration real test suites rely on.

mod blob;
mod bucket;
mod client;
mod config;
mod error;
mod registry;
mod resource;
pub mod store;
pub mod transport;
mod types;
mod upload;

#[cfg(feature = "tracing-basic")]
pub mod observability;

// Re-export main types for clean API
pub use blob::Blob;
pub use bucket::Bucket;
pub use client::Client;
pub use config::{StorageConfig, ENV_MAX_BLOB_BYTES, ENV_UPLOAD_BASE_URL};
pub use error::{StorageError, StorageResult};
pub use resource::ObjectResource;
pub use store::{ByteContent, Existence};
pub use transport::{AuthorizedSession, Credentials, FakeAuthorizedSession, FakeCredentials, FakeResponse};
pub use types::{
    ContentRange, TotalLength, UploadId, UploadUrl, INCOMPLETE_STATUS_CODES, UPLOAD_COMPLETE_STATUS,
};
pub use upload::{UploadSession, UploadState};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::{
        AuthorizedSession, Blob, Bucket, ByteContent, Client, Existence, FakeAuthorizedSession,
        StorageConfig, StorageError, StorageResult, UploadUrl,
    };
}
