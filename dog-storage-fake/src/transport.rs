use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use http::header::{CONTENT_TYPE, RANGE};
use http::{HeaderMap, HeaderValue, Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, instrument, warn};

use crate::{
    Client, ContentRange, ObjectResource, StorageResult, TotalLength, UploadSession,
    INCOMPLETE_STATUS_CODES, UPLOAD_COMPLETE_STATUS,
};

/// Pre-request hook run by the transport before every call.
///
/// The emulator performs no signing; real credential providers plug in here.
pub trait Credentials: Send + Sync {
    fn before_request(&self, method: &Method, url: &str, headers: &HeaderMap) -> StorageResult<()>;
}

/// Pass-through credentials
#[derive(Debug, Clone, Copy, Default)]
pub struct FakeCredentials;

impl Credentials for FakeCredentials {
    fn before_request(&self, _method: &Method, _url: &str, _headers: &HeaderMap) -> StorageResult<()> {
        Ok(())
    }
}

/// Minimal response synthesized by the transport
#[derive(Debug, Clone)]
pub struct FakeResponse {
    pub status_code: StatusCode,
    pub headers: HeaderMap,
    pub text: Option<String>,
}

impl FakeResponse {
    pub fn new(status_code: StatusCode) -> Self {
        Self {
            status_code,
            headers: HeaderMap::new(),
            text: None,
        }
    }

    pub fn with_header(mut self, name: http::HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Serialize `body` as the JSON text of the response
    pub fn with_json<T: Serialize>(mut self, body: &T) -> StorageResult<Self> {
        self.text = Some(serde_json::to_string(body)?);
        self.headers
            .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        Ok(self)
    }

    /// Whether the server expects more chunks
    pub fn is_incomplete(&self) -> bool {
        INCOMPLETE_STATUS_CODES.contains(&self.status_code)
    }

    /// Decode the JSON text of the response
    pub fn json<T: DeserializeOwned>(&self) -> StorageResult<T> {
        Ok(serde_json::from_str(self.text.as_deref().unwrap_or("null"))?)
    }
}

/// Chunk-level operations of the resumable upload protocol
#[async_trait]
pub trait AuthorizedSession: Send + Sync {
    /// Send one chunk to an upload session
    async fn put(&self, url: &str, data: Option<Bytes>, headers: &HeaderMap) -> StorageResult<FakeResponse>;

    /// Cancel an upload session
    async fn delete(&self, url: &str) -> StorageResult<()>;
}

/// Transport that drives upload sessions registered in a [`Client`].
///
/// Holds no state of its own beyond the client handle and the credentials hook.
#[derive(Clone)]
pub struct FakeAuthorizedSession {
    client: Client,
    credentials: Arc<dyn Credentials>,
}

impl FakeAuthorizedSession {
    pub fn new(client: Client) -> Self {
        Self::with_credentials(client, FakeCredentials)
    }

    pub fn with_credentials<C: Credentials + 'static>(client: Client, credentials: C) -> Self {
        Self {
            client,
            credentials: Arc::new(credentials),
        }
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Upload session registered under `url`
    pub fn upload_for(&self, url: &str) -> StorageResult<Arc<UploadSession>> {
        self.client.upload(url)
    }

    fn incomplete_response(upload: &UploadSession) -> FakeResponse {
        let mut response = FakeResponse::new(INCOMPLETE_STATUS_CODES[0]);
        let received = upload.received_bytes();
        if received > 0 {
            if let Ok(value) = HeaderValue::from_str(&format!("bytes=0-{}", received - 1)) {
                response = response.with_header(RANGE, value);
            }
        }
        response
    }
}

impl std::fmt::Debug for FakeAuthorizedSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FakeAuthorizedSession")
            .field("client", &self.client)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl AuthorizedSession for FakeAuthorizedSession {
    #[instrument(skip(self, data, headers))]
    async fn put(&self, url: &str, data: Option<Bytes>, headers: &HeaderMap) -> StorageResult<FakeResponse> {
        self.credentials.before_request(&Method::PUT, url, headers)?;

        let upload = self.client.upload(url)?;
        let range = ContentRange::from_headers(headers)?;

        if let Some((first, _)) = range.and_then(|r| r.span) {
            let staged = upload.received_bytes();
            if first != staged {
                warn!("Chunk starts at byte {} but {} bytes are staged", first, staged);
            }
        }

        // No Content-Range at all is a single-shot upload
        match range.map(|r| r.total) {
            Some(TotalLength::Unknown) => {
                if let Some(data) = data {
                    upload.write(&data)?;
                }
                debug!("Upload incomplete after {} bytes", upload.received_bytes());
                Ok(Self::incomplete_response(&upload))
            }
            Some(TotalLength::Known(_)) | None => {
                upload.write_and_finish(data.as_deref())?;
                let resource = ObjectResource::from_blob(upload.blob());
                FakeResponse::new(UPLOAD_COMPLETE_STATUS).with_json(&resource)
            }
        }
    }

    #[instrument(skip(self))]
    async fn delete(&self, url: &str) -> StorageResult<()> {
        self.credentials.before_request(&Method::DELETE, url, &HeaderMap::new())?;

        let upload = self.client.take_upload(url)?;
        upload.terminate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::StorageError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingCredentials(Arc<AtomicUsize>);

    impl Credentials for CountingCredentials {
        fn before_request(&self, _method: &Method, _url: &str, _headers: &HeaderMap) -> StorageResult<()> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct DenyCredentials;

    impl Credentials for DenyCredentials {
        fn before_request(&self, _method: &Method, url: &str, _headers: &HeaderMap) -> StorageResult<()> {
            Err(StorageError::permission_denied(format!("no token for {}", url)))
        }
    }

    fn headers(content_range: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(http::header::CONTENT_RANGE, HeaderValue::from_str(content_range).unwrap());
        headers
    }

    #[tokio::test]
    async fn test_credentials_hook_runs_before_each_call() {
        let calls = Arc::new(AtomicUsize::new(0));
        let client = Client::new();
        let blob = client.create_bucket("test-bucket").unwrap().blob("test-blob").unwrap();
        let url = blob.create_resumable_upload_session().unwrap();
        let session = FakeAuthorizedSession::with_credentials(client, CountingCredentials(calls.clone()));

        session
            .put(url.as_str(), Some(Bytes::from_static(b"te")), &headers("bytes 0-1/*"))
            .await
            .unwrap();
        session.delete(url.as_str()).await.unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_rejecting_hook_stops_request() {
        let client = Client::new();
        let blob = client.create_bucket("test-bucket").unwrap().blob("test-blob").unwrap();
        let url = blob.create_resumable_upload_session().unwrap();
        let session = FakeAuthorizedSession::with_credentials(client.clone(), DenyCredentials);

        let err = session.delete(url.as_str()).await.unwrap_err();
        assert!(matches!(err, StorageError::PermissionDenied { .. }));
        assert!(client.has_upload(url.as_str()));
        assert!(blob.exists());
    }

    #[tokio::test]
    async fn test_incomplete_response_reports_range() {
        let client = Client::new();
        let blob = client.create_bucket("test-bucket").unwrap().blob("test-blob").unwrap();
        let url = blob.create_resumable_upload_session().unwrap();
        let session = FakeAuthorizedSession::new(client);

        let query = session.put(url.as_str(), None, &headers("bytes */*")).await.unwrap();
        assert!(query.is_incomplete());
        assert!(query.headers.get(RANGE).is_none());

        let response = session
            .put(url.as_str(), Some(Bytes::from_static(b"test")), &headers("bytes 0-3/*"))
            .await
            .unwrap();
        assert_eq!(response.status_code, StatusCode::PERMANENT_REDIRECT);
        assert_eq!(response.headers.get(RANGE).unwrap(), "bytes=0-3");
    }

    #[tokio::test]
    async fn test_malformed_content_range_is_rejected() {
        let client = Client::new();
        let blob = client.create_bucket("test-bucket").unwrap().blob("test-blob").unwrap();
        let url = blob.create_resumable_upload_session().unwrap();
        let session = FakeAuthorizedSession::new(client);

        let err = session
            .put(url.as_str(), Some(Bytes::from_static(b"test")), &headers("bytes 0-3"))
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::InvalidContentRange { .. }));
        assert_eq!(session.upload_for(url.as_str()).unwrap().received_bytes(), 0);
    }

    #[test]
    fn test_put_from_sync_context() {
        let client = Client::new();
        let blob = client.create_bucket("test-bucket").unwrap().blob("test-blob").unwrap();
        let url = blob.create_resumable_upload_session().unwrap();
        let session = FakeAuthorizedSession::new(client);

        let response = tokio_test::block_on(session.put(url.as_str(), Some(Bytes::from_static(b"sync")), &HeaderMap::new())).unwrap();

        assert_eq!(response.status_code, UPLOAD_COMPLETE_STATUS);
        assert_eq!(response.headers.get(CONTENT_TYPE).unwrap(), "application/json");
        assert_eq!(blob.size(), Some(4));
    }
}
