use bytes::{Bytes, BytesMut};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::{Blob, StorageError, StorageResult, UploadUrl};

/// Observable state of an upload session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UploadState {
    /// Minted, nothing staged yet
    Open,
    /// One or more chunks staged
    Writing,
    /// Staged bytes committed to the target blob
    Finished,
    /// Abandoned, target blob deleted
    Terminated,
}

impl UploadState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Finished | Self::Terminated)
    }
}

/// Staging buffer bound to one target blob.
///
/// Chunks are appended until [`finish`](Self::finish) commits the whole
/// buffer as the blob's content. All transitions run under the session lock,
/// so concurrent finishers commit exactly once.
pub struct UploadSession {
    url: UploadUrl,
    blob: Blob,
    created_at: DateTime<Utc>,
    max_bytes: u64,
    state: Mutex<SessionState>,
}

struct SessionState {
    /// `None` once terminated
    buffer: Option<BytesMut>,
    received_bytes: u64,
    finished: bool,
}

impl UploadSession {
    pub fn new(url: UploadUrl, blob: Blob, max_bytes: u64) -> Self {
        Self {
            url,
            blob,
            created_at: Utc::now(),
            max_bytes,
            state: Mutex::new(SessionState {
                buffer: Some(BytesMut::new()),
                received_bytes: 0,
                finished: false,
            }),
        }
    }

    pub fn url(&self) -> &UploadUrl {
        &self.url
    }

    /// Target blob
    pub fn blob(&self) -> &Blob {
        &self.blob
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn state(&self) -> UploadState {
        let state = self.state.lock();
        match (&state.buffer, state.finished) {
            (None, _) => UploadState::Terminated,
            (Some(_), true) => UploadState::Finished,
            (Some(_), false) if state.received_bytes == 0 => UploadState::Open,
            (Some(_), false) => UploadState::Writing,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.state.lock().finished
    }

    /// Total bytes staged so far, including bytes already committed
    pub fn received_bytes(&self) -> u64 {
        self.state.lock().received_bytes
    }

    /// Append a chunk. Ignored once the session is finished.
    pub fn write(&self, chunk: &[u8]) -> StorageResult<()> {
        let mut state = self.state.lock();
        self.append(&mut state, chunk)
    }

    /// Commit the staged bytes as the blob's full content.
    ///
    /// Returns `false` when the session was already finished and nothing was
    /// written.
    pub fn finish(&self) -> StorageResult<bool> {
        let mut state = self.state.lock();
        self.commit(&mut state)
    }

    /// Append the final chunk and commit under a single lock, so a racing
    /// final chunk lands either wholly before or wholly after the commit.
    pub fn write_and_finish(&self, chunk: Option<&[u8]>) -> StorageResult<bool> {
        let mut state = self.state.lock();
        let staged = state.received_bytes;
        if let Some(chunk) = chunk {
            self.append(&mut state, chunk)?;
        }

        self.commit(&mut state).inspect_err(|_| {
            // Failed commits leave the session as it was before the chunk
            if let Some(buffer) = state.buffer.as_mut() {
                buffer.truncate(staged as usize);
            }
            state.received_bytes = staged;
        })
    }

    fn append(&self, state: &mut SessionState, chunk: &[u8]) -> StorageResult<()> {
        if state.finished {
            debug!("Ignoring {} byte chunk for finished upload {}", chunk.len(), self.url);
            return Ok(());
        }

        let size = state.received_bytes + chunk.len() as u64;
        if size > self.max_bytes {
            return Err(StorageError::UploadTooLarge {
                size,
                max: self.max_bytes,
            });
        }

        let buffer = state
            .buffer
            .as_mut()
            .ok_or_else(|| StorageError::upload_not_found(self.url.as_str()))?;
        buffer.extend_from_slice(chunk);
        state.received_bytes = size;
        Ok(())
    }

    fn commit(&self, state: &mut SessionState) -> StorageResult<bool> {
        if state.finished {
            return Ok(false);
        }

        let buffer = state
            .buffer
            .as_mut()
            .ok_or_else(|| StorageError::upload_not_found(self.url.as_str()))?;
        self.blob.write(Bytes::copy_from_slice(&buffer[..]))?;
        *buffer = BytesMut::new();
        state.finished = true;

        info!(
            "Committed {} bytes to blob {}/{}",
            state.received_bytes,
            self.blob.bucket_name(),
            self.blob.name()
        );
        Ok(true)
    }

    /// Discard the staging buffer and delete the target blob
    pub fn terminate(&self) -> StorageResult<()> {
        let mut state = self.state.lock();
        if state.buffer.take().is_none() {
            return Err(StorageError::upload_not_found(self.url.as_str()));
        }

        match self.blob.delete() {
            Ok(()) => {}
            Err(err) if err.is_not_found() => {
                debug!("Target blob of upload {} was already deleted", self.url);
            }
            Err(err) => return Err(err),
        }

        info!("Terminated upload {}", self.url);
        Ok(())
    }
}

impl std::fmt::Debug for UploadSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UploadSession")
            .field("url", &self.url)
            .field("blob", &self.blob)
            .field("created_at", &self.created_at)
            .field("state", &self.state())
            .field("received_bytes", &self.received_bytes())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Client;

    fn new_session(max_bytes: u64) -> (Client, UploadSession) {
        let client = Client::new();
        let blob = client.create_bucket("test-bucket").unwrap().blob("test-blob").unwrap();
        let url = UploadUrl("https://example.test/upload".to_string());
        (client, UploadSession::new(url, blob, max_bytes))
    }

    #[test]
    fn test_state_progression() {
        let (_client, session) = new_session(1024);
        assert_eq!(session.state(), UploadState::Open);

        session.write(b"te").unwrap();
        assert_eq!(session.state(), UploadState::Writing);
        assert_eq!(session.blob().size(), None);

        session.write(b"st").unwrap();
        assert!(session.finish().unwrap());
        assert_eq!(session.state(), UploadState::Finished);
        assert!(session.state().is_terminal());
        assert_eq!(session.blob().download_as_bytes().unwrap(), &b"test"[..]);
        assert_eq!(session.received_bytes(), 4);
    }

    #[test]
    fn test_created_at_is_stamped_on_mint() {
        let before = Utc::now();
        let (_client, session) = new_session(1024);
        let after = Utc::now();

        assert!(before <= session.created_at() && session.created_at() <= after);
        assert!(format!("{:?}", session).contains("created_at"));
    }

    #[test]
    fn test_finish_is_idempotent() {
        let (_client, session) = new_session(1024);
        session.write(b"test").unwrap();
        assert!(session.finish().unwrap());

        session.blob().upload_from_string("changed").unwrap();
        assert!(!session.finish().unwrap());
        assert_eq!(session.blob().download_as_bytes().unwrap(), &b"changed"[..]);
    }

    #[test]
    fn test_write_after_finish_is_ignored() {
        let (_client, session) = new_session(1024);
        session.write(b"test").unwrap();
        session.finish().unwrap();

        session.write(b"more").unwrap();
        assert_eq!(session.received_bytes(), 4);
        assert_eq!(session.blob().size(), Some(4));
    }

    #[test]
    fn test_write_and_finish() {
        let (_client, session) = new_session(1024);
        session.write(b"te").unwrap();
        assert!(session.write_and_finish(Some(&b"st"[..])).unwrap());
        assert!(!session.write_and_finish(Some(&b"st"[..])).unwrap());
        assert_eq!(session.blob().download_as_bytes().unwrap(), &b"test"[..]);
    }

    #[test]
    fn test_finish_empty_commits_zero_bytes() {
        let (_client, session) = new_session(1024);
        session.finish().unwrap();
        assert_eq!(session.blob().size(), Some(0));
    }

    #[test]
    fn test_terminate_deletes_blob() {
        let (client, session) = new_session(1024);
        session.write(b"test").unwrap();
        session.terminate().unwrap();

        assert_eq!(session.state(), UploadState::Terminated);
        assert!(!session.blob().exists());
        assert!(client.bucket("test-bucket").unwrap().list_blobs().is_empty());
        assert!(session.write(b"late").unwrap_err().is_not_found());
        assert!(session.terminate().unwrap_err().is_not_found());
    }

    #[test]
    fn test_terminate_tolerates_deleted_blob() {
        let (_client, session) = new_session(1024);
        session.blob().delete().unwrap();
        assert!(session.terminate().is_ok());
    }

    #[test]
    fn test_size_guard() {
        let (_client, session) = new_session(4);
        session.write(b"test").unwrap();
        let err = session.write(b"!").unwrap_err();
        assert_eq!(err, StorageError::UploadTooLarge { size: 5, max: 4 });
        assert_eq!(session.received_bytes(), 4);
    }
}
