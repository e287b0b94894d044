use http::{HeaderMap, StatusCode};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

use crate::{StorageError, StorageResult};

/// Status returned when a chunk completes an upload
pub const UPLOAD_COMPLETE_STATUS: StatusCode = StatusCode::OK;

/// Statuses meaning "incomplete, send more data"
pub const INCOMPLETE_STATUS_CODES: [StatusCode; 1] = [StatusCode::PERMANENT_REDIRECT];

/// Unique token identifying one resumable upload
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UploadId(pub String);

impl UploadId {
    /// Generate a new random upload ID
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Create from existing string
    pub fn from_string(id: String) -> Self {
        Self(id)
    }

    /// Get the inner string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for UploadId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for UploadId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Session url of a resumable upload, the key of the client's upload registry
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UploadUrl(pub String);

impl UploadUrl {
    /// Build the session url for `bucket` from the configured base url
    pub fn new(base_url: &str, bucket: &str, upload_id: &UploadId) -> Self {
        Self(format!(
            "{}/upload/storage/v1/b/{}/o?uploadType=resumable&upload_id={}",
            base_url.trim_end_matches('/'),
            bucket,
            upload_id
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for UploadUrl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for UploadUrl {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Total object length as declared by a chunk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TotalLength {
    /// `*`: more chunks follow
    Unknown,
    /// The chunk completes an object of this many bytes
    Known(u64),
}

impl TotalLength {
    pub fn is_known(&self) -> bool {
        matches!(self, Self::Known(_))
    }
}

/// Parsed `Content-Range` header of an upload chunk.
///
/// Accepted forms are `bytes a-b/t`, `bytes a-b/*`, `bytes */t` and
/// `bytes */*`. `span` is inclusive on both ends and absent for the
/// `*/...` forms, which carry no payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContentRange {
    pub span: Option<(u64, u64)>,
    pub total: TotalLength,
}

impl ContentRange {
    pub fn new(first: u64, last: u64, total: TotalLength) -> Self {
        Self {
            span: Some((first, last)),
            total,
        }
    }

    /// Header with no span, e.g. a status query or an empty final chunk
    pub fn empty(total: TotalLength) -> Self {
        Self { span: None, total }
    }

    /// Number of payload bytes the span declares
    pub fn span_len(&self) -> u64 {
        self.span
            .map(|(first, last)| (last - first).saturating_add(1))
            .unwrap_or(0)
    }

    /// Read the `Content-Range` header, `None` when the request has none
    pub fn from_headers(headers: &HeaderMap) -> StorageResult<Option<Self>> {
        let Some(value) = headers.get(http::header::CONTENT_RANGE) else {
            return Ok(None);
        };
        let value = value
            .to_str()
            .map_err(|_| StorageError::invalid_content_range(String::from_utf8_lossy(value.as_bytes())))?;
        value.parse().map(Some)
    }
}

impl FromStr for ContentRange {
    type Err = StorageError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let invalid = || StorageError::invalid_content_range(value);

        let rest = value.trim().strip_prefix("bytes ").ok_or_else(invalid)?;
        let (span, total) = rest.split_once('/').ok_or_else(invalid)?;

        let total = match total.trim() {
            "*" => TotalLength::Unknown,
            n => TotalLength::Known(n.parse().map_err(|_| invalid())?),
        };

        let span = match span.trim() {
            "*" => None,
            s => {
                let (first, last) = s.split_once('-').ok_or_else(invalid)?;
                let first: u64 = first.parse().map_err(|_| invalid())?;
                let last: u64 = last.parse().map_err(|_| invalid())?;
                if last < first {
                    return Err(invalid());
                }
                if let TotalLength::Known(total) = total {
                    if last >= total {
                        return Err(invalid());
                    }
                }
                Some((first, last))
            }
        };

        Ok(Self { span, total })
    }
}

impl std::fmt::Display for ContentRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.span {
            Some((first, last)) => write!(f, "bytes {}-{}/", first, last)?,
            None => write!(f, "bytes */")?,
        }
        match self.total {
            TotalLength::Unknown => write!(f, "*"),
            TotalLength::Known(total) => write!(f, "{}", total),
        }
    }
}
