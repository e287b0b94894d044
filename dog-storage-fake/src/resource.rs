use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::Blob;

/// Object metadata returned in the body of a completed upload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectResource {
    pub kind: String,
    pub id: String,
    pub bucket: String,
    pub name: String,
    /// Byte length, encoded as a decimal string on the wire
    pub size: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated: Option<DateTime<Utc>>,
}

impl ObjectResource {
    pub fn from_blob(blob: &Blob) -> Self {
        Self {
            kind: "storage#object".to_string(),
            id: format!("{}/{}", blob.bucket_name(), blob.name()),
            bucket: blob.bucket_name().to_string(),
            name: blob.name().to_string(),
            size: blob.size().unwrap_or(0).to_string(),
            updated: blob.updated(),
        }
    }

    /// Size parsed back to a number
    pub fn size_bytes(&self) -> Option<u64> {
        self.size.parse().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Client;

    #[test]
    fn test_resource_from_blob() {
        let client = Client::new();
        let blob = client.create_bucket("test-bucket").unwrap().blob("a/b.txt").unwrap();
        blob.upload_from_string("test").unwrap();

        let resource = ObjectResource::from_blob(&blob);
        assert_eq!(resource.id, "test-bucket/a/b.txt");
        assert_eq!(resource.size, "4");
        assert_eq!(resource.size_bytes(), Some(4));

        let json = serde_json::to_value(&resource).unwrap();
        assert_eq!(json["kind"], "storage#object");
        assert_eq!(json["size"], "4");
        assert!(json.get("updated").is_some());
    }
}
