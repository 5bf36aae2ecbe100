use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Folder/File classification of a listed resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResourceType {
    Folder,
    File,
}

/// Properties that only exist for one of the two resource types
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "resource_type")]
pub enum ResourceKind {
    /// A collection. The size is the server's `quota-used-bytes`, which is not
    /// necessarily the aggregate size of the folder's content.
    Folder { quota_used_bytes: u64 },
    File {
        content_length: u64,
        content_type: Option<String>,
    },
}

/// One `<response>` of a PROPFIND listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceEntry {
    /// Percent-decoded absolute path on the server
    pub path: String,
    pub name: String,
    #[serde(flatten)]
    pub kind: ResourceKind,
    /// `getlastmodified` as sent by the server (an HTTP-date)
    pub last_modified: Option<String>,
    pub etag: Option<String>,
}

impl ResourceEntry {
    pub fn resource_type(&self) -> ResourceType {
        match self.kind {
            ResourceKind::Folder { .. } => ResourceType::Folder,
            ResourceKind::File { .. } => ResourceType::File,
        }
    }

    pub fn is_folder(&self) -> bool {
        self.resource_type() == ResourceType::Folder
    }

    pub fn is_file(&self) -> bool {
        self.resource_type() == ResourceType::File
    }

    pub fn size(&self) -> u64 {
        match self.kind {
            ResourceKind::Folder { quota_used_bytes } => quota_used_bytes,
            ResourceKind::File { content_length, .. } => content_length,
        }
    }

    pub fn content_type(&self) -> Option<&str> {
        match &self.kind {
            ResourceKind::File { content_type, .. } => content_type.as_deref(),
            ResourceKind::Folder { .. } => None,
        }
    }

    /// `last_modified` parsed as an RFC 2822 / HTTP-date timestamp.
    pub fn last_modified_at(&self) -> Option<DateTime<Utc>> {
        let raw = self.last_modified.as_deref()?.trim();
        DateTime::parse_from_rfc2822(raw)
            .ok()
            .map(|dt| dt.with_timezone(&Utc))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn file_entry() -> ResourceEntry {
        ResourceEntry {
            path: "/remote.php/dav/files/demo/Documents/Example.odt".to_string(),
            name: "Example.odt".to_string(),
            kind: ResourceKind::File {
                content_length: 36227,
                content_type: Some("application/vnd.oasis.opendocument.text".to_string()),
            },
            last_modified: Some("Tue, 03 Dec 2024 10:30:00 GMT".to_string()),
            etag: Some("\"8f7c1d3e\"".to_string()),
        }
    }

    #[test]
    fn test_file_accessors() {
        let entry = file_entry();
        assert_eq!(entry.resource_type(), ResourceType::File);
        assert!(entry.is_file());
        assert_eq!(entry.size(), 36227);
        assert_eq!(entry.content_type(), Some("application/vnd.oasis.opendocument.text"));
        assert_eq!(
            entry.last_modified_at(),
            Some(Utc.with_ymd_and_hms(2024, 12, 3, 10, 30, 0).unwrap())
        );
    }

    #[test]
    fn test_folder_has_no_content_type() {
        let entry = ResourceEntry {
            path: "/remote.php/dav/files/demo/Photos/".to_string(),
            name: "Photos".to_string(),
            kind: ResourceKind::Folder { quota_used_bytes: 1024 },
            last_modified: Some("not a date".to_string()),
            etag: None,
        };
        assert!(entry.is_folder());
        assert_eq!(entry.size(), 1024);
        assert_eq!(entry.content_type(), None);
        assert_eq!(entry.last_modified_at(), None);
    }

    #[test]
    fn test_serializes_with_resource_type_tag() {
        let json = serde_json::to_value(file_entry()).unwrap();
        assert_eq!(json["resource_type"], "File");
        assert_eq!(json["content_length"], 36227);
        assert_eq!(json["name"], "Example.odt");
    }
}
