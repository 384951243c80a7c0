//! Gateway value types.

use bytes::Bytes;
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use super::provider::Provider;

/// Fallback content type when none is stored or derivable.
pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Object metadata returned by listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageObjectDescriptor {
    /// Full object key.
    pub name: String,
    /// Size in bytes.
    pub size_bytes: u64,
    /// Last modification time.
    pub last_modified: DateTime<Utc>,
    /// Stored or derived content type.
    pub content_type: String,
    /// Provider entity tag (empty when unknown).
    pub etag: String,
    /// Provider content hash, when exposed.
    pub content_hash: Option<String>,
}

impl StorageObjectDescriptor {
    /// Descriptor for an entry whose metadata could not be fetched.
    #[must_use]
    pub fn placeholder(name: &str) -> Self {
        Self {
            name: name.to_string(),
            size_bytes: 0,
            last_modified: DateTime::UNIX_EPOCH,
            content_type: content_type_for_key(name).to_string(),
            etag: String::new(),
            content_hash: None,
        }
    }
}

/// Result of a successful write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadedObject {
    /// Provider the object was written to.
    pub provider: Provider,
    /// Bucket or container.
    pub bucket: String,
    /// Object key.
    pub key: String,
    /// URI-style location.
    pub location_hint: String,
    /// Bytes written.
    pub size_bytes: u64,
}

/// Downloaded object contents.
#[derive(Debug, Clone)]
pub struct DownloadedObject {
    /// Object bytes.
    pub bytes: Bytes,
    /// Object size in bytes.
    pub size: u64,
    /// Stored or derived content type.
    pub content_type: String,
}

/// Time-limited read URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedUrl {
    /// The signed URL.
    pub url: String,
    /// When the URL stops working.
    pub expires_at: DateTime<Utc>,
}

/// One entry of a completion part list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletedPart {
    /// Part number, 1-based.
    pub part_number: u32,
    /// Token returned when the part was uploaded.
    pub part_token: String,
}

impl CompletedPart {
    /// Create a part list entry.
    #[must_use]
    pub fn new(part_number: u32, part_token: impl Into<String>) -> Self {
        Self {
            part_number,
            part_token: part_token.into(),
        }
    }
}

/// Chunked upload lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UploadState {
    /// Created, no part acknowledged yet.
    Initiated,
    /// At least one part acknowledged.
    PartsUploading,
    /// Completion in progress.
    Completing,
    /// Final object written.
    Completed,
    /// Cancelled by the caller or the idle sweep.
    Aborted,
}

/// Snapshot of an in-progress chunked upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadStatus {
    /// Upload identifier.
    pub upload_id: String,
    /// Target provider.
    pub provider: Provider,
    /// Target bucket.
    pub bucket: String,
    /// Target key.
    pub key: String,
    /// Content type the final object will carry.
    pub content_type: String,
    /// Current state.
    pub state: UploadState,
    /// Acknowledged parts in ascending order.
    pub parts: Vec<CompletedPart>,
    /// Part transfers still running.
    pub parts_in_flight: usize,
}

/// Derive a content type from the key's extension.
#[must_use]
pub fn content_type_for_key(key: &str) -> &'static str {
    let Some((_, ext)) = key.rsplit_once('.') else {
        return DEFAULT_CONTENT_TYPE;
    };
    if ext.contains('/') {
        return DEFAULT_CONTENT_TYPE;
    }
    match ext.to_ascii_lowercase().as_str() {
        "pdf" => "application/pdf",
        "json" => "application/json",
        "xml" => "application/xml",
        "zip" => "application/zip",
        "gz" => "application/gzip",
        "txt" | "log" => "text/plain",
        "csv" => "text/csv",
        "html" | "htm" => "text/html",
        "md" => "text/markdown",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "svg" => "image/svg+xml",
        "tif" | "tiff" => "image/tiff",
        "doc" => "application/msword",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "xls" => "application/vnd.ms-excel",
        "xlsx" => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        _ => DEFAULT_CONTENT_TYPE,
    }
}

/// Parse a provider timestamp rendered as text.
///
/// Accepts RFC 3339 and chrono's default `Display` form.
pub(crate) fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    let naive = raw.strip_suffix(" UTC").unwrap_or(raw);
    NaiveDateTime::parse_from_str(naive, "%Y-%m-%d %H:%M:%S%.f")
        .ok()
        .map(|dt| dt.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};
    use rstest::rstest;

    #[rstest]
    #[case("report.pdf", "application/pdf")]
    #[case("a/b/REPORT.PDF", "application/pdf")]
    #[case("photo.jpeg", "image/jpeg")]
    #[case("data.csv", "text/csv")]
    #[case("noext", DEFAULT_CONTENT_TYPE)]
    #[case("dir.v2/noext", DEFAULT_CONTENT_TYPE)]
    #[case("archive.unknownext", DEFAULT_CONTENT_TYPE)]
    fn test_content_type_for_key(#[case] key: &str, #[case] expected: &str) {
        assert_eq!(content_type_for_key(key), expected);
    }

    #[test]
    fn test_parse_rfc3339_timestamp() {
        let ts = parse_timestamp("2024-06-01T12:30:00Z").expect("rfc3339");
        assert_eq!((ts.year(), ts.month(), ts.hour(), ts.minute()), (2024, 6, 12, 30));
    }

    #[test]
    fn test_parse_chrono_display_timestamp() {
        let ts = parse_timestamp("2024-06-01 12:30:00.250 UTC").expect("chrono display");
        assert_eq!(ts.day(), 1);
        assert_eq!(ts.timestamp_subsec_millis(), 250);
    }

    #[test]
    fn test_parse_garbage_timestamp() {
        assert!(parse_timestamp("yesterday").is_none());
    }

    #[test]
    fn test_placeholder_defaults() {
        let d = StorageObjectDescriptor::placeholder("x/y.pdf");
        assert_eq!(d.size_bytes, 0);
        assert_eq!(d.last_modified, DateTime::UNIX_EPOCH);
        assert_eq!(d.content_type, "application/pdf");
        assert!(d.etag.is_empty());
    }
}
