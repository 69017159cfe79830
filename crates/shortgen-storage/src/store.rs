//! Publishing seam for rendered artifacts.

use std::path::Path;

use async_trait::async_trait;

use crate::error::{StorageError, StorageResult};

/// Durable destination for finished videos.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Upload the file at `path` under `key` and return its URL.
    async fn publish(&self, path: &Path, key: &str) -> StorageResult<String>;
}

/// Reject keys that are empty, absolute, or climb out of the bucket prefix.
pub fn validate_key(key: &str) -> StorageResult<()> {
    if key.is_empty() {
        return Err(StorageError::invalid_key("empty key"));
    }
    if key.starts_with('/') {
        return Err(StorageError::invalid_key(format!("{} is absolute", key)));
    }
    if key.split('/').any(|segment| segment == ".." || segment.is_empty()) {
        return Err(StorageError::invalid_key(key));
    }
    Ok(())
}

/// Content type from the key's extension.
pub fn content_type_for(key: &str) -> &'static str {
    let ext = key
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "mp4" => "video/mp4",
        "webm" => "video/webm",
        "mov" => "video/quicktime",
        "srt" => "application/x-subrip",
        "json" => "application/json",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_key() {
        assert!(validate_key("videos/1b4e28ba.mp4").is_ok());
        assert!(validate_key("").is_err());
        assert!(validate_key("/videos/a.mp4").is_err());
        assert!(validate_key("videos/../secrets").is_err());
        assert!(validate_key("videos//a.mp4").is_err());
    }

    #[test]
    fn test_content_type_for() {
        assert_eq!(content_type_for("videos/a.mp4"), "video/mp4");
        assert_eq!(content_type_for("videos/A.MP4"), "video/mp4");
        assert_eq!(content_type_for("videos/a"), "application/octet-stream");
    }
}
