//! Object storage for generated media.
//!
//! Handlers only see [`ObjectStore`]; `storage.backend` picks S3 or the
//! in-process [`MemoryStore`].

mod memory;
mod s3;

use async_trait::async_trait;
use bytes::Bytes;
use std::sync::Arc;
use std::time::Duration;

use crate::config::StorageConfig;
use crate::error::{AppError, StorageError};

pub use memory::MemoryStore;
pub use s3::S3Store;

#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn put_object(&self, key: &str, body: Bytes, content_type: &str) -> Result<(), StorageError>;

    async fn delete_object(&self, key: &str) -> Result<(), StorageError>;

    /// A time-limited GET URL for `key`.
    async fn presigned_url(&self, key: &str, expires_in: Duration) -> Result<String, StorageError>;
}

pub fn from_config(config: &StorageConfig) -> Result<Arc<dyn ObjectStore>, AppError> {
    match config.backend.as_str() {
        "s3" => Ok(Arc::new(S3Store::from_config(config))),
        "memory" => Ok(Arc::new(MemoryStore::new(config.public_origin()))),
        other => Err(AppError::ConfigError(format!("unknown storage backend `{}`", other))),
    }
}

/// Object key for a new asset: `{prefix}/{uuid}.{ext}`.
pub fn object_key(prefix: &str, extension: &str) -> String {
    format!("{}/{}.{}", prefix.trim_end_matches('/'), uuid::Uuid::new_v4(), extension)
}

/// File extension for a stored asset, from its content type first and the
/// source URL's path second.
pub fn extension_for(content_type: &str, source_url: &str) -> String {
    let mime = content_type.split(';').next().unwrap_or("").trim();
    let known = match mime {
        "image/png" => Some("png"),
        "image/jpeg" | "image/jpg" => Some("jpg"),
        "image/webp" => Some("webp"),
        "image/gif" => Some("gif"),
        "video/mp4" => Some("mp4"),
        "video/webm" => Some("webm"),
        _ => None,
    };
    if let Some(ext) = known {
        return ext.to_string();
    }

    url::Url::parse(source_url)
        .ok()
        .and_then(|url| {
            url.path_segments()
                .and_then(|mut segments| segments.next_back().map(str::to_string))
        })
        .and_then(|name| name.rsplit_once('.').map(|(_, ext)| ext.to_ascii_lowercase()))
        .filter(|ext| !ext.is_empty() && ext.len() <= 5 && ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .unwrap_or_else(|| "bin".to_string())
}

/// Keys come from URL paths on the media route; reject anything that could
/// escape the bucket prefix layout.
pub fn is_valid_key(key: &str) -> bool {
    !key.is_empty()
        && !key.starts_with('/')
        && key.split('/').all(|segment| !segment.is_empty() && segment != "." && segment != "..")
}
