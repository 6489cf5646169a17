use std::future::Future;
use tracing::{error, info};

use crate::error::{AppError, StorageError};
use crate::storage::{self, ObjectStore};

#[derive(Debug, Clone)]
pub struct StoredAsset {
    pub key: String,
    pub content_type: String,
    pub size: usize,
}

/// Downloads a provider output and re-uploads it under `{prefix}/{uuid}.{ext}`.
pub async fn store_remote_asset(
    http: &reqwest::Client,
    store: &dyn ObjectStore,
    prefix: &str,
    source_url: &str,
) -> Result<StoredAsset, AppError> {
    let response = http
        .get(source_url)
        .send()
        .await
        .map_err(|e| StorageError::DownloadFailed(e.to_string()))?;

    if !response.status().is_success() {
        return Err(StorageError::DownloadFailed(format!(
            "{} answered {}",
            source_url,
            response.status()
        ))
        .into());
    }

    let content_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("application/octet-stream")
        .to_string();

    let body = response
        .bytes()
        .await
        .map_err(|e| StorageError::DownloadFailed(e.to_string()))?;

    let key = storage::object_key(prefix, &storage::extension_for(&content_type, source_url));
    let size = body.len();
    store.put_object(&key, body, &content_type).await?;
    info!("Stored {} ({} bytes, {})", key, size, content_type);

    Ok(StoredAsset { key, content_type, size })
}

/// Runs `insert` for an asset that is already uploaded. If the insert fails
/// the object is deleted again so storage holds no unreferenced media.
pub async fn persist_with_compensation<T, F, Fut>(
    store: &dyn ObjectStore,
    asset: &StoredAsset,
    insert: F,
) -> Result<T, AppError>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, AppError>>,
{
    match insert().await {
        Ok(value) => Ok(value),
        Err(e) => {
            error!("Insert for {} failed, removing the upload: {}", asset.key, e);
            if let Err(cleanup) = store.delete_object(&asset.key).await {
                error!("Could not remove orphaned object {}: {}", asset.key, cleanup);
            }
            Err(e)
        }
    }
}
