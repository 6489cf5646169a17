//! Retention job: drops old gallery rows and their stored media once a day.

use anyhow::Context;
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::clock;
use crate::config::CleanupConfig;
use crate::db::DbOperations;
use crate::storage::ObjectStore;

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CleanupReport {
    pub rows_deleted: usize,
    pub objects_deleted: usize,
    pub objects_failed: usize,
}

/// Deletes public images older than `explore_retention_days` and private
/// ones older than `private_retention_days`, then their objects. A failed
/// object delete is logged and the run carries on.
pub async fn cleanup_expired(
    db: &DbOperations,
    store: &dyn ObjectStore,
    config: &CleanupConfig,
    now: DateTime<Utc>,
) -> anyhow::Result<CleanupReport> {
    let public_cutoff = now - Duration::days(config.explore_retention_days);
    let private_cutoff = now - Duration::days(config.private_retention_days);

    let deleted = db
        .delete_expired_images(public_cutoff, private_cutoff)
        .await
        .context("deleting expired image rows")?;

    let keys = deleted.iter().flat_map(|media| media.object_keys()).collect();
    let mut report = remove_objects(store, keys).await;
    report.rows_deleted = deleted.len();

    Ok(report)
}

async fn remove_objects(store: &dyn ObjectStore, keys: Vec<&str>) -> CleanupReport {
    let mut report = CleanupReport::default();

    for key in keys {
        match store.delete_object(key).await {
            Ok(()) => report.objects_deleted += 1,
            Err(e) => {
                warn!("Could not delete object {}: {}", key, e);
                report.objects_failed += 1;
            }
        }
    }

    report
}

/// Runs [`cleanup_expired`] every UTC midnight. Never returns.
pub async fn run_cleanup_loop(db: Arc<DbOperations>, store: Arc<dyn ObjectStore>, config: CleanupConfig) {
    loop {
        tokio::time::sleep(clock::until_next_utc_midnight(Utc::now())).await;

        match cleanup_expired(&db, store.as_ref(), &config, Utc::now()).await {
            Ok(report) => info!(
                "Cleanup removed {} rows, {} objects ({} object deletes failed)",
                report.rows_deleted, report.objects_deleted, report.objects_failed
            ),
            Err(e) => error!("Cleanup run failed: {:#}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StorageError;
    use crate::storage::MemoryStore;
    use async_trait::async_trait;
    use bytes::Bytes;

    struct FlakyStore {
        inner: MemoryStore,
        broken_key: &'static str,
    }

    #[async_trait]
    impl ObjectStore for FlakyStore {
        async fn put_object(&self, key: &str, body: Bytes, content_type: &str) -> Result<(), StorageError> {
            self.inner.put_object(key, body, content_type).await
        }

        async fn delete_object(&self, key: &str) -> Result<(), StorageError> {
            if key == self.broken_key {
                return Err(StorageError::DeleteFailed {
                    key: key.to_string(),
                    message: "access denied".into(),
                });
            }
            self.inner.delete_object(key).await
        }

        async fn presigned_url(&self, key: &str, expires_in: std::time::Duration) -> Result<String, StorageError> {
            self.inner.presigned_url(key, expires_in).await
        }
    }

    #[tokio::test]
    async fn test_object_failures_do_not_abort_the_run() {
        let store = FlakyStore {
            inner: MemoryStore::new("http://s3.local"),
            broken_key: "videos/b.mp4",
        };
        for key in ["images/a.png", "images/b.png", "videos/b.mp4"] {
            store.put_object(key, Bytes::from_static(b"x"), "image/png").await.unwrap();
        }

        let report = remove_objects(&store, vec!["images/a.png", "videos/b.mp4", "images/b.png"]).await;

        assert_eq!(report.objects_deleted, 2);
        assert_eq!(report.objects_failed, 1);
        assert!(store.inner.get("images/b.png").await.is_none());
        assert!(store.inner.get("videos/b.mp4").await.is_some());
    }

    #[tokio::test]
    #[ignore = "requires a local Postgres"]
    async fn test_cleanup_against_database() {
        let settings = crate::config::Settings::new_for_test().unwrap();
        let db = DbOperations::new_with_options(&settings.database.url, 2, std::time::Duration::from_secs(3))
            .await
            .unwrap();
        db.run_migrations().await.unwrap();
        let store = MemoryStore::new("http://s3.local");

        let report = cleanup_expired(&db, &store, &settings.cleanup, Utc::now()).await.unwrap();
        assert_eq!(report.objects_failed, 0);
    }
}
