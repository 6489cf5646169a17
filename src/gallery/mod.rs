//! Gallery listings: explore, liked-yesterday, featured, and turning rows
//! into views with signed URLs.

mod liked;

pub use liked::{GallerySource, LikedGalleryCache};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;

use crate::db::{DbOperations, GalleryRow, ImageView};
use crate::error::AppError;
use crate::storage::ObjectStore;

/// Signs the stored objects of `row`. Video rows have no image object, so
/// their `image_url` is the signed video as well; the provider URL stored
/// on the row is only used when nothing reached storage.
pub async fn render_row(
    store: &dyn ObjectStore,
    expires_in: Duration,
    row: GalleryRow,
) -> Result<ImageView, AppError> {
    let image = row.image;

    let video_url = match &image.video_key {
        Some(key) => Some(store.presigned_url(key, expires_in).await?),
        None => None,
    };
    let image_url = match (&image.s3_key, &video_url) {
        (Some(key), _) => store.presigned_url(key, expires_in).await?,
        (None, Some(video)) => video.clone(),
        (None, None) => image.image_url.clone(),
    };

    Ok(ImageView {
        id: image.id,
        user_id: image.user_id,
        prompt: image.prompt,
        image_url,
        video_url,
        aspect_ratio: image.aspect_ratio,
        is_private: image.is_private,
        like_count: row.like_count,
        created_at: image.created_at,
    })
}

pub async fn render_rows(
    store: &dyn ObjectStore,
    expires_in: Duration,
    rows: Vec<GalleryRow>,
) -> Result<Vec<ImageView>, AppError> {
    let mut views = Vec::with_capacity(rows.len());
    for row in rows {
        views.push(render_row(store, expires_in, row).await?);
    }
    Ok(views)
}

/// Postgres-backed [`GallerySource`]. URLs are signed when the gallery is
/// built, so a cached day keeps serving the same bytes.
pub struct DbGallerySource {
    db: Arc<DbOperations>,
    store: Arc<dyn ObjectStore>,
    expires_in: Duration,
}

impl DbGallerySource {
    pub fn new(db: Arc<DbOperations>, store: Arc<dyn ObjectStore>, expires_in: Duration) -> Self {
        Self { db, store, expires_in }
    }
}

#[async_trait]
impl GallerySource for DbGallerySource {
    async fn liked_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<ImageView>, AppError> {
        let rows = self.db.liked_between(start, end, limit as i64).await?;
        render_rows(self.store.as_ref(), self.expires_in, rows).await
    }

    async fn random_public_excluding(&self, exclude: &[i32], limit: usize) -> Result<Vec<ImageView>, AppError> {
        let rows = self.db.random_public_excluding(exclude, limit as i64).await?;
        render_rows(self.store.as_ref(), self.expires_in, rows).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::GeneratedImage;
    use crate::storage::MemoryStore;

    fn row(s3_key: Option<&str>, video_key: Option<&str>) -> GalleryRow {
        GalleryRow {
            image: GeneratedImage {
                id: 7,
                user_id: 3,
                prompt: "neon city".into(),
                image_url: "https://replicate.delivery/out.png".into(),
                s3_key: s3_key.map(str::to_string),
                video_key: video_key.map(str::to_string),
                prediction_id: None,
                aspect_ratio: Some("9:16".into()),
                is_private: false,
                created_at: Utc::now(),
            },
            like_count: 4,
        }
    }

    #[tokio::test]
    async fn test_render_signs_stored_objects() {
        let store = MemoryStore::new("http://s3.local");
        let view = render_row(
            &store,
            Duration::from_secs(60),
            row(Some("images/a.png"), Some("videos/a.mp4")),
        )
        .await
        .unwrap();

        assert_eq!(view.image_url, "http://s3.local/images/a.png?expires_in=60");
        assert_eq!(view.video_url.as_deref(), Some("http://s3.local/videos/a.mp4?expires_in=60"));
        assert_eq!(view.like_count, 4);
    }

    #[tokio::test]
    async fn test_video_rows_never_expose_the_provider_url() {
        let store = MemoryStore::new("http://s3.local");
        let view = render_row(&store, Duration::from_secs(60), row(None, Some("videos/v.mp4")))
            .await
            .unwrap();

        assert_eq!(view.image_url, "http://s3.local/videos/v.mp4?expires_in=60");
        assert_eq!(view.video_url.as_deref(), Some(view.image_url.as_str()));
    }

    #[tokio::test]
    async fn test_render_falls_back_to_provider_url() {
        let store = MemoryStore::new("http://s3.local");
        let view = render_row(&store, Duration::from_secs(60), row(None, None)).await.unwrap();

        assert_eq!(view.image_url, "https://replicate.delivery/out.png");
        assert!(view.video_url.is_none());
    }
}
