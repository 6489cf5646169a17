use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::info;

use crate::clock;
use crate::db::ImageView;
use crate::error::AppError;

/// Where the liked gallery gets its images from.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait GallerySource: Send + Sync {
    /// Public images liked inside `[start, end)`, most recently liked first.
    async fn liked_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<ImageView>, AppError>;

    /// Random public images whose ids are not in `exclude`.
    async fn random_public_excluding(&self, exclude: &[i32], limit: usize) -> Result<Vec<ImageView>, AppError>;
}

struct CachedDay {
    day: String,
    images: Arc<Vec<ImageView>>,
}

/// The "liked yesterday" gallery, computed once per UTC day.
pub struct LikedGalleryCache {
    source: Arc<dyn GallerySource>,
    size: usize,
    cached: Mutex<Option<CachedDay>>,
}

impl LikedGalleryCache {
    pub fn new(source: Arc<dyn GallerySource>, size: usize) -> Self {
        Self {
            source,
            size,
            cached: Mutex::new(None),
        }
    }

    pub async fn get(&self) -> Result<Arc<Vec<ImageView>>, AppError> {
        self.get_at(Utc::now()).await
    }

    /// Concurrent callers on a cold day wait for one computation instead of
    /// each running their own.
    pub async fn get_at(&self, now: DateTime<Utc>) -> Result<Arc<Vec<ImageView>>, AppError> {
        let today = clock::utc_day_key(now);
        let mut cached = self.cached.lock().await;

        if let Some(day) = cached.as_ref().filter(|c| c.day == today) {
            return Ok(day.images.clone());
        }

        let images = Arc::new(self.compute(now).await?);
        info!("Liked gallery for {} rebuilt with {} images", today, images.len());
        *cached = Some(CachedDay {
            day: today,
            images: images.clone(),
        });

        Ok(images)
    }

    async fn compute(&self, now: DateTime<Utc>) -> Result<Vec<ImageView>, AppError> {
        let (start, end) = clock::previous_utc_day(now);
        let mut seen = HashSet::new();

        let mut images: Vec<ImageView> = self
            .source
            .liked_between(start, end, self.size)
            .await?
            .into_iter()
            .filter(|image| seen.insert(image.id))
            .take(self.size)
            .collect();

        if images.len() < self.size {
            let exclude: Vec<i32> = images.iter().map(|image| image.id).collect();
            let fill = self
                .source
                .random_public_excluding(&exclude, self.size - images.len())
                .await?;

            images.extend(fill.into_iter().filter(|image| seen.insert(image.id)));
            images.truncate(self.size);
        }

        Ok(images)
    }
}
