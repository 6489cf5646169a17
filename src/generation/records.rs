use async_trait::async_trait;

use crate::db::{DbOperations, GalleryRow, GeneratedImage, NewGeneratedImage};
use crate::error::AppError;

/// Where finished generations are recorded.
#[async_trait]
pub trait MediaRecords: Send + Sync {
    /// The caller's row for `prediction_id`, if that prediction was already
    /// stored.
    async fn find_video(&self, user_id: i32, prediction_id: &str) -> Result<Option<GalleryRow>, AppError>;

    /// `None` when a row for the same prediction already exists.
    async fn insert_media(&self, media: &NewGeneratedImage) -> Result<Option<GeneratedImage>, AppError>;
}

#[async_trait]
impl MediaRecords for DbOperations {
    async fn find_video(&self, user_id: i32, prediction_id: &str) -> Result<Option<GalleryRow>, AppError> {
        self.find_video_by_prediction(user_id, prediction_id).await
    }

    async fn insert_media(&self, media: &NewGeneratedImage) -> Result<Option<GeneratedImage>, AppError> {
        self.insert_image(media).await
    }
}
