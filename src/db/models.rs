use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct GeneratedImage {
    pub id: i32,
    pub user_id: i32,
    pub prompt: String,
    /// URL the provider returned; only served when there is no stored copy.
    pub image_url: String,
    pub s3_key: Option<String>,
    pub video_key: Option<String>,
    pub prediction_id: Option<String>,
    pub aspect_ratio: Option<String>,
    pub is_private: bool,
    pub created_at: DateTime<Utc>,
}

/// An image row together with its like count, as galleries list it.
#[derive(Debug, Clone, FromRow)]
pub struct GalleryRow {
    #[sqlx(flatten)]
    pub image: GeneratedImage,
    pub like_count: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ImageLike {
    pub id: i32,
    pub user_id: i32,
    pub image_id: i32,
    pub created_at: DateTime<Utc>,
}

/// Fields of a row about to be inserted into `generated_images`.
#[derive(Debug, Clone)]
pub struct NewGeneratedImage {
    pub user_id: i32,
    pub prompt: String,
    pub image_url: String,
    pub s3_key: Option<String>,
    pub video_key: Option<String>,
    pub prediction_id: Option<String>,
    pub aspect_ratio: Option<String>,
    pub is_private: bool,
}

/// Object keys left behind by a deleted image row.
#[derive(Debug, Clone, FromRow)]
pub struct DeletedMedia {
    pub id: i32,
    pub s3_key: Option<String>,
    pub video_key: Option<String>,
}

impl DeletedMedia {
    pub fn object_keys(&self) -> impl Iterator<Item = &str> {
        self.s3_key.iter().chain(self.video_key.iter()).map(String::as_str)
    }
}

/// What the API hands to the frontend: URLs already signed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageView {
    pub id: i32,
    pub user_id: i32,
    pub prompt: String,
    pub image_url: String,
    pub video_url: Option<String>,
    pub aspect_ratio: Option<String>,
    pub is_private: bool,
    pub like_count: i64,
    pub created_at: DateTime<Utc>,
}
