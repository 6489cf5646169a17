#![allow(dead_code)]

use async_trait::async_trait;
use chrono::Utc;
use sqlx::postgres::PgPoolOptions;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use studio_server::auth::issue_token;
use studio_server::db::{GalleryRow, GeneratedImage, NewGeneratedImage};
use studio_server::generation::MediaRecords;
use studio_server::storage::MemoryStore;
use studio_server::{storage, AppError, AppState, DbOperations, Settings};

/// Settings for tests that never reach Postgres.
pub fn test_settings() -> Settings {
    Settings::new_for_test().expect("Failed to load test config")
}

/// State over a lazy pool: nothing connects until a handler queries.
pub fn test_state(config: Settings) -> AppState {
    let storage = storage::from_config(&config.storage).expect("Failed to build storage");
    AppState::from_parts(config, lazy_db(), storage)
}

/// Like `test_state`, but over a store the test can inspect.
pub fn test_state_with_store(config: Settings, store: Arc<MemoryStore>) -> AppState {
    AppState::from_parts(config, lazy_db(), store)
}

fn lazy_db() -> Arc<DbOperations> {
    let config = test_settings();
    let pool = PgPoolOptions::new()
        .connect_lazy(&config.database.url)
        .expect("Failed to create lazy pool");
    Arc::new(DbOperations::new(Arc::new(pool)))
}

pub fn bearer(user_id: i32) -> (&'static str, String) {
    let token = issue_token(user_id, "test_secret", 1).expect("Failed to issue token");
    ("Authorization", format!("Bearer {}", token))
}

/// In-memory generation records with the same conflict rule as the
/// `prediction_id` unique index.
#[derive(Default)]
pub struct FakeRecords {
    rows: Mutex<Vec<GeneratedImage>>,
    /// Stored just before the next insert, as if another poll got there first.
    pending_rival: Mutex<Option<NewGeneratedImage>>,
    fail_inserts: AtomicBool,
}

impl FakeRecords {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        let records = Self::default();
        records.fail_inserts.store(true, Ordering::SeqCst);
        records
    }

    pub fn with_rival(rival: NewGeneratedImage) -> Self {
        let records = Self::default();
        *records.pending_rival.lock().unwrap() = Some(rival);
        records
    }

    pub fn rows(&self) -> Vec<GeneratedImage> {
        self.rows.lock().unwrap().clone()
    }

    fn store(rows: &mut Vec<GeneratedImage>, media: &NewGeneratedImage) -> Option<GeneratedImage> {
        if media.prediction_id.is_some() && rows.iter().any(|r| r.prediction_id == media.prediction_id) {
            return None;
        }
        let row = GeneratedImage {
            id: rows.len() as i32 + 1,
            user_id: media.user_id,
            prompt: media.prompt.clone(),
            image_url: media.image_url.clone(),
            s3_key: media.s3_key.clone(),
            video_key: media.video_key.clone(),
            prediction_id: media.prediction_id.clone(),
            aspect_ratio: media.aspect_ratio.clone(),
            is_private: media.is_private,
            created_at: Utc::now(),
        };
        rows.push(row.clone());
        Some(row)
    }
}

#[async_trait]
impl MediaRecords for FakeRecords {
    async fn find_video(&self, user_id: i32, prediction_id: &str) -> Result<Option<GalleryRow>, AppError> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .iter()
            .find(|r| r.user_id == user_id && r.video_key.is_some() && r.prediction_id.as_deref() == Some(prediction_id))
            .cloned()
            .map(|image| GalleryRow { image, like_count: 0 }))
    }

    async fn insert_media(&self, media: &NewGeneratedImage) -> Result<Option<GeneratedImage>, AppError> {
        if self.fail_inserts.load(Ordering::SeqCst) {
            return Err(AppError::InternalError("insert refused".into()));
        }
        let mut rows = self.rows.lock().unwrap();
        if let Some(rival) = self.pending_rival.lock().unwrap().take() {
            Self::store(&mut rows, &rival);
        }
        Ok(Self::store(&mut rows, media))
    }
}
