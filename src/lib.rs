pub mod auth;
pub mod cleanup;
pub mod clock;
pub mod config;
pub mod db;
pub mod error;
pub mod gallery;
pub mod generation;
pub mod handlers;
pub mod media_cache;
pub mod proxy;
pub mod rate_limit;
pub mod storage;

use std::sync::Arc;
use std::time::Duration;
use actix_web::{web, HttpResponse};

pub use error::AppError;
pub type Result<T> = std::result::Result<T, AppError>;
pub use config::Settings;

pub use db::DbOperations;
pub use rate_limit::{DailyRateLimiter, RateLimitConfig};

use error::DatabaseError;
use gallery::{DbGallerySource, GallerySource, LikedGalleryCache};
use generation::{MediaRecords, PollPolicy, VideoJobs};
use media_cache::{MediaCache, MediaCachePolicy};
use proxy::{OpenAiClient, ReplicateClient};
use storage::ObjectStore;

/// Health check endpoint handler
/// Returns a JSON response with server status, timestamp and pool usage
pub async fn health_check(state: web::Data<AppState>) -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "database": state.db.get_pool_status(),
    }))
}

/// Application state shared across all workers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Settings>,
    pub db: Arc<DbOperations>,
    pub records: Arc<dyn MediaRecords>,
    pub storage: Arc<dyn ObjectStore>,
    pub http: reqwest::Client,
    pub replicate: Arc<ReplicateClient>,
    pub openai: Arc<OpenAiClient>,
    pub poll_policy: PollPolicy,
    pub video_limiter: Arc<DailyRateLimiter>,
    pub video_jobs: Arc<VideoJobs>,
    pub liked_gallery: Arc<LikedGalleryCache>,
    pub media_cache: Arc<MediaCache>,
}

impl AppState {
    pub async fn new(config: Settings) -> Result<Self> {
        // Initialize database connection pool
        let db = DbOperations::new_with_options(
            &config.database.url,
            config.database.max_connections,
            Duration::from_secs(5),
        )
        .await
        .map_err(|e| AppError::DatabaseError(DatabaseError::ConnectionError(e.to_string())))?;

        if config.database.run_migrations {
            db.run_migrations().await?;
            tracing::info!("Database migrations applied");
        }

        let storage = storage::from_config(&config.storage)?;
        Ok(Self::from_parts(config, Arc::new(db), storage))
    }

    /// Wires the in-memory services around an existing pool and store.
    pub fn from_parts(config: Settings, db: Arc<DbOperations>, storage: Arc<dyn ObjectStore>) -> Self {
        let http = reqwest::Client::new();
        let providers = &config.providers;

        let replicate = Arc::new(ReplicateClient::new(
            http.clone(),
            &providers.replicate_base_url,
            &providers.replicate_api_token,
        ));
        let openai = Arc::new(OpenAiClient::new(
            http.clone(),
            &providers.openai_base_url,
            &providers.openai_api_key,
            &providers.openai_model,
        ));

        let gallery_source = Arc::new(DbGallerySource::new(
            db.clone(),
            storage.clone(),
            config.storage.presign_expiry(),
        ));
        let media_cache = Arc::new(MediaCache::new(
            http.clone(),
            &config.storage.public_origin(),
            MediaCachePolicy::from_config(&config.media_cache),
        ));

        Self {
            poll_policy: PollPolicy::from_config(providers),
            video_limiter: Arc::new(DailyRateLimiter::new(RateLimitConfig {
                daily_limit: config.limits.daily_video_generations,
            })),
            video_jobs: Arc::new(VideoJobs::new()),
            liked_gallery: Arc::new(LikedGalleryCache::new(gallery_source, config.gallery.liked_size)),
            config: Arc::new(config),
            records: db.clone(),
            db,
            storage,
            http,
            replicate,
            openai,
            media_cache,
        }
    }

    /// Swaps where the liked gallery reads from, dropping anything cached.
    pub fn with_gallery_source(mut self, source: Arc<dyn GallerySource>) -> Self {
        self.liked_gallery = Arc::new(LikedGalleryCache::new(source, self.config.gallery.liked_size));
        self
    }

    /// Swaps where finished generations are recorded.
    pub fn with_media_records(mut self, records: Arc<dyn MediaRecords>) -> Self {
        self.records = records;
        self
    }

    pub async fn shutdown(&self) -> Result<()> {
        // Close database connections
        self.db.pool().close().await;
        Ok(())
    }
}
