use actix_web::{web, HttpResponse};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{error, info, warn};

use crate::auth::AuthenticatedUser;
use crate::db::{GalleryRow, ImageView, NewGeneratedImage};
use crate::error::{AppError, ProviderError};
use crate::gallery::render_row;
use crate::generation::{persist_with_compensation, store_remote_asset, VideoJob, VIDEO_PREFIX};
use crate::proxy::PredictionStatus;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct GenerateVideoRequest {
    pub prompt: String,
    /// Animate an existing image the caller can see.
    pub image_id: Option<i32>,
    pub aspect_ratio: Option<String>,
    #[serde(default)]
    pub is_private: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct VideoSubmitted {
    pub prediction_id: String,
    pub status: PredictionStatus,
    pub remaining: u32,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct VideoLimit {
    pub remaining: u32,
    pub limit: u32,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct VideoStatus {
    pub prediction_id: String,
    pub status: PredictionStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video: Option<ImageView>,
}

pub async fn video_limit(user: AuthenticatedUser, state: web::Data<AppState>) -> Result<HttpResponse, AppError> {
    Ok(HttpResponse::Ok().json(VideoLimit {
        remaining: state.video_limiter.remaining(user.id).await,
        limit: state.video_limiter.daily_limit(),
    }))
}

pub async fn generate_video(
    user: AuthenticatedUser,
    req: web::Json<GenerateVideoRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let req = req.into_inner();
    let prompt = req.prompt.trim().to_string();
    if prompt.is_empty() {
        return Err(AppError::ValidationError("prompt is required".into()));
    }

    let source_url = match req.image_id {
        Some(image_id) => {
            let row = state
                .db
                .get_visible_image(user.id, image_id)
                .await?
                .ok_or_else(|| AppError::NotFound(format!("Image {}", image_id)))?;
            let view = render_row(state.storage.as_ref(), state.config.storage.presign_expiry(), row).await?;
            Some(view.image_url)
        }
        None => None,
    };

    if !state.video_limiter.check_limit(user.id).await {
        warn!("User {} hit the daily video limit", user.id);
        return Err(AppError::RateLimited { remaining: 0 });
    }

    let mut input = json!({ "prompt": prompt, "prompt_optimizer": true });
    if let Some(url) = &source_url {
        input["first_frame_image"] = json!(url);
    }

    let prediction = state
        .replicate
        .create_prediction(&state.config.providers.video_model, input)
        .await
        .map_err(|e| {
            error!("Video submission for user {} failed: {}", user.id, e);
            e
        })?;

    state
        .video_jobs
        .register(
            &prediction.id,
            VideoJob {
                user_id: user.id,
                prompt,
                aspect_ratio: req.aspect_ratio,
                source_image_id: req.image_id,
                is_private: req.is_private,
                submitted_at: Utc::now(),
            },
        )
        .await;

    let remaining = state.video_limiter.remaining(user.id).await;
    info!(
        "User {} submitted video prediction {} ({} left today)",
        user.id, prediction.id, remaining
    );

    Ok(HttpResponse::Accepted().json(VideoSubmitted {
        prediction_id: prediction.id,
        status: prediction.status,
        remaining,
    }))
}

/// Checks one video prediction. Once it has succeeded the video is copied
/// to storage and recorded; later polls for the same prediction get the
/// stored row back without touching Replicate again.
pub async fn video_status(
    user: AuthenticatedUser,
    path: web::Path<String>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let prediction_id = path.into_inner();
    let expires_in = state.config.storage.presign_expiry();

    if let Some(row) = state.records.find_video(user.id, &prediction_id).await? {
        return Ok(HttpResponse::Ok().json(VideoStatus {
            prediction_id,
            status: PredictionStatus::Succeeded,
            video: Some(render_row(state.storage.as_ref(), expires_in, row).await?),
        }));
    }

    let job = state
        .video_jobs
        .get_for_user(&prediction_id, user.id)
        .await
        .ok_or_else(|| AppError::NotFound(format!("Video job {}", prediction_id)))?;

    let prediction = state.replicate.get_prediction(&prediction_id).await?;

    match prediction.status {
        PredictionStatus::Succeeded => {
            let output_url = prediction.output_url().ok_or(ProviderError::MissingOutput)?.to_string();
            let asset = store_remote_asset(&state.http, state.storage.as_ref(), VIDEO_PREFIX, &output_url).await?;

            let new_video = NewGeneratedImage {
                user_id: user.id,
                prompt: job.prompt.clone(),
                image_url: output_url,
                s3_key: None,
                video_key: Some(asset.key.clone()),
                prediction_id: Some(prediction_id.clone()),
                aspect_ratio: job.aspect_ratio.clone(),
                is_private: job.is_private,
            };

            let inserted = persist_with_compensation(state.storage.as_ref(), &asset, || async {
                state.records.insert_media(&new_video).await
            })
            .await?;

            let row = match inserted {
                Some(image) => GalleryRow { image, like_count: 0 },
                None => {
                    // a concurrent poll recorded it first; ours is surplus
                    if let Err(e) = state.storage.delete_object(&asset.key).await {
                        warn!("Could not remove duplicate video {}: {}", asset.key, e);
                    }
                    state
                        .records
                        .find_video(user.id, &prediction_id)
                        .await?
                        .ok_or_else(|| AppError::NotFound(format!("Video {}", prediction_id)))?
                }
            };

            state.video_jobs.finish(&prediction_id).await;
            info!(
                "Video {} stored for user {} (source image {:?})",
                prediction_id, user.id, job.source_image_id
            );

            Ok(HttpResponse::Ok().json(VideoStatus {
                prediction_id,
                status: PredictionStatus::Succeeded,
                video: Some(render_row(state.storage.as_ref(), expires_in, row).await?),
            }))
        }
        PredictionStatus::Failed | PredictionStatus::Canceled => {
            state.video_jobs.finish(&prediction_id).await;
            warn!("Video {} for user {} ended as {:?}", prediction_id, user.id, prediction.status);
            Err(ProviderError::PredictionFailed(prediction.error_message()).into())
        }
        _ => Ok(HttpResponse::Ok().json(VideoStatus {
            prediction_id,
            status: PredictionStatus::Processing,
            video: None,
        })),
    }
}
