use actix_web::{web, HttpResponse};
use serde::Deserialize;
use serde_json::json;
use tracing::{error, info};

use crate::auth::AuthenticatedUser;
use crate::db::{GalleryRow, NewGeneratedImage};
use crate::error::{AppError, ProviderError};
use crate::gallery::render_row;
use crate::generation::{persist_with_compensation, store_remote_asset, wait_for_prediction, IMAGE_PREFIX};
use crate::proxy::PredictionStatus;
use crate::AppState;

const ASPECT_RATIOS: &[&str] = &["1:1", "16:9", "9:16", "4:3", "3:4", "21:9", "9:21"];

#[derive(Debug, Deserialize)]
pub struct GenerateImageRequest {
    pub prompt: String,
    pub aspect_ratio: Option<String>,
    #[serde(default)]
    pub is_private: bool,
}

/// Runs an image prediction to completion inside the request, then stores
/// the result and answers with the new gallery entry.
pub async fn generate_image(
    user: AuthenticatedUser,
    req: web::Json<GenerateImageRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let req = req.into_inner();
    let prompt = req.prompt.trim().to_string();
    if prompt.is_empty() {
        return Err(AppError::ValidationError("prompt is required".into()));
    }

    let aspect_ratio = req.aspect_ratio.unwrap_or_else(|| "1:1".to_string());
    if !ASPECT_RATIOS.contains(&aspect_ratio.as_str()) {
        return Err(AppError::ValidationError(format!("unsupported aspect ratio {}", aspect_ratio)));
    }

    let submitted = state
        .replicate
        .create_prediction(
            &state.config.providers.image_model,
            json!({ "prompt": prompt, "aspect_ratio": aspect_ratio }),
        )
        .await?;

    let prediction = if submitted.status.is_terminal() {
        submitted
    } else {
        wait_for_prediction(&state.replicate, &submitted.id, &state.poll_policy)
            .await
            .map_err(|e| {
                error!("Image prediction {} for user {} did not finish: {}", submitted.id, user.id, e);
                e
            })?
    };

    if prediction.status != PredictionStatus::Succeeded {
        return Err(ProviderError::PredictionFailed(prediction.error_message()).into());
    }

    let output_url = prediction.output_url().ok_or(ProviderError::MissingOutput)?.to_string();
    let asset = store_remote_asset(&state.http, state.storage.as_ref(), IMAGE_PREFIX, &output_url).await?;

    let new_image = NewGeneratedImage {
        user_id: user.id,
        prompt,
        image_url: output_url,
        s3_key: Some(asset.key.clone()),
        video_key: None,
        prediction_id: Some(prediction.id.clone()),
        aspect_ratio: Some(aspect_ratio),
        is_private: req.is_private,
    };

    let image = persist_with_compensation(state.storage.as_ref(), &asset, || async {
        state
            .records
            .insert_media(&new_image)
            .await?
            .ok_or_else(|| AppError::InternalError(format!("prediction {} already stored", prediction.id)))
    })
    .await?;

    info!("Image {} generated for user {}", image.id, user.id);

    let view = render_row(
        state.storage.as_ref(),
        state.config.storage.presign_expiry(),
        GalleryRow { image, like_count: 0 },
    )
    .await?;

    Ok(HttpResponse::Created().json(view))
}
