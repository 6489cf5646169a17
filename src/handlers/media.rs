use actix_web::{http::StatusCode, web, HttpResponse};
use tracing::debug;
use url::Url;

use crate::error::AppError;
use crate::media_cache::{MediaSource, CACHED_TIME_HEADER};
use crate::storage;
use crate::AppState;

/// Serves a stored object through the media cache.
pub async fn get_media(path: web::Path<String>, state: web::Data<AppState>) -> Result<HttpResponse, AppError> {
    let key = path.into_inner();
    if !storage::is_valid_key(&key) {
        return Err(AppError::ValidationError(format!("invalid media key {}", key)));
    }

    let signed = state
        .storage
        .presigned_url(&key, state.config.storage.presign_expiry())
        .await?;
    let url = Url::parse(&signed).map_err(|e| AppError::InternalError(format!("bad presigned url: {}", e)))?;

    let media = state.media_cache.fetch(&url).await;
    debug!("Media {} served from {:?}", key, media.source);

    let status = StatusCode::from_u16(media.status).unwrap_or(StatusCode::BAD_GATEWAY);
    let mut response = HttpResponse::build(status);
    if let Some(content_type) = &media.content_type {
        response.content_type(content_type.as_str());
    }
    if let Some(cached_time) = media.cached_time_header() {
        response.insert_header((CACHED_TIME_HEADER, cached_time));
    }
    if media.source == MediaSource::Stale {
        response.insert_header(("warning", "110 - \"Response is Stale\""));
    }

    Ok(response.body(media.body))
}
