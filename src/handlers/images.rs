use actix_web::{web, HttpResponse};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::auth::AuthenticatedUser;
use crate::db::ImageView;
use crate::error::AppError;
use crate::gallery::render_rows;
use crate::AppState;

const MAX_PAGE_SIZE: i64 = 100;
const MAX_PAGE: i64 = 10_000;

#[derive(Debug, Deserialize)]
pub struct ExploreQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ExplorePage {
    pub images: Vec<ImageView>,
    pub page: i64,
    pub limit: i64,
    pub has_more: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LikeResponse {
    pub image_id: i32,
    pub liked: bool,
}

async fn render(state: &AppState, rows: Vec<crate::db::GalleryRow>) -> Result<Vec<ImageView>, AppError> {
    render_rows(state.storage.as_ref(), state.config.storage.presign_expiry(), rows).await
}

pub async fn explore(
    query: web::Query<ExploreQuery>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let page = query.page.unwrap_or(1).max(1);
    if page > MAX_PAGE {
        return Err(AppError::ValidationError(format!("page must be at most {}", MAX_PAGE)));
    }
    let limit = query
        .limit
        .unwrap_or(state.config.gallery.explore_page_size)
        .clamp(1, MAX_PAGE_SIZE);

    // one extra row tells us whether another page exists
    let mut rows = state.db.explore_images(limit + 1, (page - 1) * limit).await?;
    let has_more = rows.len() as i64 > limit;
    rows.truncate(limit as usize);

    let images = render(&state, rows).await?;
    Ok(HttpResponse::Ok().json(ExplorePage { images, page, limit, has_more }))
}

/// Images liked yesterday (UTC), topped up with random public ones.
pub async fn liked_today(state: web::Data<AppState>) -> Result<HttpResponse, AppError> {
    match state.liked_gallery.get().await {
        Ok(images) => Ok(HttpResponse::Ok().json(images.as_slice())),
        Err(e) => {
            error!("Failed to build liked gallery: {}", e);
            Err(e)
        }
    }
}

pub async fn featured_images(state: web::Data<AppState>) -> Result<HttpResponse, AppError> {
    let rows = state.db.featured_images().await?;
    Ok(HttpResponse::Ok().json(render(&state, rows).await?))
}

pub async fn featured_videos(state: web::Data<AppState>) -> Result<HttpResponse, AppError> {
    let rows = state.db.featured_videos().await?;
    Ok(HttpResponse::Ok().json(render(&state, rows).await?))
}

pub async fn my_images(user: AuthenticatedUser, state: web::Data<AppState>) -> Result<HttpResponse, AppError> {
    let rows = state.db.user_images(user.id).await?;
    Ok(HttpResponse::Ok().json(render(&state, rows).await?))
}

pub async fn like(
    user: AuthenticatedUser,
    path: web::Path<i32>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let image_id = path.into_inner();

    if state.db.get_visible_image(user.id, image_id).await?.is_none() {
        return Err(AppError::NotFound(format!("Image {}", image_id)));
    }

    if state.db.like_image(user.id, image_id).await?.is_some() {
        info!("User {} liked image {}", user.id, image_id);
    }

    Ok(HttpResponse::Ok().json(LikeResponse { image_id, liked: true }))
}

pub async fn unlike(
    user: AuthenticatedUser,
    path: web::Path<i32>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let image_id = path.into_inner();

    if state.db.unlike_image(user.id, image_id).await? {
        info!("User {} unliked image {}", user.id, image_id);
    }

    Ok(HttpResponse::Ok().json(LikeResponse { image_id, liked: false }))
}
