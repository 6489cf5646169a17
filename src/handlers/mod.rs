//! HTTP routes for the studio server.

pub mod generate;
pub mod images;
pub mod media;
pub mod text;
pub mod video;

use actix_web::web;

use crate::health_check;

/// Registers every route. Shared by `main` and the integration tests.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(health_check))
        .service(
            web::scope("/api/images")
                .route("/explore", web::get().to(images::explore))
                .route("/liked-today", web::get().to(images::liked_today))
                .route("/featured", web::get().to(images::featured_images))
                .route("/my-images", web::get().to(images::my_images))
                .route("/video-limit", web::get().to(video::video_limit))
                .route("/generate-video", web::post().to(video::generate_video))
                .route("/video-status/{id}", web::get().to(video::video_status))
                .route("/{id}/like", web::post().to(images::like))
                .route("/{id}/like", web::delete().to(images::unlike)),
        )
        .route("/api/videos/featured", web::get().to(images::featured_videos))
        .route("/api/media/{key:.*}", web::get().to(media::get_media))
        .route("/generate-image", web::post().to(generate::generate_image))
        .route("/enhance-image", web::post().to(text::enhance_image))
        .route("/rewrite-tweet", web::post().to(text::rewrite_tweet))
        .route("/analyze-tweet", web::post().to(text::analyze_tweet));
}
