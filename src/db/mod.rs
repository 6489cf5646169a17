//! Database module for the studio server
//!
//! Postgres access for generated images, likes and the featured lists.
//! The schema lives in `migrations/`.

pub mod models;
pub mod operations;

pub use models::{DeletedMedia, GalleryRow, GeneratedImage, ImageLike, ImageView, NewGeneratedImage};
pub use operations::{DbOperations, DbPoolStatus};
