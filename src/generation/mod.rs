//! Media generation: driving Replicate predictions to completion and
//! moving their output into our own storage and database.

mod assets;
mod poller;
mod records;
mod video_jobs;

pub use assets::{persist_with_compensation, store_remote_asset, StoredAsset};
pub use poller::{wait_for_prediction, PollPolicy};
pub use records::MediaRecords;
pub use video_jobs::{VideoJob, VideoJobs};

pub const IMAGE_PREFIX: &str = "images";
pub const VIDEO_PREFIX: &str = "videos";
