use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;

/// What the status endpoint needs to finish a video once Replicate is done.
#[derive(Debug, Clone, PartialEq)]
pub struct VideoJob {
    pub user_id: i32,
    pub prompt: String,
    pub aspect_ratio: Option<String>,
    pub source_image_id: Option<i32>,
    pub is_private: bool,
    pub submitted_at: DateTime<Utc>,
}

/// Submitted video predictions that have not been persisted yet, keyed by
/// prediction id. Lost on restart, like the daily quota.
#[derive(Default)]
pub struct VideoJobs {
    jobs: RwLock<HashMap<String, VideoJob>>,
}

impl VideoJobs {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register(&self, prediction_id: &str, job: VideoJob) {
        self.jobs.write().await.insert(prediction_id.to_string(), job);
    }

    /// The job, only when it belongs to `user_id`.
    pub async fn get_for_user(&self, prediction_id: &str, user_id: i32) -> Option<VideoJob> {
        self.jobs
            .read()
            .await
            .get(prediction_id)
            .filter(|job| job.user_id == user_id)
            .cloned()
    }

    pub async fn finish(&self, prediction_id: &str) -> Option<VideoJob> {
        self.jobs.write().await.remove(prediction_id)
    }

    /// Forgets jobs nobody polled for `max_age`.
    pub async fn prune_older_than(&self, max_age: Duration, now: DateTime<Utc>) -> usize {
        let cutoff = now - max_age;
        let mut jobs = self.jobs.write().await;
        let before = jobs.len();
        jobs.retain(|_, job| job.submitted_at >= cutoff);
        before - jobs.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job(user_id: i32, submitted_at: DateTime<Utc>) -> VideoJob {
        VideoJob {
            user_id,
            prompt: "waves at dusk".into(),
            aspect_ratio: Some("16:9".into()),
            source_image_id: None,
            is_private: false,
            submitted_at,
        }
    }

    #[tokio::test]
    async fn test_jobs_are_scoped_to_owner() {
        let jobs = VideoJobs::new();
        jobs.register("p1", job(1, Utc::now())).await;

        assert!(jobs.get_for_user("p1", 1).await.is_some());
        assert!(jobs.get_for_user("p1", 2).await.is_none());
        assert!(jobs.get_for_user("p2", 1).await.is_none());

        assert!(jobs.finish("p1").await.is_some());
        assert!(jobs.get_for_user("p1", 1).await.is_none());
    }

    #[tokio::test]
    async fn test_prune_drops_abandoned_jobs() {
        let jobs = VideoJobs::new();
        let now = Utc::now();
        jobs.register("old", job(1, now - Duration::hours(7))).await;
        jobs.register("new", job(1, now - Duration::minutes(5))).await;

        assert_eq!(jobs.prune_older_than(Duration::hours(6), now).await, 1);
        assert!(jobs.get_for_user("new", 1).await.is_some());
    }
}
