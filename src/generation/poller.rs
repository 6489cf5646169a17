use rand::Rng;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use crate::config::ProvidersConfig;
use crate::error::ProviderError;
use crate::proxy::{Prediction, PredictionStatus, ReplicateClient};

#[derive(Debug, Clone)]
pub struct PollPolicy {
    pub initial_interval: Duration,
    pub max_interval: Duration,
    pub multiplier: f64,
    /// Fraction of the interval added at random, `0.0..=1.0`.
    pub jitter: f64,
    /// `None` polls until the prediction settles, however long that takes.
    pub timeout: Option<Duration>,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            initial_interval: Duration::from_millis(1000),
            max_interval: Duration::from_millis(2000),
            multiplier: 1.5,
            jitter: 0.1,
            timeout: Some(Duration::from_secs(900)),
        }
    }
}

impl PollPolicy {
    pub fn from_config(config: &ProvidersConfig) -> Self {
        Self {
            initial_interval: Duration::from_millis(config.poll_interval_ms),
            max_interval: Duration::from_millis(config.poll_max_interval_ms.max(config.poll_interval_ms)),
            timeout: (config.poll_timeout_secs > 0).then(|| Duration::from_secs(config.poll_timeout_secs)),
            ..Self::default()
        }
    }

    fn next_interval(&self, current: Duration) -> Duration {
        current.mul_f64(self.multiplier).min(self.max_interval)
    }

    fn with_jitter(&self, interval: Duration) -> Duration {
        if self.jitter <= 0.0 {
            return interval;
        }
        let extra = rand::thread_rng().gen_range(0.0..=self.jitter);
        interval + interval.mul_f64(extra)
    }
}

/// Polls `id` until it succeeds, fails or the policy's timeout runs out.
///
/// A failed or canceled prediction becomes
/// [`ProviderError::PredictionFailed`] carrying the upstream message as-is.
/// Transport errors on a single poll are retried on the next tick.
pub async fn wait_for_prediction(
    client: &ReplicateClient,
    id: &str,
    policy: &PollPolicy,
) -> Result<Prediction, ProviderError> {
    let started = Instant::now();
    let mut interval = policy.initial_interval;
    let mut polls = 0u32;

    loop {
        polls += 1;
        match client.get_prediction(id).await {
            Ok(prediction) => match prediction.status {
                PredictionStatus::Succeeded => {
                    debug!("Prediction {} succeeded after {} polls", id, polls);
                    return Ok(prediction);
                }
                PredictionStatus::Failed | PredictionStatus::Canceled => {
                    warn!("Prediction {} ended as {:?}", id, prediction.status);
                    return Err(ProviderError::PredictionFailed(prediction.error_message()));
                }
                _ => {}
            },
            Err(ProviderError::RequestFailed(e)) => {
                warn!("Polling prediction {} failed, retrying: {}", id, e);
            }
            Err(e) => return Err(e),
        }

        let sleep_for = policy.with_jitter(interval);
        if let Some(timeout) = policy.timeout {
            if started.elapsed() + sleep_for > timeout {
                return Err(ProviderError::Timeout {
                    prediction_id: id.to_string(),
                    waited_secs: started.elapsed().as_secs(),
                });
            }
        }

        tokio::time::sleep(sleep_for).await;
        interval = policy.next_interval(interval);
    }
}
