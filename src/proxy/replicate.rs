use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info};

use super::upstream_error;
use crate::error::ProviderError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PredictionStatus {
    Starting,
    Processing,
    Succeeded,
    Failed,
    Canceled,
    #[serde(other)]
    Unknown,
}

impl PredictionStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::Canceled)
    }
}

/// One asynchronous Replicate job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Prediction {
    pub id: String,
    pub status: PredictionStatus,
    #[serde(default)]
    pub input: Value,
    #[serde(default)]
    pub output: Option<Value>,
    #[serde(default)]
    pub error: Option<Value>,
}

impl Prediction {
    /// Models answer with either a single URL or a list of them.
    pub fn output_url(&self) -> Option<&str> {
        match self.output.as_ref()? {
            Value::String(url) => Some(url.as_str()),
            Value::Array(items) => items.iter().find_map(Value::as_str),
            _ => None,
        }
    }

    /// The upstream failure text as-is, or a fallback naming the status.
    pub fn error_message(&self) -> String {
        match &self.error {
            Some(Value::String(message)) if !message.is_empty() => message.clone(),
            Some(Value::Null) | None => match self.status {
                PredictionStatus::Canceled => "Prediction was canceled".to_string(),
                _ => "Prediction failed".to_string(),
            },
            Some(other) => other.to_string(),
        }
    }
}

pub struct ReplicateClient {
    http: reqwest::Client,
    base_url: String,
    api_token: String,
}

impl ReplicateClient {
    pub fn new(http: reqwest::Client, base_url: impl Into<String>, api_token: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_token: api_token.into(),
        }
    }

    /// `owner/name` runs the model's latest version; `owner/name:version`
    /// pins one.
    pub async fn create_prediction(&self, model: &str, input: Value) -> Result<Prediction, ProviderError> {
        let request = match model.split_once(':') {
            Some((_, version)) => self
                .http
                .post(format!("{}/v1/predictions", self.base_url))
                .json(&json!({ "version": version, "input": input })),
            None => self
                .http
                .post(format!("{}/v1/models/{}/predictions", self.base_url, model))
                .json(&json!({ "input": input })),
        };

        let response = request.bearer_auth(&self.api_token).send().await?;
        let prediction = Self::parse(response).await?;
        info!("Submitted prediction {} for model {}", prediction.id, model);
        Ok(prediction)
    }

    pub async fn get_prediction(&self, id: &str) -> Result<Prediction, ProviderError> {
        let response = self
            .http
            .get(format!("{}/v1/predictions/{}", self.base_url, id))
            .bearer_auth(&self.api_token)
            .send()
            .await?;

        let prediction = Self::parse(response).await?;
        debug!("Prediction {} is {:?}", prediction.id, prediction.status);
        Ok(prediction)
    }

    async fn parse(response: reqwest::Response) -> Result<Prediction, ProviderError> {
        if !response.status().is_success() {
            return Err(upstream_error(response).await);
        }
        Ok(response.json::<Prediction>().await?)
    }
}
