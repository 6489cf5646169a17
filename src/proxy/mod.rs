//! Proxy module for the studio server
//!
//! Thin clients for the upstream AI providers: Replicate for image and
//! video predictions, OpenAI for text.

mod openai;
mod replicate;

pub use openai::OpenAiClient;
pub use replicate::{Prediction, PredictionStatus, ReplicateClient};

use crate::error::ProviderError;

/// Turns a non-2xx upstream response into a [`ProviderError`], keeping the
/// provider's own message. Replicate puts it in `detail`, OpenAI in
/// `error.message`; anything else is passed through as raw text.
pub(crate) async fn upstream_error(response: reqwest::Response) -> ProviderError {
    let status = response.status().as_u16();
    let text = match response.text().await {
        Ok(text) => text,
        Err(e) => return ProviderError::RequestFailed(e.to_string()),
    };

    let message = serde_json::from_str::<serde_json::Value>(&text)
        .ok()
        .and_then(|body| {
            body.get("detail")
                .and_then(|d| d.as_str())
                .or_else(|| body.pointer("/error/message").and_then(|m| m.as_str()))
                .map(str::to_string)
        })
        .unwrap_or(text);

    ProviderError::ResponseError { status, message }
}
