use actix_web::{web, HttpResponse};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::auth::AuthenticatedUser;
use crate::error::AppError;
use crate::AppState;

const MAX_INPUT_CHARS: usize = 4000;

const ENHANCE_PROMPT: &str = "You improve prompts for an image generation model. \
Rewrite the user's prompt with concrete detail about subject, lighting, composition and style. \
Answer with the prompt only.";

const REWRITE_PROMPT: &str = "You rewrite tweets for more engagement. Keep the meaning, \
stay under 280 characters and answer with the rewritten tweet only.";

const ANALYZE_PROMPT: &str = "You review tweets before they are posted. Point out the hook, \
clarity problems and how the tweet could perform better. Be brief.";

#[derive(Debug, Deserialize)]
pub struct EnhanceRequest {
    pub prompt: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct EnhanceResponse {
    pub enhanced_prompt: String,
}

#[derive(Debug, Deserialize)]
pub struct RewriteRequest {
    pub tweet: String,
    pub tone: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RewriteResponse {
    pub rewritten: String,
}

#[derive(Debug, Deserialize)]
pub struct AnalyzeRequest {
    pub tweet: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AnalyzeResponse {
    pub analysis: String,
}

fn required<'a>(field: &str, value: &'a str) -> Result<&'a str, AppError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(AppError::ValidationError(format!("{} is required", field)));
    }
    if value.chars().count() > MAX_INPUT_CHARS {
        return Err(AppError::ValidationError(format!("{} is too long", field)));
    }
    Ok(value)
}

pub async fn enhance_image(
    user: AuthenticatedUser,
    req: web::Json<EnhanceRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let prompt = required("prompt", &req.prompt)?;
    let enhanced_prompt = state.openai.chat(ENHANCE_PROMPT, prompt).await?;
    info!("Enhanced prompt for user {}", user.id);

    Ok(HttpResponse::Ok().json(EnhanceResponse { enhanced_prompt }))
}

pub async fn rewrite_tweet(
    user: AuthenticatedUser,
    req: web::Json<RewriteRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let tweet = required("tweet", &req.tweet)?;
    let message = match req.tone.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
        Some(tone) => format!("Tone: {}\n\n{}", tone, tweet),
        None => tweet.to_string(),
    };

    let rewritten = state.openai.chat(REWRITE_PROMPT, &message).await?;
    info!("Rewrote tweet for user {}", user.id);

    Ok(HttpResponse::Ok().json(RewriteResponse { rewritten }))
}

pub async fn analyze_tweet(
    user: AuthenticatedUser,
    req: web::Json<AnalyzeRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let tweet = required("tweet", &req.tweet)?;
    let analysis = state.openai.chat(ANALYZE_PROMPT, tweet).await?;
    info!("Analyzed tweet for user {}", user.id);

    Ok(HttpResponse::Ok().json(AnalyzeResponse { analysis }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_required_trims_and_rejects_blank() {
        assert_eq!(required("tweet", "  gm  ").unwrap(), "gm");
        assert!(matches!(required("tweet", "   "), Err(AppError::ValidationError(_))));
        assert!(required("tweet", &"a".repeat(MAX_INPUT_CHARS + 1)).is_err());
    }
}
