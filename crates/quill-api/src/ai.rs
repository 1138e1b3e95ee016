//! AI-assisted drafting.
//!
//! The model sits behind [`TextGenerator`] so handlers never see the HTTP
//! details. The external call always finishes before the store is touched:
//! a failed generation leaves nothing behind.

use std::time::Duration;

use anyhow::{Context, Result, anyhow, bail};
use axum::{Extension, Json, extract::State, http::StatusCode, response::IntoResponse};
use futures_util::future::BoxFuture;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use quill_db::models::NewPost;
use quill_types::api::{GenerateDraftRequest, SuggestTagsRequest, SuggestTagsResponse};
use quill_types::models::PostStatus;

use crate::error::{ApiError, ApiJson, ApiResult};
use crate::middleware::Session;
use crate::state::{AppState, run_db};
use crate::views;

const MAX_SUGGESTED_TAGS: usize = 5;

/// Returns generated text for a prompt.
pub trait TextGenerator: Send + Sync {
    fn generate<'a>(&'a self, prompt: &'a str) -> BoxFuture<'a, Result<String>>;
}

/// Used when no API key is configured. Every call fails.
pub struct DisabledGenerator;

impl TextGenerator for DisabledGenerator {
    fn generate<'a>(&'a self, _prompt: &'a str) -> BoxFuture<'a, Result<String>> {
        Box::pin(async { Err(anyhow!("AI generation is not configured")) })
    }
}

#[derive(Debug, Clone)]
pub struct GeminiSettings {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub timeout: Duration,
}

/// Google Generative Language `generateContent` client.
pub struct GeminiGenerator {
    http: reqwest::Client,
    endpoint: String,
    api_key: String,
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    contents: [Content<'a>; 1],
}

#[derive(Serialize)]
struct Content<'a> {
    parts: [Part<'a>; 1],
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

impl GeminiGenerator {
    pub fn new(settings: GeminiSettings) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(settings.timeout)
            .build()
            .context("Failed to build AI HTTP client")?;
        let endpoint = format!(
            "{}/models/{}:generateContent",
            settings.base_url.trim_end_matches('/'),
            settings.model
        );
        Ok(Self {
            http,
            endpoint,
            api_key: settings.api_key,
        })
    }

    async fn call(&self, prompt: &str) -> Result<String> {
        let body = GenerateRequest {
            contents: [Content {
                parts: [Part { text: prompt }],
            }],
        };

        let response = self
            .http
            .post(&self.endpoint)
            .header("X-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .context("AI request failed")?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            bail!("AI service returned {}: {}", status, detail);
        }

        let parsed: GenerateResponse = response.json().await.context("Malformed AI response")?;
        first_text(parsed).ok_or_else(|| anyhow!("AI response contained no text"))
    }
}

impl TextGenerator for GeminiGenerator {
    fn generate<'a>(&'a self, prompt: &'a str) -> BoxFuture<'a, Result<String>> {
        Box::pin(self.call(prompt))
    }
}

fn first_text(response: GenerateResponse) -> Option<String> {
    response
        .candidates
        .into_iter()
        .next()?
        .content?
        .parts
        .into_iter()
        .next()?
        .text
}

pub fn draft_prompt(topic: &str) -> String {
    format!("Write a detailed blog post on \"{}\" in 100-250 words.", topic)
}

pub fn tags_prompt(content: &str) -> String {
    format!("Suggest 3-5 tags for this blog post content: \"{}\"", content)
}

/// Turn a free-form model reply into at most five clean tags.
pub fn parse_tag_suggestions(reply: &str) -> Vec<String> {
    let mut tags: Vec<String> = Vec::new();
    for raw in reply.split([',', '\n']) {
        let tag = strip_list_marker(raw.trim())
            .trim_start_matches('#')
            .trim()
            .trim_matches(|c| c == '"' || c == '*' || c == '`')
            .trim();
        if tag.is_empty() {
            continue;
        }
        let lowered = tag.to_lowercase();
        if tags.iter().any(|t| t.to_lowercase() == lowered) {
            continue;
        }
        tags.push(tag.to_string());
        if tags.len() == MAX_SUGGESTED_TAGS {
            break;
        }
    }
    tags
}

/// "- x", "* x", "1. x", "2) x" -> "x"
fn strip_list_marker(s: &str) -> &str {
    if let Some(rest) = s.strip_prefix("- ").or_else(|| s.strip_prefix("* ")) {
        return rest;
    }
    let digits = s.chars().take_while(|c| c.is_ascii_digit()).count();
    if digits > 0 {
        let rest = &s[digits..];
        if let Some(rest) = rest.strip_prefix('.').or_else(|| rest.strip_prefix(')')) {
            return rest;
        }
    }
    s
}

pub async fn generate_post(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    ApiJson(req): ApiJson<GenerateDraftRequest>,
) -> ApiResult<impl IntoResponse> {
    let topic = req.topic.trim().to_string();
    if topic.is_empty() {
        return Err(ApiError::BadRequest("Topic is required".into()));
    }

    let content = state
        .ai
        .generate(&draft_prompt(&topic))
        .await
        .map_err(|e| ApiError::internal("AI post generation failed", e))?;

    let post = NewPost {
        id: Uuid::new_v4().to_string(),
        author_id: session.user_id.to_string(),
        title: topic,
        content,
        tags: Vec::new(),
        cover_image: None,
        status: PostStatus::Draft,
    };
    let created = run_db(&state, move |db| {
        db.create_post(&post)?;
        db.get_post(&post.id)
    })
    .await?
    .ok_or_else(|| ApiError::internal("AI post generation failed", anyhow!("draft vanished")))?;

    info!("Generated draft {} for {}", created.id, session.user_id);
    Ok((StatusCode::CREATED, Json(views::post(created))))
}

pub async fn suggest_tags(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<SuggestTagsRequest>,
) -> ApiResult<Json<SuggestTagsResponse>> {
    let content = req.content.trim();
    if content.is_empty() {
        return Err(ApiError::BadRequest("Content is required".into()));
    }

    let reply = state
        .ai
        .generate(&tags_prompt(content))
        .await
        .map_err(|e| ApiError::internal("AI tag suggestion failed", e))?;

    Ok(Json(SuggestTagsResponse {
        tags: parse_tag_suggestions(&reply),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn suggestions_are_cleaned_deduped_and_capped() {
        let reply = "#Rust, rust , Systems\n- Async\n1. Tokio\n\n2) Web, Extra, More";
        assert_eq!(
            parse_tag_suggestions(reply),
            vec!["Rust", "Systems", "Async", "Tokio", "Web"]
        );
    }

    #[test]
    fn empty_reply_yields_no_tags() {
        assert!(parse_tag_suggestions(" , \n ,").is_empty());
    }

    #[test]
    fn numbers_that_are_not_markers_survive() {
        assert_eq!(parse_tag_suggestions("2024, web3"), vec!["2024", "web3"]);
    }

    #[test]
    fn prompts_embed_their_input() {
        assert_eq!(
            draft_prompt("Ownership"),
            "Write a detailed blog post on \"Ownership\" in 100-250 words."
        );
        assert_eq!(
            tags_prompt("about borrowck"),
            "Suggest 3-5 tags for this blog post content: \"about borrowck\""
        );
    }

    #[test]
    fn extracts_first_candidate_text() {
        let body = r#"{"candidates":[{"content":{"parts":[{"text":"hello"}],"role":"model"}}]}"#;
        let parsed: GenerateResponse = serde_json::from_str(body).unwrap();
        assert_eq!(first_text(parsed).as_deref(), Some("hello"));

        let empty: GenerateResponse = serde_json::from_str(r#"{"promptFeedback":{}}"#).unwrap();
        assert_eq!(first_text(empty), None);
    }

    #[tokio::test]
    async fn disabled_generator_always_fails() {
        assert!(DisabledGenerator.generate("anything").await.is_err());
    }

    #[test]
    fn endpoint_is_built_from_base_and_model() {
        let generator = GeminiGenerator::new(GeminiSettings {
            api_key: "k".into(),
            base_url: "https://example.test/v1beta/".into(),
            model: "gemini-2.0-flash".into(),
            timeout: Duration::from_secs(5),
        })
        .unwrap();
        assert_eq!(
            generator.endpoint,
            "https://example.test/v1beta/models/gemini-2.0-flash:generateContent"
        );
    }
}
