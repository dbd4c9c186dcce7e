use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use tracing::{info, warn};

use crate::error::ServiceError;
use crate::extract::PageImage;

const API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";
const BODY_PREVIEW_CHARS: usize = 500;
const PROBE_PROMPT: &str = "Test";

/// One element of a grading prompt, in the order it is sent to the model.
#[derive(Debug, Clone)]
pub enum PromptPart {
    Text(String),
    InlineImage { mime: &'static str, bytes: Vec<u8> },
}

impl From<&PageImage> for PromptPart {
    fn from(page: &PageImage) -> Self {
        PromptPart::InlineImage {
            mime: page.mime,
            bytes: page.bytes.clone(),
        }
    }
}

/// Client for the hosted `generateContent` endpoint.
///
/// Calls are single-shot: no retry, no client-imposed timeout. Callers that
/// need a deadline should wrap [`GeminiClient::generate`] themselves.
#[derive(Clone)]
pub struct GeminiClient {
    http: Client,
    api_key: String,
    model: String,
}

impl GeminiClient {
    /// Builds a client pinned to a known model, without probing.
    pub fn with_model(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            api_key: api_key.into(),
            model: model.into(),
        }
    }

    /// Probes the candidate models in order and keeps the first one that
    /// answers a trivial request. When every candidate fails, the returned
    /// error carries each per-candidate failure message.
    pub async fn connect(api_key: &str, candidates: &[String]) -> Result<Self, ServiceError> {
        let mut attempts = Vec::new();

        for model in candidates {
            let client = Self::with_model(api_key, model);
            match client
                .generate(&[PromptPart::Text(PROBE_PROMPT.to_string())])
                .await
            {
                Ok(_) => {
                    info!(%model, "model probe succeeded");
                    return Ok(client);
                }
                Err(err) => {
                    warn!(%model, %err, "model probe failed");
                    attempts.push((model.clone(), err.to_string()));
                }
            }
        }

        Err(ServiceError::NoModelAvailable(attempts))
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Sends an ordered sequence of text and image parts, returning the
    /// model's raw reply text.
    pub async fn generate(&self, parts: &[PromptPart]) -> Result<String, ServiceError> {
        let payload = json!({
            "contents": [{
                "parts": parts.iter().map(part_to_json).collect::<Vec<_>>(),
            }],
        });

        let url = format!("{API_BASE}/{}:generateContent", self.model);
        let response = self
            .http
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(ServiceError::Api {
                status: status.as_u16(),
                body: preview(&body),
            });
        }

        let payload: GenerateContentPayload =
            serde_json::from_str(&body).map_err(|_| ServiceError::Api {
                status: status.as_u16(),
                body: preview(&body),
            })?;

        extract_reply_text(payload).ok_or(ServiceError::EmptyReply)
    }
}

fn part_to_json(part: &PromptPart) -> serde_json::Value {
    match part {
        PromptPart::Text(text) => json!({ "text": text }),
        PromptPart::InlineImage { mime, bytes } => json!({
            "inline_data": {
                "mime_type": mime,
                "data": BASE64.encode(bytes),
            },
        }),
    }
}

fn extract_reply_text(payload: GenerateContentPayload) -> Option<String> {
    let text: String = payload
        .candidates
        .into_iter()
        .next()?
        .content
        .parts
        .into_iter()
        .filter_map(|part| part.text)
        .collect();

    if text.trim().is_empty() { None } else { Some(text) }
}

fn preview(body: &str) -> String {
    body.chars().take(BODY_PREVIEW_CHARS).collect()
}

#[derive(Debug, Deserialize)]
struct GenerateContentPayload {
    #[serde(default)]
    candidates: Vec<ReplyCandidate>,
}

#[derive(Debug, Deserialize)]
struct ReplyCandidate {
    content: ReplyContent,
}

#[derive(Debug, Deserialize)]
struct ReplyContent {
    #[serde(default)]
    parts: Vec<ReplyPart>,
}

#[derive(Debug, Deserialize)]
struct ReplyPart {
    #[serde(default)]
    text: Option<String>,
}
