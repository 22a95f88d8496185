//! AI responder gateway.
//!
//! The relay treats the AI call as an opaque async function with its own
//! latency and failure modes. `respond` is infallible by construction: every
//! failure class maps to a deterministic, user-readable fallback string, so
//! the hub can always append some `ai` message and the transcript never ends
//! up in a dangling state.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;

const OPENAI_API_URL: &str = "https://api.openai.com/v1/chat/completions";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

const SYSTEM_PROMPT: &str = "You are a helpful AI assistant that provides clear, concise answers \
    about screen content and general computing questions. Keep responses under 150 words and be \
    practical and actionable.";

pub const FALLBACK_GENERIC: &str =
    "I'm having trouble connecting to the AI service right now. Please try your question again in a moment.";
pub const FALLBACK_QUOTA: &str =
    "I'm temporarily unable to respond due to API quota limits. Please try again later.";
pub const FALLBACK_AUTH: &str =
    "There's an issue with the AI service configuration. Please contact support.";
pub const FALLBACK_EMPTY: &str =
    "I apologize, but I couldn't generate a response. Please try asking your question again.";

/// Answers a chat question, optionally grounded in a description of the
/// shared screen. Single attempt, bounded by the client timeout.
#[async_trait]
pub trait Responder: Send + Sync {
    async fn respond(&self, question: &str, screen_context: Option<&str>) -> String;
}

#[derive(Debug)]
enum ResponderError {
    Http(reqwest::Error),
    Api { status: u16, body: String },
    Malformed,
}

fn fallback_for(err: &ResponderError) -> &'static str {
    match err {
        ResponderError::Api { status, body } => {
            if *status == 429 || body.contains("insufficient_quota") {
                FALLBACK_QUOTA
            } else if *status == 401 || body.contains("invalid_api_key") {
                FALLBACK_AUTH
            } else {
                FALLBACK_GENERIC
            }
        }
        ResponderError::Malformed => FALLBACK_EMPTY,
        ResponderError::Http(_) => FALLBACK_GENERIC,
    }
}

// ---------------------------------------------------------------------------
// OpenAI-backed implementation
// ---------------------------------------------------------------------------

pub struct OpenAiResponder {
    http: reqwest::Client,
    api_key: String,
    model: String,
}

impl OpenAiResponder {
    pub fn new(api_key: String, model: String) -> Self {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .expect("reqwest client");
        Self {
            http,
            api_key,
            model,
        }
    }

    async fn request(
        &self,
        question: &str,
        screen_context: Option<&str>,
    ) -> Result<String, ResponderError> {
        let prompt = match screen_context {
            Some(context) => format!(
                "Based on the screen content showing: {context}, please answer this question: {question}"
            ),
            None => format!(
                "You are an AI assistant helping users understand what they see on their laptop \
                 screen. Answer this question helpfully and concisely: {question}"
            ),
        };

        let body = json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": SYSTEM_PROMPT },
                { "role": "user", "content": prompt },
            ],
            "max_tokens": 200,
            "temperature": 0.7,
        });

        let response = self
            .http
            .post(OPENAI_API_URL)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(ResponderError::Http)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ResponderError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let value: serde_json::Value = response.json().await.map_err(ResponderError::Http)?;
        value["choices"][0]["message"]["content"]
            .as_str()
            .map(str::trim)
            .filter(|answer| !answer.is_empty())
            .map(str::to_string)
            .ok_or(ResponderError::Malformed)
    }
}

#[async_trait]
impl Responder for OpenAiResponder {
    async fn respond(&self, question: &str, screen_context: Option<&str>) -> String {
        match self.request(question, screen_context).await {
            Ok(answer) => answer,
            Err(err) => {
                tracing::warn!(?err, "AI responder call failed, using fallback reply");
                fallback_for(&err).to_string()
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Fallback-only implementation (no API key configured)
// ---------------------------------------------------------------------------

pub struct FallbackResponder;

#[async_trait]
impl Responder for FallbackResponder {
    async fn respond(&self, _question: &str, _screen_context: Option<&str>) -> String {
        FALLBACK_GENERIC.to_string()
    }
}
