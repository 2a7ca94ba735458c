use crate::domain::model::{Quality, ScorerVerdict};
use crate::domain::ports::Scorer;
use crate::utils::error::{ReviewError, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

const SYSTEM_PROMPT: &str = "You grade flashcard answers. Compare the learner's answer with the \
expected answer by meaning, not spelling or wording. Reply with only a JSON object: \
{\"quality\": <0-3>, \"confidence\": <0.0-1.0>, \"rationale\": \"<one sentence>\"}. \
Quality scale: 0 = wrong or blank, 1 = partially correct, 2 = correct with minor gaps, \
3 = fully correct.";

#[derive(Debug, Clone)]
pub struct ScorerConfig {
    pub endpoint: String,
    pub api_key: Option<String>,
    pub model: String,
    pub timeout: Duration,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct GradePayload {
    quality: i64,
    confidence: Option<f64>,
    #[serde(default)]
    rationale: String,
}

/// Grades answers through an OpenAI-compatible chat completions endpoint.
pub struct HttpScorer {
    config: ScorerConfig,
    client: Client,
}

impl HttpScorer {
    /// Fails when the HTTP client cannot be built with the configured timeout.
    pub fn new(config: ScorerConfig) -> Result<Self> {
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self { config, client })
    }

    /// 需要 API key 才視為可用
    pub fn is_available(&self) -> bool {
        self.config
            .api_key
            .as_deref()
            .is_some_and(|key| !key.trim().is_empty())
            && !self.config.endpoint.trim().is_empty()
    }

    fn completions_url(&self) -> String {
        format!(
            "{}/chat/completions",
            self.config.endpoint.trim_end_matches('/')
        )
    }

    async fn request_grade(&self, expected: &str, given: &str) -> Result<String> {
        let api_key = self
            .config
            .api_key
            .as_deref()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| unavailable("no API key configured"))?;

        let messages = [
            ChatMessage {
                role: "system".to_string(),
                content: SYSTEM_PROMPT.to_string(),
            },
            ChatMessage {
                role: "user".to_string(),
                content: format!("Expected answer: {}\nLearner answer: {}", expected, given),
            },
        ];
        let payload = serde_json::json!({
            "model": self.config.model,
            "messages": messages,
            "temperature": 0,
            "stream": false
        });

        let url = self.completions_url();
        tracing::debug!("Requesting grade from {}", url);

        let response = self
            .client
            .post(&url)
            .bearer_auth(api_key)
            .json(&payload)
            .send()
            .await
            .map_err(|e| unavailable(format!("request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(unavailable(format!("HTTP {}: {}", status, body)));
        }

        let chat: ChatResponse = response
            .json()
            .await
            .map_err(|e| unavailable(format!("invalid response body: {}", e)))?;

        chat.choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| unavailable("empty choice list"))
    }
}

#[async_trait]
impl Scorer for HttpScorer {
    fn name(&self) -> &str {
        &self.config.model
    }

    async fn score(&self, expected: &str, given: &str) -> Result<ScorerVerdict> {
        let content = self.request_grade(expected, given).await?;
        parse_verdict(&content)
    }
}

/// Pulls the grade object out of the model's reply, tolerating code fences
/// or prose around it.
fn parse_verdict(content: &str) -> Result<ScorerVerdict> {
    let start = content.find('{');
    let end = content.rfind('}');
    let json = match (start, end) {
        (Some(start), Some(end)) if start < end => &content[start..=end],
        _ => return Err(unavailable(format!("no JSON object in reply: {}", content))),
    };

    let payload: GradePayload = serde_json::from_str(json)
        .map_err(|e| unavailable(format!("unparsable grade: {}", e)))?;
    let quality = Quality::try_from(payload.quality)
        .map_err(|_| unavailable(format!("quality {} out of range", payload.quality)))?;

    Ok(ScorerVerdict {
        quality,
        confidence: payload.confidence.unwrap_or(0.5).clamp(0.0, 1.0),
        rationale: payload.rationale,
    })
}

fn unavailable(message: impl Into<String>) -> ReviewError {
    ReviewError::ExternalScorerUnavailable {
        message: message.into(),
    }
}
