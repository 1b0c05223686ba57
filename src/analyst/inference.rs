use super::error::{AnalystError, Result};
use crate::shared::config::InferenceConfig;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::{debug, info};

const COMPLETIONS_PATH: &str = "/v1/chat/completions";

/// A text-completion service: one system instruction, one user prompt, one
/// reply. Implementations make exactly one request per call and never retry.
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    async fn complete(&self, system_instructions: &str, user_prompt: &str) -> Result<String>;
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatMessage {
    pub role: &'static str,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: &str) -> Self {
        Self {
            role: "system",
            content: content.to_string(),
        }
    }

    pub fn user(content: &str) -> Self {
        Self {
            role: "user",
            content: content.to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

pub struct CompletionClient {
    client: Client,
    endpoint: String,
    auth_header: Option<String>,
    model: String,
    temperature: f32,
    timeout: Duration,
    log_seq: AtomicU64,
}

impl CompletionClient {
    pub fn new(config: &InferenceConfig) -> Result<Self> {
        let base = config
            .url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
            .ok_or_else(|| {
                AnalystError::Configuration("inference base URL is not configured".to_string())
            })?;

        let endpoint = format!("{}{}", base.trim_end_matches('/'), COMPLETIONS_PATH);
        url::Url::parse(&endpoint).map_err(|e| {
            AnalystError::Configuration(format!("invalid inference URL '{}': {}", base, e))
        })?;

        if config.timeout_secs == 0 {
            return Err(AnalystError::Configuration(
                "inference timeout must be positive".to_string(),
            ));
        }

        let client = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| {
                AnalystError::Configuration(format!("failed to create inference client: {}", e))
            })?;

        let auth_header = config
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
            .map(|key| format!("Bearer {}", key));

        info!(endpoint = %endpoint, model = %config.model, "Completion client ready");

        Ok(Self {
            client,
            endpoint,
            auth_header,
            model: config.model.clone(),
            temperature: config.temperature,
            timeout: config.timeout(),
            log_seq: AtomicU64::new(0),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl CompletionBackend for CompletionClient {
    async fn complete(&self, system_instructions: &str, user_prompt: &str) -> Result<String> {
        if system_instructions.trim().is_empty() || user_prompt.trim().is_empty() {
            return Err(AnalystError::InvalidRequest(
                "completion requires non-empty system and user messages".to_string(),
            ));
        }

        let body = ChatCompletionRequest {
            model: &self.model,
            messages: vec![
                ChatMessage::system(system_instructions),
                ChatMessage::user(user_prompt),
            ],
            temperature: self.temperature,
        };

        let seq = self.log_seq.fetch_add(1, Ordering::SeqCst) + 1;
        debug!(
            seq,
            prompt_chars = user_prompt.len(),
            "Sending completion request"
        );

        let mut request = self
            .client
            .post(&self.endpoint)
            .timeout(self.timeout)
            .json(&body);
        if let Some(header) = &self.auth_header {
            request = request.header("Authorization", header);
        }

        let resp = request
            .send()
            .await
            .map_err(|e| AnalystError::Upstream(format!("inference request failed: {}", e)))?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp
                .text()
                .await
                .unwrap_or_else(|_| "<failed to read response>".to_string());
            return Err(AnalystError::Upstream(format!(
                "Inference service error ({}): {}",
                status, text
            )));
        }

        let response_text = resp.text().await.map_err(|e| {
            AnalystError::Upstream(format!("failed to read response text: {}", e))
        })?;
        debug!(seq, response_chars = response_text.len(), "Received completion");

        parse_completion(&response_text)
    }
}

fn parse_completion(response_text: &str) -> Result<String> {
    let parsed: ChatCompletionResponse = serde_json::from_str(response_text).map_err(|e| {
        AnalystError::Upstream(format!("unparsable completion response: {}", e))
    })?;

    parsed
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .ok_or_else(|| {
            AnalystError::Upstream("completion response has no choices[0].message.content".into())
        })
}
