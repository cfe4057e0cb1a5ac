/// LLM Client: the single point of entry for all chat-completion calls.
///
/// ARCHITECTURAL RULE: No other module may call the completion API directly.
/// All LLM interactions MUST go through this module.
///
/// Transport lives behind `ChatBackend` so handlers and pipeline steps never see HTTP.
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::Config;

pub mod prompts;
pub mod structured;

pub use structured::parse_json_reply;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);
const MAX_RETRIES: u32 = 3;
pub const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-small";

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Rate limited after {retries} retries")]
    RateLimited { retries: u32 },

    #[error("LLM returned empty content")]
    EmptyContent,

    #[error("output still malformed after {attempts} attempts: {last_error}")]
    Malformed { attempts: u32, last_error: String },
}

/// Which configured model a call should use.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ModelTier {
    #[default]
    Standard,
    Advanced,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: content.into(),
        }
    }
}

/// Transport for the completion API. `complete` returns the text of the first choice;
/// `embed` returns one vector per input, in input order.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    async fn complete(&self, model: &str, messages: &[ChatMessage]) -> Result<String, LlmError>;

    async fn embed(&self, model: &str, inputs: &[String]) -> Result<Vec<Vec<f32>>, LlmError>;
}

// ────────────────────────────────────────────────────────────────────────────
// OpenAI-compatible HTTP backend
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    index: usize,
    embedding: Vec<f32>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorEnvelope {
    error: ApiErrorBody,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    message: String,
}

/// Client for the OpenAI API (or any compatible endpoint).
/// Retries on 429 (rate limit) and 5xx errors with exponential backoff.
pub struct OpenAiBackend {
    client: Client,
    api_key: String,
    base_url: String,
    organization_id: Option<String>,
    project_id: Option<String>,
}

impl OpenAiBackend {
    pub fn new(config: &Config) -> Result<Self> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("Failed to build LLM HTTP client")?;

        Ok(Self {
            client,
            api_key: config.openai_api_key.clone(),
            base_url: config.openai_base_url.trim_end_matches('/').to_string(),
            organization_id: config.openai_organization_id.clone(),
            project_id: config.openai_project_id.clone(),
        })
    }

    async fn post_json<B, R>(&self, path: &str, body: &B) -> Result<R, LlmError>
    where
        B: Serialize + Sync,
        R: DeserializeOwned,
    {
        let url = format!("{}{path}", self.base_url);
        let mut last_error: Option<LlmError> = None;

        for attempt in 0..MAX_RETRIES {
            if attempt > 0 {
                // Exponential backoff: 1s, 2s
                let delay = Duration::from_millis(1000 * (1 << (attempt - 1)));
                warn!(
                    "LLM call attempt {} failed, retrying after {}ms...",
                    attempt,
                    delay.as_millis()
                );
                tokio::time::sleep(delay).await;
            }

            let mut request = self.client.post(&url).bearer_auth(&self.api_key).json(body);
            if let Some(org) = &self.organization_id {
                request = request.header("OpenAI-Organization", org);
            }
            if let Some(project) = &self.project_id {
                request = request.header("OpenAI-Project", project);
            }

            let response = match request.send().await {
                Ok(r) => r,
                Err(e) => {
                    last_error = Some(LlmError::Http(e));
                    continue;
                }
            };

            let status = response.status();

            if status.as_u16() == 429 || status.is_server_error() {
                let body = response.text().await.unwrap_or_default();
                warn!("LLM API returned {}: {}", status, body);
                last_error = Some(LlmError::Api {
                    status: status.as_u16(),
                    message: body,
                });
                continue;
            }

            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                let message = serde_json::from_str::<ApiErrorEnvelope>(&body)
                    .map(|e| e.error.message)
                    .unwrap_or(body);
                return Err(LlmError::Api {
                    status: status.as_u16(),
                    message,
                });
            }

            return Ok(response.json().await?);
        }

        Err(last_error.unwrap_or(LlmError::RateLimited {
            retries: MAX_RETRIES,
        }))
    }
}

#[async_trait]
impl ChatBackend for OpenAiBackend {
    async fn complete(&self, model: &str, messages: &[ChatMessage]) -> Result<String, LlmError> {
        let request_body = ChatCompletionRequest {
            model,
            messages: adapt_messages_for_model(model, messages),
        };
        let completion: ChatCompletionResponse =
            self.post_json("/chat/completions", &request_body).await?;

        if let Some(usage) = &completion.usage {
            debug!(
                "LLM call succeeded: model={}, prompt_tokens={}, completion_tokens={}",
                model, usage.prompt_tokens, usage.completion_tokens
            );
        }

        completion
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|text| !text.trim().is_empty())
            .ok_or(LlmError::EmptyContent)
    }

    async fn embed(&self, model: &str, inputs: &[String]) -> Result<Vec<Vec<f32>>, LlmError> {
        let request_body = EmbeddingRequest { model, input: inputs };
        let response: EmbeddingResponse = self.post_json("/embeddings", &request_body).await?;

        if let Some(usage) = &response.usage {
            debug!(
                "Embedding call succeeded: model={}, inputs={}, prompt_tokens={}",
                model,
                inputs.len(),
                usage.prompt_tokens
            );
        }
        order_embeddings(response.data, inputs.len())
    }
}

/// The API may return embeddings out of order; every input must get exactly one.
fn order_embeddings(data: Vec<EmbeddingData>, expected: usize) -> Result<Vec<Vec<f32>>, LlmError> {
    let mut slots: Vec<Option<Vec<f32>>> = vec![None; expected];
    for item in data {
        if let Some(slot) = slots.get_mut(item.index) {
            *slot = Some(item.embedding);
        }
    }
    slots
        .into_iter()
        .collect::<Option<Vec<_>>>()
        .filter(|vectors| vectors.iter().all(|v| !v.is_empty()))
        .ok_or(LlmError::EmptyContent)
}

/// o1-family models reject the system role, so its text is folded into the first user turn.
fn adapt_messages_for_model(model: &str, messages: &[ChatMessage]) -> Vec<ChatMessage> {
    if !model.starts_with("o1") {
        return messages.to_vec();
    }

    let system: Vec<&str> = messages
        .iter()
        .filter(|m| m.role == "system")
        .map(|m| m.content.as_str())
        .collect();
    let mut adapted: Vec<ChatMessage> = messages
        .iter()
        .filter(|m| m.role != "system")
        .cloned()
        .collect();

    if !system.is_empty() {
        match adapted.iter_mut().find(|m| m.role == "user") {
            Some(first_user) => {
                first_user.content = format!("{}\n\n{}", system.join("\n"), first_user.content);
            }
            None => adapted.insert(0, ChatMessage::user(system.join("\n"))),
        }
    }
    adapted
}

// ────────────────────────────────────────────────────────────────────────────
// LlmClient
// ────────────────────────────────────────────────────────────────────────────

/// The single LLM client used by all pipeline steps and edit handlers.
#[derive(Clone)]
pub struct LlmClient {
    backend: Arc<dyn ChatBackend>,
    model: String,
    advanced_model: String,
    embedding_model: String,
}

impl LlmClient {
    pub fn new(config: &Config) -> Result<Self> {
        let backend = OpenAiBackend::new(config)?;
        Ok(Self::with_backend(
            Arc::new(backend),
            config.model.clone(),
            config.advanced_model.clone(),
        )
        .with_embedding_model(config.embedding_model.clone()))
    }

    pub fn with_backend(
        backend: Arc<dyn ChatBackend>,
        model: impl Into<String>,
        advanced_model: impl Into<String>,
    ) -> Self {
        Self {
            backend,
            model: model.into(),
            advanced_model: advanced_model.into(),
            embedding_model: DEFAULT_EMBEDDING_MODEL.to_string(),
        }
    }

    pub fn with_embedding_model(mut self, model: impl Into<String>) -> Self {
        self.embedding_model = model.into();
        self
    }

    pub fn model(&self, tier: ModelTier) -> &str {
        match tier {
            ModelTier::Standard => &self.model,
            ModelTier::Advanced => &self.advanced_model,
        }
    }

    /// Plain-text completion on the standard model.
    pub async fn call(&self, prompt: &str, system: &str) -> Result<String, LlmError> {
        self.call_with_tier(ModelTier::Standard, prompt, system)
            .await
    }

    pub async fn call_with_tier(
        &self,
        tier: ModelTier,
        prompt: &str,
        system: &str,
    ) -> Result<String, LlmError> {
        let messages = [ChatMessage::system(system), ChatMessage::user(prompt)];
        let text = self.backend.complete(self.model(tier), &messages).await?;
        Ok(text.trim().to_string())
    }

    /// Embeds every input with the configured embedding model.
    pub async fn embed(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, LlmError> {
        if inputs.is_empty() {
            return Ok(Vec::new());
        }
        self.backend.embed(&self.embedding_model, inputs).await
    }

    /// Calls the LLM and deserializes the reply as JSON, feeding parse errors back
    /// to the model for a bounded number of retries.
    pub async fn call_json<T: DeserializeOwned + Send>(
        &self,
        prompt: &str,
        system: &str,
    ) -> Result<T, LlmError> {
        self.call_validated(ModelTier::Standard, prompt, system, parse_json_reply::<T>)
            .await
    }

    /// Like `call_json`, but with a caller-supplied validator run on every reply.
    pub async fn call_validated<T, F>(
        &self,
        tier: ModelTier,
        prompt: &str,
        system: &str,
        validate: F,
    ) -> Result<T, LlmError>
    where
        F: Fn(&str) -> Result<T, String> + Send + Sync,
        T: Send,
    {
        structured::complete_validated(
            self.backend.as_ref(),
            self.model(tier),
            system,
            prompt,
            structured::DEFAULT_MAX_ATTEMPTS,
            validate,
        )
        .await
    }
}

#[cfg(test)]
pub mod testing {
    //! Scripted backend used across the crate's tests.

    use std::collections::VecDeque;
    use std::sync::Mutex;

    use super::*;

    /// Replies are matched by the first rule whose needle appears in the last user message;
    /// unmatched calls pop from the fallback queue.
    #[derive(Default)]
    pub struct ScriptedBackend {
        rules: Mutex<Vec<(String, String)>>,
        queue: Mutex<VecDeque<String>>,
        calls: Mutex<Vec<Vec<ChatMessage>>>,
        embedded: Mutex<Vec<String>>,
    }

    const EMBEDDING_DIM: usize = 64;

    /// Hashed bag-of-words vector: texts sharing words point the same way.
    pub fn word_vector(text: &str) -> Vec<f32> {
        let mut vector = vec![0.0; EMBEDDING_DIM];
        for word in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
        {
            let bucket = word
                .to_lowercase()
                .bytes()
                .fold(7usize, |h, b| h.wrapping_mul(31).wrapping_add(b as usize));
            vector[bucket % EMBEDDING_DIM] += 1.0;
        }
        vector
    }

    impl ScriptedBackend {
        pub fn new() -> Arc<Self> {
            Arc::new(Self::default())
        }

        pub fn on(&self, needle: &str, reply: &str) -> &Self {
            self.rules
                .lock()
                .unwrap()
                .push((needle.to_string(), reply.to_string()));
            self
        }

        pub fn push(&self, reply: &str) -> &Self {
            self.queue.lock().unwrap().push_back(reply.to_string());
            self
        }

        pub fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }

        pub fn calls_matching(&self, needle: &str) -> usize {
            self.calls
                .lock()
                .unwrap()
                .iter()
                .filter(|messages| last_user(messages).contains(needle))
                .count()
        }

        pub fn last_call(&self) -> Vec<ChatMessage> {
            self.calls.lock().unwrap().last().cloned().unwrap_or_default()
        }

        /// Every text sent for embedding, across all calls.
        pub fn embedded(&self) -> Vec<String> {
            self.embedded.lock().unwrap().clone()
        }
    }

    fn last_user(messages: &[ChatMessage]) -> &str {
        messages
            .iter()
            .rev()
            .find(|m| m.role == "user")
            .map(|m| m.content.as_str())
            .unwrap_or("")
    }

    #[async_trait]
    impl ChatBackend for ScriptedBackend {
        async fn complete(
            &self,
            _model: &str,
            messages: &[ChatMessage],
        ) -> Result<String, LlmError> {
            self.calls.lock().unwrap().push(messages.to_vec());
            let prompt = last_user(messages);
            let rules = self.rules.lock().unwrap();
            if let Some((_, reply)) = rules.iter().find(|(needle, _)| prompt.contains(needle)) {
                return Ok(reply.clone());
            }
            drop(rules);
            self.queue
                .lock()
                .unwrap()
                .pop_front()
                .ok_or(LlmError::EmptyContent)
        }

        async fn embed(&self, _model: &str, inputs: &[String]) -> Result<Vec<Vec<f32>>, LlmError> {
            self.embedded.lock().unwrap().extend_from_slice(inputs);
            Ok(inputs.iter().map(|text| word_vector(text)).collect())
        }
    }

    pub fn client(backend: Arc<ScriptedBackend>) -> LlmClient {
        LlmClient::with_backend(backend, "test-model", "test-advanced-model")
    }
}
