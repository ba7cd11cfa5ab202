use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use llm::builder::{LLMBackend, LLMBuilder};
use serde::{Deserialize, Serialize};

use protoforge_core::LlmSettings;

#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("llm request timed out after {0:?}")]
    Timeout(Duration),
    #[error("llm returned status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("llm returned an empty response")]
    EmptyResponse,
    #[error("llm backend error: {0}")]
    Backend(String),
    #[error("unknown provider: {0}")]
    UnknownProvider(String),
}

// --- Prompts ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

/// An ordered chat transcript, flattened by [`ChatPrompt::render`] for
/// completion-style endpoints.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChatPrompt {
    pub messages: Vec<ChatMessage>,
}

impl ChatPrompt {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(mut self, role: Role, content: impl Into<String>) -> Self {
        self.messages.push(ChatMessage {
            role,
            content: content.into(),
        });
        self
    }

    pub fn system(self, content: impl Into<String>) -> Self {
        self.push(Role::System, content)
    }

    pub fn user(self, content: impl Into<String>) -> Self {
        self.push(Role::User, content)
    }

    pub fn assistant(self, content: impl Into<String>) -> Self {
        self.push(Role::Assistant, content)
    }

    /// `System: ...\n\nUser: ...\n\nAssistant:`
    pub fn render(&self) -> String {
        let mut out = String::with_capacity(
            self.messages.iter().map(|m| m.content.len() + 16).sum::<usize>() + 16,
        );
        for m in &self.messages {
            out.push_str(match m.role {
                Role::System => "System: ",
                Role::User => "User: ",
                Role::Assistant => "Assistant: ",
            });
            out.push_str(m.content.trim());
            out.push_str("\n\n");
        }
        out.push_str("Assistant:");
        out
    }

    fn system_text(&self) -> String {
        self.messages
            .iter()
            .filter(|m| m.role == Role::System)
            .map(|m| m.content.as_str())
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

/// A text-completion backend. Implementations own their timeout.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &ChatPrompt) -> Result<String, LlmError>;

    /// Short human-readable identity, e.g. `ollama:llama3 @ http://localhost:11434`.
    fn describe(&self) -> String;
}

async fn with_timeout<F>(limit: Duration, fut: F) -> Result<String, LlmError>
where
    F: std::future::Future<Output = Result<String, LlmError>>,
{
    // Dropping `fut` on expiry aborts the in-flight request.
    tokio::time::timeout(limit, fut)
        .await
        .map_err(|_| LlmError::Timeout(limit))?
}

// --- Ollama ---

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: String,
    stream: bool,
}

#[derive(Deserialize)]
struct GenerateChunk {
    #[serde(default)]
    response: String,
    #[serde(default)]
    done: bool,
}

/// Incremental reader for Ollama's streamed NDJSON body.
#[derive(Debug, Default)]
pub struct NdjsonAccumulator {
    pending: Vec<u8>,
    text: String,
    done: bool,
}

impl NdjsonAccumulator {
    /// Feed raw bytes. Returns `true` once a `done: true` line was seen.
    pub fn push(&mut self, bytes: &[u8]) -> bool {
        if self.done {
            return true;
        }
        self.pending.extend_from_slice(bytes);
        while let Some(pos) = self.pending.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.pending.drain(..=pos).collect();
            self.consume(&line);
            if self.done {
                self.pending.clear();
                break;
            }
        }
        self.done
    }

    fn consume(&mut self, line: &[u8]) {
        let line = String::from_utf8_lossy(line);
        let line = line.trim();
        if line.is_empty() {
            return;
        }
        match serde_json::from_str::<GenerateChunk>(line) {
            Ok(chunk) => {
                self.text.push_str(&chunk.response);
                self.done = chunk.done;
            }
            Err(e) => tracing::debug!(error = %e, "skipping malformed ndjson line"),
        }
    }

    /// Flush a trailing line without newline and return the joined text.
    pub fn finish(mut self) -> String {
        if !self.done && !self.pending.is_empty() {
            let rest = std::mem::take(&mut self.pending);
            self.consume(&rest);
        }
        self.text
    }
}

pub fn accumulate_ndjson(body: &str) -> String {
    let mut acc = NdjsonAccumulator::default();
    acc.push(body.as_bytes());
    acc.finish()
}

/// Client for Ollama's `/api/generate` completion endpoint.
#[derive(Debug, Clone)]
pub struct OllamaClient {
    client: reqwest::Client,
    base_url: String,
    model: String,
    stream: bool,
    timeout: Duration,
}

impl OllamaClient {
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            model: model.into(),
            stream: false,
            timeout: Duration::from_secs(60),
        }
    }

    pub fn with_stream(mut self, stream: bool) -> Self {
        self.stream = stream;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn endpoint(&self) -> String {
        format!("{}/api/generate", self.base_url.trim_end_matches('/'))
    }

    async fn send(&self, prompt: &ChatPrompt) -> Result<String, LlmError> {
        let body = GenerateRequest {
            model: &self.model,
            prompt: prompt.render(),
            stream: self.stream,
        };
        let mut res = self.client.post(self.endpoint()).json(&body).send().await?;
        let status = res.status();
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            return Err(LlmError::Status {
                status: status.as_u16(),
                body,
            });
        }

        if !self.stream {
            let chunk: GenerateChunk = res.json().await?;
            return Ok(chunk.response);
        }

        let mut acc = NdjsonAccumulator::default();
        while let Some(bytes) = res.chunk().await? {
            if acc.push(&bytes) {
                break;
            }
        }
        Ok(acc.finish())
    }
}

#[async_trait]
impl TextGenerator for OllamaClient {
    async fn generate(&self, prompt: &ChatPrompt) -> Result<String, LlmError> {
        tracing::debug!(model = %self.model, stream = self.stream, "sending prompt to ollama");
        with_timeout(self.timeout, self.send(prompt)).await
    }

    fn describe(&self) -> String {
        format!("ollama:{} @ {}", self.model, self.base_url)
    }
}

// --- Hosted chat providers ---

fn map_backend(provider: &str) -> Result<LLMBackend, LlmError> {
    match provider {
        "openai" => Ok(LLMBackend::OpenAI),
        "anthropic" => Ok(LLMBackend::Anthropic),
        "google" => Ok(LLMBackend::Google),
        "groq" => Ok(LLMBackend::Groq),
        "mistral" => Ok(LLMBackend::Mistral),
        "deepseek" => Ok(LLMBackend::DeepSeek),
        other => Err(LlmError::UnknownProvider(other.to_string())),
    }
}

/// Chat-style providers reached through the `llm` crate.
#[derive(Debug, Clone)]
pub struct ChatClient {
    provider: String,
    model: String,
    api_key: String,
    timeout: Duration,
}

impl ChatClient {
    pub fn new(settings: &LlmSettings) -> Result<Self, LlmError> {
        map_backend(&settings.provider)?;
        Ok(Self {
            provider: settings.provider.clone(),
            model: settings.model.clone(),
            api_key: settings.api_key.clone(),
            timeout: settings.timeout(),
        })
    }

    async fn send(&self, prompt: &ChatPrompt) -> Result<String, LlmError> {
        let mut builder = LLMBuilder::new()
            .backend(map_backend(&self.provider)?)
            .model(&self.model)
            .system(prompt.system_text());

        if !self.api_key.is_empty() {
            builder = builder.api_key(&self.api_key);
        }

        let llm = builder
            .build()
            .map_err(|e| LlmError::Backend(format!("build LLM: {e}")))?;

        let messages: Vec<llm::chat::ChatMessage> = prompt
            .messages
            .iter()
            .filter_map(|m| match m.role {
                Role::System => None,
                Role::User => Some(llm::chat::ChatMessage::user().content(&m.content).build()),
                Role::Assistant => {
                    Some(llm::chat::ChatMessage::assistant().content(&m.content).build())
                }
            })
            .collect();

        let response = llm
            .chat(&messages)
            .await
            .map_err(|e| LlmError::Backend(format!("chat: {e}")))?;

        match response.text() {
            Some(text) if !text.trim().is_empty() => Ok(text),
            _ => Err(LlmError::EmptyResponse),
        }
    }
}

#[async_trait]
impl TextGenerator for ChatClient {
    async fn generate(&self, prompt: &ChatPrompt) -> Result<String, LlmError> {
        tracing::debug!(provider = %self.provider, model = %self.model, "sending prompt");
        with_timeout(self.timeout, self.send(prompt)).await
    }

    fn describe(&self) -> String {
        format!("{}:{}", self.provider, self.model)
    }
}

/// Pick the client for the configured provider.
pub fn from_settings(settings: &LlmSettings) -> Result<Arc<dyn TextGenerator>, LlmError> {
    match settings.provider.as_str() {
        "ollama" => Ok(Arc::new(
            OllamaClient::new(&settings.base_url, &settings.model)
                .with_stream(settings.stream)
                .with_timeout(settings.timeout()),
        )),
        _ => Ok(Arc::new(ChatClient::new(settings)?)),
    }
}
