use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use serde::Deserialize;
use serde_json::json;
use taxlens_core::{Category, ClassificationMethod, ClassificationResult, Direction, Money};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Upper bound on one provider round trip.
pub const AI_TIMEOUT: Duration = Duration::from_secs(30);
const TEMPERATURE: f32 = 0.1;
const MAX_OUTPUT_TOKENS: u32 = 100;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Unsupported AI provider: '{0}'")]
    UnsupportedProvider(String),
    #[error("HTTP client setup failed: {0}")]
    Client(#[from] reqwest::Error),
}

#[derive(Debug, Error)]
pub enum AiError {
    #[error("AI classifier is not configured")]
    NotConfigured,
    #[error("HTTP error: {0}")]
    Http(reqwest::Error),
    #[error("Provider returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("AI request timed out")]
    Timeout,
    #[error("AI request cancelled")]
    Cancelled,
    #[error(transparent)]
    Decode(#[from] ReplyDecodeError),
}

impl From<reqwest::Error> for AiError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            AiError::Timeout
        } else {
            AiError::Http(e)
        }
    }
}

/// The model's reply could not be read as a classification.
///
/// `degraded` is what the caller gets if it chooses to use the reply anyway.
#[derive(Debug, Error)]
#[error("Unreadable classification reply: {reason}")]
pub struct ReplyDecodeError {
    pub reason: String,
    pub degraded: ClassificationResult,
}

impl ReplyDecodeError {
    fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
            degraded: ClassificationResult::uncategorized(ClassificationMethod::Ai),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AiProvider {
    Gemini,
    OpenAi,
}

impl std::fmt::Display for AiProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AiProvider::Gemini => write!(f, "gemini"),
            AiProvider::OpenAi => write!(f, "openai"),
        }
    }
}

impl std::str::FromStr for AiProvider {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "gemini" => Ok(AiProvider::Gemini),
            "openai" => Ok(AiProvider::OpenAi),
            other => Err(ConfigError::UnsupportedProvider(other.to_string())),
        }
    }
}

impl AiProvider {
    pub fn default_model(self) -> &'static str {
        match self {
            AiProvider::Gemini => "gemini-1.5-flash",
            AiProvider::OpenAi => "gpt-4o-mini",
        }
    }

    pub fn default_base_url(self) -> &'static str {
        match self {
            AiProvider::Gemini => "https://generativelanguage.googleapis.com/v1beta",
            AiProvider::OpenAi => "https://api.openai.com/v1",
        }
    }

    /// Pull the model's text out of the provider's response envelope.
    fn reply_text(self, body: &str) -> Option<String> {
        match self {
            AiProvider::Gemini => {
                let envelope: GeminiResponse = serde_json::from_str(body).ok()?;
                let candidate = envelope.candidates.into_iter().next()?;
                candidate.content.parts.into_iter().next().map(|p| p.text)
            }
            AiProvider::OpenAi => {
                let envelope: ChatResponse = serde_json::from_str(body).ok()?;
                envelope.choices.into_iter().next().map(|c| c.message.content)
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    content: GeminiContent,
}

#[derive(Debug, Deserialize)]
struct GeminiContent {
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Deserialize)]
struct GeminiPart {
    text: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: String,
}

#[derive(Debug, Deserialize)]
struct ReplyPayload {
    category: String,
    #[serde(default)]
    confidence: f32,
}

/// Abstraction over a language-model classifier.
pub trait AiBackend: Send + Sync {
    /// `false` when the backend has no credentials and would always fail.
    fn is_available(&self) -> bool;

    fn classify(
        &self,
        description: &str,
        direction: Direction,
        amount: Money,
        cancel: &CancellationToken,
    ) -> impl Future<Output = Result<ClassificationResult, AiError>> + Send;
}

#[derive(Debug, Clone)]
pub struct AiConfig {
    pub provider: AiProvider,
    pub api_key: String,
    pub model: Option<String>,
    pub base_url: Option<String>,
    pub timeout: Duration,
}

impl AiConfig {
    pub fn new(provider: AiProvider, api_key: impl Into<String>) -> Self {
        Self {
            provider,
            api_key: api_key.into(),
            model: None,
            base_url: None,
            timeout: AI_TIMEOUT,
        }
    }
}

/// HTTP client for a hosted model.
#[derive(Debug, Clone)]
pub struct AiClassifier {
    provider: AiProvider,
    api_key: String,
    model: String,
    base_url: String,
    timeout: Duration,
    client: reqwest::Client,
}

impl AiClassifier {
    pub fn new(config: AiConfig) -> Result<Self, ConfigError> {
        let client = reqwest::Client::builder().timeout(config.timeout).build()?;
        let base_url = config
            .base_url
            .unwrap_or_else(|| config.provider.default_base_url().to_string());
        Ok(Self {
            provider: config.provider,
            api_key: config.api_key,
            model: config
                .model
                .unwrap_or_else(|| config.provider.default_model().to_string()),
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout: config.timeout,
            client,
        })
    }

    pub fn provider(&self) -> AiProvider {
        self.provider
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn request(&self, prompt: &str) -> reqwest::RequestBuilder {
        match self.provider {
            AiProvider::Gemini => self
                .client
                .post(format!("{}/models/{}:generateContent", self.base_url, self.model))
                .query(&[("key", self.api_key.as_str())])
                .json(&json!({
                    "contents": [{ "parts": [{ "text": prompt }] }],
                    "generationConfig": {
                        "temperature": TEMPERATURE,
                        "maxOutputTokens": MAX_OUTPUT_TOKENS,
                    },
                })),
            AiProvider::OpenAi => self
                .client
                .post(format!("{}/chat/completions", self.base_url))
                .bearer_auth(&self.api_key)
                .json(&json!({
                    "model": self.model,
                    "messages": [{ "role": "user", "content": prompt }],
                    "temperature": TEMPERATURE,
                    "max_tokens": MAX_OUTPUT_TOKENS,
                })),
        }
    }

    async fn exchange(&self, prompt: &str) -> Result<String, AiError> {
        let response = self.request(prompt).send().await?;
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(AiError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(body)
    }
}

impl AiBackend for AiClassifier {
    fn is_available(&self) -> bool {
        !self.api_key.trim().is_empty()
    }

    async fn classify(
        &self,
        description: &str,
        direction: Direction,
        amount: Money,
        cancel: &CancellationToken,
    ) -> Result<ClassificationResult, AiError> {
        if !self.is_available() {
            return Err(AiError::NotConfigured);
        }
        let prompt = build_prompt(description, direction, amount);

        let body = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(AiError::Cancelled),
            res = tokio::time::timeout(self.timeout, self.exchange(&prompt)) => {
                res.map_err(|_| AiError::Timeout)??
            }
        };

        let text = self.provider.reply_text(&body).unwrap_or(body);
        let result = parse_reply(&text)?;
        tracing::debug!(
            provider = %self.provider,
            category = %result.category,
            confidence = result.confidence,
            "AI classification"
        );
        Ok(result)
    }
}

/// Instruction text sent to the model for one transaction.
pub fn build_prompt(description: &str, direction: Direction, amount: Money) -> String {
    let mut prompt = String::from(
        "You categorize Nigerian bank statement transactions for personal income tax.\n\n",
    );
    prompt.push_str(&format!(
        "Transaction:\n- Description: {description}\n- Type: {direction}\n- Amount: {amount}\n\n"
    ));
    prompt.push_str("Choose exactly one category:\n");
    for category in Category::ALL {
        prompt.push_str(&format!("- {}: {}\n", category.as_str(), category.describe()));
    }
    prompt.push_str(
        "\nRespond with JSON only, no other text, in the form \
         {\"category\": \"<category>\", \"confidence\": <number between 0 and 1>}\n",
    );
    prompt
}

/// Decode the JSON object spanning the first `{` to the last `}` of `text`.
pub fn parse_reply(text: &str) -> Result<ClassificationResult, ReplyDecodeError> {
    let (Some(start), Some(end)) = (text.find('{'), text.rfind('}')) else {
        return Err(ReplyDecodeError::new("no JSON object in reply"));
    };
    if end < start {
        return Err(ReplyDecodeError::new("no JSON object in reply"));
    }
    let payload: ReplyPayload = serde_json::from_str(&text[start..=end])
        .map_err(|e| ReplyDecodeError::new(format!("invalid JSON: {e}")))?;
    let category: Category = payload.category.parse().map_err(ReplyDecodeError::new)?;
    if !payload.confidence.is_finite() {
        return Err(ReplyDecodeError::new("confidence is not a number"));
    }
    Ok(ClassificationResult::ai(category, payload.confidence))
}

// ── Mock backend (used for tests) ─────────────────────────────────────────────

/// Canned replies keyed by transaction description. Unknown descriptions fail
/// with a 500 status, as a flaky provider would.
#[derive(Debug, Default)]
pub struct MockBackend {
    replies: HashMap<String, ClassificationResult>,
    available: bool,
    delay: Duration,
    calls: AtomicUsize,
}

impl MockBackend {
    pub fn new() -> Self {
        Self {
            available: true,
            ..Self::default()
        }
    }

    pub fn unavailable() -> Self {
        Self::default()
    }

    pub fn reply(mut self, description: &str, category: Category, confidence: f32) -> Self {
        self.replies
            .insert(description.to_string(), ClassificationResult::ai(category, confidence));
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Number of `classify` calls made so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl AiBackend for MockBackend {
    fn is_available(&self) -> bool {
        self.available
    }

    async fn classify(
        &self,
        description: &str,
        _direction: Direction,
        _amount: Money,
        cancel: &CancellationToken,
    ) -> Result<ClassificationResult, AiError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(AiError::Cancelled),
            _ = tokio::time::sleep(self.delay) => {}
        }
        self.replies
            .get(description)
            .copied()
            .ok_or_else(|| AiError::Status {
                status: 500,
                body: "no canned reply".into(),
            })
    }
}
