use crate::config::Config;
use crate::error::{RankError, RankResult};
use async_openai::{
    Client,
    config::OpenAIConfig,
    types::{
        ChatCompletionRequestMessage, ChatCompletionRequestUserMessageArgs,
        CreateChatCompletionRequest, CreateChatCompletionRequestArgs,
        CreateChatCompletionResponse, CreateEmbeddingRequestArgs, CreateEmbeddingResponse,
    },
};
use async_trait::async_trait;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tokio::time::sleep;
use tracing::{debug, warn};

/// Maps a prompt and sampling parameters to generated text
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    async fn complete(&self, prompt: &str, max_tokens: u32, temperature: f64) -> RankResult<String>;
}

/// Maps a batch of texts to dense vectors, one per input, in input order
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    async fn embed(&self, texts: &[String]) -> RankResult<Vec<Vec<f32>>>;
}

/// Spaces requests at least `1 / rate_limit_rps` seconds apart
pub struct RateLimiter {
    rate_limit_rps: f64,
    last_request: Mutex<Option<Instant>>,
}

impl RateLimiter {
    pub fn new(rate_limit_rps: f64) -> Self {
        Self {
            rate_limit_rps,
            last_request: Mutex::new(None),
        }
    }

    /// Sleep until the next request is allowed, then record it
    pub async fn wait(&self) {
        let mut last_request = self.last_request.lock().await;

        if self.rate_limit_rps <= 0.0 {
            return;
        }

        let Ok(min_interval) = Duration::try_from_secs_f64(1.0 / self.rate_limit_rps) else {
            warn!(rate_limit_rps = self.rate_limit_rps, "Unusable rate limit, not throttling");
            return;
        };

        if let Some(last_time) = *last_request {
            let elapsed = last_time.elapsed();
            if elapsed < min_interval {
                sleep(min_interval - elapsed).await;
            }
        }

        *last_request = Some(Instant::now());
    }
}

/// Read the API key from the configured environment variable
fn api_key(config: &Config) -> RankResult<String> {
    std::env::var(&config.env_var_api_key).map_err(|_| {
        RankError::Configuration(format!(
            "Environment variable {} not found",
            config.env_var_api_key
        ))
    })
}

fn client_for(api_endpoint: &str, api_key: String) -> Client<OpenAIConfig> {
    let openai_config = OpenAIConfig::new()
        .with_api_key(api_key)
        .with_api_base(api_endpoint);

    Client::with_config(openai_config)
}

/// Chat-completions backed text generation
pub struct OpenAiCompletionProvider {
    client: Client<OpenAIConfig>,
    model: String,
    limiter: RateLimiter,
}

impl OpenAiCompletionProvider {
    pub fn from_config(config: &Config) -> RankResult<Self> {
        Ok(Self::new(
            &config.api_endpoint,
            api_key(config)?,
            &config.model,
            config.rate_limit_rps,
        ))
    }

    pub fn new(api_endpoint: &str, api_key: String, model: &str, rate_limit_rps: f64) -> Self {
        Self {
            client: client_for(api_endpoint, api_key),
            model: model.to_string(),
            limiter: RateLimiter::new(rate_limit_rps),
        }
    }

    /// Build the chat completion request for a single user prompt
    fn build_request(
        &self,
        prompt: &str,
        max_tokens: u32,
        temperature: f64,
    ) -> RankResult<CreateChatCompletionRequest> {
        let user_message: ChatCompletionRequestMessage =
            ChatCompletionRequestUserMessageArgs::default()
                .content(prompt.to_string())
                .build()?
                .into();

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(vec![user_message])
            .temperature(temperature as f32)
            .max_tokens(u16::try_from(max_tokens).unwrap_or(u16::MAX))
            .build()?;

        Ok(request)
    }

    /// Extract the first choice's text from the API response
    fn extract_content(response: CreateChatCompletionResponse) -> RankResult<String> {
        let content = response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .map(|content| content.trim().to_string())
            .unwrap_or_default();

        if content.is_empty() {
            return Err(RankError::Provider(
                "Completion response contained no text".to_string(),
            ));
        }
        Ok(content)
    }
}

#[async_trait]
impl CompletionProvider for OpenAiCompletionProvider {
    async fn complete(&self, prompt: &str, max_tokens: u32, temperature: f64) -> RankResult<String> {
        self.limiter.wait().await;

        let request = self.build_request(prompt, max_tokens, temperature)?;
        debug!(model = %self.model, max_tokens, temperature, "Requesting completion");

        let response = self.client.chat().create(request).await?;
        Self::extract_content(response)
    }
}

/// Embeddings-endpoint backed text encoder
pub struct OpenAiEmbeddingProvider {
    client: Client<OpenAIConfig>,
    model: String,
    limiter: RateLimiter,
}

impl OpenAiEmbeddingProvider {
    pub fn from_config(config: &Config) -> RankResult<Self> {
        Ok(Self::new(
            &config.api_endpoint,
            api_key(config)?,
            &config.embedding_model,
            config.rate_limit_rps,
        ))
    }

    pub fn new(api_endpoint: &str, api_key: String, model: &str, rate_limit_rps: f64) -> Self {
        Self {
            client: client_for(api_endpoint, api_key),
            model: model.to_string(),
            limiter: RateLimiter::new(rate_limit_rps),
        }
    }

    /// Order vectors by their reported index and check one came back per input
    fn extract_vectors(
        response: CreateEmbeddingResponse,
        expected: usize,
    ) -> RankResult<Vec<Vec<f32>>> {
        let mut data = response.data;
        data.sort_by_key(|e| e.index);

        if data.len() != expected {
            return Err(RankError::Provider(format!(
                "Embedding response returned {} vectors for {} inputs",
                data.len(),
                expected
            )));
        }

        Ok(data.into_iter().map(|e| e.embedding).collect())
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAiEmbeddingProvider {
    async fn embed(&self, texts: &[String]) -> RankResult<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        self.limiter.wait().await;

        let request = CreateEmbeddingRequestArgs::default()
            .model(&self.model)
            .input(texts.to_vec())
            .build()?;
        debug!(model = %self.model, inputs = texts.len(), "Requesting embeddings");

        let response = self.client.embeddings().create(request).await?;
        Self::extract_vectors(response, texts.len())
    }
}
