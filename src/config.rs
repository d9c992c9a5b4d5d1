use crate::templates::TemplateKind;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Settings for one ranking or generation run
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    /// OpenAI-compatible API endpoint
    #[serde(default = "default_api_endpoint")]
    pub api_endpoint: String,
    /// Environment variable name containing the API key
    #[serde(default = "default_env_var_api_key")]
    pub env_var_api_key: String,
    /// Model used for candidate generation, story generation and judging
    #[serde(default = "default_model")]
    pub model: String,
    /// Model used for text embeddings
    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,
    /// Temperature for candidate prompt generation
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    /// Maximum tokens for candidate prompt generation
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// Rate limit for API requests per second
    #[serde(default = "default_rate_limit")]
    pub rate_limit_rps: f64,
    /// Candidate prompts generated per seed prompt
    #[serde(default = "default_num_candidates")]
    pub num_candidates: usize,
    /// Template used to expand seed prompts
    #[serde(default)]
    pub template: TemplateKind,
    /// Temperature for story generation
    #[serde(default = "default_story_temperature")]
    pub story_temperature: f64,
    #[serde(default = "default_max_tokens")]
    pub story_max_tokens: u32,
    /// Temperature for judge calls, kept near zero for repeatable scores
    #[serde(default = "default_judge_temperature")]
    pub judge_temperature: f64,
    #[serde(default = "default_judge_max_tokens")]
    pub judge_max_tokens: u32,
    #[serde(default = "default_candidate_judge_max_tokens")]
    pub candidate_judge_max_tokens: u32,
    /// Weight of relevance in the final score
    #[serde(default = "default_alpha")]
    pub alpha: f64,
    /// Weight of diversity in the final score
    #[serde(default = "default_beta")]
    pub beta: f64,
    /// Pause between dataset rows, in seconds
    #[serde(default)]
    pub row_delay_secs: f64,
}

fn default_api_endpoint() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_env_var_api_key() -> String {
    "OPENAI_API_KEY".to_string()
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_embedding_model() -> String {
    "text-embedding-3-small".to_string()
}

fn default_temperature() -> f64 {
    0.7
}

fn default_max_tokens() -> u32 {
    1000
}

fn default_rate_limit() -> f64 {
    10.0
}

fn default_num_candidates() -> usize {
    3
}

fn default_story_temperature() -> f64 {
    0.2
}

fn default_judge_temperature() -> f64 {
    0.01
}

fn default_judge_max_tokens() -> u32 {
    500
}

fn default_candidate_judge_max_tokens() -> u32 {
    200
}

fn default_alpha() -> f64 {
    0.8
}

fn default_beta() -> f64 {
    0.2
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_endpoint: default_api_endpoint(),
            env_var_api_key: default_env_var_api_key(),
            model: default_model(),
            embedding_model: default_embedding_model(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            rate_limit_rps: default_rate_limit(),
            num_candidates: default_num_candidates(),
            template: TemplateKind::default(),
            story_temperature: default_story_temperature(),
            story_max_tokens: default_max_tokens(),
            judge_temperature: default_judge_temperature(),
            judge_max_tokens: default_judge_max_tokens(),
            candidate_judge_max_tokens: default_candidate_judge_max_tokens(),
            alpha: default_alpha(),
            beta: default_beta(),
            row_delay_secs: 0.0,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse TOML config: {}", path.display()))?;

        config.validate()?;
        Ok(config)
    }

    /// Reject settings no run could succeed with
    pub fn validate(&self) -> Result<()> {
        if self.num_candidates == 0 {
            anyhow::bail!("num_candidates must be at least 1");
        }
        if Duration::try_from_secs_f64(self.row_delay_secs).is_err() {
            anyhow::bail!("row_delay_secs must be a non-negative number of seconds");
        }
        // Zero disables throttling; anything else must yield a representable interval
        let rps = self.rate_limit_rps;
        let interval_ok = rps == 0.0 || Duration::try_from_secs_f64(1.0 / rps).is_ok();
        if !rps.is_finite() || rps < 0.0 || !interval_ok {
            anyhow::bail!("rate_limit_rps must be zero or a positive request rate");
        }
        Ok(())
    }
}
