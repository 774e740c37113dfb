//! Load configuration via `config` crate with env-override support.

use std::{ops::Deref, sync::Arc};

use serde::Deserialize;

use crate::{base::prompts, evidence::filter::DEFAULT_BOT_AUTHORS};

use super::types::Res;

/// Default OpenAI model to summarize with.
fn default_openai_model() -> String {
    "gpt-4.1-mini".to_string()
}

/// Default sampling temperature for the summarizer.
fn default_openai_temperature() -> f32 {
    0.2
}

/// Default nucleus sampling mass for the summarizer.
fn default_openai_top_p() -> f32 {
    0.95
}

/// Default max output tokens for OpenAI model.
fn default_openai_max_tokens() -> u32 {
    400
}

fn default_openai_timeout_secs() -> u64 {
    60
}

/// Default summarizer directive.
fn default_summarizer_directive() -> String {
    prompts::SUMMARIZER_DIRECTIVE.to_string()
}

/// Default upper bound on the evidence block handed to the summarizer.
fn default_max_evidence_chars() -> usize {
    12_000
}

/// Default subreddit scope (`all` is unrestricted).
fn default_reddit_search_scope() -> String {
    "all".to_string()
}

fn default_reddit_search_limit() -> usize {
    5
}

fn default_reddit_comments_per_submission() -> usize {
    5
}

fn default_reddit_harvest_concurrency() -> usize {
    4
}

fn default_reddit_timeout_secs() -> u64 {
    30
}

/// Default set of automated authors to ignore.
fn default_bot_authors() -> Vec<String> {
    DEFAULT_BOT_AUTHORS.iter().map(|s| s.to_string()).collect()
}

fn default_link_list_limit() -> usize {
    10
}

/// Configuration for the perplexed-bot application.
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Shared settings.
    pub inner: Arc<ConfigInner>,
}

impl Deref for Config {
    type Target = ConfigInner;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

/// Settings, as read from the environment and the config file.
#[derive(Debug, Deserialize, Clone)]
pub struct ConfigInner {
    /// OpenAI API key (`OPENAI_API_KEY`).
    pub openai_api_key: String,
    /// OpenAI model used by the summarizer (`OPENAI_MODEL`).
    #[serde(default = "default_openai_model")]
    pub openai_model: String,
    /// Sampling temperature for the summarizer (`OPENAI_TEMPERATURE`).
    /// Value between 0 and 2.
    #[serde(default = "default_openai_temperature")]
    pub openai_temperature: f32,
    /// Nucleus sampling mass for the summarizer (`OPENAI_TOP_P`).
    /// Value between 0 and 1.
    #[serde(default = "default_openai_top_p")]
    pub openai_top_p: f32,
    /// Max output tokens for OpenAI model (`OPENAI_MAX_TOKENS`).
    #[serde(default = "default_openai_max_tokens")]
    pub openai_max_tokens: u32,
    /// Timeout for a single summarizer request, in seconds (`OPENAI_TIMEOUT_SECS`).
    #[serde(default = "default_openai_timeout_secs")]
    pub openai_timeout_secs: u64,
    /// Optional custom summarizer directive (`SUMMARIZER_DIRECTIVE`).
    /// Any `{query}` is replaced with the user's question.
    #[serde(default = "default_summarizer_directive")]
    pub summarizer_directive: String,
    /// Maximum size of the evidence block in the prompt, in characters (`MAX_EVIDENCE_CHARS`).
    #[serde(default = "default_max_evidence_chars")]
    pub max_evidence_chars: usize,
    /// Reddit application client ID (`REDDIT_CLIENT_ID`).
    pub reddit_client_id: String,
    /// Reddit application client secret (`REDDIT_CLIENT_SECRET`).
    pub reddit_client_secret: String,
    /// Reddit account that owns the application (`REDDIT_USERNAME`).
    pub reddit_username: String,
    /// Subreddit to search, or `all` (`REDDIT_SEARCH_SCOPE`).
    #[serde(default = "default_reddit_search_scope")]
    pub reddit_search_scope: String,
    /// Number of submissions to harvest per query (`REDDIT_SEARCH_LIMIT`).
    #[serde(default = "default_reddit_search_limit")]
    pub reddit_search_limit: usize,
    /// Number of comments to keep per submission (`REDDIT_COMMENTS_PER_SUBMISSION`).
    #[serde(default = "default_reddit_comments_per_submission")]
    pub reddit_comments_per_submission: usize,
    /// Number of "load more comments" nodes to resolve per submission (`REDDIT_MORE_COMMENTS_LIMIT`).
    /// Zero drops them without extra requests.
    #[serde(default)]
    pub reddit_more_comments_limit: usize,
    /// Number of submissions harvested at once (`REDDIT_HARVEST_CONCURRENCY`).
    #[serde(default = "default_reddit_harvest_concurrency")]
    pub reddit_harvest_concurrency: usize,
    /// Timeout for a single Reddit request, in seconds (`REDDIT_TIMEOUT_SECS`).
    #[serde(default = "default_reddit_timeout_secs")]
    pub reddit_timeout_secs: u64,
    /// Authors whose comments are never used as evidence (`BOT_AUTHORS`, comma separated).
    #[serde(default = "default_bot_authors")]
    pub bot_authors: Vec<String>,
    /// Maximum number of links listed by `/search` (`LINK_LIST_LIMIT`).
    #[serde(default = "default_link_list_limit")]
    pub link_list_limit: usize,
    /// Slack app token (`SLACK_APP_TOKEN`).  Only needed to serve.
    #[serde(default)]
    pub slack_app_token: String,
    /// Slack bot token (`SLACK_BOT_TOKEN`).  Only needed to serve.
    #[serde(default)]
    pub slack_bot_token: String,
}

impl Default for ConfigInner {
    fn default() -> Self {
        Self {
            openai_api_key: String::new(),
            openai_model: default_openai_model(),
            openai_temperature: default_openai_temperature(),
            openai_top_p: default_openai_top_p(),
            openai_max_tokens: default_openai_max_tokens(),
            openai_timeout_secs: default_openai_timeout_secs(),
            summarizer_directive: default_summarizer_directive(),
            max_evidence_chars: default_max_evidence_chars(),
            reddit_client_id: String::new(),
            reddit_client_secret: String::new(),
            reddit_username: String::new(),
            reddit_search_scope: default_reddit_search_scope(),
            reddit_search_limit: default_reddit_search_limit(),
            reddit_comments_per_submission: default_reddit_comments_per_submission(),
            reddit_more_comments_limit: 0,
            reddit_harvest_concurrency: default_reddit_harvest_concurrency(),
            reddit_timeout_secs: default_reddit_timeout_secs(),
            bot_authors: default_bot_authors(),
            link_list_limit: default_link_list_limit(),
            slack_app_token: String::new(),
            slack_bot_token: String::new(),
        }
    }
}

impl Config {
    /// Load from `PERPLEXED_BOT_*` environment variables and an optional TOML file, then validate.
    pub fn load(explicit_path: Option<&std::path::Path>) -> Res<Self> {
        let mut cfg = config::Config::builder().add_source(
            config::Environment::default()
                .prefix("PERPLEXED_BOT")
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("bot_authors"),
        );

        if let Some(p) = explicit_path {
            cfg = cfg.add_source(config::File::from(p.to_path_buf()));
        } else if std::path::Path::new(".hidden/config.toml").exists() {
            cfg = cfg.add_source(config::File::with_name(".hidden/config.toml"));
        }

        let result = Config {
            inner: Arc::new(cfg.build()?.try_deserialize()?),
        };

        result.validate()?;

        Ok(result)
    }

    /// Check value ranges that serde cannot express.
    pub fn validate(&self) -> Res<()> {
        if self.openai_temperature < 0.0 || self.openai_temperature > 2.0 {
            return Err(anyhow::anyhow!("OpenAI temperature must be between 0 and 2."));
        }

        if self.openai_top_p < 0.0 || self.openai_top_p > 1.0 {
            return Err(anyhow::anyhow!("OpenAI top_p must be between 0 and 1."));
        }

        if self.openai_max_tokens < 1 || self.openai_max_tokens > 128000 {
            return Err(anyhow::anyhow!("OpenAI max tokens must be between 1 and 128000."));
        }

        if self.reddit_search_limit < 1 || self.reddit_search_limit > 100 {
            return Err(anyhow::anyhow!("Reddit search limit must be between 1 and 100."));
        }

        if self.reddit_comments_per_submission < 1 {
            return Err(anyhow::anyhow!("Reddit comments per submission must be at least 1."));
        }

        if self.reddit_harvest_concurrency < 1 {
            return Err(anyhow::anyhow!("Reddit harvest concurrency must be at least 1."));
        }

        if self.link_list_limit < 1 {
            return Err(anyhow::anyhow!("Link list limit must be at least 1."));
        }

        if self.reddit_search_scope.trim().is_empty() {
            return Err(anyhow::anyhow!("Reddit search scope must not be empty (use `all` for no restriction)."));
        }

        Ok(())
    }
}
