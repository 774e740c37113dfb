//! Integration with the OpenAI chat completions API.
//!
//! The summarizer sends a single request with a fixed generation config: the
//! directive as a system message, and the evidence block as the user message.

use std::{sync::Arc, time::Duration};

use async_openai::{
    Client,
    config::OpenAIConfig,
    types::{
        ChatCompletionRequestMessage, ChatCompletionRequestSystemMessage, ChatCompletionRequestSystemMessageContent, ChatCompletionRequestUserMessage,
        ChatCompletionRequestUserMessageContent, CreateChatCompletionRequest, CreateChatCompletionRequestArgs,
    },
};
use async_trait::async_trait;
use tokio::time::timeout;
use tracing::{info, instrument, warn};

use crate::{
    base::{
        config::Config,
        prompts::{render_directive, render_evidence_block},
        types::{CommentRecord, Res},
    },
    evidence::format::format_evidence,
};

use super::{GenericLlmClient, LlmClient};

// Extra methods on `LlmClient` applied by the openai implementation.

impl LlmClient {
    pub fn openai(config: &Config) -> Self {
        let client = OpenAiLlmClient::new(config);
        Self { inner: Arc::new(client) }
    }
}

// Specific implementations.

/// OpenAI LLM client implementation.
#[derive(Clone)]
pub struct OpenAiLlmClient {
    client: Client<OpenAIConfig>,
    config: Config,
}

impl OpenAiLlmClient {
    /// Create a new OpenAI LLM client.
    #[instrument(name = "OpenAiLlmClient::new", skip_all)]
    pub fn new(config: &Config) -> Self {
        let cfg = OpenAIConfig::new().with_api_key(config.openai_api_key.clone());

        Self {
            client: Client::with_config(cfg),
            config: config.clone(),
        }
    }

    /// Build the summarizer messages.
    fn build_messages(&self, query: &str, evidence: &[CommentRecord]) -> Vec<ChatCompletionRequestMessage> {
        build_summary_messages(&self.config, query, evidence)
    }

    /// Build the full request with the configured generation settings.
    fn build_request(&self, query: &str, evidence: &[CommentRecord]) -> Res<CreateChatCompletionRequest> {
        Ok(CreateChatCompletionRequestArgs::default()
            .model(&self.config.openai_model)
            .messages(self.build_messages(query, evidence))
            .temperature(self.config.openai_temperature)
            .top_p(self.config.openai_top_p)
            .max_completion_tokens(self.config.openai_max_tokens)
            .build()?)
    }
}

#[async_trait]
impl GenericLlmClient for OpenAiLlmClient {
    #[instrument(name = "OpenAiLlmClient::summarize", skip_all, fields(evidence = evidence.len()))]
    async fn summarize(&self, query: &str, evidence: &[CommentRecord]) -> Res<String> {
        let request = self.build_request(query, evidence)?;

        let response = timeout(Duration::from_secs(self.config.openai_timeout_secs), self.client.chat().create(request))
            .await
            .map_err(|_| anyhow::anyhow!("OpenAI API call timed out after {}s", self.config.openai_timeout_secs))??;

        if let Some(usage) = &response.usage {
            info!("OpenAI used {} prompt and {} completion tokens.", usage.prompt_tokens, usage.completion_tokens);
        }

        let content = response.choices.into_iter().next().and_then(|choice| choice.message.content).unwrap_or_default();

        if content.trim().is_empty() {
            warn!("OpenAI returned an empty completion.");
            return Err(anyhow::anyhow!("The model returned an empty response."));
        }

        Ok(content.trim().to_string())
    }
}

/// Build the system and user messages for one summary.
pub fn build_summary_messages(config: &Config, query: &str, evidence: &[CommentRecord]) -> Vec<ChatCompletionRequestMessage> {
    let directive = render_directive(&config.summarizer_directive, query);
    let comments = render_evidence_block(&format_evidence(evidence, config.max_evidence_chars));

    vec![
        ChatCompletionRequestMessage::System(ChatCompletionRequestSystemMessage {
            content: ChatCompletionRequestSystemMessageContent::Text(directive),
            name: Some("System".to_string()),
        }),
        ChatCompletionRequestMessage::User(ChatCompletionRequestUserMessage {
            content: ChatCompletionRequestUserMessageContent::Text(comments),
            name: Some("User".to_string()),
        }),
    ]
}

// Tests.

#[cfg(test)]
mod tests {
    use super::*;
    use crate::base::config::ConfigInner;

    fn create_test_config() -> Config {
        Config {
            inner: Arc::new(ConfigInner {
                openai_api_key: std::env::var("OPENAI_API_KEY").unwrap_or_else(|_| "test_key".to_string()),
                openai_max_tokens: 200u32, // Small for tests
                ..Default::default()
            }),
        }
    }

    fn has_api_key() -> bool {
        std::env::var("OPENAI_API_KEY").is_ok()
    }

    fn evidence() -> Vec<CommentRecord> {
        vec![
            CommentRecord::new("Turn off always-on display, it roughly doubled my battery life.", 120, "https://www.reddit.com/r/phones/comments/a/x/1/"),
            CommentRecord::new("Battery health matters more than settings after two years.", 45, "https://www.reddit.com/r/phones/comments/a/x/2/"),
        ]
    }

    fn text_of(message: &ChatCompletionRequestMessage) -> &str {
        match message {
            ChatCompletionRequestMessage::System(ChatCompletionRequestSystemMessage {
                content: ChatCompletionRequestSystemMessageContent::Text(text),
                ..
            }) => text.as_str(),
            ChatCompletionRequestMessage::User(ChatCompletionRequestUserMessage {
                content: ChatCompletionRequestUserMessageContent::Text(text),
                ..
            }) => text.as_str(),
            _ => panic!("unexpected message shape"),
        }
    }

    #[test]
    fn test_summary_messages_shape() {
        let config = create_test_config();

        let messages = build_summary_messages(&config, "How do I improve battery life?", &evidence());

        assert_eq!(messages.len(), 2);
        assert!(text_of(&messages[0]).contains("\"How do I improve battery life?\""));

        let user = text_of(&messages[1]);
        assert!(user.starts_with("COMMENTS BEGIN\n"));
        assert!(user.ends_with("\nCOMMENTS END"));
        assert!(user.contains("Turn off always-on display, it roughly doubled my battery life. : 120 : https://www.reddit.com/r/phones/comments/a/x/1/"));
    }

    #[test]
    fn test_summary_messages_respect_evidence_budget() {
        let config = Config {
            inner: Arc::new(ConfigInner {
                max_evidence_chars: 150,
                ..Default::default()
            }),
        };

        let messages = build_summary_messages(&config, "q", &evidence());
        let user = text_of(&messages[1]);

        // Only the first, higher-ranked comment fits.
        assert!(user.contains("always-on display"));
        assert!(!user.contains("Battery health"));
    }

    #[test]
    fn test_request_uses_generation_config() {
        let client = OpenAiLlmClient::new(&create_test_config());

        let request = client.build_request("q", &evidence()).unwrap();

        assert_eq!(request.model, "gpt-4.1-mini");
        assert_eq!(request.temperature, Some(0.2));
        assert_eq!(request.top_p, Some(0.95));
        assert_eq!(request.max_completion_tokens, Some(200));
    }

    #[tokio::test]
    async fn test_llm_client_summarize() {
        if !has_api_key() {
            eprintln!("OPENAI_API_KEY not set; skipping live summarizer test.");
            return;
        }

        let client = LlmClient::openai(&create_test_config());

        let response = client.summarize("How do I improve battery life?", &evidence()).await.unwrap();

        assert!(!response.is_empty(), "Response should not be empty");
    }

    #[tokio::test]
    async fn test_llm_client_error_handling_invalid_api_key() {
        let mut config = create_test_config();
        // Use an invalid API key to test error handling
        let config_inner = Arc::make_mut(&mut config.inner);
        config_inner.openai_api_key = "sk-invalid-key-for-testing".to_string();
        config_inner.openai_timeout_secs = 10;

        let client = LlmClient::openai(&config);

        let result = client.summarize("test", &evidence()).await;
        assert!(result.is_err(), "Should fail with invalid API key");
    }
}
