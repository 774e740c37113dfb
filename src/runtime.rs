//! Runtime services and shared state for the perplexed-bot.

use tracing::instrument;

use crate::{
    base::{
        config::Config,
        types::{Res, Void},
    },
    evidence::search::EvidenceSearcher,
    service::{chat::ChatClient, forum::ForumClient, llm::LlmClient},
};

/// Runtime service context that can be shared across the application.
///
/// This struct holds the evidence searcher, the LLM client, the chat client, and
/// configuration.  It is designed to be trivially cloneable, allowing it to be
/// passed around without the need for `Arc` or `Mutex`.
#[derive(Clone)]
pub struct Runtime {
    /// The configuration for the application.
    pub config: Config,
    /// The evidence searcher instance.
    pub searcher: EvidenceSearcher,
    /// The LLM client instance.
    pub llm: LlmClient,
    /// The chat client instance.
    pub chat: ChatClient,
}

impl Runtime {
    /// Create a new runtime instance.
    #[instrument(skip_all)]
    pub async fn new(config: Config) -> Res<Self> {
        // Initialize the forum and the searcher on top of it.
        let forum = ForumClient::reddit(&config).await?;
        let searcher = EvidenceSearcher::from_config(forum, &config);

        // Initialize the LLM client.
        let llm = LlmClient::openai(&config);

        // Initialize the chat client.
        let chat = ChatClient::slack(&config, searcher.clone(), llm.clone()).await?;

        Ok(Self { config, searcher, llm, chat })
    }

    pub async fn start(&self) -> Void {
        self.chat.start().await
    }
}
