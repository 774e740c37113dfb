pub mod openai;

use std::{ops::Deref, sync::Arc};

use async_trait::async_trait;

use crate::base::types::{CommentRecord, Res};

// Traits.

/// Generic LLM client trait that clients must implement.
///
/// This trait defines the summarization step of the bot.  Implementing this
/// trait allows different LLM providers to be used with the perplexed-bot.
#[async_trait]
pub trait GenericLlmClient: Send + Sync + 'static {
    /// Answer `query` using only the given evidence.
    ///
    /// The evidence is ranked best first; implementations may drop the tail to
    /// fit their prompt budget, but must not reorder it.
    async fn summarize(&self, query: &str, evidence: &[CommentRecord]) -> Res<String>;
}

// Structs.

/// LLM client for the application.
///
/// This is trivially cloneable and can be passed around without the need for `Arc` or `Mutex`.
#[derive(Clone)]
pub struct LlmClient {
    inner: Arc<dyn GenericLlmClient>,
}

impl Deref for LlmClient {
    type Target = dyn GenericLlmClient;

    fn deref(&self) -> &Self::Target {
        &*self.inner
    }
}

impl LlmClient {
    pub fn new(inner: Arc<dyn GenericLlmClient>) -> Self {
        Self { inner }
    }
}
