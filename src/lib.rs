//! Library root for `perplexed-bot`.
//!
//! Perplexed-bot answers questions in chat using what people said on Reddit:
//! - Searches Reddit for submissions matching the question
//! - Harvests the best human comments of each submission
//! - Ranks the comments by score
//! - Asks an LLM to summarize them into an answer, or lists the links
//!
//! The bot integrates with Slack for chat, Reddit for evidence, and OpenAI for
//! summaries. The architecture is built around extensible traits that allow for
//! different implementations of each service.

#[deny(missing_docs)]
pub mod base;
pub mod evidence;
pub mod interaction;
pub mod runtime;
pub mod service;

use base::{
    config::Config,
    types::{Res, Void},
};
use evidence::search::EvidenceSearcher;
use interaction::command::Command;
use rustls::crypto;
use service::{forum::ForumClient, llm::LlmClient};
use tracing::{info, warn};

/// Install the process-wide TLS crypto provider, once.
fn install_crypto_provider() {
    if crypto::ring::default_provider().install_default().is_err() {
        warn!("A crypto provider was already installed.");
    }
}

/// Public async entry for the binary crate.
///
/// Sets up necessary services and starts the perplexed-bot runtime:
/// - Initializes the crypto provider
/// - Creates the runtime context with forum, LLM, and chat clients
/// - Starts the main event loop for processing messages
pub async fn start(config: Config) -> Void {
    info!("Starting perplexed-bot ...");

    // Start the crypto provider.
    install_crypto_provider();

    // Initialize the runtime.
    let runtime = runtime::Runtime::new(config).await?;

    // Start the runtime.
    runtime.start().await?;

    Ok(())
}

/// Run a single command without a chat service and return the reply.
///
/// Unlike the chat path, failures are returned rather than replaced by an apology.
pub async fn run_once(config: Config, command: Command) -> Res<String> {
    install_crypto_provider();

    let forum = ForumClient::reddit(&config).await?;
    let searcher = EvidenceSearcher::from_config(forum, &config);
    let llm = LlmClient::openai(&config);

    interaction::chat_event::try_respond(&command, &searcher, &llm, &config).await
}
