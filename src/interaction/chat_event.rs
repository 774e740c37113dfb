//! Handling of user commands: run the evidence pipeline and reply.

use tracing::{Instrument, error, info, instrument};

use crate::{
    base::{
        config::Config,
        types::{Res, Void},
    },
    evidence::{
        format::format_links,
        search::{EvidenceSearcher, SearchRequest},
    },
    interaction::command::Command,
    service::{chat::ChatClient, llm::LlmClient},
};

/// Reply used whenever a command fails.
pub const APOLOGY: &str = "Unable to answer that right now, please try again later.";

/// Reply used when the forum has nothing to offer.
pub const NO_EVIDENCE: &str = "I couldn't find any discussions about that.";

/// Handles a chat command.
///
/// Spawns a task that posts a placeholder message, runs the command, and then
/// edits the placeholder into the reply.
#[instrument(skip_all)]
pub fn handle_chat_event(command: Command, channel_id: String, thread_ts: String, searcher: EvidenceSearcher, llm: LlmClient, chat: ChatClient, config: Config) {
    tokio::spawn(async move {
        // Process the event.
        let result = handle_chat_event_internal(command, channel_id, thread_ts, &searcher, &llm, &chat, &config).in_current_span().await;

        // Log any errors.
        if let Err(err) = &result {
            error!("Error while handling: {}", err);
        }
    });
}

#[instrument(skip_all, fields(command = %command))]
async fn handle_chat_event_internal(
    command: Command,
    channel_id: String,
    thread_ts: String,
    searcher: &EvidenceSearcher,
    llm: &LlmClient,
    chat: &ChatClient,
    config: &Config,
) -> Void {
    let placeholder_ts = chat.send_message(&channel_id, &thread_ts, command.processing_message()).await?;

    let reply = respond(&command, searcher, llm, config).await;

    chat.update_message(&channel_id, &placeholder_ts, &reply).await?;

    Ok(())
}

/// Produce the reply for a command, never failing.
///
/// Errors are logged and replaced by [`APOLOGY`].
pub async fn respond(command: &Command, searcher: &EvidenceSearcher, llm: &LlmClient, config: &Config) -> String {
    match try_respond(command, searcher, llm, config).await {
        Ok(reply) => reply,
        Err(err) => {
            error!("Failed to process `{command}`: {err:#}");
            APOLOGY.to_string()
        }
    }
}

/// Produce the reply for a command.
#[instrument(skip_all)]
pub async fn try_respond(command: &Command, searcher: &EvidenceSearcher, llm: &LlmClient, config: &Config) -> Res<String> {
    let request = SearchRequest::from_config(command.query(), config);
    let evidence = searcher.search(&request).await?;

    if evidence.is_empty() {
        info!("No evidence found.");
        return Ok(NO_EVIDENCE.to_string());
    }

    match command {
        Command::Question { query } => llm.summarize(query, &evidence).await,
        Command::Search { query } => Ok(format!("Top discussions for *{query}*:\n{}", format_links(&evidence, config.link_list_limit))),
    }
}

// Tests.
