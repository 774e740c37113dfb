//! Slack integration for perplexed-bot.
//!
//! Listens over Socket Mode for:
//! - channel messages that start with a command prefix,
//! - app mentions (the mention is stripped, and plain text is treated as a question),
//! - the `/question` and `/search` slash commands.
//!
//! Replies are posted as a placeholder message that is edited once the answer is ready.

use crate::{
    base::{
        config::Config,
        types::{Res, Void},
    },
    evidence::search::EvidenceSearcher,
    interaction::{self, command::Command},
    service::llm::LlmClient,
};
use async_trait::async_trait;
use hyper_rustls::HttpsConnector;
use hyper_util::client::legacy::connect::HttpConnector;
use slack_morphism::prelude::*;
use tracing::{debug, info, instrument, warn};

use std::{ops::Deref, sync::Arc};

use super::{ChatClient, GenericChatClient};

// Type aliases.

type FullClient = slack_morphism::SlackClient<SlackClientHyperConnector<HttpsConnector<HttpConnector>>>;

// Extra methods on `ChatClient` applied by the slack implementation.

impl ChatClient {
    /// Creates a new Slack chat client.
    pub async fn slack(config: &Config, searcher: EvidenceSearcher, llm: LlmClient) -> Res<Self> {
        let client = SlackChatClient::new(config, searcher, llm).await?;
        Ok(Self { inner: Arc::new(client) })
    }
}

impl From<SlackChatClient> for ChatClient {
    fn from(client: SlackChatClient) -> Self {
        Self { inner: Arc::new(client) }
    }
}

// Structs.

/// User state for the slack socket client.
struct SlackUserState {
    searcher: EvidenceSearcher,
    llm: LlmClient,
    chat: ChatClient,
    config: Config,
    bot_user_id: String,
}

impl SlackUserState {
    /// Hand a parsed command to the interaction layer.
    fn dispatch(&self, command: Command, channel_id: String, thread_ts: String) {
        interaction::chat_event::handle_chat_event(command, channel_id, thread_ts, self.searcher.clone(), self.llm.clone(), self.chat.clone(), self.config.clone());
    }
}

/// Slack client implementation.
#[derive(Clone)]
struct SlackChatClient {
    pub app_token: SlackApiToken,
    pub bot_token: SlackApiToken,
    pub bot_user_id: String,
    pub client: Arc<FullClient>,
    pub searcher: EvidenceSearcher,
    pub llm: LlmClient,
    pub config: Config,
}

impl Deref for SlackChatClient {
    type Target = FullClient;

    fn deref(&self) -> &Self::Target {
        &self.client
    }
}

impl SlackChatClient {
    /// Create a new Slack chat client.
    #[instrument(name = "SlackChatClient::new", skip_all)]
    pub async fn new(config: &Config, searcher: EvidenceSearcher, llm: LlmClient) -> Res<Self> {
        if config.slack_app_token.is_empty() || config.slack_bot_token.is_empty() {
            anyhow::bail!("Both `slack_app_token` and `slack_bot_token` must be set to serve Slack.");
        }

        // Initialize tokens.

        let app_token = SlackApiToken::new(SlackApiTokenValue(config.slack_app_token.clone()));
        let bot_token = SlackApiToken::new(SlackApiTokenValue(config.slack_bot_token.clone()));

        // Initialize the Slack client.

        let https_connector = HttpsConnector::<HttpConnector>::builder().with_native_roots()?.https_only().enable_all_versions().build();
        let connector = SlackClientHyperConnector::with_connector(https_connector);
        let client = Arc::new(slack_morphism::SlackClient::new(connector));

        // Get the bot's user ID.

        let session = client.open_session(&bot_token);
        let bot_user = session.auth_test().await?;
        let bot_user_id = bot_user.user_id.0;

        info!("Slack bot user ID: {}", bot_user_id);

        Ok(Self {
            app_token,
            bot_token,
            bot_user_id,
            client,
            searcher,
            llm,
            config: config.clone(),
        })
    }
}

#[async_trait]
impl GenericChatClient for SlackChatClient {
    fn bot_user_id(&self) -> &str {
        &self.bot_user_id
    }

    async fn start(&self) -> Void {
        // Initialize the socket mode listener.

        let socket_mode_callbacks = SlackSocketModeListenerCallbacks::new().with_command_events(handle_command_event).with_push_events(handle_push_event);

        // Initialize the socket mode listener environment.

        let listener_environment = Arc::new(SlackClientEventsListenerEnvironment::new(self.client.clone()).with_user_state(SlackUserState {
            searcher: self.searcher.clone(),
            llm: self.llm.clone(),
            chat: ChatClient::from(self.clone()),
            config: self.config.clone(),
            bot_user_id: self.bot_user_id.clone(),
        }));

        let socket_mode_listener = Arc::new(SlackClientSocketModeListener::new(
            &SlackClientSocketModeConfig::new(),
            listener_environment.clone(),
            socket_mode_callbacks,
        ));

        // Register an app token to listen for events.
        socket_mode_listener.listen_for(&self.app_token).await?;

        // Serve until Ctrl-C.
        socket_mode_listener.serve().await;

        Ok(())
    }

    #[instrument(skip(self))]
    async fn send_message(&self, channel_id: &str, thread_ts: &str, text: &str) -> Res<String> {
        let message = SlackMessageContent::new().with_text(text.to_string());

        let mut request = SlackApiChatPostMessageRequest::new(SlackChannelId(channel_id.to_string()), message).with_as_user(true).with_link_names(true);
        if !thread_ts.is_empty() {
            request = request.with_thread_ts(SlackTs(thread_ts.to_string()));
        }

        let session = self.client.open_session(&self.bot_token);

        let response = session.chat_post_message(&request).await.map_err(|e| anyhow::anyhow!("Failed to send message: {}", e))?;

        Ok(response.ts.0)
    }

    #[instrument(skip(self, text))]
    async fn update_message(&self, channel_id: &str, ts: &str, text: &str) -> Void {
        let content = SlackMessageContent::new().with_text(text.to_string());

        let request = SlackApiChatUpdateRequest::new(SlackChannelId(channel_id.to_string()), content, SlackTs(ts.to_string()));

        let session = self.client.open_session(&self.bot_token);

        let _ = session.chat_update(&request).await.map_err(|e| anyhow::anyhow!("Failed to update message: {}", e))?;

        Ok(())
    }
}

// Event helpers.

/// Remove mentions of the bot from `text`.
fn strip_mention(text: &str, bot_user_id: &str) -> String {
    text.replace(&format!("<@{bot_user_id}>"), " ").trim().to_string()
}

/// Interpret the text of an app mention.
///
/// A command prefix is honoured; any other non-empty text is a question.
fn mention_command(text: &str, bot_user_id: &str) -> Option<Command> {
    let text = strip_mention(text, bot_user_id);

    Command::parse(&text).or_else(|| (!text.is_empty()).then(|| Command::Question { query: text }))
}

/// Replies go into the originating thread, or start a thread under the message.
fn reply_thread(origin: &SlackMessageOrigin) -> String {
    origin.thread_ts.as_ref().unwrap_or(&origin.ts).0.clone()
}

// Socket mode listener callbacks for Slack.

/// Handles the `/question` and `/search` slash commands.
#[instrument(skip_all)]
async fn handle_command_event(
    event: SlackCommandEvent,
    _client: Arc<SlackHyperClient>,
    states: SlackClientEventsUserState,
) -> Result<SlackCommandEventResponse, Box<dyn std::error::Error + Send + Sync>> {
    let states = states.read().await;
    let user_state = states.get_user_state::<SlackUserState>().ok_or(anyhow::anyhow!("Failed to get user state"))?;

    let Some(command) = Command::from_parts(&event.command.0, event.text.as_deref().unwrap_or_default()) else {
        warn!("Unusable slash command: {} {:?}", event.command.0, event.text);
        return Ok(SlackCommandEventResponse::new(
            SlackMessageContent::new().with_text("Usage: `/question <your question>` or `/search <keywords>`.".into()),
        ));
    };

    info!("Received slash command `{}` ...", command);

    user_state.dispatch(command, event.channel_id.0, String::new());

    Ok(SlackCommandEventResponse::new(SlackMessageContent::new().with_text("On it.".into())))
}

/// Handles push events from Slack.
#[instrument(skip_all)]
async fn handle_push_event(event_callback: SlackPushEventCallback, _client: Arc<SlackHyperClient>, states: SlackClientEventsUserState) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let event = event_callback.event;
    let states = states.read().await;
    let user_state = states.get_user_state::<SlackUserState>().ok_or(anyhow::anyhow!("Failed to get user state"))?;

    match event {
        SlackEventCallbackBody::Message(slack_message_event) => {
            // Never answer ourselves or other bots.
            let sender = &slack_message_event.sender;
            if sender.bot_id.is_some() || sender.user.as_ref().is_some_and(|u| u.0 == user_state.bot_user_id) {
                debug!("Skipping message event from a bot.");
                return Ok(());
            }

            // Edits, deletions and other subtypes are not new commands.
            if slack_message_event.subtype.is_some() {
                debug!("Skipping message event with a subtype.");
                return Ok(());
            }

            // If the message @mentions the bot, skip, and let the app mention handler take care of it.
            let text = slack_message_event.content.as_ref().and_then(|c| c.text.as_deref()).unwrap_or_default();
            if text.contains(&user_state.bot_user_id) {
                debug!("Skipping message event because it mentions the bot.");
                return Ok(());
            }

            let Some(command) = Command::parse(text) else {
                debug!("Ignoring message that is not a command.");
                return Ok(());
            };

            info!("Received message command `{}` ...", command);

            let channel_id = slack_message_event.origin.channel.as_ref().ok_or(anyhow::anyhow!("Failed to get channel ID"))?.0.to_owned();
            let thread_ts = reply_thread(&slack_message_event.origin);
            user_state.dispatch(command, channel_id, thread_ts);
        }
        SlackEventCallbackBody::AppMention(slack_app_mention_event) => {
            let text = slack_app_mention_event.content.text.as_deref().unwrap_or_default();

            let Some(command) = mention_command(text, &user_state.bot_user_id) else {
                debug!("Ignoring empty app mention.");
                return Ok(());
            };

            info!("Received app mention `{}` ...", command);

            let channel_id = slack_app_mention_event.channel.0.to_owned();
            let thread_ts = reply_thread(&slack_app_mention_event.origin);
            user_state.dispatch(command, channel_id, thread_ts);
        }
        _ => {
            warn!("Received unhandled push event.")
        }
    }

    Ok(())
}

// Tests.
