//! Event handling and user interactions for perplexed-bot.
//!
//! This module provides functionality for handling chat commands:
//! - Parsing raw text into structured commands
//! - Coordinating responses between services (forum, LLM, chat)

pub mod chat_event;
pub mod command;
