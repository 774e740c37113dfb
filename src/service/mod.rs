//! Service integrations for external APIs and clients.
//!
//! This module contains implementations for various services used by the perplexed-bot:
//! - Chat services (e.g., Slack)
//! - Forum services (e.g., Reddit)
//! - LLM services (e.g., OpenAI)
//!
//! Each service module defines both generic traits and concrete implementations,
//! allowing for extensibility and easy testing.

pub mod chat;
pub mod forum;
pub mod llm;
