//! Core components, types, and utilities for the perplexed-bot.
//!
//! This module contains fundamental building blocks used throughout the application:
//! - Configuration handling and environment variables.
//! - Prompt templates for the summarizer.
//! - Common types and result handling.

pub mod config;
pub mod prompts;
pub mod types;
