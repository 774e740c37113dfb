//! The evidence pipeline.
//!
//! Turns a free-text question into a ranked list of forum comments:
//! - `filter`: authors whose comments are never evidence.
//! - `harvest`: the best comments of one submission, in the forum's own order.
//! - `search`: search, harvest every hit, and rank everything by score.
//! - `format`: render evidence for the summarizer or as a list of links.

pub mod filter;
pub mod format;
pub mod harvest;
pub mod search;
