//! Known automated authors whose comments are never evidence.

use std::{collections::HashSet, sync::Arc};

/// Automated accounts ignored when nothing else is configured.
pub const DEFAULT_BOT_AUTHORS: &[&str] = &["AutoModerator", "GPT-3_Bot", "RemindMeBot"];

/// Read-only set of bot author names.
///
/// Cheap to clone; every clone shares the same set.
#[derive(Debug, Clone)]
pub struct BotFilter {
    authors: Arc<HashSet<String>>,
}

impl BotFilter {
    pub fn new<I, S>(authors: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            authors: Arc::new(authors.into_iter().map(Into::into).collect()),
        }
    }

    /// Whether `author` is a known bot.  Matching is exact.
    pub fn is_bot(&self, author: &str) -> bool {
        self.authors.contains(author)
    }

    pub fn len(&self) -> usize {
        self.authors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.authors.is_empty()
    }
}

impl Default for BotFilter {
    fn default() -> Self {
        Self::new(DEFAULT_BOT_AUTHORS.iter().copied())
    }
}
