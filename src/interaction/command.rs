//! Structured chat commands.
//!
//! Raw chat text is parsed here, once.  Nothing past this point sees unparsed text.

use std::fmt;

/// Prefix of the question command.
pub const QUESTION_PREFIX: &str = "/question";
/// Prefix of the link search command.
pub const SEARCH_PREFIX: &str = "/search";

/// A validated user command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Answer a free-form question from forum discussions.
    Question { query: String },
    /// List forum comment links matching a query.
    Search { query: String },
}

impl Command {
    /// Parse `"/question <text>"` or `"/search <text>"`.
    ///
    /// Returns `None` for anything else, including a known prefix with nothing after it.
    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim();
        let (head, rest) = text.split_once(char::is_whitespace).unwrap_or((text, ""));

        Self::from_parts(head, rest)
    }

    /// Build a command from a slash command name and its argument text.
    pub fn from_parts(name: &str, args: &str) -> Option<Self> {
        let query = args.trim();
        if query.is_empty() {
            return None;
        }

        match name {
            QUESTION_PREFIX => Some(Command::Question { query: query.to_string() }),
            SEARCH_PREFIX => Some(Command::Search { query: query.to_string() }),
            _ => None,
        }
    }

    /// The user's query text.
    pub fn query(&self) -> &str {
        match self {
            Command::Question { query } | Command::Search { query } => query,
        }
    }

    /// Text shown while the command is being processed.
    pub fn processing_message(&self) -> &'static str {
        match self {
            Command::Question { .. } => "Processing your question...",
            Command::Search { .. } => "Searching...",
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Question { query } => write!(f, "{QUESTION_PREFIX} {query}"),
            Command::Search { query } => write!(f, "{SEARCH_PREFIX} {query}"),
        }
    }
}
