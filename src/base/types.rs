//! Common types and result aliases.

use serde::{Deserialize, Serialize};

/// Application error.
pub type Err = anyhow::Error;
/// Application result.
pub type Res<T> = Result<T, Err>;
/// Result with no value.
pub type Void = Res<()>;

/// A single piece of evidence: one forum comment, normalized.
///
/// Records are built once while harvesting and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommentRecord {
    /// Trimmed comment text (never empty).
    pub body: String,
    /// Net score at fetch time.  May be zero or negative.
    pub score: i64,
    /// Absolute permalink to the comment.
    pub source_url: String,
}

impl CommentRecord {
    /// Create a record.
    pub fn new(body: impl Into<String>, score: i64, source_url: impl Into<String>) -> Self {
        Self {
            body: body.into(),
            score,
            source_url: source_url.into(),
        }
    }
}
