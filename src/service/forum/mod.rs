//! Discussion forum integration.
//!
//! The forum client owns the authenticated session with the forum service and
//! exposes the two primitives the evidence pipeline needs: searching for
//! submissions, and fetching a submission's comments as a flat list.

pub mod reddit;

use std::{ops::Deref, sync::Arc};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

// Errors.

/// Errors surfaced by a forum client.
#[derive(Debug, Error)]
pub enum ForumError {
    /// Credentials are missing or were rejected.
    #[error("forum authentication failed: {0}")]
    Authentication(String),

    /// A search or comment request failed (transport, status, or payload).
    #[error("forum request failed: {0}")]
    RemoteService(String),
}

impl From<reqwest::Error> for ForumError {
    fn from(err: reqwest::Error) -> Self {
        ForumError::RemoteService(err.to_string())
    }
}

pub type ForumRes<T> = Result<T, ForumError>;

// Types.

/// One search hit.
///
/// The pipeline treats this as opaque and only hands it back to the client that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    /// Short ID (e.g., `1abcde`).
    pub id: String,
    /// Fully-qualified name (e.g., `t3_1abcde`).
    pub fullname: String,
    pub title: String,
    pub subreddit: String,
    pub permalink: String,
    pub score: i64,
    pub num_comments: u64,
    pub created: Option<DateTime<Utc>>,
}

/// A comment as received from the forum, before filtering and normalization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawComment {
    /// Author name; `None` when the account no longer exists.
    pub author: Option<String>,
    pub body: String,
    pub score: i64,
    /// Path of the comment relative to the forum's web origin.
    pub permalink: String,
}

// Traits.

/// Generic forum client trait that clients must implement.
///
/// Implementations are shared across concurrent requests, so they must be safe
/// to call from many tasks at once.
#[async_trait]
pub trait GenericForumClient: Send + Sync + 'static {
    /// The web origin that comment permalinks are relative to.
    fn web_origin(&self) -> &str;

    /// Search for submissions matching `query`.
    ///
    /// `scope` restricts the search to one forum category; `all` means no restriction.
    /// Returns at most `limit` hits, in the service's relevance order.
    async fn search(&self, query: &str, scope: &str, limit: usize) -> ForumRes<Vec<Submission>>;

    /// Fetch every comment under a submission, in "best" order.
    ///
    /// The tree is flattened breadth-first, and never contains "load more" placeholders.
    async fn fetch_comments(&self, submission: &Submission) -> ForumRes<Vec<RawComment>>;
}

// Structs.

/// Forum client for the application.
///
/// This is trivially cloneable and can be passed around without the need for `Arc` or `Mutex`.
#[derive(Clone)]
pub struct ForumClient {
    inner: Arc<dyn GenericForumClient>,
}

impl Deref for ForumClient {
    type Target = dyn GenericForumClient;

    fn deref(&self) -> &Self::Target {
        &*self.inner
    }
}

impl ForumClient {
    pub fn new(inner: Arc<dyn GenericForumClient>) -> Self {
        Self { inner }
    }
}

// Test helpers.
