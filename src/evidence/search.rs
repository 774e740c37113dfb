//! Query-level evidence gathering: search, harvest every hit, rank globally.

use futures::{StreamExt, TryStreamExt, stream};
use tracing::{info, instrument};

use crate::{
    base::{config::Config, types::CommentRecord},
    service::forum::{ForumClient, ForumRes, Submission},
};

use super::{filter::BotFilter, harvest::top_comments};

/// Parameters of one evidence search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchRequest {
    pub query: String,
    /// Forum category to search, or `all`.
    pub scope: String,
    /// Number of submissions to harvest.
    pub result_limit: usize,
    /// Number of comments kept per submission.
    pub per_submission_limit: usize,
}

impl SearchRequest {
    /// A request with the default scope and limits.
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            scope: "all".to_string(),
            result_limit: 5,
            per_submission_limit: 5,
        }
    }

    /// A request using the scope and limits from configuration.
    pub fn from_config(query: impl Into<String>, config: &Config) -> Self {
        Self {
            query: query.into(),
            scope: config.reddit_search_scope.clone(),
            result_limit: config.reddit_search_limit,
            per_submission_limit: config.reddit_comments_per_submission,
        }
    }

    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = scope.into();
        self
    }

    pub fn with_result_limit(mut self, limit: usize) -> Self {
        self.result_limit = limit;
        self
    }

    pub fn with_per_submission_limit(mut self, limit: usize) -> Self {
        self.per_submission_limit = limit;
        self
    }
}

/// Gathers and ranks evidence for a query.
///
/// Holds no per-query state, so one instance serves every request.  This is
/// trivially cloneable and can be passed around without the need for `Arc` or `Mutex`.
#[derive(Clone)]
pub struct EvidenceSearcher {
    forum: ForumClient,
    filter: BotFilter,
    concurrency: usize,
}

impl EvidenceSearcher {
    /// Create a searcher.  A `concurrency` of 1 harvests submissions one at a time.
    pub fn new(forum: ForumClient, filter: BotFilter, concurrency: usize) -> Self {
        Self {
            forum,
            filter,
            concurrency: concurrency.max(1),
        }
    }

    /// Create a searcher using the bot list and concurrency from configuration.
    pub fn from_config(forum: ForumClient, config: &Config) -> Self {
        Self::new(forum, BotFilter::new(config.bot_authors.iter().cloned()), config.reddit_harvest_concurrency)
    }

    pub fn forum(&self) -> &ForumClient {
        &self.forum
    }

    /// Search the forum and return every harvested comment, best score first.
    ///
    /// Equal scores keep their harvest order: earlier submissions first, then
    /// earlier comments within a submission.  If the search or any single
    /// harvest fails, the whole call fails.  No hits is an empty list, not an error.
    #[instrument(name = "EvidenceSearcher::search", skip_all, fields(query = %request.query, scope = %request.scope))]
    pub async fn search(&self, request: &SearchRequest) -> ForumRes<Vec<CommentRecord>> {
        let submissions = self.forum.search(&request.query, &request.scope, request.result_limit).await?;

        if submissions.is_empty() {
            info!("No submissions matched.");
            return Ok(Vec::new());
        }

        let harvested = self.harvest_all(&submissions, request.per_submission_limit).await?;
        let ranked = rank(harvested.into_iter().flatten().collect());

        info!("Gathered {} comments from {} submissions.", ranked.len(), submissions.len());

        Ok(ranked)
    }

    /// Harvest each submission, yielding results in submission order whatever order they complete in.
    async fn harvest_all(&self, submissions: &[Submission], limit: usize) -> ForumRes<Vec<Vec<CommentRecord>>> {
        // Collect first: a stream mapped through a borrowing closure cannot be moved into `tokio::spawn`.
        let harvests = submissions.iter().map(|submission| top_comments(&self.forum, &self.filter, submission, limit)).collect::<Vec<_>>();

        stream::iter(harvests).buffered(self.concurrency).try_collect().await
    }
}

/// Order records by score, highest first.  The sort is stable.
pub fn rank(mut records: Vec<CommentRecord>) -> Vec<CommentRecord> {
    records.sort_by(|a, b| b.score.cmp(&a.score));
    records
}

// Tests.
