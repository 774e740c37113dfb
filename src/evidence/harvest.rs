//! Per-submission comment harvesting.
//!
//! Harvesting keeps the order the forum returned ("best" sort).  Ranking across
//! submissions happens later, in [`super::search`].

use tracing::{debug, instrument, warn};
use url::Url;

use crate::{
    base::types::CommentRecord,
    service::forum::{ForumClient, ForumError, ForumRes, RawComment, Submission},
};

use super::filter::BotFilter;

/// Author reported for comments whose account is gone.
pub const DELETED_AUTHOR: &str = "[deleted]";

/// Bodies the forum substitutes for deleted or moderator-removed comments.
const PLACEHOLDER_BODIES: &[&str] = &["[deleted]", "[removed]"];

/// Whether the comment stands in for something that was removed.
pub fn is_placeholder(comment: &RawComment) -> bool {
    let deleted_author = match comment.author.as_deref() {
        None => true,
        Some(author) => author.is_empty() || author == DELETED_AUTHOR,
    };

    deleted_author || PLACEHOLDER_BODIES.contains(&comment.body.trim())
}

/// Whether the comment may be used as evidence at all.
fn is_eligible(comment: &RawComment, filter: &BotFilter) -> bool {
    if is_placeholder(comment) {
        return false;
    }

    !comment.author.as_deref().is_some_and(|author| filter.is_bot(author))
}

/// Turn a raw comment into a record.
///
/// Returns `None` for comments with nothing left after trimming, or whose
/// permalink does not form an absolute URL under `origin`.
pub fn normalize(comment: RawComment, origin: &Url) -> Option<CommentRecord> {
    let body = comment.body.trim();
    if body.is_empty() {
        return None;
    }

    // Scheme-relative paths (`//host/..`) would resolve to another host.
    if !comment.permalink.starts_with('/') || comment.permalink.starts_with("//") {
        warn!("Skipping comment with unexpected permalink `{}`.", comment.permalink);
        return None;
    }

    let source_url = match origin.join(&comment.permalink) {
        Ok(url) => url,
        Err(err) => {
            warn!("Skipping comment with unusable permalink `{}`: {err}", comment.permalink);
            return None;
        }
    };

    if source_url.origin() != origin.origin() {
        warn!("Skipping comment whose permalink leaves the forum: `{}`.", comment.permalink);
        return None;
    }

    Some(CommentRecord::new(body, comment.score, source_url.as_str()))
}

/// Get the first `limit` usable comments of a submission, in the forum's "best" order.
///
/// Comments by known bots and removed placeholders are skipped.  If the comments
/// cannot be fetched, the error is returned and nothing is harvested.
#[instrument(skip_all, fields(submission = %submission.id, limit = limit))]
pub async fn top_comments(forum: &ForumClient, filter: &BotFilter, submission: &Submission, limit: usize) -> ForumRes<Vec<CommentRecord>> {
    let origin = Url::parse(forum.web_origin()).map_err(|e| ForumError::RemoteService(format!("invalid forum web origin: {e}")))?;

    let comments = forum.fetch_comments(submission).await?;
    let received = comments.len();

    let records = comments
        .into_iter()
        .filter(|comment| is_eligible(comment, filter))
        .filter_map(|comment| normalize(comment, &origin))
        .take(limit)
        .collect::<Vec<_>>();

    debug!("Kept {} of {} comments.", records.len(), received);

    Ok(records)
}

// Tests.
