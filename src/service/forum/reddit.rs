//! Reddit implementation of the forum client.
//!
//! Uses Reddit's application-only OAuth flow: the client ID and secret are
//! exchanged for a bearer token at startup, and the token is refreshed when it
//! is about to expire.  All reads go through `oauth.reddit.com`.

use std::{
    collections::{HashMap, VecDeque},
    sync::Arc,
    time::{Duration, Instant},
};

use async_trait::async_trait;
use chrono::DateTime;
use reqwest::StatusCode;
use serde::{Deserialize, de::DeserializeOwned};
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{debug, info, instrument, warn};

use crate::base::config::Config;

use super::{ForumClient, ForumError, ForumRes, GenericForumClient, RawComment, Submission};

// Constants.

/// Name reported in the user agent.
pub const APP_NAME: &str = "Perplexed";

/// Origin that comment permalinks are relative to.
pub const REDDIT_WEB_ORIGIN: &str = "https://www.reddit.com";

/// Origin of the authenticated API.
pub const REDDIT_API_ORIGIN: &str = "https://oauth.reddit.com";
/// Application-only OAuth token endpoint.
pub const REDDIT_TOKEN_URL: &str = "https://www.reddit.com/api/v1/access_token";

/// `morechildren` accepts at most this many IDs per request.
const MORE_CHILDREN_BATCH: usize = 100;

/// Refresh the token this long before Reddit would reject it.
const TOKEN_REFRESH_MARGIN: Duration = Duration::from_secs(60);

/// Build the user agent Reddit asks API clients to send.
pub fn user_agent(username: &str) -> String {
    format!("{APP_NAME}:v{} (by /u/{username})", env!("CARGO_PKG_VERSION"))
}

// Extra methods on `ForumClient` applied by the reddit implementation.

impl ForumClient {
    /// Creates a new Reddit forum client, authenticating immediately.
    pub async fn reddit(config: &Config) -> ForumRes<Self> {
        let client = RedditForumClient::new(config).await?;
        Ok(Self { inner: Arc::new(client) })
    }
}

// Structs.

/// A bearer token and the moment it stops being usable.
#[derive(Debug, Clone)]
struct AccessToken {
    value: String,
    expires_at: Instant,
}

impl AccessToken {
    fn new(value: String, lifetime: Duration) -> Self {
        Self {
            value,
            expires_at: Instant::now() + lifetime.saturating_sub(TOKEN_REFRESH_MARGIN),
        }
    }

    fn is_fresh(&self) -> bool {
        Instant::now() < self.expires_at
    }

    /// Force the next use to fetch a new token.
    fn invalidate(&mut self) {
        self.expires_at = Instant::now();
    }
}

/// Reddit client implementation.
pub struct RedditForumClient {
    http: reqwest::Client,
    api_origin: String,
    token_url: String,
    client_id: String,
    client_secret: String,
    more_comments_limit: usize,
    token: RwLock<AccessToken>,
}

impl RedditForumClient {
    /// Create a new Reddit client and establish its session.
    #[instrument(name = "RedditForumClient::new", skip_all)]
    pub async fn new(config: &Config) -> ForumRes<Self> {
        Self::with_endpoints(config, REDDIT_API_ORIGIN, REDDIT_TOKEN_URL).await
    }

    /// Create a client that talks to the given API origin and token endpoint.
    pub async fn with_endpoints(config: &Config, api_origin: &str, token_url: &str) -> ForumRes<Self> {
        if config.reddit_client_id.trim().is_empty() {
            return Err(ForumError::Authentication("missing Reddit client ID".to_string()));
        }
        if config.reddit_client_secret.trim().is_empty() {
            return Err(ForumError::Authentication("missing Reddit client secret".to_string()));
        }
        if config.reddit_username.trim().is_empty() {
            return Err(ForumError::Authentication("missing Reddit username".to_string()));
        }

        let http = reqwest::Client::builder()
            .user_agent(user_agent(&config.reddit_username))
            .timeout(Duration::from_secs(config.reddit_timeout_secs))
            .build()?;

        let token = request_token(&http, token_url, &config.reddit_client_id, &config.reddit_client_secret).await?;

        info!("Authenticated with Reddit as /u/{}.", config.reddit_username);

        Ok(Self {
            http,
            api_origin: api_origin.trim_end_matches('/').to_string(),
            token_url: token_url.to_string(),
            client_id: config.reddit_client_id.clone(),
            client_secret: config.reddit_client_secret.clone(),
            more_comments_limit: config.reddit_more_comments_limit,
            token: RwLock::new(token),
        })
    }

    /// Get a usable bearer token, refreshing it if it is about to expire.
    async fn bearer(&self) -> ForumRes<String> {
        {
            let token = self.token.read().await;
            if token.is_fresh() {
                return Ok(token.value.clone());
            }
        }

        let mut token = self.token.write().await;

        // Another task may have refreshed while we waited for the lock.
        if !token.is_fresh() {
            info!("Refreshing Reddit access token ...");
            *token = request_token(&self.http, &self.token_url, &self.client_id, &self.client_secret).await?;
        }

        Ok(token.value.clone())
    }

    /// Issue an authenticated GET against the API origin and decode the JSON body.
    async fn get_json<T: DeserializeOwned>(&self, path: &str, query: &[(&str, String)]) -> ForumRes<T> {
        let token = self.bearer().await?;

        let response = self.http.get(format!("{}{path}", self.api_origin)).bearer_auth(token).query(query).send().await?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            warn!("Reddit rejected the access token; it will be renewed on the next request.");
            self.token.write().await.invalidate();
            return Err(ForumError::Authentication(format!("Reddit rejected the access token for `{path}` ({status})")));
        }
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(ForumError::RemoteService(format!("`{path}` returned {status}: {text}")));
        }

        let text = response.text().await?;
        serde_json::from_str(&text).map_err(|e| ForumError::RemoteService(format!("malformed response from `{path}`: {e}")))
    }

    /// Resolve one "load more comments" node into the comments it stands for.
    #[instrument(skip(self, more), fields(ids = more.children.len()))]
    async fn fetch_more_children(&self, link_fullname: &str, more: &MoreData) -> ForumRes<Vec<CommentNode>> {
        let mut things = Vec::new();

        for batch in more.children.chunks(MORE_CHILDREN_BATCH) {
            let query = [
                ("api_type", "json".to_string()),
                ("link_id", link_fullname.to_string()),
                ("children", batch.join(",")),
                ("sort", "best".to_string()),
                ("limit_children", "false".to_string()),
                ("raw_json", "1".to_string()),
            ];

            let response: MoreChildrenResponse = self.get_json("/api/morechildren", &query).await?;

            if !response.json.errors.is_empty() {
                return Err(ForumError::RemoteService(format!("`morechildren` returned errors: {:?}", response.json.errors)));
            }

            if let Some(data) = response.json.data {
                things.extend(data.things);
            }
        }

        assemble_children(&more.parent_id, things)
    }
}

#[async_trait]
impl GenericForumClient for RedditForumClient {
    fn web_origin(&self) -> &str {
        REDDIT_WEB_ORIGIN
    }

    #[instrument(name = "RedditForumClient::search", skip(self))]
    async fn search(&self, query: &str, scope: &str, limit: usize) -> ForumRes<Vec<Submission>> {
        let restrict = scope != "all";
        let params = [
            ("q", query.to_string()),
            ("limit", limit.to_string()),
            ("restrict_sr", restrict.to_string()),
            ("sort", "relevance".to_string()),
            ("raw_json", "1".to_string()),
        ];

        let listing: Listing = self.get_json(&format!("/r/{scope}/search"), &params).await?;
        let mut submissions = parse_submissions(listing)?;

        // Reddit treats `limit` as a hint.
        submissions.truncate(limit);

        info!("Search returned {} submissions.", submissions.len());

        Ok(submissions)
    }

    #[instrument(name = "RedditForumClient::fetch_comments", skip_all, fields(submission = %submission.id))]
    async fn fetch_comments(&self, submission: &Submission) -> ForumRes<Vec<RawComment>> {
        let params = [("sort", "best".to_string()), ("raw_json", "1".to_string())];

        // The comment page is a pair of listings: the submission itself, then its comments.
        let listings: Vec<Listing> = self.get_json(&format!("/comments/{}", submission.id), &params).await?;
        let comments = listings
            .into_iter()
            .nth(1)
            .ok_or_else(|| ForumError::RemoteService(format!("comment page for `{}` has no comment listing", submission.id)))?;

        let mut forest = parse_forest(comments.data.children)?;

        let mut resolved = 0;
        while resolved < self.more_comments_limit {
            let Some((path, more)) = first_expandable_more(&forest) else {
                break;
            };

            let replacement = self.fetch_more_children(&submission.fullname, &more).await?;
            debug!("Resolved a continuation into {} top-level comments.", replacement.len());

            replace_at(&mut forest, &path, replacement);
            resolved += 1;
        }

        let flat = flatten_breadth_first(forest);

        debug!("Fetched {} comments.", flat.len());

        Ok(flat)
    }
}

/// Exchange client credentials for an application-only bearer token.
#[instrument(skip_all)]
async fn request_token(http: &reqwest::Client, token_url: &str, client_id: &str, client_secret: &str) -> ForumRes<AccessToken> {
    let response = http
        .post(token_url)
        .basic_auth(client_id, Some(client_secret))
        .form(&[("grant_type", "client_credentials")])
        .send()
        .await?;

    let status = response.status();
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return Err(ForumError::Authentication(format!("Reddit rejected the client credentials ({status})")));
    }
    if !status.is_success() {
        let text = response.text().await.unwrap_or_default();
        return Err(ForumError::RemoteService(format!("token request returned {status}: {text}")));
    }

    let body: TokenResponse = response.json().await?;

    match body {
        TokenResponse {
            access_token: Some(value),
            expires_in,
            ..
        } => Ok(AccessToken::new(value, Duration::from_secs(expires_in.unwrap_or(3600)))),
        TokenResponse { error, .. } => Err(ForumError::Authentication(error.unwrap_or_else(|| "token response had no access token".to_string()))),
    }
}

// Wire types.

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    expires_in: Option<u64>,
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Listing {
    data: ListingData,
}

#[derive(Debug, Deserialize)]
struct ListingData {
    #[serde(default)]
    children: Vec<Thing>,
}

/// A `{ kind, data }` envelope.  The payload is decoded once the kind is known.
#[derive(Debug, Deserialize)]
struct Thing {
    kind: String,
    #[serde(default)]
    data: Value,
}

#[derive(Debug, Deserialize)]
struct LinkData {
    id: String,
    name: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    subreddit: String,
    #[serde(default)]
    permalink: String,
    #[serde(default)]
    score: i64,
    #[serde(default)]
    num_comments: u64,
    created_utc: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct CommentData {
    name: String,
    #[serde(default)]
    parent_id: String,
    author: Option<String>,
    #[serde(default)]
    body: String,
    #[serde(default)]
    score: i64,
    #[serde(default)]
    permalink: String,
    /// Either an empty string or a nested listing.
    #[serde(default)]
    replies: Value,
}

#[derive(Debug, Clone, Deserialize)]
struct MoreData {
    #[serde(default)]
    parent_id: String,
    #[serde(default)]
    children: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct MoreChildrenResponse {
    json: MoreChildrenJson,
}

#[derive(Debug, Deserialize)]
struct MoreChildrenJson {
    #[serde(default)]
    errors: Vec<Value>,
    data: Option<MoreChildrenData>,
}

#[derive(Debug, Deserialize)]
struct MoreChildrenData {
    #[serde(default)]
    things: Vec<Thing>,
}

// Comment tree.

/// A node of a submission's comment tree.
#[derive(Debug)]
enum CommentNode {
    Comment { fullname: String, comment: RawComment, replies: Vec<CommentNode> },
    More(MoreData),
}

fn malformed(what: &str, err: serde_json::Error) -> ForumError {
    ForumError::RemoteService(format!("malformed {what}: {err}"))
}

/// Decode the `t3` children of a search listing.
fn parse_submissions(listing: Listing) -> ForumRes<Vec<Submission>> {
    let mut submissions = Vec::new();

    for thing in listing.data.children {
        if thing.kind != "t3" {
            warn!("Skipping unexpected `{}` in search results.", thing.kind);
            continue;
        }

        let link: LinkData = serde_json::from_value(thing.data).map_err(|e| malformed("submission", e))?;

        submissions.push(Submission {
            id: link.id,
            fullname: link.name,
            title: link.title,
            subreddit: link.subreddit,
            permalink: link.permalink,
            score: link.score,
            num_comments: link.num_comments,
            created: link.created_utc.and_then(|secs| DateTime::from_timestamp(secs as i64, 0)),
        });
    }

    Ok(submissions)
}

/// Decode one thing into a tree node, along with the fullname of its parent.
fn parse_node(thing: Thing) -> ForumRes<Option<(String, CommentNode)>> {
    match thing.kind.as_str() {
        "t1" => {
            let data: CommentData = serde_json::from_value(thing.data).map_err(|e| malformed("comment", e))?;

            let replies = match data.replies {
                Value::Object(_) => {
                    let listing: Listing = serde_json::from_value(data.replies).map_err(|e| malformed("reply listing", e))?;
                    parse_forest(listing.data.children)?
                }
                _ => Vec::new(),
            };

            let node = CommentNode::Comment {
                fullname: data.name,
                comment: RawComment {
                    author: data.author,
                    body: data.body,
                    score: data.score,
                    permalink: data.permalink,
                },
                replies,
            };

            Ok(Some((data.parent_id, node)))
        }
        "more" => {
            let more: MoreData = serde_json::from_value(thing.data).map_err(|e| malformed("continuation", e))?;
            Ok(Some((more.parent_id.clone(), CommentNode::More(more))))
        }
        other => {
            warn!("Skipping unexpected `{other}` in comment listing.");
            Ok(None)
        }
    }
}

/// Decode a listing's children into a forest, preserving order.
fn parse_forest(things: Vec<Thing>) -> ForumRes<Vec<CommentNode>> {
    let mut forest = Vec::with_capacity(things.len());

    for thing in things {
        if let Some((_, node)) = parse_node(thing)? {
            forest.push(node);
        }
    }

    Ok(forest)
}

/// Rebuild the subtree under `root_parent` from the flat, depth-first list `morechildren` returns.
fn assemble_children(root_parent: &str, things: Vec<Thing>) -> ForumRes<Vec<CommentNode>> {
    let mut nodes = Vec::with_capacity(things.len());
    for thing in things {
        if let Some(pair) = parse_node(thing)? {
            nodes.push(pair);
        }
    }

    // Children always follow their parent, so walking backwards sees every child first.
    let mut children_of: HashMap<String, Vec<CommentNode>> = HashMap::new();

    for (parent, mut node) in nodes.into_iter().rev() {
        if let CommentNode::Comment { fullname, replies, .. } = &mut node
            && let Some(mut own) = children_of.remove(fullname.as_str())
        {
            own.reverse();
            replies.extend(own);
        }

        children_of.entry(parent).or_default().push(node);
    }

    let mut roots = children_of.remove(root_parent).unwrap_or_default();
    roots.reverse();

    Ok(roots)
}

/// Find the first continuation (in breadth-first order) that can be resolved through `morechildren`.
///
/// "Continue this thread" links carry no child IDs and are skipped.
fn first_expandable_more(forest: &[CommentNode]) -> Option<(Vec<usize>, MoreData)> {
    let mut queue: VecDeque<(Vec<usize>, &CommentNode)> = forest.iter().enumerate().map(|(i, node)| (vec![i], node)).collect();

    while let Some((path, node)) = queue.pop_front() {
        match node {
            CommentNode::More(more) if !more.children.is_empty() => return Some((path, more.clone())),
            CommentNode::More(_) => {}
            CommentNode::Comment { replies, .. } => {
                for (i, reply) in replies.iter().enumerate() {
                    let mut child_path = path.clone();
                    child_path.push(i);
                    queue.push_back((child_path, reply));
                }
            }
        }
    }

    None
}

/// Replace the node at `path` with `replacement`, in place.
fn replace_at(forest: &mut Vec<CommentNode>, path: &[usize], replacement: Vec<CommentNode>) {
    let Some((&last, parents)) = path.split_last() else {
        return;
    };

    let mut siblings = forest;
    for &index in parents {
        siblings = match siblings.get_mut(index) {
            Some(CommentNode::Comment { replies, .. }) => replies,
            _ => return,
        };
    }

    if last < siblings.len() {
        siblings.splice(last..=last, replacement);
    }
}

/// Flatten the forest level by level, dropping any remaining continuations.
fn flatten_breadth_first(forest: Vec<CommentNode>) -> Vec<RawComment> {
    let mut flat = Vec::new();
    let mut queue: VecDeque<CommentNode> = forest.into();

    while let Some(node) = queue.pop_front() {
        if let CommentNode::Comment { comment, replies, .. } = node {
            flat.push(comment);
            queue.extend(replies);
        }
    }

    flat
}

// Tests.

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn comment(id: &str, parent: &str, author: &str, body: &str, score: i64, replies: Value) -> Value {
        json!({
            "kind": "t1",
            "data": {
                "name": format!("t1_{id}"),
                "parent_id": parent,
                "author": author,
                "body": body,
                "score": score,
                "permalink": format!("/r/test/comments/abc/post/{id}/"),
                "replies": replies,
            }
        })
    }

    fn listing(children: Vec<Value>) -> Value {
        json!({ "kind": "Listing", "data": { "children": children } })
    }

    fn more(parent: &str, children: &[&str]) -> Value {
        json!({ "kind": "more", "data": { "parent_id": parent, "children": children, "count": children.len() } })
    }

    fn things(values: Vec<Value>) -> Vec<Thing> {
        values.into_iter().map(|v| serde_json::from_value(v).unwrap()).collect()
    }

    fn bodies(comments: &[RawComment]) -> Vec<&str> {
        comments.iter().map(|c| c.body.as_str()).collect()
    }

    #[test]
    fn test_user_agent_format() {
        let agent = user_agent("someone");

        assert_eq!(agent, format!("Perplexed:v{} (by /u/someone)", env!("CARGO_PKG_VERSION")));
    }

    #[test]
    fn test_parse_submissions() {
        let value = listing(vec![
            json!({
                "kind": "t3",
                "data": {
                    "id": "abc",
                    "name": "t3_abc",
                    "title": "Battery life on the new phone?",
                    "subreddit": "phones",
                    "permalink": "/r/phones/comments/abc/battery_life/",
                    "score": 120,
                    "num_comments": 45,
                    "created_utc": 1_700_000_000.0,
                }
            }),
            json!({ "kind": "t5", "data": { "id": "sub" } }),
        ]);

        let submissions = parse_submissions(serde_json::from_value(value).unwrap()).unwrap();

        assert_eq!(submissions.len(), 1);
        assert_eq!(submissions[0].id, "abc");
        assert_eq!(submissions[0].fullname, "t3_abc");
        assert_eq!(submissions[0].num_comments, 45);
        assert_eq!(submissions[0].created.unwrap().timestamp(), 1_700_000_000);
    }

    #[test]
    fn test_parse_submissions_rejects_malformed_hit() {
        let value = listing(vec![json!({ "kind": "t3", "data": { "title": "no id" } })]);

        let result = parse_submissions(serde_json::from_value(value).unwrap());

        assert!(matches!(result, Err(ForumError::RemoteService(_))));
    }

    #[test]
    fn test_flatten_is_breadth_first_and_drops_continuations() {
        let tree = vec![
            comment(
                "a",
                "t3_abc",
                "alice",
                "a",
                10,
                listing(vec![comment("a1", "t1_a", "bob", "a1", 3, json!("")), more("t1_a", &["x", "y"])]),
            ),
            comment("b", "t3_abc", "carol", "b", 8, listing(vec![comment("b1", "t1_b", "dave", "b1", 1, json!(""))])),
            more("t3_abc", &["z"]),
        ];

        let forest = parse_forest(things(tree)).unwrap();
        let flat = flatten_breadth_first(forest);

        assert_eq!(bodies(&flat), vec!["a", "b", "a1", "b1"]);
        assert_eq!(flat[0].author.as_deref(), Some("alice"));
        assert_eq!(flat[0].permalink, "/r/test/comments/abc/post/a/");
    }

    #[test]
    fn test_parse_keeps_deleted_author_for_the_harvester() {
        let tree = vec![json!({
            "kind": "t1",
            "data": { "name": "t1_d", "author": "[deleted]", "body": "[removed]", "score": 1, "permalink": "/r/x/comments/d/", "replies": "" }
        })];

        let flat = flatten_breadth_first(parse_forest(things(tree)).unwrap());

        assert_eq!(flat[0].author.as_deref(), Some("[deleted]"));
    }

    #[test]
    fn test_first_expandable_more_skips_continue_thread_links() {
        let tree = vec![
            comment("a", "t3_abc", "alice", "a", 10, listing(vec![more("t1_a", &["x"])])),
            more("t3_abc", &[]),
        ];

        let forest = parse_forest(things(tree)).unwrap();
        let (path, found) = first_expandable_more(&forest).unwrap();

        assert_eq!(path, vec![0, 0]);
        assert_eq!(found.children, vec!["x"]);
    }

    #[test]
    fn test_assemble_children_rebuilds_nesting() {
        // `morechildren` returns a flat, depth-first list.
        let flat = vec![
            comment("x", "t1_a", "erin", "x", 4, json!("")),
            comment("x1", "t1_x", "frank", "x1", 2, json!("")),
            comment("y", "t1_a", "grace", "y", 1, json!("")),
        ];

        let roots = assemble_children("t1_a", things(flat)).unwrap();

        assert_eq!(roots.len(), 2);
        match &roots[0] {
            CommentNode::Comment { fullname, replies, .. } => {
                assert_eq!(fullname, "t1_x");
                assert_eq!(replies.len(), 1);
            }
            CommentNode::More(_) => panic!("expected a comment"),
        }
        assert_eq!(bodies(&flatten_breadth_first(roots)), vec!["x", "y", "x1"]);
    }

    #[test]
    fn test_replace_at_splices_resolved_comments_in_place() {
        let tree = vec![
            comment("a", "t3_abc", "alice", "a", 10, listing(vec![comment("a1", "t1_a", "bob", "a1", 3, json!("")), more("t1_a", &["x"])])),
            comment("b", "t3_abc", "carol", "b", 8, json!("")),
        ];
        let mut forest = parse_forest(things(tree)).unwrap();

        let (path, more) = first_expandable_more(&forest).unwrap();
        let replacement = assemble_children(&more.parent_id, things(vec![comment("x", "t1_a", "erin", "x", 4, json!(""))])).unwrap();
        replace_at(&mut forest, &path, replacement);

        assert!(first_expandable_more(&forest).is_none());
        assert_eq!(bodies(&flatten_breadth_first(forest)), vec!["a", "b", "a1", "x"]);
    }

    #[test]
    fn test_access_token_freshness() {
        assert!(AccessToken::new("t".to_string(), Duration::from_secs(3600)).is_fresh());
        assert!(!AccessToken::new("t".to_string(), Duration::from_secs(30)).is_fresh());
    }

    // Endpoint behavior against a local server.

    mod endpoints {
        use serde_json::json;
        use wiremock::{
            Mock, MockServer, ResponseTemplate,
            matchers::{header, method, path, query_param},
        };

        use super::*;
        use crate::{base::config::ConfigInner, service::forum::mock::submission};

        const TOKEN_PATH: &str = "/api/v1/access_token";

        fn reddit_config(more_comments_limit: usize) -> Config {
            Config {
                inner: Arc::new(ConfigInner {
                    reddit_client_id: "id".to_string(),
                    reddit_client_secret: "secret".to_string(),
                    reddit_username: "someone".to_string(),
                    reddit_more_comments_limit: more_comments_limit,
                    reddit_timeout_secs: 5,
                    ..Default::default()
                }),
            }
        }

        async fn mount_token(server: &MockServer, expires_in: u64, times: u64) {
            Mock::given(method("POST"))
                .and(path(TOKEN_PATH))
                .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "access_token": "tok", "token_type": "bearer", "expires_in": expires_in })))
                .expect(times)
                .mount(server)
                .await;
        }

        async fn connect(server: &MockServer, more_comments_limit: usize) -> ForumRes<RedditForumClient> {
            RedditForumClient::with_endpoints(&reddit_config(more_comments_limit), &server.uri(), &format!("{}{TOKEN_PATH}", server.uri())).await
        }

        async fn mount_search(server: &MockServer, response: ResponseTemplate) {
            Mock::given(method("GET")).and(path("/r/all/search")).respond_with(response).mount(server).await;
        }

        fn search_hits() -> Value {
            listing(vec![json!({
                "kind": "t3",
                "data": { "id": "abc", "name": "t3_abc", "title": "Battery", "subreddit": "phones", "permalink": "/r/phones/comments/abc/battery/", "score": 7, "num_comments": 2 }
            })])
        }

        fn comment_page(comments: Vec<Value>) -> Value {
            json!([listing(vec![json!({ "kind": "t3", "data": { "id": "abc", "name": "t3_abc" } })]), listing(comments)])
        }

        #[tokio::test]
        async fn test_search_uses_bearer_token() {
            let server = MockServer::start().await;
            mount_token(&server, 3600, 1).await;
            Mock::given(method("GET"))
                .and(path("/r/all/search"))
                .and(header("authorization", "Bearer tok"))
                .and(query_param("q", "battery life"))
                .and(query_param("restrict_sr", "false"))
                .respond_with(ResponseTemplate::new(200).set_body_json(search_hits()))
                .expect(1)
                .mount(&server)
                .await;

            let client = connect(&server, 0).await.unwrap();
            let hits = client.search("battery life", "all", 5).await.unwrap();

            assert_eq!(hits.len(), 1);
            assert_eq!(hits[0].fullname, "t3_abc");
        }

        #[tokio::test]
        async fn test_unauthorized_maps_to_authentication() {
            let server = MockServer::start().await;
            mount_token(&server, 3600, 1).await;
            mount_search(&server, ResponseTemplate::new(401)).await;

            let client = connect(&server, 0).await.unwrap();

            assert!(matches!(client.search("q", "all", 5).await, Err(ForumError::Authentication(_))));
        }

        #[tokio::test]
        async fn test_forbidden_maps_to_authentication() {
            let server = MockServer::start().await;
            mount_token(&server, 3600, 1).await;
            mount_search(&server, ResponseTemplate::new(403)).await;

            let client = connect(&server, 0).await.unwrap();

            assert!(matches!(client.search("q", "all", 5).await, Err(ForumError::Authentication(_))));
        }

        #[tokio::test]
        async fn test_rejected_token_is_renewed_on_next_call() {
            let server = MockServer::start().await;
            // Once at startup, once after the rejection.
            mount_token(&server, 3600, 2).await;
            Mock::given(method("GET")).and(path("/r/all/search")).respond_with(ResponseTemplate::new(401)).up_to_n_times(1).mount(&server).await;
            mount_search(&server, ResponseTemplate::new(200).set_body_json(search_hits())).await;

            let client = connect(&server, 0).await.unwrap();

            assert!(matches!(client.search("q", "all", 5).await, Err(ForumError::Authentication(_))));
            assert_eq!(client.search("q", "all", 5).await.unwrap().len(), 1);
        }

        #[tokio::test]
        async fn test_server_error_maps_to_remote_service() {
            let server = MockServer::start().await;
            mount_token(&server, 3600, 1).await;
            mount_search(&server, ResponseTemplate::new(503).set_body_string("try later")).await;

            let client = connect(&server, 0).await.unwrap();

            assert!(matches!(client.search("q", "all", 5).await, Err(ForumError::RemoteService(_))));
        }

        #[tokio::test]
        async fn test_malformed_body_maps_to_remote_service() {
            let server = MockServer::start().await;
            mount_token(&server, 3600, 1).await;
            mount_search(&server, ResponseTemplate::new(200).set_body_string("<html>not json</html>")).await;

            let client = connect(&server, 0).await.unwrap();

            assert!(matches!(client.search("q", "all", 5).await, Err(ForumError::RemoteService(_))));
        }

        #[tokio::test]
        async fn test_token_error_body_maps_to_authentication() {
            let server = MockServer::start().await;
            Mock::given(method("POST"))
                .and(path(TOKEN_PATH))
                .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "error": "invalid_grant" })))
                .mount(&server)
                .await;

            assert!(matches!(connect(&server, 0).await, Err(ForumError::Authentication(message)) if message == "invalid_grant"));
        }

        #[tokio::test]
        async fn test_rejected_credentials_map_to_authentication() {
            let server = MockServer::start().await;
            Mock::given(method("POST")).and(path(TOKEN_PATH)).respond_with(ResponseTemplate::new(401)).mount(&server).await;

            assert!(matches!(connect(&server, 0).await, Err(ForumError::Authentication(_))));
        }

        #[tokio::test]
        async fn test_expiring_token_is_refreshed() {
            let server = MockServer::start().await;
            // Shorter than the refresh margin, so every call renews it.
            mount_token(&server, 30, 3).await;
            mount_search(&server, ResponseTemplate::new(200).set_body_json(search_hits())).await;

            let client = connect(&server, 0).await.unwrap();
            client.search("q", "all", 5).await.unwrap();
            client.search("q", "all", 5).await.unwrap();
        }

        #[tokio::test]
        async fn test_fresh_token_is_reused() {
            let server = MockServer::start().await;
            mount_token(&server, 3600, 1).await;
            mount_search(&server, ResponseTemplate::new(200).set_body_json(search_hits())).await;

            let client = connect(&server, 0).await.unwrap();
            client.search("q", "all", 5).await.unwrap();
            client.search("q", "all", 5).await.unwrap();
        }

        #[tokio::test]
        async fn test_more_children_are_resolved() {
            let server = MockServer::start().await;
            mount_token(&server, 3600, 1).await;
            Mock::given(method("GET"))
                .and(path("/comments/abc"))
                .respond_with(ResponseTemplate::new(200).set_body_json(comment_page(vec![comment("a", "t3_abc", "alice", "a", 10, json!("")), more("t3_abc", &["x"])])))
                .mount(&server)
                .await;
            Mock::given(method("GET"))
                .and(path("/api/morechildren"))
                .and(query_param("link_id", "t3_abc"))
                .and(query_param("children", "x"))
                .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "json": { "errors": [], "data": { "things": [comment("x", "t3_abc", "xavier", "x", 2, json!(""))] } } })))
                .expect(1)
                .mount(&server)
                .await;

            let client = connect(&server, 1).await.unwrap();
            let comments = client.fetch_comments(&submission("abc")).await.unwrap();

            assert_eq!(bodies(&comments), vec!["a", "x"]);
        }

        #[tokio::test]
        async fn test_more_children_errors_map_to_remote_service() {
            let server = MockServer::start().await;
            mount_token(&server, 3600, 1).await;
            Mock::given(method("GET"))
                .and(path("/comments/abc"))
                .respond_with(ResponseTemplate::new(200).set_body_json(comment_page(vec![comment("a", "t3_abc", "alice", "a", 10, json!("")), more("t3_abc", &["x"])])))
                .mount(&server)
                .await;
            Mock::given(method("GET"))
                .and(path("/api/morechildren"))
                .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "json": { "errors": [["RATELIMIT", "slow down", "children"]] } })))
                .mount(&server)
                .await;

            let client = connect(&server, 1).await.unwrap();

            assert!(matches!(client.fetch_comments(&submission("abc")).await, Err(ForumError::RemoteService(_))));
        }

        #[tokio::test]
        async fn test_continuations_are_dropped_without_a_budget() {
            let server = MockServer::start().await;
            mount_token(&server, 3600, 1).await;
            Mock::given(method("GET"))
                .and(path("/comments/abc"))
                .respond_with(ResponseTemplate::new(200).set_body_json(comment_page(vec![comment("a", "t3_abc", "alice", "a", 10, json!("")), more("t3_abc", &["x"])])))
                .mount(&server)
                .await;
            Mock::given(method("GET")).and(path("/api/morechildren")).respond_with(ResponseTemplate::new(500)).expect(0).mount(&server).await;

            let client = connect(&server, 0).await.unwrap();
            let comments = client.fetch_comments(&submission("abc")).await.unwrap();

            assert_eq!(bodies(&comments), vec!["a"]);
        }
    }
}
