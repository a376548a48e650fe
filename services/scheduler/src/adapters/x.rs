//! X (Twitter) API v2: posting alerts and reading monitored accounts.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::json;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

use super::{PlatformAdapter, PostResult};
use crate::errors::{SchedulerError, SourceError};
use crate::scheduler::render::{truncate, OutboundPost};
use crate::sources::news::{FeedFetch, SocialFeed, SocialPost};

const RATE_LIMIT_RESET_HEADER: &str = "x-rate-limit-reset";
const FEED_MAX_RESULTS: &str = "10";
/// Upper bound on response body text copied into error messages.
const ERROR_BODY_CHARS: usize = 200;

fn http_client(timeout: Duration) -> anyhow::Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(concat!("alert-scheduler/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| anyhow::anyhow!("failed to build HTTP client: {e}"))
}

fn parse_base_url(base_url: &str) -> anyhow::Result<Url> {
    Url::parse(base_url).map_err(|e| anyhow::anyhow!("invalid X API base URL {base_url}: {e}"))
}

/// Posts alerts with a user-context access token.
///
/// Posts are text only. Media upload needs a separate OAuth 1.0a flow, so
/// `OutboundPost::image_url` and `video_url` are left to the mirror channel.
#[derive(Debug, Clone)]
pub struct XClient {
    http: reqwest::Client,
    base_url: Url,
    user_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CreatePostResponse {
    data: CreatedPost,
}

#[derive(Debug, Deserialize)]
struct CreatedPost {
    id: String,
}

impl XClient {
    pub fn new(base_url: &str, user_token: Option<String>, timeout: Duration) -> anyhow::Result<Self> {
        Ok(Self {
            http: http_client(timeout)?,
            base_url: parse_base_url(base_url)?,
            user_token,
        })
    }
}

/// Reads the reset header, epoch seconds.
fn reset_at(headers: &reqwest::header::HeaderMap) -> Option<DateTime<Utc>> {
    headers
        .get(RATE_LIMIT_RESET_HEADER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<i64>()
        .ok()
        .and_then(|secs| DateTime::from_timestamp(secs, 0))
}

#[async_trait]
impl PlatformAdapter for XClient {
    fn ensure_configured(&self) -> Result<(), SchedulerError> {
        match self.user_token {
            Some(_) => Ok(()),
            None => Err(SchedulerError::Configuration(
                "X_USER_ACCESS_TOKEN is not set".to_string(),
            )),
        }
    }

    async fn post_content(&self, post: &OutboundPost) -> PostResult {
        let Some(token) = self.user_token.as_deref() else {
            return PostResult::Failed {
                reason: "X_USER_ACCESS_TOKEN is not set".to_string(),
            };
        };
        let url = match self.base_url.join("/2/tweets") {
            Ok(url) => url,
            Err(e) => return PostResult::Failed { reason: format!("invalid post URL: {e}") },
        };

        let response = match self
            .http
            .post(url)
            .bearer_auth(token)
            .json(&json!({ "text": post.text }))
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                return PostResult::Failed {
                    reason: format!("post request failed: {e}"),
                }
            }
        };

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            let reset_at = reset_at(response.headers());
            warn!(?reset_at, "platform rate limit reached");
            return PostResult::RateLimited { reset_at };
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return PostResult::Failed {
                reason: format!("platform returned {status}: {}", truncate(&body, ERROR_BODY_CHARS)),
            };
        }

        match response.json::<CreatePostResponse>().await {
            Ok(created) => {
                debug!(post_id = %created.data.id, "post created");
                PostResult::Posted { id: created.data.id }
            }
            Err(e) => PostResult::Failed {
                reason: format!("unparsable platform response: {e}"),
            },
        }
    }
}

/// Reads recent posts of one account through recent search, with an app
/// bearer token.
#[derive(Debug, Clone)]
pub struct XFeed {
    http: reqwest::Client,
    base_url: Url,
    bearer_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    data: Vec<RawPost>,
    #[serde(default)]
    includes: Option<Includes>,
}

#[derive(Debug, Deserialize)]
struct RawPost {
    id: String,
    text: String,
    created_at: DateTime<Utc>,
    #[serde(default)]
    attachments: Option<Attachments>,
}

#[derive(Debug, Deserialize)]
struct Attachments {
    #[serde(default)]
    media_keys: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct Includes {
    #[serde(default)]
    media: Vec<RawMedia>,
}

#[derive(Debug, Deserialize)]
struct RawMedia {
    media_key: String,
    #[serde(rename = "type")]
    kind: String,
    url: Option<String>,
    preview_image_url: Option<String>,
    #[serde(default)]
    variants: Vec<Variant>,
}

#[derive(Debug, Deserialize)]
struct Variant {
    url: String,
    content_type: String,
    bit_rate: Option<u64>,
}

impl RawMedia {
    fn image_url(&self) -> Option<&str> {
        match self.kind.as_str() {
            "photo" => self.url.as_deref(),
            _ => self.preview_image_url.as_deref(),
        }
    }

    /// Highest bit rate mp4 rendition.
    fn video_url(&self) -> Option<&str> {
        if self.kind != "video" && self.kind != "animated_gif" {
            return None;
        }
        self.variants
            .iter()
            .filter(|v| v.content_type == "video/mp4")
            .max_by_key(|v| v.bit_rate.unwrap_or(0))
            .map(|v| v.url.as_str())
    }
}

impl XFeed {
    pub fn new(base_url: &str, bearer_token: Option<String>, timeout: Duration) -> anyhow::Result<Self> {
        Ok(Self {
            http: http_client(timeout)?,
            base_url: parse_base_url(base_url)?,
            bearer_token,
        })
    }

    fn search_url(&self, account: &str) -> Result<Url, SourceError> {
        let mut url = self
            .base_url
            .join("/2/tweets/search/recent")
            .map_err(|e| SourceError::Upstream(format!("invalid search URL: {e}")))?;
        url.query_pairs_mut()
            .append_pair("query", &format!("from:{account} -is:retweet -is:reply"))
            .append_pair("max_results", FEED_MAX_RESULTS)
            .append_pair("tweet.fields", "created_at,attachments")
            .append_pair("expansions", "attachments.media_keys")
            .append_pair("media.fields", "type,url,preview_image_url,variants");
        Ok(url)
    }
}

fn into_posts(account: &str, response: SearchResponse) -> Vec<SocialPost> {
    let media: HashMap<String, RawMedia> = response
        .includes
        .map(|includes| includes.media)
        .unwrap_or_default()
        .into_iter()
        .map(|m| (m.media_key.clone(), m))
        .collect();

    response
        .data
        .into_iter()
        .map(|raw| {
            let attached: Vec<&RawMedia> = raw
                .attachments
                .iter()
                .flat_map(|a| a.media_keys.iter())
                .filter_map(|key| media.get(key))
                .collect();

            SocialPost {
                image_url: attached.iter().find_map(|m| m.image_url()).map(str::to_string),
                video_url: attached.iter().find_map(|m| m.video_url()).map(str::to_string),
                id: raw.id,
                account: account.to_string(),
                text: raw.text,
                created_at: raw.created_at,
            }
        })
        .collect()
}

#[async_trait]
impl SocialFeed for XFeed {
    async fn recent_posts(&self, account: &str) -> Result<FeedFetch, SourceError> {
        let token = self
            .bearer_token
            .as_deref()
            .ok_or_else(|| SourceError::Upstream("X_BEARER_TOKEN is not set".to_string()))?;

        let response = self
            .http
            .get(self.search_url(account)?)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| SourceError::Upstream(format!("feed request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SourceError::Upstream(format!(
                "feed for {account} returned {status}"
            )));
        }

        let body: SearchResponse = response
            .json()
            .await
            .map_err(|e| SourceError::Upstream(format!("unparsable feed response: {e}")))?;

        Ok(FeedFetch {
            posts: into_posts(account, body),
            cached: false,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::{HeaderMap, HeaderValue};

    #[test]
    fn reset_header_is_read_as_epoch_seconds() {
        let mut headers = HeaderMap::new();
        headers.insert(RATE_LIMIT_RESET_HEADER, HeaderValue::from_static("1767225600"));
        assert_eq!(
            reset_at(&headers),
            DateTime::from_timestamp(1_767_225_600, 0)
        );

        headers.insert(RATE_LIMIT_RESET_HEADER, HeaderValue::from_static("soon"));
        assert_eq!(reset_at(&headers), None);
    }

    #[test]
    fn missing_user_token_is_a_configuration_error() {
        let client = XClient::new("https://api.twitter.com", None, Duration::from_secs(5)).unwrap();
        assert!(matches!(
            client.ensure_configured(),
            Err(SchedulerError::Configuration(_))
        ));
    }

    #[test]
    fn media_is_attached_to_posts() {
        let response: SearchResponse = serde_json::from_value(json!({
            "data": [{
                "id": "1",
                "text": "JUST IN: chart",
                "created_at": "2026-03-14T12:00:00.000Z",
                "attachments": { "media_keys": ["3_1", "7_1"] }
            }],
            "includes": { "media": [
                { "media_key": "3_1", "type": "photo", "url": "https://pbs.example/a.jpg" },
                { "media_key": "7_1", "type": "video", "preview_image_url": "https://pbs.example/v.jpg",
                  "variants": [
                    { "url": "https://video.example/low.mp4", "content_type": "video/mp4", "bit_rate": 256000 },
                    { "url": "https://video.example/high.mp4", "content_type": "video/mp4", "bit_rate": 2176000 },
                    { "url": "https://video.example/pl.m3u8", "content_type": "application/x-mpegURL" }
                  ] }
            ] }
        }))
        .unwrap();

        let posts = into_posts("WatcherGuru", response);
        assert_eq!(posts[0].image_url.as_deref(), Some("https://pbs.example/a.jpg"));
        assert_eq!(posts[0].video_url.as_deref(), Some("https://video.example/high.mp4"));
    }
}
