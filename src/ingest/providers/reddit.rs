// src/ingest/providers/reddit.rs
use anyhow::{Context, Result};
use async_trait::async_trait;
use metrics::{counter, histogram};
use reqwest::StatusCode;
use serde::Deserialize;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

use crate::ingest::normalize_title;
use crate::ingest::types::{Post, PostSource};

const TOKEN_URL: &str = "https://www.reddit.com/api/v1/access_token";
const API_BASE: &str = "https://oauth.reddit.com";
const PERMALINK_BASE: &str = "https://www.reddit.com";
/// Listing pages are capped server-side.
pub const MAX_PAGE_SIZE: usize = 100;
const HTTP_TIMEOUT: Duration = Duration::from_secs(16);
/// Refresh the app token this long before reddit says it expires.
const TOKEN_REFRESH_MARGIN: Duration = Duration::from_secs(60);

#[derive(Debug, Deserialize)]
struct Listing {
    data: ListingData,
}

#[derive(Debug, Deserialize)]
struct ListingData {
    children: Vec<Child>,
}

#[derive(Debug, Deserialize)]
struct Child {
    data: Submission,
}

#[derive(Debug, Deserialize)]
struct Submission {
    id: String,
    title: Option<String>,
    created_utc: f64,
    permalink: Option<String>,
}

fn default_expires_in() -> u64 {
    3600
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: u64,
}

/// Script-app credentials for the application-only OAuth flow.
#[derive(Debug, Clone)]
pub struct RedditCredentials {
    pub client_id: String,
    pub client_secret: String,
    pub user_agent: String,
}

struct CachedToken {
    value: String,
    expires_at: Instant,
}

pub struct RedditSource {
    subreddit: String,
    mode: Mode,
}

enum Mode {
    Fixture(String),
    Http {
        client: reqwest::Client,
        creds: RedditCredentials,
        token: Mutex<Option<CachedToken>>,
    },
}

impl RedditSource {
    pub fn new(subreddit: impl Into<String>, creds: RedditCredentials) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(creds.user_agent.clone())
            .timeout(HTTP_TIMEOUT)
            .build()
            .context("building reddit http client")?;
        Ok(Self {
            subreddit: subreddit.into(),
            mode: Mode::Http {
                client,
                creds,
                token: Mutex::new(None),
            },
        })
    }

    /// Serve a stored `/new` listing body instead of calling the API.
    pub fn from_fixture_str(subreddit: impl Into<String>, body: &str) -> Self {
        Self {
            subreddit: subreddit.into(),
            mode: Mode::Fixture(body.to_string()),
        }
    }

    pub fn subreddit(&self) -> &str {
        &self.subreddit
    }

    /// Fetch a single post to prove credentials and connectivity work.
    pub async fn probe(&self) -> Result<()> {
        self.fetch_newest(1)
            .await
            .with_context(|| format!("probing r/{}", self.subreddit))?;
        Ok(())
    }

    async fn access_token(
        client: &reqwest::Client,
        creds: &RedditCredentials,
        cache: &Mutex<Option<CachedToken>>,
    ) -> Result<String> {
        let mut guard = cache.lock().await;
        if let Some(tok) = guard.as_ref() {
            if Instant::now() < tok.expires_at {
                return Ok(tok.value.clone());
            }
        }

        let resp = client
            .post(TOKEN_URL)
            .basic_auth(&creds.client_id, Some(&creds.client_secret))
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await
            .context("reddit token request")?
            .error_for_status()
            .context("reddit token non-2xx")?
            .json::<TokenResponse>()
            .await
            .context("parsing reddit token response")?;

        let ttl = Duration::from_secs(resp.expires_in).saturating_sub(TOKEN_REFRESH_MARGIN);
        let value = resp.access_token;
        *guard = Some(CachedToken {
            value: value.clone(),
            expires_at: Instant::now() + ttl,
        });
        tracing::debug!(ttl_secs = ttl.as_secs(), "reddit token refreshed");
        Ok(value)
    }

    async fn fetch_page(&self, limit: usize) -> Result<Vec<Post>> {
        let posts = match &self.mode {
            Mode::Fixture(body) => parse_listing(body)?,
            Mode::Http {
                client,
                creds,
                token,
            } => {
                let bearer = Self::access_token(client, creds, token).await?;
                let url = format!("{API_BASE}/r/{}/new", self.subreddit);
                let resp = client
                    .get(&url)
                    .bearer_auth(bearer)
                    .query(&[("limit", limit)])
                    .send()
                    .await
                    .with_context(|| format!("GET {url}"))?;

                if resp.status() == StatusCode::UNAUTHORIZED {
                    // Force a fresh token on the next cycle.
                    token.lock().await.take();
                    anyhow::bail!("reddit rejected the access token (401)");
                }
                let body = resp
                    .error_for_status()
                    .context("reddit listing non-2xx")?
                    .text()
                    .await
                    .context("reading reddit listing body")?;
                parse_listing(&body)?
            }
        };
        Ok(posts)
    }
}

/// Parse a reddit listing body into posts, preserving the listing order.
pub fn parse_listing(body: &str) -> Result<Vec<Post>> {
    let listing: Listing = serde_json::from_str(body).context("parsing reddit listing json")?;

    let posts = listing
        .data
        .children
        .into_iter()
        .map(|c| {
            let s = c.data;
            Post {
                id: s.id,
                title: normalize_title(s.title.as_deref().unwrap_or_default()),
                created_at: s.created_utc.floor() as i64,
                url: s.permalink.map(|p| format!("{PERMALINK_BASE}{p}")),
            }
        })
        .collect();
    Ok(posts)
}

#[async_trait]
impl PostSource for RedditSource {
    async fn fetch_newest(&self, limit: usize) -> Result<Vec<Post>> {
        let limit = limit.clamp(1, MAX_PAGE_SIZE);
        let t0 = Instant::now();

        let mut posts = match self.fetch_page(limit).await {
            Ok(posts) => posts,
            Err(e) => {
                counter!("source_fetch_errors_total").increment(1);
                return Err(e);
            }
        };
        posts.truncate(limit);

        let ms = t0.elapsed().as_secs_f64() * 1_000.0;
        histogram!("source_fetch_ms").record(ms);
        Ok(posts)
    }

    fn name(&self) -> &str {
        "reddit"
    }
}
