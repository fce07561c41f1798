// src/config/mod.rs
//! Process configuration.
//!
//! Non-secret settings may live in a TOML file (`$WEX_CONFIG_PATH`, then
//! `config/wex.toml`); environment variables override them. Credentials come
//! from the environment only.

use anyhow::{anyhow, bail, Context, Result};
use serde::Deserialize;
use std::fmt::Display;
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use crate::ingest::providers::reddit::{RedditCredentials, MAX_PAGE_SIZE};
use crate::notify::email::SmtpSettings;
use crate::subscriptions::mongo::MongoSettings;

pub const ENV_CONFIG_PATH: &str = "WEX_CONFIG_PATH";
pub const DEFAULT_CONFIG_PATH: &str = "config/wex.toml";

const DEFAULT_SUBREDDIT: &str = "Watchexchange";
const DEFAULT_NUM_POSTS: usize = 25;
const DEFAULT_POLL_INTERVAL_SECS: u64 = 2;

/// Optional values from the TOML config file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct FileSettings {
    pub subreddit: Option<String>,
    pub num_posts: Option<usize>,
    pub poll_interval_secs: Option<u64>,
    pub notifier: Option<String>,
    pub metrics_addr: Option<String>,
    pub subscriptions_path: Option<PathBuf>,
}

impl FileSettings {
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        toml::from_str(&content).with_context(|| format!("parsing {}", path.display()))
    }

    /// 1) $WEX_CONFIG_PATH (must exist)
    /// 2) config/wex.toml
    /// 3) defaults
    pub fn load_default() -> Result<Self> {
        if let Ok(p) = std::env::var(ENV_CONFIG_PATH) {
            let pb = PathBuf::from(p);
            if !pb.exists() {
                bail!("{ENV_CONFIG_PATH} points to non-existent path {}", pb.display());
            }
            return Self::load_from(&pb);
        }
        let default = PathBuf::from(DEFAULT_CONFIG_PATH);
        if default.exists() {
            return Self::load_from(&default);
        }
        Ok(Self::default())
    }
}

#[derive(Debug, Clone)]
pub enum StoreSettings {
    Mongo(MongoSettings),
    File(PathBuf),
}

#[derive(Debug, Clone)]
pub enum NotifierSettings {
    Log,
    Email(SmtpSettings),
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub subreddit: String,
    pub num_posts: usize,
    pub poll_interval: Duration,
    pub reddit: RedditCredentials,
    pub store: StoreSettings,
    pub notifier: NotifierSettings,
    pub metrics_addr: Option<SocketAddr>,
}

impl Settings {
    /// Load from the config file (if any) and the process environment.
    pub fn load() -> Result<Self> {
        let file = FileSettings::load_default()?;
        Self::resolve(file, |k| std::env::var(k).ok())
    }

    /// Merge `file` with values from `env`; `env` wins.
    pub fn resolve<E>(file: FileSettings, env: E) -> Result<Self>
    where
        E: Fn(&str) -> Option<String>,
    {
        let var = |k: &str| env(k).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let required = |k: &str| var(k).ok_or_else(|| anyhow!("{k} missing"));

        let subreddit = var("SUBREDDIT")
            .or(file.subreddit)
            .unwrap_or_else(|| DEFAULT_SUBREDDIT.to_string());

        let num_posts = match var("NUM_POSTS") {
            Some(v) => parse_var::<usize>("NUM_POSTS", &v)?,
            None => file.num_posts.unwrap_or(DEFAULT_NUM_POSTS),
        };
        if num_posts == 0 {
            bail!("NUM_POSTS must be at least 1");
        }
        if num_posts > MAX_PAGE_SIZE {
            tracing::warn!(num_posts, max = MAX_PAGE_SIZE, "NUM_POSTS above listing cap; clamping");
        }
        let num_posts = num_posts.min(MAX_PAGE_SIZE);

        let interval_secs = match var("POLL_INTERVAL_SECS") {
            Some(v) => parse_var::<u64>("POLL_INTERVAL_SECS", &v)?,
            None => file.poll_interval_secs.unwrap_or(DEFAULT_POLL_INTERVAL_SECS),
        };
        if interval_secs == 0 {
            bail!("POLL_INTERVAL_SECS must be at least 1");
        }

        let reddit = RedditCredentials {
            client_id: required("PRAW_CLIENT_ID")?,
            client_secret: required("PRAW_CLIENT_SECRET")?,
            user_agent: required("PRAW_USER_AGENT")?,
        };

        let subscriptions_path = var("SUBSCRIPTIONS_PATH")
            .map(PathBuf::from)
            .or(file.subscriptions_path);
        let store = match subscriptions_path {
            Some(p) => StoreSettings::File(p),
            None => StoreSettings::Mongo(MongoSettings {
                uri: required("MONGO_URI")?,
                username: var("MONGO_USERNAME").unwrap_or_default(),
                password: var("MONGO_PASSWORD").unwrap_or_default(),
                database: required("MONGO_DB_NAME")?,
                collection: required("MONGO_COLLECTION_NAME")?,
            }),
        };

        let notifier_kind = var("NOTIFIER")
            .or(file.notifier)
            .unwrap_or_else(|| "log".to_string())
            .to_ascii_lowercase();
        let notifier = match notifier_kind.as_str() {
            "log" => NotifierSettings::Log,
            "email" => NotifierSettings::Email(SmtpSettings {
                host: required("SMTP_HOST")?,
                user: required("SMTP_USER")?,
                pass: required("SMTP_PASS")?,
                from: required("NOTIFY_EMAIL_FROM")?,
            }),
            other => bail!("unsupported NOTIFIER {other:?} (expected \"log\" or \"email\")"),
        };

        let metrics_addr = match var("METRICS_ADDR").or(file.metrics_addr) {
            Some(v) => Some(parse_var::<SocketAddr>("METRICS_ADDR", &v)?),
            None => None,
        };

        Ok(Self {
            subreddit,
            num_posts,
            poll_interval: Duration::from_secs(interval_secs),
            reddit,
            store,
            notifier,
            metrics_addr,
        })
    }
}

fn parse_var<T>(key: &str, raw: &str) -> Result<T>
where
    T: FromStr,
    T::Err: Display,
{
    raw.parse::<T>()
        .map_err(|e| anyhow!("invalid {key}={raw:?}: {e}"))
}
