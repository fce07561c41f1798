// src/subscriptions/file.rs
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use super::{Subscription, SubscriptionStore};

#[derive(Deserialize)]
struct RawSubscription {
    email: String,
    #[serde(default)]
    keywords: Vec<String>,
}

/// Load subscriptions from a TOML (`[[subscriptions]]` tables) or JSON
/// (array of `{ email, keywords }`) file.
pub fn load_subscriptions_from(path: &Path) -> Result<Vec<Subscription>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("reading subscriptions from {}", path.display()))?;
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();
    parse_subscriptions(&content, ext.as_str())
        .with_context(|| format!("parsing subscriptions in {}", path.display()))
}

type Parser = fn(&str) -> Result<Vec<Subscription>>;

/// Tries the likely format first, then the other. If both fail, the first
/// format's error is reported.
fn parse_subscriptions(s: &str, hint_ext: &str) -> Result<Vec<Subscription>> {
    let looks_toml = hint_ext == "toml" || s.contains("[[subscriptions]]");
    let (first, second): (Parser, Parser) = if looks_toml {
        (parse_toml, parse_json)
    } else {
        (parse_json, parse_toml)
    };
    match first(s) {
        Ok(v) => Ok(v),
        Err(e) => second(s)
            .map_err(|_| e)
            .context("subscriptions file is neither valid TOML nor JSON"),
    }
}

fn parse_toml(s: &str) -> Result<Vec<Subscription>> {
    #[derive(Deserialize)]
    struct TomlFile {
        #[serde(default)]
        subscriptions: Vec<RawSubscription>,
    }
    let v: TomlFile = toml::from_str(s).context("invalid TOML")?;
    Ok(clean(v.subscriptions))
}

fn parse_json(s: &str) -> Result<Vec<Subscription>> {
    let v: Vec<RawSubscription> = serde_json::from_str(s).context("invalid JSON")?;
    Ok(clean(v))
}

fn clean(items: Vec<RawSubscription>) -> Vec<Subscription> {
    items
        .into_iter()
        .filter_map(|r| Subscription::new(&r.email, r.keywords))
        .collect()
}

/// Subscriptions kept in a local file, re-read on every load so edits
/// apply from the next cycle.
pub struct FileSubscriptionStore {
    path: PathBuf,
}

impl FileSubscriptionStore {
    /// Fails if the file cannot be read or parsed right now.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let n = load_subscriptions_from(&path)?.len();
        tracing::info!(path = %path.display(), subscriptions = n, "opened subscription file");
        Ok(Self { path })
    }
}

#[async_trait]
impl SubscriptionStore for FileSubscriptionStore {
    async fn load_all(&self) -> Result<Vec<Subscription>> {
        load_subscriptions_from(&self.path)
    }

    fn name(&self) -> &str {
        "file"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn toml_and_json_formats_parse_and_clean() {
        let toml = r#"
[[subscriptions]]
email = "alice@example.com"
keywords = ["seiko", " ", "Seiko "]

[[subscriptions]]
email = "  "
keywords = ["dropped"]
"#;
        let t = parse_subscriptions(toml, "toml").unwrap();
        assert_eq!(t.len(), 1);
        assert_eq!(t[0].keywords, vec!["seiko", "Seiko "]);

        let json = r#"[{"email":"bob@example.com","keywords":["omega"]},{"email":"c@example.com"}]"#;
        let j = parse_subscriptions(json, "json").unwrap();
        assert_eq!(j.len(), 2);
        assert!(j[1].keywords.is_empty());
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(parse_subscriptions("not = [valid", "").is_err());
    }

    #[test]
    fn toml_typo_reports_toml_position() {
        let broken = "[[subscriptions]]\nemail = \"alice@example.com\nkeywords = [\"seiko\"]\n";
        let err = parse_subscriptions(broken, "toml").unwrap_err();
        let chain = format!("{err:#}");
        assert!(chain.contains("invalid TOML"), "{chain}");
        assert!(chain.contains("line 2"), "{chain}");
        assert!(!chain.contains("invalid JSON"), "{chain}");
    }

    #[test]
    fn json_typo_reports_json_position() {
        let broken = "[\n  {\"email\": \"bob@example.com\", \"keywords\": [\"omega\",]}\n]";
        let err = parse_subscriptions(broken, "json").unwrap_err();
        let chain = format!("{err:#}");
        assert!(chain.contains("invalid JSON"), "{chain}");
        assert!(chain.contains("line 2"), "{chain}");
    }
}
