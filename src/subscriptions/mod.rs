// src/subscriptions/mod.rs
pub mod file;
pub mod mongo;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// A subscriber and the keywords they want to hear about.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Subscription {
    pub email: String,
    pub keywords: Vec<String>,
}

impl Subscription {
    /// Build a cleaned subscription: email trimmed, whitespace-only and
    /// repeated keywords dropped. Keywords otherwise keep their exact text,
    /// since padding is part of what they match. `None` if the email is blank.
    pub fn new<I, S>(email: &str, keywords: I) -> Option<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let email = email.trim();
        if email.is_empty() {
            return None;
        }
        Some(Self {
            email: email.to_string(),
            keywords: clean_keywords(keywords),
        })
    }
}

fn clean_keywords<I, S>(items: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for it in items {
        let k = it.as_ref();
        if !k.trim().is_empty() && seen.insert(k.to_string()) {
            out.push(k.to_string());
        }
    }
    out
}

/// Read access to every registered subscription.
///
/// Called at most once per fetch cycle; implementations must not cache
/// across calls so edits show up on the next cycle.
#[async_trait::async_trait]
pub trait SubscriptionStore: Send + Sync {
    async fn load_all(&self) -> Result<Vec<Subscription>>;
    fn name(&self) -> &str;
}
