//! Keyword matching of post titles against subscriptions.
//!
//! Matching is a case-insensitive substring test. A post is added to a
//! subscriber's list at most once, however many of their keywords hit.

use std::collections::BTreeMap;

use crate::ingest::types::Post;
use crate::subscriptions::Subscription;

/// Posts matched during one fetch cycle, keyed by subscriber email.
///
/// Lists keep encounter order; the fetch cycle feeds posts newest first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NotificationBatch {
    entries: BTreeMap<String, Vec<Post>>,
}

impl NotificationBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of subscribers with at least one post.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Total number of (subscriber, post) pairs.
    pub fn total_posts(&self) -> usize {
        self.entries.values().map(Vec::len).sum()
    }

    pub fn get(&self, email: &str) -> Option<&[Post]> {
        self.entries.get(email).map(Vec::as_slice)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[Post])> {
        self.entries
            .iter()
            .map(|(email, posts)| (email.as_str(), posts.as_slice()))
    }

    /// Returns false if `email` already had this post.
    fn push(&mut self, email: &str, post: &Post) -> bool {
        let posts = self.entries.entry(email.to_string()).or_default();
        // Duplicate subscription records for one email must not repeat a post.
        if posts.iter().any(|p| p.id == post.id) {
            return false;
        }
        posts.push(post.clone());
        true
    }
}

/// True if any keyword occurs in `title`, ignoring case.
///
/// Keywords are matched exactly as stored, surrounding spaces included.
/// Whitespace-only keywords never match.
pub fn title_matches<S: AsRef<str>>(title: &str, keywords: &[S]) -> bool {
    lowered_title_matches(&title.to_lowercase(), keywords)
}

fn lowered_title_matches<S: AsRef<str>>(lowered_title: &str, keywords: &[S]) -> bool {
    keywords.iter().any(|k| {
        let k = k.as_ref();
        !k.trim().is_empty() && lowered_title.contains(&k.to_lowercase())
    })
}

/// Match one post against every subscription and merge hits into `batch`.
/// Returns how many (subscriber, post) pairs were added.
pub fn match_post(
    post: &Post,
    subscriptions: &[Subscription],
    batch: &mut NotificationBatch,
) -> usize {
    let title = post.title.to_lowercase();
    let mut added = 0usize;
    for sub in subscriptions {
        if lowered_title_matches(&title, sub.keywords.as_slice())
            && batch.push(&sub.email, post)
        {
            added += 1;
        }
    }
    added
}
