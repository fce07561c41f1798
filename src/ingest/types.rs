// src/ingest/types.rs
use anyhow::Result;

/// Seconds since the Unix epoch.
pub type Timestamp = i64;

/// One post as handed over by a [`PostSource`].
///
/// `created_at` has whole-second precision. Sources with fractional creation
/// times floor them, so two posts within the same second compare equal and
/// the later one is treated as already seen once the watermark reaches it.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq, Eq)]
pub struct Post {
    pub id: String,          // e.g. "1abcxyz"
    pub title: String,       // normalized title
    pub created_at: Timestamp,
    pub url: Option<String>, // permalink, when the source has one
}

/// A newest-first feed of posts from one fixed channel.
///
/// Implementations must return posts ordered by `created_at` descending, with
/// `created_at` floored to whole seconds. The fetch cycle stops scanning at
/// the first already-seen post and relies on both.
#[async_trait::async_trait]
pub trait PostSource: Send + Sync {
    async fn fetch_newest(&self, limit: usize) -> Result<Vec<Post>>;
    fn name(&self) -> &str;
}
