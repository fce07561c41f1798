// tests/common/mod.rs
// In-memory collaborators shared by the integration tests.
#![allow(dead_code)]

use anyhow::{bail, Result};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use wex_notifier::{
    FetchCycle, NotificationBatch, Notifier, Post, PostSource, Subscription, SubscriptionStore,
};

pub fn post(id: &str, title: &str, created_at: i64) -> Post {
    Post {
        id: id.to_string(),
        title: title.to_string(),
        created_at,
        url: Some(format!("https://www.reddit.com/r/Watchexchange/comments/{id}/")),
    }
}

pub fn sub(email: &str, keywords: &[&str]) -> Subscription {
    Subscription::new(email, keywords).expect("valid subscription")
}

#[derive(Default)]
struct FeedState {
    posts: Vec<Post>,
    fail_next: usize,
    calls: usize,
}

/// Simulated subreddit: keeps every published post and serves the newest
/// `limit` of them, newest first.
#[derive(Clone, Default)]
pub struct Feed {
    inner: Arc<Mutex<FeedState>>,
}

impl Feed {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn publish(&self, p: Post) {
        let mut st = self.inner.lock().unwrap();
        st.posts.push(p);
        st.posts.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    }

    pub fn delete(&self, id: &str) {
        self.inner.lock().unwrap().posts.retain(|p| p.id != id);
    }

    pub fn fail_next(&self, n: usize) {
        self.inner.lock().unwrap().fail_next = n;
    }

    pub fn calls(&self) -> usize {
        self.inner.lock().unwrap().calls
    }
}

#[async_trait]
impl PostSource for Feed {
    async fn fetch_newest(&self, limit: usize) -> Result<Vec<Post>> {
        let mut st = self.inner.lock().unwrap();
        st.calls += 1;
        if st.fail_next > 0 {
            st.fail_next -= 1;
            bail!("listing returned HTTP 503");
        }
        Ok(st.posts.iter().take(limit).cloned().collect())
    }

    fn name(&self) -> &str {
        "feed-sim"
    }
}

#[derive(Default)]
struct StoreState {
    subs: Vec<Subscription>,
    fail_next: usize,
    loads: usize,
}

#[derive(Clone, Default)]
pub struct Store {
    inner: Arc<Mutex<StoreState>>,
}

impl Store {
    pub fn with(subs: Vec<Subscription>) -> Self {
        let s = Self::default();
        s.inner.lock().unwrap().subs = subs;
        s
    }

    pub fn add(&self, s: Subscription) {
        self.inner.lock().unwrap().subs.push(s);
    }

    pub fn fail_next(&self, n: usize) {
        self.inner.lock().unwrap().fail_next = n;
    }

    pub fn loads(&self) -> usize {
        self.inner.lock().unwrap().loads
    }
}

#[async_trait]
impl SubscriptionStore for Store {
    async fn load_all(&self) -> Result<Vec<Subscription>> {
        let mut st = self.inner.lock().unwrap();
        st.loads += 1;
        if st.fail_next > 0 {
            st.fail_next -= 1;
            bail!("server selection timeout");
        }
        Ok(st.subs.clone())
    }

    fn name(&self) -> &str {
        "store-sim"
    }
}

/// Records every delivered batch.
#[derive(Clone, Default)]
pub struct Outbox {
    batches: Arc<Mutex<Vec<NotificationBatch>>>,
    fail: Arc<AtomicBool>,
}

impl Outbox {
    pub fn batches(&self) -> Vec<NotificationBatch> {
        self.batches.lock().unwrap().clone()
    }

    pub fn last(&self) -> Option<NotificationBatch> {
        self.batches.lock().unwrap().last().cloned()
    }

    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    /// Every post id ever delivered to `email`, in delivery order.
    pub fn ids_for(&self, email: &str) -> Vec<String> {
        self.batches
            .lock()
            .unwrap()
            .iter()
            .filter_map(|b| b.get(email).map(|ps| ps.to_vec()))
            .flatten()
            .map(|p| p.id)
            .collect()
    }
}

#[async_trait]
impl Notifier for Outbox {
    async fn deliver(&self, batch: &NotificationBatch) -> Result<()> {
        self.batches.lock().unwrap().push(batch.clone());
        if self.fail.load(Ordering::SeqCst) {
            bail!("smtp relay unavailable");
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "outbox"
    }
}

pub fn cycle(feed: &Feed, store: &Store, outbox: &Outbox, num_posts: usize) -> FetchCycle {
    FetchCycle::new(
        Box::new(feed.clone()),
        Box::new(store.clone()),
        Box::new(outbox.clone()),
        num_posts,
    )
}
