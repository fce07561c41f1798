//! One incremental fetch cycle: pull the newest page, keep only posts newer
//! than the watermark, match them against subscriptions, hand the batch to
//! the notifier and move the watermark forward.
//!
//! Known limitation: when more than `num_posts` posts arrive between two
//! cycles, the older overflow is never seen. The watermark jumps to the
//! newest post of the page and there is no cursor to page further back.

use anyhow::{Context, Result};
use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use once_cell::sync::OnceCell;
use std::time::Instant;

use crate::ingest::types::{Post, PostSource, Timestamp};
use crate::matcher::{match_post, NotificationBatch};
use crate::notify::Notifier;
use crate::subscriptions::SubscriptionStore;
use crate::watermark::Watermark;

/// One-time metrics registration (so series show up on /metrics).
fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("poll_cycles_total", "Fetch cycles completed.");
        describe_counter!(
            "poll_cycle_errors_total",
            "Fetch cycles skipped because a source or store call failed."
        );
        describe_counter!("poll_posts_fetched_total", "Posts returned by the source.");
        describe_counter!("poll_posts_new_total", "Posts newer than the watermark.");
        describe_counter!(
            "poll_matches_total",
            "Distinct (subscriber, post) pairs matched across all new posts."
        );
        describe_counter!(
            "source_fetch_errors_total",
            "Post source fetches that returned an error."
        );
        describe_counter!("notify_batches_total", "Non-empty batches handed to the notifier.");
        describe_counter!("notify_errors_total", "Batches the notifier failed to deliver.");
        describe_gauge!("poll_watermark_ts", "Current watermark (unix seconds).");
        describe_histogram!("poll_cycle_ms", "Fetch cycle duration in milliseconds.");
        describe_histogram!("source_fetch_ms", "Post source fetch time in milliseconds.");
    });
}

/// What a successful cycle did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleReport {
    pub fetched: usize,
    pub new_posts: usize,
    /// Subscribers with at least one post in this cycle's batch.
    pub notified: usize,
    pub watermark_before: Timestamp,
    pub watermark_after: Timestamp,
    /// False if the notifier returned an error.
    pub delivered: bool,
}

/// Posts from `page` newer than `watermark`, plus the page's newest timestamp.
///
/// `page` must be newest first; scanning stops at the first post at or
/// before the watermark.
pub fn split_new(page: &[Post], watermark: Timestamp) -> (Vec<&Post>, Option<Timestamp>) {
    let newest_seen = page.first().map(|p| p.created_at);
    let fresh = page
        .iter()
        .take_while(|p| p.created_at > watermark)
        .collect();
    (fresh, newest_seen)
}

/// Owns the watermark and the collaborator handles for the lifetime of the
/// process. `run` takes `&mut self`, so cycles can never overlap.
pub struct FetchCycle {
    source: Box<dyn PostSource>,
    store: Box<dyn SubscriptionStore>,
    notifier: Box<dyn Notifier>,
    num_posts: usize,
    watermark: Watermark,
}

impl FetchCycle {
    pub fn new(
        source: Box<dyn PostSource>,
        store: Box<dyn SubscriptionStore>,
        notifier: Box<dyn Notifier>,
        num_posts: usize,
    ) -> Self {
        Self {
            source,
            store,
            notifier,
            num_posts,
            watermark: Watermark::new(),
        }
    }

    pub fn watermark(&self) -> Timestamp {
        self.watermark.current()
    }

    pub fn num_posts(&self) -> usize {
        self.num_posts
    }

    /// Run one cycle. On a source or store error nothing is committed: the
    /// watermark stays put and no batch is delivered.
    pub async fn run(&mut self) -> Result<CycleReport> {
        ensure_metrics_described();
        let t0 = Instant::now();
        let before = self.watermark.current();

        let page = self
            .source
            .fetch_newest(self.num_posts)
            .await
            .with_context(|| format!("fetching posts from {}", self.source.name()))?;
        let (fresh, newest_seen) = split_new(&page, before);

        let mut batch = NotificationBatch::new();
        let mut matches = 0usize;
        if !fresh.is_empty() {
            let subs = self
                .store
                .load_all()
                .await
                .with_context(|| format!("loading subscriptions from {}", self.store.name()))?;
            for post in &fresh {
                matches += match_post(post, &subs, &mut batch);
            }
        }

        // Empty page: keep the watermark. A newest post older than the
        // watermark (e.g. the previous newest was deleted) must not move it
        // back either, or the gap would be processed twice.
        match newest_seen {
            Some(newest) if newest > before => self.watermark.advance(newest),
            Some(newest) if newest < before => {
                tracing::debug!(newest, watermark = before, "feed head older than watermark");
            }
            _ => {}
        }
        let after = self.watermark.current();

        let mut delivered = true;
        if !batch.is_empty() {
            counter!("notify_batches_total").increment(1);
            if let Err(e) = self.notifier.deliver(&batch).await {
                tracing::warn!(
                    notifier = self.notifier.name(),
                    error = ?e,
                    subscribers = batch.len(),
                    "notification delivery failed"
                );
                counter!("notify_errors_total").increment(1);
                delivered = false;
            }
        }

        counter!("poll_cycles_total").increment(1);
        counter!("poll_posts_fetched_total").increment(page.len() as u64);
        counter!("poll_posts_new_total").increment(fresh.len() as u64);
        counter!("poll_matches_total").increment(matches as u64);
        gauge!("poll_watermark_ts").set(after as f64);
        histogram!("poll_cycle_ms").record(t0.elapsed().as_secs_f64() * 1_000.0);

        Ok(CycleReport {
            fetched: page.len(),
            new_posts: fresh.len(),
            notified: batch.len(),
            watermark_before: before,
            watermark_after: after,
            delivered,
        })
    }

    /// Run one cycle, logging and swallowing any error so the scheduler
    /// keeps going. The next cycle retries the same window.
    pub async fn tick(&mut self) -> Option<CycleReport> {
        match self.run().await {
            Ok(report) => {
                if report.new_posts > 0 {
                    tracing::info!(
                        target: "poll",
                        fetched = report.fetched,
                        new = report.new_posts,
                        notified = report.notified,
                        watermark = report.watermark_after,
                        "fetch cycle"
                    );
                } else {
                    tracing::trace!(target: "poll", fetched = report.fetched, "no new posts");
                }
                Some(report)
            }
            Err(e) => {
                tracing::warn!(
                    target: "poll",
                    error = ?e,
                    watermark = self.watermark.current(),
                    "fetch cycle failed; skipping"
                );
                counter!("poll_cycle_errors_total").increment(1);
                None
            }
        }
    }
}
