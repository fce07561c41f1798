// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod config;
pub mod cycle;
pub mod ingest;
pub mod matcher;
pub mod metrics;
pub mod notify;
pub mod scheduler;
pub mod subscriptions;
pub mod watermark;

// ---- Re-exports for stable public API ----
pub use crate::cycle::{CycleReport, FetchCycle};
pub use crate::ingest::types::{Post, PostSource, Timestamp};
pub use crate::matcher::NotificationBatch;
pub use crate::notify::{Notifier, NotifierMux};
pub use crate::subscriptions::{Subscription, SubscriptionStore};
pub use crate::watermark::Watermark;
