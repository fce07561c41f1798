// src/notify/mod.rs
pub mod email;
pub mod log;

use anyhow::{anyhow, Result};

use crate::matcher::NotificationBatch;

/// Delivery boundary for a cycle's notification batch.
#[async_trait::async_trait]
pub trait Notifier: Send + Sync {
    async fn deliver(&self, batch: &NotificationBatch) -> Result<()>;
    fn name(&self) -> &str;
}

/// Fans one batch out to several notifiers. Every notifier is attempted even
/// if an earlier one fails.
#[derive(Default)]
pub struct NotifierMux {
    sinks: Vec<Box<dyn Notifier>>,
}

impl NotifierMux {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, sink: impl Notifier + 'static) -> Self {
        self.sinks.push(Box::new(sink));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

#[async_trait::async_trait]
impl Notifier for NotifierMux {
    async fn deliver(&self, batch: &NotificationBatch) -> Result<()> {
        let mut failed = Vec::new();
        for sink in &self.sinks {
            if let Err(e) = sink.deliver(batch).await {
                tracing::warn!(notifier = sink.name(), error = ?e, "notifier failed");
                failed.push(sink.name().to_string());
            }
        }
        if failed.is_empty() {
            Ok(())
        } else {
            Err(anyhow!("notifiers failed: {}", failed.join(", ")))
        }
    }

    fn name(&self) -> &str {
        "mux"
    }
}
