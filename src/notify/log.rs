use anyhow::Result;

use super::Notifier;
use crate::matcher::NotificationBatch;

/// Default notifier: writes each subscriber's pending posts to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

#[async_trait::async_trait]
impl Notifier for LogNotifier {
    async fn deliver(&self, batch: &NotificationBatch) -> Result<()> {
        for (email, posts) in batch.iter() {
            let titles: Vec<&str> = posts.iter().map(|p| p.title.as_str()).collect();
            tracing::info!(
                target: "notify",
                email,
                posts = posts.len(),
                titles = ?titles,
                "pending notification"
            );
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "log"
    }
}
