use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use lettre::message::{header, Mailbox, Message};
use lettre::transport::smtp::{authentication::Credentials, AsyncSmtpTransport};
use lettre::{AsyncTransport, Tokio1Executor};
use metrics::counter;

use super::Notifier;
use crate::ingest::types::Post;
use crate::matcher::NotificationBatch;

#[derive(Debug, Clone)]
pub struct SmtpSettings {
    pub host: String,
    pub user: String,
    pub pass: String,
    pub from: String,
}

/// Sends one plain-text email per subscriber listing their matched posts.
pub struct EmailNotifier {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    subreddit: String,
}

impl EmailNotifier {
    pub fn new(cfg: &SmtpSettings, subreddit: impl Into<String>) -> Result<Self> {
        let creds = Credentials::new(cfg.user.clone(), cfg.pass.clone());
        let mailer = AsyncSmtpTransport::<Tokio1Executor>::relay(&cfg.host)
            .with_context(|| format!("invalid SMTP_HOST {}", cfg.host))?
            .credentials(creds)
            .build();
        let from = cfg
            .from
            .parse::<Mailbox>()
            .with_context(|| format!("invalid NOTIFY_EMAIL_FROM {}", cfg.from))?;

        Ok(Self {
            mailer,
            from,
            subreddit: subreddit.into(),
        })
    }

    async fn send_one(&self, to: &str, posts: &[Post]) -> Result<()> {
        let to = to
            .parse::<Mailbox>()
            .with_context(|| format!("invalid subscriber address {to}"))?;
        let (subject, body) = render_digest(&self.subreddit, posts);

        let msg = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(subject)
            .header(header::ContentType::TEXT_PLAIN)
            .body(body)
            .context("build email")?;

        self.mailer.send(msg).await.context("send email")?;
        Ok(())
    }
}

/// Subject and plain-text body for one subscriber's digest.
pub fn render_digest(subreddit: &str, posts: &[Post]) -> (String, String) {
    let subject = match posts {
        [only] => format!("r/{subreddit}: {}", only.title),
        _ => format!("r/{subreddit}: {} new posts match your keywords", posts.len()),
    };

    let mut body = format!("New posts on r/{subreddit} matching your keywords:\n\n");
    for p in posts {
        body.push_str(&format!("- {}\n", p.title));
        if let Some(when) = DateTime::<Utc>::from_timestamp(p.created_at, 0) {
            body.push_str(&format!("  posted {}\n", when.format("%Y-%m-%d %H:%M UTC")));
        }
        if let Some(url) = &p.url {
            body.push_str(&format!("  {url}\n"));
        }
    }
    (subject, body)
}

#[async_trait::async_trait]
impl Notifier for EmailNotifier {
    async fn deliver(&self, batch: &NotificationBatch) -> Result<()> {
        let mut failed = 0usize;
        for (email, posts) in batch.iter() {
            match self.send_one(email, posts).await {
                Ok(()) => {
                    tracing::debug!(email, posts = posts.len(), "email sent");
                    counter!("notify_emails_sent_total").increment(1);
                }
                Err(e) => {
                    tracing::warn!(email, error = ?e, "email delivery failed");
                    failed += 1;
                }
            }
        }
        if failed > 0 {
            return Err(anyhow!("{failed} of {} emails failed", batch.len()));
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "email"
    }
}
