// src/subscriptions/mongo.rs
use anyhow::{Context, Result};
use async_trait::async_trait;
use futures::TryStreamExt;
use metrics::counter;
use mongodb::bson::{doc, Bson, Document};
use mongodb::options::{ClientOptions, Credential};
use mongodb::{Client, Collection};
use std::time::Duration;

use super::{Subscription, SubscriptionStore};

const SERVER_SELECTION_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone)]
pub struct MongoSettings {
    /// Atlas host (`cluster0.abcde.mongodb.net`) or a full `mongodb://` URI.
    pub uri: String,
    pub username: String,
    pub password: String,
    pub database: String,
    pub collection: String,
}

impl MongoSettings {
    /// Connection string without credentials; those go in as a driver
    /// `Credential`, so special characters need no URL escaping.
    pub fn connection_string(&self) -> String {
        let uri = self.uri.trim();
        if uri.starts_with("mongodb://") || uri.starts_with("mongodb+srv://") {
            uri.to_string()
        } else {
            format!("mongodb+srv://{uri}/?retryWrites=true&w=majority")
        }
    }
}

pub struct MongoSubscriptionStore {
    collection: Collection<Document>,
}

impl MongoSubscriptionStore {
    /// Connect and ping. Fails if the server is not reachable within 5s.
    pub async fn connect(cfg: &MongoSettings) -> Result<Self> {
        let mut opts = ClientOptions::parse(cfg.connection_string())
            .await
            .context("parsing mongodb connection string")?;
        if !cfg.username.is_empty() {
            opts.credential = Some(
                Credential::builder()
                    .username(cfg.username.clone())
                    .password(cfg.password.clone())
                    .build(),
            );
        }
        opts.server_selection_timeout = Some(SERVER_SELECTION_TIMEOUT);
        opts.app_name = Some("wex-notifier".to_string());

        let client = Client::with_options(opts).context("building mongodb client")?;
        let db = client.database(&cfg.database);
        db.run_command(doc! { "ping": 1 }, None)
            .await
            .context("pinging mongodb")?;

        tracing::info!(
            database = %cfg.database,
            collection = %cfg.collection,
            "connected to subscription store"
        );
        Ok(Self {
            collection: db.collection::<Document>(&cfg.collection),
        })
    }
}

/// Map a `{ email, keywords: [..] }` document. Non-string keywords are ignored.
pub fn subscription_from_document(d: &Document) -> Option<Subscription> {
    let email = d.get_str("email").ok()?;
    let keywords: Vec<&str> = match d.get("keywords") {
        Some(Bson::Array(items)) => items.iter().filter_map(Bson::as_str).collect(),
        _ => Vec::new(),
    };
    Subscription::new(email, keywords)
}

#[async_trait]
impl SubscriptionStore for MongoSubscriptionStore {
    async fn load_all(&self) -> Result<Vec<Subscription>> {
        let mut cursor = self
            .collection
            .find(None, None)
            .await
            .context("querying subscriptions")?;

        let mut out = Vec::new();
        while let Some(d) = cursor
            .try_next()
            .await
            .context("reading subscriptions cursor")?
        {
            match subscription_from_document(&d) {
                Some(s) => out.push(s),
                None => {
                    tracing::warn!(id = ?d.get("_id"), "skipping malformed subscription document");
                    counter!("subscriptions_malformed_total").increment(1);
                }
            }
        }
        Ok(out)
    }

    fn name(&self) -> &str {
        "mongodb"
    }
}
