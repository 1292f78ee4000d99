//! Digest of new records and best-effort delivery to chat channels.
//!
//! Delivery never fails the caller: every channel reports its own outcome.

use std::env;
use std::time::Duration;

use async_trait::async_trait;
use futures::future::join_all;
use reqwest::Client;
use serde_json::json;
use tracing::{debug, error, info};

use crate::error::NotifyError;
use crate::record::Record;

/// Records listed in a digest, the rest only counted in the header.
pub const MAX_PREVIEW: usize = 10;
/// First non-empty one of these is shown next to the unique value.
pub const PRIORITY_FIELDS: [&str; 4] = ["title", "company", "price", "posted"];

const TELEGRAM_API: &str = "https://api.telegram.org";
const NOTIFY_TIMEOUT: Duration = Duration::from_secs(15);

pub fn digest(records: &[Record], unique_field: &str, source: &str) -> String {
    let mut lines = Vec::with_capacity(MAX_PREVIEW + 1);
    lines.push(format!(
        "🔔 {} new item(s) detected for {}:",
        records.len(),
        source
    ));

    for r in records.iter().take(MAX_PREVIEW) {
        let mut parts = Vec::with_capacity(2);
        if let Some(key) = r.value(unique_field) {
            parts.push(key);
        }
        if let Some(desc) = PRIORITY_FIELDS.iter().find_map(|f| r.value(f)) {
            parts.push(desc);
        }
        lines.push(format!("• {}", parts.join(" — ")));
    }
    lines.join("\n")
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    Delivered,
    /// Channel has no configuration.
    Skipped,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelOutcome {
    pub channel: &'static str,
    pub delivery: Delivery,
}

#[async_trait]
pub trait Channel: Send + Sync {
    fn name(&self) -> &'static str;

    fn is_configured(&self) -> bool;

    async fn send(&self, client: &Client, text: &str) -> Result<(), NotifyError>;
}

/// Telegram bot `sendMessage`.
#[derive(Debug, Clone)]
pub struct Telegram {
    api_base: String,
    token: Option<String>,
    chat_id: Option<String>,
}

impl Telegram {
    pub fn new(token: Option<String>, chat_id: Option<String>) -> Self {
        Self {
            api_base: TELEGRAM_API.to_string(),
            token: token.filter(|s| !s.is_empty()),
            chat_id: chat_id.filter(|s| !s.is_empty()),
        }
    }

    /// `TELEGRAM_BOT_TOKEN` and `TELEGRAM_CHAT_ID`.
    pub fn from_env() -> Self {
        Self::new(
            env::var("TELEGRAM_BOT_TOKEN").ok(),
            env::var("TELEGRAM_CHAT_ID").ok(),
        )
    }

    pub fn with_api_base(mut self, base: impl Into<String>) -> Self {
        self.api_base = base.into();
        self
    }
}

#[async_trait]
impl Channel for Telegram {
    fn name(&self) -> &'static str {
        "telegram"
    }

    fn is_configured(&self) -> bool {
        self.token.is_some() && self.chat_id.is_some()
    }

    async fn send(&self, client: &Client, text: &str) -> Result<(), NotifyError> {
        let (Some(token), Some(chat_id)) = (&self.token, &self.chat_id) else {
            return Ok(());
        };
        let url = format!("{}/bot{}/sendMessage", self.api_base, token);
        let resp = client
            .post(url)
            .form(&[
                ("chat_id", chat_id.as_str()),
                ("text", text),
                ("disable_web_page_preview", "true"),
            ])
            .send()
            .await?;
        check(resp.status())
    }
}

/// Discord-style webhook taking `{"content": text}`.
#[derive(Debug, Clone)]
pub struct Webhook {
    url: Option<String>,
}

impl Webhook {
    pub fn new(url: Option<String>) -> Self {
        Self {
            url: url.filter(|s| !s.is_empty()),
        }
    }

    /// `DISCORD_WEBHOOK_URL`
    pub fn from_env() -> Self {
        Self::new(env::var("DISCORD_WEBHOOK_URL").ok())
    }
}

#[async_trait]
impl Channel for Webhook {
    fn name(&self) -> &'static str {
        "discord"
    }

    fn is_configured(&self) -> bool {
        self.url.is_some()
    }

    async fn send(&self, client: &Client, text: &str) -> Result<(), NotifyError> {
        let Some(url) = &self.url else {
            return Ok(());
        };
        let resp = client
            .post(url)
            .json(&json!({ "content": text }))
            .send()
            .await?;
        check(resp.status())
    }
}

fn check(status: reqwest::StatusCode) -> Result<(), NotifyError> {
    if status.is_success() {
        Ok(())
    } else {
        Err(NotifyError::Status(status))
    }
}

pub struct Notifier {
    client: Client,
    channels: Vec<Box<dyn Channel>>,
}

impl Notifier {
    pub fn new(channels: Vec<Box<dyn Channel>>) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(NOTIFY_TIMEOUT).build()?;
        Ok(Self { client, channels })
    }

    /// Telegram and Discord, configured from the environment.
    pub fn from_env() -> Result<Self, reqwest::Error> {
        Self::new(vec![
            Box::new(Telegram::from_env()),
            Box::new(Webhook::from_env()),
        ])
    }

    /// Send the digest of `records` to every channel. Empty input sends nothing.
    pub async fn notify(
        &self,
        records: &[Record],
        unique_field: &str,
        source: &str,
    ) -> Vec<ChannelOutcome> {
        if records.is_empty() {
            return Vec::new();
        }
        let text = digest(records, unique_field, source);

        join_all(self.channels.iter().map(|c| self.dispatch(c.as_ref(), &text))).await
    }

    async fn dispatch(&self, channel: &dyn Channel, text: &str) -> ChannelOutcome {
        let name = channel.name();
        let delivery = if !channel.is_configured() {
            debug!("{name} not configured, skipping");
            Delivery::Skipped
        } else {
            match channel.send(&self.client, text).await {
                Ok(()) => {
                    info!("{name} alert sent successfully");
                    Delivery::Delivered
                }
                Err(e) => {
                    error!("Failed to send {name} alert: {e}");
                    Delivery::Failed(e.to_string())
                }
            }
        };
        ChannelOutcome {
            channel: name,
            delivery,
        }
    }
}
