//! Publishing channels for the fee summary

use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info};

/// Publisher errors
#[derive(Error, Debug)]
pub enum PublishError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Publisher rejected the post: {0}")]
    Rejected(String),

    #[error("Publisher did not answer within {0:?}")]
    TimedOut(Duration),
}

/// Posts the human readable fee summary somewhere
#[async_trait]
pub trait Publisher: Send + Sync {
    async fn publish(&self, text: &str) -> Result<(), PublishError>;
}

/// Writes the summary to the log
pub struct LogPublisher;

#[async_trait]
impl Publisher for LogPublisher {
    async fn publish(&self, text: &str) -> Result<(), PublishError> {
        info!("Published fee summary:\n{}", text);
        Ok(())
    }
}

/// POSTs `{"text": ...}` to a webhook (Slack, Discord, Mattermost and friends)
pub struct WebhookPublisher {
    client: Client,
    url: String,
    timeout: Duration,
}

impl WebhookPublisher {
    /// Default per-request timeout
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

    pub fn new(url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            url: url.into(),
            timeout: Self::DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl Publisher for WebhookPublisher {
    async fn publish(&self, text: &str) -> Result<(), PublishError> {
        let response = self
            .client
            .post(&self.url)
            .timeout(self.timeout)
            .json(&json!({ "text": text }))
            .send()
            .await?;

        if !response.status().is_success() {
            error!("Webhook rejected post with status: {}", response.status());
            return Err(PublishError::Rejected(format!(
                "webhook returned status {}",
                response.status()
            )));
        }

        info!("Fee summary posted to webhook");
        Ok(())
    }
}

/// Keeps every published text in memory
#[derive(Clone, Default)]
pub struct MemoryPublisher {
    posts: Arc<Mutex<Vec<String>>>,
}

impl MemoryPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Texts published so far, oldest first
    pub fn posts(&self) -> Vec<String> {
        self.posts
            .lock()
            .map(|posts| posts.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl Publisher for MemoryPublisher {
    async fn publish(&self, text: &str) -> Result<(), PublishError> {
        let mut posts = self
            .posts
            .lock()
            .map_err(|_| PublishError::Rejected("memory publisher lock poisoned".to_string()))?;
        posts.push(text.to_string());
        Ok(())
    }
}

/// Wrapper enum over the supported publishers
pub enum PublisherClient {
    Log(LogPublisher),
    Webhook(WebhookPublisher),
    Memory(MemoryPublisher),
}

#[async_trait]
impl Publisher for PublisherClient {
    async fn publish(&self, text: &str) -> Result<(), PublishError> {
        match self {
            PublisherClient::Log(publisher) => publisher.publish(text).await,
            PublisherClient::Webhook(publisher) => publisher.publish(text).await,
            PublisherClient::Memory(publisher) => publisher.publish(text).await,
        }
    }
}
