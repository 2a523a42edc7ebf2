//! Inbound side of the request/reply transport.
//!
//! Each message on the request subject carries one batch envelope and a reply
//! subject; the reply itself goes out through [`crate::producer::ReplyPublisher`].

use anyhow::{Context, Result};
use async_nats::{Client, Subscriber};
use tracing::info;

/// Subscription to batch screening requests, optionally load balanced
/// across service instances through a NATS queue group.
pub struct BatchRequestConsumer {
    client: Client,
    subject: String,
    queue_group: Option<String>,
}

impl BatchRequestConsumer {
    pub fn new(client: Client, subject: &str) -> Self {
        Self {
            client,
            subject: subject.to_string(),
            queue_group: None,
        }
    }

    /// Join a queue group so only one instance answers each request
    pub fn with_queue_group(mut self, queue_group: Option<String>) -> Self {
        self.queue_group = queue_group;
        self
    }

    /// Start receiving requests
    pub async fn subscribe(&self) -> Result<Subscriber> {
        let subscriber = match &self.queue_group {
            Some(group) => self
                .client
                .queue_subscribe(self.subject.clone(), group.clone())
                .await
                .with_context(|| format!("Failed to join queue group {group} on {}", self.subject))?,
            None => self
                .client
                .subscribe(self.subject.clone())
                .await
                .with_context(|| format!("Failed to subscribe to {}", self.subject))?,
        };

        info!(
            subject = %self.subject,
            queue_group = self.queue_group.as_deref().unwrap_or("-"),
            "Listening for screening requests"
        );
        Ok(subscriber)
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }
}
