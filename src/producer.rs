//! NATS publisher for screening replies

use anyhow::Result;
use async_nats::{Client, Subject};
use tracing::{debug, warn};

/// Sends reply bodies back to the requester's inbox
#[derive(Clone)]
pub struct ReplyPublisher {
    client: Client,
}

impl ReplyPublisher {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Publish a reply. Requests without a reply subject are dropped with a
    /// warning; there is nobody to answer.
    pub async fn reply(&self, reply_to: Option<Subject>, body: Vec<u8>) -> Result<()> {
        let Some(subject) = reply_to else {
            warn!("Screening request had no reply subject, dropping reply");
            return Ok(());
        };

        let size = body.len();
        self.client.publish(subject.clone(), body.into()).await?;
        debug!(reply_to = %subject, bytes = size, "Published screening reply");
        Ok(())
    }
}
