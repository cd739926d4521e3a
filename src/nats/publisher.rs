use crate::pipeline::Outbound;
use anyhow::{Context, Result};
use async_nats::jetstream;
use tracing::debug;

/// Outbound record publisher for NATS JetStream
#[derive(Clone)]
pub struct EventPublisher {
    jetstream: jetstream::Context,
}

impl EventPublisher {
    /// Create a new publisher
    pub fn new(jetstream: jetstream::Context) -> Self {
        Self { jetstream }
    }

    /// Publish one outbound record and wait for the stream ack
    pub async fn publish(&self, record: &Outbound) -> Result<()> {
        debug!(
            route = %record.route,
            subject = %record.subject,
            bytes = record.payload.len(),
            "Publishing record to NATS"
        );

        self.jetstream
            .publish(record.subject.clone(), record.payload.clone().into())
            .await
            .with_context(|| format!("Failed to publish to subject '{}'", record.subject))?
            .await
            .context("Failed to await publish ack")?;

        Ok(())
    }

    /// Publish records in order, stopping at the first failure
    pub async fn publish_all(&self, records: &[Outbound]) -> Result<()> {
        for record in records {
            self.publish(record).await?;
        }
        Ok(())
    }
}
