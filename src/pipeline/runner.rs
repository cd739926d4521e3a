use super::Pipeline;
use crate::nats::{EventPublisher, NatsConfig};
use anyhow::{Context, Result};
use async_nats::jetstream::{self, consumer::pull};
use chrono::Utc;
use futures::StreamExt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{error, info, warn};

/// Consume the input subject until `shutdown` resolves or the stream ends.
///
/// Each message is processed, its outbound records published, and only then
/// acknowledged; a failed publish leaves the message unacked for redelivery.
/// Messages that produce nothing (quality drops) are acked too. Windows
/// closed by the watermark are published every `tick_interval`; aggregates
/// that fail to publish are kept and retried on the next tick. On exit the
/// pipeline's shutdown policy is applied and the remaining aggregates
/// published once more. Whatever still fails then is counted as dropped.
pub async fn run(
    pipeline: Arc<Pipeline>,
    jetstream: jetstream::Context,
    config: &NatsConfig,
    tick_interval: Duration,
    shutdown: impl Future<Output = ()>,
) -> Result<()> {
    info!("Starting pipeline NATS consumer");

    let stream = jetstream
        .get_stream(&config.stream_name)
        .await
        .with_context(|| format!("Failed to get {} stream", config.stream_name))?;

    let consumer = stream
        .get_or_create_consumer(
            &config.consumer_name,
            pull::Config {
                durable_name: Some(config.consumer_name.clone()),
                filter_subject: config.input_subject.clone(),
                ..Default::default()
            },
        )
        .await
        .context("Failed to get or create consumer")?;

    info!(
        consumer = %config.consumer_name,
        subject = %config.input_subject,
        "Pipeline consumer created, processing events..."
    );

    let publisher = EventPublisher::new(jetstream);
    let publisher = &publisher;
    let mut pending = pipeline.pending_aggregates();
    let mut messages = consumer.messages().await?;

    let mut ticker = interval(tick_interval);
    // Skip missed ticks to prevent backlog under load
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!("Pipeline consumer stopping");
                break;
            }
            _ = ticker.tick() => {
                pending.extend(pipeline.on_tick());
                if let Err(e) = pending.flush(|record| async move { publisher.publish(&record).await }).await {
                    error!(error = %e, pending = pending.len(), "Failed to publish window aggregates, retrying next tick");
                }
            }
            next = messages.next() => {
                let msg = match next {
                    Some(Ok(msg)) => msg,
                    Some(Err(e)) => {
                        error!(error = %e, "Error receiving message");
                        continue;
                    }
                    None => {
                        warn!("Pipeline consumer stream ended");
                        break;
                    }
                };

                let outbound = pipeline.handle_message(&msg.payload, Utc::now());
                match publisher.publish_all(&outbound).await {
                    Ok(()) => {
                        if let Err(e) = msg.ack().await {
                            error!(error = %e, "Failed to acknowledge message");
                        }
                    }
                    Err(e) => {
                        // Not acked: JetStream redelivers after the ack wait
                        error!(error = %e, "Failed to publish processed event");
                    }
                }
            }
        }
    }

    pending.extend(pipeline.shutdown());
    if !pending.is_empty() {
        info!(windows = pending.len(), "Publishing remaining window aggregates");
        if let Err(e) = pending.flush(|record| async move { publisher.publish(&record).await }).await {
            let dropped = pending.abandon();
            error!(error = %e, dropped, "Failed to publish window aggregates on shutdown");
            return Err(e.context("Failed to publish remaining window aggregates"));
        }
    }

    Ok(())
}
