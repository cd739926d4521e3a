// NATS JetStream transport

mod client;
mod publisher;

pub use client::{NatsClient, NatsConfig};
pub use publisher::EventPublisher;
