use anyhow::{Context, Result};
use async_nats::jetstream::{self, stream};
use serde::Deserialize;
use tracing::info;

/// NATS configuration
#[derive(Clone, Debug, Deserialize)]
pub struct NatsConfig {
    #[serde(default = "default_url")]
    pub url: String,
    #[serde(default = "default_stream_name")]
    pub stream_name: String,
    /// Durable pull consumer reading `input_subject`
    #[serde(default = "default_consumer_name")]
    pub consumer_name: String,
    #[serde(default = "default_input_subject")]
    pub input_subject: String,
    #[serde(default = "default_normal_subject")]
    pub normal_subject: String,
    #[serde(default = "default_anomaly_subject")]
    pub anomaly_subject: String,
    #[serde(default = "default_analytics_subject")]
    pub analytics_subject: String,
    /// Raw payloads that could not be parsed
    #[serde(default = "default_dead_letter_subject")]
    pub dead_letter_subject: String,
    #[serde(default = "default_max_age_days")]
    pub max_age_days: i64,
    #[serde(default = "default_max_bytes")]
    pub max_bytes: i64,
}

fn default_url() -> String {
    "nats://localhost:4222".to_string()
}

fn default_stream_name() -> String {
    "VIDEO_EVENTS".to_string()
}

fn default_consumer_name() -> String {
    "vidflow-processor".to_string()
}

fn default_input_subject() -> String {
    "video.events.raw".to_string()
}

fn default_normal_subject() -> String {
    "video.events.processed".to_string()
}

fn default_anomaly_subject() -> String {
    "video.events.anomalies".to_string()
}

fn default_analytics_subject() -> String {
    "video.analytics.windows".to_string()
}

fn default_dead_letter_subject() -> String {
    "video.events.dead_letter".to_string()
}

fn default_max_age_days() -> i64 {
    7
}

fn default_max_bytes() -> i64 {
    10 * 1024 * 1024 * 1024 // 10GB
}

impl Default for NatsConfig {
    fn default() -> Self {
        Self {
            url: default_url(),
            stream_name: default_stream_name(),
            consumer_name: default_consumer_name(),
            input_subject: default_input_subject(),
            normal_subject: default_normal_subject(),
            anomaly_subject: default_anomaly_subject(),
            analytics_subject: default_analytics_subject(),
            dead_letter_subject: default_dead_letter_subject(),
            max_age_days: default_max_age_days(),
            max_bytes: default_max_bytes(),
        }
    }
}

impl NatsConfig {
    /// Every subject the pipeline reads or writes, with its config key
    pub fn subjects(&self) -> [(&'static str, &str); 5] {
        [
            ("input_subject", &self.input_subject),
            ("normal_subject", &self.normal_subject),
            ("anomaly_subject", &self.anomaly_subject),
            ("analytics_subject", &self.analytics_subject),
            ("dead_letter_subject", &self.dead_letter_subject),
        ]
    }

    /// Subjects captured by the JetStream stream, deduplicated
    pub fn stream_subjects(&self) -> Vec<String> {
        let mut subjects: Vec<String> = Vec::new();
        for (_, subject) in self.subjects() {
            if !subjects.iter().any(|s| s == subject) {
                subjects.push(subject.to_string());
            }
        }
        subjects
    }
}

/// NATS client with JetStream
pub struct NatsClient {
    client: async_nats::Client,
    jetstream: jetstream::Context,
    config: NatsConfig,
}

impl NatsClient {
    /// Connect to NATS and initialize JetStream
    pub async fn connect(config: NatsConfig) -> Result<Self> {
        info!("Connecting to NATS at {}", config.url);

        let client = async_nats::connect(&config.url)
            .await
            .context("Failed to connect to NATS")?;

        let jetstream = jetstream::new(client.clone());

        let nats_client = Self {
            client,
            jetstream,
            config,
        };

        nats_client.ensure_stream().await?;

        Ok(nats_client)
    }

    /// Ensure JetStream stream exists with proper configuration
    async fn ensure_stream(&self) -> Result<()> {
        info!("Ensuring JetStream stream '{}' exists", self.config.stream_name);

        if self.jetstream.get_stream(&self.config.stream_name).await.is_ok() {
            info!("Stream '{}' already exists", self.config.stream_name);
            return Ok(());
        }
        info!("Stream '{}' does not exist, creating...", self.config.stream_name);

        let stream_config = stream::Config {
            name: self.config.stream_name.clone(),
            subjects: self.config.stream_subjects(),
            max_age: std::time::Duration::from_secs((self.config.max_age_days * 86400) as u64),
            max_bytes: self.config.max_bytes,
            storage: stream::StorageType::File,
            retention: stream::RetentionPolicy::Limits,
            ..Default::default()
        };

        self.jetstream
            .create_stream(stream_config)
            .await
            .context("Failed to create JetStream stream")?;

        info!("Created JetStream stream '{}'", self.config.stream_name);
        Ok(())
    }

    /// Get JetStream context for publishing and consuming
    pub fn jetstream(&self) -> &jetstream::Context {
        &self.jetstream
    }

    /// Get underlying NATS client
    pub fn client(&self) -> &async_nats::Client {
        &self.client
    }

    pub fn config(&self) -> &NatsConfig {
        &self.config
    }
}
