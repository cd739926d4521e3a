// Event model and structural validation
pub mod event;

// Rule-based quality scoring and monitoring
pub mod quality;

// Parse, gate, enrich and classify
pub mod processor;

// Event-time windowed aggregation
pub mod window;

// Pipeline counters and periodic reporting
pub mod metrics;

// Processor + aggregator wiring and NATS consume loop
pub mod pipeline;

// Configuration loading
pub mod config;

// HTTP status API
pub mod api;

// NATS client integration
pub mod nats;
