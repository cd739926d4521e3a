// HTTP status API

pub mod health;
pub mod status;

pub use health::{check_health, ComponentHealth, HealthReport, HealthStatus};
pub use status::{create_status_router, QualityParams, StatusAppState};
