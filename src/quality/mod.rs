// Data quality scoring for constructed events

pub mod monitor;
pub mod rules;
#[cfg(test)]
mod tests;

use crate::event::VideoEvent;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, warn};

pub use monitor::{MessageCount, QualityMonitor, QualityReport};
pub use rules::{default_rules, RuleContext, RuleFault, RuleOutcome, ValidationRule};

/// Deduction for a failed schema check
const SCHEMA_PENALTY: f64 = 0.3;
/// Deduction for a rule that faulted
const RULE_FAULT_PENALTY: f64 = 0.1;
/// Error deductions are weighted by rule severity times this
const ERROR_WEIGHT: f64 = 0.2;
/// Warning deductions are weighted by rule severity times this
const WARNING_WEIGHT: f64 = 0.1;

/// Outcome of validating one event
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationResult {
    pub is_valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    /// Trust in the event's data, 0.0 to 1.0
    pub score: f64,
}

/// Schema check plus an ordered list of semantic rules.
///
/// The validator holds no mutable state, so one instance can be shared by
/// every worker.
pub struct QualityValidator {
    rules: Vec<Box<dyn ValidationRule>>,
}

impl QualityValidator {
    /// Validator with the built-in rules
    pub fn new() -> Self {
        Self::with_rules(default_rules())
    }

    pub fn with_rules(rules: Vec<Box<dyn ValidationRule>>) -> Self {
        Self { rules }
    }

    pub fn rule_names(&self) -> Vec<&'static str> {
        self.rules.iter().map(|r| r.name()).collect()
    }

    /// Validate against the current wall clock
    pub fn validate_event(&self, event: &VideoEvent) -> ValidationResult {
        self.validate_event_at(event, Utc::now())
    }

    /// Validate with an explicit clock.
    ///
    /// Score starts at 1.0. A failed schema check costs 0.3. Every error a
    /// rule reports costs `severity * 0.2`, every warning costs
    /// `severity * 0.1`, and a rule that faults costs a flat 0.1. The result
    /// is clamped to [0, 1]; the event is valid only if no errors were
    /// collected.
    pub fn validate_event_at(&self, event: &VideoEvent, now: DateTime<Utc>) -> ValidationResult {
        let mut errors = Vec::new();
        let mut warnings = Vec::new();
        let mut score = 1.0;

        if let Err(reason) = schema_check(event) {
            errors.push(format!("Schema validation failed: {}", reason));
            score -= SCHEMA_PENALTY;
        }

        let ctx = RuleContext { now };
        for rule in &self.rules {
            match rule.evaluate(event, &ctx) {
                Ok(outcome) => {
                    score -= outcome.errors.len() as f64 * outcome.severity * ERROR_WEIGHT;
                    score -= outcome.warnings.len() as f64 * outcome.severity * WARNING_WEIGHT;
                    errors.extend(outcome.errors);
                    warnings.extend(outcome.warnings);
                }
                Err(fault) => {
                    warn!(
                        event_id = %event.event_id,
                        rule = rule.name(),
                        error = %fault,
                        "Validation rule faulted"
                    );
                    errors.push(format!("Validation rule '{}' failed: {}", rule.name(), fault));
                    score -= RULE_FAULT_PENALTY;
                }
            }
        }

        let result = ValidationResult {
            is_valid: errors.is_empty(),
            errors,
            warnings,
            score: score.clamp(0.0, 1.0),
        };

        debug!(
            event_id = %event.event_id,
            score = result.score,
            errors = result.errors.len(),
            warnings = result.warnings.len(),
            "Event validated"
        );

        result
    }
}

impl Default for QualityValidator {
    fn default() -> Self {
        Self::new()
    }
}

/// Required identifiers must be non-empty strings. This mirrors the
/// published JSON schema (minLength 1) and is stricter in one respect than
/// construction, which lets empty identifiers through so they are scored.
fn schema_check(event: &VideoEvent) -> Result<(), String> {
    if event.event_id.is_empty() {
        return Err("event_id must be a non-empty string".to_string());
    }
    if event.source.source_id.is_empty() {
        return Err("video_source.source_id must be a non-empty string".to_string());
    }
    if event.source.camera_id.is_empty() {
        return Err("video_source.camera_id must be a non-empty string".to_string());
    }
    Ok(())
}
