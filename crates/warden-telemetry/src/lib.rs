//! Security telemetry and alerting for Warden.
//!
//! This crate provides the auth-event pipeline:
//! - Event enrichment (device parsing, geolocation)
//! - Anomaly scoring against historical signals
//! - Rule-based alerting with pluggable notification collaborators
//! - Log aggregation for dashboards
//!
//! The public entry point is [`AuthEventService`]: `log_auth_event` is
//! fire-and-forget and never surfaces failures to the caller.

pub mod aggregate;
pub mod anomaly;
pub mod device;
pub mod enrich;
pub mod error;
pub mod geo;
pub mod rules;
pub mod service;

pub use aggregate::LogAggregation;
pub use anomaly::{AnomalyScorer, SuspiciousIpSet};
pub use device::{is_bot_user_agent, parse_user_agent};
pub use enrich::EventEnricher;
pub use error::{TelemetryError, TelemetryResult};
pub use geo::{is_private_ip, GeoProvider, GeoResolver, NullGeoProvider};
pub use rules::{
    AlertAction, AlertRule, ConditionOp, NoopNotifier, Notifier, RuleCondition, RuleEngine,
};
pub use service::AuthEventService;
