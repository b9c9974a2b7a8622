//! # vg-observability
//!
//! Logging, metrics, and audit infrastructure for Vault Guard.
//!
//! Structured logging with tracing, metrics via the `metrics` facade, and an
//! append-only audit trail of executed remediation actions.

pub mod audit;
pub mod logging;
pub mod metrics;

pub use audit::{ActionActor, ActionAuditEntry, ActionAuditLog};
pub use logging::{init_logging, init_logging_with_config, LoggingConfig};
pub use metrics::{KPIs, MetricsCollector};
