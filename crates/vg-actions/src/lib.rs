//! # vg-actions
//!
//! Remediation action execution for Vault Guard.
//!
//! Bridges the engine's [`vg_core::ActionDispatch`] seam to the
//! [`vg_connectors::VaultBackend`] operations, with per-call timeouts and
//! audit logging.

pub mod executor;

pub use executor::{ActionExecutor, ExecutorConfig};
