//! # vg-connectors
//!
//! Collaborator interfaces for Vault Guard.
//!
//! This crate defines the narrow boundaries the engine talks through: the
//! activity source, the action back-end, the alert sink, the capture sensor,
//! and the best-effort enhancement service, plus in-memory mock
//! implementations with failure injection for tests.

pub mod activity;
pub mod mock;
pub mod traits;

pub use activity::{
    ActivityRecord, ActivityType, DocumentMeta, GeoPoint, VaultRef, VaultSnapshot, EARTH_RADIUS_KM,
};
pub use mock::{
    BackendCall, CannedEnhancer, MockBehavior, MockVaultDirectory, RecordedAlert,
    RecordingAlertSink, StalledEnhancer, TestCaptureSensor,
};
pub use traits::{
    ActivitySource, AlertSink, BackendAck, CaptureSensor, ConnectorError, ConnectorResult,
    EnhancementService, VaultBackend,
};
