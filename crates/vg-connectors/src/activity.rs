//! Activity wire types shared with the vault back-end.
//!
//! An [`ActivityRecord`] is an immutable, append-only event fetched from the
//! activity source. The analysis side never mutates records; it only reads
//! snapshots produced here.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Mean Earth radius in kilometers, used for haversine distances.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// A geographic coordinate attached to an activity record.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    /// Latitude in degrees.
    pub latitude: f64,
    /// Longitude in degrees.
    pub longitude: f64,
}

impl GeoPoint {
    /// Creates a new coordinate.
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Great-circle distance to another point in kilometers (haversine).
    pub fn distance_km(&self, other: &GeoPoint) -> f64 {
        let lat1 = self.latitude.to_radians();
        let lat2 = other.latitude.to_radians();
        let dlat = (other.latitude - self.latitude).to_radians();
        let dlon = (other.longitude - self.longitude).to_radians();

        let a = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
        let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
        EARTH_RADIUS_KM * c
    }
}

/// The kind of event an activity record describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityType {
    /// A document or vault was opened by the owner.
    Access,
    /// A vault was opened by a nominee.
    NomineeAccess,
    /// A document was uploaded.
    Upload,
    /// A document was deleted.
    Deletion,
    /// A document was shared outside the vault.
    Share,
    /// A failed unlock attempt.
    LoginFailure,
    /// An access attempt rejected by policy.
    AccessDenied,
    /// A dual-key unlock request.
    DualKeyRequest,
}

impl std::fmt::Display for ActivityType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Access => "access",
            Self::NomineeAccess => "nominee_access",
            Self::Upload => "upload",
            Self::Deletion => "deletion",
            Self::Share => "share",
            Self::LoginFailure => "login_failure",
            Self::AccessDenied => "access_denied",
            Self::DualKeyRequest => "dual_key_request",
        };
        write!(f, "{}", s)
    }
}

/// A single entry in a vault's activity log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityRecord {
    /// Unique record identifier.
    pub id: Uuid,
    /// What happened.
    pub activity_type: ActivityType,
    /// When it happened.
    pub timestamp: DateTime<Utc>,
    /// Where it happened, if the client reported a location.
    pub location: Option<GeoPoint>,
    /// Device descriptor, if reported.
    pub device: Option<String>,
    /// The document involved, if any.
    pub document_id: Option<Uuid>,
    /// The acting party (nominee name for nominee-attributed events).
    pub actor: Option<String>,
}

impl ActivityRecord {
    /// Creates a record with a fresh identifier and no optional context.
    pub fn new(activity_type: ActivityType, timestamp: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            activity_type,
            timestamp,
            location: None,
            device: None,
            document_id: None,
            actor: None,
        }
    }

    /// Attaches a location.
    pub fn with_location(mut self, location: GeoPoint) -> Self {
        self.location = Some(location);
        self
    }

    /// Attaches a device descriptor.
    pub fn with_device(mut self, device: impl Into<String>) -> Self {
        self.device = Some(device.into());
        self
    }

    /// Attaches a related document.
    pub fn with_document(mut self, document_id: Uuid) -> Self {
        self.document_id = Some(document_id);
        self
    }

    /// Attaches the acting party.
    pub fn with_actor(mut self, actor: impl Into<String>) -> Self {
        self.actor = Some(actor.into());
        self
    }

    /// True for owner and nominee access events.
    pub fn is_access(&self) -> bool {
        matches!(
            self.activity_type,
            ActivityType::Access | ActivityType::NomineeAccess
        )
    }
}

/// Metadata for a document stored in a vault.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentMeta {
    /// Document identifier.
    pub id: Uuid,
    /// Display name.
    pub name: String,
    /// MIME-ish content type (e.g. "application/pdf").
    pub content_type: String,
    /// User-assigned tags.
    pub tags: Vec<String>,
}

impl DocumentMeta {
    /// Creates document metadata with a fresh identifier.
    pub fn new(name: impl Into<String>, content_type: impl Into<String>, tags: Vec<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            content_type: content_type.into(),
            tags,
        }
    }
}

/// A vault reference as known to the directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VaultRef {
    /// Vault identifier.
    pub id: Uuid,
    /// Display name.
    pub name: String,
}

impl VaultRef {
    /// Creates a reference with a fresh identifier.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
        }
    }
}

/// A point-in-time view of one vault's activity, documents, and nominees.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VaultSnapshot {
    /// The vault this snapshot belongs to.
    pub vault: VaultRef,
    /// Activity log entries, oldest first.
    pub records: Vec<ActivityRecord>,
    /// Documents currently stored in the vault.
    pub documents: Vec<DocumentMeta>,
    /// Names of nominees with conditional access.
    pub nominees: Vec<String>,
}

impl VaultSnapshot {
    /// Creates an empty snapshot for a vault.
    pub fn new(vault: VaultRef) -> Self {
        Self {
            vault,
            records: Vec::new(),
            documents: Vec::new(),
            nominees: Vec::new(),
        }
    }

    /// Records of a given type, in log order.
    pub fn records_of(&self, activity_type: ActivityType) -> impl Iterator<Item = &ActivityRecord> {
        self.records
            .iter()
            .filter(move |r| r.activity_type == activity_type)
    }

    /// Owner and nominee access records, in log order.
    pub fn access_records(&self) -> impl Iterator<Item = &ActivityRecord> {
        self.records.iter().filter(|r| r.is_access())
    }

    /// Count of records of a type within the trailing window ending now.
    pub fn count_within(&self, activity_type: ActivityType, window: Duration) -> usize {
        let cutoff = Utc::now() - window;
        self.records_of(activity_type)
            .filter(|r| r.timestamp >= cutoff)
            .count()
    }

    /// True when the snapshot carries no activity at all.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
