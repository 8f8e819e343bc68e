//! Wire types and domain projections for the tracking server.
//!
//! The server speaks a small form/JSON dialect: reads return a status
//! envelope with a list of user rows, updates accept form-encoded partial
//! payloads that only mutate the fields present. [`UserStatus`] is the
//! domain projection the rest of the crate works with; the raw rows stay
//! private to the client.

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// Server-side confirmation flag for an emergency episode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConfirmationStatus {
    /// No operator confirmation pending or recorded (`conf_status = 0`).
    #[default]
    Unconfirmed,
    /// An operator has confirmed the episode (`conf_status = 1`).
    Confirmed,
}

impl ConfirmationStatus {
    /// Decode the wire integer. Anything other than `1` reads as unconfirmed.
    pub fn from_wire(value: i64) -> Self {
        if value == 1 {
            Self::Confirmed
        } else {
            Self::Unconfirmed
        }
    }

    /// Encode for an outbound update payload.
    pub fn as_wire(self) -> u8 {
        match self {
            Self::Unconfirmed => 0,
            Self::Confirmed => 1,
        }
    }
}

impl std::fmt::Display for ConfirmationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unconfirmed => write!(f, "Unconfirmed"),
            Self::Confirmed => write!(f, "Confirmed"),
        }
    }
}

/// One user row from the read endpoint.
///
/// Every field is optional on the wire; missing numeric flags read as zero,
/// matching the server's sparse rows.
#[derive(Debug, Clone, Deserialize)]
pub struct UserRecord {
    pub username: Option<String>,
    pub la: Option<f64>,
    pub lo: Option<f64>,
    pub emr: Option<i64>,
    pub conf_status: Option<i64>,
    pub emr_desc: Option<String>,
    pub updated_at: Option<String>,
}

/// Envelope returned by the read endpoint.
#[derive(Debug, Deserialize)]
pub struct StatusResponse {
    pub status: String,
    #[serde(default)]
    pub data: Vec<UserRecord>,
}

impl StatusResponse {
    /// Whether the envelope's status field indicates success.
    pub fn is_ok(&self) -> bool {
        self.status.eq_ignore_ascii_case("ok") || self.status.eq_ignore_ascii_case("success")
    }
}

/// Current server-side record for a user, as seen by one poll cycle.
///
/// Transient: re-fetched every cycle and never persisted as a whole.
#[derive(Debug, Clone, PartialEq)]
pub struct UserStatus {
    pub username: String,
    pub latitude: f64,
    pub longitude: f64,
    /// Is an emergency currently flagged for this user?
    pub emergency_active: bool,
    /// Operator confirmation flag. Informational only; the emergency flag
    /// is authoritative for start/stop decisions.
    pub confirmation: ConfirmationStatus,
    pub emergency_description: Option<String>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl UserStatus {
    /// Project a wire row into the domain type, defaulting absent fields.
    pub fn from_record(record: &UserRecord) -> Self {
        Self {
            username: record.username.clone().unwrap_or_default(),
            latitude: record.la.unwrap_or(0.0),
            longitude: record.lo.unwrap_or(0.0),
            emergency_active: record.emr.unwrap_or(0) == 1,
            confirmation: ConfirmationStatus::from_wire(record.conf_status.unwrap_or(0)),
            emergency_description: record.emr_desc.clone().filter(|d| !d.is_empty()),
            updated_at: record.updated_at.as_deref().and_then(parse_updated_at),
        }
    }
}

/// Parse the server's `updated_at` timestamp.
///
/// The backend emits MySQL-style naive datetimes; RFC 3339 is accepted as
/// well since some deployments front the database with an API layer.
fn parse_updated_at(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
        .ok()
        .map(|naive| Utc.from_utc_datetime(&naive))
}

/// Partial payload for the update endpoint.
///
/// An update only mutates the fields present in its payload, so absent
/// fields are stripped during serialization rather than sent as nulls.
#[derive(Debug, Clone, Default, Serialize)]
pub struct UpdateFields {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub la: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lo: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub emr: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub emr_desc: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conf_status: Option<u8>,
}

impl UpdateFields {
    /// Location heartbeat: coordinates tagged with an active emergency.
    pub fn location(username: &str, latitude: f64, longitude: f64) -> Self {
        Self {
            username: Some(username.to_string()),
            la: Some(latitude),
            lo: Some(longitude),
            emr: Some(1),
            ..Self::default()
        }
    }

    /// Emergency flag toggle, with an optional description when raising.
    ///
    /// Blank descriptions are stripped; the description is never sent when
    /// clearing the flag.
    pub fn emergency(username: &str, active: bool, description: Option<&str>) -> Self {
        let description = description
            .map(str::trim)
            .filter(|d| active && !d.is_empty())
            .map(str::to_string);
        Self {
            username: Some(username.to_string()),
            emr: Some(u8::from(active)),
            emr_desc: description,
            ..Self::default()
        }
    }

    /// Acknowledgement: clear the operator confirmation flag.
    pub fn acknowledgement(username: &str) -> Self {
        Self {
            username: Some(username.to_string()),
            conf_status: Some(ConfirmationStatus::Unconfirmed.as_wire()),
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn confirmation_status_wire_round_trip() {
        assert_eq!(ConfirmationStatus::from_wire(0), ConfirmationStatus::Unconfirmed);
        assert_eq!(ConfirmationStatus::from_wire(1), ConfirmationStatus::Confirmed);
        // Unknown values degrade to unconfirmed
        assert_eq!(ConfirmationStatus::from_wire(7), ConfirmationStatus::Unconfirmed);

        assert_eq!(ConfirmationStatus::Unconfirmed.as_wire(), 0);
        assert_eq!(ConfirmationStatus::Confirmed.as_wire(), 1);
    }

    #[test]
    fn user_status_from_sparse_record() {
        let record = UserRecord {
            username: None,
            la: None,
            lo: None,
            emr: None,
            conf_status: None,
            emr_desc: None,
            updated_at: None,
        };

        let status = UserStatus::from_record(&record);
        assert_eq!(status.username, "");
        assert_eq!(status.latitude, 0.0);
        assert_eq!(status.longitude, 0.0);
        assert!(!status.emergency_active);
        assert_eq!(status.confirmation, ConfirmationStatus::Unconfirmed);
        assert!(status.emergency_description.is_none());
        assert!(status.updated_at.is_none());
    }

    #[test]
    fn user_status_from_full_record() {
        let record = UserRecord {
            username: Some("andi".to_string()),
            la: Some(-6.2),
            lo: Some(106.8),
            emr: Some(1),
            conf_status: Some(1),
            emr_desc: Some("stranded".to_string()),
            updated_at: Some("2026-08-01 10:30:00".to_string()),
        };

        let status = UserStatus::from_record(&record);
        assert_eq!(status.username, "andi");
        assert!(status.emergency_active);
        assert_eq!(status.confirmation, ConfirmationStatus::Confirmed);
        assert_eq!(status.emergency_description.as_deref(), Some("stranded"));
        assert!(status.updated_at.is_some());
    }

    #[test]
    fn updated_at_accepts_rfc3339() {
        assert!(parse_updated_at("2026-08-01T10:30:00Z").is_some());
        assert!(parse_updated_at("2026-08-01 10:30:00").is_some());
        assert!(parse_updated_at("yesterday").is_none());
    }

    #[test]
    fn status_response_parses_envelope() {
        let json = r#"{
            "status": "ok",
            "data": [
                {"username": "andi", "la": -6.2, "lo": 106.8, "emr": 0, "conf_status": 0}
            ]
        }"#;

        let response: StatusResponse = serde_json::from_str(json).unwrap();
        assert!(response.is_ok());
        assert_eq!(response.data.len(), 1);
        assert_eq!(response.data[0].username.as_deref(), Some("andi"));
    }

    #[test]
    fn status_response_tolerates_missing_data() {
        let response: StatusResponse = serde_json::from_str(r#"{"status": "error"}"#).unwrap();
        assert!(!response.is_ok());
        assert!(response.data.is_empty());
    }

    #[test]
    fn location_payload_carries_emergency_tag() {
        let fields = UpdateFields::location("andi", -6.2, 106.8);
        assert_eq!(fields.username.as_deref(), Some("andi"));
        assert_eq!(fields.la, Some(-6.2));
        assert_eq!(fields.lo, Some(106.8));
        assert_eq!(fields.emr, Some(1));
        assert!(fields.conf_status.is_none());
        assert!(fields.emr_desc.is_none());
    }

    #[test]
    fn absent_fields_are_stripped_from_payload() {
        let encoded = serde_json::to_string(&UpdateFields::acknowledgement("andi")).unwrap();
        assert_eq!(encoded, r#"{"username":"andi","conf_status":0}"#);
    }

    #[test]
    fn emergency_payload_drops_blank_description() {
        let fields = UpdateFields::emergency("andi", true, Some("   "));
        assert!(fields.emr_desc.is_none());
        assert_eq!(fields.emr, Some(1));

        let fields = UpdateFields::emergency("andi", true, Some("flood"));
        assert_eq!(fields.emr_desc.as_deref(), Some("flood"));
    }

    #[test]
    fn emergency_clear_never_sends_description() {
        let fields = UpdateFields::emergency("andi", false, Some("flood"));
        assert_eq!(fields.emr, Some(0));
        assert!(fields.emr_desc.is_none());
    }
}
