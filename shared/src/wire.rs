//! Backend payload shapes.
//!
//! The backend serializes decimals (coordinates) as strings, ids as either
//! UUID strings or integers, and some lists as comma-separated strings, so
//! the readers here are deliberately forgiving. Translation into view types
//! happens in [`crate::mappers`].

use serde::{Deserialize, Deserializer, Serialize};

use crate::domain::ReportStatus;

#[derive(Deserialize)]
#[serde(untagged)]
enum Scalar {
    Int(i64),
    Float(f64),
    Text(String),
    Bool(bool),
}

fn opt_scalar<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Scalar>, D::Error> {
    Option::<Scalar>::deserialize(d)
}

/// Number, numeric string, or null. Blank and unparsable strings read as
/// `None`.
pub fn lenient_f64<'de, D: Deserializer<'de>>(d: D) -> Result<Option<f64>, D::Error> {
    #[allow(clippy::cast_precision_loss)]
    Ok(match opt_scalar(d)? {
        Some(Scalar::Int(i)) => Some(i as f64),
        Some(Scalar::Float(f)) => Some(f),
        Some(Scalar::Text(s)) => s.trim().parse().ok(),
        Some(Scalar::Bool(_)) | None => None,
    })
}

pub fn lenient_u64<'de, D: Deserializer<'de>>(d: D) -> Result<u64, D::Error> {
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    Ok(match opt_scalar(d)? {
        Some(Scalar::Int(i)) => u64::try_from(i).unwrap_or(0),
        Some(Scalar::Float(f)) if f.is_finite() && f >= 0.0 => f as u64,
        Some(Scalar::Text(s)) => s.trim().parse().unwrap_or(0),
        _ => 0,
    })
}

/// Strings and numbers both become strings; empty strings become `None`.
pub fn lenient_string<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
    Ok(match opt_scalar(d)? {
        Some(Scalar::Text(s)) if !s.trim().is_empty() => Some(s),
        Some(Scalar::Int(i)) => Some(i.to_string()),
        Some(Scalar::Float(f)) => Some(f.to_string()),
        _ => None,
    })
}

fn required_id<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    lenient_string(d)?.ok_or_else(|| serde::de::Error::custom("missing identifier"))
}

/// `assigned_officers` arrives as a list, a comma-separated string, or null.
fn officer_list<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<String>, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Officers {
        List(Vec<String>),
        Csv(String),
    }

    let raw = Option::<Officers>::deserialize(d)?;
    let names = match raw {
        Some(Officers::List(list)) => list,
        Some(Officers::Csv(csv)) => csv.split(',').map(str::to_string).collect(),
        None => Vec::new(),
    };
    Ok(names
        .into_iter()
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty())
        .collect())
}

/// List endpoints answer with a bare array, or a page when pagination is on.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Listing<T> {
    Plain(Vec<T>),
    Paged { results: Vec<T> },
}

impl<T> Listing<T> {
    #[must_use]
    pub fn into_vec(self) -> Vec<T> {
        match self {
            Self::Plain(items) | Self::Paged { results: items } => items,
        }
    }
}

#[derive(Clone, Serialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
}

impl std::fmt::Debug for LoginRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoginRequest")
            .field("email", &self.email)
            .field("password", &"[REDACTED]")
            .field("role", &self.role)
            .finish()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginResponse {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub user: serde_json::Value,
    pub access: String,
    pub refresh: String,
}

#[derive(Clone, Serialize)]
pub struct RefreshRequest {
    pub refresh: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RefreshResponse {
    pub access: String,
    /// Present when the backend rotates refresh tokens.
    #[serde(default)]
    pub refresh: Option<String>,
}

/// Profile returned for a police office login.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OfficeUserDto {
    #[serde(default, deserialize_with = "lenient_string")]
    pub office_id: Option<String>,
    #[serde(default)]
    pub office_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub head_officer: Option<String>,
    #[serde(default)]
    pub contact_number: Option<String>,
    #[serde(default)]
    pub location_city: Option<String>,
    #[serde(default)]
    pub location_barangay: Option<String>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub latitude: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub longitude: Option<f64>,
}

/// Profile returned for an admin login.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AdminUserDto {
    #[serde(default, deserialize_with = "lenient_string")]
    pub admin_id: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReporterDto {
    #[serde(default, deserialize_with = "lenient_string")]
    pub user_id: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub emergency_contact_name: Option<String>,
    #[serde(default)]
    pub emergency_contact_number: Option<String>,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub barangay: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReportDto {
    #[serde(deserialize_with = "required_id")]
    pub report_id: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub latitude: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub longitude: Option<f64>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub remarks: Option<String>,
    #[serde(default)]
    pub assigned_office_name: Option<String>,
    #[serde(default)]
    pub reporter_full_name: Option<String>,
    #[serde(default)]
    pub incident_address: Option<String>,
    #[serde(default)]
    pub location_address: Option<String>,
    #[serde(default)]
    pub location_city: Option<String>,
    #[serde(default)]
    pub location_barangay: Option<String>,
    #[serde(default)]
    pub reporter: Option<ReporterDto>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub distance: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub eta: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusUpdateRequest {
    pub status: ReportStatus,
    pub remarks: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RouteDto {
    #[serde(default)]
    pub directions_url: Option<String>,
    #[serde(default)]
    pub qr_code_base64: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub distance: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub duration: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MessageDto {
    #[serde(deserialize_with = "required_id")]
    pub message_id: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub report: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub sender_id: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub receiver_id: Option<String>,
    #[serde(default)]
    pub sender_type: Option<String>,
    #[serde(default)]
    pub message_content: String,
    #[serde(default)]
    pub timestamp: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutgoingMessage {
    pub message_content: String,
    pub sender_id: String,
    pub sender_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub receiver_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CheckpointDto {
    #[serde(deserialize_with = "required_id")]
    pub checkpoint_id: String,
    #[serde(default)]
    pub checkpoint_name: String,
    #[serde(default)]
    pub contact_number: Option<String>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub latitude: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub longitude: Option<f64>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default, deserialize_with = "officer_list")]
    pub assigned_officers: Vec<String>,
    #[serde(default)]
    pub time_start: Option<String>,
    #[serde(default)]
    pub time_end: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub office: Option<String>,
    #[serde(default)]
    pub office_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckpointPayload {
    pub checkpoint_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contact_number: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
    pub location: String,
    pub assigned_officers: Vec<String>,
    pub time_start: String,
    pub time_end: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub office: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MediaDto {
    #[serde(deserialize_with = "required_id")]
    pub media_id: String,
    #[serde(default)]
    pub file_url: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub report: Option<String>,
    #[serde(default)]
    pub file_type: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub sender_id: Option<String>,
    #[serde(default)]
    pub uploaded_at: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OfficeDto {
    #[serde(deserialize_with = "required_id")]
    pub office_id: String,
    #[serde(default)]
    pub office_name: String,
    #[serde(default)]
    pub head_officer: Option<String>,
    #[serde(default)]
    pub contact_number: Option<String>,
    #[serde(default)]
    pub location_city: Option<String>,
    #[serde(default)]
    pub location_barangay: Option<String>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub latitude: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub longitude: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MapDataDto {
    #[serde(default)]
    pub active_reports: Vec<ReportDto>,
    #[serde(default)]
    pub police_offices: Vec<OfficeDto>,
    #[serde(default)]
    pub active_checkpoints: Vec<CheckpointDto>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GeocodeDto {
    #[serde(default)]
    pub address_line: Option<String>,
    #[serde(default)]
    pub barangay: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub full_address: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct OverviewDto {
    #[serde(default, deserialize_with = "lenient_u64")]
    pub total_assigned: u64,
    #[serde(default, deserialize_with = "lenient_u64")]
    pub total_resolved: u64,
    #[serde(default, deserialize_with = "lenient_u64")]
    pub resolved_missing_updated_at: u64,
    #[serde(default, deserialize_with = "lenient_string")]
    pub average_resolution_time: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LocationHotspotDto {
    #[serde(default)]
    pub location_city: Option<String>,
    #[serde(default)]
    pub location_barangay: Option<String>,
    #[serde(default, deserialize_with = "lenient_u64")]
    pub report_count: u64,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub report_percent: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LocationHotspotsDto {
    #[serde(default, deserialize_with = "lenient_u64")]
    pub total_resolved: u64,
    #[serde(default)]
    pub results: Vec<LocationHotspotDto>,
    #[serde(default)]
    pub available_cities: Vec<String>,
    #[serde(default)]
    pub available_barangays: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CategoryShareDto {
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default, deserialize_with = "lenient_u64")]
    pub report_count: u64,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub percentage: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CategoryBreakdownDto {
    #[serde(default, deserialize_with = "lenient_u64")]
    pub total_resolved: u64,
    #[serde(default)]
    pub results: Vec<CategoryShareDto>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResolvedCaseDto {
    #[serde(deserialize_with = "required_id")]
    pub report_id: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
    #[serde(default)]
    pub location_city: Option<String>,
    #[serde(default)]
    pub location_barangay: Option<String>,
    #[serde(default)]
    pub remarks: Option<String>,
    #[serde(default)]
    pub resolution_time_str: Option<String>,
    #[serde(default)]
    pub reporter_full_name: Option<String>,
    #[serde(default)]
    pub assigned_office_name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub latitude: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub longitude: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResolvedCasesDto {
    #[serde(default, deserialize_with = "lenient_u64")]
    pub count: u64,
    #[serde(default)]
    pub results: Vec<ResolvedCaseDto>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_report_with_string_decimals() {
        let dto: ReportDto = serde_json::from_value(json!({
            "report_id": "5f0c",
            "category": "Theft",
            "status": "En Route",
            "latitude": "14.599500",
            "longitude": 120.9842,
            "reporter": null
        }))
        .unwrap();
        assert_eq!(dto.latitude, Some(14.5995));
        assert_eq!(dto.longitude, Some(120.9842));
        assert!(dto.reporter.is_none());
    }

    #[test]
    fn test_blank_decimal_reads_as_none() {
        let dto: OfficeDto = serde_json::from_value(json!({
            "office_id": 7,
            "office_name": "Station 1",
            "latitude": "",
            "longitude": null
        }))
        .unwrap();
        assert_eq!(dto.office_id, "7");
        assert!(dto.latitude.is_none());
        assert!(dto.longitude.is_none());
    }

    #[test]
    fn test_missing_id_is_rejected() {
        assert!(serde_json::from_value::<ReportDto>(json!({"category": "Theft"})).is_err());
    }

    #[test]
    fn test_officers_list_or_csv() {
        let from_list: CheckpointDto = serde_json::from_value(json!({
            "checkpoint_id": "c1",
            "assigned_officers": ["PO1 Cruz", " SPO2 Reyes "]
        }))
        .unwrap();
        assert_eq!(from_list.assigned_officers, vec!["PO1 Cruz", "SPO2 Reyes"]);

        let from_csv: CheckpointDto = serde_json::from_value(json!({
            "checkpoint_id": "c1",
            "assigned_officers": "PO1 Cruz, ,SPO2 Reyes"
        }))
        .unwrap();
        assert_eq!(from_csv.assigned_officers, vec!["PO1 Cruz", "SPO2 Reyes"]);
    }

    #[test]
    fn test_listing_plain_and_paged() {
        let plain: Listing<MediaDto> =
            serde_json::from_value(json!([{"media_id": "m1"}])).unwrap();
        assert_eq!(plain.into_vec().len(), 1);

        let paged: Listing<MediaDto> =
            serde_json::from_value(json!({"count": 1, "results": [{"media_id": "m1"}]})).unwrap();
        assert_eq!(paged.into_vec().len(), 1);
    }

    #[test]
    fn test_login_request_debug_redacts_password() {
        let request = LoginRequest {
            email: "desk@station.ph".into(),
            password: "hunter2".into(),
            role: None,
        };
        let rendered = format!("{request:?}");
        assert!(!rendered.contains("hunter2"));
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({"email": "desk@station.ph", "password": "hunter2"})
        );
    }

    #[test]
    fn test_overview_counts_tolerate_strings() {
        let dto: OverviewDto = serde_json::from_value(json!({
            "total_assigned": "12",
            "total_resolved": 4,
            "average_resolution_time": "0d 05:00:00"
        }))
        .unwrap();
        assert_eq!(dto.total_assigned, 12);
        assert_eq!(dto.total_resolved, 4);
        assert_eq!(dto.resolved_missing_updated_at, 0);
    }
}
