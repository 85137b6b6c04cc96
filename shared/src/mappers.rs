//! Backend payload to view-model translation.
//!
//! All functions here are pure. Rows that cannot be represented (unknown
//! status, missing coordinates where they are required) are dropped with a
//! `warn!` rather than failing the whole listing.

use chrono::{DateTime, NaiveDateTime};
use geojson::{feature::Id, Feature, FeatureCollection, Geometry, JsonObject, Value};
use thiserror::Error;
use tracing::warn;

use crate::domain::{
    AnalyticsOverview, CategoryBreakdown, CategoryShare, ChatMessage, Checkpoint,
    DeliveryState, GeocodedAddress, LiveMapData, LocationHotspot, LocationHotspots,
    MediaAttachment, MediaKind, PoliceOffice, Report, ReportCategory, ReportLocation,
    ReportStatus, Reporter, ResolvedCase, RouteInfo, SenderType,
};
use crate::geo::{directions_url, Coordinate, EtaModel};
use crate::schedule::{TimeOfDay, TimeWindow};
use crate::session::{Role, SessionUser};
use crate::wire::{
    AdminUserDto, CategoryBreakdownDto, CheckpointDto, CheckpointPayload, GeocodeDto,
    LocationHotspotsDto, LoginResponse, MapDataDto, MediaDto, MessageDto, OfficeDto,
    OfficeUserDto, OverviewDto, ReportDto, ReporterDto, ResolvedCaseDto, RouteDto,
};
use crate::{
    AppError, CheckpointId, ErrorKind, MediaId, MessageId, OfficeId, ReportId, UserId,
};

pub const NOT_AVAILABLE: &str = "N/A";
pub const ADDRESS_PENDING: &str = "Address Pending";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MapperError {
    #[error("report {report_id} has unknown status '{status}'")]
    UnknownStatus { report_id: String, status: String },
    #[error("media {media_id} has unsupported file type '{file_type}'")]
    UnknownMediaKind { media_id: String, file_type: String },
    #[error("login response has unknown role '{0}'")]
    UnknownRole(String),
    #[error("login response user is malformed: {0}")]
    MalformedUser(String),
}

impl From<MapperError> for AppError {
    fn from(e: MapperError) -> Self {
        AppError::new(ErrorKind::Deserialization, e.to_string())
    }
}

/// ISO-8601 timestamps as the backend renders them. Naive values are
/// treated as UTC.
#[must_use]
pub fn parse_timestamp_ms(raw: &str) -> Option<u64> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    let millis = DateTime::parse_from_rfc3339(trimmed)
        .map(|dt| dt.timestamp_millis())
        .or_else(|_| {
            NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M:%S%.f")
                .or_else(|_| NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%d %H:%M:%S%.f"))
                .map(|naive| naive.and_utc().timestamp_millis())
        })
        .ok()?;
    u64::try_from(millis).ok()
}

fn timestamp(raw: Option<&String>) -> Option<u64> {
    raw.and_then(|s| parse_timestamp_ms(s))
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn coordinate(lat: Option<f64>, lng: Option<f64>) -> Option<Coordinate> {
    Coordinate::new(lat?, lng?).ok()
}

fn join_parts(parts: &[Option<&str>], separator: &str) -> Option<String> {
    let joined = parts
        .iter()
        .filter_map(|p| p.map(str::trim).filter(|p| !p.is_empty()))
        .collect::<Vec<_>>()
        .join(separator);
    (!joined.is_empty()).then_some(joined)
}

fn join_place(parts: &[Option<&str>]) -> Option<String> {
    join_parts(parts, ", ")
}

#[must_use]
pub fn map_reporter(dto: ReporterDto) -> Reporter {
    let full_name = join_parts(&[dto.first_name.as_deref(), dto.last_name.as_deref()], " ")
        .unwrap_or_else(|| NOT_AVAILABLE.to_string());
    let address = join_place(&[
        dto.barangay.as_deref(),
        dto.city.as_deref(),
        dto.region.as_deref(),
    ]);

    Reporter {
        user_id: non_blank(dto.user_id).map(UserId::new),
        full_name,
        phone: non_blank(dto.phone),
        email: non_blank(dto.email),
        emergency_contact_name: non_blank(dto.emergency_contact_name),
        emergency_contact_number: non_blank(dto.emergency_contact_number),
        address,
    }
}

/// Maps one report. `origin` is the viewing office, used for the fallback
/// distance/ETA when the backend supplied none.
pub fn map_report(
    dto: ReportDto,
    origin: Option<Coordinate>,
    eta: &EtaModel,
) -> Result<Report, MapperError> {
    let raw_status = dto.status.clone().unwrap_or_default();
    let status = ReportStatus::from_wire(&raw_status).ok_or_else(|| {
        MapperError::UnknownStatus {
            report_id: dto.report_id.clone(),
            status: raw_status,
        }
    })?;

    let reporter = dto.reporter.map(map_reporter);
    let reporter_name = non_blank(dto.reporter_full_name)
        .filter(|n| n != NOT_AVAILABLE)
        .or_else(|| {
            reporter
                .as_ref()
                .map(|r| r.full_name.clone())
                .filter(|n| n != NOT_AVAILABLE)
        })
        .unwrap_or_else(|| NOT_AVAILABLE.to_string());

    let city = non_blank(dto.location_city);
    let barangay = non_blank(dto.location_barangay);
    let address = non_blank(dto.incident_address)
        .or_else(|| non_blank(dto.location_address))
        .or_else(|| join_place(&[barangay.as_deref(), city.as_deref()]))
        .unwrap_or_else(|| ADDRESS_PENDING.to_string());

    let mut report = Report {
        id: ReportId::new(dto.report_id),
        category: ReportCategory::from_wire(dto.category.as_deref().unwrap_or_default()),
        status,
        description: dto.description.unwrap_or_default(),
        reporter_name,
        reporter,
        location: ReportLocation {
            coordinate: coordinate(dto.latitude, dto.longitude),
            address,
            city,
            barangay,
        },
        created_at_ms: timestamp(dto.created_at.as_ref()),
        updated_at_ms: timestamp(dto.updated_at.as_ref()),
        assigned_office_name: non_blank(dto.assigned_office_name),
        remarks: non_blank(dto.remarks),
        distance: non_blank(dto.distance),
        eta: non_blank(dto.eta),
    };
    report.fill_travel_estimate(origin, eta);
    Ok(report)
}

/// Maps a listing, dropping rows that fail to map.
#[must_use]
pub fn map_reports(
    dtos: Vec<ReportDto>,
    origin: Option<Coordinate>,
    eta: &EtaModel,
) -> Vec<Report> {
    dtos.into_iter()
        .filter_map(|dto| match map_report(dto, origin, eta) {
            Ok(report) => Some(report),
            Err(e) => {
                warn!(error = %e, "dropping report row");
                None
            }
        })
        .collect()
}

#[must_use]
pub fn map_message(dto: MessageDto) -> ChatMessage {
    ChatMessage {
        id: MessageId::new(dto.message_id),
        content: dto.message_content,
        timestamp_ms: timestamp(dto.timestamp.as_ref()).unwrap_or_default(),
        sender_type: SenderType::from_wire(dto.sender_type.as_deref().unwrap_or_default()),
        sender_id: non_blank(dto.sender_id),
        receiver_id: non_blank(dto.receiver_id),
        delivery: DeliveryState::Sent,
    }
}

/// Oldest first, ties broken by id so the order is stable across polls.
#[must_use]
pub fn map_messages(dtos: Vec<MessageDto>) -> Vec<ChatMessage> {
    let mut messages: Vec<ChatMessage> = dtos.into_iter().map(map_message).collect();
    messages.sort_by(|a, b| {
        a.timestamp_ms
            .cmp(&b.timestamp_ms)
            .then_with(|| a.id.cmp(&b.id))
    });
    messages
}

pub fn map_media(dto: MediaDto) -> Result<MediaAttachment, MapperError> {
    let file_type = dto.file_type.unwrap_or_default();
    let kind = MediaKind::from_wire(&file_type).ok_or_else(|| MapperError::UnknownMediaKind {
        media_id: dto.media_id.clone(),
        file_type,
    })?;
    Ok(MediaAttachment {
        id: MediaId::new(dto.media_id),
        kind,
        url: dto.file_url.unwrap_or_default(),
        uploaded_at_ms: timestamp(dto.uploaded_at.as_ref()),
    })
}

#[must_use]
pub fn map_media_list(dtos: Vec<MediaDto>) -> Vec<MediaAttachment> {
    dtos.into_iter()
        .filter_map(|dto| {
            map_media(dto)
                .map_err(|e| warn!(error = %e, "dropping media row"))
                .ok()
        })
        .filter(|m| !m.url.is_empty())
        .collect()
}

#[must_use]
pub fn map_checkpoint(dto: CheckpointDto) -> Checkpoint {
    let window = match (dto.time_start.as_deref(), dto.time_end.as_deref()) {
        (Some(start), Some(end)) => TimeWindow::parse(start, end)
            .map_err(|e| {
                warn!(checkpoint_id = %dto.checkpoint_id, error = %e, "unreadable checkpoint schedule");
            })
            .ok(),
        _ => None,
    };

    Checkpoint {
        id: CheckpointId::new(dto.checkpoint_id),
        name: dto.checkpoint_name,
        contact_number: non_blank(dto.contact_number),
        coordinate: coordinate(dto.latitude, dto.longitude),
        location: dto.location.unwrap_or_default(),
        assigned_officers: dto.assigned_officers,
        window,
        office_id: non_blank(dto.office).map(OfficeId::new),
        office_name: non_blank(dto.office_name),
    }
}

#[must_use]
pub fn map_office(dto: OfficeDto) -> PoliceOffice {
    PoliceOffice {
        id: OfficeId::new(dto.office_id),
        name: dto.office_name,
        head_officer: non_blank(dto.head_officer),
        contact_number: non_blank(dto.contact_number),
        city: non_blank(dto.location_city),
        barangay: non_blank(dto.location_barangay),
        coordinate: coordinate(dto.latitude, dto.longitude),
    }
}

#[must_use]
pub fn map_live_map(dto: MapDataDto, origin: Option<Coordinate>, eta: &EtaModel) -> LiveMapData {
    LiveMapData {
        reports: map_reports(dto.active_reports, origin, eta),
        offices: dto.police_offices.into_iter().map(map_office).collect(),
        checkpoints: dto.active_checkpoints.into_iter().map(map_checkpoint).collect(),
    }
}

/// The backend leaves `distance`/`duration` empty when the routing provider
/// is unavailable; the straight-line estimate stands in for them then.
#[must_use]
pub fn map_route(dto: RouteDto, from: Option<Coordinate>, to: Option<Coordinate>, eta: &EtaModel) -> RouteInfo {
    let estimate = from.zip(to).map(|(a, b)| eta.estimate(a, b));
    let fallback_url = from.zip(to).map(|(a, b)| directions_url(a, b));

    RouteInfo {
        directions_url: non_blank(dto.directions_url)
            .or(fallback_url)
            .unwrap_or_default(),
        qr_code_base64: non_blank(dto.qr_code_base64),
        distance: non_blank(dto.distance).or_else(|| estimate.map(|e| e.distance_label())),
        duration: non_blank(dto.duration).or_else(|| estimate.map(|e| e.eta_label())),
    }
}

#[must_use]
pub fn map_geocode(dto: GeocodeDto) -> GeocodedAddress {
    let address_line = dto.address_line.unwrap_or_default();
    let barangay = dto.barangay.unwrap_or_default();
    let city = dto.city.unwrap_or_default();
    let full_address = non_blank(dto.full_address)
        .or_else(|| join_place(&[Some(address_line.as_str()), Some(barangay.as_str()), Some(city.as_str())]))
        .unwrap_or_default();
    GeocodedAddress {
        address_line,
        barangay,
        city,
        full_address,
    }
}

#[must_use]
pub fn map_overview(dto: OverviewDto) -> AnalyticsOverview {
    AnalyticsOverview {
        total_assigned: dto.total_assigned,
        total_resolved: dto.total_resolved,
        resolved_missing_updated_at: dto.resolved_missing_updated_at,
        average_resolution_time: non_blank(dto.average_resolution_time)
            .unwrap_or_else(|| NOT_AVAILABLE.to_string()),
    }
}

#[must_use]
pub fn map_location_hotspots(dto: LocationHotspotsDto) -> LocationHotspots {
    LocationHotspots {
        total_resolved: dto.total_resolved,
        results: dto
            .results
            .into_iter()
            .map(|row| LocationHotspot {
                city: row.location_city.unwrap_or_default(),
                barangay: row.location_barangay.unwrap_or_default(),
                report_count: row.report_count,
                report_percent: row.report_percent.unwrap_or_default(),
            })
            .collect(),
        available_cities: dto.available_cities,
        available_barangays: dto.available_barangays,
    }
}

#[must_use]
pub fn map_category_breakdown(dto: CategoryBreakdownDto) -> CategoryBreakdown {
    CategoryBreakdown {
        total_resolved: dto.total_resolved,
        results: dto
            .results
            .into_iter()
            .map(|row| CategoryShare {
                category: ReportCategory::from_wire(row.category.as_deref().unwrap_or_default()),
                report_count: row.report_count,
                percentage: row.percentage.unwrap_or_default(),
            })
            .collect(),
    }
}

#[must_use]
pub fn map_resolved_case(dto: ResolvedCaseDto) -> ResolvedCase {
    let created_at_ms = timestamp(dto.created_at.as_ref());
    let resolved_at_ms = timestamp(dto.updated_at.as_ref());
    let resolution_time = non_blank(dto.resolution_time_str).unwrap_or_else(|| {
        let seconds = created_at_ms
            .zip(resolved_at_ms)
            .and_then(|(c, r)| r.checked_sub(c))
            .and_then(|ms| i64::try_from(ms / 1_000).ok());
        crate::domain::format_resolution_time(seconds)
    });

    ResolvedCase {
        report_id: ReportId::new(dto.report_id),
        category: ReportCategory::from_wire(dto.category.as_deref().unwrap_or_default()),
        created_at_ms,
        resolved_at_ms,
        city: non_blank(dto.location_city),
        barangay: non_blank(dto.location_barangay),
        remarks: non_blank(dto.remarks),
        resolution_time,
        reporter_full_name: non_blank(dto.reporter_full_name)
            .unwrap_or_else(|| NOT_AVAILABLE.to_string()),
        assigned_office_name: non_blank(dto.assigned_office_name),
        description: dto.description.unwrap_or_default(),
        coordinate: coordinate(dto.latitude, dto.longitude),
    }
}

/// Builds the session profile from a login response.
pub fn map_session_user(response: &LoginResponse) -> Result<SessionUser, MapperError> {
    let role_raw = response.role.as_deref().unwrap_or("police");
    let role = Role::from_wire(role_raw).ok_or_else(|| MapperError::UnknownRole(role_raw.into()))?;

    match role {
        Role::Police => {
            let user: OfficeUserDto = serde_json::from_value(response.user.clone())
                .map_err(|e| MapperError::MalformedUser(e.to_string()))?;
            let office_id = non_blank(user.office_id)
                .ok_or_else(|| MapperError::MalformedUser("missing office_id".into()))?;
            Ok(SessionUser {
                role,
                user_id: UserId::new(office_id.clone()),
                office_id: Some(OfficeId::new(office_id)),
                display_name: non_blank(user.office_name)
                    .or_else(|| non_blank(user.email.clone()))
                    .unwrap_or_else(|| NOT_AVAILABLE.to_string()),
                email: non_blank(user.email),
                head_officer: non_blank(user.head_officer),
                contact_number: non_blank(user.contact_number),
                city: non_blank(user.location_city),
                barangay: non_blank(user.location_barangay),
                office_coordinate: coordinate(user.latitude, user.longitude),
            })
        }
        Role::Admin => {
            let user: AdminUserDto = serde_json::from_value(response.user.clone())
                .map_err(|e| MapperError::MalformedUser(e.to_string()))?;
            let user_id = non_blank(user.admin_id)
                .or_else(|| non_blank(user.email.clone()))
                .ok_or_else(|| MapperError::MalformedUser("missing admin_id".into()))?;
            Ok(SessionUser {
                role,
                user_id: UserId::new(user_id),
                office_id: None,
                display_name: non_blank(user.username)
                    .or_else(|| non_blank(user.email.clone()))
                    .unwrap_or_else(|| "Administrator".to_string()),
                email: non_blank(user.email),
                head_officer: None,
                contact_number: None,
                city: None,
                barangay: None,
                office_coordinate: None,
            })
        }
    }
}

/// Checkpoint editor form contents, as typed.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct CheckpointDraft {
    pub name: String,
    pub contact_number: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub location: String,
    /// Comma-separated officer names.
    pub officers: String,
    pub time_start: String,
    pub time_end: String,
}

impl CheckpointDraft {
    #[must_use]
    pub fn from_checkpoint(checkpoint: &Checkpoint) -> Self {
        Self {
            name: checkpoint.name.clone(),
            contact_number: checkpoint.contact_number.clone().unwrap_or_default(),
            latitude: checkpoint.coordinate.map(Coordinate::lat),
            longitude: checkpoint.coordinate.map(Coordinate::lng),
            location: checkpoint.location.clone(),
            officers: checkpoint.assigned_officers.join(", "),
            time_start: checkpoint.window.map(|w| w.start.label()).unwrap_or_default(),
            time_end: checkpoint.window.map(|w| w.end.label()).unwrap_or_default(),
        }
    }

    /// Validates the form and renders the request body.
    pub fn to_payload(&self, office_id: Option<&OfficeId>) -> Result<CheckpointPayload, AppError> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err(AppError::new(ErrorKind::Validation, "Checkpoint name is required."));
        }
        let (Some(lat), Some(lng)) = (self.latitude, self.longitude) else {
            return Err(AppError::new(
                ErrorKind::Validation,
                "Pick the checkpoint location on the map.",
            ));
        };
        let point = Coordinate::new(lat, lng)?;
        let start = TimeOfDay::parse(&self.time_start)?;
        let end = TimeOfDay::parse(&self.time_end)?;

        Ok(CheckpointPayload {
            checkpoint_name: name.to_string(),
            contact_number: non_blank(Some(self.contact_number.clone())),
            latitude: point.lat(),
            longitude: point.lng(),
            location: self.location.trim().to_string(),
            assigned_officers: self
                .officers
                .split(',')
                .map(str::trim)
                .filter(|n| !n.is_empty())
                .map(str::to_string)
                .collect(),
            time_start: start.wire(),
            time_end: end.wire(),
            office: office_id.map(ToString::to_string),
        })
    }
}

fn point_feature(kind: &str, id: &str, at: Coordinate, mut properties: JsonObject) -> Feature {
    properties.insert("kind".to_string(), kind.into());
    Feature {
        bbox: None,
        geometry: Some(Geometry::new(Value::Point(vec![at.lng(), at.lat()]))),
        id: Some(Id::String(id.to_string())),
        properties: Some(properties),
        foreign_members: None,
    }
}

/// Map layer for the shell. Items without coordinates are left out;
/// checkpoints carry their derived `active` flag for `now`.
#[must_use]
pub fn to_feature_collection(data: &LiveMapData, now: TimeOfDay) -> FeatureCollection {
    let mut features = Vec::new();

    for report in &data.reports {
        let Some(at) = report.location.coordinate else {
            continue;
        };
        let mut props = JsonObject::new();
        props.insert("status".into(), report.status.as_str().into());
        props.insert("category".into(), report.category.as_str().into());
        props.insert("address".into(), report.location.address.clone().into());
        props.insert("reporter".into(), report.reporter_name.clone().into());
        features.push(point_feature("report", report.id.as_str(), at, props));
    }

    for office in &data.offices {
        let Some(at) = office.coordinate else {
            continue;
        };
        let mut props = JsonObject::new();
        props.insert("name".into(), office.name.clone().into());
        if let Some(contact) = &office.contact_number {
            props.insert("contact_number".into(), contact.clone().into());
        }
        features.push(point_feature("office", office.id.as_str(), at, props));
    }

    for checkpoint in &data.checkpoints {
        let Some(at) = checkpoint.coordinate else {
            continue;
        };
        let mut props = JsonObject::new();
        props.insert("name".into(), checkpoint.name.clone().into());
        props.insert("active".into(), checkpoint.is_active_at(now).into());
        if let Some(window) = checkpoint.window {
            props.insert("schedule".into(), window.label().into());
        }
        features.push(point_feature("checkpoint", checkpoint.id.as_str(), at, props));
    }

    FeatureCollection {
        bbox: None,
        features,
        foreign_members: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn report_dto(value: serde_json::Value) -> ReportDto {
        serde_json::from_value(value).unwrap()
    }

    mod report_tests {
        use super::*;

        #[test]
        fn test_fallbacks_for_missing_fields() {
            let report = map_report(
                report_dto(json!({
                    "report_id": "r1",
                    "status": "Pending",
                    "category": "Arson",
                    "reporter_full_name": "N/A"
                })),
                None,
                &EtaModel::default(),
            )
            .unwrap();
            assert_eq!(report.reporter_name, "N/A");
            assert_eq!(report.location.address, "Address Pending");
            assert_eq!(report.category, ReportCategory::Others);
            assert!(report.distance.is_none());
        }

        #[test]
        fn test_reporter_name_from_nested_profile() {
            let report = map_report(
                report_dto(json!({
                    "report_id": "r1",
                    "status": "Acknowledged",
                    "reporter": {
                        "user_id": 12,
                        "first_name": "Juan",
                        "last_name": "Dela Cruz",
                        "city": "Manila",
                        "barangay": "Tondo"
                    }
                })),
                None,
                &EtaModel::default(),
            )
            .unwrap();
            assert_eq!(report.reporter_name, "Juan Dela Cruz");
            let reporter = report.reporter.unwrap();
            assert_eq!(reporter.user_id, Some(UserId::new("12")));
            assert_eq!(reporter.address.as_deref(), Some("Tondo, Manila"));
        }

        #[test]
        fn test_address_from_city_and_barangay() {
            let report = map_report(
                report_dto(json!({
                    "report_id": "r1",
                    "status": "Pending",
                    "location_city": "Manila",
                    "location_barangay": "Tondo"
                })),
                None,
                &EtaModel::default(),
            )
            .unwrap();
            assert_eq!(report.location.address, "Tondo, Manila");
        }

        #[test]
        fn test_unknown_status_rows_are_dropped() {
            let reports = map_reports(
                vec![
                    report_dto(json!({"report_id": "r1", "status": "Pending"})),
                    report_dto(json!({"report_id": "r2", "status": "Archived"})),
                ],
                None,
                &EtaModel::default(),
            );
            assert_eq!(reports.len(), 1);
            assert_eq!(reports[0].id, ReportId::new("r1"));
        }

        #[test]
        fn test_fallback_eta_from_office() {
            let office = Coordinate::new(14.5995, 120.9842).ok();
            let report = map_report(
                report_dto(json!({
                    "report_id": "r1",
                    "status": "Pending",
                    "latitude": "14.5995",
                    "longitude": "120.9842"
                })),
                office,
                &EtaModel::default(),
            )
            .unwrap();
            assert_eq!(report.distance.as_deref(), Some("0 m"));
            assert_eq!(report.eta.as_deref(), Some("3 mins"));
        }

        #[test]
        fn test_timestamps() {
            assert_eq!(parse_timestamp_ms("1970-01-01T00:00:01Z"), Some(1_000));
            assert_eq!(parse_timestamp_ms("1970-01-01T08:00:01+08:00"), Some(1_000));
            assert_eq!(parse_timestamp_ms("1970-01-01T00:00:01.500000"), Some(1_500));
            assert_eq!(parse_timestamp_ms("yesterday"), None);
            assert_eq!(parse_timestamp_ms(""), None);
        }
    }

    mod chat_and_media_tests {
        use super::*;

        #[test]
        fn test_messages_are_sorted_oldest_first() {
            let dtos: Vec<MessageDto> = serde_json::from_value(json!([
                {"message_id": 2, "message_content": "b", "sender_type": "user", "timestamp": "2024-01-01T00:00:02Z"},
                {"message_id": 1, "message_content": "a", "sender_type": "police", "timestamp": "2024-01-01T00:00:01Z"}
            ]))
            .unwrap();
            let messages = map_messages(dtos);
            assert_eq!(messages[0].content, "a");
            assert_eq!(messages[0].sender_type, SenderType::Police);
            assert_eq!(messages[1].sender_type, SenderType::User);
        }

        #[test]
        fn test_media_unknown_type_dropped() {
            let dtos: Vec<MediaDto> = serde_json::from_value(json!([
                {"media_id": "m1", "file_type": "image", "file_url": "https://cdn/x.jpg"},
                {"media_id": "m2", "file_type": "audio", "file_url": "https://cdn/x.mp3"},
                {"media_id": "m3", "file_type": "video"}
            ]))
            .unwrap();
            let media = map_media_list(dtos);
            assert_eq!(media.len(), 1);
            assert_eq!(media[0].kind, MediaKind::Image);
        }
    }

    mod checkpoint_tests {
        use super::*;

        #[test]
        fn test_checkpoint_schedule_parsed() {
            let dto: CheckpointDto = serde_json::from_value(json!({
                "checkpoint_id": "c1",
                "checkpoint_name": "North Gate",
                "latitude": "14.6",
                "longitude": "121.0",
                "assigned_officers": "PO1 Cruz, SPO2 Reyes",
                "time_start": "22:00:00",
                "time_end": "06:00:00",
                "office": "o1"
            }))
            .unwrap();
            let checkpoint = map_checkpoint(dto);
            assert!(checkpoint.window.unwrap().spans_midnight());
            assert_eq!(checkpoint.assigned_officers.len(), 2);
            assert_eq!(checkpoint.office_id, Some(OfficeId::new("o1")));
            assert!(checkpoint.is_active_at(TimeOfDay::parse("23:00").unwrap()));
        }

        #[test]
        fn test_bad_schedule_leaves_window_empty() {
            let dto: CheckpointDto = serde_json::from_value(json!({
                "checkpoint_id": "c1",
                "time_start": "late",
                "time_end": "06:00"
            }))
            .unwrap();
            assert!(map_checkpoint(dto).window.is_none());
        }

        #[test]
        fn test_draft_validation() {
            let draft = CheckpointDraft {
                name: "  North Gate ".into(),
                latitude: Some(14.6),
                longitude: Some(121.0),
                officers: "PO1 Cruz,, SPO2 Reyes ".into(),
                time_start: "22:00".into(),
                time_end: "06:00".into(),
                ..CheckpointDraft::default()
            };
            let payload = draft.to_payload(Some(&OfficeId::new("o1"))).unwrap();
            assert_eq!(payload.checkpoint_name, "North Gate");
            assert_eq!(payload.assigned_officers, vec!["PO1 Cruz", "SPO2 Reyes"]);
            assert_eq!(payload.time_start, "22:00:00");
            assert!(payload.contact_number.is_none());
            assert_eq!(payload.office.as_deref(), Some("o1"));

            let missing_name = CheckpointDraft {
                name: " ".into(),
                ..draft.clone()
            };
            assert_eq!(
                missing_name.to_payload(None).unwrap_err().kind,
                ErrorKind::Validation
            );

            let bad_time = CheckpointDraft {
                time_end: "25:00".into(),
                ..draft.clone()
            };
            assert!(bad_time.to_payload(None).is_err());

            let no_point = CheckpointDraft {
                latitude: None,
                ..draft
            };
            assert!(no_point.to_payload(None).is_err());
        }
    }

    mod analytics_tests {
        use super::*;

        #[test]
        fn test_resolved_case_computes_missing_duration() {
            let dto: ResolvedCaseDto = serde_json::from_value(json!({
                "report_id": "r1",
                "category": "Theft",
                "created_at": "2024-01-01T00:00:00Z",
                "updated_at": "2024-01-02T01:30:00Z",
                "reporter_full_name": ""
            }))
            .unwrap();
            let case = map_resolved_case(dto);
            assert_eq!(case.resolution_time, "1d 01:30:00");
            assert_eq!(case.reporter_full_name, "N/A");
        }

        #[test]
        fn test_overview_defaults_average() {
            let overview = map_overview(OverviewDto::default());
            assert_eq!(overview.average_resolution_time, "N/A");
        }

        #[test]
        fn test_category_breakdown() {
            let dto: CategoryBreakdownDto = serde_json::from_value(json!({
                "total_resolved": 10,
                "results": [{"category": "Theft", "report_count": 6, "percentage": 60.0}]
            }))
            .unwrap();
            let breakdown = map_category_breakdown(dto);
            assert_eq!(breakdown.results[0].category, ReportCategory::Theft);
            assert!((breakdown.results[0].percentage - 60.0).abs() < f64::EPSILON);
        }
    }

    mod session_tests {
        use super::*;

        fn login(role: &str, user: serde_json::Value) -> LoginResponse {
            serde_json::from_value(json!({
                "message": "Login successful",
                "role": role,
                "user": user,
                "access": "a",
                "refresh": "r"
            }))
            .unwrap()
        }

        #[test]
        fn test_police_login_profile() {
            let user = map_session_user(&login(
                "police",
                json!({
                    "office_id": "o1",
                    "office_name": "Station 1",
                    "latitude": "14.5995",
                    "longitude": "120.9842"
                }),
            ))
            .unwrap();
            assert_eq!(user.role, Role::Police);
            assert_eq!(user.office_id, Some(OfficeId::new("o1")));
            assert_eq!(user.display_name, "Station 1");
            assert!(user.office_coordinate.is_some());
        }

        #[test]
        fn test_admin_login_profile() {
            let user = map_session_user(&login(
                "admin",
                json!({"admin_id": 3, "username": "root", "email": "a@b.c"}),
            ))
            .unwrap();
            assert_eq!(user.role, Role::Admin);
            assert!(user.office_id.is_none());
            assert_eq!(user.user_id, UserId::new("3"));
        }

        #[test]
        fn test_unknown_role_rejected() {
            assert!(matches!(
                map_session_user(&login("citizen", json!({}))),
                Err(MapperError::UnknownRole(_))
            ));
        }
    }

    #[test]
    fn test_feature_collection_skips_unplaced_items() {
        let eta = EtaModel::default();
        let dto: MapDataDto = serde_json::from_value(json!({
            "active_reports": [
                {"report_id": "r1", "status": "Pending", "latitude": 14.6, "longitude": 121.0},
                {"report_id": "r2", "status": "Pending"}
            ],
            "police_offices": [{"office_id": "o1", "office_name": "HQ", "latitude": 14.5, "longitude": 121.0}],
            "active_checkpoints": [{
                "checkpoint_id": "c1", "checkpoint_name": "Gate",
                "latitude": 14.7, "longitude": 121.1,
                "time_start": "08:00", "time_end": "17:00"
            }]
        }))
        .unwrap();
        let data = map_live_map(dto, None, &eta);
        let collection = to_feature_collection(&data, TimeOfDay::parse("12:00").unwrap());
        assert_eq!(collection.features.len(), 3);

        let checkpoint = &collection.features[2];
        let props = checkpoint.properties.as_ref().unwrap();
        assert_eq!(props.get("active"), Some(&json!(true)));
        assert_eq!(props.get("kind"), Some(&json!("checkpoint")));
    }

    #[test]
    fn test_route_falls_back_to_estimate() {
        let from = Coordinate::new(14.5995, 120.9842).ok();
        let to = Coordinate::new(14.6760, 121.0437).ok();
        let route = map_route(
            serde_json::from_value(json!({"directions_url": null, "distance": null})).unwrap(),
            from,
            to,
            &EtaModel::default(),
        );
        assert!(route.directions_url.starts_with("https://www.google.com/maps/dir/"));
        assert!(route.distance.is_some());
        assert!(route.duration.is_some());
    }
}
