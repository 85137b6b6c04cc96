//! View-facing domain types. Backend payloads are translated into these by
//! [`crate::mappers`]; nothing here is persisted by the core.

use serde::{Deserialize, Serialize};

use crate::geo::{Coordinate, EtaModel, TravelEstimate};
use crate::schedule::{TimeOfDay, TimeWindow};
use crate::{CheckpointId, MediaId, MessageId, OfficeId, ReportId, UserId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum ReportStatus {
    #[default]
    Pending,
    Acknowledged,
    #[serde(rename = "En Route")]
    EnRoute,
    #[serde(rename = "On Scene")]
    OnScene,
    Resolved,
    Canceled,
}

impl ReportStatus {
    pub const ALL: [Self; 6] = [
        Self::Pending,
        Self::Acknowledged,
        Self::EnRoute,
        Self::OnScene,
        Self::Resolved,
        Self::Canceled,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::Acknowledged => "Acknowledged",
            Self::EnRoute => "En Route",
            Self::OnScene => "On Scene",
            Self::Resolved => "Resolved",
            Self::Canceled => "Canceled",
        }
    }

    #[must_use]
    pub fn from_wire(raw: &str) -> Option<Self> {
        let normalized: String = raw
            .trim()
            .chars()
            .filter(|c| !matches!(c, ' ' | '_' | '-'))
            .collect::<String>()
            .to_ascii_lowercase();
        match normalized.as_str() {
            "pending" => Some(Self::Pending),
            "acknowledged" => Some(Self::Acknowledged),
            "enroute" => Some(Self::EnRoute),
            "onscene" => Some(Self::OnScene),
            "resolved" => Some(Self::Resolved),
            "canceled" | "cancelled" => Some(Self::Canceled),
            _ => None,
        }
    }

    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Resolved | Self::Canceled)
    }

    #[must_use]
    pub const fn rank(self) -> u8 {
        match self {
            Self::Pending => 0,
            Self::Acknowledged => 1,
            Self::EnRoute => 2,
            Self::OnScene => 3,
            Self::Resolved | Self::Canceled => 4,
        }
    }

    /// The statuses the UI suggests next. Submission is not restricted to
    /// these; the backend decides which transitions are legal.
    #[must_use]
    pub fn forward_options(self) -> Vec<Self> {
        Self::ALL
            .into_iter()
            .filter(|s| s.rank() > self.rank())
            .collect()
    }
}

impl std::fmt::Display for ReportStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum ReportCategory {
    Violence,
    Threat,
    Theft,
    Vandalism,
    Suspicious,
    Emergency,
    #[default]
    Others,
}

impl ReportCategory {
    pub const ALL: [Self; 7] = [
        Self::Violence,
        Self::Threat,
        Self::Theft,
        Self::Vandalism,
        Self::Suspicious,
        Self::Emergency,
        Self::Others,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Violence => "Violence",
            Self::Threat => "Threat",
            Self::Theft => "Theft",
            Self::Vandalism => "Vandalism",
            Self::Suspicious => "Suspicious",
            Self::Emergency => "Emergency",
            Self::Others => "Others",
        }
    }

    /// Unknown categories fall back to `Others`.
    #[must_use]
    pub fn from_wire(raw: &str) -> Self {
        Self::ALL
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(raw.trim()))
            .unwrap_or(Self::Others)
    }
}

impl std::fmt::Display for ReportCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Reporter {
    pub user_id: Option<UserId>,
    pub full_name: String,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub emergency_contact_name: Option<String>,
    pub emergency_contact_number: Option<String>,
    pub address: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ReportLocation {
    pub coordinate: Option<Coordinate>,
    pub address: String,
    pub city: Option<String>,
    pub barangay: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub id: ReportId,
    pub category: ReportCategory,
    pub status: ReportStatus,
    pub description: String,
    pub reporter_name: String,
    pub reporter: Option<Reporter>,
    pub location: ReportLocation,
    pub created_at_ms: Option<u64>,
    pub updated_at_ms: Option<u64>,
    pub assigned_office_name: Option<String>,
    pub remarks: Option<String>,
    pub distance: Option<String>,
    pub eta: Option<String>,
}

impl Report {
    /// Fills `distance`/`eta` from the fallback model when the backend did
    /// not supply them. Authoritative values are never overwritten.
    pub fn fill_travel_estimate(&mut self, origin: Option<Coordinate>, model: &EtaModel) {
        if self.distance.is_some() && self.eta.is_some() {
            return;
        }
        if let Some(estimate) = self.travel_estimate(origin, model) {
            self.distance.get_or_insert_with(|| estimate.distance_label());
            self.eta.get_or_insert_with(|| estimate.eta_label());
        }
    }

    #[must_use]
    pub fn travel_estimate(
        &self,
        origin: Option<Coordinate>,
        model: &EtaModel,
    ) -> Option<TravelEstimate> {
        Some(model.estimate(origin?, self.location.coordinate?))
    }

    #[must_use]
    pub fn reporter_user_id(&self) -> Option<&UserId> {
        self.reporter.as_ref().and_then(|r| r.user_id.as_ref())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SenderType {
    Police,
    User,
}

impl SenderType {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Police => "police",
            Self::User => "user",
        }
    }

    #[must_use]
    pub fn from_wire(raw: &str) -> Self {
        if raw.trim().eq_ignore_ascii_case("police") {
            Self::Police
        } else {
            Self::User
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryState {
    Sending,
    #[default]
    Sent,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: MessageId,
    pub content: String,
    pub timestamp_ms: u64,
    pub sender_type: SenderType,
    pub sender_id: Option<String>,
    pub receiver_id: Option<String>,
    pub delivery: DeliveryState,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    Image,
    Video,
}

impl MediaKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Video => "video",
        }
    }

    #[must_use]
    pub fn from_wire(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "image" => Some(Self::Image),
            "video" => Some(Self::Video),
            _ => None,
        }
    }

    #[must_use]
    pub fn from_content_type(content_type: &str) -> Option<Self> {
        let lower = content_type.to_ascii_lowercase();
        if lower.starts_with("image/") {
            Some(Self::Image)
        } else if lower.starts_with("video/") {
            Some(Self::Video)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaAttachment {
    pub id: MediaId,
    pub kind: MediaKind,
    pub url: String,
    pub uploaded_at_ms: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub id: CheckpointId,
    pub name: String,
    pub contact_number: Option<String>,
    pub coordinate: Option<Coordinate>,
    pub location: String,
    pub assigned_officers: Vec<String>,
    pub window: Option<TimeWindow>,
    pub office_id: Option<OfficeId>,
    pub office_name: Option<String>,
}

impl Checkpoint {
    /// Checkpoints without a complete schedule are never active.
    #[must_use]
    pub fn is_active_at(&self, now: TimeOfDay) -> bool {
        self.window.is_some_and(|w| w.contains(now))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoliceOffice {
    pub id: OfficeId,
    pub name: String,
    pub head_officer: Option<String>,
    pub contact_number: Option<String>,
    pub city: Option<String>,
    pub barangay: Option<String>,
    pub coordinate: Option<Coordinate>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteInfo {
    pub directions_url: String,
    pub qr_code_base64: Option<String>,
    pub distance: Option<String>,
    pub duration: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct GeocodedAddress {
    pub address_line: String,
    pub barangay: String,
    pub city: String,
    pub full_address: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Scope {
    #[default]
    OurOffice,
    All,
}

impl Scope {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::OurOffice => "our_office",
            Self::All => "all",
        }
    }

    #[must_use]
    pub const fn toggled(self) -> Self {
        match self {
            Self::OurOffice => Self::All,
            Self::All => Self::OurOffice,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct MapScope {
    pub reports: Scope,
    pub checkpoints: Scope,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ReportFilter {
    pub status: Option<ReportStatus>,
    pub category: Option<ReportCategory>,
}

impl ReportFilter {
    #[must_use]
    pub fn matches(&self, report: &Report) -> bool {
        self.status.map_or(true, |s| s == report.status)
            && self.category.map_or(true, |c| c == report.category)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalyticsFilter {
    /// Look-back window in days; 0 means all time.
    pub days: u32,
    pub scope: Option<Scope>,
    pub office_id: Option<OfficeId>,
    pub city: Option<String>,
    pub barangay: Option<String>,
    pub category: Option<ReportCategory>,
}

impl Default for AnalyticsFilter {
    fn default() -> Self {
        Self {
            days: crate::DEFAULT_ANALYTICS_DAYS,
            scope: None,
            office_id: None,
            city: None,
            barangay: None,
            category: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct AnalyticsOverview {
    pub total_assigned: u64,
    pub total_resolved: u64,
    pub resolved_missing_updated_at: u64,
    pub average_resolution_time: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationHotspot {
    pub city: String,
    pub barangay: String,
    pub report_count: u64,
    pub report_percent: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryShare {
    pub category: ReportCategory,
    pub report_count: u64,
    pub percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct LocationHotspots {
    pub total_resolved: u64,
    pub results: Vec<LocationHotspot>,
    pub available_cities: Vec<String>,
    pub available_barangays: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct CategoryBreakdown {
    pub total_resolved: u64,
    pub results: Vec<CategoryShare>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedCase {
    pub report_id: ReportId,
    pub category: ReportCategory,
    pub created_at_ms: Option<u64>,
    pub resolved_at_ms: Option<u64>,
    pub city: Option<String>,
    pub barangay: Option<String>,
    pub remarks: Option<String>,
    pub resolution_time: String,
    pub reporter_full_name: String,
    pub assigned_office_name: Option<String>,
    pub description: String,
    pub coordinate: Option<Coordinate>,
}

/// One poll of the live map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct LiveMapData {
    pub reports: Vec<Report>,
    pub offices: Vec<PoliceOffice>,
    pub checkpoints: Vec<Checkpoint>,
}

/// Renders a duration as `HH:MM:SS` with a `Nd ` prefix once it exceeds a
/// day, or `N/A` when unknown.
#[must_use]
pub fn format_resolution_time(seconds: Option<i64>) -> String {
    let Some(total) = seconds.filter(|s| *s >= 0) else {
        return "N/A".to_string();
    };
    let days = total / 86_400;
    let hours = (total % 86_400) / 3_600;
    let minutes = (total % 3_600) / 60;
    let secs = total % 60;
    let clock = format!("{hours:02}:{minutes:02}:{secs:02}");
    if days > 0 {
        format!("{days}d {clock}")
    } else {
        clock
    }
}
