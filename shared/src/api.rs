//! Endpoint catalogue: every backend call the dashboard makes, and how each
//! one becomes an [`HttpRequest`].
//!
//! `ApiCall` carries the routing data needed to apply the response (which
//! feed, which sequence number, which temporary message) so the update loop
//! never has to remember it elsewhere. Login and token refresh are not
//! `ApiCall`s: they go out without a bearer token and are never replayed.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use crate::capabilities::{HttpMethod, HttpRequest, MultipartForm};
use crate::domain::{
    AnalyticsFilter, MapScope, MediaAttachment, MediaKind, ReportFilter, ReportStatus,
};
use crate::geo::Coordinate;
use crate::polling::Feed;
use crate::wire::{CheckpointPayload, LoginRequest, OutgoingMessage, RefreshRequest, StatusUpdateRequest};
use crate::{
    AppError, AppResult, CheckpointId, ErrorKind, MessageId, ReportId, MAX_IMAGES_PER_REPORT,
    MAX_MEDIA_BYTES, MAX_VIDEOS_PER_REPORT,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FetchOrigin {
    /// First load of a screen or modal.
    Initial,
    /// Background interval refresh; failures are logged, not shown.
    Poll,
    /// User asked for it (refresh button, filter change).
    Explicit,
}

/// Which export a pending download holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExportKind {
    Analytics,
    ResolvedCases,
    Report,
}

impl ExportKind {
    #[must_use]
    pub fn file_name(self, report_id: Option<&ReportId>) -> String {
        match (self, report_id) {
            (Self::Report, Some(id)) => format!("report_{id}.pdf"),
            (Self::Report, None) => "report.pdf".to_string(),
            (Self::Analytics, _) => "analytics_report.pdf".to_string(),
            (Self::ResolvedCases, _) => "resolved_cases.pdf".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaUpload {
    pub file_name: String,
    pub content_type: String,
    #[serde(with = "serde_bytes")]
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MediaError {
    #[error("File too large. Max size is {max_mb}MB per file.")]
    TooLarge { size: usize, max_mb: usize },
    #[error("Only image/video files are allowed.")]
    UnsupportedType(String),
    #[error("Too many media files. Max is {max_images} images and {max_videos} videos per report.")]
    LimitReached { max_images: usize, max_videos: usize },
    #[error("The selected file is empty.")]
    Empty,
}

impl From<MediaError> for AppError {
    fn from(e: MediaError) -> Self {
        AppError::new(ErrorKind::Validation, e.to_string())
    }
}

impl MediaUpload {
    /// Client-side copy of the backend's per-report limits, checked against
    /// what is already attached.
    pub fn validate(&self, existing: &[MediaAttachment]) -> Result<MediaKind, MediaError> {
        if self.bytes.is_empty() {
            return Err(MediaError::Empty);
        }
        if self.bytes.len() > MAX_MEDIA_BYTES {
            return Err(MediaError::TooLarge {
                size: self.bytes.len(),
                max_mb: MAX_MEDIA_BYTES / (1024 * 1024),
            });
        }
        let kind = MediaKind::from_content_type(&self.content_type)
            .ok_or_else(|| MediaError::UnsupportedType(self.content_type.clone()))?;

        let already = existing.iter().filter(|m| m.kind == kind).count();
        let limit = match kind {
            MediaKind::Image => MAX_IMAGES_PER_REPORT,
            MediaKind::Video => MAX_VIDEOS_PER_REPORT,
        };
        if already >= limit {
            return Err(MediaError::LimitReached {
                max_images: MAX_IMAGES_PER_REPORT,
                max_videos: MAX_VIDEOS_PER_REPORT,
            });
        }
        Ok(kind)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ApiCall {
    ActiveReports {
        feed: Feed,
        origin: FetchOrigin,
        filter: ReportFilter,
        seq: u64,
    },
    ReportDetail {
        report_id: ReportId,
        seq: u64,
    },
    UpdateStatus {
        report_id: ReportId,
        status: ReportStatus,
        remarks: String,
    },
    Route {
        report_id: ReportId,
    },
    Messages {
        report_id: ReportId,
        origin: FetchOrigin,
        seq: u64,
    },
    SendMessage {
        report_id: ReportId,
        temp_id: MessageId,
        message: OutgoingMessage,
    },
    ResolvedCases {
        filter: AnalyticsFilter,
        origin: FetchOrigin,
        seq: u64,
    },
    Media {
        report_id: ReportId,
        seq: u64,
    },
    UploadMedia {
        report_id: ReportId,
        kind: MediaKind,
        sender_id: String,
        upload: MediaUpload,
    },
    Checkpoints {
        active_only: bool,
        seq: u64,
    },
    CreateCheckpoint {
        payload: CheckpointPayload,
    },
    UpdateCheckpoint {
        checkpoint_id: CheckpointId,
        payload: CheckpointPayload,
    },
    DeleteCheckpoint {
        checkpoint_id: CheckpointId,
    },
    MapData {
        scope: MapScope,
        origin: FetchOrigin,
        seq: u64,
    },
    ReverseGeocode {
        coordinate: Coordinate,
    },
    AnalyticsOverview {
        filter: AnalyticsFilter,
        seq: u64,
    },
    LocationHotspots {
        filter: AnalyticsFilter,
        seq: u64,
    },
    CategoryHotspots {
        filter: AnalyticsFilter,
        seq: u64,
    },
    Export {
        kind: ExportKind,
        filter: AnalyticsFilter,
        report_id: Option<ReportId>,
    },
    RebuildAnalytics,
}

impl ApiCall {
    /// Short name for logs.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::ActiveReports { .. } => "active_reports",
            Self::ReportDetail { .. } => "report_detail",
            Self::UpdateStatus { .. } => "update_status",
            Self::Route { .. } => "route",
            Self::Messages { .. } => "messages",
            Self::SendMessage { .. } => "send_message",
            Self::ResolvedCases { .. } => "resolved_cases",
            Self::Media { .. } => "media",
            Self::UploadMedia { .. } => "upload_media",
            Self::Checkpoints { .. } => "checkpoints",
            Self::CreateCheckpoint { .. } => "create_checkpoint",
            Self::UpdateCheckpoint { .. } => "update_checkpoint",
            Self::DeleteCheckpoint { .. } => "delete_checkpoint",
            Self::MapData { .. } => "map_data",
            Self::ReverseGeocode { .. } => "reverse_geocode",
            Self::AnalyticsOverview { .. } => "analytics_overview",
            Self::LocationHotspots { .. } => "location_hotspots",
            Self::CategoryHotspots { .. } => "category_hotspots",
            Self::Export { .. } => "export",
            Self::RebuildAnalytics => "rebuild_analytics",
        }
    }

    /// Names the resource in "not found" messages.
    #[must_use]
    pub fn subject(&self) -> &'static str {
        match self {
            Self::ActiveReports { .. }
            | Self::ReportDetail { .. }
            | Self::UpdateStatus { .. } => "Report",
            Self::Route { .. } => "Route",
            Self::Messages { .. } | Self::SendMessage { .. } => "Conversation",
            Self::ResolvedCases { .. } => "Resolved cases",
            Self::Media { .. } | Self::UploadMedia { .. } => "Media",
            Self::Checkpoints { .. }
            | Self::CreateCheckpoint { .. }
            | Self::UpdateCheckpoint { .. }
            | Self::DeleteCheckpoint { .. } => "Checkpoint",
            Self::MapData { .. } => "Map data",
            Self::ReverseGeocode { .. } => "Address",
            Self::AnalyticsOverview { .. }
            | Self::LocationHotspots { .. }
            | Self::CategoryHotspots { .. }
            | Self::RebuildAnalytics => "Analytics",
            Self::Export { .. } => "Export",
        }
    }

    /// Feed and sequence number for ordered reads.
    #[must_use]
    pub fn sequence(&self) -> Option<(Feed, u64)> {
        match self {
            Self::ActiveReports { feed, seq, .. } => Some((*feed, *seq)),
            Self::ReportDetail { seq, .. } => Some((Feed::ReportDetail, *seq)),
            Self::Messages { seq, .. } => Some((Feed::Messages, *seq)),
            Self::ResolvedCases { seq, .. } => Some((Feed::ResolvedCases, *seq)),
            Self::Media { seq, .. } => Some((Feed::Media, *seq)),
            Self::Checkpoints { seq, .. } => Some((Feed::Checkpoints, *seq)),
            Self::MapData { seq, .. } => Some((Feed::LiveMap, *seq)),
            Self::AnalyticsOverview { seq, .. } => Some((Feed::AnalyticsOverview, *seq)),
            Self::LocationHotspots { seq, .. } => Some((Feed::LocationHotspots, *seq)),
            Self::CategoryHotspots { seq, .. } => Some((Feed::CategoryHotspots, *seq)),
            _ => None,
        }
    }

    /// Background polls never surface errors.
    #[must_use]
    pub fn is_background(&self) -> bool {
        matches!(
            self,
            Self::ActiveReports { origin: FetchOrigin::Poll, .. }
                | Self::Messages { origin: FetchOrigin::Poll, .. }
                | Self::MapData { origin: FetchOrigin::Poll, .. }
                | Self::ResolvedCases { origin: FetchOrigin::Poll, .. }
        )
    }
}

/// Renders calls against the configured API root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    base: Url,
}

impl Endpoints {
    #[must_use]
    pub fn new(base: Url) -> Self {
        Self { base }
    }

    #[must_use]
    pub fn base(&self) -> &Url {
        &self.base
    }

    fn url(&self, path: &str) -> AppResult<Url> {
        self.base.join(path).map_err(|e| {
            AppError::new(ErrorKind::Internal, "Could not build request URL.")
                .with_internal(format!("{path}: {e}"))
        })
    }

    fn request(&self, method: HttpMethod, url: &Url) -> AppResult<HttpRequest> {
        Ok(HttpRequest::new(method, url)?)
    }

    pub fn login(&self, body: &LoginRequest) -> AppResult<HttpRequest> {
        let url = self.url("auth/login/")?;
        Ok(self.request(HttpMethod::Post, &url)?.with_json(body)?)
    }

    pub fn refresh(&self, refresh_token: &str) -> AppResult<HttpRequest> {
        let url = self.url("auth/refresh/")?;
        Ok(self.request(HttpMethod::Post, &url)?.with_json(&RefreshRequest {
            refresh: refresh_token.to_string(),
        })?)
    }

    /// Builds an authenticated request for `call`.
    pub fn build(&self, call: &ApiCall, access_token: &str) -> AppResult<HttpRequest> {
        let request = match call {
            ApiCall::ActiveReports { filter, .. } => {
                let mut url = self.url("reports/")?;
                {
                    let mut query = url.query_pairs_mut();
                    if let Some(status) = filter.status {
                        query.append_pair("status", status.as_str());
                    }
                    if let Some(category) = filter.category {
                        query.append_pair("category", category.as_str());
                    }
                }
                strip_empty_query(&mut url);
                self.request(HttpMethod::Get, &url)?
            }
            ApiCall::ReportDetail { report_id, .. } => {
                let url = self.url(&format!("reports/{}/", segment(report_id.as_str())?))?;
                self.request(HttpMethod::Get, &url)?
            }
            ApiCall::UpdateStatus {
                report_id,
                status,
                remarks,
            } => {
                let url = self.url(&format!("reports/{}/", segment(report_id.as_str())?))?;
                self.request(HttpMethod::Patch, &url)?
                    .with_json(&StatusUpdateRequest {
                        status: *status,
                        remarks: remarks.clone(),
                    })?
            }
            ApiCall::Route { report_id } => {
                let url = self.url(&format!("reports/{}/route/", segment(report_id.as_str())?))?;
                self.request(HttpMethod::Get, &url)?
            }
            ApiCall::Messages { report_id, .. } => {
                let url =
                    self.url(&format!("reports/{}/messages/", segment(report_id.as_str())?))?;
                self.request(HttpMethod::Get, &url)?
            }
            ApiCall::SendMessage {
                report_id, message, ..
            } => {
                let url =
                    self.url(&format!("reports/{}/messages/", segment(report_id.as_str())?))?;
                self.request(HttpMethod::Post, &url)?.with_json(message)?
            }
            ApiCall::ResolvedCases { filter, .. } => {
                let mut url = self.url("reports/resolved/")?;
                append_analytics_filter(&mut url, filter);
                self.request(HttpMethod::Get, &url)?
            }
            ApiCall::Media { report_id, .. } => {
                let mut url = self.url("media/")?;
                url.query_pairs_mut()
                    .append_pair("report_id", report_id.as_str());
                self.request(HttpMethod::Get, &url)?
            }
            ApiCall::UploadMedia {
                report_id,
                kind,
                sender_id,
                upload,
            } => {
                let url = self.url("media/")?;
                let form = MultipartForm::new()
                    .text("report", report_id.as_str())
                    .text("file_type", kind.as_str())
                    .text("sender_id", sender_id.as_str())
                    .file(
                        "uploaded_file",
                        upload.file_name.as_str(),
                        upload.content_type.as_str(),
                        upload.bytes.clone(),
                    );
                self.request(HttpMethod::Post, &url)?
                    .with_multipart(&form)?
            }
            ApiCall::Checkpoints { active_only, .. } => {
                let path = if *active_only {
                    "checkpoints/active/"
                } else {
                    "checkpoints/"
                };
                self.request(HttpMethod::Get, &self.url(path)?)?
            }
            ApiCall::CreateCheckpoint { payload } => self
                .request(HttpMethod::Post, &self.url("checkpoints/")?)?
                .with_json(payload)?,
            ApiCall::UpdateCheckpoint {
                checkpoint_id,
                payload,
            } => {
                let url =
                    self.url(&format!("checkpoints/{}/", segment(checkpoint_id.as_str())?))?;
                self.request(HttpMethod::Patch, &url)?.with_json(payload)?
            }
            ApiCall::DeleteCheckpoint { checkpoint_id } => {
                let url =
                    self.url(&format!("checkpoints/{}/", segment(checkpoint_id.as_str())?))?;
                self.request(HttpMethod::Delete, &url)?
            }
            ApiCall::MapData { scope, .. } => {
                let mut url = self.url("admin/map/data/")?;
                url.query_pairs_mut()
                    .append_pair("scope_reports", scope.reports.as_str())
                    .append_pair("scope_checkpoints", scope.checkpoints.as_str());
                self.request(HttpMethod::Get, &url)?
            }
            ApiCall::ReverseGeocode { coordinate } => {
                let mut url = self.url("geocode/reverse/")?;
                url.query_pairs_mut()
                    .append_pair("lat", &coordinate.lat().to_string())
                    .append_pair("lng", &coordinate.lng().to_string());
                self.request(HttpMethod::Get, &url)?
            }
            ApiCall::AnalyticsOverview { filter, .. } => {
                let mut url = self.url("analytics/summary/overview/")?;
                append_analytics_filter(&mut url, filter);
                self.request(HttpMethod::Get, &url)?
            }
            ApiCall::LocationHotspots { filter, .. } => {
                let mut url = self.url("analytics/hotspots/locations/")?;
                append_analytics_filter(&mut url, filter);
                self.request(HttpMethod::Get, &url)?
            }
            ApiCall::CategoryHotspots { filter, .. } => {
                let mut url = self.url("analytics/hotspots/categories/")?;
                append_analytics_filter(&mut url, filter);
                self.request(HttpMethod::Get, &url)?
            }
            ApiCall::Export {
                kind,
                filter,
                report_id,
            } => {
                let mut url = match (kind, report_id) {
                    (ExportKind::Report, Some(id)) => {
                        self.url(&format!("reports/{}/export/", segment(id.as_str())?))?
                    }
                    (ExportKind::Report, None) => {
                        return Err(AppError::new(
                            ErrorKind::InvalidState,
                            "No report selected for export.",
                        ))
                    }
                    (ExportKind::ResolvedCases, _) => self.url("reports/resolved/export/")?,
                    (ExportKind::Analytics, _) => self.url("analytics/export/")?,
                };
                if *kind != ExportKind::Report {
                    append_analytics_filter(&mut url, filter);
                }
                self.request(HttpMethod::Get, &url)?
                    .with_header("Accept", "application/pdf")?
            }
            ApiCall::RebuildAnalytics => {
                self.request(HttpMethod::Post, &self.url("admin/analytics/update/")?)?
                    .with_json(&serde_json::json!({}))?
            }
        };
        Ok(request.with_bearer(access_token)?)
    }
}

/// Path segments come from backend ids; anything that could escape the
/// segment is refused rather than encoded.
fn segment(id: &str) -> AppResult<&str> {
    let valid = !id.is_empty()
        && id != "."
        && id != ".."
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_'));
    if valid {
        Ok(id)
    } else {
        Err(AppError::new(ErrorKind::Validation, "Invalid identifier.")
            .with_context("id", id.chars().take(64).collect::<String>()))
    }
}

fn strip_empty_query(url: &mut Url) {
    if url.query() == Some("") {
        url.set_query(None);
    }
}

/// `days` is always sent (0 means all time); the rest only when set.
fn append_analytics_filter(url: &mut Url, filter: &AnalyticsFilter) {
    let mut query = url.query_pairs_mut();
    query.append_pair("days", &filter.days.to_string());
    if let Some(scope) = filter.scope {
        query.append_pair("scope", scope.as_str());
    }
    if let Some(office) = &filter.office_id {
        query.append_pair("office_id", office.as_str());
    }
    if let Some(city) = filter.city.as_deref().filter(|c| is_set(c)) {
        query.append_pair("city", city);
        if let Some(barangay) = filter.barangay.as_deref().filter(|b| is_set(b)) {
            query.append_pair("barangay", barangay);
        }
    }
    if let Some(category) = filter.category {
        query.append_pair("category", category.as_str());
    }
}

fn is_set(value: &str) -> bool {
    let trimmed = value.trim();
    !trimmed.is_empty() && !trimmed.eq_ignore_ascii_case("all")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ReportCategory, Scope};
    use crate::{MediaId, OfficeId};

    fn endpoints() -> Endpoints {
        Endpoints::new(Url::parse("https://dispatch.example.ph/api/").unwrap())
    }

    fn build(call: &ApiCall) -> HttpRequest {
        endpoints().build(call, "tok").unwrap()
    }

    mod request_tests {
        use super::*;

        #[test]
        fn test_reports_query_filters() {
            let request = build(&ApiCall::ActiveReports {
                feed: Feed::DashboardReports,
                origin: FetchOrigin::Initial,
                filter: ReportFilter {
                    status: Some(ReportStatus::EnRoute),
                    category: Some(ReportCategory::Theft),
                },
                seq: 1,
            });
            assert_eq!(
                request.url(),
                "https://dispatch.example.ph/api/reports/?status=En+Route&category=Theft"
            );
            assert_eq!(request.header("Authorization"), Some("Bearer tok"));
        }

        #[test]
        fn test_unfiltered_reports_have_no_query() {
            let request = build(&ApiCall::ActiveReports {
                feed: Feed::NotifierReports,
                origin: FetchOrigin::Poll,
                filter: ReportFilter::default(),
                seq: 1,
            });
            assert_eq!(request.url(), "https://dispatch.example.ph/api/reports/");
        }

        #[test]
        fn test_status_update_body() {
            let request = build(&ApiCall::UpdateStatus {
                report_id: ReportId::new("a1b2-c3"),
                status: ReportStatus::Resolved,
                remarks: "Suspect detained".into(),
            });
            assert_eq!(request.method(), HttpMethod::Patch);
            assert!(request.url().ends_with("/reports/a1b2-c3/"));
            let body: serde_json::Value = serde_json::from_slice(request.body()).unwrap();
            assert_eq!(body, serde_json::json!({"status": "Resolved", "remarks": "Suspect detained"}));
        }

        #[test]
        fn test_path_injection_refused() {
            let result = endpoints().build(
                &ApiCall::Route {
                    report_id: ReportId::new("../admin"),
                },
                "tok",
            );
            assert_eq!(result.unwrap_err().kind, ErrorKind::Validation);
        }

        #[test]
        fn test_map_scope_query() {
            let request = build(&ApiCall::MapData {
                scope: MapScope {
                    reports: Scope::All,
                    checkpoints: Scope::OurOffice,
                },
                origin: FetchOrigin::Poll,
                seq: 3,
            });
            assert!(request
                .url()
                .ends_with("admin/map/data/?scope_reports=all&scope_checkpoints=our_office"));
        }

        #[test]
        fn test_analytics_filter_omits_all() {
            let request = build(&ApiCall::AnalyticsOverview {
                filter: AnalyticsFilter {
                    days: 0,
                    scope: Some(Scope::OurOffice),
                    office_id: Some(OfficeId::new("o1")),
                    city: Some("All".into()),
                    barangay: Some("Tondo".into()),
                    category: None,
                },
                seq: 1,
            });
            assert!(request.url().ends_with(
                "analytics/summary/overview/?days=0&scope=our_office&office_id=o1"
            ));
        }

        #[test]
        fn test_barangay_requires_city() {
            let request = build(&ApiCall::ResolvedCases {
                filter: AnalyticsFilter {
                    city: Some("Manila".into()),
                    barangay: Some("Tondo".into()),
                    category: Some(ReportCategory::Theft),
                    ..AnalyticsFilter::default()
                },
                origin: FetchOrigin::Explicit,
                seq: 1,
            });
            assert!(request.url().ends_with(
                "reports/resolved/?days=30&city=Manila&barangay=Tondo&category=Theft"
            ));
        }

        #[test]
        fn test_export_asks_for_pdf() {
            let request = build(&ApiCall::Export {
                kind: ExportKind::Report,
                filter: AnalyticsFilter::default(),
                report_id: Some(ReportId::new("r1")),
            });
            assert!(request.url().ends_with("reports/r1/export/"));
            assert_eq!(request.header("accept"), Some("application/pdf"));
        }

        #[test]
        fn test_login_has_no_bearer() {
            let request = endpoints()
                .login(&LoginRequest {
                    email: "desk@station.ph".into(),
                    password: "pw".into(),
                    role: None,
                })
                .unwrap();
            assert!(request.header("Authorization").is_none());
            assert!(request.url().ends_with("auth/login/"));

            let refresh = endpoints().refresh("r").unwrap();
            assert!(refresh.header("Authorization").is_none());
            let body: serde_json::Value = serde_json::from_slice(refresh.body()).unwrap();
            assert_eq!(body["refresh"], "r");
        }

        #[test]
        fn test_upload_is_multipart() {
            let request = build(&ApiCall::UploadMedia {
                report_id: ReportId::new("r1"),
                kind: MediaKind::Image,
                sender_id: "o1".into(),
                upload: MediaUpload {
                    file_name: "scene.jpg".into(),
                    content_type: "image/jpeg".into(),
                    bytes: vec![1, 2, 3],
                },
            });
            assert!(request
                .header("content-type")
                .unwrap()
                .starts_with("multipart/form-data"));
            let body = String::from_utf8_lossy(request.body());
            assert!(body.contains("name=\"uploaded_file\"; filename=\"scene.jpg\""));
            assert!(body.contains("name=\"file_type\"\r\n\r\nimage"));
        }
    }

    mod call_tests {
        use super::*;

        #[test]
        fn test_background_only_for_polls() {
            let poll = ApiCall::MapData {
                scope: MapScope::default(),
                origin: FetchOrigin::Poll,
                seq: 1,
            };
            let initial = ApiCall::MapData {
                scope: MapScope::default(),
                origin: FetchOrigin::Initial,
                seq: 1,
            };
            assert!(poll.is_background());
            assert!(!initial.is_background());
            assert!(!ApiCall::RebuildAnalytics.is_background());
        }

        #[test]
        fn test_sequence_routing() {
            let call = ApiCall::Messages {
                report_id: ReportId::new("r1"),
                origin: FetchOrigin::Poll,
                seq: 9,
            };
            assert_eq!(call.sequence(), Some((Feed::Messages, 9)));
            assert_eq!(call.subject(), "Conversation");
            assert!(ApiCall::RebuildAnalytics.sequence().is_none());
        }
    }

    mod media_tests {
        use super::*;

        fn attachment(kind: MediaKind) -> MediaAttachment {
            MediaAttachment {
                id: MediaId::new("m"),
                kind,
                url: "https://cdn/x".into(),
                uploaded_at_ms: None,
            }
        }

        fn upload(content_type: &str, size: usize) -> MediaUpload {
            MediaUpload {
                file_name: "f".into(),
                content_type: content_type.into(),
                bytes: vec![0; size],
            }
        }

        #[test]
        fn test_limits() {
            let three_images = vec![attachment(MediaKind::Image); 3];
            assert!(matches!(
                upload("image/png", 10).validate(&three_images),
                Err(MediaError::LimitReached { .. })
            ));
            assert_eq!(
                upload("video/mp4", 10).validate(&three_images),
                Ok(MediaKind::Video)
            );
        }

        #[test]
        fn test_size_and_type() {
            assert!(matches!(
                upload("image/png", MAX_MEDIA_BYTES + 1).validate(&[]),
                Err(MediaError::TooLarge { max_mb: 15, .. })
            ));
            assert!(matches!(
                upload("application/pdf", 10).validate(&[]),
                Err(MediaError::UnsupportedType(_))
            ));
            assert_eq!(upload("image/png", 0).validate(&[]), Err(MediaError::Empty));
        }
    }
}
