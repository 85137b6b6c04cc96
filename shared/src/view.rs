//! What the shell renders. Everything here is derived from [`Model`] on
//! demand; nothing is stored.

use geojson::FeatureCollection;
use serde::{Deserialize, Serialize};

use crate::api::ExportKind;
use crate::chat::ChatThread;
use crate::domain::{
    AnalyticsFilter, AnalyticsOverview, CategoryBreakdown, Checkpoint, DeliveryState,
    GeocodedAddress, LocationHotspots, MapScope, MediaAttachment, MediaKind, PoliceOffice,
    Report, ReportCategory, ReportFilter, ReportStatus, ResolvedCase, RouteInfo, SenderType,
};
use crate::mappers::{to_feature_collection, CheckpointDraft, NOT_AVAILABLE};
use crate::model::{Modal, Model, Phase, ToastKind, ToastMessage};
use crate::schedule::TimeOfDay;
use crate::session::Role;
use crate::{
    truncate_preview, AppError, ErrorSeverity, DESCRIPTION_PREVIEW_LENGTH, MAX_IMAGES_PER_REPORT,
    MAX_MESSAGE_LENGTH, MAX_VIDEOS_PER_REPORT,
};

/// Top-level destinations once signed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Screen {
    #[default]
    Dashboard,
    LiveMap,
    Analytics,
    ResolvedCases,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ReportCard {
    pub id: String,
    pub category: ReportCategory,
    pub status: ReportStatus,
    pub status_label: String,
    pub description_preview: String,
    pub reporter_name: String,
    pub address: String,
    pub created_at_ms: Option<u64>,
    pub distance: String,
    pub eta: String,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
}

impl From<&Report> for ReportCard {
    fn from(report: &Report) -> Self {
        Self {
            id: report.id.to_string(),
            category: report.category,
            status: report.status,
            status_label: report.status.as_str().to_string(),
            description_preview: truncate_preview(&report.description, DESCRIPTION_PREVIEW_LENGTH),
            reporter_name: report.reporter_name.clone(),
            address: report.location.address.clone(),
            created_at_ms: report.created_at_ms,
            distance: report
                .distance
                .clone()
                .unwrap_or_else(|| NOT_AVAILABLE.to_string()),
            eta: report.eta.clone().unwrap_or_else(|| NOT_AVAILABLE.to_string()),
            lat: report.location.coordinate.map(|c| c.lat()),
            lng: report.location.coordinate.map(|c| c.lng()),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct CheckpointView {
    pub id: String,
    pub name: String,
    pub location: String,
    pub contact_number: Option<String>,
    pub officers: Vec<String>,
    pub schedule: Option<String>,
    pub active: bool,
    pub office_name: Option<String>,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
}

impl CheckpointView {
    fn new(checkpoint: &Checkpoint, now: TimeOfDay) -> Self {
        Self {
            id: checkpoint.id.to_string(),
            name: checkpoint.name.clone(),
            location: checkpoint.location.clone(),
            contact_number: checkpoint.contact_number.clone(),
            officers: checkpoint.assigned_officers.clone(),
            schedule: checkpoint.window.map(|w| w.label()),
            active: checkpoint.is_active_at(now),
            office_name: checkpoint.office_name.clone(),
            lat: checkpoint.coordinate.map(|c| c.lat()),
            lng: checkpoint.coordinate.map(|c| c.lng()),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ViewState {
    Loading,
    SignIn {
        submitting: bool,
    },
    Dashboard {
        reports: Vec<ReportCard>,
        filter: ReportFilter,
        loading: bool,
        status_options: Vec<ReportStatus>,
        category_options: Vec<ReportCategory>,
    },
    LiveMap {
        layer: FeatureCollection,
        reports: Vec<ReportCard>,
        offices: Vec<PoliceOffice>,
        checkpoints: Vec<CheckpointView>,
        managed_checkpoints: Vec<CheckpointView>,
        scope: MapScope,
        loading: bool,
        last_geocode: Option<GeocodedAddress>,
        local_time: String,
    },
    Analytics {
        filter: AnalyticsFilter,
        overview: Option<AnalyticsOverview>,
        location_hotspots: Option<LocationHotspots>,
        category_breakdown: Option<CategoryBreakdown>,
        can_rebuild: bool,
        rebuilding: bool,
        exporting: bool,
    },
    ResolvedCases {
        filter: AnalyticsFilter,
        cases: Vec<ResolvedCase>,
        count: u64,
        exporting: bool,
    },
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ChatMessageView {
    pub id: String,
    pub content: String,
    pub timestamp_ms: u64,
    pub from_office: bool,
    pub sending: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ModalView {
    ReportDetails {
        report: Option<Report>,
        media: Vec<MediaAttachment>,
        status_options: Vec<ReportStatus>,
        updating: bool,
        uploading: bool,
        can_add_image: bool,
        can_add_video: bool,
    },
    Chat {
        report_id: String,
        messages: Vec<ChatMessageView>,
        draft: String,
        sending: bool,
        loaded: bool,
        can_send: bool,
        max_length: usize,
    },
    Directions {
        report_id: String,
        route: Option<RouteInfo>,
    },
    CheckpointEditor {
        draft: CheckpointDraft,
        is_new: bool,
        saving: bool,
        suggested_address: Option<String>,
    },
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct UserFacingError {
    pub message: String,
    pub is_transient: bool,
    pub is_retryable: bool,
    pub error_code: String,
}

impl From<&AppError> for UserFacingError {
    fn from(e: &AppError) -> Self {
        Self {
            message: e.user_facing_message(),
            is_transient: e.severity == ErrorSeverity::Transient,
            is_retryable: e.is_retryable(),
            error_code: e.code().to_string(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ToastView {
    pub message: String,
    pub kind: ToastKind,
    pub duration_ms: u64,
}

impl From<&ToastMessage> for ToastView {
    fn from(t: &ToastMessage) -> Self {
        Self {
            message: t.message.clone(),
            kind: t.kind,
            duration_ms: t.duration_ms,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct UserView {
    pub display_name: String,
    pub role: Role,
    pub office_id: Option<String>,
    pub is_admin: bool,
}

/// A finished export waiting for the shell to save it.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct DownloadView {
    pub kind: ExportKind,
    pub file_name: String,
    pub content_type: String,
    #[serde(with = "serde_bytes")]
    pub bytes: Vec<u8>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ViewModel {
    pub state: ViewState,
    pub screen: Screen,
    pub modal: Option<ModalView>,
    pub error: Option<UserFacingError>,
    pub toast: Option<ToastView>,
    pub is_authenticated: bool,
    pub user: Option<UserView>,
    pub download: Option<DownloadView>,
}

impl Default for ViewModel {
    fn default() -> Self {
        Self {
            state: ViewState::Loading,
            screen: Screen::default(),
            modal: None,
            error: None,
            toast: None,
            is_authenticated: false,
            user: None,
            download: None,
        }
    }
}

/// Builds the complete view for the current model.
#[must_use]
pub fn build(model: &Model) -> ViewModel {
    let state = match model.phase {
        Phase::Starting => ViewState::Loading,
        Phase::SignedOut | Phase::SigningIn => ViewState::SignIn {
            submitting: model.phase == Phase::SigningIn,
        },
        Phase::SignedIn => screen_state(model),
    };
    let signed_in = model.is_signed_in();

    ViewModel {
        state,
        screen: model.screen,
        modal: if signed_in { modal_view(model) } else { None },
        error: model.active_error.as_ref().map(UserFacingError::from),
        toast: model
            .active_toast
            .as_ref()
            .filter(|t| !t.is_expired(model.now_ms))
            .map(ToastView::from),
        is_authenticated: signed_in,
        user: model.session.as_ref().map(|s| {
            let user = s.user();
            UserView {
                display_name: user.display_name.clone(),
                role: user.role,
                office_id: user.office_id.as_ref().map(ToString::to_string),
                is_admin: user.is_admin(),
            }
        }),
        download: model.pending_download.as_ref().map(|d| DownloadView {
            kind: d.kind,
            file_name: d.file_name.clone(),
            content_type: d.content_type.clone(),
            bytes: d.bytes.clone(),
        }),
    }
}

fn screen_state(model: &Model) -> ViewState {
    match model.screen {
        Screen::Dashboard => ViewState::Dashboard {
            reports: model
                .reports
                .iter()
                .filter(|r| model.report_filter.matches(r))
                .map(ReportCard::from)
                .collect(),
            filter: model.report_filter,
            loading: model.reports_loading,
            status_options: ReportStatus::ALL.to_vec(),
            category_options: ReportCategory::ALL.to_vec(),
        },
        Screen::LiveMap => {
            let now = model.local_time();
            ViewState::LiveMap {
                layer: to_feature_collection(&model.live_map, now),
                reports: model.live_map.reports.iter().map(ReportCard::from).collect(),
                offices: model.live_map.offices.clone(),
                checkpoints: model
                    .live_map
                    .checkpoints
                    .iter()
                    .map(|c| CheckpointView::new(c, now))
                    .collect(),
                managed_checkpoints: model
                    .checkpoints
                    .iter()
                    .map(|c| CheckpointView::new(c, now))
                    .collect(),
                scope: model.map_scope,
                loading: model.map_loading,
                last_geocode: model.last_geocode.as_ref().map(|(_, a)| a.clone()),
                local_time: now.label(),
            }
        }
        Screen::Analytics => ViewState::Analytics {
            filter: model.analytics_filter.clone(),
            overview: model.overview.clone(),
            location_hotspots: model.location_hotspots.clone(),
            category_breakdown: model.category_breakdown.clone(),
            can_rebuild: model.is_admin(),
            rebuilding: model.analytics_rebuilding,
            exporting: model.exporting == Some(ExportKind::Analytics),
        },
        Screen::ResolvedCases => ViewState::ResolvedCases {
            filter: model.resolved_filter.clone(),
            cases: model.resolved_cases.clone(),
            count: model.resolved_count,
            exporting: model.exporting == Some(ExportKind::ResolvedCases),
        },
    }
}

fn modal_view(model: &Model) -> Option<ModalView> {
    let modal = model.modal.as_ref()?;
    Some(match modal {
        Modal::ReportDetails { report_id } => {
            let report = model.find_report(report_id).cloned();
            let count = |kind: MediaKind| model.media.iter().filter(|m| m.kind == kind).count();
            ModalView::ReportDetails {
                status_options: report
                    .as_ref()
                    .map(|r| r.status.forward_options())
                    .unwrap_or_default(),
                report,
                media: model.media.clone(),
                updating: model.status_update_pending,
                uploading: model.uploading_media,
                can_add_image: count(MediaKind::Image) < MAX_IMAGES_PER_REPORT,
                can_add_video: count(MediaKind::Video) < MAX_VIDEOS_PER_REPORT,
            }
        }
        Modal::Chat { report_id } => match model.chat.as_ref() {
            Some(chat) => chat_view(chat),
            None => ModalView::Chat {
                report_id: report_id.to_string(),
                messages: Vec::new(),
                draft: String::new(),
                sending: false,
                loaded: false,
                can_send: false,
                max_length: MAX_MESSAGE_LENGTH,
            },
        },
        Modal::Directions { report_id } => ModalView::Directions {
            report_id: report_id.to_string(),
            route: model.route.clone(),
        },
        Modal::CheckpointEditor => {
            let editor = model.checkpoint_editor.clone().unwrap_or_default();
            let suggested_address = model
                .last_geocode
                .as_ref()
                .filter(|(at, _)| {
                    editor.draft.latitude == Some(at.lat()) && editor.draft.longitude == Some(at.lng())
                })
                .map(|(_, address)| address.full_address.clone());
            ModalView::CheckpointEditor {
                is_new: editor.editing.is_none(),
                saving: editor.saving,
                draft: editor.draft,
                suggested_address,
            }
        }
    })
}

fn chat_view(chat: &ChatThread) -> ModalView {
    ModalView::Chat {
        report_id: chat.report_id().to_string(),
        messages: chat
            .messages()
            .iter()
            .map(|m| ChatMessageView {
                id: m.id.to_string(),
                content: m.content.clone(),
                timestamp_ms: m.timestamp_ms,
                from_office: m.sender_type == SenderType::Police,
                sending: m.delivery == DeliveryState::Sending,
            })
            .collect(),
        draft: chat.draft().to_string(),
        sending: chat.is_sending(),
        loaded: chat.is_loaded(),
        can_send: !chat.is_sending() && !chat.draft().trim().is_empty(),
        max_length: MAX_MESSAGE_LENGTH,
    }
}
