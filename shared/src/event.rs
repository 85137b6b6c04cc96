use serde::{Deserialize, Serialize};

use crate::api::{ApiCall, ExportKind, MediaUpload};
use crate::capabilities::{HttpResult, KvReadResult, KvWriteResult, TimerOutput};
use crate::config::DashboardConfig;
use crate::domain::{AnalyticsFilter, ReportFilter, ReportStatus, Scope};
use crate::mappers::CheckpointDraft;
use crate::polling::PollChannel;
use crate::session::StoredEntry;
use crate::view::Screen;
use crate::{CheckpointId, ReportId};

/// Sign-in form contents. The password never shows up in logs.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
}

impl std::fmt::Debug for LoginForm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoginForm")
            .field("email", &self.email)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub enum Event {
    #[default]
    Noop,

    // Lifecycle
    Configure(DashboardConfig),
    AppStarted {
        now_ms: u64,
    },
    StoredEntryLoaded {
        entry: StoredEntry,
        result: Box<KvReadResult>,
    },
    StorageWritten(Box<KvWriteResult>),
    /// First pointer/keyboard gesture; unlocks audible cues.
    UserInteracted,

    // Authentication
    LoginSubmitted(LoginForm),
    LoginResponse(Box<HttpResult>),
    LogoutRequested,
    TokenRefreshed(Box<HttpResult>),

    // Transport
    ApiResponse {
        call: Box<ApiCall>,
        retried: bool,
        /// Generation of the access token the request was sent with.
        token_generation: u64,
        result: Box<HttpResult>,
    },
    PollTick {
        channel: PollChannel,
        generation: u64,
        output: TimerOutput,
    },

    // Navigation
    Navigate(Screen),
    ModalClosed,

    // Dashboard
    ReportFilterChanged(ReportFilter),
    RefreshRequested,
    ReportSelected {
        report_id: ReportId,
    },
    StatusUpdateSubmitted {
        report_id: ReportId,
        status: ReportStatus,
        remarks: String,
    },
    DirectionsRequested {
        report_id: ReportId,
    },
    MediaUploadRequested {
        report_id: ReportId,
        upload: MediaUpload,
    },

    // Chat
    ChatOpened {
        report_id: ReportId,
    },
    ChatDraftChanged(String),
    ChatSendRequested,

    // Live map
    ReportScopeChanged(Scope),
    CheckpointScopeChanged(Scope),
    MapClicked {
        lat: f64,
        lng: f64,
    },

    // Checkpoints
    CheckpointEditorOpened {
        checkpoint_id: Option<CheckpointId>,
    },
    CheckpointDraftChanged(CheckpointDraft),
    CheckpointLocationPicked {
        lat: f64,
        lng: f64,
    },
    CheckpointSaveRequested,
    CheckpointDeleteRequested {
        checkpoint_id: CheckpointId,
    },

    // Analytics and resolved cases
    AnalyticsFilterChanged(AnalyticsFilter),
    AnalyticsRebuildRequested,
    ResolvedFilterChanged(AnalyticsFilter),
    ExportRequested {
        kind: ExportKind,
        report_id: Option<ReportId>,
    },
    DownloadTaken,

    DismissError,
    DismissToast,
}

impl Event {
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Noop => "noop",
            Self::Configure(_) => "configure",
            Self::AppStarted { .. } => "app_started",
            Self::StoredEntryLoaded { .. } => "stored_entry_loaded",
            Self::StorageWritten(_) => "storage_written",
            Self::UserInteracted => "user_interacted",
            Self::LoginSubmitted(_) => "login_submitted",
            Self::LoginResponse(_) => "login_response",
            Self::LogoutRequested => "logout_requested",
            Self::TokenRefreshed(_) => "token_refreshed",
            Self::ApiResponse { .. } => "api_response",
            Self::PollTick { .. } => "poll_tick",
            Self::Navigate(_) => "navigate",
            Self::ModalClosed => "modal_closed",
            Self::ReportFilterChanged(_) => "report_filter_changed",
            Self::RefreshRequested => "refresh_requested",
            Self::ReportSelected { .. } => "report_selected",
            Self::StatusUpdateSubmitted { .. } => "status_update_submitted",
            Self::DirectionsRequested { .. } => "directions_requested",
            Self::MediaUploadRequested { .. } => "media_upload_requested",
            Self::ChatOpened { .. } => "chat_opened",
            Self::ChatDraftChanged(_) => "chat_draft_changed",
            Self::ChatSendRequested => "chat_send_requested",
            Self::ReportScopeChanged(_) => "report_scope_changed",
            Self::CheckpointScopeChanged(_) => "checkpoint_scope_changed",
            Self::MapClicked { .. } => "map_clicked",
            Self::CheckpointEditorOpened { .. } => "checkpoint_editor_opened",
            Self::CheckpointDraftChanged(_) => "checkpoint_draft_changed",
            Self::CheckpointLocationPicked { .. } => "checkpoint_location_picked",
            Self::CheckpointSaveRequested => "checkpoint_save_requested",
            Self::CheckpointDeleteRequested { .. } => "checkpoint_delete_requested",
            Self::AnalyticsFilterChanged(_) => "analytics_filter_changed",
            Self::AnalyticsRebuildRequested => "analytics_rebuild_requested",
            Self::ResolvedFilterChanged(_) => "resolved_filter_changed",
            Self::ExportRequested { .. } => "export_requested",
            Self::DownloadTaken => "download_taken",
            Self::DismissError => "dismiss_error",
            Self::DismissToast => "dismiss_toast",
        }
    }

    /// Events that come straight from a user gesture. Any of them counts as
    /// the interaction that unlocks audible cues.
    #[must_use]
    pub const fn is_user_initiated(&self) -> bool {
        matches!(
            self,
            Self::UserInteracted
                | Self::LoginSubmitted(_)
                | Self::LogoutRequested
                | Self::Navigate(_)
                | Self::ModalClosed
                | Self::ReportFilterChanged(_)
                | Self::RefreshRequested
                | Self::ReportSelected { .. }
                | Self::StatusUpdateSubmitted { .. }
                | Self::DirectionsRequested { .. }
                | Self::MediaUploadRequested { .. }
                | Self::ChatOpened { .. }
                | Self::ChatSendRequested
                | Self::ReportScopeChanged(_)
                | Self::CheckpointScopeChanged(_)
                | Self::MapClicked { .. }
                | Self::CheckpointEditorOpened { .. }
                | Self::CheckpointLocationPicked { .. }
                | Self::CheckpointSaveRequested
                | Self::CheckpointDeleteRequested { .. }
                | Self::AnalyticsFilterChanged(_)
                | Self::AnalyticsRebuildRequested
                | Self::ResolvedFilterChanged(_)
                | Self::ExportRequested { .. }
                | Self::DismissError
                | Self::DismissToast
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_login_form_debug_redacts_password() {
        let event = Event::LoginSubmitted(LoginForm {
            email: "desk@station.ph".into(),
            password: "hunter2".into(),
        });
        let rendered = format!("{event:?}");
        assert!(rendered.contains("desk@station.ph"));
        assert!(!rendered.contains("hunter2"));
    }

    #[test]
    fn test_background_events_are_not_interactions() {
        assert!(!Event::Noop.is_user_initiated());
        assert!(!Event::AppStarted { now_ms: 0 }.is_user_initiated());
        assert!(Event::RefreshRequested.is_user_initiated());
        assert_eq!(Event::ChatSendRequested.name(), "chat_send_requested");
    }
}
