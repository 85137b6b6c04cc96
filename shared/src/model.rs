use std::num::NonZeroUsize;

use lru::LruCache;
use serde::{Deserialize, Serialize};

use crate::api::{ApiCall, Endpoints, ExportKind};
use crate::chat::ChatThread;
use crate::config::DashboardConfig;
use crate::domain::{
    AnalyticsFilter, AnalyticsOverview, CategoryBreakdown, Checkpoint, GeocodedAddress,
    LiveMapData, LocationHotspots, MapScope, MediaAttachment, Report, ReportFilter,
    ResolvedCase, RouteInfo,
};
use crate::geo::Coordinate;
use crate::mappers::CheckpointDraft;
use crate::polling::{NewReportDetector, PollScheduler, Sequencer};
use crate::schedule::TimeOfDay;
use crate::session::{Hydration, RefreshGate, Session};
use crate::view::Screen;
use crate::{AppError, CheckpointId, ReportId, DEFAULT_GEOCODE_CACHE_CAPACITY};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum Phase {
    /// Waiting for stored credentials to be read.
    #[default]
    Starting,
    SignedOut,
    SigningIn,
    SignedIn,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Modal {
    ReportDetails { report_id: ReportId },
    Chat { report_id: ReportId },
    Directions { report_id: ReportId },
    CheckpointEditor,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct CheckpointEditor {
    /// `None` while creating a new checkpoint.
    pub editing: Option<CheckpointId>,
    pub draft: CheckpointDraft,
    pub saving: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingDownload {
    pub kind: ExportKind,
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ToastMessage {
    pub message: String,
    pub kind: ToastKind,
    pub created_at_ms: u64,
    pub duration_ms: u64,
}

impl ToastMessage {
    #[must_use]
    pub fn new(message: impl Into<String>, kind: ToastKind, now_ms: u64) -> Self {
        Self {
            message: message.into(),
            kind,
            created_at_ms: now_ms,
            duration_ms: kind.default_duration_ms(),
        }
    }

    #[must_use]
    pub fn is_expired(&self, now_ms: u64) -> bool {
        now_ms.saturating_sub(self.created_at_ms) > self.duration_ms
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ToastKind {
    #[default]
    Info,
    Success,
    Warning,
    Error,
}

impl ToastKind {
    #[must_use]
    pub const fn default_duration_ms(self) -> u64 {
        match self {
            Self::Info => 3000,
            Self::Success => 2000,
            Self::Warning => 4000,
            Self::Error => 5000,
        }
    }
}

pub struct Model {
    pub config: DashboardConfig,
    pub endpoints: Option<Endpoints>,
    pub phase: Phase,
    pub session: Option<Session>,
    /// Present while the stored session is being read back on startup.
    pub hydration: Option<Hydration>,
    pub refresh_gate: RefreshGate<ApiCall>,
    pub scheduler: PollScheduler,
    pub sequencer: Sequencer,
    pub detector: NewReportDetector,
    /// Wall clock as last reported by the shell.
    pub now_ms: u64,

    pub screen: Screen,
    pub modal: Option<Modal>,

    pub report_filter: ReportFilter,
    pub reports: Vec<Report>,
    pub reports_loading: bool,
    pub selected_report: Option<Report>,
    pub media: Vec<MediaAttachment>,
    pub uploading_media: bool,
    pub status_update_pending: bool,
    pub route: Option<RouteInfo>,
    pub chat: Option<ChatThread>,

    pub map_scope: MapScope,
    pub live_map: LiveMapData,
    pub map_loading: bool,
    pub checkpoints: Vec<Checkpoint>,
    pub checkpoint_editor: Option<CheckpointEditor>,
    pub geocode_cache: LruCache<(i64, i64), GeocodedAddress>,
    pub last_geocode: Option<(Coordinate, GeocodedAddress)>,

    pub analytics_filter: AnalyticsFilter,
    pub overview: Option<AnalyticsOverview>,
    pub location_hotspots: Option<LocationHotspots>,
    pub category_breakdown: Option<CategoryBreakdown>,
    pub analytics_rebuilding: bool,
    pub resolved_filter: AnalyticsFilter,
    pub resolved_cases: Vec<ResolvedCase>,
    pub resolved_count: u64,
    pub exporting: Option<ExportKind>,
    pub pending_download: Option<PendingDownload>,

    pub active_error: Option<AppError>,
    pub active_toast: Option<ToastMessage>,
}

impl Default for Model {
    fn default() -> Self {
        let config = DashboardConfig::default();
        let endpoints = config
            .base_url()
            .ok()
            .map(Endpoints::new);
        Self {
            geocode_cache: LruCache::new(geocode_capacity(config.geocode_cache_capacity)),
            config,
            endpoints,
            phase: Phase::default(),
            session: None,
            hydration: None,
            refresh_gate: RefreshGate::new(),
            scheduler: PollScheduler::new(),
            sequencer: Sequencer::new(),
            detector: NewReportDetector::new(),
            now_ms: 0,
            screen: Screen::default(),
            modal: None,
            report_filter: ReportFilter::default(),
            reports: Vec::new(),
            reports_loading: false,
            selected_report: None,
            media: Vec::new(),
            uploading_media: false,
            status_update_pending: false,
            route: None,
            chat: None,
            map_scope: MapScope::default(),
            live_map: LiveMapData::default(),
            map_loading: false,
            checkpoints: Vec::new(),
            checkpoint_editor: None,
            last_geocode: None,
            analytics_filter: AnalyticsFilter::default(),
            overview: None,
            location_hotspots: None,
            category_breakdown: None,
            analytics_rebuilding: false,
            resolved_filter: AnalyticsFilter::default(),
            resolved_cases: Vec::new(),
            resolved_count: 0,
            exporting: None,
            pending_download: None,
            active_error: None,
            active_toast: None,
        }
    }
}

fn geocode_capacity(requested: usize) -> NonZeroUsize {
    NonZeroUsize::new(requested)
        .or_else(|| NonZeroUsize::new(DEFAULT_GEOCODE_CACHE_CAPACITY))
        .unwrap_or(NonZeroUsize::MIN)
}

impl Model {
    /// Installs validated settings. The geocode cache is rebuilt only when
    /// its capacity changed.
    pub fn apply_config(&mut self, config: DashboardConfig) -> Result<(), AppError> {
        let base = config.base_url()?;
        self.endpoints = Some(Endpoints::new(base));
        let capacity = geocode_capacity(config.geocode_cache_capacity);
        if self.geocode_cache.cap() != capacity {
            self.geocode_cache.resize(capacity);
        }
        self.config = config;
        Ok(())
    }

    pub fn set_error(&mut self, error: AppError) {
        self.active_error = Some(error);
    }

    pub fn clear_error(&mut self) {
        self.active_error = None;
    }

    pub fn show_toast(&mut self, message: impl Into<String>, kind: ToastKind) {
        self.active_toast = Some(ToastMessage::new(message, kind, self.now_ms));
    }

    #[must_use]
    pub fn is_signed_in(&self) -> bool {
        self.phase == Phase::SignedIn && self.session.is_some()
    }

    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.session.as_ref().is_some_and(|s| s.user().is_admin())
    }

    /// Local time of day used for checkpoint schedules.
    #[must_use]
    pub fn local_time(&self) -> TimeOfDay {
        TimeOfDay::at(self.now_ms, self.config.utc_offset_minutes)
    }

    #[must_use]
    pub fn office_coordinate(&self) -> Option<Coordinate> {
        self.session.as_ref().and_then(Session::office_coordinate)
    }

    /// Looks a report up wherever it is currently loaded.
    #[must_use]
    pub fn find_report(&self, report_id: &ReportId) -> Option<&Report> {
        self.selected_report
            .as_ref()
            .filter(|r| &r.id == report_id)
            .or_else(|| self.reports.iter().find(|r| &r.id == report_id))
            .or_else(|| self.live_map.reports.iter().find(|r| &r.id == report_id))
    }

    /// Drops everything tied to the signed-in user.
    pub fn clear_session_data(&mut self) {
        self.session = None;
        self.refresh_gate.clear();
        self.scheduler.stop_all();
        self.sequencer.reset();
        self.detector.reset();
        self.modal = None;
        self.reports.clear();
        self.selected_report = None;
        self.media.clear();
        self.uploading_media = false;
        self.status_update_pending = false;
        self.route = None;
        self.chat = None;
        self.live_map = LiveMapData::default();
        self.checkpoints.clear();
        self.checkpoint_editor = None;
        self.last_geocode = None;
        self.overview = None;
        self.location_hotspots = None;
        self.category_breakdown = None;
        self.analytics_rebuilding = false;
        self.resolved_cases.clear();
        self.resolved_count = 0;
        self.exporting = None;
        self.pending_download = None;
        self.active_toast = None;
        self.screen = Screen::default();
    }
}
