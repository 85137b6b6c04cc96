//! The update loop: turns events into model changes and effect requests.

use tracing::{debug, info, warn};

use crate::api::{ApiCall, ExportKind, FetchOrigin};
use crate::capabilities::{
    Capabilities, HttpResponse, HttpResult, KvReadResult, KvWrite, KvWriteResult,
};
use crate::chat::ChatThread;
use crate::domain::{GeocodedAddress, Report, ReportFilter, ReportStatus};
use crate::event::{Event, LoginForm};
use crate::geo::Coordinate;
use crate::mappers::{
    map_category_breakdown, map_checkpoint, map_geocode, map_live_map, map_location_hotspots,
    map_media, map_media_list, map_message, map_messages, map_overview, map_report, map_reports,
    map_resolved_case, map_route, CheckpointDraft,
};
use crate::model::{CheckpointEditor, Modal, Model, PendingDownload, Phase, ToastKind};
use crate::polling::{Feed, PollChannel};
use crate::session::{GateAction, Hydration, Session, StoredEntry};
use crate::view::{self, Screen, ViewModel};
use crate::wire::{
    self, CategoryBreakdownDto, CheckpointDto, GeocodeDto, Listing, LocationHotspotsDto,
    MapDataDto, MediaDto, MessageDto, OverviewDto, RefreshResponse, ReportDto, ResolvedCasesDto,
    RouteDto,
};
use crate::{backend_detail, AppError, AppResult, CheckpointId, ErrorKind, ReportId};

#[derive(Default)]
pub struct App;

impl App {
    fn storage_written(result: KvWriteResult) -> Event {
        Event::StorageWritten(Box::new(result))
    }

    fn write_storage(writes: Vec<KvWrite>, caps: &Capabilities) {
        for write in writes {
            write.send(&caps.key_value, Self::storage_written);
        }
    }

    // --- session lifecycle ---

    fn start_hydration(model: &mut Model, caps: &Capabilities) {
        model.hydration = Some(Hydration::default());
        for entry in StoredEntry::ALL {
            match entry.key() {
                Ok(key) => key.read(&caps.key_value, move |result| Event::StoredEntryLoaded {
                    entry,
                    result: Box::new(result),
                }),
                Err(e) => {
                    warn!(error = %e, "could not read stored session");
                    model.hydration = None;
                    model.phase = Phase::SignedOut;
                    return;
                }
            }
        }
    }

    fn handle_stored_entry(
        entry: StoredEntry,
        result: KvReadResult,
        model: &mut Model,
        caps: &Capabilities,
    ) {
        let Some(hydration) = model.hydration.as_mut() else {
            debug!(entry = entry.key_name(), "stored entry arrived after startup");
            return;
        };
        let Some(restored) = hydration.record(entry, result) else {
            return;
        };
        model.hydration = None;

        match restored {
            Ok(Some(session)) => {
                info!(role = session.user().role.as_str(), "resumed stored session");
                Self::establish_session(session, model, caps);
            }
            Ok(None) => {
                model.phase = Phase::SignedOut;
            }
            Err(e) => {
                warn!(error = %e, "stored session unreadable, clearing it");
                Self::clear_stored_session(caps);
                model.phase = Phase::SignedOut;
            }
        }
    }

    fn submit_login(form: LoginForm, model: &mut Model, caps: &Capabilities) {
        if model.phase == Phase::SigningIn {
            return;
        }
        let email = form.email.trim().to_string();
        if email.is_empty() || form.password.is_empty() {
            model.set_error(AppError::new(
                ErrorKind::Validation,
                "Email and password are required.",
            ));
            return;
        }
        let Some(endpoints) = model.endpoints.as_ref() else {
            model.set_error(AppError::new(
                ErrorKind::InvalidState,
                "The dashboard is not configured.",
            ));
            return;
        };

        let request = wire::LoginRequest {
            email,
            password: form.password,
            role: None,
        };
        match endpoints.login(&request) {
            Ok(http_request) => {
                model.clear_error();
                model.phase = Phase::SigningIn;
                http_request.send(&caps.http, |result| Event::LoginResponse(Box::new(result)));
            }
            Err(e) => model.set_error(e),
        }
    }

    fn handle_login_response(result: HttpResult, model: &mut Model, caps: &Capabilities) {
        if model.phase != Phase::SigningIn {
            debug!("login response arrived after the attempt was abandoned");
            return;
        }

        let outcome = match result {
            Ok(response) if response.is_success() => response
                .json::<wire::LoginResponse>()
                .map_err(AppError::from)
                .and_then(|body| Session::from_login(&body)),
            Ok(response) => Err(Self::login_failure(&response)),
            Err(e) => Err(e.into()),
        };

        match outcome {
            Ok(session) => {
                match session.persist_writes() {
                    Ok(writes) => Self::write_storage(writes, caps),
                    Err(e) => warn!(error = %e, "could not persist session"),
                }
                info!(role = session.user().role.as_str(), "signed in");
                Self::establish_session(session, model, caps);
            }
            Err(e) => {
                warn!(code = e.code(), "login failed");
                model.phase = Phase::SignedOut;
                model.set_error(e);
            }
        }
    }

    /// Bad credentials come back as 400/401/403 with a `detail` the user
    /// should see as-is.
    fn login_failure(response: &HttpResponse) -> AppError {
        match response.status() {
            400 | 401 | 403 => AppError::new(
                ErrorKind::Validation,
                backend_detail(response.body())
                    .unwrap_or_else(|| "Invalid email or password.".to_string()),
            )
            .with_context("http_status", response.status().to_string()),
            status => AppError::from_http_status(status, Some(response.body()), "Account"),
        }
    }

    fn establish_session(session: Session, model: &mut Model, caps: &Capabilities) {
        model.clear_session_data();
        model.session = Some(session);
        model.phase = Phase::SignedIn;
        model.clear_error();

        Self::start_channel(PollChannel::Notifier, model, caps);
        Self::enter_screen(Screen::Dashboard, model, caps);
    }

    fn clear_stored_session(caps: &Capabilities) {
        match Session::teardown_writes() {
            Ok(writes) => Self::write_storage(writes, caps),
            Err(e) => warn!(error = %e, "could not build session teardown"),
        }
    }

    fn sign_out(model: &mut Model, caps: &Capabilities) {
        Self::clear_stored_session(caps);
        model.clear_session_data();
        model.phase = Phase::SignedOut;
        info!("signed out");
    }

    fn force_logout(model: &mut Model, caps: &Capabilities) {
        let dropped = model.refresh_gate.settle().len();
        warn!(dropped, "session could not be renewed, signing out");
        Self::sign_out(model, caps);
        model.set_error(AppError::new(ErrorKind::Authentication, "Session expired."));
    }

    fn start_refresh(model: &mut Model, caps: &Capabilities) {
        let built = match (model.session.as_ref(), model.endpoints.as_ref()) {
            (Some(session), Some(endpoints)) => endpoints.refresh(session.refresh_token()),
            _ => Err(AppError::new(
                ErrorKind::InvalidState,
                "No session to refresh.",
            )),
        };
        match built {
            Ok(request) => {
                debug!("refreshing access token");
                request.send(&caps.http, |result| Event::TokenRefreshed(Box::new(result)));
            }
            Err(e) => {
                warn!(error = %e, "could not start token refresh");
                Self::force_logout(model, caps);
            }
        }
    }

    fn handle_refresh(result: HttpResult, model: &mut Model, caps: &Capabilities) {
        if model.session.is_none() || !model.refresh_gate.is_refreshing() {
            debug!("token refresh settled after sign-out");
            return;
        }

        let refreshed = match result {
            Ok(response) if response.is_success() => {
                response.json::<RefreshResponse>().map_err(AppError::from)
            }
            Ok(response) => Err(AppError::from_http_status(
                response.status(),
                Some(response.body()),
                "Session",
            )),
            Err(e) => Err(e.into()),
        };
        let applied = refreshed.and_then(|body| match model.session.as_mut() {
            Some(session) => session.apply_refresh(&body).map_err(AppError::from),
            None => Err(AppError::new(ErrorKind::InvalidState, "Session ended.")),
        });

        match applied {
            Ok(writes) => {
                Self::write_storage(writes, caps);
                let parked = model.refresh_gate.settle();
                info!(replaying = parked.len(), "access token refreshed");
                for entry in parked {
                    Self::dispatch(entry.call, entry.retried, model, caps);
                }
            }
            Err(e) => {
                warn!(error = %e, "token refresh failed");
                Self::force_logout(model, caps);
            }
        }
    }

    // --- transport ---

    /// Sends an authenticated call, or parks it while a refresh is running.
    fn dispatch(call: ApiCall, retried: bool, model: &mut Model, caps: &Capabilities) {
        if model.refresh_gate.is_refreshing() {
            debug!(call = call.label(), "parked behind token refresh");
            model.refresh_gate.park_pending(call, retried);
            return;
        }

        let built = match (model.session.as_ref(), model.endpoints.as_ref()) {
            (Some(session), Some(endpoints)) => endpoints
                .build(&call, session.access_token())
                .map(|request| (request, session.token_generation())),
            (None, _) => {
                debug!(call = call.label(), "dropping call without a session");
                return;
            }
            (_, None) => Err(AppError::new(
                ErrorKind::InvalidState,
                "The dashboard is not configured.",
            )),
        };

        match built {
            Ok((request, token_generation)) => {
                debug!(call = call.label(), request_id = request.request_id(), "sending");
                request.send(&caps.http, move |result| Event::ApiResponse {
                    call: Box::new(call),
                    retried,
                    token_generation,
                    result: Box::new(result),
                });
            }
            Err(e) => Self::handle_failure(call, e, model),
        }
    }

    fn handle_api_response(
        call: ApiCall,
        retried: bool,
        token_generation: u64,
        result: HttpResult,
        model: &mut Model,
        caps: &Capabilities,
    ) {
        let Some(current_generation) = model.session.as_ref().map(Session::token_generation)
        else {
            debug!(call = call.label(), "response after sign-out ignored");
            return;
        };
        if let Some((feed, seq)) = call.sequence() {
            if !model.sequencer.is_latest(feed, seq) {
                debug!(call = call.label(), seq, "discarding superseded response");
                return;
            }
        }

        match result {
            Err(e) => Self::handle_failure(call, e.into(), model),
            Ok(response) if response.is_unauthorized() => {
                if retried {
                    warn!(call = call.label(), "still unauthorized after refresh");
                    Self::force_logout(model, caps);
                    return;
                }
                if token_generation < current_generation {
                    debug!(call = call.label(), "sent with a replaced token, replaying");
                    Self::dispatch(call, true, model, caps);
                    return;
                }
                match model.refresh_gate.park_unauthorized(call) {
                    GateAction::StartRefresh => Self::start_refresh(model, caps),
                    GateAction::Wait => debug!("waiting on running token refresh"),
                }
            }
            Ok(response) if !response.is_success() => {
                let error = AppError::from_http_status(
                    response.status(),
                    Some(response.body()),
                    call.subject(),
                );
                Self::handle_failure(call, error, model);
            }
            Ok(response) => {
                if let Err(e) = Self::apply_response(&call, response, model, caps) {
                    Self::handle_failure(call, e, model);
                }
            }
        }
    }

    /// Clears whatever the failed call left pending, then surfaces the
    /// error unless the call ran in the background.
    fn handle_failure(call: ApiCall, error: AppError, model: &mut Model) {
        match &call {
            ApiCall::SendMessage {
                report_id, temp_id, ..
            } => {
                if let Some(chat) = model.chat.as_mut().filter(|c| c.report_id() == report_id) {
                    chat.fail(temp_id);
                }
            }
            ApiCall::UpdateStatus { .. } => model.status_update_pending = false,
            ApiCall::CreateCheckpoint { .. } | ApiCall::UpdateCheckpoint { .. } => {
                if let Some(editor) = model.checkpoint_editor.as_mut() {
                    editor.saving = false;
                }
            }
            ApiCall::UploadMedia { .. } => model.uploading_media = false,
            ApiCall::Export { .. } => model.exporting = None,
            ApiCall::RebuildAnalytics => model.analytics_rebuilding = false,
            ApiCall::ActiveReports {
                feed: Feed::DashboardReports,
                ..
            } => model.reports_loading = false,
            ApiCall::MapData { .. } => model.map_loading = false,
            _ => {}
        }

        let silent = call.is_background()
            || matches!(
                call,
                ApiCall::ActiveReports {
                    feed: Feed::NotifierReports,
                    ..
                } | ApiCall::ReverseGeocode { .. }
            );
        if silent {
            warn!(call = call.label(), error = %error, "background request failed");
            return;
        }

        let error = match (&call, error.kind) {
            (ApiCall::RebuildAnalytics, ErrorKind::Conflict) => AppError::new(
                ErrorKind::Conflict,
                "An analytics update is already running.",
            ),
            _ => error,
        };
        warn!(call = call.label(), code = error.code(), "request failed");
        model.set_error(error);
    }

    fn apply_response(
        call: &ApiCall,
        response: HttpResponse,
        model: &mut Model,
        caps: &Capabilities,
    ) -> AppResult<()> {
        let origin = model.office_coordinate();
        let eta = model.config.eta;

        match call {
            ApiCall::ActiveReports {
                feed: Feed::NotifierReports,
                ..
            } => {
                let rows: Listing<ReportDto> = response.json()?;
                let active = rows.into_vec().into_iter().filter_map(|dto| {
                    let terminal = dto
                        .status
                        .as_deref()
                        .and_then(ReportStatus::from_wire)
                        .is_some_and(ReportStatus::is_terminal);
                    (!terminal).then(|| ReportId::new(dto.report_id))
                });
                let fresh = model.detector.observe(active);
                if !fresh.is_empty() {
                    info!(count = fresh.len(), "new reports arrived");
                    if model.detector.can_play_cue() {
                        caps.alert
                            .new_reports(fresh.iter().map(ToString::to_string).collect());
                    } else {
                        debug!("cue held until the user interacts");
                    }
                }
            }
            ApiCall::ActiveReports { .. } => {
                let rows: Listing<ReportDto> = response.json()?;
                model.reports = map_reports(rows.into_vec(), origin, &eta);
                model.reports_loading = false;
            }
            ApiCall::ReportDetail { report_id, .. } => {
                let report = map_report(response.json::<ReportDto>()?, origin, &eta)?;
                if &report.id == report_id {
                    model.selected_report = Some(report);
                }
            }
            ApiCall::UpdateStatus {
                report_id, status, ..
            } => {
                model.status_update_pending = false;
                let updated = response
                    .json::<ReportDto>()
                    .ok()
                    .and_then(|dto| map_report(dto, origin, &eta).ok())
                    .filter(|r| &r.id == report_id);
                Self::apply_local_status(model, report_id, *status, updated);
                model.show_toast(format!("Status updated to {status}."), ToastKind::Success);
                if model.scheduler.is_active(PollChannel::Dashboard) {
                    Self::fetch_channel(PollChannel::Dashboard, FetchOrigin::Explicit, model, caps);
                }
            }
            ApiCall::Route { report_id } => {
                let to = model
                    .find_report(report_id)
                    .and_then(|r| r.location.coordinate);
                model.route = Some(map_route(response.json::<RouteDto>()?, origin, to, &eta));
            }
            ApiCall::Messages { report_id, .. } => {
                let rows: Listing<MessageDto> = response.json()?;
                if let Some(chat) = model.chat.as_mut().filter(|c| c.report_id() == report_id) {
                    chat.merge_server(map_messages(rows.into_vec()));
                }
            }
            ApiCall::SendMessage {
                report_id, temp_id, ..
            } => {
                let message = map_message(response.json::<MessageDto>()?);
                if let Some(chat) = model.chat.as_mut().filter(|c| c.report_id() == report_id) {
                    chat.confirm(temp_id, message);
                }
            }
            ApiCall::ResolvedCases { .. } => {
                let body: ResolvedCasesDto = response.json()?;
                let cases: Vec<_> = body.results.into_iter().map(map_resolved_case).collect();
                model.resolved_count = body.count.max(cases.len() as u64);
                model.resolved_cases = cases;
            }
            ApiCall::Media { report_id, .. } => {
                let rows: Listing<MediaDto> = response.json()?;
                if Self::viewing_report(model, report_id) {
                    model.media = map_media_list(rows.into_vec());
                }
            }
            ApiCall::UploadMedia { report_id, .. } => {
                model.uploading_media = false;
                let attachment = map_media(response.json::<MediaDto>()?)?;
                if Self::viewing_report(model, report_id) {
                    model.media.push(attachment);
                }
                model.show_toast("Media uploaded.", ToastKind::Success);
            }
            ApiCall::Checkpoints { .. } => {
                let rows: Listing<CheckpointDto> = response.json()?;
                model.checkpoints = rows.into_vec().into_iter().map(map_checkpoint).collect();
            }
            ApiCall::CreateCheckpoint { .. } | ApiCall::UpdateCheckpoint { .. } => {
                let checkpoint = map_checkpoint(response.json::<CheckpointDto>()?);
                match model.checkpoints.iter_mut().find(|c| c.id == checkpoint.id) {
                    Some(slot) => *slot = checkpoint,
                    None => model.checkpoints.push(checkpoint),
                }
                model.checkpoint_editor = None;
                if model.modal == Some(Modal::CheckpointEditor) {
                    model.modal = None;
                }
                model.show_toast("Checkpoint saved.", ToastKind::Success);
                Self::refresh_live_map(model, caps);
            }
            ApiCall::DeleteCheckpoint { checkpoint_id } => {
                model.checkpoints.retain(|c| &c.id != checkpoint_id);
                model.live_map.checkpoints.retain(|c| &c.id != checkpoint_id);
                model.show_toast("Checkpoint deleted.", ToastKind::Success);
            }
            ApiCall::MapData { .. } => {
                model.live_map = map_live_map(response.json::<MapDataDto>()?, origin, &eta);
                model.map_loading = false;
            }
            ApiCall::ReverseGeocode { coordinate } => {
                let address = map_geocode(response.json::<GeocodeDto>()?);
                model
                    .geocode_cache
                    .put(coordinate.cache_key(), address.clone());
                Self::use_geocode(*coordinate, address, model);
            }
            ApiCall::AnalyticsOverview { .. } => {
                model.overview = Some(map_overview(response.json::<OverviewDto>()?));
            }
            ApiCall::LocationHotspots { .. } => {
                model.location_hotspots =
                    Some(map_location_hotspots(response.json::<LocationHotspotsDto>()?));
            }
            ApiCall::CategoryHotspots { .. } => {
                model.category_breakdown =
                    Some(map_category_breakdown(response.json::<CategoryBreakdownDto>()?));
            }
            ApiCall::Export {
                kind, report_id, ..
            } => {
                model.exporting = None;
                let content_type = response
                    .header("content-type")
                    .unwrap_or("application/pdf")
                    .to_string();
                model.pending_download = Some(PendingDownload {
                    kind: *kind,
                    file_name: kind.file_name(report_id.as_ref()),
                    content_type,
                    bytes: response.into_body(),
                });
                model.show_toast("Export ready.", ToastKind::Success);
            }
            ApiCall::RebuildAnalytics => {
                model.analytics_rebuilding = false;
                let message = backend_detail(response.body())
                    .unwrap_or_else(|| "Analytics updated.".to_string());
                model.show_toast(message, ToastKind::Success);
                Self::fetch_analytics(model, caps);
            }
        }
        Ok(())
    }

    /// Reflects a confirmed status change everywhere the report is shown,
    /// until the next poll replaces it.
    fn apply_local_status(
        model: &mut Model,
        report_id: &ReportId,
        status: ReportStatus,
        updated: Option<Report>,
    ) {
        let apply = |report: &mut Report| {
            if &report.id != report_id {
                return;
            }
            match &updated {
                Some(fresh) => *report = fresh.clone(),
                None => report.status = status,
            }
        };
        model.reports.iter_mut().for_each(apply);
        model.live_map.reports.iter_mut().for_each(apply);
        if let Some(selected) = model.selected_report.as_mut() {
            apply(selected);
        }
    }

    fn viewing_report(model: &Model, report_id: &ReportId) -> bool {
        matches!(&model.modal, Some(Modal::ReportDetails { report_id: open }) if open == report_id)
    }

    // --- polling ---

    fn start_channel(channel: PollChannel, model: &mut Model, caps: &Capabilities) {
        let generation = model.scheduler.start(channel);
        debug!(channel = channel.as_str(), generation, "polling started");
        Self::fetch_channel(channel, FetchOrigin::Initial, model, caps);
        Self::arm(channel, generation, model, caps);
    }

    fn arm(channel: PollChannel, generation: u64, model: &Model, caps: &Capabilities) {
        let millis = model.config.poll.for_channel(channel);
        caps.timer.after(millis, move |output| Event::PollTick {
            channel,
            generation,
            output,
        });
    }

    fn fetch_channel(
        channel: PollChannel,
        origin: FetchOrigin,
        model: &mut Model,
        caps: &Capabilities,
    ) {
        let call = match channel {
            PollChannel::Notifier => ApiCall::ActiveReports {
                feed: Feed::NotifierReports,
                // The watch never surfaces errors, even on its first fetch.
                origin: FetchOrigin::Poll,
                filter: ReportFilter::default(),
                seq: model.sequencer.issue(Feed::NotifierReports),
            },
            PollChannel::Dashboard => {
                if origin != FetchOrigin::Poll {
                    model.reports_loading = true;
                }
                ApiCall::ActiveReports {
                    feed: Feed::DashboardReports,
                    origin,
                    filter: model.report_filter,
                    seq: model.sequencer.issue(Feed::DashboardReports),
                }
            }
            PollChannel::LiveMap => {
                if origin != FetchOrigin::Poll {
                    model.map_loading = true;
                }
                ApiCall::MapData {
                    scope: model.map_scope,
                    origin,
                    seq: model.sequencer.issue(Feed::LiveMap),
                }
            }
            PollChannel::Chat => {
                let Some(report_id) = model.chat.as_ref().map(|c| c.report_id().clone()) else {
                    return;
                };
                ApiCall::Messages {
                    report_id,
                    origin,
                    seq: model.sequencer.issue(Feed::Messages),
                }
            }
        };
        Self::dispatch(call, false, model, caps);
    }

    fn handle_poll_tick(
        channel: PollChannel,
        generation: u64,
        now_ms: u64,
        model: &mut Model,
        caps: &Capabilities,
    ) -> bool {
        if !model.scheduler.accepts(channel, generation) {
            debug!(channel = channel.as_str(), generation, "stale poll timer ignored");
            return false;
        }
        model.now_ms = now_ms;
        Self::fetch_channel(channel, FetchOrigin::Poll, model, caps);
        Self::arm(channel, generation, model, caps);
        true
    }

    // --- screens and modals ---

    fn enter_screen(screen: Screen, model: &mut Model, caps: &Capabilities) {
        Self::close_modal(model);
        model.scheduler.stop(PollChannel::Dashboard);
        model.scheduler.stop(PollChannel::LiveMap);
        model.screen = screen;

        match screen {
            Screen::Dashboard => Self::start_channel(PollChannel::Dashboard, model, caps),
            Screen::LiveMap => {
                Self::start_channel(PollChannel::LiveMap, model, caps);
                Self::fetch_checkpoints(model, caps);
            }
            Screen::Analytics => Self::fetch_analytics(model, caps),
            Screen::ResolvedCases => Self::fetch_resolved(FetchOrigin::Initial, model, caps),
        }
    }

    fn open_modal(modal: Modal, model: &mut Model) {
        Self::close_modal(model);
        model.modal = Some(modal);
    }

    fn close_modal(model: &mut Model) {
        match model.modal.take() {
            Some(Modal::Chat { .. }) => {
                model.scheduler.stop(PollChannel::Chat);
                model.sequencer.invalidate(Feed::Messages);
                model.chat = None;
            }
            Some(Modal::ReportDetails { .. }) => {
                model.sequencer.invalidate(Feed::ReportDetail);
                model.sequencer.invalidate(Feed::Media);
                model.selected_report = None;
                model.media.clear();
            }
            Some(Modal::Directions { .. }) => model.route = None,
            Some(Modal::CheckpointEditor) => model.checkpoint_editor = None,
            None => {}
        }
    }

    fn fetch_checkpoints(model: &mut Model, caps: &Capabilities) {
        let seq = model.sequencer.issue(Feed::Checkpoints);
        Self::dispatch(
            ApiCall::Checkpoints {
                active_only: false,
                seq,
            },
            false,
            model,
            caps,
        );
    }

    fn refresh_live_map(model: &mut Model, caps: &Capabilities) {
        if model.scheduler.is_active(PollChannel::LiveMap) {
            Self::fetch_channel(PollChannel::LiveMap, FetchOrigin::Explicit, model, caps);
        }
    }

    fn fetch_analytics(model: &mut Model, caps: &Capabilities) {
        let filter = model.analytics_filter.clone();
        let calls = [
            ApiCall::AnalyticsOverview {
                filter: filter.clone(),
                seq: model.sequencer.issue(Feed::AnalyticsOverview),
            },
            ApiCall::LocationHotspots {
                filter: filter.clone(),
                seq: model.sequencer.issue(Feed::LocationHotspots),
            },
            ApiCall::CategoryHotspots {
                filter,
                seq: model.sequencer.issue(Feed::CategoryHotspots),
            },
        ];
        for call in calls {
            Self::dispatch(call, false, model, caps);
        }
    }

    fn fetch_resolved(origin: FetchOrigin, model: &mut Model, caps: &Capabilities) {
        let call = ApiCall::ResolvedCases {
            filter: model.resolved_filter.clone(),
            origin,
            seq: model.sequencer.issue(Feed::ResolvedCases),
        };
        Self::dispatch(call, false, model, caps);
    }

    // --- map and checkpoints ---

    fn reverse_geocode(coordinate: Coordinate, model: &mut Model, caps: &Capabilities) {
        if let Some(hit) = model.geocode_cache.get(&coordinate.cache_key()).cloned() {
            debug!("reverse geocode served from cache");
            Self::use_geocode(coordinate, hit, model);
            return;
        }
        Self::dispatch(ApiCall::ReverseGeocode { coordinate }, false, model, caps);
    }

    /// Records the lookup and fills an empty checkpoint location when the
    /// editor is pointed at the same spot.
    fn use_geocode(coordinate: Coordinate, address: GeocodedAddress, model: &mut Model) {
        if let Some(editor) = model.checkpoint_editor.as_mut() {
            let same_spot = editor.draft.latitude == Some(coordinate.lat())
                && editor.draft.longitude == Some(coordinate.lng());
            if same_spot && editor.draft.location.trim().is_empty() {
                editor.draft.location = address.full_address.clone();
            }
        }
        model.last_geocode = Some((coordinate, address));
    }

    fn open_checkpoint_editor(checkpoint_id: Option<CheckpointId>, model: &mut Model) {
        let draft = match &checkpoint_id {
            None => CheckpointDraft::default(),
            Some(id) => {
                let existing = model
                    .checkpoints
                    .iter()
                    .chain(model.live_map.checkpoints.iter())
                    .find(|c| &c.id == id);
                match existing {
                    Some(checkpoint) => CheckpointDraft::from_checkpoint(checkpoint),
                    None => {
                        model.set_error(AppError::new(
                            ErrorKind::NotFound,
                            "Checkpoint not found.",
                        ));
                        return;
                    }
                }
            }
        };
        Self::open_modal(Modal::CheckpointEditor, model);
        model.checkpoint_editor = Some(CheckpointEditor {
            editing: checkpoint_id,
            draft,
            saving: false,
        });
    }

    fn save_checkpoint(model: &mut Model, caps: &Capabilities) {
        let Some(editor) = model.checkpoint_editor.as_ref() else {
            return;
        };
        if editor.saving {
            return;
        }
        let office = model.session.as_ref().and_then(Session::office_id).cloned();
        let call = match editor.draft.to_payload(office.as_ref()) {
            Ok(payload) => match editor.editing.clone() {
                Some(checkpoint_id) => ApiCall::UpdateCheckpoint {
                    checkpoint_id,
                    payload,
                },
                None => ApiCall::CreateCheckpoint { payload },
            },
            Err(e) => {
                model.set_error(e);
                return;
            }
        };
        if let Some(editor) = model.checkpoint_editor.as_mut() {
            editor.saving = true;
        }
        Self::dispatch(call, false, model, caps);
    }

    // --- report actions ---

    fn select_report(report_id: ReportId, model: &mut Model, caps: &Capabilities) {
        Self::open_modal(
            Modal::ReportDetails {
                report_id: report_id.clone(),
            },
            model,
        );
        model.selected_report = model.find_report(&report_id).cloned();
        let detail = ApiCall::ReportDetail {
            report_id: report_id.clone(),
            seq: model.sequencer.issue(Feed::ReportDetail),
        };
        let media = ApiCall::Media {
            report_id,
            seq: model.sequencer.issue(Feed::Media),
        };
        Self::dispatch(detail, false, model, caps);
        Self::dispatch(media, false, model, caps);
    }

    fn open_chat(report_id: ReportId, model: &mut Model, caps: &Capabilities) {
        let reporter = model
            .find_report(&report_id)
            .and_then(|r| r.reporter_user_id().cloned());
        Self::open_modal(
            Modal::Chat {
                report_id: report_id.clone(),
            },
            model,
        );
        model.chat = Some(ChatThread::new(report_id, reporter));
        Self::start_channel(PollChannel::Chat, model, caps);
    }

    fn send_chat(model: &mut Model, caps: &Capabilities) {
        let Some(sender_id) = model
            .session
            .as_ref()
            .map(|s| s.user().user_id.to_string())
        else {
            return;
        };
        let now_ms = model.now_ms;
        let Some(chat) = model.chat.as_mut() else {
            return;
        };
        match chat.begin_send(&sender_id, now_ms) {
            Ok(Some((temp_id, message))) => {
                let report_id = chat.report_id().clone();
                Self::dispatch(
                    ApiCall::SendMessage {
                        report_id,
                        temp_id,
                        message,
                    },
                    false,
                    model,
                    caps,
                );
            }
            Ok(None) => {}
            Err(e) => model.set_error(e),
        }
    }

    fn request_export(
        kind: ExportKind,
        report_id: Option<ReportId>,
        model: &mut Model,
        caps: &Capabilities,
    ) {
        if model.exporting.is_some() {
            return;
        }
        let filter = match kind {
            ExportKind::Analytics => model.analytics_filter.clone(),
            ExportKind::ResolvedCases => model.resolved_filter.clone(),
            ExportKind::Report => Default::default(),
        };
        model.exporting = Some(kind);
        Self::dispatch(
            ApiCall::Export {
                kind,
                filter,
                report_id,
            },
            false,
            model,
            caps,
        );
    }
}

impl crux_core::App for App {
    type Event = Event;
    type Model = Model;
    type ViewModel = ViewModel;
    type Capabilities = Capabilities;

    fn update(&self, event: Event, model: &mut Model, caps: &Capabilities) {
        let event_name = event.name();
        if event.is_user_initiated() {
            model.detector.mark_interaction();
            debug!(event = event_name, "user action");
        }
        let mut render = !matches!(
            event,
            Event::Noop | Event::UserInteracted | Event::StorageWritten(_)
        );

        match event {
            Event::Noop | Event::UserInteracted => {}

            Event::Configure(config) => {
                match config
                    .validate()
                    .map_err(AppError::from)
                    .and_then(|c| model.apply_config(c))
                {
                    Ok(()) => info!(base = %model.config.api_base_url, "configured"),
                    Err(e) => {
                        warn!(error = %e, "rejected configuration");
                        model.set_error(e);
                    }
                }
            }

            Event::AppStarted { now_ms } => {
                model.now_ms = now_ms;
                model.phase = Phase::Starting;
                Self::start_hydration(model, caps);
            }

            Event::StoredEntryLoaded { entry, result } => {
                Self::handle_stored_entry(entry, *result, model, caps);
            }

            Event::StorageWritten(result) => {
                if let Err(e) = *result {
                    warn!(error = %e, "session storage write failed");
                }
            }

            Event::LoginSubmitted(form) => Self::submit_login(form, model, caps),
            Event::LoginResponse(result) => Self::handle_login_response(*result, model, caps),
            Event::LogoutRequested => {
                Self::sign_out(model, caps);
                model.clear_error();
            }
            Event::TokenRefreshed(result) => Self::handle_refresh(*result, model, caps),

            Event::ApiResponse {
                call,
                retried,
                token_generation,
                result,
            } => Self::handle_api_response(*call, retried, token_generation, *result, model, caps),

            Event::PollTick {
                channel,
                generation,
                output,
            } => {
                render = Self::handle_poll_tick(channel, generation, output.now_ms(), model, caps);
            }

            Event::Navigate(screen) => {
                if model.is_signed_in() {
                    Self::enter_screen(screen, model, caps);
                }
            }

            Event::ModalClosed => Self::close_modal(model),

            Event::ReportFilterChanged(filter) => {
                model.report_filter = filter;
                if model.scheduler.is_active(PollChannel::Dashboard) {
                    Self::fetch_channel(PollChannel::Dashboard, FetchOrigin::Explicit, model, caps);
                }
            }

            Event::RefreshRequested => match model.screen {
                Screen::Dashboard => {
                    Self::fetch_channel(PollChannel::Dashboard, FetchOrigin::Explicit, model, caps);
                }
                Screen::LiveMap => {
                    Self::refresh_live_map(model, caps);
                    Self::fetch_checkpoints(model, caps);
                }
                Screen::Analytics => Self::fetch_analytics(model, caps),
                Screen::ResolvedCases => Self::fetch_resolved(FetchOrigin::Explicit, model, caps),
            },

            Event::ReportSelected { report_id } => Self::select_report(report_id, model, caps),

            Event::StatusUpdateSubmitted {
                report_id,
                status,
                remarks,
            } => {
                if !model.status_update_pending {
                    model.status_update_pending = true;
                    Self::dispatch(
                        ApiCall::UpdateStatus {
                            report_id,
                            status,
                            remarks: remarks.trim().to_string(),
                        },
                        false,
                        model,
                        caps,
                    );
                }
            }

            Event::DirectionsRequested { report_id } => {
                Self::open_modal(
                    Modal::Directions {
                        report_id: report_id.clone(),
                    },
                    model,
                );
                Self::dispatch(ApiCall::Route { report_id }, false, model, caps);
            }

            Event::MediaUploadRequested { report_id, upload } => {
                if model.uploading_media {
                    return;
                }
                let sender_id = model
                    .session
                    .as_ref()
                    .map(|s| s.user().user_id.to_string())
                    .unwrap_or_default();
                match upload.validate(&model.media) {
                    Ok(kind) => {
                        model.uploading_media = true;
                        Self::dispatch(
                            ApiCall::UploadMedia {
                                report_id,
                                kind,
                                sender_id,
                                upload,
                            },
                            false,
                            model,
                            caps,
                        );
                    }
                    Err(e) => model.set_error(e.into()),
                }
            }

            Event::ChatOpened { report_id } => Self::open_chat(report_id, model, caps),
            Event::ChatDraftChanged(text) => {
                if let Some(chat) = model.chat.as_mut() {
                    chat.set_draft(text);
                }
            }
            Event::ChatSendRequested => Self::send_chat(model, caps),

            Event::ReportScopeChanged(scope) => {
                model.map_scope.reports = scope;
                Self::refresh_live_map(model, caps);
            }
            Event::CheckpointScopeChanged(scope) => {
                model.map_scope.checkpoints = scope;
                Self::refresh_live_map(model, caps);
            }

            Event::MapClicked { lat, lng } => match Coordinate::new(lat, lng) {
                Ok(coordinate) => Self::reverse_geocode(coordinate, model, caps),
                Err(e) => model.set_error(e.into()),
            },

            Event::CheckpointEditorOpened { checkpoint_id } => {
                Self::open_checkpoint_editor(checkpoint_id, model);
            }
            Event::CheckpointDraftChanged(draft) => {
                if let Some(editor) = model.checkpoint_editor.as_mut().filter(|e| !e.saving) {
                    editor.draft = draft;
                }
            }
            Event::CheckpointLocationPicked { lat, lng } => {
                match Coordinate::new(lat, lng) {
                    Ok(coordinate) => {
                        if let Some(editor) = model.checkpoint_editor.as_mut() {
                            editor.draft.latitude = Some(coordinate.lat());
                            editor.draft.longitude = Some(coordinate.lng());
                        }
                        Self::reverse_geocode(coordinate, model, caps);
                    }
                    Err(e) => model.set_error(e.into()),
                }
            }
            Event::CheckpointSaveRequested => Self::save_checkpoint(model, caps),
            Event::CheckpointDeleteRequested { checkpoint_id } => {
                Self::dispatch(
                    ApiCall::DeleteCheckpoint { checkpoint_id },
                    false,
                    model,
                    caps,
                );
            }

            Event::AnalyticsFilterChanged(filter) => {
                model.analytics_filter = filter;
                Self::fetch_analytics(model, caps);
            }
            Event::AnalyticsRebuildRequested => {
                if !model.is_admin() {
                    model.set_error(AppError::new(
                        ErrorKind::Authorization,
                        "Only administrators can rebuild analytics.",
                    ));
                } else if !model.analytics_rebuilding {
                    model.analytics_rebuilding = true;
                    Self::dispatch(ApiCall::RebuildAnalytics, false, model, caps);
                }
            }
            Event::ResolvedFilterChanged(filter) => {
                model.resolved_filter = filter;
                Self::fetch_resolved(FetchOrigin::Explicit, model, caps);
            }
            Event::ExportRequested { kind, report_id } => {
                Self::request_export(kind, report_id, model, caps);
            }
            Event::DownloadTaken => model.pending_download = None,

            Event::DismissError => model.clear_error(),
            Event::DismissToast => model.active_toast = None,
        }

        if render {
            caps.render.render();
        }
    }

    fn view(&self, model: &Model) -> ViewModel {
        view::build(model)
    }
}
