#![allow(dead_code)]

use crux_core::testing::AppTester;
use crux_core::Request;
use crux_http::protocol::{HttpRequest, HttpResponse, HttpResult};
use crux_kv::value::Value as StoredValue;
use crux_kv::{KeyValueOperation, KeyValueResponse, KeyValueResult};
use serde_json::{json, Value};
use shared::capabilities::{KvWrite, TimerOperation, TimerOutput};
use shared::event::LoginForm;
use shared::geo::Coordinate;
use shared::session::{Role, Session, SessionUser};
use shared::{App, DashboardConfig, Effect, Event, Model, OfficeId, UserId};

pub type Tester = AppTester<App, Effect>;

pub const API_BASE: &str = "https://dispatch.test/api/";

pub fn http_requests(effects: Vec<Effect>) -> Vec<Request<HttpRequest>> {
    effects
        .into_iter()
        .filter_map(|e| match e {
            Effect::Http(request) => Some(request),
            _ => None,
        })
        .collect()
}

pub fn timers(effects: &mut Vec<Effect>) -> Vec<Request<TimerOperation>> {
    let mut timers = Vec::new();
    let mut rest = Vec::new();
    for effect in effects.drain(..) {
        match effect {
            Effect::Timer(request) => timers.push(request),
            other => rest.push(other),
        }
    }
    *effects = rest;
    timers
}

pub fn kv_operations(effects: &[Effect]) -> Vec<KeyValueOperation> {
    effects
        .iter()
        .filter_map(|e| match e {
            Effect::KeyValue(request) => Some(request.operation.clone()),
            _ => None,
        })
        .collect()
}

/// Keys written by `Set` operations, in order.
pub fn kv_sets(effects: &[Effect]) -> Vec<String> {
    kv_operations(effects)
        .into_iter()
        .filter_map(|op| match op {
            KeyValueOperation::Set { key, .. } => Some(key),
            _ => None,
        })
        .collect()
}

/// Keys removed by `Delete` operations, in order.
pub fn kv_deletes(effects: &[Effect]) -> Vec<String> {
    kv_operations(effects)
        .into_iter()
        .filter_map(|op| match op {
            KeyValueOperation::Delete { key } => Some(key),
            _ => None,
        })
        .collect()
}

pub fn alerts(effects: &[Effect]) -> Vec<Vec<String>> {
    effects
        .iter()
        .filter_map(|e| match e {
            Effect::Alert(request) => match &request.operation {
                shared::capabilities::AlertOperation::NewReports { report_ids } => {
                    Some(report_ids.clone())
                }
            },
            _ => None,
        })
        .collect()
}

pub fn renders(effects: &[Effect]) -> bool {
    effects.iter().any(|e| matches!(e, Effect::Render(_)))
}

pub fn inner(request: &Request<HttpRequest>) -> &HttpRequest {
    &request.operation
}

/// Path relative to the API root, including any query.
pub fn path(request: &Request<HttpRequest>) -> &str {
    request.operation.url.trim_start_matches(API_BASE)
}

pub fn header<'a>(request: &'a Request<HttpRequest>, name: &str) -> Option<&'a str> {
    request
        .operation
        .headers
        .iter()
        .find(|h| h.name.eq_ignore_ascii_case(name))
        .map(|h| h.value.as_str())
}

pub fn bearer(request: &Request<HttpRequest>) -> Option<&str> {
    header(request, "authorization").and_then(|v| v.strip_prefix("Bearer "))
}

pub fn body_json(request: &Request<HttpRequest>) -> Value {
    serde_json::from_slice(&request.operation.body).expect("json body")
}

pub fn take_path(requests: &mut Vec<Request<HttpRequest>>, prefix: &str) -> Request<HttpRequest> {
    let index = requests
        .iter()
        .position(|r| path(r).starts_with(prefix))
        .unwrap_or_else(|| panic!("no request for {prefix}"));
    requests.remove(index)
}

/// Resolves a request and feeds every resulting event back through the app.
pub fn resolve_http(
    app: &Tester,
    model: &mut Model,
    request: &mut Request<HttpRequest>,
    response: HttpResponse,
) -> Vec<Effect> {
    let update = app
        .resolve(request, HttpResult::Ok(response))
        .expect("http resolves");
    let mut effects = update.effects;
    for event in update.events {
        effects.extend(app.update(event, model).effects);
    }
    effects
}

pub fn respond_json(
    app: &Tester,
    model: &mut Model,
    request: &mut Request<HttpRequest>,
    status: u16,
    body: Value,
) -> Vec<Effect> {
    let response = HttpResponse::status(status).json(&body).build();
    resolve_http(app, model, request, response)
}

pub fn respond_bytes(
    app: &Tester,
    model: &mut Model,
    request: &mut Request<HttpRequest>,
    content_type: &str,
    body: Vec<u8>,
) -> Vec<Effect> {
    let response = HttpResponse::ok()
        .header("Content-Type", content_type)
        .body(body)
        .build();
    resolve_http(app, model, request, response)
}

pub fn fire_timer(
    app: &Tester,
    model: &mut Model,
    timer: &mut Request<TimerOperation>,
    now_ms: u64,
) -> Vec<Effect> {
    let update = app
        .resolve(timer, TimerOutput::Fired { now_ms })
        .expect("timer resolves");
    let mut effects = update.effects;
    for event in update.events {
        effects.extend(app.update(event, model).effects);
    }
    effects
}

pub fn report_json(id: &str, status: &str) -> Value {
    json!({
        "report_id": id,
        "category": "Robbery",
        "status": status,
        "created_at": "2024-05-01T08:00:00Z",
        "latitude": 14.61,
        "longitude": 121.01,
        "description": "Bag snatched near the terminal",
        "reporter_full_name": "Ana Reyes",
        "incident_address": "EDSA corner Aurora"
    })
}

pub fn login_body() -> Value {
    json!({
        "message": "Login successful",
        "role": "police",
        "access": "access-1",
        "refresh": "refresh-1",
        "user": {
            "office_id": "office-1",
            "office_name": "Station 10",
            "email": "desk@station10.ph",
            "latitude": 14.6,
            "longitude": 121.0
        }
    })
}

pub fn test_config() -> DashboardConfig {
    DashboardConfig {
        api_base_url: API_BASE.to_string(),
        ..DashboardConfig::default()
    }
}

pub fn police_user() -> SessionUser {
    SessionUser {
        role: Role::Police,
        user_id: UserId::new("office-1"),
        office_id: Some(OfficeId::new("office-1")),
        display_name: "Station 10".into(),
        email: Some("desk@station10.ph".into()),
        head_officer: None,
        contact_number: None,
        city: Some("Quezon City".into()),
        barangay: None,
        office_coordinate: Coordinate::new(14.6, 121.0).ok(),
    }
}

/// Answers the startup reads from `stored`, keyed by raw storage key.
/// Keys missing from `stored` read back as absent.
pub fn answer_session_reads(
    app: &Tester,
    model: &mut Model,
    effects: Vec<Effect>,
    stored: &[(String, Vec<u8>)],
) -> Vec<Effect> {
    let mut out = Vec::new();
    for effect in effects {
        let Effect::KeyValue(mut read) = effect else {
            out.push(effect);
            continue;
        };
        let KeyValueOperation::Get { key } = &read.operation else {
            continue;
        };
        let value = stored
            .iter()
            .find(|(k, _)| k == key)
            .map_or(StoredValue::None, |(_, v)| StoredValue::Bytes(v.clone()));
        let update = app
            .resolve(
                &mut read,
                KeyValueResult::Ok {
                    response: KeyValueResponse::Get { value },
                },
            )
            .expect("kv resolves");
        out.extend(update.effects);
        for event in update.events {
            out.extend(app.update(event, model).effects);
        }
    }
    out
}

pub fn stored_session() -> Vec<(String, Vec<u8>)> {
    Session::new("access-1".into(), "refresh-1".into(), police_user())
        .persist_writes()
        .expect("persist writes")
        .into_iter()
        .filter_map(|write| match write {
            KvWrite::Set { key, value } => Some((key.raw(), value)),
            KvWrite::Delete { .. } => None,
        })
        .collect()
}

/// Starts the app with a stored session, the way a page reload does. No
/// user gesture is involved.
pub fn restore_session(app: &Tester, model: &mut Model) -> Vec<Effect> {
    app.update(Event::Configure(test_config()), model);
    let effects = app.update(Event::AppStarted { now_ms: 1_000 }, model).effects;
    answer_session_reads(app, model, effects, &stored_session())
}

/// Signs in as a police office and returns the effects produced by the
/// successful login response.
pub fn sign_in(app: &Tester, model: &mut Model) -> Vec<Effect> {
    app.update(Event::Configure(test_config()), model);
    let effects = app
        .update(
            Event::LoginSubmitted(LoginForm {
                email: "desk@station10.ph".into(),
                password: "correct horse".into(),
            }),
            model,
        )
        .effects;
    let mut requests = http_requests(effects);
    let mut login = take_path(&mut requests, "auth/login/");
    respond_json(app, model, &mut login, 200, login_body())
}
