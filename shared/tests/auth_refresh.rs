mod common;

use common::*;
use serde_json::json;
use shared::event::LoginForm;
use shared::model::Phase;
use shared::{ErrorKind, Event, Model};

#[test]
fn test_login_starts_session_and_polling() {
    let app = Tester::default();
    let mut model = Model::default();

    let mut effects = sign_in(&app, &mut model);
    assert_eq!(model.phase, Phase::SignedIn);
    assert!(renders(&effects));

    assert_eq!(
        kv_sets(&effects),
        vec!["session:access_token", "session:refresh_token", "session:user"]
    );
    assert!(kv_deletes(&effects).is_empty());

    // Notifier and dashboard each arm a timer and fetch immediately.
    assert_eq!(timers(&mut effects).len(), 2);
    let requests = http_requests(effects);
    assert_eq!(requests.len(), 2);
    assert!(requests.iter().all(|r| path(r) == "reports/"));
    assert!(requests.iter().all(|r| bearer(r) == Some("access-1")));
}

#[test]
fn test_login_rejected_shows_backend_detail() {
    let app = Tester::default();
    let mut model = Model::default();
    app.update(Event::Configure(test_config()), &mut model);

    let effects = app
        .update(
            Event::LoginSubmitted(LoginForm {
                email: "desk@station10.ph".into(),
                password: "wrong".into(),
            }),
            &mut model,
        )
        .effects;
    assert_eq!(model.phase, Phase::SigningIn);
    let mut login = http_requests(effects).remove(0);
    assert!(bearer(&login).is_none());

    respond_json(
        &app,
        &mut model,
        &mut login,
        401,
        json!({ "detail": "Invalid credentials." }),
    );
    assert_eq!(model.phase, Phase::SignedOut);
    let error = model.active_error.as_ref().expect("login error");
    assert_eq!(error.kind, ErrorKind::Validation);
    assert_eq!(error.message, "Invalid credentials.");
}

#[test]
fn test_blank_credentials_never_reach_backend() {
    let app = Tester::default();
    let mut model = Model::default();
    let effects = app
        .update(
            Event::LoginSubmitted(LoginForm {
                email: "  ".into(),
                password: String::new(),
            }),
            &mut model,
        )
        .effects;
    assert!(http_requests(effects).is_empty());
    assert_eq!(
        model.active_error.as_ref().map(|e| e.kind),
        Some(ErrorKind::Validation)
    );
}

#[test]
fn test_concurrent_unauthorized_share_one_refresh() {
    let app = Tester::default();
    let mut model = Model::default();
    let mut requests = http_requests(sign_in(&app, &mut model));
    let mut first = requests.remove(0);
    let mut second = requests.remove(0);

    let effects = respond_json(&app, &mut model, &mut first, 401, json!({}));
    let mut refreshes = http_requests(effects);
    assert_eq!(refreshes.len(), 1);
    assert_eq!(path(&refreshes[0]), "auth/refresh/");
    assert!(bearer(&refreshes[0]).is_none());

    let effects = respond_json(&app, &mut model, &mut second, 401, json!({}));
    assert!(http_requests(effects).is_empty());
    assert_eq!(model.refresh_gate.parked_len(), 2);

    // Anything issued while the refresh runs waits behind it.
    let effects = app.update(Event::RefreshRequested, &mut model).effects;
    assert!(http_requests(effects).is_empty());
    assert_eq!(model.refresh_gate.parked_len(), 3);

    let effects = respond_json(
        &app,
        &mut model,
        &mut refreshes[0],
        200,
        json!({ "access": "access-2" }),
    );
    assert!(kv_sets(&effects).contains(&"session:access_token".to_string()));
    let replayed = http_requests(effects);
    assert_eq!(replayed.len(), 3);
    assert!(replayed.iter().all(|r| bearer(r) == Some("access-2")));
    assert!(!model.refresh_gate.is_refreshing());
    assert_eq!(
        model.session.as_ref().map(|s| s.access_token().to_string()),
        Some("access-2".to_string())
    );
}

#[test]
fn test_unauthorized_after_refresh_forces_logout() {
    let app = Tester::default();
    let mut model = Model::default();
    let mut requests = http_requests(sign_in(&app, &mut model));
    let mut first = requests.remove(0);
    let mut second = requests.remove(0);

    let mut refresh = http_requests(respond_json(&app, &mut model, &mut first, 401, json!({})))
        .remove(0);
    let mut replayed = http_requests(respond_json(
        &app,
        &mut model,
        &mut refresh,
        200,
        json!({ "access": "access-2", "refresh": "refresh-2" }),
    ));
    assert_eq!(replayed.len(), 1);

    let effects = respond_json(&app, &mut model, &mut replayed[0], 401, json!({}));
    assert_eq!(model.phase, Phase::SignedOut);
    assert!(model.session.is_none());
    assert_eq!(
        model.active_error.as_ref().map(|e| e.kind),
        Some(ErrorKind::Authentication)
    );
    assert_eq!(kv_deletes(&effects).len(), 3);

    // The untouched request resolving late changes nothing.
    let effects = respond_json(&app, &mut model, &mut second, 200, json!([]));
    assert!(http_requests(effects).is_empty());
    assert!(model.reports.is_empty());
}

#[test]
fn test_refresh_rejected_signs_out_and_drops_parked_calls() {
    let app = Tester::default();
    let mut model = Model::default();
    let mut requests = http_requests(sign_in(&app, &mut model));
    let mut first = requests.remove(0);

    let mut refresh = http_requests(respond_json(&app, &mut model, &mut first, 401, json!({})))
        .remove(0);
    let effects = respond_json(
        &app,
        &mut model,
        &mut refresh,
        401,
        json!({ "detail": "Token is invalid or expired" }),
    );

    assert!(http_requests(effects).is_empty());
    assert_eq!(model.phase, Phase::SignedOut);
    assert_eq!(model.refresh_gate.parked_len(), 0);
    assert!(!model.scheduler.is_active(shared::polling::PollChannel::Notifier));
}

#[test]
fn test_logout_clears_stored_session() {
    let app = Tester::default();
    let mut model = Model::default();
    sign_in(&app, &mut model);

    let effects = app.update(Event::LogoutRequested, &mut model).effects;
    assert_eq!(model.phase, Phase::SignedOut);
    assert!(model.active_error.is_none());
    assert!(model.reports.is_empty());
    assert_eq!(kv_deletes(&effects).len(), 3);
    assert!(!app.view(&model).is_authenticated);
}

#[test]
fn test_stale_unauthorized_replays_without_second_refresh() {
    let app = Tester::default();
    let mut model = Model::default();
    let mut requests = http_requests(sign_in(&app, &mut model));
    let mut first = requests.remove(0);
    let mut second = requests.remove(0);
    assert_eq!(bearer(&second), Some("access-1"));

    let mut refresh = http_requests(respond_json(&app, &mut model, &mut first, 401, json!({})))
        .remove(0);
    let replayed = http_requests(respond_json(
        &app,
        &mut model,
        &mut refresh,
        200,
        json!({ "access": "access-2" }),
    ));
    assert_eq!(replayed.len(), 1);
    assert!(!model.refresh_gate.is_refreshing());

    // Sent with access-1 before the refresh finished; the new token is
    // already in hand, so it goes straight back out.
    let effects = respond_json(&app, &mut model, &mut second, 401, json!({}));
    let mut again = http_requests(effects);
    assert!(again.iter().all(|r| path(r) != "auth/refresh/"));
    assert_eq!(again.len(), 1);
    assert_eq!(path(&again[0]), "reports/");
    assert_eq!(bearer(&again[0]), Some("access-2"));
    assert!(!model.refresh_gate.is_refreshing());
    assert_eq!(model.phase, Phase::SignedIn);

    // A replay is only tried once.
    respond_json(&app, &mut model, &mut again[0], 401, json!({}));
    assert_eq!(model.phase, Phase::SignedOut);
}

#[test]
fn test_stored_session_restores_only_when_complete() {
    let app = Tester::default();
    let mut model = Model::default();
    app.update(Event::Configure(test_config()), &mut model);
    let effects = app.update(Event::AppStarted { now_ms: 1_000 }, &mut model).effects;
    assert_eq!(model.phase, Phase::Starting);
    assert_eq!(kv_operations(&effects).len(), 3);

    let partial: Vec<_> = stored_session()
        .into_iter()
        .filter(|(key, _)| key != "session:user")
        .collect();
    let effects = answer_session_reads(&app, &mut model, effects, &partial);
    assert_eq!(model.phase, Phase::SignedOut);
    assert!(model.session.is_none());
    assert_eq!(kv_deletes(&effects).len(), 3);
    assert!(http_requests(effects).is_empty());
}
