#![allow(clippy::unwrap_used)]
// Integration tests for `Session` using wiremock.

use std::time::Duration;

use serde_json::json;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use unifly_guest::{
    CancelReason, Error, GuestLimits, RequestContext, Session, SessionState, TransportConfig,
};

// ── Helpers ─────────────────────────────────────────────────────────

const SESSION_COOKIE: &str = "unifises=abc123; Path=/; HttpOnly";

async fn setup() -> (MockServer, Session) {
    let server = MockServer::start().await;
    let session = Session::new(
        &server.uri(),
        "",
        "admin",
        "test-password".to_string().into(),
        &TransportConfig::default(),
    )
    .unwrap();
    (server, session)
}

fn ok_envelope() -> serde_json::Value {
    json!({ "meta": { "rc": "ok" }, "data": [] })
}

async fn mount_login(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/api/login"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("set-cookie", SESSION_COOKIE)
                .set_body_json(ok_envelope()),
        )
        .mount(server)
        .await;
}

// ── Login ───────────────────────────────────────────────────────────

#[tokio::test]
async fn test_login_sends_credentials_and_stores_cookie() {
    let (server, mut session) = setup().await;

    Mock::given(method("POST"))
        .and(path("/api/login"))
        .and(header("accept", "*/*"))
        .and(header("content-type", "application/json"))
        .and(body_json(json!({
            "username": "admin",
            "password": "test-password",
        })))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("set-cookie", SESSION_COOKIE)
                .set_body_json(ok_envelope()),
        )
        .expect(1)
        .mount(&server)
        .await;

    let ctx = RequestContext::new();
    let resp = session.login(&ctx).await.unwrap();

    assert_eq!(resp.status(), 200);
    assert!(resp.envelope().unwrap().is_ok());
    assert_eq!(session.state(), SessionState::LoggedIn);
    assert_eq!(session.cookie_header().as_deref(), Some("unifises=abc123"));
}

#[tokio::test]
async fn test_login_failure() {
    let (server, mut session) = setup().await;

    Mock::given(method("POST"))
        .and(path("/api/login"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "meta": { "rc": "error", "msg": "api.err.Invalid" },
            "data": []
        })))
        .mount(&server)
        .await;

    let result = session.login(&RequestContext::new()).await;

    match result {
        Err(Error::Authentication { status, body }) => {
            assert_eq!(status, 400);
            assert_eq!(body, None, "body is only captured in verbose mode");
        }
        other => panic!("expected Authentication error, got: {other:?}"),
    }
    assert_eq!(session.state(), SessionState::NeverLoggedIn);
    assert_eq!(session.cookie_header(), None);
}

#[tokio::test]
async fn test_login_failure_verbose_captures_body() {
    let (server, session) = setup().await;
    let mut session = session.with_verbose(true);

    Mock::given(method("POST"))
        .and(path("/api/login"))
        .respond_with(ResponseTemplate::new(403).set_body_string("Forbidden"))
        .mount(&server)
        .await;

    let err = session.login(&RequestContext::new()).await.unwrap_err();

    assert!(
        matches!(err, Error::Authentication { status: 403, body: Some(ref b) } if b == "Forbidden"),
        "expected Authentication error with body, got: {err:?}"
    );
    assert_eq!(err.status(), Some(403));
}

#[tokio::test]
async fn test_login_non_200_success_status_is_rejected() {
    let (server, mut session) = setup().await;

    Mock::given(method("POST"))
        .and(path("/api/login"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;

    let err = session.login(&RequestContext::new()).await.unwrap_err();
    assert!(matches!(err, Error::Authentication { status: 204, .. }));
}

// ── Cancellation ────────────────────────────────────────────────────

#[tokio::test]
async fn test_login_cancelled_mid_request() {
    let (server, mut session) = setup().await;

    Mock::given(method("POST"))
        .and(path("/api/login"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(30)))
        .mount(&server)
        .await;

    let ctx = RequestContext::new();
    let handle = ctx.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        handle.cancel();
    });

    let result = tokio::time::timeout(Duration::from_secs(5), session.login(&ctx))
        .await
        .expect("login must return promptly after cancellation");

    assert!(matches!(
        result,
        Err(Error::Cancelled(CancelReason::Canceled))
    ));
    assert_eq!(session.state(), SessionState::NeverLoggedIn);
}

#[tokio::test]
async fn test_login_deadline_exceeded() {
    let (server, mut session) = setup().await;

    Mock::given(method("POST"))
        .and(path("/api/login"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(30)))
        .mount(&server)
        .await;

    let ctx = RequestContext::with_timeout(Duration::from_millis(200));
    let result = tokio::time::timeout(Duration::from_secs(5), session.login(&ctx))
        .await
        .expect("login must return promptly after the deadline");

    assert!(matches!(
        result,
        Err(Error::Cancelled(CancelReason::DeadlineExceeded))
    ));
}

#[tokio::test]
async fn test_cancelled_context_sends_nothing() {
    let (server, session) = setup().await;

    let ctx = RequestContext::new();
    ctx.cancel();

    let err = session
        .authorize_guest(&ctx, "aa:bb:cc:dd:ee:ff", 5)
        .await
        .unwrap_err();

    assert!(err.is_cancelled());
    assert!(server.received_requests().await.unwrap().is_empty());
}

// ── Guest authorization ─────────────────────────────────────────────

#[tokio::test]
async fn test_end_to_end_login_authorize_logout() {
    let (server, mut session) = setup().await;
    mount_login(&server).await;

    Mock::given(method("POST"))
        .and(path("/api/s/default/cmd/stamgr"))
        .and(header("cookie", "unifises=abc123"))
        .and(header("accept", "*/*"))
        .and(header("content-type", "application/json"))
        .and(body_json(json!({
            "cmd": "authorize-guest",
            "mac": "aa:bb:cc:dd:ee:ff",
            "minutes": "5",
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(ok_envelope()))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/api/logout"))
        .and(header("cookie", "unifises=abc123"))
        .respond_with(ResponseTemplate::new(200).set_body_json(ok_envelope()))
        .expect(1)
        .mount(&server)
        .await;

    let ctx = RequestContext::with_timeout(Duration::from_secs(5));

    session.login(&ctx).await.unwrap();
    let resp = session
        .authorize_guest(&ctx, "aa:bb:cc:dd:ee:ff", 5)
        .await
        .unwrap();
    assert!(resp.envelope().unwrap().is_ok());
    session.logout(&ctx).await.unwrap();

    assert_eq!(session.state(), SessionState::LoggedOut);

    let logout = server
        .received_requests()
        .await
        .unwrap()
        .into_iter()
        .find(|r| r.url.path() == "/api/logout")
        .unwrap();
    assert!(logout.body.is_empty(), "logout must not send a body");
}

#[tokio::test]
async fn test_authorize_guest_with_limits() {
    let (server, session) = setup().await;

    Mock::given(method("POST"))
        .and(path("/api/s/default/cmd/stamgr"))
        .and(body_json(json!({
            "cmd": "authorize-guest",
            "mac": "11:22:33:44:55:66",
            "minutes": "1440",
            "down": "2048",
            "up": "512",
            "bytes": "1000",
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(ok_envelope()))
        .expect(1)
        .mount(&server)
        .await;

    let limits = GuestLimits {
        down_kbps: 2048,
        up_kbps: 512,
        quota_mb: 1000,
    };
    session
        .authorize_guest_with_limits(&RequestContext::new(), "11:22:33:44:55:66", 1440, limits)
        .await
        .unwrap();
}

#[tokio::test]
async fn test_authorize_guest_uses_explicit_site() {
    let server = MockServer::start().await;
    let session = Session::new(
        &server.uri(),
        "x7k2m9pq",
        "admin",
        "pw".to_string().into(),
        &TransportConfig::default(),
    )
    .unwrap();

    Mock::given(method("POST"))
        .and(path("/api/s/x7k2m9pq/cmd/stamgr"))
        .respond_with(ResponseTemplate::new(200).set_body_json(ok_envelope()))
        .expect(1)
        .mount(&server)
        .await;

    session
        .authorize_guest(&RequestContext::new(), "aa:bb:cc:dd:ee:ff", 30)
        .await
        .unwrap();
}

#[tokio::test]
async fn test_logical_failure_is_not_a_transport_error() {
    let (server, session) = setup().await;

    Mock::given(method("POST"))
        .and(path("/api/s/default/cmd/stamgr"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "meta": { "rc": "error", "msg": "api.err.LoginRequired" },
            "data": []
        })))
        .mount(&server)
        .await;

    // Never logged in: the request goes out without a session cookie.
    let resp = session
        .authorize_guest(&RequestContext::new(), "aa:bb:cc:dd:ee:ff", 5)
        .await
        .unwrap();

    let envelope = resp.envelope().unwrap();
    assert!(!envelope.is_ok());
    assert_eq!(envelope.msg(), Some("api.err.LoginRequired"));

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    assert!(requests[0].headers.get("cookie").is_none());
}

#[tokio::test]
async fn test_command_http_failure() {
    let (server, session) = setup().await;

    Mock::given(method("POST"))
        .and(path("/api/s/default/cmd/stamgr"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let err = session
        .authorize_guest(&RequestContext::new(), "aa:bb:cc:dd:ee:ff", 5)
        .await
        .unwrap_err();

    assert!(
        matches!(err, Error::Command { status: 401, .. }),
        "expected Command error, got: {err:?}"
    );
}

#[tokio::test]
async fn test_command_does_not_touch_cookies() {
    let (server, mut session) = setup().await;
    mount_login(&server).await;

    Mock::given(method("POST"))
        .and(path("/api/s/default/cmd/stamgr"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("set-cookie", "unifises=from-command; Path=/")
                .set_body_json(ok_envelope()),
        )
        .mount(&server)
        .await;

    let ctx = RequestContext::new();
    session.login(&ctx).await.unwrap();
    session
        .authorize_guest(&ctx, "aa:bb:cc:dd:ee:ff", 5)
        .await
        .unwrap();

    assert_eq!(session.cookie_header().as_deref(), Some("unifises=abc123"));
}

#[tokio::test]
async fn test_command_http_failure_verbose_captures_body() {
    let (server, session) = setup().await;
    let session = session.with_verbose(true);

    Mock::given(method("POST"))
        .and(path("/api/s/default/cmd/stamgr"))
        .respond_with(ResponseTemplate::new(500).set_body_string("Internal Server Error"))
        .mount(&server)
        .await;

    let err = session
        .authorize_guest(&RequestContext::new(), "aa:bb:cc:dd:ee:ff", 5)
        .await
        .unwrap_err();

    assert!(
        matches!(err, Error::Command { status: 500, body: Some(ref b) } if b == "Internal Server Error"),
        "expected Command error with body, got: {err:?}"
    );
    assert_eq!(err.status(), Some(500));
}

#[tokio::test]
async fn test_cookie_without_path_reaches_api_when_base_has_path() {
    let server = MockServer::start().await;
    let base = format!("{}/manage/site/default", server.uri());
    let mut session = Session::new(
        &base,
        "",
        "admin",
        "test-password".to_string().into(),
        &TransportConfig::default(),
    )
    .unwrap();

    Mock::given(method("POST"))
        .and(path("/api/login"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("set-cookie", "unifises=abc; HttpOnly")
                .set_body_json(ok_envelope()),
        )
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/api/s/default/cmd/stamgr"))
        .and(header("cookie", "unifises=abc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(ok_envelope()))
        .expect(1)
        .mount(&server)
        .await;

    let ctx = RequestContext::new();
    session.login(&ctx).await.unwrap();
    assert_eq!(session.cookie_header().as_deref(), Some("unifises=abc"));

    let resp = session
        .authorize_guest(&ctx, "aa:bb:cc:dd:ee:ff", 5)
        .await
        .unwrap();
    assert!(resp.envelope().unwrap().is_ok());
}

// ── Logout ──────────────────────────────────────────────────────────

#[tokio::test]
async fn test_logout_recaptures_rotated_cookie() {
    let (server, mut session) = setup().await;
    mount_login(&server).await;

    Mock::given(method("POST"))
        .and(path("/api/logout"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("set-cookie", "unifises=rotated; Path=/")
                .set_body_json(ok_envelope()),
        )
        .mount(&server)
        .await;

    let ctx = RequestContext::new();
    session.login(&ctx).await.unwrap();
    session.logout(&ctx).await.unwrap();

    assert_eq!(session.cookie_header().as_deref(), Some("unifises=rotated"));
    assert_eq!(session.state(), SessionState::LoggedOut);
}

#[tokio::test]
async fn test_logout_failure() {
    let (server, mut session) = setup().await;

    Mock::given(method("POST"))
        .and(path("/api/logout"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let err = session.logout(&RequestContext::new()).await.unwrap_err();
    assert!(matches!(err, Error::Authentication { status: 500, .. }));
}

// ── Transport ───────────────────────────────────────────────────────

#[tokio::test]
async fn test_connection_refused_is_transport_error() {
    // Bind then drop a listener so the port is closed.
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    let uri = format!("http://127.0.0.1:{port}");
    let mut session = Session::new(
        &uri,
        "",
        "admin",
        "pw".to_string().into(),
        &TransportConfig::default(),
    )
    .unwrap();

    let err = session.login(&RequestContext::new()).await.unwrap_err();
    assert!(matches!(err, Error::Transport(_)), "got: {err:?}");
}
