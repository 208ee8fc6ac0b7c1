use std::sync::Arc;

use bs_auth::{
    messages, AuthError, Credentials, IdentityGateway, MemoryTokenStore, SessionMachine,
    SessionState, SupabaseConfig, SupabaseGateway, TokenStore, ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY,
};
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const ANON_KEY: &str = "anon-key";

fn gateway(server: &MockServer) -> SupabaseGateway {
    let config = SupabaseConfig::new(&server.uri(), ANON_KEY).unwrap();
    SupabaseGateway::new(config).unwrap()
}

fn credentials() -> Credentials {
    Credentials::new("reader@example.com", "correct horse")
}

fn session_body(access: &str, refresh: &str) -> serde_json::Value {
    json!({
        "access_token": access,
        "token_type": "bearer",
        "expires_in": 3600,
        "refresh_token": refresh,
        "user": { "id": "user-1", "email": "reader@example.com" }
    })
}

#[tokio::test]
async fn sign_in_uses_password_grant_and_keeps_session() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/v1/token"))
        .and(query_param("grant_type", "password"))
        .and(header("apikey", ANON_KEY))
        .and(body_json(json!({ "email": "reader@example.com", "password": "correct horse" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(session_body("at-1", "rt-1")))
        .expect(1)
        .mount(&server)
        .await;

    let gateway = gateway(&server);
    gateway.sign_in(&credentials()).await.unwrap();

    assert_eq!(gateway.current_token().as_deref(), Some("at-1"));
    assert_eq!(gateway.current_refresh_token().as_deref(), Some("rt-1"));
    let user = gateway.session().and_then(|s| s.user).unwrap();
    assert_eq!(user.email.as_deref(), Some("reader@example.com"));
}

#[tokio::test]
async fn sign_in_failure_surfaces_provider_message() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/v1/token"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": "invalid_grant",
            "error_description": "Invalid login credentials"
        })))
        .mount(&server)
        .await;

    let gateway = gateway(&server);
    let err = gateway.sign_in(&credentials()).await.unwrap_err();

    assert_eq!(err.to_string(), "Invalid login credentials");
    assert!(matches!(err, AuthError::Provider { status: Some(s), .. } if s.as_u16() == 400));
    assert_eq!(gateway.current_token(), None);
}

#[tokio::test]
async fn sign_up_pending_confirmation_leaves_no_token() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/v1/signup"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "user-2",
            "email": "reader@example.com",
            "created_at": "2024-05-01T10:00:00Z"
        })))
        .mount(&server)
        .await;

    let gateway = gateway(&server);
    gateway.sign_up(&credentials()).await.unwrap();
    assert_eq!(gateway.current_token(), None);
}

#[tokio::test]
async fn sign_up_error_uses_msg_field() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/v1/signup"))
        .respond_with(ResponseTemplate::new(422).set_body_json(json!({
            "code": 422,
            "msg": "User already registered"
        })))
        .mount(&server)
        .await;

    let err = gateway(&server).sign_up(&credentials()).await.unwrap_err();
    assert_eq!(err.to_string(), "User already registered");
}

#[tokio::test]
async fn non_json_error_body_falls_back_to_text() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/v1/signup"))
        .respond_with(ResponseTemplate::new(502).set_body_string("upstream unavailable"))
        .mount(&server)
        .await;

    let err = gateway(&server).sign_up(&credentials()).await.unwrap_err();
    assert_eq!(err.to_string(), "upstream unavailable");
}

#[tokio::test]
async fn sign_out_revokes_with_bearer_and_drops_session() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/v1/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(session_body("at-1", "rt-1")))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/auth/v1/logout"))
        .and(header("authorization", "Bearer at-1"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let gateway = gateway(&server);
    gateway.sign_in(&credentials()).await.unwrap();
    gateway.sign_out().await.unwrap();
    assert_eq!(gateway.current_token(), None);
}

#[tokio::test]
async fn machine_logout_after_restart_revokes_persisted_session() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/v1/logout"))
        .and(header("authorization", "Bearer at-persisted"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let store = MemoryTokenStore::new();
    store.save(ACCESS_TOKEN_KEY, "at-persisted").await.unwrap();
    store.save(REFRESH_TOKEN_KEY, "rt-persisted").await.unwrap();

    let gateway = Arc::new(gateway(&server));
    let machine = SessionMachine::new(gateway.clone(), Arc::new(store.clone()));
    let terminal = machine.logout().await.unwrap();

    assert_eq!(terminal, SessionState::Idle);
    assert_eq!(gateway.current_token(), None);
    assert!(store.is_empty());
}

#[tokio::test]
async fn machine_logout_with_nothing_stored_skips_remote_call() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/v1/logout"))
        .respond_with(ResponseTemplate::new(204))
        .expect(0)
        .mount(&server)
        .await;

    let machine = SessionMachine::new(Arc::new(gateway(&server)), Arc::new(MemoryTokenStore::new()));
    assert_eq!(machine.logout().await.unwrap(), SessionState::Idle);
}

#[tokio::test]
async fn huge_expires_in_does_not_break_sign_in() {
    let server = MockServer::start().await;
    let mut body = session_body("at-1", "rt-1");
    body["expires_in"] = json!(10_000_000_000_000_000u64);
    Mock::given(method("POST"))
        .and(path("/auth/v1/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(&server)
        .await;

    let gateway = gateway(&server);
    gateway.sign_in(&credentials()).await.unwrap();

    let session = gateway.session().unwrap();
    assert_eq!(session.access_token, "at-1");
    assert_eq!(session.expires_at, None);
}

#[tokio::test]
async fn refresh_without_refresh_token_fails() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/auth/v1/user"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "user-1" })))
        .mount(&server)
        .await;

    let gateway = gateway(&server);
    assert!(matches!(gateway.refresh_session().await, Err(AuthError::NoSession)));

    gateway.retrieve_user("stored-at").await.unwrap();
    assert!(matches!(
        gateway.refresh_session().await,
        Err(AuthError::MissingRefreshToken)
    ));
}

#[tokio::test]
async fn machine_restores_session_end_to_end() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/auth/v1/user"))
        .and(header("authorization", "Bearer stored-at"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "user-1" })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/auth/v1/token"))
        .and(query_param("grant_type", "refresh_token"))
        .and(body_json(json!({ "refresh_token": "stored-rt" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(session_body("fresh-at", "fresh-rt")))
        .expect(1)
        .mount(&server)
        .await;

    let store = MemoryTokenStore::new();
    store.save(ACCESS_TOKEN_KEY, "stored-at").await.unwrap();
    store.save(REFRESH_TOKEN_KEY, "stored-rt").await.unwrap();

    let machine = SessionMachine::new(Arc::new(gateway(&server)), Arc::new(store.clone()));
    let terminal = machine.restore_session().await.unwrap();

    assert_eq!(terminal, SessionState::Success(messages::ALREADY_LOGGED_IN.to_string()));
    assert_eq!(store.get(ACCESS_TOKEN_KEY).await.as_deref(), Some("fresh-at"));
    assert_eq!(store.get(REFRESH_TOKEN_KEY).await.as_deref(), Some("fresh-rt"));
}

#[tokio::test]
async fn machine_login_then_logout_end_to_end() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/v1/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(session_body("at-1", "rt-1")))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/auth/v1/logout"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;

    let store = MemoryTokenStore::new();
    let machine = SessionMachine::new(Arc::new(gateway(&server)), Arc::new(store.clone()));

    let terminal = machine.login(&credentials()).await.unwrap();
    assert_eq!(terminal, SessionState::Success(messages::LOGGED_IN.to_string()));
    assert_eq!(store.get(ACCESS_TOKEN_KEY).await.as_deref(), Some("at-1"));

    let terminal = machine.logout().await.unwrap();
    assert_eq!(terminal, SessionState::Idle);
    assert!(store.is_empty());
}
