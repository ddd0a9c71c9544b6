//! Integration tests for the nutritrack auth client

use std::sync::Arc;

use nutritrack_core::{AuthClient, AuthError, MemoryTokenStore, TokenKey, TokenStore};
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn seeded_store(access: &str, refresh: &str) -> Arc<MemoryTokenStore> {
    let store = Arc::new(MemoryTokenStore::new());
    store.set(TokenKey::Access, access).unwrap();
    store.set(TokenKey::Refresh, refresh).unwrap();
    store
}

fn client_with_store(base_url: &str, store: Arc<MemoryTokenStore>) -> AuthClient {
    AuthClient::builder()
        .base_url(base_url)
        .store(store)
        .build()
        .unwrap()
}

#[tokio::test]
async fn test_login_stores_issued_tokens() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/login"))
        .and(body_json(json!({
            "email": "alice@example.com",
            "password": "hunter22"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "success",
            "message": "Login successful",
            "data": {
                "user": {"id": 12, "name": "Alice", "email": "alice@example.com", "role": "user"},
                "tokens": {"access_token": "acc-abc", "refresh_token": "ref-def"}
            }
        })))
        .mount(&mock_server)
        .await;

    let store = Arc::new(MemoryTokenStore::new());
    let client = client_with_store(&mock_server.uri(), store.clone());

    let outcome = client.login("alice@example.com", "hunter22").await.unwrap();
    assert_eq!(outcome.user.name.as_deref(), Some("Alice"));
    assert_eq!(outcome.tokens.access_token, "acc-abc");

    // The store holds exactly the issued values
    assert_eq!(
        store.get(TokenKey::Access).unwrap().as_deref(),
        Some("acc-abc")
    );
    assert_eq!(
        store.get(TokenKey::Refresh).unwrap().as_deref(),
        Some("ref-def")
    );
}

#[tokio::test]
async fn test_login_overwrites_previous_tokens() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {
                "user": {"id": 1},
                "tokens": {"access_token": "new-acc", "refresh_token": "new-ref"}
            }
        })))
        .mount(&mock_server)
        .await;

    let store = seeded_store("stale-acc", "stale-ref");
    let client = client_with_store(&mock_server.uri(), store.clone());

    client.login("a@example.com", "pw").await.unwrap();
    assert_eq!(
        store.get(TokenKey::Access).unwrap().as_deref(),
        Some("new-acc")
    );
    assert_eq!(
        store.get(TokenKey::Refresh).unwrap().as_deref(),
        Some("new-ref")
    );
}

#[tokio::test]
async fn test_login_failure_carries_server_message() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/login"))
        .respond_with(
            ResponseTemplate::new(401).set_body_json(json!({"error": "Invalid credentials"})),
        )
        .mount(&mock_server)
        .await;

    let store = Arc::new(MemoryTokenStore::new());
    let client = client_with_store(&mock_server.uri(), store.clone());

    let result = client.login("alice@example.com", "wrong").await;
    match result {
        Err(AuthError::LoginFailed(message)) => assert_eq!(message, "Invalid credentials"),
        other => panic!("Expected LoginFailed, got {:?}", other.map(|_| ())),
    }
    // A failed login leaves nothing behind
    assert_eq!(store.get(TokenKey::Access).unwrap(), None);
}

#[tokio::test]
async fn test_request_without_token_makes_no_network_call() {
    let mock_server = MockServer::start().await;

    let client = client_with_store(&mock_server.uri(), Arc::new(MemoryTokenStore::new()));

    let result = client.authenticated_request("/api/meals").await;
    assert!(matches!(result, Err(AuthError::NotAuthenticated)));

    let requests = mock_server.received_requests().await.unwrap();
    assert!(requests.is_empty(), "No network call should have been made");
}

#[tokio::test]
async fn test_request_attaches_bearer_token() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/meals"))
        .and(header("authorization", "Bearer acc-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"meals": []})))
        .mount(&mock_server)
        .await;

    let client = client_with_store(&mock_server.uri(), seeded_store("acc-1", "ref-1"));

    let body = client.authenticated_request("/api/meals").await.unwrap();
    assert_eq!(body["meals"], json!([]));
}

#[tokio::test]
async fn test_401_refresh_retry_succeeds() {
    let mock_server = MockServer::start().await;

    // The expired token gets a 401; the refreshed one gets the data.
    Mock::given(method("GET"))
        .and(path("/api/meals"))
        .and(header("authorization", "Bearer expired-acc"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/meals"))
        .and(header("authorization", "Bearer fresh-acc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"meals": [1, 2]})))
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/auth/refresh"))
        .and(body_json(json!({"refresh_token": "ref-1"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "fresh-acc",
            "refresh_token": "fresh-ref"
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let store = seeded_store("expired-acc", "ref-1");
    let client = client_with_store(&mock_server.uri(), store.clone());

    let body = client.authenticated_request("/api/meals").await.unwrap();
    assert_eq!(body["meals"], json!([1, 2]));

    // The store reflects the rotated pair
    assert_eq!(
        store.get(TokenKey::Access).unwrap().as_deref(),
        Some("fresh-acc")
    );
    assert_eq!(
        store.get(TokenKey::Refresh).unwrap().as_deref(),
        Some("fresh-ref")
    );
}

#[tokio::test]
async fn test_401_with_failing_refresh_expires_session() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/meals"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/auth/refresh"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({"error": "Invalid refresh token"})))
        .mount(&mock_server)
        .await;

    let store = seeded_store("expired-acc", "dead-ref");
    let client = client_with_store(&mock_server.uri(), store.clone());

    let result = client.authenticated_request("/api/meals").await;
    assert!(matches!(result, Err(AuthError::SessionExpired)));

    // Both tokens are gone afterwards
    assert_eq!(store.get(TokenKey::Access).unwrap(), None);
    assert_eq!(store.get(TokenKey::Refresh).unwrap(), None);
}

#[tokio::test]
async fn test_persistent_401_after_refresh_expires_session() {
    let mock_server = MockServer::start().await;

    // Server flaps: refresh succeeds but the new token is still rejected.
    // The retry must be bounded to a single attempt.
    Mock::given(method("GET"))
        .and(path("/api/meals"))
        .respond_with(ResponseTemplate::new(401))
        .expect(2)
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/auth/refresh"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "fresh-acc",
            "refresh_token": "fresh-ref"
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let store = seeded_store("expired-acc", "ref-1");
    let client = client_with_store(&mock_server.uri(), store.clone());

    let result = client.authenticated_request("/api/meals").await;
    assert!(matches!(result, Err(AuthError::SessionExpired)));
    assert_eq!(store.get(TokenKey::Access).unwrap(), None);
}

#[tokio::test]
async fn test_non_401_failure_surfaces_status_and_message() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/meals"))
        .respond_with(
            ResponseTemplate::new(500).set_body_json(json!({"message": "database unavailable"})),
        )
        .mount(&mock_server)
        .await;

    let client = client_with_store(&mock_server.uri(), seeded_store("acc", "ref"));

    match client.authenticated_request("/api/meals").await {
        Err(AuthError::RequestFailed { status, message }) => {
            assert_eq!(status, 500);
            assert_eq!(message, "database unavailable");
        }
        other => panic!("Expected RequestFailed, got {:?}", other.map(|_| ())),
    }
}

#[tokio::test]
async fn test_refresh_without_token_makes_no_network_call() {
    let mock_server = MockServer::start().await;

    let client = client_with_store(&mock_server.uri(), Arc::new(MemoryTokenStore::new()));

    let refreshed = client.refresh().await.unwrap();
    assert!(!refreshed);

    let requests = mock_server.received_requests().await.unwrap();
    assert!(requests.is_empty(), "No network call should have been made");
}

#[tokio::test]
async fn test_refresh_transport_failure_returns_false_and_keeps_tokens() {
    // Nothing listens on this port; the request itself fails
    let store = seeded_store("acc", "ref");
    let client = client_with_store("http://127.0.0.1:9", store.clone());

    let refreshed = client.refresh().await.unwrap();
    assert!(!refreshed);

    // Transport failure is not a rejection; the pair stays put
    assert_eq!(store.get(TokenKey::Access).unwrap().as_deref(), Some("acc"));
    assert_eq!(store.get(TokenKey::Refresh).unwrap().as_deref(), Some("ref"));
}

#[tokio::test]
async fn test_concurrent_refresh_is_single_flight() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/auth/refresh"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "fresh-acc",
            "refresh_token": "fresh-ref"
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let store = seeded_store("expired-acc", "ref-1");
    let client = client_with_store(&mock_server.uri(), store);

    // Both callers report success, but only one request reaches the server
    // (verified by the expect(1) above when the mock server drops).
    let (first, second) = futures::future::join(client.refresh(), client.refresh()).await;
    assert!(first.unwrap());
    assert!(second.unwrap());
}

#[tokio::test]
async fn test_logout_then_request_is_not_authenticated() {
    let mock_server = MockServer::start().await;

    let store = seeded_store("acc", "ref");
    let client = client_with_store(&mock_server.uri(), store.clone());
    assert!(client.is_authenticated());

    client.logout().unwrap();
    assert!(!client.is_authenticated());

    let result = client.authenticated_request("/api/meals").await;
    assert!(matches!(result, Err(AuthError::NotAuthenticated)));
    assert!(mock_server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_logout_is_idempotent() {
    let store = seeded_store("acc", "ref");
    let client = client_with_store("http://localhost:8080", store.clone());

    client.logout().unwrap();
    client.logout().unwrap();

    assert_eq!(store.get(TokenKey::Access).unwrap(), None);
    assert_eq!(store.get(TokenKey::Refresh).unwrap(), None);
}

#[tokio::test]
async fn test_fetch_profile_unwraps_data_envelope() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/auth/profile"))
        .and(header("authorization", "Bearer acc-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {
                "user": {"id": 12, "name": "Alice", "email": "alice@example.com"}
            }
        })))
        .mount(&mock_server)
        .await;

    let client = client_with_store(&mock_server.uri(), seeded_store("acc-1", "ref-1"));

    let user = client.fetch_profile().await.unwrap();
    assert_eq!(user.display_name(), "Alice");
    assert_eq!(user.id, Some(12));
}

#[tokio::test]
async fn test_fetch_profile_accepts_bare_user_object() {
    let mock_server = MockServer::start().await;

    // Some deployments return the claims object without the envelope
    Mock::given(method("GET"))
        .and(path("/api/auth/profile"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "user_id": 12, "email": "alice@example.com", "role": "user"
        })))
        .mount(&mock_server)
        .await;

    let client = client_with_store(&mock_server.uri(), seeded_store("acc-1", "ref-1"));

    let user = client.fetch_profile().await.unwrap();
    assert_eq!(user.email.as_deref(), Some("alice@example.com"));
    assert_eq!(user.role.as_deref(), Some("user"));
}
