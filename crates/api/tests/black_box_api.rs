use chrono::{Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use reqwest::StatusCode;
use serde_json::{Value, json};

use gomeetup_api::app::services::AppServices;
use gomeetup_auth::{AccessClaims, AuthConfig, CredentialHasher, PermissionSet};
use gomeetup_core::UserId;

const SECRET: &str = "test-secret";

struct TestServer {
    base_url: String,
    client: reqwest::Client,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn() -> Self {
        Self::spawn_with(AuthConfig::starter_permissions()).await
    }

    async fn spawn_with(default_permissions: PermissionSet) -> Self {
        // Same router as prod with in-memory stores and cheap hashing.
        let hasher = CredentialHasher::with_params(1024, 1, 1).unwrap();
        let auth = AuthConfig::new(SECRET, Duration::hours(1))
            .with_default_permissions(default_permissions);
        let services = AppServices::in_memory(auth, hasher).unwrap();
        let app = gomeetup_api::app::build_app(services);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}", addr);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url,
            client: reqwest::Client::new(),
            handle,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn register(&self, username: &str, email: &str) -> reqwest::Response {
        self.client
            .post(self.url("/authentication/user"))
            .json(&json!({
                "username": username,
                "password": "pw1",
                "first_name": "Alice",
                "last_name": "Liddell",
                "email": email,
            }))
            .send()
            .await
            .unwrap()
    }

    async fn login(&self, username: &str, password: &str) -> reqwest::Response {
        self.client
            .get(self.url("/authentication/user"))
            .basic_auth(username, Some(password))
            .send()
            .await
            .unwrap()
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn sign(claims: &AccessClaims, secret: &str) -> String {
    jsonwebtoken::encode(
        &Header::new(Algorithm::HS256),
        claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .expect("failed to encode jwt")
}

fn mint(permissions: PermissionSet) -> String {
    let claims = AccessClaims::issue(UserId::new(), permissions, Utc::now(), Duration::minutes(10));
    sign(&claims, SECRET)
}

fn decode(token: &str) -> AccessClaims {
    jsonwebtoken::decode::<AccessClaims>(
        token,
        &DecodingKey::from_secret(SECRET.as_bytes()),
        &Validation::new(Algorithm::HS256),
    )
    .expect("failed to decode jwt")
    .claims
}

#[tokio::test]
async fn health_is_public() {
    let srv = TestServer::spawn().await;
    let res = srv.client.get(srv.url("/health")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn auth_required_for_protected_endpoints() {
    let srv = TestServer::spawn().await;

    for path in ["/whoami", "/events"] {
        let res = srv.client.get(srv.url(path)).send().await.unwrap();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED, "{path}");
        let body: Value = res.json().await.unwrap();
        assert_eq!(body["error_type"], "unauthorized");
    }
}

#[tokio::test]
async fn registered_user_gets_a_snapshot_token() {
    let srv = TestServer::spawn().await;

    let res = srv.register("alice", "a@x.com").await;
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["message"], "User created");

    let res = srv.login("alice", "pw1").await;
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    let token = body["token"].as_str().unwrap().to_string();

    let claims = decode(&token);
    assert_eq!(claims.permissions, PermissionSet::new().with("events", &["read"]));

    let res = srv
        .client
        .get(srv.url("/events"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let res = srv
        .client
        .post(srv.url("/events"))
        .bearer_auth(&token)
        .json(&json!({ "type": "meetup", "name": "Rust night", "creator": "alice" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error_type"], "forbidden");

    let res = srv
        .client
        .get(srv.url("/whoami"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["user_id"], claims.user_id.to_string());
    assert_eq!(body["token_id"], claims.token_id.to_string());
}

#[tokio::test]
async fn login_failures_do_not_reveal_usernames() {
    let srv = TestServer::spawn().await;
    srv.register("alice", "a@x.com").await;

    let wrong_password = srv.login("alice", "nope").await;
    let unknown_user = srv.login("mallory", "pw1").await;

    for res in [wrong_password, unknown_user] {
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            res.headers().get("www-authenticate").unwrap(),
            r#"Basic realm="Authentication required""#
        );
        let body: Value = res.json().await.unwrap();
        assert_eq!(body["error"], "Failed to authorize user");
        assert_eq!(body["error_type"], "unauthorized");
    }
}

#[tokio::test]
async fn login_without_basic_header_is_a_bad_request() {
    let srv = TestServer::spawn().await;

    let res = srv
        .client
        .get(srv.url("/authentication/user"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "BASIC Authorization missing");
}

#[tokio::test]
async fn duplicate_email_is_a_conflict() {
    let srv = TestServer::spawn().await;
    assert_eq!(srv.register("alice", "a@x.com").await.status(), StatusCode::OK);

    let res = srv.register("bob", " A@X.com ").await;
    assert_eq!(res.status(), StatusCode::CONFLICT);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "Duplicate email address");

    // Nothing was persisted for bob.
    assert_eq!(srv.login("bob", "pw1").await.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn duplicate_username_is_a_conflict() {
    let srv = TestServer::spawn().await;
    assert_eq!(srv.register("alice", "a@x.com").await.status(), StatusCode::OK);

    let res = srv.register("alice", "b@x.com").await;
    assert_eq!(res.status(), StatusCode::CONFLICT);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "Duplicate username");
}

#[tokio::test]
async fn invalid_registration_is_rejected() {
    let srv = TestServer::spawn().await;

    let res = srv.register("alice", "not-an-email").await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let res = srv
        .client
        .post(srv.url("/authentication/user"))
        .json(&json!({ "username": "alice" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error_type"], "invalid_request");
}

#[tokio::test]
async fn revoked_token_is_rejected() {
    let srv = TestServer::spawn().await;
    let admin = mint(PermissionSet::new().with("jwt", &["revoke"]));

    let mut victim = AccessClaims::issue(
        UserId::new(),
        PermissionSet::new().with("events", &["read"]),
        Utc::now(),
        Duration::minutes(10),
    );
    victim.token_id = "abc".parse().unwrap();
    let victim = sign(&victim, SECRET);

    let res = srv
        .client
        .get(srv.url("/events"))
        .bearer_auth(&victim)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let res = srv
        .client
        .post(srv.url("/authentication/jwt/revoke/abc"))
        .bearer_auth(&admin)
        .json(&json!({ "reason": "lost" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let entry: Value = res.json().await.unwrap();
    assert_eq!(entry["token_id"], "abc");
    assert_eq!(entry["reason"], "lost");

    let res = srv
        .client
        .get(srv.url("/events"))
        .bearer_auth(&victim)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn revoke_requires_capability_and_accepts_no_body() {
    let srv = TestServer::spawn().await;

    let reader = mint(PermissionSet::new().with("events", &["read"]));
    let res = srv
        .client
        .post(srv.url("/authentication/jwt/revoke/abc"))
        .bearer_auth(&reader)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    let admin = mint(PermissionSet::new().with("jwt", &["revoke"]));
    let res = srv
        .client
        .post(srv.url("/authentication/jwt/revoke/abc"))
        .bearer_auth(&admin)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let entry: Value = res.json().await.unwrap();
    assert!(entry["reason"].is_null());
}

#[tokio::test]
async fn expired_and_foreign_tokens_are_rejected() {
    let srv = TestServer::spawn().await;
    let permissions = PermissionSet::new().with("events", &["read"]);

    let expired = AccessClaims::issue(
        UserId::new(),
        permissions.clone(),
        Utc::now() - Duration::hours(2),
        Duration::hours(1),
    );
    let foreign = AccessClaims::issue(UserId::new(), permissions, Utc::now(), Duration::hours(1));

    for token in [sign(&expired, SECRET), sign(&foreign, "other-secret")] {
        let res = srv
            .client
            .get(srv.url("/events"))
            .bearer_auth(token)
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    }
}

#[tokio::test]
async fn event_lifecycle_create_read_delete() {
    let srv = TestServer::spawn().await;
    let token = mint(PermissionSet::new().with("events", &["*"]));

    let res = srv
        .client
        .post(srv.url("/events"))
        .bearer_auth(&token)
        .json(&json!({
            "type": "meetup",
            "name": "Rust night",
            "creator": "alice",
            "venue": "Room 4",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let created: Value = res.json().await.unwrap();
    let id = created["id"].as_str().unwrap().to_string();
    assert_eq!(created["venue"], "Room 4");

    let res = srv
        .client
        .get(srv.url(&format!("/events/{id}")))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let fetched: Value = res.json().await.unwrap();
    assert_eq!(fetched, created);

    let res = srv
        .client
        .get(srv.url("/events"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    let all: Vec<Value> = res.json().await.unwrap();
    assert_eq!(all.len(), 1);

    let res = srv
        .client
        .delete(srv.url(&format!("/events/{id}")))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    for res in [
        srv.client
            .delete(srv.url(&format!("/events/{id}")))
            .bearer_auth(&token)
            .send()
            .await
            .unwrap(),
        srv.client
            .get(srv.url(&format!("/events/{id}")))
            .bearer_auth(&token)
            .send()
            .await
            .unwrap(),
    ] {
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
    }
}

#[tokio::test]
async fn malformed_event_requests_are_bad_requests() {
    let srv = TestServer::spawn().await;
    let token = mint(PermissionSet::new().with("events", &["*"]));

    let res = srv
        .client
        .get(srv.url("/events/not-a-uuid"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "Invalid event id");

    let res = srv
        .client
        .post(srv.url("/events"))
        .bearer_auth(&token)
        .json(&json!({ "type": "meetup", "creator": "alice" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "name is required");
}

#[tokio::test]
async fn configured_defaults_reach_gated_operations_with_a_real_login() {
    let granted = PermissionSet::new()
        .with("events", &["read", "create", "delete"])
        .with("jwt", &["revoke"]);
    let srv = TestServer::spawn_with(granted.clone()).await;
    assert_eq!(srv.register("alice", "a@x.com").await.status(), StatusCode::OK);

    let body: Value = srv.login("alice", "pw1").await.json().await.unwrap();
    let token = body["token"].as_str().unwrap().to_string();
    let claims = decode(&token);
    assert_eq!(claims.permissions, granted);

    let res = srv
        .client
        .post(srv.url("/events"))
        .bearer_auth(&token)
        .json(&json!({ "type": "meetup", "name": "Rust night", "creator": "alice" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let created: Value = res.json().await.unwrap();
    let id = created["id"].as_str().unwrap().to_string();

    let res = srv
        .client
        .delete(srv.url(&format!("/events/{id}")))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let res = srv
        .client
        .post(srv.url(&format!("/authentication/jwt/revoke/{}", claims.token_id)))
        .bearer_auth(&token)
        .json(&json!({ "reason": "logout" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let res = srv
        .client
        .get(srv.url("/events"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn malformed_revoke_body_is_a_bad_request() {
    let srv = TestServer::spawn().await;
    let admin = mint(PermissionSet::new().with("jwt", &["revoke"]));

    let res = srv
        .client
        .post(srv.url("/authentication/jwt/revoke/abc"))
        .bearer_auth(&admin)
        .header("content-type", "application/json")
        .body(r#"{"reason":"#)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error_type"], "invalid_request");

    // Nothing was recorded: a token with that id is still accepted.
    let mut claims = AccessClaims::issue(
        UserId::new(),
        PermissionSet::new().with("events", &["read"]),
        Utc::now(),
        Duration::minutes(10),
    );
    claims.token_id = "abc".parse().unwrap();
    let res = srv
        .client
        .get(srv.url("/events"))
        .bearer_auth(sign(&claims, SECRET))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}
