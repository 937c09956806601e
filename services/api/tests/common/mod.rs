#![allow(dead_code)]

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use chrono::Utc;
use std::sync::Arc;
use tower::ServiceExt;
use tyr_api::app::{AppState, build_router};
use tyr_api::auth::TokenService;
use tyr_api::auth::password::hash_password;
use tyr_api::config::{AzureConfig, JwtConfig};
use tyr_api::model::{User, UserStatus, new_id};
use tyr_api::ocr::AzureClient;
use tyr_api::store::UserStore;
use tyr_api::store::memory::InMemoryStore;
use tyr_authz::{Enforcer, Role};

pub const PASSWORD: &str = "correct-horse";

pub async fn read_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    serde_json::from_slice(&bytes).expect("json")
}

pub struct TestApp {
    pub router: Router,
    pub store: InMemoryStore,
}

impl TestApp {
    /// App whose analyzer points at `endpoint`; tests that never upload can
    /// pass an unreachable address.
    pub fn new(endpoint: &str) -> Self {
        let store = InMemoryStore::new();
        let shared = Arc::new(store.clone());
        let analyzer = AzureClient::new(
            &AzureConfig {
                endpoint: endpoint.to_string(),
                secret: "test-key".to_string(),
                timeout_ms: 5_000,
            },
            shared.clone(),
        )
        .expect("analyzer");
        let tokens = TokenService::new(&JwtConfig {
            secret: "integration-secret".to_string(),
            access_ttl_seconds: 300,
            refresh_ttl_seconds: 3_600,
        });
        let state = AppState::new(
            shared,
            Enforcer::seeded().expect("seed policies"),
            tokens,
            Arc::new(analyzer),
        );
        Self {
            router: build_router(state),
            store,
        }
    }

    pub fn offline() -> Self {
        Self::new("http://127.0.0.1:1")
    }

    pub async fn send(&self, request: Request<Body>) -> axum::response::Response {
        self.router.clone().oneshot(request).await.expect("response")
    }

    pub async fn seed_user(&self, email: &str, role: Role, status: UserStatus) -> User {
        let now = Utc::now();
        self.store
            .create_user(User {
                id: new_id(),
                first_name: "Test".to_string(),
                last_name: role.as_str().to_string(),
                email: email.to_string(),
                phone: "0123456789".to_string(),
                role,
                status,
                password_hash: hash_password(PASSWORD).expect("hash"),
                last_login: None,
                created_at: now,
                updated_at: now,
                deleted_at: None,
            })
            .await
            .expect("seed user")
    }

    /// Log in with the shared test password and return the token body.
    pub async fn login(&self, email: &str) -> serde_json::Value {
        let response = self
            .send(crate::http_helpers::json_request(
                "POST",
                "/v1/auth/login",
                serde_json::json!({
                    "email": email,
                    "password": PASSWORD,
                    "grant_type": "app",
                }),
            ))
            .await;
        assert_eq!(response.status(), StatusCode::OK, "login {email}");
        read_json(response).await
    }

    pub async fn access_token(&self, email: &str) -> String {
        self.login(email).await["access_token"]
            .as_str()
            .expect("access token")
            .to_string()
    }
}
