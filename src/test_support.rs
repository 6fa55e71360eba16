//! In-process application wired to memory stores, for handler and service tests.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::FromRef,
    http::{header, Request, StatusCode},
    response::Response,
    Router,
};
use tower::ServiceExt;

use crate::admins::repo::{AdminStore, MemoryAdminStore};
use crate::admins::repo_types::{Admin, NewAdmin};
use crate::app::build_app;
use crate::auth::password::hash_password;
use crate::auth::services::AuthService;
use crate::config::AppConfig;
use crate::kv::MemoryKv;
use crate::mail::RecordingMailer;
use crate::state::{processing_client, AppState};
use crate::users::memory::MemoryUserStore;
use crate::users::repo::UserStore;
use crate::users::repo_types::{NewUser, User};

pub struct TestApp {
    pub state: AppState,
    pub users: Arc<MemoryUserStore>,
    pub admins: Arc<MemoryAdminStore>,
    pub kv: Arc<MemoryKv>,
    pub mailer: Arc<RecordingMailer>,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_config(AppConfig::fake())
    }

    pub fn with_processing_url(url: impl Into<String>) -> Self {
        let mut config = AppConfig::fake();
        config.processing.base_url = url.into();
        Self::with_config(config)
    }

    fn with_config(config: AppConfig) -> Self {
        let users = Arc::new(MemoryUserStore::default());
        let admins = Arc::new(MemoryAdminStore::default());
        let kv = Arc::new(MemoryKv::default());
        let mailer = Arc::new(RecordingMailer::default());
        let http = processing_client(config.processing.timeout_secs).unwrap();
        let state = AppState::from_parts(
            Arc::new(config),
            users.clone(),
            admins.clone(),
            kv.clone(),
            mailer.clone(),
            http,
        );
        Self {
            state,
            users,
            admins,
            kv,
            mailer,
        }
    }

    pub fn router(&self) -> Router {
        build_app(self.state.clone())
    }

    pub async fn seed_user(&self, username: &str, password: &str, points: Option<i64>) -> User {
        self.users
            .insert(NewUser {
                username: username.into(),
                email: format!("{username}@example.com"),
                password_hash: hash_password(password).unwrap(),
                email_verified: true,
                points,
            })
            .await
            .unwrap()
    }

    pub async fn seed_admin(&self, username: &str, password: &str) -> Admin {
        self.admins
            .insert(NewAdmin {
                username: username.into(),
                password_hash: hash_password(password).unwrap(),
            })
            .await
            .unwrap()
    }

    pub async fn login_user(&self, username: &str, password: &str) -> String {
        AuthService::from_ref(&self.state)
            .login_user(username, password)
            .await
            .unwrap()
            .access_token
    }

    pub async fn login_admin(&self, username: &str, password: &str) -> String {
        AuthService::from_ref(&self.state)
            .login_admin(username, password)
            .await
            .unwrap()
            .access_token
    }

    /// Runs one request through the full router and decodes the JSON body.
    pub async fn send(&self, request: Request<Body>) -> (StatusCode, serde_json::Value) {
        let response = self.router().oneshot(request).await.unwrap();
        (response.status(), body_json(response).await)
    }

    pub fn authed(method: &str, uri: &str, token: &str) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header(header::AUTHORIZATION, format!("Bearer {token}"))
            .body(Body::empty())
            .unwrap()
    }

    pub fn json_request(
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: serde_json::Value,
    ) -> Request<Body> {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }
}

pub async fn body_json(response: Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null)
}
