mod admins;
mod app;
mod auth;
mod captcha;
mod config;
mod db;
mod error;
mod extract;
mod kv;
mod mail;
mod proxy;
mod query;
mod response;
mod state;
#[cfg(test)]
mod test_support;
mod users;

use axum::extract::FromRef;

use crate::admins::services::AdminService;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let env_filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "accountgate=debug,axum=info,tower_http=info".to_string());
    let json_logs = std::env::var("LOG_FORMAT")
        .map(|v| v == "json")
        .unwrap_or(false);

    if json_logs {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }

    let app_state = state::AppState::init().await?;

    if let Some(bootstrap) = app_state.config.bootstrap_admin.clone() {
        AdminService::from_ref(&app_state)
            .ensure_bootstrap(&bootstrap.username, &bootstrap.password)
            .await?;
    }

    app::serve(app::build_app(app_state)).await
}
