use axum::{extract::State, routing::post, Router};
use tracing::instrument;

use crate::{
    auth::{
        dto::{LoginRequest, TokenView},
        extractors::AuthUser,
        services::AuthService,
    },
    error::AppResult,
    extract::AppJson,
    response::ApiResponse,
    state::AppState,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/user/login", post(user_login))
        .route("/auth/admin/login", post(admin_login))
        .route("/auth/logout", post(logout))
}

#[instrument(skip(auth, payload))]
pub async fn user_login(
    State(auth): State<AuthService>,
    AppJson(payload): AppJson<LoginRequest>,
) -> AppResult<ApiResponse<TokenView>> {
    let token = auth.login_user(&payload.username, &payload.password).await?;
    Ok(ApiResponse::ok(token))
}

#[instrument(skip(auth, payload))]
pub async fn admin_login(
    State(auth): State<AuthService>,
    AppJson(payload): AppJson<LoginRequest>,
) -> AppResult<ApiResponse<TokenView>> {
    let token = auth.login_admin(&payload.username, &payload.password).await?;
    Ok(ApiResponse::ok(token))
}

#[instrument(skip(auth, claims), fields(account_id = claims.sub))]
pub async fn logout(
    State(auth): State<AuthService>,
    AuthUser(claims): AuthUser,
) -> AppResult<ApiResponse<()>> {
    auth.logout(&claims).await;
    Ok(ApiResponse::ok(()))
}
