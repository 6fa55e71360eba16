use axum::{
    extract::State,
    routing::{get, post, put},
    Router,
};
use tracing::instrument;

use super::dto::{RegisterRequest, SendCodeRequest, UpdateEmailRequest, UpdateProfileRequest, UserView};
use super::services::UserService;
use crate::auth::extractors::{ensure_self, CurrentUser};
use crate::error::AppResult;
use crate::extract::{AppJson, AppPath};
use crate::response::ApiResponse;
use crate::state::AppState;

pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/users/send-verification-code", post(send_verification_code))
        .route("/users/register", post(register))
        .route("/users/profile", get(profile))
        .route("/users/update-email", post(update_email))
        .route("/users/:id", put(update_self).delete(delete_self))
}

#[instrument(skip(users, payload))]
pub async fn send_verification_code(
    State(users): State<UserService>,
    AppJson(payload): AppJson<SendCodeRequest>,
) -> AppResult<ApiResponse<()>> {
    let email = payload.into_email()?;
    users.send_verification_code(&email).await?;
    Ok(ApiResponse::ok(()))
}

#[instrument(skip(users, payload))]
pub async fn register(
    State(users): State<UserService>,
    AppJson(payload): AppJson<RegisterRequest>,
) -> AppResult<ApiResponse<UserView>> {
    let user = users.register(payload.into_registration()?).await?;
    Ok(ApiResponse::created(user.into()))
}

#[instrument(skip(users, claims), fields(user_id = claims.sub))]
pub async fn profile(
    State(users): State<UserService>,
    CurrentUser(claims): CurrentUser,
) -> AppResult<ApiResponse<UserView>> {
    let user = users.get(claims.sub).await?;
    Ok(ApiResponse::ok(user.into()))
}

#[instrument(skip(users, claims, payload), fields(user_id = claims.sub))]
pub async fn update_email(
    State(users): State<UserService>,
    CurrentUser(claims): CurrentUser,
    AppJson(payload): AppJson<UpdateEmailRequest>,
) -> AppResult<ApiResponse<UserView>> {
    let (email, code) = payload.validate()?;
    let user = users.update_email(claims.sub, &email, &code).await?;
    Ok(ApiResponse::ok(user.into()))
}

#[instrument(skip(users, claims, payload))]
pub async fn update_self(
    State(users): State<UserService>,
    CurrentUser(claims): CurrentUser,
    AppPath(id): AppPath<i64>,
    AppJson(payload): AppJson<UpdateProfileRequest>,
) -> AppResult<ApiResponse<UserView>> {
    ensure_self(&claims, id)?;
    let user = users.update(id, payload.into_update()?).await?;
    Ok(ApiResponse::ok(user.into()))
}

#[instrument(skip(users, claims))]
pub async fn delete_self(
    State(users): State<UserService>,
    CurrentUser(claims): CurrentUser,
    AppPath(id): AppPath<i64>,
) -> AppResult<ApiResponse<()>> {
    ensure_self(&claims, id)?;
    users.delete(id).await?;
    Ok(ApiResponse::ok(()))
}
