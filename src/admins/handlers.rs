use axum::{extract::State, routing::get, Router};
use tracing::instrument;

use super::dto::{AdminListQuery, AdminView};
use super::services::AdminService;
use crate::auth::extractors::CurrentAdmin;
use crate::error::AppResult;
use crate::extract::{AppJson, AppPath, AppQuery};
use crate::response::{ApiResponse, Paginated};
use crate::state::AppState;
use crate::users::dto::{AdminCreateUserRequest, AdminUpdateUserRequest, UserListQuery, UserView};
use crate::users::services::UserService;

pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/admin/profile", get(profile))
        .route("/admin/admins", get(list_admins))
        .route("/admin/users", get(list_users).post(create_user))
        .route(
            "/admin/users/:id",
            get(get_user).put(update_user).delete(delete_user),
        )
}

#[instrument(skip(admins, claims), fields(admin_id = claims.sub))]
pub async fn profile(
    State(admins): State<AdminService>,
    CurrentAdmin(claims): CurrentAdmin,
) -> AppResult<ApiResponse<AdminView>> {
    let admin = admins.get(claims.sub).await?;
    Ok(ApiResponse::ok(admin.into()))
}

#[instrument(skip(admins, _admin, query))]
pub async fn list_admins(
    State(admins): State<AdminService>,
    _admin: CurrentAdmin,
    AppQuery(query): AppQuery<AdminListQuery>,
) -> AppResult<ApiResponse<Paginated<AdminView>>> {
    let query = query.into_list_query()?;
    let (rows, total) = admins.list(&query).await?;
    let list = rows.into_iter().map(AdminView::from).collect();
    Ok(ApiResponse::ok(Paginated::new(list, query.page, total)))
}

#[instrument(skip(users, _admin, query))]
pub async fn list_users(
    State(users): State<UserService>,
    _admin: CurrentAdmin,
    AppQuery(query): AppQuery<UserListQuery>,
) -> AppResult<ApiResponse<Paginated<UserView>>> {
    let query = query.into_list_query()?;
    let (rows, total) = users.list(&query).await?;
    let list = rows.into_iter().map(UserView::from).collect();
    Ok(ApiResponse::ok(Paginated::new(list, query.page, total)))
}

#[instrument(skip(users, _admin, payload))]
pub async fn create_user(
    State(users): State<UserService>,
    _admin: CurrentAdmin,
    AppJson(payload): AppJson<AdminCreateUserRequest>,
) -> AppResult<ApiResponse<UserView>> {
    let user = users.create(payload.into_account()?).await?;
    Ok(ApiResponse::created(user.into()))
}

#[instrument(skip(users, _admin))]
pub async fn get_user(
    State(users): State<UserService>,
    _admin: CurrentAdmin,
    AppPath(id): AppPath<i64>,
) -> AppResult<ApiResponse<UserView>> {
    let user = users.get(id).await?;
    Ok(ApiResponse::ok(user.into()))
}

#[instrument(skip(users, _admin, payload))]
pub async fn update_user(
    State(users): State<UserService>,
    _admin: CurrentAdmin,
    AppPath(id): AppPath<i64>,
    AppJson(payload): AppJson<AdminUpdateUserRequest>,
) -> AppResult<ApiResponse<UserView>> {
    let user = users.update(id, payload.into_update()?).await?;
    Ok(ApiResponse::ok(user.into()))
}

#[instrument(skip(users, _admin))]
pub async fn delete_user(
    State(users): State<UserService>,
    _admin: CurrentAdmin,
    AppPath(id): AppPath<i64>,
) -> AppResult<ApiResponse<()>> {
    users.delete(id).await?;
    Ok(ApiResponse::ok(()))
}
