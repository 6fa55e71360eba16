use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
};

use super::claims::{Claims, Role};
use super::services::AuthService;
use crate::error::{AppError, AppResult};

/// Token from `Authorization: Bearer <token>`.
pub fn bearer_token(headers: &HeaderMap) -> AppResult<&str> {
    let auth = headers
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .ok_or_else(|| AppError::unauthorized("missing authorization token"))?;

    auth.strip_prefix("Bearer ")
        .or_else(|| auth.strip_prefix("bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| AppError::unauthorized("malformed authorization header"))
}

/// Any authenticated account.
pub struct AuthUser(pub Claims);

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    AuthService: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let token = bearer_token(&parts.headers)?;
        let claims = AuthService::from_ref(state).authenticate(token).await?;
        Ok(AuthUser(claims))
    }
}

/// Authenticated end user.
pub struct CurrentUser(pub Claims);

#[async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
    AuthService: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let AuthUser(claims) = AuthUser::from_request_parts(parts, state).await?;
        if claims.role != Role::User {
            return Err(AppError::forbidden("user account required"));
        }
        Ok(CurrentUser(claims))
    }
}

/// Authenticated administrator.
pub struct CurrentAdmin(pub Claims);

#[async_trait]
impl<S> FromRequestParts<S> for CurrentAdmin
where
    S: Send + Sync,
    AuthService: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let AuthUser(claims) = AuthUser::from_request_parts(parts, state).await?;
        if claims.role != Role::Admin {
            return Err(AppError::forbidden("admin privileges required"));
        }
        Ok(CurrentAdmin(claims))
    }
}

/// Self-service routes act only on the caller's own record.
pub fn ensure_self(claims: &Claims, id: i64) -> AppResult<()> {
    if claims.sub != id {
        return Err(AppError::forbidden("you can only modify your own account"));
    }
    Ok(())
}
