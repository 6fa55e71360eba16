use std::sync::Arc;

use axum::extract::FromRef;
use tracing::{debug, info, warn};

use super::blacklist::TokenBlacklist;
use super::claims::{Claims, Role};
use super::dto::TokenView;
use super::jwt::JwtKeys;
use super::password::verify_password;
use crate::admins::repo::AdminStore;
use crate::error::{AppError, AppResult};
use crate::query::{Column, Filter};
use crate::state::AppState;
use crate::users::repo::UserStore;

const BAD_CREDENTIALS: &str = "invalid username or password";

#[derive(Clone)]
pub struct AuthService {
    users: Arc<dyn UserStore>,
    admins: Arc<dyn AdminStore>,
    keys: JwtKeys,
    blacklist: TokenBlacklist,
}

impl FromRef<AppState> for AuthService {
    fn from_ref(state: &AppState) -> Self {
        Self {
            users: state.users.clone(),
            admins: state.admins.clone(),
            keys: JwtKeys::from_ref(state),
            blacklist: TokenBlacklist::from_ref(state),
        }
    }
}

impl AuthService {
    fn issue(&self, id: i64, username: &str, role: Role) -> AppResult<TokenView> {
        let (access_token, claims) = self.keys.sign(id, username, role)?;
        Ok(TokenView {
            access_token,
            expires_in: claims.exp,
        })
    }

    pub async fn login_user(&self, username: &str, password: &str) -> AppResult<TokenView> {
        let filter = Filter::new().eq_str(Column::Username, Some(username));
        let Some(user) = self.users.find_one(&filter).await? else {
            warn!("user login with unknown username");
            return Err(AppError::bad_request(BAD_CREDENTIALS));
        };
        if !verify_password(password, &user.password_hash)? {
            warn!(user_id = user.id, "user login with wrong password");
            return Err(AppError::bad_request(BAD_CREDENTIALS));
        }
        let token = self.issue(user.id, &user.username, Role::User)?;
        info!(user_id = user.id, "user logged in");
        Ok(token)
    }

    pub async fn login_admin(&self, username: &str, password: &str) -> AppResult<TokenView> {
        let filter = Filter::new().eq_str(Column::Username, Some(username));
        let Some(admin) = self.admins.find_one(&filter).await? else {
            warn!("admin login with unknown username");
            return Err(AppError::bad_request(BAD_CREDENTIALS));
        };
        if !verify_password(password, &admin.password_hash)? {
            warn!(admin_id = admin.id, "admin login with wrong password");
            return Err(AppError::bad_request(BAD_CREDENTIALS));
        }
        let token = self.issue(admin.id, &admin.username, Role::Admin)?;
        info!(admin_id = admin.id, "admin logged in");
        Ok(token)
    }

    /// Verifies signature, expiry, issuer and audience, then the blacklist.
    pub async fn authenticate(&self, token: &str) -> AppResult<Claims> {
        let claims = self.keys.verify(token).map_err(|err| {
            debug!(error = %err, "token rejected");
            AppError::unauthorized("invalid or expired token")
        })?;
        if self.blacklist.is_revoked(&claims.jti).await {
            warn!(account_id = claims.sub, "revoked token presented");
            return Err(AppError::unauthorized("token has been revoked"));
        }
        Ok(claims)
    }

    /// Revokes the token for the rest of its lifetime. Never fails the caller.
    pub async fn logout(&self, claims: &Claims) {
        match self.blacklist.revoke(claims).await {
            Ok(()) => info!(account_id = claims.sub, role = claims.role.as_str(), "logged out"),
            Err(err) => warn!(error = ?err, account_id = claims.sub, "token revocation failed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::TestApp;

    #[tokio::test]
    async fn login_issues_tokens_with_the_right_role() {
        let app = TestApp::new();
        app.seed_user("alice", "secret1", Some(5)).await;
        app.seed_admin("root", "rootpass").await;
        let auth = AuthService::from_ref(&app.state);

        let user_token = auth.login_user("alice", "secret1").await.unwrap();
        let claims = auth.authenticate(&user_token.access_token).await.unwrap();
        assert_eq!(claims.role, Role::User);
        assert_eq!(claims.username, "alice");
        assert_eq!(claims.exp, user_token.expires_in);

        let admin_token = auth.login_admin("root", "rootpass").await.unwrap();
        let claims = auth.authenticate(&admin_token.access_token).await.unwrap();
        assert_eq!(claims.role, Role::Admin);
    }

    #[tokio::test]
    async fn bad_credentials_are_indistinguishable() {
        let app = TestApp::new();
        app.seed_user("alice", "secret1", None).await;
        let auth = AuthService::from_ref(&app.state);

        let unknown = auth.login_user("nobody", "secret1").await.unwrap_err();
        let wrong = auth.login_user("alice", "wrong!").await.unwrap_err();
        assert_eq!(unknown.to_string(), BAD_CREDENTIALS);
        assert_eq!(wrong.to_string(), BAD_CREDENTIALS);
        assert!(matches!(wrong, AppError::BadRequest(_)));
    }

    #[tokio::test]
    async fn user_credentials_do_not_open_the_admin_door() {
        let app = TestApp::new();
        app.seed_user("alice", "secret1", None).await;
        let auth = AuthService::from_ref(&app.state);
        assert!(auth.login_admin("alice", "secret1").await.is_err());
    }

    #[tokio::test]
    async fn logout_revokes_only_that_token() {
        let app = TestApp::new();
        app.seed_user("alice", "secret1", None).await;
        let auth = AuthService::from_ref(&app.state);

        let first = auth.login_user("alice", "secret1").await.unwrap();
        let second = auth.login_user("alice", "secret1").await.unwrap();
        let claims = auth.authenticate(&first.access_token).await.unwrap();
        auth.logout(&claims).await;

        let err = auth.authenticate(&first.access_token).await.unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(_)));
        assert!(auth.authenticate(&second.access_token).await.is_ok());
    }

    #[tokio::test]
    async fn blacklist_outage_fails_open() {
        let app = TestApp::new();
        app.seed_user("alice", "secret1", None).await;
        let auth = AuthService::from_ref(&app.state);
        let token = auth.login_user("alice", "secret1").await.unwrap();

        app.kv.fail();
        assert!(auth.authenticate(&token.access_token).await.is_ok());
    }
}
