use std::sync::Arc;
use std::time::Duration;

use axum::extract::FromRef;
use tracing::warn;
use uuid::Uuid;

use super::claims::Claims;
use crate::db::unix_now;
use crate::kv::KvStore;
use crate::state::AppState;

fn revoked_key(jti: &Uuid) -> String {
    format!("blacklist_token:{jti}")
}

/// Tokens revoked before their natural expiry.
#[derive(Clone)]
pub struct TokenBlacklist {
    kv: Arc<dyn KvStore>,
}

impl FromRef<AppState> for TokenBlacklist {
    fn from_ref(state: &AppState) -> Self {
        Self::new(state.kv.clone())
    }
}

impl TokenBlacklist {
    pub fn new(kv: Arc<dyn KvStore>) -> Self {
        Self { kv }
    }

    /// Keeps the entry only as long as the token would have stayed valid.
    pub async fn revoke(&self, claims: &Claims) -> anyhow::Result<()> {
        let remaining = claims.exp - unix_now();
        if remaining <= 0 {
            return Ok(());
        }
        self.kv
            .set_ex(
                &revoked_key(&claims.jti),
                "1",
                Duration::from_secs(remaining as u64),
            )
            .await
    }

    /// Lookup failures count as "not revoked".
    pub async fn is_revoked(&self, jti: &Uuid) -> bool {
        match self.kv.exists(&revoked_key(jti)).await {
            Ok(revoked) => revoked,
            Err(err) => {
                warn!(error = ?err, "token blacklist unavailable, accepting token");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::claims::Role;
    use crate::kv::MemoryKv;

    fn claims(exp_in: i64) -> Claims {
        let now = unix_now();
        Claims {
            sub: 1,
            username: "alice".into(),
            role: Role::User,
            iat: now,
            exp: now + exp_in,
            iss: "iss".into(),
            aud: "aud".into(),
            jti: Uuid::new_v4(),
        }
    }

    #[tokio::test]
    async fn revoked_tokens_are_reported() {
        let blacklist = TokenBlacklist::new(Arc::new(MemoryKv::default()));
        let live = claims(600);
        let other = claims(600);
        blacklist.revoke(&live).await.unwrap();
        assert!(blacklist.is_revoked(&live.jti).await);
        assert!(!blacklist.is_revoked(&other.jti).await);
    }

    #[tokio::test]
    async fn expired_tokens_are_not_stored() {
        let kv = Arc::new(MemoryKv::default());
        let blacklist = TokenBlacklist::new(kv.clone());
        let stale = claims(-10);
        blacklist.revoke(&stale).await.unwrap();
        assert!(!kv.exists(&revoked_key(&stale.jti)).await.unwrap());
    }

    #[tokio::test]
    async fn lookup_failure_fails_open() {
        let kv = Arc::new(MemoryKv::default());
        let blacklist = TokenBlacklist::new(kv.clone());
        let token = claims(600);
        blacklist.revoke(&token).await.unwrap();
        kv.fail();
        assert!(!blacklist.is_revoked(&token.jti).await);
    }
}
