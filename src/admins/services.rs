use std::sync::Arc;

use axum::extract::FromRef;
use tracing::info;

use super::repo::AdminStore;
use super::repo_types::{Admin, NewAdmin};
use crate::auth::password::hash_password;
use crate::error::{AppError, AppResult};
use crate::query::{Column, Filter, ListQuery};
use crate::state::AppState;

#[derive(Clone)]
pub struct AdminService {
    store: Arc<dyn AdminStore>,
}

impl FromRef<AppState> for AdminService {
    fn from_ref(state: &AppState) -> Self {
        Self::new(state.admins.clone())
    }
}

impl AdminService {
    pub fn new(store: Arc<dyn AdminStore>) -> Self {
        Self { store }
    }

    pub async fn list(&self, query: &ListQuery) -> AppResult<(Vec<Admin>, i64)> {
        Ok(self.store.list(query).await?)
    }

    pub async fn get(&self, id: i64) -> AppResult<Admin> {
        self.store
            .find_one(&Filter::new().eq_int(Column::Id, Some(id)))
            .await?
            .ok_or_else(|| AppError::not_found("admin not found"))
    }

    /// Seeds the configured admin unless one with that username exists.
    pub async fn ensure_bootstrap(&self, username: &str, password: &str) -> anyhow::Result<()> {
        let existing = self
            .store
            .find_one(&Filter::new().eq_str(Column::Username, Some(username)))
            .await?;
        if existing.is_some() {
            return Ok(());
        }
        let admin = self
            .store
            .insert(NewAdmin {
                username: username.to_string(),
                password_hash: hash_password(password)?,
            })
            .await?;
        info!(admin_id = admin.id, "bootstrap admin created");
        Ok(())
    }
}
