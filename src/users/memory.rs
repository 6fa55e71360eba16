use std::sync::Mutex;

use axum::async_trait;

use super::repo::UserStore;
use super::repo_types::{NewUser, User, UserChanges};
use crate::db::{unix_now, UniqueViolation};
use crate::query::{Filter, ListQuery};

/// Vec-backed store for tests. Rows stay in id order.
#[derive(Default)]
pub struct MemoryUserStore {
    rows: Mutex<Vec<User>>,
}

impl MemoryUserStore {
    /// Inserts a row as-is, bypassing uniqueness checks.
    pub fn seed(&self, user: User) {
        let mut rows = self.rows.lock().unwrap();
        rows.push(user);
        rows.sort_by_key(|u| u.id);
    }

    pub fn get(&self, id: i64) -> Option<User> {
        self.rows.lock().unwrap().iter().find(|u| u.id == id).cloned()
    }

    fn conflict(rows: &[User], id: Option<i64>, username: Option<&str>, email: Option<&str>) -> Option<UniqueViolation> {
        rows.iter().filter(|u| Some(u.id) != id).find_map(|u| {
            if username == Some(u.username.as_str()) {
                Some(UniqueViolation("users_username_key".into()))
            } else if email == Some(u.email.as_str()) {
                Some(UniqueViolation("users_email_key".into()))
            } else {
                None
            }
        })
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn list(&self, query: &ListQuery) -> anyhow::Result<(Vec<User>, i64)> {
        Ok(query.evaluate(&self.rows.lock().unwrap()))
    }

    async fn find_one(&self, filter: &Filter) -> anyhow::Result<Option<User>> {
        let rows = self.rows.lock().unwrap();
        Ok(rows.iter().find(|u| filter.matches(*u)).cloned())
    }

    async fn insert(&self, user: NewUser) -> anyhow::Result<User> {
        let mut rows = self.rows.lock().unwrap();
        if let Some(conflict) =
            Self::conflict(&rows, None, Some(&user.username), Some(&user.email))
        {
            return Err(conflict.into());
        }
        let now = unix_now();
        let row = User {
            id: rows.last().map_or(1, |u| u.id + 1),
            username: user.username,
            email: user.email,
            password_hash: user.password_hash,
            email_verified: user.email_verified,
            points: user.points,
            created_at: now,
            updated_at: now,
        };
        rows.push(row.clone());
        Ok(row)
    }

    async fn update(&self, id: i64, changes: UserChanges) -> anyhow::Result<Option<User>> {
        let mut rows = self.rows.lock().unwrap();
        if let Some(conflict) = Self::conflict(
            &rows,
            Some(id),
            changes.username.as_deref(),
            changes.email.as_deref(),
        ) {
            return Err(conflict.into());
        }
        let Some(row) = rows.iter_mut().find(|u| u.id == id) else {
            return Ok(None);
        };
        changes.apply(row, unix_now());
        Ok(Some(row.clone()))
    }

    async fn delete(&self, id: i64) -> anyhow::Result<bool> {
        let mut rows = self.rows.lock().unwrap();
        let before = rows.len();
        rows.retain(|u| u.id != id);
        Ok(rows.len() < before)
    }

    async fn deduct_point(&self, id: i64) -> anyhow::Result<Option<i64>> {
        let mut rows = self.rows.lock().unwrap();
        let Some(row) = rows.iter_mut().find(|u| u.id == id) else {
            return Ok(None);
        };
        match row.points {
            Some(points) if points >= 1 => {
                row.points = Some(points - 1);
                row.updated_at = unix_now();
                Ok(row.points)
            }
            _ => Ok(None),
        }
    }
}
