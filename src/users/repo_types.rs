use sqlx::FromRow;

use crate::query::{Column, Filterable, Value};

#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub email_verified: bool,
    /// NULL until a balance is first assigned; reads as zero.
    pub points: Option<i64>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl User {
    pub const TABLE: &'static str = "users";
    pub const COLUMNS: &'static str =
        "id, username, email, password_hash, email_verified, points, created_at, updated_at";
    pub const SORTABLE: &'static [Column] = &[
        Column::Id,
        Column::Username,
        Column::Email,
        Column::Points,
        Column::CreatedAt,
        Column::UpdatedAt,
    ];

    pub fn balance(&self) -> i64 {
        self.points.unwrap_or(0)
    }
}

impl Filterable for User {
    fn value(&self, column: Column) -> Value {
        match column {
            Column::Id => Value::Int(self.id),
            Column::Username => Value::Text(self.username.clone()),
            Column::Email => Value::Text(self.email.clone()),
            Column::EmailVerified => Value::Bool(self.email_verified),
            Column::Points => self.points.into(),
            Column::CreatedAt => Value::Int(self.created_at),
            Column::UpdatedAt => Value::Int(self.updated_at),
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub email_verified: bool,
    pub points: Option<i64>,
}

/// Partial update. `None` leaves a column untouched.
#[derive(Debug, Clone, Default)]
pub struct UserChanges {
    pub username: Option<String>,
    pub email: Option<String>,
    pub password_hash: Option<String>,
    pub email_verified: Option<bool>,
    /// `Some(None)` clears the balance back to NULL.
    pub points: Option<Option<i64>>,
}

#[cfg(test)]
impl UserChanges {
    pub fn apply(self, user: &mut User, now: i64) {
        if let Some(username) = self.username {
            user.username = username;
        }
        if let Some(email) = self.email {
            user.email = email;
        }
        if let Some(hash) = self.password_hash {
            user.password_hash = hash;
        }
        if let Some(verified) = self.email_verified {
            user.email_verified = verified;
        }
        if let Some(points) = self.points {
            user.points = points;
        }
        user.updated_at = now;
    }
}
