use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize};

use super::repo_types::User;
use super::services::{AccountUpdate, NewAccount, Registration};
use crate::error::{AppError, AppResult};
use crate::query::page::MAX_PAGE_SIZE;
use crate::query::{Column, Filter, ListQuery, PageRequest, Sort};

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

pub(crate) fn normalize_email(raw: &str) -> AppResult<String> {
    let email = raw.trim().to_lowercase();
    if !is_valid_email(&email) {
        return Err(AppError::bad_request("invalid email"));
    }
    Ok(email)
}

pub(crate) fn validate_username(username: &str) -> AppResult<()> {
    let len = username.chars().count();
    if !(3..=100).contains(&len) {
        return Err(AppError::bad_request("username must be 3 to 100 characters"));
    }
    Ok(())
}

pub(crate) fn validate_password(password: &str) -> AppResult<()> {
    if password.chars().count() < 6 {
        return Err(AppError::bad_request("password must be at least 6 characters"));
    }
    Ok(())
}

fn validate_code(code: &str) -> AppResult<()> {
    if code.len() != 6 || !code.bytes().all(|b| b.is_ascii_digit()) {
        return Err(AppError::bad_request("verification code must be 6 digits"));
    }
    Ok(())
}

/// Tells an absent field (`None`) apart from an explicit `null` (`Some(None)`).
fn double_option<'de, D, T>(de: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(de).map(Some)
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SendCodeRequest {
    pub email: String,
}

impl SendCodeRequest {
    pub fn into_email(self) -> AppResult<String> {
        normalize_email(&self.email)
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub captcha: String,
    pub password: String,
}

impl RegisterRequest {
    pub fn into_registration(self) -> AppResult<Registration> {
        validate_username(&self.username)?;
        validate_password(&self.password)?;
        let email = normalize_email(&self.email)?;
        if self.captcha.is_empty() {
            return Err(AppError::bad_request("verification code is required"));
        }
        Ok(Registration {
            username: self.username,
            email,
            password: self.password,
            captcha: self.captcha,
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateEmailRequest {
    pub email: String,
    pub code: String,
}

impl UpdateEmailRequest {
    pub fn validate(self) -> AppResult<(String, String)> {
        validate_code(&self.code)?;
        Ok((normalize_email(&self.email)?, self.code))
    }
}

/// Self-service profile change.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateProfileRequest {
    pub username: Option<String>,
    pub password: Option<String>,
}

impl UpdateProfileRequest {
    pub fn into_update(self) -> AppResult<AccountUpdate> {
        if let Some(username) = &self.username {
            validate_username(username)?;
        }
        if let Some(password) = &self.password {
            validate_password(password)?;
        }
        Ok(AccountUpdate {
            username: self.username,
            password: self.password,
            points: None,
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AdminCreateUserRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    pub points: Option<i64>,
}

impl AdminCreateUserRequest {
    pub fn into_account(self) -> AppResult<NewAccount> {
        validate_username(&self.username)?;
        validate_password(&self.password)?;
        Ok(NewAccount {
            email: normalize_email(&self.email)?,
            username: self.username,
            password: self.password,
            points: self.points,
        })
    }
}

/// Administrative change; `"points": null` clears the balance.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AdminUpdateUserRequest {
    pub username: Option<String>,
    pub password: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub points: Option<Option<i64>>,
}

impl AdminUpdateUserRequest {
    pub fn into_update(self) -> AppResult<AccountUpdate> {
        if let Some(username) = &self.username {
            validate_username(username)?;
        }
        if let Some(password) = &self.password {
            validate_password(password)?;
        }
        Ok(AccountUpdate {
            username: self.username,
            password: self.password,
            points: self.points,
        })
    }
}

/// Query string of `GET /admin/users`. Unknown keys are ignored.
#[derive(Debug, Default, Deserialize)]
pub struct UserListQuery {
    pub page: Option<u32>,
    pub page_size: Option<u32>,
    pub id: Option<i64>,
    pub username: Option<String>,
    pub email: Option<String>,
    pub email_verified: Option<bool>,
    pub username_like: Option<String>,
    pub email_like: Option<String>,
    pub points_min: Option<i64>,
    pub points_max: Option<i64>,
    pub created_at_min: Option<i64>,
    pub created_at_max: Option<i64>,
    pub order_by: Option<String>,
    pub order: Option<String>,
}

impl UserListQuery {
    pub fn into_list_query(self) -> AppResult<ListQuery> {
        if matches!(self.page_size, Some(size) if size > MAX_PAGE_SIZE) {
            return Err(AppError::bad_request("page_size must be at most 100"));
        }

        // Stored addresses are trimmed and lowercased.
        let email = self.email.map(|e| e.trim().to_lowercase());

        let filter = Filter::new()
            .eq_int(Column::Id, self.id)
            .eq_str(Column::Username, self.username.as_deref())
            .eq_str(Column::Email, email.as_deref())
            .eq_bool(Column::EmailVerified, self.email_verified)
            .like(Column::Username, self.username_like.as_deref())
            .like(Column::Email, self.email_like.as_deref())
            .gte(Column::CreatedAt, self.created_at_min)
            .lte(Column::CreatedAt, self.created_at_max)
            .null_as_zero_range(Column::Points, self.points_min, self.points_max);
        let sort = Sort::resolve(self.order_by.as_deref(), self.order.as_deref(), User::SORTABLE);

        Ok(ListQuery::new(filter, sort, PageRequest::new(self.page, self.page_size)))
    }
}

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct UserView {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub email_verified: bool,
    pub points: i64,
    pub created_at: i64,
    pub updated_at: i64,
}

impl From<User> for UserView {
    fn from(u: User) -> Self {
        Self {
            points: u.balance(),
            id: u.id,
            username: u.username,
            email: u.email,
            email_verified: u.email_verified,
            created_at: u.created_at,
            updated_at: u.updated_at,
        }
    }
}
