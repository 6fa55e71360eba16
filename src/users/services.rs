use std::sync::Arc;

use axum::extract::FromRef;
use tracing::{info, warn};

use super::repo::UserStore;
use super::repo_types::{NewUser, User, UserChanges};
use crate::auth::password::hash_password;
use crate::captcha::{CaptchaService, CodePurpose};
use crate::db::UniqueViolation;
use crate::error::{AppError, AppResult};
use crate::query::{Clause, Column, Filter, ListQuery, Value};
use crate::state::AppState;

pub const USERNAME_TAKEN: &str = "username already exists";
pub const EMAIL_TAKEN: &str = "email already in use";

/// Writes that lose a race on a unique index surface like the pre-checks do.
fn write_error(err: anyhow::Error) -> AppError {
    match err.downcast_ref::<UniqueViolation>() {
        Some(violation) if violation.0.contains("email") => AppError::bad_request(EMAIL_TAKEN),
        Some(_) => AppError::bad_request(USERNAME_TAKEN),
        None => err.into(),
    }
}

#[derive(Debug, Clone)]
pub struct Registration {
    pub username: String,
    pub email: String,
    pub password: String,
    pub captcha: String,
}

#[derive(Debug, Clone)]
pub struct NewAccount {
    pub username: String,
    pub email: String,
    pub password: String,
    pub points: Option<i64>,
}

#[derive(Debug, Clone, Default)]
pub struct AccountUpdate {
    pub username: Option<String>,
    pub password: Option<String>,
    pub points: Option<Option<i64>>,
}

#[derive(Clone)]
pub struct UserService {
    store: Arc<dyn UserStore>,
    captcha: CaptchaService,
}

impl FromRef<AppState> for UserService {
    fn from_ref(state: &AppState) -> Self {
        Self::new(
            state.users.clone(),
            CaptchaService::new(state.kv.clone(), state.mailer.clone()),
        )
    }
}

impl UserService {
    pub fn new(store: Arc<dyn UserStore>, captcha: CaptchaService) -> Self {
        Self { store, captcha }
    }

    pub async fn list(&self, query: &ListQuery) -> AppResult<(Vec<User>, i64)> {
        Ok(self.store.list(query).await?)
    }

    pub async fn get(&self, id: i64) -> AppResult<User> {
        self.store
            .find_one(&Filter::new().eq_int(Column::Id, Some(id)))
            .await?
            .ok_or_else(|| AppError::not_found("user not found"))
    }

    async fn email_taken(&self, email: &str) -> AppResult<bool> {
        Ok(self
            .store
            .find_one(&Filter::new().eq_str(Column::Email, Some(email)))
            .await?
            .is_some())
    }

    /// One lookup covering both unique fields; reports which one clashes.
    async fn ensure_available(&self, username: &str, email: &str) -> AppResult<()> {
        let either = Filter::new().with(Clause::Or(vec![
            Clause::Eq(Column::Username, Value::Text(username.to_string())),
            Clause::Eq(Column::Email, Value::Text(email.to_string())),
        ]));
        match self.store.find_one(&either).await? {
            Some(existing) if existing.username == username => {
                Err(AppError::bad_request(USERNAME_TAKEN))
            }
            Some(_) => Err(AppError::bad_request(EMAIL_TAKEN)),
            None => Ok(()),
        }
    }

    pub async fn send_verification_code(&self, email: &str) -> AppResult<()> {
        if self.email_taken(email).await? {
            warn!("verification code requested for a registered email");
            return Err(AppError::bad_request(EMAIL_TAKEN));
        }
        self.captcha.send_code(email, CodePurpose::Register).await
    }

    pub async fn register(&self, registration: Registration) -> AppResult<User> {
        self.ensure_available(&registration.username, &registration.email)
            .await?;
        self.captcha
            .verify_code(&registration.email, &registration.captcha, CodePurpose::Register)
            .await?;

        let user = self
            .store
            .insert(NewUser {
                username: registration.username,
                email: registration.email,
                password_hash: hash_password(&registration.password)?,
                email_verified: true,
                points: None,
            })
            .await
            .map_err(write_error)?;

        info!(user_id = user.id, "user registered");
        Ok(user)
    }

    /// Administrative create: no code, address left unverified.
    pub async fn create(&self, account: NewAccount) -> AppResult<User> {
        self.ensure_available(&account.username, &account.email)
            .await?;

        let user = self
            .store
            .insert(NewUser {
                username: account.username,
                email: account.email,
                password_hash: hash_password(&account.password)?,
                email_verified: false,
                points: account.points,
            })
            .await
            .map_err(write_error)?;

        info!(user_id = user.id, "user created by admin");
        Ok(user)
    }

    pub async fn update(&self, id: i64, update: AccountUpdate) -> AppResult<User> {
        if let Some(username) = update.username.as_deref() {
            let clash = Filter::new()
                .eq_str(Column::Username, Some(username))
                .not_eq_int(Column::Id, Some(id));
            if self.store.find_one(&clash).await?.is_some() {
                return Err(AppError::bad_request(USERNAME_TAKEN));
            }
        }

        let password_hash = match update.password.as_deref() {
            Some(plain) => Some(hash_password(plain)?),
            None => None,
        };

        let user = self
            .store
            .update(
                id,
                UserChanges {
                    username: update.username,
                    password_hash,
                    points: update.points,
                    ..UserChanges::default()
                },
            )
            .await
            .map_err(write_error)?
            .ok_or_else(|| AppError::not_found("user not found"))?;

        info!(user_id = id, "user updated");
        Ok(user)
    }

    /// Binds a new address after a code sent to it has been confirmed.
    pub async fn update_email(&self, id: i64, email: &str, code: &str) -> AppResult<User> {
        self.captcha
            .verify_code(email, code, CodePurpose::Register)
            .await?;
        if self.email_taken(email).await? {
            return Err(AppError::bad_request(EMAIL_TAKEN));
        }

        let user = self
            .store
            .update(
                id,
                UserChanges {
                    email: Some(email.to_string()),
                    email_verified: Some(true),
                    ..UserChanges::default()
                },
            )
            .await
            .map_err(write_error)?
            .ok_or_else(|| AppError::not_found("user not found"))?;

        info!(user_id = id, "user email changed");
        Ok(user)
    }

    /// Succeeds whether or not the row existed.
    pub async fn delete(&self, id: i64) -> AppResult<()> {
        if self.store.delete(id).await? {
            info!(user_id = id, "user deleted");
        } else {
            warn!(user_id = id, "delete of unknown user");
        }
        Ok(())
    }

    /// Takes one point for a paid action; returns the remaining balance.
    pub async fn deduct_point(&self, id: i64) -> AppResult<i64> {
        match self.store.deduct_point(id).await? {
            Some(remaining) => {
                info!(user_id = id, remaining, "point deducted");
                Ok(remaining)
            }
            None => {
                warn!(user_id = id, "paid action refused, insufficient points");
                Err(AppError::bad_request("insufficient points"))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv::MemoryKv;
    use crate::mail::RecordingMailer;
    use crate::query::{PageRequest, Sort};
    use crate::users::memory::MemoryUserStore;

    struct Fixture {
        service: UserService,
        store: Arc<MemoryUserStore>,
        mailer: Arc<RecordingMailer>,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(MemoryUserStore::default());
        let mailer = Arc::new(RecordingMailer::default());
        let captcha = CaptchaService::new(Arc::new(MemoryKv::default()), mailer.clone());
        Fixture {
            service: UserService::new(store.clone(), captcha),
            store,
            mailer,
        }
    }

    async fn create(service: &UserService, username: &str, points: Option<i64>) -> User {
        service
            .create(NewAccount {
                username: username.into(),
                email: format!("{username}@example.com"),
                password: "secret1".into(),
                points,
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn register_with_code() {
        let f = fixture();
        f.service
            .send_verification_code("new@example.com")
            .await
            .unwrap();
        let code = f.mailer.last_code_for("new@example.com").unwrap();

        let user = f
            .service
            .register(Registration {
                username: "newbie".into(),
                email: "new@example.com".into(),
                password: "secret1".into(),
                captcha: code,
            })
            .await
            .unwrap();
        assert!(user.email_verified);
        assert_eq!(user.points, None);
        assert_ne!(user.password_hash, "secret1");
    }

    #[tokio::test]
    async fn register_reports_which_field_clashes() {
        let f = fixture();
        create(&f.service, "taken", None).await;

        let by_name = f
            .service
            .register(Registration {
                username: "taken".into(),
                email: "fresh@example.com".into(),
                password: "secret1".into(),
                captcha: "123456".into(),
            })
            .await
            .unwrap_err();
        assert_eq!(by_name.to_string(), USERNAME_TAKEN);

        let by_email = f
            .service
            .register(Registration {
                username: "fresh".into(),
                email: "taken@example.com".into(),
                password: "secret1".into(),
                captcha: "123456".into(),
            })
            .await
            .unwrap_err();
        assert_eq!(by_email.to_string(), EMAIL_TAKEN);
    }

    #[tokio::test]
    async fn register_without_code_is_rejected() {
        let f = fixture();
        let err = f
            .service
            .register(Registration {
                username: "nocode".into(),
                email: "nocode@example.com".into(),
                password: "secret1".into(),
                captcha: "123456".into(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
        assert!(f.store.get(1).is_none());
    }

    #[tokio::test]
    async fn code_for_registered_email_is_refused() {
        let f = fixture();
        create(&f.service, "alice", None).await;
        let err = f
            .service
            .send_verification_code("alice@example.com")
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), EMAIL_TAKEN);
        assert!(f.mailer.sent().is_empty());
    }

    #[tokio::test]
    async fn update_checks_username_against_others_only() {
        let f = fixture();
        let alice = create(&f.service, "alice", None).await;
        create(&f.service, "bob", None).await;

        let same = f
            .service
            .update(
                alice.id,
                AccountUpdate {
                    username: Some("alice".into()),
                    ..AccountUpdate::default()
                },
            )
            .await;
        assert!(same.is_ok());

        let err = f
            .service
            .update(
                alice.id,
                AccountUpdate {
                    username: Some("bob".into()),
                    ..AccountUpdate::default()
                },
            )
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), USERNAME_TAKEN);
    }

    #[tokio::test]
    async fn update_points_sets_and_clears() {
        let f = fixture();
        let alice = create(&f.service, "alice", Some(3)).await;

        let set = f
            .service
            .update(
                alice.id,
                AccountUpdate {
                    points: Some(Some(10)),
                    ..AccountUpdate::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(set.points, Some(10));

        let cleared = f
            .service
            .update(
                alice.id,
                AccountUpdate {
                    points: Some(None),
                    ..AccountUpdate::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(cleared.points, None);
        assert_eq!(cleared.username, "alice");
    }

    #[tokio::test]
    async fn update_unknown_user_is_not_found() {
        let f = fixture();
        let err = f
            .service
            .update(99, AccountUpdate::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn update_email_needs_code_for_the_new_address() {
        let f = fixture();
        let alice = create(&f.service, "alice", None).await;

        let err = f
            .service
            .update_email(alice.id, "alice2@example.com", "000000")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));

        f.service
            .send_verification_code("alice2@example.com")
            .await
            .unwrap();
        let code = f.mailer.last_code_for("alice2@example.com").unwrap();
        let user = f
            .service
            .update_email(alice.id, "alice2@example.com", &code)
            .await
            .unwrap();
        assert_eq!(user.email, "alice2@example.com");
        assert!(user.email_verified);
    }

    #[tokio::test]
    async fn delete_is_unconditional() {
        let f = fixture();
        let alice = create(&f.service, "alice", None).await;
        f.service.delete(alice.id).await.unwrap();
        f.service.delete(alice.id).await.unwrap();
        assert!(matches!(
            f.service.get(alice.id).await.unwrap_err(),
            AppError::NotFound(_)
        ));
    }

    #[tokio::test]
    async fn deduction_refuses_empty_and_unassigned_balances() {
        let f = fixture();
        let rich = create(&f.service, "rich", Some(2)).await;
        let broke = create(&f.service, "broke", Some(0)).await;
        let unset = create(&f.service, "unset", None).await;

        assert_eq!(f.service.deduct_point(rich.id).await.unwrap(), 1);
        assert_eq!(f.service.deduct_point(rich.id).await.unwrap(), 0);
        for id in [rich.id, broke.id, unset.id] {
            let err = f.service.deduct_point(id).await.unwrap_err();
            assert_eq!(err.to_string(), "insufficient points");
        }
        assert_eq!(f.store.get(unset.id).unwrap().points, None);
    }

    #[tokio::test]
    async fn concurrent_deductions_at_one_point_let_exactly_one_through() {
        let f = fixture();
        let user = create(&f.service, "last", Some(1)).await;

        let (a, b) = tokio::join!(
            f.service.deduct_point(user.id),
            f.service.deduct_point(user.id)
        );
        assert_eq!([a.is_ok(), b.is_ok()].iter().filter(|ok| **ok).count(), 1);
        assert_eq!(f.store.get(user.id).unwrap().points, Some(0));
    }

    #[tokio::test]
    async fn list_filters_sorts_and_counts() {
        let f = fixture();
        for (name, points) in [("ann", None), ("ben", Some(0)), ("cat", Some(4)), ("dan", Some(9))] {
            create(&f.service, name, points).await;
        }

        let query = ListQuery::new(
            Filter::new().null_as_zero_range(Column::Points, None, Some(5)),
            Sort::resolve(Some("username"), Some("asc"), User::SORTABLE),
            PageRequest::new(Some(1), Some(2)),
        );
        let (page, total) = f.service.list(&query).await.unwrap();
        assert_eq!(total, 3);
        assert_eq!(
            page.iter().map(|u| u.username.as_str()).collect::<Vec<_>>(),
            vec!["ann", "ben"]
        );
    }
}
