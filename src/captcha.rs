//! Single-use email verification codes.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use rand::{rngs::OsRng, Rng};
use tracing::{error, info, warn};

use crate::error::{AppError, AppResult};
use crate::kv::KvStore;
use crate::mail::{verification_email, Mailer, VERIFICATION_SUBJECT};

pub const CODE_TTL: Duration = Duration::from_secs(5 * 60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodePurpose {
    /// Proves ownership of an address not yet bound to an account.
    Register,
}

impl CodePurpose {
    fn as_str(self) -> &'static str {
        match self {
            CodePurpose::Register => "register",
        }
    }
}

fn code_key(purpose: CodePurpose, email: &str) -> String {
    format!("captcha:{}:{email}", purpose.as_str())
}

/// Six digits, leading zeros kept.
pub fn generate_code() -> String {
    format!("{:06}", OsRng.gen_range(0..1_000_000u32))
}

#[derive(Clone)]
pub struct CaptchaService {
    kv: Arc<dyn KvStore>,
    mailer: Arc<dyn Mailer>,
}

impl CaptchaService {
    pub fn new(kv: Arc<dyn KvStore>, mailer: Arc<dyn Mailer>) -> Self {
        Self { kv, mailer }
    }

    /// Stores a fresh code and mails it. One pending code per address.
    pub async fn send_code(&self, email: &str, purpose: CodePurpose) -> AppResult<()> {
        let key = code_key(purpose, email);
        if self.kv.exists(&key).await.context("check pending code")? {
            warn!(purpose = purpose.as_str(), "verification code already pending");
            return Err(AppError::bad_request("verification code already sent"));
        }

        let code = generate_code();
        self.kv
            .set_ex(&key, &code, CODE_TTL)
            .await
            .context("store verification code")?;

        if let Err(err) = self
            .mailer
            .send_html(email, VERIFICATION_SUBJECT, &verification_email(&code))
            .await
        {
            error!(error = ?err, "verification email failed");
            if let Err(err) = self.kv.del(&key).await {
                warn!(error = ?err, "could not drop undelivered verification code");
            }
            return Err(AppError::internal("failed to send verification code"));
        }

        info!(purpose = purpose.as_str(), "verification code sent");
        Ok(())
    }

    /// Consumes the pending code when it matches.
    pub async fn verify_code(&self, email: &str, code: &str, purpose: CodePurpose) -> AppResult<()> {
        let key = code_key(purpose, email);
        let stored = self
            .kv
            .get(&key)
            .await
            .context("load verification code")?
            .ok_or_else(|| AppError::bad_request("verification code expired or not found"))?;

        if stored != code {
            return Err(AppError::bad_request("incorrect verification code"));
        }

        if let Err(err) = self.kv.del(&key).await {
            warn!(error = ?err, "could not drop used verification code");
        }
        Ok(())
    }
}
