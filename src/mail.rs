//! Outbound mail over SMTP.

use std::time::Duration;

use anyhow::{Context, Result};
use axum::async_trait;
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

use crate::config::{SmtpConfig, SmtpEncryption};

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send_html(&self, to: &str, subject: &str, html: &str) -> Result<()>;
}

pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: String,
    timeout: Duration,
}

impl SmtpMailer {
    /// Builds the transport. No connection is made until the first send.
    pub fn new(config: &SmtpConfig) -> Result<Self> {
        let mut builder = match config.encryption {
            SmtpEncryption::Tls => AsyncSmtpTransport::<Tokio1Executor>::relay(&config.host)
                .context("failed to create SMTP relay transport")?,
            SmtpEncryption::None => {
                AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.host)
            }
            SmtpEncryption::Starttls => {
                AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
                    .context("failed to create SMTP STARTTLS transport")?
            }
        }
        .port(config.port);

        if !config.username.is_empty() {
            builder = builder.credentials(Credentials::new(
                config.username.clone(),
                config.password.clone(),
            ));
        }

        Ok(Self {
            transport: builder.build(),
            from: config.from.clone(),
            timeout: Duration::from_secs(config.timeout_secs),
        })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send_html(&self, to: &str, subject: &str, html: &str) -> Result<()> {
        let email = Message::builder()
            .from(self.from.parse().context("invalid from email address")?)
            .to(to.parse().context("invalid recipient email address")?)
            .subject(subject)
            .header(ContentType::TEXT_HTML)
            .body(html.to_string())
            .context("failed to build email message")?;

        tokio::time::timeout(self.timeout, self.transport.send(email))
            .await
            .with_context(|| format!("sending email timed out after {:?}", self.timeout))?
            .context("failed to send email")?;

        Ok(())
    }
}

/// Stands in when no SMTP host is configured; every send fails.
pub struct UnconfiguredMailer;

#[async_trait]
impl Mailer for UnconfiguredMailer {
    async fn send_html(&self, _to: &str, _subject: &str, _html: &str) -> Result<()> {
        anyhow::bail!("mail service is not configured")
    }
}

pub const VERIFICATION_SUBJECT: &str = "Your verification code";

pub fn verification_email(code: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
  <body style="font-family: sans-serif; color: #222;">
    <p>Your verification code is:</p>
    <p style="font-size: 28px; letter-spacing: 6px; font-weight: bold;">{code}</p>
    <p>The code expires in 5 minutes. If you did not request it, ignore this email.</p>
  </body>
</html>"#
    )
}

#[cfg(test)]
pub use recording::{RecordingMailer, SentMail};

#[cfg(test)]
mod recording {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;

    use anyhow::Result;
    use axum::async_trait;

    use super::Mailer;

    #[derive(Debug, Clone, PartialEq, Eq)]
    pub struct SentMail {
        pub to: String,
        pub subject: String,
        pub html: String,
    }

    /// Keeps every message instead of sending it.
    #[derive(Default)]
    pub struct RecordingMailer {
        sent: Mutex<Vec<SentMail>>,
        failing: AtomicBool,
    }

    impl RecordingMailer {
        pub fn fail(&self) {
            self.failing.store(true, Ordering::SeqCst);
        }

        pub fn sent(&self) -> Vec<SentMail> {
            self.sent.lock().unwrap().clone()
        }

        /// Digits of the verification code in the last message to `to`.
        pub fn last_code_for(&self, to: &str) -> Option<String> {
            let sent = self.sent.lock().unwrap();
            let mail = sent.iter().rev().find(|m| m.to == to)?;
            let start = mail.html.find("bold;\">")? + "bold;\">".len();
            Some(mail.html[start..start + 6].to_string())
        }
    }

    #[async_trait]
    impl Mailer for RecordingMailer {
        async fn send_html(&self, to: &str, subject: &str, html: &str) -> Result<()> {
            if self.failing.load(Ordering::SeqCst) {
                anyhow::bail!("smtp connection refused");
            }
            self.sent.lock().unwrap().push(SentMail {
                to: to.to_string(),
                subject: subject.to_string(),
                html: html.to_string(),
            });
            Ok(())
        }
    }
}
