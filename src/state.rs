use std::sync::Arc;
use std::time::Duration;

use crate::admins::repo::{AdminStore, PgAdminStore};
use crate::config::AppConfig;
use crate::db;
use crate::kv::{KvStore, RedisKv};
use crate::mail::{Mailer, SmtpMailer, UnconfiguredMailer};
use crate::users::repo::{PgUserStore, UserStore};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub users: Arc<dyn UserStore>,
    pub admins: Arc<dyn AdminStore>,
    pub kv: Arc<dyn KvStore>,
    pub mailer: Arc<dyn Mailer>,
    pub http: reqwest::Client,
}

/// Client for the processing service. Redirects are not followed.
pub fn processing_client(timeout_secs: u64) -> anyhow::Result<reqwest::Client> {
    Ok(reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .redirect(reqwest::redirect::Policy::none())
        .build()?)
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let config = Arc::new(AppConfig::from_env()?);

        let db = db::connect(&config.database).await?;

        let kv = Arc::new(
            RedisKv::connect(
                &config.redis_url,
                Duration::from_secs(config.redis_timeout_secs),
            )
            .await?,
        ) as Arc<dyn KvStore>;

        let mailer: Arc<dyn Mailer> = match &config.smtp {
            Some(smtp) => Arc::new(SmtpMailer::new(smtp)?),
            None => {
                tracing::warn!("SMTP_HOST not set; verification emails cannot be sent");
                Arc::new(UnconfiguredMailer)
            }
        };

        let http = processing_client(config.processing.timeout_secs)?;

        Ok(Self::from_parts(
            config,
            Arc::new(PgUserStore::new(db.clone())),
            Arc::new(PgAdminStore::new(db)),
            kv,
            mailer,
            http,
        ))
    }

    pub fn from_parts(
        config: Arc<AppConfig>,
        users: Arc<dyn UserStore>,
        admins: Arc<dyn AdminStore>,
        kv: Arc<dyn KvStore>,
        mailer: Arc<dyn Mailer>,
        http: reqwest::Client,
    ) -> Self {
        Self {
            config,
            users,
            admins,
            kv,
            mailer,
            http,
        }
    }

    /// In-memory stores, recording mailer and the test config.
    #[cfg(test)]
    pub fn fake() -> Self {
        use crate::admins::repo::MemoryAdminStore;
        use crate::kv::MemoryKv;
        use crate::mail::RecordingMailer;
        use crate::users::memory::MemoryUserStore;

        let config = Arc::new(AppConfig::fake());
        let http = processing_client(config.processing.timeout_secs).expect("http client");
        Self::from_parts(
            config,
            Arc::new(MemoryUserStore::default()),
            Arc::new(MemoryAdminStore::default()),
            Arc::new(MemoryKv::default()),
            Arc::new(RecordingMailer::default()),
            http,
        )
    }
}
