use std::{sync::Arc, time::Duration};

use anyhow::Context;
use tracing::{info, warn};

use crate::{
    auth::{Keys, bootstrap_admin},
    config::Config,
    database::{MemoryRepository, RedisRepository, Repository},
    notify::{Channel, ChatChannel, Dispatcher, EmailChannel, Mailer, SmtpMailer, Workers},
    service::AggregateService,
    verification::{SWEEP_INTERVAL, SweeperHandle, VerificationStore},
};

pub struct AppState {
    pub config: Config,
    pub repository: Arc<dyn Repository>,
    pub aggregates: AggregateService,
    pub verification: Arc<VerificationStore>,
    pub mailer: Option<Arc<dyn Mailer>>,
    pub keys: Keys,
}

/// Tasks that outlive individual requests.
pub struct Background {
    sweeper: SweeperHandle,
    workers: Workers,
}

impl AppState {
    pub async fn new(config: Config) -> anyhow::Result<(Arc<Self>, Background)> {
        let repository: Arc<dyn Repository> = match &config.redis_url {
            Some(url) => {
                let repository = RedisRepository::connect(url)
                    .await
                    .context("Failed to connect to Redis")?;
                info!("Connected to Redis");
                Arc::new(repository)
            }
            None => {
                warn!("REDIS_URL not set, records live in memory and vanish on restart");
                Arc::new(MemoryRepository::new())
            }
        };

        bootstrap_admin(&*repository, &config).await?;

        let mailer = match &config.smtp {
            Some(smtp) => {
                let mailer: Arc<dyn Mailer> = Arc::new(SmtpMailer::new(smtp, config.notify.timeout)?);
                Some(mailer)
            }
            None => None,
        };

        let mut channels: Vec<Arc<dyn Channel>> = Vec::new();
        match (&mailer, &config.email_to) {
            (Some(mailer), Some(to)) => {
                channels.push(Arc::new(EmailChannel::new(mailer.clone(), to.clone())));
            }
            (Some(_), None) => warn!("EMAIL_TO not set, email notifications disabled"),
            (None, _) => {}
        }
        if let Some(line) = &config.line {
            channels.push(Arc::new(ChatChannel::new(line, config.notify.timeout)?));
        }

        Ok(Self::assemble(config, repository, mailer, channels))
    }

    /// Wires the services around an existing repository and channel set and
    /// starts the background tasks.
    pub fn assemble(
        config: Config,
        repository: Arc<dyn Repository>,
        mailer: Option<Arc<dyn Mailer>>,
        channels: Vec<Arc<dyn Channel>>,
    ) -> (Arc<Self>, Background) {
        let (dispatcher, workers) = Dispatcher::start(repository.clone(), channels, config.notify);

        let verification = Arc::new(VerificationStore::new());
        let sweeper = verification.start_sweeper(SWEEP_INTERVAL);

        let state = Arc::new(Self {
            keys: Keys::new(config.jwt_secret.as_bytes()),
            aggregates: AggregateService::new(repository.clone(), dispatcher),
            repository,
            verification,
            mailer,
            config,
        });

        (state, Background { sweeper, workers })
    }
}

impl Background {
    /// Stops the sweeper and waits up to `limit` for queued notifications.
    /// Every [`AppState`] must be dropped first or the workers never finish.
    pub async fn shutdown(self, limit: Duration) {
        self.sweeper.stop().await;

        if tokio::time::timeout(limit, self.workers.drain())
            .await
            .is_err()
        {
            warn!("Notification workers still busy after {limit:?}, abandoning queued notifications");
        }
    }
}
