//! Back office for procurement projects and stock reservations.
//!
//!
//!
//! # General Flow
//! - Sales registers a project or stock record (stage 1) and attaches its equipment lines
//! - Attaching equipment sends the intake summary to the stakeholder mailbox and the team LINE group
//! - The first update carrying delivery details moves the record to stage 2 and announces it once
//! - Records are closed by explicitly setting `completed`, nothing leaves `completed`
//!
//!
//!
//! # Sign In
//!
//! **Goal**: A leaked password alone is not enough to get a session.
//!
//! - `POST /auth/request-code` checks username and password, then mails a six digit code
//! - Codes live 5 minutes, work once, and a new request replaces the previous code
//! - `POST /auth/verify-login` checks the password again together with the code
//! - Success returns a 24 hour JWT, also set as an HttpOnly `token` cookie
//! - Expired codes nobody redeemed are swept every minute
//!
//!
//!
//! # Notes
//!
//! ## Notifications never fail a request
//! The write is committed before anything is queued. Delivery happens on a small worker pool behind a
//! bounded queue, every channel call has its own timeout, and a full queue drops the notification with a
//! warning instead of slowing requests down.
//!
//! ## Concurrent updates
//! Records are saved with a version check. An update that lost the race re-reads and tries again, so the
//! stage 2 announcement is decided against the exact state that was overwritten and fires once.
//!
//!
//!
//! # Environment
//!
//! Secrets are read from `/run/secrets/<NAME>` first, then from the environment.
//!
//! | Variable | Default |
//! |---|---|
//! | `RUST_PORT` | `8080` |
//! | `REDIS_URL` | in-memory storage |
//! | `JWT_SECRET` | required |
//! | `CORS_ORIGINS` | none, comma separated |
//! | `SMTP_HOST` `SMTP_PORT` `SMTP_USER` `SMTP_PASSWORD` `EMAIL_FROM` | email disabled, port `587` |
//! | `EMAIL_TO` | email notifications disabled |
//! | `LINE_CHANNEL_ACCESS_TOKEN` `LINE_GROUP_ID` | chat notifications disabled |
//! | `NOTIFY_WORKERS` `NOTIFY_QUEUE` `NOTIFY_TIMEOUT_SECS` | `2` `64` `10` |
//! | `ADMIN_PASSWORD` `ADMIN_EMAIL` | generated and logged once |
//!
//!
//!
//! # Setup
//!
//! Run locally with logs.
//! ```sh
//! RUST_LOG=info JWT_SECRET=dev cargo run
//! ```
//!
//! View docs.
//! ```sh
//! cargo doc --open
//! ```
use std::time::Duration;

use signal::{
    ctrl_c,
    unix::{SignalKind, signal},
};
use tokio::{net::TcpListener, signal};
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt};

pub mod auth;
pub mod config;
pub mod database;
pub mod error;
pub mod models;
pub mod notify;
pub mod routes;
pub mod service;
pub mod state;
pub mod transition;
pub mod utils;
pub mod verification;

use config::Config;
use state::AppState;

const DRAIN_TIMEOUT: Duration = Duration::from_secs(15);

pub async fn start_server() -> anyhow::Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    info!("Loading config...");
    let config = Config::load()?;

    info!("Initializing state...");
    let (state, background) = AppState::new(config).await?;

    info!("Starting server...");

    let address = format!("0.0.0.0:{}", state.config.port);
    let app = routes::router(state);
    info!("Binding to {address}");

    let listener = TcpListener::bind(&address).await?;
    info!("Server running on {address}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutting down...");
    background.shutdown(DRAIN_TIMEOUT).await;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        match ctrl_c().await {
            Ok(()) => info!("Received Ctrl+C, shutting down"),
            Err(e) => {
                error!("Failed to install Ctrl+C handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal(SignalKind::terminate()) {
            Ok(mut terminate) => {
                terminate.recv().await;
                info!("Received terminate signal, shutting down");
            }
            Err(e) => {
                error!("Failed to install signal handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
