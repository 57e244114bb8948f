//! # Notifications
//!
//! Stakeholders hear about records twice:
//! - **Registered**: equipment lines were added to a new project/stock (intake summary)
//! - **Stage 2 reached**: an update supplied delivery details while the record was still at stage 1
//!
//! ## Delivery
//!
//! Best effort. The HTTP request that triggered a notification has already committed its write and
//! never waits on delivery.
//!
//! - Requests push a [`Job`] onto a bounded queue, a full queue drops the job with a warning
//! - A few workers drain the queue, load the record's equipment lines and build the [`Notification`]
//! - Every configured [`Channel`] gets it independently, each call under its own timeout
//! - Failures are logged and forgotten, no retries
//!
//! Channels:
//! - Email over SMTP to the stakeholder mailbox
//! - LINE push message to the team group
use chrono::{DateTime, Utc};

use crate::models::{Aggregate, LineItem};

pub mod channel;
pub mod chat;
pub mod dispatcher;
pub mod email;
pub mod render;

pub use channel::{Channel, DeliveryError};
pub use chat::ChatChannel;
pub use dispatcher::{Dispatcher, Job, Workers};
pub use email::{EmailChannel, Mailer, SmtpMailer};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    Registered,
    Stage2Reached,
}

#[derive(Debug, Clone)]
pub struct Notification {
    pub event: Event,
    pub aggregate: Aggregate,
    pub line_items: Vec<LineItem>,
    pub at: DateTime<Utc>,
}
