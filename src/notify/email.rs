use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::{Mailbox, header::ContentType},
    transport::smtp::authentication::Credentials,
};
use tracing::info;

use super::{Channel, DeliveryError, Notification, render};
use crate::{config::SmtpConfig, utils::mask_email};

/// Sends one HTML email. Shared by notifications and sign-in codes.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send_html(&self, to: &str, subject: &str, html: String) -> Result<(), DeliveryError>;
}

pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailer {
    pub fn new(config: &SmtpConfig, timeout: Duration) -> Result<Self, DeliveryError> {
        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)?
            .port(config.port)
            .timeout(Some(timeout));

        if !config.user.is_empty() {
            builder = builder.credentials(Credentials::new(
                config.user.clone(),
                config.password.clone(),
            ));
        }

        let from = parse_mailbox(&config.from)?;
        info!(host = %config.host, port = config.port, "SMTP transport ready");

        Ok(Self {
            transport: builder.build(),
            from,
        })
    }
}

fn parse_mailbox(address: &str) -> Result<Mailbox, DeliveryError> {
    address
        .parse::<Mailbox>()
        .map_err(|e| DeliveryError::Message(format!("bad address {}: {e}", mask_email(address))))
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send_html(&self, to: &str, subject: &str, html: String) -> Result<(), DeliveryError> {
        let message = Message::builder()
            .from(self.from.clone())
            .to(parse_mailbox(to)?)
            .subject(subject)
            .header(ContentType::TEXT_HTML)
            .body(html)
            .map_err(|e| DeliveryError::Message(e.to_string()))?;

        self.transport.send(message).await?;
        Ok(())
    }
}

/// Notifications to the stakeholder mailbox.
pub struct EmailChannel {
    mailer: Arc<dyn Mailer>,
    to: String,
}

impl EmailChannel {
    pub fn new(mailer: Arc<dyn Mailer>, to: String) -> Self {
        Self { mailer, to }
    }
}

#[async_trait]
impl Channel for EmailChannel {
    fn name(&self) -> &'static str {
        "email"
    }

    async fn deliver(&self, notification: &Notification) -> Result<(), DeliveryError> {
        let (subject, html) = render::email(notification);
        self.mailer.send_html(&self.to, &subject, html).await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use chrono::Utc;

    use super::*;
    use crate::{
        models::{AggregateDraft, Kind},
        notify::Event,
    };

    #[derive(Default)]
    struct Outbox {
        sent: Mutex<Vec<(String, String, String)>>,
    }

    #[async_trait]
    impl Mailer for Outbox {
        async fn send_html(
            &self,
            to: &str,
            subject: &str,
            html: String,
        ) -> Result<(), DeliveryError> {
            self.sent
                .lock()
                .unwrap()
                .push((to.to_string(), subject.to_string(), html));
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_email_channel_renders_and_addresses() {
        let outbox = Arc::new(Outbox::default());
        let channel = EmailChannel::new(outbox.clone(), "sales@example.com".to_string());

        let aggregate = AggregateDraft {
            name: "Spare switches".to_string(),
            contact_name: "Jane".to_string(),
            ..Default::default()
        }
        .into_aggregate(Kind::Stock, Utc::now())
        .unwrap();

        channel
            .deliver(&Notification {
                event: Event::Registered,
                aggregate,
                line_items: Vec::new(),
                at: Utc::now(),
            })
            .await
            .unwrap();

        let sent = outbox.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, "sales@example.com");
        assert_eq!(sent[0].1, "[Stock registered] Spare switches");
    }
}
