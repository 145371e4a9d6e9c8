// SPDX-FileCopyrightText: 2026 Deskrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SMTP email transport for the deskrelay notification engine.
//!
//! Sends one message per job over an async SMTP relay. Outbound messages
//! carry an engine-generated `Message-ID`; replies to the same ticket set
//! `In-Reply-To` and `References` from the payload's threading block so
//! mail clients stack the whole conversation into one thread.

use async_trait::async_trait;
use lettre::message::header;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tracing::debug;
use uuid::Uuid;

use deskrelay_config::model::EmailConfig;
use deskrelay_core::{
    AdapterType, DeliveryChannel, HealthStatus, JobPayload, RelayAdapter, RelayError, Transport,
    TransportReceipt,
};

/// Email transport backed by `lettre`'s Tokio SMTP client.
pub struct EmailTransport {
    from: Mailbox,
    /// Domain for generated Message-IDs, taken from the from-address.
    message_id_domain: String,
    mailer: AsyncSmtpTransport<Tokio1Executor>,
}

impl EmailTransport {
    pub fn new(config: &EmailConfig) -> Result<Self, RelayError> {
        let from: Mailbox = config.from_address.parse().map_err(|e| {
            RelayError::Config(format!(
                "invalid email.from_address {:?}: {e}",
                config.from_address
            ))
        })?;
        let message_id_domain = config
            .from_address
            .rsplit('@')
            .next()
            .unwrap_or("localhost")
            .trim_end_matches('>')
            .to_string();

        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)
            .map_err(|e| {
                RelayError::Config(format!("invalid email.smtp_host {:?}: {e}", config.smtp_host))
            })?
            .port(config.smtp_port);
        if let (Some(username), Some(password)) = (&config.username, &config.password) {
            builder = builder.credentials(Credentials::new(username.clone(), password.clone()));
        }

        Ok(Self {
            from,
            message_id_domain,
            mailer: builder.build(),
        })
    }

    /// Render a payload into an RFC 5322 message plus its Message-ID.
    fn build_message(&self, payload: &JobPayload) -> Result<(Message, String), RelayError> {
        let recipient = payload.recipient.as_deref().ok_or_else(|| {
            RelayError::transport("email", "payload carries no recipient address")
        })?;
        let to: Mailbox = recipient.parse().map_err(|e| {
            RelayError::transport("email", format!("invalid recipient {recipient:?}: {e}"))
        })?;

        let message_id = format!("<{}@{}>", Uuid::new_v4(), self.message_id_domain);

        let (subject, in_reply_to, references) = match &payload.threading {
            Some(threading) => {
                let subject = if threading.in_reply_to.is_some()
                    && !threading.subject.starts_with("Re:")
                {
                    format!("Re: {}", threading.subject)
                } else {
                    threading.subject.clone()
                };
                (
                    subject,
                    threading.in_reply_to.clone(),
                    threading.references.clone(),
                )
            }
            None => (payload.title.clone(), None, Vec::new()),
        };

        let mut builder = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(subject)
            .message_id(Some(message_id.clone()));
        if let Some(in_reply_to) = in_reply_to {
            builder = builder.in_reply_to(in_reply_to);
        }
        if !references.is_empty() {
            builder = builder.references(references.join(" "));
        }

        let mut body = payload.body.clone();
        if let Some(link) = &payload.link {
            body.push_str("\n\n");
            body.push_str(link);
        }

        let message = builder
            .header(header::ContentType::TEXT_PLAIN)
            .body(body)
            .map_err(|e| RelayError::Transport {
                channel: "email".into(),
                message: "failed to build message".into(),
                source: Some(Box::new(e)),
            })?;
        Ok((message, message_id))
    }
}

#[async_trait]
impl RelayAdapter for EmailTransport {
    fn name(&self) -> &str {
        "smtp"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Transport
    }

    async fn health_check(&self) -> Result<HealthStatus, RelayError> {
        match self.mailer.test_connection().await {
            Ok(true) => Ok(HealthStatus::Healthy),
            Ok(false) => Ok(HealthStatus::Unhealthy("SMTP NOOP failed".into())),
            Err(e) => Ok(HealthStatus::Unhealthy(format!("SMTP unreachable: {e}"))),
        }
    }

    async fn shutdown(&self) -> Result<(), RelayError> {
        Ok(())
    }
}

#[async_trait]
impl Transport for EmailTransport {
    fn channel(&self) -> DeliveryChannel {
        DeliveryChannel::Email
    }

    async fn deliver(&self, payload: &JobPayload) -> Result<TransportReceipt, RelayError> {
        let (message, message_id) = self.build_message(payload)?;
        self.mailer
            .send(message)
            .await
            .map_err(|e| RelayError::Transport {
                channel: "email".into(),
                message: format!("SMTP send to {:?} failed", payload.recipient),
                source: Some(Box::new(e)),
            })?;
        debug!(
            notification_id = %payload.notification_id,
            message_id = %message_id,
            "email accepted by relay"
        );
        Ok(TransportReceipt {
            message_id: Some(message_id),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use deskrelay_core::EmailThreading;

    fn transport() -> EmailTransport {
        EmailTransport::new(&EmailConfig {
            enabled: true,
            smtp_host: "smtp.example.com".into(),
            smtp_port: 587,
            from_address: "support@helpdesk.example".into(),
            username: None,
            password: None,
        })
        .unwrap()
    }

    fn payload(threading: Option<EmailThreading>) -> JobPayload {
        JobPayload {
            notification_id: "n-1".into(),
            channel: DeliveryChannel::Email,
            user_id: "u-1".into(),
            recipient: Some("user@example.com".into()),
            title: "Ticket updated".into(),
            body: "Your ticket has a new reply.".into(),
            link: Some("https://helpdesk.example/tickets/t-1".into()),
            threading,
            social: None,
        }
    }

    #[test]
    fn invalid_from_address_is_a_config_error() {
        let result = EmailTransport::new(&EmailConfig {
            from_address: "not an address".into(),
            ..EmailConfig::default()
        });
        assert!(matches!(result, Err(RelayError::Config(_))));
    }

    #[test]
    fn missing_recipient_is_a_transport_error() {
        let transport = transport();
        let mut p = payload(None);
        p.recipient = None;
        let err = transport.build_message(&p).unwrap_err();
        assert!(matches!(err, RelayError::Transport { .. }));
    }

    #[test]
    fn first_message_has_generated_id_and_no_threading_headers() {
        let transport = transport();
        let (message, message_id) = transport.build_message(&payload(None)).unwrap();
        assert!(message_id.starts_with('<'));
        assert!(message_id.ends_with("@helpdesk.example>"));

        let rendered = String::from_utf8(message.formatted()).unwrap();
        assert!(rendered.contains("Subject: Ticket updated"));
        assert!(!rendered.contains("In-Reply-To"));
        assert!(!rendered.contains("References"));
        assert!(rendered.contains("https://helpdesk.example/tickets/t-1"));
    }

    #[test]
    fn reply_sets_threading_headers_and_re_subject() {
        let transport = transport();
        let threading = EmailThreading {
            subject: "Printer on fire".into(),
            in_reply_to: Some("<a@helpdesk.example>".into()),
            references: vec!["<a@helpdesk.example>".into(), "<b@helpdesk.example>".into()],
        };
        let (message, _) = transport.build_message(&payload(Some(threading))).unwrap();

        let rendered = String::from_utf8(message.formatted()).unwrap();
        assert!(rendered.contains("Subject: Re: Printer on fire"));
        assert!(rendered.contains("In-Reply-To: <a@helpdesk.example>"));
        assert!(rendered.contains("References: <a@helpdesk.example> <b@helpdesk.example>"));
    }

    #[test]
    fn existing_re_prefix_is_not_doubled() {
        let transport = transport();
        let threading = EmailThreading {
            subject: "Re: Printer on fire".into(),
            in_reply_to: Some("<a@helpdesk.example>".into()),
            references: vec!["<a@helpdesk.example>".into()],
        };
        let (message, _) = transport.build_message(&payload(Some(threading))).unwrap();
        let rendered = String::from_utf8(message.formatted()).unwrap();
        assert!(rendered.contains("Subject: Re: Printer on fire"));
        assert!(!rendered.contains("Re: Re:"));
    }
}
