//! Outbound order notifications.
//!
//! [`SmtpNotifier`] sends mail directly and [`RelayNotifier`] posts to an HTTP
//! mail relay. [`LogNotifier`] stands in when neither is configured.

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use hmac::{Hmac, Mac};
use lettre::{
    message::{header::ContentType, Attachment as MailAttachment, Mailbox, MultiPart, SinglePart},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use serde::Serialize;
use sha2::Sha256;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, instrument, warn};

pub const SIGNATURE_HEADER: &str = "x-wholesale-signature";
pub const TIMESTAMP_HEADER: &str = "x-wholesale-timestamp";

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub filename: String,
    pub content_type: String,
    pub content: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub to: Vec<String>,
    pub cc: Vec<String>,
    pub subject: String,
    pub html_body: String,
    pub attachments: Vec<Attachment>,
}

#[derive(Debug, Error)]
pub enum NotificationError {
    #[error("No recipients")]
    NoRecipients,
    #[error("Relay request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("Relay rejected notification with status {0}")]
    Rejected(u16),
    #[error("SMTP delivery failed: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),
    #[error("Invalid message: {0}")]
    Message(String),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Internal error: {0}")]
    Internal(String),
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn dispatch(&self, notification: &Notification) -> Result<(), NotificationError>;
}

/// Signs `<timestamp>.<body>` with HMAC-SHA256, hex encoded.
pub fn sign_payload(secret: &str, timestamp: &str, body: &str) -> Result<String, NotificationError> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| NotificationError::Internal(e.to_string()))?;
    mac.update(format!("{}.{}", timestamp, body).as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}

#[derive(Serialize)]
struct RelayAttachment<'a> {
    filename: &'a str,
    content_type: &'a str,
    content_base64: String,
}

#[derive(Serialize)]
struct RelayMessage<'a> {
    from: &'a str,
    to: &'a [String],
    cc: &'a [String],
    subject: &'a str,
    html: &'a str,
    attachments: Vec<RelayAttachment<'a>>,
}

/// Delivers notifications by POSTing JSON to a mail relay.
#[derive(Clone)]
pub struct RelayNotifier {
    client: reqwest::Client,
    url: String,
    from: String,
    secret: Option<String>,
}

impl RelayNotifier {
    pub fn new(
        url: impl Into<String>,
        from: impl Into<String>,
        secret: Option<String>,
        timeout: Duration,
    ) -> Result<Self, NotificationError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url: url.into(),
            from: from.into(),
            secret: secret.filter(|s| !s.is_empty()),
        })
    }

    fn body(&self, notification: &Notification) -> Result<String, NotificationError> {
        let message = RelayMessage {
            from: &self.from,
            to: &notification.to,
            cc: &notification.cc,
            subject: &notification.subject,
            html: &notification.html_body,
            attachments: notification
                .attachments
                .iter()
                .map(|a| RelayAttachment {
                    filename: &a.filename,
                    content_type: &a.content_type,
                    content_base64: STANDARD.encode(&a.content),
                })
                .collect(),
        };
        Ok(serde_json::to_string(&message)?)
    }
}

#[async_trait]
impl Notifier for RelayNotifier {
    #[instrument(skip(self, notification), fields(subject = %notification.subject))]
    async fn dispatch(&self, notification: &Notification) -> Result<(), NotificationError> {
        if notification.to.is_empty() {
            return Err(NotificationError::NoRecipients);
        }

        let body = self.body(notification)?;
        let timestamp = chrono::Utc::now().timestamp().to_string();

        let mut request = self
            .client
            .post(&self.url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .header(TIMESTAMP_HEADER, &timestamp);
        if let Some(secret) = &self.secret {
            request = request.header(SIGNATURE_HEADER, sign_payload(secret, &timestamp, &body)?);
        }

        let response = request.body(body).send().await?;
        let status = response.status();
        if !status.is_success() {
            warn!(status = status.as_u16(), "Mail relay rejected notification");
            return Err(NotificationError::Rejected(status.as_u16()));
        }

        info!(recipients = notification.to.len() + notification.cc.len(), "Notification delivered");
        Ok(())
    }
}

/// Delivers notifications over SMTP: the HTML body plus attachments as a
/// multipart/mixed message.
pub struct SmtpNotifier {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

fn mailbox(address: &str) -> Result<Mailbox, NotificationError> {
    address
        .parse()
        .map_err(|e| NotificationError::Message(format!("invalid address {}: {}", address, e)))
}

impl SmtpNotifier {
    /// Port 465 connects with implicit TLS, any other port upgrades with STARTTLS.
    pub fn new(
        host: &str,
        port: u16,
        credentials: Option<(String, String)>,
        from: &str,
        timeout: Duration,
    ) -> Result<Self, NotificationError> {
        let builder = if port == 465 {
            AsyncSmtpTransport::<Tokio1Executor>::relay(host)?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)?
        };
        let mut builder = builder.port(port).timeout(Some(timeout));
        if let Some((username, password)) = credentials {
            builder = builder.credentials(Credentials::new(username, password));
        }

        Ok(Self {
            transport: builder.build(),
            from: mailbox(from)?,
        })
    }

    pub fn message(&self, notification: &Notification) -> Result<Message, NotificationError> {
        if notification.to.is_empty() {
            return Err(NotificationError::NoRecipients);
        }

        let mut builder = Message::builder()
            .from(self.from.clone())
            .subject(notification.subject.clone());
        for address in &notification.to {
            builder = builder.to(mailbox(address)?);
        }
        for address in &notification.cc {
            builder = builder.cc(mailbox(address)?);
        }

        let mut body = MultiPart::mixed().singlepart(SinglePart::html(notification.html_body.clone()));
        for attachment in &notification.attachments {
            let content_type = ContentType::parse(&attachment.content_type).map_err(|e| {
                NotificationError::Message(format!("invalid content type {}: {}", attachment.content_type, e))
            })?;
            body = body.singlepart(
                MailAttachment::new(attachment.filename.clone())
                    .body(attachment.content.clone(), content_type),
            );
        }

        builder
            .multipart(body)
            .map_err(|e| NotificationError::Message(e.to_string()))
    }
}

#[async_trait]
impl Notifier for SmtpNotifier {
    #[instrument(skip(self, notification), fields(subject = %notification.subject))]
    async fn dispatch(&self, notification: &Notification) -> Result<(), NotificationError> {
        let message = self.message(notification)?;
        self.transport.send(message).await?;
        info!(recipients = notification.to.len() + notification.cc.len(), "Notification mailed");
        Ok(())
    }
}

/// Stand-in used when no mail transport is configured.
#[derive(Debug, Clone, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn dispatch(&self, notification: &Notification) -> Result<(), NotificationError> {
        info!(
            to = ?notification.to,
            cc = ?notification.cc,
            subject = %notification.subject,
            attachments = notification.attachments.len(),
            "Mail transport not configured, skipping notification"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn notification() -> Notification {
        Notification {
            to: vec!["orders@example.com".into()],
            cc: vec!["buyer@example.com".into()],
            subject: "New order #WO-1 - Boutique".into(),
            html_body: "<p>hi</p>".into(),
            attachments: vec![Attachment {
                filename: "order-WO-1.pdf".into(),
                content_type: "application/pdf".into(),
                content: b"%PDF-1.3".to_vec(),
            }],
        }
    }

    #[test]
    fn signature_is_hex_sha256() {
        let sig = sign_payload("secret", "1700000000", r#"{"a":1}"#).unwrap();
        assert_eq!(sig.len(), 64);
        assert_eq!(sig, sign_payload("secret", "1700000000", r#"{"a":1}"#).unwrap());
        assert_ne!(sig, sign_payload("other", "1700000000", r#"{"a":1}"#).unwrap());
    }

    #[test]
    fn relay_body_encodes_attachments() {
        let notifier = RelayNotifier::new(
            "http://localhost:9/send",
            "no-reply@example.com",
            None,
            Duration::from_secs(1),
        )
        .unwrap();
        let body: serde_json::Value =
            serde_json::from_str(&notifier.body(&notification()).unwrap()).unwrap();
        assert_eq!(body["from"], "no-reply@example.com");
        assert_eq!(body["cc"][0], "buyer@example.com");
        assert_eq!(
            body["attachments"][0]["content_base64"],
            STANDARD.encode(b"%PDF-1.3")
        );
    }

    #[tokio::test]
    async fn relay_requires_recipients() {
        let notifier = RelayNotifier::new(
            "http://localhost:9/send",
            "no-reply@example.com",
            None,
            Duration::from_secs(1),
        )
        .unwrap();
        let mut n = notification();
        n.to.clear();
        assert!(matches!(
            notifier.dispatch(&n).await,
            Err(NotificationError::NoRecipients)
        ));
    }

    fn smtp() -> SmtpNotifier {
        SmtpNotifier::new(
            "smtp.example.com",
            587,
            Some(("orders".into(), "secret".into())),
            "no-reply@example.com",
            Duration::from_secs(1),
        )
        .unwrap()
    }

    #[test]
    fn smtp_message_carries_recipients_and_attachment() {
        let message = smtp().message(&notification()).unwrap();

        let recipients: Vec<String> = message
            .envelope()
            .to()
            .iter()
            .map(|a| a.to_string())
            .collect();
        assert!(recipients.contains(&"orders@example.com".to_string()));
        assert!(recipients.contains(&"buyer@example.com".to_string()));

        let raw = String::from_utf8_lossy(&message.formatted()).into_owned();
        assert!(raw.contains("New order #WO-1 - Boutique"));
        assert!(raw.contains("order-WO-1.pdf"));
        assert!(raw.contains("application/pdf"));
    }

    #[test]
    fn smtp_message_rejects_bad_addresses() {
        let mut n = notification();
        n.cc = vec!["not an address".into()];
        assert!(matches!(
            smtp().message(&n),
            Err(NotificationError::Message(msg)) if msg.contains("not an address")
        ));

        n.to.clear();
        assert!(matches!(smtp().message(&n), Err(NotificationError::NoRecipients)));
    }

    #[tokio::test]
    async fn log_notifier_always_succeeds() {
        assert!(LogNotifier.dispatch(&notification()).await.is_ok());
    }
}
