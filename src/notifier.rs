use crate::error::NotifyError;
use crate::storage_utils::SmtpConfig;
use async_trait::async_trait;
use lettre::message::{Mailbox, header};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};
use std::env;
use tracing::info;

pub const SENDER_VAR: &str = "EMAIL_SENDER";
pub const PASSWORD_VAR: &str = "EMAIL_PASSWORD";
pub const RECEIVER_VAR: &str = "EMAIL_RECEIVER";

/// Anything that can deliver a subject + body message.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn send(&self, subject: &str, body: &str) -> Result<(), NotifyError>;
}

#[derive(Debug, Clone)]
pub struct EmailCredentials {
    pub sender: String,
    pub password: String,
    pub receiver: String,
}

impl EmailCredentials {
    /// Reads the three credentials, naming every variable that is unset.
    pub fn from_env() -> Result<Self, NotifyError> {
        let read = |name: &'static str| env::var(name).ok().filter(|v| !v.trim().is_empty());

        let sender = read(SENDER_VAR);
        let password = read(PASSWORD_VAR);
        let receiver = read(RECEIVER_VAR);

        match (sender, password, receiver) {
            (Some(sender), Some(password), Some(receiver)) => Ok(Self {
                sender,
                password,
                receiver,
            }),
            (sender, password, receiver) => {
                let missing = [
                    (SENDER_VAR, sender.is_none()),
                    (PASSWORD_VAR, password.is_none()),
                    (RECEIVER_VAR, receiver.is_none()),
                ]
                .into_iter()
                .filter_map(|(name, absent)| absent.then_some(name))
                .collect();
                Err(NotifyError::MissingCredentials(missing))
            }
        }
    }
}

/// Email delivery over an implicit-TLS SMTP relay.
///
/// Missing credentials are not a construction error: the notifier still
/// builds, and every `send` reports the configuration problem instead.
pub struct SmtpNotifier {
    smtp: SmtpConfig,
    credentials: Result<EmailCredentials, NotifyError>,
}

impl SmtpNotifier {
    pub fn new(smtp: SmtpConfig, credentials: Result<EmailCredentials, NotifyError>) -> Self {
        Self { smtp, credentials }
    }

    pub fn from_env(smtp: SmtpConfig) -> Self {
        Self::new(smtp, EmailCredentials::from_env())
    }

    fn build_message(
        creds: &EmailCredentials,
        subject: &str,
        body: &str,
    ) -> Result<Message, NotifyError> {
        let from: Mailbox = creds
            .sender
            .parse()
            .map_err(|e| NotifyError::Message(format!("sender address: {e}")))?;
        let to: Mailbox = creds
            .receiver
            .parse()
            .map_err(|e| NotifyError::Message(format!("receiver address: {e}")))?;

        Message::builder()
            .from(from)
            .to(to)
            .subject(subject)
            .header(header::ContentType::TEXT_PLAIN)
            .body(body.to_string())
            .map_err(|e| NotifyError::Message(e.to_string()))
    }
}

#[async_trait]
impl NotificationSink for SmtpNotifier {
    async fn send(&self, subject: &str, body: &str) -> Result<(), NotifyError> {
        let creds = self.credentials.clone()?;
        let email = Self::build_message(&creds, subject, body)?;
        let host = self.smtp.host.clone();
        let port = self.smtp.port;

        info!(receiver = %creds.receiver, "sending alert email");

        // lettre's SmtpTransport is blocking
        tokio::task::spawn_blocking(move || {
            let mailer = SmtpTransport::relay(&host)
                .map_err(|e| NotifyError::Transport(e.to_string()))?
                .port(port)
                .credentials(Credentials::new(creds.sender, creds.password))
                .build();
            mailer
                .send(&email)
                .map(|_| ())
                .map_err(|e| NotifyError::Transport(e.to_string()))
        })
        .await
        .map_err(|e| NotifyError::Transport(e.to_string()))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn creds() -> EmailCredentials {
        EmailCredentials {
            sender: "engine@example.com".into(),
            password: "secret".into(),
            receiver: "me@example.com".into(),
        }
    }

    #[tokio::test]
    async fn send_without_credentials_is_a_configuration_error() {
        let notifier = SmtpNotifier::new(
            SmtpConfig::default(),
            Err(NotifyError::MissingCredentials(vec![PASSWORD_VAR])),
        );
        let err = notifier.send("subject", "body").await.unwrap_err();
        match err {
            NotifyError::MissingCredentials(missing) => assert_eq!(missing, vec![PASSWORD_VAR]),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn message_builds_from_valid_addresses() {
        let message = SmtpNotifier::build_message(&creds(), "Crypto Alert: 1 New Events", "line");
        assert!(message.is_ok());
    }

    #[test]
    fn malformed_sender_is_rejected() {
        let mut bad = creds();
        bad.sender = "not an address".into();
        let err = SmtpNotifier::build_message(&bad, "s", "b").unwrap_err();
        assert!(matches!(err, NotifyError::Message(_)));
    }
}
