/**
 * Outbound Email Notifications
 *
 * Optional SMTP notifier. Sends are fire-and-forget on a spawned task;
 * a send failure is logged and never surfaced to the request that
 * triggered it. With incomplete SMTP settings the mailer is disabled and
 * every send is a no-op.
 */

use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

/// Handle to the SMTP transport; cheap to clone.
#[derive(Clone)]
pub struct Mailer {
    transport: Option<AsyncSmtpTransport<Tokio1Executor>>,
    from: String,
}

impl Mailer {
    pub fn new(host: &str, username: &str, password: &str, from: &str) -> Self {
        let credentials = Credentials::new(username.to_string(), password.to_string());
        match AsyncSmtpTransport::<Tokio1Executor>::relay(host) {
            Ok(builder) => {
                tracing::info!("SMTP transport configured for {}", host);
                Self {
                    transport: Some(builder.credentials(credentials).build()),
                    from: from.to_string(),
                }
            }
            Err(e) => {
                tracing::error!("Failed to configure SMTP transport: {:?}", e);
                Self::disabled()
            }
        }
    }

    /// A mailer with no transport; every send is a no-op.
    pub fn disabled() -> Self {
        Self {
            transport: None,
            from: String::new(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.transport.is_some()
    }

    /// Queue a plain-text email. Fire-and-forget: the send happens on a
    /// spawned task and failures are only logged.
    pub fn send(&self, to: &str, subject: &str, body: &str) {
        let Some(transport) = self.transport.clone() else {
            return;
        };

        let message = Message::builder()
            .from(match self.from.parse() {
                Ok(mailbox) => mailbox,
                Err(e) => {
                    tracing::warn!("invalid SMTP_FROM address: {:?}", e);
                    return;
                }
            })
            .to(match to.parse() {
                Ok(mailbox) => mailbox,
                Err(e) => {
                    tracing::warn!("invalid recipient address {}: {:?}", to, e);
                    return;
                }
            })
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .body(body.to_string());

        let message = match message {
            Ok(message) => message,
            Err(e) => {
                tracing::warn!("failed to build email: {:?}", e);
                return;
            }
        };

        tokio::spawn(async move {
            if let Err(e) = transport.send(message).await {
                tracing::warn!("email send failed: {:?}", e);
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disabled_mailer_noops() {
        let mailer = Mailer::disabled();
        assert!(!mailer.is_enabled());
        // must not panic without a runtime-spawned task
        mailer.send("user@example.com", "subject", "body");
    }
}
