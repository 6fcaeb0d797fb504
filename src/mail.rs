use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use lettre::message::{header::ContentType, Mailbox};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Address, Message, SmtpTransport, Transport};
use tracing::info;
use url::Url;

use crate::config::AppConfig;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMail {
    pub to: String,
    pub subject: String,
    pub body: String,
}

#[async_trait]
pub trait Mailer: Send + Sync + 'static {
    async fn send(&self, mail: OutgoingMail) -> Result<()>;
}

/// Delivers through an SMTP relay. The relay is reached without TLS, so it
/// is expected to be a local sidecar or a trusted internal host.
pub struct SmtpMailer {
    transport: Arc<SmtpTransport>,
    from: Mailbox,
}

impl SmtpMailer {
    pub fn new(
        host: &str,
        port: u16,
        credentials: Option<(String, String)>,
        from: &str,
    ) -> Result<Self> {
        let from: Mailbox = from
            .parse()
            .with_context(|| format!("invalid sender mailbox {from}"))?;
        let mut builder = SmtpTransport::builder_dangerous(host).port(port);
        if let Some((username, password)) = credentials {
            builder = builder.credentials(Credentials::new(username, password));
        }
        Ok(Self {
            transport: Arc::new(builder.build()),
            from,
        })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, mail: OutgoingMail) -> Result<()> {
        let to: Mailbox = mail
            .to
            .parse()
            .with_context(|| format!("invalid recipient address {}", mail.to))?;
        let message = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(mail.subject.clone())
            .header(ContentType::TEXT_PLAIN)
            .body(mail.body)
            .context("failed to build email")?;

        let transport = self.transport.clone();
        tokio::task::spawn_blocking(move || transport.send(&message))
            .await
            .context("mail task panicked")?
            .context("failed to send email")?;

        info!(to = %mail.to, subject = %mail.subject, "email sent");
        Ok(())
    }
}

/// Used when no SMTP host is configured: the message is only logged.
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, mail: OutgoingMail) -> Result<()> {
        info!(
            to = %mail.to,
            subject = %mail.subject,
            body = %mail.body,
            "smtp not configured, email logged instead of sent"
        );
        Ok(())
    }
}

pub fn build_mailer(config: &AppConfig) -> Result<Arc<dyn Mailer>> {
    match &config.smtp_host {
        Some(host) => {
            let credentials = config
                .smtp_username
                .clone()
                .zip(config.smtp_password.clone());
            let mailer = SmtpMailer::new(host, config.smtp_port, credentials, &config.mail_from)?;
            Ok(Arc::new(mailer))
        }
        None => Ok(Arc::new(LogMailer)),
    }
}

pub fn is_valid_address(address: &str) -> bool {
    address.parse::<Address>().is_ok()
}

pub fn recovery_mail(email: &str, recovery_url: &Url) -> OutgoingMail {
    let mut link = recovery_url.clone();
    link.query_pairs_mut().append_pair("email", email);

    OutgoingMail {
        to: email.to_string(),
        subject: "Recover your HR account".to_string(),
        body: format!(
            "Hello,\n\n\
             We received a request to recover the HR account registered to {email}.\n\n\
             Follow this link to continue:\n{link}\n\n\
             If you did not make this request you can ignore this message.\n"
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recovery_mail_links_back_with_the_encoded_address() {
        let url = Url::parse("https://jobs.example.com/recover").unwrap();
        let mail = recovery_mail("hr+ops@example.com", &url);

        assert_eq!(mail.to, "hr+ops@example.com");
        assert!(mail
            .body
            .contains("https://jobs.example.com/recover?email=hr%2Bops%40example.com"));
    }

    #[test]
    fn validates_addresses() {
        assert!(is_valid_address("hr@example.com"));
        assert!(!is_valid_address("not-an-address"));
        assert!(!is_valid_address(""));
    }

    #[tokio::test]
    async fn log_mailer_always_succeeds() {
        let mail = recovery_mail("hr@example.com", &Url::parse("http://localhost/r").unwrap());
        assert!(LogMailer.send(mail).await.is_ok());
    }

    #[test]
    fn missing_smtp_host_falls_back_to_logging() {
        let config = AppConfig::with_database_url("postgres://localhost/jobboard").unwrap();
        assert!(build_mailer(&config).is_ok());
    }
}
